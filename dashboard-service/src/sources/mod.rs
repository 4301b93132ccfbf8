pub mod consumption_csv_file;
pub mod postgres;

use std::fmt;

use consumption_client::domain::{parse_month, ConsumptionRecord, TimeKey};
use time::{macros::format_description, Date};

use crate::engine::TimeGranularity;

pub use consumption_csv_file::ConsumptionCsvFileSource;
pub use postgres::PgRecordSource;

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("invalid {granularity} period '{input}'")]
    InvalidPeriod {
        granularity: TimeGranularity,
        input: String,
    },
    #[error("period {period} precedes first stored year {start_year}")]
    BeforeStartYear { period: PeriodSelector, start_year: i32 },
    #[error("source error: {0}")]
    Fetch(String),
}

/// The period a dashboard selection covers. Its variant fixes the time
/// granularity and therefore the table the rows come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodSelector {
    /// One calendar day of hourly rows.
    Day(Date),
    /// One calendar month of daily rows.
    Month { year: i32, month: u8 },
    /// One year of monthly rows.
    Year(i32),
}

impl PeriodSelector {
    /// Parse `2024-05-14`, `2024-05` or `2024` according to `granularity`.
    pub fn parse(granularity: TimeGranularity, input: &str) -> Result<Self, SourceError> {
        let invalid = || SourceError::InvalidPeriod {
            granularity,
            input: input.to_string(),
        };
        let s = input.trim();

        match granularity {
            TimeGranularity::Daily => Date::parse(s, format_description!("[year]-[month]-[day]"))
                .map(Self::Day)
                .map_err(|_| invalid()),
            TimeGranularity::Monthly => {
                let (year, month) = s.split_once('-').ok_or_else(invalid)?;
                let year = year.parse::<i32>().map_err(|_| invalid())?;
                let month = parse_month(month).map_err(|_| invalid())?;
                Ok(Self::Month { year, month })
            }
            TimeGranularity::Annual => s.parse::<i32>().map(Self::Year).map_err(|_| invalid()),
        }
    }

    pub fn granularity(&self) -> TimeGranularity {
        match self {
            Self::Day(_) => TimeGranularity::Daily,
            Self::Month { .. } => TimeGranularity::Monthly,
            Self::Year(_) => TimeGranularity::Annual,
        }
    }

    pub fn year(&self) -> i32 {
        match self {
            Self::Day(d) => d.year(),
            Self::Month { year, .. } => *year,
            Self::Year(year) => *year,
        }
    }

    /// Reject periods older than the first year the store keeps.
    pub fn ensure_stored(self, start_year: i32) -> Result<Self, SourceError> {
        if self.year() < start_year {
            return Err(SourceError::BeforeStartYear {
                period: self,
                start_year,
            });
        }
        Ok(self)
    }

    /// Whether a raw row of the matching shape falls inside the period.
    pub fn contains(&self, key: &TimeKey) -> bool {
        match (self, key) {
            (Self::Day(day), TimeKey::Hour(ts)) => ts.date() == *day,
            (Self::Month { year, month }, TimeKey::Day(d)) => d.year() == *year && u8::from(d.month()) == *month,
            (Self::Year(year), TimeKey::Month { year: y, .. }) => y == year,
            _ => false,
        }
    }
}

impl fmt::Display for PeriodSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Day(d) => write!(f, "{d}"),
            Self::Month { year, month } => write!(f, "{year:04}-{month:02}"),
            Self::Year(year) => write!(f, "{year}"),
        }
    }
}

/// Supplies the raw rows of one period.
#[async_trait::async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch_records(&self, period: &PeriodSelector) -> Result<Vec<ConsumptionRecord>, SourceError>;
}
