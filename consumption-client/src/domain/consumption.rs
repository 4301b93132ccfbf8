use std::fmt;

use time::{format_description::BorrowedFormatItem, macros::format_description, Date, PrimitiveDateTime};

/// Text form of an hourly timestamp, as stored and as rendered.
pub const HOUR_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Text form of a calendar date.
pub const DAY_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Time component of a raw consumption row.
///
/// The shape depends on which table the row came from: the hourly table is
/// keyed by timestamp, the daily aggregate by calendar date and the monthly
/// aggregate by `(year, month)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimeKey {
    Hour(PrimitiveDateTime),
    Day(Date),
    Month { year: i32, month: u8 },
}

impl TimeKey {
    pub fn year(&self) -> i32 {
        match self {
            Self::Hour(ts) => ts.year(),
            Self::Day(d) => d.year(),
            Self::Month { year, .. } => *year,
        }
    }

    pub fn month(&self) -> u8 {
        match self {
            Self::Hour(ts) => u8::from(ts.month()),
            Self::Day(d) => u8::from(d.month()),
            Self::Month { month, .. } => *month,
        }
    }

    /// Two-digit month label, e.g. `"03"`.
    pub fn month_key(&self) -> String {
        format!("{:02}", self.month())
    }
}

impl fmt::Display for TimeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = match self {
            Self::Hour(ts) => ts.format(HOUR_FORMAT),
            Self::Day(d) => d.format(DAY_FORMAT),
            Self::Month { year, month } => return write!(f, "{year:04}-{month:02}"),
        };
        match rendered {
            Ok(s) => f.write_str(&s),
            Err(_) => Err(fmt::Error),
        }
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for TimeKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A raw residential consumption row, independent of its source table.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ConsumptionRecord {
    pub time_key: TimeKey,
    pub postal_code: String,
    pub consumption: f64,
    pub contracts: i64,
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum RowError {
    #[error("invalid month '{0}'")]
    InvalidMonth(String),
}

/// Row of `residential_consumption` (hourly readings for one day).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HourlyConsumption {
    pub time: PrimitiveDateTime,
    pub postalcode: String,
    pub consumption: f64,
    pub contracts: i64,
}

/// Row of `residential_consumption_aggregated` (one row per postal code and day).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DailyConsumption {
    pub date: Date,
    pub postalcode: String,
    pub consumption: f64,
    pub contracts: i64,
}

/// Row of `residential_consumption_monthly`. The month column is stored as
/// zero-padded text.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MonthlyConsumption {
    pub year: i32,
    pub month: String,
    pub postalcode: String,
    pub consumption: f64,
    pub contracts: i64,
}

impl From<HourlyConsumption> for ConsumptionRecord {
    fn from(r: HourlyConsumption) -> Self {
        ConsumptionRecord {
            time_key: TimeKey::Hour(r.time),
            postal_code: r.postalcode,
            consumption: r.consumption,
            contracts: r.contracts,
        }
    }
}

impl From<DailyConsumption> for ConsumptionRecord {
    fn from(r: DailyConsumption) -> Self {
        ConsumptionRecord {
            time_key: TimeKey::Day(r.date),
            postal_code: r.postalcode,
            consumption: r.consumption,
            contracts: r.contracts,
        }
    }
}

/// Parse a month column value (`"3"`, `"03"`) into `1..=12`.
pub fn parse_month(s: &str) -> Result<u8, RowError> {
    s.trim()
        .parse::<u8>()
        .ok()
        .filter(|m| (1..=12).contains(m))
        .ok_or_else(|| RowError::InvalidMonth(s.to_string()))
}

impl TryFrom<MonthlyConsumption> for ConsumptionRecord {
    type Error = RowError;

    fn try_from(r: MonthlyConsumption) -> Result<Self, Self::Error> {
        let month = parse_month(&r.month)?;
        Ok(ConsumptionRecord {
            time_key: TimeKey::Month { year: r.year, month },
            postal_code: r.postalcode,
            consumption: r.consumption,
            contracts: r.contracts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn monthly_row_parses_padded_month() {
        let row = MonthlyConsumption {
            year: 2023,
            month: "03".to_string(),
            postalcode: "08031".to_string(),
            consumption: 12.5,
            contracts: 4,
        };
        let rec = ConsumptionRecord::try_from(row).unwrap();
        assert_eq!(rec.time_key, TimeKey::Month { year: 2023, month: 3 });
        assert_eq!(rec.time_key.month_key(), "03");
    }

    #[test]
    fn monthly_row_rejects_month_thirteen() {
        let row = MonthlyConsumption {
            year: 2023,
            month: "13".to_string(),
            postalcode: "08031".to_string(),
            consumption: 1.0,
            contracts: 1,
        };
        assert_eq!(
            ConsumptionRecord::try_from(row),
            Err(RowError::InvalidMonth("13".to_string()))
        );
    }

    #[test]
    fn time_keys_render_per_shape() {
        assert_eq!(
            TimeKey::Hour(datetime!(2024-02-10 23:00:00)).to_string(),
            "2024-02-10 23:00:00"
        );
        assert_eq!(TimeKey::Day(date!(2024-02-10)).to_string(), "2024-02-10");
        assert_eq!(TimeKey::Month { year: 2024, month: 2 }.to_string(), "2024-02");
    }

    #[test]
    fn rendered_hours_parse_back() {
        let key = TimeKey::Hour(datetime!(2024-02-10 07:30:15));
        let parsed = PrimitiveDateTime::parse(&key.to_string(), HOUR_FORMAT).unwrap();
        assert_eq!(TimeKey::Hour(parsed), key);
    }

    #[test]
    fn hourly_row_converts() {
        let rec: ConsumptionRecord = HourlyConsumption {
            time: datetime!(2024-02-10 07:00:00),
            postalcode: "17001".to_string(),
            consumption: 3.0,
            contracts: 2,
        }
        .into();
        assert_eq!(rec.time_key.month(), 2);
        assert_eq!(rec.postal_code, "17001");
    }
}
