use std::{fs::File, path::PathBuf};

use consumption_client::domain::{parse_month, ConsumptionRecord, TimeKey, DAY_FORMAT, HOUR_FORMAT};
use csv::StringRecord;
use time::{macros::format_description, Date, PrimitiveDateTime};

use super::{PeriodSelector, RecordSource, SourceError};
use crate::transform;

/// CSV export of one of the consumption tables.
///
/// Expected header columns (by name):
/// - postalcode
/// - consumption
/// - contracts
/// - and the time columns of the exported table: `time`
///   (`YYYY-MM-DD HH:MM:SS`) for hourly rows, `date` (`YYYY-MM-DD`) for daily
///   rows, or `year` + `month` for monthly rows.
pub struct ConsumptionCsvFileSource {
    path: PathBuf,
}

impl ConsumptionCsvFileSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Read and validate every row of the file.
    pub fn read_records(&self) -> Result<Vec<ConsumptionRecord>, SourceError> {
        let file = File::open(&self.path)
            .map_err(|e| SourceError::Fetch(format!("failed to open CSV file: {e}")))?;
        let mut rdr = csv::Reader::from_reader(file);
        let headers = rdr
            .headers()
            .map_err(|e| SourceError::Fetch(format!("failed to read CSV headers: {e}")))?
            .clone();

        let mut records = Vec::new();
        for result in rdr.records() {
            let row = result.map_err(|e| SourceError::Fetch(format!("failed to read CSV record: {e}")))?;
            match record_to_consumption(&row, &headers) {
                Ok(r) => records.push(r),
                Err(e) => {
                    metrics::counter!("consumption_csv_parse_errors_total").increment(1);
                    return Err(e);
                }
            }
        }

        Ok(transform::retain_valid(records))
    }
}

fn parse_hour(s: &str) -> Option<PrimitiveDateTime> {
    PrimitiveDateTime::parse(s, HOUR_FORMAT)
        .or_else(|_| PrimitiveDateTime::parse(s, format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]")))
        .ok()
}

fn record_to_consumption(record: &StringRecord, headers: &StringRecord) -> Result<ConsumptionRecord, SourceError> {
    let get = |name: &str| -> Result<&str, SourceError> {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .and_then(|idx| record.get(idx))
            .map(str::trim)
            .ok_or_else(|| SourceError::Fetch(format!("missing column '{name}' in CSV record")))
    };

    let time_key = if let Ok(ts) = get("time") {
        TimeKey::Hour(parse_hour(ts).ok_or_else(|| SourceError::Fetch(format!("invalid time '{ts}'")))?)
    } else if let Ok(date) = get("date") {
        let d = Date::parse(date, DAY_FORMAT)
            .map_err(|e| SourceError::Fetch(format!("invalid date '{date}': {e}")))?;
        TimeKey::Day(d)
    } else {
        let year_str = get("year")?;
        let year: i32 = year_str
            .parse()
            .map_err(|e| SourceError::Fetch(format!("invalid year '{year_str}': {e}")))?;
        let month = parse_month(get("month")?).map_err(|e| SourceError::Fetch(e.to_string()))?;
        TimeKey::Month { year, month }
    };

    let postal_code = get("postalcode")?.to_string();

    let consumption_str = get("consumption")?;
    let consumption: f64 = consumption_str
        .parse()
        .map_err(|e| SourceError::Fetch(format!("invalid consumption '{consumption_str}': {e}")))?;

    let contracts_str = get("contracts")?;
    let contracts: i64 = contracts_str
        .parse()
        .map_err(|e| SourceError::Fetch(format!("invalid contracts '{contracts_str}': {e}")))?;

    Ok(ConsumptionRecord {
        time_key,
        postal_code,
        consumption,
        contracts,
    })
}

#[async_trait::async_trait]
impl RecordSource for ConsumptionCsvFileSource {
    async fn fetch_records(&self, period: &PeriodSelector) -> Result<Vec<ConsumptionRecord>, SourceError> {
        // Blocking read on the calling task.
        let records: Vec<ConsumptionRecord> = self
            .read_records()?
            .into_iter()
            .filter(|r| period.contains(&r.time_key))
            .collect();
        tracing::debug!(rows = records.len(), %period, path = %self.path.display(), "read consumption export");
        Ok(records)
    }
}
