use consumption_client::domain::TimeKey;
use serde::Serialize;
use time::Month;

use super::{granularity::TimeGranularity, AggregatedRecord, EngineError};

type Matcher = fn(&TimeKey, u32) -> bool;

/// Slider behaviour for one time granularity.
struct SliderSpec {
    time: TimeGranularity,
    label: &'static str,
    min: u32,
    /// Upper bound for every period; monthly sliders narrow it per month.
    max: u32,
    bounded_by_month_length: bool,
    matches: Matcher,
}

fn month_of_year(key: &TimeKey, position: u32) -> bool {
    matches!(key, TimeKey::Month { .. }) && key.month_key() == format!("{position:02}")
}

fn day_of_month(key: &TimeKey, position: u32) -> bool {
    matches!(key, TimeKey::Day(d) if u32::from(d.day()) == position)
}

fn hour_of_day(key: &TimeKey, position: u32) -> bool {
    matches!(key, TimeKey::Hour(ts) if u32::from(ts.hour()) == position)
}

static SLIDERS: [SliderSpec; 3] = [
    SliderSpec {
        time: TimeGranularity::Annual,
        label: "Time in months",
        min: 1,
        max: 12,
        bounded_by_month_length: false,
        matches: month_of_year,
    },
    SliderSpec {
        time: TimeGranularity::Monthly,
        label: "Time in days",
        min: 1,
        max: 31,
        bounded_by_month_length: true,
        matches: day_of_month,
    },
    SliderSpec {
        time: TimeGranularity::Daily,
        label: "Time in hours",
        min: 0,
        max: 23,
        bounded_by_month_length: false,
        matches: hour_of_day,
    },
];

fn spec_for(time: TimeGranularity) -> Result<&'static SliderSpec, EngineError> {
    SLIDERS
        .iter()
        .find(|s| s.time == time)
        .ok_or_else(|| EngineError::UnknownGranularity(time.to_string()))
}

fn days_in_month(year: i32, month: u8) -> Option<u32> {
    let month = Month::try_from(month).ok()?;
    Some(u32::from(time::util::days_in_year_month(year, month)))
}

/// Inclusive slider bounds and the label shown next to the control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SliderRange {
    pub label: &'static str,
    pub min: u32,
    pub max: u32,
}

impl SliderRange {
    pub fn check(&self, position: u32) -> Result<u32, EngineError> {
        if (self.min..=self.max).contains(&position) {
            Ok(position)
        } else {
            Err(EngineError::SliderOutOfRange {
                position,
                min: self.min,
                max: self.max,
            })
        }
    }
}

/// Slider bounds for `time`. The monthly bound is the length of the month
/// `first` falls in, i.e. the first record of the period.
pub fn slider_range(time: TimeGranularity, first: &TimeKey) -> Result<SliderRange, EngineError> {
    let spec = spec_for(time)?;
    let max = if spec.bounded_by_month_length {
        days_in_month(first.year(), first.month()).ok_or_else(|| EngineError::ShapeMismatch {
            expected: time,
            found: first.to_string(),
        })?
    } else {
        spec.max
    };
    Ok(SliderRange {
        label: spec.label,
        min: spec.min,
        max,
    })
}

/// Predicate selecting the aggregated rows of one slider sub-period.
#[derive(Clone, Copy)]
pub struct SliderFilter {
    time: TimeGranularity,
    position: u32,
    matches: Matcher,
}

impl SliderFilter {
    pub fn time(&self) -> TimeGranularity {
        self.time
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn matches(&self, record: &AggregatedRecord) -> bool {
        (self.matches)(&record.bucket, self.position)
    }

    /// Map snapshot: every row of the selected sub-period.
    pub fn select<'a>(&self, records: &'a [AggregatedRecord]) -> Vec<&'a AggregatedRecord> {
        records.iter().filter(|r| self.matches(r)).collect()
    }

    /// Detail table: rows of the sub-period restricted to `keys`.
    pub fn select_within<'a>(&self, records: &'a [AggregatedRecord], keys: &[String]) -> Vec<&'a AggregatedRecord> {
        records
            .iter()
            .filter(|r| self.matches(r) && keys.iter().any(|k| *k == r.spatial_key))
            .collect()
    }
}

impl std::fmt::Debug for SliderFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SliderFilter")
            .field("time", &self.time)
            .field("position", &self.position)
            .finish()
    }
}

/// Build the slider predicate for `time` at `position`.
///
/// `position` is checked against the widest range of the granularity; the
/// per-month day bound comes from [`slider_range`].
pub fn filter_predicate(time: TimeGranularity, position: u32) -> Result<SliderFilter, EngineError> {
    let spec = spec_for(time)?;
    SliderRange {
        label: spec.label,
        min: spec.min,
        max: spec.max,
    }
    .check(position)?;

    Ok(SliderFilter {
        time,
        position,
        matches: spec.matches,
    })
}
