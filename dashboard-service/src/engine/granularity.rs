use std::{collections::BTreeMap, fmt, str::FromStr};

use consumption_client::domain::TimeKey;
use serde::Serialize;

use super::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeGranularity {
    Daily,
    Monthly,
    Annual,
}

impl TimeGranularity {
    pub const ALL: [TimeGranularity; 3] = [Self::Daily, Self::Monthly, Self::Annual];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Monthly => "monthly",
            Self::Annual => "annual",
        }
    }

    /// Name of the chart's x axis.
    pub fn x_axis(&self) -> &'static str {
        match self {
            Self::Daily => "time",
            Self::Monthly => "date",
            Self::Annual => "month",
        }
    }

    /// Cadence of one bucket, as shown in the chart title.
    pub fn cadence(&self) -> &'static str {
        match self {
            Self::Daily => "hourly",
            Self::Monthly => "daily",
            Self::Annual => "monthly",
        }
    }
}

impl fmt::Display for TimeGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeGranularity {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "monthly" => Ok(Self::Monthly),
            "annual" => Ok(Self::Annual),
            _ => Err(EngineError::UnknownGranularity(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpaceGranularity {
    PostalCode,
    Province,
    Region,
}

impl SpaceGranularity {
    pub const ALL: [SpaceGranularity; 3] = [Self::PostalCode, Self::Province, Self::Region];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PostalCode => "postal_code",
            Self::Province => "province",
            Self::Region => "region",
        }
    }
}

impl fmt::Display for SpaceGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpaceGranularity {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postal_code" | "postalcode" | "postal codes" => Ok(Self::PostalCode),
            "province" | "provinces" => Ok(Self::Province),
            "region" => Ok(Self::Region),
            _ => Err(EngineError::UnknownGranularity(s.to_string())),
        }
    }
}

/// Postal-code prefix to province name.
///
/// Only the prefixes present in the table are recognised; rows whose code
/// starts with anything else have no province.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvinceTable {
    names: BTreeMap<char, String>,
}

impl ProvinceTable {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (char, S)>,
        S: Into<String>,
    {
        Self {
            names: entries.into_iter().map(|(k, v)| (k, v.into())).collect(),
        }
    }

    pub fn province_of(&self, postal_code: &str) -> Option<&str> {
        let prefix = postal_code.chars().next()?;
        self.names.get(&prefix).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.values().map(String::as_str)
    }
}

impl Default for ProvinceTable {
    fn default() -> Self {
        Self::new([('0', "Barcelona"), ('1', "Girona"), ('2', "Lleida"), ('4', "Tarragona")])
    }
}

/// Labels the space-key extractors resolve postal codes into.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialLabels {
    pub provinces: ProvinceTable,
    pub region_label: String,
}

impl Default for SpatialLabels {
    fn default() -> Self {
        Self {
            provinces: ProvinceTable::default(),
            region_label: "catalonia".to_string(),
        }
    }
}

pub type TimeKeyFn = fn(&TimeKey) -> Option<TimeKey>;
pub type SpaceKeyFn = fn(&str, &SpatialLabels) -> Option<String>;

/// Key extractors for one (time, space) granularity pair.
pub struct Strategy {
    pub time: TimeGranularity,
    pub space: SpaceGranularity,
    pub time_key: TimeKeyFn,
    pub space_key: SpaceKeyFn,
}

fn hour_bucket(key: &TimeKey) -> Option<TimeKey> {
    matches!(key, TimeKey::Hour(_)).then_some(*key)
}

fn day_bucket(key: &TimeKey) -> Option<TimeKey> {
    matches!(key, TimeKey::Day(_)).then_some(*key)
}

fn month_bucket(key: &TimeKey) -> Option<TimeKey> {
    matches!(key, TimeKey::Month { .. }).then_some(*key)
}

fn postal_code_key(postal_code: &str, _: &SpatialLabels) -> Option<String> {
    Some(postal_code.to_string())
}

fn province_key(postal_code: &str, labels: &SpatialLabels) -> Option<String> {
    labels.provinces.province_of(postal_code).map(str::to_string)
}

fn region_key(_: &str, labels: &SpatialLabels) -> Option<String> {
    Some(labels.region_label.clone())
}

macro_rules! strategy {
    ($time:ident, $space:ident, $tk:ident, $sk:ident) => {
        Strategy {
            time: TimeGranularity::$time,
            space: SpaceGranularity::$space,
            time_key: $tk,
            space_key: $sk,
        }
    };
}

static STRATEGIES: [Strategy; 9] = [
    strategy!(Daily, PostalCode, hour_bucket, postal_code_key),
    strategy!(Daily, Province, hour_bucket, province_key),
    strategy!(Daily, Region, hour_bucket, region_key),
    strategy!(Monthly, PostalCode, day_bucket, postal_code_key),
    strategy!(Monthly, Province, day_bucket, province_key),
    strategy!(Monthly, Region, day_bucket, region_key),
    strategy!(Annual, PostalCode, month_bucket, postal_code_key),
    strategy!(Annual, Province, month_bucket, province_key),
    strategy!(Annual, Region, month_bucket, region_key),
];

pub fn strategies() -> &'static [Strategy] {
    &STRATEGIES
}

pub fn strategy(time: TimeGranularity, space: SpaceGranularity) -> Result<&'static Strategy, EngineError> {
    STRATEGIES
        .iter()
        .find(|s| s.time == time && s.space == space)
        .ok_or_else(|| EngineError::UnknownGranularity(format!("{time}/{space}")))
}
