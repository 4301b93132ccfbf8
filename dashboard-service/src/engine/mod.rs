//! Granularity-aggregation engine.
//!
//! Everything in here is pure and synchronous: raw rows go in, derived
//! per-contract metrics are attached, rows are grouped per
//! (spatial key, time bucket), and the result is filtered by slider position
//! or ranked per spatial unit. Nothing is cached between calls.

pub mod aggregate;
pub mod derive;
pub mod granularity;
pub mod rank;
pub mod slider;

use consumption_client::domain::{ConsumptionRecord, TimeKey};
use serde::Serialize;

pub use aggregate::aggregate;
pub use derive::{consumption_per_contract, derive_metrics};
pub use granularity::{ProvinceTable, SpaceGranularity, SpatialLabels, TimeGranularity};
pub use rank::{rank, RankedRecord};
pub use slider::{filter_predicate, slider_range, SliderFilter, SliderRange};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("no data available")]
    EmptyInput,
    #[error("unknown granularity '{0}'")]
    UnknownGranularity(String),
    #[error("unknown feature '{0}'")]
    UnknownFeature(String),
    #[error("time key {found} does not fit {expected} granularity")]
    ShapeMismatch {
        expected: TimeGranularity,
        found: String,
    },
    #[error("slider position {position} outside {min}..={max}")]
    SliderOutOfRange { position: u32, min: u32, max: u32 },
}

/// A raw row with its consumption-per-contract ratio attached.
///
/// `consumption_per_contract` is `None` when the row has no contracts.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedRecord {
    pub raw: ConsumptionRecord,
    pub consumption_per_contract: Option<f64>,
}

/// One row per (spatial key, time bucket); every metric is a group mean.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedRecord {
    pub spatial_key: String,
    pub bucket: TimeKey,
    pub consumption: f64,
    pub contracts: f64,
    pub consumption_per_contract: Option<f64>,
}

/// Metric shown on the map and the chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Feature {
    #[serde(rename = "consumption")]
    Consumption,
    #[serde(rename = "contracts")]
    Contracts,
    #[serde(rename = "consumption/contracts")]
    ConsumptionPerContract,
}

impl Feature {
    pub fn value(&self, record: &AggregatedRecord) -> Option<f64> {
        match self {
            Self::Consumption => Some(record.consumption),
            Self::Contracts => Some(record.contracts),
            Self::ConsumptionPerContract => record.consumption_per_contract,
        }
    }
}

impl Default for Feature {
    fn default() -> Self {
        Self::Consumption
    }
}

impl std::str::FromStr for Feature {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "consumption" => Ok(Self::Consumption),
            "contracts" => Ok(Self::Contracts),
            "consumption/contracts" | "consumption_per_contract" => Ok(Self::ConsumptionPerContract),
            other => Err(EngineError::UnknownFeature(other.to_string())),
        }
    }
}
