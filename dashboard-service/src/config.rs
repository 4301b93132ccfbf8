use serde::Deserialize;
use std::{collections::BTreeMap, fs};

use crate::{
    engine::{ProvinceTable, SpatialLabels},
    pipeline::DashboardSettings,
};

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("province key '{0}' must be a single character")]
    InvalidProvinceKey(String),
    #[error("top_n must be at least 1")]
    EmptyRanking,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub uri: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

fn default_start_year() -> i32 {
    2021
}

fn default_top_n() -> usize {
    5
}

fn default_region_label() -> String {
    "catalonia".to_string()
}

fn default_provinces() -> BTreeMap<String, String> {
    [("0", "Barcelona"), ("1", "Girona"), ("2", "Lleida"), ("4", "Tarragona")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    /// First year the store keeps data for.
    #[serde(default = "default_start_year")]
    pub start_year: i32,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_region_label")]
    pub region_label: String,
    /// Postal-code prefix to province name.
    #[serde(default = "default_provinces")]
    pub provinces: BTreeMap<String, String>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            start_year: default_start_year(),
            top_n: default_top_n(),
            region_label: default_region_label(),
            provinces: default_provinces(),
        }
    }
}

impl DashboardConfig {
    pub fn settings(&self) -> Result<DashboardSettings, ConfigError> {
        if self.top_n == 0 {
            return Err(ConfigError::EmptyRanking);
        }

        let entries = self
            .provinces
            .iter()
            .map(|(key, name)| {
                let mut chars = key.chars();
                match (chars.next(), chars.next()) {
                    (Some(prefix), None) => Ok((prefix, name.clone())),
                    _ => Err(ConfigError::InvalidProvinceKey(key.clone())),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DashboardSettings {
            labels: SpatialLabels {
                provinces: ProvinceTable::new(entries),
                region_label: self.region_label.clone(),
            },
            start_year: self.start_year,
            top_n: self.top_n,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub http: HttpConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var("DASHBOARD_CONFIG").unwrap_or_else(|_| "dashboard-config.toml".to_string());
        let contents = fs::read_to_string(&path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        Ok(cfg)
    }
}
