use consumption_client::{db, domain::ConsumptionRecord};
use sqlx::PgPool;

use super::{PeriodSelector, RecordSource, SourceError};
use crate::transform;

/// Reads raw rows from the consumption tables, one table per granularity.
pub struct PgRecordSource {
    pool: PgPool,
}

impl PgRecordSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RecordSource for PgRecordSource {
    async fn fetch_records(&self, period: &PeriodSelector) -> Result<Vec<ConsumptionRecord>, SourceError> {
        let fetched = match *period {
            PeriodSelector::Day(day) => db::hourly_consumption(&self.pool, day).await,
            PeriodSelector::Month { year, month } => db::daily_consumption(&self.pool, year, month).await,
            PeriodSelector::Year(year) => db::monthly_consumption(&self.pool, year).await,
        };

        let records = fetched.map_err(|e| {
            tracing::error!(error = %e, %period, "consumption query failed");
            metrics::counter!("consumption_query_errors_total").increment(1);
            SourceError::Fetch(e.to_string())
        })?;

        tracing::debug!(rows = records.len(), %period, "fetched consumption records");
        Ok(transform::retain_valid(records))
    }
}
