use std::sync::Arc;

use anyhow::Result;
use dashboard_service::{
    config::AppConfig,
    metrics_server,
    observability,
    server::{self, AppState},
    sources::PgRecordSource,
};
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    // Load configuration
    let cfg = AppConfig::load()?;
    let settings = cfg.dashboard.settings()?;

    // Start metrics server if configured
    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    // One pool for the whole session; every request reads through it.
    let pool = PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .connect(&cfg.database.uri)
        .await?;

    tracing::info!(
        start_year = settings.start_year,
        top_n = settings.top_n,
        region = %settings.labels.region_label,
        "dashboard settings loaded"
    );

    let state = Arc::new(AppState {
        source: Arc::new(PgRecordSource::new(pool)),
        settings,
    });

    server::serve(&cfg.http.bind_addr, state).await
}
