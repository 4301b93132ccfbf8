use anyhow::{bail, Result};
use dashboard_service::{
    config::{AppConfig, DashboardConfig},
    engine::{Feature, SpaceGranularity, TimeGranularity},
    observability,
    pipeline::{load_view, DashboardRequest},
    sources::{ConsumptionCsvFileSource, PeriodSelector},
};
use std::env;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 5 {
        bail!("usage: render_snapshot <csv_file_path> <daily|monthly|annual> <postal_code|province|region> <period> [position] [feature]");
    }

    let time: TimeGranularity = args[2].parse()?;
    let space: SpaceGranularity = args[3].parse()?;
    let period = PeriodSelector::parse(time, &args[4])?;
    let position = args.get(5).map(|p| p.parse::<u32>()).transpose()?;
    let feature = match args.get(6) {
        Some(f) => f.parse::<Feature>()?,
        None => Feature::default(),
    };

    // The province table and ranking size come from the usual config file
    // when one is present (DASHBOARD_CONFIG), otherwise from the defaults.
    let dashboard = match AppConfig::load() {
        Ok(cfg) => cfg.dashboard,
        Err(e) => {
            tracing::info!(error = %e, "no dashboard config loaded, using defaults");
            DashboardConfig::default()
        }
    };
    let settings = dashboard.settings()?;

    let source = ConsumptionCsvFileSource::new(&args[1]);
    let request = DashboardRequest {
        period,
        space,
        position,
        feature,
        selected: Vec::new(),
    };

    let view = load_view(&source, &request, &settings).await?;
    println!("{}", serde_json::to_string_pretty(&view)?);

    Ok(())
}
