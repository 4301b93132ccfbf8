use std::{net::SocketAddr, sync::Arc, time::Instant};

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::{
    engine::{EngineError, Feature, SpaceGranularity, TimeGranularity},
    pipeline::{load_view, DashboardError, DashboardRequest, DashboardSettings, DashboardView},
    sources::{PeriodSelector, RecordSource, SourceError},
};

/// Read-only state shared by every request.
pub struct AppState {
    pub source: Arc<dyn RecordSource>,
    pub settings: DashboardSettings,
}

/// Query string of `GET /api/dashboard`.
#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub time: String,
    pub space: String,
    pub period: String,
    pub position: Option<u32>,
    pub feature: Option<String>,
    /// Comma-separated spatial keys.
    pub keys: Option<String>,
}

impl DashboardQuery {
    pub fn into_request(self) -> Result<DashboardRequest, DashboardError> {
        let time: TimeGranularity = self.time.parse()?;
        let space: SpaceGranularity = self.space.parse()?;
        let period = PeriodSelector::parse(time, &self.period)?;
        let feature = match self.feature.as_deref() {
            Some(f) => f.parse::<Feature>()?,
            None => Feature::default(),
        };
        let selected = self
            .keys
            .as_deref()
            .map(|keys| {
                keys.split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(DashboardRequest {
            period,
            space,
            position: self.position,
            feature,
            selected,
        })
    }
}

pub struct ApiError(DashboardError);

impl From<DashboardError> for ApiError {
    fn from(e: DashboardError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            DashboardError::Engine(EngineError::EmptyInput) => StatusCode::NOT_FOUND,
            DashboardError::Engine(EngineError::ShapeMismatch { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
            DashboardError::Engine(_) => StatusCode::BAD_REQUEST,
            DashboardError::Source(SourceError::Fetch(_)) => StatusCode::BAD_GATEWAY,
            DashboardError::Source(_) => StatusCode::BAD_REQUEST,
        };
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/dashboard", get(dashboard))
        .with_state(state)
}

async fn dashboard(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardView>, ApiError> {
    metrics::counter!("dashboard_requests_total").increment(1);
    let started = Instant::now();

    let request = match query.into_request() {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "rejected dashboard query");
            metrics::counter!("dashboard_request_errors_total").increment(1);
            return Err(e.into());
        }
    };
    let result = load_view(state.source.as_ref(), &request, &state.settings).await;
    metrics::histogram!("dashboard_render_seconds").record(started.elapsed().as_secs_f64());

    match result {
        Ok(view) => Ok(Json(view)),
        Err(e) => {
            match &e {
                DashboardError::Engine(EngineError::EmptyInput) => {
                    tracing::info!(period = %request.period, "no data for selected period")
                }
                other => tracing::warn!(error = %other, period = %request.period, "dashboard request failed"),
            }
            metrics::counter!("dashboard_request_errors_total").increment(1);
            Err(e.into())
        }
    }
}

/// Serve the dashboard API until the listener fails.
pub async fn serve(bind_addr: &str, state: Arc<AppState>) -> anyhow::Result<()> {
    let addr: SocketAddr = bind_addr
        .parse()
        .with_context(|| format!("invalid http.bind_addr '{bind_addr}'"))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "dashboard API listening");
    axum::serve(listener, router(state).into_make_service()).await?;
    Ok(())
}
