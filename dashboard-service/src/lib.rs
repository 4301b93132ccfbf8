pub mod config;
pub mod engine;
pub mod metrics_server;
pub mod observability;
pub mod pipeline;
pub mod server;
pub mod sources;
pub mod transform;

pub use pipeline::{build_view, DashboardRequest, DashboardView};
