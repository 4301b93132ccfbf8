pub mod consumption_queries;

pub use consumption_queries::{daily_consumption, hourly_consumption, monthly_consumption};
