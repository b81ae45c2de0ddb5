pub mod chart;
pub mod config;
pub mod demo;
pub mod error;
pub mod metrics;
pub mod observability;
pub mod orchestrator;
pub mod series;
pub mod zone;

pub use error::ChartError;
pub use orchestrator::{generate_all, generate_category, CategoryOutcome, RunReport};
pub use series::{build_series, DeviceSeries, SeriesPoint, TimeZones};
