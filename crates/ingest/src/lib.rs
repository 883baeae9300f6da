mod config;
mod error;
mod routes;
mod runner;
mod service;

pub use config::IngestConfig;
pub use error::{GatewayError, ServiceError};
pub use routes::{AppState, router};
pub use runner::{JobRequest, JobRunner, ProcessRunner, RunnerError};
pub use service::{DispatchSummary, IngestService};
