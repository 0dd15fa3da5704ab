//! hatecheck Server
//!
//! HTTP surface for the classification gateway: `/predict`, `/batch_predict`,
//! service metadata, health and Prometheus metrics.

pub mod cli;
pub mod config;
pub mod cors;
pub mod routes;
pub mod state;

pub use cli::Cli;
pub use config::{CorsConfig, ServerConfig, ServiceInfo};
pub use routes::create_router;
pub use state::AppState;
