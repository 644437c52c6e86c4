pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod service;

pub use config::{AppConfig, MatchingStrategy, ReconciliationConfig};
pub use error::ReconError;
pub use service::ReconciliationEngine;
