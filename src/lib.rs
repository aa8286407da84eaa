pub mod analyzer;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod llm;
pub mod model;
pub mod schema;
pub mod service;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use service::AnalysisService;

/// Application state that will be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AnalysisService>,
    pub request_timeout: Duration,
}
