pub mod handlers;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use mtx_tox_data::MeasurementStore;
use mtx_tox_domain::DiagnosisEngine;

pub use routes::create_app;

/// Engine shared by all handlers. Parameter updates take the write lock.
pub type SharedEngine = Arc<RwLock<DiagnosisEngine<MeasurementStore>>>;

/// State handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub engine: SharedEngine,
    pub environment: String,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(engine: DiagnosisEngine<MeasurementStore>, environment: impl Into<String>) -> Self {
        Self {
            engine: Arc::new(RwLock::new(engine)),
            environment: environment.into(),
            started_at: Utc::now(),
        }
    }
}

/// Create the application router
pub fn create_application(state: AppState) -> Router {
    create_app(state)
}
