use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;

use mtx_tox_domain::DiagnosisServiceTrait;

use crate::api::AppState;

/// Health check response with dataset information
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Current service status
    pub status: String,
    /// Current application version from Cargo manifest
    pub version: String,
    /// Unix timestamp of when the response was generated
    pub timestamp: i64,
    /// Uptime of the service in seconds
    pub uptime: i64,
    /// Environment information
    pub environment: String,
    /// Dataset size
    pub dataset: DatasetStatus,
}

/// Size of the loaded dataset and of the last evaluation pass
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DatasetStatus {
    pub patients: usize,
    pub measurements: usize,
    /// Measurements sharing a timestamp with another of the same analyte
    pub duplicate_timestamps: usize,
    pub diagnoses: usize,
    pub positive_flags: usize,
}

/// Health check endpoint to verify the API is running
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "API is healthy", body = HealthResponse)
    ),
    tag = "health"
)]
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    info!("Health check requested");

    let engine = state.engine.read().await;
    let store = engine.repository();
    let now = Utc::now();

    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: now.timestamp(),
        uptime: (now - state.started_at).num_seconds(),
        environment: state.environment.clone(),
        dataset: DatasetStatus {
            patients: store.patient_count(),
            measurements: store.len(),
            duplicate_timestamps: store.duplicate_timestamps(),
            diagnoses: engine.catalog().len(),
            positive_flags: engine.flags().iter().filter(|flag| flag.positive).count(),
        },
    };

    (StatusCode::OK, Json(response))
}
