use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::debug;

use super::AppState;
use crate::api::handlers::{cohort, diagnoses, health, patients};
use crate::openapi::configure_swagger_routes;

/// Create the application router
pub fn create_app(state: AppState) -> Router {
    debug!("Creating application router");

    let api_routes = Router::new()
        .route("/diagnoses", get(diagnoses::list_diagnoses))
        .route(
            "/parameters",
            get(diagnoses::get_parameters).put(diagnoses::update_parameters),
        )
        .route("/cohort", post(cohort::compute_cohort))
        .route("/patients/:id/flags", get(patients::get_patient_flags))
        .route("/patients/:id/evidence/:diagnosis", get(patients::get_evidence));

    debug!("API routes configured");

    let app = Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/v1", api_routes)
        .with_state(state);

    // Configure the Swagger UI
    let app = app.merge(configure_swagger_routes());
    debug!("Swagger UI merged");

    app.layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive())
}
