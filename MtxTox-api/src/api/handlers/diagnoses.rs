use axum::{extract::State, Json};
use tracing::{error, info, instrument, warn};

use mtx_tox_domain::{DiagnosisServiceTrait, RuleParameters};

use crate::api::AppState;
use crate::entities::diagnosis::DiagnosisEntry;
use crate::entities::ErrorResponse;

/// List the diagnosis catalog in configuration order
#[utoipa::path(
    get,
    path = "/api/v1/diagnoses",
    responses(
        (status = 200, description = "Diagnosis catalog", body = [DiagnosisEntry])
    ),
    tag = "diagnoses"
)]
#[instrument(skip(state))]
pub async fn list_diagnoses(State(state): State<AppState>) -> Json<Vec<DiagnosisEntry>> {
    let engine = state.engine.read().await;
    let entries: Vec<DiagnosisEntry> = engine.diagnoses().into_iter().map(DiagnosisEntry::from).collect();

    info!("Listing {} diagnoses", entries.len());
    Json(entries)
}

/// Current rule parameters
#[utoipa::path(
    get,
    path = "/api/v1/parameters",
    responses(
        (status = 200, description = "Current rule parameters", body = RuleParameters),
        (status = 404, description = "Catalog was not built from parameters", body = ErrorResponse)
    ),
    tag = "diagnoses"
)]
#[instrument(skip(state))]
pub async fn get_parameters(State(state): State<AppState>) -> Result<Json<RuleParameters>, ErrorResponse> {
    let engine = state.engine.read().await;
    engine
        .parameters()
        .cloned()
        .map(Json)
        .ok_or_else(|| ErrorResponse::not_found("rule parameters"))
}

/// Replace the rule parameters and re-evaluate every patient
#[utoipa::path(
    put,
    path = "/api/v1/parameters",
    request_body = RuleParameters,
    responses(
        (status = 200, description = "Parameters applied", body = RuleParameters),
        (status = 400, description = "Parameter out of range", body = ErrorResponse)
    ),
    tag = "diagnoses"
)]
#[instrument(skip(state, parameters))]
pub async fn update_parameters(
    State(state): State<AppState>,
    Json(parameters): Json<RuleParameters>,
) -> Result<Json<RuleParameters>, ErrorResponse> {
    // Evaluation is CPU bound; readers keep being served until the swap
    let shared = state.engine.clone();
    let rebuilt = tokio::task::spawn_blocking(move || {
        let engine = shared.blocking_read();
        engine.rebuild(parameters)
    })
    .await
    .map_err(|e| {
        error!("Parameter rebuild task failed: {}", e);
        ErrorResponse::internal_error()
    })?;

    let update = rebuilt.map_err(|err| {
        warn!("Rejected rule parameters: {}", err);
        ErrorResponse::from(err)
    })?;
    let applied = update.parameters().clone();

    let mut engine = state.engine.write().await;
    engine.install(update);

    info!("Rule parameters updated, {} flags re-evaluated", engine.flags().iter().count());
    Ok(Json(applied))
}
