use axum::{extract::State, Json};
use tracing::{info, instrument};

use mtx_tox_domain::DiagnosisServiceTrait;

use crate::api::AppState;
use crate::entities::diagnosis::{CohortRequest, CohortResponse};
use crate::entities::ErrorResponse;

/// Qualifying patients, per-diagnosis counts and phenotypes for a selection
#[utoipa::path(
    post,
    path = "/api/v1/cohort",
    request_body = CohortRequest,
    responses(
        (status = 200, description = "Cohort for the selection", body = CohortResponse),
        (status = 400, description = "Unknown diagnosis in selection", body = ErrorResponse)
    ),
    tag = "cohort"
)]
#[instrument(skip(state))]
pub async fn compute_cohort(
    State(state): State<AppState>,
    Json(request): Json<CohortRequest>,
) -> Result<Json<CohortResponse>, ErrorResponse> {
    let engine = state.engine.read().await;
    let summary = engine.summarize(&request.selected, request.mode)?;

    info!(
        "Cohort of {} patients for {} selected diagnoses",
        summary.patients.len(),
        summary.selected.len()
    );
    Ok(Json(CohortResponse::from(summary)))
}
