use axum::{
    extract::{Path, State},
    Json,
};
use tracing::{info, instrument};

use mtx_tox_domain::DiagnosisServiceTrait;

use crate::api::AppState;
use crate::entities::diagnosis::{EvidenceResponse, EvidenceSeries, FlagDto, PatientFlagsResponse};
use crate::entities::ErrorResponse;

/// All diagnosis flags of one patient
#[utoipa::path(
    get,
    path = "/api/v1/patients/{id}/flags",
    params(
        ("id" = String, Path, description = "Patient identifier")
    ),
    responses(
        (status = 200, description = "Flags in catalog order", body = PatientFlagsResponse),
        (status = 404, description = "Unknown patient", body = ErrorResponse)
    ),
    tag = "patients"
)]
#[instrument(skip(state))]
pub async fn get_patient_flags(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PatientFlagsResponse>, ErrorResponse> {
    let engine = state.engine.read().await;
    let flags = engine.flags_for(&id)?;

    info!("Returning {} flags for patient {}", flags.len(), id);
    Ok(Json(PatientFlagsResponse {
        patient_id: id,
        flags: flags.into_iter().map(FlagDto::from).collect(),
    }))
}

/// Measurements and windows behind a positive flag
#[utoipa::path(
    get,
    path = "/api/v1/patients/{id}/evidence/{diagnosis}",
    params(
        ("id" = String, Path, description = "Patient identifier"),
        ("diagnosis" = String, Path, description = "Diagnosis name")
    ),
    responses(
        (status = 200, description = "Evidence per analyte", body = EvidenceResponse),
        (status = 404, description = "Unknown patient or diagnosis, or flag not positive", body = ErrorResponse)
    ),
    tag = "patients"
)]
#[instrument(skip(state))]
pub async fn get_evidence(
    State(state): State<AppState>,
    Path((id, diagnosis)): Path<(String, String)>,
) -> Result<Json<EvidenceResponse>, ErrorResponse> {
    let engine = state.engine.read().await;
    let evidence = engine.evidence_for(&id, &diagnosis)?;

    Ok(Json(EvidenceResponse {
        patient_id: id,
        diagnosis,
        series: evidence.into_iter().map(EvidenceSeries::from).collect(),
    }))
}
