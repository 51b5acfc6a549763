use axum::http::{Method, StatusCode};
use serde_json::json;

use mtx_tox_domain::services::catalog::{NEUTROPENIA, NEUTROPENIA_WITH_INFECTION, PANCREATITIS};
use mtx_tox_domain::RuleParameters;

use super::{parse, send, test_app};
use crate::entities::diagnosis::{DiagnosisEntry, PatientFlagsResponse};
use crate::entities::ErrorResponse;

#[tokio::test]
async fn test_list_diagnoses_in_catalog_order() {
    let app = test_app();

    let (status, body) = send(&app, Method::GET, "/api/v1/diagnoses", None).await;
    assert_eq!(status, StatusCode::OK);

    let entries: Vec<DiagnosisEntry> = parse(&body);
    assert_eq!(entries.len(), 7);
    assert_eq!(entries[0].name, NEUTROPENIA);
    assert_eq!(entries[0].analytes, vec!["NPU02902".to_string()]);
    assert_eq!(entries[6].name, PANCREATITIS);

    let derived = entries
        .iter()
        .find(|entry| entry.name == NEUTROPENIA_WITH_INFECTION)
        .expect("derived diagnosis should be listed");
    assert!(derived.derived);
    assert_eq!(derived.derived_from.len(), 2);
}

#[tokio::test]
async fn test_get_parameters_returns_defaults() {
    let app = test_app();

    let (status, body) = send(&app, Method::GET, "/api/v1/parameters", None).await;
    assert_eq!(status, StatusCode::OK);

    let parameters: RuleParameters = parse(&body);
    assert_eq!(parameters, RuleParameters::default());
}

#[tokio::test]
async fn test_update_parameters_reevaluates_flags() {
    let app = test_app();

    let mut parameters = RuleParameters::default();
    parameters.neutropenia.min_days = 15;

    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/v1/parameters",
        Some(serde_json::to_value(&parameters).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The 12 day run no longer qualifies
    let (status, body) = send(&app, Method::GET, "/api/v1/patients/P1/flags", None).await;
    assert_eq!(status, StatusCode::OK);
    let flags: PatientFlagsResponse = parse(&body);
    let neutropenia = flags
        .flags
        .iter()
        .find(|flag| flag.diagnosis == NEUTROPENIA)
        .unwrap();
    assert!(!neutropenia.positive);

    let (_, body) = send(&app, Method::GET, "/api/v1/parameters", None).await;
    let current: RuleParameters = parse(&body);
    assert_eq!(current.neutropenia.min_days, 15);
}

#[tokio::test]
async fn test_out_of_range_parameters_are_rejected() {
    let app = test_app();

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/v1/parameters",
        Some(json!({ "neutropenia": { "concentration_bound": 0.5, "min_days": 40 } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let error: ErrorResponse = parse(&body);
    assert_eq!(error.error, "validation_error");
    assert!(error.message.contains("min_days"));

    // Previous parameters stay in force
    let (_, body) = send(&app, Method::GET, "/api/v1/parameters", None).await;
    let current: RuleParameters = parse(&body);
    assert_eq!(current, RuleParameters::default());
}
