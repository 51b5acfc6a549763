use axum::http::{Method, StatusCode};
use serde_json::json;

use mtx_tox_domain::services::catalog::{NEUTROPENIA, RENAL_TOXICITY};

use super::{parse, send, test_app};
use crate::entities::diagnosis::CohortResponse;
use crate::entities::ErrorResponse;

#[tokio::test]
async fn test_cohort_for_single_selection() {
    let app = test_app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/cohort",
        Some(json!({ "selected": { "Neutropenia": true, "Renal toxicity": false } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let cohort: CohortResponse = parse(&body);
    assert_eq!(cohort.selected, vec![NEUTROPENIA.to_string()]);
    assert_eq!(cohort.patients, vec!["P1".to_string()]);
    assert_eq!(cohort.counts.get(NEUTROPENIA), Some(&1));
    // P3 has no neutrophil samples and is left out of the export
    assert_eq!(cohort.phenotypes.len(), 2);
    assert_eq!(cohort.phenotype_positive, 1);
    assert_eq!(cohort.phenotype_negative, 1);
}

#[tokio::test]
async fn test_cohort_all_mode_requires_every_diagnosis() {
    let app = test_app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/cohort",
        Some(json!({ "selected": { "Neutropenia": true, "Renal toxicity": true }, "mode": "all" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let cohort: CohortResponse = parse(&body);
    assert!(cohort.patients.is_empty());
    assert_eq!(cohort.counts.get(NEUTROPENIA), Some(&1));
    assert_eq!(cohort.counts.get(RENAL_TOXICITY), Some(&0));
}

#[tokio::test]
async fn test_empty_selection_is_empty_cohort() {
    let app = test_app();

    let (status, body) = send(&app, Method::POST, "/api/v1/cohort", Some(json!({ "selected": {} }))).await;
    assert_eq!(status, StatusCode::OK);

    let cohort: CohortResponse = parse(&body);
    assert!(cohort.patients.is_empty());
    assert!(cohort.counts.is_empty());
    assert_eq!(cohort.phenotype_positive, 0);
}

#[tokio::test]
async fn test_unknown_diagnosis_in_selection() {
    let app = test_app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/cohort",
        Some(json!({ "selected": { "Gout": true } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let error: ErrorResponse = parse(&body);
    assert!(error.message.contains("Gout"));
}
