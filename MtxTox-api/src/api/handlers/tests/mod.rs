mod cohort_test;
mod diagnoses_test;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde::de::DeserializeOwned;
use tower::ServiceExt;

use mtx_tox_data::AnalyteCode;
use mtx_tox_domain::testing::StoreFixture;
use mtx_tox_domain::{DiagnosisEngine, EngineConfig, RuleParameters};

use crate::api::{create_app, AppState};

/// P1 is neutropenic for 12 days, P2 stays in range, P3 has no neutrophil samples
pub(super) fn test_app() -> Router {
    let store = StoreFixture::new()
        .daily(
            "P1",
            AnalyteCode::Neutrophils,
            &[(0, 0.3), (5, 0.2), (11, 0.4), (12, 1.2)],
        )
        .daily("P2", AnalyteCode::Neutrophils, &[(0, 2.0), (10, 2.5)])
        .daily("P3", AnalyteCode::Creatinine, &[(0, 80.0), (3, 90.0)])
        .build();

    let engine = DiagnosisEngine::new(store, RuleParameters::default(), EngineConfig::default())
        .expect("default catalog should evaluate");
    create_app(AppState::new(engine, "test"))
}

pub(super) async fn send(app: &Router, method: Method, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, Vec<u8>) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

pub(super) fn parse<T: DeserializeOwned>(bytes: &[u8]) -> T {
    serde_json::from_slice(bytes).expect("response should be valid JSON")
}
