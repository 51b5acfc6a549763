use chrono::{DateTime, Duration, TimeZone, Utc};
use mtx_tox_data::{AnalyteCode, Measurement, MeasurementStore};
use mtx_tox_domain::{
    entities::EvidenceWindow,
    services::catalog::{
        NEUTROPENIA, NEUTROPENIA_WITH_INFECTION, PANCREATITIS, SEVERE_INFECTION, THROMBOCYTOPENIA,
    },
    CombinationMode, DiagnosisEngine, DiagnosisServiceTrait, EngineConfig, RuleParameters, Selection,
};
use std::sync::Once;

// Initialize tracing once for all tests
static INIT: Once = Once::new();

fn initialize() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .try_init();
    });
}

fn origin() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2022, 9, 12, 7, 30, 0).unwrap()
}

fn measurement(patient_id: &str, analyte: AnalyteCode, offset: Duration, value: f64) -> Measurement {
    Measurement {
        patient_id: patient_id.to_string(),
        unit: analyte.canonical_unit().unwrap(),
        analyte_code: analyte,
        timestamp: origin() + offset,
        value,
    }
}

fn by_day(patient_id: &str, analyte: AnalyteCode, values: &[(i64, f64)]) -> Vec<Measurement> {
    values
        .iter()
        .map(|(d, v)| measurement(patient_id, analyte.clone(), Duration::days(*d), *v))
        .collect()
}

fn by_hour(patient_id: &str, analyte: AnalyteCode, values: &[(i64, f64)]) -> Vec<Measurement> {
    values
        .iter()
        .map(|(h, v)| measurement(patient_id, analyte.clone(), Duration::hours(*h), *v))
        .collect()
}

fn engine(measurements: Vec<Measurement>) -> DiagnosisEngine<MeasurementStore> {
    initialize();
    let store = MeasurementStore::from_measurements(measurements);
    DiagnosisEngine::new(store, RuleParameters::default(), EngineConfig::default())
        .expect("default catalog should evaluate")
}

fn selection(names: &[&str]) -> Selection {
    names.iter().map(|name| (name.to_string(), true)).collect()
}

#[test]
fn test_neutropenia_run_extends_to_next_observation() {
    let engine = engine(by_day(
        "A",
        AnalyteCode::Neutrophils,
        &[(0, 0.3), (5, 0.3), (11, 0.2), (20, 0.6)],
    ));

    let flag = engine.flags().get("A", NEUTROPENIA).unwrap();
    assert!(flag.positive);
    assert_eq!(
        flag.windows,
        vec![EvidenceWindow::new(origin(), origin() + Duration::days(20))]
    );
}

#[test]
fn test_severe_infection_instant_bound() {
    let engine = engine(by_day("B", AnalyteCode::CReactiveProtein, &[(0, 150.0), (1, 150.0)]));

    let flag = engine.flags().get("B", SEVERE_INFECTION).unwrap();
    assert!(flag.positive);
    assert_eq!(flag.windows[0].start, origin());
}

#[test]
fn test_thrombocytopenia_confirmed_and_pending() {
    let confirmed = engine(by_hour("C", AnalyteCode::Platelets, &[(0, 8.0), (40, 9.0), (90, 8.0)]));
    assert!(confirmed.flags().is_positive("C", THROMBOCYTOPENIA));

    let pending = engine(by_hour("C", AnalyteCode::Platelets, &[(0, 8.0), (40, 9.0), (60, 8.0)]));
    let flag = pending.flags().get("C", THROMBOCYTOPENIA).unwrap();
    assert!(!flag.positive);
    assert!(flag.pending);
}

#[test]
fn test_combination_all_mode() {
    let mut measurements = by_day("P", AnalyteCode::Neutrophils, &[(0, 0.2), (14, 1.2)]);
    measurements.extend(by_day("P", AnalyteCode::CReactiveProtein, &[(3, 180.0)]));
    measurements.extend(by_day("Q", AnalyteCode::Neutrophils, &[(0, 0.2), (14, 1.2)]));
    measurements.extend(by_day("Q", AnalyteCode::CReactiveProtein, &[(3, 20.0)]));
    let engine = engine(measurements);

    let selected = selection(&[NEUTROPENIA, SEVERE_INFECTION]);
    let all = engine.qualifying_patients(&selected, CombinationMode::All).unwrap();
    assert!(all.contains("P"));
    assert!(!all.contains("Q"));

    let any = engine.qualifying_patients(&selected, CombinationMode::Any).unwrap();
    assert_eq!(any.len(), 2);

    let counts = engine.counts(&selected).unwrap();
    assert_eq!(counts[NEUTROPENIA], 2);
    assert_eq!(counts[SEVERE_INFECTION], 1);

    let derived = engine
        .qualifying_patients(&selection(&[NEUTROPENIA_WITH_INFECTION]), CombinationMode::Any)
        .unwrap();
    assert_eq!(derived, all);
}

#[test]
fn test_pancreatitis_evidence_lists_contributing_analytes() {
    let mut measurements = by_hour("E", AnalyteCode::Amylase, &[(0, 100.0), (6, 420.0), (30, 150.0)]);
    measurements.extend(by_hour("E", AnalyteCode::CReactiveProtein, &[(6, 130.0), (30, 60.0)]));
    let engine = engine(measurements);

    assert!(engine.flags().is_positive("E", PANCREATITIS));

    let evidence = engine.evidence_for("E", PANCREATITIS).unwrap();
    let analytes: Vec<AnalyteCode> = evidence.iter().map(|e| e.analyte.clone()).collect();
    assert_eq!(analytes, vec![AnalyteCode::CReactiveProtein, AnalyteCode::Amylase]);
    assert!(evidence.iter().all(|e| !e.windows.is_empty()));
}

#[test]
fn test_lowering_multiplier_widens_pancreatitis_cohort() {
    let mut measurements = by_hour("F", AnalyteCode::Lipase, &[(0, 400.0)]);
    measurements.extend(by_hour("F", AnalyteCode::CReactiveProtein, &[(0, 120.0)]));
    let mut engine = engine(measurements);
    assert!(!engine.flags().is_positive("F", PANCREATITIS));

    let mut params = RuleParameters::default();
    params.pancreatitis.lipase_multiplier = Some(2.0);
    engine.with_parameters(params).unwrap();
    assert!(engine.flags().is_positive("F", PANCREATITIS));
}
