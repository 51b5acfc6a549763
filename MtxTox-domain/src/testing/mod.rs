// Testing utilities for the domain layer and dependent crates
// Only available in tests or with the "mock" feature

use chrono::{DateTime, Duration, TimeZone, Utc};

use mtx_tox_data::{AnalyteCode, Measurement, MeasurementStore, Unit};

/// Fixed origin for scenario timelines
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 5, 1, 8, 0, 0).unwrap()
}

/// `n` days after `base_time()`
pub fn day(n: i64) -> DateTime<Utc> {
    base_time() + Duration::days(n)
}

/// `n` hours after `base_time()`
pub fn hour(n: i64) -> DateTime<Utc> {
    base_time() + Duration::hours(n)
}

/// Builds a `MeasurementStore` from scenario-style offsets
#[derive(Debug, Default, Clone)]
pub struct StoreFixture {
    measurements: Vec<Measurement>,
}

impl StoreFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// One measurement at an absolute time
    pub fn at(mut self, patient_id: &str, analyte: AnalyteCode, timestamp: DateTime<Utc>, value: f64) -> Self {
        let unit = analyte
            .canonical_unit()
            .unwrap_or_else(|| Unit::Other("1".to_string()));
        self.measurements.push(Measurement {
            patient_id: patient_id.to_string(),
            analyte_code: analyte,
            timestamp,
            value,
            unit,
        });
        self
    }

    /// Measurements at (day offset, value)
    pub fn daily(self, patient_id: &str, analyte: AnalyteCode, values: &[(i64, f64)]) -> Self {
        values
            .iter()
            .fold(self, |fixture, (d, v)| fixture.at(patient_id, analyte.clone(), day(*d), *v))
    }

    /// Measurements at (hour offset, value)
    pub fn hourly(self, patient_id: &str, analyte: AnalyteCode, values: &[(i64, f64)]) -> Self {
        values
            .iter()
            .fold(self, |fixture, (h, v)| fixture.at(patient_id, analyte.clone(), hour(*h), *v))
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    pub fn build(self) -> MeasurementStore {
        MeasurementStore::from_measurements(self.measurements)
    }
}
