use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::analyte::{AnalyteCode, Unit};
use crate::repository::RepositoryError;

/// Opaque patient identifier
pub type PatientId = String;

/// Storage model for a single laboratory measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Patient the sample was taken from
    pub patient_id: PatientId,

    /// Analyte that was measured
    pub analyte_code: AnalyteCode,

    /// Sample collection time
    pub timestamp: DateTime<Utc>,

    /// Measured value, already in the analyte's canonical unit
    pub value: f64,

    /// Unit tag of the value
    pub unit: Unit,
}

/// Row shape handed over by the ingestion side.
///
/// Timestamps must already be parsed and values already converted to the
/// canonical unit of their analyte.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementRow {
    pub patient_id: String,
    pub analyte_code: String,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub unit: String,
}

impl TryFrom<MeasurementRow> for Measurement {
    type Error = RepositoryError;

    fn try_from(row: MeasurementRow) -> Result<Self, Self::Error> {
        let patient_id = row.patient_id.trim().to_string();
        if patient_id.is_empty() {
            return Err(RepositoryError::Validation(format!(
                "measurement of {} at {} has an empty patient id",
                row.analyte_code, row.timestamp
            )));
        }

        if !row.value.is_finite() {
            return Err(RepositoryError::Validation(format!(
                "measurement of {} for patient {} at {} has a non-finite value",
                row.analyte_code, patient_id, row.timestamp
            )));
        }

        let analyte_code = AnalyteCode::from_code(&row.analyte_code);
        let unit = Unit::parse(&row.unit);

        if let Some(canonical) = analyte_code.canonical_unit() {
            if unit != canonical {
                return Err(RepositoryError::Validation(format!(
                    "{} for patient {} is reported in '{}' but must be in '{}'",
                    analyte_code, patient_id, unit, canonical
                )));
            }
        }

        Ok(Measurement {
            patient_id,
            analyte_code,
            timestamp: row.timestamp,
            value: row.value,
            unit,
        })
    }
}

/// One point of an analyte time series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl SeriesPoint {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// All measurements of one patient grouped by analyte, each group sorted by
/// ascending timestamp.
///
/// A read-only view; the store hands out copies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientSeries {
    patient_id: PatientId,
    by_analyte: BTreeMap<AnalyteCode, Vec<SeriesPoint>>,
}

impl PatientSeries {
    /// Build a series view. Each group must already be sorted by timestamp.
    pub(crate) fn new(patient_id: PatientId, by_analyte: BTreeMap<AnalyteCode, Vec<SeriesPoint>>) -> Self {
        Self { patient_id, by_analyte }
    }

    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }

    /// Points for one analyte; empty when the patient has none
    pub fn series(&self, analyte: &AnalyteCode) -> &[SeriesPoint] {
        self.by_analyte
            .get(analyte)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Analytes with at least one measurement
    pub fn analytes(&self) -> impl Iterator<Item = &AnalyteCode> {
        self.by_analyte.keys()
    }

    /// Total number of measurements across all analytes
    pub fn measurement_count(&self) -> usize {
        self.by_analyte.values().map(Vec::len).sum()
    }
}
