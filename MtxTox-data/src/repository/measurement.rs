use std::collections::BTreeSet;

use tracing::debug;

use crate::models::{AnalyteCode, PatientId, PatientSeries, SeriesPoint};
use super::errors::RepositoryError;
use super::in_memory::MeasurementStore;

/// Read access to per-patient analyte time series
pub trait MeasurementRepositoryTrait: Send + Sync {
    /// Points for one patient and analyte, ascending by timestamp.
    ///
    /// Fails with `NotFound` for an unknown patient; a known patient without
    /// measurements of `analyte` yields an empty vector.
    fn get_series(&self, patient_id: &str, analyte: &AnalyteCode) -> Result<Vec<SeriesPoint>, RepositoryError>;

    /// Every patient present in the dataset
    fn patients(&self) -> BTreeSet<PatientId>;

    /// Analytes with at least one measurement for the patient
    fn analytes_present(&self, patient_id: &str) -> Result<BTreeSet<AnalyteCode>, RepositoryError>;

    /// All series of one patient as an owned view
    fn patient_series(&self, patient_id: &str) -> Result<PatientSeries, RepositoryError>;
}

impl MeasurementRepositoryTrait for MeasurementStore {
    fn get_series(&self, patient_id: &str, analyte: &AnalyteCode) -> Result<Vec<SeriesPoint>, RepositoryError> {
        let groups = self
            .groups(patient_id)
            .ok_or_else(|| RepositoryError::NotFound(patient_id.to_string()))?;

        Ok(groups.get(analyte).cloned().unwrap_or_default())
    }

    fn patients(&self) -> BTreeSet<PatientId> {
        self.patient_ids().cloned().collect()
    }

    fn analytes_present(&self, patient_id: &str) -> Result<BTreeSet<AnalyteCode>, RepositoryError> {
        let groups = self
            .groups(patient_id)
            .ok_or_else(|| RepositoryError::NotFound(patient_id.to_string()))?;

        Ok(groups
            .iter()
            .filter(|(_, points)| !points.is_empty())
            .map(|(code, _)| code.clone())
            .collect())
    }

    fn patient_series(&self, patient_id: &str) -> Result<PatientSeries, RepositoryError> {
        debug!("Building series view for patient {}", patient_id);
        let groups = self
            .groups(patient_id)
            .ok_or_else(|| RepositoryError::NotFound(patient_id.to_string()))?;

        Ok(PatientSeries::new(patient_id.to_string(), groups.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Measurement, Unit};
    use chrono::{Duration, TimeZone, Utc};

    fn store() -> MeasurementStore {
        let start = Utc.with_ymd_and_hms(2021, 3, 1, 0, 0, 0).unwrap();
        MeasurementStore::from_measurements(vec![
            Measurement {
                patient_id: "A".to_string(),
                analyte_code: AnalyteCode::CReactiveProtein,
                timestamp: start + Duration::days(1),
                value: 150.0,
                unit: Unit::MilligramPerLitre,
            },
            Measurement {
                patient_id: "A".to_string(),
                analyte_code: AnalyteCode::CReactiveProtein,
                timestamp: start,
                value: 120.0,
                unit: Unit::MilligramPerLitre,
            },
            Measurement {
                patient_id: "B".to_string(),
                analyte_code: AnalyteCode::Neutrophils,
                timestamp: start,
                value: 0.3,
                unit: Unit::GigaPerLitre,
            },
        ])
    }

    #[test]
    fn test_get_series_is_ordered() {
        let series = store().get_series("A", &AnalyteCode::CReactiveProtein).unwrap();
        assert_eq!(series.len(), 2);
        assert!(series[0].timestamp < series[1].timestamp);
        assert_eq!(series[0].value, 120.0);
    }

    #[test]
    fn test_get_series_for_missing_analyte_is_empty() {
        let series = store().get_series("B", &AnalyteCode::CReactiveProtein).unwrap();
        assert!(series.is_empty());
    }

    #[test]
    fn test_get_series_for_unknown_patient_fails() {
        let result = store().get_series("Z", &AnalyteCode::Neutrophils);
        assert!(matches!(result, Err(RepositoryError::NotFound(id)) if id == "Z"));
    }

    #[test]
    fn test_patients_and_analytes_present() {
        let store = store();
        let patients: Vec<_> = store.patients().into_iter().collect();
        assert_eq!(patients, vec!["A".to_string(), "B".to_string()]);

        let analytes = store.analytes_present("B").unwrap();
        assert!(analytes.contains(&AnalyteCode::Neutrophils));
        assert_eq!(analytes.len(), 1);
        assert!(store.analytes_present("Z").is_err());
    }

    #[test]
    fn test_patient_series_view() {
        let series = store().patient_series("A").unwrap();
        assert_eq!(series.patient_id(), "A");
        assert_eq!(series.series(&AnalyteCode::CReactiveProtein).len(), 2);
        assert!(series.series(&AnalyteCode::Neutrophils).is_empty());
    }
}
