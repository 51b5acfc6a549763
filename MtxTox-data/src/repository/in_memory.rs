use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::models::{AnalyteCode, Measurement, MeasurementRow, PatientId, SeriesPoint};
use super::errors::RepositoryError;

type AnalyteSeries = BTreeMap<AnalyteCode, Vec<SeriesPoint>>;

/// Immutable in-memory snapshot of a laboratory dataset.
///
/// Measurements are grouped per patient and analyte and sorted by timestamp
/// once, at construction. Two measurements sharing a timestamp for the same
/// patient and analyte keep their ingestion order and are counted as a data
/// quality warning.
#[derive(Debug, Clone, Default)]
pub struct MeasurementStore {
    patients: BTreeMap<PatientId, AnalyteSeries>,
    measurement_count: usize,
    duplicate_timestamps: usize,
}

impl MeasurementStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from already validated measurements
    pub fn from_measurements<I>(measurements: I) -> Self
    where
        I: IntoIterator<Item = Measurement>,
    {
        let mut patients: BTreeMap<PatientId, AnalyteSeries> = BTreeMap::new();
        let mut measurement_count = 0;

        for measurement in measurements {
            patients
                .entry(measurement.patient_id)
                .or_default()
                .entry(measurement.analyte_code)
                .or_default()
                .push(SeriesPoint::new(measurement.timestamp, measurement.value));
            measurement_count += 1;
        }

        let mut duplicate_timestamps = 0;
        for (patient_id, groups) in patients.iter_mut() {
            for (analyte, points) in groups.iter_mut() {
                // Stable sort keeps ingestion order for equal timestamps
                points.sort_by_key(|p| p.timestamp);

                let duplicates = points
                    .windows(2)
                    .filter(|pair| pair[0].timestamp == pair[1].timestamp)
                    .count();
                if duplicates > 0 {
                    warn!(
                        "Patient {} has {} duplicate timestamp(s) for {}, keeping ingestion order",
                        patient_id, duplicates, analyte
                    );
                    duplicate_timestamps += duplicates;
                }
            }
        }

        debug!(
            "Measurement store built: {} patients, {} measurements",
            patients.len(),
            measurement_count
        );

        Self {
            patients,
            measurement_count,
            duplicate_timestamps,
        }
    }

    /// Validate ingestion rows and build a store from them
    pub fn from_rows(rows: Vec<MeasurementRow>) -> Result<Self, RepositoryError> {
        let measurements = rows
            .into_iter()
            .map(Measurement::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::from_measurements(measurements))
    }

    /// Number of stored measurements
    pub fn len(&self) -> usize {
        self.measurement_count
    }

    pub fn is_empty(&self) -> bool {
        self.measurement_count == 0
    }

    /// Number of distinct patients
    pub fn patient_count(&self) -> usize {
        self.patients.len()
    }

    /// Number of measurements that share a timestamp with their predecessor
    pub fn duplicate_timestamps(&self) -> usize {
        self.duplicate_timestamps
    }

    pub(crate) fn groups(&self, patient_id: &str) -> Option<&AnalyteSeries> {
        self.patients.get(patient_id)
    }

    pub(crate) fn patient_ids(&self) -> impl Iterator<Item = &PatientId> {
        self.patients.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Unit;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn at(hours: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 3, 1, 0, 0, 0).unwrap() + Duration::hours(hours)
    }

    fn platelets(patient: &str, hours: i64, value: f64) -> Measurement {
        Measurement {
            patient_id: patient.to_string(),
            analyte_code: AnalyteCode::Platelets,
            timestamp: at(hours),
            value,
            unit: Unit::GigaPerLitre,
        }
    }

    #[test]
    fn test_measurements_are_sorted_per_series() {
        let store = MeasurementStore::from_measurements(vec![
            platelets("A", 90, 8.0),
            platelets("A", 0, 8.0),
            platelets("A", 40, 9.0),
        ]);

        let points = &store.groups("A").unwrap()[&AnalyteCode::Platelets];
        let hours: Vec<i64> = points.iter().map(|p| (p.timestamp - at(0)).num_hours()).collect();
        assert_eq!(hours, vec![0, 40, 90]);
        assert_eq!(store.len(), 3);
        assert_eq!(store.patient_count(), 1);
    }

    #[test]
    fn test_duplicate_timestamps_keep_ingestion_order() {
        let store = MeasurementStore::from_measurements(vec![
            platelets("A", 10, 12.0),
            platelets("A", 10, 7.0),
            platelets("A", 0, 20.0),
        ]);

        let points = &store.groups("A").unwrap()[&AnalyteCode::Platelets];
        assert_eq!(points[1].value, 12.0);
        assert_eq!(points[2].value, 7.0);
        assert_eq!(store.duplicate_timestamps(), 1);
    }

    #[test]
    fn test_from_rows_propagates_validation_errors() {
        let rows = vec![MeasurementRow {
            patient_id: "A".to_string(),
            analyte_code: "NPU03568".to_string(),
            timestamp: at(0),
            value: 8.0,
            unit: "mg/L".to_string(),
        }];

        assert!(matches!(
            MeasurementStore::from_rows(rows),
            Err(RepositoryError::Validation(_))
        ));
    }
}
