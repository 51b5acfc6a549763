use tracing::debug;

use mtx_tox_data::MeasurementRepositoryTrait;

use crate::entities::flags::{AnalyteEvidence, FlagTable};
use crate::errors::{map_repo_error, DiagnosisError};
use crate::services::catalog::DiagnosisCatalog;

/// Hands plottable points and highlighted windows to the charting side
pub struct SeriesExtractor<'a, R: MeasurementRepositoryTrait> {
    repository: &'a R,
    catalog: &'a DiagnosisCatalog,
    flags: &'a FlagTable,
}

impl<'a, R: MeasurementRepositoryTrait> SeriesExtractor<'a, R> {
    pub fn new(repository: &'a R, catalog: &'a DiagnosisCatalog, flags: &'a FlagTable) -> Self {
        Self {
            repository,
            catalog,
            flags,
        }
    }

    /// Measurements of every analyte behind a positive flag, with the windows
    /// each analyte contributed. Analytes the patient was never measured for
    /// are left out.
    ///
    /// Fails with `NotFound` for an unknown patient or diagnosis, and when
    /// the patient's flag for the diagnosis is not positive.
    pub fn evidence_for(&self, patient_id: &str, diagnosis: &str) -> Result<Vec<AnalyteEvidence>, DiagnosisError> {
        if !self.catalog.contains(diagnosis) {
            return Err(DiagnosisError::NotFound(format!("diagnosis {}", diagnosis)));
        }

        let flag = match self.flags.get(patient_id, diagnosis) {
            Some(flag) if flag.positive => flag,
            Some(_) => {
                return Err(DiagnosisError::NotFound(format!(
                    "positive {} flag for patient {}",
                    diagnosis, patient_id
                )))
            }
            None => {
                // Unknown patient reports as such
                self.repository
                    .analytes_present(patient_id)
                    .map_err(map_repo_error)?;
                return Err(DiagnosisError::NotFound(format!(
                    "positive {} flag for patient {}",
                    diagnosis, patient_id
                )));
            }
        };

        let mut evidence = Vec::new();
        for analyte in self.catalog.analytes_for(diagnosis) {
            let points = self
                .repository
                .get_series(patient_id, &analyte)
                .map_err(map_repo_error)?;
            if points.is_empty() {
                continue;
            }

            let windows = flag.analyte_windows.get(&analyte).cloned().unwrap_or_default();
            evidence.push(AnalyteEvidence {
                analyte,
                points,
                windows,
            });
        }

        debug!(
            "Evidence for {} / {}: {} analyte series",
            patient_id,
            diagnosis,
            evidence.len()
        );
        Ok(evidence)
    }
}
