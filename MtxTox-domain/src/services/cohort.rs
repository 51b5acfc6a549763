use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use mtx_tox_data::PatientId;

use crate::entities::cohort::{CohortSummary, CombinationMode, PhenotypeRow, PhenotypeSummary, Selection};
use crate::entities::flags::FlagTable;
use crate::errors::DiagnosisError;
use crate::services::catalog::DiagnosisCatalog;

/// Combines per-diagnosis flags into cohorts for a checkbox selection
pub struct CohortAggregator<'a> {
    catalog: &'a DiagnosisCatalog,
    flags: &'a FlagTable,
}

impl<'a> CohortAggregator<'a> {
    pub fn new(catalog: &'a DiagnosisCatalog, flags: &'a FlagTable) -> Self {
        Self { catalog, flags }
    }

    /// Checked names, in catalog order. Unchecked entries are ignored but
    /// must still name a known diagnosis.
    pub fn selected_names(&self, selection: &Selection) -> Result<Vec<String>, DiagnosisError> {
        if let Some(unknown) = selection.keys().find(|name| !self.catalog.contains(name)) {
            return Err(DiagnosisError::InvalidParameter(format!(
                "unknown diagnosis '{}' in selection",
                unknown
            )));
        }

        Ok(self
            .catalog
            .names()
            .filter(|name| selection.get(*name).copied().unwrap_or(false))
            .map(str::to_string)
            .collect())
    }

    /// Patients whose flags satisfy `mode` across exactly the checked
    /// diagnoses. Nothing checked selects nobody.
    pub fn qualifying_patients(
        &self,
        selection: &Selection,
        mode: CombinationMode,
    ) -> Result<BTreeSet<PatientId>, DiagnosisError> {
        let selected = self.selected_names(selection)?;
        Ok(self.qualifying_for(&selected, mode))
    }

    fn qualifying_for(&self, selected: &[String], mode: CombinationMode) -> BTreeSet<PatientId> {
        if selected.is_empty() {
            return BTreeSet::new();
        }

        self.flags
            .patients()
            .filter(|patient_id| {
                let mut positives = selected.iter().map(|name| self.flags.is_positive(patient_id, name));
                match mode {
                    CombinationMode::Any => positives.any(|positive| positive),
                    CombinationMode::All => positives.all(|positive| positive),
                }
            })
            .cloned()
            .collect()
    }

    /// Positive patient count per checked diagnosis, independent of mode
    pub fn counts(&self, selection: &Selection) -> Result<BTreeMap<String, usize>, DiagnosisError> {
        let selected = self.selected_names(selection)?;
        Ok(self.counts_for(&selected))
    }

    fn counts_for(&self, selected: &[String]) -> BTreeMap<String, usize> {
        selected
            .iter()
            .map(|name| (name.clone(), self.flags.positive_patients(name).len()))
            .collect()
    }

    /// 0/1 phenotype per patient measured for at least one checked
    /// diagnosis: 1 if any checked diagnosis is positive
    pub fn phenotypes(&self, selection: &Selection) -> Result<PhenotypeSummary, DiagnosisError> {
        let selected = self.selected_names(selection)?;
        Ok(self.phenotypes_for(&selected))
    }

    fn phenotypes_for(&self, selected: &[String]) -> PhenotypeSummary {
        let affected = self.qualifying_for(selected, CombinationMode::Any);

        let rows: Vec<PhenotypeRow> = self
            .flags
            .patients()
            .filter(|patient_id| {
                selected
                    .iter()
                    .any(|name| self.flags.get(patient_id, name).is_some_and(|flag| flag.measured))
            })
            .map(|patient_id| PhenotypeRow {
                patient_id: patient_id.clone(),
                phenotype: u8::from(affected.contains(patient_id)),
            })
            .collect();

        PhenotypeSummary {
            positive: affected.len(),
            negative: rows.len() - affected.len(),
            rows,
        }
    }

    /// Cohort, per-diagnosis counts and phenotypes in one pass
    pub fn summarize(&self, selection: &Selection, mode: CombinationMode) -> Result<CohortSummary, DiagnosisError> {
        let selected = self.selected_names(selection)?;
        let patients = self.qualifying_for(&selected, mode);

        debug!(
            "Cohort for {:?} ({:?}): {} of {} patients",
            selected,
            mode,
            patients.len(),
            self.flags.patient_count()
        );

        Ok(CohortSummary {
            mode,
            counts: self.counts_for(&selected),
            phenotypes: self.phenotypes_for(&selected),
            patients,
            selected,
        })
    }
}
