use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use mtx_tox_data::PatientId;

#[cfg(feature = "with-api")]
use utoipa::ToSchema;

/// How selected diagnoses combine into a cohort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum CombinationMode {
    /// Positive for at least one selected diagnosis
    #[default]
    Any,

    /// Positive for every selected diagnosis
    All,
}

/// Checkbox state: diagnosis name to selected
pub type Selection = BTreeMap<String, bool>;

/// Exported 0/1 phenotype of one patient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhenotypeRow {
    pub patient_id: PatientId,
    pub phenotype: u8,
}

/// Phenotype rows with totals
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PhenotypeSummary {
    pub rows: Vec<PhenotypeRow>,
    pub positive: usize,
    pub negative: usize,
}

/// Cohort for one selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CohortSummary {
    pub mode: CombinationMode,
    pub selected: Vec<String>,
    pub patients: BTreeSet<PatientId>,
    pub counts: BTreeMap<String, usize>,
    pub phenotypes: PhenotypeSummary,
}
