use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use mtx_tox_domain::entities::{AnalyteEvidence, CohortSummary, PhenotypeRow};
use mtx_tox_domain::services::CatalogEntry;
use mtx_tox_domain::{CombinationMode, DiagnosisFlag, EvidenceWindow, Selection};

/// Catalog entry shown as one checkbox
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DiagnosisEntry {
    /// Diagnosis name, used as key everywhere else
    pub name: String,

    /// Whether the flag is computed from other diagnoses
    pub derived: bool,

    /// Referenced diagnoses of a derived diagnosis
    pub derived_from: Vec<String>,

    /// Analyte codes the diagnosis depends on
    pub analytes: Vec<String>,

    /// Human-readable criteria
    pub description: String,
}

impl From<CatalogEntry> for DiagnosisEntry {
    fn from(entry: CatalogEntry) -> Self {
        Self {
            name: entry.name,
            derived: entry.derived,
            derived_from: entry.derived_from,
            analytes: entry.analytes.into_iter().map(String::from).collect(),
            description: entry.description,
        }
    }
}

/// Time interval over which a criterion held
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WindowDto {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl From<&EvidenceWindow> for WindowDto {
    fn from(window: &EvidenceWindow) -> Self {
        Self {
            start: window.start,
            end: window.end,
        }
    }
}

/// One diagnosis flag of a patient
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FlagDto {
    pub diagnosis: String,
    pub positive: bool,

    /// Not positive yet, but a run is still open at the end of the data
    pub pending: bool,

    /// At least one analyte of the diagnosis was measured
    pub measured: bool,

    pub windows: Vec<WindowDto>,
}

impl From<DiagnosisFlag> for FlagDto {
    fn from(flag: DiagnosisFlag) -> Self {
        Self {
            windows: flag.windows.iter().map(WindowDto::from).collect(),
            diagnosis: flag.diagnosis,
            positive: flag.positive,
            pending: flag.pending,
            measured: flag.measured,
        }
    }
}

/// All flags of one patient
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PatientFlagsResponse {
    pub patient_id: String,
    pub flags: Vec<FlagDto>,
}

/// Selection of diagnoses and how to combine them
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CohortRequest {
    /// Diagnosis name to checkbox state
    #[schema(value_type = Object)]
    pub selected: Selection,

    #[serde(default)]
    pub mode: CombinationMode,
}

/// Exported phenotype of one patient
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PhenotypeRowDto {
    pub patient_id: String,

    /// 1 if any selected diagnosis is positive, else 0
    pub phenotype: u8,
}

impl From<PhenotypeRow> for PhenotypeRowDto {
    fn from(row: PhenotypeRow) -> Self {
        Self {
            patient_id: row.patient_id,
            phenotype: row.phenotype,
        }
    }
}

/// Cohort for a selection
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CohortResponse {
    pub mode: CombinationMode,

    /// Checked diagnoses in catalog order
    pub selected: Vec<String>,

    /// Qualifying patients
    pub patients: Vec<String>,

    /// Positive patients per checked diagnosis
    #[schema(value_type = Object)]
    pub counts: BTreeMap<String, usize>,

    pub phenotypes: Vec<PhenotypeRowDto>,
    pub phenotype_positive: usize,
    pub phenotype_negative: usize,
}

impl From<CohortSummary> for CohortResponse {
    fn from(summary: CohortSummary) -> Self {
        Self {
            mode: summary.mode,
            selected: summary.selected,
            patients: summary.patients.into_iter().collect(),
            counts: summary.counts,
            phenotype_positive: summary.phenotypes.positive,
            phenotype_negative: summary.phenotypes.negative,
            phenotypes: summary
                .phenotypes
                .rows
                .into_iter()
                .map(PhenotypeRowDto::from)
                .collect(),
        }
    }
}

/// Plottable measurement
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PointDto {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Points and highlighted windows for one analyte
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EvidenceSeries {
    pub analyte: String,
    pub label: String,
    pub unit: Option<String>,
    pub points: Vec<PointDto>,
    pub windows: Vec<WindowDto>,
}

impl From<AnalyteEvidence> for EvidenceSeries {
    fn from(evidence: AnalyteEvidence) -> Self {
        Self {
            label: evidence.analyte.label().to_string(),
            unit: evidence.analyte.canonical_unit().map(String::from),
            points: evidence
                .points
                .iter()
                .map(|p| PointDto {
                    timestamp: p.timestamp,
                    value: p.value,
                })
                .collect(),
            windows: evidence.windows.iter().map(WindowDto::from).collect(),
            analyte: evidence.analyte.into(),
        }
    }
}

/// Evidence behind one positive flag
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EvidenceResponse {
    pub patient_id: String,
    pub diagnosis: String,
    pub series: Vec<EvidenceSeries>,
}
