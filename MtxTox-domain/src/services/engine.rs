use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use mtx_tox_data::{MeasurementRepositoryTrait, PatientId};

use crate::entities::cohort::{CohortSummary, CombinationMode, Selection};
use crate::entities::flags::{AnalyteEvidence, DiagnosisFlag, FlagTable};
use crate::entities::parameters::RuleParameters;
use crate::errors::{map_repo_error, DiagnosisError};
use crate::services::catalog::{CatalogEntry, DiagnosisCatalog};
use crate::services::cohort::CohortAggregator;
use crate::services::extractor::SeriesExtractor;
use crate::services::persistence::{PersistenceEvaluator, WindowEndPolicy};
use crate::services::resolver::DiagnosisResolver;

/// How an evaluation pass runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub window_end: WindowEndPolicy,

    /// Evaluate patients on the rayon pool
    pub parallel: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_end: WindowEndPolicy::NextObservation,
            parallel: true,
        }
    }
}

/// Catalog and flags evaluated for a new parameter set, not yet installed
#[derive(Debug)]
pub struct ParameterUpdate {
    parameters: RuleParameters,
    catalog: DiagnosisCatalog,
    flags: FlagTable,
}

impl ParameterUpdate {
    pub fn parameters(&self) -> &RuleParameters {
        &self.parameters
    }
}

/// Trait for diagnosis engine operations
pub trait DiagnosisServiceTrait: Send + Sync {
    /// Catalog listing in configuration order
    fn diagnoses(&self) -> Vec<CatalogEntry>;

    /// Current slider values, if the catalog was built from them
    fn parameters(&self) -> Option<&RuleParameters>;

    /// Flags of the last evaluation pass
    fn flags(&self) -> &FlagTable;

    /// All flags of one patient, in catalog order
    fn flags_for(&self, patient_id: &str) -> Result<Vec<DiagnosisFlag>, DiagnosisError>;

    /// Patients matching the selection under `mode`
    fn qualifying_patients(
        &self,
        selection: &Selection,
        mode: CombinationMode,
    ) -> Result<BTreeSet<PatientId>, DiagnosisError>;

    /// Positive counts per selected diagnosis
    fn counts(&self, selection: &Selection) -> Result<BTreeMap<String, usize>, DiagnosisError>;

    /// Cohort, counts and phenotypes for a selection
    fn summarize(&self, selection: &Selection, mode: CombinationMode) -> Result<CohortSummary, DiagnosisError>;

    /// Plottable evidence behind a positive flag
    fn evidence_for(&self, patient_id: &str, diagnosis: &str) -> Result<Vec<AnalyteEvidence>, DiagnosisError>;
}

/// Evaluates a validated catalog over an immutable measurement snapshot.
///
/// Flags are computed once at construction and again whenever parameters
/// change. Every query reads the cached `FlagTable`.
pub struct DiagnosisEngine<R: MeasurementRepositoryTrait> {
    repository: R,
    config: EngineConfig,
    parameters: Option<RuleParameters>,
    catalog: DiagnosisCatalog,
    flags: FlagTable,
}

impl<R: MeasurementRepositoryTrait> DiagnosisEngine<R> {
    /// Build the built-in catalog from `parameters` and evaluate it
    pub fn new(repository: R, parameters: RuleParameters, config: EngineConfig) -> Result<Self, DiagnosisError> {
        let catalog = DiagnosisCatalog::from_parameters(&parameters)?;
        let flags = evaluate_catalog(&repository, &catalog, config)?;

        Ok(Self {
            repository,
            config,
            parameters: Some(parameters),
            catalog,
            flags,
        })
    }

    /// Evaluate a custom catalog
    pub fn with_catalog(repository: R, catalog: DiagnosisCatalog, config: EngineConfig) -> Result<Self, DiagnosisError> {
        let flags = evaluate_catalog(&repository, &catalog, config)?;

        Ok(Self {
            repository,
            config,
            parameters: None,
            catalog,
            flags,
        })
    }

    /// Replace the slider values, rebuild the catalog and re-evaluate.
    /// On error the engine keeps its previous state.
    #[instrument(skip_all)]
    pub fn with_parameters(&mut self, parameters: RuleParameters) -> Result<(), DiagnosisError> {
        let update = self.rebuild(parameters)?;
        self.install(update);
        Ok(())
    }

    /// Validate `parameters` and evaluate them against the dataset without
    /// touching the current state. Only needs shared access.
    pub fn rebuild(&self, parameters: RuleParameters) -> Result<ParameterUpdate, DiagnosisError> {
        let catalog = DiagnosisCatalog::from_parameters(&parameters)?;
        let flags = evaluate_catalog(&self.repository, &catalog, self.config)?;

        Ok(ParameterUpdate {
            parameters,
            catalog,
            flags,
        })
    }

    /// Swap in a rebuilt catalog and its flags
    pub fn install(&mut self, update: ParameterUpdate) {
        self.catalog = update.catalog;
        self.flags = update.flags;
        self.parameters = Some(update.parameters);
    }

    /// Recompute all flags without touching the cached ones
    pub fn evaluate(&self) -> Result<FlagTable, DiagnosisError> {
        evaluate_catalog(&self.repository, &self.catalog, self.config)
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    pub fn catalog(&self) -> &DiagnosisCatalog {
        &self.catalog
    }

    fn aggregator(&self) -> CohortAggregator<'_> {
        CohortAggregator::new(&self.catalog, &self.flags)
    }
}

#[instrument(skip_all, fields(diagnoses = catalog.len(), parallel = config.parallel))]
fn evaluate_catalog<R: MeasurementRepositoryTrait>(
    repository: &R,
    catalog: &DiagnosisCatalog,
    config: EngineConfig,
) -> Result<FlagTable, DiagnosisError> {
    let resolver = DiagnosisResolver::new(catalog, PersistenceEvaluator::new(config.window_end));
    let patients = repository.patients();

    let evaluate_patient = |patient_id: &PatientId| -> Result<Vec<DiagnosisFlag>, DiagnosisError> {
        let series = repository.patient_series(patient_id).map_err(map_repo_error)?;
        resolver.resolve_patient(&series)
    };

    let per_patient: Vec<Vec<DiagnosisFlag>> = if config.parallel {
        patients.par_iter().map(evaluate_patient).collect::<Result<_, _>>()?
    } else {
        patients.iter().map(evaluate_patient).collect::<Result<_, _>>()?
    };

    let mut table = FlagTable::new();
    for patient_id in &patients {
        table.insert_patient(patient_id.clone());
    }
    table.extend(per_patient.into_iter().flatten());

    info!(
        "Evaluated {} diagnoses for {} patients ({} positive flags)",
        catalog.len(),
        patients.len(),
        table.iter().filter(|flag| flag.positive).count()
    );
    Ok(table)
}

impl<R: MeasurementRepositoryTrait> DiagnosisServiceTrait for DiagnosisEngine<R> {
    fn diagnoses(&self) -> Vec<CatalogEntry> {
        self.catalog.entries()
    }

    fn parameters(&self) -> Option<&RuleParameters> {
        self.parameters.as_ref()
    }

    fn flags(&self) -> &FlagTable {
        &self.flags
    }

    fn flags_for(&self, patient_id: &str) -> Result<Vec<DiagnosisFlag>, DiagnosisError> {
        let flags = self
            .flags
            .patient_flags(patient_id)
            .ok_or_else(|| DiagnosisError::NotFound(format!("patient {}", patient_id)))?;

        Ok(self
            .catalog
            .names()
            .filter_map(|name| flags.get(name).cloned())
            .collect())
    }

    fn qualifying_patients(
        &self,
        selection: &Selection,
        mode: CombinationMode,
    ) -> Result<BTreeSet<PatientId>, DiagnosisError> {
        self.aggregator().qualifying_patients(selection, mode)
    }

    fn counts(&self, selection: &Selection) -> Result<BTreeMap<String, usize>, DiagnosisError> {
        self.aggregator().counts(selection)
    }

    fn summarize(&self, selection: &Selection, mode: CombinationMode) -> Result<CohortSummary, DiagnosisError> {
        self.aggregator().summarize(selection, mode)
    }

    fn evidence_for(&self, patient_id: &str, diagnosis: &str) -> Result<Vec<AnalyteEvidence>, DiagnosisError> {
        SeriesExtractor::new(&self.repository, &self.catalog, &self.flags).evidence_for(patient_id, diagnosis)
    }
}
