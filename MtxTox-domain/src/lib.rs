// MtxTox Domain
// This crate contains the diagnosis rules and the evaluation engine

// Domain entities
pub mod entities;

// Domain errors
pub mod errors;

// Services that implement the evaluation pipeline
pub mod services;

// Testing utilities - only available in tests or with the mock feature
#[cfg(any(test, feature = "mock"))]
pub mod testing;

// Re-export the measurement model for convenience
pub use mtx_tox_data::{AnalyteCode, MeasurementStore, PatientId, SeriesPoint};

// Re-export common types for easier imports
pub use entities::{
    CohortSummary, CombinationMode, DiagnosisDefinition, DiagnosisFlag, EvidenceWindow, FlagTable,
    RuleParameters, Selection,
};
pub use errors::DiagnosisError;
pub use services::{DiagnosisCatalog, DiagnosisEngine, DiagnosisServiceTrait, EngineConfig, WindowEndPolicy};
