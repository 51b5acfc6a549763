// Domain services
// This module contains the evaluation pipeline, leaves first.
pub mod persistence;
pub mod catalog;
pub mod resolver;
pub mod cohort;
pub mod extractor;
pub mod engine;

// Re-export service traits and entry points
pub use catalog::{CatalogEntry, DiagnosisCatalog};
pub use cohort::CohortAggregator;
pub use engine::{DiagnosisEngine, DiagnosisServiceTrait, EngineConfig, ParameterUpdate};
pub use extractor::SeriesExtractor;
pub use persistence::{PersistenceEvaluator, WindowEndPolicy};
pub use resolver::DiagnosisResolver;
