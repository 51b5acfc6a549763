// Domain entities
pub mod cohort;
pub mod flags;
pub mod normal_limits;
pub mod parameters;
pub mod rules;

// Re-export common types for easier imports
pub use cohort::{CohortSummary, CombinationMode, PhenotypeRow, PhenotypeSummary, Selection};
pub use flags::{AnalyteEvidence, DiagnosisFlag, EvidenceWindow, FlagTable, PersistenceOutcome};
pub use normal_limits::{NormalLimit, NormalLimits};
pub use parameters::RuleParameters;
pub use rules::{Bound, Comparison, DiagnosisDefinition, DiagnosisKind, RuleExpr, ThresholdRule};
