pub mod cohort;
pub mod diagnoses;
pub mod health;
pub mod patients;

// Tests module
#[cfg(test)]
mod tests;

// Re-export handlers for easier imports
pub use cohort::compute_cohort;
pub use diagnoses::{get_parameters, list_diagnoses, update_parameters};
pub use health::health_check;
pub use patients::{get_evidence, get_patient_flags};
