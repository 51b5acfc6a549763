// Public entities for the MtxTox API
// This module contains data structures that are shared across the application boundary

// Error responses
pub mod common;

// Diagnosis, cohort and evidence payloads
pub mod diagnosis;

pub use common::ErrorResponse;
