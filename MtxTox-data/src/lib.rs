// MtxTox Data
// This crate holds the normalized laboratory measurements the diagnosis engine reads

// Measurement storage models
pub mod models;

// Repository implementations for data access
pub mod repository;

// Re-export commonly used types
pub use models::{AnalyteCode, Measurement, MeasurementRow, PatientId, PatientSeries, SeriesPoint, Unit};
pub use repository::{MeasurementRepositoryTrait, MeasurementStore, RepositoryError};
