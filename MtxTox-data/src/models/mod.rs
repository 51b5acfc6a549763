// Storage models for laboratory data
pub mod analyte;
pub mod measurement;

// Re-export common types for easier imports
pub use analyte::{AnalyteCode, Unit};
pub use measurement::{Measurement, MeasurementRow, PatientId, PatientSeries, SeriesPoint};
