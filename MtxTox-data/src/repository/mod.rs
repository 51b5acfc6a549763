// Repository module structure
pub mod errors;
pub mod loader;
mod in_memory;
mod measurement;

// Re-export commonly used types
pub use errors::RepositoryError;
pub use in_memory::MeasurementStore;
pub use measurement::MeasurementRepositoryTrait;
