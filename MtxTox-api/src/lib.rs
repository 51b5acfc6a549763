// MtxTox-api lib.rs
//
// HTTP surface of the MtxTox diagnosis engine: the control surface reads and
// updates rule parameters, the charting side reads cohorts and evidence.

// Public modules
pub mod api;
pub mod config;
pub mod entities;
pub mod openapi;

pub use api::{create_application, AppState};
pub use config::{ConfigError, ServerConfig};
