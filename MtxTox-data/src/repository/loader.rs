use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use tracing::info;

use crate::models::MeasurementRow;
use super::errors::RepositoryError;
use super::in_memory::MeasurementStore;

/// Read a JSON array of measurement rows
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<MeasurementRow>, RepositoryError> {
    let rows: Vec<MeasurementRow> = serde_json::from_reader(reader)?;
    Ok(rows)
}

/// Load a measurement store from a JSON file of normalized rows
pub fn load_store(path: &Path) -> Result<MeasurementStore, RepositoryError> {
    info!("Loading measurements from {}", path.display());

    let file = File::open(path)?;
    let rows = read_rows(BufReader::new(file))?;
    let store = MeasurementStore::from_rows(rows)?;

    info!(
        "Loaded {} measurements for {} patients",
        store.len(),
        store.patient_count()
    );
    Ok(store)
}
