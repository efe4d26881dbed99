// bashcord-aio/src/json_io.rs
use std::path::Path;

use bashcord_common::error::{BashcordError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// Writes `data` as pretty JSON through an atomic replace.
pub fn write_json_sync<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    debug!("Writing JSON to: {}", path.display());
    let json_bytes = serde_json::to_vec_pretty(data)?;
    crate::fs::atomic_write_file(path, &json_bytes)
}

pub fn read_json_sync<T: DeserializeOwned>(path: &Path) -> Result<T> {
    debug!("Reading JSON from: {}", path.display());
    let file = std::fs::File::open(path).map_err(|e| BashcordError::from_io(path, e))?;
    let reader = std::io::BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}
