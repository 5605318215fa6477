//! State file persistence with atomic writes and checksum sidecars.

mod io_utils;


use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crc32fast::Hasher;
use serde_json::{Map, Value};

use crate::config::SimConfig;
use crate::error::SimError;
use crate::schema::StateSchema;
use crate::store::Store;

pub use io_utils::{classify_io_error, retry_io_operation};

/// Path of the checksum sidecar for a state file (`state.json.crc32`).
pub fn checksum_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".crc32");
    PathBuf::from(name)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Saves and loads store state files.
#[derive(Debug, Clone)]
pub struct PersistenceManager {
    /// Default state file location
    state_path: PathBuf,
    /// Maximum retry attempts for transient I/O errors
    max_retries: u32,
    /// Delay between retry attempts in milliseconds
    retry_delay_ms: u64,
    /// Apply the schema passed to `load_state`
    validate_on_load: bool,
}

impl PersistenceManager {
    /// Creates a new persistence manager with the given configuration.
    pub fn new(config: &SimConfig) -> Self {
        Self {
            state_path: config.state_path(),
            max_retries: config.persistence_max_retries,
            retry_delay_ms: config.persistence_retry_delay_ms,
            validate_on_load: config.validate_on_load,
        }
    }

    /// Default state file path from the configuration.
    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    /// Writes the store's state to `path`.
    ///
    /// The JSON is written to `path.tmp`, synced and renamed over `path`.
    /// A CRC32 of the written bytes goes to `path.crc32`. The previous
    /// sidecar is removed before the rename, so an interrupted save never
    /// leaves a stale checksum next to new state.
    ///
    /// # Arguments
    /// * `store` - Store to save
    /// * `path` - Destination file
    ///
    /// # Returns
    /// `Result<(), SimError>` indicating success or failure.
    pub fn save_state(&self, store: &Store, path: &Path) -> Result<(), SimError> {
        let state = Value::Object(store.snapshot()?);
        let json = serde_json::to_string_pretty(&state)
            .map_err(|e| SimError::Serialization(e.to_string()))?;

        retry_io_operation(
            || write_atomic(path, json.as_bytes()),
            self.max_retries,
            self.retry_delay_ms,
            "save_state",
        )?;
        tracing::info!(path = %path.display(), bytes = json.len(), "state saved");
        Ok(())
    }

    /// Saves to the configured state path.
    pub fn save_default(&self, store: &Store) -> Result<(), SimError> {
        self.save_state(store, &self.state_path)
    }

    /// Reads a state file.
    ///
    /// # Arguments
    /// * `path` - State file
    /// * `schema` - Optional schema the state must satisfy; ignored when
    ///   `validate_on_load` is off in the configuration
    ///
    /// # Returns
    /// The top-level state object. A checksum mismatch yields
    /// `SimError::DataCorruption`.
    pub fn load_state(
        &self,
        path: &Path,
        schema: Option<&StateSchema>,
    ) -> Result<Map<String, Value>, SimError> {
        let data = retry_io_operation(
            || fs::read(path).map_err(|e| classify_io_error(e, "Failed to read state file")),
            self.max_retries,
            self.retry_delay_ms,
            "load_state",
        )?;

        self.verify_checksum(path, &data)?;

        let value: Value = serde_json::from_slice(&data).map_err(|e| {
            SimError::Serialization(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        let Value::Object(state) = value else {
            return Err(SimError::InvalidInput(format!(
                "State file {} must contain a JSON object",
                path.display()
            )));
        };

        match schema {
            Some(schema) if self.validate_on_load => schema.validate(&state)?,
            Some(_) => tracing::debug!(path = %path.display(), "schema validation disabled"),
            None => {}
        }
        tracing::info!(path = %path.display(), keys = state.len(), "state loaded");
        Ok(state)
    }

    /// Loads a state file into `store`, replacing its state.
    ///
    /// The store is left untouched when reading or validation fails.
    pub fn load_into(
        &self,
        store: &Store,
        path: &Path,
        schema: Option<&StateSchema>,
    ) -> Result<(), SimError> {
        let state = self.load_state(path, schema)?;
        store.restore(state)
    }

    fn verify_checksum(&self, path: &Path, data: &[u8]) -> Result<(), SimError> {
        let sidecar = checksum_path(path);
        let expected = match fs::read_to_string(&sidecar) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // State files edited by hand carry no sidecar
                return Ok(());
            }
            Err(e) => return Err(classify_io_error(e, "Failed to read checksum file")),
        };
        let expected = u32::from_str_radix(expected.trim(), 16).map_err(|_| {
            SimError::DataCorruption(format!(
                "Malformed checksum file {}",
                sidecar.display()
            ))
        })?;

        let actual = checksum(data);
        if actual != expected {
            return Err(SimError::DataCorruption(format!(
                "Checksum mismatch for {}: expected {:08x}, got {:08x}",
                path.display(),
                expected,
                actual
            )));
        }
        Ok(())
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<(), SimError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| classify_io_error(e, "Failed to create data directory"))?;
    }

    let tmp = temp_path(path);
    write_synced(&tmp, data, "Failed to write state")?;

    let sidecar = checksum_path(path);
    match fs::remove_file(&sidecar) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(classify_io_error(e, "Failed to remove checksum file")),
    }
    fs::rename(&tmp, path).map_err(|e| classify_io_error(e, "Failed to rename state file"))?;

    let sidecar_tmp = temp_path(&sidecar);
    let crc = format!("{:08x}\n", checksum(data));
    write_synced(&sidecar_tmp, crc.as_bytes(), "Failed to write checksum file")?;
    fs::rename(&sidecar_tmp, &sidecar)
        .map_err(|e| classify_io_error(e, "Failed to rename checksum file"))?;
    Ok(())
}

fn write_synced(path: &Path, data: &[u8], context: &str) -> Result<(), SimError> {
    let mut file = File::create(path).map_err(|e| classify_io_error(e, context))?;
    file.write_all(data).map_err(|e| classify_io_error(e, context))?;
    file.sync_all().map_err(|e| classify_io_error(e, context))
}
