//! Durable storage of volume results
//!
//! One pretty-printed JSON document per run, `volume_<run_id>.json`,
//! written to a temporary file first and renamed into place.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::VolumeResults;
use crate::error::{Error, Result};

const PREFIX: &str = "volume_";
const SUFFIX: &str = ".json";

/// Directory of persisted volume runs, keyed by run id
#[derive(Debug, Clone)]
pub struct VolumeStore {
    dir: PathBuf,
}

impl VolumeStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File a run is stored in
    pub fn path_for(&self, run_id: &str) -> Result<PathBuf> {
        validate_run_id(run_id)?;
        Ok(self.dir.join(format!("{}{}{}", PREFIX, run_id, SUFFIX)))
    }

    /// Persist a run, replacing any earlier run with the same id
    pub fn save(&self, results: &VolumeResults) -> Result<PathBuf> {
        let path = self.path_for(&results.run_id)?;
        fs::create_dir_all(&self.dir)?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(results)?)?;
        fs::rename(&tmp, &path)?;

        info!(run_id = %results.run_id, path = %path.display(), "volume results saved");
        Ok(path)
    }

    /// Load a run by id
    pub fn load(&self, run_id: &str) -> Result<VolumeResults> {
        let path = self.path_for(run_id)?;
        match fs::read(&path) {
            Ok(bytes) => {
                debug!(run_id, path = %path.display(), "loading volume results");
                Ok(serde_json::from_slice(&bytes)?)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::RunNotFound(run_id.into())),
            Err(e) => Err(e.into()),
        }
    }

    /// Ids of all stored runs, sorted
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(id) = name.strip_prefix(PREFIX).and_then(|s| s.strip_suffix(SUFFIX)) {
                if validate_run_id(id).is_ok() {
                    ids.push(id.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// Read a results document from an explicit path
pub fn read_results(path: &Path) -> Result<VolumeResults> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn validate_run_id(run_id: &str) -> Result<()> {
    let ok = !run_id.is_empty()
        && run_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "run id '{}' must be non-empty ASCII alphanumerics, '-' or '_'",
            run_id
        )))
    }
}
