//! JSON snapshots of entity state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::HostError;

/// A state file holding one JSON object keyed by entity id.
///
/// ```json
/// {"sensor-7": {"last_reading": 63, "limit_exceeded": true, ...}}
/// ```
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load saved states. A missing file yields no entities.
    pub async fn load<S: DeserializeOwned>(&self) -> Result<BTreeMap<String, S>, HostError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no state file, starting empty");
                return Ok(BTreeMap::new());
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Save states, replacing the file atomically.
    pub async fn save<S: Serialize>(&self, states: &BTreeMap<String, S>) -> Result<(), HostError> {
        let json = serde_json::to_vec_pretty(states)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        tracing::debug!(path = %self.path.display(), entities = states.len(), "state saved");
        Ok(())
    }
}
