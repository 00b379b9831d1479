//! Persisted path -> digest map from the last successful build.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::atomic::write_representation;
use crate::error::{FrontendError, Result};
use crate::hash::ContentHash;

/// Recorded digests keyed by root-relative path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashState(BTreeMap<String, ContentHash>);

impl HashState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&ContentHash> {
        self.0.get(path)
    }

    pub fn insert(&mut self, path: impl Into<String>, hash: ContentHash) -> Option<ContentHash> {
        self.0.insert(path.into(), hash)
    }

    pub fn paths(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, ContentHash)> for HashState {
    fn from_iter<I: IntoIterator<Item = (String, ContentHash)>>(iter: I) -> Self {
        HashState(iter.into_iter().collect())
    }
}

/// Reads and writes the hash-state file.
///
/// Assumes a single writer; there is no locking.
#[derive(Debug, Clone)]
pub struct HashStateStore {
    path: PathBuf,
}

impl HashStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        HashStateStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> Result<bool> {
        tokio::fs::try_exists(&self.path)
            .await
            .map_err(|source| FrontendError::io(&self.path, source))
    }

    /// Load the recorded state. A missing file is an empty state.
    pub async fn load(&self) -> Result<HashState> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no hash state yet");
                return Ok(HashState::new());
            }
            Err(source) => return Err(FrontendError::io(&self.path, source)),
        };
        serde_json::from_slice(&bytes).map_err(|source| FrontendError::HashState {
            path: self.path.clone(),
            source,
        })
    }

    /// Replace the recorded state atomically.
    pub async fn save(&self, state: &HashState) -> Result<()> {
        write_representation(&self.path, state, true).await?;
        debug!(path = %self.path.display(), entries = state.len(), "hash state saved");
        Ok(())
    }
}
