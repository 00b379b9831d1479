//! The `modelc.json` project manifest.

use std::path::{Path, PathBuf};

use modelc_deps::{DependencyConfig, RemoteSource};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{FrontendError, Result};

/// Project descriptor. Unknown fields are kept and forwarded to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectManifest {
    pub name: String,
    pub source_directory: String,
    #[serde(default)]
    pub exposed_modules: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<RemoteSource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub local_dependencies: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProjectManifest {
    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| FrontendError::io(path, source))?;
        serde_json::from_slice(&bytes).map_err(|source| FrontendError::Manifest {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Source directory, relative paths taken from `project_dir`.
    pub fn source_root(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.source_directory)
    }

    /// Declared dependencies plus command-line includes.
    pub fn dependency_config(&self, includes: &[String]) -> DependencyConfig {
        DependencyConfig {
            dependencies: self.dependencies.clone(),
            local_dependencies: self.local_dependencies.clone(),
            includes: includes.to_vec(),
        }
    }

    /// The manifest as sent to the engine in `packageInfo`.
    pub fn package_info(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
