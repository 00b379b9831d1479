//! Dependency specifiers and the configuration they are declared in.

use serde::{Deserialize, Serialize};

/// Where a dependency specifier was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Provenance {
    /// Explicit `--include` handles
    Includes,
    /// Locally vendored definitions
    LocalDependencies,
    /// Externally referenced definitions
    Dependencies,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Includes => "includes",
            Provenance::LocalDependencies => "localDependencies",
            Provenance::Dependencies => "dependencies",
        }
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A remote dependency: either a short locator string or a structured source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemoteSource {
    /// Data url, local path or network locator
    Locator(String),
    /// Structured description of a remote location
    Descriptor(RemoteDescriptor),
}

impl std::fmt::Display for RemoteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteSource::Locator(s) => f.write_str(s),
            RemoteSource::Descriptor(d) => f.write_str(&d.location()),
        }
    }
}

/// Structured remote source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RemoteDescriptor {
    /// Fetch a definition document from an absolute url
    Url { url: String },
    /// Fetch a definition document from a GitHub repository
    Github {
        owner: String,
        repo: String,
        /// Branch, tag or commit
        #[serde(rename = "ref", default = "default_reference")]
        reference: String,
        /// Document path inside the repository
        #[serde(default = "default_document_path")]
        path: String,
        /// Raw-content host (defaults to raw.githubusercontent.com)
        #[serde(
            rename = "baseUrl",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        base_url: Option<String>,
    },
}

const GITHUB_RAW_BASE: &str = "https://raw.githubusercontent.com";

fn default_reference() -> String {
    "main".to_string()
}

fn default_document_path() -> String {
    "modelc-ir.json".to_string()
}

impl RemoteDescriptor {
    /// The url this descriptor points at.
    pub fn location(&self) -> String {
        match self {
            RemoteDescriptor::Url { url } => url.clone(),
            RemoteDescriptor::Github {
                owner,
                repo,
                reference,
                path,
                base_url,
            } => {
                let base = base_url.as_deref().unwrap_or(GITHUB_RAW_BASE);
                format!(
                    "{}/{}/{}/{}/{}",
                    base.trim_end_matches('/'),
                    owner,
                    repo,
                    reference,
                    path.trim_start_matches('/')
                )
            }
        }
    }
}

/// A declared external reference, tagged by provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencySpec {
    Included(String),
    LocalDependency(String),
    RemoteDependency(RemoteSource),
}

impl DependencySpec {
    pub fn provenance(&self) -> Provenance {
        match self {
            DependencySpec::Included(_) => Provenance::Includes,
            DependencySpec::LocalDependency(_) => Provenance::LocalDependencies,
            DependencySpec::RemoteDependency(_) => Provenance::Dependencies,
        }
    }

    /// The specifier as declared, for diagnostics.
    pub fn specifier(&self) -> String {
        match self {
            DependencySpec::Included(s) | DependencySpec::LocalDependency(s) => s.clone(),
            DependencySpec::RemoteDependency(source) => source.to_string(),
        }
    }
}

/// The three independently listed specifier categories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyConfig {
    #[serde(default)]
    pub dependencies: Vec<RemoteSource>,
    #[serde(default)]
    pub local_dependencies: Vec<String>,
    #[serde(default)]
    pub includes: Vec<String>,
}

impl DependencyConfig {
    /// Flatten into specifiers: includes, then local dependencies, then dependencies.
    pub fn to_specs(&self) -> Vec<DependencySpec> {
        let includes = self.includes.iter().cloned().map(DependencySpec::Included);
        let locals = self
            .local_dependencies
            .iter()
            .cloned()
            .map(DependencySpec::LocalDependency);
        let remotes = self
            .dependencies
            .iter()
            .cloned()
            .map(DependencySpec::RemoteDependency);
        includes.chain(locals).chain(remotes).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty() && self.local_dependencies.is_empty() && self.includes.is_empty()
    }
}
