//! Parsed dependency definition documents.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DependencyErrorKind;

/// A serialized package definition loaded from a dependency.
///
/// Expected shape: a JSON object with an integer `formatVersion` and a
/// `distribution` array whose first element is a string tag. The document is
/// otherwise passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DefinitionDocument(Value);

impl DefinitionDocument {
    /// Parse and validate raw bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, DependencyErrorKind> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    /// Validate an already parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self, DependencyErrorKind> {
        let object = value
            .as_object()
            .ok_or_else(|| DependencyErrorKind::InvalidDocument("expected a JSON object".to_string()))?;

        match object.get("formatVersion") {
            Some(v) if v.is_i64() || v.is_u64() => {}
            Some(_) => {
                return Err(DependencyErrorKind::InvalidDocument(
                    "formatVersion must be an integer".to_string(),
                ))
            }
            None => {
                return Err(DependencyErrorKind::InvalidDocument(
                    "missing formatVersion".to_string(),
                ))
            }
        }

        match object.get("distribution").and_then(Value::as_array) {
            Some(items) if items.first().map(Value::is_string).unwrap_or(false) => {}
            Some(_) => {
                return Err(DependencyErrorKind::InvalidDocument(
                    "distribution must start with a string tag".to_string(),
                ))
            }
            None => {
                return Err(DependencyErrorKind::InvalidDocument(
                    "missing distribution array".to_string(),
                ))
            }
        }

        Ok(DefinitionDocument(value))
    }

    pub fn format_version(&self) -> i64 {
        self.0["formatVersion"].as_i64().unwrap_or_default()
    }

    /// The distribution tag, e.g. `"Library"`.
    pub fn distribution_kind(&self) -> &str {
        self.0["distribution"][0].as_str().unwrap_or_default()
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}
