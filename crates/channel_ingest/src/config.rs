use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigurationError;

/// One channel definition as written in the definitions file, before its
/// name is validated and its pattern compiled.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawDefinition {
    pub name: String,
    pub prefix: String,
    pub pattern: String,
}

impl RawDefinition {
    pub fn new(
        name: impl Into<String>,
        prefix: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            pattern: pattern.into(),
        }
    }
}

/// Where a value pattern may match once its prefix has been stripped.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueMatch {
    /// The first match anywhere in the remaining buffer is consumed; any text
    /// between the prefix and the match is dropped.
    #[default]
    Anywhere,
    /// The match must begin immediately after the prefix.
    Anchored,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct IngestLimits {
    pub max_line_bytes: usize,
}

impl Default for IngestLimits {
    fn default() -> Self {
        Self {
            max_line_bytes: 64 * 1024,
        }
    }
}

/// The parsed contents of a definitions file.
///
/// Accepted shapes:
/// - a bare JSON array of `{ "name", "prefix", "pattern" }` objects;
/// - a JSON object or TOML document with an optional `value_match` key and a
///   `channel` list of the same objects (`[[channel]]` tables in TOML).
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefinitionSet {
    #[serde(default)]
    pub value_match: ValueMatch,
    #[serde(default, rename = "channel")]
    pub definitions: Vec<RawDefinition>,
}

impl DefinitionSet {
    pub fn new(definitions: Vec<RawDefinition>) -> Self {
        Self {
            value_match: ValueMatch::default(),
            definitions,
        }
    }

    pub fn with_value_match(mut self, value_match: ValueMatch) -> Self {
        self.value_match = value_match;
        self
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigurationError> {
        let value: Value = serde_json::from_str(raw)?;
        if value.is_array() {
            let definitions: Vec<RawDefinition> = serde_json::from_value(value)?;
            Ok(Self::new(definitions))
        } else {
            Ok(serde_json::from_value(value)?)
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigurationError> {
        Ok(toml::from_str(raw)?)
    }

    /// Reads a definitions file, choosing TOML for a `.toml` extension and
    /// JSON otherwise.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        if is_toml {
            Self::from_toml_str(&raw)
        } else {
            Self::from_json_str(&raw)
        }
    }
}
