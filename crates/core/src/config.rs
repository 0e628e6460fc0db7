//! Schema configuration via `strata-schema.toml`
//!
//! The file is optional. Every setting has a default, and the debug
//! introspection flag can also be switched on through the
//! `STRATA_SCHEMA_DEBUG` environment variable.

use crate::error::{StrataError, StrataResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Config file name looked up by applications embedding the schema layer.
pub const CONFIG_FILE_NAME: &str = "strata-schema.toml";

/// Environment variable that enables debug introspection when truthy.
pub const DEBUG_ENV_VAR: &str = "STRATA_SCHEMA_DEBUG";

/// Limits applied by tree walks (validate/freeze).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalLimits {
    /// Maximum number of instances a single walk may visit. Unbounded when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_nodes: Option<usize>,
}

/// A record type declared in the config file.
///
/// ```toml
/// [[record]]
/// name = "Point"
/// fields = { x = "Integer", y = "Integer" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDecl {
    /// Display name, also the name other declarations use in `MemberOf(...)`
    pub name: String,
    /// Field name to slot name (`Integer`, `Optional(String)`, `MemberOf(Point)`, ...)
    pub fields: BTreeMap<String, String>,
    /// Force every instance of this type to be born frozen
    #[serde(default)]
    pub freeze_instances: bool,
}

/// Schema configuration loaded from `strata-schema.toml`.
///
/// # Example
///
/// ```toml
/// debug_introspection = false
///
/// [traversal]
/// max_nodes = 10000
///
/// [[record]]
/// name = "Point"
/// fields = { x = "Integer", y = "Integer" }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Expose internal instance state through the introspection module.
    #[serde(default)]
    pub debug_introspection: bool,
    /// Tree walk limits.
    #[serde(default)]
    pub traversal: TraversalLimits,
    /// Declarative record types, in declaration order.
    #[serde(default, rename = "record", skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<RecordDecl>,
}

impl SchemaConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Strata schema configuration
#
# Expose internal instance state for white-box debugging (default: false).
# Can also be enabled with STRATA_SCHEMA_DEBUG=1.
debug_introspection = false

# Tree walk limits.
[traversal]
# max_nodes = 10000

# Declarative record types. Later declarations may refer to earlier ones.
# [[record]]
# name = "Point"
# fields = { x = "Integer", y = "Integer" }
#
# [[record]]
# name = "Line"
# fields = { a = "MemberOf(Point)", b = "MemberOf(Point)" }
# freeze_instances = true
"#
    }

    /// Parse config from TOML text and check it.
    pub fn from_toml_str(content: &str) -> StrataResult<Self> {
        let config: SchemaConfig = toml::from_str(content).map_err(|e| {
            StrataError::configuration(format!("Failed to parse schema config: {}", e))
        })?;
        config.check()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> StrataResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StrataError::configuration(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Default config with environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply environment overrides on top of this config.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(raw) = std::env::var(DEBUG_ENV_VAR) {
            let enabled = env_flag(&raw);
            debug!(target: "strata::config", var = DEBUG_ENV_VAR, enabled, "debug introspection override");
            self.debug_introspection = enabled;
        }
        self
    }

    /// Reject settings that can never be satisfied.
    pub fn check(&self) -> StrataResult<()> {
        if self.traversal.max_nodes == Some(0) {
            return Err(StrataError::configuration(
                "traversal.max_nodes must be at least 1",
            ));
        }
        let mut seen = std::collections::BTreeSet::new();
        for record in &self.records {
            if record.name.trim().is_empty() {
                return Err(StrataError::configuration("record name must not be empty"));
            }
            if !seen.insert(record.name.as_str()) {
                return Err(StrataError::configuration(format!(
                    "record '{}' is declared twice",
                    record.name
                )));
            }
        }
        Ok(())
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> StrataResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                StrataError::configuration(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> StrataResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            StrataError::configuration(format!("Failed to serialize config: {}", e))
        })?;
        std::fs::write(path, content).map_err(|e| {
            StrataError::configuration(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}

/// Interpret an environment flag value.
pub fn env_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
