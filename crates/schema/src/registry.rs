//! Named structured types
//!
//! A [`TypeRegistry`] maps display names to types so that slot declarations
//! can say `MemberOf(Point)`. It is also the target of declarative record
//! schemas loaded from `strata-schema.toml`.

use crate::record::RecordType;
use crate::structured::{StructuredType, TypeOptions};
use std::collections::BTreeMap;
use strata_core::{SchemaConfig, StrataError, StrataResult};
use tracing::debug;

/// Name → type lookup table
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: BTreeMap<String, StructuredType>,
}

impl TypeRegistry {
    /// Build record types declared in `config`, in declaration order
    ///
    /// Each declaration may refer to the ones before it through `MemberOf`.
    ///
    /// # Errors
    ///
    /// Configuration error for empty/invalid shapes, unknown slot names, or
    /// references to types not yet declared.
    pub fn from_config(config: &SchemaConfig) -> StrataResult<Self> {
        config.check()?;
        let mut registry = TypeRegistry::default();
        for decl in &config.records {
            let options = TypeOptions::default()
                .named(decl.name.clone())
                .freeze_instances(decl.freeze_instances);
            let ty = RecordType::create_in(
                decl.fields.iter().map(|(k, v)| (k.clone(), v.clone())),
                options,
                &registry,
            )
            .map_err(|e| {
                StrataError::configuration(format!("record '{}': {}", decl.name, e.message()))
            })?;
            registry.register(ty)?;
        }
        debug!(target: "strata::schema", types = registry.len(), "registry built from config");
        Ok(registry)
    }

    /// Add a type under its display name
    ///
    /// # Errors
    ///
    /// Configuration error if the name is already taken.
    pub fn register(&mut self, ty: impl Into<StructuredType>) -> StrataResult<()> {
        let ty = ty.into();
        let name = ty.name().to_string();
        if self.types.contains_key(&name) {
            return Err(StrataError::configuration(format!(
                "type '{}' is already registered",
                name
            )));
        }
        self.types.insert(name, ty);
        Ok(())
    }

    /// Type by display name
    pub fn get(&self, name: &str) -> Option<&StructuredType> {
        self.types.get(name)
    }

    /// Record type by display name
    pub fn record(&self, name: &str) -> Option<&RecordType> {
        match self.types.get(name) {
            Some(StructuredType::Record(ty)) => Some(ty),
            _ => None,
        }
    }

    /// Registered names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
