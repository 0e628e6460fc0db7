//! Debug introspection of instance internals
//!
//! Unstable. Only available when `debug_introspection` is enabled in the
//! config or `STRATA_SCHEMA_DEBUG` is truthy at first use; otherwise every
//! accessor returns `None`.

use crate::structured::{Family, Instance};
use crate::value::Value;
use once_cell::sync::Lazy;
use strata_core::SchemaConfig;
use tracing::debug;

static ENV_ENABLED: Lazy<bool> = Lazy::new(|| {
    let enabled = SchemaConfig::from_env().debug_introspection;
    if enabled {
        debug!(target: "strata::schema", "debug introspection enabled from environment");
    }
    enabled
});

/// Internal view of one instance
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceDebug {
    /// Process-unique handle id
    pub handle_id: u64,
    /// Owning type's display name
    pub type_name: String,
    /// Owning type's family
    pub family: Family,
    /// Frozen flag
    pub frozen: bool,
    /// Number of fields, elements or entries
    pub len: usize,
    /// Private data as a plain value (object, array, or object keyed by rendered key)
    pub data: Value,
}

/// Whether introspection is enabled through the environment
pub fn enabled() -> bool {
    *ENV_ENABLED
}

/// Internal view of `instance`, gated by the environment
pub fn debug_view(instance: &Instance) -> Option<InstanceDebug> {
    enabled().then(|| view(instance))
}

/// Internal view of `instance`, gated by `config`
pub fn debug_view_with(config: &SchemaConfig, instance: &Instance) -> Option<InstanceDebug> {
    config.debug_introspection.then(|| view(instance))
}

fn view(instance: &Instance) -> InstanceDebug {
    let data = match instance {
        Instance::Record(r) => Value::Object(r.snapshot().into_iter().collect()),
        Instance::Sequence(s) => Value::Array(s.snapshot()),
        Instance::Mapping(m) => Value::Object(
            m.entries()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        ),
    };
    InstanceDebug {
        handle_id: instance.id(),
        type_name: instance.type_name().to_string(),
        family: instance.family(),
        frozen: instance.is_frozen(),
        len: instance.len(),
        data,
    }
}
