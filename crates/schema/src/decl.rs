//! Slot declarations
//!
//! Type factories accept a [`SlotDecl`] wherever a slot is expected. It is
//! resolved exactly once, at type construction, into a concrete [`Slot`].
//!
//! Name grammar:
//!
//! ```text
//! decl := builtin | "Optional(" decl ")" | "MemberOf(" type-name ")"
//! ```
//!
//! `MemberOf` names are looked up in a [`TypeRegistry`].

use crate::registry::TypeRegistry;
use crate::slot::{Slot, SlotFormatter, SlotValidator};
use crate::value::Value;
use std::fmt;
use std::sync::Arc;
use strata_core::{StrataError, StrataResult};

/// Anything that resolves to a slot
#[derive(Clone)]
pub enum SlotDecl {
    /// An existing slot
    Slot(Slot),
    /// A name from the declaration grammar
    Named(String),
    /// Inline validator (and optional formatter)
    Inline {
        /// Validator
        validator: SlotValidator,
        /// Formatter, `Display` when absent
        formatter: Option<SlotFormatter>,
    },
}

impl SlotDecl {
    /// Inline declaration from a validator
    pub fn inline<V>(validator: V) -> Self
    where
        V: Fn(&Value) -> (Option<Value>, Option<String>) + Send + Sync + 'static,
    {
        SlotDecl::Inline {
            validator: Arc::new(validator),
            formatter: None,
        }
    }

    /// Resolve without any named types in scope
    pub fn resolve(&self) -> StrataResult<Slot> {
        self.resolve_in(&TypeRegistry::default())
    }

    /// Resolve with `registry` providing `MemberOf` targets
    ///
    /// # Errors
    ///
    /// Configuration error for unknown names or unknown types.
    pub fn resolve_in(&self, registry: &TypeRegistry) -> StrataResult<Slot> {
        match self {
            SlotDecl::Slot(slot) => Ok(slot.clone()),
            SlotDecl::Named(name) => resolve_name(name, registry),
            SlotDecl::Inline {
                validator,
                formatter,
            } => Ok(Slot::from_parts(Arc::clone(validator), formatter.clone())),
        }
    }
}

fn resolve_name(name: &str, registry: &TypeRegistry) -> StrataResult<Slot> {
    let name = name.trim();
    if let Some(inner) = strip_call(name, "Optional") {
        return Ok(Slot::optional(resolve_name(inner, registry)?));
    }
    if let Some(target) = strip_call(name, "MemberOf") {
        let target = target.trim();
        let ty = registry.get(target).ok_or_else(|| {
            StrataError::configuration(format!("unknown type '{}' in MemberOf", target))
        })?;
        return Ok(Slot::member_of(ty.clone()));
    }
    Slot::builtin(name)
        .ok_or_else(|| StrataError::configuration(format!("unknown slot '{}'", name)))
}

fn strip_call<'a>(s: &'a str, head: &str) -> Option<&'a str> {
    s.strip_prefix(head)?
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')
}

impl From<Slot> for SlotDecl {
    fn from(slot: Slot) -> Self {
        SlotDecl::Slot(slot)
    }
}

impl From<&Slot> for SlotDecl {
    fn from(slot: &Slot) -> Self {
        SlotDecl::Slot(slot.clone())
    }
}

impl From<&str> for SlotDecl {
    fn from(name: &str) -> Self {
        SlotDecl::Named(name.to_string())
    }
}

impl From<String> for SlotDecl {
    fn from(name: String) -> Self {
        SlotDecl::Named(name)
    }
}

impl fmt::Debug for SlotDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotDecl::Slot(slot) => write!(f, "SlotDecl::Slot({})", slot.describe()),
            SlotDecl::Named(name) => write!(f, "SlotDecl::Named({:?})", name),
            SlotDecl::Inline { .. } => f.write_str("SlotDecl::Inline"),
        }
    }
}
