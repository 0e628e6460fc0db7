//! Slots, structured types and tree traversal for Strata
//!
//! This crate provides the runtime schema layer for dynamically-shaped data:
//! - Value: the dynamic value model (`Value`, `MapKey`)
//! - Slot: per-value validate/format contracts, built-ins and combinators
//! - Constraint: array and map container slots
//! - Record / Sequence / Mapping: the three structured type families
//! - Traverse: breadth-first validate and freeze over nested instances
//! - Registry: named types, including record types declared in `strata-schema.toml`
//! - Introspect: gated debug view of instance internals
//!
//! Instances are handles. Cloning an instance shares its state; equality of
//! instances is identity. Once frozen, an instance can never be mutated.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod handle;

pub mod constraint;
pub mod decl;
pub mod introspect;
pub mod mapping;
pub mod record;
pub mod registry;
pub mod sequence;
pub mod slot;
pub mod structured;
pub mod traverse;
pub mod value;

pub use constraint::{ArrayConstraint, MapConstraint};
pub use decl::SlotDecl;
pub use introspect::{debug_view, debug_view_with, InstanceDebug};
pub use mapping::{Entries, MappingConfig, MappingInstance, MappingType};
pub use record::{Fields, RecordInstance, RecordType};
pub use registry::TypeRegistry;
pub use sequence::{SequenceConfig, SequenceInstance, SequenceType};
pub use slot::{Slot, SlotFormatter, SlotOp, SlotOutput, SlotValidator, Verdict};
pub use structured::{CrossValidator, Family, Instance, InstanceOptions, StructuredType, TypeOptions};
pub use traverse::{
    freeze_tree, is_structured_instance, is_structured_type, nested_children, validate_tree,
    validate_tree_all, TreeReport, TreeWalker,
};
pub use value::{MapKey, Value};

pub use strata_core::{
    ErrorKind, RecordDecl, SchemaConfig, StrataError, StrataResult, TraversalLimits,
    CONFIG_FILE_NAME, DEBUG_ENV_VAR,
};
