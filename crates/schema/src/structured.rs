//! Shared vocabulary of the three structured families
//!
//! - `Family`: Record, Sequence or Mapping
//! - `Instance`: a handle to an instance of any family
//! - `StructuredType`: a type of any family, with the type-level operations
//!   (`is`, `is_frozen`, `freeze`, `validate`)
//! - `TypeOptions` / `InstanceOptions`: construction flags common to all
//!   families

use crate::mapping::{MappingInstance, MappingType};
use crate::record::{RecordInstance, RecordType};
use crate::sequence::{SequenceInstance, SequenceType};
use crate::traverse;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;
use strata_core::{StrataError, StrataResult};

/// Cross-field validator over a family's snapshot type
///
/// Returns `None` to accept, or the rejection message.
pub type CrossValidator<S> = Arc<dyn Fn(&S) -> Option<String> + Send + Sync>;

/// The three structured families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// Closed set of named fields
    Record,
    /// Contiguous 1-based elements
    Sequence,
    /// Open key/value entries
    Mapping,
}

impl Family {
    /// Default display name for types of this family
    pub const fn name(&self) -> &'static str {
        match self {
            Family::Record => "Record",
            Family::Sequence => "Sequence",
            Family::Mapping => "Mapping",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Type-level construction flags
pub struct TypeOptions<S: ?Sized> {
    /// Display name used in messages and by `MemberOf` formatting
    pub name: Option<String>,
    /// Every instance of the type is born frozen
    pub freeze_instances: bool,
    /// Cross-field invariant checked after construction and every mutation
    pub validator: Option<CrossValidator<S>>,
}

impl<S: ?Sized> Default for TypeOptions<S> {
    fn default() -> Self {
        TypeOptions {
            name: None,
            freeze_instances: false,
            validator: None,
        }
    }
}

impl<S: ?Sized> Clone for TypeOptions<S> {
    fn clone(&self) -> Self {
        TypeOptions {
            name: self.name.clone(),
            freeze_instances: self.freeze_instances,
            validator: self.validator.clone(),
        }
    }
}

impl<S: ?Sized> TypeOptions<S> {
    /// Set the display name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Force instances to be born frozen
    pub fn freeze_instances(mut self, freeze: bool) -> Self {
        self.freeze_instances = freeze;
        self
    }

    /// Install the cross-field validator
    pub fn validator<F>(mut self, f: F) -> Self
    where
        F: Fn(&S) -> Option<String> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(f));
        self
    }

    pub(crate) fn display_name(&self, family: Family) -> StrataResult<String> {
        match &self.name {
            Some(name) if name.trim().is_empty() => {
                Err(StrataError::configuration("type name must not be empty"))
            }
            Some(name) => Ok(name.clone()),
            None => Ok(family.name().to_string()),
        }
    }
}

/// Per-instance construction flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstanceOptions {
    /// Explicit frozen request; `Some(false)` conflicts with `freeze_instances`
    pub frozen: Option<bool>,
}

impl InstanceOptions {
    /// Request a frozen instance
    pub fn frozen() -> Self {
        InstanceOptions { frozen: Some(true) }
    }

    /// Explicitly request a mutable instance
    pub fn mutable() -> Self {
        InstanceOptions {
            frozen: Some(false),
        }
    }

    /// Combine the request with the type's flag
    pub(crate) fn resolve(&self, type_name: &str, freeze_instances: bool) -> StrataResult<bool> {
        match self.frozen {
            Some(false) if freeze_instances => Err(StrataError::configuration(format!(
                "{} instances are always frozen; frozen = false is not allowed",
                type_name
            ))),
            Some(frozen) => Ok(frozen || freeze_instances),
            None => Ok(freeze_instances),
        }
    }
}

pub(crate) fn run_cross_validator<S: ?Sized>(
    validator: &Option<CrossValidator<S>>,
    snapshot: &S,
) -> Option<String> {
    validator.as_ref().and_then(|check| check(snapshot))
}

/// Handle to an instance of any structured family
#[derive(Clone)]
pub enum Instance {
    /// Record instance
    Record(RecordInstance),
    /// Sequence instance
    Sequence(SequenceInstance),
    /// Mapping instance
    Mapping(MappingInstance),
}

impl Instance {
    /// Process-unique id of the instance
    pub fn id(&self) -> u64 {
        match self {
            Instance::Record(i) => i.id(),
            Instance::Sequence(i) => i.id(),
            Instance::Mapping(i) => i.id(),
        }
    }

    /// Family of the owning type
    pub fn family(&self) -> Family {
        match self {
            Instance::Record(_) => Family::Record,
            Instance::Sequence(_) => Family::Sequence,
            Instance::Mapping(_) => Family::Mapping,
        }
    }

    /// Display name of the owning type
    pub fn type_name(&self) -> &str {
        match self {
            Instance::Record(i) => i.record_type().name(),
            Instance::Sequence(i) => i.sequence_type().name(),
            Instance::Mapping(i) => i.mapping_type().name(),
        }
    }

    /// The owning type
    pub fn structured_type(&self) -> StructuredType {
        match self {
            Instance::Record(i) => StructuredType::Record(i.record_type().clone()),
            Instance::Sequence(i) => StructuredType::Sequence(i.sequence_type().clone()),
            Instance::Mapping(i) => StructuredType::Mapping(i.mapping_type().clone()),
        }
    }

    /// Whether the instance is frozen
    pub fn is_frozen(&self) -> bool {
        match self {
            Instance::Record(i) => i.is_frozen(),
            Instance::Sequence(i) => i.is_frozen(),
            Instance::Mapping(i) => i.is_frozen(),
        }
    }

    /// Number of fields, elements or entries
    pub fn len(&self) -> usize {
        match self {
            Instance::Record(i) => i.len(),
            Instance::Sequence(i) => i.len(),
            Instance::Mapping(i) => i.len(),
        }
    }

    /// True when there are no fields, elements or entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Freeze this instance and every instance reachable from it
    pub fn freeze(&self) -> StrataResult<()> {
        traverse::freeze_tree(self).map(|_| ())
    }

    /// Run the owning type's cross-field validator against the live data
    pub fn check(&self) -> Option<String> {
        match self {
            Instance::Record(i) => i.check(),
            Instance::Sequence(i) => i.check(),
            Instance::Mapping(i) => i.check(),
        }
    }

    /// Directly contained values (not keys), in enumeration order
    pub fn values(&self) -> Vec<Value> {
        match self {
            Instance::Record(i) => i.entries().into_iter().map(|(_, v)| v).collect(),
            Instance::Sequence(i) => i.snapshot(),
            Instance::Mapping(i) => i.entries().into_iter().map(|(_, v)| v).collect(),
        }
    }

    pub(crate) fn mark_frozen(&self) -> bool {
        match self {
            Instance::Record(i) => i.mark_frozen(),
            Instance::Sequence(i) => i.mark_frozen(),
            Instance::Mapping(i) => i.mark_frozen(),
        }
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Instance::Record(a), Instance::Record(b)) => a.same(b),
            (Instance::Sequence(a), Instance::Sequence(b)) => a.same(b),
            (Instance::Mapping(a), Instance::Mapping(b)) => a.same(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.type_name())
            .field("family", &self.family())
            .field("id", &self.id())
            .field("frozen", &self.is_frozen())
            .finish()
    }
}

impl From<RecordInstance> for Instance {
    fn from(i: RecordInstance) -> Self {
        Instance::Record(i)
    }
}

impl From<SequenceInstance> for Instance {
    fn from(i: SequenceInstance) -> Self {
        Instance::Sequence(i)
    }
}

impl From<MappingInstance> for Instance {
    fn from(i: MappingInstance) -> Self {
        Instance::Mapping(i)
    }
}

impl From<RecordInstance> for Value {
    fn from(i: RecordInstance) -> Self {
        Value::Instance(Instance::Record(i))
    }
}

impl From<SequenceInstance> for Value {
    fn from(i: SequenceInstance) -> Self {
        Value::Instance(Instance::Sequence(i))
    }
}

impl From<MappingInstance> for Value {
    fn from(i: MappingInstance) -> Self {
        Value::Instance(Instance::Mapping(i))
    }
}

/// A structured type of any family
#[derive(Clone)]
pub enum StructuredType {
    /// Record type
    Record(RecordType),
    /// Sequence type
    Sequence(SequenceType),
    /// Mapping type
    Mapping(MappingType),
}

impl StructuredType {
    /// Display name
    pub fn name(&self) -> &str {
        match self {
            StructuredType::Record(t) => t.name(),
            StructuredType::Sequence(t) => t.name(),
            StructuredType::Mapping(t) => t.name(),
        }
    }

    /// Family of the type
    pub fn family(&self) -> Family {
        match self {
            StructuredType::Record(_) => Family::Record,
            StructuredType::Sequence(_) => Family::Sequence,
            StructuredType::Mapping(_) => Family::Mapping,
        }
    }

    /// Whether instances are born frozen
    pub fn freeze_instances(&self) -> bool {
        match self {
            StructuredType::Record(t) => t.freeze_instances(),
            StructuredType::Sequence(t) => t.freeze_instances(),
            StructuredType::Mapping(t) => t.freeze_instances(),
        }
    }

    /// Type identity
    pub fn same(&self, other: &StructuredType) -> bool {
        match (self, other) {
            (StructuredType::Record(a), StructuredType::Record(b)) => a.same(b),
            (StructuredType::Sequence(a), StructuredType::Sequence(b)) => a.same(b),
            (StructuredType::Mapping(a), StructuredType::Mapping(b)) => a.same(b),
            _ => false,
        }
    }

    /// True iff `value` is a live instance created by exactly this type
    pub fn is(&self, value: &Value) -> bool {
        self.own(value).is_some()
    }

    /// Whether `value`, an instance of this type, is frozen
    ///
    /// # Errors
    ///
    /// Lookup error if `value` is not an instance of this type.
    pub fn is_frozen(&self, value: &Value) -> StrataResult<bool> {
        Ok(self.expect_own(value)?.is_frozen())
    }

    /// Freeze `value`, an instance of this type, and everything nested in it
    ///
    /// # Errors
    ///
    /// Lookup error if `value` is not an instance of this type; validation
    /// error if any visited instance fails its cross-field validator.
    pub fn freeze(&self, value: &Value) -> StrataResult<()> {
        let instance = self.expect_own(value)?;
        traverse::freeze_tree(instance).map(|_| ())
    }

    /// Validate `value` and everything nested in it; never fails
    ///
    /// A value that is not an instance of this type is reported invalid.
    pub fn validate(&self, value: &Value) -> (bool, Option<String>) {
        match self.own(value) {
            Some(instance) => traverse::validate_tree(instance),
            None => (false, Some(self.not_own_message(value))),
        }
    }

    fn own<'v>(&self, value: &'v Value) -> Option<&'v Instance> {
        let instance = value.as_instance()?;
        instance.structured_type().same(self).then_some(instance)
    }

    fn expect_own<'v>(&self, value: &'v Value) -> StrataResult<&'v Instance> {
        self.own(value)
            .ok_or_else(|| StrataError::lookup(self.not_own_message(value)))
    }

    fn not_own_message(&self, value: &Value) -> String {
        match value {
            Value::Instance(other) => format!(
                "expected an instance of {}, got an instance of {}",
                self.name(),
                other.type_name()
            ),
            other => format!(
                "expected an instance of {}, got {}",
                self.name(),
                other.type_name()
            ),
        }
    }
}

impl fmt::Debug for StructuredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Type({})", self.family(), self.name())
    }
}

impl From<RecordType> for StructuredType {
    fn from(t: RecordType) -> Self {
        StructuredType::Record(t)
    }
}

impl From<&RecordType> for StructuredType {
    fn from(t: &RecordType) -> Self {
        StructuredType::Record(t.clone())
    }
}

impl From<SequenceType> for StructuredType {
    fn from(t: SequenceType) -> Self {
        StructuredType::Sequence(t)
    }
}

impl From<&SequenceType> for StructuredType {
    fn from(t: &SequenceType) -> Self {
        StructuredType::Sequence(t.clone())
    }
}

impl From<MappingType> for StructuredType {
    fn from(t: MappingType) -> Self {
        StructuredType::Mapping(t)
    }
}

impl From<&MappingType> for StructuredType {
    fn from(t: &MappingType) -> Self {
        StructuredType::Mapping(t.clone())
    }
}
