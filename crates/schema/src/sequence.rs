//! Sequence types: contiguous, 1-based, slot-checked elements
//!
//! The index domain of a [`SequenceInstance`] is always exactly
//! `1..=len()`. Writes that would leave a gap are rejected, removals shift
//! later elements down, and every mutation is cross-checked against the
//! type's validator with the single change undone on rejection.

use crate::decl::SlotDecl;
use crate::handle::{Handle, Owner};
use crate::registry::TypeRegistry;
use crate::slot::Slot;
use crate::structured::{
    run_cross_validator, CrossValidator, Family, Instance, InstanceOptions, StructuredType,
    TypeOptions,
};
use crate::value::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use strata_core::{StrataError, StrataResult};
use tracing::debug;

/// Sequence type configuration
#[derive(Clone)]
pub struct SequenceConfig {
    /// Slot every element must satisfy (default `Any`)
    pub value_slot: SlotDecl,
    /// Name, freeze flag and cross-element validator
    pub options: TypeOptions<[Value]>,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        SequenceConfig {
            value_slot: SlotDecl::Slot(Slot::any()),
            options: TypeOptions::default(),
        }
    }
}

impl SequenceConfig {
    /// Set the element slot
    pub fn value_slot(mut self, decl: impl Into<SlotDecl>) -> Self {
        self.value_slot = decl.into();
        self
    }

    /// Set the display name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.options = self.options.named(name);
        self
    }

    /// Force instances to be born frozen
    pub fn freeze_instances(mut self, freeze: bool) -> Self {
        self.options = self.options.freeze_instances(freeze);
        self
    }

    /// Install the cross-element validator
    pub fn validator<F>(mut self, f: F) -> Self
    where
        F: Fn(&[Value]) -> Option<String> + Send + Sync + 'static,
    {
        self.options = self.options.validator(f);
        self
    }
}

struct SequenceTypeInner {
    name: String,
    value_slot: Slot,
    freeze_instances: bool,
    validator: Option<CrossValidator<[Value]>>,
}

/// Immutable sequence schema
#[derive(Clone)]
pub struct SequenceType {
    inner: Arc<SequenceTypeInner>,
}

impl Owner for SequenceType {
    fn display_name(&self) -> &str {
        &self.inner.name
    }
}

fn index_label(index: i64) -> String {
    format!("index {}", index)
}

/// 0-based position of a 1-based index
fn position(index: i64) -> StrataResult<usize> {
    if index < 1 {
        return Err(StrataError::validation_at(
            index_label(index),
            "indices must be positive",
        ));
    }
    Ok((index - 1) as usize)
}

fn gap_error(index: i64, len: usize) -> StrataError {
    StrataError::validation_at(
        index_label(index),
        format!("indices must be contiguous (length is {})", len),
    )
}

impl SequenceType {
    /// Create a sequence type
    ///
    /// # Errors
    ///
    /// Configuration error if the element slot does not resolve.
    pub fn create(config: SequenceConfig) -> StrataResult<Self> {
        Self::create_in(config, &TypeRegistry::default())
    }

    /// Like [`SequenceType::create`], resolving `MemberOf` names in `registry`
    pub fn create_in(config: SequenceConfig, registry: &TypeRegistry) -> StrataResult<Self> {
        let name = config.options.display_name(Family::Sequence)?;
        let value_slot = config.value_slot.resolve_in(registry).map_err(|e| {
            StrataError::configuration(format!("value_slot: {}", e.message()))
        })?;
        debug!(target: "strata::schema", name = %name, slot = %value_slot.describe(), "sequence type created");
        Ok(SequenceType {
            inner: Arc::new(SequenceTypeInner {
                name,
                value_slot,
                freeze_instances: config.options.freeze_instances,
                validator: config.options.validator,
            }),
        })
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Element slot
    pub fn value_slot(&self) -> &Slot {
        &self.inner.value_slot
    }

    /// Whether instances are born frozen
    pub fn freeze_instances(&self) -> bool {
        self.inner.freeze_instances
    }

    /// Type identity
    pub fn same(&self, other: &SequenceType) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Run the cross-element validator on a snapshot
    pub fn check(&self, elements: &[Value]) -> Option<String> {
        run_cross_validator(&self.inner.validator, elements)
    }

    /// Slot check for one element; an accepted `Null` is an absent index
    fn accept(&self, index: i64, value: Value) -> StrataResult<Value> {
        let accepted = self
            .inner
            .value_slot
            .validate(&value)?
            .accept_at(index_label(index))?;
        if accepted.is_null() {
            return Err(StrataError::validation_at(
                index_label(index),
                "indices must be contiguous",
            ));
        }
        Ok(accepted)
    }

    /// Construct with default instance options
    pub fn new_instance<I, V>(&self, elements: I) -> StrataResult<SequenceInstance>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.instantiate(elements, InstanceOptions::default())
    }

    /// Construct from elements in order (index 1 first)
    ///
    /// # Errors
    ///
    /// Configuration error for conflicting frozen flags; validation error
    /// `"index N: <message>"` for the first rejected element, or the
    /// cross-element validator's message.
    pub fn instantiate<I, V>(
        &self,
        elements: I,
        options: InstanceOptions,
    ) -> StrataResult<SequenceInstance>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let frozen = options.resolve(self.name(), self.freeze_instances())?;
        let mut accepted = Vec::new();
        for (i, element) in elements.into_iter().enumerate() {
            accepted.push(self.accept(i as i64 + 1, element.into())?);
        }
        if let Some(reason) = self.check(&accepted) {
            return Err(StrataError::validation(reason));
        }
        Ok(SequenceInstance {
            handle: Handle::new(self.clone(), accepted, frozen),
        })
    }

    /// Construct from explicit `(index, element)` pairs
    ///
    /// The indices must be exactly `1..=n` in any order.
    pub fn from_indexed<I, V>(&self, pairs: I, options: InstanceOptions) -> StrataResult<SequenceInstance>
    where
        I: IntoIterator<Item = (i64, V)>,
        V: Into<Value>,
    {
        let mut indexed = BTreeMap::new();
        for (index, element) in pairs {
            position(index)?;
            if indexed.insert(index, element.into()).is_some() {
                return Err(StrataError::validation_at(index_label(index), "duplicate index"));
            }
        }
        for (expected, index) in (1i64..).zip(indexed.keys()) {
            if *index != expected {
                return Err(StrataError::validation_at(
                    index_label(expected),
                    "indices must be contiguous",
                ));
            }
        }
        self.instantiate(indexed.into_values(), options)
    }

    /// Construct from a `Value::Array` (holes are rejected)
    pub fn from_value(&self, data: &Value, options: InstanceOptions) -> StrataResult<SequenceInstance> {
        match data {
            Value::Array(items) => self.from_indexed(
                items
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(i, v)| (i as i64 + 1, v.clone())),
                options,
            ),
            other => Err(StrataError::validation(format!(
                "{} expects an array, got {}",
                self.name(),
                other.type_name()
            ))),
        }
    }

    /// True iff `value` is an instance created by this type
    pub fn is(&self, value: &Value) -> bool {
        StructuredType::from(self).is(value)
    }

    /// Frozen flag of one of this type's instances
    pub fn is_frozen(&self, value: &Value) -> StrataResult<bool> {
        StructuredType::from(self).is_frozen(value)
    }

    /// Freeze one of this type's instances and everything nested in it
    pub fn freeze(&self, value: &Value) -> StrataResult<()> {
        StructuredType::from(self).freeze(value)
    }

    /// Query-form tree validation; never fails
    pub fn validate(&self, value: &Value) -> (bool, Option<String>) {
        StructuredType::from(self).validate(value)
    }
}

impl fmt::Debug for SequenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceType")
            .field("name", &self.inner.name)
            .field("value_slot", &self.inner.value_slot)
            .field("freeze_instances", &self.inner.freeze_instances)
            .finish()
    }
}

/// Live sequence value
#[derive(Clone)]
pub struct SequenceInstance {
    handle: Handle<SequenceType, Vec<Value>>,
}

impl SequenceInstance {
    /// The creating type
    pub fn sequence_type(&self) -> &SequenceType {
        self.handle.owner()
    }

    /// Process-unique instance id
    pub fn id(&self) -> u64 {
        self.handle.id()
    }

    /// Whether the instance is frozen
    pub fn is_frozen(&self) -> bool {
        self.handle.is_frozen()
    }

    /// Current element count
    pub fn len(&self) -> usize {
        self.handle.read(Vec::len)
    }

    /// True when there are no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at a 1-based index; `Null` past the end
    ///
    /// # Errors
    ///
    /// Validation error for a non-positive index.
    pub fn get(&self, index: i64) -> StrataResult<Value> {
        let pos = position(index)?;
        Ok(self
            .handle
            .read(|elements| elements.get(pos).cloned().unwrap_or(Value::Null)))
    }

    /// Replace the element at an existing index
    ///
    /// # Errors
    ///
    /// Frozen error; validation error for a non-positive index, a rejected
    /// value, an index past the end (it would leave a gap), or a
    /// cross-element rejection (the old element is restored).
    pub fn set(&self, index: i64, value: impl Into<Value>) -> StrataResult<()> {
        self.handle.ensure_mutable()?;
        let pos = position(index)?;
        let ty = self.sequence_type();
        let accepted = ty.accept(index, value.into())?;
        self.handle
            .mutate(
                &index_label(index),
                |elements| {
                    if pos >= elements.len() {
                        return Err(gap_error(index, elements.len()));
                    }
                    Ok(std::mem::replace(&mut elements[pos], accepted))
                },
                |elements| ty.check(elements),
                |elements, previous| elements[pos] = previous,
            )
            .map(|_| ())
    }

    /// Append after the last element
    pub fn push(&self, value: impl Into<Value>) -> StrataResult<()> {
        self.handle.ensure_mutable()?;
        let index = self.len() as i64 + 1;
        self.insert(index, value)
    }

    /// Insert at `index` (`1..=len + 1`), shifting later elements up
    ///
    /// # Errors
    ///
    /// As [`SequenceInstance::set`]; an index beyond `len + 1` would leave a gap.
    pub fn insert(&self, index: i64, value: impl Into<Value>) -> StrataResult<()> {
        self.handle.ensure_mutable()?;
        let pos = position(index)?;
        let ty = self.sequence_type();
        let accepted = ty.accept(index, value.into())?;
        self.handle
            .mutate(
                &index_label(index),
                |elements| {
                    if pos > elements.len() {
                        return Err(gap_error(index, elements.len()));
                    }
                    elements.insert(pos, accepted);
                    Ok(())
                },
                |elements| ty.check(elements),
                |elements, ()| {
                    elements.remove(pos);
                },
            )
    }

    /// Remove the element at `index`, shifting later elements down
    ///
    /// # Errors
    ///
    /// Frozen error; validation error for an index outside `1..=len` or a
    /// cross-element rejection (the element is put back).
    pub fn remove(&self, index: i64) -> StrataResult<Value> {
        self.handle.ensure_mutable()?;
        let pos = position(index)?;
        let ty = self.sequence_type();
        self.handle.mutate(
            &index_label(index),
            |elements| {
                if pos >= elements.len() {
                    return Err(StrataError::validation_at(
                        index_label(index),
                        format!("out of range (length is {})", elements.len()),
                    ));
                }
                Ok(elements.remove(pos))
            },
            |elements| ty.check(elements),
            |elements, removed| elements.insert(pos, removed),
        )
    }

    /// `(index, element)` pairs in order `1..=len`; each call starts afresh
    pub fn entries(&self) -> Vec<(i64, Value)> {
        self.handle.read(|elements| {
            elements
                .iter()
                .enumerate()
                .map(|(i, v)| (i as i64 + 1, v.clone()))
                .collect()
        })
    }

    /// Copy of the current elements
    pub fn snapshot(&self) -> Vec<Value> {
        self.handle.snapshot()
    }

    /// Freeze this instance and every instance reachable from it
    pub fn freeze(&self) -> StrataResult<()> {
        Instance::from(self.clone()).freeze()
    }

    /// Run the type's cross-element validator on the live data
    pub fn check(&self) -> Option<String> {
        self.sequence_type().check(&self.handle.snapshot())
    }

    /// Handle identity
    pub fn same(&self, other: &SequenceInstance) -> bool {
        self.handle.same(&other.handle)
    }

    pub(crate) fn mark_frozen(&self) -> bool {
        self.handle.mark_frozen()
    }
}

impl fmt::Debug for SequenceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceInstance")
            .field("type", &self.sequence_type().name())
            .field("id", &self.id())
            .field("len", &self.len())
            .field("frozen", &self.is_frozen())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::ErrorKind;

    fn ints() -> SequenceType {
        SequenceType::create(SequenceConfig::default().value_slot(Slot::integer()).named("Ints"))
            .unwrap()
    }

    fn ascending() -> SequenceType {
        SequenceType::create(
            SequenceConfig::default()
                .value_slot("Integer")
                .validator(|elements| {
                    elements
                        .windows(2)
                        .any(|w| matches!((&w[0], &w[1]), (Value::Int(a), Value::Int(b)) if a > b))
                        .then(|| "elements must ascend".to_string())
                }),
        )
        .unwrap()
    }

    #[test]
    fn test_construct_and_index() {
        let s = ints().new_instance([2i64, 4, 6]).unwrap();
        assert_eq!(s.len(), 3);
        assert_eq!(s.get(1).unwrap(), Value::Int(2));
        assert_eq!(s.get(3).unwrap(), Value::Int(6));
        assert_eq!(s.get(4).unwrap(), Value::Null);

        let err = s.get(0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("positive"));
        assert!(s.get(-2).is_err());
    }

    #[test]
    fn test_construct_reports_index() {
        let err = ints()
            .new_instance([Value::Int(1), Value::Float(2.0)])
            .unwrap_err();
        assert_eq!(err.message(), "index 2: expected an integer");
    }

    #[test]
    fn test_from_indexed_requires_contiguous_positive_domain() {
        let ty = ints();
        let s = ty
            .from_indexed([(2, 20i64), (1, 10i64), (3, 30i64)], InstanceOptions::default())
            .unwrap();
        assert_eq!(s.snapshot(), vec![Value::Int(10), Value::Int(20), Value::Int(30)]);

        let err = ty
            .from_indexed([(1, 1i64), (3, 3i64)], InstanceOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("indices must be contiguous"));

        let err = ty
            .from_indexed([(0, 1i64), (1, 3i64)], InstanceOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("must be positive"));

        let err = ty
            .from_indexed([(1, 1i64), (1, 3i64)], InstanceOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("duplicate index"));
    }

    #[test]
    fn test_from_value_rejects_holes() {
        let ty = ints();
        let ok = Value::Array(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(ty.from_value(&ok, InstanceOptions::default()).unwrap().len(), 2);

        let holey = Value::Array(vec![Value::Int(1), Value::Null, Value::Int(3)]);
        let err = ty.from_value(&holey, InstanceOptions::default()).unwrap_err();
        assert!(err.to_string().contains("contiguous"));
    }

    #[test]
    fn test_null_elements_are_gaps() {
        let ty = SequenceType::create(SequenceConfig::default().value_slot("Optional(Integer)"))
            .unwrap();

        let err = ty
            .new_instance([Value::Int(1), Value::Null, Value::Int(3)])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.message(), "index 2: indices must be contiguous");

        let s = ty.new_instance([1i64, 2, 3]).unwrap();
        let err = s.set(1, Value::Null).unwrap_err();
        assert_eq!(err.message(), "index 1: indices must be contiguous");
        assert!(s.push(Value::Null).is_err());
        assert!(s.insert(2, Value::Null).is_err());
        assert_eq!(s.snapshot(), vec![Value::Int(1), Value::Int(2), Value::Int(3)]);

        // the snapshot always rebuilds into an equal sequence
        let again = ty
            .from_value(&Value::Array(s.snapshot()), InstanceOptions::default())
            .unwrap();
        assert_eq!(again.snapshot(), s.snapshot());
    }

    #[test]
    fn test_write_past_end_is_a_gap() {
        let s = ints().new_instance([2i64, 4, 6]).unwrap();
        let err = s.set(4, 8i64).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("contiguous"));
        assert_eq!(s.len(), 3);

        s.push(8i64).unwrap();
        assert_eq!(s.len(), 4);
        assert_eq!(s.get(4).unwrap(), Value::Int(8));

        s.set(1, 1i64).unwrap();
        assert_eq!(s.get(1).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_insert_and_remove_shift() {
        let s = ints().new_instance([1i64, 3]).unwrap();
        s.insert(2, 2i64).unwrap();
        assert_eq!(s.snapshot(), vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        s.insert(4, 4i64).unwrap();
        assert!(s.insert(6, 6i64).is_err());

        assert_eq!(s.remove(1).unwrap(), Value::Int(1));
        assert_eq!(s.entries(), vec![(1, Value::Int(2)), (2, Value::Int(3)), (3, Value::Int(4))]);
        assert!(s.remove(9).is_err());
    }

    #[test]
    fn test_cross_validator_rollback() {
        let s = ascending().new_instance([1i64, 5, 9]).unwrap();

        let err = s.set(2, 10i64).unwrap_err();
        assert!(err.to_string().contains("must ascend"));
        assert_eq!(s.get(2).unwrap(), Value::Int(5));

        assert!(s.push(0i64).is_err());
        assert_eq!(s.len(), 3);

        assert!(s.insert(1, 7i64).is_err());
        assert_eq!(s.snapshot(), vec![Value::Int(1), Value::Int(5), Value::Int(9)]);

        s.push(12i64).unwrap();
        assert_eq!(s.len(), 4);
    }

    #[test]
    fn test_remove_rollback() {
        let at_least_two = SequenceType::create(SequenceConfig::default().validator(|e| {
            (e.len() < 2).then(|| "need two elements".to_string())
        }))
        .unwrap();
        let s = at_least_two.new_instance(["a", "b"]).unwrap();
        let err = s.remove(1).unwrap_err();
        assert!(err.to_string().contains("need two elements"));
        assert_eq!(s.snapshot(), vec![Value::from("a"), Value::from("b")]);
    }

    #[test]
    fn test_frozen_sequence_refuses_everything() {
        let s = ints()
            .instantiate([1i64], InstanceOptions::frozen())
            .unwrap();
        assert_eq!(s.set(1, 2i64).unwrap_err().kind(), ErrorKind::Frozen);
        assert_eq!(s.push(2i64).unwrap_err().kind(), ErrorKind::Frozen);
        assert_eq!(s.insert(1, 2i64).unwrap_err().kind(), ErrorKind::Frozen);
        assert_eq!(s.remove(1).unwrap_err().kind(), ErrorKind::Frozen);
        assert_eq!(s.snapshot(), vec![Value::Int(1)]);
    }

    #[test]
    fn test_type_identity() {
        let a = ints();
        let b = ints();
        let s: Value = a.new_instance([1i64]).unwrap().into();
        assert!(a.is(&s));
        assert!(!b.is(&s));
        assert_eq!(a.validate(&s), (true, None));
        assert!(b.is_frozen(&s).is_err());
        assert_eq!(a.name(), "Ints");
        assert!(a.value_slot().same(&Slot::integer()));
    }
}
