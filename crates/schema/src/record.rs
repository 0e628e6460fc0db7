//! Record types: closed sets of named, slot-checked fields
//!
//! ## Design
//!
//! A [`RecordType`] is an immutable schema: field name → [`Slot`], a
//! `freeze_instances` flag and an optional cross-field validator over the
//! whole [`Fields`] snapshot. A [`RecordInstance`] always holds exactly the
//! declared field set; absent input fields are stored as `Null` (and must be
//! accepted by their slot).
//!
//! Writes are validated by the field's slot, staged, then cross-checked. A
//! cross-check rejection restores the previous value of that one field.
//!
//! ## Example
//!
//! ```
//! use strata_schema::{RecordType, TypeOptions, Fields, Value};
//!
//! let range = RecordType::create(
//!     [("low", "Integer"), ("high", "Integer")],
//!     TypeOptions::default()
//!         .named("Range")
//!         .validator(|f: &Fields| match (&f["low"], &f["high"]) {
//!             (Value::Int(lo), Value::Int(hi)) if lo > hi => {
//!                 Some("low must not be greater than high".to_string())
//!             }
//!             _ => None,
//!         }),
//! )?;
//!
//! let r = range.new_instance([("low", 10i64), ("high", 20i64)])?;
//! r.set("low", 15i64)?;
//! assert!(r.set("low", 100i64).is_err());
//! assert_eq!(r.get("low")?, Value::Int(15));
//! # Ok::<(), strata_schema::StrataError>(())
//! ```

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

/// Record snapshot: field name → current value
pub type Fields = BTreeMap<String, Value>;

struct RecordTypeInner {
    name: String,
    slots: BTreeMap<String, Slot>,
    freeze_instances: bool,
    validator: Option<CrossValidator<Fields>>,
}

/// Immutable record schema
#[derive(Clone)]
pub struct RecordType {
    inner: Arc<RecordTypeInner>,
}

impl Owner for RecordType {
    fn display_name(&self) -> &str {
        &self.inner.name
    }
}

/// Field names are identifiers: `[A-Za-z_][A-Za-z0-9_]*`
fn is_valid_field_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

impl RecordType {
    /// Create a record type from a non-empty shape
    ///
    /// # Errors
    ///
    /// Configuration error on an empty shape, an invalid or duplicate field
    /// name, or a slot declaration that does not resolve.
    pub fn create<I, K, D>(shape: I, options: TypeOptions<Fields>) -> StrataResult<Self>
    where
        I: IntoIterator<Item = (K, D)>,
        K: Into<String>,
        D: Into<SlotDecl>,
    {
        Self::create_in(shape, options, &TypeRegistry::default())
    }

    /// Like [`RecordType::create`], resolving `MemberOf` names in `registry`
    pub fn create_in<I, K, D>(
        shape: I,
        options: TypeOptions<Fields>,
        registry: &TypeRegistry,
    ) -> StrataResult<Self>
    where
        I: IntoIterator<Item = (K, D)>,
        K: Into<String>,
        D: Into<SlotDecl>,
    {
        let name = options.display_name(Family::Record)?;
        let mut slots = BTreeMap::new();
        for (field, decl) in shape {
            let field: String = field.into();
            if !is_valid_field_name(&field) {
                return Err(StrataError::configuration(format!(
                    "invalid field name '{}'",
                    field
                )));
            }
            let slot = decl.into().resolve_in(registry).map_err(|e| {
                StrataError::configuration(format!("field '{}': {}", field, e.message()))
            })?;
            if slots.insert(field.clone(), slot).is_some() {
                return Err(StrataError::configuration(format!(
                    "duplicate field '{}'",
                    field
                )));
            }
        }
        if slots.is_empty() {
            return Err(StrataError::configuration(
                "record shape must declare at least one field",
            ));
        }

        debug!(target: "strata::schema", name = %name, fields = slots.len(), "record type created");
        Ok(RecordType {
            inner: Arc::new(RecordTypeInner {
                name,
                slots,
                freeze_instances: options.freeze_instances,
                validator: options.validator,
            }),
        })
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Field slots (a copy; the type itself is immutable)
    pub fn slots(&self) -> BTreeMap<String, Slot> {
        self.inner.slots.clone()
    }

    /// Slot of one field
    pub fn slot(&self, field: &str) -> Option<&Slot> {
        self.inner.slots.get(field)
    }

    /// Declared field names, sorted
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.inner.slots.keys().map(String::as_str)
    }

    /// Whether instances are born frozen
    pub fn freeze_instances(&self) -> bool {
        self.inner.freeze_instances
    }

    /// Type identity
    pub fn same(&self, other: &RecordType) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Run the cross-field validator on a snapshot
    pub fn check(&self, fields: &Fields) -> Option<String> {
        run_cross_validator(&self.inner.validator, fields)
    }

    /// Construct with default instance options
    pub fn new_instance<I, K, V>(&self, data: I) -> StrataResult<RecordInstance>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.instantiate(data, InstanceOptions::default())
    }

    /// Construct an instance
    ///
    /// # Errors
    ///
    /// - Configuration error for `frozen = Some(false)` on a `freeze_instances` type
    /// - Lookup error for an input field the type does not declare
    /// - Validation error `"<field>: <message>"` for the first rejected field
    ///   (sorted field order), or the cross-field validator's message
    pub fn instantiate<I, K, V>(
        &self,
        data: I,
        options: InstanceOptions,
    ) -> StrataResult<RecordInstance>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let frozen = options.resolve(self.name(), self.freeze_instances())?;
        let mut input: BTreeMap<String, Value> = data
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        if let Some(unknown) = input.keys().find(|k| !self.inner.slots.contains_key(*k)) {
            return Err(self.unknown_field(unknown));
        }

        let mut fields = Fields::new();
        for (field, slot) in &self.inner.slots {
            let value = input.remove(field).unwrap_or(Value::Null);
            let accepted = slot.validate(&value)?.accept_at(field)?;
            fields.insert(field.clone(), accepted);
        }

        if let Some(reason) = self.check(&fields) {
            return Err(StrataError::validation(reason));
        }

        Ok(RecordInstance {
            handle: Handle::new(self.clone(), fields, frozen),
        })
    }

    /// Construct from a `Value::Object`
    pub fn from_value(&self, data: &Value, options: InstanceOptions) -> StrataResult<RecordInstance> {
        match data {
            Value::Object(map) => self.instantiate(map.clone(), options),
            other => Err(StrataError::validation(format!(
                "{} expects an object, got {}",
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

    fn unknown_field(&self, field: &str) -> StrataError {
        StrataError::lookup(format!("{} has no field '{}'", self.name(), field))
    }
}

impl fmt::Debug for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordType")
            .field("name", &self.inner.name)
            .field("slots", &self.inner.slots)
            .field("freeze_instances", &self.inner.freeze_instances)
            .finish()
    }
}

/// Live record value
#[derive(Clone)]
pub struct RecordInstance {
    handle: Handle<RecordType, Fields>,
}

impl RecordInstance {
    /// The creating type
    pub fn record_type(&self) -> &RecordType {
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

    /// Number of declared fields
    pub fn len(&self) -> usize {
        self.record_type().inner.slots.len()
    }

    /// Always false: record shapes are non-empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read a field; nested instances are shared, not copied
    ///
    /// # Errors
    ///
    /// Lookup error if the field is not declared.
    pub fn get(&self, field: &str) -> StrataResult<Value> {
        if self.record_type().slot(field).is_none() {
            return Err(self.record_type().unknown_field(field));
        }
        Ok(self
            .handle
            .read(|fields| fields.get(field).cloned().unwrap_or(Value::Null)))
    }

    /// Write a field
    ///
    /// # Errors
    ///
    /// Lookup error (undeclared), frozen error, or validation error (slot or
    /// cross-field rejection). On cross-field rejection the field keeps its
    /// previous value.
    pub fn set(&self, field: &str, value: impl Into<Value>) -> StrataResult<()> {
        let ty = self.record_type();
        let slot = ty.slot(field).ok_or_else(|| ty.unknown_field(field))?;
        self.handle.ensure_mutable()?;
        let accepted = slot.validate(&value.into())?.accept_at(field)?;

        let key = field.to_string();
        let undo_key = key.clone();
        self.handle
            .mutate(
                field,
                move |fields| Ok(fields.insert(key, accepted)),
                |fields| ty.check(fields),
                move |fields, previous| match previous {
                    Some(previous) => {
                        fields.insert(undo_key, previous);
                    }
                    None => {
                        fields.remove(&undo_key);
                    }
                },
            )
            .map(|_| ())
    }

    /// `(field, value)` pairs in sorted field order; each call starts afresh
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.handle
            .read(|fields| fields.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    /// Copy of the current data
    pub fn snapshot(&self) -> Fields {
        self.handle.snapshot()
    }

    /// Freeze this instance and every instance reachable from it
    pub fn freeze(&self) -> StrataResult<()> {
        Instance::from(self.clone()).freeze()
    }

    /// Run the type's cross-field validator on the live data
    pub fn check(&self) -> Option<String> {
        self.record_type().check(&self.handle.snapshot())
    }

    /// Handle identity
    pub fn same(&self, other: &RecordInstance) -> bool {
        self.handle.same(&other.handle)
    }

    pub(crate) fn mark_frozen(&self) -> bool {
        self.handle.mark_frozen()
    }
}

impl fmt::Debug for RecordInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordInstance")
            .field("type", &self.record_type().name())
            .field("id", &self.id())
            .field("frozen", &self.is_frozen())
            .finish()
    }
}
