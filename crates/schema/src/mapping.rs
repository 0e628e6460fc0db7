//! Mapping types: open key/value sets with slot-checked keys and values
//!
//! Keys are presented to the key slot as plain values and, once accepted,
//! stored as [`MapKey`]s. Only hashable scalars (booleans, integers, strings,
//! bytes) can become keys. Reads and writes with a key the key slot refuses
//! are lookup errors: such a key can never be present.

use crate::decl::SlotDecl;
use crate::handle::{Handle, Owner};
use crate::registry::TypeRegistry;
use crate::slot::{Slot, Verdict};
use crate::structured::{
    run_cross_validator, CrossValidator, Family, Instance, InstanceOptions, StructuredType,
    TypeOptions,
};
use crate::value::{MapKey, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use strata_core::{StrataError, StrataResult};
use tracing::debug;

/// Mapping snapshot: key → current value
pub type Entries = HashMap<MapKey, Value>;

/// Mapping type configuration
#[derive(Clone)]
pub struct MappingConfig {
    /// Slot every key must satisfy (default `Any`)
    pub key_slot: SlotDecl,
    /// Slot every value must satisfy (default `Any`)
    pub value_slot: SlotDecl,
    /// Name, freeze flag and cross-entry validator
    pub options: TypeOptions<Entries>,
}

impl Default for MappingConfig {
    fn default() -> Self {
        MappingConfig {
            key_slot: SlotDecl::Slot(Slot::any()),
            value_slot: SlotDecl::Slot(Slot::any()),
            options: TypeOptions::default(),
        }
    }
}

impl MappingConfig {
    /// Set the key slot
    pub fn key_slot(mut self, decl: impl Into<SlotDecl>) -> Self {
        self.key_slot = decl.into();
        self
    }

    /// Set the value slot
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

    /// Install the cross-entry validator
    pub fn validator<F>(mut self, f: F) -> Self
    where
        F: Fn(&Entries) -> Option<String> + Send + Sync + 'static,
    {
        self.options = self.options.validator(f);
        self
    }
}

struct MappingTypeInner {
    name: String,
    key_slot: Slot,
    value_slot: Slot,
    freeze_instances: bool,
    validator: Option<CrossValidator<Entries>>,
}

/// Immutable mapping schema
#[derive(Clone)]
pub struct MappingType {
    inner: Arc<MappingTypeInner>,
}

impl Owner for MappingType {
    fn display_name(&self) -> &str {
        &self.inner.name
    }
}

fn render_key(key: &Value) -> String {
    match key {
        Value::String(s) => format!("{:?}", s),
        other => other.to_string(),
    }
}

impl MappingType {
    /// Create a mapping type
    ///
    /// # Errors
    ///
    /// Configuration error if either slot does not resolve.
    pub fn create(config: MappingConfig) -> StrataResult<Self> {
        Self::create_in(config, &TypeRegistry::default())
    }

    /// Like [`MappingType::create`], resolving `MemberOf` names in `registry`
    pub fn create_in(config: MappingConfig, registry: &TypeRegistry) -> StrataResult<Self> {
        let name = config.options.display_name(Family::Mapping)?;
        let key_slot = config
            .key_slot
            .resolve_in(registry)
            .map_err(|e| StrataError::configuration(format!("key_slot: {}", e.message())))?;
        let value_slot = config
            .value_slot
            .resolve_in(registry)
            .map_err(|e| StrataError::configuration(format!("value_slot: {}", e.message())))?;
        debug!(
            target: "strata::schema",
            name = %name,
            key = %key_slot.describe(),
            value = %value_slot.describe(),
            "mapping type created"
        );
        Ok(MappingType {
            inner: Arc::new(MappingTypeInner {
                name,
                key_slot,
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

    /// Key slot
    pub fn key_slot(&self) -> &Slot {
        &self.inner.key_slot
    }

    /// Value slot
    pub fn value_slot(&self) -> &Slot {
        &self.inner.value_slot
    }

    /// Whether instances are born frozen
    pub fn freeze_instances(&self) -> bool {
        self.inner.freeze_instances
    }

    /// Type identity
    pub fn same(&self, other: &MappingType) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Run the cross-entry validator on a snapshot
    pub fn check(&self, entries: &Entries) -> Option<String> {
        run_cross_validator(&self.inner.validator, entries)
    }

    /// Key slot verdict turned into a stored key, or the refusal message
    fn admit_key(&self, key: &Value) -> StrataResult<Result<MapKey, String>> {
        Ok(match self.inner.key_slot.validate(key)? {
            Verdict::Rejected(msg) => Err(msg),
            Verdict::Accepted(accepted) => MapKey::from_value(accepted).map_err(|other| {
                format!("key is not a hashable scalar, got {}", other.type_name())
            }),
        })
    }

    /// Key for a read or write; a refused key is a lookup error
    fn lookup_key(&self, key: &Value) -> StrataResult<MapKey> {
        self.admit_key(key)?.map_err(|msg| {
            StrataError::lookup(format!("{} key {}: {}", self.name(), render_key(key), msg))
        })
    }

    fn accept_value(&self, key: &MapKey, value: Value) -> StrataResult<Value> {
        self.inner
            .value_slot
            .validate(&value)?
            .accept_at(format!("value at {}", key))
    }

    /// Construct with default instance options
    pub fn new_instance<I, K, V>(&self, pairs: I) -> StrataResult<MappingInstance>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Value>,
        V: Into<Value>,
    {
        self.instantiate(pairs, InstanceOptions::default())
    }

    /// Construct from `(key, value)` pairs; a repeated key keeps the last value
    ///
    /// A value accepted as `Null` leaves its key absent.
    ///
    /// # Errors
    ///
    /// Configuration error for conflicting frozen flags; validation error for
    /// the first refused key (`key K: ...`) or value (`value at K: ...`), or
    /// the cross-entry validator's message.
    pub fn instantiate<I, K, V>(
        &self,
        pairs: I,
        options: InstanceOptions,
    ) -> StrataResult<MappingInstance>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Value>,
        V: Into<Value>,
    {
        let frozen = options.resolve(self.name(), self.freeze_instances())?;
        let mut entries = Entries::new();
        for (key, value) in pairs {
            let key = key.into();
            let stored = self
                .admit_key(&key)?
                .map_err(|msg| StrataError::validation_at(format!("key {}", render_key(&key)), msg))?;
            let accepted = self.accept_value(&stored, value.into())?;
            if accepted.is_null() {
                entries.remove(&stored);
            } else {
                entries.insert(stored, accepted);
            }
        }
        if let Some(reason) = self.check(&entries) {
            return Err(StrataError::validation(reason));
        }
        Ok(MappingInstance {
            handle: Handle::new(self.clone(), entries, frozen),
        })
    }

    /// Construct from a `Value::Object`
    pub fn from_value(&self, data: &Value, options: InstanceOptions) -> StrataResult<MappingInstance> {
        match data {
            Value::Object(map) => self.instantiate(
                map.iter().map(|(k, v)| (k.clone(), v.clone())),
                options,
            ),
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
}

impl fmt::Debug for MappingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappingType")
            .field("name", &self.inner.name)
            .field("key_slot", &self.inner.key_slot)
            .field("value_slot", &self.inner.value_slot)
            .field("freeze_instances", &self.inner.freeze_instances)
            .finish()
    }
}

/// Live mapping value
#[derive(Clone)]
pub struct MappingInstance {
    handle: Handle<MappingType, Entries>,
}

impl MappingInstance {
    /// The creating type
    pub fn mapping_type(&self) -> &MappingType {
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

    /// Number of entries
    pub fn len(&self) -> usize {
        self.handle.read(Entries::len)
    }

    /// True when there are no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value under `key`; `Null` when absent
    ///
    /// # Errors
    ///
    /// Lookup error if the key slot refuses `key`.
    pub fn get(&self, key: impl Into<Value>) -> StrataResult<Value> {
        let key = self.mapping_type().lookup_key(&key.into())?;
        Ok(self
            .handle
            .read(|entries| entries.get(&key).cloned().unwrap_or(Value::Null)))
    }

    /// Whether `key` is present
    pub fn contains_key(&self, key: impl Into<Value>) -> StrataResult<bool> {
        let key = self.mapping_type().lookup_key(&key.into())?;
        Ok(self.handle.read(|entries| entries.contains_key(&key)))
    }

    /// Insert or replace the value under `key`
    ///
    /// A value the slot accepts as `Null` removes `key` instead, exactly as
    /// [`MappingInstance::remove`] does.
    ///
    /// # Errors
    ///
    /// Lookup error (refused key), frozen error, or validation error (value
    /// slot or cross-entry rejection). On cross-entry rejection the previous
    /// value is restored, or the new key removed again.
    pub fn set(&self, key: impl Into<Value>, value: impl Into<Value>) -> StrataResult<()> {
        let ty = self.mapping_type();
        let key = ty.lookup_key(&key.into())?;
        self.handle.ensure_mutable()?;
        let accepted = ty.accept_value(&key, value.into())?;
        if accepted.is_null() {
            return self.remove_entry(key).map(|_| ());
        }

        let context = format!("key {}", key);
        let undo_key = key.clone();
        self.handle
            .mutate(
                &context,
                move |entries| Ok(entries.insert(key, accepted)),
                |entries| ty.check(entries),
                move |entries, previous| match previous {
                    Some(previous) => {
                        entries.insert(undo_key, previous);
                    }
                    None => {
                        entries.remove(&undo_key);
                    }
                },
            )
            .map(|_| ())
    }

    /// Remove `key`, returning its value (`Null` when it was absent)
    ///
    /// # Errors
    ///
    /// Lookup error (refused key), frozen error, or a cross-entry rejection
    /// (the entry is put back).
    pub fn remove(&self, key: impl Into<Value>) -> StrataResult<Value> {
        let key = self.mapping_type().lookup_key(&key.into())?;
        self.handle.ensure_mutable()?;
        Ok(self.remove_entry(key)?.unwrap_or(Value::Null))
    }

    fn remove_entry(&self, key: MapKey) -> StrataResult<Option<Value>> {
        let ty = self.mapping_type();
        let context = format!("key {}", key);
        let undo_key = key.clone();
        self.handle
            .mutate(
                &context,
                move |entries| Ok(entries.remove(&key)),
                |entries| ty.check(entries),
                move |entries, removed| {
                    if let Some(removed) = removed {
                        entries.insert(undo_key, removed);
                    }
                },
            )
    }

    /// `(key, value)` pairs collected at call time; order is unspecified
    pub fn entries(&self) -> Vec<(MapKey, Value)> {
        self.handle
            .read(|entries| entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    /// Keys collected at call time
    pub fn keys(&self) -> Vec<MapKey> {
        self.handle.read(|entries| entries.keys().cloned().collect())
    }

    /// Copy of the current entries
    pub fn snapshot(&self) -> Entries {
        self.handle.snapshot()
    }

    /// Freeze this instance and every instance reachable from it
    pub fn freeze(&self) -> StrataResult<()> {
        Instance::from(self.clone()).freeze()
    }

    /// Run the type's cross-entry validator on the live data
    pub fn check(&self) -> Option<String> {
        self.mapping_type().check(&self.handle.snapshot())
    }

    /// Handle identity
    pub fn same(&self, other: &MappingInstance) -> bool {
        self.handle.same(&other.handle)
    }

    pub(crate) fn mark_frozen(&self) -> bool {
        self.handle.mark_frozen()
    }
}

impl fmt::Debug for MappingInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappingInstance")
            .field("type", &self.mapping_type().name())
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

    fn scores() -> MappingType {
        MappingType::create(
            MappingConfig::default()
                .key_slot("String")
                .value_slot("Integer")
                .named("Scores"),
        )
        .unwrap()
    }

    fn budget(limit: i64) -> MappingType {
        MappingType::create(
            MappingConfig::default()
                .key_slot(Slot::string())
                .value_slot(Slot::integer())
                .validator(move |entries| {
                    let total: i64 = entries.values().filter_map(Value::as_int).sum();
                    (total > limit).then(|| format!("total {} exceeds {}", total, limit))
                }),
        )
        .unwrap()
    }

    #[test]
    fn test_construct_and_read() {
        let m = scores().new_instance([("ann", 3i64), ("bob", 5i64)]).unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m.get("ann").unwrap(), Value::Int(3));
        assert_eq!(m.get("zed").unwrap(), Value::Null);
        assert!(m.contains_key("bob").unwrap());
        assert!(!m.contains_key("zed").unwrap());

        let mut keys = m.keys();
        keys.sort();
        assert_eq!(keys, vec![MapKey::from("ann"), MapKey::from("bob")]);
    }

    #[test]
    fn test_construction_errors_name_the_key() {
        let err = scores().new_instance([("ann", Value::Float(1.5))]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.message(), "value at \"ann\": expected an integer");

        let err = scores().new_instance([(7i64, 1i64)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.message(), "key 7: expected a string");
    }

    #[test]
    fn test_unhashable_keys_are_refused() {
        let any = MappingType::create(MappingConfig::default()).unwrap();
        let err = any.new_instance([(Value::Float(1.0), 1i64)]).unwrap_err();
        assert!(err.to_string().contains("not a hashable scalar"));

        let m = any.new_instance([(true, "yes"), (false, "no")]).unwrap();
        assert_eq!(m.get(true).unwrap(), Value::from("yes"));
        assert_eq!(m.get(Value::Float(1.0)).unwrap_err().kind(), ErrorKind::Lookup);
    }

    #[test]
    fn test_refused_key_on_access_is_lookup_error() {
        let m = scores().new_instance([("ann", 1i64)]).unwrap();
        assert_eq!(m.get(1i64).unwrap_err().kind(), ErrorKind::Lookup);
        assert_eq!(m.set(1i64, 2i64).unwrap_err().kind(), ErrorKind::Lookup);
        assert_eq!(m.remove(1i64).unwrap_err().kind(), ErrorKind::Lookup);
    }

    #[test]
    fn test_set_and_remove() {
        let m = scores().new_instance(Vec::<(&str, i64)>::new()).unwrap();
        assert!(m.is_empty());
        m.set("ann", 1i64).unwrap();
        m.set("ann", 2i64).unwrap();
        assert_eq!(m.get("ann").unwrap(), Value::Int(2));

        let err = m.set("ann", "two").unwrap_err();
        assert_eq!(err.message(), "value at \"ann\": expected an integer");
        assert_eq!(m.get("ann").unwrap(), Value::Int(2));

        assert_eq!(m.remove("ann").unwrap(), Value::Int(2));
        assert_eq!(m.remove("ann").unwrap(), Value::Null);
        assert!(m.is_empty());
    }

    #[test]
    fn test_cross_validator_rolls_back_new_and_replaced_entries() {
        let m = budget(10).new_instance([("a", 4i64), ("b", 4i64)]).unwrap();

        let err = m.set("c", 5i64).unwrap_err();
        assert!(err.to_string().contains("exceeds 10"));
        assert!(!m.contains_key("c").unwrap());
        assert_eq!(m.len(), 2);

        let err = m.set("a", 9i64).unwrap_err();
        assert!(err.to_string().contains("total 13"));
        assert_eq!(m.get("a").unwrap(), Value::Int(4));

        let err = budget(3).new_instance([("a", 4i64)]).unwrap_err();
        assert!(err.to_string().contains("exceeds 3"));
    }

    #[test]
    fn test_remove_rollback() {
        let needs_a = MappingType::create(MappingConfig::default().validator(|entries| {
            (!entries.contains_key(&MapKey::from("a"))).then(|| "a is required".to_string())
        }))
        .unwrap();
        let m = needs_a.new_instance([("a", 1i64), ("b", 2i64)]).unwrap();
        assert!(m.remove("a").is_err());
        assert_eq!(m.get("a").unwrap(), Value::Int(1));
        assert_eq!(m.remove("b").unwrap(), Value::Int(2));
    }

    #[test]
    fn test_null_value_removes_entry() {
        let optional = MappingType::create(
            MappingConfig::default()
                .key_slot("String")
                .value_slot("Optional(Integer)")
                .validator(|entries| {
                    (!entries.contains_key(&MapKey::from("keep")))
                        .then(|| "keep is required".to_string())
                }),
        )
        .unwrap();

        let m = optional
            .new_instance([
                ("keep", Value::Int(1)),
                ("k", Value::Int(2)),
                ("k", Value::Null),
                ("gone", Value::Null),
            ])
            .unwrap();
        assert_eq!(m.len(), 1);
        assert!(!m.contains_key("k").unwrap());
        assert!(!m.contains_key("gone").unwrap());

        m.set("k", 5i64).unwrap();
        m.set("k", Value::Null).unwrap();
        assert_eq!(m.len(), 1);
        assert!(!m.contains_key("k").unwrap());
        m.set("absent", Value::Null).unwrap();
        assert_eq!(m.len(), 1);

        let err = m.set("keep", Value::Null).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("keep is required"));
        assert_eq!(m.get("keep").unwrap(), Value::Int(1));
    }

    #[test]
    fn test_frozen_mapping() {
        let m = scores()
            .instantiate([("ann", 1i64)], InstanceOptions::frozen())
            .unwrap();
        assert_eq!(m.set("ann", 2i64).unwrap_err().kind(), ErrorKind::Frozen);
        assert_eq!(m.remove("ann").unwrap_err().kind(), ErrorKind::Frozen);
        assert_eq!(m.get("ann").unwrap(), Value::Int(1));
    }

    #[test]
    fn test_from_value_and_type_identity() {
        let ty = scores();
        let data = Value::from(serde_json::json!({"x": 1, "y": 2}));
        let m: Value = ty.from_value(&data, InstanceOptions::default()).unwrap().into();
        assert!(ty.is(&m));
        assert!(!scores().is(&m));
        assert_eq!(ty.is_frozen(&m).unwrap(), false);
        ty.freeze(&m).unwrap();
        assert_eq!(ty.is_frozen(&m).unwrap(), true);
        assert!(ty.from_value(&Value::Int(1), InstanceOptions::default()).is_err());
    }
}
