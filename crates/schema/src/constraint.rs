//! Container constraint slots
//!
//! - [`ArrayConstraint`]: element slot, count bounds and contiguity over
//!   `Value::Array` values and sequence instances
//! - [`MapConstraint`]: key and value slots over `Value::Object` values and
//!   mapping instances
//!
//! Both are plain slots: they validate a container value handed to them and
//! are independent of the structured families that may hold it.
//!
//! ## Holes
//!
//! A `Null` element of an array is an absent index. Trailing holes do not
//! count. An interior hole breaks contiguity; when `contiguous` is off,
//! holes are skipped, not validated and not counted.

use crate::slot::{Slot, SlotKind, Verdict};
use crate::structured::Instance;
use crate::value::Value;
use strata_core::{StrataError, StrataResult};

/// Constraint on sequence-shaped containers
#[derive(Debug, Clone)]
pub struct ArrayConstraint {
    /// Minimum number of present elements
    pub min_count: usize,
    /// Maximum number of present elements, unbounded when `None`
    pub max_count: Option<usize>,
    /// Reject interior holes
    pub contiguous: bool,
    /// Slot every present element must satisfy
    pub element: Slot,
}

impl Default for ArrayConstraint {
    fn default() -> Self {
        ArrayConstraint {
            min_count: 0,
            max_count: None,
            contiguous: true,
            element: Slot::any(),
        }
    }
}

impl ArrayConstraint {
    /// Set the minimum element count
    pub fn min_count(mut self, n: usize) -> Self {
        self.min_count = n;
        self
    }

    /// Set the maximum element count
    pub fn max_count(mut self, n: usize) -> Self {
        self.max_count = Some(n);
        self
    }

    /// Allow or forbid interior holes
    pub fn contiguous(mut self, contiguous: bool) -> Self {
        self.contiguous = contiguous;
        self
    }

    /// Set the element slot
    pub fn element(mut self, slot: Slot) -> Self {
        self.element = slot;
        self
    }

    /// Build the slot
    ///
    /// # Errors
    ///
    /// Configuration error when `min_count > max_count`.
    pub fn into_slot(self) -> StrataResult<Slot> {
        if let Some(max) = self.max_count {
            if self.min_count > max {
                return Err(StrataError::configuration(format!(
                    "min_count ({}) must not exceed max_count ({})",
                    self.min_count, max
                )));
            }
        }
        Ok(Slot::from_kind(SlotKind::Array(self)))
    }

    pub(crate) fn validate(&self, value: &Value) -> StrataResult<Verdict> {
        let (mut elements, rebuild) = match value {
            Value::Array(items) => (items.clone(), true),
            Value::Instance(Instance::Sequence(seq)) => (seq.snapshot(), false),
            other => {
                return Ok(Verdict::Rejected(format!(
                    "expected an array, got {}",
                    other.type_name()
                )))
            }
        };

        while matches!(elements.last(), Some(Value::Null)) {
            elements.pop();
        }

        if self.contiguous {
            if let Some(hole) = elements.iter().position(Value::is_null) {
                return Ok(Verdict::Rejected(format!(
                    "indices must be contiguous (hole at index {})",
                    hole + 1
                )));
            }
        }

        let count = elements.iter().filter(|v| !v.is_null()).count();
        if count < self.min_count {
            return Ok(Verdict::Rejected(format!(
                "must contain at least {} elements, got {}",
                self.min_count, count
            )));
        }
        if let Some(max) = self.max_count {
            if count > max {
                return Ok(Verdict::Rejected(format!(
                    "must contain no more than {} elements, got {}",
                    max, count
                )));
            }
        }

        let mut accepted = Vec::with_capacity(elements.len());
        for (i, element) in elements.iter().enumerate() {
            if element.is_null() {
                accepted.push(Value::Null);
                continue;
            }
            match self.element.validate(element)? {
                Verdict::Accepted(v) => accepted.push(v),
                Verdict::Rejected(msg) => {
                    return Ok(Verdict::Rejected(format!("element {}: {}", i + 1, msg)))
                }
            }
        }

        Ok(Verdict::Accepted(if rebuild {
            Value::Array(accepted)
        } else {
            value.clone()
        }))
    }

    pub(crate) fn format(&self, value: &Value) -> String {
        match value {
            Value::Array(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .map(|v| match v {
                        Value::Null => v.to_string(),
                        v => self.element.format(v),
                    })
                    .collect();
                format!("[{}]", parts.join(", "))
            }
            other => other.to_string(),
        }
    }
}

/// Constraint on key/value containers
#[derive(Debug, Clone)]
pub struct MapConstraint {
    /// Slot every key must satisfy (keys are presented as values)
    pub key: Slot,
    /// Slot every value must satisfy
    pub value: Slot,
}

impl Default for MapConstraint {
    fn default() -> Self {
        MapConstraint {
            key: Slot::any(),
            value: Slot::any(),
        }
    }
}

impl MapConstraint {
    /// Constraint from key and value slots
    pub fn new(key: Slot, value: Slot) -> Self {
        MapConstraint { key, value }
    }

    /// Build the slot
    pub fn into_slot(self) -> Slot {
        Slot::from_kind(SlotKind::Map(self))
    }

    /// Entries sorted by rendered key, so the first failure is deterministic
    fn sorted_entries(value: &Value) -> Option<Vec<(Value, Value)>> {
        let mut entries: Vec<(Value, Value)> = match value {
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| (Value::String(k.clone()), v.clone()))
                .collect(),
            Value::Instance(Instance::Mapping(m)) => m
                .entries()
                .into_iter()
                .map(|(k, v)| (k.to_value(), v))
                .collect(),
            _ => return None,
        };
        entries.sort_by_cached_key(|(k, _)| k.to_string());
        Some(entries)
    }

    pub(crate) fn validate(&self, value: &Value) -> StrataResult<Verdict> {
        let Some(entries) = Self::sorted_entries(value) else {
            return Ok(Verdict::Rejected(format!(
                "expected an object, got {}",
                value.type_name()
            )));
        };

        let mut accepted = Vec::with_capacity(entries.len());
        for (key, item) in entries {
            if let Verdict::Rejected(msg) = self.key.validate(&key)? {
                return Ok(Verdict::Rejected(format!("key {}: {}", render_key(&key), msg)));
            }
            match self.value.validate(&item)? {
                Verdict::Accepted(v) => accepted.push((key, v)),
                Verdict::Rejected(msg) => {
                    return Ok(Verdict::Rejected(format!(
                        "value at {}: {}",
                        render_key(&key),
                        msg
                    )))
                }
            }
        }

        // Keys are checked, never rewritten
        Ok(Verdict::Accepted(match value {
            Value::Object(_) => Value::Object(
                accepted
                    .into_iter()
                    .filter_map(|(k, v)| match k {
                        Value::String(s) => Some((s, v)),
                        _ => None,
                    })
                    .collect(),
            ),
            other => other.clone(),
        }))
    }

    pub(crate) fn format(&self, value: &Value) -> String {
        match (value, Self::sorted_entries(value)) {
            (Value::Object(_), Some(entries)) => {
                let parts: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{} = {}", self.key.format(k), self.value.format(v)))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            (other, _) => other.to_string(),
        }
    }
}

fn render_key(key: &Value) -> String {
    match key {
        Value::String(s) => format!("{:?}", s),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use strata_core::ErrorKind;

    fn ints(values: &[i64]) -> Value {
        Value::Array(values.iter().map(|&i| Value::Int(i)).collect())
    }

    fn message(slot: &Slot, value: &Value) -> String {
        slot.validate(value)
            .unwrap()
            .message()
            .expect("expected rejection")
            .to_string()
    }

    #[test]
    fn test_count_bounds() {
        let slot = ArrayConstraint::default()
            .min_count(3)
            .max_count(5)
            .element(Slot::integer())
            .into_slot()
            .unwrap();

        assert!(message(&slot, &ints(&[])).contains("at least 3"));
        assert!(message(&slot, &ints(&[1, 2, 3, 4, 5, 6])).contains("no more than 5"));
        assert!(slot.validate(&ints(&[1, 2, 3])).unwrap().is_accepted());
        assert!(slot.validate(&ints(&[1, 2, 3, 4, 5])).unwrap().is_accepted());
    }

    #[test]
    fn test_first_failing_element_is_reported() {
        let slot = ArrayConstraint::default()
            .element(Slot::integer())
            .into_slot()
            .unwrap();
        let value = Value::Array(vec![
            Value::Int(1),
            Value::String("two".into()),
            Value::Float(3.0),
        ]);
        assert_eq!(message(&slot, &value), "element 2: expected an integer");
    }

    #[test]
    fn test_contiguity_and_holes() {
        let strict = ArrayConstraint::default().into_slot().unwrap();
        let holey = Value::Array(vec![Value::Int(1), Value::Null, Value::Int(3)]);
        assert!(message(&strict, &holey).contains("indices must be contiguous"));

        // Trailing holes are not holes
        let trailing = Value::Array(vec![Value::Int(1), Value::Null]);
        assert_eq!(
            strict.validate(&trailing).unwrap(),
            Verdict::Accepted(ints(&[1]))
        );

        let loose = ArrayConstraint::default()
            .contiguous(false)
            .max_count(2)
            .into_slot()
            .unwrap();
        assert_eq!(
            loose.validate(&holey).unwrap(),
            Verdict::Accepted(holey.clone())
        );
    }

    #[test]
    fn test_rejects_non_arrays() {
        let slot = ArrayConstraint::default().into_slot().unwrap();
        assert_eq!(message(&slot, &Value::Int(1)), "expected an array, got Int");
    }

    #[test]
    fn test_min_above_max_is_configuration_error() {
        let err = ArrayConstraint::default()
            .min_count(4)
            .max_count(2)
            .into_slot()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_array_format_uses_element_slot() {
        let slot = ArrayConstraint::default()
            .element(Slot::string())
            .into_slot()
            .unwrap();
        let value = Value::Array(vec![Value::String("a".into()), Value::String("b".into())]);
        assert_eq!(slot.format(&value), "[\"a\", \"b\"]");
    }

    #[test]
    fn test_map_constraint_checks_keys_and_values() {
        let slot = MapConstraint::new(Slot::string(), Slot::integer()).into_slot();

        let mut good = HashMap::new();
        good.insert("a".to_string(), Value::Int(1));
        good.insert("b".to_string(), Value::Int(2));
        assert!(slot.validate(&Value::Object(good)).unwrap().is_accepted());

        let mut bad = HashMap::new();
        bad.insert("a".to_string(), Value::Int(1));
        bad.insert("b".to_string(), Value::Bool(true));
        assert_eq!(
            message(&slot, &Value::Object(bad)),
            "value at \"b\": expected an integer"
        );

        assert_eq!(
            message(&slot, &Value::Array(vec![])),
            "expected an object, got Array"
        );
    }

    #[test]
    fn test_map_constraint_key_rejection() {
        let short_keys = Slot::with_validator(|k| match k.as_str() {
            Some(s) if s.len() <= 3 => (Some(k.clone()), None),
            _ => (None, Some("key too long".to_string())),
        });
        let slot = MapConstraint::new(short_keys, Slot::any()).into_slot();

        let mut map = HashMap::new();
        map.insert("toolong".to_string(), Value::Int(1));
        assert_eq!(
            message(&slot, &Value::Object(map)),
            "key \"toolong\": key too long"
        );
    }

    #[test]
    fn test_map_format_sorted() {
        let slot = MapConstraint::new(Slot::string(), Slot::integer()).into_slot();
        let mut map = HashMap::new();
        map.insert("b".to_string(), Value::Int(2));
        map.insert("a".to_string(), Value::Int(1));
        assert_eq!(slot.format(&Value::Object(map)), "{\"a\" = 1, \"b\" = 2}");
    }
}
