//! Slots: immutable validate + format units
//!
//! A [`Slot`] is the contract every field, element, key and value of a
//! structured instance must satisfy. Slots are cheap to clone and may be
//! shared by any number of types.
//!
//! ## Validation contract
//!
//! A validator returns `(accepted, error)`:
//! - `error == None`: accepted; the stored value is `accepted` (`None` means `Null`)
//! - `error == Some(msg)`: rejected with `msg`; `accepted` must be `None`
//!
//! Returning both is a [`StrataError::ContractViolation`], not a rejection.
//!
//! ## Built-ins
//!
//! | Slot | Accepts | Formatting |
//! |------|---------|------------|
//! | `Any` | any non-null scalar | plain |
//! | `Boolean` | `Bool` | plain |
//! | `String` | `String` | quoted |
//! | `Number` | `Int` or `Float` | plain |
//! | `Integer` | `Int` | plain |
//! | `Float` | `Float` | plain |

use crate::constraint::{ArrayConstraint, MapConstraint};
use crate::structured::StructuredType;
use crate::value::Value;
use once_cell::sync::Lazy;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use strata_core::{StrataError, StrataResult};

/// User validator: `Value -> (accepted, error)`
pub type SlotValidator = Arc<dyn Fn(&Value) -> (Option<Value>, Option<String>) + Send + Sync>;

/// User formatter: `Value -> String`
pub type SlotFormatter = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// Token used when an optional slot formats a null value
pub const NULL_TOKEN: &str = "null";

/// Outcome of validating one value
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Accepted; the value to store
    Accepted(Value),
    /// Rejected with a message
    Rejected(String),
}

impl Verdict {
    /// True for `Accepted`
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted(_))
    }

    /// Rejection message, if any
    pub fn message(&self) -> Option<&str> {
        match self {
            Verdict::Accepted(_) => None,
            Verdict::Rejected(msg) => Some(msg),
        }
    }

    /// `(accepted, error)` pair, the shape user validators return
    pub fn into_pair(self) -> (Option<Value>, Option<String>) {
        match self {
            Verdict::Accepted(v) => (Some(v), None),
            Verdict::Rejected(msg) => (None, Some(msg)),
        }
    }

    /// Accepted value, or a validation error attributed to `context`
    pub fn accept_at(self, context: impl AsRef<str>) -> StrataResult<Value> {
        match self {
            Verdict::Accepted(v) => Ok(v),
            Verdict::Rejected(msg) => Err(StrataError::validation_at(context, msg)),
        }
    }
}

/// Operation a slot can perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotOp {
    /// Run the validator
    Validate,
    /// Run the formatter
    Format,
}

impl FromStr for SlotOp {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "validate" => Ok(SlotOp::Validate),
            "format" => Ok(SlotOp::Format),
            other => Err(StrataError::unsupported(other)),
        }
    }
}

/// Result of [`Slot::operate`]
#[derive(Debug, Clone, PartialEq)]
pub enum SlotOutput {
    /// From `SlotOp::Validate`
    Verdict(Verdict),
    /// From `SlotOp::Format`
    Formatted(String),
}

pub(crate) enum SlotKind {
    Any,
    Boolean,
    String,
    Number,
    Integer,
    Float,
    Optional(Slot),
    MemberOf(StructuredType),
    Array(ArrayConstraint),
    Map(MapConstraint),
    Custom {
        validator: SlotValidator,
        formatter: Option<SlotFormatter>,
    },
}

/// Immutable validation + formatting unit
#[derive(Clone)]
pub struct Slot {
    kind: Arc<SlotKind>,
}

static ANY: Lazy<Slot> = Lazy::new(|| Slot::from_kind(SlotKind::Any));
static BOOLEAN: Lazy<Slot> = Lazy::new(|| Slot::from_kind(SlotKind::Boolean));
static STRING: Lazy<Slot> = Lazy::new(|| Slot::from_kind(SlotKind::String));
static NUMBER: Lazy<Slot> = Lazy::new(|| Slot::from_kind(SlotKind::Number));
static INTEGER: Lazy<Slot> = Lazy::new(|| Slot::from_kind(SlotKind::Integer));
static FLOAT: Lazy<Slot> = Lazy::new(|| Slot::from_kind(SlotKind::Float));

/// Names accepted by [`Slot::builtin`]
pub const BUILTIN_NAMES: [&str; 6] = ["Any", "Boolean", "String", "Number", "Integer", "Float"];

impl Slot {
    pub(crate) fn from_kind(kind: SlotKind) -> Self {
        Slot {
            kind: Arc::new(kind),
        }
    }

    /// Slot from a validator and a formatter
    pub fn create<V, F>(validator: V, formatter: F) -> Self
    where
        V: Fn(&Value) -> (Option<Value>, Option<String>) + Send + Sync + 'static,
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        Slot::from_kind(SlotKind::Custom {
            validator: Arc::new(validator),
            formatter: Some(Arc::new(formatter)),
        })
    }

    /// Slot from a validator, formatting with the value's `Display`
    pub fn with_validator<V>(validator: V) -> Self
    where
        V: Fn(&Value) -> (Option<Value>, Option<String>) + Send + Sync + 'static,
    {
        Slot::from_kind(SlotKind::Custom {
            validator: Arc::new(validator),
            formatter: None,
        })
    }

    pub(crate) fn from_parts(validator: SlotValidator, formatter: Option<SlotFormatter>) -> Self {
        Slot::from_kind(SlotKind::Custom {
            validator,
            formatter,
        })
    }

    /// Any non-null scalar
    pub fn any() -> Self {
        ANY.clone()
    }

    /// Booleans
    pub fn boolean() -> Self {
        BOOLEAN.clone()
    }

    /// Strings, formatted quoted
    pub fn string() -> Self {
        STRING.clone()
    }

    /// Integers or floats
    pub fn number() -> Self {
        NUMBER.clone()
    }

    /// Integers
    pub fn integer() -> Self {
        INTEGER.clone()
    }

    /// Floats
    pub fn float() -> Self {
        FLOAT.clone()
    }

    /// Built-in slot by name
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "Any" => Some(Slot::any()),
            "Boolean" => Some(Slot::boolean()),
            "String" => Some(Slot::string()),
            "Number" => Some(Slot::number()),
            "Integer" => Some(Slot::integer()),
            "Float" => Some(Slot::float()),
            _ => None,
        }
    }

    /// Null, or whatever `inner` accepts
    pub fn optional(inner: Slot) -> Self {
        Slot::from_kind(SlotKind::Optional(inner))
    }

    /// Instances of `ty`
    pub fn member_of(ty: impl Into<StructuredType>) -> Self {
        Slot::from_kind(SlotKind::MemberOf(ty.into()))
    }

    /// Identity predicate: true only for `Slot` objects
    pub fn is_slot(candidate: &dyn std::any::Any) -> bool {
        candidate.is::<Slot>()
    }

    /// Slot identity (shared built-ins are the same slot)
    pub fn same(&self, other: &Slot) -> bool {
        Arc::ptr_eq(&self.kind, &other.kind)
    }

    /// Short description of the slot kind
    pub fn describe(&self) -> String {
        match &*self.kind {
            SlotKind::Any => "Any".to_string(),
            SlotKind::Boolean => "Boolean".to_string(),
            SlotKind::String => "String".to_string(),
            SlotKind::Number => "Number".to_string(),
            SlotKind::Integer => "Integer".to_string(),
            SlotKind::Float => "Float".to_string(),
            SlotKind::Optional(inner) => format!("Optional({})", inner.describe()),
            SlotKind::MemberOf(ty) => format!("MemberOf({})", ty.name()),
            SlotKind::Array(c) => format!("Array({})", c.element.describe()),
            SlotKind::Map(c) => format!("Map({}, {})", c.key.describe(), c.value.describe()),
            SlotKind::Custom { .. } => "Custom".to_string(),
        }
    }

    /// Dispatch an operation
    pub fn operate(&self, op: SlotOp, value: &Value) -> StrataResult<SlotOutput> {
        match op {
            SlotOp::Validate => self.validate(value).map(SlotOutput::Verdict),
            SlotOp::Format => Ok(SlotOutput::Formatted(self.format(value))),
        }
    }

    /// Dispatch an operation given by name
    ///
    /// # Errors
    ///
    /// Unsupported-operation error for names other than `validate` and `format`.
    pub fn operate_named(&self, op: &str, value: &Value) -> StrataResult<SlotOutput> {
        self.operate(op.parse()?, value)
    }

    /// Validate a value
    ///
    /// # Errors
    ///
    /// Only for a broken validator contract; rejections are `Ok(Verdict::Rejected)`.
    pub fn validate(&self, value: &Value) -> StrataResult<Verdict> {
        match &*self.kind {
            SlotKind::Any => Ok(match value {
                Value::Null => Verdict::Rejected("expected a non-null value".to_string()),
                v if v.is_container() => Verdict::Rejected(format!(
                    "expected a scalar value, got {}",
                    v.type_name()
                )),
                v => Verdict::Accepted(v.clone()),
            }),
            SlotKind::Boolean => Ok(accept_if(value, |v| matches!(v, Value::Bool(_)), "expected a boolean")),
            SlotKind::String => Ok(accept_if(value, |v| matches!(v, Value::String(_)), "expected a string")),
            SlotKind::Number => Ok(accept_if(value, Value::is_number, "expected a number")),
            SlotKind::Integer => Ok(accept_if(value, |v| matches!(v, Value::Int(_)), "expected an integer")),
            SlotKind::Float => Ok(accept_if(value, |v| matches!(v, Value::Float(_)), "expected a float")),
            SlotKind::Optional(inner) => match value {
                Value::Null => Ok(Verdict::Accepted(Value::Null)),
                v => inner.validate(v),
            },
            SlotKind::MemberOf(ty) => Ok(if ty.is(value) {
                Verdict::Accepted(value.clone())
            } else {
                Verdict::Rejected(format!("expected an instance of {}", ty.name()))
            }),
            SlotKind::Array(constraint) => constraint.validate(value),
            SlotKind::Map(constraint) => constraint.validate(value),
            SlotKind::Custom { validator, .. } => match validator(value) {
                (Some(accepted), Some(msg)) => Err(StrataError::contract_violation(format!(
                    "validator returned both a value ({}) and an error ({})",
                    accepted, msg
                ))),
                (_, Some(msg)) => Ok(Verdict::Rejected(msg)),
                (accepted, None) => Ok(Verdict::Accepted(accepted.unwrap_or(Value::Null))),
            },
        }
    }

    /// Format a value for display
    pub fn format(&self, value: &Value) -> String {
        match &*self.kind {
            SlotKind::String => match value {
                Value::String(s) => format!("{:?}", s),
                other => other.to_string(),
            },
            SlotKind::Optional(inner) => match value {
                Value::Null => NULL_TOKEN.to_string(),
                v => inner.format(v),
            },
            // Only the type's name; instance contents are never rendered
            SlotKind::MemberOf(ty) => ty.name().to_string(),
            SlotKind::Array(constraint) => constraint.format(value),
            SlotKind::Map(constraint) => constraint.format(value),
            SlotKind::Custom {
                formatter: Some(formatter),
                ..
            } => formatter(value),
            _ => value.to_string(),
        }
    }
}

fn accept_if(value: &Value, ok: impl Fn(&Value) -> bool, message: &str) -> Verdict {
    if ok(value) {
        Verdict::Accepted(value.clone())
    } else {
        Verdict::Rejected(message.to_string())
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Slot({})", self.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use strata_core::ErrorKind;

    fn rejected(slot: &Slot, value: Value) -> String {
        match slot.validate(&value).unwrap() {
            Verdict::Rejected(msg) => msg,
            Verdict::Accepted(v) => panic!("expected rejection, accepted {:?}", v),
        }
    }

    #[test]
    fn test_any_accepts_scalars_only() {
        let any = Slot::any();
        assert!(any.validate(&Value::Int(1)).unwrap().is_accepted());
        assert!(any.validate(&Value::String("x".into())).unwrap().is_accepted());
        assert!(any.validate(&Value::Bool(false)).unwrap().is_accepted());
        assert_eq!(rejected(&any, Value::Null), "expected a non-null value");
        assert!(rejected(&any, Value::Array(vec![])).contains("scalar"));
        assert!(rejected(&any, Value::Object(HashMap::new())).contains("Object"));
    }

    #[test]
    fn test_builtin_type_checks() {
        assert_eq!(rejected(&Slot::boolean(), Value::Int(1)), "expected a boolean");
        assert_eq!(rejected(&Slot::string(), Value::Int(1)), "expected a string");
        assert_eq!(rejected(&Slot::number(), Value::String("1".into())), "expected a number");
        assert_eq!(rejected(&Slot::integer(), Value::Float(1.0)), "expected an integer");
        assert_eq!(rejected(&Slot::float(), Value::Int(1)), "expected a float");
        assert!(Slot::number().validate(&Value::Float(0.5)).unwrap().is_accepted());
        assert!(Slot::number().validate(&Value::Int(5)).unwrap().is_accepted());
    }

    #[test]
    fn test_builtins_are_shared() {
        assert!(Slot::integer().same(&Slot::integer()));
        assert!(Slot::builtin("Integer").unwrap().same(&Slot::integer()));
        assert!(!Slot::integer().same(&Slot::float()));
        assert!(Slot::builtin("Decimal").is_none());
        for name in BUILTIN_NAMES {
            assert_eq!(Slot::builtin(name).unwrap().describe(), name);
        }
    }

    #[test]
    fn test_is_slot_identity_predicate() {
        let slot = Slot::string();
        assert!(Slot::is_slot(&slot));
        assert!(!Slot::is_slot(&"String"));
        assert!(!Slot::is_slot(&Value::Null));
    }

    #[test]
    fn test_string_formatter_quotes() {
        assert_eq!(Slot::string().format(&Value::String("hi".into())), "\"hi\"");
        assert_eq!(Slot::integer().format(&Value::Int(42)), "42");
    }

    #[test]
    fn test_optional_accepts_null_without_delegating() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let inner = Slot::with_validator(move |v| {
            seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            (Some(v.clone()), None)
        });
        let optional = Slot::optional(inner);

        assert_eq!(
            optional.validate(&Value::Null).unwrap(),
            Verdict::Accepted(Value::Null)
        );
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert!(optional.validate(&Value::Int(3)).unwrap().is_accepted());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_optional_formatting() {
        let optional = Slot::optional(Slot::string());
        assert_eq!(optional.format(&Value::Null), NULL_TOKEN);
        assert_eq!(optional.format(&Value::String("a".into())), "\"a\"");
        assert_eq!(
            rejected(&optional, Value::Int(1)),
            "expected a string"
        );
    }

    #[test]
    fn test_custom_validator_contract() {
        let lower = Slot::with_validator(|v| match v {
            Value::String(s) => (Some(Value::String(s.to_lowercase())), None),
            _ => (None, Some("expected text".to_string())),
        });
        assert_eq!(
            lower.validate(&Value::String("MiXeD".into())).unwrap(),
            Verdict::Accepted(Value::String("mixed".into()))
        );
        assert_eq!(rejected(&lower, Value::Int(1)), "expected text");

        let null_ok = Slot::with_validator(|_| (None, None));
        assert_eq!(
            null_ok.validate(&Value::Int(9)).unwrap(),
            Verdict::Accepted(Value::Null)
        );

        let broken = Slot::with_validator(|v| (Some(v.clone()), Some("nope".to_string())));
        let err = broken.validate(&Value::Int(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ContractViolation);
    }

    #[test]
    fn test_custom_formatter() {
        let slot = Slot::create(|v| (Some(v.clone()), None), |v| format!("<<{}>>", v));
        assert_eq!(slot.format(&Value::Int(7)), "<<7>>");
        assert_eq!(Slot::with_validator(|_| (None, None)).format(&Value::Int(7)), "7");
    }

    #[test]
    fn test_operate_dispatch() {
        let slot = Slot::integer();
        assert_eq!(
            slot.operate(SlotOp::Validate, &Value::Int(1)).unwrap(),
            SlotOutput::Verdict(Verdict::Accepted(Value::Int(1)))
        );
        assert_eq!(
            slot.operate_named("format", &Value::Int(1)).unwrap(),
            SlotOutput::Formatted("1".to_string())
        );
        let err = slot.operate_named("explode", &Value::Int(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
        assert!(err.to_string().contains("explode"));
    }

    #[test]
    fn test_verdict_helpers() {
        let ok = Verdict::Accepted(Value::Int(1));
        assert_eq!(ok.message(), None);
        assert_eq!(ok.clone().into_pair(), (Some(Value::Int(1)), None));
        assert_eq!(ok.accept_at("x").unwrap(), Value::Int(1));

        let bad = Verdict::Rejected("expected an integer".into());
        assert_eq!(bad.message(), Some("expected an integer"));
        let err = bad.accept_at("low").unwrap_err();
        assert_eq!(err.message(), "low: expected an integer");
    }
}
