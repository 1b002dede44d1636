//! Value-vs-reference copy dispatch.
//!
//! Assignment and pass-by-value call [`copy_value`]. Structs and arrays carry
//! the [`ValueType`] capability and are cloned; every other value is already
//! reference-like (or immutable) and is returned as is.

use crate::value::{Typed, Value};

/// Marker for composites that are copied on assignment.
///
/// `clone_value` copies nested value-type fields recursively and shares every
/// reference-type field with the original.
pub trait ValueType {
    fn clone_value(&self) -> Self;
}

impl Value {
    /// Whether assigning this value must produce an independent copy.
    pub fn is_value_type(&self) -> bool {
        match self {
            Value::Struct(_) | Value::Array(_) => true,
            Value::Typed(t) => t.value().is_value_type(),
            _ => false,
        }
    }
}

/// The value an assignment stores.
pub fn copy_value(v: &Value) -> Value {
    match v {
        Value::Struct(s) => Value::Struct(s.clone_value()),
        Value::Array(a) => Value::Array(a.clone_value()),
        Value::Typed(t) if t.value().is_value_type() => {
            Value::Typed(Typed::new(t.ty().clone(), copy_value(t.value())))
        }
        other => other.clone(),
    }
}
