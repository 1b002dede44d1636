//! Error values.
//!
//! Any object with an `Error() string` method is an error. Host errors and
//! primitive values with an error method are adapted into [`ErrorValue`];
//! equality is object identity, never text.

use std::any::{Any, TypeId};
use std::fmt;
use std::rc::Rc;

use crate::panic::RuntimeTrapKind;
use crate::reflect::{self, type_of, Type};
use crate::value::Value;

/// Behaviour shared by every error object.
pub trait GoError: Any {
    fn error(&self) -> String;

    /// The wrapped cause, for `errors.Unwrap`.
    fn unwrap(&self) -> Option<ErrorValue> {
        None
    }

    /// Dynamic type as seen through reflection.
    fn dynamic_type(&self) -> Type {
        reflect::error_string_ptr_type()
    }

    fn as_any(&self) -> &dyn Any;
}

/// A non-nil error. A nil error is `Option::None` / `Value::Nil`.
#[derive(Clone)]
pub struct ErrorValue(Rc<dyn GoError>);

impl ErrorValue {
    pub fn new<E: GoError>(err: E) -> Self {
        Self(Rc::new(err))
    }

    #[inline]
    pub fn error(&self) -> String {
        self.0.error()
    }

    pub fn unwrap(&self) -> Option<ErrorValue> {
        self.0.unwrap()
    }

    pub fn dynamic_type(&self) -> Type {
        self.0.dynamic_type()
    }

    pub fn downcast_ref<T: GoError>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    pub fn concrete_type_id(&self) -> TypeId {
        self.0.as_any().type_id()
    }

    /// Identity comparison, the only equality errors have.
    #[inline]
    pub fn ptr_eq(&self, other: &ErrorValue) -> bool {
        self.addr() == other.addr()
    }

    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.error())
    }
}

impl fmt::Debug for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ErrorValue({:?})", self.error())
    }
}

impl std::error::Error for ErrorValue {}

// =============================================================================
// Concrete errors
// =============================================================================

/// `errors.New(text)`
#[derive(Debug)]
pub struct TextError {
    text: String,
}

impl GoError for TextError {
    fn error(&self) -> String {
        self.text.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `fmt.Errorf("...: %w", cause)`
#[derive(Debug)]
pub struct WrapError {
    msg: String,
    cause: ErrorValue,
}

impl GoError for WrapError {
    fn error(&self) -> String {
        self.msg.clone()
    }

    fn unwrap(&self) -> Option<ErrorValue> {
        Some(self.cause.clone())
    }

    fn dynamic_type(&self) -> Type {
        reflect::wrap_error_ptr_type()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A host-native error.
pub struct HostError {
    source: Box<dyn std::error::Error>,
}

impl HostError {
    pub fn source(&self) -> &(dyn std::error::Error + 'static) {
        self.source.as_ref()
    }
}

impl GoError for HostError {
    fn error(&self) -> String {
        self.source.to_string()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A value of a named primitive type whose `Error` method is `error_fn`.
pub struct TypedError {
    value: Value,
    error_fn: Rc<dyn Fn(&Value) -> String>,
}

impl TypedError {
    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl GoError for TypedError {
    fn error(&self) -> String {
        (self.error_fn)(&self.value)
    }

    fn dynamic_type(&self) -> Type {
        type_of(&self.value).unwrap_or_else(reflect::error_string_ptr_type)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Payload of a runtime trap.
#[derive(Debug)]
pub struct RuntimeErrorValue {
    kind: RuntimeTrapKind,
    message: String,
}

impl RuntimeErrorValue {
    pub fn new(kind: RuntimeTrapKind, message: String) -> Self {
        Self { kind, message }
    }

    pub fn kind(&self) -> RuntimeTrapKind {
        self.kind
    }
}

impl GoError for RuntimeErrorValue {
    fn error(&self) -> String {
        self.message.clone()
    }

    fn dynamic_type(&self) -> Type {
        reflect::runtime_error_type()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// Constructors and helpers
// =============================================================================

/// `errors.New(text)`. Every call yields a distinct error.
pub fn new_error(text: impl Into<String>) -> ErrorValue {
    ErrorValue::new(TextError { text: text.into() })
}

/// Adapt a host error. An `ErrorValue` that went through a box comes back as itself.
pub fn to_error(err: Box<dyn std::error::Error + 'static>) -> ErrorValue {
    match err.downcast::<ErrorValue>() {
        Ok(err) => *err,
        Err(source) => ErrorValue::new(HostError { source }),
    }
}

pub fn from_host<E: std::error::Error + 'static>(err: E) -> ErrorValue {
    to_error(Box::new(err))
}

/// Adapt a primitive value with an error method. Values that already are
/// errors are returned unchanged.
pub fn wrap_typed_error(value: Value, error_fn: impl Fn(&Value) -> String + 'static) -> ErrorValue {
    if let Value::Error(err) = value {
        return err;
    }
    ErrorValue::new(TypedError { value, error_fn: Rc::new(error_fn) })
}

/// An error with message `msg` whose cause is `cause`.
pub fn wrap_error(msg: impl Into<String>, cause: ErrorValue) -> ErrorValue {
    ErrorValue::new(WrapError { msg: msg.into(), cause })
}

pub fn unwrap_error(err: &ErrorValue) -> Option<ErrorValue> {
    err.unwrap()
}

/// Whether any error in `err`'s unwrap chain is identical to `target`.
pub fn errors_is(err: Option<&ErrorValue>, target: Option<&ErrorValue>) -> bool {
    let target = match target {
        Some(target) => target,
        None => return err.is_none(),
    };
    let mut current = err.cloned();
    while let Some(e) = current {
        if e.ptr_eq(target) {
            return true;
        }
        current = e.unwrap();
    }
    false
}

/// First error in the unwrap chain whose concrete type is `T`.
pub fn errors_as<T: GoError>(err: &ErrorValue) -> Option<ErrorValue> {
    let mut current = Some(err.clone());
    while let Some(e) = current {
        if e.downcast_ref::<T>().is_some() {
            return Some(e);
        }
        current = e.unwrap();
    }
    None
}
