//! Runtime faults.
//!
//! Every fatal condition (nil dereference, send on closed channel, reflection
//! misuse, user `panic(v)`) is a [`Panic`] travelling through `Result` with `?`.
//! Deferred-cleanup actions may inspect and clear it; anything left when the
//! activation chain is exhausted is surfaced by the scheduler.

use std::fmt;

use crate::objects::error::{ErrorValue, RuntimeErrorValue};
use crate::value::Value;

/// Result of any operation that may fault.
pub type RtResult<T> = Result<T, Panic>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeTrapKind {
    NilPointerDereference,
    NilMapWrite,
    NilFuncCall,
    UnhashableType,
    UncomparableType,
    TypeAssertionFailed,
    IndexOutOfBounds,
    SliceBoundsOutOfRange,
    MakeSlice,
    MakeChan,
    SendOnClosedChannel,
    CloseNilChannel,
    CloseClosedChannel,
    InvalidChanDir,
}

/// What raised the panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanicKind {
    /// `panic(v)` in user code.
    User,
    /// A runtime trap; the payload is an error value.
    Runtime(RuntimeTrapKind),
    /// Reflection-contract violation; the payload is a string.
    Reflect,
}

#[derive(Debug, Clone)]
pub struct Panic {
    value: Value,
    kind: PanicKind,
    /// The in-flight panic this one replaced, if it was raised during unwinding.
    superseded: Option<Box<Panic>>,
}

impl Panic {
    /// A user panic carrying an arbitrary value.
    pub fn new(value: impl Into<Value>) -> Self {
        Self { value: value.into(), kind: PanicKind::User, superseded: None }
    }

    /// A runtime trap. The recovered value is an error whose text is `msg`.
    pub fn runtime(kind: RuntimeTrapKind, msg: impl Into<String>) -> Self {
        let err = ErrorValue::new(RuntimeErrorValue::new(kind, msg.into()));
        Self { value: Value::Error(err), kind: PanicKind::Runtime(kind), superseded: None }
    }

    pub fn reflect(msg: impl Into<String>) -> Self {
        Self { value: Value::from(msg.into()), kind: PanicKind::Reflect, superseded: None }
    }

    pub fn nil_deref() -> Self {
        Self::runtime(
            RuntimeTrapKind::NilPointerDereference,
            "runtime error: invalid memory address or nil pointer dereference",
        )
    }

    pub fn send_on_closed() -> Self {
        Self::runtime(RuntimeTrapKind::SendOnClosedChannel, "send on closed channel")
    }

    pub fn close_of_closed() -> Self {
        Self::runtime(RuntimeTrapKind::CloseClosedChannel, "close of closed channel")
    }

    pub fn close_of_nil() -> Self {
        Self::runtime(RuntimeTrapKind::CloseNilChannel, "close of nil channel")
    }

    pub fn nil_map_write() -> Self {
        Self::runtime(RuntimeTrapKind::NilMapWrite, "assignment to entry in nil map")
    }

    pub fn nil_func_call() -> Self {
        Self::runtime(
            RuntimeTrapKind::NilFuncCall,
            "runtime error: invalid memory address or nil pointer dereference",
        )
    }

    pub fn index_out_of_range(index: usize, len: usize) -> Self {
        Self::runtime(
            RuntimeTrapKind::IndexOutOfBounds,
            format!("runtime error: index out of range [{}] with length {}", index, len),
        )
    }

    pub fn slice_bounds(lo: usize, hi: usize, cap: usize) -> Self {
        let msg = if hi > cap {
            format!("runtime error: slice bounds out of range [:{}] with capacity {}", hi, cap)
        } else {
            format!("runtime error: slice bounds out of range [{}:{}]", lo, hi)
        };
        Self::runtime(RuntimeTrapKind::SliceBoundsOutOfRange, msg)
    }

    pub fn uncomparable(type_str: &str) -> Self {
        Self::runtime(
            RuntimeTrapKind::UncomparableType,
            format!("runtime error: comparing uncomparable type {}", type_str),
        )
    }

    pub fn unhashable(type_str: &str) -> Self {
        Self::runtime(
            RuntimeTrapKind::UnhashableType,
            format!("runtime error: hash of unhashable type {}", type_str),
        )
    }

    pub fn type_assertion(have: &str, want: &str) -> Self {
        Self::runtime(
            RuntimeTrapKind::TypeAssertionFailed,
            format!("interface conversion: interface {{}} is {}, not {}", have, want),
        )
    }

    /// The value `recover()` returns.
    #[inline]
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    #[inline]
    pub fn kind(&self) -> PanicKind {
        self.kind
    }

    pub fn trap_kind(&self) -> Option<RuntimeTrapKind> {
        match self.kind {
            PanicKind::Runtime(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn is_runtime_error(&self) -> bool {
        matches!(self.kind, PanicKind::Runtime(_))
    }

    pub fn superseded(&self) -> Option<&Panic> {
        self.superseded.as_deref()
    }

    /// Record that this panic was raised while `previous` was unwinding.
    pub fn supersede(mut self, previous: Panic) -> Self {
        // The oldest panic stays at the end of the chain.
        let chained = match self.superseded.take() {
            Some(inner) => (*inner).supersede(previous),
            None => previous,
        };
        self.superseded = Some(Box::new(chained));
        self
    }

    /// Human-readable message for the payload.
    pub fn message(&self) -> String {
        match &self.value {
            Value::Error(err) => err.error(),
            Value::String(s) => s.to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Panic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prev) = &self.superseded {
            writeln!(f, "{}", prev)?;
            write!(f, "\t")?;
        }
        write!(f, "panic: {}", self.message())
    }
}

impl std::error::Error for Panic {}
