//! Host value model.
//!
//! `Value` is the untyped value emitted code manipulates. Cloning a `Value`
//! is the host's assignment: scalars are copied, everything else shares the
//! same object. Source-level value semantics (struct and array copies) are
//! applied on top of this by [`crate::copy::copy_value`].

use std::fmt;
use std::rc::Rc;

use crate::objects::array::ArrayValue;
use crate::objects::cell::{Cell, Pointer};
use crate::objects::channel::Channel;
use crate::objects::closure::FuncValue;
use crate::objects::error::ErrorValue;
use crate::objects::map::MapValue;
use crate::objects::slice::SliceValue;
use crate::objects::struct_ops::StructValue;
use crate::panic::{Panic, RtResult};
use crate::reflect::Type;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    String(Rc<str>),
    Pointer(Pointer),
    Struct(StructValue),
    Array(ArrayValue),
    Slice(SliceValue),
    Map(MapValue),
    Chan(Channel),
    Func(FuncValue),
    Error(ErrorValue),
    /// A value boxed together with its static type, for named non-struct
    /// types and non-default numeric kinds flowing into interfaces.
    Typed(Typed),
}

/// A value paired with an explicit type descriptor.
#[derive(Clone)]
pub struct Typed(Rc<(Type, Value)>);

impl Typed {
    pub fn new(ty: Type, value: Value) -> Self {
        Self(Rc::new((ty, value)))
    }

    #[inline]
    pub fn ty(&self) -> &Type {
        &self.0 .0
    }

    #[inline]
    pub fn value(&self) -> &Value {
        &self.0 .1
    }
}

impl Value {
    #[inline]
    pub fn is_nil(&self) -> bool {
        match self {
            Value::Nil => true,
            Value::Typed(t) => t.value().is_nil(),
            _ => false,
        }
    }

    /// The payload without any `Typed` box.
    pub fn untyped(&self) -> &Value {
        match self {
            Value::Typed(t) => t.value().untyped(),
            other => other,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.untyped() {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self.untyped() {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u64> {
        match self.untyped() {
            Value::Uint(u) => Some(*u),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self.untyped() {
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.untyped() {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_pointer(&self) -> Option<&Pointer> {
        match self.untyped() {
            Value::Pointer(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructValue> {
        match self.untyped() {
            Value::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayValue> {
        match self.untyped() {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_slice(&self) -> Option<&SliceValue> {
        match self.untyped() {
            Value::Slice(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapValue> {
        match self.untyped() {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_chan(&self) -> Option<&Channel> {
        match self.untyped() {
            Value::Chan(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_func(&self) -> Option<&FuncValue> {
        match self.untyped() {
            Value::Func(func) => Some(func),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&ErrorValue> {
        match self.untyped() {
            Value::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Load through a pointer. Nil faults.
    pub fn deref(&self) -> RtResult<Value> {
        match self.untyped() {
            Value::Pointer(p) => Ok(p.load()),
            Value::Nil => Err(Panic::nil_deref()),
            other => Err(Panic::reflect(format!(
                "invalid indirect of {} (non-pointer)",
                other.variant_name()
            ))),
        }
    }

    pub fn variant_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Uint(_) => "uint",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Pointer(_) => "pointer",
            Value::Struct(_) => "struct",
            Value::Array(_) => "array",
            Value::Slice(_) => "slice",
            Value::Map(_) => "map",
            Value::Chan(_) => "chan",
            Value::Func(_) => "func",
            Value::Error(_) => "error",
            Value::Typed(_) => "typed",
        }
    }

    fn fmt_go(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("<nil>"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Uint(u) => write!(f, "{}", u),
            Value::Float(x) => fmt_float(f, *x),
            Value::String(s) => f.write_str(s),
            Value::Pointer(p) => {
                // Only the outermost pointer to a composite is followed.
                if depth == 0 {
                    let target = p.load();
                    if matches!(
                        target,
                        Value::Struct(_) | Value::Array(_) | Value::Slice(_) | Value::Map(_)
                    ) {
                        f.write_str("&")?;
                        return target.fmt_go(f, depth + 1);
                    }
                }
                write!(f, "0x{:x}", p.addr())
            }
            Value::Struct(s) => {
                f.write_str("{")?;
                for (i, field) in s.fields().iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    field.fmt_go(f, depth + 1)?;
                }
                f.write_str("}")
            }
            Value::Array(a) => fmt_seq(f, &a.to_vec(), depth),
            Value::Slice(s) => fmt_seq(f, &s.to_vec(), depth),
            Value::Map(m) => {
                f.write_str("map[")?;
                for (i, (k, v)) in m.entries().iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    k.fmt_go(f, depth + 1)?;
                    f.write_str(":")?;
                    v.fmt_go(f, depth + 1)?;
                }
                f.write_str("]")
            }
            Value::Chan(c) => write!(f, "0x{:x}", c.addr()),
            Value::Func(func) => write!(f, "0x{:x}", func.addr()),
            Value::Error(e) => f.write_str(&e.error()),
            Value::Typed(t) => t.value().fmt_go(f, depth),
        }
    }
}

fn fmt_seq(f: &mut fmt::Formatter<'_>, items: &[Value], depth: usize) -> fmt::Result {
    f.write_str("[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        item.fmt_go(f, depth + 1)?;
    }
    f.write_str("]")
}

/// Shortest representation, switching to exponent form outside [1e-4, 1e6).
fn fmt_float(f: &mut fmt::Formatter<'_>, x: f64) -> fmt::Result {
    if x.is_nan() {
        return f.write_str("NaN");
    }
    if x.is_infinite() {
        return f.write_str(if x > 0.0 { "+Inf" } else { "-Inf" });
    }
    if x == 0.0 {
        return f.write_str(if x.is_sign_negative() { "-0" } else { "0" });
    }
    let sci = format!("{:e}", x);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };
    if !(-4..6).contains(&exp) {
        let sign = if exp < 0 { '-' } else { '+' };
        write!(f, "{}e{}{:02}", mantissa, sign, exp.abs())
    } else {
        write!(f, "{}", x)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_go(f, 0)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("Nil"),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Typed(t) => write!(f, "{}({:?})", t.ty(), t.value()),
            other => write!(f, "{}({})", other.variant_name(), other),
        }
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        Value::Uint(u)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Value::String(s)
    }
}

impl From<Cell> for Value {
    fn from(cell: Cell) -> Self {
        Value::Pointer(Pointer::Cell(cell))
    }
}

impl From<Pointer> for Value {
    fn from(p: Pointer) -> Self {
        Value::Pointer(p)
    }
}

impl From<StructValue> for Value {
    fn from(s: StructValue) -> Self {
        Value::Struct(s)
    }
}

impl From<ArrayValue> for Value {
    fn from(a: ArrayValue) -> Self {
        Value::Array(a)
    }
}

impl From<SliceValue> for Value {
    fn from(s: SliceValue) -> Self {
        Value::Slice(s)
    }
}

impl From<MapValue> for Value {
    fn from(m: MapValue) -> Self {
        Value::Map(m)
    }
}

impl From<Channel> for Value {
    fn from(c: Channel) -> Self {
        Value::Chan(c)
    }
}

impl From<FuncValue> for Value {
    fn from(func: FuncValue) -> Self {
        Value::Func(func)
    }
}

impl From<ErrorValue> for Value {
    fn from(e: ErrorValue) -> Self {
        Value::Error(e)
    }
}

impl From<Option<ErrorValue>> for Value {
    fn from(e: Option<ErrorValue>) -> Self {
        e.map(Value::Error).unwrap_or(Value::Nil)
    }
}

impl From<Typed> for Value {
    fn from(t: Typed) -> Self {
        Value::Typed(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_display() {
        assert_eq!(Value::Nil.to_string(), "<nil>");
        assert_eq!(Value::from(true).to_string(), "true");
        assert_eq!(Value::from(-3i64).to_string(), "-3");
        assert_eq!(Value::from("hi").to_string(), "hi");
    }

    #[test]
    fn test_float_display() {
        assert_eq!(Value::from(2.0).to_string(), "2");
        assert_eq!(Value::from(3.25).to_string(), "3.25");
        assert_eq!(Value::from(123456.0).to_string(), "123456");
        assert_eq!(Value::from(1_000_000.0).to_string(), "1e+06");
        assert_eq!(Value::from(0.00001).to_string(), "1e-05");
        assert_eq!(Value::from(f64::INFINITY).to_string(), "+Inf");
    }

    #[test]
    fn test_accessors_see_through_typed() {
        let v = Value::Typed(Typed::new(crate::reflect::basic(tern_common_core::Kind::Int8), Value::Int(4)));
        assert_eq!(v.as_int(), Some(4));
        assert!(!v.is_nil());
        assert_eq!(v.to_string(), "4");
    }
}
