//! `reflect.Value`.
//!
//! A [`ReflectValue`] is a type descriptor paired either with a value or with
//! a place. Values reached through a pointer, a slice element, or a field of
//! an addressable struct are places: they are addressable, and settable unless
//! the path went through an unexported field.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tern_common_core::Kind;

use super::map_iter::MapIter;
use super::types::{pointer_to, Type};
use super::type_of;
use crate::copy::copy_value;
use crate::objects::cell::{Cell, Pointer};
use crate::objects::channel::{self, Channel, RecvWithOkFuture, SendFuture};
use crate::objects::map::MapValue;
use crate::objects::slice::SliceValue;
use crate::panic::{Panic, RtResult};
use crate::value::{Typed, Value};

#[derive(Clone)]
enum Place {
    Value(Value),
    Addr(Pointer),
}

#[derive(Clone)]
pub struct ReflectValue {
    ty: Option<Type>,
    place: Place,
    /// Obtained through an unexported field.
    read_only: bool,
}

/// `reflect.ValueOf`. A nil interface yields the invalid value.
pub fn value_of(v: impl Into<Value>) -> ReflectValue {
    match v.into() {
        Value::Typed(t) => ReflectValue::plain(Some(t.ty().clone()), t.value().clone()),
        other => {
            let ty = type_of(&other);
            ReflectValue::plain(ty, other)
        }
    }
}

/// `reflect.Zero`: the zero value of `ty`, neither addressable nor settable.
pub fn zero(ty: &Type) -> RtResult<ReflectValue> {
    Ok(ReflectValue::plain(Some(ty.clone()), ty.zero()?))
}

/// `reflect.New`: a pointer to a fresh zero value of `ty`.
pub fn new(ty: &Type) -> RtResult<ReflectValue> {
    let cell = Cell::typed(ty.zero()?, ty.clone());
    Ok(ReflectValue::plain(Some(pointer_to(ty)), Value::Pointer(Pointer::Cell(cell))))
}

/// `reflect.Indirect`: the pointee for pointers, `v` itself otherwise.
pub fn indirect(v: &ReflectValue) -> RtResult<ReflectValue> {
    if v.kind() == Kind::Pointer {
        v.elem()
    } else {
        Ok(v.clone())
    }
}

fn truncate_int(kind: Kind, x: i64) -> i64 {
    match kind {
        Kind::Int8 => x as i8 as i64,
        Kind::Int16 => x as i16 as i64,
        Kind::Int32 => x as i32 as i64,
        _ => x,
    }
}

fn truncate_uint(kind: Kind, x: u64) -> u64 {
    match kind {
        Kind::Uint8 => x as u8 as u64,
        Kind::Uint16 => x as u16 as u64,
        Kind::Uint32 => x as u32 as u64,
        _ => x,
    }
}

/// `v` as an interface holding a value of static type `ty`.
fn boxed(ty: &Type, v: Value) -> Value {
    if ty.kind() == Kind::Interface {
        return v;
    }
    let v = copy_value(&v);
    match type_of(&v) {
        Some(actual) if &actual == ty => v,
        _ => Value::Typed(Typed::new(ty.clone(), v.untyped().clone())),
    }
}

fn is_zero_value(ty: &Type, v: &Value) -> RtResult<bool> {
    let kind = ty.kind();
    Ok(match kind {
        Kind::Bool => !v.as_bool().unwrap_or(false),
        Kind::String => v.as_str().map_or(true, str::is_empty),
        Kind::Float32 | Kind::Float64 => v.as_float().map_or(true, |x| x.to_bits() == 0),
        k if k.is_signed_int() => v.as_int().unwrap_or(0) == 0,
        k if k.is_unsigned_int() => v.as_uint().unwrap_or(0) == 0,
        Kind::Array => {
            let elem = ty.elem()?;
            for e in v.as_array().map(|a| a.to_vec()).unwrap_or_default() {
                if !is_zero_value(&elem, &e)? {
                    return Ok(false);
                }
            }
            true
        }
        Kind::Struct => {
            let fields = v.as_struct().map(|s| s.fields()).unwrap_or_default();
            for (i, field) in fields.iter().enumerate() {
                if !is_zero_value(&ty.field(i)?.ty, field)? {
                    return Ok(false);
                }
            }
            true
        }
        Kind::Interface => matches!(v, Value::Nil),
        _ => v.is_nil(),
    })
}

#[allow(clippy::len_without_is_empty)]
impl ReflectValue {
    fn plain(ty: Option<Type>, value: Value) -> Self {
        Self { ty, place: Place::Value(value), read_only: false }
    }

    /// The invalid (zero) `Value`.
    pub fn invalid() -> Self {
        Self::plain(None, Value::Nil)
    }

    /// A value of `ty` derived from `self`, inheriting read-only-ness.
    fn derive(&self, ty: Type, place: Place) -> Self {
        Self { ty: Some(ty), place, read_only: self.read_only }
    }

    fn raw(&self) -> Value {
        match &self.place {
            Place::Value(v) => v.clone(),
            Place::Addr(p) => p.load(),
        }
    }

    fn kind_error(&self, method: &str) -> Panic {
        match &self.ty {
            Some(ty) => Panic::reflect(format!("reflect: call of reflect.Value.{} on {} Value", method, ty.kind())),
            None => Panic::reflect(format!("reflect: call of reflect.Value.{} on zero Value", method)),
        }
    }

    fn must_be(&self, kind: Kind, method: &str) -> RtResult<&Type> {
        match &self.ty {
            Some(ty) if ty.kind() == kind => Ok(ty),
            _ => Err(self.kind_error(method)),
        }
    }

    fn check_exported(&self, method: &str) -> RtResult<()> {
        if self.read_only {
            return Err(Panic::reflect(format!(
                "reflect: reflect.Value.{} using value obtained using unexported field",
                method
            )));
        }
        Ok(())
    }

    fn check_settable(&self, method: &str) -> RtResult<&Pointer> {
        self.check_exported(method)?;
        match &self.place {
            Place::Addr(p) => Ok(p),
            Place::Value(_) => {
                Err(Panic::reflect(format!("reflect: reflect.Value.{} using unaddressable value", method)))
            }
        }
    }

    /// The value to store when assigning `self` to a location of type `dst`.
    pub(crate) fn assign_to(&self, dst: &Type, context: &str) -> RtResult<Value> {
        let ty = self
            .ty
            .as_ref()
            .ok_or_else(|| Panic::reflect(format!("reflect: {} using zero Value argument", context)))?;
        self.check_exported(context)?;
        if dst.kind() == Kind::Interface {
            if ty != dst && !ty.implements(dst)? {
                return Err(self.not_assignable(ty, dst, context));
            }
            return Ok(boxed(ty, self.raw()));
        }
        if ty != dst {
            return Err(self.not_assignable(ty, dst, context));
        }
        Ok(copy_value(self.raw().untyped()))
    }

    fn not_assignable(&self, ty: &Type, dst: &Type, context: &str) -> Panic {
        Panic::reflect(format!("reflect.{}: value of type {} is not assignable to type {}", context, ty, dst))
    }

    // -------------------------------------------------------------------------
    // Basics
    // -------------------------------------------------------------------------

    pub fn is_valid(&self) -> bool {
        self.ty.is_some()
    }

    /// `Kind::Invalid` for the invalid value.
    pub fn kind(&self) -> Kind {
        self.ty.as_ref().map_or(Kind::Invalid, Type::kind)
    }

    pub fn typ(&self) -> RtResult<Type> {
        self.ty.clone().ok_or_else(|| self.kind_error("Type"))
    }

    pub fn can_addr(&self) -> bool {
        matches!(self.place, Place::Addr(_))
    }

    pub fn can_set(&self) -> bool {
        self.can_addr() && !self.read_only
    }

    pub fn can_interface(&self) -> bool {
        self.is_valid() && !self.read_only
    }

    /// `v.Interface()`: the value boxed with its type. Values of a named or
    /// sized type come back as `Value::Typed`; structs and arrays are copied.
    pub fn interface(&self) -> RtResult<Value> {
        let ty = self.ty.as_ref().ok_or_else(|| self.kind_error("Interface"))?;
        if self.read_only {
            return Err(Panic::reflect(
                "reflect.Value.Interface: cannot return value obtained from unexported field or method",
            ));
        }
        Ok(boxed(ty, self.raw()))
    }

    pub fn is_nil(&self) -> RtResult<bool> {
        match self.kind() {
            Kind::Interface => Ok(matches!(self.raw(), Value::Nil)),
            k if k.is_nillable() => Ok(self.raw().is_nil()),
            _ => Err(self.kind_error("IsNil")),
        }
    }

    pub fn is_zero(&self) -> RtResult<bool> {
        let ty = self.ty.as_ref().ok_or_else(|| self.kind_error("IsZero"))?;
        is_zero_value(ty, &self.raw())
    }

    // -------------------------------------------------------------------------
    // Scalars
    // -------------------------------------------------------------------------

    pub fn bool(&self) -> RtResult<bool> {
        self.must_be(Kind::Bool, "Bool")?;
        Ok(self.raw().as_bool().unwrap_or(false))
    }

    pub fn int(&self) -> RtResult<i64> {
        if !self.kind().is_signed_int() {
            return Err(self.kind_error("Int"));
        }
        Ok(self.raw().as_int().unwrap_or(0))
    }

    pub fn uint(&self) -> RtResult<u64> {
        if !self.kind().is_unsigned_int() {
            return Err(self.kind_error("Uint"));
        }
        Ok(self.raw().as_uint().unwrap_or(0))
    }

    pub fn float(&self) -> RtResult<f64> {
        if !self.kind().is_float() {
            return Err(self.kind_error("Float"));
        }
        Ok(self.raw().as_float().unwrap_or(0.0))
    }

    /// The string for `String` kinds, `<T Value>` for everything else.
    pub fn string(&self) -> String {
        match &self.ty {
            Some(ty) if ty.kind() == Kind::String => self.raw().as_str().unwrap_or("").to_string(),
            Some(ty) => format!("<{} Value>", ty),
            None => "<invalid Value>".to_string(),
        }
    }

    pub fn set_bool(&self, x: bool) -> RtResult<()> {
        let place = self.check_settable("SetBool")?;
        self.must_be(Kind::Bool, "SetBool")?;
        place.store(Value::Bool(x));
        Ok(())
    }

    /// Stores `x` truncated to the kind's width.
    pub fn set_int(&self, x: i64) -> RtResult<()> {
        let place = self.check_settable("SetInt")?;
        let kind = self.kind();
        if !kind.is_signed_int() {
            return Err(self.kind_error("SetInt"));
        }
        place.store(Value::Int(truncate_int(kind, x)));
        Ok(())
    }

    pub fn set_uint(&self, x: u64) -> RtResult<()> {
        let place = self.check_settable("SetUint")?;
        let kind = self.kind();
        if !kind.is_unsigned_int() {
            return Err(self.kind_error("SetUint"));
        }
        place.store(Value::Uint(truncate_uint(kind, x)));
        Ok(())
    }

    pub fn set_float(&self, x: f64) -> RtResult<()> {
        let place = self.check_settable("SetFloat")?;
        let x = match self.kind() {
            Kind::Float32 => x as f32 as f64,
            Kind::Float64 => x,
            _ => return Err(self.kind_error("SetFloat")),
        };
        place.store(Value::Float(x));
        Ok(())
    }

    pub fn set_string(&self, x: &str) -> RtResult<()> {
        let place = self.check_settable("SetString")?;
        self.must_be(Kind::String, "SetString")?;
        place.store(Value::from(x));
        Ok(())
    }

    /// `v.Set(x)`: `x` must be assignable to `v`'s type.
    pub fn set(&self, x: &ReflectValue) -> RtResult<()> {
        let place = self.check_settable("Set")?;
        let ty = self.typ()?;
        let value = x.assign_to(&ty, "Set")?;
        place.store(value);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Navigation
    // -------------------------------------------------------------------------

    pub fn len(&self) -> RtResult<usize> {
        let raw = self.raw();
        match self.kind() {
            Kind::Array => self.typ()?.len(),
            Kind::Slice => Ok(raw.as_slice().map_or(0, SliceValue::len)),
            Kind::Map => Ok(raw.as_map().map_or(0, MapValue::len)),
            Kind::String => Ok(raw.as_str().map_or(0, str::len)),
            Kind::Chan => Ok(raw.as_chan().map_or(0, Channel::len)),
            _ => Err(self.kind_error("Len")),
        }
    }

    pub fn cap(&self) -> RtResult<usize> {
        let raw = self.raw();
        match self.kind() {
            Kind::Array => self.typ()?.len(),
            Kind::Slice => Ok(raw.as_slice().map_or(0, SliceValue::cap)),
            Kind::Chan => Ok(raw.as_chan().map_or(0, Channel::cap)),
            _ => Err(self.kind_error("Cap")),
        }
    }

    pub fn num_field(&self) -> RtResult<usize> {
        self.must_be(Kind::Struct, "NumField")?.num_field()
    }

    /// Field `index`; addressable when `self` is.
    pub fn field(&self, index: usize) -> RtResult<ReflectValue> {
        let ty = self.must_be(Kind::Struct, "Field")?;
        let field = ty.field(index)?;
        let raw = self.raw();
        let s = raw
            .as_struct()
            .ok_or_else(|| Panic::reflect(format!("reflect: {} value has no fields", ty)))?;
        let place = match self.place {
            Place::Addr(_) => Place::Addr(s.field_ptr(index)),
            Place::Value(_) => Place::Value(s.field(index)?),
        };
        let mut v = self.derive(field.ty.clone(), place);
        v.read_only |= !field.is_exported();
        Ok(v)
    }

    /// Nested field by index path, following embedded pointers.
    pub fn field_by_index(&self, path: &[usize]) -> RtResult<ReflectValue> {
        let mut v = self.clone();
        for (depth, &index) in path.iter().enumerate() {
            if depth > 0 && v.kind() == Kind::Pointer {
                if v.is_nil()? {
                    return Err(Panic::reflect("reflect: indirection through nil pointer to embedded struct"));
                }
                v = v.elem()?;
            }
            v = v.field(index)?;
        }
        Ok(v)
    }

    /// The invalid value if there is no such field.
    pub fn field_by_name(&self, name: &str) -> RtResult<ReflectValue> {
        let ty = self.must_be(Kind::Struct, "FieldByName")?;
        match ty.field_by_name(name)? {
            Some(field) => self.field_by_index(&field.index),
            None => Ok(ReflectValue::invalid()),
        }
    }

    /// Element `i` of an array, slice or string. Slice elements are always
    /// addressable; array elements when the array is.
    pub fn index(&self, i: usize) -> RtResult<ReflectValue> {
        let raw = self.raw();
        match self.kind() {
            Kind::Slice => {
                let elem = self.typ()?.elem()?;
                let ptr = match raw.as_slice() {
                    Some(s) => s.elem_ptr(i)?,
                    None => return Err(Panic::index_out_of_range(i, 0)),
                };
                Ok(self.derive(elem, Place::Addr(ptr)))
            }
            Kind::Array => {
                let elem = self.typ()?.elem()?;
                let array = raw
                    .as_array()
                    .ok_or_else(|| Panic::reflect("reflect: array value without elements"))?;
                let place = match self.place {
                    Place::Addr(_) => Place::Addr(array.elem_ptr(i)?),
                    Place::Value(_) => Place::Value(array.get(i)?),
                };
                Ok(self.derive(elem, place))
            }
            Kind::String => {
                let s = raw.as_str().unwrap_or("");
                let byte = s
                    .as_bytes()
                    .get(i)
                    .copied()
                    .ok_or_else(|| Panic::index_out_of_range(i, s.len()))?;
                Ok(self.derive(super::basic(Kind::Uint8), Place::Value(Value::Uint(byte as u64))))
            }
            _ => Err(self.kind_error("Index")),
        }
    }

    /// The pointee of a pointer or the dynamic value of an interface. Nil
    /// yields the invalid value.
    pub fn elem(&self) -> RtResult<ReflectValue> {
        match self.kind() {
            Kind::Pointer => {
                let raw = self.raw();
                let ptr = match raw.as_pointer() {
                    Some(p) => p.clone(),
                    None => return Ok(ReflectValue::invalid()),
                };
                let elem = match ptr.elem_type() {
                    Some(elem) => elem,
                    None => self.typ()?.elem()?,
                };
                Ok(self.derive(elem, Place::Addr(ptr)))
            }
            Kind::Interface => {
                let mut v = value_of(self.raw());
                v.read_only = self.read_only;
                Ok(v)
            }
            _ => Err(self.kind_error("Elem")),
        }
    }

    /// `v.Addr()`: a pointer to an addressable value.
    pub fn addr(&self) -> RtResult<ReflectValue> {
        let ty = self.typ()?;
        match &self.place {
            Place::Addr(p) => {
                let mut v = Self::plain(Some(pointer_to(ty)), Value::Pointer(p.clone()));
                v.read_only = self.read_only;
                Ok(v)
            }
            Place::Value(_) => Err(Panic::reflect("reflect.Value.Addr of unaddressable value")),
        }
    }

    // -------------------------------------------------------------------------
    // Maps
    // -------------------------------------------------------------------------

    pub(crate) fn map_value(&self) -> Option<MapValue> {
        self.raw().as_map().cloned()
    }

    /// Keys in insertion order; empty for a nil map.
    pub fn map_keys(&self) -> RtResult<Vec<ReflectValue>> {
        let key_ty = self.must_be(Kind::Map, "MapKeys")?.key()?;
        let keys = self.map_value().map(|m| m.keys()).unwrap_or_default();
        Ok(keys.into_iter().map(|k| self.derive(key_ty.clone(), Place::Value(k))).collect())
    }

    /// The invalid value if `key` is absent.
    pub fn map_index(&self, key: &ReflectValue) -> RtResult<ReflectValue> {
        let ty = self.must_be(Kind::Map, "MapIndex")?;
        let k = key.assign_to(&ty.key()?, "Value.MapIndex")?;
        let found = match self.map_value() {
            Some(m) => m.get(&k)?,
            None => None,
        };
        Ok(match found {
            Some(v) => self.derive(ty.elem()?, Place::Value(v)),
            None => ReflectValue::invalid(),
        })
    }

    /// `v.SetMapIndex(key, elem)`; an invalid `elem` deletes `key`.
    pub fn set_map_index(&self, key: &ReflectValue, elem: &ReflectValue) -> RtResult<()> {
        let ty = self.must_be(Kind::Map, "SetMapIndex")?;
        self.check_exported("SetMapIndex")?;
        let k = key.assign_to(&ty.key()?, "Value.SetMapIndex")?;
        let map = self.map_value();
        if !elem.is_valid() {
            if let Some(m) = map {
                m.remove(&k)?;
            }
            return Ok(());
        }
        let m = map.ok_or_else(Panic::nil_map_write)?;
        let v = elem.assign_to(&ty.elem()?, "Value.SetMapIndex")?;
        m.insert(k, v)
    }

    pub fn map_range(&self) -> RtResult<MapIter> {
        self.must_be(Kind::Map, "MapRange")?;
        Ok(MapIter::new(self.clone()))
    }

    pub(crate) fn map_entry(&self, key: Value, value: Value) -> RtResult<(ReflectValue, ReflectValue)> {
        let ty = self.typ()?;
        Ok((self.derive(ty.key()?, Place::Value(key)), self.derive(ty.elem()?, Place::Value(value))))
    }

    // -------------------------------------------------------------------------
    // Functions
    // -------------------------------------------------------------------------

    /// `v.Call(args)`. Trailing arguments of a variadic function are packed
    /// into a slice.
    pub fn call(&self, args: &[ReflectValue]) -> RtResult<Vec<ReflectValue>> {
        let ty = self.must_be(Kind::Func, "Call")?.clone();
        self.check_exported("Call")?;
        let raw = self.raw();
        let func = raw.as_func().ok_or_else(|| Panic::reflect("reflect: call of nil function"))?;

        if func.ty().is_none() {
            let values = args.iter().map(ReflectValue::interface).collect::<RtResult<Vec<_>>>()?;
            return Ok(func.call(&values)?.into_iter().map(value_of).collect());
        }

        let num_in = ty.num_in()?;
        let variadic = ty.is_variadic()?;
        let fixed = if variadic { num_in.saturating_sub(1) } else { num_in };
        if args.len() < fixed {
            return Err(Panic::reflect("reflect: Call with too few input arguments"));
        }
        if !variadic && args.len() > num_in {
            return Err(Panic::reflect("reflect: Call with too many input arguments"));
        }

        let mut values = Vec::with_capacity(num_in);
        for (i, arg) in args[..fixed].iter().enumerate() {
            values.push(arg.assign_to(&ty.in_(i)?, "Value.Call")?);
        }
        if variadic {
            let slice_ty = ty.in_(fixed)?;
            let elem = slice_ty.elem()?;
            let rest = args[fixed..]
                .iter()
                .map(|arg| arg.assign_to(&elem, "Value.Call"))
                .collect::<RtResult<Vec<_>>>()?;
            values.push(Value::Slice(SliceValue::from_vec(slice_ty, rest)));
        }

        let results = func.call(&values)?;
        results
            .into_iter()
            .enumerate()
            .map(|(i, r)| Ok(Self::plain(Some(ty.out(i)?), r)))
            .collect()
    }

    // -------------------------------------------------------------------------
    // Channels
    // -------------------------------------------------------------------------

    pub(crate) fn chan_value(&self) -> Option<Channel> {
        self.raw().as_chan().cloned()
    }

    pub(crate) fn chan_elem(&self, method: &str) -> RtResult<Type> {
        self.must_be(Kind::Chan, method)?.elem()
    }

    /// `v.Send(x)`; suspends until a receiver takes the value.
    pub fn send(&self, x: &ReflectValue) -> RtResult<SendFuture> {
        let elem = self.chan_elem("Send")?;
        self.check_exported("Send")?;
        let value = x.assign_to(&elem, "Value.Send")?;
        Ok(channel::send(self.chan_value().as_ref(), value))
    }

    /// `v.Recv()`; resolves to the received value and the ok flag.
    pub fn recv(&self) -> RtResult<ReflectRecvFuture> {
        let elem = self.chan_elem("Recv")?;
        self.check_exported("Recv")?;
        Ok(ReflectRecvFuture { inner: channel::recv_with_ok(self.chan_value().as_ref()), elem })
    }

    /// `Ok(false)` if the send would block; a nil channel always would.
    pub fn try_send(&self, x: &ReflectValue) -> RtResult<bool> {
        let elem = self.chan_elem("TrySend")?;
        self.check_exported("TrySend")?;
        let value = x.assign_to(&elem, "Value.TrySend")?;
        match self.chan_value() {
            Some(chan) => chan.try_send(value),
            None => Ok(false),
        }
    }

    /// The invalid value and `false` if the receive would block; the zero
    /// value and `false` once the channel is closed and drained.
    pub fn try_recv(&self) -> RtResult<(ReflectValue, bool)> {
        let elem = self.chan_elem("TryRecv")?;
        self.check_exported("TryRecv")?;
        let received = match self.chan_value() {
            Some(chan) => chan.try_recv()?,
            None => None,
        };
        Ok(match received {
            Some((v, ok)) => (Self::plain(Some(elem), v), ok),
            None => (ReflectValue::invalid(), false),
        })
    }

    pub fn close(&self) -> RtResult<()> {
        self.must_be(Kind::Chan, "Close")?;
        self.check_exported("Close")?;
        channel::close(self.chan_value().as_ref())
    }

    pub(crate) fn received(elem: Type, value: Value) -> Self {
        Self::plain(Some(elem), value)
    }
}

impl Default for ReflectValue {
    fn default() -> Self {
        Self::invalid()
    }
}

impl fmt::Debug for ReflectValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ty {
            Some(ty) => write!(f, "<{} Value {:?}>", ty, self.raw()),
            None => f.write_str("<invalid Value>"),
        }
    }
}

/// Future returned by [`ReflectValue::recv`].
#[must_use = "futures do nothing unless awaited"]
pub struct ReflectRecvFuture {
    inner: RecvWithOkFuture,
    elem: Type,
}

impl Future for ReflectRecvFuture {
    type Output = RtResult<(ReflectValue, bool)>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let elem = this.elem.clone();
        Pin::new(&mut this.inner)
            .poll(cx)
            .map(|r| r.map(|(value, ok)| (ReflectValue::received(elem, value), ok)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::{basic, map_of, slice_of, TypeBuilder};
    use crate::objects::struct_ops::StructValue;

    fn point() -> Type {
        TypeBuilder::named_struct("value_test", "Point")
            .field("X", basic(Kind::Int))
            .field("y", basic(Kind::Int))
            .register()
    }

    #[test]
    fn test_value_of_scalars() {
        let v = value_of(42i64);
        assert_eq!(v.kind(), Kind::Int);
        assert_eq!(v.int().unwrap(), 42);
        assert!(v.float().is_err());
        assert!(!v.can_set());
        assert!(!value_of(Value::Nil).is_valid());
        assert_eq!(value_of("hi").string(), "hi");
        assert_eq!(value_of(1i64).string(), "<int Value>");
    }

    #[test]
    fn test_sized_kinds_box_on_interface() {
        let v = value_of(Value::Typed(Typed::new(basic(Kind::Int8), Value::Int(-3))));
        assert_eq!(v.kind(), Kind::Int8);
        match v.interface().unwrap() {
            Value::Typed(t) => assert_eq!(t.ty(), &basic(Kind::Int8)),
            other => panic!("expected a typed box, got {:?}", other),
        }
        assert!(matches!(value_of(7i64).interface().unwrap(), Value::Int(7)));
    }

    #[test]
    fn test_set_through_pointer() {
        let p = new(&basic(Kind::Int8)).unwrap();
        let e = p.elem().unwrap();
        assert!(e.can_set());
        e.set_int(300).unwrap();
        assert_eq!(e.int().unwrap(), 44);
        assert_eq!(p.elem().unwrap().int().unwrap(), 44);
        assert!(value_of(1i64).set_int(2).is_err());
    }

    #[test]
    fn test_unexported_fields_are_read_only() {
        let ty = point();
        let s = StructValue::new(&ty, [("X", Value::Int(1)), ("y", Value::Int(2))]).unwrap();
        let cell = Cell::typed(Value::Struct(s.clone()), ty.clone());
        let v = value_of(Value::Pointer(Pointer::Cell(cell))).elem().unwrap();

        let x = v.field(0).unwrap();
        assert!(x.can_set());
        x.set_int(10).unwrap();
        assert!(matches!(s.get("X").unwrap(), Value::Int(10)));

        let y = v.field_by_name("y").unwrap();
        assert!(y.can_addr());
        assert!(!y.can_set());
        assert_eq!(y.int().unwrap(), 2);
        assert!(y.set_int(5).is_err());
        assert!(y.interface().is_err());
        assert!(!v.field_by_name("Z").unwrap().is_valid());
    }

    #[test]
    fn test_struct_value_is_not_settable() {
        let ty = point();
        let v = value_of(StructValue::zero(&ty).unwrap());
        assert_eq!(v.num_field().unwrap(), 2);
        assert!(!v.field(0).unwrap().can_set());
        assert!(v.is_zero().unwrap());
        assert!(v.len().is_err());
    }

    #[test]
    fn test_slice_elements_are_addressable() {
        let s = SliceValue::of(basic(Kind::Int), vec![Value::Int(1), Value::Int(2)]);
        let v = value_of(s.clone());
        assert_eq!(v.len().unwrap(), 2);
        v.index(1).unwrap().set_int(20).unwrap();
        assert!(matches!(s.get(1).unwrap(), Value::Int(20)));
        assert!(v.index(5).is_err());
    }

    #[test]
    fn test_map_ops() {
        let m = MapValue::new(&map_of(basic(Kind::String), basic(Kind::Int))).unwrap();
        let v = value_of(m.clone());
        v.set_map_index(&value_of("a"), &value_of(1i64)).unwrap();
        v.set_map_index(&value_of("b"), &value_of(2i64)).unwrap();
        assert_eq!(v.len().unwrap(), 2);
        assert_eq!(v.map_index(&value_of("b")).unwrap().int().unwrap(), 2);
        assert!(!v.map_index(&value_of("zz")).unwrap().is_valid());

        v.set_map_index(&value_of("a"), &ReflectValue::invalid()).unwrap();
        assert_eq!(m.len(), 1);
        assert!(v.set_map_index(&value_of(1i64), &value_of(1i64)).is_err());

        let nil_map = zero(&map_of(basic(Kind::String), basic(Kind::Int))).unwrap();
        assert!(nil_map.is_nil().unwrap());
        assert!(nil_map.set_map_index(&value_of("a"), &value_of(1i64)).is_err());
        assert!(nil_map.map_keys().unwrap().is_empty());
    }

    #[test]
    fn test_set_checks_assignability() {
        let p = new(&slice_of(basic(Kind::Int))).unwrap().elem().unwrap();
        assert!(p.set(&value_of(1i64)).is_err());
        p.set(&value_of(SliceValue::of(basic(Kind::Int), vec![Value::Int(9)]))).unwrap();
        assert_eq!(p.len().unwrap(), 1);

        let any = new(&crate::reflect::any_type()).unwrap().elem().unwrap();
        any.set(&value_of(5i64)).unwrap();
        assert_eq!(any.kind(), Kind::Interface);
        assert_eq!(any.elem().unwrap().int().unwrap(), 5);
    }
}
