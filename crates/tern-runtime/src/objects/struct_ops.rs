//! Struct values.
//!
//! A struct is a fixed list of fields laid out as its type declares them.
//! Assigning a struct goes through [`ValueType::clone_value`]: nested structs
//! and arrays are copied, every other field keeps sharing its referent.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::copy::{copy_value, ValueType};
use crate::objects::cell::Pointer;
use crate::panic::{Panic, RtResult};
use crate::reflect::Type;
use crate::value::Value;
use tern_common_core::Kind;

struct StructInner {
    ty: Type,
    fields: RefCell<Vec<Value>>,
}

#[derive(Clone)]
pub struct StructValue(Rc<StructInner>);

impl StructValue {
    /// Every field set to its zero value.
    pub fn zero(ty: &Type) -> RtResult<Self> {
        if ty.kind() != Kind::Struct {
            return Err(Panic::reflect(format!("reflect: struct value of non-struct type {}", ty)));
        }
        let fields = (0..ty.num_field()?)
            .map(|i| ty.field(i)?.ty.zero())
            .collect::<RtResult<Vec<_>>>()?;
        Ok(Self::from_fields(ty.clone(), fields))
    }

    /// Zero value with the named fields overridden, as a composite literal does.
    pub fn new<'a>(
        ty: &Type,
        overrides: impl IntoIterator<Item = (&'a str, Value)>,
    ) -> RtResult<Self> {
        let s = Self::zero(ty)?;
        for (name, value) in overrides {
            let index = ty.field_index(name).ok_or_else(|| {
                Panic::reflect(format!("unknown field {} in struct literal of type {}", name, ty))
            })?;
            s.set_field_unchecked(index, copy_value(&value));
        }
        Ok(s)
    }

    /// Build from already laid-out fields. The field count must match the type.
    pub fn from_fields(ty: Type, fields: Vec<Value>) -> Self {
        debug_assert_eq!(fields.len(), ty.field_count());
        Self(Rc::new(StructInner { ty, fields: RefCell::new(fields) }))
    }

    #[inline]
    pub fn ty(&self) -> &Type {
        &self.0.ty
    }

    pub fn num_fields(&self) -> usize {
        self.0.fields.borrow().len()
    }

    pub fn field(&self, index: usize) -> RtResult<Value> {
        self.0
            .fields
            .borrow()
            .get(index)
            .cloned()
            .ok_or_else(|| Panic::reflect(format!("reflect: Field index {} out of range", index)))
    }

    pub fn set_field(&self, index: usize, value: Value) -> RtResult<()> {
        let mut fields = self.0.fields.borrow_mut();
        let slot = fields
            .get_mut(index)
            .ok_or_else(|| Panic::reflect(format!("reflect: Field index {} out of range", index)))?;
        *slot = value;
        Ok(())
    }

    pub(crate) fn field_unchecked(&self, index: usize) -> Value {
        self.0.fields.borrow().get(index).cloned().unwrap_or_default()
    }

    pub(crate) fn set_field_unchecked(&self, index: usize, value: Value) {
        if let Some(slot) = self.0.fields.borrow_mut().get_mut(index) {
            *slot = value;
        }
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.0.ty.field_index(name)
    }

    pub fn get(&self, name: &str) -> RtResult<Value> {
        let index = self.field_index(name).ok_or_else(|| self.no_field(name))?;
        self.field(index)
    }

    pub fn set(&self, name: &str, value: Value) -> RtResult<()> {
        let index = self.field_index(name).ok_or_else(|| self.no_field(name))?;
        self.set_field(index, value)
    }

    /// `&s.field`, aliasing this struct.
    pub fn field_ptr(&self, index: usize) -> Pointer {
        Pointer::Field { owner: self.clone(), index }
    }

    /// Snapshot of the field values.
    pub fn fields(&self) -> Vec<Value> {
        self.0.fields.borrow().clone()
    }

    #[inline]
    pub fn ptr_eq(&self, other: &StructValue) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    fn no_field(&self, name: &str) -> Panic {
        Panic::reflect(format!("type {} has no field {}", self.0.ty, name))
    }
}

impl ValueType for StructValue {
    fn clone_value(&self) -> Self {
        let fields = self.0.fields.borrow().iter().map(copy_value).collect();
        Self(Rc::new(StructInner { ty: self.0.ty.clone(), fields: RefCell::new(fields) }))
    }
}

impl fmt::Debug for StructValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.0.ty, Value::Struct(self.clone()))
    }
}
