//! Reference cells and pointers.
//!
//! Taking the address of a variable materializes a [`Cell`]. The cell, not
//! its payload, carries pointer identity: every dereference of the same cell
//! observes the latest store. Addresses of struct fields and of array/slice
//! elements alias their container instead of boxing a copy.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::objects::struct_ops::StructValue;
use crate::objects::Backing;
use crate::panic::{Panic, RtResult};
use crate::reflect::Type;
use crate::value::Value;

struct CellInner {
    value: RefCell<Value>,
    elem: Option<Type>,
}

/// A boxed mutable variable.
#[derive(Clone)]
pub struct Cell(Rc<CellInner>);

impl Cell {
    pub fn new(value: Value) -> Self {
        Self(Rc::new(CellInner { value: RefCell::new(value), elem: None }))
    }

    /// A cell whose pointee type is known statically.
    pub fn typed(value: Value, elem: Type) -> Self {
        Self(Rc::new(CellInner { value: RefCell::new(value), elem: Some(elem) }))
    }

    #[inline]
    pub fn get(&self) -> Value {
        self.0.value.borrow().clone()
    }

    #[inline]
    pub fn set(&self, value: Value) {
        *self.0.value.borrow_mut() = value;
    }

    pub fn replace(&self, value: Value) -> Value {
        self.0.value.replace(value)
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut Value) -> R) -> R {
        f(&mut self.0.value.borrow_mut())
    }

    pub fn elem_type(&self) -> Option<&Type> {
        self.0.elem.as_ref()
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Cell) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cell(0x{:x})", self.addr())
    }
}

/// Fresh cell holding `value`.
pub fn make_cell(value: impl Into<Value>) -> Cell {
    Cell::new(value.into())
}

/// Whether `value` is pointer-shaped.
pub fn is_cell(value: &Value) -> bool {
    matches!(value.untyped(), Value::Pointer(_))
}

/// Contents of `cell`; a nil cell faults.
pub fn deref(cell: Option<&Cell>) -> RtResult<Value> {
    match cell {
        Some(cell) => Ok(cell.get()),
        None => Err(Panic::nil_deref()),
    }
}

// =============================================================================
// Pointer
// =============================================================================

/// Any addressable location.
#[derive(Clone)]
pub enum Pointer {
    Cell(Cell),
    /// Address of a struct field; aliases the owning struct.
    Field { owner: StructValue, index: usize },
    /// Address of an array or slice element; aliases the backing store.
    Elem { backing: Backing, index: usize, elem: Option<Type> },
}

impl Pointer {
    pub fn load(&self) -> Value {
        match self {
            Pointer::Cell(cell) => cell.get(),
            Pointer::Field { owner, index } => owner.field_unchecked(*index),
            Pointer::Elem { backing, index, .. } => {
                backing.borrow().get(*index).cloned().unwrap_or_default()
            }
        }
    }

    pub fn store(&self, value: Value) {
        match self {
            Pointer::Cell(cell) => cell.set(value),
            Pointer::Field { owner, index } => owner.set_field_unchecked(*index, value),
            Pointer::Elem { backing, index, .. } => {
                if let Some(slot) = backing.borrow_mut().get_mut(*index) {
                    *slot = value;
                }
            }
        }
    }

    /// Static type of the pointee, when known.
    pub fn elem_type(&self) -> Option<Type> {
        match self {
            Pointer::Cell(cell) => cell.elem_type().cloned(),
            Pointer::Field { owner, index } => owner.ty().field(*index).ok().map(|field| field.ty),
            Pointer::Elem { elem, .. } => elem.clone(),
        }
    }

    pub fn as_cell(&self) -> Option<&Cell> {
        match self {
            Pointer::Cell(cell) => Some(cell),
            _ => None,
        }
    }

    /// Pointer identity: same cell, or same slot of the same container.
    pub fn ptr_eq(&self, other: &Pointer) -> bool {
        match (self, other) {
            (Pointer::Cell(a), Pointer::Cell(b)) => a.ptr_eq(b),
            (Pointer::Field { owner: a, index: i }, Pointer::Field { owner: b, index: j }) => {
                a.ptr_eq(b) && i == j
            }
            (Pointer::Elem { backing: a, index: i, .. }, Pointer::Elem { backing: b, index: j, .. }) => {
                Rc::ptr_eq(a, b) && i == j
            }
            _ => false,
        }
    }

    pub fn addr(&self) -> usize {
        match self {
            Pointer::Cell(cell) => cell.addr(),
            Pointer::Field { owner, index } => owner.addr() + index * std::mem::size_of::<Value>(),
            Pointer::Elem { backing, index, .. } => {
                Rc::as_ptr(backing) as usize + index * std::mem::size_of::<Value>()
            }
        }
    }
}

impl fmt::Debug for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pointer(0x{:x})", self.addr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_identity() {
        let a = make_cell(1i64);
        let alias = a.clone();
        let b = make_cell(1i64);
        assert!(a.ptr_eq(&alias));
        assert!(!a.ptr_eq(&b));

        alias.set(Value::Int(7));
        assert_eq!(deref(Some(&a)).map(|v| v.as_int()).ok().flatten(), Some(7));
    }

    #[test]
    fn test_nil_deref_faults() {
        let err = deref(None).unwrap_err();
        assert!(err.message().contains("nil pointer dereference"));
    }

    #[test]
    fn test_is_cell() {
        assert!(is_cell(&Value::from(make_cell(Value::Nil))));
        assert!(!is_cell(&Value::Int(1)));
        assert!(!is_cell(&Value::Nil));
    }
}
