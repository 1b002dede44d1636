//! Heap objects backing composite values.

use std::cell::RefCell;
use std::rc::Rc;

use crate::value::Value;

pub mod array;
pub mod cell;
pub mod channel;
pub mod closure;
pub mod compare;
pub mod error;
pub mod map;
pub mod queue_state;
pub mod slice;
pub mod struct_ops;

/// Element storage shared by an array and every slice taken from it.
pub type Backing = Rc<RefCell<Vec<Value>>>;

pub(crate) fn new_backing(elems: Vec<Value>) -> Backing {
    Rc::new(RefCell::new(elems))
}
