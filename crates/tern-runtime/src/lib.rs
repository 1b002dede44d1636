//! Semantics-preserving runtime objects.
//!
//! The value model ([`Value`]), Reference Cells, the struct copy protocol,
//! Error Values, channels with their suspension futures, the select engine
//! and reflection. Scheduling and deferred cleanup live in `tern-vm`.

pub mod copy;
pub mod objects;
pub mod panic;
pub mod reflect;
pub mod select;
pub mod value;

// Value model
pub use copy::{copy_value, ValueType};
pub use panic::{Panic, PanicKind, RtResult, RuntimeTrapKind};
pub use value::{Typed, Value};

// Objects
pub use objects::array::ArrayValue;
pub use objects::cell::{deref, is_cell, make_cell, Cell, Pointer};
pub use objects::channel::{close, make_channel, recv, recv_with_ok, send, Channel};
pub use objects::closure::FuncValue;
pub use objects::compare::{deep_equal, equal};
pub use objects::error::{
    errors_as, errors_is, from_host, new_error, to_error, unwrap_error, wrap_error, wrap_typed_error, ErrorValue,
    GoError,
};
pub use objects::map::MapValue;
pub use objects::slice::SliceValue;
pub use objects::struct_ops::StructValue;

// Reflection
pub use reflect::{type_for, type_of, value_of, MapIter, ReflectValue, Type, TypeBuilder};

// Select
pub use select::{select, SelectCase, SelectFlow, SelectOutcome, SelectStatement, Selected};

// Re-exports from tern-common-core
pub use tern_common_core::{ChanDir, Kind, StructTag};
