//! Core definitions shared by the tern runtime crates.
//!
//! Nothing here depends on the value model: these are the kinds, channel
//! directions and tag helpers that both the runtime objects and the
//! reflection layer agree on.

pub mod tag;
pub mod types;

pub use tag::{get_tag_value, parse_field_options, StructTag};
pub use types::{ChanDir, Kind};
