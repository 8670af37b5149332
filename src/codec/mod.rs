//! Byte-level codecs
//!
//! - `overpunch` - signed-digit overpunch encoding for mainframe amount fields
//! - `field` - fixed-width slots, CSV cells and segment layouts
//! - `amount` - cents/dollars and date text formats

pub mod amount;
pub mod field;
pub mod overpunch;

pub use field::{encode_segment, FieldSpec, FieldValues, Justify, LineFormat, Segment};
