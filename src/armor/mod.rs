//! # Armor module
//!
//! ASCII armor as specified in RFC 4880, section 6. Only used at the boundary, all
//! parsing in this crate operates on the binary form.

mod reader;
mod writer;

pub use self::reader::*;
pub use self::writer::*;
