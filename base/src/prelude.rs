//! The prelude exports the types which are useful in representing
//! digit/character codes and unit addressing.  Providing this prelude
//! is the main purpose of the base crate.
pub use super::charset::{printer_code_to_char, punch_code_to_char, CharToCodeMapping};
pub use super::digit;
pub use super::types::*;
