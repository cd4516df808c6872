//! Character code conversions.
//!
//! Host text to and from the machine's digit/character codes.  Each
//! device class has its own code drum and hence, in principle, its
//! own table; in this machine the printer and punch both render the
//! numeric codes as the corresponding numerals, and the control codes
//! (blank, tab, carriage return, form feed, end-of-word) never reach
//! the tables at all because the devices act on them directly.
//!
//! Codes with no printable mapping are not errors: the hardware
//! simply let them pass without printing anything, so the forward
//! functions return `None` for them and they are excluded from the
//! round-trip law which the tests check.
use std::collections::HashMap;

use crate::types::Digit;

/// Translate a code to the character the line printer (or teletype)
/// prints for it, or `None` when the printer prints nothing.
pub fn printer_code_to_char(code: Digit) -> Option<char> {
    numeric_code_to_char(code)
}

/// Translate a code to the character the tape/card punch records for
/// it, or `None` when the punch records nothing.
pub fn punch_code_to_char(code: Digit) -> Option<char> {
    numeric_code_to_char(code)
}

fn numeric_code_to_char(code: Digit) -> Option<char> {
    match code.value() {
        v @ 0..=9 => char::from_digit(u32::from(v), 10),
        _ => None,
    }
}

/// The reverse mapping, used by input devices: which code does a
/// character of host text translate to?
///
/// Built by inverting the forward table of the matching output device
/// class, so the two cannot drift apart, plus the whitespace entries
/// which only ever occur on input (the output devices produce spaces
/// and tabs from format actions, not from the table).
#[derive(Debug)]
pub struct CharToCodeMapping {
    codes: HashMap<char, Digit>,
}

impl CharToCodeMapping {
    pub fn for_reader() -> CharToCodeMapping {
        let mut codes = HashMap::new();
        for v in 0..=Digit::MAX_CODE {
            let code = Digit::try_from(v).expect("all four-bit values are valid codes");
            if let Some(ch) = punch_code_to_char(code) {
                codes.insert(ch, code);
            }
        }
        codes.insert(' ', Digit::BLANK);
        codes.insert('\t', Digit::TAB);
        CharToCodeMapping { codes }
    }

    pub fn to_code(&self, ch: char) -> Option<Digit> {
        self.codes.get(&ch).copied()
    }
}
