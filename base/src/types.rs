//! The machine exchanges information with its peripherals one
//! four-bit digit at a time.  Values 0 to 9 are the numeric digits;
//! the values above 9 are control codes (blank, tab, carriage return,
//! form feed, end-of-word).  We use [`Digit`] to represent this.
use std::fmt::{self, Debug, Display, Formatter, Octal};

use serde::{Deserialize, Serialize};

/// A failure to convert an in-range value to or from one of the types
/// defined in the base crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConversionFailed {
    TooLarge,
}

impl std::error::Error for ConversionFailed {}

impl Display for ConversionFailed {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            ConversionFailed::TooLarge => f.write_str("value is too large"),
        }
    }
}

/// A single digit/character code as transferred serially between the
/// central machine and a peripheral.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Digit(u8);

impl Digit {
    /// Codes occupy four bits.
    pub const MAX_CODE: u8 = 0o17;

    pub const ZERO: Digit = Digit(0);

    /// No output, and no column advance either.
    pub const BLANK: Digit = Digit(0o12);

    /// Advance to the next configured tab stop.
    pub const TAB: Digit = Digit(0o13);

    /// Force a line break.
    pub const CARRIAGE_RETURN: Digit = Digit(0o14);

    /// Paginate: advance to the top of the next page.
    pub const FORM_FEED: Digit = Digit(0o15);

    /// This code has no assigned meaning; output devices drop it.
    pub const UNASSIGNED: Digit = Digit(0o16);

    /// Marks the boundary between successive machine words in the
    /// serial stream.
    pub const END_OF_WORD: Digit = Digit(0o17);

    /// Compile-time checked constructor, analogous to writing a digit
    /// literal.  Use [`Digit::try_from`] for run-time values.
    pub const fn new<const V: u8>() -> Digit {
        assert!(V <= Digit::MAX_CODE);
        Digit(V)
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    /// True for the codes 0 to 9, which print as numerals.
    pub const fn is_numeric(self) -> bool {
        self.0 <= 9
    }

    /// The sign digit of a word encodes "negative" in its lowest bit.
    pub const fn low_bit_set(self) -> bool {
        self.0 & 1 != 0
    }
}

impl TryFrom<u8> for Digit {
    type Error = ConversionFailed;

    fn try_from(value: u8) -> Result<Digit, ConversionFailed> {
        if value <= Digit::MAX_CODE {
            Ok(Digit(value))
        } else {
            Err(ConversionFailed::TooLarge)
        }
    }
}

impl From<Digit> for u8 {
    fn from(d: Digit) -> u8 {
        d.0
    }
}

impl Octal for Digit {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        Octal::fmt(&self.0, f)
    }
}

impl Display for Digit {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{:o}", self.0)
    }
}

impl Debug for Digit {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "Digit({:#o})", self.0)
    }
}

/// Identifies which of the two independent unit banks a device
/// belongs to.  Input units (card readers, tape readers) and output
/// units (card punches, line printers) are numbered separately.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Bank {
    Input,
    Output,
}

impl Display for Bank {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str(match self {
            Bank::Input => "input",
            Bank::Output => "output",
        })
    }
}

/// Identifies a unit slot: a bank plus a logical unit number within
/// that bank (1 to 7 for card/line units).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId {
    pub bank: Bank,
    pub number: u8,
}

impl UnitId {
    pub const fn input(number: u8) -> UnitId {
        UnitId {
            bank: Bank::Input,
            number,
        }
    }

    pub const fn output(number: u8) -> UnitId {
        UnitId {
            bank: Bank::Output,
            number,
        }
    }
}

impl Display for UnitId {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{} unit {}", self.bank, self.number)
    }
}

/// A bitset of up to 10 bits identifying which logical unit numbers a
/// physical device answers to.  Exactly one device should claim a
/// given bit at a time, but this is a configuration convention, not
/// something we enforce (last writer wins).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignateMask(u16);

impl DesignateMask {
    pub const MAX_UNITS: u8 = 10;

    pub const NONE: DesignateMask = DesignateMask(0);

    /// A mask selecting a single logical unit number.
    pub fn single(unit: u8) -> Result<DesignateMask, ConversionFailed> {
        if unit < DesignateMask::MAX_UNITS {
            Ok(DesignateMask(1 << unit))
        } else {
            Err(ConversionFailed::TooLarge)
        }
    }

    pub fn answers_to(self, unit: u8) -> bool {
        unit < DesignateMask::MAX_UNITS && self.0 & (1 << unit) != 0
    }

    pub const fn bits(self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for DesignateMask {
    type Error = ConversionFailed;

    fn try_from(bits: u16) -> Result<DesignateMask, ConversionFailed> {
        if bits < (1 << DesignateMask::MAX_UNITS) {
            Ok(DesignateMask(bits))
        } else {
            Err(ConversionFailed::TooLarge)
        }
    }
}

impl Display for DesignateMask {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{:#012b}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digit_try_from() {
        assert_eq!(Digit::try_from(0o17_u8), Ok(Digit::END_OF_WORD));
        assert_eq!(Digit::try_from(0o20_u8), Err(ConversionFailed::TooLarge));
    }

    #[test]
    fn test_digit_classification() {
        for v in 0..=9_u8 {
            let d = Digit::try_from(v).expect("numeric codes are in range");
            assert!(d.is_numeric());
        }
        assert!(!Digit::BLANK.is_numeric());
        assert!(!Digit::END_OF_WORD.is_numeric());
    }

    #[test]
    fn test_designate_mask() {
        let m = DesignateMask::single(3).expect("unit 3 is in range");
        assert!(m.answers_to(3));
        assert!(!m.answers_to(2));
        assert!(!m.answers_to(10));
        assert!(DesignateMask::single(10).is_err());
        assert_eq!(DesignateMask::try_from(0o1777_u16), Ok(DesignateMask(0o1777)));
        assert!(DesignateMask::try_from(0o2000_u16).is_err());
    }
}
