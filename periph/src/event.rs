use std::error::Error;
use std::fmt::{self, Display, Formatter};

use base::prelude::*;

use crate::io::OutputStage;

/// The deferred actions which devices place on the scheduler.  Each
/// one names the receiver to invoke next, as an enumerated state;
/// whoever drains the timeline (the processor emulation, a test, or
/// the CLI driver) answers by calling back into the named unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    /// An output unit has finished its character time and is ready
    /// for the next code.  `stage` says which receiver the next code
    /// goes to: the sign receiver or the character receiver.
    OutputRequest { unit: UnitId, stage: OutputStage },

    /// An input unit delivers a translated code (possibly the
    /// end-of-word code) to the processor.
    InputDelivery { unit: UnitId, digit: Digit },
}

/// Operator actions arriving from outside the simulated machine.
#[derive(Debug)]
pub enum InputEvent {
    /// The equivalent of loading a tape: supply text to an input
    /// unit.  The text is appended to whatever the unit has not yet
    /// consumed.
    MountTape { unit: u8, text: String },
}

#[derive(Debug, PartialEq, Eq)]
pub enum InputEventError {
    /// The user has generated input on a unit which has not been
    /// configured.  This would likely be due to some inconsistency
    /// between the user interface and the simulator core.
    InputOnUnconfiguredUnit(u8),
}

impl Display for InputEventError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            InputEventError::InputOnUnconfiguredUnit(unit) => {
                write!(f, "input on unconfigured input unit {unit}")
            }
        }
    }
}

impl Error for InputEventError {}
