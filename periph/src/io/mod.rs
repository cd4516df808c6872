//! The card/line multiplexer control.
//!
//! The multiplexer owns two banks of seven unit slots each: input
//! units (card readers) and output units (card punches and line
//! printers).  The processor addresses a unit number; the multiplexer
//! forwards the initiate or interrogate call to the device in that
//! slot, or answers with the "absent" sentinel when the slot is
//! empty.  Once a transfer is initiated the device and the processor
//! exchange digits directly over the scheduler; the multiplexer is
//! not involved again until the next initiation.
//!
//! ## Unit numbering
//!
//! The two banks number their units independently.  Input units sit
//! at their physical unit number.  Output units use an inverted index
//! mapping, mirroring the wiring of the two banks: physical unit 7 is
//! logical output slot 1, physical unit 6 is logical output slot 2,
//! and so on (`output_slot = 8 - physical_index`).
use std::fmt::{self, Debug, Formatter};

use tracing::{event, Level};

use base::prelude::*;

use crate::config::{ConfigError, UnitConfig};
use crate::event::{InputEvent, InputEventError};
use crate::scheduler::Scheduler;

mod dev_output;
mod dev_reader;

pub use dev_output::{OutputClass, OutputStage, OutputUnit};
pub use dev_reader::{ReadOutcome, ReaderUnit, READER_IDLE_THRESHOLD, READER_START_DELAY};

/// Unit numbers run from 1 to 7 in each bank.
const UNIT_SLOTS: usize = 8; // index 0 is never used

/// One entry in a unit bank: either a configured device or nothing.
/// An absent device is a normal answer, not an error, so it gets a
/// variant rather than an `Option` smuggled through the call chain.
#[derive(Debug, Default)]
pub enum Slot<T> {
    #[default]
    Empty,
    Configured(T),
}

impl<T> Slot<T> {
    fn device_mut(&mut self) -> Option<&mut T> {
        match self {
            Slot::Empty => None,
            Slot::Configured(device) => Some(device),
        }
    }

    fn device(&self) -> Option<&T> {
        match self {
            Slot::Empty => None,
            Slot::Configured(device) => Some(device),
        }
    }
}

/// The answer to an initiate call.  The processor sees these as the
/// return codes 0 and -1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Initiated,
    Absent,
}

impl RouteOutcome {
    /// The wire-level return code: 0 for initiated, -1 for absent.
    pub const fn as_code(self) -> i8 {
        match self {
            RouteOutcome::Initiated => 0,
            RouteOutcome::Absent => -1,
        }
    }
}

/// The answer to a ready interrogation: -1 absent, 0 not ready, 1
/// ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyStatus {
    Absent,
    NotReady,
    Ready,
}

impl ReadyStatus {
    pub const fn as_code(self) -> i8 {
        match self {
            ReadyStatus::Absent => -1,
            ReadyStatus::NotReady => 0,
            ReadyStatus::Ready => 1,
        }
    }

    fn from_flags(ready: bool, busy: bool) -> ReadyStatus {
        if ready && !busy {
            ReadyStatus::Ready
        } else {
            ReadyStatus::NotReady
        }
    }
}

pub struct Multiplexer {
    inputs: [Slot<ReaderUnit>; UNIT_SLOTS],
    outputs: [Slot<OutputUnit>; UNIT_SLOTS],
}

impl Debug for Multiplexer {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        fn configured<T>(bank: &[Slot<T>; UNIT_SLOTS]) -> Vec<usize> {
            bank.iter()
                .enumerate()
                .filter(|(_, slot)| matches!(slot, Slot::Configured(_)))
                .map(|(n, _)| n)
                .collect()
        }
        f.debug_struct("Multiplexer")
            .field("inputs", &configured(&self.inputs))
            .field("outputs", &configured(&self.outputs))
            .finish()
    }
}

impl Multiplexer {
    pub fn empty() -> Multiplexer {
        Multiplexer {
            inputs: std::array::from_fn(|_| Slot::Empty),
            outputs: std::array::from_fn(|_| Slot::Empty),
        }
    }

    /// Build the unit table from configuration.  The first two
    /// characters of each unit's type select the device: `CR` is a
    /// card reader (input bank), `CP` a card punch and `LP` a line
    /// printer (output bank, inverted index).  Anything else leaves
    /// the slot unconfigured.  Exactly one device is created per
    /// configured unit; if two entries claim the same slot the last
    /// writer wins.
    pub fn from_units(units: &[UnitConfig]) -> Result<Multiplexer, ConfigError> {
        let mut mux = Multiplexer::empty();
        for unit in units {
            if !(1..=7).contains(&unit.physical_index) {
                return Err(ConfigError::BadUnitNumber(unit.physical_index));
            }
            let prefix: String = unit.kind.chars().take(2).collect();
            match prefix.as_str() {
                "CR" => {
                    let number = unit.physical_index;
                    event!(
                        Level::INFO,
                        "configuring {} as a card reader ({})",
                        UnitId::input(number),
                        unit.kind
                    );
                    mux.inputs[usize::from(number)] = Slot::Configured(ReaderUnit::new(
                        UnitId::input(number),
                        unit.reader.clone(),
                    ));
                }
                "CP" | "LP" => {
                    let number = 8 - unit.physical_index;
                    let class = if prefix == "LP" {
                        OutputClass::Printer
                    } else {
                        OutputClass::Punch
                    };
                    event!(
                        Level::INFO,
                        "configuring {} as {:?} ({}, physical unit {})",
                        UnitId::output(number),
                        class,
                        unit.kind,
                        unit.physical_index
                    );
                    mux.outputs[usize::from(number)] = Slot::Configured(OutputUnit::new(
                        UnitId::output(number),
                        class,
                        unit.output.clone().validated()?,
                    ));
                }
                _ => {
                    event!(
                        Level::WARN,
                        "physical unit {} has unrecognised type {:?}; leaving it unconfigured",
                        unit.physical_index,
                        unit.kind
                    );
                }
            }
        }
        Ok(mux)
    }

    fn input_slot_mut(&mut self, unit: u8) -> Option<&mut ReaderUnit> {
        if (1..=7).contains(&unit) {
            self.inputs[usize::from(unit)].device_mut()
        } else {
            None
        }
    }

    fn output_slot_mut(&mut self, unit: u8) -> Option<&mut OutputUnit> {
        if (1..=7).contains(&unit) {
            self.outputs[usize::from(unit)].device_mut()
        } else {
            None
        }
    }

    /// Direct access to an input unit, for the digit exchange which
    /// runs between processor and device without the multiplexer.
    pub fn input_unit_mut(&mut self, unit: u8) -> Option<&mut ReaderUnit> {
        self.input_slot_mut(unit)
    }

    /// Direct access to an output unit.
    pub fn output_unit_mut(&mut self, unit: u8) -> Option<&mut OutputUnit> {
        self.output_slot_mut(unit)
    }

    /// Start a word transfer to an output unit: forward the sign
    /// digit and the relay selection mask to the addressed device.
    /// When the slot is empty, no transfer occurs and nothing is
    /// scheduled.
    pub fn route_output_initiate(
        &mut self,
        unit: u8,
        sign: Digit,
        relay_mask: u16,
        sched: &mut dyn Scheduler,
    ) -> RouteOutcome {
        match self.output_slot_mut(unit) {
            Some(device) => {
                device.initiate_output(relay_mask);
                device.receive(sign, sched);
                RouteOutcome::Initiated
            }
            None => {
                event!(Level::DEBUG, "{} is absent", UnitId::output(unit));
                RouteOutcome::Absent
            }
        }
    }

    /// Start a word transfer from an input unit.  The sign digit of
    /// an input initiation selects the card format band; the reader
    /// has no use for it beyond the record.
    pub fn route_input_initiate(
        &mut self,
        unit: u8,
        sign: Digit,
        sched: &mut dyn Scheduler,
    ) -> RouteOutcome {
        match self.input_slot_mut(unit) {
            Some(device) => {
                event!(
                    Level::TRACE,
                    "{} initiating (format band {sign})",
                    UnitId::input(unit)
                );
                device.initiate_input(sched);
                RouteOutcome::Initiated
            }
            None => {
                event!(Level::DEBUG, "{} is absent", UnitId::input(unit));
                RouteOutcome::Absent
            }
        }
    }

    /// Report whether the addressed unit could accept a transfer.
    /// Callable at any time, including mid-transfer; it changes no
    /// device state.
    pub fn route_ready_interrogate(&self, bank: Bank, unit: u8) -> ReadyStatus {
        if !(1..=7).contains(&unit) {
            return ReadyStatus::Absent;
        }
        match bank {
            Bank::Input => match self.inputs[usize::from(unit)].device() {
                Some(device) => ReadyStatus::from_flags(device.is_ready(), device.is_busy()),
                None => ReadyStatus::Absent,
            },
            Bank::Output => match self.outputs[usize::from(unit)].device() {
                Some(device) => ReadyStatus::from_flags(device.is_ready(), device.is_busy()),
                None => ReadyStatus::Absent,
            },
        }
    }

    /// Route an operator action to the addressed input unit.
    pub fn on_input_event(
        &mut self,
        input_event: InputEvent,
        sched: &mut dyn Scheduler,
    ) -> Result<(), InputEventError> {
        match input_event {
            InputEvent::MountTape { unit, text } => match self.input_slot_mut(unit) {
                Some(device) => {
                    device.supply_data(&text, sched);
                    Ok(())
                }
                None => Err(InputEventError::InputOnUnconfiguredUnit(unit)),
            },
        }
    }

    /// Release every configured device, highest unit index first,
    /// cancelling their outstanding scheduled actions so that no late
    /// callback fires against a released device.  Calling this twice
    /// is a no-op the second time.
    pub fn shut_down(&mut self, sched: &mut dyn Scheduler) {
        for number in (1..=7usize).rev() {
            if let Slot::Configured(mut device) =
                std::mem::replace(&mut self.outputs[number], Slot::Empty)
            {
                device.cancel_pending(sched);
                event!(Level::DEBUG, "released {}", device.id());
            }
            if let Slot::Configured(mut device) =
                std::mem::replace(&mut self.inputs[number], Slot::Empty)
            {
                device.cancel_pending(sched);
                event!(Level::DEBUG, "released {}", device.id());
            }
        }
    }
}
