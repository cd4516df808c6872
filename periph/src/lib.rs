//! This crate emulates the peripheral input/output subsystem of the
//! machine: the serial devices (line printer, teletype, tape punch,
//! tape reader) and the card/line multiplexer which fans unit-number
//! addressed transfers out to them.  Transfers run at the real
//! hardware's character rate on a single simulated timeline; nothing
//! here touches the wall clock.
#![crate_name = "periph"]

mod clock;
mod config;
mod event;
mod io;
mod scheduler;

pub use clock::{BasicClock, Clock};
pub use config::{
    ConfigError, FormatMode, OutputSettings, ReaderSettings, ReaderSpeed, UnitConfig,
};
pub use event::*;
pub use io::{
    Multiplexer, OutputClass, OutputStage, OutputUnit, ReadOutcome, ReaderUnit, ReadyStatus,
    RouteOutcome, Slot, READER_IDLE_THRESHOLD, READER_START_DELAY,
};
pub use scheduler::{CancelToken, EventQueue, Scheduler};
