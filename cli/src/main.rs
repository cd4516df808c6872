//! Command-line demonstrator: mount a text file on the tape reader,
//! pass every word through the processor's side of the handshake and
//! print it on the line printer, all on the virtual timeline.
use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{event, Level};
use tracing_subscriber::prelude::*;

use base::prelude::*;
use periph::{
    DeviceEvent, EventQueue, FormatMode, InputEvent, Multiplexer, OutputSettings, OutputStage,
    ReaderSettings, ReaderSpeed, RouteOutcome, UnitConfig,
};

/// Simulate the peripheral subsystem: copy a tape to the printer.
#[derive(Debug, Parser)]
#[command(about = "Stream a text file through the simulated tape reader and line printer")]
struct Cli {
    /// File containing the tape data.
    tape: PathBuf,

    /// Read the tape at the higher of the two selectable speeds
    /// (1000 instead of 500 characters per second).
    #[arg(long)]
    fast: bool,

    /// Blank the leading zeroes of non-negative words.
    #[arg(long)]
    zero_suppress: bool,
}

/// The processor's half of the handshake: answer every output request
/// with the next queued code, and keep the reader busy until it runs
/// dry.
fn copy_tape_to_printer(mux: &mut Multiplexer, q: &mut EventQueue) -> String {
    const READER: u8 = 1;
    const PRINTER: u8 = 2;

    let mut printed = String::new();
    // Codes delivered by the reader but not yet accepted by the
    // printer's character receiver.
    let mut pending: VecDeque<Digit> = VecDeque::new();
    let mut printer_waiting = false;
    let mut reader_running = true;

    if mux.route_input_initiate(READER, Digit::ZERO, q) != RouteOutcome::Initiated {
        event!(Level::ERROR, "the tape reader is not configured");
        return printed;
    }
    if mux.route_output_initiate(PRINTER, Digit::ZERO, 0, q) != RouteOutcome::Initiated {
        event!(Level::ERROR, "the line printer is not configured");
        return printed;
    }
    if let Some(reader) = mux.input_unit_mut(READER) {
        reader.read_tape_char(q);
    }

    while let Some((_, fired)) = q.next_event() {
        match fired {
            DeviceEvent::InputDelivery { digit, .. } => {
                pending.push_back(digit);
                if digit == Digit::END_OF_WORD {
                    // The reader goes idle once the tape is finished.
                    if let Some(reader) = mux.input_unit_mut(READER) {
                        reader_running = reader.is_ready();
                    }
                }
                if reader_running {
                    if let Some(reader) = mux.input_unit_mut(READER) {
                        reader.read_tape_char(q);
                    }
                }
                if printer_waiting {
                    if let (Some(code), Some(printer)) =
                        (pending.pop_front(), mux.output_unit_mut(PRINTER))
                    {
                        printer_waiting = false;
                        printer.receive(code, q);
                    }
                }
            }
            DeviceEvent::OutputRequest { stage, .. } => {
                let Some(printer) = mux.output_unit_mut(PRINTER) else {
                    continue;
                };
                printed.push_str(&printer.take_printed());
                match stage {
                    OutputStage::Sign => {
                        if reader_running || !pending.is_empty() {
                            // Every tape word is printed as a
                            // non-negative numeric word.
                            printer.receive(Digit::ZERO, q);
                        }
                    }
                    OutputStage::Char => match pending.pop_front() {
                        Some(code) => printer.receive(code, q),
                        None => printer_waiting = true,
                    },
                }
            }
        }
    }
    if let Some(printer) = mux.output_unit_mut(PRINTER) {
        printed.push_str(&printer.take_printed());
    }
    printed
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let text = fs::read_to_string(&cli.tape)?;

    let output = OutputSettings {
        format: FormatMode::CarriageReturn,
        zero_suppress: cli.zero_suppress,
        ..OutputSettings::default()
    };
    let reader = ReaderSettings {
        speed: if cli.fast {
            ReaderSpeed::High
        } else {
            ReaderSpeed::Low
        },
        ..ReaderSettings::default()
    };
    let units = [
        UnitConfig {
            physical_index: 1,
            kind: "CR1".to_string(),
            output: OutputSettings::default(),
            reader,
        },
        UnitConfig {
            physical_index: 6,
            kind: "LP".to_string(),
            output,
            reader: ReaderSettings::default(),
        },
    ];
    let mut mux = Multiplexer::from_units(&units)?;
    let mut q = EventQueue::new();

    mux.on_input_event(
        InputEvent::MountTape {
            unit: 1,
            text,
        },
        &mut q,
    )?;
    let printed = copy_tape_to_printer(&mut mux, &mut q);
    print!("{printed}");
    event!(
        Level::INFO,
        "transfer complete; {:?} of simulated time elapsed",
        periph::Scheduler::now(&q)
    );
    mux.shut_down(&mut q);
    Ok(())
}

fn main() -> ExitCode {
    // See the tracing_subscriber documentation for instructions on
    // how to select which trace messages get printed.
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
    let filter_layer = match tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info"))
    {
        Err(e) => {
            eprintln!("failed to set up logging: {e}");
            return ExitCode::FAILURE;
        }
        Ok(layer) => layer,
    };
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            event!(Level::ERROR, "simulation failed: {e}");
            ExitCode::FAILURE
        }
    }
}
