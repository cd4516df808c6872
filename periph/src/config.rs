//! Device operating parameters.
//!
//! On the real machine these lived in switch banks and plugboard
//! settings; here they arrive from a configuration store.  Anything
//! malformed is rejected at this boundary with a descriptive error
//! and the device keeps its previous valid setting; nothing invalid
//! ever reaches the timing protocol.
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use base::prelude::*;

/// What an output device does at the end of each formatted word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatMode {
    Space,
    Tab,
    CarriageReturn,
}

impl FormatMode {
    /// The format switch on the device panel is a three-position
    /// rotary switch; configuration stores record its position as a
    /// number.
    pub fn from_switch(position: u8) -> Result<FormatMode, ConfigError> {
        match position {
            0 => Ok(FormatMode::Space),
            1 => Ok(FormatMode::Tab),
            2 => Ok(FormatMode::CarriageReturn),
            other => Err(ConfigError::BadFormatSwitch(other)),
        }
    }
}

/// The paper-tape reader runs at one of two selectable speeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReaderSpeed {
    /// 500 characters per second.
    Low,
    /// 1000 characters per second.
    High,
}

impl ReaderSpeed {
    pub fn char_period(self) -> Duration {
        match self {
            ReaderSpeed::Low => Duration::from_micros(2000),
            ReaderSpeed::High => Duration::from_micros(1000),
        }
    }
}

/// Switch settings for a serial output device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSettings {
    pub format: FormatMode,

    /// Print column limit; the carriage wraps when it is reached.
    pub columns: usize,

    /// 0-relative tab stop columns, strictly ascending.
    pub tab_stops: Vec<usize>,

    /// Blank leading zeroes of non-negative numeric words.
    pub zero_suppress: bool,

    /// Transparent ("map memory") mode: print sign digits verbatim
    /// instead of interpreting them.
    pub transparent: bool,

    /// Which logical unit numbers this device answers to.
    pub designate: DesignateMask,
}

impl Default for OutputSettings {
    fn default() -> OutputSettings {
        OutputSettings {
            format: FormatMode::CarriageReturn,
            columns: 72,
            tab_stops: vec![8, 16, 24, 32, 40, 48, 56, 64],
            zero_suppress: false,
            transparent: false,
            designate: DesignateMask::NONE,
        }
    }
}

impl OutputSettings {
    /// Check the settings as a whole.  Returns the settings unchanged
    /// when they are acceptable, so that callers can write
    /// `device.apply(settings.validated()?)`.
    pub fn validated(self) -> Result<OutputSettings, ConfigError> {
        if self.columns == 0 {
            return Err(ConfigError::NoColumns);
        }
        validate_tab_stops(&self.tab_stops, self.columns)?;
        Ok(self)
    }
}

/// Switch settings for the tape reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderSettings {
    pub speed: ReaderSpeed,

    /// Which logical unit numbers this device answers to.
    pub designate: DesignateMask,
}

impl Default for ReaderSettings {
    fn default() -> ReaderSettings {
        ReaderSettings {
            speed: ReaderSpeed::Low,
            designate: DesignateMask::NONE,
        }
    }
}

/// One entry in the card/line multiplexer's unit table.  The first
/// two characters of `kind` select the device type: `CR` is an input
/// unit, `CP` and `LP` are output units, anything else leaves the
/// slot unconfigured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitConfig {
    /// Physical unit number, 1 to 7.
    pub physical_index: u8,

    pub kind: String,

    #[serde(default)]
    pub output: OutputSettings,

    #[serde(default)]
    pub reader: ReaderSettings,
}

/// Tab stops must be strictly ascending and must fit on the line.
pub fn validate_tab_stops(stops: &[usize], columns: usize) -> Result<(), ConfigError> {
    let mut previous: Option<usize> = None;
    for (index, &stop) in stops.iter().enumerate() {
        if let Some(prev) = previous {
            if stop <= prev {
                return Err(ConfigError::TabStopsNotAscending {
                    index,
                    stop,
                    previous: prev,
                });
            }
        }
        if stop > columns {
            return Err(ConfigError::TabStopBeyondColumns { stop, columns });
        }
        previous = Some(stop);
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    TabStopsNotAscending {
        index: usize,
        stop: usize,
        previous: usize,
    },
    TabStopBeyondColumns {
        stop: usize,
        columns: usize,
    },
    NoColumns,
    BadFormatSwitch(u8),
    BadUnitNumber(u8),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            ConfigError::TabStopsNotAscending {
                index,
                stop,
                previous,
            } => write!(
                f,
                "tab stop {index} (column {stop}) is out of sequence; the previous stop is at column {previous}"
            ),
            ConfigError::TabStopBeyondColumns { stop, columns } => write!(
                f,
                "tab stop at column {stop} does not fit on a {columns}-column line"
            ),
            ConfigError::NoColumns => f.write_str("the column limit must be at least 1"),
            ConfigError::BadFormatSwitch(position) => {
                write!(f, "format switch position {position} is not 0, 1 or 2")
            }
            ConfigError::BadUnitNumber(unit) => {
                write!(f, "physical unit number {unit} is not in the range 1 to 7")
            }
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_switch_positions() {
        assert_eq!(FormatMode::from_switch(0), Ok(FormatMode::Space));
        assert_eq!(FormatMode::from_switch(1), Ok(FormatMode::Tab));
        assert_eq!(FormatMode::from_switch(2), Ok(FormatMode::CarriageReturn));
        assert_eq!(
            FormatMode::from_switch(3),
            Err(ConfigError::BadFormatSwitch(3))
        );
    }

    #[test]
    fn test_tab_stops_must_ascend() {
        assert_eq!(validate_tab_stops(&[8, 16, 24], 72), Ok(()));
        assert_eq!(
            validate_tab_stops(&[8, 8, 24], 72),
            Err(ConfigError::TabStopsNotAscending {
                index: 1,
                stop: 8,
                previous: 8
            })
        );
        assert_eq!(
            validate_tab_stops(&[16, 8], 72),
            Err(ConfigError::TabStopsNotAscending {
                index: 1,
                stop: 8,
                previous: 16
            })
        );
    }

    #[test]
    fn test_tab_stops_must_fit_on_the_line() {
        assert_eq!(
            validate_tab_stops(&[8, 80], 72),
            Err(ConfigError::TabStopBeyondColumns {
                stop: 80,
                columns: 72
            })
        );
    }

    #[test]
    fn test_errors_are_descriptive() {
        let msg = ConfigError::TabStopBeyondColumns {
            stop: 80,
            columns: 72,
        }
        .to_string();
        assert!(msg.contains("80"));
        assert!(msg.contains("72"));
    }
}
