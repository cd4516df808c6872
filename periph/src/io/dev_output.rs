//! Serial output devices: the line printer / teletype and the tape
//! or card punch.
//!
//! A transfer is a strictly alternating handshake.  The processor
//! initiates, the device answers immediately (no simulated delay)
//! with its sign receiver, and from then on every code the processor
//! hands over buys one character time on the device before the next
//! [`DeviceEvent::OutputRequest`] fires.  The per-word state machine
//! is `Idle -> AwaitingSign -> StreamingChars -> Idle`, with the
//! receiver for the next code held as an enumerated stage, never as a
//! stored function.
//!
//! The printer runs at 10 characters per second, the punch at 60.
//! Character times are chained from the device's own monotonic
//! schedule cursor rather than from "now", so back-to-back characters
//! never compress below the rated speed even when the processor calls
//! back faster than real time.
use std::fmt::{self, Debug, Formatter};
use std::time::Duration;

use tracing::{event, Level};

use base::charset::{printer_code_to_char, punch_code_to_char};
use base::prelude::*;

use crate::config::{ConfigError, FormatMode, OutputSettings};
use crate::event::DeviceEvent;
use crate::scheduler::{CancelToken, Scheduler};

/// Sign digit value which marks a word as alphanumeric.
const ALPHANUMERIC_SIGN: Digit = Digit::new::<2>();

/// Lines per printed page; the form feed code pads with blank lines
/// until the line counter wraps to the top of the next page.
pub(crate) const PAGE_LINES: usize = 66;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum OutputClass {
    /// Line printer / teletype, 10 characters per second.
    Printer,
    /// Tape or card punch, 60 characters per second.
    Punch,
}

impl OutputClass {
    pub fn char_period(self) -> Duration {
        match self {
            OutputClass::Printer => Duration::from_millis(100),
            OutputClass::Punch => Duration::from_micros(16_667),
        }
    }

    fn code_to_char(self, code: Digit) -> Option<char> {
        match self {
            OutputClass::Printer => printer_code_to_char(code),
            OutputClass::Punch => punch_code_to_char(code),
        }
    }
}

/// Which receiver the next code from the processor goes to.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum OutputStage {
    /// The first code of a word: the sign digit.
    Sign,
    /// Any subsequent code of the word, up to and including the
    /// end-of-word code.
    Char,
}

pub struct OutputUnit {
    id: UnitId,
    class: OutputClass,
    settings: OutputSettings,

    /// Operator/remote switch: the device is on-line.
    ready: bool,
    /// Mid-transfer; true from initiation to the end of the word.
    busy: bool,
    stage: OutputStage,

    /// The end-of-word formatting action is owed only when sign
    /// handling said so.
    eow_action: bool,
    /// Currently blanking leading zeroes.
    suppress_lz: bool,

    column: usize,
    /// Line position within the current page, 0-relative.
    line: usize,

    /// Monotonic schedule cursor; never allowed to fall behind "now"
    /// when a character is accepted.
    next_char_time: Duration,
    pending: Option<CancelToken>,

    /// Relay selection mask supplied with the initiate call.  The
    /// card equipment uses it to pick a format band; we record it and
    /// expose it, nothing more.
    relay_mask: u16,

    printed: String,
}

impl Debug for OutputUnit {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_struct("OutputUnit")
            .field("id", &self.id)
            .field("class", &self.class)
            .field("ready", &self.ready)
            .field("busy", &self.busy)
            .field("stage", &self.stage)
            .field("column", &self.column)
            .field("line", &self.line)
            .field("next_char_time", &self.next_char_time)
            .finish_non_exhaustive()
    }
}

impl OutputUnit {
    pub fn new(id: UnitId, class: OutputClass, settings: OutputSettings) -> OutputUnit {
        OutputUnit {
            id,
            class,
            settings,
            ready: true,
            busy: false,
            stage: OutputStage::Sign,
            eow_action: false,
            suppress_lz: false,
            column: 0,
            line: 0,
            next_char_time: Duration::ZERO,
            pending: None,
            relay_mask: 0,
            printed: String::new(),
        }
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn class(&self) -> OutputClass {
        self.class
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn column(&self) -> usize {
        self.column
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn relay_mask(&self) -> u16 {
        self.relay_mask
    }

    /// The operator's remote switch.  Off means not ready: the device
    /// will not be offered transfers.
    pub fn set_remote(&mut self, on: bool) {
        self.ready = on;
    }

    pub fn answers_to(&self, logical_unit: u8) -> bool {
        self.settings.designate.answers_to(logical_unit)
    }

    /// Replace the device settings.  A rejected update leaves the
    /// previous valid settings in place.
    pub fn apply_settings(&mut self, settings: OutputSettings) -> Result<(), ConfigError> {
        self.settings = settings.validated()?;
        Ok(())
    }

    /// Replace just the tab stops, keeping everything else.  Invalid
    /// stops are rejected and the old stops are retained.
    pub fn set_tab_stops(&mut self, stops: Vec<usize>) -> Result<(), ConfigError> {
        crate::config::validate_tab_stops(&stops, self.settings.columns)?;
        self.settings.tab_stops = stops;
        Ok(())
    }

    /// Begin a word transfer.  There is no mechanical latency here:
    /// the device immediately tells the caller that the next code
    /// goes to the sign receiver.
    pub fn initiate_output(&mut self, relay_mask: u16) -> OutputStage {
        if !self.ready {
            event!(Level::WARN, "{} initiated while off-line", self.id);
        }
        self.busy = true;
        self.stage = OutputStage::Sign;
        self.relay_mask = relay_mask;
        event!(
            Level::DEBUG,
            "{} initiated (relay mask {:#o})",
            self.id,
            relay_mask
        );
        self.stage
    }

    /// Accept the next code of the current word.  Dispatches on the
    /// device's own receiver stage and schedules the follow-up
    /// request on `sched`.
    pub fn receive(&mut self, code: Digit, sched: &mut dyn Scheduler) {
        self.busy = true;
        match self.stage {
            OutputStage::Sign => self.receive_sign(code, sched),
            OutputStage::Char => self.receive_char(code, sched),
        }
    }

    /// Interpret the sign digit.  The four rules are mutually
    /// exclusive and are checked in a fixed order; in particular
    /// transparent mode wins over the alphanumeric-sign case when
    /// both could apply.
    fn receive_sign(&mut self, sign: Digit, sched: &mut dyn Scheduler) {
        self.suppress_lz = false;
        if self.settings.transparent {
            self.print_code(sign);
            self.eow_action = true;
        } else if sign == ALPHANUMERIC_SIGN {
            // The sign of an alphanumeric word is consumed silently
            // and the word gets no leading-zero suppression.
            event!(Level::TRACE, "{} alphanumeric word", self.id);
            self.eow_action = false;
        } else if self.settings.zero_suppress && !sign.low_bit_set() {
            // Non-negative sign with the zero-suppress switch on: a
            // blank placeholder, then blank the leading zeroes.
            self.print_char(' ');
            self.suppress_lz = true;
            self.eow_action = true;
        } else {
            self.print_char(if sign.low_bit_set() { '-' } else { ' ' });
            self.eow_action = true;
        }
        self.stage = OutputStage::Char;
        self.schedule_next(sched, 1);
    }

    fn receive_char(&mut self, code: Digit, sched: &mut dyn Scheduler) {
        let mut periods: u32 = 1;
        match code {
            Digit::END_OF_WORD => {
                if self.eow_action {
                    match self.settings.format {
                        FormatMode::Space => self.print_char(' '),
                        FormatMode::Tab => {
                            if self.tab() {
                                periods = 2;
                            }
                        }
                        FormatMode::CarriageReturn => {
                            self.new_line();
                            periods = 2;
                        }
                    }
                }
                self.eow_action = false;
                self.suppress_lz = false;
                self.stage = OutputStage::Sign;
                self.busy = false;
                event!(Level::TRACE, "{} end of word", self.id);
            }
            Digit::BLANK => {
                // No output and no column advance, but the character
                // time is spent all the same.
            }
            Digit::TAB => {
                if self.tab() {
                    periods = 2;
                }
            }
            Digit::CARRIAGE_RETURN => {
                self.new_line();
                periods = 2;
            }
            Digit::FORM_FEED => {
                self.form_feed();
                periods = 4;
            }
            code if self.suppress_lz && code == Digit::ZERO => {
                self.print_char(' ');
            }
            code if code.is_numeric() => {
                self.suppress_lz = false;
                self.print_code(code);
            }
            code => {
                // No assigned meaning: dropped without printing, but
                // the delay still applies.
                event!(Level::DEBUG, "{} dropping unmapped code {code}", self.id);
            }
        }
        self.schedule_next(sched, periods);
    }

    /// Chain the follow-up request from the schedule cursor, not from
    /// "now", so that successive characters never arrive closer
    /// together than the rated character period.
    fn schedule_next(&mut self, sched: &mut dyn Scheduler, periods: u32) {
        let now = sched.now();
        if self.next_char_time < now {
            self.next_char_time = now;
        }
        self.next_char_time += self.class.char_period() * periods;
        let delay = self.next_char_time - now;
        self.pending = Some(sched.schedule(
            delay,
            DeviceEvent::OutputRequest {
                unit: self.id,
                stage: self.stage,
            },
        ));
    }

    fn print_code(&mut self, code: Digit) {
        match self.class.code_to_char(code) {
            Some(ch) => self.print_char(ch),
            None => {
                event!(Level::DEBUG, "{} has no glyph for code {code}", self.id);
            }
        }
    }

    fn print_char(&mut self, ch: char) {
        if self.column >= self.settings.columns {
            self.new_line();
        }
        self.printed.push(ch);
        self.column += 1;
    }

    fn new_line(&mut self) {
        self.printed.push('\n');
        self.column = 0;
        self.line = (self.line + 1) % PAGE_LINES;
    }

    /// Advance to the first tab stop strictly beyond the current
    /// column.  Returns true when the tab had to fall back to a line
    /// break because no stop fits on the line.
    fn tab(&mut self) -> bool {
        let stop = self
            .settings
            .tab_stops
            .iter()
            .copied()
            .find(|&stop| stop > self.column);
        match stop {
            Some(stop) if stop <= self.settings.columns => {
                while self.column < stop {
                    self.print_char(' ');
                }
                false
            }
            _ => {
                self.new_line();
                true
            }
        }
    }

    /// Pad with blank lines until the page-line counter returns to
    /// the top of a page.
    fn form_feed(&mut self) {
        while self.line != 0 {
            self.new_line();
        }
    }

    /// Drain the text the device has printed since the last call.
    pub fn take_printed(&mut self) -> String {
        std::mem::take(&mut self.printed)
    }

    /// Withdraw any outstanding scheduled action, so that no late
    /// callback can fire against a released device.
    pub fn cancel_pending(&mut self, sched: &mut dyn Scheduler) {
        if let Some(token) = self.pending.take() {
            sched.cancel(token);
        }
    }

    /// The reset/clear operation: re-zero the transient transfer
    /// state but keep the configuration-derived switches.
    pub fn clear(&mut self, sched: &mut dyn Scheduler) {
        self.cancel_pending(sched);
        self.busy = false;
        self.stage = OutputStage::Sign;
        self.eow_action = false;
        self.suppress_lz = false;
        self.column = 0;
        self.line = 0;
        self.next_char_time = Duration::ZERO;
        self.relay_mask = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::EventQueue;

    fn printer(settings: OutputSettings) -> OutputUnit {
        OutputUnit::new(UnitId::output(1), OutputClass::Printer, settings)
    }

    fn feed_word(unit: &mut OutputUnit, q: &mut EventQueue, sign: u8, digits: &[Digit]) {
        unit.initiate_output(0);
        unit.receive(Digit::try_from(sign).expect("sign in range"), q);
        for &d in digits {
            q.next_event();
            unit.receive(d, q);
        }
        q.next_event();
        unit.receive(Digit::END_OF_WORD, q);
        q.next_event();
    }

    #[test]
    fn test_initiate_answers_synchronously_with_sign_receiver() {
        let mut unit = printer(OutputSettings::default());
        assert_eq!(unit.initiate_output(0), OutputStage::Sign);
        assert!(unit.is_busy());
    }

    #[test]
    fn test_digits_print_after_default_sign() {
        let mut q = EventQueue::new();
        let settings = OutputSettings {
            format: FormatMode::Space,
            ..OutputSettings::default()
        };
        let mut unit = printer(settings);
        feed_word(
            &mut unit,
            &mut q,
            0,
            &[digit!(4), digit!(0), digit!(7)],
        );
        // Positive sign prints as a blank, then the digits, then the
        // space format action.
        assert_eq!(unit.take_printed(), " 407 ");
    }

    #[test]
    fn test_negative_sign_prints_minus() {
        let mut q = EventQueue::new();
        let settings = OutputSettings {
            format: FormatMode::Space,
            ..OutputSettings::default()
        };
        let mut unit = printer(settings);
        feed_word(&mut unit, &mut q, 1, &[digit!(5)]);
        assert_eq!(unit.take_printed(), "-5 ");
    }

    #[test]
    fn test_leading_zero_suppression() {
        let mut q = EventQueue::new();
        let settings = OutputSettings {
            format: FormatMode::Space,
            zero_suppress: true,
            ..OutputSettings::default()
        };
        let mut unit = printer(settings);
        feed_word(
            &mut unit,
            &mut q,
            0,
            &[digit!(0), digit!(0), digit!(3), digit!(0)],
        );
        // Sign placeholder blank, two suppressed zeroes, then
        // suppression ends at the first significant digit: the final
        // zero prints.
        assert_eq!(unit.take_printed(), "   30 ");
    }

    #[test]
    fn test_zero_suppression_needs_non_negative_sign() {
        let mut q = EventQueue::new();
        let settings = OutputSettings {
            format: FormatMode::Space,
            zero_suppress: true,
            ..OutputSettings::default()
        };
        let mut unit = printer(settings);
        feed_word(&mut unit, &mut q, 1, &[digit!(0), digit!(3)]);
        assert_eq!(unit.take_printed(), "-03 ");
    }

    #[test]
    fn test_alphanumeric_sign_is_consumed_silently() {
        let mut q = EventQueue::new();
        let settings = OutputSettings {
            format: FormatMode::Space,
            zero_suppress: true,
            ..OutputSettings::default()
        };
        let mut unit = printer(settings);
        feed_word(&mut unit, &mut q, 2, &[digit!(0), digit!(9)]);
        // No sign glyph, no suppression (the leading zero prints) and
        // no end-of-word action.
        assert_eq!(unit.take_printed(), "09");
    }

    #[test]
    fn test_transparent_mode_wins_over_alphanumeric_sign() {
        let mut q = EventQueue::new();
        let settings = OutputSettings {
            format: FormatMode::Space,
            transparent: true,
            ..OutputSettings::default()
        };
        let mut unit = printer(settings);
        feed_word(&mut unit, &mut q, 2, &[digit!(8)]);
        // Transparent mode is checked first, so the sign prints
        // verbatim instead of being treated as an alphanumeric mark.
        assert_eq!(unit.take_printed(), "28 ");
    }

    #[test]
    fn test_blank_code_spends_time_but_does_not_advance() {
        let mut q = EventQueue::new();
        let settings = OutputSettings {
            format: FormatMode::Space,
            ..OutputSettings::default()
        };
        let mut unit = printer(settings);
        feed_word(&mut unit, &mut q, 0, &[Digit::BLANK, digit!(6)]);
        assert_eq!(unit.take_printed(), " 6 ");
    }

    #[test]
    fn test_tab_advances_to_next_stop() {
        let mut q = EventQueue::new();
        let settings = OutputSettings {
            columns: 24,
            tab_stops: vec![8, 16, 24],
            ..OutputSettings::default()
        };
        let mut unit = printer(settings);
        // Three characters of sign-plus-digits leaves the column at 3.
        unit.initiate_output(0);
        unit.receive(digit!(1), &mut q);
        q.next_event();
        unit.receive(digit!(2), &mut q);
        q.next_event();
        unit.receive(digit!(2), &mut q);
        q.next_event();
        assert_eq!(unit.column(), 3);
        unit.receive(Digit::TAB, &mut q);
        q.next_event();
        assert_eq!(unit.column(), 8);
    }

    #[test]
    fn test_tab_reaches_stop_at_the_margin() {
        let mut q = EventQueue::new();
        let settings = OutputSettings {
            columns: 24,
            tab_stops: vec![8, 16, 24],
            ..OutputSettings::default()
        };
        let mut unit = printer(settings);
        unit.initiate_output(0);
        unit.receive(digit!(0), &mut q);
        q.next_event();
        for _ in 0..19 {
            unit.receive(digit!(9), &mut q);
            q.next_event();
        }
        assert_eq!(unit.column(), 20);
        unit.receive(Digit::TAB, &mut q);
        q.next_event();
        assert_eq!(unit.column(), 24);
    }

    #[test]
    fn test_tab_with_no_fitting_stop_breaks_the_line() {
        let settings = OutputSettings {
            columns: 24,
            tab_stops: vec![8, 16, 24],
            ..OutputSettings::default()
        };
        let mut unit = printer(settings);
        unit.column = 25;
        assert!(unit.tab());
        assert_eq!(unit.column(), 0);
        assert_eq!(unit.line(), 1);
    }

    #[test]
    fn test_carriage_return_code_breaks_line_with_double_delay() {
        let mut q = EventQueue::new();
        let mut unit = printer(OutputSettings::default());
        unit.initiate_output(0);
        unit.receive(digit!(0), &mut q);
        let (after_sign, _) = q.next_event().expect("sign receiver scheduled");
        unit.receive(Digit::CARRIAGE_RETURN, &mut q);
        let (after_cr, _) = q.next_event().expect("char receiver scheduled");
        assert_eq!(after_cr - after_sign, 2 * OutputClass::Printer.char_period());
        assert_eq!(unit.column(), 0);
    }

    #[test]
    fn test_form_feed_pads_to_top_of_page() {
        let mut q = EventQueue::new();
        let mut unit = printer(OutputSettings::default());
        unit.line = 40;
        unit.initiate_output(0);
        unit.receive(digit!(0), &mut q);
        q.next_event();
        unit.take_printed();
        unit.receive(Digit::FORM_FEED, &mut q);
        let printed = unit.take_printed();
        assert_eq!(printed.chars().filter(|&c| c == '\n').count(), 26);
        assert_eq!(unit.line(), 0);
    }

    #[test]
    fn test_form_feed_takes_quadruple_delay() {
        let mut q = EventQueue::new();
        let mut unit = printer(OutputSettings::default());
        unit.initiate_output(0);
        unit.receive(digit!(0), &mut q);
        let (after_sign, _) = q.next_event().expect("sign receiver scheduled");
        unit.receive(Digit::FORM_FEED, &mut q);
        let (after_ff, _) = q.next_event().expect("char receiver scheduled");
        assert_eq!(after_ff - after_sign, 4 * OutputClass::Printer.char_period());
    }

    #[test]
    fn test_column_wraps_at_the_limit() {
        let mut q = EventQueue::new();
        let settings = OutputSettings {
            columns: 4,
            tab_stops: vec![],
            format: FormatMode::Space,
            ..OutputSettings::default()
        };
        let mut unit = printer(settings);
        unit.initiate_output(0);
        unit.receive(digit!(0), &mut q);
        for _ in 0..5 {
            q.next_event();
            unit.receive(digit!(7), &mut q);
        }
        q.next_event();
        // Sign blank plus four digits fill the line; the fifth digit
        // starts a new one.
        assert_eq!(unit.take_printed(), " 777\n77");
    }

    #[test]
    fn test_characters_never_compress_below_the_rated_period() {
        // The caller answers every request instantly, so the spacing
        // between successive requests is set entirely by the device's
        // monotonic cursor.
        let mut q = EventQueue::new();
        let mut unit = printer(OutputSettings::default());
        unit.initiate_output(0);
        unit.receive(digit!(0), &mut q);
        let mut previous: Option<Duration> = None;
        for _ in 0..10 {
            let (at, _) = q.next_event().expect("request scheduled");
            if let Some(prev) = previous {
                assert!(at - prev >= OutputClass::Printer.char_period());
            }
            previous = Some(at);
            unit.receive(digit!(5), &mut q);
        }
    }

    #[test]
    fn test_end_of_word_returns_stage_to_sign() {
        let mut q = EventQueue::new();
        let mut unit = printer(OutputSettings::default());
        unit.initiate_output(0);
        unit.receive(digit!(0), &mut q);
        q.next_event();
        unit.receive(Digit::END_OF_WORD, &mut q);
        assert!(!unit.is_busy());
        match q.next_event() {
            Some((_, DeviceEvent::OutputRequest { stage, .. })) => {
                assert_eq!(stage, OutputStage::Sign);
            }
            other => panic!("expected an output request, got {other:?}"),
        }
    }

    #[test]
    fn test_rejected_tab_stops_keep_previous_setting() {
        let mut unit = printer(OutputSettings::default());
        let before = unit.settings.tab_stops.clone();
        assert!(unit.set_tab_stops(vec![16, 8]).is_err());
        assert_eq!(unit.settings.tab_stops, before);
        assert!(unit.set_tab_stops(vec![10, 20]).is_ok());
        assert_eq!(unit.settings.tab_stops, vec![10, 20]);
    }

    #[test]
    fn test_designate_mask_selects_logical_units() {
        let settings = OutputSettings {
            designate: DesignateMask::single(2).expect("unit 2 is in range"),
            ..OutputSettings::default()
        };
        let unit = printer(settings);
        assert!(unit.answers_to(2));
        assert!(!unit.answers_to(3));
    }

    #[test]
    fn test_clear_preserves_settings() {
        let mut q = EventQueue::new();
        let settings = OutputSettings {
            zero_suppress: true,
            ..OutputSettings::default()
        };
        let mut unit = printer(settings.clone());
        unit.initiate_output(0o17);
        unit.receive(digit!(0), &mut q);
        unit.clear(&mut q);
        assert!(!unit.is_busy());
        assert_eq!(unit.relay_mask(), 0);
        assert_eq!(unit.settings, settings);
        // The scheduled request was cancelled with the clear.
        assert!(q.is_idle());
    }
}
