//! Paper tape reader.
//!
//! The reader turns loaded text into a stream of digit codes, one
//! code per character time, with an end-of-word delivery at each line
//! boundary.  A read issued while no data is loaded does not fail and
//! does not block: it is parked as a first-class pending read which
//! the data-supply path fulfils explicitly when a tape arrives.
//!
//! After a pause the read head has to re-engage the tape, so an
//! initiate call that follows an idle gap pushes the schedule cursor
//! forward by a fixed start-up delay before the first character can
//! be delivered.
use std::fmt::{self, Debug, Formatter};
use std::time::Duration;

use tracing::{event, Level};

use base::charset::CharToCodeMapping;
use base::prelude::*;

use crate::config::ReaderSettings;
use crate::event::DeviceEvent;
use crate::scheduler::{CancelToken, Scheduler};

/// Mechanical start-up latency of the read head after a pause.
pub const READER_START_DELAY: Duration = Duration::from_millis(50);

/// How long without a character transfer counts as a pause.
pub const READER_IDLE_THRESHOLD: Duration = Duration::from_secs(1);

/// What a call to [`ReaderUnit::read_tape_char`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A delivery was scheduled on the timeline.
    Scheduled,
    /// No data; the read is parked until data is supplied.
    Parked,
}

/// A parked read, waiting for data to arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingRead {
    requested_at: Duration,
}

pub struct ReaderUnit {
    id: UnitId,
    settings: ReaderSettings,
    mapping: CharToCodeMapping,

    /// Data is loaded and the device is on-line.
    ready: bool,
    /// Mid-transfer, or holding a parked read.
    busy: bool,

    buffer: Vec<char>,
    /// 0-relative read cursor into `buffer`; monotonically
    /// non-decreasing until the buffer is replaced.
    buf_index: usize,

    pending_read: Option<PendingRead>,

    /// Monotonic schedule cursor.
    next_char_time: Duration,
    /// When the most recent character delivery was scheduled for.
    last_transfer: Option<Duration>,

    pending: Option<CancelToken>,
}

impl Debug for ReaderUnit {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_struct("ReaderUnit")
            .field("id", &self.id)
            .field("ready", &self.ready)
            .field("busy", &self.busy)
            .field("buffer_len", &self.buffer.len())
            .field("buf_index", &self.buf_index)
            .field("pending_read", &self.pending_read)
            .field("next_char_time", &self.next_char_time)
            .finish_non_exhaustive()
    }
}

impl ReaderUnit {
    pub fn new(id: UnitId, settings: ReaderSettings) -> ReaderUnit {
        ReaderUnit {
            id,
            settings,
            mapping: CharToCodeMapping::for_reader(),
            ready: false,
            busy: false,
            buffer: Vec::new(),
            buf_index: 0,
            pending_read: None,
            next_char_time: Duration::ZERO,
            last_transfer: None,
            pending: None,
        }
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn answers_to(&self, logical_unit: u8) -> bool {
        self.settings.designate.answers_to(logical_unit)
    }

    /// Begin an input transfer.  If the reader has been idle for
    /// longer than [`READER_IDLE_THRESHOLD`] the read head has to
    /// re-engage, which costs [`READER_START_DELAY`] before the first
    /// character; otherwise delivery proceeds immediately.
    pub fn initiate_input(&mut self, sched: &mut dyn Scheduler) {
        let now = sched.now();
        let idle = match self.last_transfer {
            None => true,
            Some(at) => now.saturating_sub(at) > READER_IDLE_THRESHOLD,
        };
        if idle {
            let engaged_at = now + READER_START_DELAY;
            if self.next_char_time < engaged_at {
                self.next_char_time = engaged_at;
            }
            event!(
                Level::DEBUG,
                "{} initiated after a pause; start-up delay applies",
                self.id
            );
        } else {
            event!(Level::DEBUG, "{} initiated", self.id);
        }
        self.busy = true;
    }

    /// The central read operation: deliver the next translated code
    /// (or the end-of-word code at a line boundary) to the processor,
    /// spaced no closer than one character period from the previous
    /// delivery.
    ///
    /// With no data loaded the read completes nothing and occupies no
    /// scheduled slot; it is parked and fulfilled later by
    /// [`ReaderUnit::supply_data`].
    pub fn read_tape_char(&mut self, sched: &mut dyn Scheduler) -> ReadOutcome {
        if !self.ready {
            self.pending_read = Some(PendingRead {
                requested_at: sched.now(),
            });
            self.busy = true;
            event!(Level::DEBUG, "{} has no data; read parked", self.id);
            return ReadOutcome::Parked;
        }
        self.busy = true;
        let digit = self.next_code();
        if digit == Digit::END_OF_WORD {
            self.busy = false;
        }
        self.deliver(digit, sched);
        ReadOutcome::Scheduled
    }

    /// Scan forward from the read cursor for the next deliverable
    /// code.  Characters with no translation are skipped.
    fn next_code(&mut self) -> Digit {
        loop {
            match self.buffer.get(self.buf_index) {
                None => {
                    // End of the loaded tape: one end-of-word signal,
                    // then the device runs empty.
                    self.ready = false;
                    event!(Level::INFO, "{} ran out of tape", self.id);
                    return Digit::END_OF_WORD;
                }
                Some('\n') => {
                    self.buf_index += 1;
                    self.note_if_exhausted();
                    return Digit::END_OF_WORD;
                }
                Some('\r') => {
                    // CR possibly followed by LF is one terminator.
                    self.buf_index += 1;
                    if self.buffer.get(self.buf_index) == Some(&'\n') {
                        self.buf_index += 1;
                    }
                    self.note_if_exhausted();
                    return Digit::END_OF_WORD;
                }
                Some(&ch) => {
                    self.buf_index += 1;
                    match self.mapping.to_code(ch) {
                        Some(code) => return code,
                        None => {
                            event!(
                                Level::DEBUG,
                                "{} skipping untranslatable character {ch:?}",
                                self.id
                            );
                        }
                    }
                }
            }
        }
    }

    fn note_if_exhausted(&mut self) {
        if self.buf_index >= self.buffer.len() {
            self.ready = false;
            event!(Level::INFO, "{} is empty", self.id);
        }
    }

    /// Schedule the delivery using the monotonic cursor: if the
    /// cursor has already passed, deliver now and restart the cursor
    /// one period ahead; otherwise wait out the remainder and advance
    /// the cursor one more period.
    fn deliver(&mut self, digit: Digit, sched: &mut dyn Scheduler) {
        let now = sched.now();
        let period = self.settings.speed.char_period();
        let delay = if self.next_char_time <= now {
            self.next_char_time = now + period;
            Duration::ZERO
        } else {
            let wait = self.next_char_time - now;
            self.next_char_time += period;
            wait
        };
        self.last_transfer = Some(now + delay);
        self.pending = Some(sched.schedule(
            delay,
            DeviceEvent::InputDelivery {
                unit: self.id,
                digit,
            },
        ));
    }

    /// Supply new tape data.  The text is concatenated onto the
    /// unconsumed remainder of the current buffer (with a line
    /// terminator between them if the remainder lacked one), the
    /// cursor returns to the start of the unconsumed region, and any
    /// parked read is fulfilled.
    pub fn supply_data(&mut self, text: &str, sched: &mut dyn Scheduler) {
        self.buffer.drain(..self.buf_index);
        self.buf_index = 0;
        if !self.buffer.is_empty() && !matches!(self.buffer.last(), Some('\n') | Some('\r')) {
            self.buffer.push('\n');
        }
        self.buffer.extend(text.chars());
        self.ready = !self.buffer.is_empty();
        event!(
            Level::INFO,
            "{} loaded; buffer now holds {} characters",
            self.id,
            self.buffer.len()
        );
        if self.ready && self.busy {
            if let Some(parked) = self.pending_read.take() {
                event!(
                    Level::DEBUG,
                    "{} resuming read parked at {:?}",
                    self.id,
                    parked.requested_at
                );
                self.read_tape_char(sched);
            }
        }
    }

    /// Withdraw any outstanding scheduled delivery, so that no late
    /// callback can fire against a released device.
    pub fn cancel_pending(&mut self, sched: &mut dyn Scheduler) {
        if let Some(token) = self.pending.take() {
            sched.cancel(token);
        }
    }

    /// The reset/clear operation: re-zero the transient transfer
    /// state.  Loaded data and the configuration-derived switches
    /// survive.
    pub fn clear(&mut self, sched: &mut dyn Scheduler) {
        self.cancel_pending(sched);
        self.busy = false;
        self.pending_read = None;
        self.next_char_time = Duration::ZERO;
        self.last_transfer = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReaderSpeed;
    use crate::scheduler::EventQueue;

    fn reader(speed: ReaderSpeed) -> ReaderUnit {
        ReaderUnit::new(
            UnitId::input(1),
            ReaderSettings {
                speed,
                designate: DesignateMask::NONE,
            },
        )
    }

    fn delivered(q: &mut EventQueue) -> (Duration, Digit) {
        match q.next_event() {
            Some((at, DeviceEvent::InputDelivery { digit, .. })) => (at, digit),
            other => panic!("expected an input delivery, got {other:?}"),
        }
    }

    #[test]
    fn test_two_line_tape_scenario() {
        let mut q = EventQueue::new();
        let mut unit = reader(ReaderSpeed::High);
        unit.supply_data("5\n3\n", &mut q);
        unit.initiate_input(&mut q);

        assert_eq!(unit.read_tape_char(&mut q), ReadOutcome::Scheduled);
        assert_eq!(delivered(&mut q).1, digit!(5));
        assert_eq!(unit.read_tape_char(&mut q), ReadOutcome::Scheduled);
        assert_eq!(delivered(&mut q).1, Digit::END_OF_WORD);
        assert!(unit.is_ready());

        assert_eq!(unit.read_tape_char(&mut q), ReadOutcome::Scheduled);
        assert_eq!(delivered(&mut q).1, digit!(3));
        assert_eq!(unit.read_tape_char(&mut q), ReadOutcome::Scheduled);
        assert_eq!(delivered(&mut q).1, Digit::END_OF_WORD);
        // The final terminator exhausted the buffer.
        assert!(!unit.is_ready());
    }

    #[test]
    fn test_end_of_buffer_without_terminator_still_ends_the_word() {
        let mut q = EventQueue::new();
        let mut unit = reader(ReaderSpeed::High);
        unit.supply_data("7", &mut q);
        unit.initiate_input(&mut q);
        unit.read_tape_char(&mut q);
        assert_eq!(delivered(&mut q).1, digit!(7));
        unit.read_tape_char(&mut q);
        assert_eq!(delivered(&mut q).1, Digit::END_OF_WORD);
        assert!(!unit.is_ready());
    }

    #[test]
    fn test_crlf_is_one_terminator() {
        let mut q = EventQueue::new();
        let mut unit = reader(ReaderSpeed::High);
        unit.supply_data("1\r\n2\r", &mut q);
        unit.initiate_input(&mut q);
        unit.read_tape_char(&mut q);
        assert_eq!(delivered(&mut q).1, digit!(1));
        unit.read_tape_char(&mut q);
        assert_eq!(delivered(&mut q).1, Digit::END_OF_WORD);
        unit.read_tape_char(&mut q);
        assert_eq!(delivered(&mut q).1, digit!(2));
        unit.read_tape_char(&mut q);
        assert_eq!(delivered(&mut q).1, Digit::END_OF_WORD);
        assert!(!unit.is_ready());
    }

    #[test]
    fn test_parked_read_completes_only_after_supply() {
        let mut q = EventQueue::new();
        let mut unit = reader(ReaderSpeed::High);
        unit.initiate_input(&mut q);
        assert_eq!(unit.read_tape_char(&mut q), ReadOutcome::Parked);
        // Nothing was scheduled: the processor is simply parked.
        assert!(q.is_idle());
        assert!(unit.is_busy());
        assert!(!unit.is_ready());

        unit.supply_data("9\n", &mut q);
        // The supply path fulfilled the parked read.
        assert_eq!(delivered(&mut q).1, digit!(9));
    }

    #[test]
    fn test_deliveries_never_compress_below_the_rated_period() {
        let mut q = EventQueue::new();
        let mut unit = reader(ReaderSpeed::High);
        unit.supply_data("1234567890\n", &mut q);
        unit.initiate_input(&mut q);
        let mut previous: Option<Duration> = None;
        for _ in 0..11 {
            unit.read_tape_char(&mut q);
            let (at, _) = delivered(&mut q);
            if let Some(prev) = previous {
                assert!(
                    at - prev >= ReaderSpeed::High.char_period(),
                    "deliveries only {:?} apart",
                    at - prev
                );
            }
            previous = Some(at);
        }
    }

    #[test]
    fn test_initiate_after_idle_gap_costs_startup_delay() {
        let mut q = EventQueue::new();
        let mut unit = reader(ReaderSpeed::High);
        unit.supply_data("5\n", &mut q);
        unit.initiate_input(&mut q);
        unit.read_tape_char(&mut q);
        let (at, _) = delivered(&mut q);
        assert_eq!(at, READER_START_DELAY);
    }

    #[test]
    fn test_no_startup_delay_when_not_idle() {
        let mut q = EventQueue::new();
        let mut unit = reader(ReaderSpeed::High);
        unit.supply_data("12\n", &mut q);
        unit.initiate_input(&mut q);
        unit.read_tape_char(&mut q);
        let (first, _) = delivered(&mut q);
        // Re-initiating right away must not add another start-up
        // delay.
        unit.initiate_input(&mut q);
        unit.read_tape_char(&mut q);
        let (second, _) = delivered(&mut q);
        assert_eq!(second - first, ReaderSpeed::High.char_period());
    }

    #[test]
    fn test_supply_inserts_terminator_before_appended_text() {
        let mut q = EventQueue::new();
        let mut unit = reader(ReaderSpeed::High);
        unit.supply_data("1", &mut q);
        unit.supply_data("2\n", &mut q);
        unit.initiate_input(&mut q);
        unit.read_tape_char(&mut q);
        assert_eq!(delivered(&mut q).1, digit!(1));
        unit.read_tape_char(&mut q);
        assert_eq!(delivered(&mut q).1, Digit::END_OF_WORD);
        unit.read_tape_char(&mut q);
        assert_eq!(delivered(&mut q).1, digit!(2));
    }

    #[test]
    fn test_supply_keeps_unconsumed_remainder() {
        let mut q = EventQueue::new();
        let mut unit = reader(ReaderSpeed::High);
        unit.supply_data("12\n", &mut q);
        unit.initiate_input(&mut q);
        unit.read_tape_char(&mut q);
        assert_eq!(delivered(&mut q).1, digit!(1));
        unit.supply_data("3\n", &mut q);
        unit.read_tape_char(&mut q);
        assert_eq!(delivered(&mut q).1, digit!(2));
        unit.read_tape_char(&mut q);
        assert_eq!(delivered(&mut q).1, Digit::END_OF_WORD);
        unit.read_tape_char(&mut q);
        assert_eq!(delivered(&mut q).1, digit!(3));
    }

    #[test]
    fn test_untranslatable_characters_are_skipped() {
        let mut q = EventQueue::new();
        let mut unit = reader(ReaderSpeed::High);
        unit.supply_data("4x5\n", &mut q);
        unit.initiate_input(&mut q);
        unit.read_tape_char(&mut q);
        assert_eq!(delivered(&mut q).1, digit!(4));
        unit.read_tape_char(&mut q);
        assert_eq!(delivered(&mut q).1, digit!(5));
    }

    #[test]
    fn test_clear_drops_parked_read_but_keeps_data() {
        let mut q = EventQueue::new();
        let mut unit = reader(ReaderSpeed::Low);
        unit.initiate_input(&mut q);
        unit.read_tape_char(&mut q);
        unit.clear(&mut q);
        assert!(!unit.is_busy());
        // A later supply has no parked read to fulfil.
        unit.supply_data("8\n", &mut q);
        assert!(q.is_idle());
        assert!(unit.is_ready());
    }
}
