//! The scheduling port.
//!
//! Every delay in the device protocol is expressed as "fire this
//! action after this delay" against a single injected scheduler, so
//! device logic never touches the wall clock and tests can advance
//! time deterministically.
use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::time::Duration;

use tracing::{event, Level};

use base::collections::pq::DueQueue;

use crate::clock::{BasicClock, Clock};
use crate::event::DeviceEvent;

/// A handle for a scheduled action, used to cancel it before it
/// fires.  Tokens are never reused within one scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CancelToken(u64);

/// The single scheduling port all devices share.
pub trait Scheduler {
    /// The current simulated time.
    fn now(&self) -> Duration;

    /// Arrange for `what` to fire after `delay`.
    fn schedule(&mut self, delay: Duration, what: DeviceEvent) -> CancelToken;

    /// Withdraw a scheduled action.  Returns false when the token is
    /// stale (the action already fired or was already cancelled);
    /// that is not an error.
    fn cancel(&mut self, token: CancelToken) -> bool;
}

/// A virtual timeline: a queue of pending device events ordered by
/// due time, over a simulated clock.  Popping an event advances the
/// clock to that event's due time, so a whole transfer can be run in
/// a tight loop without any real waiting.
pub struct EventQueue {
    clock: BasicClock,
    due: DueQueue<CancelToken>,
    payloads: HashMap<CancelToken, DeviceEvent>,
    next_token: u64,
}

impl EventQueue {
    pub fn new() -> EventQueue {
        EventQueue {
            clock: BasicClock::new(),
            due: DueQueue::new(),
            payloads: HashMap::new(),
            next_token: 0,
        }
    }

    /// Remove the soonest pending event, advance the clock to its due
    /// time and return it.  Returns `None` when the timeline is idle.
    pub fn next_event(&mut self) -> Option<(Duration, DeviceEvent)> {
        let (token, due) = self.due.pop()?;
        let what = self
            .payloads
            .remove(&token)
            .expect("every queued token has a payload");
        let now = self.clock.now();
        if due > now {
            self.clock.consume(&(due - now));
        }
        Some((due, what))
    }

    /// The due time of the soonest pending event, if any.
    pub fn peek_due(&self) -> Option<Duration> {
        self.due.peek().map(|(_, due)| due)
    }

    pub fn is_idle(&self) -> bool {
        self.due.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.due.len()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for EventQueue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventQueue")
            .field("now", &self.clock.now())
            .field("pending", &self.due.len())
            .finish()
    }
}

impl Scheduler for EventQueue {
    fn now(&self) -> Duration {
        self.clock.now()
    }

    fn schedule(&mut self, delay: Duration, what: DeviceEvent) -> CancelToken {
        let token = CancelToken(self.next_token);
        self.next_token += 1;
        let due = self.clock.now() + delay;
        event!(
            Level::TRACE,
            "scheduling {:?} at {:?} (delay {:?})",
            what,
            due,
            delay
        );
        self.due.insert(token, due);
        self.payloads.insert(token, what);
        token
    }

    fn cancel(&mut self, token: CancelToken) -> bool {
        match self.due.cancel(&token) {
            Some(due) => {
                self.payloads.remove(&token);
                event!(Level::TRACE, "cancelled action due at {:?}", due);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base::prelude::*;

    fn probe(n: u8) -> DeviceEvent {
        DeviceEvent::InputDelivery {
            unit: UnitId::input(n),
            digit: Digit::ZERO,
        }
    }

    #[test]
    fn test_events_fire_in_due_order() {
        let mut q = EventQueue::new();
        q.schedule(Duration::from_millis(30), probe(3));
        q.schedule(Duration::from_millis(10), probe(1));
        q.schedule(Duration::from_millis(20), probe(2));
        assert_eq!(
            q.next_event(),
            Some((Duration::from_millis(10), probe(1)))
        );
        assert_eq!(
            q.next_event(),
            Some((Duration::from_millis(20), probe(2)))
        );
        assert_eq!(
            q.next_event(),
            Some((Duration::from_millis(30), probe(3)))
        );
        assert!(q.is_idle());
        assert_eq!(q.next_event(), None);
    }

    #[test]
    fn test_clock_advances_to_due_time() {
        let mut q = EventQueue::new();
        q.schedule(Duration::from_millis(100), probe(1));
        assert_eq!(q.now(), Duration::ZERO);
        q.next_event();
        assert_eq!(q.now(), Duration::from_millis(100));
    }

    #[test]
    fn test_cancel_is_effective_and_stale_cancel_is_harmless() {
        let mut q = EventQueue::new();
        let keep = q.schedule(Duration::from_millis(5), probe(1));
        let drop = q.schedule(Duration::from_millis(1), probe(2));
        assert!(q.cancel(drop));
        assert!(!q.cancel(drop));
        assert_eq!(q.next_event(), Some((Duration::from_millis(5), probe(1))));
        assert!(!q.cancel(keep));
        assert!(q.is_idle());
    }

    #[test]
    fn test_delays_are_relative_to_current_time() {
        let mut q = EventQueue::new();
        q.schedule(Duration::from_millis(10), probe(1));
        q.next_event();
        q.schedule(Duration::from_millis(10), probe(2));
        assert_eq!(
            q.next_event(),
            Some((Duration::from_millis(20), probe(2)))
        );
    }
}
