//! Simulation of elapsed time in the simulated system.

use std::time::Duration;

/// Clock is a simulated system clock.  Its run rate is decoupled from
/// wall-clock time; device timing only ever compares and advances
/// this clock, so a test (or a batch run) can drive the whole
/// peripheral subsystem as fast as the host allows.
pub trait Clock {
    /// Retrieves the current (simulated) time.
    fn now(&self) -> Duration;

    /// The caller calls `consume` to simulate the passing of a
    /// duration `interval`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use periph::{BasicClock, Clock};
    ///
    /// fn g<C: Clock>(clk: &mut C) {
    ///   // We just performed an action which would have taken
    ///   // one millisecond on the simulated machine.
    ///   clk.consume(&Duration::from_millis(1));
    /// }
    /// ```
    fn consume(&mut self, interval: &Duration);
}

/// BasicClock provides a simulated clock.
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use periph::{BasicClock, Clock};
/// let mut clk = BasicClock::new();
/// clk.consume(&Duration::from_micros(12));
/// assert_eq!(clk.now(), Duration::from_micros(12));
/// ```
#[derive(Debug)]
pub struct BasicClock {
    /// Elapsed time as measured by the simulated clock.
    simulator_elapsed: Duration,
}

impl BasicClock {
    pub fn new() -> BasicClock {
        BasicClock {
            simulator_elapsed: Duration::new(0, 0),
        }
    }
}

impl Default for BasicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for BasicClock {
    fn now(&self) -> Duration {
        self.simulator_elapsed
    }

    fn consume(&mut self, interval: &Duration) {
        self.simulator_elapsed += *interval;
    }
}
