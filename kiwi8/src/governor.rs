//! Translates elapsed time into executed instructions

use log::trace;

use crate::config::TimerMode;
use crate::context::Context;
use crate::error::Error;
use crate::kiwi::Kiwi8;

/// Instructions per second used when nothing else is configured
pub const DEFAULT_RATE: u64 = 1000;
/// Timer frequency for `TimerMode::Fixed60Hz`
pub const TIMER_RATE: u64 = 60;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Monotonic time source
pub trait Clock {
    /// Current time in nanoseconds, never decreasing
    fn now(&mut self) -> u64;
}

/// Clock backed by `std::time::Instant`
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock(std::time::Instant);

#[cfg(feature = "std")]
impl MonotonicClock {
    pub fn new() -> Self {
        Self(std::time::Instant::now())
    }
}

#[cfg(feature = "std")]
impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl Clock for MonotonicClock {
    fn now(&mut self) -> u64 {
        self.0.elapsed().as_nanos() as u64
    }
}

/// Runs a machine at a fixed instruction rate
///
/// Each `poll` works out how many instructions should have run since the
/// governor was created and steps the machine until it caught up. How often
/// `poll` gets called does not change the throughput.
///
/// While the machine waits for a key the governor counts itself as caught up,
/// so no backlog of instructions builds up during the wait.
pub struct Governor<K: Clock> {
    clock: K,
    start: u64,
    rate: u64,
    cycles: u64,
    timer_ticks: u64,
}

impl<K: Clock> Governor<K> {
    /// Captures the reference time from `clock`
    pub fn new(mut clock: K, rate: u64) -> Self {
        let start = clock.now();
        Self {
            clock,
            start,
            rate,
            cycles: 0,
            timer_ticks: 0,
        }
    }

    pub fn rate(&self) -> u64 {
        self.rate
    }

    /// Instructions accounted for so far, executed or skipped while blocked
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn clock(&self) -> &K {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut K {
        &mut self.clock
    }

    /// Nanoseconds since the governor was created
    pub fn elapsed(&mut self) -> u64 {
        self.clock.now().saturating_sub(self.start)
    }

    fn due(elapsed: u64, rate: u64) -> u64 {
        (elapsed as u128 * rate as u128 / NANOS_PER_SEC) as u64
    }

    /// Cycle count at which the `tick`-th 60 Hz timer tick falls due
    fn tick_cycle(tick: u64, rate: u64) -> u64 {
        (tick as u128 * rate as u128 / TIMER_RATE as u128) as u64
    }

    /// Catch the machine up with the clock
    ///
    /// With `TimerMode::Fixed60Hz` timer ticks are interleaved with the
    /// instructions at the cycle their deadline falls on, so the values a
    /// program reads do not depend on how often `poll` is called.
    ///
    /// Returns the number of instructions executed by this call.
    pub fn poll<C: Context>(&mut self, chip: &mut Kiwi8<C>) -> Result<u64, Error> {
        let elapsed = self.elapsed();
        let target = Self::due(elapsed, self.rate);
        let ticks = match chip.config().timer_mode {
            TimerMode::Fixed60Hz => Self::due(elapsed, TIMER_RATE),
            TimerMode::PerInstruction => self.timer_ticks,
        };

        let mut executed = 0;
        loop {
            while self.timer_ticks < ticks
                && Self::tick_cycle(self.timer_ticks + 1, self.rate) <= self.cycles
            {
                chip.tick_timers();
                self.timer_ticks += 1;
            }
            if self.cycles >= target {
                break;
            }
            match chip.step() {
                Ok(()) => {
                    self.cycles += 1;
                    executed += 1;
                }
                Err(nb::Error::WouldBlock) => {
                    trace!("blocked on key, skipping to cycle {}", target);
                    self.cycles = target;
                }
                Err(nb::Error::Other(err)) => return Err(err),
            }
        }
        Ok(executed)
    }
}
