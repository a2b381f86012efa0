//! Interpreter configuration

/// Clock driving the delay and sound timers
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TimerMode {
    /// Timers decrement once after every executed instruction, so their
    /// real-time rate follows the instruction rate.
    PerInstruction,
    /// Timers decrement at 60 Hz of elapsed time, driven by the
    /// [`Governor`](crate::Governor). `step` leaves them alone.
    Fixed60Hz,
}

impl Default for TimerMode {
    fn default() -> Self {
        TimerMode::PerInstruction
    }
}

/// Opcode behaviours that differ between interpreters
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Quirks {
    /// `EXA1` skips when the key is pressed, same as `EX9E`.
    ///
    /// Most interpreters skip when the key is *not* pressed; set this to
    /// `false` for that behaviour.
    pub exa1_skips_when_pressed: bool,
}

impl Default for Quirks {
    fn default() -> Self {
        Self {
            exa1_skips_when_pressed: true,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    pub timer_mode: TimerMode,
    pub quirks: Quirks,
}

impl Config {
    pub fn with_timer_mode(mut self, timer_mode: TimerMode) -> Self {
        self.timer_mode = timer_mode;
        self
    }

    pub fn with_quirks(mut self, quirks: Quirks) -> Self {
        self.quirks = quirks;
        self
    }
}
