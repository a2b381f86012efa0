//! Scripted keypad input for headless runs

use std::str::FromStr;

use thiserror::Error;

/// How long a scripted key stays down
pub const HOLD_MS: u64 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyEventError {
    #[error("expected KEY@MS, got {0:?}")]
    Format(String),
    #[error("key must be a hex digit 0-F, got {0:?}")]
    Key(String),
    #[error("time must be milliseconds, got {0:?}")]
    Time(String),
}

/// Key `key` goes down `at_ms` milliseconds into the run
///
/// Parsed from `KEY@MS` with `KEY` a hex digit, e.g. `A@250`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: u8,
    pub at_ms: u64,
}

impl FromStr for KeyEvent {
    type Err = KeyEventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, at) = s
            .split_once('@')
            .ok_or_else(|| KeyEventError::Format(s.to_owned()))?;
        let key = u8::from_str_radix(key.trim(), 16)
            .ok()
            .filter(|&key| key < 0x10)
            .ok_or_else(|| KeyEventError::Key(key.to_owned()))?;
        let at_ms = at
            .trim()
            .parse()
            .map_err(|_| KeyEventError::Time(at.to_owned()))?;
        Ok(Self { key, at_ms })
    }
}

/// Press or release produced by a `KeyScript`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Press(u8),
    Release(u8),
}

/// Turns `KeyEvent`s into presses and releases as time passes
pub struct KeyScript {
    // (time, action) sorted by time
    actions: Vec<(u64, KeyAction)>,
    next: usize,
}

impl KeyScript {
    pub fn new(events: &[KeyEvent]) -> Self {
        let mut actions: Vec<_> = events
            .iter()
            .flat_map(|ev| {
                [
                    (ev.at_ms, KeyAction::Press(ev.key)),
                    (ev.at_ms.saturating_add(HOLD_MS), KeyAction::Release(ev.key)),
                ]
            })
            .collect();
        actions.sort_by_key(|&(at, _)| at);
        Self { actions, next: 0 }
    }

    /// Actions due at `now_ms` that were not returned before
    pub fn due(&mut self, now_ms: u64) -> impl Iterator<Item = KeyAction> + '_ {
        let start = self.next;
        while self.next < self.actions.len() && self.actions[self.next].0 <= now_ms {
            self.next += 1;
        }
        self.actions[start..self.next].iter().map(|&(_, action)| action)
    }

    pub fn is_finished(&self) -> bool {
        self.next == self.actions.len()
    }
}
