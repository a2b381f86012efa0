use std::io;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use log::{debug, info};
use thiserror::Error;

use kiwi8::{Builder, Clock, Config, FrameView, Governor, Kiwi8, MonotonicClock, Rom};

use crate::context::HostContext;
use crate::keys::{KeyAction, KeyEvent, KeyScript};

const NANOS_PER_MS: u64 = 1_000_000;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("cannot read rom: {0}")]
    Io(#[from] io::Error),
    #[error("machine stopped: {0}")]
    Machine(#[from] kiwi8::Error),
}

/// Everything needed for a headless run
#[derive(Debug, Clone)]
pub struct Settings {
    pub rom: PathBuf,
    /// Instructions per second
    pub rate: u64,
    pub duration_ms: u64,
    pub seed: u128,
    pub config: Config,
    pub keys: Vec<KeyEvent>,
}

/// State of the machine when a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub name: String,
    pub cycles: u64,
    pub beeps: usize,
    pub waiting_for_key: bool,
    pub screen: String,
}

/// A loaded machine driven by a governor and a key script
pub struct Session<K: Clock> {
    chip: Kiwi8<HostContext>,
    governor: Governor<K>,
    script: KeyScript,
}

impl<K: Clock> Session<K> {
    pub fn new(chip: Kiwi8<HostContext>, clock: K, rate: u64, keys: &[KeyEvent]) -> Self {
        Self {
            chip,
            governor: Governor::new(clock, rate),
            script: KeyScript::new(keys),
        }
    }

    /// Feed due key actions, then catch the machine up with the clock
    ///
    /// Returns milliseconds elapsed since the session started.
    pub fn poll(&mut self) -> Result<u64, kiwi8::Error> {
        let now_ms = self.governor.elapsed() / NANOS_PER_MS;
        for action in self.script.due(now_ms) {
            debug!("{}ms: {:?}", now_ms, action);
            match action {
                KeyAction::Press(key) => self.chip.press(key),
                KeyAction::Release(key) => self.chip.release(key),
            }
        }
        self.governor.poll(&mut self.chip)?;
        Ok(now_ms)
    }

    pub fn chip(&self) -> &Kiwi8<HostContext> {
        &self.chip
    }

    pub fn governor_mut(&mut self) -> &mut Governor<K> {
        &mut self.governor
    }

    pub fn report(&self, name: &str, scale: usize) -> Report {
        Report {
            name: name.to_owned(),
            cycles: self.chip.cycles(),
            beeps: self.chip.ctx().beeps(),
            waiting_for_key: self.chip.is_waiting_for_key(),
            screen: render(self.chip.frame(), scale),
        }
    }
}

/// Load the ROM and run it in real time for `settings.duration_ms`
pub fn run(settings: &Settings, scale: usize) -> Result<Report, RunError> {
    let rom = Rom::from_path(&settings.rom)?;
    info!("running {} ({} bytes) at {} Hz", rom.name(), rom.size(), settings.rate);

    let mut chip = Builder::new()
        .with_context(HostContext::new(settings.seed))
        .with_config(settings.config)
        .build()?;
    chip.load(&rom)?;

    let mut session = Session::new(chip, MonotonicClock::new(), settings.rate, &settings.keys);
    while session.poll()? < settings.duration_ms {
        thread::sleep(Duration::from_millis(1));
    }

    let report = session.report(rom.name(), scale);
    info!(
        "{} instructions executed, {} beeps",
        report.cycles, report.beeps
    );
    Ok(report)
}

/// Text picture of the display, `#` for lit pixels and `.` for dark ones
pub fn render(frame: FrameView<'_>, scale: usize) -> String {
    let mut out = String::new();
    for row in frame.iter_pixelwise_scaled(scale.max(1)) {
        out.extend(row.map(|&px| if px != 0 { '#' } else { '.' }));
        out.push('\n');
    }
    out
}
