use log::info;
use nanorand::{rand::pcg64::Pcg64 as Rng, RNG};

use kiwi8::Context;

/// Platform services for a headless run
///
/// Randomness comes from a seeded Pcg64, so a run with the same seed, program
/// and key script is reproducible. Sound has no output device and is only
/// logged and counted.
pub struct HostContext {
    rng: Rng,
    sound: bool,
    beeps: usize,
}

impl HostContext {
    pub fn new(seed: u128) -> Self {
        Self {
            rng: Rng::new_seed(seed),
            sound: false,
            beeps: 0,
        }
    }

    pub fn is_sound_on(&self) -> bool {
        self.sound
    }

    /// Number of times sound was turned on
    pub fn beeps(&self) -> usize {
        self.beeps
    }
}

impl Context for HostContext {
    fn gen_random(&mut self) -> u8 {
        self.rng.generate::<u8>()
    }

    fn sound_on(&mut self) {
        info!("beep on");
        self.sound = true;
        self.beeps += 1;
    }

    fn sound_off(&mut self) {
        info!("beep off");
        self.sound = false;
    }
}
