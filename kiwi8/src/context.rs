//! Context for accessing functionalities of platform that `Kiwi8` is
//! emulated on.

/// Trait aggregating platform functionalities
pub trait Context {
    /// Generate random 8-bit number
    ///
    /// Called by `step` whenever requested by executing program (`CXNN`).
    /// Implementations backed by a seeded generator make runs reproducible.
    fn gen_random(&mut self) -> u8;
    /// Turn sound on
    ///
    /// Called when the sound timer is loaded with a nonzero value
    fn sound_on(&mut self) {}
    /// Turn sound off
    ///
    /// Called when the sound timer reaches zero or is loaded with zero
    fn sound_off(&mut self) {}
}
