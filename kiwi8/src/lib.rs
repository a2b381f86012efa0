//! A CHIP-8 virtual machine core.
//!
//! The crate is `no_std` with the `std` feature disabled. Platform services
//! (randomness, sound) are reached through [`Context`], time through
//! [`governor::Clock`].
#![cfg_attr(not(feature = "std"), no_std)]

pub mod builder;
pub mod config;
pub mod context;
pub mod error;
pub mod frame;
pub mod governor;
pub mod kiwi;
pub mod memory;
pub mod opcode;
#[cfg(feature = "std")]
pub mod rom;
mod timer;

pub use builder::Builder;
pub use config::{Config, Quirks, TimerMode};
pub use context::Context;
pub use error::Error;
pub use frame::{Frame, FrameView, PackedFrame, HEIGHT, WIDTH};
pub use governor::{Clock, Governor, DEFAULT_RATE};
pub use kiwi::Kiwi8;
pub use opcode::OpCode;
#[cfg(feature = "std")]
pub use rom::Rom;

#[cfg(feature = "std")]
pub use governor::MonotonicClock;

#[cfg(feature = "embedded-graphics")]
pub use embedded_graphics;
