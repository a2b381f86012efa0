//! Headless host for the `kiwi8` machine: runs a ROM for a while and prints
//! the display.

pub mod context;
pub mod keys;
pub mod logger;
pub mod runner;

pub use context::HostContext;
pub use keys::{KeyEvent, KeyScript};
pub use runner::{render, run, Report, RunError, Session, Settings};
