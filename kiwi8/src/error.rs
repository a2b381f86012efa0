/// Failures reported by the machine, its loader and its builder
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A program can only be loaded into a fresh machine
    #[error("machine is not in its initial state")]
    NotInInitialState,
    /// Program does not fit between 0x200 and the end of memory
    #[error("program too large to fit in memory ({excess} bytes over)")]
    ProgramTooLarge { excess: usize },
    /// Fetched word matches no instruction
    #[error("unknown opcode {0:#06X}")]
    UnknownOpcode(u16),
    /// Subroutine call with all 16 stack entries in use
    #[error("cannot enter subroutine at {pc:#05X}, stack is full")]
    StackOverflow { pc: u16 },
    /// Return executed outside of any subroutine
    #[error("cannot return at {pc:#05X}, not in subroutine")]
    StackUnderflow { pc: u16 },
    #[error("context not provided")]
    MissingContext,
}

pub type Result<T> = core::result::Result<T, Error>;
