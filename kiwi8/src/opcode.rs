use core::convert::TryFrom;

use crate::error::Error;

/// One decoded CHIP-8 instruction
///
/// Variants are named after the instruction pattern: `X`/`Y` are register
/// nibbles, `N`/`NN`/`NNN` immediates of 4, 8 and 12 bits. Machine code calls
/// (`0NNN`) are not part of the set.
///
/// Examples:
/// ```
/// use core::convert::TryFrom;
/// use kiwi8::opcode::OpCode;
///
/// let instruction = 0x8AB4;
/// let opcode = OpCode::try_from(instruction).unwrap();
///
/// assert_eq!(opcode, OpCode::_8XY4 { x: 0xA, y: 0xB });
/// assert_eq!(opcode.encode(), instruction);
/// ```
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum OpCode {
    /// CLS
    _00E0,
    /// RET, pops the return address
    _00EE,
    /// JP nnn
    _1NNN { nnn: u16 },
    /// CALL nnn, pushes the address of the next instruction
    _2NNN { nnn: u16 },
    /// SE Vx, nn
    _3XNN { x: u8, nn: u8 },
    /// SNE Vx, nn
    _4XNN { x: u8, nn: u8 },
    /// SE Vx, Vy
    _5XY0 { x: u8, y: u8 },
    /// LD Vx, nn
    _6XNN { x: u8, nn: u8 },
    /// ADD Vx, nn without touching VF
    _7XNN { x: u8, nn: u8 },
    /// LD Vx, Vy
    _8XY0 { x: u8, y: u8 },
    /// OR Vx, Vy
    _8XY1 { x: u8, y: u8 },
    /// AND Vx, Vy
    _8XY2 { x: u8, y: u8 },
    /// XOR Vx, Vy
    _8XY3 { x: u8, y: u8 },
    /// ADD Vx, Vy with VF = carry
    _8XY4 { x: u8, y: u8 },
    /// SUB Vx, Vy with VF = no borrow
    _8XY5 { x: u8, y: u8 },
    /// SHR Vx, VF gets the bit shifted out. `y` is ignored.
    _8XY6 { x: u8, y: u8 },
    /// SUBN Vx, Vy: Vx = Vy - Vx with VF = no borrow
    _8XY7 { x: u8, y: u8 },
    /// SHL Vx, VF gets the bit shifted out. `y` is ignored.
    _8XYE { x: u8, y: u8 },
    /// SNE Vx, Vy
    _9XY0 { x: u8, y: u8 },
    /// LD I, nnn
    _ANNN { nnn: u16 },
    /// JP V0, nnn
    _BNNN { nnn: u16 },
    /// RND Vx, nn: random byte masked with `nn`
    _CXNN { x: u8, nn: u8 },
    /// DRW Vx, Vy, n: XOR an `n` row sprite read from I onto the display,
    /// VF = 1 when a lit pixel got erased
    _DXYN { x: u8, y: u8, n: u8 },
    /// SKP Vx
    _EX9E { x: u8 },
    /// SKNP Vx, see [`Quirks`](crate::Quirks) for which way it skips
    _EXA1 { x: u8 },
    /// LD Vx, DT
    _FX07 { x: u8 },
    /// LD Vx, K: stall until a key gets pressed
    _FX0A { x: u8 },
    /// LD DT, Vx
    _FX15 { x: u8 },
    /// LD ST, Vx
    _FX18 { x: u8 },
    /// ADD I, Vx
    _FX1E { x: u8 },
    /// LD F, Vx: I = address of the font glyph for Vx
    _FX29 { x: u8 },
    /// LD B, Vx: hundreds, tens and ones of Vx at I, I+1, I+2
    _FX33 { x: u8 },
    /// LD [I], V0..=Vx
    _FX55 { x: u8 },
    /// LD V0..=Vx, [I]
    _FX65 { x: u8 },
}

/// Instruction word split into its four nibbles
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct Nibbles(u8, u8, u8, u8);

impl From<u16> for Nibbles {
    fn from(raw: u16) -> Self {
        let nibble = |shift: u16| (raw >> shift & 0xF) as u8;
        Nibbles(nibble(12), nibble(8), nibble(4), nibble(0))
    }
}

impl Nibbles {
    fn nn(self) -> u8 {
        self.2 << 4 | self.3
    }

    fn nnn(self) -> u16 {
        (self.1 as u16) << 8 | self.nn() as u16
    }
}

impl OpCode {
    fn with_x(first: u16, x: u8, low: u16) -> u16 {
        first << 12 | (x as u16 & 0xF) << 8 | low
    }

    fn with_xy(first: u16, x: u8, y: u8, last: u16) -> u16 {
        Self::with_x(first, x, (y as u16 & 0xF) << 4 | last)
    }

    /// Instruction word this opcode decodes from
    #[rustfmt::skip]
    pub fn encode(self) -> u16 {
        use OpCode::*;
        match self {
            _00E0              => 0x00E0,
            _00EE              => 0x00EE,
            _1NNN { nnn }      => 0x1000 | nnn & 0x0FFF,
            _2NNN { nnn }      => 0x2000 | nnn & 0x0FFF,
            _3XNN { x, nn }    => Self::with_x(0x3, x, nn as u16),
            _4XNN { x, nn }    => Self::with_x(0x4, x, nn as u16),
            _5XY0 { x, y }     => Self::with_xy(0x5, x, y, 0x0),
            _6XNN { x, nn }    => Self::with_x(0x6, x, nn as u16),
            _7XNN { x, nn }    => Self::with_x(0x7, x, nn as u16),
            _8XY0 { x, y }     => Self::with_xy(0x8, x, y, 0x0),
            _8XY1 { x, y }     => Self::with_xy(0x8, x, y, 0x1),
            _8XY2 { x, y }     => Self::with_xy(0x8, x, y, 0x2),
            _8XY3 { x, y }     => Self::with_xy(0x8, x, y, 0x3),
            _8XY4 { x, y }     => Self::with_xy(0x8, x, y, 0x4),
            _8XY5 { x, y }     => Self::with_xy(0x8, x, y, 0x5),
            _8XY6 { x, y }     => Self::with_xy(0x8, x, y, 0x6),
            _8XY7 { x, y }     => Self::with_xy(0x8, x, y, 0x7),
            _8XYE { x, y }     => Self::with_xy(0x8, x, y, 0xE),
            _9XY0 { x, y }     => Self::with_xy(0x9, x, y, 0x0),
            _ANNN { nnn }      => 0xA000 | nnn & 0x0FFF,
            _BNNN { nnn }      => 0xB000 | nnn & 0x0FFF,
            _CXNN { x, nn }    => Self::with_x(0xC, x, nn as u16),
            _DXYN { x, y, n }  => Self::with_xy(0xD, x, y, n as u16 & 0xF),
            _EX9E { x }        => Self::with_x(0xE, x, 0x9E),
            _EXA1 { x }        => Self::with_x(0xE, x, 0xA1),
            _FX07 { x }        => Self::with_x(0xF, x, 0x07),
            _FX0A { x }        => Self::with_x(0xF, x, 0x0A),
            _FX15 { x }        => Self::with_x(0xF, x, 0x15),
            _FX18 { x }        => Self::with_x(0xF, x, 0x18),
            _FX1E { x }        => Self::with_x(0xF, x, 0x1E),
            _FX29 { x }        => Self::with_x(0xF, x, 0x29),
            _FX33 { x }        => Self::with_x(0xF, x, 0x33),
            _FX55 { x }        => Self::with_x(0xF, x, 0x55),
            _FX65 { x }        => Self::with_x(0xF, x, 0x65),
        }
    }
}

impl TryFrom<u16> for OpCode {
    type Error = Error;

    /// Decode a big-endian instruction word, anything outside the set is
    /// `Error::UnknownOpcode`
    #[rustfmt::skip]
    fn try_from(raw: u16) -> Result<Self, Self::Error> {
        use OpCode::*;
        let word = Nibbles::from(raw);
        let (nn, nnn) = (word.nn(), word.nnn());
        let opcode = match word {
            Nibbles(0x0, 0x0, 0xE, 0x0) => _00E0,
            Nibbles(0x0, 0x0, 0xE, 0xE) => _00EE,
            Nibbles(0x1, _, _, _)       => _1NNN { nnn },
            Nibbles(0x2, _, _, _)       => _2NNN { nnn },
            Nibbles(0x3, x, _, _)       => _3XNN { x, nn },
            Nibbles(0x4, x, _, _)       => _4XNN { x, nn },
            Nibbles(0x5, x, y, 0x0)     => _5XY0 { x, y },
            Nibbles(0x6, x, _, _)       => _6XNN { x, nn },
            Nibbles(0x7, x, _, _)       => _7XNN { x, nn },
            Nibbles(0x8, x, y, 0x0)     => _8XY0 { x, y },
            Nibbles(0x8, x, y, 0x1)     => _8XY1 { x, y },
            Nibbles(0x8, x, y, 0x2)     => _8XY2 { x, y },
            Nibbles(0x8, x, y, 0x3)     => _8XY3 { x, y },
            Nibbles(0x8, x, y, 0x4)     => _8XY4 { x, y },
            Nibbles(0x8, x, y, 0x5)     => _8XY5 { x, y },
            Nibbles(0x8, x, y, 0x6)     => _8XY6 { x, y },
            Nibbles(0x8, x, y, 0x7)     => _8XY7 { x, y },
            Nibbles(0x8, x, y, 0xE)     => _8XYE { x, y },
            Nibbles(0x9, x, y, 0x0)     => _9XY0 { x, y },
            Nibbles(0xA, _, _, _)       => _ANNN { nnn },
            Nibbles(0xB, _, _, _)       => _BNNN { nnn },
            Nibbles(0xC, x, _, _)       => _CXNN { x, nn },
            Nibbles(0xD, x, y, n)       => _DXYN { x, y, n },
            Nibbles(0xE, x, 0x9, 0xE)   => _EX9E { x },
            Nibbles(0xE, x, 0xA, 0x1)   => _EXA1 { x },
            Nibbles(0xF, x, 0x0, 0x7)   => _FX07 { x },
            Nibbles(0xF, x, 0x0, 0xA)   => _FX0A { x },
            Nibbles(0xF, x, 0x1, 0x5)   => _FX15 { x },
            Nibbles(0xF, x, 0x1, 0x8)   => _FX18 { x },
            Nibbles(0xF, x, 0x1, 0xE)   => _FX1E { x },
            Nibbles(0xF, x, 0x2, 0x9)   => _FX29 { x },
            Nibbles(0xF, x, 0x3, 0x3)   => _FX33 { x },
            Nibbles(0xF, x, 0x5, 0x5)   => _FX55 { x },
            Nibbles(0xF, x, 0x6, 0x5)   => _FX65 { x },
            _ => return Err(Error::UnknownOpcode(raw)),
        };
        Ok(opcode)
    }
}
