//! 4 KiB memory image with the built-in font

use log::warn;

/// Size of the address space in bytes
pub const MEMORY_SIZE: usize = 0x1000;
/// Address programs are loaded at and `pc` starts from
pub const PROGRAM_START: u16 = 0x200;
/// Bytes available to a program
pub const PROGRAM_CAPACITY: usize = MEMORY_SIZE - PROGRAM_START as usize;
/// Addresses are 12 bits wide
pub const ADDRESS_MASK: u16 = 0x0FFF;
/// Bytes per font glyph
pub const GLYPH_SIZE: u16 = 5;
/// First address past the font, writes below it are dropped
pub const FONT_END: u16 = 0x050;

const FONTSET: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

/// Byte-addressable memory of the machine
///
/// Every access is masked to 12 bits, so addresses past `0xFFF` wrap to the
/// beginning of memory instead of escaping it. The font is read-only once
/// the memory is created.
#[derive(Clone, PartialEq, Eq)]
pub struct Memory([u8; MEMORY_SIZE]);

impl Memory {
    /// Zeroed memory with the font at `0x000`
    pub(crate) fn new() -> Self {
        let mut memory = [0; MEMORY_SIZE];
        memory[..FONTSET.len()].copy_from_slice(&FONTSET);
        Self(memory)
    }

    /// View the whole address space
    pub fn as_raw(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn read(&self, addr: u16) -> u8 {
        self.0[(addr & ADDRESS_MASK) as usize]
    }

    /// Big-endian word at `addr`
    #[inline]
    pub fn read_word(&self, addr: u16) -> u16 {
        (self.read(addr) as u16) << 8 | self.read(addr.wrapping_add(1)) as u16
    }

    /// Store `value` at `addr`, ignored inside the font
    #[inline]
    pub(crate) fn write(&mut self, addr: u16, value: u8) {
        let addr = addr & ADDRESS_MASK;
        if addr < FONT_END {
            warn!("dropped write of {:#04x} to font at {:#05x}", value, addr);
            return;
        }
        self.0[addr as usize] = value;
    }

    /// Copy a program to `PROGRAM_START`, anything past the end of memory is dropped
    pub(crate) fn load_program(&mut self, program: &[u8]) {
        self.0[PROGRAM_START as usize..]
            .iter_mut()
            .zip(program)
            .for_each(|(mem, &byte)| *mem = byte);
    }
}

/// Address of the font glyph for `digit`
///
/// The product is a byte and wraps, so any `digit` lands below `0x100`.
pub fn glyph_addr(digit: u8) -> u16 {
    digit.wrapping_mul(GLYPH_SIZE as u8) as u16
}
