use core::convert::TryFrom;

use heapless::Vec;
use log::{debug, trace, warn};

use crate::config::{Config, TimerMode};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::frame::{Frame, FrameView};
use crate::memory::{self, Memory, ADDRESS_MASK, PROGRAM_CAPACITY, PROGRAM_START};
use crate::opcode::OpCode;
use crate::timer::{Timer, TimerState};

/// Depth of the call stack
pub const STACK_DEPTH: usize = 16;
/// Number of keys on the keypad
pub const KEY_COUNT: usize = 16;

const VF: usize = 0xF;

/// CHIP-8 machine: registers, memory, display, timers and keypad
///
/// `step` runs one instruction. `press` and `release` feed the keypad and
/// resolve a pending `FX0A`.
pub struct Kiwi8<C: Context + Sized> {
    ctx: C,
    config: Config,
    v: [u8; 16],
    i: u16,
    pc: u16,
    frame: Frame,
    memory: Memory,
    stack: Vec<u16, STACK_DEPTH>,
    delay_timer: Timer,
    sound_timer: Timer,
    keys: [bool; KEY_COUNT],
    pending_key: Option<u8>,
    cycles: u64,
    loaded: bool,
}

impl<C: Context + Sized> Kiwi8<C> {
    pub fn new(ctx: C) -> Self {
        Self::with_config(ctx, Config::default())
    }

    pub fn with_config(ctx: C, config: Config) -> Self {
        Self {
            ctx,
            config,
            v: [0; 16],
            i: 0,
            pc: PROGRAM_START,
            frame: Frame::new(),
            memory: Memory::new(),
            stack: Vec::new(),
            delay_timer: Timer::new(),
            sound_timer: Timer::new(),
            keys: [false; KEY_COUNT],
            pending_key: None,
            cycles: 0,
            loaded: false,
        }
    }

    /// Machine right after construction: nothing loaded, nothing executed
    pub fn is_initial(&self) -> bool {
        self.pc == PROGRAM_START && self.cycles == 0 && !self.loaded
    }

    /// Load program from slice of bytes to memory from 0x200 (_start address)
    pub fn load_program(&mut self, program: &[u8]) -> Result<()> {
        self.load_sized(program.len(), program)
    }

    /// Load a ROM image
    ///
    /// The size check uses the declared size of the ROM. When less data was
    /// read than declared the rest of program memory stays zero.
    #[cfg(feature = "std")]
    pub fn load(&mut self, rom: &crate::rom::Rom) -> Result<()> {
        self.load_sized(rom.size(), rom.data())?;
        debug!("loaded rom {:?}", rom.name());
        Ok(())
    }

    fn load_sized(&mut self, size: usize, data: &[u8]) -> Result<()> {
        if !self.is_initial() {
            return Err(Error::NotInInitialState);
        }
        if size > PROGRAM_CAPACITY {
            return Err(Error::ProgramTooLarge {
                excess: size - PROGRAM_CAPACITY,
            });
        }
        self.memory.load_program(data);
        self.loaded = true;
        debug!("loaded {} of {} program bytes at {:#05X}", data.len(), size, PROGRAM_START);
        Ok(())
    }

    /// Execute a single instruction
    ///
    /// Returns `WouldBlock` without touching any state while waiting for a
    /// key (`FX0A`). On error nothing is changed either.
    pub fn step(&mut self) -> nb::Result<(), Error> {
        if let Some(x) = self.pending_key {
            trace!("[{}] waiting for key into V{:X}", self.cycles, x);
            return Err(nb::Error::WouldBlock);
        }

        let pc = self.pc;
        let raw = self.memory.read_word(pc);
        let opcode = OpCode::try_from(raw).map_err(|err| {
            warn!("{:#05X}: {}", pc, err);
            err
        })?;
        trace!("[{}] {:#05X}: {:04X} {:?}", self.cycles, pc, raw, opcode);

        self.pc_increment();
        if let Err(err) = self.execute(opcode) {
            self.pc = pc;
            return Err(nb::Error::Other(err));
        }
        self.cycles += 1;

        if self.config.timer_mode == TimerMode::PerInstruction {
            self.tick_timers();
        }
        Ok(())
    }

    /// Decrement delay and sound timers by one if they are running
    pub fn tick_timers(&mut self) {
        if self.delay_timer.decrement() == TimerState::Finished {
            trace!("delay timer finished");
        }
        if self.sound_timer.decrement() == TimerState::Finished {
            debug!("sound off");
            self.ctx.sound_off();
        }
    }

    /// Key went down
    ///
    /// Resolves a pending `FX0A` by storing the key in its register.
    pub fn press(&mut self, key: u8) {
        if key as usize >= KEY_COUNT {
            warn!("ignoring press of unknown key {:#X}", key);
            return;
        }
        self.keys[key as usize] = true;
        if let Some(x) = self.pending_key.take() {
            self.v[x as usize] = key;
            debug!("key {:X} stored in V{:X}, resuming", key, x);
        }
    }

    /// Key went up, never resolves a pending `FX0A`
    pub fn release(&mut self, key: u8) {
        if key as usize >= KEY_COUNT {
            warn!("ignoring release of unknown key {:#X}", key);
            return;
        }
        self.keys[key as usize] = false;
    }

    fn pc_increment(&mut self) {
        self.pc = self.pc.wrapping_add(2) & ADDRESS_MASK;
    }

    /// Address of the instruction being executed, `pc` already points past it
    fn current_instruction(&self) -> u16 {
        self.pc.wrapping_sub(2) & ADDRESS_MASK
    }

    fn is_key_down(&self, x: u8) -> bool {
        self.keys[(self.v[x as usize] & 0x0F) as usize]
    }
}

// Accessors
impl<C: Context + Sized> Kiwi8<C> {
    pub fn ctx(&self) -> &C {
        &self.ctx
    }

    pub fn ctx_mut(&mut self) -> &mut C {
        &mut self.ctx
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registers(&self) -> &[u8; 16] {
        &self.v
    }

    /// Value of register `Vx`, `x` is taken modulo 16
    pub fn v(&self, x: u8) -> u8 {
        self.v[(x & 0x0F) as usize]
    }

    pub fn i(&self) -> u16 {
        self.i
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    /// Stack pointer, number of return addresses on the stack
    pub fn sp(&self) -> usize {
        self.stack.len()
    }

    pub fn stack(&self) -> &[u16] {
        &self.stack
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer.load()
    }

    /// Sound should be played while this is nonzero
    pub fn sound_timer(&self) -> u8 {
        self.sound_timer.load()
    }

    pub fn keys(&self) -> &[bool; KEY_COUNT] {
        &self.keys
    }

    pub fn is_key_pressed(&self, key: u8) -> bool {
        self.keys.get(key as usize).copied().unwrap_or(false)
    }

    /// Register waiting for a key press, if any
    pub fn pending_key(&self) -> Option<u8> {
        self.pending_key
    }

    pub fn is_waiting_for_key(&self) -> bool {
        self.pending_key.is_some()
    }

    /// Number of executed instructions
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn frame(&self) -> FrameView<'_> {
        self.frame.view()
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }
}

// OpCodes impls
impl<C: Context + Sized> Kiwi8<C> {
    #[rustfmt::skip]
    fn execute(&mut self, opcode: OpCode) -> Result<()> {
        match opcode {
            OpCode::_00E0             => self.clear_screen(),
            OpCode::_00EE             => self.subroutine_return(),
            OpCode::_1NNN { nnn }     => self.jump_to(nnn),
            OpCode::_2NNN { nnn }     => self.exec_subroutine_at(nnn),
            OpCode::_3XNN { x, nn }   => self.skip_if_vx_eq_nn(x, nn),
            OpCode::_4XNN { x, nn }   => self.skip_if_vx_ne_nn(x, nn),
            OpCode::_5XY0 { x, y }    => self.skip_if_vx_eq_vy(x, y),
            OpCode::_6XNN { x, nn }   => self.assign_vx_nn(x, nn),
            OpCode::_7XNN { x, nn }   => self.assign_add_vx_nn(x, nn),
            OpCode::_8XY0 { x, y }    => self.assign_vx_vy(x, y),
            OpCode::_8XY1 { x, y }    => self.assign_or_vx_vy(x, y),
            OpCode::_8XY2 { x, y }    => self.assign_and_vx_vy(x, y),
            OpCode::_8XY3 { x, y }    => self.assign_xor_vx_vy(x, y),
            OpCode::_8XY4 { x, y }    => self.assign_add_vx_vy(x, y),
            OpCode::_8XY5 { x, y }    => self.assign_sub_vx_vy(x, y),
            OpCode::_8XY6 { x, .. }   => self.assign_vx_shifted_r(x),
            OpCode::_8XY7 { x, y }    => self.assign_vx_vy_sub_vx(x, y),
            OpCode::_8XYE { x, .. }   => self.assign_vx_shifted_l(x),
            OpCode::_9XY0 { x, y }    => self.skip_if_vx_ne_vy(x, y),
            OpCode::_ANNN { nnn }     => self.assign_i_nnn(nnn),
            OpCode::_BNNN { nnn }     => self.jump_to_nnn_add_v0(nnn),
            OpCode::_CXNN { x, nn }   => self.assign_vx_random_and_nn(x, nn),
            OpCode::_DXYN { x, y, n } => self.draw_n_at_vx_vy(x, y, n),
            OpCode::_EX9E { x }       => self.skip_if_vx_in_keys(x),
            OpCode::_EXA1 { x }       => self.skip_if_vx_not_in_keys(x),
            OpCode::_FX07 { x }       => self.assign_vx_delay_t(x),
            OpCode::_FX0A { x }       => self.assign_vx_wait_for_key(x),
            OpCode::_FX15 { x }       => self.assign_delay_t_vx(x),
            OpCode::_FX18 { x }       => self.assign_sound_t_vx(x),
            OpCode::_FX1E { x }       => self.assign_add_i_vx(x),
            OpCode::_FX29 { x }       => self.assign_i_addr_of_sprite_vx(x),
            OpCode::_FX33 { x }       => self.assign_mem_at_i_bcd_of_vx(x),
            OpCode::_FX55 { x }       => self.assign_mem_at_i_v0_to_vx(x),
            OpCode::_FX65 { x }       => self.assign_v0_to_vx_mem_at_i(x),
        }
    }

    fn skip_if(&mut self, condition: bool) -> Result<()> {
        if condition {
            self.pc_increment();
        }
        Ok(())
    }

    fn clear_screen(&mut self) -> Result<()> {
        self.frame.clear();
        Ok(())
    }

    fn subroutine_return(&mut self) -> Result<()> {
        let pc = self.current_instruction();
        self.stack
            .pop()
            .ok_or(Error::StackUnderflow { pc })
            .map(|addr| self.pc = addr)
    }

    fn jump_to(&mut self, nnn: u16) -> Result<()> {
        self.pc = nnn;
        Ok(())
    }

    /// Push the return address, fails on a full stack
    fn exec_subroutine_at(&mut self, nnn: u16) -> Result<()> {
        let pc = self.current_instruction();
        self.stack
            .push(self.pc)
            .map_err(|_| Error::StackOverflow { pc })
            .map(|_| self.pc = nnn)
    }

    fn skip_if_vx_eq_nn(&mut self, x: u8, nn: u8) -> Result<()> {
        self.skip_if(self.v[x as usize] == nn)
    }

    fn skip_if_vx_ne_nn(&mut self, x: u8, nn: u8) -> Result<()> {
        self.skip_if(self.v[x as usize] != nn)
    }

    fn skip_if_vx_eq_vy(&mut self, x: u8, y: u8) -> Result<()> {
        self.skip_if(self.v[x as usize] == self.v[y as usize])
    }

    fn assign_vx_nn(&mut self, x: u8, nn: u8) -> Result<()> {
        self.v[x as usize] = nn;
        Ok(())
    }

    /// No carry flag
    fn assign_add_vx_nn(&mut self, x: u8, nn: u8) -> Result<()> {
        self.v[x as usize] = self.v[x as usize].wrapping_add(nn);
        Ok(())
    }

    fn assign_vx_vy(&mut self, x: u8, y: u8) -> Result<()> {
        self.v[x as usize] = self.v[y as usize];
        Ok(())
    }

    fn assign_or_vx_vy(&mut self, x: u8, y: u8) -> Result<()> {
        self.v[x as usize] |= self.v[y as usize];
        Ok(())
    }

    fn assign_and_vx_vy(&mut self, x: u8, y: u8) -> Result<()> {
        self.v[x as usize] &= self.v[y as usize];
        Ok(())
    }

    fn assign_xor_vx_vy(&mut self, x: u8, y: u8) -> Result<()> {
        self.v[x as usize] ^= self.v[y as usize];
        Ok(())
    }

    // In the ALU ops below VF is written before VX, so with X = F the result
    // overwrites the flag.

    fn assign_add_vx_vy(&mut self, x: u8, y: u8) -> Result<()> {
        let (value, carry) = self.v[x as usize].overflowing_add(self.v[y as usize]);
        self.v[VF] = carry as u8;
        self.v[x as usize] = value;
        Ok(())
    }

    /// VF = 1 unless VY > VX
    fn assign_sub_vx_vy(&mut self, x: u8, y: u8) -> Result<()> {
        let (value, borrow) = self.v[x as usize].overflowing_sub(self.v[y as usize]);
        self.v[VF] = !borrow as u8;
        self.v[x as usize] = value;
        Ok(())
    }

    fn assign_vx_shifted_r(&mut self, x: u8) -> Result<()> {
        let value = self.v[x as usize];
        self.v[VF] = value & 1u8;
        self.v[x as usize] = value >> 1;
        Ok(())
    }

    /// VF = 1 unless VX > VY
    fn assign_vx_vy_sub_vx(&mut self, x: u8, y: u8) -> Result<()> {
        let (value, borrow) = self.v[y as usize].overflowing_sub(self.v[x as usize]);
        self.v[VF] = !borrow as u8;
        self.v[x as usize] = value;
        Ok(())
    }

    fn assign_vx_shifted_l(&mut self, x: u8) -> Result<()> {
        let value = self.v[x as usize];
        self.v[VF] = value >> 7;
        self.v[x as usize] = value << 1;
        Ok(())
    }

    fn skip_if_vx_ne_vy(&mut self, x: u8, y: u8) -> Result<()> {
        self.skip_if(self.v[x as usize] != self.v[y as usize])
    }

    fn assign_i_nnn(&mut self, nnn: u16) -> Result<()> {
        self.i = nnn;
        Ok(())
    }

    fn jump_to_nnn_add_v0(&mut self, nnn: u16) -> Result<()> {
        self.pc = (nnn + self.v[0] as u16) & ADDRESS_MASK;
        Ok(())
    }

    fn assign_vx_random_and_nn(&mut self, x: u8, nn: u8) -> Result<()> {
        self.v[x as usize] = self.ctx.gen_random() & nn;
        Ok(())
    }

    /// Sprite rows come from I onwards, wrapping at the end of memory.
    /// Pixels falling outside of the screen are dropped.
    fn draw_n_at_vx_vy(&mut self, x: u8, y: u8, n: u8) -> Result<()> {
        let vx = self.v[x as usize] as usize;
        let vy = self.v[y as usize] as usize;
        let mut collision = false;
        for row in 0..n {
            let sprite = self.memory.read(self.i.wrapping_add(row as u16));
            for col in 0..8 {
                let bit = sprite & (0x80 >> col) != 0;
                if let Some(true) = self.frame.xor_pixel(vx + col, vy + row as usize, bit) {
                    collision = true;
                }
            }
        }
        self.v[VF] = collision as u8;
        Ok(())
    }

    fn skip_if_vx_in_keys(&mut self, x: u8) -> Result<()> {
        self.skip_if(self.is_key_down(x))
    }

    /// Skips on a pressed key unless `Quirks::exa1_skips_when_pressed` is off
    fn skip_if_vx_not_in_keys(&mut self, x: u8) -> Result<()> {
        let down = self.is_key_down(x);
        if self.config.quirks.exa1_skips_when_pressed {
            self.skip_if(down)
        } else {
            self.skip_if(!down)
        }
    }

    fn assign_vx_delay_t(&mut self, x: u8) -> Result<()> {
        self.v[x as usize] = self.delay_timer.load();
        Ok(())
    }

    /// Only marks the register, `step` blocks until `press` fills it
    fn assign_vx_wait_for_key(&mut self, x: u8) -> Result<()> {
        debug!("waiting for key into V{:X}", x);
        self.pending_key = Some(x);
        Ok(())
    }

    fn assign_delay_t_vx(&mut self, x: u8) -> Result<()> {
        self.delay_timer.store(self.v[x as usize]);
        Ok(())
    }

    /// Notifies the context when sound starts or stops
    fn assign_sound_t_vx(&mut self, x: u8) -> Result<()> {
        let was_on = self.sound_timer.load() > 0;
        let value = self.v[x as usize];
        self.sound_timer.store(value);
        match (was_on, value > 0) {
            (false, true) => {
                debug!("sound on for {} ticks", value);
                self.ctx.sound_on();
            }
            (true, false) => {
                debug!("sound off");
                self.ctx.sound_off();
            }
            _ => {}
        }
        Ok(())
    }

    fn assign_add_i_vx(&mut self, x: u8) -> Result<()> {
        self.i = self.i.wrapping_add(self.v[x as usize] as u16);
        Ok(())
    }

    fn assign_i_addr_of_sprite_vx(&mut self, x: u8) -> Result<()> {
        self.i = memory::glyph_addr(self.v[x as usize]);
        Ok(())
    }

    fn assign_mem_at_i_bcd_of_vx(&mut self, x: u8) -> Result<()> {
        let value = self.v[x as usize];
        self.memory.write(self.i, value / 100u8);
        self.memory.write(self.i.wrapping_add(1), (value % 100) / 10u8);
        self.memory.write(self.i.wrapping_add(2), value % 10u8);
        Ok(())
    }

    /// I is left unchanged
    fn assign_mem_at_i_v0_to_vx(&mut self, x: u8) -> Result<()> {
        for idx in 0..=x {
            self.memory
                .write(self.i.wrapping_add(idx as u16), self.v[idx as usize]);
        }
        Ok(())
    }

    fn assign_v0_to_vx_mem_at_i(&mut self, x: u8) -> Result<()> {
        for idx in 0..=x {
            self.v[idx as usize] = self.memory.read(self.i.wrapping_add(idx as u16));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::TestingContext;

    fn loaded(program: &[u8]) -> Kiwi8<TestingContext> {
        let mut chip = Kiwi8::new(TestingContext::new(0));
        chip.load_program(program).unwrap();
        chip
    }

    #[test]
    fn pc_incrementation() {
        let mut chip = Kiwi8::new(TestingContext::new(0));
        assert_eq!(chip.pc, 0x0200u16);
        chip.pc_increment();
        assert_eq!(chip.pc, 0x0202u16);
        chip.pc = 0x0FFEu16;
        chip.pc_increment();
        assert_eq!(chip.pc, 0x0000u16);
    }

    #[test]
    fn step_executes_and_advances() {
        let mut chip = loaded(&[0x60, 0x05, 0x61, 0x07]);
        chip.step().unwrap();
        assert_eq!(chip.v(0), 0x05);
        assert_eq!(chip.pc(), 0x202);
        assert_eq!(chip.cycles(), 1);
        chip.step().unwrap();
        assert_eq!(chip.v(1), 0x07);
        assert_eq!(chip.pc(), 0x204);
        assert_eq!(chip.cycles(), 2);
    }

    #[test]
    fn step_wraps_pc_at_end_of_memory() {
        let mut chip = Kiwi8::new(TestingContext::new(0));
        chip.memory.write(0xFFE, 0x60);
        chip.memory.write(0xFFF, 0x2A);
        chip.pc = 0xFFE;
        chip.step().unwrap();
        assert_eq!(chip.v(0), 0x2A);
        assert_eq!(chip.pc(), 0x000);
    }

    #[test]
    fn load_at_capacity() {
        let mut chip = Kiwi8::new(TestingContext::new(0));
        let program = [0xABu8; PROGRAM_CAPACITY];
        assert_eq!(chip.load_program(&program), Ok(()));
        assert_eq!(chip.memory().read(0xFFF), 0xAB);
        assert_eq!(chip.memory().read(0x1FF), 0x00);
    }

    #[test]
    fn load_over_capacity() {
        let mut chip = Kiwi8::new(TestingContext::new(0));
        let program = [0xABu8; PROGRAM_CAPACITY + 1];
        assert_eq!(
            chip.load_program(&program),
            Err(Error::ProgramTooLarge { excess: 1 }),
        );
        assert!(chip.is_initial());
        assert_eq!(chip.memory().read(0x200), 0x00);
    }

    #[test]
    fn load_requires_initial_state() {
        let mut chip = loaded(&[0x12, 0x00]);
        assert_eq!(chip.load_program(&[0x00]), Err(Error::NotInInitialState));

        let mut chip = Kiwi8::new(TestingContext::new(0));
        chip.memory.write(0x200, 0x12);
        chip.step().unwrap();
        assert_eq!(chip.pc(), 0x200);
        assert_eq!(chip.load_program(&[0x12, 0x00]), Err(Error::NotInInitialState));
    }

    #[cfg(feature = "std")]
    #[test]
    fn load_rom_checks_declared_size() {
        use crate::rom::Rom;

        let rom = Rom::from_reader("short", PROGRAM_CAPACITY + 2, &[0x60u8, 0x01][..]).unwrap();
        let mut chip = Kiwi8::new(TestingContext::new(0));
        assert_eq!(chip.load(&rom), Err(Error::ProgramTooLarge { excess: 2 }));

        let rom = Rom::new("ok", [0x60u8, 0x01]);
        assert_eq!(chip.load(&rom), Ok(()));
        chip.step().unwrap();
        assert_eq!(chip.v(0), 0x01);
    }

    #[test]
    fn unknown_opcode_changes_nothing() {
        let mut chip = loaded(&[0x60, 0x01, 0x01, 0x23]);
        chip.step().unwrap();
        let registers = *chip.registers();

        assert_eq!(chip.step(), Err(nb::Error::Other(Error::UnknownOpcode(0x0123))));
        assert_eq!(chip.pc(), 0x202);
        assert_eq!(chip.cycles(), 1);
        assert_eq!(chip.registers(), &registers);
    }

    #[test]
    fn execute_00e0_clear_screen() {
        let mut chip = Kiwi8::new(TestingContext::new(0));
        chip.execute(OpCode::_DXYN { x: 0, y: 0, n: 5 }).unwrap();
        assert!(chip.frame().lit_count() > 0);

        chip.execute(OpCode::_00E0).unwrap();
        assert_eq!(chip.frame().lit_count(), 0);
    }

    #[test]
    fn execute_00ee_subroutine_return() {
        let mut chip = Kiwi8::new(TestingContext::new(0));
        let opcode = OpCode::_00EE;
        let jumps = [0x260u16, 0x7F1u16, 0xFA2u16, 0x000u16];
        jumps
            .iter()
            .map(|&addr| OpCode::_2NNN { nnn: addr })
            .for_each(|op| chip.execute(op).unwrap());
        assert_eq!(chip.pc, 0x000u16);
        assert_eq!(chip.sp(), 4);

        for &addr in jumps.iter().rev().skip(1) {
            chip.execute(opcode).unwrap();
            assert_eq!(chip.pc, addr);
        }
        chip.execute(opcode).unwrap();
        assert_eq!(chip.pc, 0x200u16);
        assert_eq!(chip.sp(), 0);
    }

    #[test]
    fn stack_underflow_changes_nothing() {
        let mut chip = loaded(&[0x00, 0xEE]);
        assert_eq!(
            chip.step(),
            Err(nb::Error::Other(Error::StackUnderflow { pc: 0x200 })),
        );
        assert_eq!(chip.pc(), 0x200);
        assert_eq!(chip.cycles(), 0);
    }

    #[test]
    fn execute_1nnn_jump_to() {
        let mut chip = Kiwi8::new(TestingContext::new(0));
        for &addr in [0x220u16, 0xFFFu16, 0x000u16].iter() {
            chip.execute(OpCode::_1NNN { nnn: addr }).unwrap();
            assert_eq!(chip.pc, addr);
        }
    }

    #[test]
    fn execute_2nnn_exec_subroutine_at() {
        let mut chip = loaded(&[0x22, 0x22]);
        chip.memory.write(0x222, 0x00);
        chip.memory.write(0x223, 0xEE);

        chip.step().unwrap();
        assert_eq!(chip.pc(), 0x222);
        assert_eq!(chip.stack(), &[0x202]);

        chip.step().unwrap();
        assert_eq!(chip.pc(), 0x202);
        assert!(chip.stack().is_empty());
    }

    #[test]
    fn stack_overflow_changes_nothing() {
        // calls itself forever
        let mut chip = loaded(&[0x22, 0x00]);
        for _ in 0..STACK_DEPTH {
            chip.step().unwrap();
        }
        assert_eq!(chip.sp(), STACK_DEPTH);

        assert_eq!(
            chip.step(),
            Err(nb::Error::Other(Error::StackOverflow { pc: 0x200 })),
        );
        assert_eq!(chip.sp(), STACK_DEPTH);
        assert_eq!(chip.pc(), 0x200);
        assert_eq!(chip.cycles(), STACK_DEPTH as u64);
    }

    #[test]
    fn execute_3xnn_skip_if_vx_eq_nn() {
        let mut chip = Kiwi8::new(TestingContext::new(0));
        let pc = chip.pc;
        let opcode = OpCode::_3XNN { x: 0, nn: 0x22u8 };
        chip.execute(opcode).unwrap();
        assert_eq!(chip.pc, pc);

        chip.v[0] = 0x22;
        chip.execute(opcode).unwrap();
        assert_eq!(chip.pc, pc + 2);
    }

    #[test]
    fn execute_4xnn_skip_if_vx_ne_nn() {
        let mut chip = Kiwi8::new(TestingContext::new(0));
        let pc = chip.pc;
        let opcode = OpCode::_4XNN { x: 0, nn: 0x22u8 };
        chip.execute(opcode).unwrap();
        assert_eq!(chip.pc, pc + 2);

        chip.v[0] = 0x22;
        chip.execute(opcode).unwrap();
        assert_eq!(chip.pc, pc + 2);
    }

    #[test]
    fn execute_5xy0_skip_if_vx_eq_vy() {
        let mut chip = Kiwi8::new(TestingContext::new(0));
        let pc = chip.pc;
        let opcode = OpCode::_5XY0 { x: 0, y: 1 };
        chip.execute(opcode).unwrap();
        assert_eq!(chip.pc, pc + 2);

        chip.v[1] = 0x01;
        chip.execute(opcode).unwrap();
        assert_eq!(chip.pc, pc + 2);
    }

    #[test]
    fn skip_over_last_word_wraps() {
        let mut chip = Kiwi8::new(TestingContext::new(0));
        chip.memory.write(0xFFE, 0x30);
        chip.memory.write(0xFFF, 0x00);
        chip.pc = 0xFFE;
        chip.step().unwrap();
        assert_eq!(chip.pc(), 0x002);
    }

    #[test]
    fn execute_6xnn_assign_vx_nn() {
        let mut chip = Kiwi8::new(TestingContext::new(0));
        chip.execute(OpCode::_6XNN { x: 0xA, nn: 0x5A }).unwrap();
        assert_eq!(chip.v(0xA), 0x5A);
    }

    #[test]
    fn execute_7xnn_assign_add_vx_nn() {
        let mut chip = Kiwi8::new(TestingContext::new(0));
        chip.v[VF] = 0x07;
        chip.v[3] = 0xFF;
        chip.execute(OpCode::_7XNN { x: 3, nn: 0x02 }).unwrap();
        assert_eq!(chip.v(3), 0x01);
        assert_eq!(chip.v(0xF), 0x07);
    }

    #[test]
    fn execute_8xy0_to_8xy3_logic() {
        let mut chip = Kiwi8::new(TestingContext::new(0));
        chip.v[1] = 0b1100;
        chip.v[2] = 0b1010;

        chip.execute(OpCode::_8XY1 { x: 1, y: 2 }).unwrap();
        assert_eq!(chip.v(1), 0b1110);

        chip.v[1] = 0b1100;
        chip.execute(OpCode::_8XY2 { x: 1, y: 2 }).unwrap();
        assert_eq!(chip.v(1), 0b1000);

        chip.v[1] = 0b1100;
        chip.execute(OpCode::_8XY3 { x: 1, y: 2 }).unwrap();
        assert_eq!(chip.v(1), 0b0110);

        chip.execute(OpCode::_8XY0 { x: 1, y: 2 }).unwrap();
        assert_eq!(chip.v(1), 0b1010);
        assert_eq!(chip.v(2), 0b1010);
    }

    #[test]
    fn execute_8xy4_assign_add_vx_vy() {
        let mut chip = Kiwi8::new(TestingContext::new(0));
        chip.v[1] = 0xFF;
        chip.v[2] = 0x01;
        chip.execute(OpCode::_8XY4 { x: 1, y: 2 }).unwrap();
        assert_eq!(chip.v(1), 0x00);
        assert_eq!(chip.v(0xF), 0x01);

        for _ in 0..256 {
            let (a, b) = (rand::random::<u8>(), rand::random::<u8>());
            chip.v[1] = a;
            chip.v[2] = b;
            chip.execute(OpCode::_8XY4 { x: 1, y: 2 }).unwrap();
            let sum = a as u16 + b as u16;
            assert_eq!(chip.v(1), (sum & 0xFF) as u8);
            assert_eq!(chip.v(0xF), (sum > 0xFF) as u8);
        }
    }

    #[test]
    fn execute_8xy5_assign_sub_vx_vy() {
        let mut chip = Kiwi8::new(TestingContext::new(0));
        chip.v[1] = 0x05;
        chip.v[2] = 0x0A;
        chip.execute(OpCode::_8XY5 { x: 1, y: 2 }).unwrap();
        assert_eq!(chip.v(1), 0xFB);
        assert_eq!(chip.v(0xF), 0x00);

        chip.v[1] = 0x0A;
        chip.v[2] = 0x0A;
        chip.execute(OpCode::_8XY5 { x: 1, y: 2 }).unwrap();
        assert_eq!(chip.v(1), 0x00);
        assert_eq!(chip.v(0xF), 0x01);
    }

    #[test]
    fn execute_8xy7_assign_vx_vy_sub_vx() {
        let mut chip = Kiwi8::new(TestingContext::new(0));
        chip.v[1] = 0x05;
        chip.v[2] = 0x0A;
        chip.execute(OpCode::_8XY7 { x: 1, y: 2 }).unwrap();
        assert_eq!(chip.v(1), 0x05);
        assert_eq!(chip.v(0xF), 0x01);

        chip.v[1] = 0x0B;
        chip.execute(OpCode::_8XY7 { x: 1, y: 2 }).unwrap();
        assert_eq!(chip.v(1), 0xFF);
        assert_eq!(chip.v(0xF), 0x00);
    }

    #[test]
    fn execute_8xy6_8xye_shifts_vx() {
        let mut chip = Kiwi8::new(TestingContext::new(0));
        chip.v[1] = 0x81;
        chip.v[2] = 0x00;
        chip.execute(OpCode::_8XY6 { x: 1, y: 2 }).unwrap();
        assert_eq!(chip.v(1), 0x40);
        assert_eq!(chip.v(0xF), 0x01);

        chip.execute(OpCode::_8XY6 { x: 1, y: 2 }).unwrap();
        assert_eq!(chip.v(1), 0x20);
        assert_eq!(chip.v(0xF), 0x00);

        chip.v[1] = 0x81;
        chip.execute(OpCode::_8XYE { x: 1, y: 2 }).unwrap();
        assert_eq!(chip.v(1), 0x02);
        assert_eq!(chip.v(0xF), 0x01);

        chip.execute(OpCode::_8XYE { x: 1, y: 2 }).unwrap();
        assert_eq!(chip.v(1), 0x04);
        assert_eq!(chip.v(0xF), 0x00);
    }

    #[test]
    fn result_overwrites_flag_when_vf_is_target() {
        let mut chip = Kiwi8::new(TestingContext::new(0));
        chip.v[VF] = 0xFF;
        chip.v[1] = 0x01;
        chip.execute(OpCode::_8XY4 { x: 0xF, y: 1 }).unwrap();
        assert_eq!(chip.v(0xF), 0x00);

        chip.v[VF] = 0x03;
        chip.execute(OpCode::_8XY6 { x: 0xF, y: 0 }).unwrap();
        assert_eq!(chip.v(0xF), 0x01);
    }

    #[test]
    fn execute_9xy0_skip_if_vx_ne_vy() {
        let mut chip = Kiwi8::new(TestingContext::new(0));
        let pc = chip.pc;
        let opcode = OpCode::_9XY0 { x: 0, y: 1 };
        chip.execute(opcode).unwrap();
        assert_eq!(chip.pc, pc);

        chip.v[1] = 0x01;
        chip.execute(opcode).unwrap();
        assert_eq!(chip.pc, pc + 2);
    }

    #[test]
    fn execute_annn_assign_i_nnn() {
        let mut chip = Kiwi8::new(TestingContext::new(0));
        chip.execute(OpCode::_ANNN { nnn: 0x0ABC }).unwrap();
        assert_eq!(chip.i(), 0x0ABC);
    }

    #[test]
    fn execute_bnnn_jump_to_nnn_add_v0() {
        let mut chip = Kiwi8::new(TestingContext::new(0));
        chip.v[0] = 0x10;
        chip.execute(OpCode::_BNNN { nnn: 0x123 }).unwrap();
        assert_eq!(chip.pc, 0x133);

        chip.v[0] = 0xFF;
        chip.execute(OpCode::_BNNN { nnn: 0xFFF }).unwrap();
        assert_eq!(chip.pc, 0x0FE);
    }

    #[test]
    fn execute_cxnn_assign_vx_random_and_nn() {
        let mut reference = TestingContext::new(7);
        let mut chip = Kiwi8::new(TestingContext::new(7));
        for _ in 0..32 {
            chip.execute(OpCode::_CXNN { x: 4, nn: 0x0F }).unwrap();
            assert_eq!(chip.v(4), reference.gen_random() & 0x0F);
        }

        chip.execute(OpCode::_CXNN { x: 4, nn: 0x00 }).unwrap();
        assert_eq!(chip.v(4), 0x00);
    }

    #[test]
    fn execute_dxyn_draw_n_at_vx_vy() {
        use crate::utils::testing::ToMask;

        let mut chip = Kiwi8::new(TestingContext::new(0));
        chip.v[0] = 2;
        chip.v[1] = 1;
        chip.i = memory::glyph_addr(0);
        let opcode = OpCode::_DXYN { x: 0, y: 1, n: 5 };

        chip.execute(opcode).unwrap();
        let expected = "
            ......
            ..####
            ..#..#
            ..#..#
            ..#..#
            ..####
        ";
        assert_eq!(chip.frame().to_mask(), expected.to_mask());
        assert_eq!(chip.v(0xF), 0x00);

        chip.execute(opcode).unwrap();
        assert_eq!(chip.frame().lit_count(), 0);
        assert_eq!(chip.v(0xF), 0x01);
    }

    #[test]
    fn execute_dxyn_partial_collision() {
        let mut chip = Kiwi8::new(TestingContext::new(0));
        chip.i = memory::glyph_addr(1);
        chip.execute(OpCode::_DXYN { x: 0, y: 0, n: 1 }).unwrap();
        assert_eq!(chip.v(0xF), 0x00);

        // glyph 1 starts with 0x20, glyph 0 with 0xF0: bit 0x20 collides
        chip.i = memory::glyph_addr(0);
        chip.execute(OpCode::_DXYN { x: 0, y: 0, n: 1 }).unwrap();
        assert_eq!(chip.v(0xF), 0x01);
        assert_eq!(chip.frame().get_pixel(2, 0), Some(false));
        assert_eq!(chip.frame().get_pixel(0, 0), Some(true));
        assert_eq!(chip.frame().lit_count(), 3);
    }

    #[test]
    fn execute_dxyn_clips_at_edges() {
        use crate::utils::testing::{ImageMask, ToMask};

        let mut chip = Kiwi8::new(TestingContext::new(0));
        chip.v[0] = 62;
        chip.v[1] = 30;
        chip.i = memory::glyph_addr(0);
        chip.execute(OpCode::_DXYN { x: 0, y: 1, n: 5 }).unwrap();

        let mut expected = "## #.".to_mask();
        expected.offset(62, 30);
        crate::assert_eq_2d!(x_range: 56..64, y_range: 24..32; chip.frame().to_mask(), expected);
        crate::assert_eq_2d!(x_range: 0..8, y_range: 0..8; chip.frame().to_mask(), ImageMask::new());
        assert_eq!(chip.frame().lit_count(), 3);

        chip.v[0] = 64;
        chip.v[1] = 0;
        chip.execute(OpCode::_DXYN { x: 0, y: 1, n: 5 }).unwrap();
        assert_eq!(chip.frame().lit_count(), 3);
        assert_eq!(chip.v(0xF), 0x00);
    }

    #[test]
    fn execute_dxyn_sprite_address_wraps() {
        let mut chip = Kiwi8::new(TestingContext::new(0));
        chip.memory.write(0xFFF, 0x80);
        chip.i = 0xFFF;
        // second row comes from 0x000, the top of glyph 0
        chip.execute(OpCode::_DXYN { x: 0, y: 0, n: 2 }).unwrap();
        assert_eq!(chip.frame().get_pixel(0, 0), Some(true));
        assert_eq!(chip.frame().get_pixel(1, 0), Some(false));
        assert_eq!(chip.frame().lit_count(), 5);
    }

    #[test]
    fn execute_ex9e_skip_if_vx_in_keys() {
        let mut chip = Kiwi8::new(TestingContext::new(0));
        let pc = chip.pc;
        chip.v[2] = 0x1B;
        let opcode = OpCode::_EX9E { x: 2 };

        chip.execute(opcode).unwrap();
        assert_eq!(chip.pc, pc);

        // only the low nibble of VX selects the key
        chip.press(0xB);
        chip.execute(opcode).unwrap();
        assert_eq!(chip.pc, pc + 2);
    }

    #[test]
    fn execute_exa1_skips_when_pressed() {
        let mut chip = Kiwi8::new(TestingContext::new(0));
        let pc = chip.pc;
        chip.v[2] = 0x5;
        let opcode = OpCode::_EXA1 { x: 2 };

        chip.execute(opcode).unwrap();
        assert_eq!(chip.pc, pc);

        chip.press(0x5);
        chip.execute(opcode).unwrap();
        assert_eq!(chip.pc, pc + 2);
    }

    #[test]
    fn execute_exa1_skips_when_not_pressed_without_quirk() {
        use crate::config::Quirks;

        let config = Config::default().with_quirks(Quirks {
            exa1_skips_when_pressed: false,
        });
        let mut chip = Kiwi8::with_config(TestingContext::new(0), config);
        let pc = chip.pc;
        chip.v[2] = 0x5;
        let opcode = OpCode::_EXA1 { x: 2 };

        chip.execute(opcode).unwrap();
        assert_eq!(chip.pc, pc + 2);

        chip.press(0x5);
        chip.execute(opcode).unwrap();
        assert_eq!(chip.pc, pc + 2);
    }

    /// Delay timer round trip through FX15 and FX07
    #[test]
    fn execute_fx15_fx07_delay_timer() {
        let mut chip = Kiwi8::new(TestingContext::new(0));
        chip.v[3] = 0x20;
        chip.execute(OpCode::_FX15 { x: 3 }).unwrap();
        assert_eq!(chip.delay_timer(), 0x20);

        chip.tick_timers();
        chip.execute(OpCode::_FX07 { x: 4 }).unwrap();
        assert_eq!(chip.v(4), 0x1F);
    }

    #[test]
    fn timers_tick_once_per_instruction() {
        // V0 = 3, DT = V0, then three more instructions
        let mut chip = loaded(&[0x60, 0x03, 0xF0, 0x15, 0x61, 0x00, 0x61, 0x00, 0x61, 0x00]);
        chip.step().unwrap();
        chip.step().unwrap();
        // FX15 counts as the first tick
        assert_eq!(chip.delay_timer(), 0x02);
        chip.step().unwrap();
        chip.step().unwrap();
        assert_eq!(chip.delay_timer(), 0x00);
        chip.step().unwrap();
        assert_eq!(chip.delay_timer(), 0x00);
    }

    #[test]
    fn fixed_timer_mode_leaves_ticking_to_caller() {
        let config = Config::default().with_timer_mode(TimerMode::Fixed60Hz);
        let mut chip = Kiwi8::with_config(TestingContext::new(0), config);
        chip.load_program(&[0x60, 0x03, 0xF0, 0x15, 0x61, 0x00]).unwrap();
        chip.step().unwrap();
        chip.step().unwrap();
        chip.step().unwrap();
        assert_eq!(chip.delay_timer(), 0x03);

        chip.tick_timers();
        assert_eq!(chip.delay_timer(), 0x02);
    }

    #[test]
    fn execute_fx0a_assign_vx_wait_for_key() {
        let mut chip = loaded(&[0xF5, 0x0A, 0x61, 0x01]);
        chip.press(0x3);
        chip.step().unwrap();
        assert!(chip.is_waiting_for_key());
        assert_eq!(chip.pending_key(), Some(5));
        assert_eq!(chip.pc(), 0x202);

        // an already held key does not count, only a new press
        for _ in 0..10 {
            assert_eq!(chip.step(), Err(nb::Error::WouldBlock));
        }
        assert_eq!(chip.pc(), 0x202);
        assert_eq!(chip.cycles(), 1);
        assert_eq!(chip.v(1), 0x00);

        chip.release(0x3);
        assert!(chip.is_waiting_for_key());
        assert_eq!(chip.step(), Err(nb::Error::WouldBlock));

        chip.press(0xC);
        assert!(!chip.is_waiting_for_key());
        assert_eq!(chip.v(5), 0x0C);

        chip.step().unwrap();
        assert_eq!(chip.v(1), 0x01);
        assert_eq!(chip.pc(), 0x204);
    }

    #[test]
    fn waiting_for_key_freezes_timers() {
        let mut chip = loaded(&[0x60, 0x09, 0xF0, 0x15, 0xF1, 0x0A]);
        chip.step().unwrap();
        chip.step().unwrap();
        chip.step().unwrap();
        let delay = chip.delay_timer();
        assert_eq!(chip.step(), Err(nb::Error::WouldBlock));
        assert_eq!(chip.step(), Err(nb::Error::WouldBlock));
        assert_eq!(chip.delay_timer(), delay);
    }

    #[test]
    fn press_and_release_unknown_keys_are_ignored() {
        let mut chip = loaded(&[0xF0, 0x0A]);
        chip.step().unwrap();

        chip.press(0x10);
        chip.press(0xFF);
        chip.release(0x10);
        assert!(chip.is_waiting_for_key());
        assert_eq!(chip.keys(), &[false; KEY_COUNT]);
        assert!(!chip.is_key_pressed(0x10));
    }

    #[test]
    fn release_clears_key_state() {
        let mut chip = Kiwi8::new(TestingContext::new(0));
        chip.press(0xA);
        assert!(chip.is_key_pressed(0xA));
        chip.release(0xA);
        assert!(!chip.is_key_pressed(0xA));
    }

    #[test]
    fn execute_fx18_assign_sound_t_vx() {
        let mut chip = Kiwi8::new(TestingContext::new(0));
        chip.v[0] = 0x02;
        chip.execute(OpCode::_FX18 { x: 0 }).unwrap();
        assert_eq!(chip.sound_timer(), 0x02);
        assert!(chip.ctx().is_sound_on());

        // reloading a running timer is not a transition
        chip.execute(OpCode::_FX18 { x: 0 }).unwrap();
        assert_eq!(chip.ctx().sound_switches(), 1);

        chip.tick_timers();
        assert!(chip.ctx().is_sound_on());
        chip.tick_timers();
        assert!(!chip.ctx().is_sound_on());
        assert_eq!(chip.ctx().sound_switches(), 2);

        chip.execute(OpCode::_FX18 { x: 0 }).unwrap();
        chip.v[1] = 0x00;
        chip.execute(OpCode::_FX18 { x: 1 }).unwrap();
        assert!(!chip.ctx().is_sound_on());
        assert_eq!(chip.ctx().sound_switches(), 4);
    }

    #[test]
    fn execute_fx1e_assign_add_i_vx() {
        let mut chip = Kiwi8::new(TestingContext::new(0));
        chip.v[0] = 0xFF;
        chip.v[VF] = 0x07;
        chip.i = 0x0F01;
        chip.execute(OpCode::_FX1E { x: 0 }).unwrap();
        assert_eq!(chip.i(), 0x1000);
        assert_eq!(chip.v(0xF), 0x07);

        chip.i = 0xFFFF;
        chip.v[0] = 0x02;
        chip.execute(OpCode::_FX1E { x: 0 }).unwrap();
        assert_eq!(chip.i(), 0x0001);
    }

    #[test]
    fn execute_fx29_assign_i_addr_of_sprite_vx() {
        let mut chip = Kiwi8::new(TestingContext::new(0));
        for digit in 0..16u8 {
            chip.v[6] = digit;
            chip.execute(OpCode::_FX29 { x: 6 }).unwrap();
            assert_eq!(chip.i(), digit as u16 * 5);
        }
        // Vx * 5 is a byte product
        chip.v[6] = 0x40;
        chip.execute(OpCode::_FX29 { x: 6 }).unwrap();
        assert_eq!(chip.i(), 0x040);
        chip.v[6] = 0xFF;
        chip.execute(OpCode::_FX29 { x: 6 }).unwrap();
        assert_eq!(chip.i(), 0x0FB);
    }

    #[test]
    fn execute_fx33_assign_mem_at_i_bcd_of_vx() {
        let mut chip = Kiwi8::new(TestingContext::new(0));
        chip.i = 0x300;
        let opcode = OpCode::_FX33 { x: 0 };

        chip.execute(opcode).unwrap();
        assert_eq!(&chip.memory().as_raw()[0x300..0x303], &[0, 0, 0]);

        chip.v[0] = 0xFF;
        chip.execute(opcode).unwrap();
        assert_eq!(&chip.memory().as_raw()[0x300..0x303], &[2, 5, 5]);

        chip.v[0] = 107;
        chip.execute(opcode).unwrap();
        assert_eq!(&chip.memory().as_raw()[0x300..0x303], &[1, 0, 7]);
        assert_eq!(chip.i(), 0x300);
    }

    #[test]
    fn execute_fx55_assign_mem_at_i_v0_to_vx() {
        let mut chip = Kiwi8::new(TestingContext::new(0));
        chip.i = 0x400;
        chip.v[0] = 0xDE;
        chip.v[1] = 0xAD;
        chip.v[2] = 0xBE;
        chip.v[3] = 0xEF;
        chip.v[4] = 0x11;

        chip.execute(OpCode::_FX55 { x: 3 }).unwrap();
        assert_eq!(&chip.memory().as_raw()[0x400..0x405], &[0xDE, 0xAD, 0xBE, 0xEF, 0x00]);
        assert_eq!(chip.i(), 0x400);

        // addresses past the end wrap, but the font stays intact
        chip.i = 0xFFE;
        chip.execute(OpCode::_FX55 { x: 2 }).unwrap();
        assert_eq!(chip.memory().read(0xFFE), 0xDE);
        assert_eq!(chip.memory().read(0xFFF), 0xAD);
        assert_eq!(chip.memory().read(0x000), 0xF0);
    }

    #[test]
    fn stores_into_font_are_dropped() {
        // I = 0x000, V0 = 0xFF, BCD of V0 at I, V0..V3 at I
        let mut chip = Kiwi8::new(TestingContext::new(0));
        chip.load_program(&[0xA0, 0x00, 0x60, 0xFF, 0xF0, 0x33, 0xF3, 0x55])
            .unwrap();
        let font = chip.memory().as_raw()[..0x50].to_vec();
        for _ in 0..4 {
            chip.step().unwrap();
        }
        assert_eq!(&chip.memory().as_raw()[..0x50], &font[..]);
        assert_eq!(&chip.memory().as_raw()[..3], &[0xF0, 0x90, 0x90]);
        assert_eq!(chip.pc(), 0x208);
    }

    #[test]
    fn execute_fx65_assign_v0_to_vx_mem_at_i() {
        let mut chip = Kiwi8::new(TestingContext::new(0));
        chip.i = 0x400;
        chip.memory.write(0x400, 0xDE);
        chip.memory.write(0x401, 0xAD);
        chip.memory.write(0x402, 0xBE);
        chip.memory.write(0x403, 0xEF);

        chip.execute(OpCode::_FX65 { x: 2 }).unwrap();
        assert_eq!(&chip.registers()[..4], &[0xDE, 0xAD, 0xBE, 0x00]);
        assert_eq!(chip.i(), 0x400);
    }
}
