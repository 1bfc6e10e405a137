//! H8/300H CPU core
//!
//! The CPU owns the register file and the fetch/decode/execute cycle:
//!
//! 1. **Fetch/decode**: read the instruction starting at PC and decode it
//!    into an [`Instruction`](crate::decode::Instruction) value
//! 2. **Advance**: move PC past the full encoding, so handlers see the
//!    next-instruction address
//! 3. **Execute**: dispatch to the instruction handler, which may read and
//!    write through the bus and rewrite PC for control transfers
//!
//! The H8/300H is big-endian for both code and data; all multi-byte fetches
//! go through the bus's big-endian word path.
//!
//! # Startup
//!
//! A reset leaves the CPU uninitialized. The first `step()` after reset
//! reads the 16-bit reset vector at address 0x0000 into PC before fetching,
//! mirroring the hardware's power-on vector fetch.

use crate::bus::Bus;
use crate::decode::{decode, Instruction};
use crate::instructions::Instructions;
use crate::registers::RegisterFile;
use log::debug;

/// Address of the reset vector word.
pub const RESET_VECTOR: u16 = 0x0000;

/// H8/300H CPU state.
pub struct Cpu {
    /// The register file (ER0-ER7, PC, CCR)
    pub registers: RegisterFile,
    /// Whether the reset vector has been fetched.
    initialized: bool,
    /// Total number of instructions executed.
    instructions: u64,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    /// Creates a new CPU with zeroed registers, not yet initialized.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            registers: RegisterFile::new(),
            initialized: false,
            instructions: 0,
        }
    }

    /// Resets the CPU: registers cleared, interrupt mask set, and the reset
    /// vector armed for the next `step()`.
    pub fn reset(&mut self) {
        self.registers.reset();
        self.initialized = false;
        self.instructions = 0;
    }

    /// Returns true once the reset vector has been fetched.
    #[must_use]
    pub const fn initialized(&self) -> bool {
        self.initialized
    }

    /// Returns the total number of instructions executed since reset.
    #[must_use]
    pub const fn instruction_count(&self) -> u64 {
        self.instructions
    }

    /// Returns the current program counter.
    #[must_use]
    pub const fn pc(&self) -> u32 {
        self.registers.pc
    }

    /// Executes a single instruction.
    ///
    /// On the first step after reset this loads PC from the reset vector
    /// before fetching, so the instruction executed is the first one of the
    /// firmware's entry point.
    pub fn step(&mut self, bus: &mut Bus) {
        if !self.initialized {
            self.registers.pc = bus.read16(RESET_VECTOR) as u32;
            self.initialized = true;
        }

        let pc = self.registers.pc;
        let decoded = decode(bus, pc);
        self.registers.pc = pc.wrapping_add(decoded.len);
        self.execute(bus, decoded.instr, pc);
        self.instructions += 1;
    }

    /// Dispatches a decoded instruction to its handler.
    fn execute(&mut self, bus: &mut Bus, instr: Instruction, pc: u32) {
        use Instruction as I;

        let registers = &mut self.registers;
        match instr {
            // ==================== DATA TRANSFER ====================
            I::Mov { width, src, dst } => Instructions::mov(registers, bus, width, src, dst),

            // ==================== ARITHMETIC ====================
            I::Add { width, src, rd } => Instructions::add(registers, bus, width, src, rd),
            I::Addx { src, rd } => Instructions::addx(registers, bus, src, rd),
            I::Adds { imm, erd } => Instructions::adds(registers, imm, erd),
            I::Sub { width, src, rd } => Instructions::sub(registers, bus, width, src, rd),
            I::Subx { src, rd } => Instructions::subx(registers, bus, src, rd),
            I::Subs { imm, erd } => Instructions::subs(registers, imm, erd),
            I::Cmp { width, src, rd } => Instructions::cmp(registers, bus, width, src, rd),
            I::Inc { width, amount, rd } => Instructions::inc(registers, width, amount, rd),
            I::Dec { width, amount, rd } => Instructions::dec(registers, width, amount, rd),
            I::Neg { width, rd } => Instructions::neg(registers, width, rd),
            I::Daa { rd } => Instructions::daa(registers, rd),
            I::Das { rd } => Instructions::das(registers, rd),
            I::Mulxu { width, rs, rd } => Instructions::mulxu(registers, width, rs, rd),
            I::Mulxs { width, rs, rd } => Instructions::mulxs(registers, width, rs, rd),
            I::Divxu { width, rs, rd } => Instructions::divxu(registers, width, rs, rd),
            I::Divxs { width, rs, rd } => Instructions::divxs(registers, width, rs, rd),

            // ==================== LOGIC ====================
            I::And { width, src, rd } => Instructions::and(registers, bus, width, src, rd),
            I::Or { width, src, rd } => Instructions::or(registers, bus, width, src, rd),
            I::Xor { width, src, rd } => Instructions::xor(registers, bus, width, src, rd),
            I::Not { width, rd } => Instructions::not(registers, width, rd),
            I::Extu { width, rd } => Instructions::extu(registers, width, rd),
            I::Exts { width, rd } => Instructions::exts(registers, width, rd),
            I::Shift { op, width, rd } => Instructions::shift(registers, op, width, rd),

            // ==================== BIT MANIPULATION ====================
            I::Bit { op, src, dst } => Instructions::bit(registers, bus, op, src, dst),

            // ==================== PROGRAM CONTROL ====================
            I::Bcc { cond, disp } => Instructions::bcc(registers, cond, disp),
            I::Jmp { target } => Instructions::jmp(registers, bus, target),
            I::Jsr { target } => Instructions::jsr(registers, bus, target),
            I::Bsr { disp } => Instructions::bsr(registers, bus, disp),
            I::Rts => Instructions::rts(registers, bus),
            I::Rte => Instructions::rte(registers, bus),

            // ==================== SYSTEM CONTROL ====================
            I::Ldc { width, src } => Instructions::ldc(registers, bus, width, src),
            I::Stc { width, dst } => Instructions::stc(registers, bus, width, dst),
            I::Andc { imm } => Instructions::andc(registers, imm),
            I::Orc { imm } => Instructions::orc(registers, imm),
            I::Xorc { imm } => Instructions::xorc(registers, imm),
            I::Nop => {}
            I::Sleep => Instructions::sleep(registers),
            I::Trapa { vector } => Instructions::trapa(registers, vector),
            I::Eepmov { width } => Instructions::eepmov(registers, bus, width),

            // The real chip's behavior here is unspecified; continue as a
            // no-op so guest code can never take the emulator down.
            I::Undefined { opcode } => {
                debug!("undefined opcode 0x{opcode:04X} at 0x{pc:06X}, executing as no-op");
            }
        }
    }

    /// Formats the CPU state for debugging.
    #[must_use]
    pub fn dump_state(&self) -> String {
        use crate::registers::FlagOps;
        format!(
            "PC={:06X} CCR={:02X} [{}{}{}{}{}{}] Instructions={}\n{}",
            self.registers.pc & 0x00FF_FFFF,
            self.registers.ccr,
            if self.registers.get_i() { "I" } else { "-" },
            if self.registers.get_h() { "H" } else { "-" },
            if self.registers.get_n() { "N" } else { "-" },
            if self.registers.get_z() { "Z" } else { "-" },
            if self.registers.get_v() { "V" } else { "-" },
            if self.registers.get_c() { "C" } else { "-" },
            self.instructions,
            self.registers
        )
    }
}
