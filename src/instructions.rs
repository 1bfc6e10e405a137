//! H8/300H instruction execution
//!
//! Handlers for every decoded instruction, grouped by category:
//!
//! - **Data transfer**: MOV in all addressing modes (plus MOVFPE/MOVTPE,
//!   which this core treats as ordinary moves)
//! - **Arithmetic**: ADD, ADDX, ADDS, SUB, SUBX, SUBS, CMP, INC, DEC, NEG,
//!   DAA, DAS, MULXU, MULXS, DIVXU, DIVXS
//! - **Logic**: AND, OR, XOR, NOT, EXTU, EXTS
//! - **Shifts and rotates**: SHLL, SHLR, SHAL, SHAR, ROTL, ROTR, ROTXL, ROTXR
//! - **Bit manipulation**: BSET, BCLR, BNOT, BTST, BAND, BOR, BXOR, BLD, BST
//!   and their inverse forms, on registers and memory bytes
//! - **Program control**: Bcc, JMP, JSR, BSR, RTS, RTE
//! - **System control**: LDC, STC, ANDC, ORC, XORC, TRAPA, SLEEP, EEPMOV
//!
//! Handlers run after the program counter has been advanced past the
//! instruction, so `registers.pc` is the next-instruction address - exactly
//! the base branch targets are relative to and the value JSR/BSR push.
//!
//! # Flag conventions
//!
//! Additive operations set H from the carry out of bit 3/11/27 (byte/word/
//! long), C from the carry out of the top bit, and V from signed overflow.
//! Subtractive operations use the corresponding borrows. Logical operations
//! clear V and leave C and H alone. ADDX/SUBX only ever clear Z, so a
//! multi-precision chain reports zero correctly.

use crate::bus::Bus;
use crate::decode::{BitOp, BitSource, BitTarget, Cond, JumpTarget, Operand, ShiftOp, Width};
use crate::registers::{FlagOps, RegisterFile};
use log::debug;

/// H8/300H instruction set.
///
/// Each instruction is implemented as a method operating on the register
/// file and the bus.
pub struct Instructions;

impl Instructions {
    // ==================== OPERAND ACCESS ====================

    /// Reads a register through the view selected by `width`.
    #[inline]
    fn read_reg(registers: &RegisterFile, width: Width, designator: u8) -> u32 {
        match width {
            Width::Byte => registers.r8(designator) as u32,
            Width::Word => registers.r16(designator) as u32,
            Width::Long => registers.er32((designator & 7) as usize),
        }
    }

    /// Writes a register through the view selected by `width`, preserving
    /// the bits outside the view.
    #[inline]
    fn write_reg(registers: &mut RegisterFile, width: Width, designator: u8, value: u32) {
        match width {
            Width::Byte => registers.set_r8(designator, value as u8),
            Width::Word => registers.set_r16(designator, value as u16),
            Width::Long => registers.set_er32((designator & 7) as usize, value),
        }
    }

    /// Resolves a memory operand to a bus address, applying the
    /// post-increment/pre-decrement side effect.
    ///
    /// # Panics
    /// Panics if called with a register or immediate operand; the decoder
    /// never produces those where an address is required.
    fn operand_address(registers: &mut RegisterFile, op: Operand, width: Width) -> u16 {
        match op {
            Operand::Ind(n) => registers.er32(n as usize) as u16,
            Operand::Disp16(disp, n) => {
                registers.er32(n as usize).wrapping_add(disp as u32) as u16
            }
            Operand::Disp24(disp, n) => {
                registers.er32(n as usize).wrapping_add(disp as u32) as u16
            }
            Operand::PostInc(n) => {
                let addr = registers.er32(n as usize);
                registers.set_er32(n as usize, addr.wrapping_add(width.bytes()));
                addr as u16
            }
            Operand::PreDec(n) => {
                let addr = registers.er32(n as usize).wrapping_sub(width.bytes());
                registers.set_er32(n as usize, addr);
                addr as u16
            }
            Operand::Abs8(a) => 0xFF00 | a as u16,
            Operand::Abs16(a) => a,
            Operand::Abs24(a) => a as u16,
            Operand::Reg(_) | Operand::Imm(_) => {
                panic!("register/immediate operand has no address")
            }
        }
    }

    /// Reads an operand value.
    fn read_operand(
        registers: &mut RegisterFile,
        bus: &mut Bus,
        width: Width,
        op: Operand,
    ) -> u32 {
        match op {
            Operand::Reg(d) => Self::read_reg(registers, width, d),
            Operand::Imm(v) => v,
            _ => {
                let addr = Self::operand_address(registers, op, width);
                match width {
                    Width::Byte => bus.read8(addr) as u32,
                    Width::Word => bus.read16(addr) as u32,
                    Width::Long => bus.read32(addr),
                }
            }
        }
    }

    /// Writes an operand value.
    fn write_operand(
        registers: &mut RegisterFile,
        bus: &mut Bus,
        width: Width,
        op: Operand,
        value: u32,
    ) {
        match op {
            Operand::Reg(d) => Self::write_reg(registers, width, d, value),
            Operand::Imm(_) => {}
            _ => {
                let addr = Self::operand_address(registers, op, width);
                match width {
                    Width::Byte => bus.write8(addr, value as u8),
                    Width::Word => bus.write16(addr, value as u16),
                    Width::Long => bus.write32(addr, value),
                }
            }
        }
    }

    // ==================== FLAG HELPERS ====================

    /// Sets logical-operation flags: N and Z from the result, V cleared.
    /// C and H are unchanged.
    #[inline]
    fn set_logic_flags(registers: &mut RegisterFile, result: u32, width: Width) {
        registers.set_n(result & width.sign_bit() != 0);
        registers.set_z(result & width.mask() == 0);
        registers.set_v(false);
    }

    /// Adds with full flag computation. Returns the masked result.
    ///
    /// `cumulative_z` selects the ADDX/SUBX convention: Z is cleared by a
    /// nonzero result but only left set (never newly set) by a zero one.
    fn add_with_carry(
        registers: &mut RegisterFile,
        width: Width,
        dst: u32,
        src: u32,
        carry_in: bool,
        cumulative_z: bool,
    ) -> u32 {
        let mask = width.mask();
        let d = dst & mask;
        let s = src & mask;
        let c = carry_in as u32;
        let result = d.wrapping_add(s).wrapping_add(c) & mask;

        let half_mask = width.half_mask();
        let half = (d & half_mask) + (s & half_mask) + c > half_mask;
        let carry = (d as u64) + (s as u64) + (c as u64) > mask as u64;
        let sign = width.sign_bit();
        let overflow = !(d ^ s) & (d ^ result) & sign != 0;

        registers.set_h(half);
        registers.set_n(result & sign != 0);
        if cumulative_z {
            if result != 0 {
                registers.set_z(false);
            }
        } else {
            registers.set_z(result == 0);
        }
        registers.set_v(overflow);
        registers.set_c(carry);
        result
    }

    /// Subtracts with full flag computation. Returns the masked result.
    ///
    /// H is the borrow into bit 4/12/28, C the borrow out of the top bit.
    fn sub_with_borrow(
        registers: &mut RegisterFile,
        width: Width,
        dst: u32,
        src: u32,
        borrow_in: bool,
        cumulative_z: bool,
    ) -> u32 {
        let mask = width.mask();
        let d = dst & mask;
        let s = src & mask;
        let b = borrow_in as u32;
        let result = d.wrapping_sub(s).wrapping_sub(b) & mask;

        let half_mask = width.half_mask();
        let half = (s & half_mask) + b > (d & half_mask);
        let carry = (s as u64) + (b as u64) > d as u64;
        let sign = width.sign_bit();
        let overflow = (d ^ s) & (d ^ result) & sign != 0;

        registers.set_h(half);
        registers.set_n(result & sign != 0);
        if cumulative_z {
            if result != 0 {
                registers.set_z(false);
            }
        } else {
            registers.set_z(result == 0);
        }
        registers.set_v(overflow);
        registers.set_c(carry);
        result
    }

    // ==================== DATA TRANSFER ====================

    /// MOV - moves data from source to destination.
    ///
    /// # Flags
    /// - N: set if the moved value is negative
    /// - Z: set if the moved value is zero
    /// - V: always cleared
    /// - C, H: not affected
    pub fn mov(
        registers: &mut RegisterFile,
        bus: &mut Bus,
        width: Width,
        src: Operand,
        dst: Operand,
    ) {
        let value = Self::read_operand(registers, bus, width, src);
        Self::write_operand(registers, bus, width, dst, value);
        Self::set_logic_flags(registers, value, width);
    }

    // ==================== ARITHMETIC ====================

    /// ADD - adds source to a register destination.
    ///
    /// # Flags
    /// H, N, Z, V, C all set from the addition.
    pub fn add(
        registers: &mut RegisterFile,
        bus: &mut Bus,
        width: Width,
        src: Operand,
        rd: u8,
    ) {
        let s = Self::read_operand(registers, bus, width, src);
        let d = Self::read_reg(registers, width, rd);
        let result = Self::add_with_carry(registers, width, d, s, false, false);
        Self::write_reg(registers, width, rd, result);
    }

    /// ADDX - add with carry, for multi-precision arithmetic.
    pub fn addx(registers: &mut RegisterFile, bus: &mut Bus, src: Operand, rd: u8) {
        let s = Self::read_operand(registers, bus, Width::Byte, src);
        let d = Self::read_reg(registers, Width::Byte, rd);
        let carry = registers.get_c();
        let result = Self::add_with_carry(registers, Width::Byte, d, s, carry, true);
        Self::write_reg(registers, Width::Byte, rd, result);
    }

    /// ADDS - adds 1, 2 or 4 to an address register. No flags change.
    pub fn adds(registers: &mut RegisterFile, imm: u32, erd: u8) {
        let reg = erd as usize;
        registers.set_er32(reg, registers.er32(reg).wrapping_add(imm));
    }

    /// SUB - subtracts source from a register destination.
    pub fn sub(
        registers: &mut RegisterFile,
        bus: &mut Bus,
        width: Width,
        src: Operand,
        rd: u8,
    ) {
        let s = Self::read_operand(registers, bus, width, src);
        let d = Self::read_reg(registers, width, rd);
        let result = Self::sub_with_borrow(registers, width, d, s, false, false);
        Self::write_reg(registers, width, rd, result);
    }

    /// SUBX - subtract with borrow.
    pub fn subx(registers: &mut RegisterFile, bus: &mut Bus, src: Operand, rd: u8) {
        let s = Self::read_operand(registers, bus, Width::Byte, src);
        let d = Self::read_reg(registers, Width::Byte, rd);
        let borrow = registers.get_c();
        let result = Self::sub_with_borrow(registers, Width::Byte, d, s, borrow, true);
        Self::write_reg(registers, Width::Byte, rd, result);
    }

    /// SUBS - subtracts 1, 2 or 4 from an address register. No flags change.
    pub fn subs(registers: &mut RegisterFile, imm: u32, erd: u8) {
        let reg = erd as usize;
        registers.set_er32(reg, registers.er32(reg).wrapping_sub(imm));
    }

    /// CMP - compares by subtraction without writing the result back.
    pub fn cmp(
        registers: &mut RegisterFile,
        bus: &mut Bus,
        width: Width,
        src: Operand,
        rd: u8,
    ) {
        let s = Self::read_operand(registers, bus, width, src);
        let d = Self::read_reg(registers, width, rd);
        let _ = Self::sub_with_borrow(registers, width, d, s, false, false);
    }

    /// INC - increments a register by 1 or 2.
    ///
    /// # Flags
    /// - N, Z: from the result
    /// - V: set on positive-to-negative wrap (e.g. 0x7F -> 0x80)
    /// - C, H: not affected
    pub fn inc(registers: &mut RegisterFile, width: Width, amount: u8, rd: u8) {
        let d = Self::read_reg(registers, width, rd);
        let result = d.wrapping_add(amount as u32) & width.mask();
        let sign = width.sign_bit();
        registers.set_n(result & sign != 0);
        registers.set_z(result == 0);
        registers.set_v(d & sign == 0 && result & sign != 0);
        Self::write_reg(registers, width, rd, result);
    }

    /// DEC - decrements a register by 1 or 2.
    ///
    /// # Flags
    /// - N, Z: from the result
    /// - V: set on negative-to-positive wrap (e.g. 0x80 -> 0x7F)
    /// - C, H: not affected
    pub fn dec(registers: &mut RegisterFile, width: Width, amount: u8, rd: u8) {
        let d = Self::read_reg(registers, width, rd);
        let result = d.wrapping_sub(amount as u32) & width.mask();
        let sign = width.sign_bit();
        registers.set_n(result & sign != 0);
        registers.set_z(result == 0);
        registers.set_v(d & sign != 0 && result & sign == 0);
        Self::write_reg(registers, width, rd, result);
    }

    /// NEG - two's-complement negation (0 minus the operand).
    pub fn neg(registers: &mut RegisterFile, width: Width, rd: u8) {
        let d = Self::read_reg(registers, width, rd);
        let result = Self::sub_with_borrow(registers, width, 0, d, false, false);
        Self::write_reg(registers, width, rd, result);
    }

    /// DAA - decimal adjust after a BCD addition, driven by C and H.
    pub fn daa(registers: &mut RegisterFile, rd: u8) {
        let a = registers.r8(rd);
        let mut adjust = 0u8;
        let mut carry = registers.get_c();
        if registers.get_h() || a & 0xF > 9 {
            adjust |= 0x06;
        }
        if carry || a > 0x99 {
            adjust |= 0x60;
            carry = true;
        }
        let result = a.wrapping_add(adjust);
        registers.set_r8(rd, result);
        registers.set_n(result & 0x80 != 0);
        registers.set_z(result == 0);
        registers.set_c(carry);
    }

    /// DAS - decimal adjust after a BCD subtraction.
    pub fn das(registers: &mut RegisterFile, rd: u8) {
        let a = registers.r8(rd);
        let mut adjust = 0u8;
        if registers.get_h() || a & 0xF > 9 {
            adjust |= 0x06;
        }
        if registers.get_c() || a > 0x99 {
            adjust |= 0x60;
        }
        let result = a.wrapping_sub(adjust);
        registers.set_r8(rd, result);
        registers.set_n(result & 0x80 != 0);
        registers.set_z(result == 0);
    }

    /// MULXU - unsigned multiply. 8x8 -> 16 into Rd, or 16x16 -> 32 into ERd.
    /// No flags change.
    pub fn mulxu(registers: &mut RegisterFile, width: Width, rs: u8, rd: u8) {
        match width {
            Width::Byte => {
                let multiplicand = registers.r16(rd) & 0xFF;
                let multiplier = registers.r8(rs) as u16;
                registers.set_r16(rd, multiplicand.wrapping_mul(multiplier));
            }
            _ => {
                let reg = (rd & 7) as usize;
                let multiplicand = registers.er32(reg) & 0xFFFF;
                let multiplier = registers.r16(rs) as u32;
                registers.set_er32(reg, multiplicand.wrapping_mul(multiplier));
            }
        }
    }

    /// MULXS - signed multiply. Sets N and Z from the product.
    pub fn mulxs(registers: &mut RegisterFile, width: Width, rs: u8, rd: u8) {
        match width {
            Width::Byte => {
                let multiplicand = registers.r16(rd) as u8 as i8 as i16;
                let multiplier = registers.r8(rs) as i8 as i16;
                let product = multiplicand.wrapping_mul(multiplier);
                registers.set_r16(rd, product as u16);
                registers.set_n(product < 0);
                registers.set_z(product == 0);
            }
            _ => {
                let reg = (rd & 7) as usize;
                let multiplicand = registers.er32(reg) as u16 as i16 as i32;
                let multiplier = registers.r16(rs) as i16 as i32;
                let product = multiplicand.wrapping_mul(multiplier);
                registers.set_er32(reg, product as u32);
                registers.set_n(product < 0);
                registers.set_z(product == 0);
            }
        }
    }

    /// DIVXU - unsigned divide. 16-by-8 leaves the remainder in RdH and the
    /// quotient in RdL; 32-by-16 leaves the remainder in Ed and the quotient
    /// in Rd.
    ///
    /// # Flags
    /// - N: set if the divisor's top bit is set
    /// - Z: set if the divisor is zero (the division is skipped)
    pub fn divxu(registers: &mut RegisterFile, width: Width, rs: u8, rd: u8) {
        match width {
            Width::Byte => {
                let divisor = registers.r8(rs);
                registers.set_n(divisor & 0x80 != 0);
                registers.set_z(divisor == 0);
                if divisor == 0 {
                    return;
                }
                let dividend = registers.r16(rd);
                let quotient = dividend / divisor as u16;
                let remainder = dividend % divisor as u16;
                registers.set_r16(rd, (remainder << 8) | (quotient & 0xFF));
            }
            _ => {
                let divisor = registers.r16(rs);
                registers.set_n(divisor & 0x8000 != 0);
                registers.set_z(divisor == 0);
                if divisor == 0 {
                    return;
                }
                let reg = (rd & 7) as usize;
                let dividend = registers.er32(reg);
                let quotient = dividend / divisor as u32;
                let remainder = dividend % divisor as u32;
                registers.set_er32(reg, (remainder << 16) | (quotient & 0xFFFF));
            }
        }
    }

    /// DIVXS - signed divide, same register layout as DIVXU.
    ///
    /// # Flags
    /// - N: set if dividend and divisor have opposite signs
    /// - Z: set if the divisor is zero (the division is skipped)
    pub fn divxs(registers: &mut RegisterFile, width: Width, rs: u8, rd: u8) {
        match width {
            Width::Byte => {
                let divisor = registers.r8(rs) as i8;
                let dividend = registers.r16(rd) as i16;
                registers.set_n((dividend < 0) != (divisor < 0));
                registers.set_z(divisor == 0);
                if divisor == 0 {
                    return;
                }
                let quotient = dividend.wrapping_div(divisor as i16);
                let remainder = dividend.wrapping_rem(divisor as i16);
                registers.set_r16(rd, ((remainder as u16) << 8) | (quotient as u16 & 0xFF));
            }
            _ => {
                let divisor = registers.r16(rs) as i16;
                let reg = (rd & 7) as usize;
                let dividend = registers.er32(reg) as i32;
                registers.set_n((dividend < 0) != (divisor < 0));
                registers.set_z(divisor == 0);
                if divisor == 0 {
                    return;
                }
                let quotient = dividend.wrapping_div(divisor as i32);
                let remainder = dividend.wrapping_rem(divisor as i32);
                registers
                    .set_er32(reg, ((remainder as u32) << 16) | (quotient as u32 & 0xFFFF));
            }
        }
    }

    // ==================== LOGIC ====================

    /// AND - bitwise and into a register.
    pub fn and(
        registers: &mut RegisterFile,
        bus: &mut Bus,
        width: Width,
        src: Operand,
        rd: u8,
    ) {
        let s = Self::read_operand(registers, bus, width, src);
        let result = Self::read_reg(registers, width, rd) & s & width.mask();
        Self::write_reg(registers, width, rd, result);
        Self::set_logic_flags(registers, result, width);
    }

    /// OR - bitwise or into a register.
    pub fn or(
        registers: &mut RegisterFile,
        bus: &mut Bus,
        width: Width,
        src: Operand,
        rd: u8,
    ) {
        let s = Self::read_operand(registers, bus, width, src);
        let result = (Self::read_reg(registers, width, rd) | s) & width.mask();
        Self::write_reg(registers, width, rd, result);
        Self::set_logic_flags(registers, result, width);
    }

    /// XOR - bitwise exclusive-or into a register.
    pub fn xor(
        registers: &mut RegisterFile,
        bus: &mut Bus,
        width: Width,
        src: Operand,
        rd: u8,
    ) {
        let s = Self::read_operand(registers, bus, width, src);
        let result = (Self::read_reg(registers, width, rd) ^ s) & width.mask();
        Self::write_reg(registers, width, rd, result);
        Self::set_logic_flags(registers, result, width);
    }

    /// NOT - bitwise complement.
    pub fn not(registers: &mut RegisterFile, width: Width, rd: u8) {
        let result = !Self::read_reg(registers, width, rd) & width.mask();
        Self::write_reg(registers, width, rd, result);
        Self::set_logic_flags(registers, result, width);
    }

    /// EXTU - zero-extends the lower half of a register.
    pub fn extu(registers: &mut RegisterFile, width: Width, rd: u8) {
        let result = match width {
            Width::Word => {
                let v = registers.r16(rd) & 0x00FF;
                registers.set_r16(rd, v);
                v as u32
            }
            _ => {
                let reg = (rd & 7) as usize;
                let v = registers.er32(reg) & 0x0000_FFFF;
                registers.set_er32(reg, v);
                v
            }
        };
        registers.set_n(false);
        registers.set_z(result == 0);
        registers.set_v(false);
    }

    /// EXTS - sign-extends the lower half of a register.
    pub fn exts(registers: &mut RegisterFile, width: Width, rd: u8) {
        match width {
            Width::Word => {
                let v = registers.r16(rd) as u8 as i8 as i16 as u16;
                registers.set_r16(rd, v);
                registers.set_n(v & 0x8000 != 0);
                registers.set_z(v == 0);
            }
            _ => {
                let reg = (rd & 7) as usize;
                let v = registers.er32(reg) as u16 as i16 as i32 as u32;
                registers.set_er32(reg, v);
                registers.set_n(v & 0x8000_0000 != 0);
                registers.set_z(v == 0);
            }
        }
        registers.set_v(false);
    }

    /// Single-bit shifts and rotates.
    ///
    /// # Flags
    /// - C: receives the bit shifted or rotated out
    /// - N, Z: from the result
    /// - V: cleared, except SHAL which sets it when the sign changes
    pub fn shift(registers: &mut RegisterFile, op: ShiftOp, width: Width, rd: u8) {
        let d = Self::read_reg(registers, width, rd);
        let mask = width.mask();
        let sign = width.sign_bit();

        let (result, carry_out, overflow) = match op {
            ShiftOp::Shll => ((d << 1) & mask, d & sign != 0, false),
            ShiftOp::Shal => {
                let r = (d << 1) & mask;
                (r, d & sign != 0, (d ^ r) & sign != 0)
            }
            ShiftOp::Shlr => ((d & mask) >> 1, d & 1 != 0, false),
            ShiftOp::Shar => (((d & mask) >> 1) | (d & sign), d & 1 != 0, false),
            ShiftOp::Rotl => {
                let c = d & sign != 0;
                (((d << 1) | c as u32) & mask, c, false)
            }
            ShiftOp::Rotr => {
                let c = d & 1 != 0;
                (((d & mask) >> 1) | if c { sign } else { 0 }, c, false)
            }
            ShiftOp::Rotxl => {
                let old = registers.get_c() as u32;
                (((d << 1) | old) & mask, d & sign != 0, false)
            }
            ShiftOp::Rotxr => {
                let old = if registers.get_c() { sign } else { 0 };
                (((d & mask) >> 1) | old, d & 1 != 0, false)
            }
        };

        Self::write_reg(registers, width, rd, result);
        registers.set_c(carry_out);
        registers.set_v(overflow);
        registers.set_n(result & sign != 0);
        registers.set_z(result == 0);
    }

    // ==================== BIT MANIPULATION ====================

    /// Executes a bit operation against a register or a memory byte.
    ///
    /// The bit number comes from a 3-bit immediate or the low three bits of
    /// an 8-bit register. Memory targets are read-modify-written for the
    /// mutating forms.
    pub fn bit(
        registers: &mut RegisterFile,
        bus: &mut Bus,
        op: BitOp,
        src: BitSource,
        dst: BitTarget,
    ) {
        let bit_number = match src {
            BitSource::Imm(n) => n & 7,
            BitSource::Reg(d) => registers.r8(d) & 7,
        };
        let mask = 1u8 << bit_number;

        let addr = match dst {
            BitTarget::Reg(_) => 0,
            BitTarget::Ind(n) => registers.er32(n as usize) as u16,
            BitTarget::Abs8(a) => 0xFF00 | a as u16,
        };
        let value = match dst {
            BitTarget::Reg(d) => registers.r8(d),
            _ => bus.read8(addr),
        };
        let bit = value & mask != 0;

        let new_value = match op {
            BitOp::Bset => Some(value | mask),
            BitOp::Bclr => Some(value & !mask),
            BitOp::Bnot => Some(value ^ mask),
            BitOp::Bst => Some(if registers.get_c() {
                value | mask
            } else {
                value & !mask
            }),
            BitOp::Bist => Some(if registers.get_c() {
                value & !mask
            } else {
                value | mask
            }),
            BitOp::Btst => {
                registers.set_z(!bit);
                None
            }
            BitOp::Bld => {
                registers.set_c(bit);
                None
            }
            BitOp::Bild => {
                registers.set_c(!bit);
                None
            }
            BitOp::Band => {
                registers.set_c(registers.get_c() && bit);
                None
            }
            BitOp::Biand => {
                registers.set_c(registers.get_c() && !bit);
                None
            }
            BitOp::Bor => {
                registers.set_c(registers.get_c() || bit);
                None
            }
            BitOp::Bior => {
                registers.set_c(registers.get_c() || !bit);
                None
            }
            BitOp::Bxor => {
                registers.set_c(registers.get_c() ^ bit);
                None
            }
            BitOp::Bixor => {
                registers.set_c(registers.get_c() ^ !bit);
                None
            }
        };

        if let Some(new_value) = new_value {
            match dst {
                BitTarget::Reg(d) => registers.set_r8(d, new_value),
                _ => bus.write8(addr, new_value),
            }
        }
    }

    // ==================== PROGRAM CONTROL ====================

    /// Pushes a word: ER7 decrements before the write.
    fn push16(registers: &mut RegisterFile, bus: &mut Bus, value: u16) {
        let sp = registers.sp().wrapping_sub(2);
        registers.set_sp(sp);
        bus.write16(sp as u16, value);
    }

    /// Pops a word: reads then increments ER7.
    fn pop16(registers: &mut RegisterFile, bus: &mut Bus) -> u16 {
        let sp = registers.sp();
        let value = bus.read16(sp as u16);
        registers.set_sp(sp.wrapping_add(2));
        value
    }

    /// Resolves a jump target to the new program counter value.
    fn jump_address(registers: &RegisterFile, bus: &mut Bus, target: JumpTarget) -> u32 {
        match target {
            JumpTarget::Ind(n) => registers.er32(n as usize) & 0x00FF_FFFF,
            JumpTarget::Abs24(a) => a,
            // Indirect through a vector word in page zero.
            JumpTarget::MemInd(a) => bus.read16(a as u16) as u32,
        }
    }

    /// Bcc - conditional branch, displacement relative to the next
    /// instruction. No flags change.
    pub fn bcc(registers: &mut RegisterFile, cond: Cond, disp: i32) {
        if cond.holds(registers.ccr) {
            registers.pc = registers.pc.wrapping_add(disp as u32);
        }
    }

    /// JMP - unconditional jump.
    pub fn jmp(registers: &mut RegisterFile, bus: &mut Bus, target: JumpTarget) {
        registers.pc = Self::jump_address(registers, bus, target);
    }

    /// JSR - pushes the return address (16 bits) and jumps.
    pub fn jsr(registers: &mut RegisterFile, bus: &mut Bus, target: JumpTarget) {
        let return_pc = registers.pc as u16;
        let dest = Self::jump_address(registers, bus, target);
        Self::push16(registers, bus, return_pc);
        registers.pc = dest;
    }

    /// BSR - pushes the return address and branches relative.
    pub fn bsr(registers: &mut RegisterFile, bus: &mut Bus, disp: i32) {
        let return_pc = registers.pc as u16;
        Self::push16(registers, bus, return_pc);
        registers.pc = registers.pc.wrapping_add(disp as u32);
    }

    /// RTS - pops the return address.
    pub fn rts(registers: &mut RegisterFile, bus: &mut Bus) {
        registers.pc = Self::pop16(registers, bus) as u32;
    }

    /// RTE - pops CCR (low byte of a 16-bit slot), then PC.
    pub fn rte(registers: &mut RegisterFile, bus: &mut Bus) {
        let frame = Self::pop16(registers, bus);
        registers.ccr = frame as u8;
        registers.pc = Self::pop16(registers, bus) as u32;
    }

    // ==================== SYSTEM CONTROL ====================

    /// LDC - loads the CCR from a register, immediate, or memory word
    /// (low byte of the transferred word).
    pub fn ldc(registers: &mut RegisterFile, bus: &mut Bus, width: Width, src: Operand) {
        let value = Self::read_operand(registers, bus, width, src);
        registers.ccr = value as u8;
    }

    /// STC - stores the CCR to a register or memory word.
    pub fn stc(registers: &mut RegisterFile, bus: &mut Bus, width: Width, dst: Operand) {
        let value = registers.ccr as u32;
        Self::write_operand(registers, bus, width, dst, value);
    }

    /// ANDC - ands an immediate into the CCR.
    pub fn andc(registers: &mut RegisterFile, imm: u8) {
        registers.ccr &= imm;
    }

    /// ORC - ors an immediate into the CCR.
    pub fn orc(registers: &mut RegisterFile, imm: u8) {
        registers.ccr |= imm;
    }

    /// XORC - exclusive-ors an immediate into the CCR.
    pub fn xorc(registers: &mut RegisterFile, imm: u8) {
        registers.ccr ^= imm;
    }

    /// TRAPA - trap vectoring is not modeled; executes as a no-op.
    pub fn trapa(registers: &RegisterFile, vector: u8) {
        debug!(
            "trapa #{vector} at 0x{:06X} ignored (no interrupt controller)",
            registers.pc
        );
    }

    /// SLEEP - the standby state is not modeled; executes as a no-op.
    pub fn sleep(registers: &RegisterFile) {
        debug!("sleep at 0x{:06X} ignored", registers.pc);
    }

    /// EEPMOV - block move from @ER5 to @ER6. The byte form moves R4L
    /// bytes, the word form R4 bytes; both pointers advance and the count
    /// register drains to zero. No flags change.
    pub fn eepmov(registers: &mut RegisterFile, bus: &mut Bus, width: Width) {
        let mut count = match width {
            Width::Byte => registers.r8(12) as u32, // R4L
            _ => registers.r16(4) as u32,           // R4
        };
        while count > 0 {
            let src = registers.er32(5);
            let dst = registers.er32(6);
            let byte = bus.read8(src as u16);
            bus.write8(dst as u16, byte);
            registers.set_er32(5, src.wrapping_add(1));
            registers.set_er32(6, dst.wrapping_add(1));
            count -= 1;
        }
        match width {
            Width::Byte => registers.set_r8(12, 0),
            _ => registers.set_r16(4, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::ccr;

    fn setup() -> (RegisterFile, Bus) {
        (RegisterFile::new(), Bus::new())
    }

    #[test]
    fn test_mov_imm_to_reg_flags() {
        let (mut regs, mut bus) = setup();
        Instructions::mov(
            &mut regs,
            &mut bus,
            Width::Byte,
            Operand::Imm(0x42),
            Operand::Reg(0),
        );
        assert_eq!(regs.r8(0), 0x42);
        assert!(!regs.get_n());
        assert!(!regs.get_z());
        assert!(!regs.get_v());

        Instructions::mov(
            &mut regs,
            &mut bus,
            Width::Byte,
            Operand::Imm(0x80),
            Operand::Reg(1),
        );
        assert!(regs.get_n());

        Instructions::mov(
            &mut regs,
            &mut bus,
            Width::Byte,
            Operand::Imm(0x00),
            Operand::Reg(2),
        );
        assert!(regs.get_z());
    }

    #[test]
    fn test_mov_round_trip_through_ram() {
        let (mut regs, mut bus) = setup();
        regs.set_er32(3, 0xF800);
        Instructions::mov(
            &mut regs,
            &mut bus,
            Width::Word,
            Operand::Imm(0xBEEF),
            Operand::Ind(3),
        );
        Instructions::mov(
            &mut regs,
            &mut bus,
            Width::Word,
            Operand::Ind(3),
            Operand::Reg(0),
        );
        assert_eq!(regs.r16(0), 0xBEEF);
    }

    #[test]
    fn test_push_pop_identity() {
        let (mut regs, mut bus) = setup();
        regs.set_sp(0xFF80);
        regs.set_r16(0, 0x1234);

        // MOV.W R0, @-ER7 then MOV.W @ER7+, R1
        Instructions::mov(
            &mut regs,
            &mut bus,
            Width::Word,
            Operand::Reg(0),
            Operand::PreDec(7),
        );
        assert_eq!(regs.sp(), 0xFF7E);
        Instructions::mov(
            &mut regs,
            &mut bus,
            Width::Word,
            Operand::PostInc(7),
            Operand::Reg(1),
        );
        assert_eq!(regs.sp(), 0xFF80);
        assert_eq!(regs.r16(1), 0x1234);
    }

    #[test]
    fn test_add_overflow_and_half_carry() {
        let (mut regs, mut bus) = setup();
        regs.set_r8(0, 0x7F);
        regs.set_r8(1, 0x01);
        Instructions::add(&mut regs, &mut bus, Width::Byte, Operand::Reg(1), 0);
        assert_eq!(regs.r8(0), 0x80);
        assert!(regs.get_n());
        assert!(!regs.get_z());
        assert!(regs.get_v());
        assert!(!regs.get_c());
        assert!(regs.get_h());
    }

    #[test]
    fn test_add_carry_wraps_to_zero() {
        let (mut regs, mut bus) = setup();
        regs.set_r8(0, 0xFF);
        Instructions::add(&mut regs, &mut bus, Width::Byte, Operand::Imm(0x01), 0);
        assert_eq!(regs.r8(0), 0x00);
        assert!(regs.get_z());
        assert!(regs.get_c());
        assert!(regs.get_h());
        assert!(!regs.get_v());
    }

    #[test]
    fn test_add_long_half_carry_bit_27() {
        let (mut regs, mut bus) = setup();
        regs.set_er32(0, 0x0FFF_FFFF);
        Instructions::add(&mut regs, &mut bus, Width::Long, Operand::Imm(1), 0);
        assert_eq!(regs.er32(0), 0x1000_0000);
        assert!(regs.get_h());
        assert!(!regs.get_c());
    }

    #[test]
    fn test_sub_borrow_flags() {
        let (mut regs, mut bus) = setup();
        regs.set_r8(0, 0x10);
        Instructions::sub(&mut regs, &mut bus, Width::Byte, Operand::Imm(0x20), 0);
        assert_eq!(regs.r8(0), 0xF0);
        assert!(regs.get_c());
        assert!(regs.get_n());
    }

    #[test]
    fn test_cmp_sets_flags_without_writeback() {
        let (mut regs, mut bus) = setup();
        regs.set_r8(0, 0x42);
        Instructions::cmp(&mut regs, &mut bus, Width::Byte, Operand::Imm(0x42), 0);
        assert!(regs.get_z());
        assert_eq!(regs.r8(0), 0x42);
    }

    #[test]
    fn test_addx_chain_and_cumulative_z() {
        let (mut regs, mut bus) = setup();
        // 0x00FF + 0x0001 done byte-wise: low bytes 0xFF + 0x01 = 0x00 C=1
        regs.set_r8(0, 0xFF);
        regs.set_z(true);
        Instructions::add(&mut regs, &mut bus, Width::Byte, Operand::Imm(0x01), 0);
        assert!(regs.get_c());

        // High bytes 0x00 + 0x00 + carry = 0x01: Z must clear
        regs.set_z(true);
        regs.set_r8(1, 0x00);
        Instructions::addx(&mut regs, &mut bus, Operand::Imm(0x00), 1);
        assert_eq!(regs.r8(1), 0x01);
        assert!(!regs.get_z());

        // A zero ADDX result leaves a previously-set Z alone
        regs.set_c(false);
        regs.set_z(true);
        regs.set_r8(2, 0x00);
        Instructions::addx(&mut regs, &mut bus, Operand::Imm(0x00), 2);
        assert!(regs.get_z());
    }

    #[test]
    fn test_subx_uses_borrow() {
        let (mut regs, mut bus) = setup();
        regs.set_r8(0, 0x10);
        regs.set_c(true);
        Instructions::subx(&mut regs, &mut bus, Operand::Imm(0x05), 0);
        assert_eq!(regs.r8(0), 0x0A);
    }

    #[test]
    fn test_adds_subs_touch_no_flags() {
        let (mut regs, _) = setup();
        regs.ccr = 0;
        regs.set_er32(3, 0xFFFF_FFFF);
        Instructions::adds(&mut regs, 4, 3);
        assert_eq!(regs.er32(3), 3);
        assert_eq!(regs.ccr, 0);

        Instructions::subs(&mut regs, 4, 3);
        assert_eq!(regs.er32(3), 0xFFFF_FFFF);
        assert_eq!(regs.ccr, 0);
    }

    #[test]
    fn test_inc_boundary() {
        let (mut regs, _) = setup();
        regs.set_r8(0, 0x7F);
        Instructions::inc(&mut regs, Width::Byte, 1, 0);
        assert_eq!(regs.r8(0), 0x80);
        assert!(regs.get_v());
        assert!(regs.get_n());
        assert!(!regs.get_z());
    }

    #[test]
    fn test_dec_boundary() {
        let (mut regs, _) = setup();
        regs.set_r8(0, 0x80);
        Instructions::dec(&mut regs, Width::Byte, 1, 0);
        assert_eq!(regs.r8(0), 0x7F);
        assert!(regs.get_v());
        assert!(!regs.get_n());
        assert!(!regs.get_z());
    }

    #[test]
    fn test_inc_dec_leave_carry() {
        let (mut regs, _) = setup();
        regs.set_c(true);
        regs.set_r8(0, 0xFF);
        Instructions::inc(&mut regs, Width::Byte, 1, 0);
        assert!(regs.get_z());
        assert!(regs.get_c());
    }

    #[test]
    fn test_neg_boundary() {
        let (mut regs, _) = setup();
        regs.set_r8(0, 0x80);
        Instructions::neg(&mut regs, Width::Byte, 0);
        assert_eq!(regs.r8(0), 0x80);
        assert!(regs.get_v());
        assert!(regs.get_c());

        regs.set_r8(1, 0x01);
        Instructions::neg(&mut regs, Width::Byte, 1);
        assert_eq!(regs.r8(1), 0xFF);
        assert!(regs.get_n());
    }

    #[test]
    fn test_daa_adjusts_bcd_addition() {
        let (mut regs, mut bus) = setup();
        // 0x19 + 0x28 = 0x41 binary, 47 BCD
        regs.set_r8(0, 0x19);
        Instructions::add(&mut regs, &mut bus, Width::Byte, Operand::Imm(0x28), 0);
        Instructions::daa(&mut regs, 0);
        assert_eq!(regs.r8(0), 0x47);
        assert!(!regs.get_c());
    }

    #[test]
    fn test_das_adjusts_bcd_subtraction() {
        let (mut regs, mut bus) = setup();
        // 0x42 - 0x15 = 0x2D binary, 27 BCD
        regs.set_r8(0, 0x42);
        Instructions::sub(&mut regs, &mut bus, Width::Byte, Operand::Imm(0x15), 0);
        Instructions::das(&mut regs, 0);
        assert_eq!(regs.r8(0), 0x27);
    }

    #[test]
    fn test_mulxu_byte_and_word() {
        let (mut regs, _) = setup();
        regs.set_r16(0, 0x1234); // low byte 0x34 is the multiplicand
        regs.set_r8(1, 0x10); // R1H
        Instructions::mulxu(&mut regs, Width::Byte, 1, 0);
        assert_eq!(regs.r16(0), 0x0340);

        regs.set_er32(2, 0xFFFF_1000);
        regs.set_r16(3, 0x0010);
        Instructions::mulxu(&mut regs, Width::Word, 3, 2);
        assert_eq!(regs.er32(2), 0x0001_0000);
    }

    #[test]
    fn test_mulxs_sets_n_z() {
        let (mut regs, _) = setup();
        regs.set_r16(0, 0x00FF); // low byte = -1
        regs.set_r8(1, 0x02);
        Instructions::mulxs(&mut regs, Width::Byte, 1, 0);
        assert_eq!(regs.r16(0), 0xFFFE); // -2
        assert!(regs.get_n());
        assert!(!regs.get_z());
    }

    #[test]
    fn test_divxu_byte_quotient_and_remainder() {
        let (mut regs, _) = setup();
        regs.set_r16(0, 100);
        regs.set_r8(1, 7);
        Instructions::divxu(&mut regs, Width::Byte, 1, 0);
        // quotient 14 in R0L, remainder 2 in R0H
        assert_eq!(regs.r8(8), 14);
        assert_eq!(regs.r8(0), 2);
        assert!(!regs.get_z());
    }

    #[test]
    fn test_divxu_by_zero_skips_division() {
        let (mut regs, _) = setup();
        regs.set_r16(0, 100);
        regs.set_r8(1, 0);
        Instructions::divxu(&mut regs, Width::Byte, 1, 0);
        assert_eq!(regs.r16(0), 100);
        assert!(regs.get_z());
    }

    #[test]
    fn test_divxs_signed() {
        let (mut regs, _) = setup();
        regs.set_r16(0, (-100i16) as u16);
        regs.set_r8(1, 7);
        Instructions::divxs(&mut regs, Width::Byte, 1, 0);
        // -100 / 7 = -14 rem -2
        assert_eq!(regs.r8(8), (-14i8) as u8);
        assert_eq!(regs.r8(0), (-2i8) as u8);
        assert!(regs.get_n());
    }

    #[test]
    fn test_logic_ops_clear_v_keep_c() {
        let (mut regs, mut bus) = setup();
        regs.set_c(true);
        regs.set_v(true);
        regs.set_r8(0, 0xF0);
        Instructions::and(&mut regs, &mut bus, Width::Byte, Operand::Imm(0x0F), 0);
        assert_eq!(regs.r8(0), 0x00);
        assert!(regs.get_z());
        assert!(!regs.get_v());
        assert!(regs.get_c());

        Instructions::or(&mut regs, &mut bus, Width::Byte, Operand::Imm(0x81), 0);
        assert_eq!(regs.r8(0), 0x81);
        assert!(regs.get_n());

        Instructions::xor(&mut regs, &mut bus, Width::Byte, Operand::Imm(0xFF), 0);
        assert_eq!(regs.r8(0), 0x7E);
    }

    #[test]
    fn test_not_extu_exts() {
        let (mut regs, _) = setup();
        regs.set_r8(0, 0x0F);
        Instructions::not(&mut regs, Width::Byte, 0);
        assert_eq!(regs.r8(0), 0xF0);
        assert!(regs.get_n());

        regs.set_r16(1, 0xFF80);
        Instructions::extu(&mut regs, Width::Word, 1);
        assert_eq!(regs.r16(1), 0x0080);
        assert!(!regs.get_n());

        regs.set_r16(2, 0x0080);
        Instructions::exts(&mut regs, Width::Word, 2);
        assert_eq!(regs.r16(2), 0xFF80);
        assert!(regs.get_n());

        regs.set_er32(3, 0x0000_8000);
        Instructions::exts(&mut regs, Width::Long, 3);
        assert_eq!(regs.er32(3), 0xFFFF_8000);
    }

    #[test]
    fn test_shal_overflow_on_sign_change() {
        let (mut regs, _) = setup();
        regs.set_r8(0, 0x40);
        Instructions::shift(&mut regs, ShiftOp::Shal, Width::Byte, 0);
        assert_eq!(regs.r8(0), 0x80);
        assert!(regs.get_v());
        assert!(!regs.get_c());
        assert!(regs.get_n());
    }

    #[test]
    fn test_shifts_move_carry() {
        let (mut regs, _) = setup();
        regs.set_r8(0, 0x81);
        Instructions::shift(&mut regs, ShiftOp::Shll, Width::Byte, 0);
        assert_eq!(regs.r8(0), 0x02);
        assert!(regs.get_c());
        assert!(!regs.get_v());

        regs.set_r8(1, 0x81);
        Instructions::shift(&mut regs, ShiftOp::Shlr, Width::Byte, 1);
        assert_eq!(regs.r8(1), 0x40);
        assert!(regs.get_c());

        regs.set_r8(2, 0x81);
        Instructions::shift(&mut regs, ShiftOp::Shar, Width::Byte, 2);
        assert_eq!(regs.r8(2), 0xC0);
        assert!(regs.get_c());
    }

    #[test]
    fn test_rotates() {
        let (mut regs, _) = setup();
        regs.set_r8(0, 0x81);
        Instructions::shift(&mut regs, ShiftOp::Rotl, Width::Byte, 0);
        assert_eq!(regs.r8(0), 0x03);
        assert!(regs.get_c());

        regs.set_r8(1, 0x81);
        Instructions::shift(&mut regs, ShiftOp::Rotr, Width::Byte, 1);
        assert_eq!(regs.r8(1), 0xC0);
        assert!(regs.get_c());

        // ROTXL pulls the old carry into bit 0
        regs.set_c(true);
        regs.set_r8(2, 0x00);
        Instructions::shift(&mut regs, ShiftOp::Rotxl, Width::Byte, 2);
        assert_eq!(regs.r8(2), 0x01);
        assert!(!regs.get_c());

        regs.set_c(true);
        regs.set_r8(3, 0x00);
        Instructions::shift(&mut regs, ShiftOp::Rotxr, Width::Byte, 3);
        assert_eq!(regs.r8(3), 0x80);
        assert!(!regs.get_c());
    }

    #[test]
    fn test_bit_ops_on_register() {
        let (mut regs, mut bus) = setup();
        regs.set_r8(0, 0x00);
        Instructions::bit(
            &mut regs,
            &mut bus,
            BitOp::Bset,
            BitSource::Imm(3),
            BitTarget::Reg(0),
        );
        assert_eq!(regs.r8(0), 0x08);

        Instructions::bit(
            &mut regs,
            &mut bus,
            BitOp::Btst,
            BitSource::Imm(3),
            BitTarget::Reg(0),
        );
        assert!(!regs.get_z());
        Instructions::bit(
            &mut regs,
            &mut bus,
            BitOp::Btst,
            BitSource::Imm(4),
            BitTarget::Reg(0),
        );
        assert!(regs.get_z());

        Instructions::bit(
            &mut regs,
            &mut bus,
            BitOp::Bnot,
            BitSource::Imm(3),
            BitTarget::Reg(0),
        );
        assert_eq!(regs.r8(0), 0x00);
    }

    #[test]
    fn test_bit_number_from_register() {
        let (mut regs, mut bus) = setup();
        regs.set_r8(1, 0x0A); // low three bits = 2
        regs.set_r8(0, 0x00);
        Instructions::bit(
            &mut regs,
            &mut bus,
            BitOp::Bset,
            BitSource::Reg(1),
            BitTarget::Reg(0),
        );
        assert_eq!(regs.r8(0), 0x04);
    }

    #[test]
    fn test_bit_ops_on_memory() {
        let (mut regs, mut bus) = setup();
        regs.set_er32(2, 0xF800);
        Instructions::bit(
            &mut regs,
            &mut bus,
            BitOp::Bset,
            BitSource::Imm(7),
            BitTarget::Ind(2),
        );
        assert_eq!(bus.read8(0xF800), 0x80);

        // @aa:8 targets the 0xFF00 page (on-chip RAM here)
        Instructions::bit(
            &mut regs,
            &mut bus,
            BitOp::Bset,
            BitSource::Imm(0),
            BitTarget::Abs8(0x10),
        );
        assert_eq!(bus.read8(0xFF10), 0x01);
        Instructions::bit(
            &mut regs,
            &mut bus,
            BitOp::Bclr,
            BitSource::Imm(0),
            BitTarget::Abs8(0x10),
        );
        assert_eq!(bus.read8(0xFF10), 0x00);
    }

    #[test]
    fn test_bit_accumulate_ops() {
        let (mut regs, mut bus) = setup();
        regs.set_r8(0, 0x01); // bit 0 set

        regs.set_c(true);
        Instructions::bit(
            &mut regs,
            &mut bus,
            BitOp::Band,
            BitSource::Imm(0),
            BitTarget::Reg(0),
        );
        assert!(regs.get_c());

        Instructions::bit(
            &mut regs,
            &mut bus,
            BitOp::Biand,
            BitSource::Imm(0),
            BitTarget::Reg(0),
        );
        assert!(!regs.get_c());

        Instructions::bit(
            &mut regs,
            &mut bus,
            BitOp::Bor,
            BitSource::Imm(0),
            BitTarget::Reg(0),
        );
        assert!(regs.get_c());

        Instructions::bit(
            &mut regs,
            &mut bus,
            BitOp::Bxor,
            BitSource::Imm(0),
            BitTarget::Reg(0),
        );
        assert!(!regs.get_c());

        Instructions::bit(
            &mut regs,
            &mut bus,
            BitOp::Bld,
            BitSource::Imm(0),
            BitTarget::Reg(0),
        );
        assert!(regs.get_c());

        Instructions::bit(
            &mut regs,
            &mut bus,
            BitOp::Bild,
            BitSource::Imm(0),
            BitTarget::Reg(0),
        );
        assert!(!regs.get_c());
    }

    #[test]
    fn test_bst_bist() {
        let (mut regs, mut bus) = setup();
        regs.set_c(true);
        regs.set_r8(0, 0x00);
        Instructions::bit(
            &mut regs,
            &mut bus,
            BitOp::Bst,
            BitSource::Imm(5),
            BitTarget::Reg(0),
        );
        assert_eq!(regs.r8(0), 0x20);

        Instructions::bit(
            &mut regs,
            &mut bus,
            BitOp::Bist,
            BitSource::Imm(5),
            BitTarget::Reg(0),
        );
        assert_eq!(regs.r8(0), 0x00);
    }

    #[test]
    fn test_bcc_taken_and_not_taken() {
        let (mut regs, _) = setup();
        regs.pc = 0x100;
        regs.set_z(true);
        Instructions::bcc(&mut regs, Cond::Eq, 0x10);
        assert_eq!(regs.pc, 0x110);

        Instructions::bcc(&mut regs, Cond::Ne, 0x10);
        assert_eq!(regs.pc, 0x110);

        Instructions::bcc(&mut regs, Cond::Always, -0x10);
        assert_eq!(regs.pc, 0x100);
    }

    #[test]
    fn test_jsr_rts_round_trip() {
        let (mut regs, mut bus) = setup();
        regs.set_sp(0xFF80);
        regs.pc = 0x0004; // return address
        Instructions::jsr(&mut regs, &mut bus, JumpTarget::Abs24(0x10));
        assert_eq!(regs.pc, 0x10);
        assert_eq!(regs.sp(), 0xFF7E);
        assert_eq!(bus.read16(0xFF7E), 0x0004);

        Instructions::rts(&mut regs, &mut bus);
        assert_eq!(regs.pc, 0x0004);
        assert_eq!(regs.sp(), 0xFF80);
    }

    #[test]
    fn test_bsr_pushes_and_branches() {
        let (mut regs, mut bus) = setup();
        regs.set_sp(0xFF80);
        regs.pc = 0x0002;
        Instructions::bsr(&mut regs, &mut bus, 0x20);
        assert_eq!(regs.pc, 0x0022);
        assert_eq!(bus.read16(0xFF7E), 0x0002);
    }

    #[test]
    fn test_jmp_targets() {
        let (mut regs, mut bus) = setup();
        regs.set_er32(2, 0x0123_4567);
        Instructions::jmp(&mut regs, &mut bus, JumpTarget::Ind(2));
        assert_eq!(regs.pc, 0x0023_4567);

        Instructions::jmp(&mut regs, &mut bus, JumpTarget::Abs24(0x40));
        assert_eq!(regs.pc, 0x40);

        // Vector at 0x0020 in ROM
        let mut img = vec![0u8; crate::rom::Rom::SIZE];
        img[0x20] = 0x12;
        img[0x21] = 0x34;
        bus.rom.init(img);
        Instructions::jmp(&mut regs, &mut bus, JumpTarget::MemInd(0x20));
        assert_eq!(regs.pc, 0x1234);
    }

    #[test]
    fn test_rte_restores_ccr_then_pc() {
        let (mut regs, mut bus) = setup();
        regs.set_sp(0xFF7C);
        bus.write16(0xFF7C, 0x0085); // CCR in the low byte
        bus.write16(0xFF7E, 0x0456); // return PC
        Instructions::rte(&mut regs, &mut bus);
        assert_eq!(regs.ccr, 0x85);
        assert_eq!(regs.pc, 0x0456);
        assert_eq!(regs.sp(), 0xFF80);
    }

    #[test]
    fn test_ccr_transfer_ops() {
        let (mut regs, mut bus) = setup();
        Instructions::ldc(
            &mut regs,
            &mut bus,
            Width::Byte,
            Operand::Imm(ccr::I as u32 | ccr::C as u32),
        );
        assert_eq!(regs.ccr, 0x81);

        Instructions::andc(&mut regs, 0x80);
        assert_eq!(regs.ccr, 0x80);
        Instructions::orc(&mut regs, 0x04);
        assert_eq!(regs.ccr, 0x84);
        Instructions::xorc(&mut regs, 0x84);
        assert_eq!(regs.ccr, 0x00);

        regs.ccr = 0x2A;
        Instructions::stc(&mut regs, &mut bus, Width::Byte, Operand::Reg(5));
        assert_eq!(regs.r8(5), 0x2A);

        Instructions::ldc(&mut regs, &mut bus, Width::Byte, Operand::Reg(5));
        assert_eq!(regs.ccr, 0x2A);
    }

    #[test]
    fn test_eepmov_byte_block_copy() {
        let (mut regs, mut bus) = setup();
        for (i, b) in [0x11u8, 0x22, 0x33, 0x44].iter().enumerate() {
            bus.write8(0xF900 + i as u16, *b);
        }
        regs.set_r8(12, 4); // R4L
        regs.set_er32(5, 0xF900);
        regs.set_er32(6, 0xFA00);

        Instructions::eepmov(&mut regs, &mut bus, Width::Byte);

        for (i, b) in [0x11u8, 0x22, 0x33, 0x44].iter().enumerate() {
            assert_eq!(bus.read8(0xFA00 + i as u16), *b);
        }
        assert_eq!(regs.er32(5), 0xF904);
        assert_eq!(regs.er32(6), 0xFA04);
        assert_eq!(regs.r8(12), 0);
    }

    #[test]
    fn test_eepmov_word_count() {
        let (mut regs, mut bus) = setup();
        bus.write8(0xF900, 0xAB);
        bus.write8(0xF901, 0xCD);
        regs.set_r16(4, 2);
        regs.set_er32(5, 0xF900);
        regs.set_er32(6, 0xFB00);

        Instructions::eepmov(&mut regs, &mut bus, Width::Word);

        assert_eq!(bus.read8(0xFB00), 0xAB);
        assert_eq!(bus.read8(0xFB01), 0xCD);
        assert_eq!(regs.r16(4), 0);
    }
}
