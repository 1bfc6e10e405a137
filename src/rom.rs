//! Flash ROM model
//!
//! 48 KiB of on-chip flash holds the walker's firmware at 0x0000-0xBFFF.
//! The same chip select also decodes the five flash-control registers in the
//! I/O page; any access whose address has both of the top two bits set
//! (`addr & 0xC000 == 0xC000`) falls outside the image and addresses a
//! control register or open bus.
//!
//! ## Control registers
//!
//! | Address | Register | Role                      |
//! |---------|----------|---------------------------|
//! | 0xF020  | FLMCR1   | Flash mode control 1      |
//! | 0xF021  | FLMCR2   | Flash mode control 2      |
//! | 0xF022  | FLPWCR   | Flash power control       |
//! | 0xF023  | EBR1     | Erase block select        |
//! | 0xF02B  | FENR     | Flash enable              |
//!
//! The registers store their last written value and read it back; no
//! programming or erase behavior is modeled. The image is read-only from the
//! bus - firmware self-programming sequences are ignored.

use std::fmt;

/// Flash-control register addresses.
pub mod regs {
    /// Flash memory control register 1
    pub const FLMCR1: u16 = 0xF020;
    /// Flash memory control register 2
    pub const FLMCR2: u16 = 0xF021;
    /// Flash power control register
    pub const FLPWCR: u16 = 0xF022;
    /// Erase block register 1
    pub const EBR1: u16 = 0xF023;
    /// Flash memory enable register
    pub const FENR: u16 = 0xF02B;
}

/// 48 KiB flash ROM region plus its control registers.
#[derive(Clone)]
pub struct Rom {
    /// Firmware image (48 KiB)
    data: Vec<u8>,
    flmcr1: u8,
    flmcr2: u8,
    flpwcr: u8,
    ebr1: u8,
    fenr: u8,
}

impl Default for Rom {
    fn default() -> Self {
        Self::new()
    }
}

impl Rom {
    /// ROM size: 48 KiB
    pub const SIZE: usize = 48 * 1024;

    /// Creates a new empty ROM region.
    #[must_use]
    pub fn new() -> Self {
        Self {
            // Unprogrammed flash reads as 0xFF
            data: vec![0xFF; Self::SIZE],
            flmcr1: 0,
            flmcr2: 0,
            flpwcr: 0,
            ebr1: 0,
            fenr: 0,
        }
    }

    /// Installs a firmware image. The caller has already validated the
    /// length; anything other than exactly 48 KiB is a caller bug.
    ///
    /// # Panics
    /// Panics if `image` is not exactly `Self::SIZE` bytes.
    pub fn init(&mut self, image: Vec<u8>) {
        assert_eq!(image.len(), Self::SIZE, "ROM image must be 48 KiB");
        self.data = image;
    }

    /// Restores the control registers to their reset values. The firmware
    /// image is untouched.
    pub fn reset(&mut self) {
        self.flmcr1 = 0;
        self.flmcr2 = 0;
        self.flpwcr = 0;
        self.ebr1 = 0;
        self.fenr = 0;
    }

    /// True when `addr` falls inside the firmware image rather than the
    /// control-register window.
    #[inline]
    const fn in_image(addr: u16) -> bool {
        addr & 0xC000 != 0xC000
    }

    /// Reads a byte from the image or a control register.
    #[inline]
    pub fn read8(&self, addr: u16) -> u8 {
        if Self::in_image(addr) {
            return self.data[addr as usize];
        }
        match addr {
            regs::FLMCR1 => self.flmcr1,
            regs::FLMCR2 => self.flmcr2,
            regs::FLPWCR => self.flpwcr,
            regs::EBR1 => self.ebr1,
            regs::FENR => self.fenr,
            _ => 0xFF,
        }
    }

    /// Writes a byte. Image writes are dropped; control-register writes are
    /// stored but trigger no flash operation.
    #[inline]
    pub fn write8(&mut self, addr: u16, value: u8) {
        if Self::in_image(addr) {
            return;
        }
        match addr {
            regs::FLMCR1 => self.flmcr1 = value,
            regs::FLMCR2 => self.flmcr2 = value,
            regs::FLPWCR => self.flpwcr = value,
            regs::EBR1 => self.ebr1 = value,
            regs::FENR => self.fenr = value,
            _ => {}
        }
    }

    /// Reads a word (big-endian).
    #[inline]
    pub fn read16(&self, addr: u16) -> u16 {
        let hi = self.read8(addr) as u16;
        let lo = self.read8(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    /// Writes a word (big-endian). Image words are dropped like bytes.
    #[inline]
    pub fn write16(&mut self, addr: u16, value: u16) {
        self.write8(addr, (value >> 8) as u8);
        self.write8(addr.wrapping_add(1), value as u8);
    }
}

impl fmt::Debug for Rom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rom").field("size", &Self::SIZE).finish()
    }
}
