//! Walker system core
//!
//! The owning aggregate that ties the CPU to the bus-attached peripherals
//! and gives the host a small synchronous surface:
//!
//! - file loading and lifecycle (`preinit`/`load_file`/`init`/`reset`)
//! - execution (`step` for one instruction, `frame_advance` for one frame)
//! - the framebuffer view and key input
//! - debug accessors for registers and memory
//!
//! Everything is single-threaded: the host calls in, the core runs to
//! completion of the requested unit of work and returns. One CPU
//! instruction is atomic from the host's perspective, and the bus tick
//! (which clocks the SSU) happens once per instruction.
//!
//! Load-time problems are the only errors that surface to the host;
//! run-time conditions stay inside guest-visible CPU/SSU state.

use crate::bus::Bus;
use crate::cpu::Cpu;
use crate::rom::Rom;
use log::info;
use serde::Serialize;
use std::fmt;

/// Expected flash ROM image size (48 KiB).
pub const FLASH_ROM_SIZE: usize = Rom::SIZE;

/// Expected EEPROM image size (64 KiB).
pub const EEPROM_SIZE: usize = 64 * 1024;

/// LCD width in pixels.
pub const LCD_WIDTH: usize = 96;

/// LCD height in pixels.
pub const LCD_HEIGHT: usize = 64;

/// Framebuffer size in pixels (32-bit RGBA each).
pub const FRAME_PIXELS: usize = LCD_WIDTH * LCD_HEIGHT;

/// Instructions executed per `frame_advance` call.
///
/// The walker clocks its CPU at 3.6864 MHz and averages about two states
/// per instruction; at ~60 Hz that is 30720 instructions per frame. The
/// LCD controller that would originate real VBlank timing is not modeled,
/// so the frame budget is a deterministic stand-in.
pub const INSTRUCTIONS_PER_FRAME: u32 = 30_720;

/// Pixel value for an undriven LCD (all white, opaque).
const BLANK_PIXEL: u32 = 0xFFFF_FFFF;

/// The kinds of image file the core accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoreFile {
    FlashRom,
    Eeprom,
}

impl CoreFile {
    /// Expected byte length for this file kind.
    #[must_use]
    pub const fn expected_size(self) -> usize {
        match self {
            Self::FlashRom => FLASH_ROM_SIZE,
            Self::Eeprom => EEPROM_SIZE,
        }
    }
}

impl fmt::Display for CoreFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FlashRom => write!(f, "flash ROM"),
            Self::Eeprom => write!(f, "EEPROM"),
        }
    }
}

/// Walker keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Left,
    Middle,
    Right,
}

impl Key {
    const fn index(self) -> usize {
        match self {
            Self::Left => 0,
            Self::Middle => 1,
            Self::Right => 2,
        }
    }
}

/// Key transition reported by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyState {
    Pressed,
    Released,
}

/// Errors that can occur while bringing the core up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CoreError {
    /// A ROM/EEPROM image had the wrong length.
    BadFileSize {
        file: CoreFile,
        expected: usize,
        actual: usize,
    },
    /// An image file could not be read.
    MissingFile { path: String },
    /// The core was driven out of order (e.g. `init` before the images
    /// were loaded).
    UnknownCoreFile,
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadFileSize {
                file,
                expected,
                actual,
            } => write!(
                f,
                "{file} image has wrong size: expected {expected} bytes, got {actual}"
            ),
            Self::MissingFile { path } => write!(f, "cannot read image file: {path}"),
            Self::UnknownCoreFile => write!(f, "core file loaded out of order"),
        }
    }
}

impl std::error::Error for CoreError {}

/// Serializable CPU state snapshot for the debug surface.
#[derive(Clone, Debug, Serialize)]
pub struct CpuSnapshot {
    pub er: [u32; 8],
    pub pc: u32,
    pub ccr: u8,
    pub instructions: u64,
}

/// The emulated walker: CPU, bus-attached peripherals, framebuffer and
/// key state.
pub struct Core {
    cpu: Cpu,
    bus: Bus,
    /// EEPROM image, retained for a serial-attached storage model.
    eeprom: Vec<u8>,
    framebuffer: Box<[u32; FRAME_PIXELS]>,
    /// Pressed state of Left/Middle/Right.
    keys: [bool; 3],
    rom_loaded: bool,
    eeprom_loaded: bool,
}

impl Default for Core {
    fn default() -> Self {
        Self::new()
    }
}

impl Core {
    /// Creates a core with no images loaded.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cpu: Cpu::new(),
            bus: Bus::new(),
            eeprom: Vec::new(),
            framebuffer: Box::new([BLANK_PIXEL; FRAME_PIXELS]),
            keys: [false; 3],
            rom_loaded: false,
            eeprom_loaded: false,
        }
    }

    /// Clears any previously-installed image buffers. Call before a fresh
    /// round of `load_file`.
    pub fn preinit(&mut self) {
        self.eeprom.clear();
        self.rom_loaded = false;
        self.eeprom_loaded = false;
    }

    /// Installs an image file. The byte length must match the file kind
    /// exactly.
    pub fn load_file(&mut self, kind: CoreFile, bytes: Vec<u8>) -> Result<(), CoreError> {
        if bytes.len() != kind.expected_size() {
            return Err(CoreError::BadFileSize {
                file: kind,
                expected: kind.expected_size(),
                actual: bytes.len(),
            });
        }
        match kind {
            CoreFile::FlashRom => {
                self.bus.rom.init(bytes);
                self.rom_loaded = true;
            }
            CoreFile::Eeprom => {
                self.eeprom = bytes;
                self.eeprom_loaded = true;
            }
        }
        info!("{kind} image installed");
        Ok(())
    }

    /// Final wiring after both images are loaded.
    pub fn init(&mut self) -> Result<(), CoreError> {
        if !self.rom_loaded || !self.eeprom_loaded {
            return Err(CoreError::UnknownCoreFile);
        }
        self.reset();
        Ok(())
    }

    /// Resets CPU, RAM, SSU and the flash-control registers. The ROM and
    /// EEPROM images are untouched.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.bus.ram.reset();
        self.bus.ssu.reset();
        self.bus.rom.reset();
        self.framebuffer.fill(BLANK_PIXEL);
        info!("core reset");
    }

    /// Executes exactly one CPU instruction and one bus tick.
    pub fn step(&mut self) {
        self.cpu.step(&mut self.bus);
        self.bus.cycle();
    }

    /// Runs until the next VBlank. With no LCD controller modeled, this is
    /// a fixed instruction budget; the caller treats the return as the
    /// frame-ready signal.
    pub fn frame_advance(&mut self) {
        for _ in 0..INSTRUCTIONS_PER_FRAME {
            self.step();
        }
    }

    /// Borrowed view of the 96x64 RGBA framebuffer.
    #[must_use]
    pub const fn video_buffer(&self) -> &[u32; FRAME_PIXELS] {
        &self.framebuffer
    }

    /// Records a key transition from the host.
    pub fn set_input(&mut self, key: Key, state: KeyState) {
        self.keys[key.index()] = matches!(state, KeyState::Pressed);
    }

    /// True while the given key is held.
    #[must_use]
    pub const fn key_pressed(&self, key: Key) -> bool {
        self.keys[key.index()]
    }

    /// Reads a register by name (`er0`..`er7`, `sp`, `pc`, `ccr`).
    #[must_use]
    pub fn read_register(&self, name: &str) -> Option<u32> {
        let name = name.to_ascii_lowercase();
        match name.as_str() {
            "pc" => Some(self.cpu.registers.pc),
            "ccr" => Some(self.cpu.registers.ccr as u32),
            "sp" => Some(self.cpu.registers.sp()),
            _ => {
                let index = name.strip_prefix("er")?.parse::<usize>().ok()?;
                if index < 8 {
                    Some(self.cpu.registers.er32(index))
                } else {
                    None
                }
            }
        }
    }

    /// Writes a register by name. Returns false for unknown names.
    pub fn write_register(&mut self, name: &str, value: u32) -> bool {
        let name = name.to_ascii_lowercase();
        match name.as_str() {
            "pc" => self.cpu.registers.pc = value,
            "ccr" => self.cpu.registers.ccr = value as u8,
            "sp" => self.cpu.registers.set_sp(value),
            _ => {
                let Some(index) = name
                    .strip_prefix("er")
                    .and_then(|n| n.parse::<usize>().ok())
                    .filter(|&n| n < 8)
                else {
                    return false;
                };
                self.cpu.registers.set_er32(index, value);
            }
        }
        true
    }

    /// Reads a byte through the bus, side effects included.
    pub fn read_memory(&mut self, addr: u16) -> u8 {
        self.bus.read8(addr)
    }

    /// Writes a byte through the bus.
    pub fn write_memory(&mut self, addr: u16, value: u8) {
        self.bus.write8(addr, value);
    }

    /// Serializable CPU state for the debug surface.
    #[must_use]
    pub fn snapshot(&self) -> CpuSnapshot {
        CpuSnapshot {
            er: self.cpu.registers.er,
            pc: self.cpu.registers.pc,
            ccr: self.cpu.registers.ccr,
            instructions: self.cpu.instruction_count(),
        }
    }

    /// Formats the CPU state for logging.
    #[must_use]
    pub fn dump_state(&self) -> String {
        self.cpu.dump_state()
    }

    /// The retained EEPROM image.
    #[must_use]
    pub fn eeprom(&self) -> &[u8] {
        &self.eeprom
    }
}
