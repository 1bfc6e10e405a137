#![warn(clippy::pedantic)]
// Common patterns that make emulator code more readable
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::verbose_bit_mask)]
#![allow(clippy::if_not_else)]

//! Pokéwalker emulator core.
//!
//! A cycle-stepped system emulator for the walker's H8/300H-family
//! microcontroller:
//!
//! - [`cpu`] - the H8/300H interpreter (fetch, decode, execute)
//! - [`registers`] - the register file with its overlapping views
//! - [`decode`] / [`instructions`] - instruction decoding and execution
//! - [`bus`] - address decode between ROM, RAM, SSU and open bus
//! - [`rom`], [`ram`], [`ssu`] - the on-chip peripherals
//! - [`core`] - the owning aggregate the host drives
//! - [`frontend`] - the host contract and a headless implementation
//!
//! The host calls [`Core::step`] for one instruction or
//! [`Core::frame_advance`] for a frame, then reads the framebuffer and
//! feeds input back in. Everything is deterministic for identical inputs.

pub mod bus;
pub mod core;
pub mod cpu;
pub mod decode;
pub mod frontend;
pub mod instructions;
pub mod ram;
pub mod registers;
pub mod rom;
pub mod ssu;

pub use crate::core::{
    Core, CoreError, CoreFile, CpuSnapshot, Key, KeyState, EEPROM_SIZE, FLASH_ROM_SIZE,
};
