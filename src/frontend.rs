//! Host frontend contract
//!
//! The core does not open windows or read input devices itself; a frontend
//! does. The contract is small: the frontend is initialized once, then the
//! run loop advances the core one frame at a time and hands each finished
//! frame to the frontend, which reads the framebuffer, pumps input events
//! into the core, and decides whether to keep running.
//!
//! A windowing frontend lives outside this crate. The headless frontend
//! here paces frames to roughly 60 Hz and is what the CLI binary drives;
//! it is also convenient for scripted runs with a frame budget.

use crate::core::Core;
use std::time::{Duration, Instant};

/// Nominal frame duration (~60 Hz).
const FRAME_TIME: Duration = Duration::from_micros(16_667);

/// What a host must provide to drive the core.
pub trait Frontend {
    /// Called once before the run loop starts.
    fn init(&mut self) -> Result<(), String>;

    /// Called by the run loop when a frame is ready. The frontend reads
    /// `core.video_buffer()`, feeds `core.set_input(..)`, and returns
    /// false to stop the loop.
    fn on_vblank(&mut self, core: &mut Core) -> bool;
}

/// Runs the core until the frontend stops the loop.
pub fn run(core: &mut Core, frontend: &mut dyn Frontend) {
    loop {
        core.frame_advance();
        if !frontend.on_vblank(core) {
            break;
        }
    }
}

/// A frontend with no display: paces frames in real time and optionally
/// stops after a fixed number of frames.
pub struct HeadlessFrontend {
    /// Stop after this many frames; `None` runs until interrupted.
    frame_limit: Option<u64>,
    frames: u64,
    /// Sleep to hold ~60 Hz. Disabled for tests.
    pace: bool,
    last_frame: Instant,
}

impl HeadlessFrontend {
    /// Creates a headless frontend with an optional frame budget.
    #[must_use]
    pub fn new(frame_limit: Option<u64>) -> Self {
        Self {
            frame_limit,
            frames: 0,
            pace: true,
            last_frame: Instant::now(),
        }
    }

    /// Disables real-time pacing; frames run as fast as they emulate.
    #[must_use]
    pub fn unpaced(mut self) -> Self {
        self.pace = false;
        self
    }

    /// Frames delivered so far.
    #[must_use]
    pub const fn frames(&self) -> u64 {
        self.frames
    }
}

impl Frontend for HeadlessFrontend {
    fn init(&mut self) -> Result<(), String> {
        self.last_frame = Instant::now();
        Ok(())
    }

    fn on_vblank(&mut self, _core: &mut Core) -> bool {
        self.frames += 1;

        if self.pace {
            let elapsed = self.last_frame.elapsed();
            if elapsed < FRAME_TIME {
                std::thread::sleep(FRAME_TIME - elapsed);
            }
            self.last_frame = Instant::now();
        }

        match self.frame_limit {
            Some(limit) => self.frames < limit,
            None => true,
        }
    }
}
