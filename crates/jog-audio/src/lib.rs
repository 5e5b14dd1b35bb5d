//! jog-audio: audio output engine for frame scrubbing
//!
//! A cpal output stream held on a dedicated thread, a lock-free command ring
//! into the real-time callback, and a single voice that plays pre-converted
//! PCM with a sample-accurate armed stop against the engine clock.

use serde::{Deserialize, Serialize};

mod device;
mod engine;
mod error;
mod sound;
mod voice;

pub use device::*;
pub use engine::*;
pub use error::*;
pub use sound::*;
pub use voice::*;

/// Default period size in frames requested from the output device.
/// WASAPI glitches and can stall the host UI thread with very small
/// buffers; elsewhere 128 frames keeps scrub latency low.
pub const DEFAULT_PERIOD_FRAMES: u32 = if cfg!(windows) { 512 } else { 128 };

/// Output stream configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Requested sample rate; the device may negotiate another.
    pub sample_rate: u32,
    /// Requested output channel count.
    pub channels: u16,
    /// Requested period size in frames.
    pub period_frames: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 2,
            period_frames: DEFAULT_PERIOD_FRAMES,
        }
    }
}
