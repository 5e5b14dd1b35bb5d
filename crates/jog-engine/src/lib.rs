//! Frame-synchronous audio scrubbing engine.
//!
//! Pairs a decoded audio file with an external video frame cursor: each
//! cursor move plays exactly one video frame's worth of audio, stopped
//! engine-side against the output clock. See [`ScrubController`] for the
//! control surface.

mod controller;
mod error;
mod waveform;

pub use controller::*;
pub use error::*;
pub use waveform::*;

pub use jog_core::{Channel, Fps, MIN_FPS};

use serde::{Deserialize, Serialize};

/// Top-level engine configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrubConfig {
    /// Bring the output device up at construction instead of on the
    /// first file load.
    pub eager_init: bool,
    pub engine: jog_audio::EngineConfig,
}

impl Default for ScrubConfig {
    fn default() -> ScrubConfig {
        ScrubConfig {
            eager_init: false,
            engine: jog_audio::EngineConfig::default(),
        }
    }
}
