//! jog-file: audio file decoding
//!
//! Read-only import for scrub sources:
//! - WAV (via hound) - native fast path
//! - FLAC / MP3 / OGG Vorbis (via symphonia)
//!
//! Exposes a probe-then-read decoder handle plus one-shot helpers.

mod decode;
mod error;

pub use decode::*;
pub use error::*;
