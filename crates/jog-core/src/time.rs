//! Video frame <-> PCM sample conversions.
//!
//! Every conversion recomputes from the frame index, the frame rate, and the
//! source sample rate; nothing here accumulates state, so repeated seeking
//! stays numerically stable.

use serde::{Deserialize, Serialize};

/// Minimum accepted frame rate. Lower values (and NaN) clamp here.
pub const MIN_FPS: f64 = 1.0;

/// Video frame rate in frames per second, clamped to at least [`MIN_FPS`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Fps(f64);

impl Fps {
    pub fn new(value: f64) -> Self {
        // `value >= MIN_FPS` is false for NaN, so NaN clamps too
        if value >= MIN_FPS {
            Self(value)
        } else {
            Self(MIN_FPS)
        }
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl Default for Fps {
    fn default() -> Self {
        Self(25.0)
    }
}

impl From<f64> for Fps {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<Fps> for f64 {
    fn from(fps: Fps) -> Self {
        fps.0
    }
}

/// Waveform channel selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channel {
    Left,
    Right,
}

/// PCM sample offset for the start of `frame`, in source-rate samples.
///
/// Rounded to the nearest sample. Negative frames map to time before the
/// stream and have no representable offset.
pub fn frame_to_pcm(frame: i64, fps: Fps, sample_rate: u32) -> Option<u64> {
    let start_seconds = frame as f64 / fps.get();
    let pcm = (start_seconds * f64::from(sample_rate)).round();
    if pcm < 0.0 { None } else { Some(pcm as u64) }
}

/// PCM samples covered by one video frame, truncated to a whole sample
/// count. The sub-sample remainder at rates like 48000/23.976 is dropped,
/// not carried between frames.
pub fn samples_per_frame(sample_rate: u32, fps: Fps) -> u64 {
    (f64::from(sample_rate) / fps.get()) as u64
}

/// Whole video frames covered by `total_pcm_frames` of audio at
/// `sample_rate`. Zero when the rate is unknown.
pub fn pcm_frames_to_video_frames(total_pcm_frames: u64, sample_rate: u32, fps: Fps) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    let seconds = total_pcm_frames as f64 / f64::from(sample_rate);
    (seconds * fps.get()) as u64
}
