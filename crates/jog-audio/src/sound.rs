//! Playable PCM, converted once at load time to the engine output format.

use jog_file::DecodedAudio;

/// PCM for one loaded file as interleaved stereo at the engine rate.
///
/// The source rate and frame count are kept so seek offsets given in
/// source samples can be mapped onto the converted data.
#[derive(Debug, Clone)]
pub struct Sound {
    data: Vec<f32>,
    frames: u64,
    out_rate: u32,
    src_rate: u32,
    src_frames: u64,
}

impl Sound {
    /// Convert decoded source audio to interleaved stereo at `out_rate`.
    ///
    /// Mono duplicates into both channels; sources with more than two
    /// channels keep the first two.
    pub fn from_decoded(decoded: &DecodedAudio, out_rate: u32) -> Sound {
        let src_rate = decoded.sample_rate.max(1);
        let out_rate = out_rate.max(1);
        let src_frames = decoded.frames();
        let stereo = fold_to_stereo(&decoded.samples, decoded.channels);
        let data = if src_rate == out_rate {
            stereo
        } else {
            resample_stereo(&stereo, src_rate, out_rate)
        };
        let frames = (data.len() / 2) as u64;
        Sound {
            data,
            frames,
            out_rate,
            src_rate,
            src_frames,
        }
    }

    /// Frame count of the converted data.
    #[inline]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Frame count of the source before conversion.
    #[inline]
    pub fn src_frames(&self) -> u64 {
        self.src_frames
    }

    #[inline]
    pub fn src_rate(&self) -> u32 {
        self.src_rate
    }

    #[inline]
    pub fn out_rate(&self) -> u32 {
        self.out_rate
    }

    /// Converted-domain position for a source-domain sample offset.
    /// Saturates rather than wrapping for offsets near `u64::MAX`, which
    /// out-of-range seek requests produce.
    #[inline]
    pub fn map_source_frame(&self, src_frame: u64) -> u64 {
        if self.src_rate == self.out_rate {
            src_frame
        } else {
            let mapped = (src_frame as u128 * self.out_rate as u128) / self.src_rate as u128;
            mapped.min(u64::MAX as u128) as u64
        }
    }

    /// Stereo sample pair at `frame`; silence past the end.
    #[inline]
    pub fn frame(&self, frame: u64) -> (f32, f32) {
        if frame >= self.frames {
            return (0.0, 0.0);
        }
        let i = frame as usize * 2;
        (self.data[i], self.data[i + 1])
    }
}

fn fold_to_stereo(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => {
            let mut out = Vec::with_capacity(samples.len() * 2);
            for &s in samples {
                out.push(s);
                out.push(s);
            }
            out
        }
        2 => samples.to_vec(),
        n => {
            let n = n as usize;
            let frames = samples.len() / n;
            let mut out = Vec::with_capacity(frames * 2);
            for f in 0..frames {
                out.push(samples[f * n]);
                out.push(samples[f * n + 1]);
            }
            out
        }
    }
}

/// Linear-interpolation resample of interleaved stereo data.
fn resample_stereo(input: &[f32], src_rate: u32, dst_rate: u32) -> Vec<f32> {
    let in_frames = input.len() / 2;
    if in_frames == 0 {
        return Vec::new();
    }

    let ratio = f64::from(src_rate) / f64::from(dst_rate);
    let out_frames = (in_frames as f64 / ratio) as usize;
    let mut out = Vec::with_capacity(out_frames * 2);

    for i in 0..out_frames {
        let pos = i as f64 * ratio;
        let idx = pos as usize;
        let frac = (pos - idx as f64) as f32;
        let next = (idx + 1).min(in_frames - 1);

        let l = input[idx * 2] * (1.0 - frac) + input[next * 2] * frac;
        let r = input[idx * 2 + 1] * (1.0 - frac) + input[next * 2 + 1] * frac;
        out.push(l);
        out.push(r);
    }

    out
}
