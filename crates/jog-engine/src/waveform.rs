//! Fixed-width waveform peak generation.
//!
//! One absolute peak per output pixel per channel:
//! - samples per pixel = total frames / width, floored, never below 1
//! - trailing frames that do not fill a bucket are dropped
//! - mono input is mirrored onto both channels

use jog_core::Channel;

/// Per-channel peak image at a fixed pixel width.
///
/// Both channels always have the same length; an empty image means no
/// payload was available when it was built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WaveformImage {
    left: Vec<f32>,
    right: Vec<f32>,
}

impl WaveformImage {
    /// Reduce an interleaved payload to `width` peaks per channel.
    ///
    /// Returns the empty image when the payload is empty or `width` is
    /// zero. Channels beyond the first two are ignored.
    pub fn build(payload: &[f32], channels: u16, width: usize) -> WaveformImage {
        let channels = channels as usize;
        if payload.is_empty() || channels == 0 || width == 0 {
            return WaveformImage::default();
        }

        let total_frames = payload.len() / channels;
        let samples_per_pixel = (total_frames / width).max(1);

        let mut left = vec![0.0f32; width];
        let mut right = vec![0.0f32; width];

        for px in 0..width {
            let start = px * samples_per_pixel;
            let end = (start + samples_per_pixel).min(total_frames);

            let mut peak_l = 0.0f32;
            let mut peak_r = 0.0f32;
            for frame in start..end {
                let base = frame * channels;
                let l = payload[base].abs();
                let r = if channels > 1 {
                    payload[base + 1].abs()
                } else {
                    l
                };
                if l > peak_l {
                    peak_l = l;
                }
                if r > peak_r {
                    peak_r = r;
                }
            }

            left[px] = peak_l;
            right[px] = peak_r;
        }

        WaveformImage { left, right }
    }

    pub fn channel(&self, channel: Channel) -> &[f32] {
        match channel {
            Channel::Left => &self.left,
            Channel::Right => &self.right,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.left.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stereo_buckets_cover_expected_frames() {
        // 10_000 frames, width 100 -> 100 frames per pixel
        let mut payload = vec![0.0f32; 20_000];
        // left spike in frame 50 (bucket 0), right spike in frame 150 (bucket 1)
        payload[50 * 2] = 0.8;
        payload[150 * 2 + 1] = 0.6;

        let image = WaveformImage::build(&payload, 2, 100);
        assert_eq!(image.width(), 100);
        assert_eq!(image.channel(Channel::Left)[0], 0.8);
        assert_eq!(image.channel(Channel::Right)[0], 0.0);
        assert_eq!(image.channel(Channel::Left)[1], 0.0);
        assert_eq!(image.channel(Channel::Right)[1], 0.6);
    }

    #[test]
    fn mono_is_mirrored() {
        let payload = vec![0.1, -0.5, 0.3, 0.2];
        let image = WaveformImage::build(&payload, 1, 2);
        assert_eq!(image.channel(Channel::Left), &[0.5, 0.3]);
        assert_eq!(image.channel(Channel::Right), &[0.5, 0.3]);
    }

    #[test]
    fn peak_is_absolute_not_averaged() {
        let payload = vec![0.1, -0.9, 0.2, 0.1];
        let image = WaveformImage::build(&payload, 1, 1);
        assert_eq!(image.channel(Channel::Left), &[0.9]);
    }

    #[test]
    fn empty_inputs_build_the_empty_image() {
        assert!(WaveformImage::build(&[], 2, 100).is_empty());
        assert!(WaveformImage::build(&[0.5, 0.5], 2, 0).is_empty());
        assert_eq!(WaveformImage::build(&[], 2, 100).width(), 0);
    }

    #[test]
    fn width_beyond_payload_pads_with_silence() {
        // 3 frames into 8 pixels: one frame per pixel, rest zero
        let payload = vec![0.2, 0.4, 0.6];
        let image = WaveformImage::build(&payload, 1, 8);
        assert_eq!(image.width(), 8);
        assert_eq!(image.channel(Channel::Left)[..3], [0.2, 0.4, 0.6]);
        assert!(image.channel(Channel::Left)[3..].iter().all(|p| *p == 0.0));
    }

    #[test]
    fn trailing_frames_short_of_a_bucket_are_dropped() {
        // 10 frames, width 3 -> 3 per pixel, frame 9 never sampled
        let mut payload = vec![0.0f32; 10];
        payload[9] = 1.0;
        let image = WaveformImage::build(&payload, 1, 3);
        assert_eq!(image.width(), 3);
        assert!(image.channel(Channel::Left).iter().all(|p| *p == 0.0));
    }
}
