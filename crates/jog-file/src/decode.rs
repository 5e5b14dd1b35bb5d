//! Audio decoding: WAV through hound, everything else through symphonia.
//!
//! The scrub controller opens each file twice: once fully decoded for the
//! playable PCM, and once as a probe-then-read handle for authoritative
//! metadata and the bounded waveform payload. [`AudioDecoder`] serves both
//! uses; the probe is cheap and `read_all` is only invoked when wanted.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, Decoder, DecoderOptions};
use symphonia::core::errors::Error;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{FileError, FileResult};

/// Source container formats recognized by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Flac,
    Mp3,
    Ogg,
    Unknown,
}

impl AudioFormat {
    /// Unknown extensions still go through the symphonia probe, which sniffs
    /// the container from the content.
    pub fn from_path(path: &Path) -> AudioFormat {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());
        match ext.as_deref() {
            Some("wav") | Some("wave") => AudioFormat::Wav,
            Some("flac") => AudioFormat::Flac,
            Some("mp3") => AudioFormat::Mp3,
            Some("ogg") | Some("oga") => AudioFormat::Ogg,
            _ => AudioFormat::Unknown,
        }
    }
}

/// Stream metadata from the container/codec headers.
///
/// `total_frames` is the header's claim and may be 0 when the container does
/// not carry a length; a full decode is the only way to know for certain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub total_frames: u64,
}

/// Fully decoded interleaved f32 samples.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl DecodedAudio {
    /// Frame count (samples per channel).
    pub fn frames(&self) -> u64 {
        if self.channels == 0 {
            0
        } else {
            (self.samples.len() / self.channels as usize) as u64
        }
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames() as f64 / f64::from(self.sample_rate)
        }
    }
}

enum Backend {
    Wav(hound::WavReader<BufReader<File>>),
    Symphonia {
        format: Box<dyn FormatReader>,
        decoder: Box<dyn Decoder>,
        track_id: u32,
    },
}

/// Open decode handle: metadata up front, samples on demand.
pub struct AudioDecoder {
    info: AudioInfo,
    backend: Backend,
}

impl std::fmt::Debug for AudioDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioDecoder")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl AudioDecoder {
    pub fn open(path: &Path) -> FileResult<AudioDecoder> {
        match AudioFormat::from_path(path) {
            AudioFormat::Wav => Self::open_wav(path),
            _ => Self::open_symphonia(path),
        }
    }

    pub fn info(&self) -> AudioInfo {
        self.info
    }

    /// Decode the whole stream into interleaved f32.
    ///
    /// The decoded frame count wins over the header's `total_frames` claim
    /// when the two disagree.
    pub fn read_all(self) -> FileResult<DecodedAudio> {
        match self.backend {
            Backend::Wav(reader) => read_wav_samples(reader, self.info),
            Backend::Symphonia {
                format,
                decoder,
                track_id,
            } => read_symphonia_samples(format, decoder, track_id, self.info),
        }
    }

    fn open_wav(path: &Path) -> FileResult<AudioDecoder> {
        let reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        let info = AudioInfo {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            total_frames: u64::from(reader.duration()),
        };
        Ok(AudioDecoder {
            info,
            backend: Backend::Wav(reader),
        })
    }

    fn open_symphonia(path: &Path) -> FileResult<AudioDecoder> {
        let file = File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| FileError::UnsupportedFormat(e.to_string()))?;
        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| FileError::DecodeError("no supported audio track".to_string()))?;

        let info = AudioInfo {
            sample_rate: track.codec_params.sample_rate.unwrap_or(44_100),
            channels: track
                .codec_params
                .channels
                .map(|c| c.count() as u16)
                .unwrap_or(2),
            total_frames: track.codec_params.n_frames.unwrap_or(0),
        };
        let track_id = track.id;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| FileError::DecodeError(e.to_string()))?;

        Ok(AudioDecoder {
            info,
            backend: Backend::Symphonia {
                format,
                decoder,
                track_id,
            },
        })
    }
}

/// Metadata without decoding the stream.
pub fn probe_info(path: impl AsRef<Path>) -> FileResult<AudioInfo> {
    AudioDecoder::open(path.as_ref()).map(|decoder| decoder.info())
}

/// One-shot full decode.
pub fn decode_file(path: impl AsRef<Path>) -> FileResult<DecodedAudio> {
    AudioDecoder::open(path.as_ref())?.read_all()
}

fn read_wav_samples(
    mut reader: hound::WavReader<BufReader<File>>,
    info: AudioInfo,
) -> FileResult<DecodedAudio> {
    let spec = reader.spec();
    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<_>, hound::Error>>()?,
        hound::SampleFormat::Int => {
            let max_value = (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_value))
                .collect::<Result<Vec<_>, hound::Error>>()?
        }
    };
    Ok(DecodedAudio {
        sample_rate: info.sample_rate,
        channels: info.channels,
        samples,
    })
}

fn read_symphonia_samples(
    mut format: Box<dyn FormatReader>,
    mut decoder: Box<dyn Decoder>,
    track_id: u32,
    info: AudioInfo,
) -> FileResult<DecodedAudio> {
    let mut samples = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut sample_rate = info.sample_rate;
    let mut channels = info.channels;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(Error::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(FileError::DecodeError(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                if sample_buf.is_none() {
                    let spec = *decoded.spec();
                    sample_rate = spec.rate;
                    channels = spec.channels.count() as u16;
                    sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
                }
                if let Some(buf) = &mut sample_buf {
                    buf.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buf.samples());
                }
            }
            // corrupt packets are skipped, not fatal
            Err(Error::DecodeError(e)) => {
                log::warn!("Skipping undecodable packet: {e}");
                continue;
            }
            Err(e) => return Err(FileError::DecodeError(e.to_string())),
        }
    }

    Ok(DecodedAudio {
        sample_rate,
        channels,
        samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    fn write_wav_i16(path: &Path, sample_rate: u32, channels: u16, frames: usize) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..frames * channels as usize {
            writer.write_sample((i % 1000) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn write_wav_f32(path: &Path, sample_rate: u32, frames: usize) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..frames {
            writer.write_sample(i as f32 / frames as f32).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn probe_reports_wav_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav_i16(&path, 44_100, 2, 100);

        let info = probe_info(&path).unwrap();
        assert_eq!(info.sample_rate, 44_100);
        assert_eq!(info.channels, 2);
        assert_eq!(info.total_frames, 100);
    }

    #[test]
    fn decode_wav_int_scales_to_unit_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scaled.wav");
        write_wav_i16(&path, 48_000, 1, 10);

        let audio = decode_file(&path).unwrap();
        assert_eq!(audio.frames(), 10);
        assert_relative_eq!(audio.samples[0], 0.0, epsilon = 1e-6);
        assert_relative_eq!(audio.samples[3], 3.0 / 32_768.0, epsilon = 1e-6);
        assert!(audio.samples.iter().all(|s| s.abs() <= 1.0));
    }

    #[test]
    fn decode_wav_float_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("float.wav");
        write_wav_f32(&path, 48_000, 64);

        let audio = decode_file(&path).unwrap();
        assert_eq!(audio.sample_rate, 48_000);
        assert_eq!(audio.channels, 1);
        assert_eq!(audio.frames(), 64);
        assert_relative_eq!(audio.samples[32], 0.5, epsilon = 1e-6);
        assert_relative_eq!(audio.duration_seconds(), 64.0 / 48_000.0, epsilon = 1e-9);
    }

    #[test]
    fn open_then_read_matches_probe() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("both.wav");
        write_wav_i16(&path, 22_050, 2, 250);

        let decoder = AudioDecoder::open(&path).unwrap();
        let info = decoder.info();
        let audio = decoder.read_all().unwrap();
        assert_eq!(audio.frames(), info.total_frames);
        assert_eq!(audio.samples.len(), 500);
    }

    #[test]
    fn format_from_path() {
        assert_eq!(AudioFormat::from_path(Path::new("a.wav")), AudioFormat::Wav);
        assert_eq!(AudioFormat::from_path(Path::new("a.WAV")), AudioFormat::Wav);
        assert_eq!(
            AudioFormat::from_path(Path::new("b.flac")),
            AudioFormat::Flac
        );
        assert_eq!(AudioFormat::from_path(Path::new("c.mp3")), AudioFormat::Mp3);
        assert_eq!(AudioFormat::from_path(Path::new("d.ogg")), AudioFormat::Ogg);
        assert_eq!(
            AudioFormat::from_path(Path::new("e.txt")),
            AudioFormat::Unknown
        );
        assert_eq!(AudioFormat::from_path(Path::new("f")), AudioFormat::Unknown);
    }

    #[test]
    fn garbage_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();

        let wav = dir.path().join("junk.wav");
        std::fs::File::create(&wav)
            .unwrap()
            .write_all(b"not a wav file")
            .unwrap();
        assert!(matches!(
            AudioDecoder::open(&wav),
            Err(FileError::WavError(_))
        ));

        let bin = dir.path().join("junk.bin");
        std::fs::File::create(&bin)
            .unwrap()
            .write_all(b"no container here at all")
            .unwrap();
        assert!(matches!(
            AudioDecoder::open(&bin),
            Err(FileError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = AudioDecoder::open(Path::new("/nonexistent/nope.bin")).unwrap_err();
        assert!(matches!(err, FileError::Io(_)));
    }

    #[test]
    fn frames_counts_per_channel() {
        let audio = DecodedAudio {
            sample_rate: 48_000,
            channels: 2,
            samples: vec![0.0; 20],
        };
        assert_eq!(audio.frames(), 10);

        let none = DecodedAudio {
            sample_rate: 48_000,
            channels: 0,
            samples: Vec::new(),
        };
        assert_eq!(none.frames(), 0);
    }
}
