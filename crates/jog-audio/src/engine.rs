//! Output engine: owns the device stream thread and the command channel
//! into the real-time callback.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, StreamConfig, SupportedBufferSize};
use crossbeam_channel::bounded;

use crate::EngineConfig;
use crate::device::default_output_device;
use crate::error::{AudioError, AudioResult};
use crate::sound::Sound;
use crate::voice::{COMMAND_CAPACITY, Command, RtState};

/// Negotiated output format, reported once the stream is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Playback control surface over a running output stream.
///
/// The engine behind it starts lazily: every method other than
/// `ensure_initialized` is a no-op until a stream is up.
pub trait PlaybackSink: Send {
    /// Bring the output stream up if it is not already. Returns the
    /// negotiated format; repeat calls are cheap once running.
    fn ensure_initialized(&mut self) -> AudioResult<SinkFormat>;

    fn is_initialized(&self) -> bool;

    /// Hand a playable buffer to the callback, replacing any previous one.
    fn attach(&mut self, sound: Arc<Sound>);

    fn detach(&mut self);

    /// Position the play cursor; `src_frame` is in source-rate samples.
    fn seek(&mut self, src_frame: u64);

    fn start(&mut self);

    fn stop(&mut self);

    /// Schedule a stop at an absolute engine clock frame.
    fn arm_stop(&mut self, engine_frame: u64);

    fn disarm_stop(&mut self);

    /// Monotonic engine clock in output frames, advanced by the callback.
    fn engine_clock(&self) -> u64;

    fn is_playing(&self) -> bool;

    /// Stop the stream thread and release the device. The sink cannot be
    /// re-initialized afterwards.
    fn teardown(&mut self);
}

/// Device-backed [`PlaybackSink`] built on a cpal output stream.
pub struct OutputEngine {
    config: EngineConfig,
    commands: Option<rtrb::Producer<Command>>,
    worker: Option<JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
    clock: Arc<AtomicU64>,
    playing: Arc<AtomicBool>,
    format: Option<SinkFormat>,
    torn_down: bool,
}

impl OutputEngine {
    pub fn new(config: EngineConfig) -> OutputEngine {
        OutputEngine {
            config,
            commands: None,
            worker: None,
            stop_signal: Arc::new(AtomicBool::new(false)),
            clock: Arc::new(AtomicU64::new(0)),
            playing: Arc::new(AtomicBool::new(false)),
            format: None,
            torn_down: false,
        }
    }

    fn push(&mut self, command: Command) {
        if let Some(commands) = &mut self.commands {
            if commands.push(command).is_err() {
                log::warn!("Audio command ring full; command dropped");
            }
        }
    }
}

impl PlaybackSink for OutputEngine {
    fn ensure_initialized(&mut self) -> AudioResult<SinkFormat> {
        if self.torn_down {
            return Err(AudioError::ShutDown);
        }
        if let Some(format) = self.format {
            return Ok(format);
        }

        let (producer, consumer) = rtrb::RingBuffer::new(COMMAND_CAPACITY);
        let playing = Arc::new(AtomicBool::new(false));
        let clock = Arc::new(AtomicU64::new(0));
        let stop_signal = Arc::new(AtomicBool::new(false));
        let rt = RtState::new(consumer, Arc::clone(&playing));

        let (ready_tx, ready_rx) = bounded(1);
        let config = self.config;
        let thread_clock = Arc::clone(&clock);
        let thread_stop = Arc::clone(&stop_signal);
        let worker = std::thread::Builder::new()
            .name("jog-audio-output".into())
            .spawn(move || {
                let result = run_output_stream(config, rt, thread_clock, thread_stop, &ready_tx);
                if let Err(err) = result {
                    let _ = ready_tx.send(Err(err));
                }
            })
            .map_err(|e| AudioError::WorkerError(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(format)) => {
                self.commands = Some(producer);
                self.worker = Some(worker);
                self.stop_signal = stop_signal;
                self.clock = clock;
                self.playing = playing;
                self.format = Some(format);
                log::info!(
                    "Audio engine ready @ {} Hz, {} ch",
                    format.sample_rate,
                    format.channels
                );
                Ok(format)
            }
            Ok(Err(err)) => {
                let _ = worker.join();
                Err(err)
            }
            Err(_) => {
                let _ = worker.join();
                Err(AudioError::WorkerError(
                    "output thread exited before reporting a format".into(),
                ))
            }
        }
    }

    fn is_initialized(&self) -> bool {
        self.format.is_some()
    }

    fn attach(&mut self, sound: Arc<Sound>) {
        self.push(Command::Attach(sound));
    }

    fn detach(&mut self) {
        self.push(Command::Detach);
    }

    fn seek(&mut self, src_frame: u64) {
        self.push(Command::Seek(src_frame));
    }

    fn start(&mut self) {
        self.push(Command::Start);
    }

    fn stop(&mut self) {
        self.push(Command::Stop);
    }

    fn arm_stop(&mut self, engine_frame: u64) {
        self.push(Command::ArmStop(engine_frame));
    }

    fn disarm_stop(&mut self) {
        self.push(Command::DisarmStop);
    }

    fn engine_clock(&self) -> u64 {
        self.clock.load(Ordering::Acquire)
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    fn teardown(&mut self) {
        self.torn_down = true;
        self.format = None;
        self.commands = None;
        self.stop_signal.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        self.playing.store(false, Ordering::Relaxed);
    }
}

impl Drop for OutputEngine {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Stream thread body: builds the output stream, reports the negotiated
/// format, then parks until told to stop. The cpal stream is not `Send`,
/// so it lives and dies on this thread.
fn run_output_stream(
    config: EngineConfig,
    mut rt: RtState,
    clock: Arc<AtomicU64>,
    stop_signal: Arc<AtomicBool>,
    ready: &crossbeam_channel::Sender<AudioResult<SinkFormat>>,
) -> AudioResult<()> {
    let device = default_output_device()?;
    let stream_config = output_stream_config(&device, &config)?;
    let channels = stream_config.channels as usize;
    let format = SinkFormat {
        sample_rate: stream_config.sample_rate,
        channels: stream_config.channels,
    };

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let frames = if channels == 0 {
                    0
                } else {
                    (data.len() / channels) as u64
                };
                let clock_start = clock.fetch_add(frames, Ordering::AcqRel);
                rt.process_commands();
                rt.process(data, channels, clock_start);
            },
            |err| log::error!("Output stream error: {err}"),
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

    stream
        .play()
        .map_err(|e| AudioError::StreamError(e.to_string()))?;

    let _ = ready.send(Ok(format));

    while !stop_signal.load(Ordering::Acquire) {
        std::thread::sleep(Duration::from_millis(50));
    }

    drop(stream);
    Ok(())
}

/// Pick a stream config: prefer the requested rate and channel count in
/// f32, fall back to the device default. The period request is clamped
/// to whatever the device supports.
fn output_stream_config(
    device: &cpal::Device,
    config: &EngineConfig,
) -> AudioResult<StreamConfig> {
    let requested: cpal::SampleRate = config.sample_rate;

    let supported = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .filter(|range| {
            range.channels() == config.channels && range.sample_format() == SampleFormat::F32
        })
        .find(|range| range.min_sample_rate() <= requested && requested <= range.max_sample_rate())
        .map(|range| range.with_sample_rate(requested));

    let supported = match supported {
        Some(supported) => supported,
        None => {
            let fallback = device
                .default_output_config()
                .map_err(|e| AudioError::ConfigError(e.to_string()))?;
            if fallback.sample_format() != SampleFormat::F32 {
                return Err(AudioError::ConfigError(format!(
                    "device default format {:?} is not f32",
                    fallback.sample_format()
                )));
            }
            log::warn!(
                "No f32 output config @ {} Hz, {} ch; using device default @ {} Hz, {} ch",
                config.sample_rate,
                config.channels,
                fallback.sample_rate(),
                fallback.channels()
            );
            fallback
        }
    };

    Ok(StreamConfig {
        channels: supported.channels(),
        sample_rate: supported.sample_rate(),
        buffer_size: clamp_buffer_size(supported.buffer_size(), config.period_frames),
    })
}

fn clamp_buffer_size(supported: &SupportedBufferSize, period_frames: u32) -> BufferSize {
    match supported {
        SupportedBufferSize::Range { min, max } => {
            BufferSize::Fixed(period_frames.clamp(*min, *max))
        }
        SupportedBufferSize::Unknown => BufferSize::Default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn teardown_then_ensure_is_shut_down() {
        let mut engine = OutputEngine::new(EngineConfig::default());
        engine.teardown();
        assert!(matches!(
            engine.ensure_initialized(),
            Err(AudioError::ShutDown)
        ));
        assert!(!engine.is_initialized());
    }

    #[test]
    fn uninitialized_commands_are_inert() {
        let mut engine = OutputEngine::new(EngineConfig::default());
        engine.seek(100);
        engine.start();
        engine.stop();
        engine.arm_stop(5000);
        assert!(!engine.is_initialized());
        assert!(!engine.is_playing());
        assert_eq!(engine.engine_clock(), 0);
    }

    #[test]
    fn buffer_size_clamps_to_supported_range() {
        let range = SupportedBufferSize::Range { min: 256, max: 4096 };
        assert_eq!(clamp_buffer_size(&range, 128), BufferSize::Fixed(256));
        assert_eq!(clamp_buffer_size(&range, 512), BufferSize::Fixed(512));
        assert_eq!(clamp_buffer_size(&range, 8192), BufferSize::Fixed(4096));
        assert_eq!(
            clamp_buffer_size(&SupportedBufferSize::Unknown, 512),
            BufferSize::Default
        );
    }

    #[test]
    fn teardown_is_idempotent() {
        let mut engine = OutputEngine::new(EngineConfig::default());
        engine.teardown();
        engine.teardown();
        assert!(!engine.is_initialized());
    }
}
