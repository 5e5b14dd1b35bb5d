//! Scrub controller: one loaded audio asset, frame-driven burst playback.
//!
//! One mutex guards every operation that touches the sink or the asset.
//! Cheap state queries (loaded flag, last frame, fps, format) mirror into
//! atomics so a per-frame render path can poll without contending for the
//! lock; those mirrors may trail a concurrent load by a call or two, which
//! the duplicate-frame guard tolerates.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{
    AtomicBool, AtomicI64, AtomicU16, AtomicU32, AtomicU64, Ordering,
};

use parking_lot::{Mutex, RwLock};

use jog_audio::{OutputEngine, PlaybackSink, Sound};
use jog_core::{Channel, Fps, frame_to_pcm, pcm_frames_to_video_frames, samples_per_frame};
use jog_file::AudioDecoder;

use crate::ScrubConfig;
use crate::error::ScrubResult;
use crate::waveform::WaveformImage;

/// Payload ceiling in PCM frames (about ten minutes of 48 kHz audio).
/// Longer files still load and play; only the in-memory payload and the
/// waveform are skipped.
pub const MAX_PAYLOAD_FRAMES: u64 = 30_000_000;

/// Sentinel for "no frame played since load/release/stop".
const NO_FRAME: i64 = i64::MIN;

/// The one loaded source: playable handle plus decoded metadata/payload.
struct AudioAsset {
    path: PathBuf,
    sound: Arc<Sound>,
    /// Interleaved payload for waveform reduction. Empty when the source
    /// is over [`MAX_PAYLOAD_FRAMES`] or its bulk read failed.
    payload: Vec<f32>,
    sample_rate: u32,
    channels: u16,
    total_pcm_frames: u64,
}

struct ControllerState {
    sink: Box<dyn PlaybackSink>,
    asset: Option<AudioAsset>,
}

/// Frame-synchronous scrub playback over a single audio file.
///
/// Feed it the external frame cursor through [`play_at_frame`]; each call
/// plays one video frame's worth of audio and arms the engine to stop
/// itself. All methods take `&self` and are safe to call from any thread.
///
/// [`play_at_frame`]: ScrubController::play_at_frame
pub struct ScrubController {
    state: Mutex<ControllerState>,
    waveform: RwLock<Arc<WaveformImage>>,
    file_loaded: AtomicBool,
    engine_ready: AtomicBool,
    last_played_frame: AtomicI64,
    fps_bits: AtomicU64,
    sample_rate: AtomicU32,
    channels: AtomicU16,
    total_pcm_frames: AtomicU64,
}

impl ScrubController {
    /// Controller over the default output device, engine brought up on
    /// first load.
    pub fn new() -> ScrubController {
        ScrubController::with_config(ScrubConfig::default())
    }

    pub fn with_config(config: ScrubConfig) -> ScrubController {
        ScrubController::with_sink(Box::new(OutputEngine::new(config.engine)), config.eager_init)
    }

    /// Controller over an injected sink. With `eager_init` the sink is
    /// brought up here; a failure is logged and retried on the next load.
    pub fn with_sink(sink: Box<dyn PlaybackSink>, eager_init: bool) -> ScrubController {
        let controller = ScrubController {
            state: Mutex::new(ControllerState { sink, asset: None }),
            waveform: RwLock::new(Arc::new(WaveformImage::default())),
            file_loaded: AtomicBool::new(false),
            engine_ready: AtomicBool::new(false),
            last_played_frame: AtomicI64::new(NO_FRAME),
            fps_bits: AtomicU64::new(Fps::default().get().to_bits()),
            sample_rate: AtomicU32::new(0),
            channels: AtomicU16::new(0),
            total_pcm_frames: AtomicU64::new(0),
        };

        if eager_init {
            let mut state = controller.state.lock();
            match state.sink.ensure_initialized() {
                Ok(_) => controller.engine_ready.store(true, Ordering::Release),
                Err(err) => log::error!("Audio engine init failed: {err}"),
            }
            drop(state);
        }

        controller
    }

    /// Load an audio file and the frame rate to scrub it at.
    ///
    /// Returns `false` when the engine cannot come up or the file cannot
    /// be opened; either way the previous asset is gone and the
    /// controller is back to unloaded. The fps takes effect even when the
    /// load fails.
    pub fn load_file(&self, path: impl AsRef<Path>, fps: f64) -> bool {
        let path = path.as_ref();
        match self.try_load(path, fps) {
            Ok(()) => true,
            Err(err) => {
                log::error!("Failed to load {}: {err}", path.display());
                false
            }
        }
    }

    fn try_load(&self, path: &Path, fps: f64) -> ScrubResult<()> {
        let mut state = self.state.lock();
        self.store_fps(fps);

        let format = match state.sink.ensure_initialized() {
            Ok(format) => {
                self.engine_ready.store(true, Ordering::Release);
                format
            }
            Err(err) => return Err(err.into()),
        };

        self.unload_locked(&mut state);

        // Playable handle first: a failure here aborts the load.
        let decoded = jog_file::decode_file(path)?;
        let sound = Arc::new(Sound::from_decoded(&decoded, format.sample_rate));
        state.sink.attach(Arc::clone(&sound));

        let mut sample_rate = decoded.sample_rate;
        let mut channel_count = decoded.channels;
        let mut total_pcm_frames = 0u64;
        let mut payload = Vec::new();
        drop(decoded);

        // Separate metadata/payload pass. Failure here degrades length
        // and waveform but the attached sound still plays.
        match AudioDecoder::open(path) {
            Ok(decoder) => {
                let info = decoder.info();
                sample_rate = info.sample_rate;
                channel_count = info.channels;
                total_pcm_frames = info.total_frames;

                if total_pcm_frames > 0 && total_pcm_frames < MAX_PAYLOAD_FRAMES {
                    match decoder.read_all() {
                        Ok(read) => {
                            sample_rate = read.sample_rate;
                            channel_count = read.channels;
                            total_pcm_frames = read.frames();
                            payload = read.samples;
                        }
                        Err(err) => {
                            log::warn!("Payload read failed for {}: {err}", path.display());
                            total_pcm_frames = 0;
                        }
                    }
                } else if total_pcm_frames >= MAX_PAYLOAD_FRAMES {
                    log::warn!(
                        "{}: {total_pcm_frames} PCM frames exceeds the payload \
                         ceiling; waveform disabled",
                        path.display()
                    );
                }
            }
            Err(err) => {
                log::warn!("Metadata probe failed for {}: {err}", path.display());
            }
        }

        let duration = if sample_rate > 0 {
            total_pcm_frames as f64 / f64::from(sample_rate)
        } else {
            0.0
        };
        log::info!(
            "Loaded {}: {} Hz, {} ch, {:.2}s ({} frames @ {} fps)",
            path.display(),
            sample_rate,
            channel_count,
            duration,
            pcm_frames_to_video_frames(total_pcm_frames, sample_rate, self.fps_value()),
            self.fps()
        );

        state.asset = Some(AudioAsset {
            path: path.to_path_buf(),
            sound,
            payload,
            sample_rate,
            channels: channel_count,
            total_pcm_frames,
        });

        self.sample_rate.store(sample_rate, Ordering::Release);
        self.channels.store(channel_count, Ordering::Release);
        self.total_pcm_frames.store(total_pcm_frames, Ordering::Release);
        // loaded flag last; it gates playback and waveform generation
        self.file_loaded.store(true, Ordering::Release);
        Ok(())
    }

    /// Play the one-frame audio slice for an external frame index.
    ///
    /// A repeat of the last requested frame is a no-op. A frame before
    /// the start or past the end of the file stops playback and records
    /// the frame without seeking. Never blocks on audio; the engine stops
    /// the burst on its own clock.
    pub fn play_at_frame(&self, frame: i64) {
        // lock-free rejects for the per-frame caller
        if !self.file_loaded.load(Ordering::Acquire) {
            return;
        }
        if self.last_played_frame.load(Ordering::Acquire) == frame {
            return;
        }

        let mut state = self.state.lock();
        let (sample_rate, total_pcm_frames) = match &state.asset {
            Some(asset) => (asset.sample_rate, asset.total_pcm_frames),
            None => return,
        };

        let fps = self.fps_value();
        let pcm_start = frame_to_pcm(frame, fps, sample_rate).unwrap_or(u64::MAX);
        let span = samples_per_frame(sample_rate, fps);

        if total_pcm_frames > 0 && pcm_start >= total_pcm_frames {
            state.sink.stop();
            self.last_played_frame.store(frame, Ordering::Release);
            return;
        }

        // Disarm before seeking so a stop armed against the previous
        // position cannot truncate the new burst.
        state.sink.stop();
        state.sink.disarm_stop();
        state.sink.seek(pcm_start);
        let clock = state.sink.engine_clock();
        state.sink.arm_stop(clock.saturating_add(span));
        state.sink.start();

        self.last_played_frame.store(frame, Ordering::Release);
    }

    /// Stop playback and forget the last played frame. Safe in any state.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        state.sink.stop();
        self.last_played_frame.store(NO_FRAME, Ordering::Release);
    }

    /// Drop the loaded file, keeping the engine alive for the next load.
    pub fn release_file(&self) {
        let mut state = self.state.lock();
        self.unload_locked(&mut state);
    }

    fn unload_locked(&self, state: &mut ControllerState) {
        self.file_loaded.store(false, Ordering::Release);
        if let Some(asset) = state.asset.take() {
            state.sink.stop();
            state.sink.disarm_stop();
            state.sink.detach();
            log::debug!(
                "Released {} ({} source frames)",
                asset.path.display(),
                asset.sound.src_frames()
            );
        }
        self.last_played_frame.store(NO_FRAME, Ordering::Release);
        self.sample_rate.store(0, Ordering::Release);
        self.channels.store(0, Ordering::Release);
        self.total_pcm_frames.store(0, Ordering::Release);
        *self.waveform.write() = Arc::new(WaveformImage::default());
    }

    /// Set the frame rate used for all subsequent frame math. Values
    /// below 1.0 (or NaN) clamp to 1.0.
    pub fn set_fps(&self, fps: f64) {
        self.store_fps(fps);
    }

    pub fn fps(&self) -> f64 {
        self.fps_value().get()
    }

    fn fps_value(&self) -> Fps {
        Fps::new(f64::from_bits(self.fps_bits.load(Ordering::Acquire)))
    }

    fn store_fps(&self, fps: f64) {
        self.fps_bits
            .store(Fps::new(fps).get().to_bits(), Ordering::Release);
    }

    /// File length in whole video frames at the current fps. Recomputed
    /// on every call; zero when unloaded or the length is unknown.
    pub fn file_length_in_frames(&self) -> u64 {
        if !self.file_loaded.load(Ordering::Acquire) {
            return 0;
        }
        let sample_rate = self.sample_rate.load(Ordering::Acquire);
        let total = self.total_pcm_frames.load(Ordering::Acquire);
        pcm_frames_to_video_frames(total, sample_rate, self.fps_value())
    }

    /// Rebuild the waveform image at `width` pixels, replacing the
    /// previous one wholesale. Unloaded, payload-less, or zero-width
    /// requests publish the empty image.
    pub fn generate_waveform(&self, width: usize) {
        let state = self.state.lock();
        let image = match &state.asset {
            Some(asset) if !asset.payload.is_empty() && width > 0 => {
                WaveformImage::build(&asset.payload, asset.channels, width)
            }
            _ => WaveformImage::default(),
        };
        // Published under the state lock to keep concurrent regenerations ordered.
        *self.waveform.write() = Arc::new(image);
    }

    /// Current waveform image; a cheap handle the render path can hold
    /// across frames.
    pub fn waveform(&self) -> Arc<WaveformImage> {
        Arc::clone(&self.waveform.read())
    }

    pub fn waveform_channel(&self, channel: Channel) -> Vec<f32> {
        self.waveform.read().channel(channel).to_vec()
    }

    pub fn waveform_width(&self) -> usize {
        self.waveform.read().width()
    }

    pub fn file_loaded(&self) -> bool {
        self.file_loaded.load(Ordering::Acquire)
    }

    pub fn engine_ready(&self) -> bool {
        self.engine_ready.load(Ordering::Acquire)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Acquire)
    }

    pub fn channel_count(&self) -> u16 {
        self.channels.load(Ordering::Acquire)
    }

    pub fn total_pcm_frames(&self) -> u64 {
        self.total_pcm_frames.load(Ordering::Acquire)
    }

    /// Last frame handed to [`play_at_frame`], or `None` since the last
    /// load/release/stop.
    ///
    /// [`play_at_frame`]: ScrubController::play_at_frame
    pub fn last_played_frame(&self) -> Option<i64> {
        match self.last_played_frame.load(Ordering::Acquire) {
            NO_FRAME => None,
            frame => Some(frame),
        }
    }

    pub fn current_file(&self) -> Option<PathBuf> {
        self.state.lock().asset.as_ref().map(|a| a.path.clone())
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().sink.is_playing()
    }
}

impl Default for ScrubController {
    fn default() -> Self {
        ScrubController::new()
    }
}

impl Drop for ScrubController {
    fn drop(&mut self) {
        self.file_loaded.store(false, Ordering::Release);
        self.engine_ready.store(false, Ordering::Release);
        // Best-effort cleanup without taking the operations mutex: a stop
        // issued from here can re-enter via the engine's callback path,
        // which must never find that mutex held.
        let state = self.state.get_mut();
        state.sink.stop();
        state.sink.detach();
        state.asset = None;
        state.sink.teardown();
    }
}
