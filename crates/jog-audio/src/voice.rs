//! Real-time voice and command processing for the output callback.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::sound::Sound;

/// Capacity of the control -> callback command ring.
pub const COMMAND_CAPACITY: usize = 64;

/// Control commands crossing into the real-time callback.
#[derive(Debug)]
pub enum Command {
    /// Replace the playable PCM. Resets position, disarms any stop.
    Attach(Arc<Sound>),
    /// Drop the playable PCM.
    Detach,
    /// Move the play position; the offset is in source-rate samples.
    Seek(u64),
    /// Begin playing from the current position.
    Start,
    /// Halt playback, keeping the position.
    Stop,
    /// Schedule a stop for when the engine clock reaches this frame.
    ArmStop(u64),
    /// Cancel a scheduled stop.
    DisarmStop,
}

/// Single playback voice owned by the audio callback.
pub struct Voice {
    sound: Option<Arc<Sound>>,
    position: u64,
    stop_at: Option<u64>,
    active: bool,
}

impl Voice {
    fn new() -> Voice {
        Voice {
            sound: None,
            position: 0,
            stop_at: None,
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn stop_at(&self) -> Option<u64> {
        self.stop_at
    }

    pub fn has_sound(&self) -> bool {
        self.sound.is_some()
    }
}

/// Callback-side state: drains the command ring, renders the voice.
pub struct RtState {
    voice: Voice,
    commands: rtrb::Consumer<Command>,
    playing: Arc<AtomicBool>,
}

impl RtState {
    pub fn new(commands: rtrb::Consumer<Command>, playing: Arc<AtomicBool>) -> RtState {
        RtState {
            voice: Voice::new(),
            commands,
            playing,
        }
    }

    pub fn voice(&self) -> &Voice {
        &self.voice
    }

    /// Drain pending commands. Runs at the top of every callback.
    pub fn process_commands(&mut self) {
        while let Ok(command) = self.commands.pop() {
            match command {
                Command::Attach(sound) => {
                    self.voice.sound = Some(sound);
                    self.voice.position = 0;
                    self.voice.stop_at = None;
                    self.voice.active = false;
                }
                Command::Detach => {
                    self.voice.sound = None;
                    self.voice.active = false;
                }
                Command::Seek(src_frame) => {
                    if let Some(sound) = &self.voice.sound {
                        self.voice.position = sound.map_source_frame(src_frame);
                    }
                }
                Command::Start => {
                    if self.voice.sound.is_some() {
                        self.voice.active = true;
                    }
                }
                Command::Stop => self.voice.active = false,
                Command::ArmStop(frame) => self.voice.stop_at = Some(frame),
                Command::DisarmStop => self.voice.stop_at = None,
            }
        }
    }

    /// Render into an interleaved output buffer whose first frame plays at
    /// engine clock `clock_start`. The buffer is zeroed first; the armed
    /// stop and the end of the data both silence the remainder and
    /// deactivate the voice.
    pub fn process(&mut self, output: &mut [f32], channels: usize, clock_start: u64) {
        output.fill(0.0);
        if channels == 0 {
            return;
        }

        if self.voice.active {
            if let Some(sound) = &self.voice.sound {
                let frames = output.len() / channels;
                for i in 0..frames {
                    if let Some(stop) = self.voice.stop_at {
                        if clock_start + i as u64 >= stop {
                            self.voice.active = false;
                            break;
                        }
                    }
                    if self.voice.position >= sound.frames() {
                        self.voice.active = false;
                        break;
                    }

                    let (l, r) = sound.frame(self.voice.position);
                    let base = i * channels;
                    if channels == 1 {
                        output[base] = 0.5 * (l + r);
                    } else {
                        output[base] = l;
                        output[base + 1] = r;
                    }
                    self.voice.position += 1;
                }
            } else {
                self.voice.active = false;
            }
        }

        self.playing.store(self.voice.active, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jog_file::DecodedAudio;

    fn ramp_sound(frames: u64) -> Arc<Sound> {
        let decoded = DecodedAudio {
            sample_rate: 48_000,
            channels: 1,
            samples: (1..=frames).map(|i| i as f32 / 1000.0).collect(),
        };
        Arc::new(Sound::from_decoded(&decoded, 48_000))
    }

    fn rt_pair() -> (rtrb::Producer<Command>, RtState, Arc<AtomicBool>) {
        let (tx, rx) = rtrb::RingBuffer::new(COMMAND_CAPACITY);
        let playing = Arc::new(AtomicBool::new(false));
        let rt = RtState::new(rx, Arc::clone(&playing));
        (tx, rt, playing)
    }

    #[test]
    fn attach_seek_start_renders_from_position() {
        let (mut tx, mut rt, playing) = rt_pair();
        tx.push(Command::Attach(ramp_sound(100))).unwrap();
        tx.push(Command::Seek(10)).unwrap();
        tx.push(Command::Start).unwrap();
        rt.process_commands();

        let mut buf = [0.0f32; 8];
        rt.process(&mut buf, 2, 0);

        // sample 10 of the ramp is (10 + 1) / 1000
        assert_eq!(buf[0], 11.0 / 1000.0);
        assert_eq!(buf[1], 11.0 / 1000.0);
        assert_eq!(buf[2], 12.0 / 1000.0);
        assert_eq!(rt.voice().position(), 14);
        assert!(playing.load(Ordering::Relaxed));
    }

    #[test]
    fn armed_stop_silences_mid_buffer() {
        let (mut tx, mut rt, playing) = rt_pair();
        tx.push(Command::Attach(ramp_sound(100))).unwrap();
        tx.push(Command::Start).unwrap();
        tx.push(Command::ArmStop(1004)).unwrap();
        rt.process_commands();

        let mut buf = [0.0f32; 16];
        rt.process(&mut buf, 2, 1000);

        // four frames render, the rest stays silent
        assert!(buf[..8].iter().all(|s| *s != 0.0));
        assert!(buf[8..].iter().all(|s| *s == 0.0));
        assert!(!rt.voice().is_active());
        assert!(!playing.load(Ordering::Relaxed));
    }

    #[test]
    fn stop_at_clock_start_renders_nothing() {
        let (mut tx, mut rt, _playing) = rt_pair();
        tx.push(Command::Attach(ramp_sound(100))).unwrap();
        tx.push(Command::Start).unwrap();
        tx.push(Command::ArmStop(500)).unwrap();
        rt.process_commands();

        let mut buf = [1.0f32; 8];
        rt.process(&mut buf, 2, 500);

        assert!(buf.iter().all(|s| *s == 0.0));
        assert!(!rt.voice().is_active());
    }

    #[test]
    fn disarm_clears_a_pending_stop() {
        let (mut tx, mut rt, _playing) = rt_pair();
        tx.push(Command::Attach(ramp_sound(100))).unwrap();
        tx.push(Command::Start).unwrap();
        tx.push(Command::ArmStop(1002)).unwrap();
        tx.push(Command::DisarmStop).unwrap();
        rt.process_commands();

        let mut buf = [0.0f32; 8];
        rt.process(&mut buf, 2, 1000);

        assert!(buf.iter().all(|s| *s != 0.0));
        assert!(rt.voice().is_active());
    }

    #[test]
    fn stop_command_halts_and_keeps_position() {
        let (mut tx, mut rt, _playing) = rt_pair();
        tx.push(Command::Attach(ramp_sound(100))).unwrap();
        tx.push(Command::Start).unwrap();
        rt.process_commands();

        let mut buf = [0.0f32; 8];
        rt.process(&mut buf, 2, 0);
        assert_eq!(rt.voice().position(), 4);

        tx.push(Command::Stop).unwrap();
        rt.process_commands();
        rt.process(&mut buf, 2, 4);

        assert!(buf.iter().all(|s| *s == 0.0));
        assert_eq!(rt.voice().position(), 4);
    }

    #[test]
    fn end_of_data_deactivates() {
        let (mut tx, mut rt, _playing) = rt_pair();
        tx.push(Command::Attach(ramp_sound(6))).unwrap();
        tx.push(Command::Seek(4)).unwrap();
        tx.push(Command::Start).unwrap();
        rt.process_commands();

        let mut buf = [0.0f32; 8];
        rt.process(&mut buf, 2, 0);

        assert!(buf[..4].iter().all(|s| *s != 0.0));
        assert!(buf[4..].iter().all(|s| *s == 0.0));
        assert!(!rt.voice().is_active());
    }

    #[test]
    fn start_without_sound_stays_inactive() {
        let (mut tx, mut rt, playing) = rt_pair();
        tx.push(Command::Start).unwrap();
        rt.process_commands();

        let mut buf = [0.0f32; 4];
        rt.process(&mut buf, 2, 0);

        assert!(!rt.voice().is_active());
        assert!(!rt.voice().has_sound());
        assert!(!playing.load(Ordering::Relaxed));
    }

    #[test]
    fn attach_resets_cursor_state() {
        let (mut tx, mut rt, _playing) = rt_pair();
        tx.push(Command::Attach(ramp_sound(50))).unwrap();
        tx.push(Command::Seek(20)).unwrap();
        tx.push(Command::ArmStop(99)).unwrap();
        tx.push(Command::Start).unwrap();
        rt.process_commands();

        tx.push(Command::Attach(ramp_sound(50))).unwrap();
        rt.process_commands();

        assert_eq!(rt.voice().position(), 0);
        assert_eq!(rt.voice().stop_at(), None);
        assert!(!rt.voice().is_active());
    }

    #[test]
    fn mono_output_mixes_both_channels() {
        let (mut tx, mut rt, _playing) = rt_pair();
        let decoded = DecodedAudio {
            sample_rate: 48_000,
            channels: 2,
            samples: vec![0.2, 0.4, 0.2, 0.4],
        };
        tx.push(Command::Attach(Arc::new(Sound::from_decoded(
            &decoded, 48_000,
        ))))
        .unwrap();
        tx.push(Command::Start).unwrap();
        rt.process_commands();

        let mut buf = [0.0f32; 2];
        rt.process(&mut buf, 1, 0);

        assert!((buf[0] - 0.3).abs() < 1e-6);
    }
}
