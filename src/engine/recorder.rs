//! Mix recorder
//!
//! Capture is split in two halves joined by a bounded `rtrb` ring:
//!
//! - [`CaptureTap`] sits on the master bus as an [`AudioNode`]. While armed
//!   it copies every frame into the ring and never blocks. When the ring is
//!   full the frames it could not push are counted and reported in-band as
//!   a gap once space frees up.
//! - [`Recorder`] lives on the control thread. `pump` drains the ring,
//!   replacing each gap with silence of the same length so the timeline
//!   stays intact; `stop` encodes everything into a 32-bit float WAV.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rtrb::{Consumer, Producer, RingBuffer};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::RecorderConfig;
use crate::dsp::node::AudioNode;
use crate::engine::buffer::StereoFrame;
use crate::engine::io::encode_wav;
use crate::error::{MixError, Result};

/// Item carried from the tap to the recorder
#[derive(Debug, Clone, Copy, PartialEq)]
enum CaptureItem {
    Frame(StereoFrame),
    /// This many frames were lost at this point in the stream
    Gap(u64),
}

/// State shared between the two halves
#[derive(Debug, Default)]
struct CaptureShared {
    armed: AtomicBool,
    /// Bumped on every start so the tap can drop stale gap counts
    session: AtomicU64,
    /// Frames dropped in the current session
    dropped: AtomicU64,
}

/// Create a connected tap/recorder pair
pub fn capture_channel(config: RecorderConfig, sample_rate: u32) -> (CaptureTap, Recorder) {
    let (producer, consumer) = RingBuffer::new(config.capture_queue_frames.max(1));
    let shared = Arc::new(CaptureShared::default());

    let tap = CaptureTap {
        producer,
        shared: Arc::clone(&shared),
        session: 0,
        pending_gap: 0,
    };
    let recorder = Recorder {
        consumer,
        shared,
        config,
        sample_rate,
        state: RecordingState::Idle,
        frames: Vec::new(),
        gaps: Vec::new(),
        reported_dropped: 0,
        started_at: None,
    };
    (tap, recorder)
}

// ============================================================================
// Capture Tap (audio side)
// ============================================================================

/// Master bus splitter feeding the recorder
///
/// Passes audio through untouched.
pub struct CaptureTap {
    producer: Producer<CaptureItem>,
    shared: Arc<CaptureShared>,
    session: u64,
    pending_gap: u64,
}

impl CaptureTap {
    fn drop_frames(&mut self, count: usize) {
        self.pending_gap += count as u64;
        self.shared.dropped.fetch_add(count as u64, Ordering::Relaxed);
    }
}

impl AudioNode for CaptureTap {
    fn process(&mut self, block: &mut [StereoFrame]) {
        if !self.shared.armed.load(Ordering::Acquire) {
            self.pending_gap = 0;
            return;
        }
        let session = self.shared.session.load(Ordering::Acquire);
        if session != self.session {
            self.session = session;
            self.pending_gap = 0;
        }

        if self.pending_gap > 0 {
            if self.producer.push(CaptureItem::Gap(self.pending_gap)).is_err() {
                self.drop_frames(block.len());
                return;
            }
            self.pending_gap = 0;
        }

        let mut pushed = 0;
        for frame in block.iter() {
            if self.producer.push(CaptureItem::Frame(*frame)).is_err() {
                break;
            }
            pushed += 1;
        }
        if pushed < block.len() {
            self.drop_frames(block.len() - pushed);
        }
    }

    fn prepare(&mut self, _sample_rate: u32) {}

    fn reset(&mut self) {
        self.pending_gap = 0;
    }

    fn node_type(&self) -> &'static str {
        "capture_tap"
    }
}

// ============================================================================
// Recorder (control side)
// ============================================================================

/// Lifecycle of the recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RecordingState {
    #[default]
    Idle,
    Recording,
    Stopped,
}

/// Silence inserted where captured frames were lost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureGap {
    /// Frame offset of the gap inside the recording
    pub at_frame: u64,
    /// Length of the gap in frames
    pub frames: u64,
}

/// A finished recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub sample_rate: u32,
    pub frames: u64,
    pub gaps: Vec<CaptureGap>,
    /// SHA-256 of `bytes`, lowercase hex
    pub checksum: String,
    /// 32-bit float stereo WAV
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl Recording {
    pub fn duration_seconds(&self) -> f64 {
        self.frames as f64 / self.sample_rate as f64
    }

    /// Recompute the checksum and compare
    pub fn verify(&self) -> bool {
        checksum(&self.bytes) == self.checksum
    }
}

/// Control-thread half of the capture pair
pub struct Recorder {
    consumer: Consumer<CaptureItem>,
    shared: Arc<CaptureShared>,
    config: RecorderConfig,
    sample_rate: u32,
    state: RecordingState,
    frames: Vec<StereoFrame>,
    gaps: Vec<CaptureGap>,
    reported_dropped: u64,
    started_at: Option<DateTime<Utc>>,
}

impl Recorder {
    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecordingState::Recording
    }

    /// Frames captured so far in this session
    pub fn captured_frames(&self) -> u64 {
        self.frames.len() as u64
    }

    /// Begin a new recording
    ///
    /// `any_deck_playing` is only consulted when the recorder is configured
    /// to require a playing deck.
    pub fn start(&mut self, any_deck_playing: bool) -> Result<()> {
        if self.state == RecordingState::Recording {
            return Err(MixError::state("start recording", "already recording"));
        }
        if self.config.require_playing_deck && !any_deck_playing {
            return Err(MixError::state("start recording", "no deck is playing"));
        }

        self.shared.session.fetch_add(1, Ordering::AcqRel);
        self.shared.dropped.store(0, Ordering::Relaxed);
        while self.consumer.pop().is_ok() {}

        self.frames.clear();
        self.gaps.clear();
        self.reported_dropped = 0;
        self.started_at = Some(Utc::now());
        self.state = RecordingState::Recording;
        self.shared.armed.store(true, Ordering::Release);
        log::info!("Recording started");
        Ok(())
    }

    /// Move captured frames out of the ring; returns how many were taken
    pub fn pump(&mut self) -> usize {
        let mut taken = 0;
        while let Ok(item) = self.consumer.pop() {
            if self.state != RecordingState::Recording {
                continue;
            }
            match item {
                CaptureItem::Frame(frame) => {
                    self.frames.push(frame);
                    taken += 1;
                }
                CaptureItem::Gap(count) => {
                    self.insert_gap(count);
                    taken += count as usize;
                }
            }
        }
        taken
    }

    /// Finish and return the recording
    pub fn stop(&mut self) -> Result<Recording> {
        if self.state != RecordingState::Recording {
            return Err(MixError::state("stop recording", "not recording"));
        }
        self.shared.armed.store(false, Ordering::Release);
        self.pump();

        // Drops the tap had not yet reported in-band
        let trailing = self
            .shared
            .dropped
            .load(Ordering::Relaxed)
            .saturating_sub(self.reported_dropped);
        if trailing > 0 {
            self.insert_gap(trailing);
        }

        // The session ends here even if encoding fails below
        let frames = std::mem::take(&mut self.frames);
        let gaps = std::mem::take(&mut self.gaps);
        let started_at = self.started_at.take().unwrap_or_else(Utc::now);
        self.state = RecordingState::Stopped;

        let bytes = encode_wav(&frames, self.sample_rate)?;
        let recording = Recording {
            id: Uuid::new_v4(),
            started_at,
            sample_rate: self.sample_rate,
            frames: frames.len() as u64,
            gaps,
            checksum: checksum(&bytes),
            bytes,
        };

        log::info!(
            "Recording {} stopped: {:.2}s, {} gap(s)",
            recording.id,
            recording.duration_seconds(),
            recording.gaps.len()
        );
        Ok(recording)
    }

    fn insert_gap(&mut self, count: u64) {
        let at_frame = self.frames.len() as u64;
        let overrun = MixError::CaptureOverrun {
            at_frame,
            dropped_frames: count,
        };
        log::warn!("{}", overrun);

        self.frames
            .extend(std::iter::repeat(StereoFrame::SILENCE).take(count as usize));
        self.gaps.push(CaptureGap {
            at_frame,
            frames: count,
        });
        self.reported_dropped += count;
    }
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("state", &self.state)
            .field("frames", &self.frames.len())
            .field("gaps", &self.gaps.len())
            .finish()
    }
}

fn checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::io::decode_audio;
    use pretty_assertions::assert_eq;

    fn pair(capacity: usize) -> (CaptureTap, Recorder) {
        capture_channel(
            RecorderConfig {
                capture_queue_frames: capacity,
                require_playing_deck: false,
            },
            48000,
        )
    }

    #[test]
    fn test_state_transitions() {
        let (_tap, mut recorder) = pair(1024);
        assert_eq!(recorder.state(), RecordingState::Idle);
        assert!(recorder.stop().is_err());

        recorder.start(false).unwrap();
        assert_eq!(recorder.state(), RecordingState::Recording);
        assert_eq!(recorder.start(false).unwrap_err().error_code(), "STATE_ERROR");

        recorder.stop().unwrap();
        assert_eq!(recorder.state(), RecordingState::Stopped);
        recorder.start(false).unwrap();
        assert!(recorder.is_recording());
    }

    #[test]
    fn test_stop_fully_ends_the_session() {
        let (mut tap, mut recorder) = pair(1024);
        recorder.start(false).unwrap();
        let mut block = [StereoFrame::mono(0.2); 32];
        tap.process(&mut block);
        recorder.stop().unwrap();

        assert_eq!(recorder.state(), RecordingState::Stopped);
        assert_eq!(recorder.captured_frames(), 0);
        // Tap is disarmed, so nothing more arrives
        tap.process(&mut block);
        assert_eq!(recorder.pump(), 0);
        assert!(recorder.stop().is_err());
    }

    #[test]
    fn test_guard_requires_playing_deck() {
        let (_tap, mut recorder) = capture_channel(
            RecorderConfig {
                capture_queue_frames: 1024,
                require_playing_deck: true,
            },
            48000,
        );
        assert!(recorder.start(false).is_err());
        assert!(recorder.start(true).is_ok());
    }

    #[test]
    fn test_tap_is_passthrough_and_idle_when_disarmed() {
        let (mut tap, mut recorder) = pair(1024);
        let mut block = [StereoFrame::new(0.25, -0.25); 64];
        tap.process(&mut block);
        assert_eq!(block[0], StereoFrame::new(0.25, -0.25));
        assert_eq!(recorder.pump(), 0);
    }

    #[test]
    fn test_captures_frames_in_order() {
        let (mut tap, mut recorder) = pair(1024);
        recorder.start(false).unwrap();

        let mut block: Vec<StereoFrame> = (0..100).map(|i| StereoFrame::mono(i as f32 / 100.0)).collect();
        tap.process(&mut block);
        assert_eq!(recorder.pump(), 100);

        let recording = recorder.stop().unwrap();
        assert_eq!(recording.frames, 100);
        assert!(recording.gaps.is_empty());
        assert!(recording.verify());

        let decoded = decode_audio(&recording.bytes, 48000).unwrap();
        assert_eq!(decoded.num_frames(), 100);
        assert_eq!(decoded.frame(42), StereoFrame::mono(0.42));
    }

    #[test]
    fn test_overrun_becomes_silent_gap() {
        let (mut tap, mut recorder) = pair(64);
        recorder.start(false).unwrap();

        let mut block = [StereoFrame::mono(0.5); 48];
        tap.process(&mut block);
        // Only 16 of these fit
        tap.process(&mut block);
        assert_eq!(recorder.pump(), 64);

        // Next block first reports the 32 lost frames
        tap.process(&mut block);
        recorder.pump();

        let recording = recorder.stop().unwrap();
        assert_eq!(recording.frames, 48 + 48 + 48);
        assert_eq!(
            recording.gaps,
            vec![CaptureGap {
                at_frame: 64,
                frames: 32
            }]
        );
        let decoded = decode_audio(&recording.bytes, 48000).unwrap();
        assert!(decoded.frame(64).is_silent());
        assert!(decoded.frame(95).is_silent());
        assert_eq!(decoded.frame(96), StereoFrame::mono(0.5));
    }

    #[test]
    fn test_unreported_drops_added_at_stop() {
        let (mut tap, mut recorder) = pair(16);
        recorder.start(false).unwrap();
        let mut block = [StereoFrame::mono(0.1); 20];
        tap.process(&mut block);

        let recording = recorder.stop().unwrap();
        assert_eq!(recording.frames, 20);
        assert_eq!(recording.gaps, vec![CaptureGap { at_frame: 16, frames: 4 }]);
    }

    #[test]
    fn test_restart_discards_stale_frames() {
        let (mut tap, mut recorder) = pair(1024);
        recorder.start(false).unwrap();
        let mut block = [StereoFrame::mono(0.3); 10];
        tap.process(&mut block);
        let first = recorder.stop().unwrap();
        assert_eq!(first.frames, 10);

        recorder.start(false).unwrap();
        tap.process(&mut block[..4]);
        let second = recorder.stop().unwrap();
        assert_eq!(second.frames, 4);
        assert_ne!(first.id, second.id);
    }
}
