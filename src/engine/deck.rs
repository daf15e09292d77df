//! Deck
//!
//! One playback unit: a shared track buffer, a transport, tone controls
//! (3-band EQ, sweep filter, pitch), eight hot cues and a beat loop.
//!
//! Everything reachable from `render` or from a realtime command runs on the
//! audio thread and must not log; callers log the intent instead.
//!
//! Continuous controls clamp to their range and report the stored value.
//! NaN and infinities are rejected with `InvalidParameter`; operations that
//! need a track return a `State` error on an empty deck.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::dsp::eq::{EqBand, EqSettings, ThreeBandEq};
use crate::dsp::filter::SweepFilter;
use crate::dsp::node::AudioNode;
use crate::engine::buffer::{AudioBuffer, StereoFrame};
use crate::engine::hotcue::{validate_slot, HotCuePads, PadAction, PressToken, HOT_CUE_SLOTS};
use crate::engine::io::decode_audio;
use crate::engine::tempo::{self, DEFAULT_BPM, MAX_BPM, MIN_BPM};
use crate::engine::transport::{LoopRegion, Transport, TransportState};
use crate::error::{ensure_finite, MixError, Result};

/// Lowest pitch ratio
pub const MIN_PITCH: f64 = 0.5;

/// Highest pitch ratio
pub const MAX_PITCH: f64 = 2.0;

/// Default loop length in beats
pub const DEFAULT_LOOP_BEATS: u32 = 4;

// ============================================================================
// Identifiers and Markers
// ============================================================================

/// The two decks of the mixer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeckId {
    A,
    B,
}

impl DeckId {
    pub const BOTH: [DeckId; 2] = [DeckId::A, DeckId::B];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            DeckId::A => 0,
            DeckId::B => 1,
        }
    }

    pub fn other(self) -> DeckId {
        match self {
            DeckId::A => DeckId::B,
            DeckId::B => DeckId::A,
        }
    }
}

impl fmt::Display for DeckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeckId::A => write!(f, "A"),
            DeckId::B => write!(f, "B"),
        }
    }
}

/// Pad colour of a hot cue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CueColor {
    Red,
    Orange,
    Yellow,
    Green,
    Cyan,
    Blue,
    Purple,
    Pink,
}

impl CueColor {
    pub const PALETTE: [CueColor; HOT_CUE_SLOTS] = [
        CueColor::Red,
        CueColor::Orange,
        CueColor::Yellow,
        CueColor::Green,
        CueColor::Cyan,
        CueColor::Blue,
        CueColor::Purple,
        CueColor::Pink,
    ];

    /// Default colour of a 1-based slot
    pub fn for_slot(slot: u8) -> CueColor {
        Self::PALETTE[(slot.max(1) as usize - 1) % HOT_CUE_SLOTS]
    }
}

/// A stored playback position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HotCue {
    pub slot: u8,
    pub time_seconds: f64,
    pub color: CueColor,
}

/// Beat loop settings of a deck
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoopState {
    pub length_beats: u32,
    pub active: bool,
    pub loop_in_seconds: f64,
}

impl Default for LoopState {
    fn default() -> Self {
        Self {
            length_beats: DEFAULT_LOOP_BEATS,
            active: false,
            loop_in_seconds: 0.0,
        }
    }
}

/// Caller-supplied metadata for a track
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub filename: Option<String>,
    pub bpm: Option<f64>,
}

/// Facts about a freshly loaded buffer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadInfo {
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: usize,
    pub frames: usize,
}

impl LoadInfo {
    pub fn from_buffer(buffer: &AudioBuffer) -> Self {
        Self {
            duration_seconds: buffer.duration_secs(),
            sample_rate: buffer.sample_rate(),
            channels: buffer.num_channels(),
            frames: buffer.num_frames(),
        }
    }
}

/// Outcome of a hot-cue trigger
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HotCueAction {
    /// Slot was empty; the current position was stored
    Stored(HotCue),
    /// Slot was set; playback moved to it
    Jumped(HotCue),
}

/// Plain snapshot of a deck for UI polling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckState {
    pub id: DeckId,
    pub loaded: bool,
    pub filename: Option<String>,
    pub bpm: f64,
    pub playing: bool,
    pub position_seconds: f64,
    pub duration_seconds: f64,
    pub pitch_ratio: f64,
    pub eq: EqSettings,
    pub filter_cutoff_hz: f32,
    pub loop_state: LoopState,
    pub hot_cues: [Option<HotCue>; HOT_CUE_SLOTS],
}

// ============================================================================
// Deck
// ============================================================================

/// A single deck
pub struct Deck {
    id: DeckId,
    sample_rate: u32,
    buffer: Option<Arc<AudioBuffer>>,
    transport: Transport,
    filename: Option<String>,
    bpm: f64,
    pitch: f64,
    eq: ThreeBandEq,
    filter: SweepFilter,
    hot_cues: [Option<HotCue>; HOT_CUE_SLOTS],
    loop_state: LoopState,
    pads: HotCuePads,
}

impl Deck {
    pub fn new(id: DeckId, config: &EngineConfig) -> Self {
        Self {
            id,
            sample_rate: config.sample_rate,
            buffer: None,
            transport: Transport::new(),
            filename: None,
            bpm: DEFAULT_BPM,
            pitch: 1.0,
            eq: ThreeBandEq::new(config.eq, config.sample_rate),
            filter: SweepFilter::new(config.sample_rate),
            hot_cues: [None; HOT_CUE_SLOTS],
            loop_state: LoopState::default(),
            pads: HotCuePads::new(Duration::from_millis(config.hot_cue_long_press_ms)),
        }
    }

    pub fn id(&self) -> DeckId {
        self.id
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Decode `bytes` and make them the deck's track
    ///
    /// On failure the previous track and every deck setting stay as they were.
    pub fn load(&mut self, bytes: &[u8]) -> Result<LoadInfo> {
        let buffer = decode_audio(bytes, self.sample_rate)?;
        let info = LoadInfo::from_buffer(&buffer);
        self.install(Arc::new(buffer))?;
        log::info!(
            "Deck {} loaded {:.2}s of audio ({} ch)",
            self.id,
            info.duration_seconds,
            info.channels
        );
        Ok(info)
    }

    /// Load a track together with its filename and BPM
    pub fn load_track(&mut self, bytes: &[u8], track: TrackInfo) -> Result<LoadInfo> {
        let bpm = track.bpm.map(|bpm| ensure_finite("bpm", bpm)).transpose()?;
        let info = self.load(bytes)?;
        self.filename = track.filename;
        if let Some(bpm) = bpm {
            self.set_bpm(bpm)?;
        }
        Ok(info)
    }

    /// Swap in an already-decoded buffer, returning the one it replaces
    ///
    /// Rewinds, clears hot cues, loop state and the filename. EQ, filter,
    /// pitch and BPM carry over.
    pub fn install(&mut self, buffer: Arc<AudioBuffer>) -> Result<Option<Arc<AudioBuffer>>> {
        if buffer.sample_rate() != self.sample_rate {
            return Err(MixError::invalid_parameter(
                "buffer.sample_rate",
                buffer.sample_rate(),
                format!("{} Hz (engine rate)", self.sample_rate),
            ));
        }
        if buffer.is_empty() {
            return Err(MixError::decode("audio contains no frames"));
        }

        self.transport.load(buffer.num_frames());
        self.hot_cues = [None; HOT_CUE_SLOTS];
        self.loop_state = LoopState::default();
        self.filename = None;
        self.pads.reset();
        self.eq.reset();
        self.filter.reset();
        Ok(self.buffer.replace(buffer))
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Start or resume; `false` when nothing is loaded
    pub fn play(&mut self) -> bool {
        self.transport.play()
    }

    pub fn pause(&mut self) {
        self.transport.pause();
    }

    /// Stop and rewind; cues and loop settings survive
    pub fn stop(&mut self) {
        self.transport.stop();
    }

    /// Move to `seconds`, clamped to the track; returns the new position
    ///
    /// Landing outside an active loop switches the loop off.
    pub fn seek(&mut self, seconds: f64) -> Result<f64> {
        let seconds = ensure_finite("seek", seconds)?;
        self.require_loaded("seek")?;

        if self.transport.seek(seconds * self.sample_rate as f64) {
            self.loop_state.active = false;
        }
        Ok(self.position_seconds())
    }

    // ========================================================================
    // Tone and Tempo
    // ========================================================================

    /// Set playback rate, clamped to [0.5, 2.0]
    pub fn set_pitch(&mut self, ratio: f64) -> Result<f64> {
        let ratio = ensure_finite("pitch", ratio)?.clamp(MIN_PITCH, MAX_PITCH);
        self.pitch = ratio;
        self.transport.set_rate(ratio);
        Ok(ratio)
    }

    /// Set one EQ band, clamped to [-24, +24] dB
    pub fn set_eq(&mut self, band: EqBand, db: f32) -> Result<f32> {
        ensure_finite("eq", db as f64)?;
        Ok(self.eq.set_band(band, db))
    }

    /// Set the low-pass cutoff, clamped to [20, 20000] Hz
    pub fn set_filter_cutoff(&mut self, hz: f32) -> Result<f32> {
        ensure_finite("filter_cutoff", hz as f64)?;
        Ok(self.filter.set_cutoff(hz))
    }

    /// Set the track BPM, clamped to [20, 300]
    pub fn set_bpm(&mut self, bpm: f64) -> Result<f64> {
        let bpm = ensure_finite("bpm", bpm)?.clamp(MIN_BPM, MAX_BPM);
        self.bpm = bpm;
        self.apply_loop();
        Ok(bpm)
    }

    // ========================================================================
    // Hot Cues
    // ========================================================================

    /// Store the current position in an empty slot, or jump to a stored one
    pub fn set_hot_cue(&mut self, slot: u8) -> Result<HotCueAction> {
        let index = validate_slot(slot)?;
        self.require_loaded("set hot cue")?;

        match self.hot_cues[index] {
            Some(cue) => {
                self.seek(cue.time_seconds)?;
                Ok(HotCueAction::Jumped(cue))
            }
            None => self
                .store_hot_cue(slot, self.position_seconds())
                .map(HotCueAction::Stored),
        }
    }

    /// Write `seconds` into a slot, replacing whatever was there
    pub fn store_hot_cue(&mut self, slot: u8, seconds: f64) -> Result<HotCue> {
        let index = validate_slot(slot)?;
        let seconds = ensure_finite("hot_cue", seconds)?;
        self.require_loaded("store hot cue")?;

        let last = (self.transport.length() - 1) as f64 / self.sample_rate as f64;
        let cue = HotCue {
            slot,
            time_seconds: seconds.clamp(0.0, last),
            color: CueColor::for_slot(slot),
        };
        self.hot_cues[index] = Some(cue);
        Ok(cue)
    }

    /// Clear a slot; returns the cue that was there
    pub fn delete_hot_cue(&mut self, slot: u8) -> Result<Option<HotCue>> {
        let index = validate_slot(slot)?;
        Ok(self.hot_cues[index].take())
    }

    pub fn hot_cue(&self, slot: u8) -> Option<HotCue> {
        validate_slot(slot).ok().and_then(|index| self.hot_cues[index])
    }

    /// Pad pressed down
    pub fn press_hot_cue(&mut self, slot: u8, now: Instant) -> Result<PressToken> {
        self.pads.press(slot, now)
    }

    /// Pad released; applies and returns the resulting action
    pub fn release_hot_cue(&mut self, token: PressToken, now: Instant) -> Result<Option<PadAction>> {
        let action = self.pads.release(token, now);
        if let Some(action) = action {
            self.apply_pad_action(action)?;
        }
        Ok(action)
    }

    /// Pointer left the pad
    pub fn cancel_hot_cue(&mut self, token: PressToken) {
        self.pads.cancel(token);
    }

    /// Fire due long presses; returns the cleared slots
    pub fn tick_pads(&mut self, now: Instant) -> Vec<PadAction> {
        let actions = self.pads.tick(now);
        for action in &actions {
            if let PadAction::Clear(slot) = *action {
                let _ = self.delete_hot_cue(slot);
                log::debug!("Deck {} hot cue {} cleared by long press", self.id, slot);
            }
        }
        actions
    }

    fn apply_pad_action(&mut self, action: PadAction) -> Result<()> {
        match action {
            PadAction::Trigger(slot) => self.set_hot_cue(slot).map(|_| ()),
            PadAction::Clear(slot) => self.delete_hot_cue(slot).map(|_| ()),
        }
    }

    // ========================================================================
    // Loop
    // ========================================================================

    /// Set the loop length and flip the loop on or off
    ///
    /// Activating anchors the loop at the current position. Returns whether
    /// the loop is now active.
    pub fn toggle_loop(&mut self, length_beats: u32) -> Result<bool> {
        let length_beats = tempo::validate_loop_length(length_beats)?;
        self.require_loaded("toggle loop")?;

        self.loop_state.length_beats = length_beats;
        self.loop_state.active = !self.loop_state.active;
        if self.loop_state.active {
            self.loop_state.loop_in_seconds = self.position_seconds();
        }
        self.apply_loop();
        Ok(self.loop_state.active)
    }

    fn apply_loop(&mut self) {
        if !self.loop_state.active {
            self.transport.set_loop(None);
            return;
        }
        let rate = self.sample_rate as f64;
        let start = self.loop_state.loop_in_seconds * rate;
        let end = (start + tempo::loop_duration(self.loop_state.length_beats, self.bpm) * rate)
            .min(self.transport.length() as f64);
        self.transport.set_loop(Some(LoopRegion { start, end }));
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Render the next block of this deck's post-EQ/filter signal
    pub fn render(&mut self, out: &mut [StereoFrame]) {
        match &self.buffer {
            Some(buffer) => {
                for frame in out.iter_mut() {
                    *frame = match self.transport.next_read_position() {
                        Some(position) => buffer.frame_at(position),
                        None => StereoFrame::SILENCE,
                    };
                }
            }
            None => out.fill(StereoFrame::SILENCE),
        }
        self.eq.process(out);
        self.filter.process(out);
    }

    // ========================================================================
    // State Queries
    // ========================================================================

    pub fn is_loaded(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_playing()
    }

    pub fn transport_state(&self) -> TransportState {
        self.transport.state()
    }

    pub fn position_seconds(&self) -> f64 {
        self.transport.position() / self.sample_rate as f64
    }

    pub fn duration_seconds(&self) -> f64 {
        self.buffer.as_ref().map_or(0.0, |b| b.duration_secs())
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    pub fn eq_settings(&self) -> EqSettings {
        self.eq.settings()
    }

    pub fn filter_cutoff(&self) -> f32 {
        self.filter.cutoff()
    }

    pub fn loop_state(&self) -> LoopState {
        self.loop_state
    }

    pub fn hot_cues(&self) -> &[Option<HotCue>; HOT_CUE_SLOTS] {
        &self.hot_cues
    }

    pub fn buffer(&self) -> Option<&Arc<AudioBuffer>> {
        self.buffer.as_ref()
    }

    pub fn state(&self) -> DeckState {
        DeckState {
            id: self.id,
            loaded: self.is_loaded(),
            filename: self.filename.clone(),
            bpm: self.bpm,
            playing: self.is_playing(),
            position_seconds: self.position_seconds(),
            duration_seconds: self.duration_seconds(),
            pitch_ratio: self.pitch,
            eq: self.eq.settings(),
            filter_cutoff_hz: self.filter.cutoff(),
            loop_state: self.loop_state,
            hot_cues: self.hot_cues,
        }
    }

    fn require_loaded(&self, operation: &str) -> Result<()> {
        if self.is_loaded() {
            Ok(())
        } else {
            Err(MixError::state(operation, format!("deck {} has no track", self.id)))
        }
    }
}

impl fmt::Debug for Deck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deck")
            .field("id", &self.id)
            .field("state", &self.transport.state())
            .field("position_seconds", &self.position_seconds())
            .field("pitch", &self.pitch)
            .finish()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::io::{encode_buffer, generate_constant};
    use approx::assert_relative_eq;

    const RATE: u32 = 48000;

    fn deck_with(seconds: f32) -> Deck {
        let mut deck = Deck::new(DeckId::A, &EngineConfig::default());
        deck.install(Arc::new(generate_constant(0.5, seconds, RATE)))
            .unwrap();
        deck
    }

    fn advance(deck: &mut Deck, frames: usize) {
        let mut block = vec![StereoFrame::SILENCE; frames];
        deck.render(&mut block);
    }

    #[test]
    fn test_new_deck_defaults() {
        let deck = Deck::new(DeckId::B, &EngineConfig::default());
        let state = deck.state();
        assert_eq!(state.id, DeckId::B);
        assert!(!state.loaded);
        assert_eq!(state.bpm, 120.0);
        assert_eq!(state.pitch_ratio, 1.0);
        assert_eq!(state.filter_cutoff_hz, 20000.0);
        assert_eq!(state.loop_state.length_beats, 4);
        assert!(state.hot_cues.iter().all(Option::is_none));
    }

    #[test]
    fn test_load_from_bytes() {
        let bytes = encode_buffer(&generate_constant(0.25, 1.0, RATE)).unwrap();
        let mut deck = Deck::new(DeckId::A, &EngineConfig::default());
        let info = deck
            .load_track(
                &bytes,
                TrackInfo {
                    filename: Some("loop.wav".into()),
                    bpm: Some(124.0),
                },
            )
            .unwrap();
        assert_relative_eq!(info.duration_seconds, 1.0);
        assert_eq!(deck.state().filename.as_deref(), Some("loop.wav"));
        assert_eq!(deck.bpm(), 124.0);
    }

    #[test]
    fn test_play_on_empty_deck_is_noop() {
        let mut deck = Deck::new(DeckId::A, &EngineConfig::default());
        assert!(!deck.play());
        assert!(!deck.is_playing());
    }

    #[test]
    fn test_unloaded_operations_are_state_errors() {
        let mut deck = Deck::new(DeckId::A, &EngineConfig::default());
        assert_eq!(deck.seek(1.0).unwrap_err().error_code(), "STATE_ERROR");
        assert_eq!(deck.set_hot_cue(1).unwrap_err().error_code(), "STATE_ERROR");
        assert_eq!(deck.toggle_loop(4).unwrap_err().error_code(), "STATE_ERROR");
        // Deleting is always allowed
        assert_eq!(deck.delete_hot_cue(1).unwrap(), None);
    }

    #[test]
    fn test_render_reads_buffer() {
        let mut deck = deck_with(1.0);
        let mut block = [StereoFrame::SILENCE; 64];
        deck.render(&mut block);
        assert!(block.iter().all(StereoFrame::is_silent));

        deck.play();
        deck.render(&mut block);
        assert!(block.iter().all(|f| f.left == 0.5 && f.right == 0.5));
        assert_relative_eq!(deck.position_seconds(), 64.0 / RATE as f64);
    }

    #[test]
    fn test_pause_keeps_position_stop_rewinds() {
        let mut deck = deck_with(1.0);
        deck.play();
        advance(&mut deck, 4800);
        deck.pause();
        advance(&mut deck, 4800);
        assert_relative_eq!(deck.position_seconds(), 0.1);

        deck.stop();
        assert_eq!(deck.position_seconds(), 0.0);
        assert_eq!(deck.transport_state(), TransportState::Loaded);
    }

    #[test]
    fn test_seek_clamps_and_rejects_nan() {
        let mut deck = deck_with(2.0);
        assert_eq!(deck.seek(-3.0).unwrap(), 0.0);
        let end = deck.seek(10.0).unwrap();
        assert!(end < 2.0 && end > 1.999);
        assert_eq!(
            deck.seek(f64::NAN).unwrap_err().error_code(),
            "INVALID_PARAMETER"
        );
    }

    #[test]
    fn test_pitch_clamped_and_idempotent() {
        let mut deck = deck_with(1.0);
        assert_eq!(deck.set_pitch(3.0).unwrap(), 2.0);
        assert_eq!(deck.set_pitch(3.0).unwrap(), 2.0);
        assert_eq!(deck.set_pitch(0.1).unwrap(), 0.5);
        assert!(deck.set_pitch(f64::INFINITY).is_err());
        assert_eq!(deck.pitch(), 0.5);
    }

    #[test]
    fn test_pitch_changes_read_speed() {
        let mut deck = deck_with(1.0);
        deck.set_pitch(2.0).unwrap();
        deck.play();
        advance(&mut deck, 4800);
        assert_relative_eq!(deck.position_seconds(), 0.2);
    }

    #[test]
    fn test_eq_and_filter_clamped() {
        let mut deck = deck_with(1.0);
        assert_eq!(deck.set_eq(EqBand::Low, -40.0).unwrap(), -24.0);
        assert_eq!(deck.set_eq(EqBand::Low, -40.0).unwrap(), -24.0);
        assert_eq!(deck.set_filter_cutoff(1.0).unwrap(), 20.0);
        assert!(deck.set_eq(EqBand::Mid, f32::NAN).is_err());
        assert_eq!(deck.eq_settings().mid, 0.0);
    }

    #[test]
    fn test_bpm_clamped() {
        let mut deck = deck_with(1.0);
        assert_eq!(deck.set_bpm(500.0).unwrap(), 300.0);
        assert_eq!(deck.set_bpm(5.0).unwrap(), 20.0);
    }

    #[test]
    fn test_hot_cue_store_then_jump() {
        let mut deck = deck_with(20.0);
        deck.seek(12.5).unwrap();
        let stored = deck.set_hot_cue(3).unwrap();
        assert!(matches!(stored, HotCueAction::Stored(cue) if cue.time_seconds == 12.5));
        assert_eq!(deck.hot_cue(3).unwrap().color, CueColor::Yellow);

        deck.seek(2.0).unwrap();
        let jumped = deck.set_hot_cue(3).unwrap();
        assert!(matches!(jumped, HotCueAction::Jumped(_)));
        assert_eq!(deck.position_seconds(), 12.5);
    }

    #[test]
    fn test_store_hot_cue_at_given_time() {
        let mut deck = deck_with(4.0);
        let cue = deck.store_hot_cue(5, 2.25).unwrap();
        assert_eq!(cue.time_seconds, 2.25);
        assert_eq!(deck.position_seconds(), 0.0);

        assert!(deck.store_hot_cue(5, 9.0).unwrap().time_seconds < 4.0);
        assert!(deck.store_hot_cue(5, f64::NAN).is_err());
    }

    #[test]
    fn test_hot_cue_invalid_slot() {
        let mut deck = deck_with(1.0);
        assert!(deck.set_hot_cue(0).is_err());
        assert!(deck.set_hot_cue(9).is_err());
        assert!(deck.delete_hot_cue(9).is_err());
    }

    #[test]
    fn test_pad_long_press_clears() {
        let mut deck = deck_with(5.0);
        let t0 = Instant::now();
        deck.seek(1.0).unwrap();
        let token = deck.press_hot_cue(2, t0).unwrap();
        assert_eq!(
            deck.release_hot_cue(token, t0 + Duration::from_millis(100))
                .unwrap(),
            Some(PadAction::Trigger(2))
        );
        assert!(deck.hot_cue(2).is_some());

        deck.press_hot_cue(2, t0 + Duration::from_secs(1)).unwrap();
        let actions = deck.tick_pads(t0 + Duration::from_millis(1700));
        assert_eq!(actions, vec![PadAction::Clear(2)]);
        assert!(deck.hot_cue(2).is_none());
    }

    #[test]
    fn test_loop_wraps_in_track_time() {
        let mut deck = deck_with(10.0);
        deck.set_bpm(120.0).unwrap();
        assert!(deck.toggle_loop(1).unwrap());
        deck.play();
        // 1 beat at 120 BPM = 0.5s = 24000 frames
        advance(&mut deck, 24000);
        assert_eq!(deck.position_seconds(), 0.0);

        // At double pitch the loop comes round twice as fast
        deck.set_pitch(2.0).unwrap();
        advance(&mut deck, 12000);
        assert_eq!(deck.position_seconds(), 0.0);

        assert!(!deck.toggle_loop(1).unwrap());
        advance(&mut deck, 12000);
        assert_relative_eq!(deck.position_seconds(), 0.5);
    }

    #[test]
    fn test_loop_truncated_at_track_end() {
        let mut deck = deck_with(1.0);
        deck.set_bpm(60.0).unwrap();
        deck.seek(0.5).unwrap();
        deck.toggle_loop(4).unwrap();
        deck.play();
        advance(&mut deck, 24000);
        assert_relative_eq!(deck.position_seconds(), 0.5);
        assert!(deck.is_playing());
    }

    #[test]
    fn test_seek_outside_loop_deactivates() {
        let mut deck = deck_with(10.0);
        deck.toggle_loop(4).unwrap();
        deck.seek(1.0).unwrap();
        assert!(deck.loop_state().active);
        deck.seek(5.0).unwrap();
        assert!(!deck.loop_state().active);
        assert_eq!(deck.loop_state().length_beats, 4);
    }

    #[test]
    fn test_invalid_loop_length() {
        let mut deck = deck_with(1.0);
        assert!(deck.toggle_loop(3).is_err());
        assert!(!deck.loop_state().active);
    }

    #[test]
    fn test_install_clears_cues_and_loop() {
        let mut deck = deck_with(4.0);
        deck.set_hot_cue(1).unwrap();
        deck.toggle_loop(2).unwrap();
        deck.set_eq(EqBand::High, -6.0).unwrap();

        let old = deck
            .install(Arc::new(generate_constant(0.1, 2.0, RATE)))
            .unwrap();
        assert!(old.is_some());
        assert!(deck.hot_cues().iter().all(Option::is_none));
        assert!(!deck.loop_state().active);
        assert_eq!(deck.position_seconds(), 0.0);
        assert_eq!(deck.eq_settings().high, -6.0);
    }

    #[test]
    fn test_failed_load_keeps_previous_track() {
        let mut deck = deck_with(3.0);
        deck.set_hot_cue(4).unwrap();
        deck.seek(1.5).unwrap();

        let err = deck.load(b"definitely not a wav file").unwrap_err();
        assert_eq!(err.error_code(), "DECODE_ERROR");
        assert_relative_eq!(deck.duration_seconds(), 3.0);
        assert_eq!(deck.position_seconds(), 1.5);
        assert!(deck.hot_cue(4).is_some());
    }

    #[test]
    fn test_install_rejects_wrong_rate() {
        let mut deck = Deck::new(DeckId::A, &EngineConfig::default());
        let err = deck
            .install(Arc::new(generate_constant(0.1, 1.0, 44100)))
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_PARAMETER");
        assert!(!deck.is_loaded());
    }
}
