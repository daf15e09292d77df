//! Control thread / audio thread split
//!
//! The audio callback must never lock, allocate or free. The engine is
//! therefore split in two halves joined by lock-free `rtrb` queues:
//!
//! - [`EngineController`] runs on the control thread. It validates and
//!   clamps every request, decodes audio, updates a mirror of the deck and
//!   mixer state so reads are immediately consistent, and pushes an
//!   [`EngineCommand`] to the audio thread.
//! - [`AudioProcessor`] runs in the audio callback. At the start of each
//!   block it drains pending commands into its [`Mixer`], renders, and
//!   publishes transport state into [`DeckAtomics`].
//!
//! Nothing on the audio side logs; the controller logs each request.
//!
//! Buffers replaced by a load are not freed on the audio thread; they travel
//! back through a second queue and are dropped on the next
//! [`EngineController::poll`] or load.
//!
//! ```ignore
//! let (mut controller, mut processor) = engine_channel(EngineConfig::default())?;
//! // audio thread
//! processor.process(&mut out);
//! // control thread, every controller.poll_interval()
//! let snapshot = controller.poll(Instant::now());
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rtrb::{Consumer, Producer, PushError, RingBuffer};

use crate::config::EngineConfig;
use crate::dsp::eq::{EqBand, MAX_EQ_DB, MIN_EQ_DB};
use crate::dsp::filter::{MAX_CUTOFF_HZ, MIN_CUTOFF_HZ};
use crate::engine::buffer::{AudioBuffer, StereoFrame};
use crate::engine::deck::{
    CueColor, Deck, DeckId, DeckState, HotCue, HotCueAction, LoadInfo, LoopState, TrackInfo,
    MAX_PITCH, MIN_PITCH,
};
use crate::engine::hotcue::{validate_slot, HotCuePads, PadAction, PressToken, HOT_CUE_SLOTS};
use crate::engine::io::decode_audio;
use crate::engine::mixer::{Mixer, MixerSnapshot, MixerState};
use crate::engine::recorder::{capture_channel, Recorder, Recording, RecordingState};
use crate::engine::tempo::{self, MAX_BPM, MIN_BPM};
use crate::error::{ensure_finite, MixError, Result};

// ============================================================================
// Commands
// ============================================================================

/// Commands sent from the control thread to the audio thread
///
/// Values are already validated and clamped by the controller.
#[derive(Debug)]
pub enum EngineCommand {
    Install { deck: DeckId, buffer: Arc<AudioBuffer> },
    SetBpm { deck: DeckId, bpm: f64 },
    Play { deck: DeckId },
    Pause { deck: DeckId },
    Stop { deck: DeckId },
    Seek { deck: DeckId, seconds: f64 },
    SetPitch { deck: DeckId, ratio: f64 },
    SetEq { deck: DeckId, band: EqBand, db: f32 },
    SetFilterCutoff { deck: DeckId, hz: f32 },
    StoreHotCue { deck: DeckId, slot: u8, seconds: f64 },
    DeleteHotCue { deck: DeckId, slot: u8 },
    ToggleLoop { deck: DeckId, length_beats: u32 },
    SetCrossfader(f64),
    SetMasterVolume(f64),
}

impl EngineCommand {
    pub fn name(&self) -> &'static str {
        match self {
            EngineCommand::Install { .. } => "install",
            EngineCommand::SetBpm { .. } => "set_bpm",
            EngineCommand::Play { .. } => "play",
            EngineCommand::Pause { .. } => "pause",
            EngineCommand::Stop { .. } => "stop",
            EngineCommand::Seek { .. } => "seek",
            EngineCommand::SetPitch { .. } => "set_pitch",
            EngineCommand::SetEq { .. } => "set_eq",
            EngineCommand::SetFilterCutoff { .. } => "set_filter_cutoff",
            EngineCommand::StoreHotCue { .. } => "store_hot_cue",
            EngineCommand::DeleteHotCue { .. } => "delete_hot_cue",
            EngineCommand::ToggleLoop { .. } => "toggle_loop",
            EngineCommand::SetCrossfader(_) => "set_crossfader",
            EngineCommand::SetMasterVolume(_) => "set_master_volume",
        }
    }
}

// ============================================================================
// Published Deck State
// ============================================================================

/// Marks an empty hot-cue slot (a NaN bit pattern no position can take)
const EMPTY_CUE: u64 = u64::MAX;

/// Deck state written by the audio thread, read lock-free by the controller
///
/// Floats are stored as their bit patterns.
#[derive(Debug)]
pub struct DeckAtomics {
    loaded: AtomicBool,
    playing: AtomicBool,
    position: AtomicU64,
    loop_active: AtomicBool,
    loop_in: AtomicU64,
    hot_cues: [AtomicU64; HOT_CUE_SLOTS],
}

impl DeckAtomics {
    pub fn new() -> Self {
        Self {
            loaded: AtomicBool::new(false),
            playing: AtomicBool::new(false),
            position: AtomicU64::new(0f64.to_bits()),
            loop_active: AtomicBool::new(false),
            loop_in: AtomicU64::new(0f64.to_bits()),
            hot_cues: std::array::from_fn(|_| AtomicU64::new(EMPTY_CUE)),
        }
    }

    /// Copy a deck's transport state (audio thread)
    pub fn publish(&self, deck: &Deck) {
        self.loaded.store(deck.is_loaded(), Ordering::Relaxed);
        self.playing.store(deck.is_playing(), Ordering::Relaxed);
        self.position
            .store(deck.position_seconds().to_bits(), Ordering::Relaxed);
        let loop_state = deck.loop_state();
        self.loop_active.store(loop_state.active, Ordering::Relaxed);
        self.loop_in
            .store(loop_state.loop_in_seconds.to_bits(), Ordering::Relaxed);
        for (slot, cue) in self.hot_cues.iter().zip(deck.hot_cues().iter()) {
            let bits = cue.map_or(EMPTY_CUE, |cue| cue.time_seconds.to_bits());
            slot.store(bits, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn position_seconds(&self) -> f64 {
        f64::from_bits(self.position.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn loop_active(&self) -> bool {
        self.loop_active.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn loop_in_seconds(&self) -> f64 {
        f64::from_bits(self.loop_in.load(Ordering::Relaxed))
    }

    /// Stored time of a 0-based hot-cue slot
    #[inline]
    pub fn hot_cue(&self, index: usize) -> Option<f64> {
        match self.hot_cues[index].load(Ordering::Relaxed) {
            EMPTY_CUE => None,
            bits => Some(f64::from_bits(bits)),
        }
    }
}

impl Default for DeckAtomics {
    fn default() -> Self {
        Self::new()
    }
}

/// Create the two halves of a realtime engine
///
/// The recorder's capture tap is already connected to the master bus.
pub fn engine_channel(config: EngineConfig) -> Result<(EngineController, AudioProcessor)> {
    let mut mixer = Mixer::new(config.clone())?;
    let (command_tx, command_rx) = RingBuffer::new(config.command_queue_capacity);
    let (retired_tx, retired_rx) = RingBuffer::new(config.command_queue_capacity);
    let (tap, recorder) = capture_channel(config.recorder, config.sample_rate);
    mixer.connect_insert(Box::new(tap));

    let atomics = [Arc::new(DeckAtomics::new()), Arc::new(DeckAtomics::new())];
    let long_press = Duration::from_millis(config.hot_cue_long_press_ms);

    let controller = EngineController {
        decks: [mixer.deck(DeckId::A).state(), mixer.deck(DeckId::B).state()],
        mixer: mixer.state(),
        pads: [HotCuePads::new(long_press), HotCuePads::new(long_press)],
        commands: command_tx,
        retired: retired_rx,
        atomics: atomics.clone(),
        recorder,
        retired_buffers: 0,
        awaiting_return: 0,
        config,
    };
    let processor = AudioProcessor {
        mixer,
        commands: command_rx,
        retired: retired_tx,
        atomics,
    };
    Ok((controller, processor))
}

// ============================================================================
// Audio Processor (audio thread)
// ============================================================================

/// Audio-thread half of the engine
pub struct AudioProcessor {
    mixer: Mixer,
    commands: Consumer<EngineCommand>,
    retired: Producer<Arc<AudioBuffer>>,
    atomics: [Arc<DeckAtomics>; 2],
}

impl AudioProcessor {
    /// Audio callback: apply pending commands, render, publish state
    pub fn process(&mut self, out: &mut [StereoFrame]) {
        while let Ok(command) = self.commands.pop() {
            self.apply(command);
        }
        self.mixer.render(out);
        for id in DeckId::BOTH {
            self.atomics[id.index()].publish(self.mixer.deck(id));
        }
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    fn apply(&mut self, command: EngineCommand) {
        // Requests were validated on the control thread; a late failure
        // (e.g. a seek racing an end-of-track stop) leaves the deck as is.
        match command {
            EngineCommand::Install { deck, buffer } => {
                if let Ok(Some(old)) = self.mixer.deck_mut(deck).install(buffer) {
                    // The controller reserved a slot before sending the install
                    let _ = self.retired.push(old);
                }
            }
            EngineCommand::SetBpm { deck, bpm } => {
                let _ = self.mixer.deck_mut(deck).set_bpm(bpm);
            }
            EngineCommand::Play { deck } => {
                self.mixer.deck_mut(deck).play();
            }
            EngineCommand::Pause { deck } => self.mixer.deck_mut(deck).pause(),
            EngineCommand::Stop { deck } => self.mixer.deck_mut(deck).stop(),
            EngineCommand::Seek { deck, seconds } => {
                let _ = self.mixer.deck_mut(deck).seek(seconds);
            }
            EngineCommand::SetPitch { deck, ratio } => {
                let _ = self.mixer.deck_mut(deck).set_pitch(ratio);
            }
            EngineCommand::SetEq { deck, band, db } => {
                let _ = self.mixer.deck_mut(deck).set_eq(band, db);
            }
            EngineCommand::SetFilterCutoff { deck, hz } => {
                let _ = self.mixer.deck_mut(deck).set_filter_cutoff(hz);
            }
            EngineCommand::StoreHotCue {
                deck,
                slot,
                seconds,
            } => {
                let _ = self.mixer.deck_mut(deck).store_hot_cue(slot, seconds);
            }
            EngineCommand::DeleteHotCue { deck, slot } => {
                let _ = self.mixer.deck_mut(deck).delete_hot_cue(slot);
            }
            EngineCommand::ToggleLoop { deck, length_beats } => {
                let _ = self.mixer.deck_mut(deck).toggle_loop(length_beats);
            }
            EngineCommand::SetCrossfader(position) => {
                let _ = self.mixer.set_crossfader(position);
            }
            EngineCommand::SetMasterVolume(volume) => {
                let _ = self.mixer.set_master_volume(volume);
            }
        }
    }
}

// ============================================================================
// Engine Controller (control thread)
// ============================================================================

/// Control-thread half of the engine
pub struct EngineController {
    config: EngineConfig,
    decks: [DeckState; 2],
    mixer: MixerState,
    pads: [HotCuePads; 2],
    commands: Producer<EngineCommand>,
    retired: Consumer<Arc<AudioBuffer>>,
    atomics: [Arc<DeckAtomics>; 2],
    recorder: Recorder,
    retired_buffers: u64,
    /// Installs that will hand back a buffer not yet released here
    awaiting_return: usize,
}

impl EngineController {
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Cadence at which the host should call [`poll`](Self::poll)
    pub fn poll_interval(&self) -> Duration {
        self.config.poll_interval()
    }

    pub fn deck_state(&self, deck: DeckId) -> &DeckState {
        &self.decks[deck.index()]
    }

    pub fn mixer_state(&self) -> MixerState {
        self.mixer
    }

    pub fn recording_state(&self) -> RecordingState {
        self.recorder.state()
    }

    /// Replaced buffers released so far
    pub fn retired_buffers(&self) -> u64 {
        self.retired_buffers
    }

    /// Lock-free view of what the audio thread last published
    pub fn atomics(&self, deck: DeckId) -> &Arc<DeckAtomics> {
        &self.atomics[deck.index()]
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Decode on this thread and hand the buffer to the audio thread
    ///
    /// Fails with `CommandQueueFull` when the buffer this load replaces
    /// could not be handed back to this thread.
    pub fn load(&mut self, deck: DeckId, bytes: &[u8]) -> Result<LoadInfo> {
        let buffer = decode_audio(bytes, self.config.sample_rate)?;
        let info = LoadInfo::from_buffer(&buffer);

        self.release_retired();
        let replaces = self.decks[deck.index()].loaded;
        if replaces && self.awaiting_return >= self.retired.buffer().capacity() {
            log::warn!("Retired buffer queue full, refusing load on deck {}", deck);
            return Err(MixError::CommandQueueFull {
                command: "install".to_string(),
            });
        }
        self.send(EngineCommand::Install {
            deck,
            buffer: Arc::new(buffer),
        })?;
        if replaces {
            self.awaiting_return += 1;
        }

        let state = &mut self.decks[deck.index()];
        state.loaded = true;
        state.playing = false;
        state.filename = None;
        state.position_seconds = 0.0;
        state.duration_seconds = info.duration_seconds;
        state.loop_state = LoopState::default();
        state.hot_cues = [None; HOT_CUE_SLOTS];
        self.pads[deck.index()].reset();
        log::info!(
            "Deck {} loaded {:.2}s of audio ({} ch)",
            deck,
            info.duration_seconds,
            info.channels
        );
        Ok(info)
    }

    pub fn load_track(&mut self, deck: DeckId, bytes: &[u8], track: TrackInfo) -> Result<LoadInfo> {
        let bpm = track.bpm.map(|bpm| ensure_finite("bpm", bpm)).transpose()?;
        let info = self.load(deck, bytes)?;
        self.decks[deck.index()].filename = track.filename;
        if let Some(bpm) = bpm {
            self.set_bpm(deck, bpm)?;
        }
        Ok(info)
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Start or resume; `false` when the deck has no track
    pub fn play(&mut self, deck: DeckId) -> Result<bool> {
        if !self.decks[deck.index()].loaded {
            return Ok(false);
        }
        self.send(EngineCommand::Play { deck })?;
        let state = &mut self.decks[deck.index()];
        state.playing = true;
        log::debug!("Deck {} playing from {:.3}s", deck, state.position_seconds);
        Ok(true)
    }

    pub fn pause(&mut self, deck: DeckId) -> Result<()> {
        self.send(EngineCommand::Pause { deck })?;
        self.decks[deck.index()].playing = false;
        Ok(())
    }

    pub fn stop(&mut self, deck: DeckId) -> Result<()> {
        self.send(EngineCommand::Stop { deck })?;
        let state = &mut self.decks[deck.index()];
        state.playing = false;
        state.position_seconds = 0.0;
        Ok(())
    }

    pub fn seek(&mut self, deck: DeckId, seconds: f64) -> Result<f64> {
        let seconds = ensure_finite("seek", seconds)?;
        self.require_loaded(deck, "seek")?;
        let last_frame = 1.0 / self.config.sample_rate as f64;
        let state = &self.decks[deck.index()];
        let seconds = seconds.clamp(0.0, (state.duration_seconds - last_frame).max(0.0));

        self.send(EngineCommand::Seek { deck, seconds })?;
        let state = &mut self.decks[deck.index()];
        state.position_seconds = seconds;
        if state.loop_state.active && !loop_contains(state, seconds) {
            state.loop_state.active = false;
            log::debug!("Deck {} left its loop by seeking", deck);
        }
        Ok(seconds)
    }

    // ========================================================================
    // Tone and Tempo
    // ========================================================================

    pub fn set_pitch(&mut self, deck: DeckId, ratio: f64) -> Result<f64> {
        let ratio = ensure_finite("pitch", ratio)?.clamp(MIN_PITCH, MAX_PITCH);
        self.send(EngineCommand::SetPitch { deck, ratio })?;
        self.decks[deck.index()].pitch_ratio = ratio;
        Ok(ratio)
    }

    pub fn set_eq(&mut self, deck: DeckId, band: EqBand, db: f32) -> Result<f32> {
        ensure_finite("eq", db as f64)?;
        let db = db.clamp(MIN_EQ_DB, MAX_EQ_DB);
        self.send(EngineCommand::SetEq { deck, band, db })?;
        self.decks[deck.index()].eq.set(band, db);
        Ok(db)
    }

    pub fn set_filter_cutoff(&mut self, deck: DeckId, hz: f32) -> Result<f32> {
        ensure_finite("filter_cutoff", hz as f64)?;
        let hz = hz.clamp(MIN_CUTOFF_HZ, MAX_CUTOFF_HZ);
        self.send(EngineCommand::SetFilterCutoff { deck, hz })?;
        self.decks[deck.index()].filter_cutoff_hz = hz;
        Ok(hz)
    }

    pub fn set_bpm(&mut self, deck: DeckId, bpm: f64) -> Result<f64> {
        let bpm = ensure_finite("bpm", bpm)?.clamp(MIN_BPM, MAX_BPM);
        self.send(EngineCommand::SetBpm { deck, bpm })?;
        self.decks[deck.index()].bpm = bpm;
        Ok(bpm)
    }

    pub fn set_crossfader(&mut self, position: f64) -> Result<f64> {
        let position = ensure_finite("crossfader", position)?.clamp(-1.0, 1.0);
        self.send(EngineCommand::SetCrossfader(position))?;
        self.mixer.crossfader = position;
        log::trace!("Crossfader at {:.3}", position);
        Ok(position)
    }

    pub fn set_master_volume(&mut self, volume: f64) -> Result<f64> {
        let volume = ensure_finite("master_volume", volume)?.clamp(0.0, 1.0);
        self.send(EngineCommand::SetMasterVolume(volume))?;
        self.mixer.master_volume = volume;
        Ok(volume)
    }

    pub fn average_bpm(&self) -> f64 {
        tempo::average_bpm(self.decks.iter().filter(|d| d.loaded).map(|d| d.bpm))
    }

    /// Match `target`'s tempo to `source`; returns the pitch applied
    pub fn tempo_sync(&mut self, source: DeckId, target: DeckId) -> Result<f64> {
        for id in [source, target] {
            self.require_loaded(id, "tempo sync")?;
        }
        let ratio = tempo::sync_ratio(
            self.decks[source.index()].bpm,
            self.decks[target.index()].bpm,
        )?;
        self.set_pitch(target, ratio)
    }

    // ========================================================================
    // Hot Cues and Loop
    // ========================================================================

    pub fn set_hot_cue(&mut self, deck: DeckId, slot: u8) -> Result<HotCueAction> {
        let index = validate_slot(slot)?;
        self.require_loaded(deck, "set hot cue")?;

        match self.decks[deck.index()].hot_cues[index] {
            Some(cue) => {
                self.seek(deck, cue.time_seconds)?;
                Ok(HotCueAction::Jumped(cue))
            }
            None => {
                // Stored at the mirror position; the audio thread writes the same value
                let seconds = self.decks[deck.index()].position_seconds;
                self.send(EngineCommand::StoreHotCue {
                    deck,
                    slot,
                    seconds,
                })?;
                let cue = HotCue {
                    slot,
                    time_seconds: seconds,
                    color: CueColor::for_slot(slot),
                };
                self.decks[deck.index()].hot_cues[index] = Some(cue);
                log::debug!("Deck {} hot cue {} at {:.3}s", deck, slot, seconds);
                Ok(HotCueAction::Stored(cue))
            }
        }
    }

    pub fn delete_hot_cue(&mut self, deck: DeckId, slot: u8) -> Result<Option<HotCue>> {
        let index = validate_slot(slot)?;
        self.send(EngineCommand::DeleteHotCue { deck, slot })?;
        Ok(self.decks[deck.index()].hot_cues[index].take())
    }

    pub fn press_hot_cue(&mut self, deck: DeckId, slot: u8, now: Instant) -> Result<PressToken> {
        self.pads[deck.index()].press(slot, now)
    }

    pub fn release_hot_cue(
        &mut self,
        deck: DeckId,
        token: PressToken,
        now: Instant,
    ) -> Result<Option<PadAction>> {
        let action = self.pads[deck.index()].release(token, now);
        match action {
            Some(PadAction::Trigger(slot)) => {
                self.set_hot_cue(deck, slot)?;
            }
            Some(PadAction::Clear(slot)) => {
                self.delete_hot_cue(deck, slot)?;
            }
            None => {}
        }
        Ok(action)
    }

    pub fn cancel_hot_cue(&mut self, deck: DeckId, token: PressToken) {
        self.pads[deck.index()].cancel(token);
    }

    pub fn toggle_loop(&mut self, deck: DeckId, length_beats: u32) -> Result<bool> {
        let length_beats = tempo::validate_loop_length(length_beats)?;
        self.require_loaded(deck, "toggle loop")?;
        self.send(EngineCommand::ToggleLoop { deck, length_beats })?;

        let state = &mut self.decks[deck.index()];
        state.loop_state.length_beats = length_beats;
        state.loop_state.active = !state.loop_state.active;
        if state.loop_state.active {
            state.loop_state.loop_in_seconds = state.position_seconds;
        }
        log::debug!(
            "Deck {} loop {} ({} beats from {:.3}s)",
            deck,
            if state.loop_state.active { "on" } else { "off" },
            length_beats,
            state.loop_state.loop_in_seconds
        );
        Ok(state.loop_state.active)
    }

    // ========================================================================
    // Recording
    // ========================================================================

    pub fn start_recording(&mut self) -> Result<()> {
        let any_playing = self.decks.iter().any(|d| d.playing);
        self.recorder.start(any_playing)
    }

    pub fn stop_recording(&mut self) -> Result<Recording> {
        self.recorder.stop()
    }

    // ========================================================================
    // Polling
    // ========================================================================

    /// Host-driven tick
    ///
    /// Releases retired buffers, refreshes the mirror from the audio
    /// thread, fires long presses and drains the capture ring.
    pub fn poll(&mut self, now: Instant) -> MixerSnapshot {
        self.release_retired();

        // Published state predates commands still in the queue
        let in_flight = self.commands.slots() < self.commands.buffer().capacity();
        for id in DeckId::BOTH {
            let atomics = &self.atomics[id.index()];
            let state = &mut self.decks[id.index()];
            if in_flight || !atomics.is_loaded() {
                continue;
            }
            state.playing = atomics.is_playing();
            state.position_seconds = atomics.position_seconds();
            state.loop_state.active = atomics.loop_active();
            state.loop_state.loop_in_seconds = atomics.loop_in_seconds();
            for (index, cue) in state.hot_cues.iter_mut().enumerate() {
                let slot = index as u8 + 1;
                *cue = atomics.hot_cue(index).map(|time_seconds| HotCue {
                    slot,
                    time_seconds,
                    color: CueColor::for_slot(slot),
                });
            }
        }

        let mut pad_actions = Vec::new();
        for id in DeckId::BOTH {
            for action in self.pads[id.index()].tick(now) {
                if let PadAction::Clear(slot) = action {
                    if let Err(e) = self.delete_hot_cue(id, slot) {
                        log::warn!("Long press on deck {} slot {} lost: {}", id, slot, e);
                    }
                }
                pad_actions.push((id, action));
            }
        }

        self.recorder.pump();

        MixerSnapshot {
            deck_a: self.decks[0].clone(),
            deck_b: self.decks[1].clone(),
            mixer: self.mixer,
            pad_actions,
        }
    }

    fn release_retired(&mut self) {
        while let Ok(buffer) = self.retired.pop() {
            drop(buffer);
            self.retired_buffers += 1;
            self.awaiting_return = self.awaiting_return.saturating_sub(1);
        }
    }

    fn send(&mut self, command: EngineCommand) -> Result<()> {
        self.commands
            .push(command)
            .map_err(|PushError::Full(command)| {
                log::warn!("Command queue full, dropping {}", command.name());
                MixError::CommandQueueFull {
                    command: command.name().to_string(),
                }
            })
    }

    fn require_loaded(&self, deck: DeckId, operation: &str) -> Result<()> {
        if self.decks[deck.index()].loaded {
            Ok(())
        } else {
            Err(MixError::state(operation, format!("deck {} has no track", deck)))
        }
    }
}

fn loop_contains(state: &DeckState, seconds: f64) -> bool {
    let start = state.loop_state.loop_in_seconds;
    let end = (start + tempo::loop_duration(state.loop_state.length_beats, state.bpm))
        .min(state.duration_seconds);
    seconds >= start && seconds < end
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::io::{encode_buffer, generate_constant};
    use approx::assert_relative_eq;

    fn wav(seconds: f32) -> Vec<u8> {
        encode_buffer(&generate_constant(0.5, seconds, 48000)).unwrap()
    }

    fn engine() -> (EngineController, AudioProcessor) {
        engine_channel(EngineConfig::default()).unwrap()
    }

    fn run(processor: &mut AudioProcessor, frames: usize) {
        let mut out = vec![StereoFrame::SILENCE; frames];
        processor.process(&mut out);
    }

    #[test]
    fn test_commands_reach_audio_thread() {
        let (mut controller, mut processor) = engine();
        controller.load(DeckId::A, &wav(2.0)).unwrap();
        assert!(controller.play(DeckId::A).unwrap());
        assert_eq!(controller.set_pitch(DeckId::A, 5.0).unwrap(), 2.0);

        // Mirror is updated before the audio thread runs
        assert!(controller.deck_state(DeckId::A).playing);
        assert!(!processor.mixer().deck(DeckId::A).is_playing());

        run(&mut processor, 4800);
        let snapshot = controller.poll(Instant::now());
        assert!(snapshot.deck_a.playing);
        assert_relative_eq!(snapshot.deck_a.position_seconds, 0.2);
        assert_eq!(processor.mixer().deck(DeckId::A).pitch(), 2.0);
    }

    #[test]
    fn test_play_unloaded_returns_false() {
        let (mut controller, _processor) = engine();
        assert!(!controller.play(DeckId::B).unwrap());
        assert_eq!(
            controller.seek(DeckId::B, 1.0).unwrap_err().error_code(),
            "STATE_ERROR"
        );
    }

    #[test]
    fn test_replaced_buffer_returned_to_control_thread() {
        let (mut controller, mut processor) = engine();
        controller.load(DeckId::A, &wav(0.5)).unwrap();
        run(&mut processor, 64);
        controller.load(DeckId::A, &wav(0.25)).unwrap();
        run(&mut processor, 64);

        controller.poll(Instant::now());
        assert_eq!(controller.retired_buffers(), 1);
        assert_relative_eq!(processor.mixer().deck(DeckId::A).duration_seconds(), 0.25);
    }

    #[test]
    fn test_every_replaced_buffer_comes_back_with_tiny_queues() {
        let mut config = EngineConfig::default();
        config.command_queue_capacity = 1;
        let (mut controller, mut processor) = engine_channel(config).unwrap();

        for _ in 0..4 {
            controller.load(DeckId::A, &wav(0.1)).unwrap();
            run(&mut processor, 64);
        }
        controller.poll(Instant::now());
        assert_eq!(controller.retired_buffers(), 3);
    }

    #[test]
    fn test_load_refused_while_retired_queue_is_reserved() {
        let mut config = EngineConfig::default();
        config.command_queue_capacity = 1;
        let (mut controller, mut processor) = engine_channel(config).unwrap();
        controller.load(DeckId::A, &wav(0.1)).unwrap();
        run(&mut processor, 64);

        // Replaces the first buffer; its return slot is now taken
        controller.load(DeckId::A, &wav(0.1)).unwrap();
        let err = controller.load(DeckId::A, &wav(0.1)).unwrap_err();
        assert_eq!(err.error_code(), "COMMAND_QUEUE_FULL");

        run(&mut processor, 64);
        controller.load(DeckId::A, &wav(0.1)).unwrap();
        assert_eq!(controller.retired_buffers(), 1);
    }

    #[test]
    fn test_queue_full_is_reported() {
        let mut config = EngineConfig::default();
        config.command_queue_capacity = 1;
        let (mut controller, _processor) = engine_channel(config).unwrap();

        controller.set_crossfader(0.5).unwrap();
        let err = controller.set_crossfader(-0.5).unwrap_err();
        assert_eq!(err.error_code(), "COMMAND_QUEUE_FULL");
        // Mirror keeps the last value that was actually sent
        assert_eq!(controller.mixer_state().crossfader, 0.5);
    }

    #[test]
    fn test_hot_cue_published_back() {
        let (mut controller, mut processor) = engine();
        controller.load(DeckId::B, &wav(4.0)).unwrap();
        controller.seek(DeckId::B, 1.25).unwrap();
        controller.set_hot_cue(DeckId::B, 3).unwrap();
        run(&mut processor, 16);

        let snapshot = controller.poll(Instant::now());
        assert_eq!(snapshot.deck_b.hot_cues[2].unwrap().time_seconds, 1.25);

        controller.seek(DeckId::B, 3.0).unwrap();
        let action = controller.set_hot_cue(DeckId::B, 3).unwrap();
        assert!(matches!(action, HotCueAction::Jumped(_)));
        run(&mut processor, 16);
        assert_eq!(controller.poll(Instant::now()).deck_b.position_seconds, 1.25);
    }

    #[test]
    fn test_stored_hot_cue_matches_published_time_while_playing() {
        let (mut controller, mut processor) = engine();
        controller.load(DeckId::A, &wav(2.0)).unwrap();
        controller.play(DeckId::A).unwrap();
        run(&mut processor, 4800);
        controller.poll(Instant::now());
        // Audio runs ahead of the mirror
        run(&mut processor, 4800);

        let stored = match controller.set_hot_cue(DeckId::A, 1).unwrap() {
            HotCueAction::Stored(cue) => cue,
            other => panic!("expected a stored cue, got {:?}", other),
        };
        assert_relative_eq!(stored.time_seconds, 0.1);
        run(&mut processor, 16);
        let published = controller.poll(Instant::now()).deck_a.hot_cues[0].unwrap();
        assert_eq!(published, stored);
    }

    #[test]
    fn test_long_press_clears_through_poll() {
        let (mut controller, mut processor) = engine();
        let t0 = Instant::now();
        controller.load(DeckId::A, &wav(1.0)).unwrap();
        controller.set_hot_cue(DeckId::A, 1).unwrap();
        run(&mut processor, 16);

        controller.press_hot_cue(DeckId::A, 1, t0).unwrap();
        let snapshot = controller.poll(t0 + Duration::from_millis(650));
        assert_eq!(snapshot.pad_actions, vec![(DeckId::A, PadAction::Clear(1))]);
        run(&mut processor, 16);
        assert!(controller.poll(t0 + Duration::from_millis(700)).deck_a.hot_cues[0].is_none());
    }

    #[test]
    fn test_tempo_sync_through_controller() {
        let (mut controller, mut processor) = engine();
        controller
            .load_track(DeckId::A, &wav(1.0), TrackInfo { filename: None, bpm: Some(124.0) })
            .unwrap();
        controller
            .load_track(DeckId::B, &wav(1.0), TrackInfo { filename: None, bpm: Some(128.0) })
            .unwrap();
        assert_eq!(controller.tempo_sync(DeckId::A, DeckId::B).unwrap(), 0.96875);
        run(&mut processor, 16);
        assert_eq!(processor.mixer().deck(DeckId::B).pitch(), 0.96875);
    }

    #[test]
    fn test_recording_through_controller() {
        let (mut controller, mut processor) = engine();
        controller.start_recording().unwrap();
        run(&mut processor, 4800);
        controller.poll(Instant::now());
        run(&mut processor, 4800);
        let recording = controller.stop_recording().unwrap();
        assert_eq!(recording.frames, 9600);
        assert_relative_eq!(recording.duration_seconds(), 0.2);
    }
}
