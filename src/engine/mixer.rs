//! Two-deck mixer
//!
//! Signal flow per block:
//!
//! ```text
//!   Deck A ─▶ EQ ─▶ filter ─▶ xfade gain A ─┐
//!                                            (+) ─▶ master gain ─▶ inserts ─▶ out
//!   Deck B ─▶ EQ ─▶ filter ─▶ xfade gain B ─┘
//! ```
//!
//! Crossfader and master volume changes are ramped linearly across the
//! next block. All scratch memory is allocated up front; `render` never
//! allocates.

use std::f64::consts::FRAC_PI_2;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::dsp::gain::GainNode;
use crate::dsp::node::{AudioNode, NodeId, SignalChain};
use crate::engine::buffer::StereoFrame;
use crate::engine::deck::{Deck, DeckId, DeckState};
use crate::engine::hotcue::PadAction;
use crate::engine::tempo;
use crate::error::{ensure_finite, MixError, Result};

/// Default master volume
pub const DEFAULT_MASTER_VOLUME: f64 = 0.8;

/// Room reserved for master bus inserts
const MAX_INSERTS: usize = 4;

/// Equal-power crossfade law
///
/// `-1` is deck A only, `+1` deck B only, `0` both at ≈0.7071.
pub fn crossfade_gains(position: f64) -> (f32, f32) {
    let t = (position.clamp(-1.0, 1.0) + 1.0) / 2.0;
    let gain_a = ((1.0 - t) * FRAC_PI_2).sin();
    let gain_b = (t * FRAC_PI_2).sin();
    // sin(0) is exact, so the far side is a true zero
    (gain_a as f32, gain_b as f32)
}

/// Mixer-level controls
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MixerState {
    pub crossfader: f64,
    pub master_volume: f64,
}

impl Default for MixerState {
    fn default() -> Self {
        Self {
            crossfader: 0.0,
            master_volume: DEFAULT_MASTER_VOLUME,
        }
    }
}

/// Everything a UI needs for one poll
#[derive(Debug, Clone, PartialEq)]
pub struct MixerSnapshot {
    pub deck_a: DeckState,
    pub deck_b: DeckState,
    pub mixer: MixerState,
    /// Pad gestures completed since the last tick
    pub pad_actions: Vec<(DeckId, PadAction)>,
}

impl MixerSnapshot {
    pub fn deck(&self, id: DeckId) -> &DeckState {
        match id {
            DeckId::A => &self.deck_a,
            DeckId::B => &self.deck_b,
        }
    }
}

/// Two decks, a crossfader and a master bus
pub struct Mixer {
    config: EngineConfig,
    decks: [Deck; 2],
    state: MixerState,
    xfade: [GainNode; 2],
    master: GainNode,
    scratch: [Vec<StereoFrame>; 2],
    inserts: SignalChain,
}

impl Mixer {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let state = MixerState::default();
        let (gain_a, gain_b) = crossfade_gains(state.crossfader);
        let block = config.max_block_frames;

        Ok(Self {
            decks: [Deck::new(DeckId::A, &config), Deck::new(DeckId::B, &config)],
            state,
            xfade: [GainNode::new(gain_a), GainNode::new(gain_b)],
            master: GainNode::new(state.master_volume as f32),
            scratch: [
                vec![StereoFrame::SILENCE; block],
                vec![StereoFrame::SILENCE; block],
            ],
            inserts: SignalChain::with_capacity(MAX_INSERTS, config.sample_rate),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    pub fn deck(&self, id: DeckId) -> &Deck {
        &self.decks[id.index()]
    }

    pub fn deck_mut(&mut self, id: DeckId) -> &mut Deck {
        &mut self.decks[id.index()]
    }

    // ========================================================================
    // Controls
    // ========================================================================

    /// Move the crossfader, clamped to [-1, 1]
    pub fn set_crossfader(&mut self, position: f64) -> Result<f64> {
        let position = ensure_finite("crossfader", position)?.clamp(-1.0, 1.0);
        self.state.crossfader = position;
        let (gain_a, gain_b) = crossfade_gains(position);
        self.xfade[0].set_gain(gain_a);
        self.xfade[1].set_gain(gain_b);
        Ok(position)
    }

    /// Set the master volume, clamped to [0, 1]
    pub fn set_master_volume(&mut self, volume: f64) -> Result<f64> {
        let volume = ensure_finite("master_volume", volume)?.clamp(0.0, 1.0);
        self.state.master_volume = volume;
        self.master.set_gain(volume as f32);
        Ok(volume)
    }

    pub fn crossfader(&self) -> f64 {
        self.state.crossfader
    }

    pub fn master_volume(&self) -> f64 {
        self.state.master_volume
    }

    pub fn state(&self) -> MixerState {
        self.state
    }

    /// Mean BPM of loaded decks, 120 when none are loaded
    pub fn average_bpm(&self) -> f64 {
        tempo::average_bpm(
            self.decks
                .iter()
                .filter(|deck| deck.is_loaded())
                .map(Deck::bpm),
        )
    }

    /// Match `target`'s tempo to `source`; returns the pitch applied
    ///
    /// Both decks must be loaded; otherwise nothing changes.
    pub fn tempo_sync(&mut self, source: DeckId, target: DeckId) -> Result<f64> {
        for id in [source, target] {
            if !self.deck(id).is_loaded() {
                return Err(MixError::state(
                    "tempo sync",
                    format!("deck {} has no track", id),
                ));
            }
        }
        let ratio = tempo::sync_ratio(self.deck(source).bpm(), self.deck(target).bpm())?;
        let applied = self.deck_mut(target).set_pitch(ratio)?;
        log::debug!("Synced deck {} to deck {} (pitch {:.5})", target, source, applied);
        Ok(applied)
    }

    pub fn is_any_playing(&self) -> bool {
        self.decks.iter().any(Deck::is_playing)
    }

    // ========================================================================
    // Master Inserts
    // ========================================================================

    /// Add a node at the end of the master bus
    pub fn connect_insert(&mut self, node: Box<dyn AudioNode>) -> NodeId {
        let id = self.inserts.connect(node);
        log::debug!("Connected master insert {}", id);
        id
    }

    /// Remove a master bus node, returning it
    pub fn disconnect_insert(&mut self, id: NodeId) -> Option<Box<dyn AudioNode>> {
        let node = self.inserts.disconnect(id);
        if node.is_some() {
            log::debug!("Disconnected master insert {}", id);
        }
        node
    }

    // ========================================================================
    // Processing
    // ========================================================================

    /// Render the mix into `out`
    ///
    /// Long requests are split into blocks of at most `max_block_frames`.
    pub fn render(&mut self, out: &mut [StereoFrame]) {
        let block = self.config.max_block_frames;
        for chunk in out.chunks_mut(block) {
            let frames = chunk.len();
            let [scratch_a, scratch_b] = &mut self.scratch;
            let a = &mut scratch_a[..frames];
            let b = &mut scratch_b[..frames];

            self.decks[0].render(a);
            self.decks[1].render(b);
            self.xfade[0].apply(a);
            self.xfade[1].apply(b);

            for ((mixed, a), b) in chunk.iter_mut().zip(a.iter()).zip(b.iter()) {
                *mixed = *a + *b;
            }

            self.master.apply(chunk);
            self.inserts.process(chunk);
        }
    }

    /// Advance pad timers and take a snapshot for the UI
    pub fn tick(&mut self, now: Instant) -> MixerSnapshot {
        let mut pad_actions = Vec::new();
        for deck in &mut self.decks {
            let id = deck.id();
            pad_actions.extend(deck.tick_pads(now).into_iter().map(|action| (id, action)));
        }
        MixerSnapshot {
            deck_a: self.decks[0].state(),
            deck_b: self.decks[1].state(),
            mixer: self.state,
            pad_actions,
        }
    }
}

impl std::fmt::Debug for Mixer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mixer")
            .field("decks", &self.decks)
            .field("state", &self.state)
            .field("inserts", &self.inserts)
            .finish()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
