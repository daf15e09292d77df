//! Gain Node
//!
//! Linear gain stage with a per-block ramp so fader moves never click.
//! Used for deck channel gain, the crossfade stage and the master volume.

use crate::dsp::node::AudioNode;
use crate::engine::buffer::db_to_linear;
use crate::engine::StereoFrame;

// ============================================================================
// Constants
// ============================================================================

/// Minimum gain in dB (-96 dB = effectively silent)
const MIN_GAIN_DB: f32 = -96.0;

/// Maximum gain in dB (+24 dB)
const MAX_GAIN_DB: f32 = 24.0;

// ============================================================================
// Gain Node
// ============================================================================

/// Smoothed linear gain
///
/// A new target is reached over the next processed block: the first frame
/// of that block uses the previous gain and the last frame uses the target.
#[derive(Debug, Clone)]
pub struct GainNode {
    target: f32,
    current: f32,
}

impl GainNode {
    /// Create a gain node already settled at `gain` (linear, clamped ≥ 0)
    pub fn new(gain: f32) -> Self {
        let gain = gain.max(0.0);
        Self {
            target: gain,
            current: gain,
        }
    }

    /// Set the target linear gain (clamped to ≥ 0)
    pub fn set_gain(&mut self, gain: f32) {
        self.target = gain.max(0.0);
    }

    /// Set the target gain in dB (-96 to +24 dB)
    pub fn set_gain_db(&mut self, db: f32) {
        self.set_gain(db_to_linear(db.clamp(MIN_GAIN_DB, MAX_GAIN_DB)));
    }

    /// Jump to the target immediately, skipping the ramp
    pub fn settle(&mut self) {
        self.current = self.target;
    }

    /// The gain the node is heading to
    pub fn target(&self) -> f32 {
        self.target
    }

    /// The gain applied at the end of the last block
    pub fn current(&self) -> f32 {
        self.current
    }

    /// Apply the (ramped) gain to `block`
    pub fn apply(&mut self, block: &mut [StereoFrame]) {
        if block.is_empty() {
            return;
        }

        if self.current == self.target {
            if self.target == 1.0 {
                return;
            }
            let gain = self.target;
            for frame in block.iter_mut() {
                *frame = frame.scale(gain);
            }
            return;
        }

        let start = self.current;
        let step = if block.len() > 1 {
            (self.target - start) / (block.len() - 1) as f32
        } else {
            self.target - start
        };
        let last = block.len() - 1;
        for (i, frame) in block.iter_mut().enumerate() {
            let gain = if i == last {
                self.target
            } else {
                start + step * i as f32
            };
            *frame = frame.scale(gain);
        }
        self.current = self.target;
    }
}

impl Default for GainNode {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl AudioNode for GainNode {
    fn process(&mut self, block: &mut [StereoFrame]) {
        self.apply(block);
    }

    fn prepare(&mut self, _sample_rate: u32) {}

    fn reset(&mut self) {
        self.settle();
    }

    fn node_type(&self) -> &'static str {
        "gain"
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
