//! Sweepable deck filter
//!
//! A single low-pass section on one knob. At the top of the range the
//! filter is fully open and bypassed.

use super::biquad::{BiquadCoeffs, BiquadState, FilterType};
use super::node::AudioNode;
use crate::engine::StereoFrame;

/// Lowest cutoff in Hz
pub const MIN_CUTOFF_HZ: f32 = 20.0;

/// Highest cutoff in Hz (filter open)
pub const MAX_CUTOFF_HZ: f32 = 20000.0;

/// Butterworth resonance
const FILTER_Q: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// Low-pass sweep filter node
#[derive(Debug, Clone)]
pub struct SweepFilter {
    cutoff_hz: f32,
    sample_rate: f64,
    coeffs: BiquadCoeffs,
    state: BiquadState,
}

impl SweepFilter {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            cutoff_hz: MAX_CUTOFF_HZ,
            sample_rate: sample_rate as f64,
            coeffs: BiquadCoeffs::passthrough(),
            state: BiquadState::default(),
        }
    }

    /// Set the cutoff, clamped to [20, 20000] Hz; returns the stored value
    pub fn set_cutoff(&mut self, hz: f32) -> f32 {
        self.cutoff_hz = hz.clamp(MIN_CUTOFF_HZ, MAX_CUTOFF_HZ);
        self.update();
        self.cutoff_hz
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff_hz
    }

    /// True when the filter is fully open
    pub fn is_open(&self) -> bool {
        self.cutoff_hz >= MAX_CUTOFF_HZ
    }

    fn update(&mut self) {
        if self.is_open() {
            self.coeffs = BiquadCoeffs::passthrough();
            self.state.reset();
        } else {
            self.coeffs = BiquadCoeffs::calculate(
                FilterType::LowPass,
                self.sample_rate,
                self.cutoff_hz as f64,
                0.0,
                FILTER_Q,
            );
        }
    }
}

impl AudioNode for SweepFilter {
    fn process(&mut self, block: &mut [StereoFrame]) {
        if self.is_open() {
            return;
        }
        for frame in block.iter_mut() {
            *frame = self.state.process(*frame, &self.coeffs);
        }
    }

    fn prepare(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate as f64;
        self.update();
    }

    fn reset(&mut self) {
        self.state.reset();
    }

    fn node_type(&self) -> &'static str {
        "sweep_filter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::buffer::calculate_rms;

    fn sine_block(frequency: f32) -> Vec<StereoFrame> {
        let w = 2.0 * std::f32::consts::PI * frequency / 48000.0;
        (0..24000)
            .map(|i| StereoFrame::mono((w * i as f32).sin() * 0.5))
            .collect()
    }

    #[test]
    fn test_default_is_open() {
        let mut filter = SweepFilter::new(48000);
        assert!(filter.is_open());
        let original = sine_block(12000.0);
        let mut block = original.clone();
        filter.process(&mut block);
        assert_eq!(block, original);
    }

    #[test]
    fn test_cutoff_clamped() {
        let mut filter = SweepFilter::new(48000);
        assert_eq!(filter.set_cutoff(5.0), MIN_CUTOFF_HZ);
        assert_eq!(filter.set_cutoff(96000.0), MAX_CUTOFF_HZ);
        assert_eq!(filter.set_cutoff(800.0), 800.0);
        assert_eq!(filter.cutoff(), 800.0);
    }

    #[test]
    fn test_closed_filter_removes_highs() {
        let mut filter = SweepFilter::new(48000);
        filter.set_cutoff(300.0);

        let mut high = sine_block(8000.0);
        let before = calculate_rms(&high);
        filter.process(&mut high);
        let after = calculate_rms(&high[2400..]);
        assert!(before - after > 30.0, "before {} after {}", before, after);

        filter.reset();
        let mut low = sine_block(50.0);
        let before = calculate_rms(&low);
        filter.process(&mut low);
        let after = calculate_rms(&low[4800..]);
        assert!((before - after).abs() < 1.0);
    }
}
