//! Three-band deck EQ
//!
//! Low shelf, mid peak and high shelf at fixed frequencies. Each band is
//! an independent biquad section; a band at 0 dB is skipped entirely.

use serde::{Deserialize, Serialize};

use super::biquad::{BiquadCoeffs, BiquadState, FilterType};
use super::node::AudioNode;
use crate::config::EqConfig;
use crate::engine::StereoFrame;

/// Lowest EQ gain in dB
pub const MIN_EQ_DB: f32 = -24.0;

/// Highest EQ gain in dB
pub const MAX_EQ_DB: f32 = 24.0;

/// Shelf slope used for the low and high bands
const SHELF_Q: f64 = 0.707;

/// One of the three EQ bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EqBand {
    Low,
    Mid,
    High,
}

impl EqBand {
    pub const ALL: [EqBand; 3] = [EqBand::Low, EqBand::Mid, EqBand::High];

    fn index(self) -> usize {
        match self {
            EqBand::Low => 0,
            EqBand::Mid => 1,
            EqBand::High => 2,
        }
    }
}

impl std::fmt::Display for EqBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EqBand::Low => write!(f, "low"),
            EqBand::Mid => write!(f, "mid"),
            EqBand::High => write!(f, "high"),
        }
    }
}

/// Gains of the three bands in dB
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EqSettings {
    pub low: f32,
    pub mid: f32,
    pub high: f32,
}

impl EqSettings {
    pub fn get(&self, band: EqBand) -> f32 {
        match band {
            EqBand::Low => self.low,
            EqBand::Mid => self.mid,
            EqBand::High => self.high,
        }
    }

    pub fn set(&mut self, band: EqBand, db: f32) {
        match band {
            EqBand::Low => self.low = db,
            EqBand::Mid => self.mid = db,
            EqBand::High => self.high = db,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct BandSection {
    coeffs: BiquadCoeffs,
    state: BiquadState,
    active: bool,
}

/// Fixed-frequency 3-band EQ node
#[derive(Debug, Clone)]
pub struct ThreeBandEq {
    config: EqConfig,
    sample_rate: f64,
    settings: EqSettings,
    sections: [BandSection; 3],
}

impl ThreeBandEq {
    pub fn new(config: EqConfig, sample_rate: u32) -> Self {
        Self {
            config,
            sample_rate: sample_rate as f64,
            settings: EqSettings::default(),
            sections: [BandSection::default(); 3],
        }
    }

    /// Set one band's gain, clamped to [-24, +24] dB; returns the stored value
    pub fn set_band(&mut self, band: EqBand, db: f32) -> f32 {
        let db = db.clamp(MIN_EQ_DB, MAX_EQ_DB);
        self.settings.set(band, db);
        self.update_band(band);
        db
    }

    pub fn settings(&self) -> EqSettings {
        self.settings
    }

    fn update_band(&mut self, band: EqBand) {
        let db = self.settings.get(band);
        let section = &mut self.sections[band.index()];

        if db.abs() < 0.01 {
            section.active = false;
            section.state.reset();
            return;
        }

        let (filter_type, freq, q) = match band {
            EqBand::Low => (FilterType::LowShelf, self.config.low_hz, SHELF_Q),
            EqBand::Mid => (FilterType::Peak, self.config.mid_hz, self.config.mid_q as f64),
            EqBand::High => (FilterType::HighShelf, self.config.high_hz, SHELF_Q),
        };
        section.coeffs =
            BiquadCoeffs::calculate(filter_type, self.sample_rate, freq as f64, db as f64, q);
        section.active = true;
    }
}

impl AudioNode for ThreeBandEq {
    fn process(&mut self, block: &mut [StereoFrame]) {
        for section in self.sections.iter_mut().filter(|s| s.active) {
            for frame in block.iter_mut() {
                *frame = section.state.process(*frame, &section.coeffs);
            }
        }
    }

    fn prepare(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate as f64;
        for band in EqBand::ALL {
            self.update_band(band);
        }
    }

    fn reset(&mut self) {
        for section in &mut self.sections {
            section.state.reset();
        }
    }

    fn node_type(&self) -> &'static str {
        "three_band_eq"
    }
}
