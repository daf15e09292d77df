//! Engine configuration
//!
//! All settings have working defaults; a JSON file can override any subset.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MixError, Result};

/// Default engine sample rate (48kHz)
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Default maximum frames rendered per internal block
pub const DEFAULT_MAX_BLOCK_FRAMES: usize = 1024;

/// Default hold time before a hot-cue press counts as a long press
pub const DEFAULT_LONG_PRESS_MS: u64 = 600;

/// Default UI poll cadence
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Default capacity of the control → audio command queue
pub const DEFAULT_COMMAND_QUEUE_CAPACITY: usize = 256;

/// Fixed frequencies of the 3-band deck EQ
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EqConfig {
    /// Low shelf corner frequency in Hz
    pub low_hz: f32,
    /// Mid peak centre frequency in Hz
    pub mid_hz: f32,
    /// Mid peak Q
    pub mid_q: f32,
    /// High shelf corner frequency in Hz
    pub high_hz: f32,
}

impl Default for EqConfig {
    fn default() -> Self {
        Self {
            low_hz: 320.0,
            mid_hz: 1000.0,
            mid_q: 0.7,
            high_hz: 3200.0,
        }
    }
}

/// Recorder settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Frames the capture ring can hold before overruns start
    pub capture_queue_frames: usize,
    /// Refuse to start recording while both decks are idle
    pub require_playing_deck: bool,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            capture_queue_frames: DEFAULT_SAMPLE_RATE as usize * 2,
            require_playing_deck: false,
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sample_rate: u32,
    pub max_block_frames: usize,
    pub eq: EqConfig,
    pub hot_cue_long_press_ms: u64,
    pub poll_interval_ms: u64,
    pub command_queue_capacity: usize,
    pub recorder: RecorderConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            max_block_frames: DEFAULT_MAX_BLOCK_FRAMES,
            eq: EqConfig::default(),
            hot_cue_long_press_ms: DEFAULT_LONG_PRESS_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            command_queue_capacity: DEFAULT_COMMAND_QUEUE_CAPACITY,
            recorder: RecorderConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load a configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        log::debug!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }

    /// How often a host should call `EngineController::poll`
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Poll cadence measured in frames of rendered audio
    pub fn poll_interval_frames(&self) -> usize {
        (self.poll_interval_ms * self.sample_rate as u64 / 1000) as usize
    }

    /// Check that every setting is usable
    pub fn validate(&self) -> Result<()> {
        if !(8000..=192_000).contains(&self.sample_rate) {
            return Err(MixError::invalid_parameter(
                "sample_rate",
                self.sample_rate,
                "8000-192000 Hz",
            ));
        }
        if self.max_block_frames == 0 {
            return Err(MixError::invalid_parameter(
                "max_block_frames",
                self.max_block_frames,
                "at least 1 frame",
            ));
        }
        if !(1..=10_000).contains(&self.poll_interval_ms) {
            return Err(MixError::invalid_parameter(
                "poll_interval_ms",
                self.poll_interval_ms,
                "1-10000 ms",
            ));
        }
        if self.command_queue_capacity == 0 {
            return Err(MixError::invalid_parameter(
                "command_queue_capacity",
                self.command_queue_capacity,
                "at least 1 command",
            ));
        }
        if self.recorder.capture_queue_frames < self.max_block_frames {
            return Err(MixError::invalid_parameter(
                "recorder.capture_queue_frames",
                self.recorder.capture_queue_frames,
                format!("at least max_block_frames ({})", self.max_block_frames),
            ));
        }
        let nyquist = self.sample_rate as f32 / 2.0;
        for (name, hz) in [
            ("eq.low_hz", self.eq.low_hz),
            ("eq.mid_hz", self.eq.mid_hz),
            ("eq.high_hz", self.eq.high_hz),
        ] {
            if !hz.is_finite() || hz < 20.0 || hz >= nyquist {
                return Err(MixError::invalid_parameter(
                    name,
                    hz,
                    format!("20 Hz to below {} Hz", nyquist),
                ));
            }
        }
        if !self.eq.mid_q.is_finite() || self.eq.mid_q <= 0.0 {
            return Err(MixError::invalid_parameter(
                "eq.mid_q",
                self.eq.mid_q,
                "a positive Q",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.hot_cue_long_press_ms, 600);
        assert!(!config.recorder.require_playing_deck);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("engine.json");

        let mut config = EngineConfig::default();
        config.sample_rate = 44100;
        config.recorder.require_playing_deck = true;
        config.save(&path).unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partial.json");
        fs::write(&path, r#"{ "max_block_frames": 256, "eq": { "low_hz": 200.0 } }"#).unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.max_block_frames, 256);
        assert_eq!(config.eq.low_hz, 200.0);
        assert_eq!(config.eq.mid_hz, 1000.0);
        assert_eq!(config.sample_rate, DEFAULT_SAMPLE_RATE);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = EngineConfig::default();
        config.max_block_frames = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.eq.high_hz = 30000.0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.recorder.capture_queue_frames = 16;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_poll_interval() {
        let mut config = EngineConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.poll_interval_frames(), 4800);

        config.sample_rate = 44100;
        config.poll_interval_ms = 20;
        assert_eq!(config.poll_interval_frames(), 882);

        config.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = EngineConfig::load(&dir.path().join("missing.json")).unwrap_err();
        assert_eq!(err.error_code(), "IO_ERROR");
    }
}
