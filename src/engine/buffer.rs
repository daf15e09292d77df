//! Audio Buffer Management
//!
//! Decoded track audio and the stereo frame type every processing block
//! works on. Track buffers are immutable once decoded; decks share them
//! through `Arc` so a reload swaps a pointer instead of copying samples.

use crate::error::{MixError, Result};

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert decibels to linear amplitude
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels
///
/// Returns -f32::INFINITY for zero input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

/// RMS level of a block of frames in dB (both channels)
///
/// Returns -f32::INFINITY for empty or silent input.
pub fn calculate_rms(frames: &[StereoFrame]) -> f32 {
    if frames.is_empty() {
        return f32::NEG_INFINITY;
    }

    let sum_squares: f64 = frames
        .iter()
        .map(|f| (f.left as f64).powi(2) + (f.right as f64).powi(2))
        .sum();

    let rms = (sum_squares / (frames.len() * 2) as f64).sqrt() as f32;
    linear_to_db(rms)
}

/// Peak level of a block of frames in dB
pub fn calculate_peak(frames: &[StereoFrame]) -> f32 {
    let peak = frames
        .iter()
        .map(|f| f.left.abs().max(f.right.abs()))
        .fold(0.0_f32, f32::max);

    linear_to_db(peak)
}

// ============================================================================
// Stereo Frame
// ============================================================================

/// One stereo sample pair, the unit every node processes
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StereoFrame {
    pub left: f32,
    pub right: f32,
}

impl StereoFrame {
    pub const SILENCE: StereoFrame = StereoFrame {
        left: 0.0,
        right: 0.0,
    };

    #[inline]
    pub fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    /// Same value on both channels
    #[inline]
    pub fn mono(value: f32) -> Self {
        Self {
            left: value,
            right: value,
        }
    }

    #[inline]
    pub fn scale(self, gain: f32) -> Self {
        Self {
            left: self.left * gain,
            right: self.right * gain,
        }
    }

    #[inline]
    pub fn is_silent(&self) -> bool {
        self.left == 0.0 && self.right == 0.0
    }
}

impl std::ops::Add for StereoFrame {
    type Output = StereoFrame;

    #[inline]
    fn add(self, rhs: StereoFrame) -> StereoFrame {
        StereoFrame {
            left: self.left + rhs.left,
            right: self.right + rhs.right,
        }
    }
}

// ============================================================================
// Channel Layout
// ============================================================================

/// Audio channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelLayout {
    /// Single channel (mono)
    Mono,
    /// Two channels (stereo: left, right)
    #[default]
    Stereo,
}

impl ChannelLayout {
    /// Returns the number of channels for this layout
    pub fn num_channels(&self) -> usize {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }

    /// Create a ChannelLayout from a channel count
    pub fn from_count(count: usize) -> Option<Self> {
        match count {
            1 => Some(ChannelLayout::Mono),
            2 => Some(ChannelLayout::Stereo),
            _ => None,
        }
    }
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Decoded, immutable track audio
///
/// Stores non-interleaved 32-bit float samples. Mono buffers are played on
/// both output channels.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Sample data: outer Vec is channels, inner Vec is samples
    samples: Vec<Vec<f32>>,
    /// Sample rate in Hz
    sample_rate: u32,
}

impl AudioBuffer {
    /// Build a buffer from planar channel data
    ///
    /// Fails when the channel count is not 1 or 2 or the channels differ in
    /// length.
    pub fn from_channels(samples: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if ChannelLayout::from_count(samples.len()).is_none() {
            return Err(MixError::decode(format!(
                "{}-channel audio (only mono/stereo supported)",
                samples.len()
            )));
        }
        if sample_rate == 0 {
            return Err(MixError::decode("sample rate of 0 Hz"));
        }
        let len = samples[0].len();
        if samples.iter().any(|ch| ch.len() != len) {
            return Err(MixError::decode("channels have different lengths"));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Create an audio buffer from interleaved sample data
    pub fn from_interleaved(
        interleaved: &[f32],
        layout: ChannelLayout,
        sample_rate: u32,
    ) -> Result<Self> {
        let num_channels = layout.num_channels();

        if interleaved.len() % num_channels != 0 {
            return Err(MixError::decode(format!(
                "Interleaved data length {} is not divisible by channel count {}",
                interleaved.len(),
                num_channels
            )));
        }

        let num_samples = interleaved.len() / num_channels;
        let mut samples = vec![Vec::with_capacity(num_samples); num_channels];

        for frame in interleaved.chunks_exact(num_channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                samples[ch].push(sample);
            }
        }

        Self::from_channels(samples, sample_rate)
    }

    /// Get the number of channels
    #[inline]
    pub fn num_channels(&self) -> usize {
        self.samples.len()
    }

    /// Get the channel layout
    pub fn channel_layout(&self) -> ChannelLayout {
        if self.samples.len() == 1 {
            ChannelLayout::Mono
        } else {
            ChannelLayout::Stereo
        }
    }

    /// Get the number of frames
    #[inline]
    pub fn num_frames(&self) -> usize {
        self.samples.first().map(|ch| ch.len()).unwrap_or(0)
    }

    /// Check if the buffer holds no frames
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_frames() == 0
    }

    /// Sample rate in Hz
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get the duration in seconds
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        self.num_frames() as f64 / self.sample_rate as f64
    }

    /// Immutable access to one channel
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    /// Frame at an integer index, silence past the end
    #[inline]
    pub fn frame(&self, index: usize) -> StereoFrame {
        match self.samples.as_slice() {
            [mono] => mono.get(index).map_or(StereoFrame::SILENCE, |&s| StereoFrame::mono(s)),
            [left, right] => match (left.get(index), right.get(index)) {
                (Some(&l), Some(&r)) => StereoFrame::new(l, r),
                _ => StereoFrame::SILENCE,
            },
            _ => StereoFrame::SILENCE,
        }
    }

    /// Frame at a fractional read position, linearly interpolated
    #[inline]
    pub fn frame_at(&self, position: f64) -> StereoFrame {
        if position < 0.0 {
            return StereoFrame::SILENCE;
        }
        let index = position.floor() as usize;
        let frac = (position - index as f64) as f32;
        let a = self.frame(index);
        if frac == 0.0 {
            return a;
        }
        let b = self.frame(index + 1);
        StereoFrame {
            left: a.left + (b.left - a.left) * frac,
            right: a.right + (b.right - a.right) * frac,
        }
    }

    /// All frames as a stereo vector
    pub fn to_frames(&self) -> Vec<StereoFrame> {
        (0..self.num_frames()).map(|i| self.frame(i)).collect()
    }

    /// Check that every sample is finite
    pub fn is_finite(&self) -> bool {
        self.samples.iter().flatten().all(|s| s.is_finite())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
