//! Deck Transport State Machine
//!
//! Tracks whether a deck has material, whether it is running, and where the
//! fractional read head sits inside the track. The read head is kept in
//! track frames and advances by the playback rate per output frame, so a
//! rate of 1.02 walks through the track 2% faster than real time.
//!
//! ```text
//!   Empty ──load──▶ Loaded ──play──▶ Playing ◀──play── Paused
//!                     ▲                 │  └───pause──▶  │
//!                     └──────stop───────┴────────stop────┘
//! ```

use std::fmt;

/// Transport states of a single deck
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    /// No buffer loaded (default state)
    #[default]
    Empty,
    /// Buffer loaded, stopped at the start
    Loaded,
    /// Read head is advancing
    Playing,
    /// Stopped mid-track, position kept
    Paused,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportState::Empty => write!(f, "Empty"),
            TransportState::Loaded => write!(f, "Loaded"),
            TransportState::Playing => write!(f, "Playing"),
            TransportState::Paused => write!(f, "Paused"),
        }
    }
}

/// A span of track frames the read head wraps inside
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopRegion {
    pub start: f64,
    pub end: f64,
}

impl LoopRegion {
    #[inline]
    pub fn length(&self) -> f64 {
        self.end - self.start
    }

    #[inline]
    pub fn contains(&self, frame: f64) -> bool {
        frame >= self.start && frame < self.end
    }
}

/// Per-deck transport
#[derive(Debug, Clone, Default)]
pub struct Transport {
    state: TransportState,
    /// Read head in track frames
    read_head: f64,
    /// Track frames consumed per output frame
    rate: f64,
    /// Length of the loaded track in frames
    length: usize,
    loop_region: Option<LoopRegion>,
}

impl Transport {
    pub fn new() -> Self {
        Self {
            rate: 1.0,
            ..Default::default()
        }
    }

    // ========================================================================
    // State Transitions
    // ========================================================================

    /// Point the transport at a new track of `length` frames
    ///
    /// Rewinds to 0, drops any loop, and leaves the transport `Loaded`
    /// (or `Empty` for a zero-length track).
    pub fn load(&mut self, length: usize) {
        self.length = length;
        self.read_head = 0.0;
        self.loop_region = None;
        self.state = if length == 0 {
            TransportState::Empty
        } else {
            TransportState::Loaded
        };
    }

    /// Start or resume; returns false when nothing is loaded
    pub fn play(&mut self) -> bool {
        match self.state {
            TransportState::Empty => false,
            TransportState::Playing => true,
            TransportState::Loaded | TransportState::Paused => {
                self.state = TransportState::Playing;
                true
            }
        }
    }

    /// Halt, keeping the read head where it is
    pub fn pause(&mut self) {
        if self.state == TransportState::Playing {
            self.state = TransportState::Paused;
        }
    }

    /// Halt and rewind to the start of the track
    pub fn stop(&mut self) {
        if self.state != TransportState::Empty {
            self.state = TransportState::Loaded;
            self.read_head = 0.0;
        }
    }

    /// Move the read head, clamped to `[0, length)`
    ///
    /// Returns true when the move left the active loop (the loop is dropped).
    pub fn seek(&mut self, frame: f64) -> bool {
        if self.state == TransportState::Empty {
            return false;
        }
        let last = (self.length - 1) as f64;
        self.read_head = frame.clamp(0.0, last);

        if self.state == TransportState::Loaded && self.read_head > 0.0 {
            self.state = TransportState::Paused;
        }

        match self.loop_region {
            Some(region) if !region.contains(self.read_head) => {
                self.loop_region = None;
                true
            }
            _ => false,
        }
    }

    // ========================================================================
    // Playback
    // ========================================================================

    /// Read position for the next output frame, advancing the head
    ///
    /// Returns `None` while not playing. Running off the end of the track
    /// without a loop behaves like [`stop`](Self::stop).
    #[inline]
    pub fn next_read_position(&mut self) -> Option<f64> {
        if self.state != TransportState::Playing {
            return None;
        }
        if self.read_head >= self.length as f64 {
            self.stop();
            return None;
        }

        let position = self.read_head;
        self.read_head += self.rate;

        if let Some(region) = self.loop_region {
            if self.read_head >= region.end {
                self.read_head = region.start + (self.read_head - region.end) % region.length();
            }
        }
        Some(position)
    }

    pub fn set_rate(&mut self, rate: f64) {
        self.rate = rate;
    }

    pub fn set_loop(&mut self, region: Option<LoopRegion>) {
        self.loop_region = region.filter(|r| r.length() > 0.0);
    }

    // ========================================================================
    // State Queries
    // ========================================================================

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    pub fn is_loaded(&self) -> bool {
        self.state != TransportState::Empty
    }

    /// Read head in track frames
    pub fn position(&self) -> f64 {
        self.read_head
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn loop_region(&self) -> Option<LoopRegion> {
        self.loop_region
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
