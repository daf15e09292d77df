//! Mixdeck - Dual-Deck DJ Mixing Engine
//!
//! Mixdeck plays two tracks side by side and blends them into one stereo
//! output:
//! 1. Decks - Transport, pitch, 3-band EQ, low-pass sweep, hot cues and loops
//! 2. Mixer - Equal-power crossfader, master volume, master-bus inserts
//!
//! # Architecture
//!
//! The engine runs in two halves:
//! - Control thread: [`engine::EngineController`] validates intents and keeps
//!   an immediately consistent view of every deck
//! - Audio thread: [`engine::AudioProcessor`] renders blocks without locking
//!   or allocating
//!
//! The recorder taps the master bus, and [`automix`] builds bass-swap
//! transitions that drive either half through [`automix::MixControl`].

pub mod automix;
pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;

pub use config::EngineConfig;
pub use error::{MixError, Result};
