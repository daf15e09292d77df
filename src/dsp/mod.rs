//! DSP building blocks
//!
//! Processing nodes used on the decks and the master bus. Every node
//! implements [`AudioNode`] and works on stereo blocks in place.

pub mod biquad;
pub mod eq;
pub mod filter;
pub mod gain;
pub mod node;

pub use biquad::{BiquadCoeffs, BiquadState, FilterType};
pub use eq::{EqBand, EqSettings, ThreeBandEq};
pub use filter::SweepFilter;
pub use gain::GainNode;
pub use node::{AudioNode, NodeId, SignalChain};
