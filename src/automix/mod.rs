//! Auto-mix planning
//!
//! Picks two loops from a [`Catalog`] and builds a bass-swap transition
//! between them; [`AutoMixDriver`] plays that transition into a mixer.

pub mod automation;
pub mod catalog;
pub mod driver;

pub use automation::{
    crossfader_curve, eq_curve, plan, target_bpm, AutoMixPlan, Curve, Keyframe, Lerp,
    MixPreferences,
};
pub use catalog::{Catalog, CatalogEntry, DeckSelection, Energy, Genre};
pub use driver::{AutoMixDriver, MixControl};
