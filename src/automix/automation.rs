//! Automation curves for an auto-mix transition
//!
//! A transition of length `L` seconds is split into three phases: deck A
//! alone until `0.3 L`, a blend until `0.7 L`, then deck B alone. The EQ
//! curves perform a bass swap across the blend.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use rand::Rng;

use super::catalog::{Catalog, CatalogEntry, DeckSelection, Energy, Genre};
use crate::dsp::eq::EqSettings;
use crate::engine::deck::DeckId;
use crate::error::{ensure_finite, MixError, Result};

/// Start of the blend as a fraction of the transition
const BLEND_START: f64 = 0.3;

/// End of the blend as a fraction of the transition
const BLEND_END: f64 = 0.7;

/// Values that can be interpolated between keyframes
pub trait Lerp: Copy {
    fn lerp(a: Self, b: Self, t: f64) -> Self;
}

impl Lerp for f64 {
    fn lerp(a: f64, b: f64, t: f64) -> f64 {
        a + (b - a) * t
    }
}

impl Lerp for EqSettings {
    fn lerp(a: EqSettings, b: EqSettings, t: f64) -> EqSettings {
        let t = t as f32;
        EqSettings {
            low: a.low + (b.low - a.low) * t,
            mid: a.mid + (b.mid - a.mid) * t,
            high: a.high + (b.high - a.high) * t,
        }
    }
}

/// A value at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe<T> {
    pub time: f64,
    pub value: T,
}

/// Piecewise-linear automation, held flat outside its keyframes
///
/// Deserialized curves are checked like [`Curve::new`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Curve<T> {
    points: Vec<Keyframe<T>>,
}

impl<'de, T: Lerp + Deserialize<'de>> Deserialize<'de> for Curve<T> {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct CurveData<V> {
            points: Vec<Keyframe<V>>,
        }

        let data = CurveData::<T>::deserialize(deserializer)?;
        Curve::new(data.points).map_err(de::Error::custom)
    }
}

impl<T: Lerp> Curve<T> {
    /// Build a curve; keyframe times must be non-decreasing
    pub fn new(points: Vec<Keyframe<T>>) -> Result<Self> {
        if points.is_empty() {
            return Err(MixError::invalid_parameter(
                "curve",
                "no keyframes",
                "at least one keyframe",
            ));
        }
        if points.windows(2).any(|pair| pair[1].time < pair[0].time) {
            return Err(MixError::invalid_parameter(
                "curve",
                "unordered keyframes",
                "non-decreasing keyframe times",
            ));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Keyframe<T>] {
        &self.points
    }

    /// Value at `time`
    pub fn sample(&self, time: f64) -> T {
        let first = self.points[0];
        if time <= first.time {
            return first.value;
        }
        for pair in self.points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if time <= b.time {
                let span = b.time - a.time;
                if span <= 0.0 {
                    return b.value;
                }
                return T::lerp(a.value, b.value, (time - a.time) / span);
            }
        }
        self.points[self.points.len() - 1].value
    }
}

/// Map a 0..1 "share of deck B" onto the crossfader's -1..+1 range
#[inline]
pub fn unit_to_crossfader(share_b: f64) -> f64 {
    share_b * 2.0 - 1.0
}

/// A → blend → B crossfader automation
pub fn crossfader_curve(length: f64) -> Result<Curve<f64>> {
    let length = ensure_length(length)?;
    let shares = [
        (0.0, 0.0),
        (BLEND_START * length, 0.0),
        (BLEND_END * length, 1.0),
        (length, 1.0),
    ];
    Curve::new(
        shares
            .iter()
            .map(|&(time, share)| Keyframe {
                time,
                value: unit_to_crossfader(share),
            })
            .collect(),
    )
}

/// Bass-swap EQ automation for one deck
pub fn eq_curve(deck: DeckId, length: f64) -> Result<Curve<EqSettings>> {
    let length = ensure_length(length)?;
    let flat = EqSettings::default();
    let half_cut = EqSettings {
        low: -12.0,
        mid: -3.0,
        high: 0.0,
    };
    let full_cut = EqSettings {
        low: -24.0,
        mid: -6.0,
        high: -3.0,
    };
    let values = match deck {
        DeckId::A => [flat, flat, half_cut, full_cut],
        DeckId::B => [full_cut, half_cut, flat, flat],
    };
    let times = [0.0, BLEND_START * length, BLEND_END * length, length];
    Curve::new(
        times
            .iter()
            .zip(values.iter())
            .map(|(&time, &value)| Keyframe { time, value })
            .collect(),
    )
}

/// Tempo a mix at this energy should settle on
pub fn target_bpm(energy: Energy) -> f64 {
    match energy {
        Energy::Chill => 90.0,
        Energy::Medium => 120.0,
        Energy::Club => 128.0,
    }
}

/// What the user asked for
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MixPreferences {
    pub genre: Genre,
    pub energy: Energy,
    /// Transition length in seconds
    pub length_seconds: f64,
}

/// A complete transition, ready for [`super::AutoMixDriver`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoMixPlan {
    pub deck_a: CatalogEntry,
    pub deck_b: CatalogEntry,
    /// Tempo both decks are pitched to
    pub target_bpm: f64,
    pub length_seconds: f64,
    pub crossfader: Curve<f64>,
    pub eq_a: Curve<EqSettings>,
    pub eq_b: Curve<EqSettings>,
}

impl AutoMixPlan {
    /// Bass-swap transition between two known tracks
    pub fn transition(
        deck_a: CatalogEntry,
        deck_b: CatalogEntry,
        target_bpm: f64,
        length_seconds: f64,
    ) -> Result<Self> {
        let length = ensure_length(length_seconds)?;
        let target_bpm = ensure_finite("target_bpm", target_bpm)?;
        Ok(Self {
            deck_a,
            deck_b,
            target_bpm,
            length_seconds: length,
            crossfader: crossfader_curve(length)?,
            eq_a: eq_curve(DeckId::A, length)?,
            eq_b: eq_curve(DeckId::B, length)?,
        })
    }

    pub fn length_seconds(&self) -> f64 {
        self.length_seconds
    }

    /// Pitch ratio that brings a deck's loop to the target tempo
    pub fn pitch_for(&self, deck: DeckId) -> Result<f64> {
        let entry = match deck {
            DeckId::A => &self.deck_a,
            DeckId::B => &self.deck_b,
        };
        crate::engine::tempo::sync_ratio(self.target_bpm, entry.bpm)
    }

    pub fn eq_curve(&self, deck: DeckId) -> &Curve<EqSettings> {
        match deck {
            DeckId::A => &self.eq_a,
            DeckId::B => &self.eq_b,
        }
    }
}

/// Choose loops and build every automation curve for a transition
pub fn plan<R: Rng + ?Sized>(
    catalog: &Catalog,
    preferences: MixPreferences,
    rng: &mut R,
) -> Result<AutoMixPlan> {
    let length = ensure_length(preferences.length_seconds)?;
    let DeckSelection { deck_a, deck_b } =
        catalog.select(preferences.genre, preferences.energy, rng)?;

    let plan = AutoMixPlan::transition(deck_a, deck_b, target_bpm(preferences.energy), length)?;
    log::info!(
        "Planned {:.1}s {} transition: '{}' -> '{}' at {} BPM",
        length,
        preferences.energy,
        plan.deck_a.name,
        plan.deck_b.name,
        plan.target_bpm
    );
    Ok(plan)
}

fn ensure_length(length: f64) -> Result<f64> {
    let length = ensure_finite("length", length)?;
    if length > 0.0 {
        Ok(length)
    } else {
        Err(MixError::invalid_parameter(
            "length",
            length,
            "a positive number of seconds",
        ))
    }
}
