//! Plays an [`AutoMixPlan`] into a mixer
//!
//! The driver owns only the plan. Whatever it controls is borrowed per call
//! through [`MixControl`], so the same plan can drive an offline [`Mixer`]
//! or the realtime [`EngineController`].

use crate::dsp::eq::{EqBand, EqSettings};
use crate::engine::deck::DeckId;
use crate::engine::mixer::Mixer;
use crate::engine::realtime::EngineController;
use crate::error::Result;

use super::automation::AutoMixPlan;

/// The mixing surface an automation needs
pub trait MixControl {
    fn set_crossfader(&mut self, position: f64) -> Result<f64>;

    fn set_eq(&mut self, deck: DeckId, band: EqBand, db: f32) -> Result<f32>;

    fn set_pitch(&mut self, deck: DeckId, ratio: f64) -> Result<f64>;
}

impl MixControl for Mixer {
    fn set_crossfader(&mut self, position: f64) -> Result<f64> {
        Mixer::set_crossfader(self, position)
    }

    fn set_eq(&mut self, deck: DeckId, band: EqBand, db: f32) -> Result<f32> {
        self.deck_mut(deck).set_eq(band, db)
    }

    fn set_pitch(&mut self, deck: DeckId, ratio: f64) -> Result<f64> {
        self.deck_mut(deck).set_pitch(ratio)
    }
}

impl MixControl for EngineController {
    fn set_crossfader(&mut self, position: f64) -> Result<f64> {
        EngineController::set_crossfader(self, position)
    }

    fn set_eq(&mut self, deck: DeckId, band: EqBand, db: f32) -> Result<f32> {
        EngineController::set_eq(self, deck, band, db)
    }

    fn set_pitch(&mut self, deck: DeckId, ratio: f64) -> Result<f64> {
        EngineController::set_pitch(self, deck, ratio)
    }
}

/// Last values pushed, so unchanged controls are not re-sent
#[derive(Debug, Clone, Copy, PartialEq)]
struct Applied {
    crossfader: f64,
    eq: [EqSettings; 2],
}

/// Samples a plan's curves and pushes them to a [`MixControl`]
#[derive(Debug, Clone)]
pub struct AutoMixDriver {
    plan: AutoMixPlan,
    last: Option<Applied>,
}

impl AutoMixDriver {
    pub fn new(plan: AutoMixPlan) -> Self {
        Self { plan, last: None }
    }

    pub fn plan(&self) -> &AutoMixPlan {
        &self.plan
    }

    pub fn length(&self) -> f64 {
        self.plan.length_seconds()
    }

    /// Pitch both decks to the plan's target tempo
    pub fn prepare(&mut self, control: &mut impl MixControl) -> Result<()> {
        for deck in DeckId::BOTH {
            let ratio = control.set_pitch(deck, self.plan.pitch_for(deck)?)?;
            log::debug!("Deck {} pitched to {:.4}", deck, ratio);
        }
        self.last = None;
        Ok(())
    }

    /// Push the automation values at `t` seconds into the transition
    pub fn apply(&mut self, t: f64, control: &mut impl MixControl) -> Result<()> {
        let next = Applied {
            crossfader: self.plan.crossfader.sample(t),
            eq: [
                self.plan.eq_curve(DeckId::A).sample(t),
                self.plan.eq_curve(DeckId::B).sample(t),
            ],
        };
        let previous = self.last;

        if previous.map_or(true, |p| p.crossfader != next.crossfader) {
            control.set_crossfader(next.crossfader)?;
        }
        for deck in DeckId::BOTH {
            let settings = next.eq[deck.index()];
            for band in EqBand::ALL {
                let unchanged = previous
                    .map_or(false, |p| p.eq[deck.index()].get(band) == settings.get(band));
                if !unchanged {
                    control.set_eq(deck, band, settings.get(band))?;
                }
            }
        }

        self.last = Some(next);
        Ok(())
    }

    /// Whether `t` is past the end of the transition
    pub fn is_finished(&self, t: f64) -> bool {
        t >= self.length()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automix::automation::{plan, MixPreferences};
    use crate::automix::catalog::{Catalog, Energy, Genre};
    use crate::config::EngineConfig;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Records every call instead of mixing
    #[derive(Default)]
    struct CallLog {
        crossfader: Vec<f64>,
        eq: Vec<(DeckId, EqBand, f32)>,
        pitch: Vec<(DeckId, f64)>,
    }

    impl MixControl for CallLog {
        fn set_crossfader(&mut self, position: f64) -> Result<f64> {
            self.crossfader.push(position);
            Ok(position)
        }

        fn set_eq(&mut self, deck: DeckId, band: EqBand, db: f32) -> Result<f32> {
            self.eq.push((deck, band, db));
            Ok(db)
        }

        fn set_pitch(&mut self, deck: DeckId, ratio: f64) -> Result<f64> {
            self.pitch.push((deck, ratio));
            Ok(ratio)
        }
    }

    fn club_plan() -> AutoMixPlan {
        let prefs = MixPreferences {
            genre: Genre::Techno,
            energy: Energy::Club,
            length_seconds: 20.0,
        };
        plan(&Catalog::builtin(), prefs, &mut StdRng::seed_from_u64(3)).unwrap()
    }

    #[test]
    fn test_apply_skips_unchanged_values() {
        let mut driver = AutoMixDriver::new(club_plan());
        let mut calls = CallLog::default();

        driver.apply(0.0, &mut calls).unwrap();
        assert_eq!(calls.crossfader, vec![-1.0]);
        assert_eq!(calls.eq.len(), 6);

        // First phase: crossfader and deck A hold, deck B is fading in
        driver.apply(2.0, &mut calls).unwrap();
        assert_eq!(calls.crossfader.len(), 1);
        let deck_a_calls = calls.eq.iter().filter(|(deck, _, _)| *deck == DeckId::A).count();
        assert_eq!(deck_a_calls, 3);
        assert!(calls.eq.len() > 6);

        driver.apply(10.0, &mut calls).unwrap();
        assert_eq!(calls.crossfader.len(), 2);
        assert!(calls.eq.len() > 6);
    }

    #[test]
    fn test_drives_mixer_through_transition() {
        let mut mixer = Mixer::new(EngineConfig::default()).unwrap();
        let mut driver = AutoMixDriver::new(club_plan());

        driver.prepare(&mut mixer).unwrap();
        let bpm_a = driver.plan().deck_a.bpm;
        assert!((mixer.deck(DeckId::A).pitch() * bpm_a - 128.0).abs() < 1e-9);

        driver.apply(0.0, &mut mixer).unwrap();
        assert_eq!(mixer.crossfader(), -1.0);
        assert_eq!(mixer.deck(DeckId::B).eq_settings().low, -24.0);

        driver.apply(driver.length(), &mut mixer).unwrap();
        assert_eq!(mixer.crossfader(), 1.0);
        assert_eq!(mixer.deck(DeckId::A).eq_settings().low, -24.0);
        assert_eq!(mixer.deck(DeckId::B).eq_settings(), EqSettings::default());
        assert!(driver.is_finished(20.0));
    }

    #[test]
    fn test_prepare_pitches_both_decks() {
        let mut driver = AutoMixDriver::new(club_plan());
        let mut calls = CallLog::default();
        driver.prepare(&mut calls).unwrap();
        assert_eq!(calls.pitch.len(), 2);
    }
}
