//! Loop catalog and deck selection

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{MixError, Result};

/// Musical genre of a loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Genre {
    House,
    Techno,
    HipHop,
    Lofi,
    Edm,
}

impl Genre {
    /// Same genre, or both from the four-on-the-floor family
    pub fn is_compatible(self, other: Genre) -> bool {
        self == other || (self.is_club_family() && other.is_club_family())
    }

    fn is_club_family(self) -> bool {
        matches!(self, Genre::House | Genre::Techno | Genre::Edm)
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Genre::House => "house",
            Genre::Techno => "techno",
            Genre::HipHop => "hip-hop",
            Genre::Lofi => "lofi",
            Genre::Edm => "edm",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Genre {
    type Err = MixError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "house" => Ok(Genre::House),
            "techno" => Ok(Genre::Techno),
            "hip-hop" | "hiphop" => Ok(Genre::HipHop),
            "lofi" | "lo-fi" => Ok(Genre::Lofi),
            "edm" => Ok(Genre::Edm),
            _ => Err(MixError::invalid_parameter(
                "genre",
                s,
                "house, techno, hip-hop, lofi or edm",
            )),
        }
    }
}

/// Energy level of a loop or a requested mix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Energy {
    Chill,
    Medium,
    Club,
}

impl Energy {
    /// Whether a loop at `loop_energy` suits a mix requested at `self`
    pub fn accepts(self, loop_energy: Energy) -> bool {
        match self {
            Energy::Chill => matches!(loop_energy, Energy::Chill | Energy::Medium),
            Energy::Medium => loop_energy == Energy::Medium,
            Energy::Club => matches!(loop_energy, Energy::Club | Energy::Medium),
        }
    }
}

impl fmt::Display for Energy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Energy::Chill => "chill",
            Energy::Medium => "medium",
            Energy::Club => "club",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Energy {
    type Err = MixError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "chill" => Ok(Energy::Chill),
            "medium" => Ok(Energy::Medium),
            "club" => Ok(Energy::Club),
            _ => Err(MixError::invalid_parameter(
                "energy",
                s,
                "chill, medium or club",
            )),
        }
    }
}

/// One loop the planner can pick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub path: String,
    pub bpm: f64,
    pub genre: Genre,
    pub energy: Energy,
}

impl CatalogEntry {
    pub fn new(name: &str, path: &str, bpm: f64, genre: Genre, energy: Energy) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            bpm,
            genre,
            energy,
        }
    }
}

/// The two loops chosen for a mix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckSelection {
    pub deck_a: CatalogEntry,
    pub deck_b: CatalogEntry,
}

/// Caller-supplied set of loops
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    /// The app's stock loop library
    pub fn builtin() -> Self {
        Self::new(vec![
            CatalogEntry::new(
                "Deep House",
                "/loops/deep_house_124.wav",
                124.0,
                Genre::House,
                Energy::Medium,
            ),
            CatalogEntry::new(
                "Tech Groove",
                "/loops/tech_groove_128.wav",
                128.0,
                Genre::Techno,
                Energy::Club,
            ),
            CatalogEntry::new(
                "Hip-Hop Beat",
                "/loops/hiphop_beat_90.wav",
                90.0,
                Genre::HipHop,
                Energy::Medium,
            ),
            CatalogEntry::new(
                "Lo-Fi Chill",
                "/loops/lofi_chill_80.wav",
                80.0,
                Genre::Lofi,
                Energy::Chill,
            ),
            CatalogEntry::new(
                "EDM Drop",
                "/loops/edm_drop_128.wav",
                128.0,
                Genre::Edm,
                Energy::Club,
            ),
        ])
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Loops eligible for a mix
    ///
    /// Genre first (falling back to the whole catalog when nothing is
    /// compatible), then energy (ignored when it would leave nothing).
    pub fn candidates(&self, genre: Genre, energy: Energy) -> Vec<&CatalogEntry> {
        let mut by_genre: Vec<&CatalogEntry> = self
            .entries
            .iter()
            .filter(|entry| genre.is_compatible(entry.genre))
            .collect();
        if by_genre.is_empty() {
            by_genre = self.entries.iter().collect();
        }

        let by_energy: Vec<&CatalogEntry> = by_genre
            .iter()
            .copied()
            .filter(|entry| energy.accepts(entry.energy))
            .collect();
        if by_energy.is_empty() {
            by_genre
        } else {
            by_energy
        }
    }

    /// Pick a loop for each deck
    ///
    /// Deck B differs from deck A whenever more than one loop qualifies.
    pub fn select<R: Rng + ?Sized>(
        &self,
        genre: Genre,
        energy: Energy,
        rng: &mut R,
    ) -> Result<DeckSelection> {
        let candidates = self.candidates(genre, energy);
        if candidates.is_empty() {
            return Err(MixError::invalid_parameter(
                "catalog",
                "empty",
                "at least one loop",
            ));
        }

        let deck_a = candidates[rng.gen_range(0..candidates.len())];
        let others: Vec<&CatalogEntry> = candidates
            .iter()
            .copied()
            .filter(|entry| entry.path != deck_a.path)
            .collect();
        let deck_b = if others.is_empty() {
            deck_a
        } else {
            others[rng.gen_range(0..others.len())]
        };

        log::debug!(
            "Selected '{}' and '{}' for a {} {} mix",
            deck_a.name,
            deck_b.name,
            energy,
            genre
        );
        Ok(DeckSelection {
            deck_a: deck_a.clone(),
            deck_b: deck_b.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn names(entries: &[&CatalogEntry]) -> Vec<String> {
        let mut names: Vec<String> = entries.iter().map(|e| e.name.clone()).collect();
        names.sort();
        names
    }

    #[test]
    fn test_genre_compatibility() {
        assert!(Genre::House.is_compatible(Genre::Techno));
        assert!(Genre::Edm.is_compatible(Genre::House));
        assert!(Genre::Lofi.is_compatible(Genre::Lofi));
        assert!(!Genre::HipHop.is_compatible(Genre::House));
    }

    #[test]
    fn test_energy_rules() {
        assert!(Energy::Chill.accepts(Energy::Medium));
        assert!(!Energy::Chill.accepts(Energy::Club));
        assert!(!Energy::Medium.accepts(Energy::Chill));
        assert!(Energy::Club.accepts(Energy::Medium));
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("hip-hop".parse::<Genre>().unwrap(), Genre::HipHop);
        assert_eq!("CLUB".parse::<Energy>().unwrap(), Energy::Club);
        assert!("polka".parse::<Genre>().is_err());
        assert_eq!(Genre::HipHop.to_string(), "hip-hop");
    }

    #[test]
    fn test_house_club_candidates() {
        let catalog = Catalog::builtin();
        let candidates = catalog.candidates(Genre::House, Energy::Club);
        assert_eq!(names(&candidates), vec!["Deep House", "EDM Drop", "Tech Groove"]);
    }

    #[test]
    fn test_energy_filter_falls_back_to_genre_pool() {
        let catalog = Catalog::builtin();
        // Hip-hop has only a medium loop; chill accepts medium
        assert_eq!(
            names(&catalog.candidates(Genre::HipHop, Energy::Chill)),
            vec!["Hip-Hop Beat"]
        );
        // Lofi has only a chill loop; club rejects it, so the genre pool stays
        assert_eq!(
            names(&catalog.candidates(Genre::Lofi, Energy::Club)),
            vec!["Lo-Fi Chill"]
        );
    }

    #[test]
    fn test_unknown_genre_uses_whole_catalog() {
        let catalog = Catalog::new(vec![CatalogEntry::new(
            "Only Techno",
            "/loops/t.wav",
            130.0,
            Genre::Techno,
            Energy::Club,
        )]);
        assert_eq!(catalog.candidates(Genre::Lofi, Energy::Chill).len(), 1);
    }

    #[test]
    fn test_select_picks_distinct_loops() {
        let catalog = Catalog::builtin();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let selection = catalog.select(Genre::Techno, Energy::Club, &mut rng).unwrap();
            assert_ne!(selection.deck_a.path, selection.deck_b.path);
        }
    }

    #[test]
    fn test_select_single_candidate_reuses_it() {
        let catalog = Catalog::builtin();
        let mut rng = StdRng::seed_from_u64(1);
        let selection = catalog.select(Genre::Lofi, Energy::Chill, &mut rng).unwrap();
        assert_eq!(selection.deck_a, selection.deck_b);
    }

    #[test]
    fn test_select_empty_catalog() {
        let mut rng = StdRng::seed_from_u64(1);
        let err = Catalog::default()
            .select(Genre::House, Energy::Medium, &mut rng)
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_PARAMETER");
    }
}
