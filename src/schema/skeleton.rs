use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::atom::{AtomCategory, AtomId, StoryAtom};

/// The five fixed tarot spread templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpreadType {
    HeroJourney,
    ConflictDiamond,
    ThreeAct,
    CelticCross,
    MysteryBox,
}

impl SpreadType {
    pub const ALL: [SpreadType; 5] = [
        Self::HeroJourney,
        Self::ConflictDiamond,
        Self::ThreeAct,
        Self::CelticCross,
        Self::MysteryBox,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::HeroJourney => "hero_journey",
            Self::ConflictDiamond => "conflict_diamond",
            Self::ThreeAct => "three_act",
            Self::CelticCross => "celtic_cross",
            Self::MysteryBox => "mystery_box",
        }
    }
}

/// Which generator produced a skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    Tarot(SpreadType),
    Markov,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tarot(spread) => write!(f, "tarot:{}", spread.name()),
            Self::Markov => write!(f, "markov"),
        }
    }
}

/// Why a slot did not get an ideal atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotViolation {
    /// Filled from another category because the required pool was exhausted.
    CategoryFallback,
    /// Right category, but the slot's semantic constraint could not be met.
    ConstraintUnmet,
    /// No atom was available at all.
    Unfilled,
}

/// A named template position bound to at most one atom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkeletonSlot {
    pub name: String,
    pub required: Option<AtomCategory>,
    pub atom: Option<Arc<StoryAtom>>,
    #[serde(default)]
    pub violation: Option<SlotViolation>,
}

impl SkeletonSlot {
    pub fn empty(name: impl Into<String>, required: Option<AtomCategory>) -> Self {
        Self {
            name: name.into(),
            required,
            atom: None,
            violation: Some(SlotViolation::Unfilled),
        }
    }

    pub fn filled(
        name: impl Into<String>,
        required: Option<AtomCategory>,
        atom: Arc<StoryAtom>,
    ) -> Self {
        Self {
            name: name.into(),
            required,
            atom: Some(atom),
            violation: None,
        }
    }

    pub fn is_filled(&self) -> bool {
        self.atom.is_some()
    }
}

/// Coarse emotional register derived from the atoms' tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tone {
    Dark,
    Luminous,
    Tense,
    Enigmatic,
    Neutral,
}

const TONE_SIGNALS: &[(Tone, &[&str])] = &[
    (
        Tone::Dark,
        &["dark", "death", "shadow", "decay", "fear", "loss", "grief", "curse", "ruin", "blood"],
    ),
    (
        Tone::Luminous,
        &["light", "hope", "love", "joy", "healing", "dawn", "grace", "warmth", "faith", "life"],
    ),
    (
        Tone::Tense,
        &["conflict", "danger", "violence", "betrayal", "chase", "war", "threat", "power", "rivalry", "storm"],
    ),
    (
        Tone::Enigmatic,
        &["mystery", "secret", "hidden", "unknown", "magic", "dream", "riddle", "forgotten", "ancient", "fate"],
    ),
];

/// An ordered template of slots plus generation metadata.
///
/// Skeletons are values: scoring and evolution return new skeletons rather
/// than mutating a scored one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorySkeleton {
    pub slots: Vec<SkeletonSlot>,
    pub strategy: Strategy,
    #[serde(default)]
    pub score: Option<f32>,
    /// 0 for freshly generated, >0 when produced by evolution.
    #[serde(default)]
    pub generation: u32,
}

/// One generation of evolution. Members carry the generation they were
/// produced in, so carried-over elites keep an older index.
pub type Population = Vec<StorySkeleton>;

impl StorySkeleton {
    pub fn new(strategy: Strategy, slots: Vec<SkeletonSlot>) -> Self {
        Self {
            slots,
            strategy,
            score: None,
            generation: 0,
        }
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_generation(mut self, generation: u32) -> Self {
        self.generation = generation;
        self
    }

    /// Number of slots bound to an atom.
    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|s| s.is_filled()).count()
    }

    pub fn is_complete(&self) -> bool {
        !self.slots.is_empty() && self.filled() == self.slots.len()
    }

    /// Atoms in slot order, skipping empty slots.
    pub fn atoms(&self) -> impl Iterator<Item = &Arc<StoryAtom>> {
        self.slots.iter().filter_map(|s| s.atom.as_ref())
    }

    pub fn atom_ids(&self) -> Vec<AtomId> {
        self.atoms().map(|a| a.id).collect()
    }

    pub fn slot(&self, name: &str) -> Option<&SkeletonSlot> {
        self.slots.iter().find(|s| s.name == name)
    }

    pub fn violations(&self) -> usize {
        self.slots.iter().filter(|s| s.violation.is_some()).count()
    }

    /// Two skeletons are template-compatible when they came from the same
    /// strategy and name the same slots in the same order.
    pub fn is_compatible_with(&self, other: &StorySkeleton) -> bool {
        self.strategy == other.strategy
            && self.slots.len() == other.slots.len()
            && self
                .slots
                .iter()
                .zip(&other.slots)
                .all(|(a, b)| a.name == b.name)
    }

    /// Tags carried by at least two filled slots, most frequent first.
    pub fn theme_tags(&self) -> Vec<String> {
        let mut counts: FxHashMap<&str, usize> = FxHashMap::default();
        for atom in self.atoms() {
            for tag in &atom.tags {
                *counts.entry(tag.as_str()).or_default() += 1;
            }
        }
        let mut shared: Vec<(&str, usize)> = counts.into_iter().filter(|(_, n)| *n >= 2).collect();
        shared.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        shared.into_iter().map(|(t, _)| t.to_string()).collect()
    }

    /// The tone whose signal tags appear most often; ties keep the earlier tone.
    pub fn tone(&self) -> Tone {
        let mut best = (Tone::Neutral, 0usize);
        for (tone, signals) in TONE_SIGNALS {
            let hits = self
                .atoms()
                .flat_map(|a| a.tags.iter())
                .filter(|t| signals.contains(&t.as_str()))
                .count();
            if hits > best.1 {
                best = (*tone, hits);
            }
        }
        best.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::atom::AtomOrigin;

    fn atom(id: u64, category: AtomCategory, tags: &[&str]) -> Arc<StoryAtom> {
        Arc::new(StoryAtom {
            id: AtomId(id),
            category,
            label: format!("atom {id}"),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            rarity: 0.5,
            origin: AtomOrigin::Catalogue,
        })
    }

    fn sample() -> StorySkeleton {
        StorySkeleton::new(
            Strategy::Markov,
            vec![
                SkeletonSlot::filled("opening", Some(AtomCategory::Location), atom(1, AtomCategory::Location, &["shadow", "ancient"])),
                SkeletonSlot::filled("tension", Some(AtomCategory::Tension), atom(2, AtomCategory::Tension, &["shadow", "fear"])),
                SkeletonSlot::empty("resolution", Some(AtomCategory::Object)),
            ],
        )
    }

    #[test]
    fn counts_and_views() {
        let sk = sample();
        assert_eq!(sk.filled(), 2);
        assert!(!sk.is_complete());
        assert_eq!(sk.violations(), 1);
        assert_eq!(sk.atom_ids(), vec![AtomId(1), AtomId(2)]);
        assert!(sk.slot("tension").is_some());
    }

    #[test]
    fn theme_and_tone() {
        let sk = sample();
        assert_eq!(sk.theme_tags(), vec!["shadow".to_string()]);
        assert_eq!(sk.tone(), Tone::Dark);

        let empty = StorySkeleton::new(Strategy::Markov, vec![]);
        assert_eq!(empty.tone(), Tone::Neutral);
        assert!(empty.theme_tags().is_empty());
    }

    #[test]
    fn with_score_returns_new_value() {
        let sk = sample();
        let scored = sk.clone().with_score(0.5);
        assert_eq!(sk.score, None);
        assert_eq!(scored.score, Some(0.5));
    }

    #[test]
    fn compatibility_requires_same_slots() {
        let a = sample();
        let mut b = sample();
        assert!(a.is_compatible_with(&b));
        b.slots[0].name = "prologue".into();
        assert!(!a.is_compatible_with(&b));
        let c = StorySkeleton::new(Strategy::Tarot(SpreadType::ThreeAct), a.slots.clone());
        assert!(!a.is_compatible_with(&c));
    }

    #[test]
    fn strategy_display() {
        assert_eq!(Strategy::Tarot(SpreadType::HeroJourney).to_string(), "tarot:hero_journey");
        assert_eq!(Strategy::Markov.to_string(), "markov");
    }
}
