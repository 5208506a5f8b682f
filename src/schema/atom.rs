use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

use super::token::TokenTag;

/// Ids at or above this value are minted for ephemeral atoms.
pub const EPHEMERAL_ID_BIT: u64 = 1 << 63;

/// Newtype wrapper for atom IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AtomId(pub u64);

impl AtomId {
    /// Deterministic id for an atom minted outside the catalogue.
    pub fn ephemeral(category: AtomCategory, label: &str) -> Self {
        let mut hasher = FxHasher::default();
        category.tag().hash(&mut hasher);
        label.hash(&mut hasher);
        AtomId(hasher.finish() | EPHEMERAL_ID_BIT)
    }

    pub fn is_ephemeral(&self) -> bool {
        self.0 & EPHEMERAL_ID_BIT != 0
    }
}

/// The typed role an atom can play in a skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AtomCategory {
    Agent,
    Object,
    Location,
    Tension,
    Trigger,
    Quality,
    /// Last-resort bucket for ephemeral atoms with no usable match.
    Unspecified,
}

impl AtomCategory {
    /// The six categories a catalogue entry may carry.
    pub const ALL: [AtomCategory; 6] = [
        Self::Agent,
        Self::Object,
        Self::Location,
        Self::Tension,
        Self::Trigger,
        Self::Quality,
    ];

    /// Returns the tag string for this category (e.g., "tension").
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Object => "object",
            Self::Location => "location",
            Self::Tension => "tension",
            Self::Trigger => "trigger",
            Self::Quality => "quality",
            Self::Unspecified => "unspecified",
        }
    }
}

/// Where an atom came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum AtomOrigin {
    #[default]
    Catalogue,
    /// Minted by the crystallizer for a token with no acceptable catalogue
    /// match. Never written back to the catalogue.
    Ephemeral {
        source: TokenTag,
        definition: String,
    },
}

/// A typed narrative building block.
///
/// Catalogue atoms are immutable data loaded once per process; ephemeral
/// atoms share the same shape so every downstream stage treats them alike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryAtom {
    pub id: AtomId,
    pub category: AtomCategory,
    pub label: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// 0.0 = common, 1.0 = rare.
    #[serde(default = "default_rarity")]
    pub rarity: f32,
    #[serde(default)]
    pub origin: AtomOrigin,
}

fn default_rarity() -> f32 {
    0.5
}

impl StoryAtom {
    pub fn is_ephemeral(&self) -> bool {
        matches!(self.origin, AtomOrigin::Ephemeral { .. })
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Returns true if the two atoms carry at least one tag in common.
    pub fn shares_tag_with(&self, other: &StoryAtom) -> bool {
        self.tags.iter().any(|t| other.has_tag(t))
    }

    /// Synthesized definition for ephemeral atoms.
    pub fn definition(&self) -> Option<&str> {
        match &self.origin {
            AtomOrigin::Ephemeral { definition, .. } => Some(definition),
            AtomOrigin::Catalogue => None,
        }
    }
}

/// Pairwise affinity between two catalogue atoms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Affinity {
    pub a: AtomId,
    pub b: AtomId,
    /// -1.0 (repulsion) to 1.0 (strong affinity).
    pub strength: f32,
}

impl Affinity {
    /// Canonical sorted key for lookup.
    pub fn key(&self) -> (AtomId, AtomId) {
        if self.a <= self.b {
            (self.a, self.b)
        } else {
            (self.b, self.a)
        }
    }
}
