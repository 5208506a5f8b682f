//! Coherence scoring: a fixed, weighted rule set over a skeleton's slots,
//! plus optional world-rule invariants that subtract penalties.
//!
//! Catalogue affinity and Markov beat flow only count when the scorer holds
//! the catalogue or beat table and the skeleton gives them something to
//! measure; otherwise their weight drops out of the normalization.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::core::catalogue::AtomCatalogue;
use crate::core::config::ConfigError;
use crate::core::markov::{BeatTable, BeatType};
use crate::schema::atom::{AtomCategory, AtomId, StoryAtom};
use crate::schema::skeleton::{SlotViolation, Strategy, StorySkeleton};

/// Relative weight of each rule outcome. Normalized by the sum of the
/// weights whose rules apply to the skeleton at hand.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub fill: f32,
    pub completeness: f32,
    pub adjacency: f32,
    pub uniqueness: f32,
    pub soft_violation: f32,
    pub thematic: f32,
    pub affinity: f32,
    pub beat_flow: f32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            fill: 0.25,
            completeness: 0.20,
            adjacency: 0.15,
            uniqueness: 0.15,
            soft_violation: 0.15,
            thematic: 0.10,
            affinity: 0.10,
            beat_flow: 0.10,
        }
    }
}

impl ScoreWeights {
    pub fn total(&self) -> f32 {
        self.as_array().iter().map(|(_, w)| w).sum()
    }

    pub(crate) fn as_array(&self) -> [(&'static str, f32); 8] {
        [
            ("fill", self.fill),
            ("completeness", self.completeness),
            ("adjacency", self.adjacency),
            ("uniqueness", self.uniqueness),
            ("soft_violation", self.soft_violation),
            ("thematic", self.thematic),
            ("affinity", self.affinity),
            ("beat_flow", self.beat_flow),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Hard,
    Soft,
}

impl Severity {
    pub fn penalty(&self) -> f32 {
        match self {
            Self::Hard => 0.5,
            Self::Soft => 0.2,
        }
    }
}

/// A checkable condition over the tags and slots of one skeleton.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Invariant {
    /// Some placed atom carries `tag`.
    RequiresTag(String),
    /// Atoms tagged `a` and atoms tagged `b` never appear together.
    ForbidsCombo(String, String),
    /// A slot with this name exists and is filled.
    RequiresBeat(String),
    /// If any atom carries `if_tag`, some atom carries `then_tag`.
    Conditional { if_tag: String, then_tag: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldRule {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub invariant: Invariant,
    #[serde(default = "default_severity")]
    pub severity: Severity,
}

fn default_severity() -> Severity {
    Severity::Hard
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleViolation {
    pub rule: String,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub violations: Vec<RuleViolation>,
}

impl ValidationReport {
    /// No hard invariant was broken.
    pub fn is_valid(&self) -> bool {
        self.violations.iter().all(|v| v.severity != Severity::Hard)
    }

    pub fn penalty(&self) -> f32 {
        self.violations.iter().map(|v| v.severity.penalty()).sum()
    }
}

/// World rules loaded from RON: `(rules: [...])`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldRules {
    #[serde(default)]
    pub rules: Vec<WorldRule>,
}

impl WorldRules {
    pub fn parse_ron(input: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(input)?)
    }

    pub fn load_from_ron(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn validate(&self, skeleton: &StorySkeleton) -> ValidationReport {
        let tags: FxHashSet<&str> = skeleton
            .atoms()
            .flat_map(|a| a.tags.iter().map(String::as_str))
            .collect();

        let violations = self
            .rules
            .iter()
            .filter_map(|rule| {
                check(&rule.invariant, skeleton, &tags).map(|message| RuleViolation {
                    rule: rule.name.clone(),
                    severity: rule.severity,
                    message,
                })
            })
            .collect();
        ValidationReport { violations }
    }
}

fn check(invariant: &Invariant, skeleton: &StorySkeleton, tags: &FxHashSet<&str>) -> Option<String> {
    match invariant {
        Invariant::RequiresTag(tag) => {
            (!tags.contains(tag.as_str())).then(|| format!("required tag '{tag}' missing"))
        }
        Invariant::ForbidsCombo(a, b) => (tags.contains(a.as_str()) && tags.contains(b.as_str()))
            .then(|| format!("forbidden combination: '{a}' and '{b}' coexist")),
        Invariant::RequiresBeat(name) => {
            let present = skeleton.slots.iter().any(|s| s.name == *name && s.is_filled());
            (!present).then(|| format!("required beat '{name}' missing"))
        }
        Invariant::Conditional { if_tag, then_tag } => {
            (tags.contains(if_tag.as_str()) && !tags.contains(then_tag.as_str()))
                .then(|| format!("tag '{if_tag}' present but required tag '{then_tag}' missing"))
        }
    }
}

/// Per-rule outcomes in `[0, 1]`, before weighting. `None` marks a rule
/// that did not apply and was left out of the total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub fill: f32,
    pub completeness: f32,
    pub adjacency: f32,
    pub uniqueness: f32,
    pub soft_violation: f32,
    pub thematic: f32,
    pub affinity: Option<f32>,
    pub beat_flow: Option<f32>,
    pub world_penalty: f32,
    pub total: f32,
}

/// Pure scoring function over skeletons. Identical skeletons always get
/// identical scores.
#[derive(Debug, Clone, Default)]
pub struct CoherenceScorer {
    weights: ScoreWeights,
    rules: WorldRules,
    catalogue: Option<Arc<AtomCatalogue>>,
    beats: Option<BeatTable>,
}

impl CoherenceScorer {
    pub fn new(weights: ScoreWeights) -> Self {
        Self {
            weights,
            ..Self::default()
        }
    }

    pub fn with_world_rules(mut self, rules: WorldRules) -> Self {
        self.rules = rules;
        self
    }

    /// Enables the affinity rule.
    pub fn with_catalogue(mut self, catalogue: Arc<AtomCatalogue>) -> Self {
        self.catalogue = Some(catalogue);
        self
    }

    /// Enables the beat-flow rule for Markov skeletons.
    pub fn with_beat_table(mut self, table: BeatTable) -> Self {
        self.beats = Some(table);
        self
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    pub fn world_rules(&self) -> &WorldRules {
        &self.rules
    }

    pub fn score(&self, skeleton: &StorySkeleton) -> f32 {
        self.breakdown(skeleton).total
    }

    /// A new skeleton equal to `skeleton` with its score set.
    pub fn score_skeleton(&self, skeleton: StorySkeleton) -> StorySkeleton {
        let score = self.score(&skeleton);
        skeleton.with_score(score)
    }

    pub fn breakdown(&self, skeleton: &StorySkeleton) -> ScoreBreakdown {
        let len = skeleton.slots.len();
        let filled = skeleton.filled();
        let fill = if len == 0 { 0.0 } else { filled as f32 / len as f32 };

        let completeness = if len > 0 && filled == len { 1.0 } else { 0.0 };
        let adjacency = fill * (1.0 - ratio(adjacency_violations(skeleton), len.saturating_sub(1)));
        let uniqueness = fill * (1.0 - ratio(uniqueness_violations(skeleton), filled));
        let soft = skeleton
            .slots
            .iter()
            .filter(|s| {
                matches!(
                    s.violation,
                    Some(SlotViolation::CategoryFallback) | Some(SlotViolation::ConstraintUnmet)
                )
            })
            .count();
        let soft_violation = fill * (1.0 - ratio(soft as f32, len));
        let thematic = thematic_overlap(skeleton);
        let affinity = self.affinity(skeleton);
        let beat_flow = self.beat_flow(skeleton);

        let w = &self.weights;
        let terms = [
            (w.fill, Some(fill)),
            (w.completeness, Some(completeness)),
            (w.adjacency, Some(adjacency)),
            (w.uniqueness, Some(uniqueness)),
            (w.soft_violation, Some(soft_violation)),
            (w.thematic, Some(thematic)),
            (w.affinity, affinity),
            (w.beat_flow, beat_flow),
        ];
        let (sum, total_weight) = terms
            .iter()
            .filter_map(|(weight, value)| value.map(|v| (*weight, v)))
            .fold((0.0f32, 0.0f32), |(sum, total), (weight, v)| (sum + weight * v, total + weight));
        let weighted = if total_weight > 0.0 { sum / total_weight } else { 0.0 };

        let world_penalty = if self.rules.is_empty() {
            0.0
        } else {
            self.rules.validate(skeleton).penalty()
        };

        ScoreBreakdown {
            fill,
            completeness,
            adjacency,
            uniqueness,
            soft_violation,
            thematic,
            affinity,
            beat_flow,
            world_penalty,
            total: (weighted - world_penalty).clamp(0.0, 1.0),
        }
    }

    /// Mean catalogue affinity over all pairs of placed atoms, mapped from
    /// `[-1, 1]` onto `[0, 1]`. Atoms unknown to the catalogue pair at 0.
    fn affinity(&self, skeleton: &StorySkeleton) -> Option<f32> {
        let catalogue = self.catalogue.as_ref()?;
        let atoms: Vec<&Arc<StoryAtom>> = skeleton.atoms().collect();
        if atoms.len() < 2 {
            return None;
        }
        let mut total = 0.0;
        let mut pairs = 0;
        for (i, a) in atoms.iter().enumerate() {
            for b in &atoms[i + 1..] {
                total += catalogue.affinity(a.id, b.id);
                pairs += 1;
            }
        }
        Some((0.5 + 0.5 * total / pairs as f32).clamp(0.0, 1.0))
    }

    /// Mean transition probability between consecutive beats of a Markov
    /// skeleton, read back from its slot names.
    fn beat_flow(&self, skeleton: &StorySkeleton) -> Option<f32> {
        let table = self.beats.as_ref()?;
        if skeleton.strategy != Strategy::Markov {
            return None;
        }
        let beats = skeleton
            .slots
            .iter()
            .map(|slot| BeatType::from_label(&slot.name))
            .collect::<Option<Vec<BeatType>>>()?;
        table.flow(&beats)
    }
}

fn ratio(violations: f32, over: usize) -> f32 {
    if over == 0 {
        0.0
    } else {
        (violations / over as f32).min(1.0)
    }
}

/// Consecutive filled slots holding two Tension atoms or the same atom.
fn adjacency_violations(skeleton: &StorySkeleton) -> f32 {
    skeleton
        .slots
        .windows(2)
        .filter(|pair| match (&pair[0].atom, &pair[1].atom) {
            (Some(a), Some(b)) => {
                a.id == b.id || (a.category == AtomCategory::Tension && b.category == AtomCategory::Tension)
            }
            _ => false,
        })
        .count() as f32
}

/// An atom reused under a different required category costs 1, under the
/// same category 0.5.
fn uniqueness_violations(skeleton: &StorySkeleton) -> f32 {
    let mut first_seen: FxHashMap<AtomId, Option<AtomCategory>> = FxHashMap::default();
    let mut violations = 0.0;
    for slot in &skeleton.slots {
        let Some(atom) = &slot.atom else { continue };
        match first_seen.get(&atom.id) {
            Some(required) if *required == slot.required => violations += 0.5,
            Some(_) => violations += 1.0,
            None => {
                first_seen.insert(atom.id, slot.required);
            }
        }
    }
    violations
}

/// Share of placed atoms that share at least one tag with another placed atom.
fn thematic_overlap(skeleton: &StorySkeleton) -> f32 {
    let atoms: Vec<_> = skeleton.atoms().collect();
    if atoms.len() < 2 {
        return 0.0;
    }
    let linked = atoms
        .iter()
        .enumerate()
        .filter(|(i, a)| {
            atoms
                .iter()
                .enumerate()
                .any(|(j, b)| *i != j && a.id != b.id && a.shares_tag_with(b))
        })
        .count();
    linked as f32 / atoms.len() as f32
}
