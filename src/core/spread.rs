//! Tarot spread generator: fixed slot templates filled left-to-right by
//! weighted sampling from the atom pool.

use rustc_hash::FxHashSet;
use std::sync::Arc;

use crate::core::catalogue::AtomCatalogue;
use crate::core::crystallizer::AtomPool;
use crate::core::seed::SeedStream;
use crate::schema::atom::AtomCategory::{Agent, Location, Object, Quality, Tension, Trigger};
use crate::schema::atom::{AtomCategory, AtomId, StoryAtom};
use crate::schema::skeleton::{SkeletonSlot, SlotViolation, SpreadType, Strategy, StorySkeleton};

/// Extra semantic condition on a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotConstraint {
    /// The atom must share no tag with the atom placed in the named slot.
    DiffersFrom(&'static str),
}

/// One position of a spread template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSpec {
    pub name: &'static str,
    pub category: AtomCategory,
    pub constraint: Option<SlotConstraint>,
    pub description: &'static str,
}

const fn slot(name: &'static str, category: AtomCategory, description: &'static str) -> SlotSpec {
    SlotSpec {
        name,
        category,
        constraint: None,
        description,
    }
}

const fn differs(
    name: &'static str,
    category: AtomCategory,
    other: &'static str,
    description: &'static str,
) -> SlotSpec {
    SlotSpec {
        name,
        category,
        constraint: Some(SlotConstraint::DiffersFrom(other)),
        description,
    }
}

const HERO_JOURNEY: &[SlotSpec] = &[
    slot("hero", Agent, "The one who must leave and return changed"),
    slot("call to adventure", Trigger, "What breaks the ordinary world"),
    slot("threshold", Location, "Where the known world ends"),
    differs("ordeal", Tension, "call to adventure", "The test that nearly breaks the hero"),
    slot("reward", Object, "What is carried home"),
];

const CONFLICT_DIAMOND: &[SlotSpec] = &[
    slot("protagonist", Agent, "Who wants something"),
    differs("antagonist", Agent, "protagonist", "Who stands in the way"),
    slot("contested prize", Object, "What both sides reach for"),
    slot("battleground", Location, "Where the struggle plays out"),
    slot("inciting incident", Trigger, "What sets the sides moving"),
    slot("core conflict", Tension, "The pressure beneath it all"),
];

const THREE_ACT: &[SlotSpec] = &[
    slot("setup", Location, "The world before"),
    slot("protagonist", Agent, "Who the story follows"),
    slot("catalyst", Trigger, "What ends the first act"),
    slot("confrontation", Tension, "The long middle struggle"),
    slot("resolution", Quality, "The feel of the ending"),
];

const CELTIC_CROSS: &[SlotSpec] = &[
    slot("present", Agent, "The heart of the matter"),
    slot("challenge", Tension, "What crosses the present"),
    slot("past", Location, "What lies behind"),
    slot("future", Trigger, "What approaches"),
    slot("above", Quality, "The conscious aim"),
    slot("below", Object, "The hidden foundation"),
    differs("outcome", Quality, "above", "Where it all leads"),
];

const MYSTERY_BOX: &[SlotSpec] = &[
    slot("investigator", Agent, "Who asks the questions"),
    slot("scene", Location, "Where it happened"),
    slot("clue", Object, "What points the way"),
    differs("red herring", Object, "clue", "What points the wrong way"),
    slot("hidden motive", Tension, "Why it happened"),
    slot("revelation", Trigger, "What finally opens the box"),
];

/// Slot layout of a spread.
pub fn template(spread: SpreadType) -> &'static [SlotSpec] {
    match spread {
        SpreadType::HeroJourney => HERO_JOURNEY,
        SpreadType::ConflictDiamond => CONFLICT_DIAMOND,
        SpreadType::ThreeAct => THREE_ACT,
        SpreadType::CelticCross => CELTIC_CROSS,
        SpreadType::MysteryBox => MYSTERY_BOX,
    }
}

/// Re-evaluate every `DiffersFrom` constraint of a tarot skeleton against
/// the atoms now in place, setting or clearing `ConstraintUnmet`. Slots
/// flagged `CategoryFallback` or `Unfilled` keep their flag.
pub fn recheck_constraints(skeleton: &mut StorySkeleton) {
    let Strategy::Tarot(spread) = skeleton.strategy else {
        return;
    };
    for spec in template(spread) {
        let Some(SlotConstraint::DiffersFrom(other)) = spec.constraint else {
            continue;
        };
        let partner = skeleton.slot(other).and_then(|s| s.atom.clone());
        let Some(slot) = skeleton.slots.iter_mut().find(|s| s.name == spec.name) else {
            continue;
        };
        if !matches!(slot.violation, None | Some(SlotViolation::ConstraintUnmet)) {
            continue;
        }
        let Some(atom) = &slot.atom else { continue };
        let clash = partner.is_some_and(|p| atom.shares_tag_with(&p));
        slot.violation = clash.then_some(SlotViolation::ConstraintUnmet);
    }
}

/// Fills slots one at a time from a shared pool, without replacement.
///
/// Fallback order per slot: category and constraint match, category match
/// (`ConstraintUnmet`), any unused atom (`CategoryFallback`), nothing
/// (`Unfilled`).
pub(crate) struct SlotFiller<'a> {
    pool: &'a AtomPool,
    catalogue: &'a AtomCatalogue,
    used: FxHashSet<AtomId>,
    placed: Vec<Arc<StoryAtom>>,
}

impl<'a> SlotFiller<'a> {
    pub(crate) fn new(pool: &'a AtomPool, catalogue: &'a AtomCatalogue) -> Self {
        Self {
            pool,
            catalogue,
            used: FxHashSet::default(),
            placed: Vec::new(),
        }
    }

    /// Treat `atom` as already placed.
    pub(crate) fn reserve(&mut self, atom: &Arc<StoryAtom>) {
        if self.used.insert(atom.id) {
            self.placed.push(Arc::clone(atom));
        }
    }

    /// `max(1 - rarity, 0.05) * max(1 + affinity to placed atoms, 0.01)`.
    fn weight(&self, atom: &StoryAtom) -> f32 {
        let affinity: f32 = self
            .placed
            .iter()
            .map(|p| self.catalogue.affinity(atom.id, p.id))
            .sum();
        (1.0 - atom.rarity).max(0.05) * (1.0 + affinity).max(0.01)
    }

    fn pick(&self, candidates: &[&'a Arc<StoryAtom>], stream: &mut SeedStream) -> Option<&'a Arc<StoryAtom>> {
        if candidates.is_empty() {
            return None;
        }
        let weights: Vec<f32> = candidates.iter().map(|a| self.weight(a)).collect();
        let i = stream.pick_weighted(&weights).unwrap_or(0);
        Some(candidates[i])
    }

    pub(crate) fn fill(
        &mut self,
        name: &str,
        category: AtomCategory,
        stream: &mut SeedStream,
        accept: impl Fn(&StoryAtom) -> bool,
    ) -> SkeletonSlot {
        let available: Vec<&'a Arc<StoryAtom>> = self
            .pool
            .all()
            .iter()
            .filter(|a| !self.used.contains(&a.id))
            .collect();
        let in_category: Vec<&'a Arc<StoryAtom>> = available
            .iter()
            .copied()
            .filter(|a| a.category == category)
            .collect();
        let ideal: Vec<&'a Arc<StoryAtom>> = in_category
            .iter()
            .copied()
            .filter(|a| accept(a))
            .collect();

        let (atom, violation) = if let Some(atom) = self.pick(&ideal, stream) {
            (atom, None)
        } else if let Some(atom) = self.pick(&in_category, stream) {
            (atom, Some(SlotViolation::ConstraintUnmet))
        } else if let Some(atom) = self.pick(&available, stream) {
            (atom, Some(SlotViolation::CategoryFallback))
        } else {
            tracing::trace!(slot = name, category = category.tag(), "no atom left for slot");
            return SkeletonSlot::empty(name, Some(category));
        };

        self.reserve(atom);
        SkeletonSlot {
            name: name.to_string(),
            required: Some(category),
            atom: Some(Arc::clone(atom)),
            violation,
        }
    }
}

/// Builds tarot-spread skeletons from a read-only atom pool.
pub struct TarotSpread<'a> {
    pool: &'a AtomPool,
    catalogue: &'a AtomCatalogue,
}

impl<'a> TarotSpread<'a> {
    pub fn new(pool: &'a AtomPool, catalogue: &'a AtomCatalogue) -> Self {
        Self { pool, catalogue }
    }

    pub fn generate(&self, spread: SpreadType, stream: &mut SeedStream) -> StorySkeleton {
        let mut filler = SlotFiller::new(self.pool, self.catalogue);
        let mut slots: Vec<SkeletonSlot> = Vec::new();

        for spec in template(spread) {
            let other = match spec.constraint {
                Some(SlotConstraint::DiffersFrom(name)) => slots
                    .iter()
                    .find(|s| s.name == name)
                    .and_then(|s| s.atom.clone()),
                None => None,
            };
            let slot = filler.fill(spec.name, spec.category, stream, |atom| match &other {
                Some(other) => !atom.shares_tag_with(other),
                None => true,
            });
            slots.push(slot);
        }

        let skeleton = StorySkeleton::new(Strategy::Tarot(spread), slots);
        tracing::trace!(
            spread = spread.name(),
            filled = skeleton.filled(),
            violations = skeleton.violations(),
            "tarot skeleton"
        );
        skeleton
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::seed::SeedManager;
    use crate::schema::atom::AtomOrigin;

    fn atom(id: u64, category: AtomCategory, tags: &[&str]) -> StoryAtom {
        StoryAtom {
            id: AtomId(id),
            category,
            label: format!("{} {id}", category.tag()),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            rarity: 0.3,
            origin: AtomOrigin::Catalogue,
        }
    }

    fn full_catalogue() -> AtomCatalogue {
        let mut atoms = Vec::new();
        let mut id = 1;
        for category in AtomCategory::ALL {
            for k in 0..4 {
                atoms.push(atom(id, category, &[&format!("{}{k}", category.tag())]));
                id += 1;
            }
        }
        AtomCatalogue::from_atoms(atoms).unwrap()
    }

    fn pool_of(catalogue: &AtomCatalogue) -> AtomPool {
        AtomPool::from_atoms(catalogue.atoms().iter().cloned())
    }

    #[test]
    fn template_sizes() {
        assert_eq!(template(SpreadType::HeroJourney).len(), 5);
        assert_eq!(template(SpreadType::ConflictDiamond).len(), 6);
        assert_eq!(template(SpreadType::ThreeAct).len(), 5);
        assert_eq!(template(SpreadType::CelticCross).len(), 7);
        assert_eq!(template(SpreadType::MysteryBox).len(), 6);
    }

    #[test]
    fn constraints_reference_earlier_slots() {
        for spread in SpreadType::ALL {
            let slots = template(spread);
            for (i, spec) in slots.iter().enumerate() {
                if let Some(SlotConstraint::DiffersFrom(other)) = spec.constraint {
                    assert!(slots[..i].iter().any(|s| s.name == other), "{other} in {spread:?}");
                }
            }
        }
    }

    #[test]
    fn fills_every_slot_with_matching_category() {
        let catalogue = full_catalogue();
        let pool = pool_of(&catalogue);
        let gen = TarotSpread::new(&pool, &catalogue);
        for spread in SpreadType::ALL {
            let mut stream = SeedManager::new(3).derive(&["tarot", spread.name()]);
            let sk = gen.generate(spread, &mut stream);
            assert!(sk.is_complete());
            for s in &sk.slots {
                let atom = s.atom.as_ref().unwrap();
                assert_eq!(Some(atom.category), s.required);
            }
        }
    }

    #[test]
    fn no_atom_repeats_within_skeleton() {
        let catalogue = full_catalogue();
        let pool = pool_of(&catalogue);
        let gen = TarotSpread::new(&pool, &catalogue);
        let mut stream = SeedManager::new(4).derive(&["tarot"]);
        let sk = gen.generate(SpreadType::CelticCross, &mut stream);
        let ids: FxHashSet<AtomId> = sk.atom_ids().into_iter().collect();
        assert_eq!(ids.len(), sk.filled());
    }

    #[test]
    fn differs_from_is_respected_when_possible() {
        let catalogue = full_catalogue();
        let pool = pool_of(&catalogue);
        let gen = TarotSpread::new(&pool, &catalogue);
        for seed in 0..20 {
            let mut stream = SeedManager::new(seed).derive(&["tarot"]);
            let sk = gen.generate(SpreadType::ConflictDiamond, &mut stream);
            let pro = sk.slot("protagonist").unwrap().atom.clone().unwrap();
            let ant = sk.slot("antagonist").unwrap().atom.clone().unwrap();
            assert!(!pro.shares_tag_with(&ant));
            assert_eq!(sk.slot("antagonist").unwrap().violation, None);
        }
    }

    #[test]
    fn exhausted_category_falls_back() {
        // a single agent: the antagonist cannot be an agent
        let catalogue = AtomCatalogue::from_atoms(vec![
            atom(1, Agent, &["a"]),
            atom(2, Object, &["b"]),
            atom(3, Location, &["c"]),
        ])
        .unwrap();
        let pool = pool_of(&catalogue);
        let gen = TarotSpread::new(&pool, &catalogue);
        let mut stream = SeedManager::new(1).derive(&["tarot"]);
        let sk = gen.generate(SpreadType::ConflictDiamond, &mut stream);

        let antagonist = sk.slot("antagonist").unwrap();
        assert_eq!(antagonist.violation, Some(SlotViolation::CategoryFallback));
        assert_ne!(antagonist.atom.as_ref().unwrap().category, Agent);
        // three atoms, six slots
        assert_eq!(sk.filled(), 3);
        assert_eq!(
            sk.slots.iter().filter(|s| s.violation == Some(SlotViolation::Unfilled)).count(),
            3
        );
    }

    #[test]
    fn unmet_constraint_is_marked() {
        // both agents share a tag, so the antagonist constraint cannot hold
        let catalogue = AtomCatalogue::from_atoms(vec![
            atom(1, Agent, &["shared"]),
            atom(2, Agent, &["shared"]),
        ])
        .unwrap();
        let pool = pool_of(&catalogue);
        let gen = TarotSpread::new(&pool, &catalogue);
        let mut stream = SeedManager::new(1).derive(&["tarot"]);
        let sk = gen.generate(SpreadType::ConflictDiamond, &mut stream);
        assert_eq!(
            sk.slot("antagonist").unwrap().violation,
            Some(SlotViolation::ConstraintUnmet)
        );
    }

    #[test]
    fn recheck_sets_and_clears_constraint_flags() {
        let x1 = Arc::new(atom(1, Agent, &["x"]));
        let x2 = Arc::new(atom(2, Agent, &["x"]));
        let y = Arc::new(atom(3, Agent, &["y"]));
        let mut sk = StorySkeleton::new(
            Strategy::Tarot(SpreadType::ConflictDiamond),
            vec![
                SkeletonSlot::filled("protagonist", Some(Agent), Arc::clone(&x1)),
                SkeletonSlot::filled("antagonist", Some(Agent), x2),
            ],
        );
        recheck_constraints(&mut sk);
        assert_eq!(
            sk.slot("antagonist").unwrap().violation,
            Some(SlotViolation::ConstraintUnmet)
        );

        sk.slots[0].atom = Some(y);
        recheck_constraints(&mut sk);
        assert_eq!(sk.slot("antagonist").unwrap().violation, None);

        // fallback flags are not the constraint's to clear
        sk.slots[0].atom = Some(x1);
        sk.slots[1].violation = Some(SlotViolation::CategoryFallback);
        recheck_constraints(&mut sk);
        assert_eq!(
            sk.slot("antagonist").unwrap().violation,
            Some(SlotViolation::CategoryFallback)
        );
    }

    #[test]
    fn recheck_ignores_markov_skeletons() {
        let x1 = Arc::new(atom(1, Agent, &["x"]));
        let x2 = Arc::new(atom(2, Agent, &["x"]));
        let mut sk = StorySkeleton::new(
            Strategy::Markov,
            vec![
                SkeletonSlot::filled("protagonist", Some(Agent), x1),
                SkeletonSlot::filled("antagonist", Some(Agent), x2),
            ],
        );
        let before = sk.clone();
        recheck_constraints(&mut sk);
        assert_eq!(sk, before);
    }

    #[test]
    fn empty_pool_yields_unfilled_skeleton() {
        let catalogue = AtomCatalogue::default();
        let pool = AtomPool::new();
        let gen = TarotSpread::new(&pool, &catalogue);
        let mut stream = SeedManager::new(1).derive(&["tarot"]);
        let sk = gen.generate(SpreadType::HeroJourney, &mut stream);
        assert_eq!(sk.slots.len(), 5);
        assert_eq!(sk.filled(), 0);
    }

    #[test]
    fn deterministic() {
        let catalogue = full_catalogue();
        let pool = pool_of(&catalogue);
        let gen = TarotSpread::new(&pool, &catalogue);
        let a = gen.generate(SpreadType::MysteryBox, &mut SeedManager::new(8).derive(&["t"]));
        let b = gen.generate(SpreadType::MysteryBox, &mut SeedManager::new(8).derive(&["t"]));
        assert_eq!(a, b);
    }
}
