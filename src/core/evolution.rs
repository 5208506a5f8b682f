//! Evolutionary refinement of a skeleton population.
//!
//! Each generation keeps the elite, breeds offspring by slot-wise crossover
//! and bounded mutation, and injects a few fresh "wild card" skeletons. The
//! population size never changes and the best score never drops while at
//! least one elite is retained.

use rand::seq::SliceRandom;
use rand::Rng;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::core::catalogue::AtomCatalogue;
use crate::core::crystallizer::AtomPool;
use crate::core::scorer::CoherenceScorer;
use crate::core::seed::SeedStream;
use crate::core::spread::{recheck_constraints, template, SlotConstraint, SlotFiller};
use crate::schema::atom::AtomId;
use crate::schema::skeleton::{Population, Strategy, StorySkeleton};

/// How parents are drawn from the current population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionMethod {
    /// Best of `size` uniformly drawn members.
    Tournament { size: usize },
    /// Fitness-proportionate.
    Roulette,
    /// Proportionate to reversed rank.
    Rank,
}

impl Default for SelectionMethod {
    fn default() -> Self {
        Self::Tournament { size: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    pub enabled: bool,
    pub generations: u32,
    /// Lower bound on the evolved population. A larger `skeleton_count`
    /// wins: every generated skeleton enters generation 0 and the
    /// population keeps that size.
    pub population_size: usize,
    /// At least one when enabled. Elites are copied into the next generation
    /// unchanged.
    pub elite_count: usize,
    pub mutation_rate: f32,
    pub crossover_rate: f32,
    pub wild_card_rate: f32,
    pub max_mutated_slots: usize,
    pub selection: SelectionMethod,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            generations: 10,
            population_size: 20,
            elite_count: 2,
            mutation_rate: 0.1,
            crossover_rate: 0.7,
            wild_card_rate: 0.05,
            max_mutated_slots: 2,
            selection: SelectionMethod::default(),
        }
    }
}

/// Supplies entirely fresh skeletons for wild-card injection.
pub trait SkeletonSource {
    fn fresh(&self, stream: &mut SeedStream) -> StorySkeleton;
}

/// Summary of a run, without the population itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvolutionReport {
    pub best_history: Vec<f32>,
    pub generations_run: u32,
    pub mean_novelty: f32,
}

#[derive(Debug, Clone)]
pub struct EvolutionOutcome {
    /// Final generation, fully scored.
    pub population: Population,
    /// Best score of the initial population, then of each generation.
    pub best_history: Vec<f32>,
    pub generations_run: u32,
    pub mean_novelty: f32,
}

impl EvolutionOutcome {
    pub fn report(&self) -> EvolutionReport {
        EvolutionReport {
            best_history: self.best_history.clone(),
            generations_run: self.generations_run,
            mean_novelty: self.mean_novelty,
        }
    }
}

/// Jaccard distance between the atom-id sets of two skeletons.
/// Two empty skeletons are at distance 0.
pub fn jaccard_distance(a: &StorySkeleton, b: &StorySkeleton) -> f32 {
    let a: FxHashSet<AtomId> = a.atom_ids().into_iter().collect();
    let b: FxHashSet<AtomId> = b.atom_ids().into_iter().collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    let shared = a.intersection(&b).count();
    1.0 - shared as f32 / union as f32
}

/// Mean Jaccard distance from `skeleton` to every other member of
/// `population`. Members identical by reference are skipped.
pub fn novelty(skeleton: &StorySkeleton, population: &[StorySkeleton]) -> f32 {
    let others: Vec<&StorySkeleton> = population
        .iter()
        .filter(|other| !std::ptr::eq(*other, skeleton))
        .collect();
    if others.is_empty() {
        return 0.0;
    }
    others.iter().map(|o| jaccard_distance(skeleton, o)).sum::<f32>() / others.len() as f32
}

fn mean_novelty(population: &[StorySkeleton]) -> f32 {
    if population.len() < 2 {
        return 0.0;
    }
    population.iter().map(|s| novelty(s, population)).sum::<f32>() / population.len() as f32
}

fn fitness(skeleton: &StorySkeleton) -> f32 {
    skeleton.score.unwrap_or(0.0)
}

fn best_score(population: &[StorySkeleton]) -> f32 {
    population.iter().map(fitness).fold(0.0, f32::max)
}

/// Indices sorted by score descending; ties keep population order.
fn ranked_indices(population: &[StorySkeleton]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..population.len()).collect();
    order.sort_by(|&a, &b| fitness(&population[b]).total_cmp(&fitness(&population[a])));
    order
}

pub struct Evolver<'a> {
    config: &'a EvolutionConfig,
    scorer: &'a CoherenceScorer,
    pool: &'a AtomPool,
    catalogue: &'a AtomCatalogue,
    source: Option<&'a dyn SkeletonSource>,
}

impl<'a> Evolver<'a> {
    pub fn new(
        config: &'a EvolutionConfig,
        scorer: &'a CoherenceScorer,
        pool: &'a AtomPool,
        catalogue: &'a AtomCatalogue,
    ) -> Self {
        Self {
            config,
            scorer,
            pool,
            catalogue,
            source: None,
        }
    }

    pub fn wild_cards(mut self, source: &'a dyn SkeletonSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Run the configured number of generations. Generation `g` draws from
    /// the child stream `generation_{g}`.
    pub fn evolve(&self, population: Population, stream: &SeedStream) -> EvolutionOutcome {
        let mut population: Population = population
            .into_iter()
            .map(|s| if s.score.is_some() { s } else { self.scorer.score_skeleton(s) })
            .collect();
        let mut best_history = vec![best_score(&population)];

        if self.config.generations == 0 || population.is_empty() {
            return EvolutionOutcome {
                mean_novelty: mean_novelty(&population),
                population,
                best_history,
                generations_run: 0,
            };
        }

        let size = population.len();
        for generation in 0..self.config.generations {
            let mut gen_stream = stream.child(&format!("generation_{generation}"));
            population = self.step(&population, generation + 1, size, &mut gen_stream);
            best_history.push(best_score(&population));
            tracing::debug!(
                generation = generation + 1,
                best = best_history[best_history.len() - 1],
                "evolved generation"
            );
        }

        EvolutionOutcome {
            mean_novelty: mean_novelty(&population),
            population,
            best_history,
            generations_run: self.config.generations,
        }
    }

    fn step(&self, current: &[StorySkeleton], generation: u32, size: usize, stream: &mut SeedStream) -> Population {
        let order = ranked_indices(current);
        let elites = self.config.elite_count.min(size);
        let wild = match self.source {
            Some(_) => ((size as f32 * self.config.wild_card_rate).round() as usize).min(size - elites),
            None => 0,
        };

        let mut next: Population = order[..elites].iter().map(|&i| current[i].clone()).collect();

        while next.len() < size - wild {
            let a = &current[self.select(current, &order, stream)];
            let b = &current[self.select(current, &order, stream)];
            let child = if stream.gen::<f32>() < self.config.crossover_rate {
                crossover(a, b, stream)
            } else {
                a.clone()
            };
            let child = self.mutate(child, stream).with_generation(generation);
            next.push(self.scorer.score_skeleton(child));
        }

        if let Some(source) = self.source {
            for w in 0..wild {
                let mut wild_stream = stream.child(&format!("wild_{w}"));
                let fresh = source.fresh(&mut wild_stream).with_generation(generation);
                next.push(self.scorer.score_skeleton(fresh));
            }
        }
        next
    }

    fn select(&self, population: &[StorySkeleton], order: &[usize], stream: &mut SeedStream) -> usize {
        let n = population.len();
        match self.config.selection {
            SelectionMethod::Tournament { size } => {
                let mut best = stream.gen_range(0..n);
                for _ in 1..size.max(1) {
                    let contender = stream.gen_range(0..n);
                    let better = fitness(&population[contender]) > fitness(&population[best]);
                    if better || (fitness(&population[contender]) == fitness(&population[best]) && contender < best) {
                        best = contender;
                    }
                }
                best
            }
            SelectionMethod::Roulette => {
                let weights: Vec<f32> = population.iter().map(fitness).collect();
                stream
                    .pick_weighted(&weights)
                    .unwrap_or_else(|| stream.gen_range(0..n))
            }
            SelectionMethod::Rank => {
                let weights: Vec<f32> = (0..n).map(|r| (n - r) as f32).collect();
                let rank = stream.pick_weighted(&weights).unwrap_or(0);
                order[rank]
            }
        }
    }

    /// Re-roll up to `max_mutated_slots` slots, each with probability
    /// `mutation_rate`, from the slot's category pool. A slot that cannot be
    /// refilled keeps its atom. Constraints pointing at a re-rolled slot are
    /// re-evaluated afterwards.
    fn mutate(&self, mut skeleton: StorySkeleton, stream: &mut SeedStream) -> StorySkeleton {
        let mut positions: Vec<usize> = (0..skeleton.slots.len()).collect();
        positions.shuffle(stream);

        let mut mutated = 0;
        for i in positions {
            if mutated >= self.config.max_mutated_slots {
                break;
            }
            if stream.gen::<f32>() >= self.config.mutation_rate {
                continue;
            }
            let slot = &skeleton.slots[i];
            let Some(category) = slot.required.or_else(|| slot.atom.as_ref().map(|a| a.category)) else {
                continue;
            };

            let mut filler = SlotFiller::new(self.pool, self.catalogue);
            for (j, other) in skeleton.slots.iter().enumerate() {
                if j != i {
                    if let Some(atom) = &other.atom {
                        filler.reserve(atom);
                    }
                }
            }
            if let Some(atom) = &slot.atom {
                filler.reserve(atom);
            }

            let differs_from = match skeleton.strategy {
                Strategy::Tarot(spread) => template(spread)
                    .iter()
                    .find(|spec| spec.name == slot.name)
                    .and_then(|spec| match spec.constraint {
                        Some(SlotConstraint::DiffersFrom(other)) => skeleton.slot(other).and_then(|s| s.atom.clone()),
                        None => None,
                    }),
                Strategy::Markov => None,
            };

            let name = slot.name.clone();
            let replacement = filler.fill(&name, category, stream, |atom| match &differs_from {
                Some(other) => !atom.shares_tag_with(other),
                None => true,
            });
            if replacement.is_filled() {
                skeleton.slots[i] = replacement;
                mutated += 1;
            }
        }
        if mutated > 0 {
            recheck_constraints(&mut skeleton);
        }
        skeleton
    }
}

/// Slot-wise uniform recombination. Parents that are not template
/// compatible yield a copy of `a`. Slot constraints are re-evaluated on
/// the child since its pairings come from different parents.
pub fn crossover(a: &StorySkeleton, b: &StorySkeleton, stream: &mut SeedStream) -> StorySkeleton {
    if !a.is_compatible_with(b) {
        return a.clone();
    }
    let slots = a
        .slots
        .iter()
        .zip(&b.slots)
        .map(|(x, y)| if stream.gen_bool(0.5) { x.clone() } else { y.clone() })
        .collect();
    let mut child = StorySkeleton::new(a.strategy, slots);
    recheck_constraints(&mut child);
    child
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::seed::SeedManager;
    use crate::core::spread::TarotSpread;
    use crate::schema::atom::{AtomCategory, AtomOrigin, StoryAtom};
    use crate::schema::skeleton::{SkeletonSlot, SlotViolation, SpreadType};
    use std::sync::Arc;

    fn catalogue() -> AtomCatalogue {
        let mut atoms = Vec::new();
        let mut id = 1;
        for category in AtomCategory::ALL {
            for k in 0..5 {
                atoms.push(StoryAtom {
                    id: AtomId(id),
                    category,
                    label: format!("{} {k}", category.tag()),
                    tags: vec![format!("{}{k}", category.tag()), if k % 2 == 0 { "even" } else { "odd" }.to_string()],
                    rarity: 0.1 * k as f32,
                    origin: AtomOrigin::Catalogue,
                });
                id += 1;
            }
        }
        AtomCatalogue::from_atoms(atoms).unwrap()
    }

    struct Spreads<'a> {
        tarot: TarotSpread<'a>,
    }

    impl SkeletonSource for Spreads<'_> {
        fn fresh(&self, stream: &mut SeedStream) -> StorySkeleton {
            self.tarot.generate(SpreadType::ThreeAct, stream)
        }
    }

    fn initial(pool: &AtomPool, cat: &AtomCatalogue, n: usize) -> Population {
        let tarot = TarotSpread::new(pool, cat);
        let seeds = SeedManager::new(11);
        (0..n)
            .map(|i| {
                let spread = if i % 2 == 0 { SpreadType::ThreeAct } else { SpreadType::HeroJourney };
                tarot.generate(spread, &mut seeds.derive(&["skeleton", &i.to_string()]))
            })
            .collect()
    }

    #[test]
    fn zero_generations_returns_input() {
        let cat = catalogue();
        let pool = AtomPool::from_atoms(cat.atoms().iter().cloned());
        let scorer = CoherenceScorer::default();
        let config = EvolutionConfig {
            enabled: true,
            generations: 0,
            ..Default::default()
        };
        let scored: Population = initial(&pool, &cat, 6).into_iter().map(|s| scorer.score_skeleton(s)).collect();

        let outcome = Evolver::new(&config, &scorer, &pool, &cat).evolve(scored.clone(), &SeedManager::new(1).derive(&["evolution"]));
        assert_eq!(outcome.population, scored);
        assert_eq!(outcome.generations_run, 0);
        assert_eq!(outcome.best_history.len(), 1);
    }

    #[test]
    fn zero_generations_fills_missing_scores_only() {
        let cat = catalogue();
        let pool = AtomPool::from_atoms(cat.atoms().iter().cloned());
        let scorer = CoherenceScorer::default();
        let config = EvolutionConfig {
            generations: 0,
            ..Default::default()
        };
        let raw = initial(&pool, &cat, 4);
        let outcome = Evolver::new(&config, &scorer, &pool, &cat).evolve(raw.clone(), &SeedManager::new(1).derive(&["e"]));
        for (before, after) in raw.iter().zip(&outcome.population) {
            assert_eq!(before.slots, after.slots);
            assert_eq!(after.score, Some(scorer.score(before)));
            assert_eq!(after.generation, 0);
        }
    }

    #[test]
    fn size_constant_and_best_monotone() {
        let cat = catalogue();
        let pool = AtomPool::from_atoms(cat.atoms().iter().cloned());
        let scorer = CoherenceScorer::default();
        let config = EvolutionConfig {
            enabled: true,
            generations: 8,
            mutation_rate: 0.5,
            wild_card_rate: 0.2,
            ..Default::default()
        };
        let source = Spreads {
            tarot: TarotSpread::new(&pool, &cat),
        };
        let outcome = Evolver::new(&config, &scorer, &pool, &cat)
            .wild_cards(&source)
            .evolve(initial(&pool, &cat, 10), &SeedManager::new(5).derive(&["evolution"]));

        assert_eq!(outcome.population.len(), 10);
        assert_eq!(outcome.generations_run, 8);
        assert_eq!(outcome.best_history.len(), 9);
        for pair in outcome.best_history.windows(2) {
            assert!(pair[1] >= pair[0], "{:?}", outcome.best_history);
        }
        assert!(outcome.population.iter().all(|s| s.score.is_some()));
        assert!(outcome.population.iter().any(|s| s.generation > 0));
    }

    #[test]
    fn elites_keep_their_generation_index() {
        let cat = catalogue();
        let pool = AtomPool::from_atoms(cat.atoms().iter().cloned());
        let scorer = CoherenceScorer::default();
        let config = EvolutionConfig {
            enabled: true,
            generations: 1,
            elite_count: 2,
            ..Default::default()
        };
        let start = initial(&pool, &cat, 6);
        assert!(start.iter().all(|s| s.generation == 0));
        let outcome = Evolver::new(&config, &scorer, &pool, &cat)
            .evolve(start, &SeedManager::new(9).derive(&["evolution"]));

        assert_eq!(outcome.population.len(), 6);
        assert!(outcome.population[..2].iter().all(|s| s.generation == 0));
        assert!(outcome.population[2..].iter().all(|s| s.generation == 1));
    }

    #[test]
    fn evolution_is_deterministic() {
        let cat = catalogue();
        let pool = AtomPool::from_atoms(cat.atoms().iter().cloned());
        let scorer = CoherenceScorer::default();
        for selection in [SelectionMethod::Tournament { size: 3 }, SelectionMethod::Roulette, SelectionMethod::Rank] {
            let config = EvolutionConfig {
                generations: 4,
                selection,
                ..Default::default()
            };
            let evolver = Evolver::new(&config, &scorer, &pool, &cat);
            let a = evolver.evolve(initial(&pool, &cat, 8), &SeedManager::new(3).derive(&["evolution"]));
            let b = evolver.evolve(initial(&pool, &cat, 8), &SeedManager::new(3).derive(&["evolution"]));
            assert_eq!(a.population, b.population);
            assert_eq!(a.best_history, b.best_history);
        }
    }

    #[test]
    fn incompatible_crossover_clones_first_parent() {
        let cat = catalogue();
        let pool = AtomPool::from_atoms(cat.atoms().iter().cloned());
        let pop = initial(&pool, &cat, 2);
        let mut stream = SeedManager::new(1).derive(&["x"]);
        assert!(!pop[0].is_compatible_with(&pop[1]));
        assert_eq!(crossover(&pop[0], &pop[1], &mut stream), pop[0]);
    }

    #[test]
    fn compatible_crossover_mixes_parent_slots() {
        let cat = catalogue();
        let pool = AtomPool::from_atoms(cat.atoms().iter().cloned());
        let pop = initial(&pool, &cat, 4);
        let (a, b) = (&pop[0], &pop[2]);
        assert!(a.is_compatible_with(b));
        let mut stream = SeedManager::new(2).derive(&["x"]);
        let child = crossover(a, b, &mut stream);
        let id = |slot: &SkeletonSlot| slot.atom.as_ref().map(|atom| atom.id);
        for (i, slot) in child.slots.iter().enumerate() {
            assert_eq!(slot.name, a.slots[i].name);
            assert!(id(slot) == id(&a.slots[i]) || id(slot) == id(&b.slots[i]));
        }
        assert_eq!(child.generation, 0);
        assert_eq!(child.score, None);
    }

    /// Every `DiffersFrom` slot is flagged exactly when it shares a tag
    /// with its partner; fallback and unfilled slots are skipped.
    fn constraint_flags_match_atoms(sk: &StorySkeleton) -> bool {
        let Strategy::Tarot(spread) = sk.strategy else {
            return true;
        };
        template(spread).iter().all(|spec| {
            let Some(SlotConstraint::DiffersFrom(other)) = spec.constraint else {
                return true;
            };
            let (Some(slot), Some(partner)) = (sk.slot(spec.name), sk.slot(other)) else {
                return true;
            };
            match (&slot.atom, &partner.atom, slot.violation) {
                (Some(a), Some(p), None) => !a.shares_tag_with(p),
                (Some(a), Some(p), Some(SlotViolation::ConstraintUnmet)) => a.shares_tag_with(p),
                _ => true,
            }
        })
    }

    fn diamond(protagonist: StoryAtom, antagonist: StoryAtom) -> StorySkeleton {
        let mut rest = 100;
        let slots = template(SpreadType::ConflictDiamond)
            .iter()
            .map(|spec| {
                let atom = match spec.name {
                    "protagonist" => protagonist.clone(),
                    "antagonist" => antagonist.clone(),
                    _ => {
                        rest += 1;
                        StoryAtom {
                            id: AtomId(rest),
                            category: spec.category,
                            label: spec.name.to_string(),
                            tags: vec![spec.name.to_string()],
                            rarity: 0.5,
                            origin: AtomOrigin::Catalogue,
                        }
                    }
                };
                SkeletonSlot::filled(spec.name, Some(spec.category), Arc::new(atom))
            })
            .collect();
        StorySkeleton::new(Strategy::Tarot(SpreadType::ConflictDiamond), slots)
    }

    #[test]
    fn crossover_rechecks_differs_from() {
        let agent = |id: u64, tag: &str| StoryAtom {
            id: AtomId(id),
            category: AtomCategory::Agent,
            label: format!("agent {id}"),
            tags: vec![tag.to_string()],
            rarity: 0.5,
            origin: AtomOrigin::Catalogue,
        };
        let a = diamond(agent(1, "x"), agent(2, "y"));
        let b = diamond(agent(3, "y"), agent(4, "x"));
        assert!(constraint_flags_match_atoms(&a) && constraint_flags_match_atoms(&b));

        let mut clashes = 0;
        for seed in 0..200 {
            let child = crossover(&a, &b, &mut SeedManager::new(seed).derive(&["crossover"]));
            assert!(constraint_flags_match_atoms(&child), "seed {seed}");
            if child.slot("antagonist").unwrap().violation == Some(SlotViolation::ConstraintUnmet) {
                clashes += 1;
            }
        }
        assert!(clashes > 0 && clashes < 200, "{clashes}");

        let scorer = CoherenceScorer::default();
        let clash = StorySkeleton::new(
            a.strategy,
            vec![a.slots[0].clone(), b.slots[1].clone()]
                .into_iter()
                .chain(a.slots[2..].iter().cloned())
                .collect(),
        );
        let mut flagged = clash.clone();
        recheck_constraints(&mut flagged);
        assert_eq!(flagged.violations(), 1);
        assert!(scorer.score(&flagged) < scorer.score(&clash));
    }

    #[test]
    fn mutation_keeps_constraint_flags_honest() {
        let cat = catalogue();
        let pool = AtomPool::from_atoms(cat.atoms().iter().cloned());
        let scorer = CoherenceScorer::default();
        let config = EvolutionConfig {
            mutation_rate: 1.0,
            max_mutated_slots: 6,
            ..Default::default()
        };
        let evolver = Evolver::new(&config, &scorer, &pool, &cat);
        let tarot = TarotSpread::new(&pool, &cat);
        for seed in 0..50 {
            let seeds = SeedManager::new(seed);
            let original = tarot.generate(SpreadType::ConflictDiamond, &mut seeds.derive(&["skeleton"]));
            let mutated = evolver.mutate(original, &mut seeds.derive(&["mutate"]));
            assert!(constraint_flags_match_atoms(&mutated), "seed {seed}");
        }
    }

    #[test]
    fn evolved_population_keeps_constraint_flags_honest() {
        let cat = catalogue();
        let pool = AtomPool::from_atoms(cat.atoms().iter().cloned());
        let scorer = CoherenceScorer::default();
        let config = EvolutionConfig {
            enabled: true,
            generations: 6,
            mutation_rate: 0.5,
            crossover_rate: 1.0,
            ..Default::default()
        };
        let tarot = TarotSpread::new(&pool, &cat);
        let seeds = SeedManager::new(21);
        let population: Population = (0..10)
            .map(|i| tarot.generate(SpreadType::ConflictDiamond, &mut seeds.derive(&["skeleton", &i.to_string()])))
            .collect();
        let outcome = Evolver::new(&config, &scorer, &pool, &cat).evolve(population, &seeds.derive(&["evolution"]));
        assert!(outcome.population.iter().all(constraint_flags_match_atoms));
    }

    #[test]
    fn mutation_is_bounded() {
        let cat = catalogue();
        let pool = AtomPool::from_atoms(cat.atoms().iter().cloned());
        let scorer = CoherenceScorer::default();
        let config = EvolutionConfig {
            mutation_rate: 1.0,
            max_mutated_slots: 2,
            ..Default::default()
        };
        let evolver = Evolver::new(&config, &scorer, &pool, &cat);
        let original = initial(&pool, &cat, 1).remove(0);
        let mut stream = SeedManager::new(4).derive(&["mutate"]);
        let mutated = evolver.mutate(original.clone(), &mut stream);
        let changed = original
            .slots
            .iter()
            .zip(&mutated.slots)
            .filter(|(a, b)| a.atom.as_ref().map(|x| x.id) != b.atom.as_ref().map(|x| x.id))
            .count();
        assert_eq!(changed, 2);
        for slot in &mutated.slots {
            assert_eq!(slot.atom.as_ref().map(|a| a.category), slot.required);
        }
    }

    #[test]
    fn novelty_is_jaccard_distance() {
        let atom = |id: u64| {
            Arc::new(StoryAtom {
                id: AtomId(id),
                category: AtomCategory::Object,
                label: format!("o{id}"),
                tags: vec![],
                rarity: 0.5,
                origin: AtomOrigin::Catalogue,
            })
        };
        let sk = |ids: &[u64]| {
            StorySkeleton::new(
                Strategy::Markov,
                ids.iter().map(|&i| SkeletonSlot::filled("s", None, atom(i))).collect(),
            )
        };
        let a = sk(&[1, 2]);
        let b = sk(&[2, 3]);
        assert!((jaccard_distance(&a, &b) - 2.0 / 3.0).abs() < 1e-6);
        assert_eq!(jaccard_distance(&a, &a), 0.0);

        let population = vec![a.clone(), b, sk(&[4])];
        let n = novelty(&population[0], &population);
        assert!((n - (2.0 / 3.0 + 1.0) / 2.0).abs() < 1e-6);
        assert_eq!(novelty(&a, &[]), 0.0);
    }
}
