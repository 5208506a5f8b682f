//! The skeleton pipeline: chaos → crystallize → generate → score →
//! evolve (optional) → rank.
//!
//! Every stage draws from its own labelled stream under one root seed, so a
//! fixed seed and configuration reproduce the whole run.

use rand::seq::SliceRandom;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::core::catalogue::{AtomCatalogue, CatalogueError};
use crate::core::config::{ConfigError, RunConfig};
use crate::core::corpus::{CorpusError, WordCorpus};
use crate::core::crystallizer::{AtomPool, Crystallizer};
use crate::core::dictionary::{DictionaryChaos, PhraseTemplate};
use crate::core::evolution::{EvolutionReport, Evolver, SkeletonSource};
use crate::core::letter_soup::{LetterFrequencies, LetterSoup};
use crate::core::markov::{BeatTable, MarkovError, MarkovSequencer};
use crate::core::ranker::{self, SynthesisRequest, SynthesisStrategy};
use crate::core::scorer::{CoherenceScorer, WorldRules};
use crate::core::seed::{SeedManager, SeedStream};
use crate::core::spread::TarotSpread;
use crate::schema::atom::{AtomCategory, StoryAtom};
use crate::schema::skeleton::{SpreadType, StorySkeleton};
use crate::schema::token::Token;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("catalogue error: {0}")]
    Catalogue(#[from] CatalogueError),
    #[error("corpus error: {0}")]
    Corpus(#[from] CorpusError),
    #[error("beat table error: {0}")]
    Markov(#[from] MarkovError),
    #[error("no {0} was provided")]
    MissingInput(&'static str),
}

/// Everything a run produced. Skeletons are ranked best first.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub seed: u64,
    pub soup: Vec<String>,
    pub tokens: Vec<Token>,
    pub atoms: Vec<Arc<StoryAtom>>,
    pub skeletons: Vec<StorySkeleton>,
    pub top_k: Vec<StorySkeleton>,
    pub evolution: Option<EvolutionReport>,
}

impl PipelineOutput {
    /// Hand-off for the prose collaborator.
    pub fn synthesis_request(&self, strategy: Option<SynthesisStrategy>) -> SynthesisRequest {
        SynthesisRequest::new(self.top_k.clone(), strategy)
    }
}

/// The top-level engine. Built via `SkeletonPipeline::builder()`.
pub struct SkeletonPipeline {
    config: RunConfig,
    catalogue: Arc<AtomCatalogue>,
    corpus: Arc<WordCorpus>,
    scorer: CoherenceScorer,
    beat_table: BeatTable,
    frequencies: LetterFrequencies,
    templates: Vec<PhraseTemplate>,
}

/// Builder for constructing a `SkeletonPipeline`.
#[derive(Default)]
pub struct SkeletonPipelineBuilder {
    catalogue_path: Option<PathBuf>,
    corpus_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
    beat_table_path: Option<PathBuf>,
    world_rules_path: Option<PathBuf>,
    seed: Option<u64>,
    /// Directly provided inputs (for testing without files).
    catalogue: Option<Arc<AtomCatalogue>>,
    corpus: Option<Arc<WordCorpus>>,
    config: Option<RunConfig>,
    beat_table: Option<BeatTable>,
    world_rules: Option<WorldRules>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Engine {
    Tarot,
    Markov,
}

/// The enabled skeleton engines over one shared atom pool.
struct Generators<'a> {
    engines: Vec<Engine>,
    spreads: &'a [SpreadType],
    tarot: TarotSpread<'a>,
    markov: MarkovSequencer<'a>,
}

impl Generators<'_> {
    fn generate(&self, engine: Engine, stream: &mut SeedStream) -> StorySkeleton {
        match engine {
            Engine::Tarot => {
                let spread = self.spreads.choose(stream).copied().unwrap_or(SpreadType::HeroJourney);
                self.tarot.generate(spread, stream)
            }
            Engine::Markov => self.markov.generate(stream),
        }
    }

    /// Engine for skeleton `index`: round-robin over the enabled engines.
    fn engine_for(&self, index: usize) -> Engine {
        self.engines
            .get(index % self.engines.len().max(1))
            .copied()
            .unwrap_or(Engine::Markov)
    }
}

impl SkeletonSource for Generators<'_> {
    fn fresh(&self, stream: &mut SeedStream) -> StorySkeleton {
        let engine = self.engines.choose(stream).copied().unwrap_or(Engine::Markov);
        self.generate(engine, stream)
    }
}

impl SkeletonPipeline {
    pub fn builder() -> SkeletonPipelineBuilder {
        SkeletonPipelineBuilder::default()
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn catalogue(&self) -> &AtomCatalogue {
        &self.catalogue
    }

    pub fn scorer(&self) -> &CoherenceScorer {
        &self.scorer
    }

    /// Run every stage once. Infallible: the configuration was validated
    /// when the pipeline was built.
    pub fn run(&self) -> PipelineOutput {
        let seeds = match self.config.seed {
            Some(seed) => SeedManager::new(seed),
            None => SeedManager::from_entropy(),
        };
        tracing::info!(
            seed = seeds.root(),
            skeletons = self.config.skeleton_count,
            evolution = self.config.evolution.enabled,
            "pipeline run starting"
        );

        let (soup, tokens) = self.chaos(&seeds);
        let pool = self.crystallize(&seeds, &tokens);
        let (skeletons, evolution) = self.generate_and_evolve(&seeds, &pool);

        let ranked = ranker::rank(skeletons);
        let top_k = ranker::top_k(&ranked, self.config.top_k);
        tracing::info!(
            seed = seeds.root(),
            tokens = tokens.len(),
            atoms = pool.len(),
            skeletons = ranked.len(),
            best = top_k.first().and_then(|s| s.score).unwrap_or(0.0),
            "pipeline run finished"
        );

        PipelineOutput {
            seed: seeds.root(),
            soup,
            tokens,
            atoms: pool.all().to_vec(),
            skeletons: ranked,
            top_k,
            evolution,
        }
    }

    fn chaos(&self, seeds: &SeedManager) -> (Vec<String>, Vec<Token>) {
        let chaos = &self.config.chaos;
        let soup: Vec<_> = LetterSoup::new(&self.corpus, seeds.derive(&["soup"]), chaos.soup_length, chaos.soup_count)
            .frequencies(self.frequencies.clone())
            .near_words(chaos.near_words)
            .scan_limit(chaos.near_word_scan_limit)
            .collect();

        let dictionary = DictionaryChaos::new(
            &self.corpus,
            seeds.derive(&["dictionary"]),
            chaos.dictionary_strategy,
            chaos.dictionary_count,
        )
        .templates(self.templates.clone())
        .draw_size(chaos.draw_size);
        let strategy = dictionary.strategy();

        let mut tokens: Vec<Token> = soup.iter().flat_map(|s| s.tokens.iter().cloned()).collect();
        let soup_tokens = tokens.len();
        tokens.extend(dictionary);
        tracing::debug!(
            soup_strings = soup.len(),
            soup_tokens,
            phrases = tokens.len() - soup_tokens,
            strategy = strategy.name(),
            "chaos stage"
        );

        (soup.into_iter().map(|s| s.raw).collect(), tokens)
    }

    fn crystallize(&self, seeds: &SeedManager, tokens: &[Token]) -> AtomPool {
        let c = &self.config.crystallization;
        let mut pool = Crystallizer::new(&self.catalogue)
            .threshold(c.threshold)
            .partial_floor(c.partial_floor)
            .max_atoms_per_category(c.max_atoms_per_category)
            .crystallize_all(tokens);

        let mut stream = seeds.derive(&["catalogue_seed"]);
        let mut seeded = 0usize;
        for category in AtomCategory::ALL {
            for atom in self
                .catalogue
                .sample_weighted(category, &mut stream, c.catalogue_draws_per_category)
            {
                if pool.push(atom) {
                    seeded += 1;
                }
            }
        }

        if pool.is_empty() {
            tracing::warn!("atom pool is empty; every skeleton slot will be unfilled");
        }
        tracing::debug!(atoms = pool.len(), seeded, "crystallize stage");
        pool
    }

    fn generate_and_evolve(
        &self,
        seeds: &SeedManager,
        pool: &AtomPool,
    ) -> (Vec<StorySkeleton>, Option<EvolutionReport>) {
        let engines_config = &self.config.engines;
        let mut engines = Vec::new();
        if engines_config.tarot {
            engines.push(Engine::Tarot);
        }
        if engines_config.markov {
            engines.push(Engine::Markov);
        }
        let generators = Generators {
            engines,
            spreads: &engines_config.spreads,
            tarot: TarotSpread::new(pool, &self.catalogue),
            markov: MarkovSequencer::new(pool, &self.catalogue, &self.beat_table)
                .beats(engines_config.min_beats, engines_config.max_beats),
        };

        let evolution = &self.config.evolution;
        let count = if evolution.enabled {
            self.config.skeleton_count.max(evolution.population_size)
        } else {
            self.config.skeleton_count
        };

        let skeletons: Vec<StorySkeleton> = (0..count)
            .map(|i| {
                let mut stream = seeds.derive(&["skeleton", &i.to_string()]);
                let skeleton = generators.generate(generators.engine_for(i), &mut stream);
                self.scorer.score_skeleton(skeleton)
            })
            .collect();
        tracing::debug!(skeletons = skeletons.len(), "generate stage");

        if !evolution.enabled {
            return (skeletons, None);
        }
        let outcome = Evolver::new(evolution, &self.scorer, pool, &self.catalogue)
            .wild_cards(&generators)
            .evolve(skeletons, &seeds.derive(&["evolution"]));
        tracing::debug!(
            generations = outcome.generations_run,
            mean_novelty = outcome.mean_novelty,
            "evolve stage"
        );
        let report = outcome.report();
        (outcome.population, Some(report))
    }
}

impl SkeletonPipelineBuilder {
    pub fn catalogue_path(mut self, path: impl AsRef<Path>) -> Self {
        self.catalogue_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn corpus_path(mut self, path: impl AsRef<Path>) -> Self {
        self.corpus_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn config_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn beat_table_path(mut self, path: impl AsRef<Path>) -> Self {
        self.beat_table_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn world_rules_path(mut self, path: impl AsRef<Path>) -> Self {
        self.world_rules_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Overrides the configured seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Provide the catalogue directly (for testing without files).
    pub fn with_catalogue(mut self, catalogue: Arc<AtomCatalogue>) -> Self {
        self.catalogue = Some(catalogue);
        self
    }

    /// Provide the corpus directly (for testing without files).
    pub fn with_corpus(mut self, corpus: Arc<WordCorpus>) -> Self {
        self.corpus = Some(corpus);
        self
    }

    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_beat_table(mut self, table: BeatTable) -> Self {
        self.beat_table = Some(table);
        self
    }

    pub fn with_world_rules(mut self, rules: WorldRules) -> Self {
        self.world_rules = Some(rules);
        self
    }

    /// Load whatever was given by path, then validate the configuration.
    /// Directly provided values win over paths.
    pub fn build(self) -> Result<SkeletonPipeline, PipelineError> {
        let mut config = match (self.config, &self.config_path) {
            (Some(config), _) => config,
            (None, Some(path)) => RunConfig::load_from_ron(path)?,
            (None, None) => RunConfig::default(),
        };
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        config.validate()?;

        let catalogue = match (self.catalogue, &self.catalogue_path) {
            (Some(catalogue), _) => catalogue,
            (None, Some(path)) => Arc::new(AtomCatalogue::load_from_ron(path)?),
            (None, None) => return Err(PipelineError::MissingInput("atom catalogue")),
        };
        let corpus = match (self.corpus, &self.corpus_path) {
            (Some(corpus), _) => corpus,
            (None, Some(path)) => Arc::new(WordCorpus::load(path)?),
            (None, None) => return Err(PipelineError::MissingInput("word corpus")),
        };
        let beat_table = match (self.beat_table, &self.beat_table_path) {
            (Some(table), _) => table,
            (None, Some(path)) => BeatTable::load_from_ron(path)?,
            (None, None) => BeatTable::default(),
        };
        let world_rules = match (self.world_rules, &self.world_rules_path) {
            (Some(rules), _) => rules,
            (None, Some(path)) => WorldRules::load_from_ron(path)?,
            (None, None) => WorldRules::default(),
        };

        let frequencies = config.chaos.letter_frequencies()?;
        let templates = config.chaos.templates()?;
        let scorer = CoherenceScorer::new(config.scoring)
            .with_world_rules(world_rules)
            .with_catalogue(Arc::clone(&catalogue))
            .with_beat_table(beat_table.clone());

        Ok(SkeletonPipeline {
            config,
            catalogue,
            corpus,
            scorer,
            beat_table,
            frequencies,
            templates,
        })
    }
}
