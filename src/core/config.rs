//! Run configuration: RON on disk, every section optional, validated before
//! any stochastic work starts.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::core::crystallizer::{DEFAULT_MAX_ATOMS_PER_CATEGORY, DEFAULT_PARTIAL_FLOOR, DEFAULT_THRESHOLD};
use crate::core::dictionary::{PhraseTemplate, SamplingStrategy, DEFAULT_DRAW_SIZE};
use crate::core::evolution::{EvolutionConfig, SelectionMethod};
use crate::core::letter_soup::{LetterFrequencies, DEFAULT_SCAN_LIMIT};
use crate::core::markov::{DEFAULT_MAX_BEATS, DEFAULT_MIN_BEATS};
use crate::core::ranker::SynthesisStrategy;
use crate::core::scorer::ScoreWeights;
use crate::schema::skeleton::SpreadType;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid count for {field}: {reason}")]
    InvalidCount { field: &'static str, reason: String },
    #[error("{field} must lie in [0, 1], got {value}")]
    InvalidRate { field: &'static str, value: f32 },
    #[error("beat bounds must satisfy 2 <= min <= max, got min {min}, max {max}")]
    BeatBounds { min: usize, max: usize },
    #[error("no skeleton engine is enabled")]
    NoEngineEnabled,
    #[error("unknown {kind} name: {name}")]
    UnknownName { kind: &'static str, name: String },
    #[error("invalid phrase template {template:?}: {reason}")]
    InvalidTemplate { template: String, reason: String },
    #[error("letter weights must use lowercase ASCII letters with non-negative weights, at least one positive")]
    InvalidLetterWeights,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChaosConfig {
    pub soup_length: usize,
    pub soup_count: usize,
    pub near_words: bool,
    pub near_word_scan_limit: usize,
    pub dictionary_count: usize,
    /// `None` lets the seed choose.
    pub dictionary_strategy: Option<SamplingStrategy>,
    pub draw_size: usize,
    /// Replaces the English letter table.
    pub letter_weights: Option<Vec<(char, f32)>>,
    /// Replaces the built-in phrase templates.
    pub phrase_templates: Option<Vec<String>>,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self {
            soup_length: 200,
            soup_count: 3,
            near_words: true,
            near_word_scan_limit: DEFAULT_SCAN_LIMIT,
            dictionary_count: 30,
            dictionary_strategy: None,
            draw_size: DEFAULT_DRAW_SIZE,
            letter_weights: None,
            phrase_templates: None,
        }
    }
}

impl ChaosConfig {
    pub fn letter_frequencies(&self) -> Result<LetterFrequencies, ConfigError> {
        match &self.letter_weights {
            Some(table) => LetterFrequencies::custom(table).ok_or(ConfigError::InvalidLetterWeights),
            None => Ok(LetterFrequencies::english()),
        }
    }

    pub fn templates(&self) -> Result<Vec<PhraseTemplate>, ConfigError> {
        match &self.phrase_templates {
            Some(list) => list.iter().map(|t| PhraseTemplate::parse(t)).collect(),
            None => Ok(PhraseTemplate::defaults()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrystallizationConfig {
    pub threshold: f32,
    pub partial_floor: f32,
    pub max_atoms_per_category: usize,
    /// Weighted catalogue draws per category added to the atom pool.
    pub catalogue_draws_per_category: usize,
}

impl Default for CrystallizationConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            partial_floor: DEFAULT_PARTIAL_FLOOR,
            max_atoms_per_category: DEFAULT_MAX_ATOMS_PER_CATEGORY,
            catalogue_draws_per_category: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tarot: bool,
    pub markov: bool,
    pub spreads: Vec<SpreadType>,
    pub min_beats: usize,
    pub max_beats: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tarot: true,
            markov: true,
            spreads: SpreadType::ALL.to_vec(),
            min_beats: DEFAULT_MIN_BEATS,
            max_beats: DEFAULT_MAX_BEATS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Absent means a fresh seed from the OS; the seed used is reported.
    pub seed: Option<u64>,
    pub skeleton_count: usize,
    pub top_k: usize,
    pub chaos: ChaosConfig,
    pub crystallization: CrystallizationConfig,
    pub engines: EngineConfig,
    pub evolution: EvolutionConfig,
    pub scoring: ScoreWeights,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: None,
            skeleton_count: 12,
            top_k: 3,
            chaos: ChaosConfig::default(),
            crystallization: CrystallizationConfig::default(),
            engines: EngineConfig::default(),
            evolution: EvolutionConfig::default(),
            scoring: ScoreWeights::default(),
        }
    }
}

fn check_rate(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidRate { field, value })
    }
}

fn check_positive(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        Err(ConfigError::InvalidCount {
            field,
            reason: "must be at least 1".to_string(),
        })
    } else {
        Ok(())
    }
}

impl RunConfig {
    pub fn parse_ron(input: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(input)?)
    }

    pub fn load_from_ron(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config = Self::parse_ron(&contents)?;
        tracing::debug!(path = %path.display(), "loaded run config");
        Ok(config)
    }

    /// Reject anything the pipeline cannot run. Soup length or count of
    /// zero is valid and yields no soup tokens.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_positive("skeleton_count", self.skeleton_count)?;
        check_positive("top_k", self.top_k)?;
        check_positive("chaos.near_word_scan_limit", self.chaos.near_word_scan_limit)?;
        check_positive("chaos.draw_size", self.chaos.draw_size)?;
        self.chaos.letter_frequencies()?;
        self.chaos.templates()?;

        let c = &self.crystallization;
        check_rate("crystallization.threshold", c.threshold)?;
        check_rate("crystallization.partial_floor", c.partial_floor)?;
        if c.partial_floor > c.threshold {
            return Err(ConfigError::InvalidRate {
                field: "crystallization.partial_floor",
                value: c.partial_floor,
            });
        }
        check_positive("crystallization.max_atoms_per_category", c.max_atoms_per_category)?;

        let e = &self.engines;
        if !e.tarot && !e.markov {
            return Err(ConfigError::NoEngineEnabled);
        }
        if e.tarot && e.spreads.is_empty() {
            return Err(ConfigError::InvalidCount {
                field: "engines.spreads",
                reason: "tarot is enabled but no spread is listed".to_string(),
            });
        }
        if e.min_beats < 2 || e.max_beats < e.min_beats {
            return Err(ConfigError::BeatBounds {
                min: e.min_beats,
                max: e.max_beats,
            });
        }

        let v = &self.evolution;
        if v.enabled {
            check_positive("evolution.population_size", v.population_size)?;
            check_positive("evolution.elite_count", v.elite_count)?;
            if v.elite_count > v.population_size {
                return Err(ConfigError::InvalidCount {
                    field: "evolution.elite_count",
                    reason: format!("{} exceeds population size {}", v.elite_count, v.population_size),
                });
            }
            check_rate("evolution.mutation_rate", v.mutation_rate)?;
            check_rate("evolution.crossover_rate", v.crossover_rate)?;
            check_rate("evolution.wild_card_rate", v.wild_card_rate)?;
            if let SelectionMethod::Tournament { size } = v.selection {
                check_positive("evolution.selection.size", size)?;
            }
        }

        for (field, weight) in self.scoring.as_array() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::InvalidRate { field, value: weight });
            }
        }
        if self.scoring.total() <= 0.0 {
            return Err(ConfigError::InvalidCount {
                field: "scoring",
                reason: "at least one weight must be positive".to_string(),
            });
        }
        Ok(())
    }
}

impl FromStr for SamplingStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.name() == s)
            .ok_or_else(|| ConfigError::UnknownName {
                kind: "sampling strategy",
                name: s.to_string(),
            })
    }
}

impl FromStr for SpreadType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.name() == s)
            .ok_or_else(|| ConfigError::UnknownName {
                kind: "spread",
                name: s.to_string(),
            })
    }
}

impl FromStr for SynthesisStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.name() == s)
            .ok_or_else(|| ConfigError::UnknownName {
                kind: "synthesis strategy",
                name: s.to_string(),
            })
    }
}

impl FromStr for SelectionMethod {
    type Err = ConfigError;

    /// `tournament`, `tournament:<size>`, `roulette` or `rank`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || ConfigError::UnknownName {
            kind: "selection method",
            name: s.to_string(),
        };
        match s.split_once(':') {
            Some(("tournament", size)) => {
                let size = size.parse().map_err(|_| unknown())?;
                Ok(Self::Tournament { size })
            }
            Some(_) => Err(unknown()),
            None => match s {
                "tournament" => Ok(Self::default()),
                "roulette" => Ok(Self::Roulette),
                "rank" => Ok(Self::Rank),
                _ => Err(unknown()),
            },
        }
    }
}
