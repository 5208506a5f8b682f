//! Dictionary chaos: corpus words sampled per strategy and arranged into
//! near-grammatical phrases by part-of-speech templates.

use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::config::ConfigError;
use crate::core::corpus::{PartOfSpeech, WordCorpus};
use crate::core::phonetics::is_vowel;
use crate::core::seed::SeedStream;
use crate::schema::token::Token;

/// Candidate words drawn per template slot before weighting.
pub const DEFAULT_DRAW_SIZE: usize = 24;

const DEFAULT_TEMPLATES: &[&str] = &[
    // declarative
    "the {noun} {verb} {adv}",
    "{adj} {noun} {verb} the {noun}",
    "a {adj} {noun} {verb}",
    // imperative
    "{verb} the {adj} {noun}",
    "{adv} {verb} every {noun}",
    // fragment
    "{adj} {noun}",
    "{noun} of {noun}",
    "{adv} {adj}",
    // question
    "does the {noun} {verb} {adv}",
    "why {verb} the {adj} {noun}",
];

/// How corpus words are favoured when filling template slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SamplingStrategy {
    Uniform,
    FrequencyWeighted,
    Rare,
    NounHeavy,
    PhoneticCluster,
}

impl SamplingStrategy {
    pub const ALL: [SamplingStrategy; 5] = [
        Self::Uniform,
        Self::FrequencyWeighted,
        Self::Rare,
        Self::NounHeavy,
        Self::PhoneticCluster,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Uniform => "uniform",
            Self::FrequencyWeighted => "frequency_weighted",
            Self::Rare => "rare",
            Self::NounHeavy => "noun_heavy",
            Self::PhoneticCluster => "phonetic_cluster",
        }
    }

    /// Pick a strategy from the stream when none is configured.
    pub fn choose(stream: &mut SeedStream) -> Self {
        Self::ALL[stream.gen_range(0..Self::ALL.len())]
    }

    /// Unnormalized preference for a corpus entry.
    fn weight(&self, word: &str, frequency: f32, pos: Option<PartOfSpeech>, anchor: Option<&str>) -> f32 {
        match self {
            Self::Uniform => 1.0,
            Self::FrequencyWeighted => frequency.max(0.01),
            Self::Rare => {
                if frequency < 3.0 {
                    1.0 / (frequency + 0.1)
                } else {
                    0.05
                }
            }
            Self::NounHeavy => {
                if pos == Some(PartOfSpeech::Noun) {
                    3.0
                } else {
                    1.0
                }
            }
            Self::PhoneticCluster => match anchor {
                Some(anchor) => {
                    let shared = consonant_signature(word)
                        .chars()
                        .zip(anchor.chars())
                        .take_while(|(a, b)| a == b)
                        .count();
                    0.2 + 1.6 * shared as f32
                }
                None => 1.0,
            },
        }
    }
}

/// First three consonants of a word, lowercased.
pub fn consonant_signature(word: &str) -> String {
    word.chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_lowercase())
        .filter(|c| !is_vowel(*c))
        .take(3)
        .collect()
}

/// A piece of a phrase template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Segment {
    /// A function word emitted as-is.
    Literal(String),
    /// A slot filled from the corpus: `{noun}`, `{verb}`, `{adj}`, `{adv}`.
    Slot(PartOfSpeech),
}

/// A parsed phrase template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseTemplate {
    pub segments: Vec<Segment>,
}

impl PhraseTemplate {
    /// Parse a whitespace-separated template.
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidTemplate {
            template: input.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = Vec::new();
        for word in input.split_whitespace() {
            if let Some(inner) = word.strip_prefix('{') {
                let name = inner.strip_suffix('}').ok_or_else(|| invalid("unclosed brace"))?;
                let pos = match name {
                    "noun" => PartOfSpeech::Noun,
                    "verb" => PartOfSpeech::Verb,
                    "adj" => PartOfSpeech::Adjective,
                    "adv" => PartOfSpeech::Adverb,
                    "" => return Err(invalid("empty braces")),
                    _ => return Err(invalid("unknown slot")),
                };
                segments.push(Segment::Slot(pos));
            } else if word.contains('{') || word.contains('}') {
                return Err(invalid("braces must wrap a whole word"));
            } else {
                segments.push(Segment::Literal(word.to_lowercase()));
            }
        }

        if !segments.iter().any(|s| matches!(s, Segment::Slot(_))) {
            return Err(invalid("template has no slots"));
        }
        Ok(Self { segments })
    }

    pub fn defaults() -> Vec<PhraseTemplate> {
        DEFAULT_TEMPLATES
            .iter()
            .filter_map(|t| Self::parse(t).ok())
            .collect()
    }
}

/// A count-bounded iterator of PHRASE tokens.
///
/// Phrase `i` is drawn from the child stream `phrase_{i}`.
pub struct DictionaryChaos<'a> {
    corpus: &'a WordCorpus,
    stream: SeedStream,
    strategy: SamplingStrategy,
    templates: Vec<PhraseTemplate>,
    count: usize,
    draw_size: usize,
    produced: usize,
}

impl<'a> DictionaryChaos<'a> {
    /// With `strategy: None` the strategy is chosen from the stream's
    /// `strategy` child, so it depends on the seed alone.
    pub fn new(
        corpus: &'a WordCorpus,
        stream: SeedStream,
        strategy: Option<SamplingStrategy>,
        count: usize,
    ) -> Self {
        let strategy = strategy.unwrap_or_else(|| SamplingStrategy::choose(&mut stream.child("strategy")));
        Self {
            corpus,
            stream,
            strategy,
            templates: PhraseTemplate::defaults(),
            count,
            draw_size: DEFAULT_DRAW_SIZE,
            produced: 0,
        }
    }

    pub fn templates(mut self, templates: Vec<PhraseTemplate>) -> Self {
        if !templates.is_empty() {
            self.templates = templates;
        }
        self
    }

    pub fn draw_size(mut self, draw_size: usize) -> Self {
        self.draw_size = draw_size.max(1);
        self
    }

    pub fn strategy(&self) -> SamplingStrategy {
        self.strategy
    }

    /// Fill one slot: draw candidates uniformly, then pick one by strategy
    /// weight times part-of-speech affinity.
    fn fill_slot(&self, pos: PartOfSpeech, anchor: Option<&str>, stream: &mut SeedStream) -> Option<String> {
        let n = self.corpus.len();
        if n == 0 {
            return None;
        }
        let candidates: Vec<usize> = (0..self.draw_size).map(|_| stream.gen_range(0..n)).collect();
        let weights: Vec<f32> = candidates
            .iter()
            .map(|&i| {
                let word = self.corpus.word(i).unwrap_or_default();
                let word_pos = self.corpus.pos_at(i);
                let affinity = if word_pos == Some(pos) { 4.0 } else { 1.0 };
                self.strategy
                    .weight(word, self.corpus.frequency_at(i), word_pos, anchor)
                    * affinity
            })
            .collect();

        let pick = match WeightedIndex::new(&weights) {
            Ok(dist) => candidates[dist.sample(stream)],
            Err(_) => candidates[0],
        };
        self.corpus.word(pick).map(str::to_string)
    }
}

impl Iterator for DictionaryChaos<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.produced >= self.count || self.corpus.is_empty() {
            return None;
        }
        let mut stream = self.stream.child(&format!("phrase_{}", self.produced));
        self.produced += 1;

        let template = self.templates.choose(&mut stream)?.clone();
        let mut words = Vec::with_capacity(template.segments.len());
        let mut anchor: Option<String> = None;
        for segment in &template.segments {
            match segment {
                Segment::Literal(word) => words.push(word.clone()),
                Segment::Slot(pos) => {
                    let word = self.fill_slot(*pos, anchor.as_deref(), &mut stream)?;
                    if anchor.is_none() {
                        anchor = Some(consonant_signature(&word));
                    }
                    words.push(word);
                }
            }
        }
        tracing::trace!(strategy = self.strategy.name(), phrase = %words.join(" "), "dictionary phrase");
        Some(Token::phrase(words))
    }
}
