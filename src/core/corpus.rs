//! Word corpus: exact membership, frequency, and part-of-speech lookup.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Zipf frequency assumed for entries that omit one.
pub const DEFAULT_FREQUENCY: f32 = 3.0;

/// Coarse word class used by phrase templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartOfSpeech {
    Noun,
    Verb,
    Adjective,
    Adverb,
}

impl PartOfSpeech {
    /// Guess a word class from its ending. Unknown shapes are nouns.
    pub fn from_suffix(word: &str) -> Self {
        const ADVERB: &[&str] = &["ly"];
        const NOUN: &[&str] = &["ness", "ment", "tion", "sion", "ity"];
        const VERB: &[&str] = &["ing", "ed", "ate", "ify", "ize"];
        const ADJECTIVE: &[&str] = &["ful", "less", "ous", "ive", "able", "ible", "al", "ish"];

        let ends = |suffixes: &[&str]| suffixes.iter().any(|s| word.len() > s.len() + 1 && word.ends_with(s));
        if ends(ADVERB) {
            Self::Adverb
        } else if ends(NOUN) {
            Self::Noun
        } else if ends(VERB) {
            Self::Verb
        } else if ends(ADJECTIVE) {
            Self::Adjective
        } else {
            Self::Noun
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "n" | "noun" => Some(Self::Noun),
            "v" | "verb" => Some(Self::Verb),
            "a" | "adj" | "adjective" => Some(Self::Adjective),
            "r" | "adv" | "adverb" => Some(Self::Adverb),
            _ => None,
        }
    }
}

/// A read-only set of known words with optional frequency metadata.
///
/// Words are lowercased ASCII letters only; insertion order is kept so that
/// index-based sampling is reproducible.
#[derive(Debug, Clone, Default)]
pub struct WordCorpus {
    words: Vec<String>,
    frequencies: Vec<f32>,
    parts: Vec<PartOfSpeech>,
    index: FxHashMap<String, usize>,
    /// (length, first letter) -> word indices, for near-word search.
    buckets: FxHashMap<(usize, char), Vec<usize>>,
}

impl WordCorpus {
    /// Parse a corpus from text: one `word [zipf_frequency] [pos]` per line.
    /// Blank lines and lines starting with `#` are skipped, as are words
    /// containing anything but ASCII letters.
    pub fn parse(text: &str) -> Self {
        let mut corpus = Self::default();
        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let mut fields = trimmed.split_whitespace();
            let Some(word) = fields.next() else { continue };
            let mut frequency = None;
            let mut pos = None;
            for field in fields {
                if let Ok(f) = field.parse::<f32>() {
                    frequency = Some(f);
                } else if let Some(p) = PartOfSpeech::from_tag(&field.to_lowercase()) {
                    pos = Some(p);
                }
            }
            corpus.insert(word, frequency, pos);
        }
        corpus
    }

    pub fn load(path: &Path) -> Result<Self, CorpusError> {
        let contents = std::fs::read_to_string(path)?;
        let corpus = Self::parse(&contents);
        tracing::debug!(path = %path.display(), words = corpus.len(), "loaded word corpus");
        Ok(corpus)
    }

    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut corpus = Self::default();
        for word in words {
            corpus.insert(word.as_ref(), None, None);
        }
        corpus
    }

    fn insert(&mut self, word: &str, frequency: Option<f32>, pos: Option<PartOfSpeech>) {
        let word = word.to_lowercase();
        if word.is_empty() || !word.chars().all(|c| c.is_ascii_lowercase()) {
            return;
        }
        if self.index.contains_key(&word) {
            return;
        }
        let idx = self.words.len();
        let first = word.chars().next().unwrap_or('a');
        self.buckets.entry((word.len(), first)).or_default().push(idx);
        self.index.insert(word.clone(), idx);
        self.frequencies.push(frequency.unwrap_or(DEFAULT_FREQUENCY).max(0.0));
        self.parts.push(pos.unwrap_or_else(|| PartOfSpeech::from_suffix(&word)));
        self.words.push(word);
    }

    pub fn contains(&self, word: &str) -> bool {
        self.index.contains_key(word)
    }

    /// Zipf-like frequency, 0.0 for unknown words.
    pub fn frequency(&self, word: &str) -> f32 {
        self.index.get(word).map_or(0.0, |&i| self.frequencies[i])
    }

    pub fn pos(&self, word: &str) -> Option<PartOfSpeech> {
        self.index.get(word).map(|&i| self.parts[i])
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn word(&self, index: usize) -> Option<&str> {
        self.words.get(index).map(String::as_str)
    }

    pub fn frequency_at(&self, index: usize) -> f32 {
        self.frequencies.get(index).copied().unwrap_or(0.0)
    }

    pub fn pos_at(&self, index: usize) -> Option<PartOfSpeech> {
        self.parts.get(index).copied()
    }

    /// Words of exactly `len` letters starting with `first`, in corpus order.
    pub fn near_candidates(&self, len: usize, first: char) -> impl Iterator<Item = &str> + '_ {
        self.buckets
            .get(&(len, first))
            .into_iter()
            .flatten()
            .map(|&i| self.words[i].as_str())
    }
}
