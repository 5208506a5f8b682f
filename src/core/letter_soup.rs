//! Letter soup: random English-biased strings mined for words, near-words
//! and plausible neologisms.

use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::Rng;
use serde::{Deserialize, Serialize};
use strsim::levenshtein;

use crate::core::corpus::WordCorpus;
use crate::core::phonetics;
use crate::core::seed::SeedStream;
use crate::schema::token::{PhoneticMood, Span, Token, TokenKind};

/// Sliding window bounds.
const MIN_WINDOW: usize = 3;
const MAX_WINDOW: usize = 7;
/// Shortest fragment considered for near-word matching.
const NEAR_WORD_MIN_LEN: usize = 4;
/// Neologism length bounds.
const NEOLOGISM_MIN_LEN: usize = 4;
const NEOLOGISM_MAX_LEN: usize = 7;

/// Default cap on corpus words compared per fragment.
pub const DEFAULT_SCAN_LIMIT: usize = 200;

const ENGLISH: [(char, f32); 26] = [
    ('e', 12.7), ('t', 9.1), ('a', 8.2), ('o', 7.5), ('i', 7.0), ('n', 6.7),
    ('s', 6.3), ('h', 6.1), ('r', 6.0), ('d', 4.3), ('l', 4.0), ('c', 2.8),
    ('u', 2.8), ('m', 2.4), ('w', 2.4), ('f', 2.2), ('g', 2.0), ('y', 2.0),
    ('p', 1.9), ('b', 1.5), ('v', 1.0), ('k', 0.8), ('j', 0.15), ('x', 0.15),
    ('q', 0.10), ('z', 0.07),
];

/// Per-letter sampling weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LetterFrequencies {
    letters: Vec<char>,
    weights: Vec<f32>,
}

impl LetterFrequencies {
    pub fn english() -> Self {
        Self {
            letters: ENGLISH.iter().map(|(c, _)| *c).collect(),
            weights: ENGLISH.iter().map(|(_, w)| *w).collect(),
        }
    }

    /// A custom table. Returns `None` unless every entry is a lowercase
    /// ASCII letter with a finite non-negative weight and at least one
    /// weight is positive.
    pub fn custom(table: &[(char, f32)]) -> Option<Self> {
        let valid = table
            .iter()
            .all(|(c, w)| c.is_ascii_lowercase() && w.is_finite() && *w >= 0.0);
        if !valid || !table.iter().any(|(_, w)| *w > 0.0) {
            return None;
        }
        Some(Self {
            letters: table.iter().map(|(c, _)| *c).collect(),
            weights: table.iter().map(|(_, w)| *w).collect(),
        })
    }

    pub fn letters(&self) -> &[char] {
        &self.letters
    }
}

impl Default for LetterFrequencies {
    fn default() -> Self {
        Self::english()
    }
}

/// One generated string and the tokens mined from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoupString {
    pub raw: String,
    /// Non-overlapping tokens ordered by start position.
    pub tokens: Vec<Token>,
}

impl SoupString {
    /// Phonetic mood of the whole raw string.
    pub fn mood(&self) -> PhoneticMood {
        phonetics::analyze_mood(&self.raw)
    }
}

/// A count-bounded iterator of letter-soup strings.
///
/// String `i` is drawn from the child stream `letter_soup_{i}` of the
/// stream passed in, so the sequence restarts identically from the same
/// parent stream.
pub struct LetterSoup<'a> {
    corpus: &'a WordCorpus,
    stream: SeedStream,
    frequencies: LetterFrequencies,
    dist: Option<WeightedIndex<f32>>,
    length: usize,
    count: usize,
    near_words: bool,
    scan_limit: usize,
    produced: usize,
}

impl<'a> LetterSoup<'a> {
    pub fn new(corpus: &'a WordCorpus, stream: SeedStream, length: usize, count: usize) -> Self {
        let frequencies = LetterFrequencies::english();
        let dist = WeightedIndex::new(&frequencies.weights).ok();
        Self {
            corpus,
            stream,
            frequencies,
            dist,
            length,
            count,
            near_words: true,
            scan_limit: DEFAULT_SCAN_LIMIT,
            produced: 0,
        }
    }

    pub fn frequencies(mut self, frequencies: LetterFrequencies) -> Self {
        self.dist = WeightedIndex::new(&frequencies.weights).ok();
        self.frequencies = frequencies;
        self
    }

    pub fn near_words(mut self, enabled: bool) -> Self {
        self.near_words = enabled;
        self
    }

    pub fn scan_limit(mut self, limit: usize) -> Self {
        self.scan_limit = limit;
        self
    }

    fn sample_raw(&self, stream: &mut SeedStream) -> String {
        let letters = &self.frequencies.letters;
        match &self.dist {
            Some(dist) => (0..self.length).map(|_| letters[dist.sample(stream)]).collect(),
            None => (0..self.length)
                .map(|_| letters[stream.gen_range(0..letters.len())])
                .collect(),
        }
    }

    /// Mine one raw string for tokens.
    pub fn extract(&self, raw: &str) -> Vec<Token> {
        extract_tokens(self.corpus, raw, self.near_words, self.scan_limit)
    }
}

impl Iterator for LetterSoup<'_> {
    type Item = SoupString;

    fn next(&mut self) -> Option<SoupString> {
        if self.produced >= self.count || self.length == 0 || self.frequencies.letters.is_empty() {
            return None;
        }
        let mut stream = self.stream.child(&format!("letter_soup_{}", self.produced));
        self.produced += 1;

        let raw = self.sample_raw(&mut stream);
        let tokens = self.extract(&raw);
        tracing::trace!(raw = %raw, tokens = tokens.len(), "letter soup string");
        Some(SoupString { raw, tokens })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.length == 0 {
            0
        } else {
            self.count.saturating_sub(self.produced)
        };
        (remaining, Some(remaining))
    }
}

/// Maximum edit distance accepted for a fragment of `len` letters.
pub fn near_word_threshold(len: usize) -> usize {
    if len <= 5 {
        1
    } else {
        2
    }
}

/// Closest corpus word to `fragment` within the distance threshold, among
/// words of length len-1..=len+1 sharing its first letter. At most
/// `scan_limit` words are compared; ties keep the first word scanned.
pub fn find_near_word(
    corpus: &WordCorpus,
    fragment: &str,
    scan_limit: usize,
) -> Option<(String, usize)> {
    let first = fragment.chars().next()?;
    let len = fragment.len();
    let threshold = near_word_threshold(len);
    let mut best: Option<(&str, usize)> = None;

    let candidates = [len.saturating_sub(1), len, len + 1]
        .into_iter()
        .filter(|l| *l >= MIN_WINDOW)
        .flat_map(|l| corpus.near_candidates(l, first))
        .take(scan_limit);

    for word in candidates {
        let distance = levenshtein(fragment, word);
        if distance == 0 || distance > threshold {
            continue;
        }
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((word, distance));
            if distance == 1 {
                break;
            }
        }
    }
    best.map(|(w, d)| (w.to_string(), d))
}

struct Candidate {
    span: Span,
    token: Token,
}

/// Greedy span selection: longer first, then earlier; a candidate is kept
/// only if it overlaps nothing already accepted.
fn claim(accepted: &mut Vec<Candidate>, mut pending: Vec<Candidate>) {
    pending.sort_by(|a, b| {
        b.span
            .len()
            .cmp(&a.span.len())
            .then(a.span.start.cmp(&b.span.start))
    });
    for cand in pending {
        if accepted.iter().all(|a| !a.span.overlaps(&cand.span)) {
            accepted.push(cand);
        }
    }
}

/// Mine `raw` for real words, near-words and neologisms with per-span
/// deduplication. Word matches claim spans before neologisms. Spans are
/// byte offsets; windows touching non-ASCII characters yield nothing.
pub fn extract_tokens(
    corpus: &WordCorpus,
    raw: &str,
    near_words: bool,
    scan_limit: usize,
) -> Vec<Token> {
    let text = raw.to_ascii_lowercase();
    let n = text.len();

    let windows = || {
        (MIN_WINDOW..=MAX_WINDOW)
            .flat_map(move |win| (0..=n.saturating_sub(win)).map(move |start| Span::new(start, start + win)))
            .filter(move |span| span.end <= n)
    };

    let mut exact = Vec::new();
    for span in windows() {
        let Some(fragment) = text.get(span.start..span.end) else { continue };
        if fragment.chars().all(|c| c.is_ascii_lowercase()) && corpus.contains(fragment) {
            exact.push(Candidate {
                span,
                token: Token::real_word(fragment, span),
            });
        }
    }

    let mut near = Vec::new();
    let mut novel = Vec::new();
    for span in windows() {
        let Some(fragment) = text.get(span.start..span.end) else { continue };
        if !fragment.chars().all(|c| c.is_ascii_lowercase()) || corpus.contains(fragment) {
            continue;
        }

        if near_words && span.len() >= NEAR_WORD_MIN_LEN {
            if let Some((matched, distance)) = find_near_word(corpus, fragment, scan_limit) {
                // a near match onto a word already present verbatim adds nothing
                let already_real = exact.iter().any(|c| c.token.text == matched);
                if !already_real {
                    near.push(Candidate {
                        span,
                        token: Token::near_word(fragment, matched, distance, span),
                    });
                    continue;
                }
            }
        }

        if (NEOLOGISM_MIN_LEN..=NEOLOGISM_MAX_LEN).contains(&span.len())
            && phonetics::is_plausible(fragment)
        {
            novel.push(Candidate {
                span,
                token: Token {
                    text: fragment.to_string(),
                    kind: TokenKind::Neologism {
                        mood: phonetics::analyze_mood(fragment),
                        mood_score: phonetics::mood_score(fragment),
                        pronounceability: phonetics::pronounceability(fragment),
                    },
                    span: Some(span),
                },
            });
        }
    }

    let mut accepted = Vec::new();
    exact.extend(near);
    claim(&mut accepted, exact);
    claim(&mut accepted, novel);

    accepted.sort_by(|a, b| a.span.start.cmp(&b.span.start));
    accepted.into_iter().map(|c| c.token).collect()
}
