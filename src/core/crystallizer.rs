//! Atom crystallizer: maps chaos tokens onto catalogue atoms, minting
//! ephemeral atoms when nothing matches well enough.
//!
//! Matching is lexical. A token's content words are compared with each
//! atom's tags and label words:
//!
//! - equal terms score 1.0
//! - otherwise the normalized Levenshtein similarity, raised to 0.85 when
//!   the terms share a prefix of four or more letters
//!
//! A token scores `0.7 * max + 0.3 * mean` over its terms' best matches.
//! The best atom at or above the threshold wins; ties go to the atom
//! inserted first.

use rustc_hash::{FxHashMap, FxHashSet, FxHasher};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use strsim::normalized_levenshtein;

use crate::core::catalogue::AtomCatalogue;
use crate::core::corpus::PartOfSpeech;
use crate::core::phonetics;
use crate::schema::atom::{AtomCategory, AtomId, AtomOrigin, StoryAtom};
use crate::schema::token::{PhoneticMood, Token, TokenKind};

pub const DEFAULT_THRESHOLD: f32 = 0.8;
pub const DEFAULT_PARTIAL_FLOOR: f32 = 0.5;
pub const DEFAULT_MAX_ATOMS_PER_CATEGORY: usize = 10;

/// Shared prefix length that counts as a stem match.
const STEM_PREFIX: usize = 4;
const STEM_SIMILARITY: f32 = 0.85;

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "of", "and", "or", "to", "in", "on", "at", "by", "for", "with", "from",
    "every", "does", "why", "is", "it", "its", "that", "this", "as",
];

const NOUN_DEFINITIONS: &[&str] = &[
    "a {mood} substance found only in forgotten places",
    "the feeling of {mood} awareness that comes without warning",
    "a type of silence that tastes {mood}",
    "the residue left behind when {context} fades",
];
const VERB_DEFINITIONS: &[&str] = &[
    "to move in a {mood} manner through {context}",
    "to transform {context} into something {mood}",
    "to speak without words, conveying {mood} intent",
];
const ADJECTIVE_DEFINITIONS: &[&str] = &[
    "having the quality of {mood} {context}",
    "resembling something both {mood} and forgotten",
    "possessing an inexplicable {mood} character",
];
const ADVERB_DEFINITIONS: &[&str] = &[
    "in a {mood} fashion, as if {context} were watching",
    "with the {mood} precision of {context}",
];
/// Harshness below which a mood reads calm, and above which it reads harsh.
const CALM_BELOW: f32 = 0.3;
const HARSH_ABOVE: f32 = 0.6;

const CONTEXTS: &[&str] = &[
    "the unknown",
    "an old house",
    "the tide",
    "a stranger's memory",
    "the last lantern",
    "a closed door",
];

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Lowercased content words of `text`, split on anything non-alphabetic.
fn content_words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_ascii_alphabetic())
        .filter(|w| w.len() >= 2)
        .map(|w| w.to_ascii_lowercase())
        .filter(|w| !is_stop_word(w))
}

fn atom_terms(atom: &StoryAtom) -> Vec<String> {
    let mut seen = FxHashSet::default();
    atom.tags
        .iter()
        .flat_map(|t| content_words(t).collect::<Vec<_>>())
        .chain(content_words(&atom.label))
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

fn token_terms(token: &Token) -> Vec<String> {
    token
        .terms()
        .iter()
        .flat_map(|t| content_words(t).collect::<Vec<_>>())
        .collect()
}

/// Similarity of two lowercase terms in [0, 1].
pub fn term_similarity(a: &str, b: &str) -> f32 {
    if a == b {
        return 1.0;
    }
    let base = normalized_levenshtein(a, b) as f32;
    let shared = a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count();
    if shared >= STEM_PREFIX {
        base.max(STEM_SIMILARITY)
    } else {
        base
    }
}

fn terms_similarity(token_terms: &[String], atom_terms: &[String]) -> f32 {
    if token_terms.is_empty() || atom_terms.is_empty() {
        return 0.0;
    }
    let best: Vec<f32> = token_terms
        .iter()
        .map(|t| {
            atom_terms
                .iter()
                .map(|a| term_similarity(t, a))
                .fold(0.0f32, f32::max)
        })
        .collect();
    let max = best.iter().copied().fold(0.0f32, f32::max);
    let mean = best.iter().sum::<f32>() / best.len() as f32;
    0.7 * max + 0.3 * mean
}

/// Part of speech of an invented word, from its shape alone.
pub fn infer_part_of_speech(word: &str) -> PartOfSpeech {
    let w = word.to_ascii_lowercase();
    let ends = |suffixes: &[&str]| suffixes.iter().any(|s| w.ends_with(s));
    if w.ends_with("ly") {
        PartOfSpeech::Adverb
    } else if ends(&["ness", "tion", "sion", "ity", "ment"]) {
        PartOfSpeech::Noun
    } else if ends(&["ful", "ous", "ive", "al", "ent", "ant"]) {
        PartOfSpeech::Adjective
    } else if ends(&["ize", "ify", "ate", "ed", "ing"])
        || ["un", "re", "de"].iter().any(|p| w.starts_with(p))
    {
        PartOfSpeech::Verb
    } else {
        PartOfSpeech::Noun
    }
}

/// Category of an invented word from its shape.
pub fn infer_category(word: &str) -> AtomCategory {
    let w = word.to_ascii_lowercase();
    match infer_part_of_speech(&w) {
        PartOfSpeech::Adverb | PartOfSpeech::Adjective => AtomCategory::Quality,
        PartOfSpeech::Verb => AtomCategory::Trigger,
        PartOfSpeech::Noun => {
            if ["ness", "tion", "sion", "ity", "ment"].iter().any(|s| w.ends_with(s)) {
                AtomCategory::Tension
            } else if phonetics::looks_like_name(&w) && w.len() <= 6 {
                AtomCategory::Agent
            } else if w.len() >= 6 && w.chars().last().is_some_and(phonetics::is_vowel) {
                AtomCategory::Location
            } else {
                AtomCategory::Object
            }
        }
    }
}

fn text_hash(text: &str) -> u64 {
    let mut hasher = FxHasher::default();
    text.hash(&mut hasher);
    hasher.finish()
}

fn intensified(mood: PhoneticMood, mood_score: f32) -> String {
    if mood_score < CALM_BELOW {
        format!("gently {}", mood.word())
    } else if mood_score > HARSH_ABOVE {
        format!("fiercely {}", mood.word())
    } else {
        mood.word().to_string()
    }
}

fn category_gloss(category: AtomCategory) -> Option<&'static str> {
    match category {
        AtomCategory::Agent => Some("said of a person or presence"),
        AtomCategory::Object => Some("said of a thing that can be carried"),
        AtomCategory::Location => Some("said of a place"),
        AtomCategory::Tension => Some("said of a pressure that builds"),
        AtomCategory::Trigger => Some("said of a moment that sets things moving"),
        AtomCategory::Quality => Some("said of a manner or feel"),
        AtomCategory::Unspecified => None,
    }
}

/// Synthesized dictionary-style definition for an invented word. The mood
/// word is softened or sharpened by `mood_score` and the entry ends with a
/// gloss for `category`.
pub fn define_neologism(word: &str, mood: PhoneticMood, mood_score: f32, category: AtomCategory) -> String {
    let templates = match infer_part_of_speech(word) {
        PartOfSpeech::Noun => NOUN_DEFINITIONS,
        PartOfSpeech::Verb => VERB_DEFINITIONS,
        PartOfSpeech::Adjective => ADJECTIVE_DEFINITIONS,
        PartOfSpeech::Adverb => ADVERB_DEFINITIONS,
    };
    let hash = text_hash(word);
    let template = templates[(hash % templates.len() as u64) as usize];
    let context = CONTEXTS[((hash >> 16) % CONTEXTS.len() as u64) as usize];
    let body = template
        .replace("{mood}", &intensified(mood, mood_score))
        .replace("{context}", context);
    match category_gloss(category) {
        Some(gloss) => format!("{body}; {gloss}"),
        None => body,
    }
}

/// Read-only categorized atom pool shared by every skeleton generator.
#[derive(Debug, Clone, Default)]
pub struct AtomPool {
    atoms: Vec<Arc<StoryAtom>>,
    by_category: FxHashMap<AtomCategory, Vec<Arc<StoryAtom>>>,
    ids: FxHashSet<AtomId>,
    cap: Option<usize>,
}

impl AtomPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// A pool that accepts at most `cap` atoms per category.
    pub fn with_category_cap(cap: usize) -> Self {
        Self {
            cap: Some(cap),
            ..Self::default()
        }
    }

    pub fn from_atoms(atoms: impl IntoIterator<Item = Arc<StoryAtom>>) -> Self {
        let mut pool = Self::new();
        for atom in atoms {
            pool.push(atom);
        }
        pool
    }

    /// Add an atom unless its id is present or its category is full.
    pub fn push(&mut self, atom: Arc<StoryAtom>) -> bool {
        if self.ids.contains(&atom.id) {
            return false;
        }
        let list = self.by_category.entry(atom.category).or_default();
        if self.cap.is_some_and(|cap| list.len() >= cap) {
            return false;
        }
        list.push(Arc::clone(&atom));
        self.ids.insert(atom.id);
        self.atoms.push(atom);
        true
    }

    pub fn of(&self, category: AtomCategory) -> &[Arc<StoryAtom>] {
        self.by_category
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every atom in insertion order.
    pub fn all(&self) -> &[Arc<StoryAtom>] {
        &self.atoms
    }

    pub fn contains(&self, id: AtomId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// `dominant-<category>; tag tag tag tag`, empty for an empty pool.
    pub fn theme_summary(&self) -> String {
        if self.atoms.is_empty() {
            return String::new();
        }
        let mut dominant = (AtomCategory::Unspecified, 0usize);
        for category in AtomCategory::ALL.iter().chain([AtomCategory::Unspecified].iter()) {
            let n = self.of(*category).len();
            if n > dominant.1 {
                dominant = (*category, n);
            }
        }

        let mut seen = FxHashSet::default();
        let tags: Vec<&str> = self
            .atoms
            .iter()
            .flat_map(|a| a.tags.iter())
            .map(String::as_str)
            .filter(|t| AtomCategory::ALL.iter().all(|c| c.tag() != *t))
            .filter(|t| seen.insert(*t))
            .take(4)
            .collect();

        if tags.is_empty() {
            format!("dominant-{}", dominant.0.tag())
        } else {
            format!("dominant-{}; {}", dominant.0.tag(), tags.join(" "))
        }
    }
}

/// Maps tokens to atoms against a borrowed catalogue.
pub struct Crystallizer<'a> {
    catalogue: &'a AtomCatalogue,
    terms: Vec<Vec<String>>,
    threshold: f32,
    partial_floor: f32,
    max_per_category: usize,
}

impl<'a> Crystallizer<'a> {
    pub fn new(catalogue: &'a AtomCatalogue) -> Self {
        Self {
            catalogue,
            terms: catalogue.atoms().iter().map(|a| atom_terms(a)).collect(),
            threshold: DEFAULT_THRESHOLD,
            partial_floor: DEFAULT_PARTIAL_FLOOR,
            max_per_category: DEFAULT_MAX_ATOMS_PER_CATEGORY,
        }
    }

    pub fn threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn partial_floor(mut self, floor: f32) -> Self {
        self.partial_floor = floor;
        self
    }

    pub fn max_atoms_per_category(mut self, max: usize) -> Self {
        self.max_per_category = max;
        self
    }

    /// Similarity between a token and a catalogue atom.
    pub fn similarity(&self, token: &Token, atom: &StoryAtom) -> f32 {
        terms_similarity(&token_terms(token), &atom_terms(atom))
    }

    /// Best catalogue index and score for a token; earliest atom wins ties.
    pub fn best_match(&self, token: &Token) -> Option<(usize, f32)> {
        let terms = token_terms(token);
        let mut best: Option<(usize, f32)> = None;
        for (i, atom_terms) in self.terms.iter().enumerate() {
            let score = terms_similarity(&terms, atom_terms);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((i, score));
            }
        }
        best
    }

    /// Map a token to an atom. Never fails: the worst case is an
    /// ephemeral atom in the Unspecified category.
    pub fn crystallize(&self, token: &Token) -> StoryAtom {
        StoryAtom::clone(&self.crystallize_shared(token))
    }

    /// As [`crystallize`](Self::crystallize), sharing catalogue atoms
    /// instead of copying them.
    pub fn crystallize_shared(&self, token: &Token) -> Arc<StoryAtom> {
        if let TokenKind::Neologism { mood, mood_score, .. } = &token.kind {
            return Arc::new(self.mint_neologism(token, *mood, *mood_score));
        }

        let best = self.best_match(token);
        if let Some((i, score)) = best {
            if score >= self.threshold {
                return Arc::clone(&self.catalogue.atoms()[i]);
            }
        }

        let partial = best
            .filter(|(_, score)| *score >= self.partial_floor)
            .map(|(i, _)| &self.catalogue.atoms()[i]);
        Arc::new(self.mint_unmatched(token, partial))
    }

    fn mint_neologism(&self, token: &Token, mood: PhoneticMood, mood_score: f32) -> StoryAtom {
        let category = infer_category(&token.text);
        let pos = match infer_part_of_speech(&token.text) {
            PartOfSpeech::Noun => "noun",
            PartOfSpeech::Verb => "verb",
            PartOfSpeech::Adjective => "adjective",
            PartOfSpeech::Adverb => "adverb",
        };
        StoryAtom {
            id: AtomId::ephemeral(category, &token.text),
            category,
            label: token.text.clone(),
            tags: vec![mood.word().to_string(), pos.to_string(), "invented".to_string()],
            rarity: 0.8,
            origin: AtomOrigin::Ephemeral {
                source: token.tag(),
                definition: define_neologism(&token.text, mood, mood_score, category),
            },
        }
    }

    fn mint_unmatched(&self, token: &Token, partial: Option<&Arc<StoryAtom>>) -> StoryAtom {
        let category = partial.map_or(AtomCategory::Unspecified, |a| a.category);
        let definition = match partial {
            Some(atom) => format!("something akin to {}", atom.label),
            None => format!("an unplaced fragment: {}", token.text),
        };
        let mut seen = FxHashSet::default();
        let tags: Vec<String> = token_terms(token)
            .into_iter()
            .filter(|t| seen.insert(t.clone()))
            .collect();
        StoryAtom {
            id: AtomId::ephemeral(category, &token.text),
            category,
            label: token.text.clone(),
            tags,
            rarity: 0.7,
            origin: AtomOrigin::Ephemeral {
                source: token.tag(),
                definition,
            },
        }
    }

    /// Crystallize every token into a deduplicated, per-category capped pool.
    pub fn crystallize_all<'t>(&self, tokens: impl IntoIterator<Item = &'t Token>) -> AtomPool {
        let mut pool = AtomPool::with_category_cap(self.max_per_category);
        let mut ephemeral = 0usize;
        for token in tokens {
            let atom = self.crystallize_shared(token);
            let is_ephemeral = atom.is_ephemeral();
            if pool.push(atom) && is_ephemeral {
                ephemeral += 1;
            }
        }
        tracing::debug!(
            atoms = pool.len(),
            ephemeral,
            theme = %pool.theme_summary(),
            "crystallized tokens"
        );
        pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::token::{Span, TokenTag};

    const CATALOGUE: &str = r#"(
        atoms: [
            (id: 1, category: Agent, label: "the wanderer", tags: ["journey", "solitude", "traveler"]),
            (id: 2, category: Object, label: "the broken compass", tags: ["navigation", "broken", "lost"]),
            (id: 3, category: Location, label: "the drowned city", tags: ["water", "ancient", "ruin"]),
            (id: 4, category: Tension, label: "a debt unpaid", tags: ["debt", "obligation"]),
            (id: 5, category: Object, label: "the second compass", tags: ["navigation"]),
        ],
    )"#;

    fn catalogue() -> AtomCatalogue {
        AtomCatalogue::parse_ron(CATALOGUE).unwrap()
    }

    fn word(text: &str) -> Token {
        Token::real_word(text, Span::new(0, text.len()))
    }

    fn neologism(text: &str) -> Token {
        Token {
            text: text.to_string(),
            kind: TokenKind::Neologism {
                mood: phonetics::analyze_mood(text),
                mood_score: phonetics::mood_score(text),
                pronounceability: phonetics::pronounceability(text),
            },
            span: Some(Span::new(0, text.len())),
        }
    }

    #[test]
    fn term_similarity_rules() {
        assert_eq!(term_similarity("water", "water"), 1.0);
        assert!(term_similarity("journeying", "journey") >= STEM_SIMILARITY);
        assert!(term_similarity("cat", "dog") < 0.5);
    }

    #[test]
    fn exact_tag_maps_to_catalogue() {
        let cat = catalogue();
        let cr = Crystallizer::new(&cat);
        let atom = cr.crystallize(&word("water"));
        assert_eq!(atom.id, AtomId(3));
        assert!(!atom.is_ephemeral());
    }

    #[test]
    fn near_word_matches_through_dictionary_word() {
        let cat = catalogue();
        let cr = Crystallizer::new(&cat);
        let tok = Token::near_word("jurney", "journey", 1, Span::new(0, 6));
        assert_eq!(cr.crystallize(&tok).id, AtomId(1));
    }

    #[test]
    fn ties_keep_catalogue_order() {
        let cat = catalogue();
        let cr = Crystallizer::new(&cat);
        // "navigation" is an exact tag on atoms 2 and 5
        assert_eq!(cr.crystallize(&word("navigation")).id, AtomId(2));
    }

    #[test]
    fn phrases_match_on_best_word() {
        let cat = catalogue();
        let cr = Crystallizer::new(&cat);
        let tok = Token::phrase(vec!["the".into(), "ancient".into(), "water".into()]);
        assert_eq!(cr.crystallize(&tok).id, AtomId(3));
    }

    #[test]
    fn partial_match_keeps_category() {
        let cat = catalogue();
        let cr = Crystallizer::new(&cat).threshold(0.95).partial_floor(0.5);
        // "debts" is close to "debt" but not equal
        let atom = cr.crystallize(&word("debts"));
        assert!(atom.is_ephemeral());
        assert_eq!(atom.category, AtomCategory::Tension);
        assert_eq!(atom.label, "debts");
        assert!(atom.definition().unwrap().contains("a debt unpaid"));
    }

    #[test]
    fn no_match_is_unspecified() {
        let cat = catalogue();
        let cr = Crystallizer::new(&cat);
        let atom = cr.crystallize(&word("xyzzy"));
        assert!(atom.is_ephemeral());
        assert_eq!(atom.category, AtomCategory::Unspecified);
        assert!(atom.id.is_ephemeral());
    }

    #[test]
    fn empty_catalogue_never_fails() {
        let cat = AtomCatalogue::default();
        let cr = Crystallizer::new(&cat);
        let atom = cr.crystallize(&word("water"));
        assert_eq!(atom.category, AtomCategory::Unspecified);
    }

    #[test]
    fn neologisms_always_mint() {
        let cat = catalogue();
        let cr = Crystallizer::new(&cat);
        // even a neologism spelled like a tag is invented
        let atom = cr.crystallize(&neologism("water"));
        assert!(atom.is_ephemeral());
        match &atom.origin {
            AtomOrigin::Ephemeral { source, definition } => {
                assert_eq!(*source, TokenTag::Neologism);
                assert!(!definition.is_empty());
                assert!(!definition.contains('{'));
            }
            AtomOrigin::Catalogue => unreachable!(),
        }
    }

    #[test]
    fn neologism_shapes() {
        assert_eq!(infer_part_of_speech("glimly"), PartOfSpeech::Adverb);
        assert_eq!(infer_part_of_speech("vornness"), PartOfSpeech::Noun);
        assert_eq!(infer_part_of_speech("brintous"), PartOfSpeech::Adjective);
        assert_eq!(infer_part_of_speech("unvelt"), PartOfSpeech::Verb);
        assert_eq!(infer_category("glimly"), AtomCategory::Quality);
        assert_eq!(infer_category("unvelt"), AtomCategory::Trigger);
        assert_eq!(infer_category("vornness"), AtomCategory::Tension);
        assert_eq!(infer_category("velor"), AtomCategory::Agent);
        assert_eq!(infer_category("aomirena"), AtomCategory::Location);
        assert_eq!(infer_category("aomirk"), AtomCategory::Object);
    }

    #[test]
    fn definitions_are_deterministic() {
        let a = define_neologism("velorin", PhoneticMood::Dreamy, 0.45, AtomCategory::Location);
        let b = define_neologism("velorin", PhoneticMood::Dreamy, 0.45, AtomCategory::Location);
        assert_eq!(a, b);
        assert!(a.contains("dreamy"));
        assert!(a.ends_with("; said of a place"), "{a}");
    }

    #[test]
    fn definitions_follow_mood_score_and_category() {
        let calm = define_neologism("velorin", PhoneticMood::Dreamy, 0.1, AtomCategory::Agent);
        let harsh = define_neologism("velorin", PhoneticMood::Dreamy, 0.9, AtomCategory::Agent);
        assert!(calm.contains("gently dreamy"), "{calm}");
        assert!(harsh.contains("fiercely dreamy"), "{harsh}");
        assert!(calm.ends_with("said of a person or presence"));

        let object = define_neologism("velorin", PhoneticMood::Dreamy, 0.1, AtomCategory::Object);
        assert_ne!(calm, object);
        let loose = define_neologism("velorin", PhoneticMood::Dreamy, 0.1, AtomCategory::Unspecified);
        assert!(!loose.contains("said of"));
    }

    #[test]
    fn minted_neologism_definition_uses_token_scores() {
        let cat = catalogue();
        let atom = Crystallizer::new(&cat).crystallize(&neologism("velor"));
        assert_eq!(atom.category, AtomCategory::Agent);
        let expected = define_neologism(
            "velor",
            phonetics::analyze_mood("velor"),
            phonetics::mood_score("velor"),
            AtomCategory::Agent,
        );
        assert_eq!(atom.definition(), Some(expected.as_str()));
        assert!(expected.ends_with("said of a person or presence"));
    }

    #[test]
    fn pool_dedups_and_caps() {
        let cat = catalogue();
        let cr = Crystallizer::new(&cat).max_atoms_per_category(1);
        let tokens = vec![word("water"), word("ancient"), word("navigation"), word("lost")];
        let pool = cr.crystallize_all(&tokens);
        // water/ancient both map to atom 3; navigation -> 2; lost -> 2 again
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.of(AtomCategory::Location).len(), 1);
        assert_eq!(pool.of(AtomCategory::Object).len(), 1);
        assert!(pool.contains(AtomId(3)));
        assert!(pool.theme_summary().starts_with("dominant-"));
    }

    #[test]
    fn empty_pool_summary() {
        assert_eq!(AtomPool::new().theme_summary(), "");
    }
}
