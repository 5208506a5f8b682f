/// Golden-file test for the seed-42 letter soup: three 200-letter strings
/// and the tokens mined from them, checked against a committed token list.

use serde::Deserialize;
use skeleton_forge::core::corpus::WordCorpus;
use skeleton_forge::core::letter_soup::{LetterSoup, SoupString};
use skeleton_forge::core::seed::SeedManager;
use skeleton_forge::schema::token::{Span, TokenKind, TokenTag};
use std::path::Path;

const GOLDEN: &str = "tests/fixtures/golden/soup_seed42.ron";

#[derive(Debug, PartialEq, Deserialize)]
struct GoldenString {
    raw: String,
    tokens: Vec<GoldenToken>,
}

#[derive(Debug, PartialEq, Deserialize)]
struct GoldenToken {
    text: String,
    tag: TokenTag,
    span: Span,
    #[serde(default)]
    matched: Option<String>,
}

fn seed_42_soup() -> Vec<SoupString> {
    let corpus = WordCorpus::load(Path::new("tests/fixtures/words.txt")).unwrap();
    LetterSoup::new(&corpus, SeedManager::new(42).derive(&["soup"]), 200, 3).collect()
}

fn token_list(soup: &[SoupString]) -> Vec<GoldenString> {
    soup.iter()
        .map(|s| GoldenString {
            raw: s.raw.clone(),
            tokens: s
                .tokens
                .iter()
                .map(|t| GoldenToken {
                    text: t.text.clone(),
                    tag: t.tag(),
                    span: t.span.expect("soup tokens carry spans"),
                    matched: match &t.kind {
                        TokenKind::NearWord { matched, .. } => Some(matched.clone()),
                        _ => None,
                    },
                })
                .collect(),
        })
        .collect()
}

fn load_golden() -> Vec<GoldenString> {
    let text = std::fs::read_to_string(GOLDEN)
        .unwrap_or_else(|e| panic!("golden file {GOLDEN} is missing or unreadable: {e}"));
    ron::from_str(&text).unwrap_or_else(|e| panic!("golden file {GOLDEN} does not parse: {e}"))
}

#[test]
fn seed_42_soup_matches_golden() {
    let golden = load_golden();
    let actual = token_list(&seed_42_soup());
    assert_eq!(actual.len(), golden.len());
    for (i, (a, g)) in actual.iter().zip(&golden).enumerate() {
        assert_eq!(a.raw, g.raw, "raw string {i} drifted from {GOLDEN}");
        assert_eq!(a.tokens, g.tokens, "tokens of string {i} drifted from {GOLDEN}");
    }
}

#[test]
fn golden_list_is_well_formed() {
    let golden = load_golden();
    assert_eq!(golden.len(), 3);
    for s in &golden {
        assert_eq!(s.raw.len(), 200);
        for t in &s.tokens {
            assert_eq!(&s.raw[t.span.start..t.span.end], t.text);
            assert_eq!(t.matched.is_some(), t.tag == TokenTag::NearWord);
        }
        for w in s.tokens.windows(2) {
            assert!(w[0].span.end <= w[1].span.start);
        }
    }
}

#[test]
fn seed_42_soup_is_stable_within_a_process() {
    let a = seed_42_soup();
    let b = seed_42_soup();
    assert_eq!(a.len(), 3);
    assert!(a.iter().all(|s| s.raw.len() == 200));
    assert_eq!(a, b);
}
