//! Phonotactic heuristics: pronounceability, plausibility, and sound mood.
//!
//! Everything here works on ASCII letters only; other characters are
//! ignored. The scores are shallow shape checks, not phoneme analysis.

use crate::schema::token::PhoneticMood;

const VOWELS: &[char] = &['a', 'e', 'i', 'o', 'u'];
/// Sonorants; dreamy.
const SOFT: &[char] = &['l', 'm', 'n', 'r', 'w', 'y'];
/// Plosives; urgent.
const HARD: &[char] = &['k', 'p', 't', 'd', 'b', 'g'];
/// Sibilants and fricatives; secretive.
const SIBILANT: &[char] = &['s', 'z', 'f', 'v'];

/// Word-initial consonant clusters English accepts.
const VALID_ONSETS: &[&str] = &[
    "bl", "br", "cl", "cr", "dr", "fl", "fr", "gl", "gr", "pl", "pr", "sc", "sk", "sl", "sm",
    "sn", "sp", "st", "str", "sw", "tr", "tw", "th", "sh", "ch", "wh", "wr", "kn", "qu", "spr",
    "spl", "scr",
];

/// Minimum pronounceability for a neologism.
pub const PLAUSIBILITY_THRESHOLD: f32 = 0.4;

fn letters(text: &str) -> Vec<char> {
    text.chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

pub fn is_vowel(c: char) -> bool {
    VOWELS.contains(&c)
}

fn longest_run(alpha: &[char], pred: impl Fn(char) -> bool) -> usize {
    let mut run = 0;
    let mut longest = 0;
    for &c in alpha {
        if pred(c) {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    longest
}

fn onset(alpha: &[char]) -> String {
    alpha.iter().take_while(|c| !is_vowel(**c)).collect()
}

fn onset_is_valid(alpha: &[char]) -> bool {
    let cluster = onset(alpha);
    cluster.len() < 2 || VALID_ONSETS.contains(&cluster.as_str())
}

/// Fraction of letters that are vowels; 0.0 for text with no letters.
pub fn vowel_ratio(text: &str) -> f32 {
    let alpha = letters(text);
    if alpha.is_empty() {
        return 0.0;
    }
    alpha.iter().filter(|c| is_vowel(**c)).count() as f32 / alpha.len() as f32
}

/// Score 0.0-1.0 from vowel ratio, consonant and vowel runs, onset cluster
/// and tripled letters. Text without a vowel scores 0.0.
pub fn pronounceability(text: &str) -> f32 {
    let alpha = letters(text);
    if alpha.is_empty() {
        return 0.0;
    }
    let ratio = alpha.iter().filter(|c| is_vowel(**c)).count() as f32 / alpha.len() as f32;
    if ratio == 0.0 {
        return 0.0;
    }

    let mut score = 1.0f32;
    if ratio < 0.15 {
        score -= 0.4;
    } else if ratio < 0.25 {
        score -= 0.2;
    } else if ratio > 0.70 {
        score -= 0.15;
    }

    match longest_run(&alpha, |c| !is_vowel(c)) {
        n if n >= 4 => score -= 0.35,
        3 => score -= 0.10,
        _ => {}
    }

    match longest_run(&alpha, is_vowel) {
        n if n >= 4 => score -= 0.20,
        3 => score -= 0.05,
        _ => {}
    }

    if !onset_is_valid(&alpha) {
        score -= 0.15;
    }

    if alpha.windows(3).any(|w| w[0] == w[1] && w[1] == w[2]) {
        score -= 0.25;
    }

    score.clamp(0.0, 1.0)
}

pub fn is_pronounceable(text: &str, threshold: f32) -> bool {
    pronounceability(text) >= threshold
}

/// Hard phonotactic gate for neologisms: a vowel, no run of four
/// consonants, a legal onset, and pronounceability above the threshold.
pub fn is_plausible(text: &str) -> bool {
    let alpha = letters(text);
    if !alpha.iter().any(|c| is_vowel(*c)) {
        return false;
    }
    if longest_run(&alpha, |c| !is_vowel(c)) >= 4 {
        return false;
    }
    onset_is_valid(&alpha) && pronounceability(text) >= PLAUSIBILITY_THRESHOLD
}

/// Harshness in [0, 1]: weighted mean over phoneme classes.
/// Sonorant-heavy text is calm (low), plosive-heavy text harsh (high).
pub fn mood_score(text: &str) -> f32 {
    let alpha = letters(text);
    if alpha.is_empty() {
        return 0.5;
    }
    let total: f32 = alpha
        .iter()
        .map(|&c| {
            if is_vowel(c) {
                0.10
            } else if SOFT.contains(&c) {
                0.20
            } else if SIBILANT.contains(&c) {
                0.55
            } else if HARD.contains(&c) {
                0.95
            } else {
                0.50
            }
        })
        .sum();
    (total / alpha.len() as f32).clamp(0.0, 1.0)
}

/// Dominant sound class of the text.
pub fn analyze_mood(text: &str) -> PhoneticMood {
    let alpha = letters(text);
    if alpha.is_empty() {
        return PhoneticMood::Balanced;
    }
    let vowels = alpha.iter().filter(|c| is_vowel(**c)).count();
    if vowels as f32 / alpha.len() as f32 > 0.55 {
        return PhoneticMood::Flowing;
    }
    let consonants = alpha.len() - vowels;
    if consonants == 0 {
        return PhoneticMood::Flowing;
    }

    let count = |class: &[char]| alpha.iter().filter(|c| class.contains(c)).count();
    // Earlier entries win ties.
    let classes = [
        (PhoneticMood::Dreamy, count(SOFT)),
        (PhoneticMood::Urgent, count(HARD)),
        (PhoneticMood::Secretive, count(SIBILANT)),
    ];
    let mut top = classes[0];
    for candidate in &classes[1..] {
        if candidate.1 > top.1 {
            top = *candidate;
        }
    }

    if top.1 as f32 / consonants as f32 >= 0.40 {
        top.0
    } else {
        PhoneticMood::Balanced
    }
}

/// Length 3-10, starts with a consonant, has a vowel, and reads cleanly.
pub fn looks_like_name(text: &str) -> bool {
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_alphabetic()) {
        return false;
    }
    let alpha = letters(text);
    if !(3..=10).contains(&alpha.len()) || is_vowel(alpha[0]) {
        return false;
    }
    alpha.iter().any(|c| is_vowel(*c)) && is_pronounceable(text, 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_vowels_is_unpronounceable() {
        assert_eq!(pronounceability("rhythm"), 0.0);
        assert_eq!(pronounceability("xkcd"), 0.0);
        assert_eq!(pronounceability(""), 0.0);
        assert!(!is_plausible("bcdfg"));
    }

    #[test]
    fn ordinary_words_score_high() {
        assert!(pronounceability("lamorin") > 0.9);
        assert!(is_plausible("velorna"));
        assert!(is_plausible("strane"));
    }

    #[test]
    fn penalties_accumulate() {
        // consonant run of 3 (-0.10) and no onset issue
        let s = pronounceability("astrel");
        assert!((s - 0.9).abs() < 1e-5, "got {s}");
        // invalid onset "zk" (-0.15) plus vowel ratio 1/4 ok
        assert!(pronounceability("zkar") < 0.9);
        // tripled letter
        assert!(pronounceability("baaab") < 0.8);
    }

    #[test]
    fn long_consonant_runs_are_implausible() {
        assert!(!is_plausible("angstrom"));
        assert!(!is_plausible("tkalo"));
    }

    #[test]
    fn mood_score_ordering() {
        let calm = mood_score("lumenara");
        let harsh = mood_score("kadtbog");
        assert!(calm < harsh);
        assert!((0.0..=1.0).contains(&calm));
        assert!((0.0..=1.0).contains(&harsh));
        assert_eq!(mood_score("123"), 0.5);
    }

    #[test]
    fn mood_classes() {
        assert_eq!(analyze_mood("aeoual"), PhoneticMood::Flowing);
        assert_eq!(analyze_mood("lmnoral"), PhoneticMood::Dreamy);
        assert_eq!(analyze_mood("tkabdog"), PhoneticMood::Urgent);
        assert_eq!(analyze_mood("sszifv"), PhoneticMood::Secretive);
        assert_eq!(analyze_mood(""), PhoneticMood::Balanced);
    }

    #[test]
    fn names() {
        assert!(looks_like_name("velora"));
        assert!(!looks_like_name("avelor"));
        assert!(!looks_like_name("ab"));
        assert!(!looks_like_name("vel0ra"));
    }

    #[test]
    fn vowel_ratio_counts_letters_only() {
        assert!((vowel_ratio("a-b") - 0.5).abs() < 1e-6);
        assert_eq!(vowel_ratio("!!"), 0.0);
    }
}
