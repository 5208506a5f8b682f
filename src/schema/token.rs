use serde::{Deserialize, Serialize};

/// The four kinds of raw material the chaos layer emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenTag {
    RealWord,
    NearWord,
    Neologism,
    Phrase,
}

/// Overall sound-feel of a string, from its phoneme classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhoneticMood {
    /// Soft consonants dominate (l, m, n, r, w, y).
    Dreamy,
    /// Hard plosives dominate (k, p, t, d, b, g).
    Urgent,
    /// Sibilants dominate (s, z, f, v).
    Secretive,
    /// Vowel-heavy.
    Flowing,
    Balanced,
}

impl PhoneticMood {
    pub fn word(&self) -> &'static str {
        match self {
            Self::Dreamy => "dreamy",
            Self::Urgent => "urgent",
            Self::Secretive => "secretive",
            Self::Flowing => "flowing",
            Self::Balanced => "balanced",
        }
    }
}

/// Byte range of a token inside its source string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Per-kind payload of a token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenKind {
    RealWord,
    NearWord {
        matched: String,
        distance: usize,
    },
    Neologism {
        mood: PhoneticMood,
        /// 0.0 = calm, 1.0 = harsh.
        mood_score: f32,
        pronounceability: f32,
    },
    Phrase {
        words: Vec<String>,
    },
}

/// A unit of chaos output handed to the crystallizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    pub kind: TokenKind,
    /// Position in the letter-soup string; `None` for dictionary phrases.
    #[serde(default)]
    pub span: Option<Span>,
}

impl Token {
    pub fn real_word(text: impl Into<String>, span: Span) -> Self {
        Self {
            text: text.into(),
            kind: TokenKind::RealWord,
            span: Some(span),
        }
    }

    pub fn near_word(text: impl Into<String>, matched: impl Into<String>, distance: usize, span: Span) -> Self {
        Self {
            text: text.into(),
            kind: TokenKind::NearWord {
                matched: matched.into(),
                distance,
            },
            span: Some(span),
        }
    }

    pub fn phrase(words: Vec<String>) -> Self {
        Self {
            text: words.join(" "),
            kind: TokenKind::Phrase { words },
            span: None,
        }
    }

    pub fn tag(&self) -> TokenTag {
        match self.kind {
            TokenKind::RealWord => TokenTag::RealWord,
            TokenKind::NearWord { .. } => TokenTag::NearWord,
            TokenKind::Neologism { .. } => TokenTag::Neologism,
            TokenKind::Phrase { .. } => TokenTag::Phrase,
        }
    }

    /// The words this token contributes to semantic matching.
    ///
    /// Near-words match through the dictionary word they resemble.
    pub fn terms(&self) -> Vec<String> {
        match &self.kind {
            TokenKind::RealWord | TokenKind::Neologism { .. } => vec![self.text.to_lowercase()],
            TokenKind::NearWord { matched, .. } => vec![matched.to_lowercase()],
            TokenKind::Phrase { words } => words.iter().map(|w| w.to_lowercase()).collect(),
        }
    }
}
