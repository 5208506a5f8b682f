//! Ranking of scored skeletons and the hand-off shape for the downstream
//! prose collaborator.

use serde::{Deserialize, Serialize};

use crate::schema::skeleton::StorySkeleton;

/// Sort by score, highest first. Equal scores keep their input order and
/// unscored skeletons sort last.
pub fn rank(mut skeletons: Vec<StorySkeleton>) -> Vec<StorySkeleton> {
    skeletons.sort_by(|a, b| {
        let a = a.score.unwrap_or(f32::NEG_INFINITY);
        let b = b.score.unwrap_or(f32::NEG_INFINITY);
        b.total_cmp(&a)
    });
    skeletons
}

/// The first `k` of an already ranked list.
pub fn top_k(ranked: &[StorySkeleton], k: usize) -> Vec<StorySkeleton> {
    ranked.iter().take(k).cloned().collect()
}

/// How a collaborator weaves several skeletons into one piece of prose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SynthesisStrategy {
    /// Interleave the skeletons as parallel threads.
    Braided,
    /// One skeleton causes the next, which echoes the first.
    CauseAndEcho,
    /// The same events told from each skeleton's angle.
    Rashomon,
    /// An outer skeleton frames the others as told stories.
    AnthologyFrame,
}

impl SynthesisStrategy {
    pub const ALL: [SynthesisStrategy; 4] = [
        Self::Braided,
        Self::CauseAndEcho,
        Self::Rashomon,
        Self::AnthologyFrame,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Braided => "braided",
            Self::CauseAndEcho => "cause_and_echo",
            Self::Rashomon => "rashomon",
            Self::AnthologyFrame => "anthology_frame",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisRequest {
    pub skeletons: Vec<StorySkeleton>,
    /// `None` lets the collaborator choose.
    pub strategy: Option<SynthesisStrategy>,
}

impl SynthesisRequest {
    pub fn new(skeletons: Vec<StorySkeleton>, strategy: Option<SynthesisStrategy>) -> Self {
        Self { skeletons, strategy }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisResponse {
    pub prose: String,
    pub strategy_used: SynthesisStrategy,
}

/// A downstream prose writer. Failures are the implementor's concern and
/// never flow back into the pipeline.
pub trait SynthesisCollaborator {
    type Error;

    fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesisResponse, Self::Error>;
}
