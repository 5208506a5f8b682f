//! Markov beat sequencer: walks a fixed transition table over narrative
//! beats, then binds each beat to an atom of the beat's expected category.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::core::catalogue::AtomCatalogue;
use crate::core::crystallizer::AtomPool;
use crate::core::seed::SeedStream;
use crate::core::spread::SlotFiller;
use crate::schema::atom::AtomCategory;
use crate::schema::skeleton::{Strategy, StorySkeleton};

#[derive(Debug, Error)]
pub enum MarkovError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("transition {from:?} -> {to:?} has invalid weight {weight}")]
    InvalidWeight {
        from: BeatType,
        to: BeatType,
        weight: f32,
    },
}

pub const DEFAULT_MIN_BEATS: usize = 5;
pub const DEFAULT_MAX_BEATS: usize = 12;

const BEAT_COUNT: usize = 13;

/// The thirteen narrative beats. Opening is the only start state;
/// Resolution and Denouement are the only terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BeatType {
    Opening,
    WorldBuilding,
    CharacterIntro,
    IncitingIncident,
    RisingAction,
    Tension,
    Complication,
    Revelation,
    Midpoint,
    Crisis,
    Climax,
    Resolution,
    Denouement,
}

impl BeatType {
    pub const ALL: [BeatType; BEAT_COUNT] = [
        Self::Opening,
        Self::WorldBuilding,
        Self::CharacterIntro,
        Self::IncitingIncident,
        Self::RisingAction,
        Self::Tension,
        Self::Complication,
        Self::Revelation,
        Self::Midpoint,
        Self::Crisis,
        Self::Climax,
        Self::Resolution,
        Self::Denouement,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolution | Self::Denouement)
    }

    /// Slot name used in generated skeletons.
    pub fn label(self) -> &'static str {
        match self {
            Self::Opening => "opening",
            Self::WorldBuilding => "world building",
            Self::CharacterIntro => "character intro",
            Self::IncitingIncident => "inciting incident",
            Self::RisingAction => "rising action",
            Self::Tension => "tension",
            Self::Complication => "complication",
            Self::Revelation => "revelation",
            Self::Midpoint => "midpoint",
            Self::Crisis => "crisis",
            Self::Climax => "climax",
            Self::Resolution => "resolution",
            Self::Denouement => "denouement",
        }
    }

    /// Inverse of [`BeatType::label`].
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|beat| beat.label() == label)
    }

    /// The atom category a beat expects.
    pub fn category(self) -> AtomCategory {
        match self {
            Self::Opening | Self::WorldBuilding => AtomCategory::Location,
            Self::CharacterIntro => AtomCategory::Agent,
            Self::IncitingIncident | Self::Revelation | Self::Climax => AtomCategory::Trigger,
            Self::RisingAction | Self::Tension | Self::Complication | Self::Crisis => {
                AtomCategory::Tension
            }
            Self::Midpoint | Self::Resolution => AtomCategory::Object,
            Self::Denouement => AtomCategory::Quality,
        }
    }
}

/// On-disk shape of a transition table: from -> (to -> weight).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BeatTableFile {
    pub transitions: BTreeMap<BeatType, BTreeMap<BeatType, f32>>,
}

/// Fixed beat-to-beat transition weights. Self-transitions are always zero.
#[derive(Debug, Clone, PartialEq)]
pub struct BeatTable {
    weights: [[f32; BEAT_COUNT]; BEAT_COUNT],
}

impl Default for BeatTable {
    fn default() -> Self {
        use BeatType::*;
        let rows: &[(BeatType, &[(BeatType, f32)])] = &[
            (Opening, &[(WorldBuilding, 3.0), (CharacterIntro, 3.0), (IncitingIncident, 2.0), (Tension, 1.0)]),
            (WorldBuilding, &[(CharacterIntro, 3.0), (IncitingIncident, 2.0), (RisingAction, 1.0), (Revelation, 0.5)]),
            (CharacterIntro, &[(IncitingIncident, 3.0), (RisingAction, 2.0), (WorldBuilding, 1.0), (Tension, 1.0)]),
            (IncitingIncident, &[(RisingAction, 4.0), (Complication, 2.0), (Tension, 2.0)]),
            (RisingAction, &[(Tension, 3.0), (Complication, 3.0), (Midpoint, 2.0), (Revelation, 1.0)]),
            (Tension, &[(Complication, 2.0), (Revelation, 2.0), (Crisis, 2.0), (Midpoint, 1.0), (RisingAction, 1.0)]),
            (Complication, &[(Tension, 2.0), (Revelation, 2.0), (Midpoint, 2.0), (Crisis, 2.0)]),
            (Revelation, &[(Midpoint, 2.0), (Crisis, 2.0), (Climax, 2.0), (Complication, 1.0)]),
            (Midpoint, &[(Tension, 2.0), (Complication, 2.0), (Crisis, 2.0), (RisingAction, 1.0), (Revelation, 1.0)]),
            (Crisis, &[(Climax, 5.0), (Revelation, 1.0), (Tension, 1.0)]),
            (Climax, &[(Resolution, 5.0), (Denouement, 2.0), (Revelation, 1.0)]),
            (Resolution, &[(Denouement, 3.0)]),
            (Denouement, &[(Resolution, 1.0)]),
        ];

        let mut weights = [[0.0; BEAT_COUNT]; BEAT_COUNT];
        for (from, row) in rows {
            for (to, w) in row.iter() {
                weights[from.index()][to.index()] = *w;
            }
        }
        Self { weights }
    }
}

impl BeatTable {
    pub fn from_file(file: BeatTableFile) -> Result<Self, MarkovError> {
        let mut weights = [[0.0; BEAT_COUNT]; BEAT_COUNT];
        for (from, row) in &file.transitions {
            for (to, weight) in row {
                if !weight.is_finite() || *weight < 0.0 {
                    return Err(MarkovError::InvalidWeight {
                        from: *from,
                        to: *to,
                        weight: *weight,
                    });
                }
                if from != to {
                    weights[from.index()][to.index()] = *weight;
                }
            }
        }
        Ok(Self { weights })
    }

    pub fn parse_ron(input: &str) -> Result<Self, MarkovError> {
        let file: BeatTableFile = ron::from_str(input)?;
        Self::from_file(file)
    }

    pub fn load_from_ron(path: &Path) -> Result<Self, MarkovError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn to_file(&self) -> BeatTableFile {
        let mut transitions = BTreeMap::new();
        for from in BeatType::ALL {
            let row: BTreeMap<BeatType, f32> = BeatType::ALL
                .iter()
                .map(|to| (*to, self.weight(from, *to)))
                .filter(|(_, w)| *w > 0.0)
                .collect();
            if !row.is_empty() {
                transitions.insert(from, row);
            }
        }
        BeatTableFile { transitions }
    }

    pub fn weight(&self, from: BeatType, to: BeatType) -> f32 {
        self.weights[from.index()][to.index()]
    }

    /// Row-normalized transition probability; 0.0 out of a dead-end row.
    pub fn probability(&self, from: BeatType, to: BeatType) -> f32 {
        let row_total: f32 = self.weights[from.index()].iter().sum();
        if row_total > 0.0 {
            self.weight(from, to) / row_total
        } else {
            0.0
        }
    }

    /// Mean transition probability along `beats`, `None` below two beats.
    pub fn flow(&self, beats: &[BeatType]) -> Option<f32> {
        if beats.len() < 2 {
            return None;
        }
        let total: f32 = beats.windows(2).map(|w| self.probability(w[0], w[1])).sum();
        Some(total / (beats.len() - 1) as f32)
    }

    /// Walk the chain from Opening.
    ///
    /// Terminal beats are masked until `min_beats - 1` beats exist; once
    /// `max_beats - 1` beats exist the next beat is forced terminal, picked
    /// by the row's terminal weights (Resolution when both are zero).
    pub fn walk(&self, stream: &mut SeedStream, min_beats: usize, max_beats: usize) -> Vec<BeatType> {
        let max_beats = max_beats.max(2);
        let min_beats = min_beats.clamp(2, max_beats);
        let mut sequence = vec![BeatType::Opening];

        loop {
            let current = sequence[sequence.len() - 1];
            if current.is_terminal() && sequence.len() >= min_beats {
                break;
            }
            if sequence.len() >= max_beats {
                break;
            }

            let row = &self.weights[current.index()];
            if sequence.len() == max_beats - 1 {
                let terminals = [BeatType::Resolution, BeatType::Denouement];
                let weights: Vec<f32> = terminals
                    .iter()
                    .map(|t| if *t == current { 0.0 } else { row[t.index()] })
                    .collect();
                let pick = stream.pick_weighted(&weights).unwrap_or(0);
                sequence.push(terminals[pick]);
                break;
            }

            let mask_terminals = sequence.len() < min_beats - 1;
            let allowed = |beat: BeatType| beat != current && !(mask_terminals && beat.is_terminal());
            let weights: Vec<f32> = BeatType::ALL
                .iter()
                .map(|b| if allowed(*b) { row[b.index()] } else { 0.0 })
                .collect();

            let next = match stream.pick_weighted(&weights) {
                Some(i) => BeatType::ALL[i],
                None => {
                    // dead-end row: any allowed beat
                    let options: Vec<BeatType> = BeatType::ALL.into_iter().filter(|b| allowed(*b)).collect();
                    options[stream.gen_range(0..options.len())]
                }
            };
            sequence.push(next);
        }
        sequence
    }
}

/// Builds beat-sequence skeletons from a read-only atom pool.
pub struct MarkovSequencer<'a> {
    pool: &'a AtomPool,
    catalogue: &'a AtomCatalogue,
    table: &'a BeatTable,
    min_beats: usize,
    max_beats: usize,
}

impl<'a> MarkovSequencer<'a> {
    pub fn new(pool: &'a AtomPool, catalogue: &'a AtomCatalogue, table: &'a BeatTable) -> Self {
        Self {
            pool,
            catalogue,
            table,
            min_beats: DEFAULT_MIN_BEATS,
            max_beats: DEFAULT_MAX_BEATS,
        }
    }

    pub fn beats(mut self, min_beats: usize, max_beats: usize) -> Self {
        self.min_beats = min_beats;
        self.max_beats = max_beats;
        self
    }

    pub fn generate(&self, stream: &mut SeedStream) -> StorySkeleton {
        let beats = self.table.walk(stream, self.min_beats, self.max_beats);
        let mut filler = SlotFiller::new(self.pool, self.catalogue);
        let slots = beats
            .iter()
            .map(|beat| filler.fill(beat.label(), beat.category(), stream, |_| true))
            .collect();

        let skeleton = StorySkeleton::new(Strategy::Markov, slots);
        tracing::trace!(
            beats = beats.len(),
            filled = skeleton.filled(),
            "markov skeleton"
        );
        skeleton
    }
}
