//! Skeleton Forge: seeded story-skeleton generation and coherence ranking.
//!
//! Turns stochastic linguistic material (letter soup, dictionary chaos) into
//! typed story atoms, assembles them into narrative skeletons with tarot
//! spreads and a Markov beat sequencer, scores them against a fixed rule set,
//! optionally evolves the population, and ranks the result for hand-off to an
//! external prose synthesizer. Every stochastic step draws from an explicit
//! seed stream, so a run is reproducible from its root seed alone.

pub mod core;
pub mod schema;
