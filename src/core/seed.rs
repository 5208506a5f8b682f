//! Deterministic seed tree: one root seed, unboundedly many labelled streams.

use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::RngCore;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

/// Hands out reproducible random streams derived from a single root seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedManager {
    root: u64,
}

impl SeedManager {
    pub fn new(root: u64) -> Self {
        Self { root }
    }

    /// A manager with a fresh root drawn from the OS. The root is still
    /// reported in pipeline output so the run can be replayed.
    pub fn from_entropy() -> Self {
        Self {
            root: rand::random(),
        }
    }

    pub fn root(&self) -> u64 {
        self.root
    }

    /// Derive the stream identified by `path` under this root.
    pub fn derive(&self, path: &[&str]) -> SeedStream {
        SeedStream::from_path(self.root, path.iter().map(|s| s.to_string()).collect())
    }
}

/// An independent random stream identified by its label path.
///
/// Identical (root, path) pairs produce bit-identical output; the
/// generator is ChaCha8 keyed by SHA-256 of the path, so distinct paths
/// are uncorrelated.
#[derive(Debug, Clone)]
pub struct SeedStream {
    root: u64,
    path: Vec<String>,
    rng: ChaCha8Rng,
}

impl SeedStream {
    fn from_path(root: u64, path: Vec<String>) -> Self {
        let rng = ChaCha8Rng::from_seed(path_digest(root, &path));
        Self { root, path, rng }
    }

    /// Sub-stream one label deeper. Does not consume from `self`.
    pub fn child(&self, label: &str) -> SeedStream {
        let mut path = self.path.clone();
        path.push(label.to_string());
        Self::from_path(self.root, path)
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn root(&self) -> u64 {
        self.root
    }

    /// Index drawn in proportion to `weights`. `None` when no weight is
    /// positive or any weight is negative or NaN.
    pub fn pick_weighted(&mut self, weights: &[f32]) -> Option<usize> {
        let dist = WeightedIndex::new(weights).ok()?;
        Some(dist.sample(self))
    }
}

/// SHA-256 over the root seed and each label, every label length-prefixed
/// so that `["ab", "c"]` and `["a", "bc"]` hash differently.
fn path_digest(root: u64, path: &[String]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(root.to_be_bytes());
    for label in path {
        hasher.update((label.len() as u64).to_be_bytes());
        hasher.update(label.as_bytes());
    }
    hasher.finalize().into()
}

impl RngCore for SeedStream {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.rng.try_fill_bytes(dest)
    }
}
