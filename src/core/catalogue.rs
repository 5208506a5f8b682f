//! The atom catalogue: typed story atoms loaded once and shared read-only.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::core::seed::SeedStream;
use crate::schema::atom::{Affinity, AtomCategory, AtomId, StoryAtom};

#[derive(Debug, Error)]
pub enum CatalogueError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("duplicate atom id: {0:?}")]
    DuplicateId(AtomId),
    #[error("atom {0:?} has an empty label")]
    EmptyLabel(AtomId),
    #[error("atom {0:?} uses the Unspecified category, which is reserved for ephemeral atoms")]
    UnspecifiedCategory(AtomId),
}

/// On-disk shape of a catalogue file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogueFile {
    pub atoms: Vec<StoryAtom>,
    #[serde(default)]
    pub affinities: Vec<Affinity>,
}

/// Immutable, insertion-ordered collection of catalogue atoms.
#[derive(Debug, Clone, Default)]
pub struct AtomCatalogue {
    atoms: Vec<Arc<StoryAtom>>,
    index: FxHashMap<AtomId, usize>,
    categories: FxHashMap<AtomCategory, Vec<usize>>,
    affinities: FxHashMap<(AtomId, AtomId), f32>,
}

impl AtomCatalogue {
    pub fn parse_ron(input: &str) -> Result<Self, CatalogueError> {
        let file: CatalogueFile = ron::from_str(input)?;
        Self::from_file(file)
    }

    pub fn load_from_ron(path: &Path) -> Result<Self, CatalogueError> {
        let contents = std::fs::read_to_string(path)?;
        let catalogue = Self::parse_ron(&contents)?;
        tracing::debug!(
            path = %path.display(),
            atoms = catalogue.len(),
            affinities = catalogue.affinities.len(),
            "loaded atom catalogue"
        );
        Ok(catalogue)
    }

    pub fn from_atoms(atoms: Vec<StoryAtom>) -> Result<Self, CatalogueError> {
        Self::from_file(CatalogueFile {
            atoms,
            affinities: Vec::new(),
        })
    }

    pub fn from_file(file: CatalogueFile) -> Result<Self, CatalogueError> {
        let mut catalogue = Self::default();
        let mut seen = FxHashSet::default();
        for atom in file.atoms {
            if !seen.insert(atom.id) {
                return Err(CatalogueError::DuplicateId(atom.id));
            }
            catalogue.insert(atom)?;
        }
        for affinity in file.affinities {
            catalogue.set_affinity(affinity);
        }
        Ok(catalogue)
    }

    fn validate(atom: &StoryAtom) -> Result<(), CatalogueError> {
        if atom.label.trim().is_empty() {
            return Err(CatalogueError::EmptyLabel(atom.id));
        }
        if atom.category == AtomCategory::Unspecified {
            return Err(CatalogueError::UnspecifiedCategory(atom.id));
        }
        Ok(())
    }

    /// Insert or replace by id. A replaced atom keeps its original position.
    fn insert(&mut self, mut atom: StoryAtom) -> Result<(), CatalogueError> {
        Self::validate(&atom)?;
        atom.rarity = atom.rarity.clamp(0.0, 1.0);

        match self.index.get(&atom.id).copied() {
            Some(pos) => {
                let old_category = self.atoms[pos].category;
                if old_category != atom.category {
                    if let Some(list) = self.categories.get_mut(&old_category) {
                        list.retain(|&i| i != pos);
                    }
                    self.push_category(atom.category, pos);
                }
                self.atoms[pos] = Arc::new(atom);
            }
            None => {
                let pos = self.atoms.len();
                self.index.insert(atom.id, pos);
                self.push_category(atom.category, pos);
                self.atoms.push(Arc::new(atom));
            }
        }
        Ok(())
    }

    /// Keep each category list in insertion order.
    fn push_category(&mut self, category: AtomCategory, pos: usize) {
        let list = self.categories.entry(category).or_default();
        let at = list.partition_point(|&i| i < pos);
        list.insert(at, pos);
    }

    fn set_affinity(&mut self, affinity: Affinity) {
        self.affinities
            .insert(affinity.key(), affinity.strength.clamp(-1.0, 1.0));
    }

    /// Merge another catalogue: later atoms win per id, first insertion
    /// position is preserved, affinities override.
    pub fn merge(&mut self, other: &AtomCatalogue) -> Result<(), CatalogueError> {
        for atom in &other.atoms {
            self.insert(StoryAtom::clone(atom))?;
        }
        for (key, strength) in &other.affinities {
            self.affinities.insert(*key, *strength);
        }
        Ok(())
    }

    /// All atoms in insertion order.
    pub fn atoms(&self) -> &[Arc<StoryAtom>] {
        &self.atoms
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn get(&self, id: AtomId) -> Option<&Arc<StoryAtom>> {
        self.index.get(&id).map(|&i| &self.atoms[i])
    }

    /// Atoms of one category in insertion order.
    pub fn by_category(&self, category: AtomCategory) -> Vec<&Arc<StoryAtom>> {
        self.categories
            .get(&category)
            .map(|list| list.iter().map(|&i| &self.atoms[i]).collect())
            .unwrap_or_default()
    }

    /// Symmetric pairwise affinity, 0.0 when none is recorded.
    pub fn affinity(&self, a: AtomId, b: AtomId) -> f32 {
        let key = if a <= b { (a, b) } else { (b, a) };
        self.affinities.get(&key).copied().unwrap_or(0.0)
    }

    pub fn affinity_count(&self) -> usize {
        self.affinities.len()
    }

    /// Recorded affinities in id order.
    pub fn affinities(&self) -> Vec<Affinity> {
        let mut list: Vec<Affinity> = self
            .affinities
            .iter()
            .map(|(&(a, b), &strength)| Affinity { a, b, strength })
            .collect();
        list.sort_by_key(|aff| aff.key());
        list
    }

    /// Draw up to `n` distinct atoms of `category`, common atoms favoured
    /// (weight `max(1 - rarity, 0.01)`).
    pub fn sample_weighted(
        &self,
        category: AtomCategory,
        stream: &mut SeedStream,
        n: usize,
    ) -> Vec<Arc<StoryAtom>> {
        let mut pool: Vec<&Arc<StoryAtom>> = self.by_category(category);
        let mut weights: Vec<f32> = pool.iter().map(|a| (1.0 - a.rarity).max(0.01)).collect();
        let mut picked = Vec::with_capacity(n.min(pool.len()));
        while picked.len() < n {
            let Some(i) = stream.pick_weighted(&weights) else {
                break;
            };
            picked.push(Arc::clone(pool.remove(i)));
            weights.remove(i);
        }
        picked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::seed::SeedManager;

    const SMALL: &str = r#"(
        atoms: [
            (id: 1, category: Agent, label: "the wanderer", tags: ["journey", "solitude"], rarity: 0.2),
            (id: 2, category: Agent, label: "the witch", tags: ["magic", "secret"], rarity: 0.6),
            (id: 3, category: Location, label: "the drowned city", tags: ["water", "ancient"]),
            (id: 4, category: Tension, label: "betrayal", tags: ["betrayal", "trust"], rarity: 0.9),
        ],
        affinities: [
            (a: 2, b: 1, strength: 0.4),
            (a: 3, b: 4, strength: -2.0),
        ],
    )"#;

    fn atom(id: u64, category: AtomCategory, label: &str) -> StoryAtom {
        StoryAtom {
            id: AtomId(id),
            category,
            label: label.to_string(),
            tags: vec![],
            rarity: 0.5,
            origin: Default::default(),
        }
    }

    #[test]
    fn parse_and_lookup() {
        let cat = AtomCatalogue::parse_ron(SMALL).unwrap();
        assert_eq!(cat.len(), 4);
        assert_eq!(cat.get(AtomId(3)).unwrap().label, "the drowned city");
        assert_eq!(cat.by_category(AtomCategory::Agent).len(), 2);
        assert!(cat.by_category(AtomCategory::Quality).is_empty());
        let ids: Vec<u64> = cat.atoms().iter().map(|a| a.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn affinity_is_symmetric_and_clamped() {
        let cat = AtomCatalogue::parse_ron(SMALL).unwrap();
        assert!((cat.affinity(AtomId(1), AtomId(2)) - 0.4).abs() < 1e-6);
        assert!((cat.affinity(AtomId(2), AtomId(1)) - 0.4).abs() < 1e-6);
        assert_eq!(cat.affinity(AtomId(4), AtomId(3)), -1.0);
        assert_eq!(cat.affinity(AtomId(1), AtomId(4)), 0.0);
        assert_eq!(cat.affinities().len(), 2);
    }

    #[test]
    fn rejects_bad_atoms() {
        let dup = AtomCatalogue::from_atoms(vec![
            atom(1, AtomCategory::Agent, "a"),
            atom(1, AtomCategory::Object, "b"),
        ]);
        assert!(matches!(dup, Err(CatalogueError::DuplicateId(AtomId(1)))));

        let empty = AtomCatalogue::from_atoms(vec![atom(2, AtomCategory::Agent, "  ")]);
        assert!(matches!(empty, Err(CatalogueError::EmptyLabel(AtomId(2)))));

        let unspecified = AtomCatalogue::from_atoms(vec![atom(3, AtomCategory::Unspecified, "x")]);
        assert!(matches!(unspecified, Err(CatalogueError::UnspecifiedCategory(_))));

        assert!(matches!(
            AtomCatalogue::parse_ron("(atoms: [ (id: 1) ])"),
            Err(CatalogueError::Ron(_))
        ));
    }

    #[test]
    fn merge_later_wins_in_place() {
        let mut base = AtomCatalogue::parse_ron(SMALL).unwrap();
        let overlay = AtomCatalogue::from_atoms(vec![
            atom(2, AtomCategory::Quality, "the veiled one"),
            atom(9, AtomCategory::Object, "a key"),
        ])
        .unwrap();
        base.merge(&overlay).unwrap();

        let ids: Vec<u64> = base.atoms().iter().map(|a| a.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 9]);
        assert_eq!(base.get(AtomId(2)).unwrap().label, "the veiled one");
        assert_eq!(base.by_category(AtomCategory::Agent).len(), 1);
        assert_eq!(base.by_category(AtomCategory::Quality).len(), 1);
        assert!((base.affinity(AtomId(1), AtomId(2)) - 0.4).abs() < 1e-6);
    }

    #[test]
    fn sample_weighted_without_replacement() {
        let cat = AtomCatalogue::parse_ron(SMALL).unwrap();
        let mut stream = SeedManager::new(1).derive(&["catalogue"]);
        let agents = cat.sample_weighted(AtomCategory::Agent, &mut stream, 5);
        assert_eq!(agents.len(), 2);
        assert_ne!(agents[0].id, agents[1].id);
        assert!(cat
            .sample_weighted(AtomCategory::Quality, &mut stream, 3)
            .is_empty());
    }

    #[test]
    fn sample_weighted_favours_common_atoms() {
        let cat = AtomCatalogue::parse_ron(SMALL).unwrap();
        let mut stream = SeedManager::new(2).derive(&["catalogue"]);
        let mut wanderer = 0;
        for _ in 0..400 {
            let pick = cat.sample_weighted(AtomCategory::Agent, &mut stream, 1);
            if pick[0].id == AtomId(1) {
                wanderer += 1;
            }
        }
        // weights 0.8 vs 0.4
        assert!(wanderer > 220, "wanderer picked {wanderer} times");
    }
}
