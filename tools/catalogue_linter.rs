/// Catalogue Linter: validates atom catalogue coverage and consistency.
///
/// Usage: catalogue_linter <catalogue_file_or_dir> [--min-per-category <n>]

use rustc_hash::{FxHashMap, FxHashSet};
use skeleton_forge::core::catalogue::CatalogueFile;
use skeleton_forge::schema::atom::AtomCategory;
use std::path::Path;
use std::process;

const DEFAULT_MIN_PER_CATEGORY: usize = 10;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: catalogue_linter <catalogue_file_or_dir> [--min-per-category <n>]");
        process::exit(0);
    }

    let catalogue_arg = &args[1];
    let mut min_per_category = DEFAULT_MIN_PER_CATEGORY;

    let mut i = 2;
    while i < args.len() {
        if args[i] == "--min-per-category" && i + 1 < args.len() {
            i += 1;
            min_per_category = args[i].parse().unwrap_or(DEFAULT_MIN_PER_CATEGORY);
        }
        i += 1;
    }

    let mut file = CatalogueFile::default();
    let path = Path::new(catalogue_arg);

    if path.is_file() {
        match load(path) {
            Ok(f) => merge(&mut file, f),
            Err(e) => {
                eprintln!("ERROR: Failed to load catalogue file: {}", e);
                process::exit(1);
            }
        }
    } else if path.is_dir() {
        load_recursive(path, &mut file);
    } else {
        eprintln!("ERROR: Path '{}' does not exist", catalogue_arg);
        process::exit(1);
    }

    println!(
        "Loaded {} atoms and {} affinities",
        file.atoms.len(),
        file.affinities.len()
    );

    let (errors, warnings) = lint_catalogue(&file, min_per_category);

    println!("\n=== Catalogue Lint Report ===\n");

    if errors.is_empty() && warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in &warnings {
        println!("WARNING: {}", warning);
    }

    for error in &errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} errors, {} warnings",
        errors.len(),
        warnings.len()
    );

    if errors.is_empty() {
        process::exit(0);
    } else {
        process::exit(1);
    }
}

fn load(path: &Path) -> Result<CatalogueFile, String> {
    let contents = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    ron::from_str(&contents).map_err(|e| e.to_string())
}

fn merge(into: &mut CatalogueFile, other: CatalogueFile) {
    into.atoms.extend(other.atoms);
    into.affinities.extend(other.affinities);
}

fn load_recursive(dir: &Path, file: &mut CatalogueFile) {
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                load_recursive(&path, file);
            } else if path.extension().and_then(|s| s.to_str()) == Some("ron") {
                match load(&path) {
                    Ok(f) => {
                        println!("  Loaded: {}", path.display());
                        merge(file, f);
                    }
                    Err(e) => {
                        eprintln!("  ERROR loading {}: {}", path.display(), e);
                    }
                }
            }
        }
    }
}

fn lint_catalogue(file: &CatalogueFile, min_per_category: usize) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // Atom checks
    let mut ids = FxHashSet::default();
    let mut labels = FxHashSet::default();
    let mut per_category: FxHashMap<AtomCategory, usize> = FxHashMap::default();
    for atom in &file.atoms {
        if !ids.insert(atom.id) {
            errors.push(format!("Duplicate atom id {}", atom.id.0));
        }
        if atom.label.trim().is_empty() {
            errors.push(format!("Atom {} has an empty label", atom.id.0));
        }
        if atom.category == AtomCategory::Unspecified {
            errors.push(format!(
                "Atom {} ('{}') uses the Unspecified category",
                atom.id.0, atom.label
            ));
        }
        if atom.tags.is_empty() {
            warnings.push(format!(
                "Atom {} ('{}') has no tags and cannot contribute to thematic overlap",
                atom.id.0, atom.label
            ));
        }
        if !(0.0..=1.0).contains(&atom.rarity) {
            warnings.push(format!(
                "Atom {} ('{}') has rarity {} outside [0, 1]; it will be clamped",
                atom.id.0, atom.label, atom.rarity
            ));
        }
        if !labels.insert((atom.category, atom.label.to_lowercase())) {
            warnings.push(format!(
                "Label '{}' appears more than once in category {:?}",
                atom.label, atom.category
            ));
        }
        *per_category.entry(atom.category).or_default() += 1;
    }

    // Coverage: every category needs enough atoms to fill spreads
    for category in AtomCategory::ALL {
        let count = per_category.get(&category).copied().unwrap_or(0);
        if count == 0 {
            errors.push(format!("Category {:?} has no atoms", category));
        } else if count < min_per_category {
            warnings.push(format!(
                "Category {:?} has only {} atoms (minimum {} recommended)",
                category, count, min_per_category
            ));
        }
    }

    // Affinity checks
    let mut pairs = FxHashSet::default();
    for affinity in &file.affinities {
        for id in [affinity.a, affinity.b] {
            if !ids.contains(&id) {
                errors.push(format!(
                    "Affinity {}-{} references unknown atom {}",
                    affinity.a.0, affinity.b.0, id.0
                ));
            }
        }
        if affinity.a == affinity.b {
            warnings.push(format!("Affinity {}-{} links an atom to itself", affinity.a.0, affinity.b.0));
        }
        if !(-1.0..=1.0).contains(&affinity.strength) {
            warnings.push(format!(
                "Affinity {}-{} has strength {} outside [-1, 1]; it will be clamped",
                affinity.a.0, affinity.b.0, affinity.strength
            ));
        }
        if !pairs.insert(affinity.key()) {
            warnings.push(format!(
                "Affinity {}-{} is declared more than once; the last one wins",
                affinity.a.0, affinity.b.0
            ));
        }
    }

    (errors, warnings)
}
