/// Skeleton Preview: runs the pipeline once and prints the top-ranked skeletons.
///
/// Usage: skeleton_preview [--catalogue <path>] [--corpus <path>] [--config <path>]
///                         [--beats <path>] [--rules <path>] [--seed <n>]
///                         [--breakdown] [--ron]
///
/// Logging goes to stderr and follows RUST_LOG (default `skeleton_forge=info`).

use skeleton_forge::core::pipeline::{PipelineOutput, SkeletonPipeline};
use skeleton_forge::core::scorer::CoherenceScorer;
use skeleton_forge::schema::skeleton::StorySkeleton;
use std::process;
use tracing_subscriber::EnvFilter;

const DEFAULT_CATALOGUE: &str = "data/catalogue.ron";
const DEFAULT_CORPUS: &str = "data/words.txt";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("skeleton_forge=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return;
    }

    let mut catalogue_path = DEFAULT_CATALOGUE.to_string();
    let mut corpus_path = DEFAULT_CORPUS.to_string();
    let mut config_path = None;
    let mut beats_path = None;
    let mut rules_path = None;
    let mut seed = None;
    let mut breakdown = false;
    let mut as_ron = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--catalogue" if i + 1 < args.len() => {
                i += 1;
                catalogue_path = args[i].clone();
            }
            "--corpus" if i + 1 < args.len() => {
                i += 1;
                corpus_path = args[i].clone();
            }
            "--config" if i + 1 < args.len() => {
                i += 1;
                config_path = Some(args[i].clone());
            }
            "--beats" if i + 1 < args.len() => {
                i += 1;
                beats_path = Some(args[i].clone());
            }
            "--rules" if i + 1 < args.len() => {
                i += 1;
                rules_path = Some(args[i].clone());
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                match args[i].parse::<u64>() {
                    Ok(n) => seed = Some(n),
                    Err(_) => {
                        eprintln!("ERROR: seed '{}' is not a number", args[i]);
                        process::exit(1);
                    }
                }
            }
            "--breakdown" => breakdown = true,
            "--ron" => as_ron = true,
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                process::exit(1);
            }
        }
        i += 1;
    }

    let mut builder = SkeletonPipeline::builder()
        .catalogue_path(&catalogue_path)
        .corpus_path(&corpus_path);
    if let Some(path) = &config_path {
        builder = builder.config_path(path);
    }
    if let Some(path) = &beats_path {
        builder = builder.beat_table_path(path);
    }
    if let Some(path) = &rules_path {
        builder = builder.world_rules_path(path);
    }
    if let Some(seed) = seed {
        builder = builder.seed(seed);
    }

    let pipeline = match builder.build() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            process::exit(1);
        }
    };

    let output = pipeline.run();

    if as_ron {
        match ron::ser::to_string_pretty(&output, ron::ser::PrettyConfig::default()) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("ERROR: failed to serialize output: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    print_summary(&output);
    for (rank, skeleton) in output.top_k.iter().enumerate() {
        print_skeleton(rank + 1, skeleton, breakdown.then(|| pipeline.scorer()));
    }
}

fn print_usage() {
    println!("Usage: skeleton_preview [--catalogue <path>] [--corpus <path>] [--config <path>]");
    println!("                        [--beats <path>] [--rules <path>] [--seed <n>]");
    println!("                        [--breakdown] [--ron]");
    println!();
    println!("  --catalogue <path>  atom catalogue (default {})", DEFAULT_CATALOGUE);
    println!("  --corpus <path>     word corpus (default {})", DEFAULT_CORPUS);
    println!("  --config <path>     run configuration (RON)");
    println!("  --beats <path>      Markov beat transition table (RON)");
    println!("  --rules <path>      world rules (RON)");
    println!("  --seed <n>          root seed; overrides the config");
    println!("  --breakdown         show per-rule score outcomes");
    println!("  --ron               dump the whole run as RON instead");
}

fn print_summary(output: &PipelineOutput) {
    println!("Seed: {}", output.seed);
    println!("Soup:");
    for raw in &output.soup {
        println!("  {}", raw);
    }
    println!(
        "Tokens: {}  Atoms: {}  Skeletons: {}",
        output.tokens.len(),
        output.atoms.len(),
        output.skeletons.len()
    );
    if let Some(report) = &output.evolution {
        let history: Vec<String> = report.best_history.iter().map(|s| format!("{:.3}", s)).collect();
        println!(
            "Evolution: {} generations, best [{}], novelty {:.3}",
            report.generations_run,
            history.join(" "),
            report.mean_novelty
        );
    }
    println!();
}

fn print_skeleton(rank: usize, skeleton: &StorySkeleton, scorer: Option<&CoherenceScorer>) {
    println!(
        "#{} {}  score {:.3}  generation {}  tone {:?}",
        rank,
        skeleton.strategy,
        skeleton.score.unwrap_or(0.0),
        skeleton.generation,
        skeleton.tone()
    );
    let themes = skeleton.theme_tags();
    if !themes.is_empty() {
        println!("   themes: {}", themes.join(", "));
    }
    for slot in &skeleton.slots {
        let atom = match &slot.atom {
            Some(atom) if atom.is_ephemeral() => format!("{} ({:?}, ephemeral)", atom.label, atom.category),
            Some(atom) => format!("{} ({:?})", atom.label, atom.category),
            None => "-".to_string(),
        };
        match slot.violation {
            Some(v) => println!("   {:<20} {}  [{:?}]", slot.name, atom, v),
            None => println!("   {:<20} {}", slot.name, atom),
        }
    }
    if let Some(scorer) = scorer {
        let b = scorer.breakdown(skeleton);
        let optional = |v: Option<f32>| v.map_or("-".to_string(), |v| format!("{:.2}", v));
        println!(
            "   fill {:.2}  complete {:.2}  adjacency {:.2}  unique {:.2}  soft {:.2}  thematic {:.2}  affinity {}  flow {}  world -{:.2}",
            b.fill,
            b.completeness,
            b.adjacency,
            b.uniqueness,
            b.soft_violation,
            b.thematic,
            optional(b.affinity),
            optional(b.beat_flow),
            b.world_penalty
        );
    }
    println!();
}
