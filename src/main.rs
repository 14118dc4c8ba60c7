//! Cluster Evolve CLI - Run a clustering search from JSON configuration.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::PathBuf;

use cluster_evolve::{
    compute::evolution::EvolutionEngine,
    schema::{Dataset, EvolutionOutcome, SearchConfig},
};

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 && args[1] == "--example" {
        print_example_config();
        return;
    }

    if args.len() < 3 {
        eprintln!("Usage: {} <config.json> <data.csv|data.json> [--transpose]", args[0]);
        eprintln!();
        eprintln!("Search clustering algorithms and hyperparameters with a genetic algorithm.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json  Search space and evolution settings");
        eprintln!("  data         Observations as CSV (optional header) or a JSON array of rows");
        eprintln!("  --transpose  Treat columns as observations");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    let config_path = PathBuf::from(&args[1]);
    let data_path = PathBuf::from(&args[2]);
    let transpose = args[3..].iter().any(|a| a == "--transpose");

    // Load configuration
    let config_str = fs::read_to_string(&config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    let config: SearchConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    });

    // Load dataset
    let mut data = Dataset::load(&data_path).unwrap_or_else(|e| {
        eprintln!("Error loading dataset: {}", e);
        std::process::exit(1);
    });
    if transpose {
        data = data.transpose();
    }

    let mut engine = EvolutionEngine::new(config.evolution, config.space).unwrap_or_else(|e| {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    });

    eprintln!("Cluster Evolve");
    eprintln!("==============");
    eprintln!("Dataset: {} rows x {} columns", data.n_rows(), data.n_cols());
    eprintln!(
        "Population: {}, cutoff: {}, max generations: {}",
        engine.config().population_size,
        engine.config().cutoff_score,
        engine.config().max_generations
    );
    eprintln!();

    let result = engine.run_with_callback(&data, |progress| {
        eprintln!(
            "  Generation {}/{}: top={:.4}, best={:.4}, avg={:.4}, failed={}/{}",
            progress.generation,
            progress.max_generations,
            progress.generation_best,
            progress.best_score,
            progress.avg_score,
            progress.failures,
            progress.population_size
        );
    });

    eprintln!();
    match &result.outcome {
        EvolutionOutcome::Converged {
            score, generation, ..
        } => eprintln!("Converged at generation {} with score {:.4}", generation, score),
        EvolutionOutcome::Exhausted { top } => eprintln!(
            "Stopped ({:?}) after {} generations; reporting {} candidates",
            result.stats.stop_reason,
            result.stats.generations,
            top.len()
        ),
    }
    eprintln!(
        "Time: {:.2}s ({} evaluations, {} failed)",
        result.stats.elapsed_seconds, result.stats.total_evaluations, result.stats.failed_evaluations
    );

    match serde_json::to_string_pretty(&result) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing result: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_example_config() {
    let config = SearchConfig::default();
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing example config: {}", e),
    }
}
