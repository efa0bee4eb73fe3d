// Raster display-list optimizer - demonstration entry point.
//
// Image preprocessing, palette/error-map loading, and CLI flag parsing
// are out of scope for this crate (spec.md §1 Non-goals); this binary
// wires a small synthetic scenario through the Runner so the optimizer
// core is directly runnable without an external toolchain.

use std::sync::Arc;

use rasta_opt::color::{ErrorMap, PALETTE_SIZE};
use rasta_opt::config::OptimizerConfig;
use rasta_opt::onoff::OnOffMap;
use rasta_opt::program::Picture;
use rasta_opt::runner::{BestSnapshot, NullObserver, Runner};

const DEMO_WIDTH: usize = 160;
const DEMO_HEIGHT: usize = 24;

/// A flat gradient error map: palette index `c` costs `|c - x % PALETTE_SIZE|`
/// at every row, cheapest along a diagonal band. Stands in for the
/// preprocessor's real color-distance computation.
fn synthetic_error_map(width: usize, height: usize) -> ErrorMap {
    let mut errors = vec![vec![0u32; width * height]; PALETTE_SIZE];
    for (color, row) in errors.iter_mut().enumerate() {
        for y in 0..height {
            for x in 0..width {
                let target = (x + y) % PALETTE_SIZE;
                row[y * width + x] = (color as i32 - target as i32).unsigned_abs();
            }
        }
    }
    ErrorMap::new(width, height, errors)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("rasta-opt v0.1.0");
    println!("================");
    println!();

    let config_path = rasta_opt::config::default_config_path();
    let config = OptimizerConfig::load_or_default(config_path);
    println!("Configuration loaded from '{config_path}' (or defaults)");
    println!(
        "threads={} optimizer={:?} max_evals={} cache_mib={}",
        config.threads, config.optimizer, config.max_evals, config.cache_mib
    );
    println!();

    let errors = synthetic_error_map(DEMO_WIDTH, DEMO_HEIGHT);
    let onoff = OnOffMap::all_enabled(DEMO_HEIGHT);
    let possible_colors = vec![Vec::new(); DEMO_HEIGHT];
    let initial_a = Picture::new(DEMO_HEIGHT);

    let mut demo_config = config;
    if demo_config.max_evals == 0 {
        demo_config.max_evals = 50_000;
    }

    let runner = Runner::new(demo_config, errors, onoff, possible_colors, initial_a, None);

    println!("Running optimizer...");
    let snapshot: BestSnapshot = runner.run(Arc::new(NullObserver));

    println!();
    println!("Finished after {} evaluations.", snapshot.evaluations);
    println!("Best cost: {:.2} (found at evaluation {})", snapshot.best_cost, snapshot.last_best_eval);

    Ok(())
}
