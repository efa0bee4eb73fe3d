// Whole-component integration test: build a small synthetic scenario
// and drive it through the Runner end to end, the way a caller (the
// binary, or an external preprocessor) would.

use std::sync::Arc;

use rasta_opt::color::{ErrorMap, Palette, Rgb, PALETTE_SIZE};
use rasta_opt::config::{DualInitConfig, OptimizerConfig, OptimizerKind, SeedConfig};
use rasta_opt::dual::TargetYuv;
use rasta_opt::onoff::OnOffMap;
use rasta_opt::{Mutator, NullObserver, Picture, Runner};

const WIDTH: usize = 16;
const HEIGHT: usize = 4;

fn diagonal_errors() -> ErrorMap {
    let mut errors = vec![vec![50u32; WIDTH * HEIGHT]; PALETTE_SIZE];
    for (color, row) in errors.iter_mut().enumerate() {
        for y in 0..HEIGHT {
            for x in 0..WIDTH {
                if color == (x + y) % PALETTE_SIZE {
                    row[y * WIDTH + x] = 0;
                }
            }
        }
    }
    ErrorMap::new(WIDTH, HEIGHT, errors)
}

fn run_with(optimizer: OptimizerKind) -> rasta_opt::BestSnapshot {
    let mut config = OptimizerConfig::default();
    config.threads = 2;
    config.max_evals = 2_000;
    config.seed = SeedConfig::Fixed(42);
    config.optimizer = optimizer;

    let errors = diagonal_errors();
    let onoff = OnOffMap::all_enabled(HEIGHT);
    let possible_colors = vec![Vec::new(); HEIGHT];
    let initial = Picture::new(HEIGHT);

    let runner = Runner::new(config, errors, onoff, possible_colors, initial, None);
    runner.run(Arc::new(NullObserver))
}

#[test]
fn lahc_optimization_reduces_cost_below_the_uninitialized_baseline() {
    let snapshot = run_with(OptimizerKind::Lahc);
    assert!(snapshot.best_cost < (WIDTH * HEIGHT) as f64 * 50.0);
    assert_eq!(snapshot.evaluations, 2_000);
}

#[test]
fn dlas_optimization_also_makes_progress() {
    let snapshot = run_with(OptimizerKind::Dlas);
    assert!(snapshot.best_cost < (WIDTH * HEIGHT) as f64 * 50.0);
}

#[test]
fn dual_frame_run_seeds_and_produces_a_frame_b() {
    let mut config = OptimizerConfig::default();
    config.threads = 2;
    config.max_evals = 500;
    config.seed = SeedConfig::Fixed(11);
    config.dual.on = true;

    let errors = diagonal_errors();
    let onoff = OnOffMap::all_enabled(HEIGHT);
    let possible_colors = vec![Vec::new(); HEIGHT];
    let initial_a = Picture::new(HEIGHT);

    let mut seeder = Mutator::new(0xFEED, HEIGHT, 0, 1);
    let initial_b = Runner::seed_dual_b(&initial_a, &mut seeder, &errors, &possible_colors, DualInitConfig::Dup);

    let palette_colors: [Rgb; PALETTE_SIZE] = std::array::from_fn(|i| Rgb { r: i as u8, g: i as u8, b: i as u8 });
    let palette = Palette::new(palette_colors);
    let target_b = TargetYuv::from_pixels(WIDTH, &vec![Rgb { r: 128, g: 128, b: 128 }; WIDTH * HEIGHT]);

    let runner = Runner::new(config, errors, onoff, possible_colors, initial_a, Some(initial_b))
        .with_dual(target_b, palette);
    let snapshot = runner.run(Arc::new(NullObserver));

    assert!(snapshot.best_b.is_some());
    assert_eq!(snapshot.evaluations, 500);
}

#[test]
fn stop_handle_can_cancel_an_unbounded_run_from_another_thread() {
    let mut config = OptimizerConfig::default();
    config.threads = 1;
    config.max_evals = 0;
    config.seed = SeedConfig::Fixed(7);

    let errors = diagonal_errors();
    let onoff = OnOffMap::all_enabled(HEIGHT);
    let possible_colors = vec![Vec::new(); HEIGHT];
    let initial = Picture::new(HEIGHT);

    let runner = Runner::new(config, errors, onoff, possible_colors, initial, None);
    let handle = runner.handle();

    std::thread::scope(|scope| {
        scope.spawn(|| {
            std::thread::sleep(std::time::Duration::from_millis(50));
            handle.stop();
        });
        let snapshot = runner.run(Arc::new(NullObserver));
        assert!(snapshot.evaluations > 0);
    });
}
