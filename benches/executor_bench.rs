// Executor benchmarks.
// Measures the scan-loop cost of re-evaluating a candidate program
// under a precomputed error map, with and without a warm cache.

use criterion::{criterion_group, criterion_main, Criterion};
use rasta_opt::color::{ErrorMap, PALETTE_SIZE};
use rasta_opt::onoff::OnOffMap;
use rasta_opt::optimization::{evaluate_single, RenderCaches};
use rasta_opt::program::Picture;
use rasta_opt::{Instruction, Op, TargetRegister};
use std::hint::black_box;

const WIDTH: usize = 160;
const HEIGHT: usize = 24;

fn flat_errors() -> ErrorMap {
    ErrorMap::new(WIDTH, HEIGHT, vec![vec![10u32; WIDTH * HEIGHT]; PALETTE_SIZE])
}

fn sample_picture() -> Picture {
    let mut picture = Picture::new(HEIGHT);
    for line in &mut picture.lines {
        line.set_instructions(vec![
            Instruction::new(Op::Lda, None, 4),
            Instruction::new(Op::Sta, Some(TargetRegister::ColBak), 4),
            Instruction::new(Op::Ldx, None, 8),
            Instruction::new(Op::Stx, Some(TargetRegister::HposP0), 8),
        ]);
    }
    picture
}

fn bench_evaluate_single(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate_single");
    let executor = rasta_opt::executor::Executor::new();
    let errors = flat_errors();
    let onoff = OnOffMap::all_enabled(HEIGHT);

    group.bench_function("cold_cache", |b| {
        b.iter(|| {
            let mut caches = RenderCaches::new();
            let mut picture = sample_picture();
            black_box(evaluate_single(&executor, &mut picture, &mut caches, &onoff, &errors));
        });
    });

    group.bench_function("warm_cache_repeat_evaluation", |b| {
        let mut caches = RenderCaches::new();
        let mut picture = sample_picture();
        evaluate_single(&executor, &mut picture, &mut caches, &onoff, &errors);
        b.iter(|| {
            black_box(evaluate_single(&executor, &mut picture, &mut caches, &onoff, &errors));
        });
    });

    group.finish();
}

criterion_group!(benches, bench_evaluate_single);
criterion_main!(benches);
