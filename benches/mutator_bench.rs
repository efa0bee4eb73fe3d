// Mutator benchmarks.
// Measures the per-iteration cost of the nine-kind weighted mutation
// engine over a mid-size candidate program.

use criterion::{criterion_group, criterion_main, Criterion};
use rasta_opt::color::{ErrorMap, PALETTE_SIZE};
use rasta_opt::{Instruction, Mutator, Op, Picture, TargetRegister};
use std::hint::black_box;

const WIDTH: usize = 160;
const HEIGHT: usize = 32;

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

fn bench_mutate_program(c: &mut Criterion) {
    let errors = flat_errors();
    let possible_colors = vec![Vec::new(); HEIGHT];

    c.bench_function("mutate_program", |b| {
        let mut mutator = Mutator::new(0xC0FFEE, HEIGHT, 0, 1);
        let mut picture = sample_picture();
        b.iter(|| {
            mutator.mutate_program(black_box(&mut picture), &errors, &possible_colors);
        });
    });
}

criterion_group!(benches, bench_mutate_program);
criterion_main!(benches);
