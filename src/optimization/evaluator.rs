// Evaluator: wraps the Executor for single-frame scoring and coordinates
// the two-pass dual-frame render. Grounded on spec.md §4.6 directly (no
// analogous file survived retrieval from `original_source`, which drives
// the Executor straight from the optimizer loop without a named
// intermediate stage); the split into its own module follows this crate's
// own `executor`/`mutation` separation of concerns.

use crate::arena::Arena;
use crate::color::ErrorMap;
use crate::executor::{Executor, ExecutionResult, SingleFrameCost};
use crate::insn_cache::InsnCache;
use crate::line_cache::LineCache;
use crate::onoff::OnOffMap;
use crate::program::Picture;

/// Per-worker caches for one render role. Dual-frame mode keeps two of
/// these (plain vs. pair-aware) per spec.md §4.4 "Dual-cache role
/// separation" — never a single cache serving both.
pub struct RenderCaches {
    pub insn_cache: InsnCache,
    pub line_cache: LineCache,
    pub arena: Arena,
}

impl RenderCaches {
    pub fn new() -> Self {
        RenderCaches { insn_cache: InsnCache::new(), line_cache: LineCache::new(), arena: Arena::new() }
    }

    pub fn clear(&mut self) {
        self.insn_cache.clear();
        self.line_cache.clear();
        self.arena.clear();
    }
}

impl Default for RenderCaches {
    fn default() -> Self {
        Self::new()
    }
}

/// `evaluateSingle`: run one candidate against its single-frame error map.
pub fn evaluate_single(
    executor: &Executor,
    picture: &mut Picture,
    caches: &mut RenderCaches,
    onoff: &OnOffMap,
    errors: &ErrorMap,
) -> ExecutionResult {
    let cost = SingleFrameCost { errors };
    executor.execute(&mut *picture, &mut caches.insn_cache, &mut caches.line_cache, &mut caches.arena, onoff, &cost)
}

/// Result of a dual-frame evaluation: the combined pair cost plus each
/// frame's own rendered lines and sprite memory, for UI/checkpoint use.
pub struct DualEvaluation {
    pub cost: f64,
    pub result_a: ExecutionResult,
    pub result_b: ExecutionResult,
}

/// `evaluateDual`: render the fixed frame plain, then the mutated frame
/// pair-aware against the fixed frame's output, per spec.md §4.6's
/// coordinate-descent ordering. `pair_cost_fn` builds the pair-aware
/// `PixelCost` once the fixed frame's color rows are known — its concrete
/// shape (the YUV pair objective) lives in the `dual` module so this
/// function stays agnostic of it.
pub fn evaluate_dual<F, C>(
    executor: &Executor,
    picture_a: &mut Picture,
    picture_b: &mut Picture,
    mutate_b: bool,
    caches_a: &mut RenderCaches,
    caches_b: &mut RenderCaches,
    onoff: &OnOffMap,
    errors: &ErrorMap,
    pair_cost_fn: F,
) -> DualEvaluation
where
    F: FnOnce(&ExecutionResult) -> C,
    C: crate::executor::PixelCost,
{
    let (fixed_picture, fixed_caches, mutated_picture, mutated_caches) = if mutate_b {
        (&mut *picture_a, &mut *caches_a, &mut *picture_b, &mut *caches_b)
    } else {
        (&mut *picture_b, &mut *caches_b, &mut *picture_a, &mut *caches_a)
    };

    let fixed_cost = SingleFrameCost { errors };
    let fixed_result = executor.execute(
        fixed_picture,
        &mut fixed_caches.insn_cache,
        &mut fixed_caches.line_cache,
        &mut fixed_caches.arena,
        onoff,
        &fixed_cost,
    );

    let pair_cost = pair_cost_fn(&fixed_result);
    let mutated_result = executor.execute(
        mutated_picture,
        &mut mutated_caches.insn_cache,
        &mut mutated_caches.line_cache,
        &mut mutated_caches.arena,
        onoff,
        &pair_cost,
    );

    let (result_a, result_b) =
        if mutate_b { (fixed_result, mutated_result) } else { (mutated_result, fixed_result) };
    let cost = result_b.total_error;
    DualEvaluation { cost, result_a, result_b }
}
