//! Runner: spawns the worker lanes, owns the mutex-guarded shared best
//! state, and schedules checkpoints, per spec.md §4.8 "Runner".
//!
//! Grounded on `original_source/src/optimization/OptimizationRunner.h`
//! and `EvaluationContext.h`: a single mutex guarding best/counters/
//! policy state, workers that each own a private Mutator and a pair of
//! caches, and the accept/publish/postIteration sequence serialized
//! inside one critical section per iteration. The `Arc<Mutex<T>>`
//! shared-state idiom follows the teacher's own
//! `audio::output::AudioOutput` shared-buffer pattern rather than
//! porting the original's raw `std::mutex`/`std::condition_variable`
//! pair one-for-one.

use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::color::{ErrorMap, Palette};
use crate::config::{DualInitConfig, DualStrategyConfig, OptimizerConfig, OptimizerKind, SavePeriod, SeedConfig};
use crate::dual::{initialize_b, DualInit, DualStrategy, FlickerWeights, PairCost, PairTables, StageScheduler, TargetYuv};
use crate::executor::Executor;
use crate::mutation::{MutationStats, Mutator, MUTATION_COUNT};
use crate::onoff::OnOffMap;
use crate::optimization::{evaluate_dual, evaluate_single, AcceptancePolicy, Dlas, Lahc, RenderCaches};
use crate::program::Picture;
use crate::rng::Rng;

/// Either acceptance policy, kept as a concrete enum (rather than
/// `Box<dyn AcceptancePolicy>`) so a checkpoint writer can pattern-match
/// out the concrete `Lahc`/`Dlas` state without downcasting.
#[derive(Debug, Clone)]
pub enum Policy {
    Lahc(Lahc),
    Dlas(Dlas),
}

impl Policy {
    fn new(kind: OptimizerKind, history_length: usize) -> Self {
        match kind {
            OptimizerKind::Lahc => Policy::Lahc(Lahc::new(history_length)),
            OptimizerKind::Dlas => Policy::Dlas(Dlas::new(history_length)),
        }
    }
}

impl AcceptancePolicy for Policy {
    fn on_initial_score(&mut self, initial_score: f64) {
        match self {
            Policy::Lahc(p) => p.on_initial_score(initial_score),
            Policy::Dlas(p) => p.on_initial_score(initial_score),
        }
    }

    fn on_stage_switch(&mut self, current_cost: f64) {
        match self {
            Policy::Lahc(p) => p.on_stage_switch(current_cost),
            Policy::Dlas(p) => p.on_stage_switch(current_cost),
        }
    }

    fn accept(&mut self, cand_cost: f64) -> bool {
        match self {
            Policy::Lahc(p) => p.accept(cand_cost),
            Policy::Dlas(p) => p.accept(cand_cost),
        }
    }

    fn post_iteration(&mut self) {
        match self {
            Policy::Lahc(p) => p.post_iteration(),
            Policy::Dlas(p) => p.post_iteration(),
        }
    }

    fn current_cost(&self) -> f64 {
        match self {
            Policy::Lahc(p) => p.current_cost(),
            Policy::Dlas(p) => p.current_cost(),
        }
    }
}

/// A consistent `(evaluations, best_cost, best_program)` triple, handed
/// out to the UI/checkpoint writer under the lock per spec.md §5
/// "Ordering".
#[derive(Debug, Clone)]
pub struct BestSnapshot {
    pub best_a: Picture,
    pub best_b: Option<Picture>,
    pub best_cost: f64,
    pub evaluations: u64,
    pub last_best_eval: u64,
    pub mutation_stats: MutationStats,
    pub policy: Policy,
}

/// Callbacks the external driver hooks to react to a new best or a
/// checkpoint tick. Never called while the shared mutex is held.
pub trait RunnerObserver: Send + Sync {
    fn on_improvement(&self, _snapshot: &BestSnapshot) {}
    fn on_checkpoint(&self, _snapshot: &BestSnapshot) {}
}

/// No-op observer for callers that only want the final result.
pub struct NullObserver;
impl RunnerObserver for NullObserver {}

struct SharedState {
    best_a: Picture,
    best_b: Option<Picture>,
    best_cost: f64,
    evaluations: u64,
    last_best_eval: u64,
    finished: bool,
    initialized: bool,
    policy: Policy,
    mutation_stats: MutationStats,
    last_checkpoint_eval: u64,
    last_checkpoint_time: Instant,
}

impl SharedState {
    fn snapshot(&self) -> BestSnapshot {
        BestSnapshot {
            best_a: self.best_a.clone(),
            best_b: self.best_b.clone(),
            best_cost: self.best_cost,
            evaluations: self.evaluations,
            last_best_eval: self.last_best_eval,
            mutation_stats: self.mutation_stats,
            policy: self.policy.clone(),
        }
    }
}

struct Context {
    state: Mutex<SharedState>,
    condvar: Condvar,
}

/// A live run's stop switch. `stop()` is idempotent and can be called
/// from any thread, including the worker threads themselves.
#[derive(Clone)]
pub struct StopHandle {
    ctx: Arc<Context>,
}

impl StopHandle {
    pub fn stop(&self) {
        let mut state = self.ctx.state.lock().unwrap();
        if !state.finished {
            state.finished = true;
            self.ctx.condvar.notify_all();
        }
    }
}

fn resolve_seed(seed: &SeedConfig) -> u64 {
    match seed {
        SeedConfig::Fixed(s) => *s,
        SeedConfig::Random => SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x9E37_79B9_7F4A_7C15),
    }
}

fn should_checkpoint(config: &SavePeriod, evals_since: u64, time_since: Duration) -> bool {
    match config {
        SavePeriod::Evaluations(n) => *n > 0 && evals_since >= *n,
        SavePeriod::Auto => time_since >= Duration::from_secs(30),
    }
}

/// Drives the worker pool described by spec.md §4.8. Owns everything
/// that is read-only once optimization starts: the target error map,
/// OnOff mask, per-line possible-color lists, and (dual mode) the
/// target YUV image and palette pair tables. The shared mutex-guarded
/// best state is built during `new` (running the single-threaded
/// bootstrap evaluation of spec.md §4.8 "Startup") so a `StopHandle` is
/// available to the caller before `run` ever blocks.
pub struct Runner {
    config: OptimizerConfig,
    errors: ErrorMap,
    onoff: OnOffMap,
    possible_colors: Vec<Vec<u8>>,
    dual_assets: Option<DualAssets>,
    height: usize,
    ctx: Arc<Context>,
}

struct DualAssets {
    target_b: TargetYuv,
    palette: Palette,
}

impl Runner {
    /// Runs the startup bootstrap (spec.md §4.8 "Startup") and builds
    /// the shared context. Pass `initial_b` when dual mode will be
    /// enabled via [`Runner::with_dual`] — it seeds `best_b` before any
    /// worker starts mutating.
    pub fn new(
        config: OptimizerConfig,
        errors: ErrorMap,
        onoff: OnOffMap,
        possible_colors: Vec<Vec<u8>>,
        initial_a: Picture,
        initial_b: Option<Picture>,
    ) -> Self {
        config.validate().expect("invalid optimizer configuration");
        let height = initial_a.height();
        let executor = Executor::new();

        let mut bootstrap_caches = RenderCaches::new();
        let mut bootstrap_a = initial_a;
        let bootstrap_result = evaluate_single(&executor, &mut bootstrap_a, &mut bootstrap_caches, &onoff, &errors);
        let initial_cost = bootstrap_result.total_error;

        let mut policy = Policy::new(config.optimizer, config.history_length);
        policy.on_initial_score(initial_cost);

        let ctx = Arc::new(Context {
            state: Mutex::new(SharedState {
                best_a: bootstrap_a,
                best_b: initial_b,
                best_cost: initial_cost,
                evaluations: 1,
                last_best_eval: 1,
                finished: false,
                initialized: true,
                policy,
                mutation_stats: MutationStats::default(),
                last_checkpoint_eval: 1,
                last_checkpoint_time: Instant::now(),
            }),
            condvar: Condvar::new(),
        });

        Runner { config, errors, onoff, possible_colors, dual_assets: None, height, ctx }
    }

    /// Enable dual-frame co-optimization: `target_b` is frame B's own
    /// destination image in YUV, `palette` builds the pair tables.
    /// Requires `initial_b` to have been passed to `new`.
    pub fn with_dual(mut self, target_b: TargetYuv, palette: Palette) -> Self {
        assert!(
            self.ctx.state.lock().unwrap().best_b.is_some(),
            "with_dual requires an initial_b picture passed to Runner::new"
        );
        self.dual_assets = Some(DualAssets { target_b, palette });
        self
    }

    /// A stop switch valid for the whole lifetime of this `Runner`,
    /// obtainable before `run` is ever called so another thread can
    /// cancel a blocking run in progress.
    pub fn handle(&self) -> StopHandle {
        StopHandle { ctx: Arc::clone(&self.ctx) }
    }

    /// Blocking run. Spawns `config.threads` workers and joins on
    /// completion (either `max_evals` reached or a `StopHandle::stop()`
    /// call from another thread). Returns the final best snapshot.
    pub fn run(&self, observer: Arc<dyn RunnerObserver>) -> BestSnapshot {
        let base_seed = resolve_seed(&self.config.seed);
        let thread_count = self.config.threads.max(1);
        let height = self.height;
        let span = tracing::info_span!("runner", threads = thread_count, dual = self.dual_assets.is_some());
        let _enter = span.enter();

        thread::scope(|scope| {
            for thread_index in 0..thread_count {
                let ctx = Arc::clone(&self.ctx);
                let observer = Arc::clone(&observer);
                scope.spawn(move || {
                    self.worker(thread_index, thread_count, base_seed, height, &ctx, observer.as_ref());
                });
            }
        });

        self.ctx.state.lock().unwrap().snapshot()
    }

    fn cache_budget_bytes(&self) -> usize {
        let total = self.config.cache_mib.max(1) * 1024 * 1024;
        (total / self.config.threads.max(1)).max(4096)
    }

    fn worker(
        &self,
        thread_index: usize,
        thread_count: usize,
        base_seed: u64,
        height: usize,
        ctx: &Context,
        observer: &dyn RunnerObserver,
    ) {
        let span = tracing::info_span!("worker", worker_id = thread_index);
        let _enter = span.enter();
        let worker_seed = base_seed ^ (0x9E37_79B9 * (thread_index as u64 + 1));
        let mut mutator = Mutator::new(worker_seed, height, thread_index, thread_count);
        let budget = self.cache_budget_bytes();

        if let Some(dual) = &self.dual_assets {
            self.worker_dual(&mut mutator, worker_seed, budget, ctx, observer, dual);
        } else {
            self.worker_single(&mut mutator, budget, ctx, observer);
        }
    }

    fn worker_single(&self, mutator: &mut Mutator, budget: usize, ctx: &Context, observer: &dyn RunnerObserver) {
        let executor = Executor::new();
        let mut caches = RenderCaches::new();
        let mut local_current = ctx.state.lock().unwrap().best_a.clone();

        loop {
            if ctx.state.lock().unwrap().finished {
                return;
            }

            let mut candidate = local_current.clone();
            mutator.mutate_program(&mut candidate, &self.errors, &self.possible_colors);
            let result = evaluate_single(&executor, &mut candidate, &mut caches, &self.onoff, &self.errors);
            let cost = result.total_error;

            {
                let mut state = ctx.state.lock().unwrap();
                state.evaluations += 1;
                if self.config.max_evals > 0 && state.evaluations >= self.config.max_evals {
                    state.finished = true;
                }
                if state.policy.accept(cost) {
                    local_current = candidate.clone();
                }
                if cost < state.best_cost {
                    tracing::info!(cost, evaluations = state.evaluations, "new best");
                    state.best_a = candidate;
                    state.best_cost = cost;
                    state.last_best_eval = state.evaluations;
                    let snapshot = state.snapshot();
                    drop(state);
                    observer.on_improvement(&snapshot);
                    state = ctx.state.lock().unwrap();
                }
                state.policy.post_iteration();
                merge_stats(&mut state.mutation_stats, mutator.stats());

                let evals_since = state.evaluations - state.last_checkpoint_eval;
                let time_since = state.last_checkpoint_time.elapsed();
                if should_checkpoint(&self.config.save, evals_since, time_since) {
                    tracing::info!(evaluations = state.evaluations, "checkpoint");
                    state.last_checkpoint_eval = state.evaluations;
                    state.last_checkpoint_time = Instant::now();
                    let snapshot = state.snapshot();
                    drop(state);
                    observer.on_checkpoint(&snapshot);
                    state = ctx.state.lock().unwrap();
                }

                if state.finished {
                    ctx.condvar.notify_all();
                    return;
                }
            }
            mutator.reset_stats();

            if caches.arena.size() > budget {
                tracing::debug!(budget, "arena budget exceeded, clearing caches");
                caches.clear();
                local_current.invalidate_all_identities();
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn worker_dual(
        &self,
        mutator: &mut Mutator,
        worker_seed: u64,
        budget: usize,
        ctx: &Context,
        observer: &dyn RunnerObserver,
        dual: &DualAssets,
    ) {
        let executor = Executor::new();
        let mut caches_a = RenderCaches::new();
        let mut caches_b = RenderCaches::new();
        let tables = PairTables::new(&dual.palette);
        let weights = FlickerWeights {
            w_l_initial: self.config.dual.w_l_initial,
            w_l_final: self.config.dual.w_l,
            w_c: self.config.dual.w_c,
            blink_ramp_evals: self.config.dual.blink_ramp_evals,
        };
        let strategy = match self.config.dual.strategy {
            DualStrategyConfig::Alternate => DualStrategy::Alternate,
            DualStrategyConfig::Staged => DualStrategy::Staged,
        };
        let mut scheduler = StageScheduler::new(strategy, self.config.dual.mutate_ratio, self.config.dual.stage_evals);
        let mut scheduler_rng = Rng::new(worker_seed ^ 0xD1A1_D1A1);

        let (mut local_a, mut local_b) = {
            let state = ctx.state.lock().unwrap();
            (state.best_a.clone(), state.best_b.clone().expect("dual mode seeds best_b"))
        };

        loop {
            if ctx.state.lock().unwrap().finished {
                return;
            }

            let (mutate_b, flipped) = scheduler.tick(&mut scheduler_rng);
            if flipped {
                let mut state = ctx.state.lock().unwrap();
                let current = state.policy.current_cost();
                state.policy.on_stage_switch(current);
            }

            let mut candidate_a = local_a.clone();
            let mut candidate_b = local_b.clone();
            mutator.set_targets_b(mutate_b);

            if scheduler_rng.chance(self.config.dual.cross_share_prob) {
                apply_cross_share(&mut candidate_a, &mut candidate_b, &mut scheduler_rng);
            } else if mutate_b {
                mutator.mutate_program(&mut candidate_b, &self.errors, &self.possible_colors);
            } else {
                mutator.mutate_program(&mut candidate_a, &self.errors, &self.possible_colors);
            }

            let evals_for_ramp = ctx.state.lock().unwrap().evaluations;
            let mut other_frame_buf: Vec<u8> = Vec::new();
            let evaluation = evaluate_dual(
                &executor,
                &mut candidate_a,
                &mut candidate_b,
                mutate_b,
                &mut caches_a,
                &mut caches_b,
                &self.onoff,
                &self.errors,
                |fixed_result| {
                    other_frame_buf = crate::dual::flatten_color_rows(fixed_result);
                    PairCost::new(&tables, &dual.target_b, &other_frame_buf, weights, evals_for_ramp)
                },
            );
            let cost = evaluation.cost;

            {
                let mut state = ctx.state.lock().unwrap();
                state.evaluations += 1;
                if self.config.max_evals > 0 && state.evaluations >= self.config.max_evals {
                    state.finished = true;
                }
                if state.policy.accept(cost) {
                    local_a = candidate_a.clone();
                    local_b = candidate_b.clone();
                }
                if cost < state.best_cost {
                    tracing::info!(cost, evaluations = state.evaluations, "new best (dual)");
                    state.best_a = candidate_a;
                    state.best_b = Some(candidate_b);
                    state.best_cost = cost;
                    state.last_best_eval = state.evaluations;
                    let snapshot = state.snapshot();
                    drop(state);
                    observer.on_improvement(&snapshot);
                    state = ctx.state.lock().unwrap();
                }
                state.policy.post_iteration();
                merge_stats(&mut state.mutation_stats, mutator.stats());

                let evals_since = state.evaluations - state.last_checkpoint_eval;
                let time_since = state.last_checkpoint_time.elapsed();
                if should_checkpoint(&self.config.save, evals_since, time_since) {
                    tracing::info!(evaluations = state.evaluations, "checkpoint");
                    state.last_checkpoint_eval = state.evaluations;
                    state.last_checkpoint_time = Instant::now();
                    let snapshot = state.snapshot();
                    drop(state);
                    observer.on_checkpoint(&snapshot);
                    state = ctx.state.lock().unwrap();
                }

                if state.finished {
                    ctx.condvar.notify_all();
                    return;
                }
            }
            mutator.reset_stats();

            if caches_a.arena.size() > budget {
                tracing::debug!(budget, frame = "a", "arena budget exceeded, clearing caches");
                caches_a.clear();
                local_a.invalidate_all_identities();
            }
            if caches_b.arena.size() > budget {
                tracing::debug!(budget, frame = "b", "arena budget exceeded, clearing caches");
                caches_b.clear();
                local_b.invalidate_all_identities();
            }
        }
    }

    /// Seed frame B from frame A before the first iteration, per
    /// spec.md §4.7 "Initialization".
    pub fn seed_dual_b(picture_a: &Picture, mutator: &mut Mutator, errors: &ErrorMap, possible_colors: &[Vec<u8>], init: DualInitConfig) -> Picture {
        let strategy = match init {
            DualInitConfig::Dup => DualInit::Dup,
            DualInitConfig::Random => DualInit::Random,
            DualInitConfig::Anti => DualInit::Anti,
        };
        initialize_b(strategy, picture_a, mutator, errors, possible_colors)
    }
}

/// Line-level cross op between A and B, per spec.md §4.3 "Dual-mode
/// extras": copy or swap one scanline, equal probability.
fn apply_cross_share(picture_a: &mut Picture, picture_b: &mut Picture, rng: &mut Rng) {
    let height = picture_a.height().min(picture_b.height());
    if height == 0 {
        return;
    }
    let y = rng.gen_range(height);
    if rng.gen_range(2) == 0 {
        let from_a = picture_a.lines[y].clone();
        picture_b.lines[y] = from_a;
    } else {
        std::mem::swap(&mut picture_a.lines[y], &mut picture_b.lines[y]);
    }
}

fn merge_stats(into: &mut MutationStats, from: &MutationStats) {
    for i in 0..MUTATION_COUNT {
        into.attempt_count[i] += from.attempt_count[i];
        into.success_count[i] += from.success_count[i];
    }
}
