//! Dual-frame co-optimization: the anti-flicker pair objective, its
//! precomputed lookup tables, the stage scheduler that decides which
//! frame a worker mutates, and the three `dual_init` seeding strategies.
//! Grounded on spec.md §4.7 directly — the retrieved `original_source`
//! slice does not carry a dual-frame mode at all, so there is no teacher
//! file to adapt here; the pair-cost math and table shapes are exactly
//! spec.md's formulas, and the `PixelCost` plumbing reuses `executor`'s
//! existing trait seam rather than inventing a parallel scan loop.

use crate::color::{rgb_to_yuv, Palette, Rgb, PALETTE_SIZE};
use crate::executor::{ExecutionResult, PixelCost};
use crate::mutation::Mutator;
use crate::program::Picture;
use crate::rng::Rng;

/// Destination-image truth in YUV, one triple per pixel. Precomputed
/// once before optimization starts and read-only thereafter, matching
/// spec.md §4.7 "Inputs".
#[derive(Debug, Clone)]
pub struct TargetYuv {
    width: usize,
    y: Vec<f64>,
    u: Vec<f64>,
    v: Vec<f64>,
}

impl TargetYuv {
    pub fn from_pixels(width: usize, pixels: &[Rgb]) -> Self {
        let mut y = Vec::with_capacity(pixels.len());
        let mut u = Vec::with_capacity(pixels.len());
        let mut v = Vec::with_capacity(pixels.len());
        for &p in pixels {
            let (py, pu, pv) = rgb_to_yuv(p);
            y.push(py);
            u.push(pu);
            v.push(pv);
        }
        TargetYuv { width, y, u, v }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    fn at(&self, idx: usize) -> (f64, f64, f64) {
        (self.y[idx], self.u[idx], self.v[idx])
    }
}

/// `pair_Ysum/Usum/Vsum/dY/dC`, flattened 128x128 tables removing
/// sqrt/abs from the per-pixel hot path.
#[derive(Debug, Clone)]
pub struct PairTables {
    sum_y: Vec<f64>,
    sum_u: Vec<f64>,
    sum_v: Vec<f64>,
    d_y: Vec<f64>,
    d_c: Vec<f64>,
}

fn pair_index(a: usize, b: usize) -> usize {
    a * PALETTE_SIZE + b
}

impl PairTables {
    pub fn new(palette: &Palette) -> Self {
        let yuv: Vec<(f64, f64, f64)> = palette.colors.iter().map(|&c| rgb_to_yuv(c)).collect();
        let len = PALETTE_SIZE * PALETTE_SIZE;
        let mut sum_y = vec![0.0; len];
        let mut sum_u = vec![0.0; len];
        let mut sum_v = vec![0.0; len];
        let mut d_y = vec![0.0; len];
        let mut d_c = vec![0.0; len];

        for a in 0..PALETTE_SIZE {
            let (ay, au, av) = yuv[a];
            for b in 0..PALETTE_SIZE {
                let (by, bu, bv) = yuv[b];
                let i = pair_index(a, b);
                sum_y[i] = ay + by;
                sum_u[i] = au + bu;
                sum_v[i] = av + bv;
                d_y[i] = (ay - by).abs();
                d_c[i] = ((au - bu).powi(2) + (av - bv).powi(2)).sqrt();
            }
        }

        PairTables { sum_y, sum_u, sum_v, d_y, d_c }
    }
}

/// Linear ramp from `w_L_initial` to the configured `w_L` over
/// `blink_ramp_evals` evaluations, per spec.md §4.7 "Ramp".
#[derive(Debug, Clone, Copy)]
pub struct FlickerWeights {
    pub w_l_initial: f64,
    pub w_l_final: f64,
    pub w_c: f64,
    pub blink_ramp_evals: u64,
}

impl FlickerWeights {
    pub fn w_l_at(&self, evaluations: u64) -> f64 {
        if self.blink_ramp_evals == 0 {
            return self.w_l_final;
        }
        let t = (evaluations as f64 / self.blink_ramp_evals as f64).min(1.0);
        self.w_l_initial + (self.w_l_final - self.w_l_initial) * t
    }
}

const T_L: f64 = 3.0;
const T_C: f64 = 8.0;

/// Pair-aware per-pixel cost: scores a candidate palette index against
/// the already-rendered other frame's pixel at the same position, per
/// spec.md §4.7's formula.
pub struct PairCost<'a> {
    tables: &'a PairTables,
    target: &'a TargetYuv,
    /// The fixed frame's chosen palette index, flattened row-major.
    other_frame: &'a [u8],
    w_l: f64,
    w_c: f64,
}

impl<'a> PairCost<'a> {
    pub fn new(tables: &'a PairTables, target: &'a TargetYuv, other_frame: &'a [u8], weights: FlickerWeights, evaluations: u64) -> Self {
        PairCost { tables, target, other_frame, w_l: weights.w_l_at(evaluations), w_c: weights.w_c }
    }
}

impl PixelCost for PairCost<'_> {
    fn cost(&self, palette_index: u8, y: usize, x: usize) -> f64 {
        let idx = y * self.target.width + x;
        let a = palette_index as usize;
        let b = self.other_frame[idx] as usize;
        let pi = pair_index(a, b);

        let (ty, tu, tv) = self.target.at(idx);
        let y_bar = self.tables.sum_y[pi] / 2.0;
        let u_bar = self.tables.sum_u[pi] / 2.0;
        let v_bar = self.tables.sum_v[pi] / 2.0;
        let base = (y_bar - ty).powi(2) + (u_bar - tu).powi(2) + (v_bar - tv).powi(2);

        let flick = self.w_l * (self.tables.d_y[pi] - T_L).max(0.0).powi(2)
            + self.w_c * (self.tables.d_c[pi] - T_C).max(0.0).powi(2);

        base + flick
    }

    fn width(&self) -> usize {
        self.target.width
    }
}

/// Flatten a rendered picture's per-line color rows into one row-major
/// buffer, the shape `PairCost` expects for the "other frame".
pub fn flatten_color_rows(result: &ExecutionResult) -> Vec<u8> {
    result.lines.iter().flat_map(|line| line.color_row.iter().copied()).collect()
}

/// `dual_strategy`: which frame a worker mutates this iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DualStrategy {
    Alternate,
    Staged,
}

/// Decides, per iteration, whether the worker mutates frame B (vs. A),
/// per spec.md §4.7 "Stage scheduler".
#[derive(Debug, Clone)]
pub struct StageScheduler {
    strategy: DualStrategy,
    dual_mutate_ratio: f64,
    dual_stage_evals: u64,
    focus_b: bool,
    evals_in_stage: u64,
}

impl StageScheduler {
    pub fn new(strategy: DualStrategy, dual_mutate_ratio: f64, dual_stage_evals: u64) -> Self {
        StageScheduler { strategy, dual_mutate_ratio, dual_stage_evals, focus_b: false, evals_in_stage: 0 }
    }

    pub fn focus_b(&self) -> bool {
        self.focus_b
    }

    /// Advance one iteration. Returns `(mutate_b, flipped)`; on `flipped`
    /// the caller must invoke `policy.on_stage_switch(current_cost)`.
    pub fn tick(&mut self, rng: &mut Rng) -> (bool, bool) {
        match self.strategy {
            DualStrategy::Alternate => (rng.chance(self.dual_mutate_ratio), false),
            DualStrategy::Staged => {
                self.evals_in_stage += 1;
                let mut flipped = false;
                if self.dual_stage_evals > 0 && self.evals_in_stage >= self.dual_stage_evals {
                    self.evals_in_stage = 0;
                    self.focus_b = !self.focus_b;
                    flipped = true;
                }
                (self.focus_b, flipped)
            }
        }
    }
}

/// `dual_init`: how B is seeded from A before optimization starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DualInit {
    /// B starts identical to A.
    Dup,
    /// B starts from A with roughly `H/2` random mutations applied.
    Random,
    /// B starts from A with roughly `2H` mutations — heavier divergence.
    Anti,
}

pub fn initialize_b(
    strategy: DualInit,
    picture_a: &Picture,
    mutator: &mut Mutator,
    errors: &crate::color::ErrorMap,
    possible_colors: &[Vec<u8>],
) -> Picture {
    let mut picture_b = picture_a.clone();
    let height = picture_a.height();
    let rounds = match strategy {
        DualInit::Dup => 0,
        DualInit::Random => (height / 2).max(1),
        DualInit::Anti => (2 * height).max(1),
    };
    for _ in 0..rounds {
        mutator.mutate_program(&mut picture_b, errors, possible_colors);
    }
    picture_b
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;

    fn flat_palette() -> Palette {
        let mut colors = [Rgb::default(); PALETTE_SIZE];
        for (i, c) in colors.iter_mut().enumerate() {
            *c = Rgb { r: (i * 2) as u8, g: (i * 2) as u8, b: (i * 2) as u8 };
        }
        Palette::new(colors)
    }

    #[test]
    fn zero_weights_reduce_to_base_cost() {
        let palette = flat_palette();
        let tables = PairTables::new(&palette);
        let target = TargetYuv::from_pixels(1, &[Rgb { r: 0, g: 0, b: 0 }]);
        let other_frame = [0u8];
        let weights = FlickerWeights { w_l_initial: 0.0, w_l_final: 0.0, w_c: 0.0, blink_ramp_evals: 0 };
        let cost = PairCost::new(&tables, &target, &other_frame, weights, 0);

        let a = 10u8;
        let expected_base = {
            let (ay, au, av) = rgb_to_yuv(palette.colors[a as usize]);
            let (by, bu, bv) = rgb_to_yuv(palette.colors[0]);
            let ybar = (ay + by) / 2.0;
            let ubar = (au + bu) / 2.0;
            let vbar = (av + bv) / 2.0;
            ybar.powi(2) + ubar.powi(2) + vbar.powi(2)
        };
        assert!((cost.cost(a, 0, 0) - expected_base).abs() < 1e-9);
    }

    #[test]
    fn ramp_interpolates_linearly_then_clamps() {
        let weights = FlickerWeights { w_l_initial: 0.6, w_l_final: 1.0, w_c: 0.0, blink_ramp_evals: 100 };
        assert!((weights.w_l_at(0) - 0.6).abs() < 1e-9);
        assert!((weights.w_l_at(50) - 0.8).abs() < 1e-9);
        assert!((weights.w_l_at(1000) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn staged_scheduler_flips_after_configured_evals_and_reports_it() {
        let mut scheduler = StageScheduler::new(DualStrategy::Staged, 0.5, 3);
        let mut rng = Rng::new(1);
        let mut flips = 0;
        for _ in 0..6 {
            let (_, flipped) = scheduler.tick(&mut rng);
            if flipped {
                flips += 1;
            }
        }
        assert_eq!(flips, 2);
    }

    #[test]
    fn dual_mutate_ratio_extremes_pin_the_target() {
        let mut rng = Rng::new(7);
        let mut always_a = StageScheduler::new(DualStrategy::Alternate, 0.0, 0);
        let mut always_b = StageScheduler::new(DualStrategy::Alternate, 1.0, 0);
        for _ in 0..20 {
            assert!(!always_a.tick(&mut rng).0);
            assert!(always_b.tick(&mut rng).0);
        }
    }
}
