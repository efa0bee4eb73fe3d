// AcceptancePolicy: LAHC and DLAS, both behind the same interface so the
// Runner never branches on which is active. Grounded on
// `original_source/src/optimization/AcceptancePolicy.h`'s `LAHCPolicy`/
// `DLASPolicy` interface shape and spec.md §4.5's exact pseudocode for the
// accept/refresh rules.

/// `{init; accept(cand_cost) -> bool; postIteration()}`.
pub trait AcceptancePolicy {
    /// Seed history from the candidate's own first-ever cost.
    fn on_initial_score(&mut self, initial_score: f64);
    /// Reseed history after a staged dual-frame focus flip.
    fn on_stage_switch(&mut self, current_cost: f64);
    fn accept(&mut self, cand_cost: f64) -> bool;
    fn post_iteration(&mut self);
    fn current_cost(&self) -> f64;
}

/// Late-Acceptance Hill Climbing: accept if the candidate beats the cost
/// from `L` iterations ago, or beats the running current.
#[derive(Debug, Clone)]
pub struct Lahc {
    history: Vec<f64>,
    index: usize,
    current: f64,
    /// Last `accept` call's verdict, applied by `post_iteration`.
    pending_current: f64,
}

impl Lahc {
    pub fn new(history_length: usize) -> Self {
        let length = history_length.max(1);
        Lahc {
            history: vec![f64::INFINITY; length],
            index: 0,
            current: f64::INFINITY,
            pending_current: f64::INFINITY,
        }
    }
}

impl Lahc {
    /// Rebuild from a persisted checkpoint's raw fields, per spec.md §6's
    /// `.lahc` layout (`L, index, cost_max, N, current_cost, history...`).
    /// `cost_max`/`N` are round-tripped but unused by LAHC's own accept
    /// rule, matching the original's shared save/load file layout.
    pub fn from_checkpoint(index: usize, current_cost: f64, history: Vec<f64>) -> Self {
        Lahc { history, index, current: current_cost, pending_current: current_cost }
    }

    pub fn history(&self) -> &[f64] {
        &self.history
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

impl AcceptancePolicy for Lahc {
    fn on_initial_score(&mut self, initial_score: f64) {
        self.current = initial_score;
        self.pending_current = initial_score;
        self.history.fill(initial_score);
        self.index = 0;
    }

    fn on_stage_switch(&mut self, current_cost: f64) {
        self.current = current_cost;
        self.pending_current = current_cost;
        self.history.fill(current_cost);
        self.index = 0;
    }

    fn accept(&mut self, cand_cost: f64) -> bool {
        let h = self.history[self.index % self.history.len()];
        let accepted = cand_cost <= h || cand_cost < self.current;
        if accepted {
            self.pending_current = cand_cost;
        }
        accepted
    }

    fn post_iteration(&mut self) {
        let len = self.history.len();
        self.history[self.index % len] = self.pending_current;
        self.current = self.pending_current;
        self.index = self.index.wrapping_add(1);
    }

    fn current_cost(&self) -> f64 {
        self.current
    }
}

/// Diversified Late Acceptance Search: tracks the running max of history
/// (`cost_max`) with its multiplicity `N`, recomputing only when the slot
/// holding the max is overwritten to something smaller and no duplicate
/// remains.
#[derive(Debug, Clone)]
pub struct Dlas {
    history: Vec<f64>,
    index: usize,
    current: f64,
    pending_current: f64,
    cost_max: f64,
    multiplicity: usize,
}

impl Dlas {
    pub fn new(history_length: usize) -> Self {
        let length = history_length.max(1);
        Dlas {
            history: vec![f64::INFINITY; length],
            index: 0,
            current: f64::INFINITY,
            pending_current: f64::INFINITY,
            cost_max: f64::INFINITY,
            multiplicity: length,
        }
    }

    fn recompute_max(&mut self) {
        let max = self.history.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        self.cost_max = max;
        self.multiplicity = self.history.iter().filter(|&&h| h == max).count();
    }
}

impl Dlas {
    /// Rebuild from a persisted checkpoint's raw fields, per spec.md §6's
    /// `.dlas` layout (`L, index, cost_max, N, current_cost, history...`).
    pub fn from_checkpoint(
        index: usize,
        cost_max: f64,
        multiplicity: usize,
        current_cost: f64,
        history: Vec<f64>,
    ) -> Self {
        Dlas {
            history,
            index,
            current: current_cost,
            pending_current: current_cost,
            cost_max,
            multiplicity,
        }
    }

    pub fn history(&self) -> &[f64] {
        &self.history
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn cost_max(&self) -> f64 {
        self.cost_max
    }

    pub fn multiplicity(&self) -> usize {
        self.multiplicity
    }
}

impl AcceptancePolicy for Dlas {
    fn on_initial_score(&mut self, initial_score: f64) {
        self.current = initial_score;
        self.pending_current = initial_score;
        self.cost_max = initial_score * 1.1;
        self.history.fill(self.cost_max);
        self.multiplicity = self.history.len();
        self.index = 0;
    }

    fn on_stage_switch(&mut self, current_cost: f64) {
        self.current = current_cost;
        self.pending_current = current_cost;
        self.cost_max = current_cost + (5.0f64).max(current_cost * 0.02);
        self.history.fill(self.cost_max);
        self.multiplicity = self.history.len();
        self.index = 0;
    }

    fn accept(&mut self, cand_cost: f64) -> bool {
        let accepted = cand_cost == self.current || cand_cost < self.cost_max;
        if accepted {
            self.pending_current = cand_cost;
        }
        accepted
    }

    fn post_iteration(&mut self) {
        let len = self.history.len();
        let l = self.index % len;
        let current = self.pending_current;
        if current > self.history[l] {
            self.history[l] = current;
        } else if current < self.history[l] {
            if self.history[l] == self.cost_max {
                self.multiplicity = self.multiplicity.saturating_sub(1);
            }
            self.history[l] = current;
            if self.multiplicity == 0 {
                self.recompute_max();
            }
        }
        self.current = current;
        self.index = self.index.wrapping_add(1);
    }

    fn current_cost(&self) -> f64 {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lahc_tie_and_reject_and_accept_then_rotate() {
        let mut lahc = Lahc::new(3);
        lahc.on_initial_score(10.0);
        assert!(lahc.accept(10.0));
        lahc.post_iteration();
        // state restored to re-run the remaining sub-scenarios from the same base
        let mut lahc = Lahc::new(3);
        lahc.on_initial_score(10.0);
        assert!(!lahc.accept(11.0));
        let mut lahc = Lahc::new(3);
        lahc.on_initial_score(10.0);
        assert!(lahc.accept(9.0));
        lahc.post_iteration();
        assert_eq!(lahc.history, vec![9.0, 10.0, 10.0]);
    }

    #[test]
    fn dlas_history_refresh_matches_scenario() {
        let mut dlas = Dlas::new(2);
        dlas.current = 100.0;
        dlas.cost_max = 110.0;
        dlas.history = vec![110.0, 110.0];
        dlas.multiplicity = 2;
        dlas.index = 0;

        assert!(dlas.accept(90.0));
        dlas.post_iteration();
        assert_eq!(dlas.history[0], 90.0);
        assert_eq!(dlas.multiplicity, 1);

        assert!(dlas.accept(95.0));
        dlas.post_iteration();
        assert_eq!(dlas.history, vec![90.0, 95.0]);
        assert_eq!(dlas.cost_max, 95.0);
        assert_eq!(dlas.multiplicity, 1);
    }

    #[test]
    fn lahc_invariant_holds_after_accept() {
        let mut lahc = Lahc::new(4);
        lahc.on_initial_score(50.0);
        let history_before = lahc.history.clone();
        let prev_current = lahc.current_cost();
        if lahc.accept(40.0) {
            lahc.post_iteration();
            let max_before = history_before.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            assert!(lahc.current_cost() <= max_before || lahc.current_cost() < prev_current);
        }
    }
}
