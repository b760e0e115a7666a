//! Forced-pair tracking over the augmented linear system.
//!
//! Bilinearization gives every original AND row two auxiliary variables
//! (its operand values). Once the system is rotated around the pivot and
//! normalized to zero-products, an assignment is ruled out exactly when
//! some row has *both* auxiliaries forced to 1. This counter keeps one bit
//! per row: set while the pair is forced `(1, 1)` under the current linear
//! knowledge, evaluated at the all-free-zero candidate.
//!
//! The counter holds no copies of equation data, only indices into the
//! owning system; the solver tells it which row changed after each
//! elimination and only that row's pair is recomputed.

use kc2_core::BitVector;
use kc2_systems::LinearSystem;

/// Incremental "both auxiliaries forced to 1" tracker.
#[derive(Debug, Clone)]
pub struct PairState {
    /// Number of original variables; auxiliary columns start here.
    vars: usize,
    /// One bit per original row: set while that pair is forced `(1, 1)`.
    forced: BitVector,
}

impl PairState {
    /// Builds the initial state from a freshly inverted system, where every
    /// auxiliary variable is still expressed by its own row.
    pub fn new(system: &LinearSystem, vars: usize, pair_count: usize) -> Self {
        let mut state = PairState {
            vars,
            forced: BitVector::new(pair_count),
        };
        for pair in 0..pair_count {
            state.recompute(system, vars + 2 * pair);
        }
        state
    }

    /// Pair index of an auxiliary variable.
    #[inline]
    pub fn pair_of(&self, aux: usize) -> usize {
        debug_assert!(aux >= self.vars);
        (aux - self.vars) / 2
    }

    /// The other auxiliary variable of the same original row.
    #[inline]
    pub fn companion(&self, aux: usize) -> usize {
        if (aux - self.vars) % 2 == 0 {
            aux + 1
        } else {
            aux - 1
        }
    }

    fn recompute(&mut self, system: &LinearSystem, aux: usize) {
        let companion = self.companion(aux);
        let forced = match (system.row_for_var(aux), system.row_for_var(companion)) {
            (Some(a), Some(b)) => system.result(a) && system.result(b),
            _ => false,
        };
        self.forced.assign(self.pair_of(aux), forced);
    }

    /// Clears the pair of the variable `row` currently expresses, called
    /// just before the solver re-purposes that row for another variable.
    pub fn clear_row(&mut self, system: &LinearSystem, row: usize) {
        if let Some(var) = system.expressed_var(row) {
            if var >= self.vars {
                self.forced.clear(self.pair_of(var));
            }
        }
    }

    /// Recomputes the pair of the variable `row` expresses, called after
    /// an elimination modified that row.
    pub fn update_row(&mut self, system: &LinearSystem, row: usize) {
        if let Some(var) = system.expressed_var(row) {
            if var >= self.vars {
                self.recompute(system, var);
            }
        }
    }

    /// True while no pair is forced `(1, 1)` — the necessary condition for
    /// extracting the current candidate.
    pub fn has_solution(&self) -> bool {
        self.forced.is_zero()
    }
}
