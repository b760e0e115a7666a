//! Single-flip candidate bookkeeping.
//!
//! Beyond the all-free-zero candidate tracked by `PairState`, the solver
//! watches the "distance one" candidates: assignments obtained by flipping
//! exactly one still-free column of the augmented system. For each column
//! this counter keeps the number of auxiliary pairs that would be driven to
//! the forbidden `(1, 1)` state by that flip; a column with count zero is a
//! candidate worth extracting.
//!
//! Per pair, the set of ruled-out columns depends on which of the two
//! auxiliary rows are resolved and on their result bits. With both rows
//! resolved, flipping column j drives the pair to
//! `(r0 ⊕ eq0[j], r1 ⊕ eq1[j])`, so the ruled-out columns per result-bit
//! case follow directly from that truth table:
//!
//! - `(0,0)`: ruled out where `eq0 & eq1`
//! - `(0,1)`: ruled out where `eq0 & !eq1`
//! - `(1,0)`: ruled out where `!eq0 & eq1`
//! - `(1,1)`: ruled out where `!(eq0 | eq1)`
//!
//! The pair's own columns are always ruled out while resolved (their value
//! is dictated by their rows, so they are not free to flip). With only one
//! row resolved, say the left, only the companion column can raise the
//! free side to 1, and it is ruled out iff the resolved side is also 1
//! under that flip, i.e. iff `r0 ⊕ eq0[v1]`. With neither row resolved
//! nothing is ruled out. The counter is incremental: before an elimination
//! the solver removes the contributions of the affected pairs, afterwards
//! it adds them back from the updated rows.

use kc2_core::BitVector;
use kc2_systems::LinearSystem;

/// Per-column count of auxiliary pairs ruling out the single-flip
/// candidate at that column.
#[derive(Debug, Clone)]
pub struct FreedomCounter {
    /// Number of original variables; auxiliary columns start here.
    vars: usize,
    /// Ruled-out count per augmented column.
    blocked: Vec<u32>,
    /// Reused mask buffer, one bit per augmented column.
    scratch: BitVector,
}

impl FreedomCounter {
    /// Builds the counter from a freshly inverted system.
    pub fn new(system: &LinearSystem, vars: usize, pair_count: usize) -> Self {
        let mut counter = FreedomCounter {
            vars,
            blocked: vec![0; system.cols()],
            scratch: BitVector::new(system.cols()),
        };
        for pair in 0..pair_count {
            counter.add_pair(system, pair);
        }
        counter
    }

    /// Columns ruled out by `pair` under the system's current state.
    fn fill_pair_mask(vars: usize, system: &LinearSystem, pair: usize, mask: &mut BitVector) {
        mask.clear_all();
        let v0 = vars + 2 * pair;
        let v1 = v0 + 1;
        match (system.row_for_var(v0), system.row_for_var(v1)) {
            (Some(e0), Some(e1)) => {
                let r0 = system.result(e0);
                let r1 = system.result(e1);
                match (r0, r1) {
                    (false, false) => {
                        mask.xor(system.equation(e0));
                        mask.and(system.equation(e1));
                    }
                    (false, true) => {
                        mask.xor(system.equation(e0));
                        mask.and_not(system.equation(e1));
                    }
                    (true, false) => {
                        mask.xor(system.equation(e1));
                        mask.and_not(system.equation(e0));
                    }
                    (true, true) => {
                        mask.xor(system.equation(e0));
                        mask.or(system.equation(e1));
                        mask.invert();
                    }
                }
                mask.set(v0);
                mask.set(v1);
            }
            (Some(e0), None) => {
                mask.set(v0);
                if system.result(e0) ^ system.equation(e0).get(v1) {
                    mask.set(v1);
                }
            }
            (None, Some(e1)) => {
                mask.set(v1);
                if system.result(e1) ^ system.equation(e1).get(v0) {
                    mask.set(v0);
                }
            }
            (None, None) => {}
        }
    }

    fn apply_pair(&mut self, system: &LinearSystem, pair: usize, add: bool) {
        let mut mask = std::mem::replace(&mut self.scratch, BitVector::new(0));
        Self::fill_pair_mask(self.vars, system, pair, &mut mask);
        for col in mask.ones() {
            if add {
                self.blocked[col] += 1;
            } else {
                self.blocked[col] -= 1;
            }
        }
        self.scratch = mask;
    }

    /// Adds `pair`'s contribution from the system's current state.
    pub fn add_pair(&mut self, system: &LinearSystem, pair: usize) {
        self.apply_pair(system, pair, true);
    }

    /// Removes the contribution `pair` added from its previous state. Must
    /// be called *before* the rows backing the pair are modified.
    pub fn remove_pair(&mut self, system: &LinearSystem, pair: usize) {
        self.apply_pair(system, pair, false);
    }

    /// True if some column admits a single-flip candidate.
    pub fn has_solution(&self) -> bool {
        self.blocked.iter().any(|&count| count == 0)
    }

    /// Columns whose single-flip candidate no pair rules out.
    pub fn open_columns(&self) -> impl Iterator<Item = usize> + '_ {
        self.blocked
            .iter()
            .enumerate()
            .filter(|(_, &count)| count == 0)
            .map(|(col, _)| col)
    }
}
