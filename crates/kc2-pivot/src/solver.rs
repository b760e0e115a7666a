//! Second-solution search around a known pivot assignment.
//!
//! Pipeline: normalize the AND system to zero-product rows, rotate it
//! around the pivot so both operands of every row vanish on it, bilinearize
//! into an augmented linear system, then eliminate variables one at a time
//! while two incremental counters watch for an extractable alternate
//! solution. A deterministic index-order pass runs first; if it exhausts
//! the variables without success, a seeded randomized walk restarts from
//! the pristine augmented state over and over, eliminating in random order
//! until a solution appears or the caller cancels.

use crate::freedom::FreedomCounter;
use crate::pairs::PairState;
use crate::rng::Rng;
use hashbrown::HashSet;
use kc2_core::{BitVector, CancelToken};
use kc2_systems::{LinearSystem, QuadraticSystem};
use rustc_hash::FxHashSet;

/// Tuning knobs for [`PivotSolver`].
#[derive(Debug, Clone)]
pub struct PivotConfig {
    /// Seed for the randomized walk.
    pub seed: u64,
    /// Progress callback cadence, in elimination steps.
    pub progress_interval: u64,
}

impl Default for PivotConfig {
    fn default() -> Self {
        PivotConfig {
            seed: 0x9e3779b97f4a7c15,
            progress_interval: 1024,
        }
    }
}

/// Which phase the solver is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Index-order elimination.
    Deterministic,
    /// Randomized elimination with restarts.
    Walk,
}

/// Observability snapshot passed to the progress callback.
///
/// Reporting is pure observation: it never changes the elimination path.
#[derive(Debug, Clone)]
pub struct PivotProgress {
    /// Current phase.
    pub phase: Phase,
    /// Total eliminations performed so far.
    pub eliminations: u64,
    /// Completed walk rounds.
    pub walk_rounds: u64,
    /// Original variables currently resolved.
    pub resolved: usize,
}

/// Counters accumulated across a solve run.
#[derive(Debug, Clone, Default)]
pub struct PivotStats {
    /// Variable eliminations performed (both phases).
    pub eliminations: u64,
    /// Walk rounds started.
    pub walk_rounds: u64,
    /// Eliminations performed inside the walk.
    pub walk_steps: u64,
    /// Extraction candidates rejected (pivot itself or oracle-invalid).
    pub candidates_rejected: u64,
}

/// Searches for a valid assignment distinct from a known pivot solution.
pub struct PivotSolver {
    /// Original variable count; augmented columns beyond this are auxiliary.
    vars: usize,
    pivot: BitVector,
    /// Normalized, rotated zero-product system; the validation oracle.
    /// Normalization and rotation both preserve the solution set exactly.
    oracle: QuadraticSystem,
    /// Augmented linear system being eliminated.
    linear: LinearSystem,
    pairs: PairState,
    freedom: FreedomCounter,
    /// Pristine post-inversion state for walk restarts.
    snapshot: (LinearSystem, PairState, FreedomCounter),
    rng: Rng,
    config: PivotConfig,
    stats: PivotStats,
}

impl PivotSolver {
    /// Prepares the search. The pivot must be a valid assignment of
    /// `system`; anything else is a contract violation.
    pub fn new(system: &QuadraticSystem, pivot: BitVector, config: PivotConfig) -> Self {
        assert_eq!(pivot.len(), system.cols(), "pivot width mismatch");
        assert!(
            system.is_valid(&pivot),
            "pivot does not satisfy the input system"
        );

        let mut oracle = if system.is_zero_product() {
            system.clone()
        } else {
            system.simplify()
        };
        oracle.rotate_around(&pivot);

        let linear = oracle.invert_to_linear();
        let vars = system.cols();
        let pairs = PairState::new(&linear, vars, oracle.rows());
        let freedom = FreedomCounter::new(&linear, vars, oracle.rows());
        let snapshot = (linear.clone(), pairs.clone(), freedom.clone());
        let rng = Rng::new(config.seed);

        PivotSolver {
            vars,
            pivot,
            oracle,
            linear,
            pairs,
            freedom,
            snapshot,
            rng,
            config,
            stats: PivotStats::default(),
        }
    }

    /// Prepares a search constrained by a parallel system of known bits.
    ///
    /// Every row of `known` is folded into the quadratic system as a
    /// zero-product row, so returned solutions satisfy both systems.
    pub fn with_known_bits(
        system: &QuadraticSystem,
        known: &LinearSystem,
        pivot: BitVector,
        config: PivotConfig,
    ) -> Self {
        Self::new(&system.augmented_with_linear(known), pivot, config)
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> &PivotStats {
        &self.stats
    }

    /// Runs the full search: counters check, deterministic pass, then the
    /// unbounded randomized walk.
    ///
    /// Returns the discovered solutions; the set is empty only if the
    /// token was cancelled before any solution was found. The token is
    /// polled once per loop iteration, between whole eliminations.
    pub fn solve<F>(&mut self, cancel: &CancelToken, mut on_progress: F) -> HashSet<BitVector>
    where
        F: FnMut(&PivotProgress),
    {
        if let Some(found) = self.try_extract() {
            return found;
        }
        if let Some(found) = self.deterministic_pass(cancel, &mut on_progress) {
            return found;
        }
        if cancel.is_cancelled() {
            return HashSet::new();
        }
        self.walk(cancel, &mut on_progress)
    }

    /// Runs only the deterministic pass; `None` means it exhausted every
    /// variable without finding a solution (or was cancelled).
    pub fn deterministic_pass<F>(
        &mut self,
        cancel: &CancelToken,
        on_progress: &mut F,
    ) -> Option<HashSet<BitVector>>
    where
        F: FnMut(&PivotProgress),
    {
        for var in 0..self.vars {
            if cancel.is_cancelled() {
                return None;
            }
            if self.linear.row_for_var(var).is_some() {
                continue;
            }
            let Some(row) = (0..self.linear.rows()).find(|&row| self.is_candidate(row, var))
            else {
                continue;
            };
            self.eliminate(row, var);
            self.report(Phase::Deterministic, on_progress);
            if let Some(found) = self.try_extract() {
                return Some(found);
            }
        }
        None
    }

    /// A row is usable for eliminating `var` while it still expresses an
    /// auxiliary variable, is nonempty and references `var`.
    fn is_candidate(&self, row: usize, var: usize) -> bool {
        self.linear
            .expressed_var(row)
            .is_some_and(|v| v >= self.vars)
            && !self.linear.equation(row).is_zero()
            && self.linear.equation(row).get(var)
    }

    /// Eliminates `var` through `row`, keeping both counters in sync.
    ///
    /// The counters are told exactly which rows change: contributions of
    /// the affected auxiliary pairs are removed against the old state and
    /// re-added from the new one; no counter is rebuilt from scratch.
    fn eliminate(&mut self, row: usize, var: usize) {
        let mut touched: FxHashSet<usize> = FxHashSet::default();
        if let Some(aux) = self.linear.expressed_var(row) {
            if aux >= self.vars {
                touched.insert(self.pairs.pair_of(aux));
            }
        }
        for other in 0..self.linear.rows() {
            if other != row && self.linear.equation(other).get(var) {
                if let Some(aux) = self.linear.expressed_var(other) {
                    if aux >= self.vars {
                        touched.insert(self.pairs.pair_of(aux));
                    }
                }
            }
        }

        self.pairs.clear_row(&self.linear, row);
        for &pair in &touched {
            self.freedom.remove_pair(&self.linear, pair);
        }

        let mut changed = Vec::new();
        self.linear
            .express_variable(row, var, |other| changed.push(other));

        for &other in &changed {
            self.pairs.update_row(&self.linear, other);
        }
        for &pair in &touched {
            self.freedom.add_pair(&self.linear, pair);
        }
        self.stats.eliminations += 1;
    }

    /// Builds the candidate assignment implied by the current linear
    /// knowledge: resolved original variables take their row's value,
    /// free ones stay zero, optionally with one augmented column flipped.
    fn candidate(&self, flip: Option<usize>) -> BitVector {
        let mut assignment = BitVector::new(self.vars);
        if let Some(col) = flip {
            if col < self.vars {
                assignment.set(col);
            }
        }
        for var in 0..self.vars {
            if let Some(row) = self.linear.row_for_var(var) {
                let mut value = self.linear.result(row);
                if let Some(col) = flip {
                    value ^= self.linear.equation(row).get(col);
                }
                assignment.assign(var, value);
            }
        }
        assignment
    }

    /// Checks both counters and extracts every currently derivable
    /// solution, filtering the pivot and oracle-invalid candidates.
    fn try_extract(&mut self) -> Option<HashSet<BitVector>> {
        if self.pairs.has_solution() {
            let candidate = self.candidate(None);
            if candidate != self.pivot && self.oracle.is_valid(&candidate) {
                let mut found = HashSet::new();
                found.insert(candidate);
                return Some(found);
            }
            self.stats.candidates_rejected += 1;
        }

        if self.freedom.has_solution() {
            let mut found = HashSet::new();
            for col in self.freedom.open_columns().collect::<Vec<_>>() {
                // flipping an already-resolved original variable is not a
                // candidate; its value is dictated by its row
                if col < self.vars && self.linear.row_for_var(col).is_some() {
                    continue;
                }
                let candidate = self.candidate(Some(col));
                if candidate != self.pivot && self.oracle.is_valid(&candidate) {
                    found.insert(candidate);
                } else {
                    self.stats.candidates_rejected += 1;
                }
            }
            if !found.is_empty() {
                return Some(found);
            }
        }
        None
    }

    fn report<F>(&self, phase: Phase, on_progress: &mut F)
    where
        F: FnMut(&PivotProgress),
    {
        let interval = self.config.progress_interval.max(1);
        if self.stats.eliminations % interval != 0 {
            return;
        }
        self.emit(phase, on_progress);
    }

    fn emit<F>(&self, phase: Phase, on_progress: &mut F)
    where
        F: FnMut(&PivotProgress),
    {
        let resolved = (0..self.vars)
            .filter(|&v| self.linear.row_for_var(v).is_some())
            .count();
        on_progress(&PivotProgress {
            phase,
            eliminations: self.stats.eliminations,
            walk_rounds: self.stats.walk_rounds,
            resolved,
        });
    }

    /// The unbounded randomized phase: restart from the pristine augmented
    /// state, eliminate in random order, and keep going until a solution
    /// appears or the token is cancelled. There is no failure exit.
    fn walk<F>(&mut self, cancel: &CancelToken, on_progress: &mut F) -> HashSet<BitVector>
    where
        F: FnMut(&PivotProgress),
    {
        loop {
            if cancel.is_cancelled() {
                return HashSet::new();
            }
            let (linear, pairs, freedom) = self.snapshot.clone();
            self.linear = linear;
            self.pairs = pairs;
            self.freedom = freedom;
            self.stats.walk_rounds += 1;
            tracing::debug!(round = self.stats.walk_rounds, "walk restart");
            self.emit(Phase::Walk, on_progress);

            loop {
                if cancel.is_cancelled() {
                    return HashSet::new();
                }
                let eligible: Vec<usize> = (0..self.vars)
                    .filter(|&var| {
                        self.linear.row_for_var(var).is_none()
                            && (0..self.linear.rows()).any(|row| self.is_candidate(row, var))
                    })
                    .collect();
                if eligible.is_empty() {
                    break; // round stalled; restart with fresh randomness
                }
                let var = eligible[self.rng.pick(eligible.len())];
                let rows: Vec<usize> = (0..self.linear.rows())
                    .filter(|&row| self.is_candidate(row, var))
                    .collect();
                let row = rows[self.rng.pick(rows.len())];

                self.eliminate(row, var);
                self.stats.walk_steps += 1;
                self.report(Phase::Walk, on_progress);
                if let Some(found) = self.try_extract() {
                    return found;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bv(s: &str) -> BitVector {
        s.parse().unwrap()
    }

    fn quad(rows: &[&str]) -> QuadraticSystem {
        QuadraticSystem::parse_rows(rows).unwrap()
    }

    #[test]
    fn test_initial_counters_find_adjacent_solution() {
        // (x0+1)(x0+x1+1) = 0 with pivot 10: flipping x1 gives 01, valid
        // and distinct, discoverable before any elimination
        let system = quad(&["(10|1)(11|1) = 00|0"]);
        let pivot = bv("10");
        assert!(system.is_valid(&pivot));

        let mut solver = PivotSolver::new(&system, pivot.clone(), PivotConfig::default());
        let found = solver.solve(&CancelToken::new(), |_| {});
        assert!(found.contains(&bv("01")));
        for solution in &found {
            assert_ne!(solution, &pivot);
            assert!(system.is_valid(solution));
        }
        assert_eq!(solver.stats().eliminations, 0);
    }

    #[test]
    fn test_deterministic_elimination_reaches_distance_two() {
        // pivot 10; 00 and 01 are invalid, 11 is the only other solution,
        // reachable only after one elimination resolves x0
        let system = quad(&["(10|1)(11|1) = 00|0", "(10|1)(01|0) = 00|0"]);
        let pivot = bv("10");
        assert!(system.is_valid(&pivot));
        assert!(system.is_valid(&bv("11")));
        assert!(!system.is_valid(&bv("00")));
        assert!(!system.is_valid(&bv("01")));

        let mut solver = PivotSolver::new(&system, pivot.clone(), PivotConfig::default());
        let found = solver.solve(&CancelToken::new(), |_| {});
        assert_eq!(found.len(), 1);
        assert!(found.contains(&bv("11")));
        assert!(solver.stats().eliminations > 0);
    }

    #[test]
    fn test_unique_solution_walks_until_cancelled() {
        // rows kill 00, 01 and 11: the pivot is the only solution, so the
        // walk can never succeed; cancel through the progress callback
        let system = quad(&["(10|1)(11|1) = 00|0", "(01|0)(01|0) = 00|0"]);
        let pivot = bv("10");
        assert!(system.is_valid(&pivot));
        assert_eq!(system.count_solutions(), 1);

        let cancel = CancelToken::new();
        let cancel_from_callback = cancel.clone();
        let mut calls = 0u32;
        let mut solver = PivotSolver::new(
            &system,
            pivot,
            PivotConfig {
                seed: 1,
                progress_interval: 1,
            },
        );
        let found = solver.solve(&cancel, |progress| {
            if progress.phase == Phase::Walk {
                calls += 1;
                if calls > 16 {
                    cancel_from_callback.cancel();
                }
            }
        });
        assert!(found.is_empty());
        assert!(cancel.is_cancelled());
        assert!(solver.stats().walk_rounds > 0);
    }

    #[test]
    fn test_same_seed_same_path() {
        let system = quad(&["(10|1)(11|1) = 00|0", "(10|1)(01|0) = 00|0"]);
        let run = |seed: u64| {
            let mut solver = PivotSolver::new(
                &system,
                bv("10"),
                PivotConfig {
                    seed,
                    ..PivotConfig::default()
                },
            );
            let found = solver.solve(&CancelToken::new(), |_| {});
            (found, solver.stats().eliminations)
        };
        assert_eq!(run(7), run(7));
    }

    #[test]
    #[should_panic(expected = "pivot does not satisfy")]
    fn test_invalid_pivot_is_rejected() {
        let system = quad(&["(10|1)(11|1) = 00|0"]);
        PivotSolver::new(&system, bv("00"), PivotConfig::default());
    }
}
