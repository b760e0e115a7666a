//! Dense GF(2) linear equation system.
//!
//! Row i states that the XOR of the variables selected by `equations[i]`
//! equals `results[i]`. The system is mutated in place by row operations
//! and consumed destructively by [`solve`](LinearSystem::solve), which
//! reorders and reduces rows into reduced row-echelon form.
//!
//! Alongside the rows, the system tracks which variable each row currently
//! *expresses* (its leading variable after reduction, or the variable an
//! elimination step isolated) and, inversely, which row expresses each
//! variable. The pivot solver drives elimination through
//! [`express_variable`](LinearSystem::express_variable) and relies on these
//! maps staying consistent.

use kc2_core::{BitVector, CombinationIterator};
use std::fmt;

/// Outcome of an interruptible elimination run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveOutcome {
    /// The system was reduced to reduced row-echelon form.
    Solved,
    /// A row degenerated to `0 = 1`; the system has no solution.
    Contradiction,
    /// The cancellation callback requested a stop; the system is left in a
    /// consistent intermediate state.
    Interrupted,
}

/// An ordered system of XOR equations over a fixed set of variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearSystem {
    cols: usize,
    equations: Vec<BitVector>,
    results: BitVector,
    /// Per row: the variable this row expresses, if any.
    row_var: Vec<Option<u32>>,
    /// Per variable: the row expressing it, if any.
    var_row: Vec<Option<u32>>,
}

impl LinearSystem {
    /// Creates an all-zero system of `rows` equations over `cols` variables.
    pub fn new(rows: usize, cols: usize) -> Self {
        LinearSystem {
            cols,
            equations: vec![BitVector::new(cols); rows],
            results: BitVector::new(rows),
            row_var: vec![None; rows],
            var_row: vec![None; cols],
        }
    }

    /// Builds a system from prepared rows.
    ///
    /// All equation vectors must share one length and `results` must have
    /// one bit per row.
    pub fn from_parts(equations: Vec<BitVector>, results: BitVector) -> Self {
        assert_eq!(
            equations.len(),
            results.len(),
            "result bits must match row count"
        );
        let cols = equations.first().map_or(0, BitVector::len);
        for eq in &equations {
            assert_eq!(eq.len(), cols, "all equation rows must share one width");
        }
        let rows = equations.len();
        LinearSystem {
            cols,
            equations,
            results,
            row_var: vec![None; rows],
            var_row: vec![None; cols],
        }
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.equations.len()
    }

    /// Number of variables (columns).
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// The coefficient vector of row `i`.
    pub fn equation(&self, i: usize) -> &BitVector {
        &self.equations[i]
    }

    /// The result bit of row `i`.
    pub fn result(&self, i: usize) -> bool {
        self.results.get(i)
    }

    /// The variable row `i` currently expresses, if any.
    pub fn expressed_var(&self, i: usize) -> Option<usize> {
        self.row_var[i].map(|v| v as usize)
    }

    /// The row currently expressing variable `v`, if any.
    pub fn row_for_var(&self, v: usize) -> Option<usize> {
        self.var_row[v].map(|r| r as usize)
    }

    /// Marks row `row` as expressing variable `var`.
    pub(crate) fn mark_expressed(&mut self, row: usize, var: usize) {
        self.row_var[row] = Some(var as u32);
        self.var_row[var] = Some(row as u32);
    }

    /// True if row `i` is the contradiction `0 = 1`.
    pub fn is_invalid(&self, i: usize) -> bool {
        self.equations[i].is_zero() && self.results.get(i)
    }

    /// True if no row is a contradiction.
    pub fn is_valid(&self) -> bool {
        (0..self.rows()).all(|i| !self.is_invalid(i))
    }

    /// Swaps rows `i` and `j`, keeping the row/variable maps consistent.
    pub fn exchange(&mut self, i: usize, j: usize) {
        if i == j {
            return;
        }
        self.equations.swap(i, j);
        self.results.swap_bits(i, j);
        self.row_var.swap(i, j);
        if let Some(v) = self.row_var[i] {
            self.var_row[v as usize] = Some(i as u32);
        }
        if let Some(v) = self.row_var[j] {
            self.var_row[v as usize] = Some(j as u32);
        }
    }

    /// Row i := row i XOR row j. The sole row-reduction primitive.
    pub fn xor_rows(&mut self, i: usize, j: usize) {
        assert_ne!(i, j, "cannot xor a row into itself");
        let (a, b) = if i < j {
            let (lo, hi) = self.equations.split_at_mut(j);
            (&mut lo[i], &hi[0])
        } else {
            let (lo, hi) = self.equations.split_at_mut(i);
            (&mut hi[0], &lo[j])
        };
        a.xor(b);
        let rj = self.results.get(j);
        self.results.xor_bit(i, rj);
    }

    /// Evaluates row `i` under a full assignment.
    pub fn evaluate_row(&self, i: usize, assignment: &BitVector) -> bool {
        self.equations[i].dot(assignment)
    }

    /// True if the assignment satisfies every row.
    pub fn is_satisfied_by(&self, assignment: &BitVector) -> bool {
        (0..self.rows()).all(|i| self.evaluate_row(i, assignment) == self.results.get(i))
    }

    /// Two-phase Gaussian elimination into reduced row-echelon form.
    ///
    /// Returns `false` the instant any row becomes the contradiction
    /// `0 = 1`; otherwise returns `true`, leaving free (non-pivot) columns
    /// unconstrained and the row/variable maps pointing at the leading
    /// variable of each pivot row.
    pub fn solve(&mut self) -> bool {
        self.solve_interruptible(|| false) == SolveOutcome::Solved
    }

    /// [`solve`](Self::solve) with a cooperative stop check.
    ///
    /// The callback is polled between whole column steps, so no row
    /// operation is ever partially applied. Progress is reported through
    /// `tracing` every 4096 columns.
    pub fn solve_interruptible<F: FnMut() -> bool>(&mut self, mut should_stop: F) -> SolveOutcome {
        let rows = self.rows();
        for i in 0..rows {
            if self.is_invalid(i) {
                return SolveOutcome::Contradiction;
            }
        }

        // forward pass: row echelon form
        let mut pivot = 0usize;
        for col in 0..self.cols {
            if pivot == rows {
                break;
            }
            if should_stop() {
                return SolveOutcome::Interrupted;
            }
            if col % 4096 == 0 && col > 0 {
                tracing::debug!(column = col, pivot_rows = pivot, "forward elimination");
            }
            let Some(found) = (pivot..rows).find(|&i| self.equations[i].get(col)) else {
                continue;
            };
            self.exchange(pivot, found);
            for below in pivot + 1..rows {
                if self.equations[below].get(col) {
                    self.xor_rows(below, pivot);
                    if self.is_invalid(below) {
                        return SolveOutcome::Contradiction;
                    }
                }
            }
            pivot += 1;
        }

        // backward pass: reduced row echelon form
        for row in (0..rows).rev() {
            if should_stop() {
                return SolveOutcome::Interrupted;
            }
            let Some(col) = self.equations[row].next_set_bit(0) else {
                continue;
            };
            for above in 0..row {
                if self.equations[above].get(col) {
                    self.xor_rows(above, row);
                    if self.is_invalid(above) {
                        return SolveOutcome::Contradiction;
                    }
                }
            }
        }

        self.rebuild_maps();
        SolveOutcome::Solved
    }

    fn rebuild_maps(&mut self) {
        for v in &mut self.var_row {
            *v = None;
        }
        for row in 0..self.rows() {
            match self.equations[row].next_set_bit(0) {
                Some(col) => {
                    self.row_var[row] = Some(col as u32);
                    self.var_row[col] = Some(row as u32);
                }
                None => self.row_var[row] = None,
            }
        }
    }

    /// Eliminates one variable everywhere by substituting a known value.
    ///
    /// Every row referencing `var` drops the coefficient and folds the
    /// constant into its result bit.
    pub fn substitute(&mut self, var: usize, value: bool) {
        for row in 0..self.rows() {
            if self.equations[row].get(var) {
                self.equations[row].clear(var);
                self.results.xor_bit(row, value);
            }
        }
        self.var_row[var] = None;
    }

    /// Propagates the resolved rows of another system into this one.
    ///
    /// For every row of `other` whose leading (lowest-index) variable passes
    /// the optional `mask`, that variable is replaced, in every row of
    /// `self` still referencing it, by the rest of the source row's linear
    /// expression.
    pub fn substitute_system(&mut self, other: &LinearSystem, mask: Option<&BitVector>) {
        assert_eq!(
            self.cols, other.cols,
            "systems must range over the same variables"
        );
        for src in 0..other.rows() {
            let Some(leading) = other.equations[src].next_set_bit(0) else {
                continue;
            };
            if mask.is_some_and(|m| !m.get(leading)) {
                continue;
            }
            for row in 0..self.rows() {
                if self.equations[row].get(leading) {
                    self.equations[row].xor(&other.equations[src]);
                    let r = other.results.get(src);
                    self.results.xor_bit(row, r);
                }
            }
            if src % 4096 == 0 && src > 0 {
                tracing::debug!(source_row = src, "substitution progress");
            }
        }
    }

    /// Makes `row` the unique row referencing `var`.
    ///
    /// XORs `row` into every other row containing `var`, invoking
    /// `on_changed` for each modified row index, then records `row` as
    /// expressing `var`. The previously expressed variable of `row`, if
    /// any, becomes unresolved.
    pub fn express_variable<F: FnMut(usize)>(&mut self, row: usize, var: usize, mut on_changed: F) {
        assert!(
            self.equations[row].get(var),
            "row {} does not reference variable {}",
            row,
            var
        );
        debug_assert!(self.var_row[var].is_none(), "variable already expressed");
        let src = self.equations[row].clone();
        let src_result = self.results.get(row);
        for other in 0..self.rows() {
            if other != row && self.equations[other].get(var) {
                self.equations[other].xor(&src);
                self.results.xor_bit(other, src_result);
                on_changed(other);
            }
        }
        if let Some(old) = self.row_var[row].take() {
            self.var_row[old as usize] = None;
        }
        self.mark_expressed(row, var);
    }

    /// Mask of variables not expressed by any row.
    pub fn free_mask(&self) -> BitVector {
        let mut mask = BitVector::new(self.cols);
        for (v, row) in self.var_row.iter().enumerate() {
            if row.is_none() {
                mask.set(v);
            }
        }
        mask
    }

    /// Lazily enumerates every assignment consistent with a reduced system.
    ///
    /// Iterates all `2^k` combinations of the `k` free variables in a
    /// fixed deterministic order and back-substitutes the pivot rows. The
    /// iterator is finite and restartable by calling `solutions()` again;
    /// with no free variables it yields exactly one assignment.
    pub fn solutions(&self) -> SolutionIter<'_> {
        SolutionIter {
            system: self,
            combinations: CombinationIterator::with_mask(self.free_mask()),
            done: false,
        }
    }
}

/// Iterator over the full assignments of a reduced [`LinearSystem`].
pub struct SolutionIter<'a> {
    system: &'a LinearSystem,
    combinations: CombinationIterator,
    done: bool,
}

impl Iterator for SolutionIter<'_> {
    type Item = BitVector;

    fn next(&mut self) -> Option<BitVector> {
        if self.done {
            return None;
        }
        let mut assignment = self.combinations.combination().clone();
        for row in 0..self.system.rows() {
            match self.system.row_var[row] {
                Some(var) => {
                    let value =
                        self.system.evaluate_row(row, &assignment) ^ self.system.results.get(row);
                    assignment.assign(var as usize, value);
                }
                None if !self.system.equations[row].is_zero() => {
                    tracing::warn!(row, "row has no leading variable; skipped in enumeration");
                }
                None => {}
            }
        }
        self.done = !self.combinations.advance();
        Some(assignment)
    }
}

impl fmt::Display for LinearSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..self.rows() {
            if row > 0 {
                writeln!(f)?;
            }
            write!(
                f,
                "{}|{}",
                self.equations[row],
                if self.results.get(row) { '1' } else { '0' }
            )?;
        }
        Ok(())
    }
}
