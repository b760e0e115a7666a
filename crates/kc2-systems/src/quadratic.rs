//! Quadratic (AND-gate) equation system.
//!
//! Row i states that
//! `(left·x ⊕ left_const) AND (right·x ⊕ right_const) == (out·x ⊕ out_const)`
//! over GF(2). The three linear forms of a row share the system's column
//! count; the three per-row constant bits are stored column-wise as one
//! result vector per form.
//!
//! The system is progressively shrunk by substitution, turned into an
//! augmented linear system plus a smaller quadratic residual by the
//! bilinearization transform, and finally used as the ground-truth oracle
//! for candidate assignments.

use crate::linear::LinearSystem;
use kc2_core::{BitVector, CombinationIterator};
use std::fmt;

/// One AND constraint: `(left ⊕ lc) · (right ⊕ rc) = out ⊕ oc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuadRow {
    /// Linear form of the left operand.
    pub left: BitVector,
    /// Linear form of the right operand.
    pub right: BitVector,
    /// Linear form of the result side.
    pub out: BitVector,
}

/// Which linear forms a system-level substitution applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubstituteTargets {
    /// Substitute into left operand forms.
    pub left: bool,
    /// Substitute into right operand forms.
    pub right: bool,
    /// Substitute into result forms.
    pub out: bool,
}

impl Default for SubstituteTargets {
    fn default() -> Self {
        SubstituteTargets {
            left: true,
            right: true,
            out: true,
        }
    }
}

/// Result of [`QuadraticSystem::linearize`]: the augmented linear system
/// over original + auxiliary variables and the residual quadratic system.
#[derive(Debug, Clone)]
pub struct Linearized {
    /// Two rows per original AND constraint, each expressing one fresh
    /// auxiliary variable.
    pub linear: LinearSystem,
    /// The residual constraints `ℓ · r = out ⊕ oc` over the widened
    /// variable set.
    pub residual: QuadraticSystem,
}

/// An ordered system of AND constraints over a fixed set of variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuadraticSystem {
    cols: usize,
    rows: Vec<QuadRow>,
    left_consts: BitVector,
    right_consts: BitVector,
    out_consts: BitVector,
}

impl QuadraticSystem {
    /// Creates an all-zero system of `rows` constraints over `cols`
    /// variables.
    pub fn new(rows: usize, cols: usize) -> Self {
        QuadraticSystem {
            cols,
            rows: vec![
                QuadRow {
                    left: BitVector::new(cols),
                    right: BitVector::new(cols),
                    out: BitVector::new(cols),
                };
                rows
            ],
            left_consts: BitVector::new(rows),
            right_consts: BitVector::new(rows),
            out_consts: BitVector::new(rows),
        }
    }

    /// Number of constraints.
    pub fn rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of variables (columns).
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// The three linear forms of row `i`.
    pub fn row(&self, i: usize) -> &QuadRow {
        &self.rows[i]
    }

    /// Constant bit of row `i`'s left operand.
    pub fn left_const(&self, i: usize) -> bool {
        self.left_consts.get(i)
    }

    /// Constant bit of row `i`'s right operand.
    pub fn right_const(&self, i: usize) -> bool {
        self.right_consts.get(i)
    }

    /// Constant bit of row `i`'s result side.
    pub fn out_const(&self, i: usize) -> bool {
        self.out_consts.get(i)
    }

    pub(crate) fn set_row(
        &mut self,
        i: usize,
        row: QuadRow,
        left_const: bool,
        right_const: bool,
        out_const: bool,
    ) {
        assert_eq!(row.left.len(), self.cols, "left form width mismatch");
        assert_eq!(row.right.len(), self.cols, "right form width mismatch");
        assert_eq!(row.out.len(), self.cols, "result form width mismatch");
        self.rows[i] = row;
        self.left_consts.assign(i, left_const);
        self.right_consts.assign(i, right_const);
        self.out_consts.assign(i, out_const);
    }

    /// True if the assignment satisfies the AND identity of every row.
    pub fn is_valid(&self, assignment: &BitVector) -> bool {
        assert_eq!(assignment.len(), self.cols, "assignment width mismatch");
        (0..self.rows()).all(|i| {
            let l = self.rows[i].left.dot(assignment) ^ self.left_consts.get(i);
            let r = self.rows[i].right.dot(assignment) ^ self.right_consts.get(i);
            let o = self.rows[i].out.dot(assignment) ^ self.out_consts.get(i);
            (l && r) == o
        })
    }

    /// Eliminates one variable everywhere by substituting a known value.
    pub fn substitute(&mut self, var: usize, value: bool) {
        for i in 0..self.rows.len() {
            if self.rows[i].left.get(var) {
                self.rows[i].left.clear(var);
                self.left_consts.xor_bit(i, value);
            }
            if self.rows[i].right.get(var) {
                self.rows[i].right.clear(var);
                self.right_consts.xor_bit(i, value);
            }
            if self.rows[i].out.get(var) {
                self.rows[i].out.clear(var);
                self.out_consts.xor_bit(i, value);
            }
        }
    }

    /// Substitutes a list of known variable values.
    pub fn substitute_all<I: IntoIterator<Item = (usize, bool)>>(&mut self, values: I) {
        for (var, value) in values {
            self.substitute(var, value);
        }
    }

    /// Propagates resolved linear rows into the selected forms.
    ///
    /// For each row of `linear` whose leading variable passes the optional
    /// `mask`, the corresponding relation is XORed into every selected form
    /// that references that variable.
    pub fn substitute_system(
        &mut self,
        linear: &LinearSystem,
        mask: Option<&BitVector>,
        targets: SubstituteTargets,
    ) {
        assert_eq!(
            self.cols,
            linear.cols(),
            "systems must range over the same variables"
        );
        for src in 0..linear.rows() {
            let eq = linear.equation(src);
            let Some(leading) = eq.next_set_bit(0) else {
                continue;
            };
            if mask.is_some_and(|m| !m.get(leading)) {
                continue;
            }
            let result = linear.result(src);
            for i in 0..self.rows.len() {
                if targets.left && self.rows[i].left.get(leading) {
                    self.rows[i].left.xor(eq);
                    self.left_consts.xor_bit(i, result);
                }
                if targets.right && self.rows[i].right.get(leading) {
                    self.rows[i].right.xor(eq);
                    self.right_consts.xor_bit(i, result);
                }
                if targets.out && self.rows[i].out.get(leading) {
                    self.rows[i].out.xor(eq);
                    self.out_consts.xor_bit(i, result);
                }
            }
            if src % 4096 == 0 && src > 0 {
                tracing::debug!(source_row = src, "substitution progress");
            }
        }
    }

    /// Rewrites rows so both operand forms evaluate to zero on `pivot`.
    ///
    /// When exactly one operand is nonzero on the pivot, the vanishing side
    /// is XORed into it (with the matching constant adjustment), which
    /// preserves the solution set of a zero-product row. Rows where both
    /// operands are nonzero on the pivot are left untouched.
    pub fn rotate_around(&mut self, pivot: &BitVector) {
        assert_eq!(pivot.len(), self.cols, "pivot width mismatch");
        for i in 0..self.rows.len() {
            let lc = self.left_consts.get(i);
            let rc = self.right_consts.get(i);
            let left_value = self.rows[i].left.dot(pivot) ^ lc;
            let right_value = self.rows[i].right.dot(pivot) ^ rc;

            if !left_value && right_value {
                let left = self.rows[i].left.clone();
                self.rows[i].right.xor(&left);
                self.right_consts.assign(i, !rc ^ lc);
            } else if left_value && !right_value {
                let right = self.rows[i].right.clone();
                self.rows[i].left.xor(&right);
                self.left_consts.assign(i, !lc ^ rc);
            }
        }
    }

    /// The linear half of the bilinearization transform.
    ///
    /// Allocates two fresh variables ℓ, r per row (columns `cols + 2i` and
    /// `cols + 2i + 1`) and emits the rows `left·x ⊕ ℓ = left_const` and
    /// `right·x ⊕ r = right_const`, each marked as expressing its fresh
    /// variable.
    pub fn invert_to_linear(&self) -> LinearSystem {
        let new_rows = self.rows.len() * 2;
        let new_cols = self.cols + new_rows;
        let mut equations = Vec::with_capacity(new_rows);
        let mut results = BitVector::new(new_rows);
        for (i, row) in self.rows.iter().enumerate() {
            let mut left = row.left.resized(new_cols);
            left.set(self.cols + 2 * i);
            equations.push(left);
            results.assign(2 * i, self.left_consts.get(i));

            let mut right = row.right.resized(new_cols);
            right.set(self.cols + 2 * i + 1);
            equations.push(right);
            results.assign(2 * i + 1, self.right_consts.get(i));
        }
        let mut system = LinearSystem::from_parts(equations, results);
        for i in 0..self.rows.len() {
            system.mark_expressed(2 * i, self.cols + 2 * i);
            system.mark_expressed(2 * i + 1, self.cols + 2 * i + 1);
        }
        system
    }

    /// The quadratic half of the bilinearization transform: the residual
    /// constraints `ℓ · r = out·x ⊕ out_const` over the widened columns.
    pub fn invert_to_quadratic(&self) -> QuadraticSystem {
        let new_cols = self.cols + self.rows.len() * 2;
        let mut system = QuadraticSystem::new(self.rows.len(), new_cols);
        for (i, row) in self.rows.iter().enumerate() {
            let mut left = BitVector::new(new_cols);
            left.set(self.cols + 2 * i);
            let mut right = BitVector::new(new_cols);
            right.set(self.cols + 2 * i + 1);
            system.set_row(
                i,
                QuadRow {
                    left,
                    right,
                    out: row.out.resized(new_cols),
                },
                false,
                false,
                self.out_consts.get(i),
            );
        }
        system
    }

    /// Full bilinearization: augmented linear system plus residual.
    pub fn linearize(&self) -> Linearized {
        Linearized {
            linear: self.invert_to_linear(),
            residual: self.invert_to_quadratic(),
        }
    }

    /// Case-split relaxation of every row `a·b = c` into the two
    /// zero-product rows `a · (b ⊕ c) = 0` and `c · (a ⊕ 1) = 0`,
    /// doubling the row count.
    ///
    /// Both consequences hold identically: if `c` is true then `a` must be,
    /// so `c·(a⊕1)` vanishes, and `a·(b⊕c) = c·(a⊕1)` by expansion. The
    /// conjunction of the two output rows is equivalent to the input row,
    /// so the solution set is preserved exactly.
    pub fn simplify(&self) -> QuadraticSystem {
        let mut system = QuadraticSystem::new(self.rows.len() * 2, self.cols);
        for (i, row) in self.rows.iter().enumerate() {
            let mut folded = row.right.clone();
            folded.xor(&row.out);
            system.set_row(
                2 * i,
                QuadRow {
                    left: row.left.clone(),
                    right: folded,
                    out: BitVector::new(self.cols),
                },
                self.left_consts.get(i),
                self.right_consts.get(i) ^ self.out_consts.get(i),
                false,
            );
            system.set_row(
                2 * i + 1,
                QuadRow {
                    left: row.out.clone(),
                    right: row.left.clone(),
                    out: BitVector::new(self.cols),
                },
                self.out_consts.get(i),
                !self.left_consts.get(i),
                false,
            );
        }
        system
    }

    /// Returns a copy extended with one zero-product row per row of a
    /// linear system: `r·x = b` becomes `(r ⊕ b)(r ⊕ b) = 0`, which holds
    /// exactly when the linear row does.
    ///
    /// This folds a parallel system of known bits into the quadratic
    /// system so a single oracle covers both.
    pub fn augmented_with_linear(&self, linear: &LinearSystem) -> QuadraticSystem {
        assert_eq!(
            self.cols,
            linear.cols(),
            "systems must range over the same variables"
        );
        let mut system = QuadraticSystem::new(self.rows.len() + linear.rows(), self.cols);
        for (i, row) in self.rows.iter().enumerate() {
            system.set_row(
                i,
                row.clone(),
                self.left_consts.get(i),
                self.right_consts.get(i),
                self.out_consts.get(i),
            );
        }
        for src in 0..linear.rows() {
            let eq = linear.equation(src).clone();
            let result = linear.result(src);
            system.set_row(
                self.rows.len() + src,
                QuadRow {
                    left: eq.clone(),
                    right: eq,
                    out: BitVector::new(self.cols),
                },
                result,
                result,
                false,
            );
        }
        system
    }

    /// True if every result form is empty with a zero constant, i.e. all
    /// rows are zero-products.
    pub fn is_zero_product(&self) -> bool {
        self.rows.iter().all(|r| r.out.is_zero()) && self.out_consts.is_zero()
    }

    /// Counts satisfying assignments by brute force over all `2^cols`
    /// combinations. Correctness oracle for small instances only.
    pub fn count_solutions(&self) -> u64 {
        let mut iterator = CombinationIterator::new(self.cols);
        let mut count = 0;
        loop {
            if self.is_valid(iterator.combination()) {
                count += 1;
            }
            if !iterator.advance() {
                return count;
            }
        }
    }
}

impl fmt::Display for QuadraticSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.rows.len() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(
                f,
                "({}|{})({}|{}) = {}|{}",
                self.rows[i].left,
                u8::from(self.left_consts.get(i)),
                self.rows[i].right,
                u8::from(self.right_consts.get(i)),
                self.rows[i].out,
                u8::from(self.out_consts.get(i)),
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(rows: &[&str]) -> QuadraticSystem {
        QuadraticSystem::parse_rows(rows).unwrap()
    }

    fn bv(s: &str) -> BitVector {
        s.parse().unwrap()
    }

    #[test]
    fn test_is_valid() {
        // (x0)(x1) = x2
        let q = quad(&["(100|0)(010|0) = 001|0"]);
        assert!(q.is_valid(&bv("111")));
        assert!(q.is_valid(&bv("000")));
        assert!(q.is_valid(&bv("010")));
        assert!(!q.is_valid(&bv("110")));
        assert!(!q.is_valid(&bv("001")));
    }

    #[test]
    fn test_substitute_value_folds_constants() {
        let mut q = quad(&["(110|0)(011|1) = 001|0"]);
        q.substitute(1, true);
        assert_eq!(q.to_string(), "(100|1)(001|0) = 001|0");
    }

    #[test]
    fn test_substitute_system_targets() {
        // resolved relation: x0 = x2 (leading variable x0)
        let mut linear = LinearSystem::parse_rows(&["101|0"]).unwrap();
        linear.solve();
        let mut q = quad(&["(100|0)(100|0) = 100|0"]);
        q.substitute_system(
            &linear,
            None,
            SubstituteTargets {
                left: true,
                right: false,
                out: true,
            },
        );
        assert_eq!(q.to_string(), "(001|0)(100|0) = 001|0");
    }

    #[test]
    fn test_count_solutions_brute_force() {
        // (x0)(x1) = x2: every (a, b, ab) combination
        let q = quad(&["(100|0)(010|0) = 001|0"]);
        assert_eq!(q.count_solutions(), 4);
    }

    #[test]
    fn test_simplify_preserves_solutions() {
        let q = quad(&["(110|1)(011|0) = 101|1", "(010|0)(111|1) = 100|0"]);
        let relaxed = q.simplify();
        assert_eq!(relaxed.rows(), 4);
        assert!(relaxed.is_zero_product());
        let mut iterator = CombinationIterator::new(q.cols());
        loop {
            let x = iterator.combination();
            assert_eq!(q.is_valid(x), relaxed.is_valid(x), "diverged at {}", x);
            if !iterator.advance() {
                break;
            }
        }
    }

    #[test]
    fn test_rotate_around_makes_operands_vanish() {
        let q = quad(&["(100|1)(010|0) = 001|0", "(011|1)(100|0) = 000|0"]);
        let relaxed = q.simplify();
        // 110 satisfies q: pick it as the pivot
        assert!(q.is_valid(&bv("110")));
        let mut rotated = relaxed.clone();
        rotated.rotate_around(&bv("110"));
        for i in 0..rotated.rows() {
            let l = rotated.row(i).left.dot(&bv("110")) ^ rotated.left_const(i);
            let r = rotated.row(i).right.dot(&bv("110")) ^ rotated.right_const(i);
            assert!(!l && !r, "row {} operand does not vanish on the pivot", i);
        }
        // rotation preserves the solution set
        let mut iterator = CombinationIterator::new(q.cols());
        loop {
            let x = iterator.combination();
            assert_eq!(relaxed.is_valid(x), rotated.is_valid(x));
            if !iterator.advance() {
                break;
            }
        }
    }

    #[test]
    fn test_invert_to_linear_layout() {
        let q = quad(&["(1010|0)(0011|0) = 1000|0", "(0110|1)(1001|0) = 0100|1"]);
        let linear = q.invert_to_linear();
        assert_eq!(linear.rows(), 4);
        assert_eq!(linear.cols(), 8);
        assert_eq!(linear.equation(0), &bv("10101000"));
        assert!(!linear.result(0));
        assert_eq!(linear.equation(1), &bv("00110100"));
        assert!(!linear.result(1));
        assert_eq!(linear.equation(2), &bv("01100010"));
        assert!(linear.result(2));
        assert_eq!(linear.equation(3), &bv("10010001"));
        assert!(!linear.result(3));
        // each row expresses its fresh variable
        assert_eq!(linear.expressed_var(0), Some(4));
        assert_eq!(linear.expressed_var(1), Some(5));
        assert_eq!(linear.expressed_var(2), Some(6));
        assert_eq!(linear.expressed_var(3), Some(7));
    }

    #[test]
    fn test_invert_to_quadratic_residual() {
        let q = quad(&["(1010|0)(0011|0) = 1000|1"]);
        let residual = q.invert_to_quadratic();
        assert_eq!(residual.rows(), 1);
        assert_eq!(residual.cols(), 6);
        assert_eq!(residual.to_string(), "(000010|0)(000001|0) = 100000|1");
    }

    #[test]
    fn test_augmented_with_linear_enforces_known_bits() {
        let q = quad(&["(100|0)(010|0) = 001|0"]);
        let known = LinearSystem::parse_rows(&["110|1"]).unwrap();
        let merged = q.augmented_with_linear(&known);
        assert_eq!(merged.rows(), 2);
        let mut iterator = CombinationIterator::new(3);
        loop {
            let x = iterator.combination();
            let expected = q.is_valid(x) && known.is_satisfied_by(x);
            assert_eq!(merged.is_valid(x), expected, "diverged at {}", x);
            if !iterator.advance() {
                break;
            }
        }
    }

    #[test]
    fn test_linearization_agrees_with_direct_evaluation() {
        let q = quad(&["(110|1)(011|0) = 101|1", "(010|0)(111|1) = 100|0"]);
        let Linearized { linear, residual } = q.linearize();
        let mut iterator = CombinationIterator::new(q.cols());
        loop {
            let x = iterator.combination();
            // extend the assignment with the directly computed operand values
            let mut extended = x.resized(q.cols() + 2 * q.rows());
            for i in 0..q.rows() {
                let l = q.row(i).left.dot(x) ^ q.left_const(i);
                let r = q.row(i).right.dot(x) ^ q.right_const(i);
                extended.assign(q.cols() + 2 * i, l);
                extended.assign(q.cols() + 2 * i + 1, r);
            }
            assert!(linear.is_satisfied_by(&extended));
            assert_eq!(q.is_valid(x), residual.is_valid(&extended));
            if !iterator.advance() {
                break;
            }
        }
    }
}
