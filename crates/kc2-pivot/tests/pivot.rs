//! End-to-end tests for the pivot solver.
//!
//! Every returned assignment must differ from the pivot and satisfy the
//! original systems; the walk must terminate through the cancellation
//! token and never on its own.

use kc2_core::{BitVector, CancelToken};
use kc2_pivot::{Phase, PivotConfig, PivotSolver};
use kc2_systems::{LinearSystem, QuadraticSystem};

fn bv(s: &str) -> BitVector {
    s.parse().unwrap()
}

/// xorshift-filled zero-product system that is valid on both `pivot` and
/// `other`: every left operand vanishes on both assignments, every right
/// operand vanishes on the pivot.
fn two_solution_system(
    cols: usize,
    rows: usize,
    pivot: &BitVector,
    other: &BitVector,
    mut state: u64,
) -> QuadraticSystem {
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };
    let mut lines = Vec::new();
    for _ in 0..rows {
        let mut left = BitVector::new(cols);
        let mut right = BitVector::new(cols);
        for col in 0..cols {
            if next() & 1 == 1 {
                left.set(col);
            }
            if next() & 1 == 1 {
                right.set(col);
            }
        }
        // force left to vanish on both assignments: if it differs between
        // them, cancel the difference against a column where they differ
        if left.dot(pivot) != left.dot(other) {
            let mut diff = pivot.clone();
            diff.xor(other);
            let col = diff.next_set_bit(0).expect("assignments differ");
            left.flip(col);
        }
        let left_const = left.dot(pivot);
        let right_const = right.dot(pivot);
        lines.push(format!(
            "({}|{})({}|{}) = {}|0",
            left,
            u8::from(left_const),
            right,
            u8::from(right_const),
            "0".repeat(cols),
        ));
    }
    let rows: Vec<&str> = lines.iter().map(String::as_str).collect();
    QuadraticSystem::parse_rows(&rows).unwrap()
}

/// Soundness across a batch of randomized systems: nothing returned is
/// ever the pivot or invalid, under a bounded search budget.
#[test]
fn test_solver_soundness_on_random_systems() {
    let pivot = bv("10110");
    let other = bv("01110");
    for seed in 1..=10u64 {
        let system = two_solution_system(5, 6, &pivot, &other, seed.wrapping_mul(0x2545f491));
        assert!(system.is_valid(&pivot));
        assert!(system.is_valid(&other));

        let cancel = CancelToken::new();
        let budget = cancel.clone();
        let mut walk_reports = 0u32;
        let mut solver = PivotSolver::new(
            &system,
            pivot.clone(),
            PivotConfig {
                seed,
                progress_interval: 1,
            },
        );
        let found = solver.solve(&cancel, |progress| {
            if progress.phase == Phase::Walk {
                walk_reports += 1;
                if walk_reports > 5_000 {
                    budget.cancel();
                }
            }
        });
        for solution in &found {
            assert_ne!(solution, &pivot, "seed {} returned the pivot", seed);
            assert!(
                system.is_valid(solution),
                "seed {} returned an invalid assignment",
                seed
            );
        }
    }
}

/// A known-bits system folds into the search: the solver finds the unique
/// second solution compatible with it.
#[test]
fn test_known_bits_constrain_solutions() {
    // pivot 10; without constraints 11 is the only other solution
    let system =
        QuadraticSystem::parse_rows(&["(10|1)(11|1) = 00|0", "(10|1)(01|0) = 00|0"]).unwrap();
    let known = LinearSystem::parse_rows(&["10|1"]).unwrap(); // x0 = 1

    let mut solver = PivotSolver::with_known_bits(
        &system,
        &known,
        bv("10"),
        PivotConfig::default(),
    );
    let found = solver.solve(&CancelToken::new(), |_| {});
    assert_eq!(found.len(), 1);
    assert!(found.contains(&bv("11")));
    for solution in &found {
        assert!(system.is_valid(solution));
        assert!(known.is_satisfied_by(solution));
    }
}

/// Known bits that exclude every alternate solution leave only the
/// cancellation exit.
#[test]
fn test_known_bits_can_rule_out_all_alternates() {
    let system =
        QuadraticSystem::parse_rows(&["(10|1)(11|1) = 00|0", "(10|1)(01|0) = 00|0"]).unwrap();
    let known = LinearSystem::parse_rows(&["11|1"]).unwrap(); // x0 ^ x1 = 1 kills 11

    let cancel = CancelToken::new();
    let budget = cancel.clone();
    let mut rounds = 0u32;
    let mut solver = PivotSolver::with_known_bits(
        &system,
        &known,
        bv("10"),
        PivotConfig {
            seed: 3,
            progress_interval: 1,
        },
    );
    let found = solver.solve(&cancel, |progress| {
        if progress.phase == Phase::Walk {
            rounds += 1;
            if rounds > 200 {
                budget.cancel();
            }
        }
    });
    assert!(found.is_empty());
    assert!(cancel.is_cancelled());
}

/// Cancelling before the search starts returns an empty set immediately.
#[test]
fn test_pre_cancelled_token() {
    let system =
        QuadraticSystem::parse_rows(&["(10|1)(11|1) = 00|0", "(10|1)(01|0) = 00|0"]).unwrap();
    let known = LinearSystem::parse_rows(&["11|1"]).unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();
    let mut solver =
        PivotSolver::with_known_bits(&system, &known, bv("10"), PivotConfig::default());
    let found = solver.solve(&cancel, |_| {});
    assert!(found.is_empty());
}
