//! KC2 pivot solver - second-solution search for AND systems
//!
//! Given a quadratic (AND) system and one known-valid "pivot" assignment,
//! [`PivotSolver`] searches for a second, distinct valid assignment. The
//! system is normalized into zero-product rows, rotated around the pivot so
//! both operands of every row vanish on it, and bilinearized into an
//! augmented linear system. Elimination then runs deterministically first
//! and falls back to a seeded randomized walk, with two incremental
//! counters deciding after every step whether an alternate solution has
//! become derivable:
//!
//! - [`PairState`]: per row, whether both auxiliary variables are linearly
//!   forced to 1 (which would violate the zero-product constraint)
//! - [`FreedomCounter`]: per augmented column, how many rows rule out the
//!   single-flip candidate at that column
//!
//! The walk is unbounded; it stops only on success or through a
//! cooperative [`CancelToken`](kc2_core::CancelToken).

#![warn(clippy::all)]

mod freedom;
mod pairs;
mod rng;
pub mod solver;

pub use freedom::FreedomCounter;
pub use pairs::PairState;
pub use solver::{Phase, PivotConfig, PivotProgress, PivotSolver, PivotStats};
