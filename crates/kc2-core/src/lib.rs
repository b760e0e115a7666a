//! KC2 core - leaf types for the GF(2) algebra engine
//!
//! This crate carries the building blocks shared by the equation-system and
//! solver crates:
//!
//! - [`BitVector`]: fixed-length dense bit vector with word-parallel GF(2)
//!   operations and set-bit scans
//! - [`CombinationIterator`]: deterministic enumeration of all assignments
//!   over a (masked) set of variables
//! - [`CancelToken`]: cooperative cancellation for unbounded solver loops

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bitvec;
pub mod cancel;
pub mod combinations;

pub use bitvec::{BitVector, ParseBitVectorError};
pub use cancel::CancelToken;
pub use combinations::CombinationIterator;
