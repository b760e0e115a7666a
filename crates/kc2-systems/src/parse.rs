//! Line-oriented text format for equation systems.
//!
//! Each linear row is `cols` characters of `'0'`/`'1'` followed by `'|'`
//! and the result bit, e.g. `1010|1`. Each quadratic row is
//! `(leftBits|leftBit)(rightBits|rightBit) = outBits|outBit`, e.g.
//! `(1010|0)(0011|0) = 1000|0`. Files are one row per line, ASCII; reading
//! and writing files is left to callers — this module only converts rows.

use crate::linear::LinearSystem;
use crate::quadratic::{QuadRow, QuadraticSystem};
use kc2_core::BitVector;

/// Error produced when a text row does not match the format.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The row does not have the expected overall shape.
    #[error("malformed row at line {line}: {text:?}")]
    MalformedRow {
        /// 0-based line index.
        line: usize,
        /// The offending text.
        text: String,
    },
    /// A bit field contained a character other than `'0'` or `'1'`.
    #[error("invalid bit character at line {line}: {text:?}")]
    InvalidBit {
        /// 0-based line index.
        line: usize,
        /// The offending text.
        text: String,
    },
    /// A row's width disagrees with the first row of the system.
    #[error("row at line {line} has width {found}, expected {expected}")]
    WidthMismatch {
        /// 0-based line index.
        line: usize,
        /// Width found on this line.
        found: usize,
        /// Width established by the first line.
        expected: usize,
    },
}

/// Splits `bits|b` into its field and result bit.
fn split_bits(text: &str, line: usize) -> Result<(BitVector, bool), ParseError> {
    let malformed = || ParseError::MalformedRow {
        line,
        text: text.to_string(),
    };
    let (bits, result) = text.split_once('|').ok_or_else(malformed)?;
    let result = match result {
        "0" => false,
        "1" => true,
        _ => return Err(malformed()),
    };
    let bits = bits.parse().map_err(|_| ParseError::InvalidBit {
        line,
        text: text.to_string(),
    })?;
    Ok((bits, result))
}

impl LinearSystem {
    /// Parses a system from one text row per entry.
    pub fn parse_rows(lines: &[&str]) -> Result<LinearSystem, ParseError> {
        let mut equations = Vec::with_capacity(lines.len());
        let mut results = BitVector::new(lines.len());
        let mut cols = None;
        for (line, text) in lines.iter().enumerate() {
            let (bits, result) = split_bits(text.trim(), line)?;
            let expected = *cols.get_or_insert(bits.len());
            if bits.len() != expected {
                return Err(ParseError::WidthMismatch {
                    line,
                    found: bits.len(),
                    expected,
                });
            }
            equations.push(bits);
            results.assign(line, result);
        }
        Ok(LinearSystem::from_parts(equations, results))
    }
}

impl QuadraticSystem {
    /// Parses a system from one text row per entry.
    pub fn parse_rows(lines: &[&str]) -> Result<QuadraticSystem, ParseError> {
        let mut parsed = Vec::with_capacity(lines.len());
        let mut cols = None;
        for (line, text) in lines.iter().enumerate() {
            let text = text.trim();
            let malformed = || ParseError::MalformedRow {
                line,
                text: text.to_string(),
            };

            let rest = text.strip_prefix('(').ok_or_else(malformed)?;
            let (left_text, rest) = rest.split_once(')').ok_or_else(malformed)?;
            let rest = rest.strip_prefix('(').ok_or_else(malformed)?;
            let (right_text, rest) = rest.split_once(')').ok_or_else(malformed)?;
            let out_text = rest.strip_prefix(" = ").ok_or_else(malformed)?;

            let (left, left_const) = split_bits(left_text, line)?;
            let (right, right_const) = split_bits(right_text, line)?;
            let (out, out_const) = split_bits(out_text, line)?;

            let expected = *cols.get_or_insert(left.len());
            for width in [left.len(), right.len(), out.len()] {
                if width != expected {
                    return Err(ParseError::WidthMismatch {
                        line,
                        found: width,
                        expected,
                    });
                }
            }
            parsed.push((left, left_const, right, right_const, out, out_const));
        }

        let mut system = QuadraticSystem::new(parsed.len(), cols.unwrap_or(0));
        for (i, (left, lc, right, rc, out, oc)) in parsed.into_iter().enumerate() {
            system.set_row(i, QuadRow { left, right, out }, lc, rc, oc);
        }
        Ok(system)
    }
}
