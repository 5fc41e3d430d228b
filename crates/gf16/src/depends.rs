//! Bit-dependency tables.
//!
//! Multiplication by a fixed `value` is linear over GF(2)^16, so every
//! output bit is the XOR of a subset of input bits. Row `b` of the table
//! is that subset for output bit `b`, as a 16-bit mask over input bits.
//!
//! Column `k` of the matrix is `value * x^k`: the row masks are built by
//! walking `value, value*x, value*x^2, ...` and recording which output bits
//! each power sets.

// SAFETY: Indices are bit positions extracted from 16-bit masks (< 16).
#![allow(clippy::indexing_slicing)]

use crate::tables::mul_x;

/// Output-bit dependency masks for one multiplier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DependencyTable {
  rows: [u16; 16],
}

impl DependencyTable {
  #[must_use]
  pub fn new(value: u16, poly: u32) -> Self {
    let mut rows = [0u16; 16];
    let mut column = u32::from(value);
    for k in 0..16 {
      let mut bits = column;
      while bits != 0 {
        let b = bits.trailing_zeros() as usize;
        rows[b] |= 1 << k;
        bits &= bits - 1;
      }
      column = mul_x(column, poly);
    }
    Self { rows }
  }

  /// Input-bit mask output bit `bit` depends on.
  #[inline(always)]
  #[must_use]
  pub fn row(&self, bit: usize) -> u16 {
    self.rows[bit]
  }

  #[inline]
  #[must_use]
  pub const fn rows(&self) -> &[u16; 16] {
    &self.rows
  }

  /// Number of XOR terms across all outputs.
  #[inline]
  #[must_use]
  pub fn weight(&self) -> u32 {
    self.rows.iter().map(|r| r.count_ones()).sum()
  }

  /// Apply the table to a single element.
  #[must_use]
  pub fn apply(&self, a: u16) -> u16 {
    let mut out = 0;
    for (b, row) in self.rows.iter().enumerate() {
      out |= (((row & a).count_ones() & 1) as u16) << b;
    }
    out
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::tables::{DEFAULT_POLYNOMIAL, multiply_bitwise};

  #[test]
  fn identity_is_diagonal() {
    let t = DependencyTable::new(1, DEFAULT_POLYNOMIAL);
    for b in 0..16 {
      assert_eq!(t.row(b), 1 << b);
    }
    assert_eq!(t.weight(), 16);
  }

  #[test]
  fn zero_has_no_dependencies() {
    let t = DependencyTable::new(0, DEFAULT_POLYNOMIAL);
    assert_eq!(t.rows(), &[0; 16]);
    assert_eq!(t.apply(0xFFFF), 0);
  }

  #[test]
  fn multiply_by_x_shifts_and_reduces() {
    let t = DependencyTable::new(2, DEFAULT_POLYNOMIAL);
    // Output bit 0 only receives the reduction of input bit 15.
    assert_eq!(t.row(0), 1 << 15);
    assert_eq!(t.row(2), 1 << 1);
    // 0x1100B has x^1, x^3, x^12 below the leading term.
    assert_eq!(t.row(1), (1 << 0) | (1 << 15));
    assert_eq!(t.row(3), (1 << 2) | (1 << 15));
    assert_eq!(t.row(12), (1 << 11) | (1 << 15));
  }

  #[test]
  fn apply_matches_bitwise_multiply() {
    for value in [2u16, 3, 0x1234, 0x8000, 0xFFFF, 0xBEEF] {
      let t = DependencyTable::new(value, DEFAULT_POLYNOMIAL);
      for a in [0u16, 1, 0x00FF, 0x8001, 0xA5A5, 0xFFFF] {
        assert_eq!(
          t.apply(a),
          multiply_bitwise(a, value, DEFAULT_POLYNOMIAL),
          "{a:#06x} * {value:#06x}"
        );
      }
    }
  }
}
