//! GF(2^16) scalar arithmetic: polynomial handling, log/antilog tables, and
//! table-free reference routines.
//!
//! Elements are 16-bit polynomials over GF(2); multiplication is modulo a
//! primitive polynomial of degree 16. With `x` (the element `2`) generating
//! the multiplicative group, every non-zero element is `x^log(e)` and
//! `a * b = x^(log(a) + log(b))`.
//!
//! The antilog table is stored twice over so the sum of two logarithms
//! (at most `2 * 65534`) indexes it without a modular reduction.

// SAFETY: All array indexing in this module uses bounded indices:
// - `log` has 65536 entries and is indexed by `u16` values
// - `antilog` has 2 * 65535 entries and is indexed by sums of at most two logs
//   (each below 65535) or by `65535 - log`
#![allow(clippy::indexing_slicing)]

use std::sync::{Arc, OnceLock};

use crate::error::ConfigError;

/// Default primitive polynomial: x^16 + x^12 + x^3 + x + 1.
pub const DEFAULT_POLYNOMIAL: u32 = 0x1100B;

/// Number of field elements.
pub const FIELD_SIZE: usize = 1 << 16;

/// Order of the multiplicative group.
pub const GROUP_ORDER: usize = FIELD_SIZE - 1;

const TOP_BIT: u32 = 1 << 16;

/// Normalize a caller-supplied polynomial.
///
/// `0` selects [`DEFAULT_POLYNOMIAL`]; the leading `x^16` term is optional.
/// Anything wider than 17 bits is rejected. Primitivity is checked when
/// tables are built.
pub fn normalize_polynomial(poly: u32) -> Result<u32, ConfigError> {
  match poly {
    0 => Ok(DEFAULT_POLYNOMIAL),
    p if p >> 17 != 0 => Err(ConfigError::InvalidPolynomial(p)),
    p => Ok(p | TOP_BIT),
  }
}

/// Multiply `a` by `x` modulo `poly`.
#[inline(always)]
#[must_use]
pub(crate) const fn mul_x(a: u32, poly: u32) -> u32 {
  let shifted = a << 1;
  if shifted & TOP_BIT != 0 { shifted ^ poly } else { shifted }
}

// ─────────────────────────────────────────────────────────────────────────────
// Log / antilog tables
// ─────────────────────────────────────────────────────────────────────────────

/// Logarithm and antilogarithm tables for one primitive polynomial.
pub struct LogTables {
  poly: u32,
  log: Box<[u16]>,
  antilog: Box<[u16]>,
}

impl core::fmt::Debug for LogTables {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("LogTables")
      .field("poly", &format_args!("{:#07x}", self.poly))
      .finish_non_exhaustive()
  }
}

impl LogTables {
  /// Build tables for a normalized polynomial, or `None` if `x` does not
  /// generate all 65535 non-zero elements.
  fn build(poly: u32) -> Option<Self> {
    let mut log = vec![0u16; FIELD_SIZE].into_boxed_slice();
    let mut antilog = vec![0u16; 2 * GROUP_ORDER].into_boxed_slice();

    let mut e: u32 = 1;
    for i in 0..GROUP_ORDER {
      if i != 0 && e <= 1 {
        // Returned to 1 early (order too small) or collapsed to 0 (x is not a unit).
        return None;
      }
      log[e as usize] = i as u16;
      antilog[i] = e as u16;
      antilog[i + GROUP_ORDER] = e as u16;
      e = mul_x(e, poly);
    }

    (e == 1).then_some(Self { poly, log, antilog })
  }

  /// Tables for the default polynomial, built once per process.
  pub fn shared_default() -> Arc<Self> {
    static DEFAULT: OnceLock<Arc<LogTables>> = OnceLock::new();
    Arc::clone(DEFAULT.get_or_init(|| match Self::build(DEFAULT_POLYNOMIAL) {
      Some(tables) => Arc::new(tables),
      None => unreachable!("default polynomial {DEFAULT_POLYNOMIAL:#07x} is primitive"),
    }))
  }

  /// Tables for a caller-supplied polynomial (`0` = default).
  ///
  /// The default polynomial shares the process-wide tables; any other
  /// polynomial gets tables owned by the returned `Arc`.
  pub fn for_polynomial(poly: u32) -> Result<Arc<Self>, ConfigError> {
    let poly = normalize_polynomial(poly)?;
    if poly == DEFAULT_POLYNOMIAL {
      return Ok(Self::shared_default());
    }
    Self::build(poly)
      .map(Arc::new)
      .ok_or(ConfigError::InvalidPolynomial(poly))
  }

  /// The normalized polynomial, including the `x^16` term.
  #[inline]
  #[must_use]
  pub fn polynomial(&self) -> u32 {
    self.poly
  }

  /// Discrete logarithm of a non-zero element.
  #[inline(always)]
  #[must_use]
  pub fn log(&self, a: u16) -> u16 {
    debug_assert!(a != 0, "log(0) is undefined");
    self.log[usize::from(a)]
  }

  /// `x^i`, for any `i < 2 * 65535`.
  #[inline(always)]
  #[must_use]
  pub fn antilog(&self, i: usize) -> u16 {
    self.antilog[i]
  }

  #[inline(always)]
  #[must_use]
  pub fn multiply(&self, a: u16, b: u16) -> u16 {
    if a == 0 || b == 0 {
      return 0;
    }
    self.antilog[usize::from(self.log[usize::from(a)]) + usize::from(self.log[usize::from(b)])]
  }

  /// Multiply `a` by a value whose logarithm is already known.
  #[inline(always)]
  #[must_use]
  pub(crate) fn multiply_by_log(&self, a: u16, log_b: usize) -> u16 {
    if a == 0 {
      return 0;
    }
    self.antilog[usize::from(self.log[usize::from(a)]) + log_b]
  }

  /// # Panics
  ///
  /// Panics if `b == 0`.
  #[inline]
  #[must_use]
  pub fn divide(&self, a: u16, b: u16) -> u16 {
    assert!(b != 0, "division by zero in GF(2^16)");
    if a == 0 {
      return 0;
    }
    self.antilog[usize::from(self.log[usize::from(a)]) + GROUP_ORDER - usize::from(self.log[usize::from(b)])]
  }

  /// # Panics
  ///
  /// Panics if `a == 0`.
  #[inline]
  #[must_use]
  pub fn inverse(&self, a: u16) -> u16 {
    assert!(a != 0, "zero has no multiplicative inverse in GF(2^16)");
    self.antilog[GROUP_ORDER - usize::from(self.log[usize::from(a)])]
  }
}

// ─────────────────────────────────────────────────────────────────────────────
// Table-free routines
// ─────────────────────────────────────────────────────────────────────────────

/// Shift-and-reduce multiplication. Slow; used as the reference oracle.
#[must_use]
pub fn multiply_bitwise(a: u16, b: u16, poly: u32) -> u16 {
  let mut acc = 0u32;
  let mut a = u32::from(a);
  let mut b = b;
  while b != 0 {
    if b & 1 != 0 {
      acc ^= a;
    }
    b >>= 1;
    a = mul_x(a, poly);
  }
  acc as u16
}

#[inline]
const fn degree(p: u32) -> u32 {
  31 - p.leading_zeros()
}

/// Polynomial long division over GF(2): returns `(quotient, remainder)`.
fn poly_divmod(mut n: u32, d: u32) -> (u32, u32) {
  let dd = degree(d);
  let mut q = 0;
  while n != 0 && degree(n) >= dd {
    let shift = degree(n) - dd;
    q |= 1 << shift;
    n ^= d << shift;
  }
  (q, n)
}

/// Carry-less product of two polynomials whose degrees sum below 32.
fn clmul(a: u32, b: u32) -> u32 {
  let mut r = 0;
  let mut b = b;
  let mut shift = 0;
  while b != 0 {
    if b & 1 != 0 {
      r ^= a << shift;
    }
    b >>= 1;
    shift += 1;
  }
  r
}

/// Multiplicative inverse by the extended Euclidean algorithm over GF(2)[x].
///
/// Independent of the log tables.
///
/// # Panics
///
/// Panics if `a == 0`.
#[must_use]
pub fn inverse_euclid(a: u16, poly: u32) -> u16 {
  assert!(a != 0, "zero has no multiplicative inverse in GF(2^16)");
  let (mut r0, mut r1) = (poly, u32::from(a));
  let (mut s0, mut s1) = (0u32, 1u32);
  // Remainders strictly drop in degree; an irreducible modulus ends at 1.
  while r1 > 1 {
    let (q, r) = poly_divmod(r0, r1);
    (r0, r1) = (r1, r);
    (s0, s1) = (s1, s0 ^ clmul(q, s1));
  }
  debug_assert_eq!(r1, 1, "modulus {poly:#07x} shares a factor with {a:#06x}");
  s1 as u16
}
