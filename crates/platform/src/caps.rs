//! CPU capability representation.
//!
//! This module answers the question: "What instructions can I legally run on
//! this machine?"
//!
//! # Design
//!
//! [`Caps`] is a 256-bit bitset representing available CPU features. Each bit
//! corresponds to a specific ISA extension. The bits are architecture-specific
//! but the API is uniform across all targets.
//!
//! # Bit Layout
//!
//! - Bits 0-63: x86/x86_64 features
//! - Bits 64-127: aarch64 features
//! - Bits 128-255: reserved
//!
//! # Usage
//!
//! ```
//! use platform::caps::x86;
//!
//! let c = platform::caps();
//! if c.has(x86::AVX2) {
//!   // 32-byte lanes
//! } else if c.has(x86::SSE2) {
//!   // 16-byte lanes
//! }
//! ```

// ─────────────────────────────────────────────────────────────────────────────
// Core Capability Type
// ─────────────────────────────────────────────────────────────────────────────

/// CPU capabilities: a 256-bit feature bitset.
///
/// `Caps` is `Copy`, `Send`, and `Sync`. It can be freely shared across threads.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Caps(pub(crate) [u64; 4]);

impl Caps {
  /// Empty capability set (no features).
  pub const NONE: Self = Self([0; 4]);

  /// Create a capability set from raw words.
  ///
  /// Primarily useful for tests and fuzzing.
  #[inline]
  #[must_use]
  pub const fn from_raw(words: [u64; 4]) -> Self {
    Self(words)
  }

  /// Raw words backing this set.
  #[inline]
  #[must_use]
  pub const fn as_raw(&self) -> &[u64; 4] {
    &self.0
  }

  /// Check if all features in `required` are present.
  #[inline(always)]
  #[must_use]
  pub const fn has(self, required: Self) -> bool {
    (self.0[0] & required.0[0]) == required.0[0]
      && (self.0[1] & required.0[1]) == required.0[1]
      && (self.0[2] & required.0[2]) == required.0[2]
      && (self.0[3] & required.0[3]) == required.0[3]
  }

  /// Union of two capability sets.
  #[inline]
  #[must_use]
  pub const fn union(self, other: Self) -> Self {
    Self([
      self.0[0] | other.0[0],
      self.0[1] | other.0[1],
      self.0[2] | other.0[2],
      self.0[3] | other.0[3],
    ])
  }

  /// Intersection of two capability sets.
  #[inline]
  #[must_use]
  pub const fn intersection(self, other: Self) -> Self {
    Self([
      self.0[0] & other.0[0],
      self.0[1] & other.0[1],
      self.0[2] & other.0[2],
      self.0[3] & other.0[3],
    ])
  }

  #[inline]
  #[must_use]
  pub const fn is_empty(self) -> bool {
    self.0[0] == 0 && self.0[1] == 0 && self.0[2] == 0 && self.0[3] == 0
  }

  /// Count the number of features present.
  #[inline]
  #[must_use]
  pub const fn count(self) -> u32 {
    self.0[0].count_ones() + self.0[1].count_ones() + self.0[2].count_ones() + self.0[3].count_ones()
  }

  /// Create a capability set with a single bit set.
  #[inline]
  #[must_use]
  pub const fn bit(bit: u8) -> Self {
    let word = bit / 64;
    let bit_in_word = bit % 64;
    let mut bits = [0u64; 4];
    match word {
      0 => bits[0] = 1u64 << bit_in_word,
      1 => bits[1] = 1u64 << bit_in_word,
      2 => bits[2] = 1u64 << bit_in_word,
      _ => bits[3] = 1u64 << bit_in_word,
    }
    Self(bits)
  }

  /// Check if a specific bit is set.
  #[inline]
  #[must_use]
  pub const fn has_bit(self, bit: u8) -> bool {
    let bits_word = match bit / 64 {
      0 => self.0[0],
      1 => self.0[1],
      2 => self.0[2],
      _ => self.0[3],
    };
    (bits_word & (1u64 << (bit % 64))) != 0
  }

  /// Names of the known features present in this set.
  pub fn names(self) -> impl Iterator<Item = &'static str> {
    FEATURE_NAMES
      .iter()
      .filter(move |(caps, _)| self.has(*caps))
      .map(|&(_, name)| name)
  }

  /// Widest vector extension present in this set.
  #[inline]
  #[must_use]
  pub const fn vector_level(self) -> VectorLevel {
    VectorLevel::from_caps(self)
  }
}

impl core::fmt::Debug for Caps {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_set().entries(self.names()).finish()
  }
}

impl core::ops::BitOr for Caps {
  type Output = Self;

  #[inline]
  fn bitor(self, rhs: Self) -> Self::Output {
    self.union(rhs)
  }
}

impl core::ops::BitAnd for Caps {
  type Output = Self;

  #[inline]
  fn bitand(self, rhs: Self) -> Self::Output {
    self.intersection(rhs)
  }
}

impl core::ops::BitOrAssign for Caps {
  #[inline]
  fn bitor_assign(&mut self, rhs: Self) {
    *self = self.union(rhs);
  }
}

// ─────────────────────────────────────────────────────────────────────────────
// Architecture Identification
// ─────────────────────────────────────────────────────────────────────────────

/// Target architecture enumeration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Arch {
  X86_64,
  X86,
  Aarch64,
  #[default]
  Other,
}

impl Arch {
  /// Get the architecture for the current compilation target.
  #[inline]
  #[must_use]
  pub const fn current() -> Self {
    #[cfg(target_arch = "x86_64")]
    {
      Self::X86_64
    }
    #[cfg(target_arch = "x86")]
    {
      Self::X86
    }
    #[cfg(target_arch = "aarch64")]
    {
      Self::Aarch64
    }
    #[cfg(not(any(target_arch = "x86_64", target_arch = "x86", target_arch = "aarch64")))]
    {
      Self::Other
    }
  }

  #[inline]
  #[must_use]
  pub const fn name(self) -> &'static str {
    match self {
      Self::X86_64 => "x86_64",
      Self::X86 => "x86",
      Self::Aarch64 => "aarch64",
      Self::Other => "other",
    }
  }
}

impl core::fmt::Display for Arch {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.write_str(self.name())
  }
}

// ─────────────────────────────────────────────────────────────────────────────
// Vector Level
// ─────────────────────────────────────────────────────────────────────────────

/// Coarse summary of the widest usable vector unit.
///
/// Ordered: a higher level implies every lower one on the same architecture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VectorLevel {
  /// No usable vector unit.
  Scalar,
  /// Baseline 128-bit unit (SSE2 / NEON).
  Baseline,
  /// 128-bit unit with byte shuffles (SSSE3).
  Shuffle,
  /// 256-bit integer unit (AVX2).
  Wide,
  /// 512-bit integer unit with byte/word ops (AVX-512 F+BW+VL).
  Wide512,
}

impl VectorLevel {
  #[must_use]
  pub const fn from_caps(caps: Caps) -> Self {
    if caps.has(x86::AVX512_READY) {
      Self::Wide512
    } else if caps.has(x86::AVX2) {
      Self::Wide
    } else if caps.has(x86::SSSE3) {
      Self::Shuffle
    } else if caps.has(x86::SSE2) || caps.has(aarch64::NEON) {
      Self::Baseline
    } else {
      Self::Scalar
    }
  }

  #[inline]
  #[must_use]
  pub const fn name(self) -> &'static str {
    match self {
      Self::Scalar => "scalar",
      Self::Baseline => "baseline",
      Self::Shuffle => "shuffle",
      Self::Wide => "wide",
      Self::Wide512 => "wide512",
    }
  }
}

// ─────────────────────────────────────────────────────────────────────────────
// x86/x86_64 Features (bits 0-63)
// ─────────────────────────────────────────────────────────────────────────────

/// x86/x86_64 CPU features relevant to GF(2^16) region kernels.
pub mod x86 {
  use super::Caps;

  // SSE family
  pub const SSE2: Caps = Caps::bit(0);
  pub const SSSE3: Caps = Caps::bit(2);
  pub const SSE41: Caps = Caps::bit(3);

  // AVX family
  pub const AVX: Caps = Caps::bit(6);
  pub const AVX2: Caps = Caps::bit(7);

  // Carry-less multiply
  pub const PCLMULQDQ: Caps = Caps::bit(11);

  // AVX-512
  pub const AVX512F: Caps = Caps::bit(14);
  pub const AVX512VL: Caps = Caps::bit(15);
  pub const AVX512BW: Caps = Caps::bit(16);

  // Galois field affine instructions
  pub const GFNI: Caps = Caps::bit(21);

  /// PCLMULQDQ with the SSSE3 shuffles its kernels need.
  pub const PCLMUL_READY: Caps = Caps([PCLMULQDQ.0[0] | SSSE3.0[0], 0, 0, 0]);

  /// AVX-512 subset used by 64-byte integer kernels.
  pub const AVX512_READY: Caps = Caps([AVX512F.0[0] | AVX512VL.0[0] | AVX512BW.0[0], 0, 0, 0]);
}

// ─────────────────────────────────────────────────────────────────────────────
// AArch64 Features (bits 64-127)
// ─────────────────────────────────────────────────────────────────────────────

/// AArch64 CPU features.
pub mod aarch64 {
  use super::Caps;

  pub const NEON: Caps = Caps::bit(64); // Baseline on AArch64
  pub const PMULL: Caps = Caps::bit(66);
}

const FEATURE_NAMES: &[(Caps, &str)] = &[
  (x86::SSE2, "sse2"),
  (x86::SSSE3, "ssse3"),
  (x86::SSE41, "sse4.1"),
  (x86::AVX, "avx"),
  (x86::AVX2, "avx2"),
  (x86::PCLMULQDQ, "pclmulqdq"),
  (x86::AVX512F, "avx512f"),
  (x86::AVX512VL, "avx512vl"),
  (x86::AVX512BW, "avx512bw"),
  (x86::GFNI, "gfni"),
  (aarch64::NEON, "neon"),
  (aarch64::PMULL, "pmull"),
];

#[cfg(test)]
mod tests {
  extern crate alloc;

  use alloc::{format, vec::Vec};

  use super::*;

  #[test]
  fn caps_basic() {
    let empty = Caps::NONE;
    assert!(empty.is_empty());
    assert_eq!(empty.count(), 0);

    let bit0 = Caps::bit(0);
    assert!(!bit0.is_empty());
    assert_eq!(bit0.count(), 1);
    assert!(bit0.has_bit(0));
    assert!(!bit0.has_bit(1));
  }

  #[test]
  fn caps_union_intersection() {
    let ab = x86::SSE2 | x86::AVX2;
    assert!(ab.has(x86::SSE2));
    assert!(ab.has(x86::AVX2));
    assert!(!x86::SSE2.has(ab));
    assert_eq!(ab & x86::AVX2, x86::AVX2);
    assert_eq!(ab.count(), 2);
  }

  #[test]
  fn caps_bits_in_every_word() {
    for bit in [0u8, 63, 64, 127, 128, 191, 192, 255] {
      let c = Caps::bit(bit);
      assert!(c.has_bit(bit), "bit {bit} should round-trip");
      assert_eq!(c.count(), 1, "bit {bit} should set exactly one bit");
    }
  }

  #[test]
  fn names_list_present_features() {
    let c = x86::SSE2 | x86::PCLMULQDQ;
    let names: Vec<_> = c.names().collect();
    assert_eq!(names, ["sse2", "pclmulqdq"]);
    assert_eq!(format!("{c:?}"), r#"{"sse2", "pclmulqdq"}"#);
  }

  #[test]
  fn vector_level_orders_extensions() {
    assert_eq!(Caps::NONE.vector_level(), VectorLevel::Scalar);
    assert_eq!(x86::SSE2.vector_level(), VectorLevel::Baseline);
    assert_eq!((x86::SSE2 | x86::SSSE3).vector_level(), VectorLevel::Shuffle);
    assert_eq!((x86::SSE2 | x86::AVX2).vector_level(), VectorLevel::Wide);
    assert_eq!(x86::AVX512_READY.vector_level(), VectorLevel::Wide512);
    assert_eq!(aarch64::NEON.vector_level(), VectorLevel::Baseline);
    assert!(VectorLevel::Wide > VectorLevel::Baseline);
  }
}

// ─────────────────────────────────────────────────────────────────────────────
// Property-Based Tests (proptest)
// Note: proptest uses filesystem for failure persistence, which Miri doesn't support.
// ─────────────────────────────────────────────────────────────────────────────
