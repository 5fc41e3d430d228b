//! Kernel acceleration tiers.
//!
//! Tiers represent levels of hardware acceleration, from reference
//! implementations to value-specialized generated code. Higher tiers offer
//! better performance but have stricter hardware and platform requirements.
//!
//! # Tier Overview
//!
//! | Tier | Name | Description |
//! |------|------|-------------|
//! | 0 | Reference | Bitwise shift-and-reduce; always available, for verification |
//! | 1 | Portable | Table lookups or word-wide bit-slicing; production fallback |
//! | 2 | Vector | Interpreted SIMD kernels (SSE2 / AVX2) |
//! | 3 | Generated | Machine code emitted at run time for one operand |

use core::fmt;

/// Kernel acceleration tier.
///
/// Tiers implement `Ord` with higher tiers being "greater", so
/// `tier >= KernelTier::Vector` checks for SIMD acceleration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum KernelTier {
  /// Tier 0: Bitwise reference implementation.
  ///
  /// Always available, always correct. Used for verification.
  #[default]
  Reference = 0,

  /// Tier 1: Portable implementation.
  ///
  /// Always available. Log/antilog tables or 64-bit bit-sliced words.
  Portable = 1,

  /// Tier 2: Interpreted vector kernels.
  ///
  /// The kernel walks a data-dependent plan at run time using SIMD lanes.
  Vector = 2,

  /// Tier 3: Run-time generated code.
  ///
  /// Straight-line machine code emitted for one operand and entered through a
  /// typed function pointer. Requires executable memory from the OS.
  Generated = 3,
}

impl KernelTier {
  /// All tiers in ascending order.
  pub const ALL: [Self; 4] = [Self::Reference, Self::Portable, Self::Vector, Self::Generated];

  /// Convert to numeric value.
  #[inline]
  #[must_use]
  pub const fn as_u8(self) -> u8 {
    self as u8
  }

  /// Human-readable tier name.
  #[inline]
  #[must_use]
  pub const fn name(self) -> &'static str {
    match self {
      Self::Reference => "reference",
      Self::Portable => "portable",
      Self::Vector => "vector",
      Self::Generated => "generated",
    }
  }

  /// Check if this tier requires runtime capability detection.
  #[inline]
  #[must_use]
  pub const fn requires_runtime_detection(self) -> bool {
    matches!(self, Self::Vector | Self::Generated)
  }

  /// Check if this tier needs executable memory at run time.
  #[inline]
  #[must_use]
  pub const fn needs_executable_memory(self) -> bool {
    matches!(self, Self::Generated)
  }
}

impl fmt::Display for KernelTier {
  #[inline]
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}
