//! Region-multiplication methods.
//!
//! | Method | Tier | Planes | Block |
//! |--------|------|--------|-------|
//! | `log-table` | portable | n/a | 2 B |
//! | `xor-portable` | portable | 16 B | 256 B |
//! | `xor-sse2` | vector | 16 B | 256 B |
//! | `xor-jit-sse2` | generated | 16 B | 256 B |
//! | `xor-jit-avx2` | generated | 32 B | 512 B |
//! | `xor-jit-avx512` | generated | 64 B | 1 KiB |
//!
//! Bit-sliced methods split a 16-bit element into 16 bit planes of `lanes()`
//! bytes each, so one block holds `8 * lanes()` elements.

use backend::KernelTier;
use platform::Caps;

/// A region-multiplication backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
  /// Element-at-a-time log/antilog lookup. Always available.
  LogTable,
  /// Bit-sliced, 16-byte planes processed as 64-bit words. Always available.
  XorPortable,
  /// Bit-sliced, SSE2 planes, dependency table walked at run time.
  XorSse2,
  /// Bit-sliced, SSE2 code generated per multiplier.
  XorJitSse2,
  /// Bit-sliced, AVX2 code generated per multiplier.
  XorJitAvx2,
  /// Bit-sliced, AVX-512 code generated per multiplier, all outputs in registers.
  XorJitAvx512,
}

impl Method {
  /// Every method, slowest first.
  pub const ALL: [Self; 6] = [
    Self::LogTable,
    Self::XorPortable,
    Self::XorSse2,
    Self::XorJitSse2,
    Self::XorJitAvx2,
    Self::XorJitAvx512,
  ];

  #[inline]
  #[must_use]
  pub const fn name(self) -> &'static str {
    match self {
      Self::LogTable => "log-table",
      Self::XorPortable => "xor-portable",
      Self::XorSse2 => "xor-sse2",
      Self::XorJitSse2 => "xor-jit-sse2",
      Self::XorJitAvx2 => "xor-jit-avx2",
      Self::XorJitAvx512 => "xor-jit-avx512",
    }
  }

  #[inline]
  #[must_use]
  pub const fn tier(self) -> KernelTier {
    match self {
      Self::LogTable | Self::XorPortable => KernelTier::Portable,
      Self::XorSse2 => KernelTier::Vector,
      Self::XorJitSse2 | Self::XorJitAvx2 | Self::XorJitAvx512 => KernelTier::Generated,
    }
  }

  /// Whether the method works on bit planes (and so supports the alternate layout).
  #[inline]
  #[must_use]
  pub const fn is_bit_sliced(self) -> bool {
    !matches!(self, Self::LogTable)
  }

  /// Whether the method emits machine code at run time.
  #[inline]
  #[must_use]
  pub const fn is_generated(self) -> bool {
    matches!(self, Self::XorJitSse2 | Self::XorJitAvx2 | Self::XorJitAvx512)
  }

  /// Bytes per bit plane, or the element size for the log-table method.
  #[inline]
  #[must_use]
  pub const fn lanes(self) -> usize {
    match self {
      Self::LogTable => 2,
      Self::XorPortable | Self::XorSse2 | Self::XorJitSse2 => 16,
      Self::XorJitAvx2 => 32,
      Self::XorJitAvx512 => 64,
    }
  }

  /// Boundary the aligned body of a region starts on.
  #[inline]
  #[must_use]
  pub const fn alignment(self) -> usize {
    self.lanes()
  }

  /// Granularity of the aligned body: 16 planes of `lanes()` bytes.
  #[inline]
  #[must_use]
  pub const fn block_bytes(self) -> usize {
    match self {
      Self::LogTable => 2,
      _ => 16 * self.lanes(),
    }
  }

  /// CPU features the method needs at run time.
  #[inline]
  #[must_use]
  pub const fn required_caps(self) -> Caps {
    match self {
      Self::LogTable | Self::XorPortable => Caps::NONE,
      Self::XorSse2 | Self::XorJitSse2 => platform::caps::x86::SSE2,
      Self::XorJitAvx2 => platform::caps::x86::AVX2,
      Self::XorJitAvx512 => platform::caps::x86::AVX512F,
    }
  }

  /// Whether this build contains the method at all.
  ///
  /// Generated code needs x86_64 and page protection calls (`mmap`/`mprotect`
  /// on Unix, `VirtualAlloc`/`VirtualProtect` on Windows). Miri cannot
  /// execute it.
  #[inline]
  #[must_use]
  pub const fn is_compiled_in(self) -> bool {
    match self {
      Self::LogTable | Self::XorPortable => true,
      Self::XorSse2 => cfg!(target_arch = "x86_64"),
      Self::XorJitSse2 | Self::XorJitAvx2 | Self::XorJitAvx512 => {
        cfg!(all(target_arch = "x86_64", any(unix, windows), not(miri)))
      }
    }
  }

  /// Whether the method can run on a host with `caps`.
  #[inline]
  #[must_use]
  pub const fn runs_on(self, caps: Caps) -> bool {
    self.is_compiled_in() && caps.has(self.required_caps())
  }
}

impl core::fmt::Display for Method {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.write_str(self.name())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn geometry() {
    for m in Method::ALL {
      assert_eq!(m.alignment(), m.lanes(), "{m}");
      if m.is_bit_sliced() {
        assert_eq!(m.block_bytes(), 16 * m.lanes(), "{m}");
        assert_eq!(m.lanes() % 16, 0, "{m}: planes must hold whole SSE registers");
      }
    }
    assert_eq!(Method::XorJitAvx2.block_bytes(), 512);
    assert_eq!(Method::XorJitAvx512.block_bytes(), 1024);
    assert_eq!(Method::XorJitAvx512.alignment(), 64);
    assert_eq!(Method::LogTable.block_bytes(), 2);
  }

  #[test]
  fn portable_methods_run_anywhere() {
    assert!(Method::LogTable.runs_on(Caps::NONE));
    assert!(Method::XorPortable.runs_on(Caps::NONE));
    assert!(!Method::XorSse2.runs_on(Caps::NONE));
    assert!(!Method::XorJitAvx2.runs_on(platform::caps::x86::SSE2));
    assert!(!Method::XorJitAvx512.runs_on(platform::caps::x86::AVX2));
  }

  #[test]
  fn tiers_are_ordered_by_speed() {
    let tiers: Vec<_> = Method::ALL.iter().map(|m| m.tier()).collect();
    assert!(tiers.windows(2).all(|w| w[0] <= w[1]), "{tiers:?}");
    assert!(Method::XorJitSse2.is_generated());
    assert!(!Method::XorSse2.is_generated());
  }

  #[test]
  fn names_are_unique() {
    for (i, a) in Method::ALL.iter().enumerate() {
      for b in &Method::ALL[i + 1..] {
        assert_ne!(a.name(), b.name());
      }
    }
    assert_eq!(Method::XorSse2.to_string(), "xor-sse2");
  }
}
