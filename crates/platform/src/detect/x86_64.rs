//! x86_64 capability and tuning detection.
//!
//! With `std`, feature bits come from `is_x86_feature_detected!`, which
//! already accounts for OS-enabled register state. Without `std`, CPUID and
//! XGETBV are queried directly with the same gating.

#![allow(unsafe_code)]

use core::arch::x86_64::__cpuid;

use super::Detected;
use crate::{
  caps::{Arch, Caps, x86},
  tune::Tune,
};

/// XCR0 bits for SSE + AVX state.
#[cfg(not(feature = "std"))]
const XCR0_AVX: u64 = 0x6;
/// XCR0 bits for SSE + AVX + opmask + ZMM state.
#[cfg(not(feature = "std"))]
const XCR0_AVX512: u64 = 0xE6;

pub(super) fn detect() -> Detected {
  let caps = compile_time().union(runtime());
  let tune = Tune::for_smt(smt_hint());
  Detected {
    caps,
    tune,
    arch: Arch::X86_64,
  }
}

/// Features the compiler was told to assume.
const fn compile_time() -> Caps {
  // SSE2 is part of the x86_64 baseline.
  #[allow(unused_mut)]
  let mut bits = x86::SSE2;

  #[cfg(target_feature = "ssse3")]
  {
    bits = bits.union(x86::SSSE3);
  }
  #[cfg(target_feature = "sse4.1")]
  {
    bits = bits.union(x86::SSE41);
  }
  #[cfg(target_feature = "avx")]
  {
    bits = bits.union(x86::AVX);
  }
  #[cfg(target_feature = "avx2")]
  {
    bits = bits.union(x86::AVX2);
  }
  #[cfg(target_feature = "pclmulqdq")]
  {
    bits = bits.union(x86::PCLMULQDQ);
  }
  #[cfg(target_feature = "avx512f")]
  {
    bits = bits.union(x86::AVX512F);
  }
  #[cfg(target_feature = "avx512vl")]
  {
    bits = bits.union(x86::AVX512VL);
  }
  #[cfg(target_feature = "avx512bw")]
  {
    bits = bits.union(x86::AVX512BW);
  }
  #[cfg(target_feature = "gfni")]
  {
    bits = bits.union(x86::GFNI);
  }

  bits
}

#[cfg(feature = "std")]
fn runtime() -> Caps {
  let mut bits = Caps::NONE;

  if std::arch::is_x86_feature_detected!("ssse3") {
    bits |= x86::SSSE3;
  }
  if std::arch::is_x86_feature_detected!("sse4.1") {
    bits |= x86::SSE41;
  }
  if std::arch::is_x86_feature_detected!("avx") {
    bits |= x86::AVX;
  }
  if std::arch::is_x86_feature_detected!("avx2") {
    bits |= x86::AVX2;
  }
  if std::arch::is_x86_feature_detected!("pclmulqdq") {
    bits |= x86::PCLMULQDQ;
  }
  if std::arch::is_x86_feature_detected!("avx512f") {
    bits |= x86::AVX512F;
  }
  if std::arch::is_x86_feature_detected!("avx512vl") {
    bits |= x86::AVX512VL;
  }
  if std::arch::is_x86_feature_detected!("avx512bw") {
    bits |= x86::AVX512BW;
  }
  if std::arch::is_x86_feature_detected!("gfni") {
    bits |= x86::GFNI;
  }

  bits
}

#[cfg(not(feature = "std"))]
fn runtime() -> Caps {
  let leaf0 = __cpuid(0);
  let leaf1 = __cpuid(1);
  let max_leaf = leaf0.eax;

  let mut bits = Caps::NONE;
  let ecx1 = leaf1.ecx;
  if ecx1 & (1 << 9) != 0 {
    bits |= x86::SSSE3;
  }
  if ecx1 & (1 << 19) != 0 {
    bits |= x86::SSE41;
  }
  if ecx1 & (1 << 1) != 0 {
    bits |= x86::PCLMULQDQ;
  }

  // OSXSAVE: the OS manages extended state, so XGETBV is legal.
  let xcr0 = if ecx1 & (1 << 27) != 0 {
    // SAFETY: OSXSAVE was just checked.
    unsafe { xgetbv0() }
  } else {
    0
  };
  let avx_os = xcr0 & XCR0_AVX == XCR0_AVX;
  let avx512_os = xcr0 & XCR0_AVX512 == XCR0_AVX512;

  if avx_os && ecx1 & (1 << 28) != 0 {
    bits |= x86::AVX;
  }

  if max_leaf >= 7 {
    // Leaf 7 is within the reported maximum.
    let leaf7 = core::arch::x86_64::__cpuid_count(7, 0);
    if avx_os && bits.has(x86::AVX) && leaf7.ebx & (1 << 5) != 0 {
      bits |= x86::AVX2;
    }
    if avx512_os {
      if leaf7.ebx & (1 << 16) != 0 {
        bits |= x86::AVX512F;
      }
      if leaf7.ebx & (1 << 30) != 0 {
        bits |= x86::AVX512BW;
      }
      if leaf7.ebx & (1 << 31) != 0 {
        bits |= x86::AVX512VL;
      }
    }
    if leaf7.ecx & (1 << 8) != 0 {
      bits |= x86::GFNI;
    }
  }

  bits
}

#[cfg(not(feature = "std"))]
#[target_feature(enable = "xsave")]
unsafe fn xgetbv0() -> u64 {
  core::arch::x86_64::_xgetbv(0)
}

/// Coarse "many virtual threads per core" hint from CPUID leaf 1.
///
/// HTT (EDX bit 28) only says the logical-processor field is valid; the
/// field itself (EBX bits 16..24) must report more than one logical
/// processor per package.
fn smt_hint() -> bool {
  let leaf1 = __cpuid(1);
  smt_from_leaf1(leaf1.ebx, leaf1.edx)
}

#[inline]
pub(super) const fn smt_from_leaf1(ebx: u32, edx: u32) -> bool {
  let htt = edx & (1 << 28) != 0;
  let logical = (ebx >> 16) & 0xFF;
  htt && logical > 1
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn smt_requires_htt_and_more_than_one_logical() {
    assert!(smt_from_leaf1(2 << 16, 1 << 28));
    assert!(smt_from_leaf1(16 << 16, 1 << 28));
    assert!(!smt_from_leaf1(1 << 16, 1 << 28), "one logical processor is not SMT");
    assert!(!smt_from_leaf1(2 << 16, 0), "HTT flag must be set");
    assert!(!smt_from_leaf1(0, 1 << 28));
  }

  #[test]
  fn sse2_is_always_present() {
    let det = detect();
    assert!(det.caps.has(x86::SSE2));
    assert_eq!(det.arch, Arch::X86_64);
  }

  #[test]
  fn avx2_implies_avx() {
    let det = detect();
    if det.caps.has(x86::AVX2) {
      assert!(det.caps.has(x86::AVX), "AVX2 without AVX: {:?}", det.caps);
    }
  }
}
