//! Selection on an x86_64 host pinned to baseline SSE2.
//!
//! Wider generated methods must be skipped even when the real CPU has them.

#![cfg(all(target_arch = "x86_64", not(miri)))]

mod common;

use std::sync::Once;

use common::{AlignedBuf, gen_bytes, reference};
use gf16::{Config, ConfigError, Gf16, Layout, Method, MultType};
use platform::{Arch, Detected, Tune, caps::x86};

static PIN: Once = Once::new();

fn pin_sse2() {
  PIN.call_once(|| {
    platform::set_override(Some(Detected {
      caps: x86::SSE2,
      tune: Tune::DEFAULT,
      arch: Arch::current(),
    }));
  });
  assert_eq!(platform::caps(), x86::SSE2);
}

/// Best method for the bit-plane order: generated SSE2 where this build can
/// map executable memory, otherwise the interpreted SSE2 kernels.
fn best_xor() -> Method {
  if Method::XorJitSse2.is_compiled_in() {
    Method::XorJitSse2
  } else {
    Method::XorSse2
  }
}

#[test]
fn auto_selection_stops_at_sse2() {
  pin_sse2();
  assert_eq!(Gf16::new().method(), best_xor());
  let xor = Gf16::with_config(Config::new().mult(MultType::XorDepends)).unwrap();
  assert_eq!(xor.method(), best_xor());
  let alt = Gf16::with_config(Config::new().layout(Layout::AltMap)).unwrap();
  assert_eq!(alt.method(), best_xor());
  assert_eq!(alt.alignment(), 16);
}

#[test]
fn wide_methods_are_rejected() {
  pin_sse2();
  for method in [Method::XorJitAvx2, Method::XorJitAvx512] {
    assert_eq!(
      Gf16::with_config(Config::new().method(method)).unwrap_err(),
      ConfigError::MethodUnavailable(method)
    );
  }
  let sse2 = Gf16::with_config(Config::new().method(Method::XorSse2)).unwrap();
  assert_eq!(sse2.method(), Method::XorSse2);
}

#[test]
fn selected_method_matches_reference() {
  pin_sse2();
  let mut gf = Gf16::new();
  let data = gen_bytes(3 * 4096 + 10, 0x55E2);
  let init = gen_bytes(data.len(), 0x1417);
  for offset in [0usize, 6] {
    let src = AlignedBuf::from_slice(&data, offset);
    for value in [0x8000u16, 0xB5A3] {
      let mut out = AlignedBuf::from_slice(&init, 2);
      gf.multiply_region(&src, &mut out, value, true);
      assert_eq!(*out, *reference(&src, &init, value, true), "offset {offset} value {value:#06x}");
    }
  }
}
