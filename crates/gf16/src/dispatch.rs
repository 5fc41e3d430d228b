//! Backend binding.
//!
//! A field handle binds exactly one [`RegionBackend`] at construction:
//!
//! 1. [`Config::method`](crate::Config::method), if set. Failure is an error.
//! 2. `GF16_FORCE`, clamped to what the host and configuration allow.
//! 3. The first runnable candidate in [`DIRECT_ORDER`] or [`XOR_ORDER`].
//!
//! Automatic choices fall through to the next candidate when a generated
//! backend cannot map executable memory; the last candidate never fails.

#![allow(unsafe_code)]

use backend::Candidate;
use platform::{Caps, Tune};
use tracing::warn;

use crate::{
  bitslice::BitSliceBackend,
  config::{self, Config, Layout, MultType},
  error::{ConfigError, JitError},
  log_table::LogTableBackend,
  method::Method,
  tables::LogTables,
};

/// A region-multiplication backend bound to a field handle.
pub(crate) trait RegionBackend: Send + core::fmt::Debug {
  fn method(&self) -> Method;

  /// `dst (^)= src * value` over `len` bytes.
  ///
  /// # Safety
  ///
  /// `src` is readable and `dst` writable for `len` bytes; the two ranges
  /// are identical or disjoint. `len` is even.
  ///
  /// # Panics
  ///
  /// Panics if the addresses violate the backend's alignment residue.
  unsafe fn multiply_region(
    &mut self,
    tables: &LogTables,
    src: *const u8,
    dst: *mut u8,
    len: usize,
    value: u16,
    accumulate: bool,
  );
}

/// Preference order for default multiplication on direct buffers.
pub(crate) const DIRECT_ORDER: [Candidate<Method>; 5] = [
  candidate(Method::XorJitAvx512),
  candidate(Method::XorJitAvx2),
  candidate(Method::XorJitSse2),
  candidate(Method::XorSse2),
  candidate(Method::LogTable),
];

/// Preference order when bit planes are required.
pub(crate) const XOR_ORDER: [Candidate<Method>; 5] = [
  candidate(Method::XorJitAvx512),
  candidate(Method::XorJitAvx2),
  candidate(Method::XorJitSse2),
  candidate(Method::XorSse2),
  candidate(Method::XorPortable),
];

const fn candidate(method: Method) -> Candidate<Method> {
  Candidate::new(method.name(), method.required_caps(), method)
}

/// Methods to try, in order, and whether the first was explicitly requested.
pub(crate) fn plan(config: &Config, caps: Caps) -> Result<(Vec<Method>, bool), ConfigError> {
  if let Some(method) = config.method {
    if !method.runs_on(caps) {
      return Err(ConfigError::MethodUnavailable(method));
    }
    config.check_method(method)?;
    return Ok((vec![method], true));
  }

  let order: &[Candidate<Method>] = if config.layout == Layout::AltMap || config.mult == MultType::XorDepends {
    &XOR_ORDER
  } else {
    &DIRECT_ORDER
  };
  let mut methods: Vec<Method> = backend::available(caps, order)
    .map(|s| s.func)
    .filter(|m| m.is_compiled_in())
    .collect();

  if let Some(forced) = config::clamp_force(config::env().force, caps, config) {
    methods.retain(|m| *m != forced);
    methods.insert(0, forced);
  }
  Ok((methods, false))
}

/// Construct one backend. Only generated backends can fail.
fn construct(
  method: Method,
  config: &Config,
  caps: Caps,
  tune: Tune,
  scratch: &mut Option<Vec<u8>>,
) -> Result<Box<dyn RegionBackend>, JitError> {
  match method {
    Method::LogTable => Ok(Box::new(LogTableBackend)),
    Method::XorPortable | Method::XorSse2 => Ok(Box::new(BitSliceBackend::new(method, config.layout))),
    Method::XorJitSse2 | Method::XorJitAvx2 | Method::XorJitAvx512 => {
      #[cfg(all(target_arch = "x86_64", any(unix, windows), not(miri)))]
      {
        let staging = config.staging_bytes(method, tune);
        let memory = scratch
          .take()
          .unwrap_or_else(|| vec![0u8; config::scratch_bytes(staging)]);
        let jit = crate::jit::JitBackend::new(
          method,
          config.layout,
          config.effective_cse(),
          staging,
          memory,
          crate::bitslice::best_kernels(caps).func,
        )?;
        Ok(Box::new(jit))
      }
      #[cfg(not(all(target_arch = "x86_64", any(unix, windows), not(miri))))]
      {
        let _ = (caps, tune, scratch);
        Err(JitError::Unsupported)
      }
    }
  }
}

/// Scratch bytes `method` needs under `config`.
pub(crate) fn scratch_for(method: Method, config: &Config, tune: Tune) -> usize {
  config::scratch_bytes(config.staging_bytes(method, tune))
}

/// Select and construct the backend for `config`.
pub(crate) fn bind(config: &mut Config, caps: Caps, tune: Tune) -> Result<Box<dyn RegionBackend>, ConfigError> {
  let (methods, explicit) = plan(config, caps)?;

  if let (Some(first), Some(scratch)) = (methods.first(), config.scratch.as_ref()) {
    let required = scratch_for(*first, config, tune);
    if scratch.len() < required {
      return Err(ConfigError::ScratchTooSmall {
        required,
        provided: scratch.len(),
      });
    }
  }

  let mut scratch = config.scratch.take();
  let mut last = JitError::Unsupported;
  for method in methods {
    match construct(method, config, caps, tune, &mut scratch) {
      Ok(backend) => return Ok(backend),
      Err(err) if explicit => return Err(err.into()),
      Err(err) => {
        warn!(method = method.name(), error = %err, "region backend unavailable, trying next");
        last = err;
      }
    }
  }
  Err(last.into())
}

/// Handle `value` 0 and 1 without a backend.
///
/// Returns `false` if the value needs a real multiply.
///
/// # Safety
///
/// As for [`RegionBackend::multiply_region`].
pub(crate) unsafe fn trivial(src: *const u8, dst: *mut u8, len: usize, value: u16, accumulate: bool) -> bool {
  match (value, accumulate) {
    (0, true) => {}
    // SAFETY: dst is writable for len bytes.
    (0, false) => unsafe { core::ptr::write_bytes(dst, 0, len) },
    (1, false) => {
      if !core::ptr::eq(src, dst) {
        // SAFETY: Distinct ranges are disjoint by contract.
        unsafe { core::ptr::copy_nonoverlapping(src, dst, len) };
      }
    }
    (1, true) => {
      for i in 0..len {
        // SAFETY: i < len in both ranges; each byte is read before written.
        unsafe { *dst.add(i) ^= *src.add(i) };
      }
    }
    _ => return false,
  }
  true
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn orders_end_in_fallbacks() {
    assert_eq!(DIRECT_ORDER[0].func, Method::XorJitAvx512);
    assert_eq!(XOR_ORDER[0].func, Method::XorJitAvx512);
    assert_eq!(DIRECT_ORDER[4].func, Method::LogTable);
    assert_eq!(XOR_ORDER[4].func, Method::XorPortable);
    assert!(DIRECT_ORDER.iter().chain(&XOR_ORDER).all(|c| c.requires == c.func.required_caps()));
  }

  #[test]
  fn plan_without_caps() {
    let (methods, explicit) = plan(&Config::new().mult(MultType::XorDepends), Caps::NONE).unwrap();
    assert!(!explicit);
    assert_eq!(methods.last(), Some(&Method::XorPortable));
    assert!(methods.iter().all(|m| m.runs_on(Caps::NONE)));

    let (methods, _) = plan(&Config::new(), Caps::NONE).unwrap();
    assert_eq!(methods.last(), Some(&Method::LogTable));
  }

  #[test]
  fn explicit_method_errors() {
    assert_eq!(
      plan(&Config::new().method(Method::XorJitAvx2), Caps::NONE).unwrap_err(),
      ConfigError::MethodUnavailable(Method::XorJitAvx2)
    );
    assert_eq!(
      plan(&Config::new().method(Method::LogTable).layout(Layout::AltMap), Caps::NONE).unwrap_err(),
      ConfigError::AltMapUnsupported(Method::LogTable)
    );
    let (methods, explicit) = plan(&Config::new().method(Method::XorPortable), Caps::NONE).unwrap();
    assert_eq!((methods, explicit), (vec![Method::XorPortable], true));
  }

  #[test]
  fn scratch_too_small() {
    let caps = platform::caps();
    let tune = Tune::custom(false, 4096);
    let mut config = Config::new().scratch(vec![0u8; 1]);
    let (methods, _) = plan(&config, caps).unwrap();
    let required = scratch_for(methods[0], &config, tune);
    let result = bind(&mut config, caps, tune);
    if required > 1 {
      assert_eq!(result.unwrap_err(), ConfigError::ScratchTooSmall { required, provided: 1 });
    } else {
      assert!(result.is_ok());
    }
  }

  #[test]
  fn trivial_values() {
    let src = [1u8, 2, 3, 4];
    let mut dst = [9u8; 4];
    // SAFETY: Four-byte buffers.
    unsafe {
      assert!(trivial(src.as_ptr(), dst.as_mut_ptr(), 4, 0, true));
      assert_eq!(dst, [9; 4]);
      assert!(trivial(src.as_ptr(), dst.as_mut_ptr(), 4, 1, true));
      assert_eq!(dst, [8, 11, 10, 13]);
      assert!(trivial(src.as_ptr(), dst.as_mut_ptr(), 4, 1, false));
      assert_eq!(dst, src);
      assert!(trivial(src.as_ptr(), dst.as_mut_ptr(), 4, 0, false));
      assert_eq!(dst, [0; 4]);
      assert!(!trivial(src.as_ptr(), dst.as_mut_ptr(), 4, 2, false));
    }
  }
}
