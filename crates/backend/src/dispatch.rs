//! Kernel selection.
//!
//! - [`Candidate`]: A kernel with capability requirements
//! - [`Selected`]: The result of kernel selection
//! - [`select`]: Choose the best kernel from a candidate list
//! - [`available`]: Every runnable candidate, best first
//!
//! Selection happens once, when the consumer binds a backend. Nothing here
//! caches globally: a field handle keeps what it selected for its lifetime.

use platform::Caps;

// ─────────────────────────────────────────────────────────────────────────────
// Core Types
// ─────────────────────────────────────────────────────────────────────────────

/// A candidate kernel with capability requirements.
///
/// Candidates are ordered from best to worst. The dispatcher selects the
/// first candidate whose requirements are satisfied by the detected capabilities.
#[derive(Clone, Copy, Debug)]
pub struct Candidate<F> {
  /// Human-readable name for diagnostics (e.g., "x86_64/xor-jit-avx2").
  pub name: &'static str,
  /// Required CPU capabilities. Must be a subset of detected caps.
  pub requires: Caps,
  /// The kernel, or a token naming it.
  pub func: F,
}

impl<F> Candidate<F> {
  #[inline]
  #[must_use]
  pub const fn new(name: &'static str, requires: Caps, func: F) -> Self {
    Self { name, requires, func }
  }

  /// Whether `caps` satisfies this candidate.
  #[inline]
  #[must_use]
  pub const fn runs_on(&self, caps: Caps) -> bool {
    caps.has(self.requires)
  }
}

/// The result of kernel selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Selected<F> {
  /// Human-readable name of the selected kernel.
  pub name: &'static str,
  /// The selected kernel.
  pub func: F,
}

impl<F> Selected<F> {
  #[inline]
  #[must_use]
  pub const fn new(name: &'static str, func: F) -> Self {
    Self { name, func }
  }
}

/// Select the best kernel from a candidate list, if any can run.
#[inline]
#[must_use]
pub fn try_select<F: Copy>(caps: Caps, candidates: &[Candidate<F>]) -> Option<Selected<F>> {
  candidates
    .iter()
    .find(|c| c.runs_on(caps))
    .map(|c| Selected::new(c.name, c.func))
}

/// Select the best kernel from a candidate list.
///
/// Returns the first candidate whose `requires` is satisfied by `caps`.
///
/// # Panics
///
/// Panics if no candidate matches. The last candidate should always have
/// `requires = Caps::NONE` as a fallback.
#[inline]
#[must_use]
pub fn select<F: Copy>(caps: Caps, candidates: &[Candidate<F>]) -> Selected<F> {
  match try_select(caps, candidates) {
    Some(selected) => selected,
    None => panic!("No matching kernel found! Candidate list must include a portable fallback."),
  }
}

/// Every candidate `caps` can run, best first.
///
/// Consumers whose kernels can fail to initialize (e.g. executable memory
/// refused by the OS) walk this list instead of calling [`select`].
pub fn available<F: Copy>(caps: Caps, candidates: &[Candidate<F>]) -> impl Iterator<Item = Selected<F>> + '_ {
  candidates
    .iter()
    .filter(move |c| c.runs_on(caps))
    .map(|c| Selected::new(c.name, c.func))
}

#[cfg(test)]
mod tests {
  extern crate alloc;

  use alloc::vec::Vec;

  use super::*;

  type KernelFn = fn(u16) -> u16;

  fn portable_kernel(x: u16) -> u16 {
    x ^ 0x00FF
  }

  fn fast_kernel(x: u16) -> u16 {
    x ^ 0xFF00
  }

  #[test]
  fn candidate_creation() {
    let c: Candidate<KernelFn> = Candidate::new("test", Caps::NONE, portable_kernel);
    assert_eq!(c.name, "test");
    assert_eq!(c.requires, Caps::NONE);
    assert!(c.runs_on(Caps::NONE));
  }

  #[test]
  fn select_portable_fallback() {
    let candidates: &[Candidate<KernelFn>] = &[
      Candidate::new("fast", Caps::bit(0), fast_kernel),
      Candidate::new("portable", Caps::NONE, portable_kernel),
    ];

    let selected = select(Caps::NONE, candidates);
    assert_eq!(selected.name, "portable");
    assert_eq!((selected.func)(0), 0x00FF);
  }

  #[test]
  fn select_best_match() {
    let candidates: &[Candidate<KernelFn>] = &[
      Candidate::new("fast", Caps::bit(0), fast_kernel),
      Candidate::new("portable", Caps::NONE, portable_kernel),
    ];

    let selected = select(Caps::bit(0), candidates);
    assert_eq!(selected.name, "fast");
    assert_eq!((selected.func)(0), 0xFF00);
  }

  #[test]
  fn select_skips_unavailable() {
    let candidates: &[Candidate<KernelFn>] = &[
      Candidate::new("needs_bit1", Caps::bit(1), fast_kernel),
      Candidate::new("needs_bit0", Caps::bit(0), fast_kernel),
      Candidate::new("portable", Caps::NONE, portable_kernel),
    ];

    assert_eq!(select(Caps::bit(0), candidates).name, "needs_bit0");
  }

  #[test]
  fn try_select_without_fallback() {
    let candidates: &[Candidate<u8>] = &[Candidate::new("needs_bit1", Caps::bit(1), 1)];
    assert_eq!(try_select(Caps::bit(0), candidates), None);
    assert_eq!(try_select(Caps::bit(1), candidates), Some(Selected::new("needs_bit1", 1)));
  }

  #[test]
  #[should_panic(expected = "portable fallback")]
  fn select_panics_without_match() {
    let candidates: &[Candidate<u8>] = &[Candidate::new("needs_bit1", Caps::bit(1), 1)];
    let _ = select(Caps::NONE, candidates);
  }

  #[test]
  fn available_preserves_order() {
    let candidates: &[Candidate<u8>] = &[
      Candidate::new("a", Caps::bit(0), 0),
      Candidate::new("b", Caps::bit(1), 1),
      Candidate::new("c", Caps::NONE, 2),
    ];
    let names: Vec<_> = available(Caps::bit(0), candidates).map(|s| s.name).collect();
    assert_eq!(names, ["a", "c"]);
  }
}
