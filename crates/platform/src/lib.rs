//! CPU detection, capabilities, and tuning for the gf16 workspace.
//!
//! This crate is the single source of truth for CPU feature detection.
//! Region kernels never probe the CPU themselves; they ask `platform` once
//! and bind a backend from the answer.
//!
//! # Core Types
//!
//! - [`Caps`]: What instructions can run on this machine (capabilities)
//! - [`Tune`]: What parameters suit this machine (tuning hints)
//!
//! # Main Entry Point
//!
//! ```
//! use platform::caps::x86;
//!
//! let (caps, tune) = platform::get();
//!
//! if caps.has(x86::AVX2) {
//!   // 32-byte bit-plane kernels are legal here.
//! }
//! assert!(tune.region_chunk > 0);
//! ```
//!
//! # Design Philosophy
//!
//! 1. **One API**: Kernels query `platform::get()` instead of doing ad-hoc detection.
//! 2. **Capabilities vs Tuning**: `Caps` says what's *possible*; `Tune` says what's *preferable*.
//! 3. **Cached**: Runtime detection is cached in `OnceLock` (std) or atomics (no_std).
//! 4. **Miri-safe**: Under Miri, always returns portable-only caps.

#![no_std]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

#[cfg(feature = "std")]
extern crate std;

// ─────────────────────────────────────────────────────────────────────────────
// Core modules
// ─────────────────────────────────────────────────────────────────────────────

pub mod caps;
mod detect;
pub mod tune;

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

pub use caps::{Arch, Caps, VectorLevel};
pub use detect::{Detected, OverrideError, clear_override, detect_uncached, has_override, set_override, try_set_override};
pub use tune::{Tune, TuneKind};

/// Get detected CPU capabilities and tuning hints.
///
/// # Caching
///
/// Detection runs at most once per process. Concurrent first calls may race;
/// every racer computes the same snapshot, so the race is harmless.
///
/// # Miri
///
/// Under Miri, always returns portable-only capabilities.
#[inline]
#[must_use]
pub fn get() -> (Caps, Tune) {
  let det = detect::get();
  (det.caps, det.tune)
}

/// Get just the CPU capabilities.
#[inline]
#[must_use]
pub fn caps() -> Caps {
  detect::get().caps
}

/// Get just the tuning hints.
#[inline]
#[must_use]
pub fn tune() -> Tune {
  detect::get().tune
}

/// Initialize with user-supplied capabilities.
///
/// Call this before any call to [`get()`] to bypass runtime detection, e.g. on
/// bare metal where the CPU is known at deployment.
///
/// # Panics
///
/// Panics if detection has already been cached.
#[inline]
pub fn init_with_caps(caps: Caps, tune: Tune) {
  set_override(Some(Detected {
    caps,
    tune,
    arch: Arch::current(),
  }));
}
