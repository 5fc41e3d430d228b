//! Backend crate: kernel selection primitives for the gf16 workspace.
//!
//! - **Dispatch**: choose the first kernel whose capability requirements the
//!   host satisfies, from an ordered candidate list.
//! - **Tiers**: classify kernels from reference code up to generated code.
//!
//! # Usage
//!
//! Algorithm crates register kernels as an ordered list of `Candidate`s:
//!
//! ```
//! use backend::dispatch::{Candidate, select};
//! use platform::{Caps, caps::x86};
//!
//! fn wide(x: u32) -> u32 { x * 2 }
//! fn portable(x: u32) -> u32 { x + x }
//!
//! let chosen = select(
//!   platform::caps(),
//!   &[
//!     Candidate::new("x86_64/avx2", x86::AVX2, wide as fn(u32) -> u32),
//!     Candidate::new("portable", Caps::NONE, portable),
//!   ],
//! );
//! assert_eq!((chosen.func)(21), 42);
//! ```

// Fallibility discipline: deny unwrap/expect in production, allow in tests.
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::indexing_slicing))]
#![no_std]

#[cfg(feature = "std")]
extern crate std;

pub mod dispatch;
pub mod tier;

pub use dispatch::{Candidate, Selected, available, select, try_select};
// Re-export platform types for convenience.
pub use platform;
pub use tier::KernelTier;
