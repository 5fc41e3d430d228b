//! GF(2^16) arithmetic with fast region multiplication.
//!
//! The field multiplies and divides 16-bit elements modulo a primitive
//! polynomial (default `x^16 + x^12 + x^3 + x + 1`). Its workhorse is the
//! region operation
//!
//! ```text
//! dst[i] = src[i] * value        (overwrite)
//! dst[i] ^= src[i] * value       (accumulate)
//! ```
//!
//! over every little-endian 16-bit element of a byte buffer, the core step of
//! Reed-Solomon style erasure coding.
//!
//! # Region methods
//!
//! | [`Method`] | Technique | Requires |
//! |------------|-----------|----------|
//! | `LogTable` | `antilog[log(e) + log(v)]` per element | nothing |
//! | `XorPortable` | bit-sliced, 64-bit words | nothing |
//! | `XorSse2` | bit-sliced, 128-bit vectors | SSE2 |
//! | `XorJitSse2` | generated code per multiplier, 128-bit | SSE2, x86_64 Unix or Windows |
//! | `XorJitAvx2` | generated code per multiplier, 256-bit | AVX2, x86_64 Unix or Windows |
//! | `XorJitAvx512` | generated code per multiplier, 512-bit | AVX-512F, x86_64 Unix or Windows |
//!
//! A [`Gf16`] handle binds one method at construction from its [`Config`],
//! the `GF16_FORCE` environment variable, and the detected CPU. Every method
//! produces bit-identical results.
//!
//! # Example
//!
//! ```
//! use gf16::{Config, Gf16, Layout, MultType};
//!
//! let mut gf = Gf16::new();
//! let src = [0x01u8, 0x00, 0x02, 0x00];
//! let mut dst = [0u8; 4];
//! gf.multiply_region(&src, &mut dst, 0x8000, false);
//! assert_eq!(gf.extract_word(&dst, 1), gf.multiply(2, 0x8000));
//!
//! // Bit-plane storage for repeated coding passes.
//! let alt = Gf16::with_config(Config::new().mult(MultType::XorDepends).layout(Layout::AltMap))?;
//! assert!(alt.block_bytes() >= 256);
//! # Ok::<(), gf16::ConfigError>(())
//! ```
//!
//! # Preconditions
//!
//! Region calls panic on odd lengths, on mismatched source and destination
//! lengths, and, for [`Layout::AltMap`], on buffer pairs at different
//! offsets modulo [`Gf16::alignment`]. Construction problems are reported as
//! [`ConfigError`].

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::indexing_slicing))]

// ─────────────────────────────────────────────────────────────────────────────
// Modules
// ─────────────────────────────────────────────────────────────────────────────

mod bitslice;
mod config;
mod depends;
mod dispatch;
mod error;
mod field;
#[cfg(all(target_arch = "x86_64", any(unix, windows), not(miri)))]
mod jit;
pub mod layout;
pub mod log_table;
mod method;
pub mod region;
pub mod tables;

#[cfg(all(test, not(miri)))]
mod proptests;

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

pub use config::{Config, DivideType, EnvConfig, ForceMethod, Layout, MultType, env};
pub use depends::DependencyTable;
pub use error::{ConfigError, JitError};
pub use field::Gf16;
pub use method::Method;
pub use tables::{DEFAULT_POLYNOMIAL, LogTables};
