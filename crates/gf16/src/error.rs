//! Error types for field construction and code generation.
//!
//! Only construction can fail. Per-call precondition violations (odd region
//! length, mismatched alignment residue, zero divisor) panic instead.

use core::fmt;

use crate::{
  config::{DivideType, MultType},
  method::Method,
};

/// Field construction failed.
///
/// Every variant is recoverable by choosing a different [`Config`](crate::Config).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
  /// Only 16-bit fields are implemented.
  UnsupportedWidth(u32),
  /// The requested multiplication strategy is not implemented.
  UnsupportedStrategy(MultType),
  /// The requested division strategy is not implemented.
  UnsupportedDivide(DivideType),
  /// The polynomial is wider than 17 bits or does not generate the full
  /// multiplicative group. Carries the normalized value.
  InvalidPolynomial(u32),
  /// The requested method cannot run on this host or target.
  MethodUnavailable(Method),
  /// The requested method cannot produce the alternate bit-plane layout.
  AltMapUnsupported(Method),
  /// Caller-provided scratch memory is too small.
  ScratchTooSmall { required: usize, provided: usize },
  /// Executable memory for generated code could not be prepared.
  CodeBuffer(JitError),
}

impl fmt::Display for ConfigError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::UnsupportedWidth(w) => write!(f, "unsupported field width {w} (only 16 is implemented)"),
      Self::UnsupportedStrategy(m) => write!(f, "unsupported multiplication strategy {m:?}"),
      Self::UnsupportedDivide(d) => write!(f, "unsupported division strategy {d:?}"),
      Self::InvalidPolynomial(p) => write!(f, "polynomial {p:#07x} is not primitive over GF(2^16)"),
      Self::MethodUnavailable(m) => write!(f, "region method {} is not available on this host", m.name()),
      Self::AltMapUnsupported(m) => write!(f, "region method {} has no alternate layout", m.name()),
      Self::ScratchTooSmall { required, provided } => {
        write!(f, "scratch memory too small: {provided} bytes provided, {required} required")
      }
      Self::CodeBuffer(e) => write!(f, "code buffer: {e}"),
    }
  }
}

impl core::error::Error for ConfigError {
  fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
    match self {
      Self::CodeBuffer(e) => Some(e),
      _ => None,
    }
  }
}

impl From<JitError> for ConfigError {
  #[inline]
  fn from(e: JitError) -> Self {
    Self::CodeBuffer(e)
  }
}

/// Generated-code buffer failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum JitError {
  /// The OS refused to map memory. Carries `errno` (`GetLastError` on Windows).
  Map(i32),
  /// The OS refused a protection change. Carries `errno` (`GetLastError` on Windows).
  Protect(i32),
  /// The routine does not fit in the buffer.
  Overflow { needed: usize, capacity: usize },
  /// Run-time code generation is not supported on this target.
  Unsupported,
}

impl fmt::Display for JitError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Map(code) => write!(f, "mapping executable memory failed (os error {code})"),
      Self::Protect(code) => write!(f, "changing page protection failed (os error {code})"),
      Self::Overflow { needed, capacity } => {
        write!(f, "generated routine needs {needed} bytes, buffer holds {capacity}")
      }
      Self::Unsupported => f.write_str("run-time code generation is not supported on this target"),
    }
  }
}

impl core::error::Error for JitError {}
