//! Field configuration: the programmatic builder plus environment overrides.
//!
//! Precedence for the region method:
//!
//! 1. [`Config::method`] set explicitly
//! 2. `GF16_FORCE` from the environment
//! 3. automatic selection from detected capabilities
//!
//! Safety note: forced methods are always clamped to detected CPU
//! capabilities and to the requested strategy/layout. An unusable force
//! silently falls back to automatic selection.

use platform::{Caps, Tune};

use crate::{error::ConfigError, method::Method};

// ─────────────────────────────────────────────────────────────────────────────
// Strategy enums
// ─────────────────────────────────────────────────────────────────────────────

/// Multiplication strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MultType {
  /// Best available method.
  #[default]
  Default,
  /// Bit-dependency XOR methods only (bit-sliced or generated).
  XorDepends,
  /// Split lookup tables. Not implemented.
  SplitTable,
  /// Affine (GFNI) transforms. Not implemented.
  Affine,
}

/// Division strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DivideType {
  /// Log/antilog tables.
  #[default]
  Default,
  /// Extended Euclidean algorithm over GF(2)[x].
  Euclid,
  /// Matrix inversion. Not implemented.
  Matrix,
}

/// Physical layout of region buffers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Layout {
  /// Little-endian 16-bit elements, one after another.
  #[default]
  Direct,
  /// Aligned body stored as bit planes; see [`crate::layout`].
  AltMap,
}

impl Layout {
  #[inline]
  #[must_use]
  pub const fn name(self) -> &'static str {
    match self {
      Self::Direct => "direct",
      Self::AltMap => "altmap",
    }
  }
}

// ─────────────────────────────────────────────────────────────────────────────
// Config builder
// ─────────────────────────────────────────────────────────────────────────────

/// Field construction parameters.
///
/// ```
/// use gf16::{Config, Layout, MultType};
///
/// let config = Config::new().mult(MultType::XorDepends).layout(Layout::AltMap);
/// let gf = gf16::Gf16::with_config(config).unwrap();
/// assert!(gf.method().is_bit_sliced());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
  pub(crate) width: u32,
  pub(crate) mult: MultType,
  pub(crate) layout: Layout,
  pub(crate) divide: DivideType,
  pub(crate) polynomial: u32,
  pub(crate) method: Option<Method>,
  pub(crate) scratch: Option<Vec<u8>>,
  pub(crate) size_hint: Option<usize>,
  pub(crate) thread_hint: Option<usize>,
  pub(crate) cse: Option<bool>,
}

impl Default for Config {
  fn default() -> Self {
    Self::new()
  }
}

impl Config {
  #[must_use]
  pub const fn new() -> Self {
    Self {
      width: 16,
      mult: MultType::Default,
      layout: Layout::Direct,
      divide: DivideType::Default,
      polynomial: 0,
      method: None,
      scratch: None,
      size_hint: None,
      thread_hint: None,
      cse: None,
    }
  }

  /// Field width in bits. Only 16 is accepted.
  #[must_use]
  pub fn width(mut self, width: u32) -> Self {
    self.width = width;
    self
  }

  #[must_use]
  pub fn mult(mut self, mult: MultType) -> Self {
    self.mult = mult;
    self
  }

  #[must_use]
  pub fn layout(mut self, layout: Layout) -> Self {
    self.layout = layout;
    self
  }

  #[must_use]
  pub fn divide(mut self, divide: DivideType) -> Self {
    self.divide = divide;
    self
  }

  /// Primitive polynomial; `0` selects `0x1100B`. The `x^16` bit is optional.
  #[must_use]
  pub fn polynomial(mut self, poly: u32) -> Self {
    self.polynomial = poly;
    self
  }

  /// Pin the region method instead of selecting one.
  #[must_use]
  pub fn method(mut self, method: Method) -> Self {
    self.method = Some(method);
    self
  }

  /// Caller-owned scratch memory for staging. Must hold at least
  /// [`Gf16::scratch_size`](crate::Gf16::scratch_size) bytes.
  #[must_use]
  pub fn scratch(mut self, scratch: Vec<u8>) -> Self {
    self.scratch = Some(scratch);
    self
  }

  /// Typical region length. Caps the staging buffer.
  #[must_use]
  pub fn size_hint(mut self, bytes: usize) -> Self {
    self.size_hint = Some(bytes);
    self
  }

  /// Number of threads expected to share each core's cache.
  #[must_use]
  pub fn thread_hint(mut self, threads: usize) -> Self {
    self.thread_hint = Some(threads);
    self
  }

  /// Enable or disable common-subexpression elimination in generated code.
  #[must_use]
  pub fn cse(mut self, enabled: bool) -> Self {
    self.cse = Some(enabled);
    self
  }

  /// Reject strategies this crate does not implement.
  pub(crate) fn validate(&self) -> Result<(), ConfigError> {
    if self.width != 16 {
      return Err(ConfigError::UnsupportedWidth(self.width));
    }
    if matches!(self.mult, MultType::SplitTable | MultType::Affine) {
      return Err(ConfigError::UnsupportedStrategy(self.mult));
    }
    if self.divide == DivideType::Matrix {
      return Err(ConfigError::UnsupportedDivide(self.divide));
    }
    Ok(())
  }

  /// Whether `method` can serve the requested strategy and layout.
  pub(crate) fn check_method(&self, method: Method) -> Result<(), ConfigError> {
    if method.is_bit_sliced() {
      return Ok(());
    }
    if self.layout == Layout::AltMap {
      return Err(ConfigError::AltMapUnsupported(method));
    }
    if self.mult == MultType::XorDepends {
      return Err(ConfigError::UnsupportedStrategy(self.mult));
    }
    Ok(())
  }

  /// Whether common-subexpression elimination applies, after the environment.
  pub(crate) fn effective_cse(&self) -> bool {
    self.cse.unwrap_or(env().cse)
  }

  /// Bytes of staging a generated method needs for a direct-layout handle.
  ///
  /// Starts from the host's preferred chunk, shrinks for shared caches and
  /// short regions, and is always a whole number of blocks.
  pub(crate) fn staging_bytes(&self, method: Method, tune: Tune) -> usize {
    if !method.is_generated() || self.layout == Layout::AltMap {
      return 0;
    }
    let block = method.block_bytes();
    let mut chunk = tune.region_chunk;
    if let Some(threads) = self.thread_hint
      && threads > 1
    {
      chunk /= threads;
    }
    if let Some(size) = self.size_hint {
      chunk = chunk.min(size);
    }
    chunk.max(block).div_ceil(block) * block
  }
}

/// Alignment of a staging window inside scratch memory.
pub(crate) const STAGING_ALIGN: usize = 64;

/// Scratch bytes holding an aligned staging window of `staging` bytes.
#[inline]
pub(crate) const fn scratch_bytes(staging: usize) -> usize {
  if staging == 0 { 0 } else { staging + STAGING_ALIGN }
}

// ─────────────────────────────────────────────────────────────────────────────
// Environment overrides
// ─────────────────────────────────────────────────────────────────────────────

/// Forced method family from `GF16_FORCE`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ForceMethod {
  /// Use the default auto selector.
  #[default]
  Auto,
  /// Force log/antilog tables.
  LogTable,
  /// Best interpreted bit-sliced method.
  Xor,
  XorPortable,
  XorSse2,
  /// Best generated method.
  Jit,
  JitSse2,
  JitAvx2,
  JitAvx512,
}

impl ForceMethod {
  #[must_use]
  pub const fn as_str(self) -> &'static str {
    match self {
      Self::Auto => "auto",
      Self::LogTable => "log",
      Self::Xor => "xor",
      Self::XorPortable => "xor-portable",
      Self::XorSse2 => "xor-sse2",
      Self::Jit => "jit",
      Self::JitSse2 => "jit-sse2",
      Self::JitAvx2 => "jit-avx2",
      Self::JitAvx512 => "jit-avx512",
    }
  }

  /// Methods satisfying this force, best first.
  #[must_use]
  pub const fn methods(self) -> &'static [Method] {
    match self {
      Self::Auto => &[],
      Self::LogTable => &[Method::LogTable],
      Self::Xor => &[Method::XorSse2, Method::XorPortable],
      Self::XorPortable => &[Method::XorPortable],
      Self::XorSse2 => &[Method::XorSse2],
      Self::Jit => &[Method::XorJitAvx512, Method::XorJitAvx2, Method::XorJitSse2],
      Self::JitSse2 => &[Method::XorJitSse2],
      Self::JitAvx2 => &[Method::XorJitAvx2],
      Self::JitAvx512 => &[Method::XorJitAvx512],
    }
  }

  /// Parse a `GF16_FORCE` value. Case-insensitive; surrounding whitespace ignored.
  #[must_use]
  pub fn parse(value: &str) -> Option<Self> {
    let value = value.trim();
    const NAMES: [ForceMethod; 9] = [
      ForceMethod::Auto,
      ForceMethod::LogTable,
      ForceMethod::Xor,
      ForceMethod::XorPortable,
      ForceMethod::XorSse2,
      ForceMethod::Jit,
      ForceMethod::JitSse2,
      ForceMethod::JitAvx2,
      ForceMethod::JitAvx512,
    ];
    if let Some(force) = NAMES.into_iter().find(|f| value.eq_ignore_ascii_case(f.as_str())) {
      return Some(force);
    }
    if value.eq_ignore_ascii_case("log-table") || value.eq_ignore_ascii_case("table") {
      return Some(Self::LogTable);
    }
    if value.eq_ignore_ascii_case("portable") {
      return Some(Self::XorPortable);
    }
    None
  }
}

/// Process-wide settings read from the environment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnvConfig {
  /// `GF16_FORCE`, unclamped.
  pub force: ForceMethod,
  /// `GF16_JIT_CSE`; defaults to enabled.
  pub cse: bool,
}

impl Default for EnvConfig {
  fn default() -> Self {
    Self {
      force: ForceMethod::Auto,
      cse: true,
    }
  }
}

fn parse_bool(value: &str) -> Option<bool> {
  let value = value.trim();
  if ["1", "on", "true", "yes"].iter().any(|v| value.eq_ignore_ascii_case(v)) {
    return Some(true);
  }
  if ["0", "off", "false", "no"].iter().any(|v| value.eq_ignore_ascii_case(v)) {
    return Some(false);
  }
  None
}

#[cfg(not(miri))]
fn read_env() -> EnvConfig {
  fn var(name: &str) -> Option<String> {
    let value = std::env::var(name).ok()?;
    if value.trim().is_empty() { None } else { Some(value) }
  }

  let defaults = EnvConfig::default();
  EnvConfig {
    force: var("GF16_FORCE")
      .and_then(|v| ForceMethod::parse(&v))
      .unwrap_or(defaults.force),
    cse: var("GF16_JIT_CSE").and_then(|v| parse_bool(&v)).unwrap_or(defaults.cse),
  }
}

/// Environment settings, read once per process.
///
/// Under Miri the environment is ignored.
#[must_use]
pub fn env() -> EnvConfig {
  #[cfg(not(miri))]
  {
    use std::sync::OnceLock;
    static ENV: OnceLock<EnvConfig> = OnceLock::new();
    *ENV.get_or_init(read_env)
  }

  #[cfg(miri)]
  {
    EnvConfig::default()
  }
}

/// Resolve a forced family to one runnable method the config accepts.
///
/// `None` means "select automatically".
#[must_use]
pub(crate) fn clamp_force(requested: ForceMethod, caps: Caps, config: &Config) -> Option<Method> {
  requested
    .methods()
    .iter()
    .copied()
    .find(|m| m.runs_on(caps) && config.check_method(*m).is_ok())
}
