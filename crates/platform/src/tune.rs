//! Host tuning hints.
//!
//! `Tune` answers: "What should I *prefer* on this machine?"
//!
//! Unlike [`Caps`](crate::Caps), nothing in `Tune` is ever required for
//! correctness. Kernels may read these values to size working sets, but
//! never to decide whether an instruction is legal.

// ─────────────────────────────────────────────────────────────────────────────
// TuneKind: Identity discriminant for O(1) name lookup
// ─────────────────────────────────────────────────────────────────────────────

/// Identifies which tuning preset is in use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TuneKind {
  Custom = 0,
  Default,
  Portable,
  /// Several logical processors share each physical core.
  SharedCore,
}

impl TuneKind {
  /// Returns the human-readable name for this tuning preset.
  #[must_use]
  pub const fn name(self) -> &'static str {
    match self {
      Self::Custom => "Custom",
      Self::Default => "Default",
      Self::Portable => "Portable",
      Self::SharedCore => "Shared core",
    }
  }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tune
// ─────────────────────────────────────────────────────────────────────────────

/// Host tuning hints.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tune {
  pub(crate) kind: TuneKind,
  /// Coarse "many virtual threads per core" hint.
  ///
  /// Derived from CPUID leaf 1 (HTT flag and logical processor count). It is
  /// a heuristic: multi-core parts without SMT may also report it.
  pub smt: bool,
  /// Preferred number of bytes a region kernel stages per pass.
  ///
  /// Sibling hyperthreads share L1/L2, so shared-core hosts get a smaller
  /// working set.
  pub region_chunk: usize,
}

impl Default for Tune {
  fn default() -> Self {
    Self::DEFAULT
  }
}

impl Tune {
  pub const DEFAULT: Self = Self {
    kind: TuneKind::Default,
    smt: false,
    region_chunk: 16 * 1024,
  };

  /// Hosts whose cores each run several logical processors.
  pub const SHARED_CORE: Self = Self {
    kind: TuneKind::SharedCore,
    smt: true,
    region_chunk: 8 * 1024,
  };

  /// Conservative preset used when detection is unavailable (Miri, unknown arch).
  pub const PORTABLE: Self = Self {
    kind: TuneKind::Portable,
    smt: false,
    region_chunk: 4 * 1024,
  };

  #[inline]
  #[must_use]
  pub const fn kind(&self) -> TuneKind {
    self.kind
  }

  #[inline]
  #[must_use]
  pub const fn name(&self) -> &'static str {
    self.kind.name()
  }

  /// Create a custom tuning configuration.
  ///
  /// A zero `region_chunk` is raised to one byte; consumers round it up to
  /// their own block size.
  #[must_use]
  pub const fn custom(smt: bool, region_chunk: usize) -> Self {
    Self {
      kind: TuneKind::Custom,
      smt,
      region_chunk: if region_chunk == 0 { 1 } else { region_chunk },
    }
  }

  /// Pick the preset matching an SMT observation.
  #[inline]
  #[must_use]
  pub const fn for_smt(smt: bool) -> Self {
    if smt { Self::SHARED_CORE } else { Self::DEFAULT }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn presets_have_distinct_kinds() {
    assert_eq!(Tune::DEFAULT.kind(), TuneKind::Default);
    assert_eq!(Tune::PORTABLE.kind(), TuneKind::Portable);
    assert_eq!(Tune::SHARED_CORE.kind(), TuneKind::SharedCore);
    assert_eq!(Tune::default(), Tune::DEFAULT);
  }

  #[test]
  fn shared_core_stages_less() {
    assert!(Tune::SHARED_CORE.region_chunk < Tune::DEFAULT.region_chunk);
    assert_eq!(Tune::for_smt(true), Tune::SHARED_CORE);
    assert_eq!(Tune::for_smt(false), Tune::DEFAULT);
  }

  #[test]
  fn custom_never_has_zero_chunk() {
    let t = Tune::custom(true, 0);
    assert_eq!(t.kind(), TuneKind::Custom);
    assert_eq!(t.region_chunk, 1);
    assert_eq!(t.name(), "Custom");
  }
}
