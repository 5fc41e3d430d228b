//! The field handle.

#![allow(unsafe_code)]

use std::sync::Arc;

use tracing::debug;

use crate::{
  bitslice::{self, PlaneKernels},
  config::{Config, DivideType, Layout},
  dispatch::{self, RegionBackend},
  error::ConfigError,
  layout::{self, Direction},
  method::Method,
  region::{Geometry, Split},
  tables::{self, LogTables},
};

/// A GF(2^16) field with one region backend bound at construction.
///
/// Scalar operations take `&self`. Region operations take `&mut self`: the
/// generated backend rewrites its code buffer and staging memory per call,
/// so one handle serves one thread at a time. Use a handle per thread for
/// parallel work.
///
/// ```
/// let mut gf = gf16::Gf16::new();
///
/// let src: Vec<u8> = (0u16..64).flat_map(u16::to_le_bytes).collect();
/// let mut dst = vec![0u8; src.len()];
/// gf.multiply_region(&src, &mut dst, 3, false);
///
/// let mut back = vec![0u8; src.len()];
/// gf.multiply_region(&dst, &mut back, gf.inverse(3), false);
/// assert_eq!(back, src);
/// ```
#[derive(Debug)]
pub struct Gf16 {
  tables: Arc<LogTables>,
  backend: Box<dyn RegionBackend>,
  method: Method,
  layout: Layout,
  divide: DivideType,
  geometry: Geometry,
  kernels: PlaneKernels,
}

impl Default for Gf16 {
  fn default() -> Self {
    Self::new()
  }
}

impl Gf16 {
  /// Field with the default polynomial, layout, and best available method.
  #[must_use]
  pub fn new() -> Self {
    match Self::with_config(Config::new()) {
      Ok(gf) => gf,
      // The default configuration always ends in an infallible backend.
      Err(err) => unreachable!("default field configuration failed: {err}"),
    }
  }

  /// Field built from `config`.
  pub fn with_config(mut config: Config) -> Result<Self, ConfigError> {
    config.validate()?;
    let tables = LogTables::for_polynomial(config.polynomial)?;
    let (caps, tune) = platform::get();
    let backend = dispatch::bind(&mut config, caps, tune)?;

    let method = backend.method();
    let geometry = Geometry::for_method(method, config.layout);
    debug!(
      method = method.name(),
      layout = config.layout.name(),
      alignment = method.alignment(),
      block = geometry.block,
      polynomial = tables.polynomial(),
      "gf16 field bound"
    );

    Ok(Self {
      tables,
      backend,
      method,
      layout: config.layout,
      divide: config.divide,
      geometry,
      kernels: bitslice::best_kernels(caps).func,
    })
  }

  /// Scratch bytes [`Config::scratch`] must provide for `config`.
  ///
  /// Zero when the chosen method stages nothing.
  pub fn scratch_size(config: &Config) -> Result<usize, ConfigError> {
    config.validate()?;
    tables::normalize_polynomial(config.polynomial)?;
    let (caps, tune) = platform::get();
    let (methods, _) = dispatch::plan(config, caps)?;
    Ok(methods.first().map_or(0, |m| dispatch::scratch_for(*m, config, tune)))
  }

  // ───────────────────────────────────────────────────────────────────────────
  // Scalar arithmetic
  // ───────────────────────────────────────────────────────────────────────────

  #[inline]
  #[must_use]
  pub fn multiply(&self, a: u16, b: u16) -> u16 {
    self.tables.multiply(a, b)
  }

  /// `a / b`.
  ///
  /// # Panics
  ///
  /// Panics if `b == 0`.
  #[inline]
  #[must_use]
  pub fn divide(&self, a: u16, b: u16) -> u16 {
    match self.divide {
      DivideType::Euclid => self.tables.multiply(a, tables::inverse_euclid(b, self.tables.polynomial())),
      _ => self.tables.divide(a, b),
    }
  }

  /// # Panics
  ///
  /// Panics if `a == 0`.
  #[inline]
  #[must_use]
  pub fn inverse(&self, a: u16) -> u16 {
    match self.divide {
      DivideType::Euclid => tables::inverse_euclid(a, self.tables.polynomial()),
      _ => self.tables.inverse(a),
    }
  }

  // ───────────────────────────────────────────────────────────────────────────
  // Region operations
  // ───────────────────────────────────────────────────────────────────────────

  /// Check the region preconditions for a pair of addresses.
  #[inline]
  fn check(&self, src: usize, dst: usize, len: usize) {
    let _ = Split::compute(src, dst, len, self.geometry);
  }

  /// `dst = src * value`, or `dst ^= src * value` when `accumulate` is set.
  ///
  /// # Panics
  ///
  /// Panics if the lengths differ or are odd, or, for the alternate layout,
  /// if `src` and `dst` sit at different offsets modulo [`Self::alignment`].
  pub fn multiply_region(&mut self, src: &[u8], dst: &mut [u8], value: u16, accumulate: bool) {
    assert_eq!(src.len(), dst.len(), "source and destination lengths differ");
    let len = src.len();
    self.check(src.as_ptr() as usize, dst.as_ptr() as usize, len);

    let (src, dst) = (src.as_ptr(), dst.as_mut_ptr());
    // SAFETY: Both slices cover `len` bytes and borrow rules keep them
    // disjoint; length and residue were checked above.
    unsafe {
      if !dispatch::trivial(src, dst, len, value, accumulate) {
        self.backend.multiply_region(&self.tables, src, dst, len, value, accumulate);
      }
    }
  }

  /// `buf = buf * value`, or `buf ^= buf * value` when `accumulate` is set.
  ///
  /// # Panics
  ///
  /// Panics if `buf.len()` is odd.
  pub fn multiply_region_in_place(&mut self, buf: &mut [u8], value: u16, accumulate: bool) {
    let len = buf.len();
    let ptr = buf.as_mut_ptr();
    self.check(ptr as usize, ptr as usize, len);

    // SAFETY: Source and destination are the same `len`-byte range, which
    // every backend supports.
    unsafe {
      if !dispatch::trivial(ptr, ptr, len, value, accumulate) {
        self.backend.multiply_region(&self.tables, ptr, ptr, len, value, accumulate);
      }
    }
  }

  /// `dst (^)= srcs[0] * values[0] ^ srcs[1] * values[1] ^ ...`.
  ///
  /// With no sources, a non-accumulating call zeroes `dst`.
  ///
  /// # Panics
  ///
  /// Panics if `srcs` and `values` differ in length, or on any condition
  /// [`Self::multiply_region`] rejects.
  pub fn multiply_region_multi(&mut self, srcs: &[&[u8]], values: &[u16], dst: &mut [u8], accumulate: bool) {
    assert_eq!(srcs.len(), values.len(), "one multiplier per source required");
    if srcs.is_empty() && !accumulate {
      dst.fill(0);
    }
    for (i, (src, &value)) in srcs.iter().zip(values).enumerate() {
      self.multiply_region(src, dst, value, accumulate || i > 0);
    }
  }

  // ───────────────────────────────────────────────────────────────────────────
  // Layout
  // ───────────────────────────────────────────────────────────────────────────

  /// Element `index` of a buffer in this handle's layout.
  ///
  /// # Panics
  ///
  /// Panics if the element lies outside `buf` or `buf.len()` is odd.
  #[must_use]
  pub fn extract_word(&self, buf: &[u8], index: usize) -> u16 {
    layout::extract_word(buf, index, self.method, self.layout)
  }

  /// Convert direct-layout `src` into this handle's layout in `dst`.
  ///
  /// A direct-layout handle copies.
  ///
  /// # Panics
  ///
  /// Panics if the lengths differ or are odd, or if `src` and `dst` sit at
  /// different offsets modulo [`Self::alignment`].
  pub fn to_altmap(&self, src: &[u8], dst: &mut [u8]) {
    self.convert(src, dst, Direction::ToAltMap);
  }

  /// Convert `src`, in this handle's layout, to direct layout in `dst`.
  ///
  /// # Panics
  ///
  /// As for [`Self::to_altmap`].
  pub fn from_altmap(&self, src: &[u8], dst: &mut [u8]) {
    self.convert(src, dst, Direction::FromAltMap);
  }

  /// In-place form of [`Self::to_altmap`].
  ///
  /// # Panics
  ///
  /// Panics if `buf.len()` is odd.
  pub fn to_altmap_in_place(&self, buf: &mut [u8]) {
    self.convert_in_place(buf, Direction::ToAltMap);
  }

  /// In-place form of [`Self::from_altmap`].
  ///
  /// # Panics
  ///
  /// Panics if `buf.len()` is odd.
  pub fn from_altmap_in_place(&self, buf: &mut [u8]) {
    self.convert_in_place(buf, Direction::FromAltMap);
  }

  fn convert(&self, src: &[u8], dst: &mut [u8], direction: Direction) {
    if self.layout == Layout::AltMap {
      layout::convert(src, dst, self.method, self.kernels, direction);
    } else {
      assert_eq!(src.len(), dst.len(), "source and destination lengths differ");
      self.check(src.as_ptr() as usize, dst.as_ptr() as usize, src.len());
      dst.copy_from_slice(src);
    }
  }

  fn convert_in_place(&self, buf: &mut [u8], direction: Direction) {
    if self.layout == Layout::AltMap {
      layout::convert_in_place(buf, self.method, self.kernels, direction);
    } else {
      self.check(buf.as_ptr() as usize, buf.as_ptr() as usize, buf.len());
    }
  }

  // ───────────────────────────────────────────────────────────────────────────
  // Introspection
  // ───────────────────────────────────────────────────────────────────────────

  /// Region method bound at construction.
  #[inline]
  #[must_use]
  pub fn method(&self) -> Method {
    self.method
  }

  #[inline]
  #[must_use]
  pub fn layout(&self) -> Layout {
    self.layout
  }

  /// Address residue `src` and `dst` must share for region calls.
  ///
  /// `1` for direct-layout handles, which accept any even-length pair.
  #[inline]
  #[must_use]
  pub fn alignment(&self) -> usize {
    self.geometry.residue
  }

  /// Bytes the bound method processes per block.
  #[inline]
  #[must_use]
  pub fn block_bytes(&self) -> usize {
    self.geometry.block
  }

  /// The full 17-bit primitive polynomial.
  #[inline]
  #[must_use]
  pub fn polynomial(&self) -> u32 {
    self.tables.polynomial()
  }
}
