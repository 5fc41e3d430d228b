//! Region descriptor: head / aligned body / tail split of a buffer pair.
//!
//! ```text
//!   src ──┬── head ──┬──────── body (k · block) ────────┬── tail ──┐
//!         │ log-table│   bit-sliced / generated kernel  │log-table │
//!       src      src_start                           src_top    src+len
//! ```
//!
//! The body starts at the first `align` boundary of the source and spans
//! whole blocks. Head and tail go through the log-table path.

use crate::{config::Layout, method::Method};

/// Alignment parameters a backend imposes on a region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
  /// Source and destination addresses must agree modulo this.
  pub residue: usize,
  /// Boundary the body starts on, measured from the source.
  pub align: usize,
  /// Body length granularity.
  pub block: usize,
}

impl Geometry {
  #[must_use]
  pub const fn new(residue: usize, align: usize, block: usize) -> Self {
    assert!(residue.is_power_of_two() && align.is_power_of_two());
    assert!(block % 2 == 0 && block >= align);
    Self { residue, align, block }
  }

  /// Geometry of `method` under `layout`.
  ///
  /// Direct-layout kernels transpose through private buffers and accept any
  /// address pairing. The alternate layout is anchored to buffer addresses,
  /// so both buffers must sit at the same offset within a plane.
  #[must_use]
  pub const fn for_method(method: Method, layout: Layout) -> Self {
    if !method.is_bit_sliced() {
      return Self::new(1, 2, 2);
    }
    let residue = match layout {
      Layout::Direct => 1,
      Layout::AltMap => method.alignment(),
    };
    Self::new(residue, method.alignment(), method.block_bytes())
  }
}

/// Byte lengths of the three parts of a region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Split {
  pub head: usize,
  pub body: usize,
  pub tail: usize,
}

impl Split {
  /// Split a region of `len` bytes at source address `src_addr`.
  ///
  /// # Panics
  ///
  /// Panics if `len` is odd or the addresses disagree modulo `geometry.residue`.
  #[must_use]
  pub fn compute(src_addr: usize, dst_addr: usize, len: usize, geometry: Geometry) -> Self {
    assert!(len % 2 == 0, "region length {len} is not a multiple of 2");
    assert!(
      src_addr % geometry.residue == dst_addr % geometry.residue,
      "source {src_addr:#x} and destination {dst_addr:#x} differ in alignment modulo {}",
      geometry.residue
    );

    // An odd address never reaches an even boundary on an element edge.
    let head = if src_addr % 2 != 0 {
      len
    } else {
      ((geometry.align - src_addr % geometry.align) % geometry.align).min(len)
    };
    let body = (len - head) / geometry.block * geometry.block;
    Self {
      head,
      body,
      tail: len - head - body,
    }
  }

  /// Offset of the first tail byte.
  #[inline]
  #[must_use]
  pub const fn body_end(&self) -> usize {
    self.head + self.body
  }
}

/// One region call: operands plus the aligned-body boundaries.
#[derive(Clone, Copy, Debug)]
pub struct RegionDescriptor {
  pub src: *const u8,
  pub dst: *mut u8,
  pub len: usize,
  pub value: u16,
  pub accumulate: bool,
  pub split: Split,
}

impl RegionDescriptor {
  /// Describe a region call.
  ///
  /// # Panics
  ///
  /// Panics on the preconditions of [`Split::compute`].
  #[must_use]
  pub fn describe(
    src: *const u8,
    dst: *mut u8,
    len: usize,
    value: u16,
    accumulate: bool,
    geometry: Geometry,
  ) -> Self {
    Self {
      src,
      dst,
      len,
      value,
      accumulate,
      split: Split::compute(src as usize, dst as usize, len, geometry),
    }
  }

  #[inline]
  #[must_use]
  pub fn src_start(&self) -> *const u8 {
    self.src.wrapping_add(self.split.head)
  }

  #[inline]
  #[must_use]
  pub fn src_top(&self) -> *const u8 {
    self.src.wrapping_add(self.split.body_end())
  }

  #[inline]
  #[must_use]
  pub fn dst_start(&self) -> *mut u8 {
    self.dst.wrapping_add(self.split.head)
  }

  #[inline]
  #[must_use]
  pub fn dst_top(&self) -> *mut u8 {
    self.dst.wrapping_add(self.split.body_end())
  }

  /// Whether the destination body also starts on an `align` boundary.
  #[inline]
  #[must_use]
  pub fn operands_aligned(&self, align: usize) -> bool {
    (self.dst_start() as usize) % align == 0 && (self.src_start() as usize) % align == 0
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const SSE: Geometry = Geometry::new(1, 16, 256);
  const ALT: Geometry = Geometry::new(16, 16, 256);

  #[test]
  fn aligned_region_is_all_body() {
    let s = Split::compute(0x1000, 0x2000, 1024, SSE);
    assert_eq!(s, Split { head: 0, body: 1024, tail: 0 });
  }

  #[test]
  fn head_reaches_next_boundary() {
    let s = Split::compute(0x1006, 0x2006, 1024, SSE);
    assert_eq!(s.head, 10);
    assert_eq!(s.body, 768);
    assert_eq!(s.tail, 1024 - 10 - 768);
    assert_eq!(s.body_end(), 778);
  }

  #[test]
  fn short_region_is_all_head() {
    let s = Split::compute(0x1002, 0x1002, 8, SSE);
    assert_eq!(s, Split { head: 8, body: 0, tail: 0 });
    let s = Split::compute(0x1000, 0x1000, 254, SSE);
    assert_eq!(s, Split { head: 0, body: 0, tail: 254 });
  }

  #[test]
  fn empty_region() {
    assert_eq!(Split::compute(0x1003, 0x2000, 0, SSE), Split { head: 0, body: 0, tail: 0 });
  }

  #[test]
  fn odd_address_skips_body() {
    let s = Split::compute(0x1001, 0x2000, 4096, SSE);
    assert_eq!(s, Split { head: 4096, body: 0, tail: 0 });
  }

  #[test]
  fn direct_geometry_accepts_mismatched_pairs() {
    let s = Split::compute(0x1000, 0x2004, 512, SSE);
    assert_eq!(s.body, 512);
  }

  #[test]
  #[should_panic(expected = "differ in alignment modulo 16")]
  fn altmap_rejects_mismatched_pairs() {
    let _ = Split::compute(0x1000, 0x2004, 512, ALT);
  }

  #[test]
  #[should_panic(expected = "not a multiple of 2")]
  fn odd_length_panics() {
    let _ = Split::compute(0x1000, 0x1000, 7, SSE);
  }

  #[test]
  fn geometry_per_method() {
    assert_eq!(
      Geometry::for_method(Method::XorJitAvx2, Layout::AltMap),
      Geometry::new(32, 32, 512)
    );
    assert_eq!(
      Geometry::for_method(Method::XorJitAvx512, Layout::Direct),
      Geometry::new(1, 64, 1024)
    );
    assert_eq!(Geometry::for_method(Method::XorSse2, Layout::Direct), SSE);
    assert_eq!(Geometry::for_method(Method::LogTable, Layout::Direct).block, 2);
  }

  #[test]
  fn descriptor_pointers() {
    let mut buf = [0u16; 32];
    let p = buf.as_mut_ptr().cast::<u8>();
    let g = Geometry::new(1, 2, 8);
    let d = RegionDescriptor::describe(p.wrapping_add(2), p.wrapping_add(2), 30, 7, true, g);
    assert_eq!(d.split.head, 0);
    assert_eq!(d.split.body, 24);
    assert_eq!(d.src_top() as usize - d.src_start() as usize, 24);
    assert_eq!(d.dst_top() as usize, p as usize + 26);
    assert!(d.operands_aligned(2));
    assert!(d.accumulate && d.value == 7);
  }
}
