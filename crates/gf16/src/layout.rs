//! Alternate (bit-plane) layout.
//!
//! For a method with plane width `w`, the aligned body of a buffer is a run
//! of blocks of `16 * w` bytes. Inside a block, plane `b` holds bit `b` of
//! every element:
//!
//! ```text
//!   byte  0 .. w       bit 0 of elements 0 .. 8w
//!   byte  w .. 2w      bit 1
//!   ...
//!   byte 15w .. 16w    bit 15
//! ```
//!
//! Bit `b` of element `j` is bit `j % 8` of byte `b * w + j / 8`. Head and
//! tail bytes, as computed by the region descriptor from the buffer's own
//! address, stay little-endian. A buffer must therefore be read at the same
//! address residue modulo `w` it was written at.

// SAFETY: Offsets are derived from a region split of `buf.len()` bytes and
// stay below `body_end`; element reads are bounds-checked by the caller's
// index assertion.
#![allow(clippy::indexing_slicing)]

use crate::{
  bitslice::{PlaneBuf, PlaneKernels},
  config::Layout,
  method::Method,
  region::{Geometry, Split},
};

#[inline]
fn read_le(buf: &[u8], offset: usize) -> u16 {
  u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

/// Element `index` of `buf`, stored under `layout` for `method`.
///
/// # Panics
///
/// Panics if the element lies outside `buf` or `buf.len()` is odd.
#[must_use]
pub fn extract_word(buf: &[u8], index: usize, method: Method, layout: Layout) -> u16 {
  let offset = index
    .checked_mul(2)
    .filter(|o| o.checked_add(2).is_some_and(|end| end <= buf.len()))
    .unwrap_or_else(|| panic!("element {index} out of range for a {}-byte buffer", buf.len()));

  if layout == Layout::Direct || !method.is_bit_sliced() {
    return read_le(buf, offset);
  }

  let geometry = Geometry::for_method(method, layout);
  let addr = buf.as_ptr() as usize;
  let split = Split::compute(addr, addr, buf.len(), geometry);
  if offset < split.head || offset >= split.body_end() {
    return read_le(buf, offset);
  }

  let w = method.lanes();
  let rel = offset - split.head;
  let base = split.head + rel / geometry.block * geometry.block;
  let j = (rel % geometry.block) / 2;
  let (byte, bit) = (j / 8, j % 8);
  (0..16).fold(0u16, |acc, b| acc | (u16::from((buf[base + b * w + byte] >> bit) & 1) << b))
}

/// Direction of a layout conversion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Direction {
  ToAltMap,
  FromAltMap,
}

/// Convert `src` into `dst` between direct and bit-plane layout.
///
/// # Panics
///
/// Panics if the lengths differ, the length is odd, or the buffers sit at
/// different offsets within a plane.
pub(crate) fn convert(src: &[u8], dst: &mut [u8], method: Method, kernels: PlaneKernels, direction: Direction) {
  assert_eq!(src.len(), dst.len(), "source and destination lengths differ");
  let geometry = Geometry::for_method(method, Layout::AltMap);
  let split = Split::compute(src.as_ptr() as usize, dst.as_ptr() as usize, src.len(), geometry);
  let (head, end) = (split.head, split.body_end());

  dst[..head].copy_from_slice(&src[..head]);
  dst[end..].copy_from_slice(&src[end..]);
  for (from, to) in src[head..end]
    .chunks_exact(geometry.block)
    .zip(dst[head..end].chunks_exact_mut(geometry.block))
  {
    match direction {
      Direction::ToAltMap => (kernels.transpose)(from, to),
      Direction::FromAltMap => (kernels.untranspose)(from, to, false),
    }
  }
}

/// In-place form of [`convert`].
pub(crate) fn convert_in_place(buf: &mut [u8], method: Method, kernels: PlaneKernels, direction: Direction) {
  let geometry = Geometry::for_method(method, Layout::AltMap);
  let addr = buf.as_ptr() as usize;
  let split = Split::compute(addr, addr, buf.len(), geometry);
  let block = geometry.block;
  let mut scratch = PlaneBuf::new();
  let scratch = &mut scratch.0[..block];

  for chunk in buf[split.head..split.body_end()].chunks_exact_mut(block) {
    scratch.copy_from_slice(chunk);
    match direction {
      Direction::ToAltMap => (kernels.transpose)(scratch, chunk),
      Direction::FromAltMap => (kernels.untranspose)(scratch, chunk, false),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::bitslice::portable;

  /// Buffer whose element `i` is `i * 0x0101 ^ 0x5A3C`, starting 64-byte aligned plus `skew`.
  fn elements(count: usize, skew: usize) -> (Vec<u8>, usize) {
    let mut v = vec![0u8; 2 * count + 64 + skew];
    let start = v.as_ptr().align_offset(64) + skew;
    for i in 0..count {
      let e = (i as u16).wrapping_mul(0x0101) ^ 0x5A3C;
      v[start + 2 * i..start + 2 * i + 2].copy_from_slice(&e.to_le_bytes());
    }
    (v, start)
  }

  #[test]
  fn direct_extract_is_little_endian() {
    let buf = [0x34u8, 0x12, 0xCD, 0xAB];
    assert_eq!(extract_word(&buf, 0, Method::LogTable, Layout::Direct), 0x1234);
    assert_eq!(extract_word(&buf, 1, Method::XorSse2, Layout::Direct), 0xABCD);
  }

  #[test]
  #[should_panic(expected = "out of range")]
  fn extract_out_of_range_panics() {
    let _ = extract_word(&[0u8; 4], 2, Method::XorPortable, Layout::AltMap);
  }

  #[test]
  #[should_panic(expected = "out of range")]
  fn extract_at_end_of_address_space_panics() {
    // 2 * index is usize::MAX - 1; the element end does not fit in usize.
    let _ = extract_word(&[0u8; 4], usize::MAX / 2, Method::LogTable, Layout::Direct);
  }

  #[test]
  fn altmap_round_trip_and_extract() {
    for method in [Method::XorPortable, Method::XorJitAvx2, Method::XorJitAvx512] {
      for skew in [0usize, 6, 20] {
        let count = 700;
        let (direct, s0) = elements(count, skew);
        let direct = &direct[s0..s0 + 2 * count];
        let (mut alt, a0) = elements(count, skew);
        let alt = &mut alt[a0..a0 + 2 * count];

        convert(direct, alt, method, portable::KERNELS, Direction::ToAltMap);
        for i in 0..count {
          assert_eq!(
            extract_word(alt, i, method, Layout::AltMap),
            read_le(direct, 2 * i),
            "{method} skew {skew} element {i}"
          );
        }

        let mut back = alt.to_vec();
        convert_in_place(alt, method, portable::KERNELS, Direction::FromAltMap);
        assert_eq!(&alt[..], direct, "{method} skew {skew}");

        // The in-place and out-of-place forward conversions agree when the
        // copy sits at the same residue.
        let (mut again, g0) = elements(count, skew);
        let again = &mut again[g0..g0 + 2 * count];
        convert_in_place(again, method, portable::KERNELS, Direction::ToAltMap);
        back.copy_from_slice(again);
        convert(direct, again, method, portable::KERNELS, Direction::ToAltMap);
        assert_eq!(&back[..], &again[..], "{method} skew {skew}");
      }
    }
  }

  #[test]
  fn body_is_actually_transposed() {
    let (mut buf, start) = elements(128, 0);
    let buf = &mut buf[start..start + 256];
    let before = buf.to_vec();
    convert_in_place(buf, Method::XorPortable, portable::KERNELS, Direction::ToAltMap);
    assert_ne!(&buf[..], &before[..]);
  }
}
