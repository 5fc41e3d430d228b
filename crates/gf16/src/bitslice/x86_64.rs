//! SSE2 bit-plane kernels.
//!
//! Transposition works on 16 elements (32 bytes) at a time: the low and high
//! bytes are packed into one register each, and `pmovmskb` peels off one bit
//! plane per shift. The inverse broadcasts each 16-bit plane mask across a
//! register and recovers per-byte bits with a compare against a selector.
//!
//! # Safety
//!
//! Uses `unsafe` for x86 SIMD intrinsics. SSE2 is part of the x86_64
//! baseline, so the safe wrappers need no runtime check.
#![allow(unsafe_code)]
#![allow(unsafe_op_in_unsafe_fn)]
// SAFETY: Block lengths are asserted at each entry point; all offsets stay
// below 16 planes of `w` bytes.
#![allow(clippy::indexing_slicing)]

use core::arch::x86_64::*;

use super::PlaneKernels;
use crate::depends::DependencyTable;

pub(crate) const KERNELS: PlaneKernels = PlaneKernels {
  name: "x86_64/sse2",
  transpose: transpose_safe,
  untranspose: untranspose_safe,
  multiply: multiply_safe,
};

#[inline]
fn plane_width(block: usize) -> usize {
  assert!(block % 256 == 0 && block <= super::MAX_BLOCK, "bad bit-plane block of {block} bytes");
  block / 16
}

#[inline]
#[target_feature(enable = "sse2")]
unsafe fn transpose_sse2(src: *const u8, planes: *mut u8, w: usize) {
  let low = _mm_set1_epi16(0x00FF);
  for g in 0..w / 2 {
    let v0 = _mm_loadu_si128(src.add(32 * g).cast());
    let v1 = _mm_loadu_si128(src.add(32 * g + 16).cast());
    let mut lo = _mm_packus_epi16(_mm_and_si128(v0, low), _mm_and_si128(v1, low));
    let mut hi = _mm_packus_epi16(_mm_srli_epi16::<8>(v0), _mm_srli_epi16::<8>(v1));
    for b in (0..8).rev() {
      let lo_mask = _mm_movemask_epi8(lo) as u16;
      let hi_mask = _mm_movemask_epi8(hi) as u16;
      planes.add(b * w + 2 * g).cast::<u16>().write_unaligned(lo_mask.to_le());
      planes.add((b + 8) * w + 2 * g).cast::<u16>().write_unaligned(hi_mask.to_le());
      lo = _mm_add_epi8(lo, lo);
      hi = _mm_add_epi8(hi, hi);
    }
  }
}

/// Broadcast the low mask byte over lanes 0..8 and the high byte over 8..16.
#[inline(always)]
unsafe fn broadcast_mask(m: u16) -> __m128i {
  let lo = u64::from(m & 0xFF).wrapping_mul(0x0101_0101_0101_0101);
  let hi = u64::from(m >> 8).wrapping_mul(0x0101_0101_0101_0101);
  _mm_set_epi64x(hi as i64, lo as i64)
}

#[inline]
#[target_feature(enable = "sse2")]
unsafe fn untranspose_sse2(planes: *const u8, dst: *mut u8, w: usize, accumulate: bool) {
  let select = _mm_set_epi64x(0x8040_2010_0804_0201_u64 as i64, 0x8040_2010_0804_0201_u64 as i64);
  for g in 0..w / 2 {
    let mut lo = _mm_setzero_si128();
    let mut hi = _mm_setzero_si128();
    for b in 0..8 {
      let bit = _mm_set1_epi8((1u8 << b) as i8);

      let m = u16::from_le(planes.add(b * w + 2 * g).cast::<u16>().read_unaligned());
      let hit = _mm_cmpeq_epi8(_mm_and_si128(broadcast_mask(m), select), select);
      lo = _mm_or_si128(lo, _mm_and_si128(hit, bit));

      let m = u16::from_le(planes.add((b + 8) * w + 2 * g).cast::<u16>().read_unaligned());
      let hit = _mm_cmpeq_epi8(_mm_and_si128(broadcast_mask(m), select), select);
      hi = _mm_or_si128(hi, _mm_and_si128(hit, bit));
    }

    let out = dst.add(32 * g);
    let mut e0 = _mm_unpacklo_epi8(lo, hi);
    let mut e1 = _mm_unpackhi_epi8(lo, hi);
    if accumulate {
      e0 = _mm_xor_si128(e0, _mm_loadu_si128(out.cast()));
      e1 = _mm_xor_si128(e1, _mm_loadu_si128(out.add(16).cast()));
    }
    _mm_storeu_si128(out.cast(), e0);
    _mm_storeu_si128(out.add(16).cast(), e1);
  }
}

#[inline]
#[target_feature(enable = "sse2")]
unsafe fn multiply_sse2(rows: &[u16; 16], input: *const u8, out: *mut u8, w: usize) {
  for c in (0..w).step_by(16) {
    for (b, &row) in rows.iter().enumerate() {
      let mut acc = _mm_setzero_si128();
      let mut bits = row;
      while bits != 0 {
        let k = bits.trailing_zeros() as usize;
        acc = _mm_xor_si128(acc, _mm_loadu_si128(input.add(k * w + c).cast()));
        bits &= bits - 1;
      }
      _mm_storeu_si128(out.add(b * w + c).cast(), acc);
    }
  }
}

fn transpose_safe(src: &[u8], planes: &mut [u8]) {
  assert_eq!(src.len(), planes.len());
  let w = plane_width(src.len());
  // SAFETY: SSE2 is baseline on x86_64; both slices hold 16 * w bytes.
  unsafe { transpose_sse2(src.as_ptr(), planes.as_mut_ptr(), w) }
}

fn untranspose_safe(planes: &[u8], dst: &mut [u8], accumulate: bool) {
  assert_eq!(planes.len(), dst.len());
  let w = plane_width(planes.len());
  // SAFETY: As above.
  unsafe { untranspose_sse2(planes.as_ptr(), dst.as_mut_ptr(), w, accumulate) }
}

fn multiply_safe(deps: &DependencyTable, input: &[u8], out: &mut [u8]) {
  assert_eq!(input.len(), out.len());
  let w = plane_width(input.len());
  // SAFETY: As above.
  unsafe { multiply_sse2(deps.rows(), input.as_ptr(), out.as_mut_ptr(), w) }
}
