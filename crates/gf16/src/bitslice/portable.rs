//! Portable bit-plane kernels on 64-bit words.
//!
//! Transposition moves 8 elements at a time: the low bytes of 8 elements
//! form one `u64`, whose bit `b` of every byte is gathered into a single
//! plane byte by one multiplication.

// SAFETY: All indexing is within blocks whose lengths are asserted to be
// 16 planes of `w` bytes (`w` a multiple of 16) at each entry point.
#![allow(clippy::indexing_slicing)]

use super::PlaneKernels;
use crate::depends::DependencyTable;

pub(crate) const KERNELS: PlaneKernels = PlaneKernels {
  name: "portable",
  transpose,
  untranspose,
  multiply,
};

const LSB: u64 = 0x0101_0101_0101_0101;
const MSB: u64 = 0x8080_8080_8080_8080;

/// Bit `b` of each byte of `x`, packed: byte `i` lands in bit `i`.
#[inline(always)]
const fn gather(x: u64, b: u32) -> u8 {
  // Bit 8i moves to bit 56 + i; no two partial products collide.
  (((x >> b) & LSB).wrapping_mul(0x0102_0408_1020_4080) >> 56) as u8
}

/// Inverse of [`gather`]: bit `i` of `p` becomes bit 0 of byte `i`.
#[inline(always)]
const fn spread(p: u8) -> u64 {
  let picked = (p as u64).wrapping_mul(LSB) & 0x8040_2010_0804_0201;
  ((picked + 0x7F7F_7F7F_7F7F_7F7F) & MSB) >> 7
}

#[inline]
fn plane_width(block: usize) -> usize {
  assert!(block % 256 == 0 && block <= super::MAX_BLOCK, "bad bit-plane block of {block} bytes");
  block / 16
}

/// Direct elements to bit planes. `src` and `planes` are one block each.
pub(crate) fn transpose(src: &[u8], planes: &mut [u8]) {
  assert_eq!(src.len(), planes.len());
  let w = plane_width(src.len());
  for (q, group) in src.chunks_exact(16).enumerate() {
    let mut lo = [0u8; 8];
    let mut hi = [0u8; 8];
    for (i, e) in group.chunks_exact(2).enumerate() {
      lo[i] = e[0];
      hi[i] = e[1];
    }
    let (lo, hi) = (u64::from_le_bytes(lo), u64::from_le_bytes(hi));
    for b in 0..8 {
      planes[b * w + q] = gather(lo, b as u32);
      planes[(b + 8) * w + q] = gather(hi, b as u32);
    }
  }
}

/// Bit planes back to direct elements, overwriting or XOR-ing `dst`.
pub(crate) fn untranspose(planes: &[u8], dst: &mut [u8], accumulate: bool) {
  assert_eq!(planes.len(), dst.len());
  let w = plane_width(planes.len());
  for (q, group) in dst.chunks_exact_mut(16).enumerate() {
    let mut lo = 0u64;
    let mut hi = 0u64;
    for b in 0..8 {
      lo |= spread(planes[b * w + q]) << b;
      hi |= spread(planes[(b + 8) * w + q]) << b;
    }
    let (lo, hi) = (lo.to_le_bytes(), hi.to_le_bytes());
    for (i, e) in group.chunks_exact_mut(2).enumerate() {
      if accumulate {
        e[0] ^= lo[i];
        e[1] ^= hi[i];
      } else {
        e[0] = lo[i];
        e[1] = hi[i];
      }
    }
  }
}

/// Output plane `b` = XOR of the input planes selected by row `b`.
pub(crate) fn multiply(deps: &DependencyTable, input: &[u8], out: &mut [u8]) {
  assert_eq!(input.len(), out.len());
  let w = plane_width(input.len());
  for (b, plane) in out.chunks_exact_mut(w).enumerate() {
    let row = deps.row(b);
    for (c, word) in plane.chunks_exact_mut(8).enumerate() {
      let mut acc = 0u64;
      let mut bits = row;
      while bits != 0 {
        let k = bits.trailing_zeros() as usize;
        let at = k * w + c * 8;
        let mut le = [0u8; 8];
        le.copy_from_slice(&input[at..at + 8]);
        acc ^= u64::from_le_bytes(le);
        bits &= bits - 1;
      }
      word.copy_from_slice(&acc.to_le_bytes());
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn gather_spread_inverse() {
    for p in 0..=255u8 {
      assert_eq!(gather(spread(p), 0), p);
    }
    // Byte i of x holds bit b at position b.
    let x = u64::from_le_bytes([0b100, 0, 0b100, 0, 0, 0, 0, 0b100]);
    assert_eq!(gather(x, 2), 0b1000_0101);
    assert_eq!(gather(x, 1), 0);
  }

  #[test]
  fn transpose_places_bits() {
    let mut src = [0u8; 256];
    // Element 9 = 0x8001: bit 0 and bit 15.
    src[18] = 0x01;
    src[19] = 0x80;
    let mut planes = [0u8; 256];
    transpose(&src, &mut planes);
    let w = 16;
    // Element 9 lives in plane byte 1, bit 1.
    assert_eq!(planes[1], 0b10);
    assert_eq!(planes[15 * w + 1], 0b10);
    assert_eq!(planes.iter().map(|b| b.count_ones()).sum::<u32>(), 2);
  }

  #[test]
  fn untranspose_inverts_transpose() {
    for block in [256usize, 512, 1024] {
      let src: Vec<u8> = (0..block).map(|i| (i * 131 + 7) as u8).collect();
      let mut planes = vec![0u8; block];
      let mut back = vec![0u8; block];
      transpose(&src, &mut planes);
      untranspose(&planes, &mut back, false);
      assert_eq!(back, src, "block {block}");
      untranspose(&planes, &mut back, true);
      assert!(back.iter().all(|&b| b == 0), "block {block}");
    }
  }

  #[test]
  fn multiply_by_one_copies_planes() {
    let deps = DependencyTable::new(1, crate::tables::DEFAULT_POLYNOMIAL);
    let input: Vec<u8> = (0..=255).collect();
    let mut out = vec![0u8; 256];
    multiply(&deps, &input, &mut out);
    assert_eq!(out, input);
  }

  #[test]
  #[should_panic(expected = "bad bit-plane block")]
  fn rejects_partial_block() {
    transpose(&[0; 128], &mut [0; 128]);
  }
}
