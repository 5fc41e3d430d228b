//! Log-table region multiplier.
//!
//! One table lookup per element: `antilog[log(e) + log(value)]`. This is the
//! reference every other backend is checked against, the production path for
//! region heads and tails, and the fallback when nothing faster can run.

#![allow(unsafe_code)]

use crate::{dispatch::RegionBackend, method::Method, tables::LogTables};

/// Multiply `len` bytes at `src` by `value` into `dst`.
///
/// Each element is read before its own slot is written, so `src == dst`
/// is fine.
///
/// # Safety
///
/// `src` must be readable and `dst` writable for `len` bytes; the ranges are
/// identical or disjoint. `len` must be even.
pub(crate) unsafe fn multiply_raw(
  tables: &LogTables,
  src: *const u8,
  dst: *mut u8,
  len: usize,
  value: u16,
  accumulate: bool,
) {
  debug_assert!(len % 2 == 0);
  if value == 0 {
    if !accumulate {
      // SAFETY: dst is writable for len bytes.
      unsafe { core::ptr::write_bytes(dst, 0, len) };
    }
    return;
  }

  let log_value = usize::from(tables.log(value));
  let mut i = 0;
  while i < len {
    // SAFETY: i + 2 <= len; reads and writes are unaligned-tolerant.
    unsafe {
      let e = u16::from_le(src.add(i).cast::<u16>().read_unaligned());
      let mut r = tables.multiply_by_log(e, log_value);
      let out = dst.add(i).cast::<u16>();
      if accumulate {
        r ^= u16::from_le(out.read_unaligned());
      }
      out.write_unaligned(r.to_le());
    }
    i += 2;
  }
}

/// Multiply `src` by `value` into `dst`, element by element.
///
/// # Panics
///
/// Panics if the lengths differ or are odd.
pub fn multiply_slice(tables: &LogTables, src: &[u8], dst: &mut [u8], value: u16, accumulate: bool) {
  assert_eq!(src.len(), dst.len(), "source and destination lengths differ");
  assert!(src.len() % 2 == 0, "region length {} is not a multiple of 2", src.len());
  // SAFETY: Borrow rules make the slices disjoint; lengths checked above.
  unsafe { multiply_raw(tables, src.as_ptr(), dst.as_mut_ptr(), src.len(), value, accumulate) }
}

/// Log-table backend.
#[derive(Debug, Default)]
pub(crate) struct LogTableBackend;

impl RegionBackend for LogTableBackend {
  fn method(&self) -> Method {
    Method::LogTable
  }

  unsafe fn multiply_region(
    &mut self,
    tables: &LogTables,
    src: *const u8,
    dst: *mut u8,
    len: usize,
    value: u16,
    accumulate: bool,
  ) {
    // SAFETY: Forwarded caller contract.
    unsafe { multiply_raw(tables, src, dst, len, value, accumulate) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::tables::{DEFAULT_POLYNOMIAL, multiply_bitwise};

  fn words(bytes: &[u8]) -> Vec<u16> {
    bytes.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect()
  }

  #[test]
  fn overwrite_matches_bitwise() {
    let t = LogTables::shared_default();
    let src: Vec<u8> = (0..512u32).map(|i| (i * 37 + 11) as u8).collect();
    let mut dst = vec![0xAAu8; 512];
    multiply_slice(&t, &src, &mut dst, 0x1234, false);
    for (i, (s, d)) in words(&src).into_iter().zip(words(&dst)).enumerate() {
      assert_eq!(d, multiply_bitwise(s, 0x1234, DEFAULT_POLYNOMIAL), "element {i}");
    }
  }

  #[test]
  fn accumulate_xors_into_destination() {
    let t = LogTables::shared_default();
    let src = [1u8, 0, 2, 0, 0, 0, 0xFF, 0xFF];
    let mut dst = [0x0Fu8; 8];
    multiply_slice(&t, &src, &mut dst, 7, true);
    let got = words(&dst);
    assert_eq!(got[0], 7 ^ 0x0F0F);
    assert_eq!(got[1], multiply_bitwise(2, 7, DEFAULT_POLYNOMIAL) ^ 0x0F0F);
    assert_eq!(got[2], 0x0F0F);
    assert_eq!(got[3], multiply_bitwise(0xFFFF, 7, DEFAULT_POLYNOMIAL) ^ 0x0F0F);
  }

  #[test]
  fn zero_value() {
    let t = LogTables::shared_default();
    let src = [0x55u8; 16];
    let mut dst = [0x33u8; 16];
    multiply_slice(&t, &src, &mut dst, 0, true);
    assert_eq!(dst, [0x33; 16]);
    multiply_slice(&t, &src, &mut dst, 0, false);
    assert_eq!(dst, [0; 16]);
  }

  #[test]
  fn in_place() {
    let t = LogTables::shared_default();
    let mut buf: Vec<u8> = (0..64u8).collect();
    let mut expected = vec![0u8; 64];
    multiply_slice(&t, &buf, &mut expected, 0xBEEF, false);
    // SAFETY: Same buffer for both operands, 64 bytes.
    unsafe { multiply_raw(&t, buf.as_ptr(), buf.as_mut_ptr(), 64, 0xBEEF, false) };
    assert_eq!(buf, expected);
  }

  #[test]
  #[should_panic(expected = "lengths differ")]
  fn mismatched_lengths_panic() {
    let t = LogTables::shared_default();
    multiply_slice(&t, &[0; 4], &mut [0; 6], 3, false);
  }
}
