//! Region edges: lengths across block boundaries at every even sub-block offset.

mod common;

use common::{AlignedBuf, direct_handles, gen_bytes, handle, reference};
use gf16::{Layout, Method};

/// Lengths crossing zero, one, and several blocks of the widest method.
const LENGTHS: [usize; 14] = [0, 2, 14, 30, 62, 254, 256, 258, 510, 512, 1026, 2050, 3 * 1024 + 62, 2 * 4096 + 6];

#[test]
fn direct_layout_any_offsets() {
  for mut gf in direct_handles() {
    for len in LENGTHS {
      for (src_off, dst_off) in [(0, 0), (2, 2), (6, 0), (0, 10), (30, 14), (1, 1), (3, 7), (4, 9), (62, 62)] {
        let data = gen_bytes(len, (len * 97 + src_off) as u64);
        let init = gen_bytes(len, (len * 13 + dst_off) as u64);
        let src = AlignedBuf::from_slice(&data, src_off);

        for accumulate in [false, true] {
          let mut dst = AlignedBuf::from_slice(&init, dst_off);
          gf.multiply_region(&src, &mut dst, 0xC0DE, accumulate);
          assert!(
            *dst == *reference(&data, &init, 0xC0DE, accumulate),
            "{} len {len} offsets {src_off}/{dst_off} accumulate {accumulate}",
            gf.method()
          );
        }
      }
    }
  }
}

#[test]
fn direct_layout_in_place_any_offset() {
  for mut gf in direct_handles() {
    for len in LENGTHS {
      for off in [0usize, 2, 8, 18, 1] {
        let data = gen_bytes(len, len as u64 + 1);
        let mut buf = AlignedBuf::from_slice(&data, off);
        gf.multiply_region_in_place(&mut buf, 0x4321, false);
        assert!(*buf == *reference(&data, &data, 0x4321, false), "{} len {len} offset {off}", gf.method());
      }
    }
  }
}

#[test]
fn altmap_matching_offsets() {
  for method in Method::ALL.into_iter().filter(|m| m.is_bit_sliced()) {
    let Some(mut gf) = handle(method, Layout::AltMap) else {
      continue;
    };
    let mut direct = handle(Method::LogTable, Layout::Direct).unwrap();

    for len in LENGTHS {
      for off in (0..gf.alignment()).step_by(6) {
        let data = gen_bytes(len, (len + off) as u64);

        let mut expected = vec![0u8; len];
        direct.multiply_region(&data, &mut expected, 0x0F1E, false);

        let src = AlignedBuf::from_slice(&data, off);
        let mut alt_src = AlignedBuf::new(len, off);
        gf.to_altmap(&src, &mut alt_src);
        let mut alt_dst = AlignedBuf::new(len, off + gf.alignment());
        gf.multiply_region(&alt_src, &mut alt_dst, 0x0F1E, false);

        let mut back = AlignedBuf::new(len, off);
        gf.from_altmap(&alt_dst, &mut back);
        assert!(*back == *expected, "{method} len {len} offset {off}");
      }
    }
  }
}

#[test]
#[should_panic(expected = "alignment")]
fn altmap_mismatched_offsets_panic() {
  let Some(mut gf) = handle(Method::XorPortable, Layout::AltMap) else {
    panic!("alignment: portable method always binds");
  };
  let src = AlignedBuf::new(1024, 0);
  let mut dst = AlignedBuf::new(1024, 2);
  gf.multiply_region(&src, &mut dst, 3, false);
}

#[test]
#[should_panic(expected = "not a multiple of 2")]
fn odd_length_panics_for_every_layout() {
  let mut gf = handle(Method::XorPortable, Layout::AltMap).unwrap();
  let mut buf = AlignedBuf::new(33, 0);
  gf.multiply_region_in_place(&mut buf, 3, false);
}
