//! Alternate layout: words read back the same as the direct layout.

mod common;

use common::{AlignedBuf, gen_bytes, handle};
use gf16::{Config, Gf16, Layout, Method, MultType};

fn altmap_handles() -> Vec<Gf16> {
  Method::ALL
    .into_iter()
    .filter(|m| m.is_bit_sliced())
    .filter_map(|m| handle(m, Layout::AltMap))
    .collect()
}

#[test]
fn auto_selection_honors_altmap() {
  let gf = Gf16::with_config(Config::new().layout(Layout::AltMap)).unwrap();
  assert!(gf.method().is_bit_sliced());
  assert_eq!(gf.alignment(), gf.method().lanes());

  let gf = Gf16::with_config(Config::new().mult(MultType::XorDepends)).unwrap();
  assert!(gf.method().is_bit_sliced());
  assert_eq!(gf.layout(), Layout::Direct);
}

#[test]
fn extract_after_multiply_matches_direct() {
  let mut direct = Gf16::new();
  for len in [0usize, 64, 512, 1024, 4096 + 22] {
    for offset in [0usize, 4] {
      let data = gen_bytes(len, len as u64 ^ 0xA1);
      let mut expected = vec![0u8; len];
      direct.multiply_region(&data, &mut expected, 0xBEEF, false);

      for mut gf in altmap_handles() {
        let mut buf = AlignedBuf::from_slice(&data, offset);
        gf.to_altmap_in_place(&mut buf);
        gf.multiply_region_in_place(&mut buf, 0xBEEF, false);
        for i in 0..len / 2 {
          assert_eq!(
            gf.extract_word(&buf, i),
            direct.extract_word(&expected, i),
            "{} len {len} offset {offset} element {i}",
            gf.method()
          );
        }
      }
    }
  }
}

#[test]
fn transcoders_round_trip() {
  for gf in altmap_handles() {
    let data = gen_bytes(3000, 77);
    let src = AlignedBuf::from_slice(&data, 2);
    let mut alt = AlignedBuf::new(data.len(), 2);
    gf.to_altmap(&src, &mut alt);

    let mut in_place = AlignedBuf::from_slice(&data, 2);
    gf.to_altmap_in_place(&mut in_place);
    assert!(*in_place == *alt, "{}", gf.method());

    gf.from_altmap_in_place(&mut in_place);
    assert!(*in_place == *data, "{}", gf.method());
  }
}

#[test]
fn accumulate_in_altmap_is_xor_of_planes() {
  // XOR commutes with transposition, so accumulating in bit planes equals
  // accumulating directly.
  let mut direct = Gf16::new();
  let a = gen_bytes(2048, 1);
  let b = gen_bytes(2048, 2);
  let mut expected = b.clone();
  direct.multiply_region(&a, &mut expected, 0x3C3C, true);

  for mut gf in altmap_handles() {
    let mut alt_a = AlignedBuf::from_slice(&a, 0);
    let mut alt_b = AlignedBuf::from_slice(&b, 0);
    gf.to_altmap_in_place(&mut alt_a);
    gf.to_altmap_in_place(&mut alt_b);
    gf.multiply_region(&alt_a, &mut alt_b, 0x3C3C, true);
    gf.from_altmap_in_place(&mut alt_b);
    assert!(*alt_b == *expected, "{}", gf.method());
  }
}

#[test]
fn layouts_differ_in_the_body() {
  let Some(gf) = handle(Method::XorPortable, Layout::AltMap) else {
    return;
  };
  let data = gen_bytes(512, 3);
  let src = AlignedBuf::from_slice(&data, 0);
  let mut alt = AlignedBuf::new(512, 0);
  gf.to_altmap(&src, &mut alt);
  assert!(*alt != *data);
  // Plane 0 of the first block holds bit 0 of elements 0..128.
  let bit0: u8 = (0..8).map(|j| (data[2 * j] & 1) << j).sum();
  assert_eq!(alt[0], bit0);
}
