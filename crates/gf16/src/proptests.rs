use proptest::prelude::*;

use crate::{
  Config, Gf16, Layout, Method,
  log_table,
  tables::{self, DEFAULT_POLYNOMIAL, LogTables},
};

/// Every method this host can bind explicitly, direct layout.
fn handles() -> Vec<Gf16> {
  Method::ALL
    .into_iter()
    .filter_map(|m| Gf16::with_config(Config::new().method(m)).ok())
    .collect()
}

/// Even-length byte vectors up to 8 KiB.
fn arb_region() -> impl Strategy<Value = Vec<u8>> {
  prop::collection::vec(any::<u8>(), 0..8192).prop_map(|mut v| {
    v.truncate(v.len() & !1);
    v
  })
}

proptest! {
  #![proptest_config(ProptestConfig::with_cases(64))]

  #[test]
  fn methods_match_log_table(
    src in arb_region(),
    value in any::<u16>(),
    accumulate in any::<bool>(),
    skew in 0usize..32,
  ) {
    let skew = skew & !1;
    let tables = LogTables::shared_default();
    let src = &src[skew.min(src.len())..];
    let init: Vec<u8> = src.iter().map(|b| b.rotate_left(3) ^ 0x6B).collect();

    let mut expected = init.clone();
    log_table::multiply_slice(&tables, src, &mut expected, value, accumulate);

    for mut gf in handles() {
      let mut out = init.clone();
      gf.multiply_region(src, &mut out, value, accumulate);
      prop_assert_eq!(&out, &expected, "{}", gf.method());
    }
  }

  #[test]
  fn multiply_then_inverse_restores(src in arb_region(), value in 1u16..) {
    for mut gf in handles() {
      let mut buf = src.clone();
      gf.multiply_region_in_place(&mut buf, value, false);
      let inv = gf.inverse(value);
      gf.multiply_region_in_place(&mut buf, inv, false);
      prop_assert_eq!(&buf, &src, "{}", gf.method());
    }
  }

  #[test]
  fn accumulation_distributes(a in arb_region(), b_seed in any::<u8>(), value in any::<u16>()) {
    let b: Vec<u8> = a.iter().map(|x| x.wrapping_mul(31) ^ b_seed).collect();
    let sum: Vec<u8> = a.iter().zip(&b).map(|(x, y)| x ^ y).collect();

    for mut gf in handles() {
      let mut both = vec![0u8; a.len()];
      gf.multiply_region(&a, &mut both, value, true);
      gf.multiply_region(&b, &mut both, value, true);

      let mut once = vec![0u8; a.len()];
      gf.multiply_region(&sum, &mut once, value, false);
      prop_assert_eq!(&both, &once, "{}", gf.method());
    }
  }

  #[test]
  fn in_place_matches_out_of_place(src in arb_region(), value in any::<u16>(), accumulate in any::<bool>()) {
    for mut gf in handles() {
      let mut out = src.clone();
      gf.multiply_region(&src, &mut out, value, accumulate);
      let mut buf = src.clone();
      gf.multiply_region_in_place(&mut buf, value, accumulate);
      prop_assert_eq!(&buf, &out, "{}", gf.method());
    }
  }

  #[test]
  fn altmap_words_match_direct(src in arb_region(), value in any::<u16>()) {
    let mut direct = Gf16::new();
    let mut expected = vec![0u8; src.len()];
    direct.multiply_region(&src, &mut expected, value, false);

    for method in Method::ALL.into_iter().filter(|m| m.is_bit_sliced()) {
      let Ok(mut gf) = Gf16::with_config(Config::new().method(method).layout(Layout::AltMap)) else {
        continue;
      };
      let mut alt = src.clone();
      gf.to_altmap_in_place(&mut alt);
      gf.multiply_region_in_place(&mut alt, value, false);
      for i in 0..src.len() / 2 {
        prop_assert_eq!(gf.extract_word(&alt, i), direct.extract_word(&expected, i), "{} element {}", method, i);
      }
    }
  }

  #[test]
  fn scalar_laws(a in any::<u16>(), b in any::<u16>(), c in any::<u16>()) {
    let t = LogTables::shared_default();
    prop_assert_eq!(t.multiply(a, b), tables::multiply_bitwise(a, b, DEFAULT_POLYNOMIAL));
    prop_assert_eq!(t.multiply(a, b ^ c), t.multiply(a, b) ^ t.multiply(a, c));
    prop_assert_eq!(t.multiply(t.multiply(a, b), c), t.multiply(a, t.multiply(b, c)));
    if b != 0 {
      prop_assert_eq!(t.divide(t.multiply(a, b), b), a);
      prop_assert_eq!(tables::inverse_euclid(b, DEFAULT_POLYNOMIAL), t.inverse(b));
    }
  }
}
