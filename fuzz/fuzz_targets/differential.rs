//! Differential fuzzing of every bound region method against the log tables.
//!
//! Tests that:
//! - Every method agrees with the log-table reference element for element
//! - In-place and out-of-place calls agree
//! - The alternate layout reads back the same words as the direct layout

#![no_main]

use arbitrary::Arbitrary;
use gf16::{Config, Gf16, Layout, LogTables, Method};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input {
  data: Vec<u8>,
  value: u16,
  accumulate: bool,
  altmap: bool,
  in_place: bool,
  offset: u8,
}

fuzz_target!(|input: Input| {
  let payload = &input.data[..input.data.len() & !1];
  let layout = if input.altmap { Layout::AltMap } else { Layout::Direct };

  for method in Method::ALL {
    let Ok(mut gf) = Gf16::with_config(Config::new().method(method).layout(layout)) else {
      continue;
    };
    // Same residue for source and destination keeps the alternate layout legal.
    let offset = usize::from(input.offset) % gf.alignment().max(2) & !1;
    check(&mut gf, payload, input.value, input.accumulate, offset, input.in_place);
  }
});

fn check(gf: &mut Gf16, payload: &[u8], value: u16, accumulate: bool, offset: usize, in_place: bool) {
  let len = payload.len();
  let mut src_buf = vec![0u8; len + 128];
  let mut dst_buf = vec![0u8; len + 128];
  let s0 = src_buf.as_ptr().align_offset(64) + offset;
  let d0 = dst_buf.as_ptr().align_offset(64) + offset;
  src_buf[s0..s0 + len].copy_from_slice(payload);
  let init: Vec<u8> = payload.iter().map(|b| b.rotate_left(1) ^ 0x5A).collect();
  dst_buf[d0..d0 + len].copy_from_slice(if in_place { payload } else { &init });

  // Log-table reference on the direct view of the input.
  let mut expected = if in_place { payload.to_vec() } else { init.clone() };
  gf16::log_table::multiply_slice(&LogTables::shared_default(), payload, &mut expected, value, accumulate);

  if gf.layout() == Layout::AltMap {
    gf.to_altmap_in_place(&mut src_buf[s0..s0 + len]);
    gf.to_altmap_in_place(&mut dst_buf[d0..d0 + len]);
  }

  let out = if in_place {
    let buf = &mut src_buf[s0..s0 + len];
    gf.multiply_region_in_place(buf, value, accumulate);
    buf
  } else {
    let (src, dst) = (&src_buf[s0..s0 + len], &mut dst_buf[d0..d0 + len]);
    gf.multiply_region(src, dst, value, accumulate);
    dst
  };

  for i in 0..len / 2 {
    let ours = gf.extract_word(out, i);
    let reference = u16::from_le_bytes([expected[2 * i], expected[2 * i + 1]]);
    assert_eq!(
      ours,
      reference,
      "{} {:?} value={value:#06x} accumulate={accumulate} in_place={in_place} offset={offset} element={i}",
      gf.method(),
      gf.layout()
    );
  }
}
