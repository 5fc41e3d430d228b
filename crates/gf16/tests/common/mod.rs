//! Shared helpers for integration tests.

#![allow(dead_code)]

use gf16::{Config, Gf16, Layout, Method};

/// Deterministic pseudo-random bytes (xorshift64).
pub fn gen_bytes(len: usize, seed: u64) -> Vec<u8> {
  let mut out = vec![0u8; len];
  let mut x = seed | 1;
  for b in &mut out {
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    *b = (x as u8).wrapping_add((x >> 8) as u8);
  }
  out
}

/// A byte buffer whose slice starts at a chosen offset past a 64-byte boundary.
pub struct AlignedBuf {
  storage: Vec<u8>,
  start: usize,
  len: usize,
}

impl AlignedBuf {
  pub fn new(len: usize, offset: usize) -> Self {
    let storage = vec![0u8; len + offset + 64];
    let start = storage.as_ptr().align_offset(64) + offset;
    Self { storage, start, len }
  }

  pub fn from_slice(data: &[u8], offset: usize) -> Self {
    let mut buf = Self::new(data.len(), offset);
    buf.copy_from_slice(data);
    buf
  }
}

impl core::ops::Deref for AlignedBuf {
  type Target = [u8];

  fn deref(&self) -> &[u8] {
    &self.storage[self.start..self.start + self.len]
  }
}

impl core::ops::DerefMut for AlignedBuf {
  fn deref_mut(&mut self) -> &mut [u8] {
    &mut self.storage[self.start..self.start + self.len]
  }
}

/// A handle bound to `method`, or `None` where the host cannot run it.
pub fn handle(method: Method, layout: Layout) -> Option<Gf16> {
  Gf16::with_config(Config::new().method(method).layout(layout)).ok()
}

/// Handles for every method this host runs in direct layout.
pub fn direct_handles() -> Vec<Gf16> {
  Method::ALL.into_iter().filter_map(|m| handle(m, Layout::Direct)).collect()
}

/// Reference result of `init (^)= src * value` from the log tables.
pub fn reference(src: &[u8], init: &[u8], value: u16, accumulate: bool) -> Vec<u8> {
  let mut out = init.to_vec();
  gf16::log_table::multiply_slice(&gf16::LogTables::shared_default(), src, &mut out, value, accumulate);
  out
}
