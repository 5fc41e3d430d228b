//! Bit-sliced region multiplier.
//!
//! Multiplication by a fixed value is a GF(2)-linear map on the 16 bits of
//! an element. A block of `8 * w` elements is transposed into 16 bit planes
//! of `w` bytes; output plane `b` is the XOR of the input planes listed in
//! row `b` of the [`DependencyTable`]; the planes are transposed back.
//!
//! Under the alternate layout the body of a buffer is already stored as
//! planes, so both transpositions are skipped.
//!
//! # Kernels
//!
//! | Kernel | Requires |
//! |--------|----------|
//! | `x86_64/sse2` | SSE2 |
//! | `portable` | nothing |

#![allow(unsafe_code)]
// SAFETY: Plane buffers hold MAX_BLOCK bytes and every slice is cut to one
// method block, which never exceeds MAX_BLOCK.
#![allow(clippy::indexing_slicing)]

pub(crate) mod portable;
#[cfg(target_arch = "x86_64")]
pub(crate) mod x86_64;

use backend::{Candidate, Selected};
use platform::Caps;

use crate::{
  config::Layout,
  depends::DependencyTable,
  dispatch::RegionBackend,
  log_table,
  method::Method,
  region::{Geometry, RegionDescriptor},
  tables::LogTables,
};

/// Largest block any method uses: 16 planes of 64 bytes.
pub(crate) const MAX_BLOCK: usize = 1024;

/// One block of bit planes, cache-line aligned.
#[repr(C, align(64))]
pub(crate) struct PlaneBuf(pub [u8; MAX_BLOCK]);

impl PlaneBuf {
  #[inline]
  pub(crate) const fn new() -> Self {
    Self([0; MAX_BLOCK])
  }
}

/// Transpose / untranspose / plane-multiply for one instruction set.
///
/// Every function takes whole blocks of `16 * w` bytes, `w` a multiple of 16.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PlaneKernels {
  pub name: &'static str,
  pub transpose: fn(&[u8], &mut [u8]),
  pub untranspose: fn(&[u8], &mut [u8], bool),
  pub multiply: fn(&DependencyTable, &[u8], &mut [u8]),
}

/// Fastest plane kernels `caps` can run.
pub(crate) fn best_kernels(caps: Caps) -> Selected<PlaneKernels> {
  backend::select(
    caps,
    &[
      #[cfg(target_arch = "x86_64")]
      Candidate::new(x86_64::KERNELS.name, platform::caps::x86::SSE2, x86_64::KERNELS),
      Candidate::new(portable::KERNELS.name, Caps::NONE, portable::KERNELS),
    ],
  )
}

/// Plane kernels backing an interpreted bit-sliced method.
pub(crate) fn kernels_for(method: Method) -> PlaneKernels {
  match method {
    #[cfg(target_arch = "x86_64")]
    Method::XorSse2 => x86_64::KERNELS,
    _ => portable::KERNELS,
  }
}

/// Combine a finished block of planes into the destination.
#[inline]
pub(crate) fn store_planes(planes: &[u8], dst: &mut [u8], accumulate: bool) {
  if accumulate {
    for (d, p) in dst.iter_mut().zip(planes) {
      *d ^= p;
    }
  } else {
    dst.copy_from_slice(planes);
  }
}

/// Interpreted bit-sliced backend.
#[derive(Debug)]
pub(crate) struct BitSliceBackend {
  method: Method,
  layout: Layout,
  kernels: PlaneKernels,
}

impl BitSliceBackend {
  pub(crate) fn new(method: Method, layout: Layout) -> Self {
    debug_assert!(method.is_bit_sliced() && !method.is_generated());
    Self {
      method,
      layout,
      kernels: kernels_for(method),
    }
  }
}

impl RegionBackend for BitSliceBackend {
  fn method(&self) -> Method {
    self.method
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
    let geometry = Geometry::for_method(self.method, self.layout);
    let region = RegionDescriptor::describe(src, dst, len, value, accumulate, geometry);
    let split = region.split;
    let end = split.body_end();

    // SAFETY: Head and tail lie inside the caller's ranges.
    unsafe {
      log_table::multiply_raw(tables, src, dst, split.head, value, accumulate);
      log_table::multiply_raw(tables, src.add(end), dst.add(end), split.tail, value, accumulate);
    }
    if split.body == 0 {
      return;
    }

    let deps = DependencyTable::new(value, tables.polynomial());
    let block = geometry.block;
    let mut input = PlaneBuf::new();
    let mut output = PlaneBuf::new();
    let (input, output) = (&mut input.0[..block], &mut output.0[..block]);

    let mut off = split.head;
    while off < end {
      // The source block is fully consumed before the destination block is
      // borrowed, so in-place calls never observe partial output.
      // SAFETY: [off, off + block) lies in the body of both ranges.
      let s = unsafe { core::slice::from_raw_parts(src.add(off), block) };
      match self.layout {
        Layout::Direct => (self.kernels.transpose)(s, input),
        Layout::AltMap => input.copy_from_slice(s),
      }
      (self.kernels.multiply)(&deps, input, output);

      // SAFETY: As above; no other reference to this block is live.
      let d = unsafe { core::slice::from_raw_parts_mut(dst.add(off), block) };
      match self.layout {
        Layout::Direct => (self.kernels.untranspose)(output, d, accumulate),
        Layout::AltMap => store_planes(output, d, accumulate),
      }
      off += block;
    }
  }
}
