//! Run-time generated region multiplier.
//!
//! For each distinct `(value, accumulate, aligned)` the backend emits a
//! routine specialized to the value's dependency table (see [`codegen`]),
//! finalizes it in a [`CodeBuffer`], and enters it through a typed pointer.
//! The routine works on bit planes:
//!
//! - alternate layout: directly on the caller's buffers;
//! - direct layout: chunks are transposed into a private staging area,
//!   multiplied there in place, and transposed back into the destination.
//!
//! One handle owns one code buffer; calls take `&mut self`, so a buffer is
//! never rewritten while another call runs in it.

#![allow(unsafe_code)]
// SAFETY: Staging slices are cut at offsets below the staging length, which
// is a whole number of blocks.
#![allow(clippy::indexing_slicing)]

pub(crate) mod asm;
pub(crate) mod buffer;
pub(crate) mod codegen;

use tracing::{trace, warn};

use self::{
  asm::Isa,
  buffer::{CODE_CAPACITY, CodeBuffer, RegionFn},
  codegen::{Abi, CodegenOptions, RoutineKey},
};
use crate::{
  bitslice::{self, PlaneBuf, PlaneKernels},
  config::{Layout, STAGING_ALIGN, scratch_bytes},
  depends::DependencyTable,
  dispatch::RegionBackend,
  error::JitError,
  log_table,
  method::Method,
  region::{Geometry, RegionDescriptor},
  tables::LogTables,
};

/// Caller- or self-allocated staging memory with an aligned window.
#[derive(Debug)]
struct Staging {
  memory: Vec<u8>,
  offset: usize,
  len: usize,
}

impl Staging {
  fn new(mut memory: Vec<u8>, len: usize) -> Self {
    debug_assert!(memory.len() >= scratch_bytes(len));
    let offset = memory.as_mut_ptr().align_offset(STAGING_ALIGN);
    Self { memory, offset, len }
  }

  fn window(&mut self) -> &mut [u8] {
    &mut self.memory[self.offset..self.offset + self.len]
  }
}

/// Generated-code backend.
#[derive(Debug)]
pub(crate) struct JitBackend {
  method: Method,
  layout: Layout,
  options: CodegenOptions,
  code: CodeBuffer,
  current: Option<(RoutineKey, RegionFn)>,
  staging: Staging,
  /// Transposition kernels for direct-layout staging.
  transposer: PlaneKernels,
}

impl JitBackend {
  /// Map the code buffer and take ownership of the staging memory.
  ///
  /// `scratch` must hold [`scratch_bytes`]`(staging)` bytes.
  pub(crate) fn new(
    method: Method,
    layout: Layout,
    cse: bool,
    staging: usize,
    scratch: Vec<u8>,
    transposer: PlaneKernels,
  ) -> Result<Self, JitError> {
    let isa = match method {
      Method::XorJitSse2 => Isa::Sse2,
      Method::XorJitAvx2 => Isa::Avx2,
      Method::XorJitAvx512 => Isa::Avx512,
      _ => return Err(JitError::Unsupported),
    };
    debug_assert_eq!(staging % method.block_bytes(), 0);
    Ok(Self {
      method,
      layout,
      options: CodegenOptions {
        isa,
        cse,
        abi: Abi::NATIVE,
      },
      code: CodeBuffer::new(CODE_CAPACITY)?,
      current: None,
      staging: Staging::new(scratch, staging),
      transposer,
    })
  }

  /// Routine for `key`, regenerated only when the key changes.
  fn specialize(&mut self, key: RoutineKey, poly: u32) -> Result<RegionFn, JitError> {
    if let Some((current, entry)) = self.current
      && current == key
    {
      return Ok(entry);
    }
    self.current = None;

    let deps = DependencyTable::new(key.value, poly);
    let routine = codegen::generate(&deps, key, self.options);
    self.code.begin()?;
    self.code.emit(&routine)?;
    let entry = self.code.finalize()?;
    trace!(
      method = self.method.name(),
      value = key.value,
      accumulate = key.accumulate,
      aligned = key.aligned,
      bytes = routine.len(),
      "specialized region routine"
    );
    self.current = Some((key, entry));
    Ok(entry)
  }

  /// Multiply an aligned body of whole blocks.
  ///
  /// # Safety
  ///
  /// `src`/`dst` are valid for `len` bytes, identical or disjoint, and `len`
  /// is a non-zero multiple of the block size.
  unsafe fn body(&mut self, tables: &LogTables, src: *const u8, dst: *mut u8, len: usize, key: RoutineKey) {
    match self.specialize(key, tables.polynomial()) {
      // SAFETY: The routine reads and writes exactly [ptr, ptr + len) in
      // whole blocks; the caller guarantees those ranges.
      Ok(entry) => unsafe { entry(src, dst, src.add(len)) },
      Err(err) => {
        warn!(method = self.method.name(), error = %err, "generated routine unavailable, interpreting");
        // SAFETY: Forwarded caller contract.
        unsafe { self.interpret(tables, src, dst, len, key) }
      }
    }
  }

  /// Plane multiply without generated code, for when the OS refuses a
  /// protection change after construction.
  ///
  /// # Safety
  ///
  /// As for [`Self::body`].
  unsafe fn interpret(&self, tables: &LogTables, src: *const u8, dst: *mut u8, len: usize, key: RoutineKey) {
    let deps = DependencyTable::new(key.value, tables.polynomial());
    let block = self.method.block_bytes();
    let mut planes = PlaneBuf::new();
    let planes = &mut planes.0[..block];
    let mut off = 0;
    while off < len {
      // SAFETY: [off, off + block) is inside both ranges; the source borrow
      // ends before the destination borrow starts.
      let s = unsafe { core::slice::from_raw_parts(src.add(off), block) };
      (self.transposer.multiply)(&deps, s, planes);
      // SAFETY: As above.
      let d = unsafe { core::slice::from_raw_parts_mut(dst.add(off), block) };
      bitslice::store_planes(planes, d, key.accumulate);
      off += block;
    }
  }

  /// Direct layout: stage, multiply in place, unstage.
  ///
  /// # Safety
  ///
  /// As for [`Self::body`].
  unsafe fn staged(&mut self, tables: &LogTables, src: *const u8, dst: *mut u8, len: usize, value: u16, accumulate: bool) {
    let block = self.method.block_bytes();
    let chunk = self.staging.len;
    let key = RoutineKey {
      value,
      accumulate: false,
      aligned: true,
    };
    let transposer = self.transposer;

    let mut off = 0;
    while off < len {
      let n = chunk.min(len - off);
      {
        // SAFETY: [off, off + n) is inside the source range.
        let s = unsafe { core::slice::from_raw_parts(src.add(off), n) };
        let window = &mut self.staging.window()[..n];
        for (from, to) in s.chunks_exact(block).zip(window.chunks_exact_mut(block)) {
          (transposer.transpose)(from, to);
        }
      }

      let planes = self.staging.window()[..n].as_mut_ptr();
      // SAFETY: The staging window is 64-byte aligned and n bytes long.
      unsafe { self.body(tables, planes, planes, n, key) };

      // SAFETY: [off, off + n) is inside the destination range, and the
      // source chunk is no longer borrowed.
      let d = unsafe { core::slice::from_raw_parts_mut(dst.add(off), n) };
      let window = &self.staging.window()[..n];
      for (from, to) in window.chunks_exact(block).zip(d.chunks_exact_mut(block)) {
        (transposer.untranspose)(from, to, accumulate);
      }
      off += n;
    }
  }
}

impl RegionBackend for JitBackend {
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

    // SAFETY: The body is a non-zero whole number of blocks inside both ranges.
    unsafe {
      match self.layout {
        Layout::Direct => self.staged(tables, region.src_start(), region.dst_start(), split.body, value, accumulate),
        Layout::AltMap => {
          let key = RoutineKey {
            value,
            accumulate,
            aligned: region.operands_aligned(self.options.isa.lanes()),
          };
          self.body(tables, region.src_start(), region.dst_start(), split.body, key);
        }
      }
    }
  }
}
