//! Region routine generator.
//!
//! Emits one straight-line loop body per multiplier: every dependency edge
//! in the [`DependencyTable`] becomes one XOR, with no branches on data.
//!
//! # Register plans
//!
//! SSE2 and AVX2 have 16 vector registers, too few to hold 16 outputs and
//! their inputs, so half the outputs go through the stack:
//!
//! | Register | Use |
//! |----------|-----|
//! | v0, v1 | outputs 0..8, computed in pairs and spilled to the stack |
//! | v2 | unaligned SSE2 loads |
//! | v3 | shared partial XOR of an output pair |
//! | v8..v15 | outputs 8..16, resident until the store pass |
//!
//! AVX-512 has 32, so nothing is spilled:
//!
//! | Register | Use |
//! |----------|-----|
//! | v0..v15 | input planes, each loaded once per block |
//! | v16..v31 | outputs 0..16; a shared term is built in the first output of a pair and copied |
//!
//! Every source load of a block happens before the first destination store,
//! so `src == dst` is safe.
//!
//! # Frame
//!
//! `rbp` is saved; if the routine spills, `rsp` is lowered by one block and
//! rounded down to 64 bytes, and spilled plane `b` lives at `[rsp + b * w]`.
//! Under SysV every vector register is caller-saved. Under Win64 the entry
//! arguments arrive in `rcx, rdx, r8` and are moved into the SysV registers
//! the body uses (saving the callee-saved `rdi` and `rsi`), and the low 128
//! bits of xmm6..xmm15 are stored above the spill area and reloaded before
//! returning.

use super::asm::{Assembler, Gpr, Isa};
use crate::depends::DependencyTable;

/// Shared-term threshold for an output pair.
const CSE_MIN_SHARED: u32 = 2;

/// First output register of the AVX-512 plan.
const OUT: u8 = 16;

/// Parameters one routine is specialized for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct RoutineKey {
  pub value: u16,
  pub accumulate: bool,
  /// Source and destination blocks start on a vector boundary.
  pub aligned: bool,
}

/// Calling convention of a routine's entry point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Abi {
  SysV,
  Win64,
}

impl Abi {
  /// Convention of [`RegionFn`](super::buffer::RegionFn) on this target.
  pub(crate) const NATIVE: Self = if cfg!(windows) { Self::Win64 } else { Self::SysV };

  /// Vector registers whose low 128 bits the callee must preserve.
  const fn saved_xmm(self) -> core::ops::Range<u8> {
    match self {
      Self::SysV => 0..0,
      Self::Win64 => 6..16,
    }
  }
}

/// Routine generation options fixed for a handle's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct CodegenOptions {
  pub isa: Isa,
  pub cse: bool,
  pub abi: Abi,
}

/// Set bits of a dependency row, lowest first.
struct Planes(u16);

impl Iterator for Planes {
  type Item = u8;

  fn next(&mut self) -> Option<u8> {
    if self.0 == 0 {
      return None;
    }
    let k = self.0.trailing_zeros() as u8;
    self.0 &= self.0 - 1;
    Some(k)
  }
}

/// Stack frame of one routine.
struct Frame {
  abi: Abi,
  /// Bytes of spilled output planes at `[rsp]`.
  spill: i32,
}

impl Frame {
  /// Saved xmm registers and their slots, above the spill area.
  fn saves(&self) -> impl Iterator<Item = (u8, i32)> + use<> {
    let spill = self.spill;
    self.abi.saved_xmm().map(move |reg| (reg, spill + 16 * i32::from(reg - 6)))
  }

  fn size(&self) -> i32 {
    self.spill + 16 * self.abi.saved_xmm().len() as i32
  }

  fn enter(&self, asm: &mut Assembler) {
    asm.push(Gpr::Rbp);
    asm.mov_gpr(Gpr::Rbp, Gpr::Rsp);
    if self.abi == Abi::Win64 {
      asm.push(Gpr::Rdi);
      asm.push(Gpr::Rsi);
      asm.mov_gpr(Gpr::Rdi, Gpr::Rcx);
      asm.mov_gpr(Gpr::Rsi, Gpr::Rdx);
      asm.mov_gpr(Gpr::Rdx, Gpr::R8);
    }
    if self.size() > 0 {
      asm.sub_imm(Gpr::Rsp, self.size());
      asm.align_rsp_64();
    }
    for (reg, disp) in self.saves() {
      asm.save_xmm(Gpr::Rsp, disp, reg);
    }
  }

  /// Restore and return. Runs after `vzeroupper`, so the legacy reloads
  /// leave the upper halves clear.
  fn leave(&self, asm: &mut Assembler) {
    for (reg, disp) in self.saves() {
      asm.restore_xmm(reg, Gpr::Rsp, disp);
    }
    match self.abi {
      Abi::SysV => asm.mov_gpr(Gpr::Rsp, Gpr::Rbp),
      Abi::Win64 => {
        asm.lea(Gpr::Rsp, Gpr::Rbp, -16);
        asm.pop(Gpr::Rsi);
        asm.pop(Gpr::Rdi);
      }
    }
    asm.pop(Gpr::Rbp);
    asm.ret();
  }
}

struct Emitter {
  asm: Assembler,
  w: i32,
  aligned: bool,
}

impl Emitter {
  /// `reg = XOR of the source planes in mask`, optionally seeded from `seed`.
  fn row(&mut self, reg: u8, mask: u16, seed: Option<u8>) {
    let mut planes = Planes(mask);
    match seed {
      Some(s) => self.asm.mov(reg, s),
      None => match planes.next() {
        Some(k) => self.asm.load(reg, Gpr::Rdi, i32::from(k) * self.w, self.aligned),
        None => {
          self.asm.zero(reg);
          return;
        }
      },
    }
    for k in planes {
      self.asm.xor_mem(reg, Gpr::Rdi, i32::from(k) * self.w, self.aligned);
    }
  }

  /// `reg = XOR of the resident input registers in mask`.
  fn combine(&mut self, reg: u8, mask: u16) {
    let mut planes = Planes(mask);
    match (planes.next(), planes.next()) {
      (None, _) => self.asm.zero(reg),
      (Some(k), None) => self.asm.mov(reg, k),
      (Some(j), Some(k)) => self.asm.xor3(reg, j, k),
    }
    for k in planes {
      self.asm.xor(reg, k);
    }
  }

  /// `reg ^= XOR of the resident input registers in mask`.
  fn fold(&mut self, reg: u8, mask: u16) {
    for k in Planes(mask) {
      self.asm.xor(reg, k);
    }
  }

  /// Outputs 0..8 through the stack, 8..16 in registers.
  fn spilled(&mut self, deps: &DependencyTable, key: RoutineKey, cse: bool) {
    let w = self.w;
    for pair in 0..8u8 {
      let (a, b) = (2 * pair, 2 * pair + 1);
      let (row_a, row_b) = (deps.row(usize::from(a)), deps.row(usize::from(b)));
      let (reg_a, reg_b) = if pair < 4 { (0, 1) } else { (a, b) };

      let shared = row_a & row_b;
      if cse && shared.count_ones() >= CSE_MIN_SHARED {
        self.row(3, shared, None);
        self.row(reg_a, row_a & !shared, Some(3));
        self.row(reg_b, row_b & !shared, Some(3));
      } else {
        self.row(reg_a, row_a, None);
        self.row(reg_b, row_b, None);
      }

      if pair < 4 {
        self.asm.store(Gpr::Rsp, i32::from(a) * w, reg_a, true);
        self.asm.store(Gpr::Rsp, i32::from(b) * w, reg_b, true);
      }
    }

    for plane in 0..16u8 {
      let disp = i32::from(plane) * w;
      let reg = if plane < 8 {
        self.asm.load(0, Gpr::Rsp, disp, true);
        0
      } else {
        plane
      };
      if key.accumulate {
        self.asm.xor_mem(reg, Gpr::Rsi, disp, key.aligned);
      }
      self.asm.store(Gpr::Rsi, disp, reg, key.aligned);
    }
  }

  /// All inputs and outputs in registers.
  fn resident(&mut self, deps: &DependencyTable, key: RoutineKey, cse: bool) {
    let w = self.w;
    let used = (0..16).fold(0u16, |m, b| m | deps.row(b));
    for k in Planes(used) {
      self.asm.load(k, Gpr::Rdi, i32::from(k) * w, key.aligned);
    }

    for pair in 0..8u8 {
      let (a, b) = (2 * pair, 2 * pair + 1);
      let (row_a, row_b) = (deps.row(usize::from(a)), deps.row(usize::from(b)));
      let (reg_a, reg_b) = (OUT + a, OUT + b);

      let shared = row_a & row_b;
      if cse && shared.count_ones() >= CSE_MIN_SHARED {
        self.combine(reg_a, shared);
        self.asm.mov(reg_b, reg_a);
        self.fold(reg_a, row_a & !shared);
        self.fold(reg_b, row_b & !shared);
      } else {
        self.combine(reg_a, row_a);
        self.combine(reg_b, row_b);
      }
    }

    for plane in 0..16u8 {
      let disp = i32::from(plane) * w;
      let reg = OUT + plane;
      if key.accumulate {
        self.asm.xor_mem(reg, Gpr::Rsi, disp, key.aligned);
      }
      self.asm.store(Gpr::Rsi, disp, reg, key.aligned);
    }
  }
}

/// Generate a complete routine for `deps`.
#[must_use]
pub(crate) fn generate(deps: &DependencyTable, key: RoutineKey, options: CodegenOptions) -> Vec<u8> {
  let w = options.isa.lanes() as i32;
  let block = 16 * w;
  let resident = options.isa.registers() >= OUT + 16;
  let frame = Frame {
    abi: options.abi,
    spill: if resident { 0 } else { block },
  };
  let mut e = Emitter {
    asm: Assembler::new(options.isa),
    w,
    aligned: key.aligned,
  };

  frame.enter(&mut e.asm);
  let top = e.asm.position();

  if resident {
    e.resident(deps, key, options.cse);
  } else {
    e.spilled(deps, key, options.cse);
  }

  e.asm.add_imm(Gpr::Rdi, block);
  e.asm.add_imm(Gpr::Rsi, block);
  e.asm.cmp(Gpr::Rdi, Gpr::Rdx);
  e.asm.jb(top);

  if options.isa != Isa::Sse2 {
    e.asm.vzeroupper();
  }
  frame.leave(&mut e.asm);

  e.asm.finish()
}
