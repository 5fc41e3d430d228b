//! Minimal x86_64 encoder for the instructions region routines use.
//!
//! Vector operations come in three flavors selected by [`Isa`]: legacy SSE2
//! encodings on xmm registers, 256-bit VEX encodings on ymm registers, or
//! 512-bit EVEX encodings on zmm registers. Memory operands are always
//! `[base + disp]` with a general-purpose base.

/// Vector instruction set a routine targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum Isa {
  Sse2,
  Avx2,
  Avx512,
}

impl Isa {
  /// Vector register width in bytes.
  #[inline]
  pub(crate) const fn lanes(self) -> usize {
    match self {
      Self::Sse2 => 16,
      Self::Avx2 => 32,
      Self::Avx512 => 64,
    }
  }

  /// Addressable vector registers.
  #[inline]
  pub(crate) const fn registers(self) -> u8 {
    match self {
      Self::Sse2 | Self::Avx2 => 16,
      Self::Avx512 => 32,
    }
  }
}

/// General-purpose registers, by encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum Gpr {
  Rcx = 1,
  Rdx = 2,
  Rsp = 4,
  Rbp = 5,
  Rsi = 6,
  Rdi = 7,
  R8 = 8,
}

/// Vector register holding loads for SSE2 when memory operands may be unaligned.
pub(crate) const TEMP: u8 = 2;

// Opcodes in the 0F map.
const MOVDQ_LOAD: u8 = 0x6F;
const MOVDQ_STORE: u8 = 0x7F;
const PXOR: u8 = 0xEF;

/// Mandatory prefix of a vector instruction.
#[derive(Clone, Copy)]
enum Prefix {
  /// 0x66: movdqa, pxor.
  Op66,
  /// 0xF3: movdqu.
  OpF3,
}

impl Prefix {
  const fn legacy(self) -> u8 {
    match self {
      Self::Op66 => 0x66,
      Self::OpF3 => 0xF3,
    }
  }

  const fn pp(self) -> u8 {
    match self {
      Self::Op66 => 0b01,
      Self::OpF3 => 0b10,
    }
  }
}

/// ModRM operand: a register or `[base + disp]`.
#[derive(Clone, Copy)]
enum Rm {
  Reg(u8),
  Mem(Gpr, i32),
}

impl Rm {
  /// Low three bits of the `rm` field's register.
  const fn low(self) -> u8 {
    match self {
      Self::Reg(r) => r & 7,
      Self::Mem(base, _) => (base as u8) & 7,
    }
  }

  /// Register bit 3 (REX.B / VEX.B / EVEX.B).
  const fn b(self) -> u8 {
    match self {
      Self::Reg(r) => (r >> 3) & 1,
      Self::Mem(base, _) => ((base as u8) >> 3) & 1,
    }
  }

  /// Register bit 4, carried in EVEX.X for register operands.
  const fn x(self) -> u8 {
    match self {
      Self::Reg(r) => (r >> 4) & 1,
      Self::Mem(..) => 0,
    }
  }
}

/// Appends encoded instructions to a byte vector.
#[derive(Debug)]
pub(crate) struct Assembler {
  isa: Isa,
  code: Vec<u8>,
}

impl Assembler {
  pub(crate) fn new(isa: Isa) -> Self {
    Self {
      isa,
      code: Vec::with_capacity(4096),
    }
  }

  #[inline]
  pub(crate) fn position(&self) -> usize {
    self.code.len()
  }

  pub(crate) fn finish(self) -> Vec<u8> {
    self.code
  }

  #[inline]
  fn byte(&mut self, b: u8) {
    self.code.push(b);
  }

  #[inline]
  fn imm32(&mut self, v: i32) {
    self.code.extend_from_slice(&v.to_le_bytes());
  }

  /// ModRM (+ SIB + displacement) for `reg` and `rm`.
  ///
  /// An 8-bit displacement is stored divided by `scale`, so EVEX passes the
  /// operand size (disp8*N) and everything else passes 1.
  fn modrm(&mut self, reg: u8, rm: Rm, scale: i32) {
    match rm {
      Rm::Reg(_) => self.byte(0xC0 | ((reg & 7) << 3) | rm.low()),
      Rm::Mem(base, disp) => {
        let short = if disp % scale == 0 {
          i8::try_from(disp / scale).ok()
        } else {
          None
        };
        let mode = match short {
          _ if disp == 0 && base != Gpr::Rbp => 0b00,
          Some(_) => 0b01,
          None => 0b10,
        };
        self.byte((mode << 6) | ((reg & 7) << 3) | rm.low());
        if base == Gpr::Rsp {
          // SIB: no index, base rsp.
          self.byte(0x24);
        }
        match (mode, short) {
          (0b01, Some(d)) => self.byte(d as u8),
          (0b10, _) => self.imm32(disp),
          _ => {}
        }
      }
    }
  }

  /// Legacy SSE encoding: prefix, optional REX, 0F, opcode, ModRM.
  fn sse(&mut self, prefix: Prefix, opcode: u8, reg: u8, rm: Rm) {
    debug_assert!(reg < 16);
    self.byte(prefix.legacy());
    let rex = 0x40 | ((reg >> 3) << 2) | rm.b();
    if rex != 0x40 {
      self.byte(rex);
    }
    self.byte(0x0F);
    self.byte(opcode);
    self.modrm(reg, rm, 1);
  }

  /// Three-byte VEX encoding, 0F map, W0, L=256.
  fn vex(&mut self, prefix: Prefix, opcode: u8, reg: u8, vvvv: u8, rm: Rm) {
    debug_assert!(reg < 16 && vvvv < 16);
    let r = reg >> 3;
    self.byte(0xC4);
    // Inverted R, X, B; map 0F.
    self.byte((((r ^ 1) & 1) << 7) | (1 << 6) | (((rm.b() ^ 1) & 1) << 5) | 0b00001);
    self.byte(((!vvvv & 0xF) << 3) | (1 << 2) | prefix.pp());
    self.byte(opcode);
    self.modrm(reg, rm, 1);
  }

  /// Four-byte EVEX encoding, 0F map, W1, L'L=512, no masking or broadcast.
  fn evex(&mut self, prefix: Prefix, opcode: u8, reg: u8, vvvv: u8, rm: Rm) {
    debug_assert!(reg < 32 && vvvv < 32);
    let (r, r_hi) = ((reg >> 3) & 1, (reg >> 4) & 1);
    self.byte(0x62);
    // P0: inverted R, X, B, R'; map 0F.
    self.byte(((r ^ 1) << 7) | ((rm.x() ^ 1) << 6) | ((rm.b() ^ 1) << 5) | ((r_hi ^ 1) << 4) | 0b0001);
    // P1: W1, inverted vvvv, fixed 1, pp.
    self.byte((1 << 7) | ((!vvvv & 0xF) << 3) | (1 << 2) | prefix.pp());
    // P2: z=0, L'L=10, b=0, inverted V', aaa=0.
    self.byte((0b10 << 5) | ((((vvvv >> 4) & 1) ^ 1) << 3));
    self.byte(opcode);
    self.modrm(reg, rm, Isa::Avx512.lanes() as i32);
  }

  fn vector(&mut self, prefix: Prefix, opcode: u8, reg: u8, vvvv: u8, rm: Rm) {
    match self.isa {
      Isa::Sse2 => self.sse(prefix, opcode, reg, rm),
      Isa::Avx2 => self.vex(prefix, opcode, reg, vvvv, rm),
      Isa::Avx512 => self.evex(prefix, opcode, reg, vvvv, rm),
    }
  }

  // ── Vector operations ─────────────────────────────────────────────────────

  /// `reg = [base + disp]`.
  pub(crate) fn load(&mut self, reg: u8, base: Gpr, disp: i32, aligned: bool) {
    let prefix = if aligned { Prefix::Op66 } else { Prefix::OpF3 };
    self.vector(prefix, MOVDQ_LOAD, reg, 0, Rm::Mem(base, disp));
  }

  /// `[base + disp] = reg`.
  pub(crate) fn store(&mut self, base: Gpr, disp: i32, reg: u8, aligned: bool) {
    let prefix = if aligned { Prefix::Op66 } else { Prefix::OpF3 };
    self.vector(prefix, MOVDQ_STORE, reg, 0, Rm::Mem(base, disp));
  }

  /// `dst = src`.
  pub(crate) fn mov(&mut self, dst: u8, src: u8) {
    self.vector(Prefix::Op66, MOVDQ_LOAD, dst, 0, Rm::Reg(src));
  }

  /// `dst ^= src`.
  pub(crate) fn xor(&mut self, dst: u8, src: u8) {
    self.vector(Prefix::Op66, PXOR, dst, dst, Rm::Reg(src));
  }

  /// `dst = a ^ b`. Needs a three-operand encoding.
  pub(crate) fn xor3(&mut self, dst: u8, a: u8, b: u8) {
    debug_assert_ne!(self.isa, Isa::Sse2, "SSE2 has no three-operand pxor");
    self.vector(Prefix::Op66, PXOR, dst, a, Rm::Reg(b));
  }

  /// `reg = 0`.
  pub(crate) fn zero(&mut self, reg: u8) {
    self.xor(reg, reg);
  }

  /// `reg ^= [base + disp]`.
  ///
  /// SSE2 memory operands must be 16-byte aligned, so unaligned operands go
  /// through [`TEMP`]. VEX and EVEX memory operands have no alignment
  /// requirement.
  pub(crate) fn xor_mem(&mut self, reg: u8, base: Gpr, disp: i32, aligned: bool) {
    if self.isa == Isa::Sse2 && !aligned {
      debug_assert_ne!(reg, TEMP);
      self.load(TEMP, base, disp, false);
      self.xor(reg, TEMP);
    } else {
      self.vector(Prefix::Op66, PXOR, reg, reg, Rm::Mem(base, disp));
    }
  }

  /// `movdqa [base + disp], xmm` in the legacy encoding, whatever the ISA.
  ///
  /// Saves the low 128 bits of a callee-saved register.
  pub(crate) fn save_xmm(&mut self, base: Gpr, disp: i32, reg: u8) {
    self.sse(Prefix::Op66, MOVDQ_STORE, reg, Rm::Mem(base, disp));
  }

  /// `movdqa xmm, [base + disp]` in the legacy encoding, whatever the ISA.
  pub(crate) fn restore_xmm(&mut self, reg: u8, base: Gpr, disp: i32) {
    self.sse(Prefix::Op66, MOVDQ_LOAD, reg, Rm::Mem(base, disp));
  }

  /// Clear the upper vector state before returning to SSE code.
  pub(crate) fn vzeroupper(&mut self) {
    self.code.extend_from_slice(&[0xC5, 0xF8, 0x77]);
  }

  // ── Integer and control flow ──────────────────────────────────────────────

  pub(crate) fn push(&mut self, reg: Gpr) {
    debug_assert!((reg as u8) < 8);
    self.byte(0x50 | reg as u8);
  }

  pub(crate) fn pop(&mut self, reg: Gpr) {
    debug_assert!((reg as u8) < 8);
    self.byte(0x58 | reg as u8);
  }

  /// `mov dst, src` (64-bit).
  pub(crate) fn mov_gpr(&mut self, dst: Gpr, src: Gpr) {
    let (d, s) = (dst as u8, src as u8);
    self.byte(0x48 | ((s >> 3) << 2) | (d >> 3));
    self.byte(0x89);
    self.modrm(s, Rm::Reg(d), 1);
  }

  /// `lea dst, [base + disp]` (64-bit).
  pub(crate) fn lea(&mut self, dst: Gpr, base: Gpr, disp: i32) {
    debug_assert!((dst as u8) < 8 && (base as u8) < 8);
    self.byte(0x48);
    self.byte(0x8D);
    self.modrm(dst as u8, Rm::Mem(base, disp), 1);
  }

  /// `add reg, imm32` (64-bit).
  pub(crate) fn add_imm(&mut self, reg: Gpr, imm: i32) {
    debug_assert!((reg as u8) < 8);
    self.code.extend_from_slice(&[0x48, 0x81, 0xC0 | reg as u8]);
    self.imm32(imm);
  }

  /// `sub reg, imm32` (64-bit).
  pub(crate) fn sub_imm(&mut self, reg: Gpr, imm: i32) {
    debug_assert!((reg as u8) < 8);
    self.code.extend_from_slice(&[0x48, 0x81, 0xE8 | reg as u8]);
    self.imm32(imm);
  }

  /// `and rsp, -64`.
  pub(crate) fn align_rsp_64(&mut self) {
    self.code.extend_from_slice(&[0x48, 0x83, 0xE4, 0xC0]);
  }

  /// `cmp a, b` (64-bit), flags from `a - b`.
  pub(crate) fn cmp(&mut self, a: Gpr, b: Gpr) {
    self.code.extend_from_slice(&[0x48, 0x39, 0xC0 | ((b as u8) << 3) | a as u8]);
  }

  /// `jb target` with a 32-bit displacement.
  pub(crate) fn jb(&mut self, target: usize) {
    let next = self.position() + 6;
    let rel = target as i64 - next as i64;
    self.code.extend_from_slice(&[0x0F, 0x82]);
    self.imm32(rel as i32);
  }

  pub(crate) fn ret(&mut self) {
    self.byte(0xC3);
  }
}
