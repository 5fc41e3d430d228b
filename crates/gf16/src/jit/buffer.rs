//! Executable code buffer.
//!
//! The only place that touches page permissions. A buffer is either writable
//! or executable, never both:
//!
//! ```text
//!   new ──► [writable] ──emit*──► finalize ──► [executable] ──begin──► [writable] ...
//! ```
//!
//! Generated code is only reachable through the typed [`RegionFn`] returned
//! by [`CodeBuffer::finalize`], which is invalidated by the next `begin`.
//! Pages come from `mmap`/`mprotect` on Unix and `VirtualAlloc`/`VirtualProtect`
//! on Windows.

#![allow(unsafe_code)]

use core::ptr::NonNull;

use crate::error::JitError;

/// Entry point of a generated region routine.
///
/// Arguments: source block pointer, destination block pointer, source end.
/// Processes whole blocks until the source pointer reaches the end.
#[cfg(unix)]
pub(crate) type RegionFn = unsafe extern "sysv64" fn(*const u8, *mut u8, *const u8);

/// Entry point of a generated region routine.
///
/// Arguments: source block pointer, destination block pointer, source end.
/// Processes whole blocks until the source pointer reaches the end.
#[cfg(windows)]
pub(crate) type RegionFn = unsafe extern "win64" fn(*const u8, *mut u8, *const u8);

/// Default buffer capacity. The largest routine is well under half of this.
pub(crate) const CODE_CAPACITY: usize = 16 * 1024;

/// Page access a buffer is switched between.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Access {
  ReadWrite,
  ReadExecute,
}

#[cfg(unix)]
mod sys {
  use core::ptr::NonNull;

  use super::Access;
  use crate::error::JitError;

  fn last_errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
  }

  pub(super) fn map(capacity: usize) -> Result<NonNull<u8>, JitError> {
    // SAFETY: Anonymous mapping with no address hint; the result is checked.
    let ptr = unsafe {
      libc::mmap(
        core::ptr::null_mut(),
        capacity,
        libc::PROT_READ | libc::PROT_WRITE,
        libc::MAP_PRIVATE | libc::MAP_ANON,
        -1,
        0,
      )
    };
    if ptr == libc::MAP_FAILED {
      return Err(JitError::Map(last_errno()));
    }
    NonNull::new(ptr.cast::<u8>()).ok_or(JitError::Map(0))
  }

  /// # Safety
  ///
  /// `ptr` and `capacity` describe a live mapping returned by [`map`].
  pub(super) unsafe fn protect(ptr: NonNull<u8>, capacity: usize, access: Access) -> Result<(), JitError> {
    let prot = match access {
      Access::ReadWrite => libc::PROT_READ | libc::PROT_WRITE,
      Access::ReadExecute => libc::PROT_READ | libc::PROT_EXEC,
    };
    // SAFETY: The range is exactly the caller's mapping.
    let rc = unsafe { libc::mprotect(ptr.as_ptr().cast(), capacity, prot) };
    if rc != 0 {
      return Err(JitError::Protect(last_errno()));
    }
    Ok(())
  }

  /// # Safety
  ///
  /// As for [`protect`]; nothing refers to the mapping afterwards.
  pub(super) unsafe fn unmap(ptr: NonNull<u8>, capacity: usize) {
    // SAFETY: Forwarded caller contract.
    unsafe {
      libc::munmap(ptr.as_ptr().cast(), capacity);
    }
  }
}

#[cfg(windows)]
mod sys {
  use core::ptr::NonNull;

  use windows_sys::Win32::{
    Foundation::GetLastError,
    System::{
      Diagnostics::Debug::FlushInstructionCache,
      Memory::{
        MEM_COMMIT, MEM_RELEASE, MEM_RESERVE, PAGE_EXECUTE_READ, PAGE_PROTECTION_FLAGS, PAGE_READWRITE, VirtualAlloc,
        VirtualFree, VirtualProtect,
      },
      Threading::GetCurrentProcess,
    },
  };

  use super::Access;
  use crate::error::JitError;

  fn last_error() -> i32 {
    // SAFETY: Reads the calling thread's last-error slot.
    unsafe { GetLastError() as i32 }
  }

  pub(super) fn map(capacity: usize) -> Result<NonNull<u8>, JitError> {
    // SAFETY: Fresh reservation with no address hint; the result is checked.
    let ptr = unsafe { VirtualAlloc(core::ptr::null(), capacity, MEM_COMMIT | MEM_RESERVE, PAGE_READWRITE) };
    NonNull::new(ptr.cast::<u8>()).ok_or_else(|| JitError::Map(last_error()))
  }

  /// # Safety
  ///
  /// `ptr` and `capacity` describe a live allocation returned by [`map`].
  pub(super) unsafe fn protect(ptr: NonNull<u8>, capacity: usize, access: Access) -> Result<(), JitError> {
    let flags = match access {
      Access::ReadWrite => PAGE_READWRITE,
      Access::ReadExecute => PAGE_EXECUTE_READ,
    };
    let mut previous: PAGE_PROTECTION_FLAGS = 0;
    // SAFETY: The range is exactly the caller's allocation.
    let ok = unsafe { VirtualProtect(ptr.as_ptr().cast_const().cast(), capacity, flags, &mut previous) };
    if ok == 0 {
      return Err(JitError::Protect(last_error()));
    }
    if access == Access::ReadExecute {
      // SAFETY: Flushes our own range in the current process.
      unsafe { FlushInstructionCache(GetCurrentProcess(), ptr.as_ptr().cast_const().cast(), capacity) };
    }
    Ok(())
  }

  /// # Safety
  ///
  /// As for [`protect`]; nothing refers to the allocation afterwards.
  pub(super) unsafe fn unmap(ptr: NonNull<u8>, _capacity: usize) {
    // SAFETY: Forwarded caller contract. MEM_RELEASE takes a zero size.
    unsafe {
      VirtualFree(ptr.as_ptr().cast(), 0, MEM_RELEASE);
    }
  }
}

/// Private page mapping holding one generated routine.
pub(crate) struct CodeBuffer {
  ptr: NonNull<u8>,
  capacity: usize,
  len: usize,
  executable: bool,
}

// SAFETY: The mapping is owned exclusively; no thread-affine state.
unsafe impl Send for CodeBuffer {}

impl core::fmt::Debug for CodeBuffer {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("CodeBuffer")
      .field("capacity", &self.capacity)
      .field("len", &self.len)
      .field("executable", &self.executable)
      .finish()
  }
}

impl CodeBuffer {
  /// Map `capacity` bytes, readable and writable.
  pub(crate) fn new(capacity: usize) -> Result<Self, JitError> {
    Ok(Self {
      ptr: sys::map(capacity)?,
      capacity,
      len: 0,
      executable: false,
    })
  }

  fn protect(&mut self, access: Access) -> Result<(), JitError> {
    // SAFETY: ptr and capacity are our own live mapping.
    unsafe { sys::protect(self.ptr, self.capacity, access) }
  }

  /// Make the buffer writable and empty. Invalidates the previous entry point.
  pub(crate) fn begin(&mut self) -> Result<(), JitError> {
    if self.executable {
      self.protect(Access::ReadWrite)?;
      self.executable = false;
    }
    self.len = 0;
    Ok(())
  }

  /// Append encoded instructions.
  pub(crate) fn emit(&mut self, bytes: &[u8]) -> Result<(), JitError> {
    debug_assert!(!self.executable, "emit into a finalized buffer");
    let needed = self.len + bytes.len();
    if needed > self.capacity || self.executable {
      return Err(JitError::Overflow {
        needed,
        capacity: self.capacity,
      });
    }
    // SAFETY: The destination range is inside the writable mapping.
    unsafe {
      core::ptr::copy_nonoverlapping(bytes.as_ptr(), self.ptr.as_ptr().add(self.len), bytes.len());
    }
    self.len = needed;
    Ok(())
  }

  /// Flip the buffer to read + execute and return its entry point.
  ///
  /// The caller must have emitted a complete routine with the [`RegionFn`]
  /// calling convention.
  pub(crate) fn finalize(&mut self) -> Result<RegionFn, JitError> {
    self.protect(Access::ReadExecute)?;
    self.executable = true;
    // SAFETY: The mapping is executable and starts with a routine using the
    // RegionFn signature. x86 keeps instruction and data caches coherent.
    Ok(unsafe { core::mem::transmute::<*mut u8, RegionFn>(self.ptr.as_ptr()) })
  }

  #[cfg(test)]
  pub(crate) fn len(&self) -> usize {
    self.len
  }

  #[cfg(test)]
  pub(crate) fn capacity(&self) -> usize {
    self.capacity
  }
}

impl Drop for CodeBuffer {
  fn drop(&mut self) {
    // SAFETY: Unmapping our own mapping once; nothing refers to it afterwards.
    unsafe { sys::unmap(self.ptr, self.capacity) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn emit_respects_capacity() {
    let mut buf = CodeBuffer::new(4096).unwrap();
    buf.emit(&[0xC3; 4000]).unwrap();
    assert_eq!(buf.len(), 4000);
    assert_eq!(
      buf.emit(&[0x90; 100]),
      Err(JitError::Overflow {
        needed: 4100,
        capacity: 4096
      })
    );
    assert_eq!(buf.len(), 4000);
  }

  #[test]
  fn finalized_routine_runs() {
    let mut buf = CodeBuffer::new(CODE_CAPACITY).unwrap();
    assert_eq!(buf.capacity(), CODE_CAPACITY);
    buf.begin().unwrap();
    buf.emit(&[0xC3]).unwrap(); // ret
    let entry = buf.finalize().unwrap();
    // SAFETY: The routine is a bare `ret`; arguments are ignored.
    unsafe { entry(core::ptr::null(), core::ptr::null_mut(), core::ptr::null()) };

    // Rewriting after execution goes back through `begin`.
    buf.begin().unwrap();
    assert_eq!(buf.len(), 0);
    buf.emit(&[0xC3]).unwrap();
    let entry = buf.finalize().unwrap();
    // SAFETY: As above.
    unsafe { entry(core::ptr::null(), core::ptr::null_mut(), core::ptr::null()) };
  }
}
