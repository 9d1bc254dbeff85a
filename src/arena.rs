//! Owns the contiguous heap region by driving the program break.
//!
//! Grows via `sbrk`, with a recorded initial break so the arena can be
//! [`reset`](Arena::reset) back to where it started.

use libc::{c_void, intptr_t, sbrk};

/// The break primitive refused to grow the heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfMemory;

/// Owns the process's program-break-backed heap region.
pub struct Arena {
  /// The break address recorded the first time this arena grows. `None`
  /// before the first allocation; restored to `None` by [`reset`](Arena::reset).
  initial_break: Option<usize>,
}

impl Arena {
  pub const fn new() -> Self {
    Self { initial_break: None }
  }

  /// Advances the break by `n_bytes` and returns the address the new region
  /// begins at. Captures the initial break on the first call. Leaves the
  /// break unchanged on failure.
  pub fn grow(&mut self, n_bytes: usize) -> Result<usize, OutOfMemory> {
    unsafe {
      let current = sbrk(0);
      if current as isize == -1 {
        return Err(OutOfMemory);
      }
      if self.initial_break.is_none() {
        self.initial_break = Some(current as usize);
      }

      let start = sbrk(n_bytes as intptr_t);
      if start as usize == usize::MAX {
        log::warn!("arena: sbrk({n_bytes}) failed, out of memory");
        return Err(OutOfMemory);
      }

      log::trace!("arena: grew by {n_bytes} bytes at {start:p}, break now {:p}", sbrk(0));
      Ok(start as usize)
    }
  }

  /// Restores the break to the value recorded on the first [`grow`](Arena::grow)
  /// call, and forgets it again. A no-op if the arena never grew. After this
  /// call, every outstanding payload pointer handed out by the engine that
  /// owns this arena is invalid; the engine does not detect use-after-reset.
  pub fn reset(&mut self) {
    if let Some(base) = self.initial_break.take() {
      unsafe {
        libc::brk(base as *mut c_void);
      }
      log::debug!("arena: reset to {base:#x}");
    }
  }
}

impl Default for Arena {
  fn default() -> Self {
    Self::new()
  }
}
