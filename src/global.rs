//! `GlobalAlloc` adapter over one process-wide [`crate::Engine`].
//!
//! `Engine` itself holds no lock (see `crate::engine`); this module supplies
//! the one the whole process shares when the crate is installed as
//! `#[global_allocator]`.

use crate::engine::Engine;
use std::alloc::{GlobalAlloc, Layout};
use std::sync::{Mutex, OnceLock};

const WORD: usize = std::mem::size_of::<usize>();

/// A zero-sized `GlobalAlloc` handle. Every instance shares the same
/// lazily-initialised, mutex-guarded [`Engine`].
///
/// ```rust,ignore
/// #[global_allocator]
/// static ALLOC: rallocator::RAllocator = rallocator::RAllocator;
/// ```
pub struct RAllocator;

fn engine() -> &'static Mutex<Engine> {
  static ENGINE: OnceLock<Mutex<Engine>> = OnceLock::new();
  ENGINE.get_or_init(|| Mutex::new(Engine::new()))
}

unsafe impl GlobalAlloc for RAllocator {
  unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
    if layout.align() > WORD {
      return std::ptr::null_mut();
    }
    let Ok(size) = isize::try_from(layout.size()) else {
      return std::ptr::null_mut();
    };
    let mut engine = match engine().lock() {
      Ok(guard) => guard,
      Err(poisoned) => poisoned.into_inner(),
    };
    engine.allocate(size)
  }

  unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
    let mut engine = match engine().lock() {
      Ok(guard) => guard,
      Err(poisoned) => poisoned.into_inner(),
    };
    engine.free(ptr)
  }

  unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
    if layout.align() > WORD {
      return std::ptr::null_mut();
    }
    let Ok(new_size) = isize::try_from(new_size) else {
      return std::ptr::null_mut();
    };
    let mut engine = match engine().lock() {
      Ok(guard) => guard,
      Err(poisoned) => poisoned.into_inner(),
    };
    engine.reallocate(ptr, new_size)
  }

  unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
    if layout.align() > WORD {
      return std::ptr::null_mut();
    }
    let mut engine = match engine().lock() {
      Ok(guard) => guard,
      Err(poisoned) => poisoned.into_inner(),
    };
    engine.zero_allocate(1, layout.size())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Mutex as StdMutex;

  // sbrk/brk mutate real, process-wide OS state; serialize tests that touch
  // it the same way `engine::tests` does.
  static SBRK_LOCK: StdMutex<()> = StdMutex::new(());

  #[test]
  fn alloc_and_dealloc_round_trip() {
    let _guard = SBRK_LOCK.lock().unwrap();
    let alloc = RAllocator;
    let layout = Layout::from_size_align(32, 8).unwrap();
    unsafe {
      let ptr = alloc.alloc(layout);
      assert!(!ptr.is_null());
      ptr.write_bytes(0xAB, 32);
      alloc.dealloc(ptr, layout);
    }
    engine().lock().unwrap().reset();
  }

  #[test]
  fn alloc_rejects_overaligned_requests() {
    let _guard = SBRK_LOCK.lock().unwrap();
    let alloc = RAllocator;
    let layout = Layout::from_size_align(32, WORD * 2).unwrap();
    unsafe {
      assert!(alloc.alloc(layout).is_null());
    }
  }

  #[test]
  fn alloc_zeroed_returns_zeroed_memory() {
    let _guard = SBRK_LOCK.lock().unwrap();
    let alloc = RAllocator;
    let layout = Layout::from_size_align(16, 8).unwrap();
    unsafe {
      let ptr = alloc.alloc_zeroed(layout);
      assert!(!ptr.is_null());
      for i in 0..16 {
        assert_eq!(*ptr.add(i), 0);
      }
      alloc.dealloc(ptr, layout);
    }
    engine().lock().unwrap().reset();
  }
}
