//! The allocator proper: `allocate`/`free`/`reallocate`/`zero_allocate`/`reset`.
//!
//! Ties `Arena` (growth), `Block` (header layout) and `Index` (free-block
//! placement) together, implementing splitting on reuse and forward-only
//! coalescing on free.

use std::mem;
use std::ptr;

use crate::align;
use crate::arena::{Arena, OutOfMemory};
use crate::block::{self, Header};
use crate::index::{Index, Policy};

const WORD: usize = mem::size_of::<usize>();

/// A free-block management engine: one arena plus its free-list index.
///
/// Carries no synchronisation of its own — callers needing concurrent access
/// must provide their own mutual exclusion, which is exactly what
/// [`crate::global::RAllocator`] does for the `#[global_allocator]` adapter.
pub struct Engine {
  arena: Arena,
  index: Index,
  policy: Policy,
  /// The highest-addressed block currently known to the engine, used or
  /// free. `null` before the first allocation.
  last_block: *mut Header,
}

unsafe impl Send for Engine {}

impl Engine {
  pub const fn new() -> Self {
    Self::with_policy(Policy::BestFit)
  }

  pub const fn with_policy(policy: Policy) -> Self {
    Self { arena: Arena::new(), index: Index::new(), policy, last_block: ptr::null_mut() }
  }

  /// Allocates at least `requested_bytes` bytes, word-aligned. Returns null
  /// for a non-positive request or if the arena fails to grow.
  pub fn allocate(&mut self, requested_bytes: isize) -> *mut u8 {
    if requested_bytes <= 0 {
      return ptr::null_mut();
    }
    let size = align!(requested_bytes as usize);
    self.allocate_aligned(size)
  }

  fn allocate_aligned(&mut self, size: usize) -> *mut u8 {
    let words = size / WORD;
    let found = self.index.find(words, self.policy);

    if !found.is_null() {
      unsafe {
        self.index.remove(found);

        let available = block::size(found);
        if available >= size + block::HEADER_SIZE + WORD {
          self.split(found, size);
        }

        block::set_used(found, true);
        log::trace!("engine: reused block at {found:p} ({size} bytes)");
        return block::payload_of(found);
      }
    }

    match self.arena.grow(block::HEADER_SIZE + size) {
      Ok(addr) => unsafe {
        let blk = addr as *mut Header;
        block::init_clear(blk);

        if !self.last_block.is_null() {
          block::set_last(self.last_block, false);
        }
        block::set_size(blk, size);
        block::set_used(blk, true);
        block::set_last(blk, true);
        self.last_block = blk;

        log::trace!("engine: grew arena, new block at {blk:p} ({size} bytes)");
        block::payload_of(blk)
      },
      Err(OutOfMemory) => {
        log::warn!("engine: allocate({size}) failed: out of memory");
        ptr::null_mut()
      }
    }
  }

  /// Splits `block` (currently sized `size(block)`) so its head becomes
  /// exactly `size` bytes and its remainder is inserted into the index as a
  /// new free block. Caller must ensure `block` is large enough (see the
  /// `available >=` check above).
  unsafe fn split(&mut self, block: *mut Header, size: usize) {
    unsafe {
      let tail_size = block::size(block) - size - block::HEADER_SIZE;
      let tail = (block as *mut u8).add(block::HEADER_SIZE + size) as *mut Header;

      block::init_clear(tail);
      block::set_size(tail, tail_size);
      block::set_used(tail, false);

      if block::is_last(block) {
        block::set_last(tail, true);
        block::set_last(block, false);
        self.last_block = tail;
      } else {
        block::set_last(tail, false);
      }

      block::set_size(block, size);
      self.index.insert(tail);
    }
  }

  /// Frees a payload pointer previously returned by `allocate`/`reallocate`/
  /// `zero_allocate`. A no-op on a null pointer. Passing a pointer not
  /// obtained from this engine is undefined behaviour; the engine does not
  /// validate.
  pub fn free(&mut self, payload: *mut u8) {
    if payload.is_null() {
      return;
    }

    unsafe {
      let block = block::block_of(payload);
      block::set_used(block, false);

      let next = block::next_by_address(block);
      if !next.is_null() && !block::used(next) {
        self.index.remove(next);

        let merged_size = block::size(block) + block::HEADER_SIZE + block::size(next);
        let next_was_last = block::is_last(next);

        block::set_size(block, merged_size);
        if next_was_last {
          block::set_last(block, true);
          if self.last_block == next {
            self.last_block = block;
          }
        }

        log::trace!("engine: coalesced block at {block:p} with its successor");
      }

      self.index.insert(block);
    }
  }

  /// If `new_bytes <= 0` or the block already has room, returns `payload`
  /// unchanged. Otherwise allocates a new, larger block, copies the old
  /// payload into it, frees the old block, and returns the new payload.
  /// A null `payload` is equivalent to `allocate(new_bytes)`.
  pub fn reallocate(&mut self, payload: *mut u8, new_bytes: isize) -> *mut u8 {
    if payload.is_null() {
      return self.allocate(new_bytes);
    }
    if new_bytes <= 0 {
      return payload;
    }

    unsafe {
      let block = block::block_of(payload);
      let current = block::size(block);
      let target = align!(new_bytes as usize);

      if current >= target {
        return payload;
      }

      let new_payload = self.allocate_aligned(target);
      if new_payload.is_null() {
        return ptr::null_mut();
      }

      ptr::copy_nonoverlapping(payload, new_payload, current.min(target));
      self.free(payload);
      new_payload
    }
  }

  /// Allocates `count * elem_size` bytes and zero-initialises them. Returns
  /// null if the product overflows or the underlying allocation fails.
  pub fn zero_allocate(&mut self, count: usize, elem_size: usize) -> *mut u8 {
    let total = match count.checked_mul(elem_size) {
      Some(total) => total,
      None => {
        log::warn!("engine: zero_allocate({count}, {elem_size}) overflows");
        return ptr::null_mut();
      }
    };

    let total_bytes = match isize::try_from(total) {
      Ok(v) => v,
      Err(_) => return ptr::null_mut(),
    };

    let payload = self.allocate(total_bytes);
    if !payload.is_null() {
      unsafe {
        let block = block::block_of(payload);
        ptr::write_bytes(payload, 0, block::size(block));
      }
    }
    payload
  }

  /// Restores the break to its initial value and drops all free-list state.
  /// After this call every outstanding payload pointer is invalid; the
  /// engine does not detect use-after-reset. Test/debug surface only.
  pub fn reset(&mut self) {
    self.arena.reset();
    self.index.clear();
    self.last_block = ptr::null_mut();
  }
}

impl Default for Engine {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Mutex;

  // `Engine::allocate`/`free` drive the real process break via `sbrk`/`brk`,
  // which is genuinely process-wide state shared by every thread. The Rust
  // test harness runs `#[test]` functions on separate threads by default, so
  // every test that touches an `Engine` takes this lock first to serialise
  // access to that shared OS resource.
  static SBRK_LOCK: Mutex<()> = Mutex::new(());

  fn with_fresh_engine<F: FnOnce(&mut Engine)>(policy: Policy, f: F) {
    let _guard = SBRK_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let mut engine = Engine::with_policy(policy);
    f(&mut engine);
    engine.reset();
  }

  #[test]
  fn allocate_rejects_non_positive_sizes() {
    with_fresh_engine(Policy::BestFit, |engine| {
      assert!(engine.allocate(0).is_null());
      assert!(engine.allocate(-1).is_null());
    });
  }

  #[test]
  fn allocate_returns_word_aligned_sized_block() {
    with_fresh_engine(Policy::BestFit, |engine| unsafe {
      let p = engine.allocate(1);
      assert!(!p.is_null());
      assert_eq!(p as usize % WORD, 0);
      assert_eq!(block::size(block::block_of(p)), WORD);
    });
  }

  #[test]
  fn free_then_allocate_same_size_reuses_the_block() {
    with_fresh_engine(Policy::BestFit, |engine| unsafe {
      let a = engine.allocate(1);
      let a_block = block::block_of(a);
      engine.free(a);

      let b = engine.allocate(WORD as isize);
      assert_eq!(block::block_of(b), a_block);
    });
  }

  #[test]
  fn free_null_is_a_no_op() {
    with_fresh_engine(Policy::BestFit, |engine| {
      engine.free(ptr::null_mut());
    });
  }

  #[test]
  fn best_fit_reuse_splits_a_free_tail() {
    with_fresh_engine(Policy::BestFit, |engine| unsafe {
      let big = engine.allocate(64);
      let _anchor = engine.allocate(8); // keeps `big` from being the last block
      engine.free(big);

      let small = engine.allocate(16);
      assert_eq!(block::block_of(small), block::block_of(big));
      assert_eq!(block::size(block::block_of(small)), 16);

      // tail = 64 - 16 - HEADER_SIZE
      let expected_tail = 64 - 16 - block::HEADER_SIZE;
      let tail_block = (small as *mut u8).add(16) as *mut Header;
      assert_eq!(block::size(tail_block), expected_tail);
      assert!(!block::used(tail_block));

      let next = engine.allocate(16);
      assert_eq!(next, small.add(16 + block::HEADER_SIZE));
    });
  }

  #[test]
  fn adjacent_frees_coalesce_forward() {
    with_fresh_engine(Policy::BestFit, |engine| unsafe {
      let m1 = engine.allocate(8);
      let m2 = engine.allocate(8);

      engine.free(m2);
      engine.free(m1);

      let merged = block::block_of(m1);
      assert_eq!(block::size(merged), 8 + 8 + block::HEADER_SIZE);
      assert!(!block::used(merged));

      let next = block::next_by_address(merged);
      assert!(next.is_null());
    });
  }

  #[test]
  fn reallocate_null_behaves_like_allocate() {
    with_fresh_engine(Policy::BestFit, |engine| unsafe {
      let p = engine.reallocate(ptr::null_mut(), 16);
      assert!(!p.is_null());
      assert_eq!(block::size(block::block_of(p)), 16);
    });
  }

  #[test]
  fn reallocate_shrink_or_equal_returns_same_pointer() {
    with_fresh_engine(Policy::BestFit, |engine| {
      let p = engine.allocate(64);
      let q = engine.reallocate(p, 32);
      assert_eq!(p, q);
      let r = engine.reallocate(p, 0);
      assert_eq!(p, r);
    });
  }

  #[test]
  fn reallocate_growth_preserves_prefix_and_may_move() {
    with_fresh_engine(Policy::BestFit, |engine| unsafe {
      let p = engine.allocate(16) as *mut u8;
      let pattern: [u8; 16] = std::array::from_fn(|i| i as u8);
      ptr::copy_nonoverlapping(pattern.as_ptr(), p, 16);

      let q = engine.reallocate(p, 64);
      assert!(!q.is_null());
      assert_eq!(block::size(block::block_of(q)), 64);

      let copied = std::slice::from_raw_parts(q, 16);
      assert_eq!(copied, &pattern);
    });
  }

  #[test]
  fn zero_allocate_zeroes_the_payload() {
    with_fresh_engine(Policy::BestFit, |engine| unsafe {
      let p = engine.zero_allocate(8, 4);
      assert!(!p.is_null());
      let bytes = std::slice::from_raw_parts(p, 32);
      assert!(bytes.iter().all(|&b| b == 0));
    });
  }

  #[test]
  fn zero_allocate_overflow_returns_null() {
    with_fresh_engine(Policy::BestFit, |engine| {
      let p = engine.zero_allocate(usize::MAX, 2);
      assert!(p.is_null());
    });
  }

  #[test]
  fn segregated_buckets_hold_expected_classes() {
    with_fresh_engine(Policy::BestFit, |engine| unsafe {
      let tiny = engine.allocate(8);
      assert_eq!(block::size(block::block_of(tiny)) / WORD, 1);

      let small = engine.allocate(125);
      assert_eq!(block::size(block::block_of(small)), 128);

      let huge = engine.allocate(1024);
      assert_eq!(block::size(block::block_of(huge)) / WORD, 128);
    });
  }

  #[test]
  fn reset_clears_index_and_last_block() {
    with_fresh_engine(Policy::BestFit, |engine| {
      let p = engine.allocate(32);
      engine.free(p);
      engine.reset();
      assert!(engine.last_block.is_null());

      let q = engine.allocate(32);
      assert!(!q.is_null());
      engine.free(q);
    });
  }
}
