//! Block header: a single bit-packed word in front of every payload.
//!
//! ```text
//!   [ header (1 word) | payload … ]
//!                      ^
//!                      payload_of(block)
//! ```
//!
//! The header word stores the payload size in its high bits and two flags in
//! its low bits (`USED`, `IS_LAST`). This is safe because every size handed to
//! [`set_size`] is already word-aligned, so its own low 3 bits are zero — we
//! only claim 2 of them.
//!
//! All functions here are pure address arithmetic over a block pointer; none
//! of them touch the Index (free-list bucket membership lives in
//! `crate::index`, which treats a free block's first payload word as its own
//! scratch space).

use std::mem;
use std::ptr;

/// Header flag: block is currently handed out to a caller.
const USED: usize = 0b01;
/// Header flag: block is the highest-addressed block in the arena.
const IS_LAST: usize = 0b10;
const FLAG_MASK: usize = USED | IS_LAST;

/// The one-word block header. Never constructed by value; always addressed
/// through a raw pointer into the arena.
#[repr(C)]
pub struct Header {
  word: usize,
}

/// Size, in bytes, of a block's header. Equal to the machine word size.
pub const HEADER_SIZE: usize = mem::size_of::<Header>();

/// Zeroes a block's raw header word. Called once, before any flag/size
/// setter, on every block freshly carved out of the arena or split off a
/// free tail — `sbrk`-backed memory is not guaranteed pre-zeroed by this
/// engine's contract, so headers are always initialised explicitly rather
/// than relying on the OS.
pub unsafe fn init_clear(block: *mut Header) {
  unsafe {
    (*block).word = 0;
  }
}

/// Returns the payload address for a block.
pub unsafe fn payload_of(block: *mut Header) -> *mut u8 {
  unsafe { (block as *mut u8).add(HEADER_SIZE) }
}

/// Returns the block header address for a payload pointer previously
/// returned by [`payload_of`].
pub unsafe fn block_of(payload: *mut u8) -> *mut Header {
  unsafe { payload.sub(HEADER_SIZE) as *mut Header }
}

/// Payload size in bytes (the header's flag bits masked off).
pub unsafe fn size(block: *mut Header) -> usize {
  unsafe { (*block).word & !FLAG_MASK }
}

/// Sets the payload size in bytes. `n` must already be word-aligned; its
/// flag bits are preserved.
pub unsafe fn set_size(block: *mut Header, n: usize) {
  debug_assert_eq!(n & FLAG_MASK, 0, "block size must be word-aligned");
  unsafe {
    (*block).word = n | ((*block).word & FLAG_MASK);
  }
}

/// Whether the block is currently allocated to a caller.
pub unsafe fn used(block: *mut Header) -> bool {
  unsafe { (*block).word & USED != 0 }
}

/// Marks the block used/free.
pub unsafe fn set_used(block: *mut Header, used: bool) {
  unsafe {
    if used {
      (*block).word |= USED;
    } else {
      (*block).word &= !USED;
    }
  }
}

/// Whether the block is the highest-addressed block in the arena.
pub unsafe fn is_last(block: *mut Header) -> bool {
  unsafe { (*block).word & IS_LAST != 0 }
}

/// Marks the block as the (not-)last block in address order.
pub unsafe fn set_last(block: *mut Header, last: bool) {
  unsafe {
    if last {
      (*block).word |= IS_LAST;
    } else {
      (*block).word &= !IS_LAST;
    }
  }
}

/// Returns the address-order successor of `block`, or null if `block` is the
/// last block in the arena.
pub unsafe fn next_by_address(block: *mut Header) -> *mut Header {
  unsafe {
    if is_last(block) {
      ptr::null_mut()
    } else {
      (block as *mut u8).add(HEADER_SIZE + size(block)) as *mut Header
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::alloc::{Layout, alloc, dealloc};

  unsafe fn fresh_block() -> (*mut Header, Layout) {
    let layout = Layout::from_size_align(HEADER_SIZE + 64, HEADER_SIZE).unwrap();
    let raw = unsafe { alloc(layout) } as *mut Header;
    unsafe {
      (*raw).word = 0;
    }
    (raw, layout)
  }

  #[test]
  fn size_and_flags_are_independent() {
    unsafe {
      let (block, layout) = fresh_block();

      set_size(block, 64);
      assert_eq!(size(block), 64);
      assert!(!used(block));
      assert!(!is_last(block));

      set_used(block, true);
      assert_eq!(size(block), 64);
      assert!(used(block));

      set_last(block, true);
      assert_eq!(size(block), 64);
      assert!(used(block));
      assert!(is_last(block));

      set_size(block, 128);
      assert_eq!(size(block), 128);
      assert!(used(block));
      assert!(is_last(block));

      dealloc(block as *mut u8, layout);
    }
  }

  #[test]
  fn payload_and_block_round_trip() {
    unsafe {
      let (block, layout) = fresh_block();
      set_size(block, 64);

      let payload = payload_of(block);
      assert_eq!(payload as usize, block as usize + HEADER_SIZE);
      assert_eq!(block_of(payload), block);

      dealloc(block as *mut u8, layout);
    }
  }

  #[test]
  fn next_by_address_is_null_when_last() {
    unsafe {
      let (block, layout) = fresh_block();
      set_size(block, 64);
      set_last(block, true);
      assert!(next_by_address(block).is_null());

      set_last(block, false);
      let next = next_by_address(block);
      assert_eq!(next as usize, block as usize + HEADER_SIZE + 64);

      dealloc(block as *mut u8, layout);
    }
  }
}
