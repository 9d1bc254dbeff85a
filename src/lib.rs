//! # rallocator - A Segregated Free-List Memory Allocator
//!
//! This crate provides a general-purpose dynamic memory allocator that serves
//! byte-granular allocation requests out of the process's program break,
//! grown and shrunk with `sbrk`/`brk` (via the `libc` crate).
//!
//! ## Overview
//!
//! Unlike a pure bump allocator, this engine *reuses* freed memory: every
//! freed block is kept in a segregated free-list index (five size-class
//! buckets) so later allocations can be carved out of it instead of always
//! extending the break.
//!
//! ```text
//!   Allocation Concept:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                         HEAP MEMORY                                  │
//!   │                                                                      │
//!   │   ┌─────┬─────┬─────┬─────┬───────────────────────────────────────┐  │
//!   │   │ A1  │free │ A3  │free │            Unallocated               │  │
//!   │   └─────┴─────┴─────┴─────┴───────────────────────────────────────┘  │
//!   │            ▲           ▲                                       ▲    │
//!   │            └── tracked in the Index, reused by future ───┘     │    │
//!   │                allocate() calls before the break grows    Program   │
//!   │                                                             Break   │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   rallocator
//!   ├── align   - Word-alignment macro (align!)
//!   ├── block   - Bit-packed block header: pure pointer functions
//!   ├── index   - Segregated free-list buckets + placement policies
//!   ├── arena   - Program-break ownership (grow/reset)
//!   ├── engine  - allocate/free/reallocate/zero_allocate/reset
//!   └── global  - GlobalAlloc adapter over one process-wide Engine
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use rallocator::Engine;
//!
//! let mut engine = Engine::new();
//!
//! unsafe {
//!     let ptr = engine.allocate(8) as *mut u64;
//!     assert!(!ptr.is_null());
//!
//!     *ptr = 42;
//!     assert_eq!(*ptr, 42);
//!
//!     engine.free(ptr as *mut u8);
//! }
//! # engine.reset();
//! ```
//!
//! Installed as the process's global allocator instead:
//!
//! ```rust,ignore
//! #[global_allocator]
//! static ALLOC: rallocator::RAllocator = rallocator::RAllocator;
//!
//! fn main() {
//!     let v = vec![1, 2, 3]; // routed through the engine above
//!     println!("{v:?}");
//! }
//! ```
//!
//! ## How It Works
//!
//! Every block is `[ one-word header | payload ]`; the header packs the
//! payload's word-aligned size together with a used flag and a
//! highest-address ("is last") flag into a single `usize`:
//!
//! ```text
//!   Single Block:
//!   ┌───────────┬────────────────────────────────┐
//!   │  Header   │         Payload                │
//!   │ (1 word)  │                                │
//!   │ size|U|L  │     N bytes, word-aligned       │
//!   └───────────┴────────────────────────────────┘
//!               ▲
//!               └── Pointer returned to the caller
//! ```
//!
//! On free, a block's address-order successor is merged into it if that
//! successor is itself free (forward-only coalescing — see `DESIGN.md` for
//! why this crate doesn't maintain a backward address-order chain). On
//! reuse, a free block larger than the request is split, and the remainder
//! goes back into the index.
//!
//! ## Features
//!
//! - **Free-block reuse**: freed memory is tracked and reused, not just bumped past.
//! - **Segregated buckets**: five size classes (`Tiny/Small/Mid/Big/Huge`), O(1) insert.
//! - **Splitting and coalescing**: bounded internal fragmentation on reuse and free.
//! - **Pluggable placement policy**: first-fit, next-fit, or best-fit (default).
//! - **`GlobalAlloc` adapter**: usable as `#[global_allocator]`.
//!
//! ## Limitations
//!
//! - **Single-threaded engine**: `Engine` itself has no internal locking; the
//!   `GlobalAlloc` adapter supplies a `Mutex` around one shared instance.
//! - **Forward-only coalescing**: a freed block only merges with its
//!   higher-addressed neighbour, never its lower-addressed one.
//! - **No return to the OS on free**: only `reset` (test/debug only) shrinks
//!   the break, back to its initial value.
//! - **Unix-only**: requires `libc` and `sbrk`/`brk` (POSIX systems).
//!
//! ## Safety
//!
//! This crate is inherently unsafe as it deals with raw memory management.
//! Most `Engine` operations are safe to *call* (the unsafety is internal,
//! around raw block pointers), but passing a pointer to `free`/`reallocate`
//! that wasn't returned by this same `Engine` is undefined behaviour; the
//! engine does not validate its inputs.

pub mod align;
mod arena;
mod block;
mod engine;
mod global;
mod index;

pub use arena::OutOfMemory;
pub use engine::Engine;
pub use global::RAllocator;
pub use index::Policy;
