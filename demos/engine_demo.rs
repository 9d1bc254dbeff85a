use std::io::Read;

use libc::sbrk;
use rallocator::Engine;

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`, `htop`,
/// `gdb`, or just visually track how allocations change the program break.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break using `sbrk(0)`.
/// The program break is the upper boundary of the heap managed via brk/sbrk.
unsafe fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { sbrk(0) },
  );
}

fn main() {
  env_logger::init();

  // Our engine. Unlike a pure bump allocator it holds:
  // - an arena (the program break it has claimed so far)
  // - an index of freed blocks, bucketed by size, ready for reuse
  let mut engine = Engine::new();

  unsafe {
    // Initial heap state
    print_program_break("start");
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 1) Allocate space for a u32 (4 bytes, rounded up to a full word).
    // --------------------------------------------------------------------
    let first_block = engine.allocate(4) as *mut u32;
    println!("\n[1] Allocate u32 -> {:?}", first_block);

    first_block.write(0xDEADBEEF);
    println!("[1] Value written to first_block = 0x{:X}", first_block.read());

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 2) Allocate 12 bytes (u8[12]).
    //    This shows how the engine handles "odd-sized" allocations.
    // --------------------------------------------------------------------
    let second_block = engine.allocate(12);
    println!("\n[2] Allocate [u8; 12] -> {:?}", second_block);

    std::ptr::write_bytes(second_block, 0xAB, 12);
    println!("[2] Initialized second block with 0xAB");

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 3) Allocate a u64 to test alignment (every payload this engine hands
    //    out is word-aligned, so an 8-byte value always lands cleanly).
    // --------------------------------------------------------------------
    let third_block = engine.allocate(8) as *mut u64;
    println!("\n[3] Allocate u64 (observe alignment) -> {:?}", third_block);

    third_block.write(0x1122334455667788);
    println!("[3] Value written = 0x{:X}", third_block.read());

    let addr_third = third_block as usize;
    println!(
      "[3] Address = {:#X}, addr % word size = {}",
      addr_third,
      addr_third % std::mem::size_of::<usize>()
    );

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 4) Free the first block, then allocate something smaller.
    //    Unlike a bump allocator this engine tracks the freed block in its
    //    index and hands it right back out.
    // --------------------------------------------------------------------
    engine.free(first_block as *mut u8);
    println!("\n[4] Freed first_block at {:?}", first_block);
    block_until_enter_pressed();

    let fourth_block = engine.allocate(2);
    println!("\n[5] Allocate [u8; 2] (check reuse of freed block)");
    println!(
      "[5] fourth_block == first_block? {}",
      if fourth_block == first_block as *mut u8 {
        "Yes, it reused the freed block"
      } else {
        "No, it allocated somewhere else"
      }
    );

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 5) Allocate a bigger block than the one just freed, to watch a free
    //    block get split into a used head and a free tail.
    // --------------------------------------------------------------------
    let big = engine.allocate(64);
    let _anchor = engine.allocate(8); // keeps `big` from being the arena's last block
    engine.free(big);

    let split_head = engine.allocate(16);
    println!(
      "\n[6] Reused the freed 64-byte block for a 16-byte request -> {:?}",
      split_head
    );
    println!("[6] split_head == big? {}", split_head == big);

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 6) Free two adjacent blocks to watch forward coalescing merge them
    //    back into one larger free block.
    // --------------------------------------------------------------------
    let left = engine.allocate(8);
    let right = engine.allocate(8);
    engine.free(right);
    engine.free(left);
    println!("\n[7] Freed two adjacent 8-byte blocks; they coalesce into one");

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 7) Reallocate: grow a block in place logically (may move).
    // --------------------------------------------------------------------
    let small = engine.allocate(16);
    std::ptr::write_bytes(small, 0x42, 16);
    let grown = engine.reallocate(small, 256);
    println!("\n[8] Reallocated 16 bytes -> 256 bytes, moved: {}", grown != small);

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 8) Zero-allocate, mirroring calloc.
    // --------------------------------------------------------------------
    let zeroed = engine.zero_allocate(8, 4);
    let bytes = std::slice::from_raw_parts(zeroed, 32);
    println!("\n[9] zero_allocate(8, 4) -> all zero: {}", bytes.iter().all(|&b| b == 0));

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 9) Allocate a large block to observe heap growth.
    // --------------------------------------------------------------------
    print_program_break("before large alloc");

    let big_block = engine.allocate(64 * 1024);
    println!("\n[10] Allocate large 64 KiB block -> {:?}", big_block);

    print_program_break("after large alloc");
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 10) End of demo: reset the engine, restoring the break to where it
    //     started. Every pointer handed out above is invalid from here on.
    // --------------------------------------------------------------------
    engine.reset();
    print_program_break("after reset");
    println!("\n[11] End of example. Engine reset, break restored.");
  }
}
