//! Walkthrough of an sbrk-backed heap, one step per ENTER.
//!
//! Kept under `demos/` rather than `examples/`, which in this workspace is
//! taken by other material; `Cargo.toml` registers it as the `heap` example:
//!
//! ```text
//! RUST_LOG=tagalloc=trace cargo run --example heap
//! ```

use std::{io::Read, ptr};

use libc::sbrk;
use tagalloc::{InitError, SbrkAllocator};
use tracing_subscriber::EnvFilter;

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`, `htop`,
/// `gdb`, or just visually track how allocations change the program break.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break using `sbrk(0)`.
fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { sbrk(0) },
  );
}

/// Prints every block between the prologue and the epilogue.
fn print_heap(heap: &SbrkAllocator) {
  println!("    heap size = {} bytes", heap.heap_size());
  for block in heap.blocks() {
    println!(
      "    {:?}  size = {:>6}  {}",
      heap.payload_ptr(&block),
      block.size(),
      if block.is_free() { "free" } else { "allocated" },
    );
  }
}

fn main() -> Result<(), InitError> {
  // RUST_LOG=tagalloc=trace shows every allocation and heap extension.
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  print_program_break("start");

  // The heap starts at the current break: two sentinel words and one chunk.
  let mut heap = SbrkAllocator::sbrk()?;
  println!("\n[0] Initialized heap");
  print_program_break("after init");
  print_heap(&heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 1) Allocate 4 bytes. The block still takes 16: 8 of payload plus
  //    a 4-byte header and a 4-byte footer.
  // --------------------------------------------------------------------
  let Some(first) = heap.allocate(4) else {
    println!("out of memory");
    return Ok(());
  };
  unsafe { first.cast::<u32>().write(0xDEADBEEF) };
  println!("\n[1] Allocate 4 bytes at {:?}", first);
  print_heap(&heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) Allocate 100 bytes, rounded up to 104 plus 8 of overhead.
  // --------------------------------------------------------------------
  let Some(second) = heap.allocate(100) else {
    println!("out of memory");
    return Ok(());
  };
  unsafe { ptr::write_bytes(second.as_ptr(), 0xAB, 100) };
  println!("\n[2] Allocate 100 bytes at {:?}", second);
  print_heap(&heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) Free the first block. Its neighbours are the prologue and an
  //    allocated block, so it stays a separate free block.
  // --------------------------------------------------------------------
  unsafe { heap.deallocate(first) };
  println!("\n[3] Deallocated {:?}", first);
  print_heap(&heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 4) Allocate 2 bytes: first fit hands back the block freed above.
  // --------------------------------------------------------------------
  let Some(third) = heap.allocate(2) else {
    println!("out of memory");
    return Ok(());
  };
  println!("\n[4] Allocate 2 bytes at {:?}", third);
  println!(
    "[4] reused the freed block? {}",
    if third == first { "Yes" } else { "No" }
  );
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 5) Grow the second block. The data is copied into a new block
  //    further up and the old one is freed.
  // --------------------------------------------------------------------
  let Some(grown) = (unsafe { heap.reallocate(second, 1000) }) else {
    println!("out of memory");
    return Ok(());
  };
  println!("\n[5] Reallocated {:?} -> {:?}", second, grown);
  println!("[5] First byte still 0x{:X}", unsafe { grown.read() });
  print_heap(&heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 6) A 64 KiB request does not fit the first chunk, so the heap grows.
  // --------------------------------------------------------------------
  print_program_break("before large alloc");
  let big = heap.allocate(64 * 1024);
  println!("\n[6] Allocate 64 KiB -> {:?}", big);
  print_program_break("after large alloc");
  print_heap(&heap);

  let violations = heap.validate();
  println!("\n[7] Consistency check: {} violation(s)", violations.len());
  for violation in violations {
    println!("    {violation}");
  }

  println!("\n[8] End of example. Process will exit and the OS will reclaim all memory.");
  Ok(())
}
