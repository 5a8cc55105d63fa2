//! # tagalloc - An Implicit Free List Allocator
//!
//! This crate provides a first-fit **boundary-tag allocator** over a single
//! heap region that only ever grows, extended on demand through an
//! `sbrk`-like primitive.
//!
//! ## Overview
//!
//! Every block carries its size and allocated bit twice, in a header and a
//! footer. The blocks themselves form the free list: walking forward means
//! adding the block size, walking backward means reading the previous
//! block's footer. No other bookkeeping lives outside the heap.
//!
//! ```text
//!   Heap Layout:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                              HEAP MEMORY                             │
//!   │                                                                      │
//!   │   ┌───┬────────────┬────────────┬──────────────────────────────┬───┐ │
//!   │   │ P │  A1 (a)    │   free     │            A2 (a)            │ E │ │
//!   │   └───┴────────────┴────────────┴──────────────────────────────┴───┘ │
//!   │     ▲                                                            ▲   │
//!   │     │                                                            │   │
//!   │  Prologue                                                   Epilogue │
//!   │  (0/a)                                                        (0/a)  │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   No two free blocks are ever adjacent: frees coalesce immediately.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   tagalloc
//!   ├── align      - Alignment macros (align!, align_to!)
//!   ├── tag        - Boundary tag encoding
//!   ├── block      - Layout constants and the Block view
//!   ├── grow       - HeapGrower: SbrkGrower, ArenaGrower
//!   ├── config     - AllocatorConfig
//!   ├── error      - InitError, ConfigError
//!   ├── heap       - ImplicitAllocator: init, extend, block walk
//!   ├── fit        - First-fit search, place and split
//!   ├── coalesce   - Merging free neighbours
//!   ├── allocator  - allocate, deallocate, reallocate
//!   └── check      - validate() and Violation
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use tagalloc::{ArenaGrower, ImplicitAllocator};
//!
//! let mut heap = ImplicitAllocator::init(ArenaGrower::new(1 << 16)).unwrap();
//!
//! let ptr = heap.allocate(24).unwrap();
//! unsafe {
//!     ptr.cast::<u64>().write(42);
//!     assert_eq!(ptr.cast::<u64>().read(), 42);
//!
//!     heap.deallocate(ptr);
//! }
//!
//! assert!(heap.validate().is_empty());
//! ```
//!
//! ## How It Works
//!
//! ```text
//!   allocate(n)
//!     │
//!     ├─ n == 0 ──────────────────────────────► None
//!     │
//!     ├─ asize = align(n) + 8
//!     │
//!     ├─ first free block with size >= asize? ─ yes ─┐
//!     │                                              │
//!     └─ no: extend(max(asize, chunk)) ── fails ─► None
//!               │                                    │
//!               └────────────────────────────────────┤
//!                                                    ▼
//!                                place: mark allocated, split the tail
//!                                off when it can hold a 16-byte block
//!
//!   deallocate(p)  → mark free → coalesce with free neighbours
//!   reallocate(p)  → allocate, copy min(old, new) bytes, deallocate(p)
//! ```
//!
//! A single block:
//!
//! ```text
//!   ┌──────────┬──────────────────────────────┬──────────┐
//!   │  header  │           payload            │  footer  │
//!   │  size|a  │   size - 8 bytes, 8-aligned  │  size|a  │
//!   └──────────┴──────────────────────────────┴──────────┘
//!     4 bytes  ▲                                 4 bytes
//!              └── Pointer returned to user
//! ```
//!
//! ## Limitations
//!
//! - **Single-threaded only**: No synchronization primitives
//! - **Linear search**: Allocation is O(number of blocks)
//! - **Never shrinks**: Memory is not returned to the grower
//! - **Copying realloc**: `reallocate` always moves the data
//!
//! ## Safety
//!
//! Allocation is safe; handing a pointer back through `deallocate` or
//! `reallocate` is `unsafe`, since the allocator cannot tell whether it
//! still owns the block.

pub mod align;
mod allocator;
mod block;
mod check;
mod coalesce;
mod config;
mod error;
mod fit;
mod grow;
mod heap;
mod tag;

pub use align::ALIGNMENT;
#[cfg(unix)]
pub use allocator::SbrkAllocator;
pub use block::{Block, DSIZE, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE, WSIZE};
pub use check::Violation;
pub use config::{AllocatorConfig, DEFAULT_CHUNK_SIZE};
pub use error::{ConfigError, InitError};
#[cfg(unix)]
pub use grow::SbrkGrower;
pub use grow::{ArenaGrower, DEFAULT_ARENA_CAPACITY, HeapGrower};
pub use heap::{Blocks, ImplicitAllocator};
pub use tag::Tag;
