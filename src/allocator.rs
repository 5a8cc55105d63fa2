use std::ptr::{self, NonNull};

use tracing::trace;

use crate::{
  align::checked_align,
  block::{DSIZE, MAX_BLOCK_SIZE},
  grow::HeapGrower,
  heap::ImplicitAllocator,
};

#[cfg(unix)]
use crate::{error::InitError, grow::SbrkGrower};

/// An allocator growing the process data segment with `sbrk(2)`.
#[cfg(unix)]
pub type SbrkAllocator = ImplicitAllocator<SbrkGrower>;

#[cfg(unix)]
impl ImplicitAllocator<SbrkGrower> {
  /// Builds a heap at the current program break.
  pub fn sbrk() -> Result<Self, InitError> {
    Self::init(SbrkGrower)
  }
}

impl<G: HeapGrower> ImplicitAllocator<G> {
  /// Allocates a block with room for at least `size` bytes and returns a
  /// pointer to its 8-byte aligned payload.
  ///
  /// Returns `None` for zero-sized requests and when the heap cannot grow;
  /// in both cases the heap is left as it was.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Option<NonNull<u8>> {
    if size == 0 {
      return None;
    }

    let Some(asize) = adjusted_size(size) else {
      trace!(size, "Request too large for a single block");
      return None;
    };

    let offset = match self.find_fit(asize) {
      Some(offset) => offset,
      None => self.extend(asize.max(self.chunk_size()))?,
    };

    self.place(offset, asize);
    trace!(size, block_size = asize, offset, "Allocated");
    self.check_after("allocate");

    Some(self.ptr_at(offset))
  }

  /// Returns a block to the heap, merging it with free neighbours.
  ///
  /// # Safety
  ///
  /// `ptr` must have been returned by [`allocate`](Self::allocate) or
  /// [`reallocate`](Self::reallocate) on this allocator and not freed since.
  pub unsafe fn deallocate(
    &mut self,
    ptr: NonNull<u8>,
  ) {
    let offset = self.offset_of(ptr);
    let size = self.block_at(offset).size();

    self.write_block(offset, size, false);
    let merged = self.coalesce(offset);

    trace!(offset, size, merged, "Deallocated");
    self.check_after("deallocate");
  }

  /// Moves the contents of `ptr` into a new block of `size` bytes and frees
  /// the old block.
  ///
  /// Always copies: the returned pointer may or may not equal `ptr`. On
  /// failure (including `size == 0`) returns `None` and leaves `ptr` and its
  /// contents untouched.
  ///
  /// # Safety
  ///
  /// Same contract as [`deallocate`](Self::deallocate).
  pub unsafe fn reallocate(
    &mut self,
    ptr: NonNull<u8>,
    size: usize,
  ) -> Option<NonNull<u8>> {
    let new_ptr = self.allocate(size)?;

    let old_size = self.block_at(self.offset_of(ptr)).payload_size();
    let count = size.min(old_size);

    unsafe {
      ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.as_ptr(), count);
      self.deallocate(ptr);
    }

    trace!(from = ?ptr, to = ?new_ptr, copied = count, "Reallocated");

    Some(new_ptr)
  }
}

/// Block size for a `size`-byte request: the aligned payload plus the
/// header and footer.
fn adjusted_size(size: usize) -> Option<usize> {
  let asize = checked_align(size)?.checked_add(DSIZE)?;
  (asize <= MAX_BLOCK_SIZE).then_some(asize)
}

#[cfg(test)]
mod tests {
  use std::slice;

  use super::*;
  use crate::{DEFAULT_CHUNK_SIZE, grow::ArenaGrower};

  fn heap() -> ImplicitAllocator<ArenaGrower> {
    ImplicitAllocator::init(ArenaGrower::new(1 << 20)).unwrap()
  }

  fn free_blocks(heap: &ImplicitAllocator<ArenaGrower>) -> Vec<(usize, usize)> {
    heap
      .blocks()
      .filter(|block| block.is_free())
      .map(|block| (block.offset(), block.size()))
      .collect()
  }

  unsafe fn fill(
    ptr: NonNull<u8>,
    len: usize,
    seed: u8,
  ) {
    for i in 0..len {
      unsafe { ptr.as_ptr().add(i).write(seed.wrapping_add(i as u8)) };
    }
  }

  #[test]
  fn test_adjusted_size() {
    assert_eq!(adjusted_size(1), Some(16));
    assert_eq!(adjusted_size(8), Some(16));
    assert_eq!(adjusted_size(9), Some(24));
    assert_eq!(adjusted_size(100), Some(112));
    assert_eq!(adjusted_size(MAX_BLOCK_SIZE - DSIZE), Some(MAX_BLOCK_SIZE));
    assert_eq!(adjusted_size(MAX_BLOCK_SIZE), None);
    assert_eq!(adjusted_size(usize::MAX), None);
  }

  #[test]
  fn test_allocate_zero() {
    let mut heap = heap();
    let before = free_blocks(&heap);

    assert_eq!(heap.allocate(0), None);

    assert_eq!(free_blocks(&heap), before);
    assert_eq!(heap.heap_size(), DSIZE + DEFAULT_CHUNK_SIZE);
  }

  #[test]
  fn test_allocate_is_aligned() {
    let mut heap = heap();

    for size in [1, 3, 7, 8, 13, 64, 100, 1000, 5000] {
      let ptr = heap.allocate(size).unwrap();
      assert_eq!(ptr.as_ptr().addr() % 8, 0, "size {size}");
    }

    assert!(heap.validate().is_empty());
  }

  #[test]
  fn test_allocate_is_usable() {
    let mut heap = heap();

    let first = heap.allocate(24).unwrap();
    let second = heap.allocate(40).unwrap();

    unsafe {
      fill(first, 24, 0x10);
      fill(second, 40, 0x80);

      let first = slice::from_raw_parts(first.as_ptr(), 24);
      let second = slice::from_raw_parts(second.as_ptr(), 40);
      assert!(first.iter().enumerate().all(|(i, &b)| b == 0x10 + i as u8));
      assert!(second.iter().enumerate().all(|(i, &b)| b == 0x80 + i as u8));
    }

    assert!(heap.validate().is_empty());
  }

  #[test]
  fn test_first_fit_reuses_freed_block() {
    let mut heap = heap();

    let p1 = heap.allocate(100).unwrap();
    let _p2 = heap.allocate(200).unwrap();
    unsafe { heap.deallocate(p1) };
    let p3 = heap.allocate(50).unwrap();

    assert_eq!(p3, p1);
    assert!(heap.validate().is_empty());
  }

  #[test]
  fn test_deallocate_coalesces_neighbours() {
    let mut heap = heap();

    let p1 = heap.allocate(64).unwrap();
    let p2 = heap.allocate(64).unwrap();
    unsafe {
      heap.deallocate(p1);
      heap.deallocate(p2);
    }

    let free = free_blocks(&heap);
    assert_eq!(free.len(), 1);
    assert_eq!(heap.ptr_at(free[0].0), p1);
    assert!(free[0].1 >= 2 * 72);
    assert!(heap.validate().is_empty());
  }

  #[test]
  fn test_allocate_deallocate_round_trip() {
    let mut heap = heap();
    let _keep = heap.allocate(48).unwrap();
    let before = free_blocks(&heap);

    let ptr = heap.allocate(300).unwrap();
    unsafe { heap.deallocate(ptr) };

    assert_eq!(free_blocks(&heap), before);
  }

  #[test]
  fn test_reuse_keeps_heap_bounded() {
    let mut heap = heap();

    for _ in 0..10_000 {
      let ptr = heap.allocate(32).unwrap();
      unsafe { heap.deallocate(ptr) };
    }

    assert_eq!(heap.heap_size(), DSIZE + DEFAULT_CHUNK_SIZE);
    assert!(heap.validate().is_empty());
  }

  #[test]
  fn test_allocate_extends_heap() {
    let mut heap = heap();

    let big = heap.allocate(2 * DEFAULT_CHUNK_SIZE).unwrap();

    // The request did not fit the first chunk, which merged with the new one.
    assert_eq!(
      heap.heap_size(),
      DSIZE + DEFAULT_CHUNK_SIZE + 2 * DEFAULT_CHUNK_SIZE + DSIZE
    );
    assert_eq!(heap.offset_of(big), 8);
    assert!(heap.validate().is_empty());
  }

  #[test]
  fn test_allocate_extends_by_at_least_a_chunk() {
    let mut heap = heap();

    let _fill = heap.allocate(DEFAULT_CHUNK_SIZE - DSIZE).unwrap();
    let _small = heap.allocate(16).unwrap();

    assert_eq!(heap.heap_size(), DSIZE + 2 * DEFAULT_CHUNK_SIZE);
    assert!(heap.validate().is_empty());
  }

  #[test]
  fn test_allocate_exhaustion_leaves_heap_unchanged() {
    let arena = ArenaGrower::new(DSIZE + DEFAULT_CHUNK_SIZE + 512);
    let mut heap = ImplicitAllocator::init(arena).unwrap();
    let kept = heap.allocate(64).unwrap();
    let before: Vec<_> = heap.blocks().collect();

    assert_eq!(heap.allocate(DEFAULT_CHUNK_SIZE), None);

    assert_eq!(heap.blocks().collect::<Vec<_>>(), before);
    assert_eq!(heap.heap_size(), DSIZE + DEFAULT_CHUNK_SIZE);
    assert!(heap.validate().is_empty());

    // Smaller requests still succeed from the existing chunk.
    assert!(heap.allocate(64).is_some());
    unsafe { heap.deallocate(kept) };
    assert!(heap.validate().is_empty());
  }

  #[test]
  fn test_allocate_rejects_unencodable_size() {
    let mut heap = heap();

    assert_eq!(heap.allocate(usize::MAX), None);
    assert_eq!(heap.allocate(MAX_BLOCK_SIZE), None);
    assert_eq!(heap.heap_size(), DSIZE + DEFAULT_CHUNK_SIZE);
  }

  #[test]
  fn test_reallocate_preserves_contents() {
    let mut heap = heap();

    let ptr = heap.allocate(16).unwrap();
    unsafe { fill(ptr, 16, 0xA0) };

    let grown = unsafe { heap.reallocate(ptr, 64) }.unwrap();

    let bytes = unsafe { slice::from_raw_parts(grown.as_ptr(), 16) };
    assert!(bytes.iter().enumerate().all(|(i, &b)| b == 0xA0 + i as u8));
    assert!(heap.validate().is_empty());
  }

  #[test]
  fn test_reallocate_shrink_copies_prefix() {
    let mut heap = heap();

    let ptr = heap.allocate(128).unwrap();
    unsafe { fill(ptr, 128, 0) };

    let shrunk = unsafe { heap.reallocate(ptr, 10) }.unwrap();

    let bytes = unsafe { slice::from_raw_parts(shrunk.as_ptr(), 10) };
    assert_eq!(bytes, &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
    assert!(heap.validate().is_empty());
  }

  #[test]
  fn test_reallocate_frees_old_block() {
    let mut heap = heap();

    let ptr = heap.allocate(32).unwrap();
    let _guard = heap.allocate(32).unwrap();
    let moved = unsafe { heap.reallocate(ptr, 256) }.unwrap();

    assert_ne!(moved, ptr);
    let first = heap.blocks().next().unwrap();
    assert!(first.is_free());
    assert_eq!(heap.payload_ptr(&first), ptr);
    assert!(heap.validate().is_empty());
  }

  #[test]
  fn test_reallocate_zero_keeps_block() {
    let mut heap = heap();

    let ptr = heap.allocate(24).unwrap();
    unsafe { fill(ptr, 24, 7) };

    assert_eq!(unsafe { heap.reallocate(ptr, 0) }, None);

    let first = heap.blocks().next().unwrap();
    assert!(first.is_allocated());
    let bytes = unsafe { slice::from_raw_parts(ptr.as_ptr(), 24) };
    assert!(bytes.iter().enumerate().all(|(i, &b)| b == 7 + i as u8));
  }

  #[test]
  fn test_reallocate_failure_keeps_block() {
    let arena = ArenaGrower::new(DSIZE + DEFAULT_CHUNK_SIZE);
    let mut heap = ImplicitAllocator::init(arena).unwrap();

    let ptr = heap.allocate(40).unwrap();
    unsafe { fill(ptr, 40, 3) };

    assert_eq!(unsafe { heap.reallocate(ptr, 2 * DEFAULT_CHUNK_SIZE) }, None);

    let bytes = unsafe { slice::from_raw_parts(ptr.as_ptr(), 40) };
    assert!(bytes.iter().enumerate().all(|(i, &b)| b == 3 + i as u8));
    assert!(heap.blocks().next().unwrap().is_allocated());
    assert!(heap.validate().is_empty());
  }

  /// Moves the real program break. Other threads of the test binary can
  /// move it too (the system `malloc` uses `brk` for its main arena), so
  /// run it alone: `cargo test -- --ignored --test-threads=1`.
  #[cfg(unix)]
  #[test]
  #[ignore = "moves the process program break"]
  fn test_sbrk_allocator() {
    let mut heap = SbrkAllocator::sbrk().unwrap();

    let first = heap.allocate(64).unwrap();
    let second = heap.allocate(128).unwrap();
    unsafe {
      fill(first, 64, 1);
      fill(second, 128, 2);
      heap.deallocate(first);
    }
    let third = heap.allocate(32).unwrap();

    assert_eq!(third, first);
    assert_eq!(third.as_ptr().addr() % 8, 0);
    assert!(heap.validate().is_empty());
  }

  mod props {
    use proptest::prelude::*;

    use super::*;
    use crate::ALIGNMENT;

    #[derive(Debug, Clone)]
    enum Op {
      Allocate(usize),
      Deallocate(usize),
      Reallocate(usize, usize),
    }

    fn op() -> impl Strategy<Value = Op> {
      prop_oneof![
        (1usize..2048).prop_map(Op::Allocate),
        any::<usize>().prop_map(Op::Deallocate),
        (any::<usize>(), 0usize..3072).prop_map(|(index, size)| Op::Reallocate(index, size)),
      ]
    }

    fn holds(
      ptr: NonNull<u8>,
      len: usize,
      seed: u8,
    ) -> bool {
      let bytes = unsafe { slice::from_raw_parts(ptr.as_ptr(), len) };
      bytes
        .iter()
        .enumerate()
        .all(|(i, &b)| b == seed.wrapping_add(i as u8))
    }

    proptest! {
      #[test]
      fn heap_stays_consistent(ops in prop::collection::vec(op(), 1..64)) {
        let mut heap = ImplicitAllocator::init(ArenaGrower::new(2 << 20)).unwrap();
        let mut live: Vec<(NonNull<u8>, usize, u8)> = Vec::new();

        for (step, op) in ops.into_iter().enumerate() {
          let seed = step as u8;

          match op {
            Op::Allocate(size) => {
              let ptr = heap.allocate(size).unwrap();
              prop_assert_eq!(ptr.as_ptr().addr() % ALIGNMENT, 0);
              unsafe { fill(ptr, size, seed) };
              live.push((ptr, size, seed));
            }
            Op::Deallocate(index) if !live.is_empty() => {
              let (ptr, size, seed) = live.swap_remove(index % live.len());
              prop_assert!(holds(ptr, size, seed));
              unsafe { heap.deallocate(ptr) };
            }
            Op::Reallocate(index, new_size) if !live.is_empty() => {
              let index = index % live.len();
              let (ptr, size, old_seed) = live[index];

              match unsafe { heap.reallocate(ptr, new_size) } {
                Some(moved) => {
                  prop_assert!(holds(moved, size.min(new_size), old_seed));
                  unsafe { fill(moved, new_size, seed) };
                  live[index] = (moved, new_size, seed);
                }
                None => {
                  prop_assert_eq!(new_size, 0);
                  prop_assert!(holds(ptr, size, old_seed));
                }
              }
            }
            _ => {}
          }

          let violations = heap.validate();
          prop_assert!(violations.is_empty(), "{:?}", violations);
        }

        for (ptr, size, seed) in live {
          prop_assert!(holds(ptr, size, seed));
          unsafe { heap.deallocate(ptr) };
        }

        // Everything freed and coalesced back into a single block.
        let blocks: Vec<_> = heap.blocks().collect();
        prop_assert_eq!(blocks.len(), 1);
        prop_assert!(blocks[0].is_free());
      }
    }
  }
}
