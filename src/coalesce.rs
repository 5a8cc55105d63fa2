//! Immediate coalescing of free blocks with their physical neighbours.

use crate::{block, grow::HeapGrower, heap::ImplicitAllocator};

impl<G: HeapGrower> ImplicitAllocator<G> {
  /// Merges the free block at `offset` with a free predecessor and/or a free
  /// successor, and returns the payload offset of the merged block.
  ///
  /// ```text
  ///   prev  next   result
  ///   a     a      [ block ]
  ///   a     f      [ block + next ]
  ///   f     a      [ prev + block ]          (starts at prev)
  ///   f     f      [ prev + block + next ]   (starts at prev)
  /// ```
  ///
  /// The prologue and epilogue are allocated, so the first and last blocks
  /// never look past the heap.
  pub(crate) fn coalesce(
    &mut self,
    offset: usize,
  ) -> usize {
    let size = self.block_at(offset).size();
    let prev = self.read_tag(block::prev_footer(offset));
    let next = self.block_at(block::next(offset, size));

    match (prev.is_allocated(), next.is_allocated()) {
      (true, true) => offset,
      (true, false) => {
        let merged = size + next.size();
        self.write_block(offset, merged, false);
        offset
      }
      (false, true) => {
        let merged = prev.size() + size;
        let start = block::prev(offset, prev.size());
        self.write_block(start, merged, false);
        start
      }
      (false, false) => {
        let merged = prev.size() + size + next.size();
        let start = block::prev(offset, prev.size());
        self.write_block(start, merged, false);
        start
      }
    }
  }
}
