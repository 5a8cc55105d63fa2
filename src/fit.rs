//! First-fit search and block placement.

use crate::{
  block::{self, MIN_BLOCK_SIZE},
  grow::HeapGrower,
  heap::ImplicitAllocator,
};

impl<G: HeapGrower> ImplicitAllocator<G> {
  /// Returns the payload offset of the first free block, in address order,
  /// of at least `size` bytes.
  pub(crate) fn find_fit(
    &self,
    size: usize,
  ) -> Option<usize> {
    self
      .blocks()
      .find(|block| block.is_free() && block.size() >= size)
      .map(|block| block.offset())
  }

  /// Marks the free block at `offset` allocated and splits off the tail if
  /// at least a minimum-sized block remains.
  pub(crate) fn place(
    &mut self,
    offset: usize,
    size: usize,
  ) {
    let block_size = self.block_at(offset).size();
    debug_assert!(block_size >= size);

    self.write_block(offset, block_size, true);
    self.split(offset, size);
  }

  fn split(
    &mut self,
    offset: usize,
    size: usize,
  ) {
    let remainder = self.block_at(offset).size() - size;
    if remainder < MIN_BLOCK_SIZE {
      return;
    }

    self.write_block(offset, size, true);
    self.write_block(block::next(offset, size), remainder, false);
  }
}
