//! The heap extent: sentinels, growth and raw tag access.

use std::ptr::NonNull;

use tracing::{debug, warn};

use crate::{
  ALIGNMENT, align,
  align::checked_align,
  block::{self, Block, DSIZE, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE, WSIZE},
  config::AllocatorConfig,
  error::InitError,
  grow::HeapGrower,
  tag::Tag,
};

/// Payload offset of the first block: just past the prologue and its header.
pub(crate) const FIRST_BLOCK: usize = DSIZE;

/// A first-fit allocator over an implicit, address-ordered list of
/// boundary-tagged blocks.
///
/// ```text
///   offset 0
///   ┌──────────┬────────┬─────────┬────────┬────────┬─────────┬────────┬──────────┐
///   │ prologue │ header │ payload │ footer │ header │ payload │ footer │ epilogue │
///   │   0/a    │  n/a   │         │  n/a   │  m/f   │         │  m/f   │   0/a    │
///   └──────────┴────────┴─────────┴────────┴────────┴─────────┴────────┴──────────┘
///                       ▲                                                         ▲
///                  FIRST_BLOCK                                               heap_size
/// ```
///
/// The whole heap lives in memory supplied by the grower `G`. The allocator
/// owns that memory; payload pointers are lent to callers between
/// [`allocate`](Self::allocate) and [`deallocate`](Self::deallocate).
pub struct ImplicitAllocator<G: HeapGrower> {
  grower: G,
  start: NonNull<u8>,
  size: usize,
  chunk_size: usize,
}

impl<G: HeapGrower> ImplicitAllocator<G> {
  /// Builds a heap with the default configuration.
  pub fn init(grower: G) -> Result<Self, InitError> {
    Self::init_with_config(grower, AllocatorConfig::default())
  }

  /// Writes the sentinels and extends the heap by one chunk.
  pub fn init_with_config(
    mut grower: G,
    config: AllocatorConfig,
  ) -> Result<Self, InitError> {
    config.validate()?;

    let start = reserve_sentinels(&mut grower)?;
    let mut heap = Self {
      grower,
      start,
      size: DSIZE,
      chunk_size: config.chunk_size,
    };

    heap.write_tag(0, Tag::SENTINEL);
    heap.write_tag(WSIZE, Tag::SENTINEL);

    if heap.extend(config.chunk_size).is_none() {
      return Err(InitError::InitialChunk {
        requested: config.chunk_size,
      });
    }

    debug!(
      start = ?heap.start,
      heap_size = heap.size,
      chunk_size = heap.chunk_size,
      "Initialized heap"
    );

    Ok(heap)
  }

  /// Grows the heap by `bytes` (rounded up to the alignment) and returns the
  /// payload offset of the resulting free block, after coalescing with a
  /// free block that ended at the old epilogue.
  ///
  /// On failure nothing is written.
  pub(crate) fn extend(
    &mut self,
    bytes: usize,
  ) -> Option<usize> {
    let size = checked_align(bytes)?;
    if size < MIN_BLOCK_SIZE || size > MAX_BLOCK_SIZE - self.size {
      debug!(requested = size, heap_size = self.size, "Heap extension out of range");
      return None;
    }

    let Some(region) = self.grower.grow(size) else {
      debug!(requested = size, heap_size = self.size, "Growth primitive exhausted");
      return None;
    };

    if region != self.end() {
      warn!(
        expected = ?self.end(),
        found = ?region,
        requested = size,
        "Growth primitive returned a non-contiguous region"
      );
      return None;
    }

    let offset = self.size;
    self.size += size;

    self.write_block(offset, size, false);
    self.write_tag(block::header(block::next(offset, size)), Tag::SENTINEL);

    debug!(extended_by = size, heap_size = self.size, "Extended heap");

    Some(self.coalesce(offset))
  }

  /// Bytes obtained from the grower, sentinels included.
  pub fn heap_size(&self) -> usize {
    self.size
  }

  /// Address of the prologue word; block offsets are relative to it.
  pub fn heap_start(&self) -> NonNull<u8> {
    self.start
  }

  pub fn chunk_size(&self) -> usize {
    self.chunk_size
  }

  pub fn grower(&self) -> &G {
    &self.grower
  }

  /// Walks the blocks in address order, from the first block up to (not
  /// including) the epilogue.
  pub fn blocks(&self) -> Blocks<'_, G> {
    Blocks {
      heap: self,
      offset: FIRST_BLOCK,
    }
  }

  pub fn payload_ptr(
    &self,
    block: &Block,
  ) -> NonNull<u8> {
    self.ptr_at(block.offset())
  }

  pub(crate) fn ptr_at(
    &self,
    offset: usize,
  ) -> NonNull<u8> {
    debug_assert!(offset <= self.size);
    unsafe { self.start.add(offset) }
  }

  pub(crate) fn offset_of(
    &self,
    ptr: NonNull<u8>,
  ) -> usize {
    ptr.as_ptr().addr() - self.start.as_ptr().addr()
  }

  fn end(&self) -> NonNull<u8> {
    self.ptr_at(self.size)
  }

  pub(crate) fn read_tag(
    &self,
    offset: usize,
  ) -> Tag {
    debug_assert!(offset % WSIZE == 0 && offset + WSIZE <= self.size);
    let raw = unsafe { self.start.add(offset).cast::<u32>().read() };
    Tag::from_raw(raw)
  }

  pub(crate) fn write_tag(
    &mut self,
    offset: usize,
    tag: Tag,
  ) {
    debug_assert!(offset % WSIZE == 0 && offset + WSIZE <= self.size);
    unsafe { self.start.add(offset).cast::<u32>().write(tag.into_raw()) }
  }

  /// Writes matching header and footer tags for the block at `offset`.
  pub(crate) fn write_block(
    &mut self,
    offset: usize,
    size: usize,
    allocated: bool,
  ) {
    let tag = Tag::pack(size, allocated);
    self.write_tag(block::header(offset), tag);
    self.write_tag(block::footer(offset, size), tag);
  }

  pub(crate) fn block_at(
    &self,
    offset: usize,
  ) -> Block {
    Block::new(offset, self.read_tag(block::header(offset)))
  }
}

/// Requests the two sentinel words, realigning the heap start if the first
/// region is not 8-byte aligned.
fn reserve_sentinels<G: HeapGrower>(grower: &mut G) -> Result<NonNull<u8>, InitError> {
  let base = grower
    .grow(DSIZE)
    .ok_or(InitError::Sentinels { requested: DSIZE })?;

  let address = base.as_ptr().addr();
  let padding = align!(address) - address;
  if padding == 0 {
    return Ok(base);
  }

  let requested = DSIZE + padding;
  let extra = grower
    .grow(padding)
    .ok_or(InitError::Sentinels { requested })?;

  if extra != unsafe { base.add(DSIZE) } {
    return Err(InitError::Sentinels { requested });
  }

  debug!(padding, alignment = ALIGNMENT, "Realigned heap start");

  Ok(unsafe { base.add(padding) })
}

/// Iterator over the blocks of a heap, see [`ImplicitAllocator::blocks`].
///
/// Stops early at a header that cannot describe a real block; use
/// [`ImplicitAllocator::validate`] to find out why.
pub struct Blocks<'a, G: HeapGrower> {
  heap: &'a ImplicitAllocator<G>,
  offset: usize,
}

impl<G: HeapGrower> Iterator for Blocks<'_, G> {
  type Item = Block;

  fn next(&mut self) -> Option<Block> {
    if self.offset >= self.heap.size {
      return None;
    }

    let block = self.heap.block_at(self.offset);
    if block.size() < MIN_BLOCK_SIZE || block.next_offset() > self.heap.size {
      return None;
    }

    self.offset = block.next_offset();
    Some(block)
  }
}
