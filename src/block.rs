//! Block layout and the offset arithmetic that navigates it.
//!
//! All positions are byte offsets from the prologue word, and a block is
//! identified by the offset of its payload:
//!
//! ```text
//!            header                       footer
//!   ┌───────┬───────┬──────────────────┬───────┬───────┬─────
//!   │  ...  │ tag   │     payload      │ tag   │ tag   │ ...
//!   └───────┴───────┴──────────────────┴───────┴───────┴─────
//!                   ▲                          ▲
//!                 offset             next block's header
//!           ◄──────────────── size ───────────►
//! ```

use static_assertions::const_assert;

use crate::{ALIGNMENT, tag::Tag};

/// Size of a boundary tag.
pub const WSIZE: usize = 4;

/// Per-block overhead: one header plus one footer.
pub const DSIZE: usize = 2 * WSIZE;

/// Smallest block that can exist: header, footer and one aligned payload word.
pub const MIN_BLOCK_SIZE: usize = 2 * DSIZE;

/// Largest size a 4-byte tag can encode.
pub const MAX_BLOCK_SIZE: usize = u32::MAX as usize & !(ALIGNMENT - 1);

const_assert!(DSIZE == ALIGNMENT);
const_assert!(MIN_BLOCK_SIZE % ALIGNMENT == 0);
const_assert!(MAX_BLOCK_SIZE % ALIGNMENT == 0);

pub(crate) const fn header(offset: usize) -> usize {
  offset - WSIZE
}

pub(crate) const fn footer(
  offset: usize,
  size: usize,
) -> usize {
  offset + size - DSIZE
}

pub(crate) const fn next(
  offset: usize,
  size: usize,
) -> usize {
  offset + size
}

/// Footer of the block physically before the one at `offset`.
pub(crate) const fn prev_footer(offset: usize) -> usize {
  offset - DSIZE
}

pub(crate) const fn prev(
  offset: usize,
  prev_size: usize,
) -> usize {
  offset - prev_size
}

/// A decoded view of one block, as read from its header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Block {
  offset: usize,
  size: usize,
  allocated: bool,
}

impl Block {
  pub(crate) fn new(
    offset: usize,
    tag: Tag,
  ) -> Self {
    Self {
      offset,
      size: tag.size(),
      allocated: tag.is_allocated(),
    }
  }

  /// Offset of the payload from the start of the heap.
  pub fn offset(&self) -> usize {
    self.offset
  }

  /// Total size, tags included.
  pub fn size(&self) -> usize {
    self.size
  }

  /// Bytes usable by the owner of the block.
  pub fn payload_size(&self) -> usize {
    self.size - DSIZE
  }

  pub fn is_allocated(&self) -> bool {
    self.allocated
  }

  pub fn is_free(&self) -> bool {
    !self.allocated
  }

  pub(crate) fn next_offset(&self) -> usize {
    next(self.offset, self.size)
  }
}
