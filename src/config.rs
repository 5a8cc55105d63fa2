//! Allocator tuning.

use crate::{
  ALIGNMENT,
  block::{MAX_BLOCK_SIZE, MIN_BLOCK_SIZE},
  error::ConfigError,
};

/// Default number of bytes requested from the grower when no free block fits
/// (4 KiB, one page on most systems).
pub const DEFAULT_CHUNK_SIZE: usize = 1 << 12;

/// Allocator settings, checked by [`validate`](AllocatorConfig::validate)
/// before the heap is initialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatorConfig {
  /// Minimum number of bytes the heap grows by.
  ///
  /// Default: 4,096. Larger chunks mean fewer calls to the grower; the
  /// initial heap is exactly one chunk.
  pub chunk_size: usize,
}

impl AllocatorConfig {
  pub fn with_chunk_size(
    mut self,
    chunk_size: usize,
  ) -> Self {
    self.chunk_size = chunk_size;
    self
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    let chunk_size = self.chunk_size;

    if chunk_size % ALIGNMENT != 0 {
      return Err(ConfigError::Misaligned(chunk_size));
    }
    if chunk_size < MIN_BLOCK_SIZE {
      return Err(ConfigError::TooSmall(chunk_size));
    }
    if chunk_size > MAX_BLOCK_SIZE {
      return Err(ConfigError::TooLarge(chunk_size));
    }

    Ok(())
  }
}

impl Default for AllocatorConfig {
  fn default() -> Self {
    Self {
      chunk_size: DEFAULT_CHUNK_SIZE,
    }
  }
}
