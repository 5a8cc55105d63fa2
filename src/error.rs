use crate::block::{MAX_BLOCK_SIZE, MIN_BLOCK_SIZE};

/// Heap initialization failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InitError {
  #[error("growth primitive could not supply {requested} bytes for the heap sentinels")]
  Sentinels { requested: usize },

  #[error("growth primitive could not supply the initial {requested}-byte chunk")]
  InitialChunk { requested: usize },

  #[error("invalid allocator configuration: {0}")]
  Config(#[from] ConfigError),
}

/// Rejected [`AllocatorConfig`](crate::AllocatorConfig).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
  #[error("chunk size {0} is not a multiple of {align}", align = crate::ALIGNMENT)]
  Misaligned(usize),

  #[error("chunk size {0} is below the minimum block size of {min}", min = MIN_BLOCK_SIZE)]
  TooSmall(usize),

  #[error("chunk size {0} exceeds the largest encodable block of {max}", max = MAX_BLOCK_SIZE)]
  TooLarge(usize),
}
