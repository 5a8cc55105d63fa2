//! Sources of raw heap memory.

use std::ptr::{self, NonNull};

/// Default capacity of an [`ArenaGrower`]: 20 MiB.
pub const DEFAULT_ARENA_CAPACITY: usize = 20 * (1 << 20);

/// Extends a contiguous region of memory on request, like `sbrk(2)`.
///
/// # Safety
///
/// A region returned by [`grow`](HeapGrower::grow) must be valid for reads
/// and writes of `increment` bytes, must not be used by anyone else, and must
/// remain valid for as long as the grower is alive. Successive regions are
/// expected to be contiguous; the allocator checks this and treats a gap as a
/// failed request.
pub unsafe trait HeapGrower {
  /// Adds `increment` bytes to the region and returns the start of the new
  /// bytes, or `None` when no more memory is available.
  fn grow(
    &mut self,
    increment: usize,
  ) -> Option<NonNull<u8>>;
}

/// Grows the process data segment with `sbrk(2)`.
///
/// Memory handed out by this grower is never returned to the system. Other
/// users of `sbrk` in the same process (the system `malloc`, for one) can
/// move the break between two calls, which shows up as a non-contiguous
/// region and fails the extension.
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct SbrkGrower;

#[cfg(unix)]
unsafe impl HeapGrower for SbrkGrower {
  fn grow(
    &mut self,
    increment: usize,
  ) -> Option<NonNull<u8>> {
    use libc::{c_void, intptr_t, sbrk};

    let increment = intptr_t::try_from(increment).ok()?;
    let address = unsafe { sbrk(increment) };

    if address == usize::MAX as *mut c_void {
      return None;
    }

    NonNull::new(address.cast::<u8>())
  }
}

/// A fixed-capacity, heap-allocated buffer handed out front to back.
///
/// Every arena is independent, so several allocators can live side by side
/// in one process. The buffer is 8-byte aligned and zero-initialized.
#[derive(Debug)]
pub struct ArenaGrower {
  base: NonNull<u64>,
  words: usize,
  used: usize,
}

impl ArenaGrower {
  /// Creates an arena of at least `capacity` bytes, rounded up to a whole
  /// number of 8-byte words.
  pub fn new(capacity: usize) -> Self {
    let words = capacity.div_ceil(size_of::<u64>());
    let buffer = vec![0u64; words].into_boxed_slice();
    let base = NonNull::from(Box::leak(buffer)).cast::<u64>();

    Self {
      base,
      words,
      used: 0,
    }
  }

  pub fn capacity(&self) -> usize {
    self.words * size_of::<u64>()
  }

  /// Bytes handed out so far.
  pub fn used(&self) -> usize {
    self.used
  }
}

impl Default for ArenaGrower {
  fn default() -> Self {
    Self::new(DEFAULT_ARENA_CAPACITY)
  }
}

unsafe impl HeapGrower for ArenaGrower {
  fn grow(
    &mut self,
    increment: usize,
  ) -> Option<NonNull<u8>> {
    let end = self.used.checked_add(increment)?;
    if end > self.capacity() {
      return None;
    }

    let start = unsafe { self.base.cast::<u8>().add(self.used) };
    self.used = end;

    Some(start)
  }
}

impl Drop for ArenaGrower {
  fn drop(&mut self) {
    let buffer = ptr::slice_from_raw_parts_mut(self.base.as_ptr(), self.words);
    drop(unsafe { Box::from_raw(buffer) });
  }
}
