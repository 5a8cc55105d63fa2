//! Heap consistency checking.
//!
//! [`ImplicitAllocator::validate`] walks every block and reports what it
//! finds instead of asserting, so tests can inspect the result. With the
//! `heap-check` feature each public operation validates the heap when it is
//! done and panics on the first inconsistent state.

use crate::{
  ALIGNMENT,
  block::{self, MIN_BLOCK_SIZE},
  grow::HeapGrower,
  heap::{FIRST_BLOCK, ImplicitAllocator},
  tag::Tag,
};

/// One broken heap invariant, located by payload offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
  #[error("prologue tag is {found}, expected a zero-size allocated sentinel")]
  Prologue { found: Tag },

  #[error("epilogue tag at {offset} is {found}, expected a zero-size allocated sentinel")]
  Epilogue { offset: usize, found: Tag },

  #[error("block at {offset}: payload is not {align}-byte aligned", align = ALIGNMENT)]
  MisalignedPayload { offset: usize },

  #[error("block at {offset}: size {size} is not a multiple of {align}", align = ALIGNMENT)]
  MisalignedSize { offset: usize, size: usize },

  #[error("block at {offset}: size {size} is below the minimum of {min}", min = MIN_BLOCK_SIZE)]
  Undersized { offset: usize, size: usize },

  #[error("block at {offset}: size {size} runs past the end of the heap at {heap_size}")]
  Overrun {
    offset: usize,
    size: usize,
    heap_size: usize,
  },

  #[error("block at {offset}: header {header} does not match footer {footer}")]
  TagMismatch { offset: usize, header: Tag, footer: Tag },

  #[error("free blocks at {offset} and {next} are adjacent")]
  AdjacentFree { offset: usize, next: usize },
}

impl<G: HeapGrower> ImplicitAllocator<G> {
  /// Checks every block between the prologue and the epilogue and returns
  /// the violations found, in address order. An empty list means the heap
  /// is consistent.
  ///
  /// A block whose size cannot be trusted ends the walk, since the next
  /// header cannot be located.
  pub fn validate(&self) -> Vec<Violation> {
    let mut violations = Vec::new();
    let heap_size = self.heap_size();

    let prologue = self.read_tag(0);
    if prologue != Tag::SENTINEL {
      violations.push(Violation::Prologue { found: prologue });
    }

    let mut offset = FIRST_BLOCK;
    let mut prev_free = None;

    loop {
      let header = self.read_tag(block::header(offset));
      let size = header.size();

      if size == 0 {
        if offset != heap_size || header != Tag::SENTINEL {
          violations.push(Violation::Epilogue {
            offset: block::header(offset),
            found: header,
          });
        }
        break;
      }

      if self.ptr_at(offset).as_ptr().addr() % ALIGNMENT != 0 {
        violations.push(Violation::MisalignedPayload { offset });
      }
      if header.into_raw() & 0x6 != 0 {
        violations.push(Violation::MisalignedSize {
          offset,
          size: header.into_raw() as usize & !0x1,
        });
      }
      if size < MIN_BLOCK_SIZE {
        violations.push(Violation::Undersized { offset, size });
        break;
      }
      if block::next(offset, size) > heap_size {
        violations.push(Violation::Overrun {
          offset,
          size,
          heap_size,
        });
        break;
      }

      let footer = self.read_tag(block::footer(offset, size));
      if footer != header {
        violations.push(Violation::TagMismatch {
          offset,
          header,
          footer,
        });
      }

      if header.is_free() {
        if let Some(prev) = prev_free {
          violations.push(Violation::AdjacentFree {
            offset: prev,
            next: offset,
          });
        }
      }

      prev_free = header.is_free().then_some(offset);
      offset = block::next(offset, size);
    }

    violations
  }

  #[cfg(feature = "heap-check")]
  pub(crate) fn check_after(
    &self,
    operation: &str,
  ) {
    let violations = self.validate();
    if !violations.is_empty() {
      tracing::error!(operation, ?violations, "Heap consistency check failed");
      panic!("heap inconsistent after {operation}: {violations:?}");
    }
  }

  #[cfg(not(feature = "heap-check"))]
  #[inline(always)]
  pub(crate) fn check_after(
    &self,
    _operation: &str,
  ) {
  }
}
