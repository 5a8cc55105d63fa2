use core::fmt;

const ALLOCATED_BIT: u32 = 0x1;
const SIZE_MASK: u32 = !0x7;

/// A boundary tag: one 4-byte word holding a block's size and allocated bit.
///
/// ```text
///   31                                   3   2   1   0
///   ┌──────────────────────────────────┬───┬───┬───┐
///   │        size (multiple of 8)      │ 0 │ 0 │ a │
///   └──────────────────────────────────┴───┴───┴───┘
/// ```
///
/// Headers and footers use the same encoding.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Tag(u32);

impl Tag {
  /// The zero-size allocated marker used by the prologue and the epilogue.
  pub const SENTINEL: Tag = Tag::pack(0, true);

  /// Packs `size` and the allocated bit into a tag.
  ///
  /// `size` must be a multiple of 8 that fits in 32 bits; the low three bits
  /// are masked off otherwise.
  pub const fn pack(
    size: usize,
    allocated: bool,
  ) -> Self {
    debug_assert!(size <= SIZE_MASK as usize);
    debug_assert!(size & 0x7 == 0);

    Self((size as u32 & SIZE_MASK) | allocated as u32)
  }

  pub const fn from_raw(raw: u32) -> Self {
    Self(raw)
  }

  pub const fn into_raw(self) -> u32 {
    self.0
  }

  pub const fn size(self) -> usize {
    (self.0 & SIZE_MASK) as usize
  }

  pub const fn is_allocated(self) -> bool {
    self.0 & ALLOCATED_BIT != 0
  }

  pub const fn is_free(self) -> bool {
    !self.is_allocated()
  }
}

impl fmt::Debug for Tag {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("Tag")
      .field("size", &self.size())
      .field("allocated", &self.is_allocated())
      .finish()
  }
}

impl fmt::Display for Tag {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    let state = if self.is_allocated() { 'a' } else { 'f' };
    write!(f, "{}/{}", self.size(), state)
  }
}
