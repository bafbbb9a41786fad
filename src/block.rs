use std::mem;

/// Position of a block header, as a byte offset from the start of the managed
/// region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockRef(usize);

impl BlockRef {
  pub(crate) const fn new(offset: usize) -> Self {
    Self(offset)
  }

  pub const fn offset(self) -> usize {
    self.0
  }
}

/// Decoded block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
  /// Payload bytes, header excluded.
  pub size: usize,
  pub is_free: bool,
  pub next: Option<BlockRef>,
}

impl Block {
  /// Bytes of bookkeeping stored in front of every payload.
  pub const HEADER_SIZE: usize = mem::size_of::<RawHeader>();

  pub fn new(
    size: usize,
    is_free: bool,
    next: Option<BlockRef>,
  ) -> Self {
    Self { size, is_free, next }
  }

  /// Bytes the block occupies in the region, header included.
  pub fn span(&self) -> usize {
    Self::HEADER_SIZE + self.size
  }
}

const NIL: usize = usize::MAX;
const FREE: usize = 1;

/// In-memory encoding of a [`Block`]. All fields are plain words so that any
/// bit pattern found in the region decodes without undefined behaviour.
#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct RawHeader {
  size: usize,
  next: usize,
  flags: usize,
}

impl From<Block> for RawHeader {
  fn from(block: Block) -> Self {
    Self {
      size: block.size,
      next: block.next.map_or(NIL, BlockRef::offset),
      flags: if block.is_free { FREE } else { 0 },
    }
  }
}

impl From<RawHeader> for Block {
  fn from(raw: RawHeader) -> Self {
    Self {
      size: raw.size,
      is_free: raw.flags & FREE != 0,
      next: (raw.next != NIL).then_some(BlockRef(raw.next)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_header_is_three_words() {
    assert_eq!(Block::HEADER_SIZE, 3 * mem::size_of::<usize>());
  }

  #[test]
  fn test_encoding_preserves_fields() {
    let tail = Block::new(12, false, None);
    let linked = Block::new(40, true, Some(BlockRef::new(64)));

    assert_eq!(tail, Block::from(RawHeader::from(tail)));
    assert_eq!(linked, Block::from(RawHeader::from(linked)));
  }

  #[test]
  fn test_span_includes_header() {
    assert_eq!(Block::new(20, true, None).span(), 20 + Block::HEADER_SIZE);
  }
}
