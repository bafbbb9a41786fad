use std::ptr::NonNull;

use crate::{
  align::ALIGNMENT,
  block::{Block, BlockRef},
  error::Fault,
  region::Region,
};

/// Address-ordered chain of every block in the region, free and in use.
///
/// ```text
///   head
///    │
///    ▼
///   ┌────────┬─────────┐   ┌────────┬───────┐   ┌────────┬──────────┐
///   │ header │ payload │──▶│ header │ payld │──▶│ header │ payload  │──▶ ∅
///   └────────┴─────────┘   └────────┴───────┘   └────────┴──────────┘
///   offset 0                                                     region.len()
/// ```
#[derive(Debug)]
pub(crate) struct FreeList {
  region: Region,
  head: Option<BlockRef>,
}

impl FreeList {
  pub const fn new() -> Self {
    Self {
      region: Region::new(),
      head: None,
    }
  }

  pub fn head(&self) -> Option<BlockRef> {
    self.head
  }

  /// Total bytes covered by the chain, headers included.
  pub fn region_len(&self) -> usize {
    self.region.len()
  }

  pub fn get(
    &self,
    at: BlockRef,
  ) -> Block {
    self.region.read(at)
  }

  pub fn set_free(
    &mut self,
    at: BlockRef,
    is_free: bool,
  ) {
    let mut block = self.region.read(at);
    block.is_free = is_free;
    self.region.write(at, block);
  }

  pub fn payload(
    &self,
    at: BlockRef,
  ) -> NonNull<u8> {
    self.region.payload(at)
  }

  /// Finds the block whose payload starts exactly at `payload`.
  pub fn block_at(
    &self,
    payload: *const u8,
  ) -> Option<BlockRef> {
    let offset = self.region.offset_of(payload)?.checked_sub(Block::HEADER_SIZE)?;

    self
      .iter()
      .map(|(at, _)| at)
      .take_while(|at| at.offset() <= offset)
      .find(|at| at.offset() == offset)
  }

  pub fn iter(&self) -> Blocks<'_> {
    self.iter_from(self.head)
  }

  pub fn iter_from(
    &self,
    start: Option<BlockRef>,
  ) -> Blocks<'_> {
    Blocks {
      list: self,
      next: start,
    }
  }

  /// Adopts `HEADER_SIZE + size` freshly grown bytes at `start` as a new
  /// in-use tail block linked after `last`.
  pub fn append(
    &mut self,
    last: Option<BlockRef>,
    start: NonNull<u8>,
    size: usize,
  ) -> Result<BlockRef, Fault> {
    let at = self.region.extend(start, Block::HEADER_SIZE + size)?;
    self.region.write(at, Block::new(size, false, None));

    if self.head.is_none() {
      self.head = Some(at);
    }

    if let Some(last) = last {
      debug_assert_eq!(self.get(last).next, None, "growth must append at the tail");

      let mut tail = self.get(last);
      tail.next = Some(at);
      self.region.write(last, tail);
    }

    Ok(at)
  }

  /// Truncates the block at `at` to `size` bytes and turns the rest into a
  /// free block right after it, provided the rest can hold a header plus
  /// [`ALIGNMENT`] bytes.
  pub fn split(
    &mut self,
    at: BlockRef,
    size: usize,
  ) -> Option<BlockRef> {
    let mut block = self.get(at);
    let leftover = block.size - size;

    if leftover < Block::HEADER_SIZE + ALIGNMENT {
      return None;
    }

    let rest = BlockRef::new(at.offset() + Block::HEADER_SIZE + size);
    self.region.write(rest, Block::new(leftover - Block::HEADER_SIZE, true, block.next));

    block.size = size;
    block.next = Some(rest);
    self.region.write(at, block);

    Some(rest)
  }

  /// Merges the successor of `at` into it and returns the absorbed block,
  /// whose header is abandoned.
  pub fn absorb_next(
    &mut self,
    at: BlockRef,
  ) -> Option<BlockRef> {
    let mut block = self.get(at);
    let next = block.next?;
    let absorbed = self.get(next);

    block.size += absorbed.span();
    block.next = absorbed.next;
    self.region.write(at, block);

    Some(next)
  }
}

/// Iterator over `(position, header)` pairs in address order.
pub struct Blocks<'a> {
  list: &'a FreeList,
  next: Option<BlockRef>,
}

impl Iterator for Blocks<'_> {
  type Item = (BlockRef, Block);

  fn next(&mut self) -> Option<Self::Item> {
    let at = self.next?;
    let block = self.list.get(at);
    self.next = block.next;
    Some((at, block))
  }
}
