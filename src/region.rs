use std::ptr::{self, NonNull};

use crate::{
  block::{Block, BlockRef, RawHeader},
  error::Fault,
};

/// The contiguous span of memory obtained through a grower so far.
///
/// The base is fixed by the first extension; every later extension must
/// start at `base + len`. Header accesses are checked against `len`.
#[derive(Debug)]
pub(crate) struct Region {
  base: Option<NonNull<u8>>,
  len: usize,
}

impl Region {
  pub const fn new() -> Self {
    Self { base: None, len: 0 }
  }

  pub fn len(&self) -> usize {
    self.len
  }

  /// Takes ownership of `bytes` bytes starting at `start` and returns the
  /// offset at which they begin.
  pub fn extend(
    &mut self,
    start: NonNull<u8>,
    bytes: usize,
  ) -> Result<BlockRef, Fault> {
    match self.base {
      None => self.base = Some(start),
      Some(base) => {
        let expected = base.addr().get() + self.len;
        let found = start.addr().get();

        if found != expected {
          return Err(Fault::BreakMoved { expected, found });
        }
      }
    }

    let at = BlockRef::new(self.len);
    self.len += bytes;
    Ok(at)
  }

  pub fn read(
    &self,
    at: BlockRef,
  ) -> Block {
    let header = self.header_ptr(at);
    // SAFETY: `header_ptr` checked that a whole header lies inside the region,
    // and the grower contract keeps the region readable.
    Block::from(unsafe { ptr::read_unaligned(header) })
  }

  pub fn write(
    &mut self,
    at: BlockRef,
    block: Block,
  ) {
    let header = self.header_ptr(at);
    // SAFETY: as in `read`; the region is writable and owned by this heap.
    unsafe { ptr::write_unaligned(header, RawHeader::from(block)) }
  }

  pub fn payload(
    &self,
    at: BlockRef,
  ) -> NonNull<u8> {
    let header = self.header_ptr(at).cast::<u8>();
    // SAFETY: the header ends inside the region, so the payload start is at
    // most one past its end and derived from a non-null base.
    unsafe { NonNull::new_unchecked(header.add(Block::HEADER_SIZE)) }
  }

  /// Byte offset of `address` within the region, if it lies inside it.
  pub fn offset_of(
    &self,
    address: *const u8,
  ) -> Option<usize> {
    let base = self.base?.addr().get();
    let offset = address.addr().checked_sub(base)?;

    (offset < self.len).then_some(offset)
  }

  fn header_ptr(
    &self,
    at: BlockRef,
  ) -> *mut RawHeader {
    let end = at.offset().checked_add(Block::HEADER_SIZE);
    assert!(
      end.is_some_and(|end| end <= self.len),
      "block header at offset {} lies outside the {}-byte region",
      at.offset(),
      self.len
    );

    match self.base {
      // SAFETY: the assertion above bounds the offset by the region length.
      Some(base) => unsafe { base.as_ptr().add(at.offset()).cast() },
      None => unreachable!("an empty region has no headers"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::grower::{Arena, HeapGrower};

  #[test]
  fn test_headers_round_trip_through_memory() {
    let mut arena = Arena::new(256);
    let mut region = Region::new();

    let start = arena.extend(Block::HEADER_SIZE + 6).unwrap();
    let first = region.extend(start, Block::HEADER_SIZE + 6).unwrap();
    let start = arena.extend(Block::HEADER_SIZE + 8).unwrap();
    let second = region.extend(start, Block::HEADER_SIZE + 8).unwrap();

    region.write(first, Block::new(6, false, Some(second)));
    region.write(second, Block::new(8, true, None));

    assert_eq!(region.read(first), Block::new(6, false, Some(second)));
    assert_eq!(region.read(second), Block::new(8, true, None));
    assert_eq!(second.offset(), Block::HEADER_SIZE + 6);
  }

  #[test]
  fn test_discontiguous_extension_is_a_fault() {
    let mut arena = Arena::new(256);
    let mut region = Region::new();

    let start = arena.extend(32).unwrap();
    region.extend(start, 32).unwrap();

    arena.claim_foreign(8);
    let start = arena.extend(32).unwrap();

    assert!(matches!(region.extend(start, 32), Err(Fault::BreakMoved { .. })));
  }

  #[test]
  fn test_offset_of_is_bounded_by_region() {
    let mut arena = Arena::new(256);
    let mut region = Region::new();

    let start = arena.extend(64).unwrap();
    region.extend(start, 64).unwrap();

    let base = start.as_ptr();
    assert_eq!(region.offset_of(base), Some(0));
    assert_eq!(region.offset_of(base.wrapping_add(63)), Some(63));
    assert_eq!(region.offset_of(base.wrapping_add(64)), None);
    assert_eq!(region.offset_of(base.wrapping_sub(1)), None);
  }

  #[test]
  #[should_panic(expected = "outside")]
  fn test_reading_past_the_region_panics() {
    let mut arena = Arena::new(256);
    let mut region = Region::new();

    let start = arena.extend(Block::HEADER_SIZE).unwrap();
    region.extend(start, Block::HEADER_SIZE).unwrap();

    region.read(BlockRef::new(4));
  }
}
