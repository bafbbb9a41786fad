use std::{
  io,
  process,
  ptr::{self, NonNull},
};

use log::{debug, error, trace};

use crate::{
  align,
  align::ALIGNMENT,
  block::{Block, BlockRef},
  config::{FaultAction, HeapConfig},
  error::Fault,
  fit::Fit,
  free_list::FreeList,
  grower::HeapGrower,
  stats::Stats,
};

/// Largest request that can still be expressed as a single growth.
const MAX_REQUEST: usize = isize::MAX as usize - Block::HEADER_SIZE - ALIGNMENT;

/// A single growable heap handing out header-prefixed blocks.
///
/// ```text
///   allocate(size)
///        │
///        ▼
///   ┌──────────┐  found   ┌───────────────┐
///   │ Fit      │─────────▶│ split if the  │──┐
///   │ search   │          │ rest is large │  │
///   └──────────┘          └───────────────┘  │   mark in use,
///        │ not found                         ├──▶ return payload
///        ▼                                   │
///   ┌──────────┐  extend  ┌───────────────┐  │
///   │ Grower   │─────────▶│ append at tail│──┘
///   └──────────┘          └───────────────┘
/// ```
///
/// Not thread safe: every operation takes `&mut self`.
#[derive(Debug)]
pub struct Heap<G: HeapGrower> {
  grower: G,
  blocks: FreeList,
  config: HeapConfig,
  cursor: Option<BlockRef>,
  stats: Stats,
}

impl<G: HeapGrower> Heap<G> {
  pub fn new(grower: G) -> Self {
    Self::with_config(grower, HeapConfig::default())
  }

  pub fn with_config(
    grower: G,
    config: HeapConfig,
  ) -> Self {
    Self {
      grower,
      blocks: FreeList::new(),
      config,
      cursor: None,
      stats: Stats::default(),
    }
  }

  pub fn fit(&self) -> Fit {
    self.config.fit
  }

  pub fn config(&self) -> &HeapConfig {
    &self.config
  }

  pub fn stats(&self) -> &Stats {
    &self.stats
  }

  pub fn grower(&self) -> &G {
    &self.grower
  }

  pub fn grower_mut(&mut self) -> &mut G {
    &mut self.grower
  }

  /// Where the next next-fit search resumes.
  pub fn next_fit_cursor(&self) -> Option<BlockRef> {
    self.cursor
  }

  /// All blocks in address order.
  pub fn blocks(&self) -> impl Iterator<Item = (BlockRef, Block)> + '_ {
    self.blocks.iter()
  }

  /// Payload address of the block at `at`.
  pub fn payload(
    &self,
    at: BlockRef,
  ) -> NonNull<u8> {
    self.blocks.payload(at)
  }

  /// Payload bytes available behind `ptr`, if it was handed out by this heap.
  pub fn usable_size(
    &self,
    ptr: *const u8,
  ) -> Option<usize> {
    self.blocks.block_at(ptr).map(|at| self.blocks.get(at).size)
  }

  /// Allocates at least `size` bytes, or returns `None` for a zero-size
  /// request or when the grower is exhausted.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Option<NonNull<u8>> {
    match self.try_allocate(size) {
      Ok(payload) => payload,
      Err(fault) => self.raise(fault),
    }
  }

  pub fn try_allocate(
    &mut self,
    size: usize,
  ) -> Result<Option<NonNull<u8>>, Fault> {
    if size == 0 || size > MAX_REQUEST {
      return Ok(None);
    }

    let size = align!(size);
    self.stats.requested = self.stats.requested.saturating_add(size);

    let search = self.config.fit.search(&self.blocks, size, &mut self.cursor);

    let at = match search.found {
      Some(found) => {
        if let Some(rest) = self.blocks.split(found, size) {
          trace!("split block {} at {} for {size} bytes", found.offset(), rest.offset());
          self.stats.splits += 1;
          self.stats.blocks += 1;
        }
        trace!("reusing block {} for {size} bytes", found.offset());
        self.stats.reuses += 1;
        found
      }
      None => match self.grow(search.last, size)? {
        Some(grown) => grown,
        None => return Ok(None),
      },
    };

    self.blocks.set_free(at, false);
    self.stats.mallocs += 1;

    Ok(Some(self.blocks.payload(at)))
  }

  /// Returns a block to the heap and coalesces free neighbours. A null
  /// pointer is ignored.
  ///
  /// # Safety
  ///
  /// The payload must not be used after this call.
  pub unsafe fn free(
    &mut self,
    ptr: *mut u8,
  ) {
    if let Err(fault) = unsafe { self.try_free(ptr) } {
      self.raise(fault)
    }
  }

  /// # Safety
  ///
  /// See [`Heap::free`].
  pub unsafe fn try_free(
    &mut self,
    ptr: *mut u8,
  ) -> Result<(), Fault> {
    if ptr.is_null() {
      return Ok(());
    }

    let at = self.owned_block(ptr)?;

    if self.blocks.get(at).is_free {
      return Err(Fault::DoubleFree {
        address: ptr.addr(),
      });
    }

    self.blocks.set_free(at, true);
    self.coalesce(at);

    let mut current = self.blocks.head();
    while let Some(at) = current {
      if !self.coalesce(at) {
        current = self.blocks.get(at).next;
      }
    }

    self.stats.frees += 1;
    Ok(())
  }

  /// Allocates `count * size` zeroed bytes.
  ///
  /// The product is not checked for overflow: a wrapped product yields a
  /// smaller allocation than the caller asked for.
  pub fn zero_allocate(
    &mut self,
    count: usize,
    size: usize,
  ) -> Option<NonNull<u8>> {
    match self.try_zero_allocate(count, size) {
      Ok(payload) => payload,
      Err(fault) => self.raise(fault),
    }
  }

  pub fn try_zero_allocate(
    &mut self,
    count: usize,
    size: usize,
  ) -> Result<Option<NonNull<u8>>, Fault> {
    let bytes = count.wrapping_mul(size);
    let payload = self.try_allocate(bytes)?;

    if let Some(payload) = payload {
      // SAFETY: the block behind `payload` holds at least `bytes` bytes.
      unsafe { ptr::write_bytes(payload.as_ptr(), 0, bytes) }
    }

    Ok(payload)
  }

  /// Moves the contents of `ptr` into a fresh block of `size` bytes and frees
  /// the old one. A null `ptr` allocates; a zero `size` frees and returns
  /// `None`. If the new block cannot be obtained, `ptr` stays live and `None`
  /// is returned.
  ///
  /// The copy always spans the old block's full payload, even when the new
  /// block is smaller. Shrinking therefore writes past the end of the new
  /// block.
  ///
  /// # Safety
  ///
  /// The old payload must not be used after a successful call. When
  /// shrinking, the bytes following the new block receive the tail of the
  /// old payload: the caller must ensure they are writable and hold nothing
  /// of value, including any block header.
  pub unsafe fn resize(
    &mut self,
    ptr: *mut u8,
    size: usize,
  ) -> Option<NonNull<u8>> {
    match unsafe { self.try_resize(ptr, size) } {
      Ok(payload) => payload,
      Err(fault) => self.raise(fault),
    }
  }

  /// # Safety
  ///
  /// See [`Heap::resize`].
  pub unsafe fn try_resize(
    &mut self,
    ptr: *mut u8,
    size: usize,
  ) -> Result<Option<NonNull<u8>>, Fault> {
    if size == 0 {
      unsafe { self.try_free(ptr)? };
      return Ok(None);
    }

    if ptr.is_null() {
      return self.try_allocate(size);
    }

    let old = self.owned_block(ptr)?;

    if self.blocks.get(old).is_free {
      return Err(Fault::DoubleFree {
        address: ptr.addr(),
      });
    }

    let Some(payload) = self.try_allocate(size)? else {
      return Ok(None);
    };

    let old_size = self.blocks.get(old).size;
    // Full old size, not the smaller of the two.
    unsafe { ptr::copy(ptr, payload.as_ptr(), old_size) };
    unsafe { self.try_free(ptr)? };

    Ok(Some(payload))
  }

  /// Verifies that the chain covers the whole region in address order and
  /// that no two neighbours are both free.
  pub fn check(&self) -> Result<(), Fault> {
    let mut expected = 0;
    let mut previous_free = false;

    for (at, block) in self.blocks.iter() {
      if at.offset() != expected {
        return Err(Fault::BrokenChain {
          offset: at.offset(),
        });
      }

      if previous_free && block.is_free {
        return Err(Fault::AdjacentFree {
          offset: at.offset(),
        });
      }

      previous_free = block.is_free;
      expected += block.span();
    }

    if expected != self.blocks.region_len() {
      return Err(Fault::BrokenChain { offset: expected });
    }

    Ok(())
  }

  /// Writes the statistics report to `out`.
  pub fn report(
    &self,
    out: &mut impl io::Write,
  ) -> io::Result<()> {
    self.stats.write_report(out)
  }

  /// Ends the heap's lifetime: writes the report once and returns the final
  /// counters. Memory obtained from the grower is released with the grower.
  pub fn shutdown(
    self,
    out: &mut impl io::Write,
  ) -> io::Result<Stats> {
    self.report(out)?;
    Ok(self.stats)
  }

  fn owned_block(
    &self,
    ptr: *const u8,
  ) -> Result<BlockRef, Fault> {
    self.blocks.block_at(ptr).ok_or(Fault::ForeignAddress {
      address: ptr.addr(),
    })
  }

  fn grow(
    &mut self,
    last: Option<BlockRef>,
    size: usize,
  ) -> Result<Option<BlockRef>, Fault> {
    let bytes = Block::HEADER_SIZE + size;

    let Some(start) = self.grower.extend(bytes) else {
      debug!("heap growth by {bytes} bytes refused");
      return Ok(None);
    };

    let at = self.blocks.append(last, start, size)?;
    debug!("grew heap by {bytes} bytes, new block at {}", at.offset());

    self.stats.max_heap += bytes;
    self.stats.grows += 1;
    self.stats.blocks += 1;

    Ok(Some(at))
  }

  /// Merges the successor of `at` into it when both are free.
  fn coalesce(
    &mut self,
    at: BlockRef,
  ) -> bool {
    let block = self.blocks.get(at);

    let Some(next) = block.next else {
      return false;
    };

    if !block.is_free || !self.blocks.get(next).is_free {
      return false;
    }

    self.blocks.absorb_next(at);
    trace!("coalesced block {} into {}", next.offset(), at.offset());

    if self.cursor == Some(next) {
      self.cursor = Some(at);
    }

    self.stats.coalesces += 1;
    self.stats.blocks -= 1;
    true
  }

  fn raise(
    &self,
    fault: Fault,
  ) -> ! {
    error!("heap fault: {fault}");

    match self.config.on_fault {
      FaultAction::Abort => process::abort(),
      FaultAction::Panic => panic!("heap fault: {fault}"),
    }
  }
}
