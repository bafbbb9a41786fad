use std::{
  alloc::{self, Layout},
  ptr::NonNull,
};

/// Source of fresh memory for a [`crate::Heap`], modelled on `sbrk(2)`.
///
/// # Safety
///
/// When `extend` returns `Some(start)`, the `increment` bytes at `start` must
/// be valid for reads and writes for as long as the grower lives and must not
/// be handed out to anyone else. The returned pointer is the previous break:
/// consecutive successful calls are expected to return contiguous ranges, and
/// the heap treats anything else as a fault.
pub unsafe trait HeapGrower {
  /// Moves the break forward by `increment` bytes and returns the previous
  /// break, or `None` when no more memory can be obtained.
  fn extend(
    &mut self,
    increment: usize,
  ) -> Option<NonNull<u8>>;
}

/// Grows the process data segment with `sbrk(2)`.
///
/// The heap assumes it is the only user of the program break; a second
/// allocator moving it in the same process is detected on the next growth.
#[cfg(unix)]
#[derive(Debug, Default)]
pub struct Sbrk;

#[cfg(unix)]
impl Sbrk {
  pub const fn new() -> Self {
    Self
  }
}

// SAFETY: memory between the old and the new program break belongs to the
// caller of `sbrk` until the break is lowered again, which this crate never
// does.
#[cfg(unix)]
unsafe impl HeapGrower for Sbrk {
  fn extend(
    &mut self,
    increment: usize,
  ) -> Option<NonNull<u8>> {
    let increment = libc::intptr_t::try_from(increment).ok()?;
    let previous = unsafe { libc::sbrk(increment) };

    if previous as usize == usize::MAX {
      return None;
    }

    NonNull::new(previous.cast())
  }
}

/// A fixed-capacity region carved out of the global allocator once.
///
/// Lets several heaps coexist in one process, each with its own private
/// "program break", and makes exhaustion reproducible.
#[derive(Debug)]
pub struct Arena {
  memory: NonNull<u8>,
  layout: Layout,
  brk: usize,
}

impl Arena {
  const ALIGN: usize = 16;

  /// # Panics
  ///
  /// Panics if the global allocator cannot provide `capacity` bytes.
  pub fn new(capacity: usize) -> Self {
    let layout = Layout::from_size_align(capacity.max(1), Self::ALIGN)
      .expect("arena capacity overflows isize");
    // SAFETY: the layout has a non-zero size.
    let memory = unsafe { alloc::alloc_zeroed(layout) };
    let Some(memory) = NonNull::new(memory) else {
      alloc::handle_alloc_error(layout);
    };

    Self {
      memory,
      layout,
      brk: 0,
    }
  }

  pub fn capacity(&self) -> usize {
    self.layout.size()
  }

  /// Bytes handed out so far.
  pub fn used(&self) -> usize {
    self.brk
  }

  /// Moves the break forward by `bytes` without reporting it to the heap,
  /// as another owner of the growth region would.
  pub fn claim_foreign(
    &mut self,
    bytes: usize,
  ) {
    self.brk = (self.brk + bytes).min(self.capacity());
  }
}

// SAFETY: each successful call hands out a disjoint, previously unused slice
// of the arena's own allocation, which stays alive until the arena is
// dropped.
unsafe impl HeapGrower for Arena {
  fn extend(
    &mut self,
    increment: usize,
  ) -> Option<NonNull<u8>> {
    let end = self.brk.checked_add(increment)?;

    if end > self.capacity() {
      return None;
    }

    // SAFETY: `brk <= capacity`, so the pointer stays within the allocation.
    let previous = unsafe { self.memory.add(self.brk) };
    self.brk = end;
    Some(previous)
  }
}

impl Drop for Arena {
  fn drop(&mut self) {
    // SAFETY: allocated in `new` with the same layout.
    unsafe { alloc::dealloc(self.memory.as_ptr(), self.layout) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_arena_hands_out_contiguous_ranges() {
    let mut arena = Arena::new(64);

    let first = arena.extend(24).unwrap();
    let second = arena.extend(16).unwrap();

    assert_eq!(unsafe { first.add(24) }, second);
    assert_eq!(arena.used(), 40);
  }

  #[test]
  fn test_arena_refuses_past_capacity() {
    let mut arena = Arena::new(32);

    assert!(arena.extend(33).is_none());
    assert!(arena.extend(usize::MAX).is_none());
    assert_eq!(arena.used(), 0);
    assert!(arena.extend(32).is_some());
    assert!(arena.extend(1).is_none());
  }

  #[test]
  fn test_foreign_claims_shift_the_break() {
    let mut arena = Arena::new(64);

    let first = arena.extend(8).unwrap();
    arena.claim_foreign(4);
    let second = arena.extend(8).unwrap();

    assert_eq!(unsafe { first.add(12) }, second);
  }

  #[cfg(unix)]
  #[test]
  fn test_sbrk_refuses_increments_beyond_intptr() {
    let mut sbrk = Sbrk::new();

    assert!(sbrk.extend(usize::MAX).is_none());
  }
}
