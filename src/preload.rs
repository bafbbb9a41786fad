//! C allocation entry points backed by one process-wide [`Heap<Sbrk>`].
//!
//! Build with `--features preload` and load the resulting shared object with
//! `LD_PRELOAD`. The strategy comes from `FITALLOC_FIT`; statistics are
//! printed to standard output when the process exits.
//!
//! Nothing in here may allocate through Rust's global allocator: in a
//! preloaded process that allocator is this very code.
//!
//! Faults always abort here, whatever `FITALLOC_ON_FAULT` says: a panic would
//! unwind through `extern "C"` while the global state is mutably borrowed.

// The exports are left out of test builds so the test binary keeps the
// system allocator; the helpers below are still tested.
#![cfg_attr(test, allow(dead_code))]

use std::{
  cell::UnsafeCell,
  ffi::c_void,
  fmt::{self, Write},
  ptr,
};

use crate::{
  config::{FaultAction, HeapConfig},
  grower::Sbrk,
  heap::Heap,
};

struct State {
  heap: Option<Heap<Sbrk>>,
  exit_hook: bool,
}

struct Global(UnsafeCell<State>);

// SAFETY: the exported functions are only sound in a single-threaded
// process, which is the contract of this allocator.
unsafe impl Sync for Global {}

static GLOBAL: Global = Global(UnsafeCell::new(State {
  heap: None,
  exit_hook: false,
}));

/// # Safety
///
/// No other reference into the global state may be alive.
unsafe fn state() -> &'static mut State {
  unsafe { &mut *GLOBAL.0.get() }
}

fn shim_config(config: HeapConfig) -> HeapConfig {
  config.with_fault_action(FaultAction::Abort)
}

fn heap(state: &mut State) -> &mut Heap<Sbrk> {
  state
    .heap
    .get_or_insert_with(|| Heap::with_config(Sbrk::new(), shim_config(HeapConfig::from_env())))
}

/// The heap for an allocating call. The first such call also runs
/// `register`, which installs the exit report.
fn allocating(
  state: &mut State,
  register: impl FnOnce(),
) -> &mut Heap<Sbrk> {
  if !state.exit_hook {
    state.exit_hook = true;
    register();
  }

  heap(state)
}

fn register_exit_report() {
  unsafe { libc::atexit(print_statistics) };
}

/// Fixed-size formatting target on the stack.
struct StackBuffer {
  bytes: [u8; 512],
  len: usize,
}

impl Write for StackBuffer {
  fn write_str(
    &mut self,
    s: &str,
  ) -> fmt::Result {
    let end = self.len + s.len();
    let target = self.bytes.get_mut(self.len..end).ok_or(fmt::Error)?;

    target.copy_from_slice(s.as_bytes());
    self.len = end;
    Ok(())
  }
}

extern "C" fn print_statistics() {
  let Some(stats) = (unsafe { state() }).heap.as_ref().map(|heap| *heap.stats()) else {
    return;
  };

  let mut buffer = StackBuffer {
    bytes: [0; 512],
    len: 0,
  };

  if write!(buffer, "\n{stats}").is_ok() {
    unsafe { libc::write(libc::STDOUT_FILENO, buffer.bytes.as_ptr().cast(), buffer.len) };
  }
}

fn raw(payload: Option<ptr::NonNull<u8>>) -> *mut c_void {
  payload.map_or(ptr::null_mut(), |payload| payload.as_ptr().cast())
}

/// # Safety
///
/// Single-threaded callers only.
#[cfg(not(test))]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn malloc(size: usize) -> *mut c_void {
  let state = unsafe { state() };
  raw(allocating(state, register_exit_report).allocate(size))
}

/// # Safety
///
/// `ptr` must be null or come from this allocator and not be used afterwards.
#[cfg(not(test))]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn free(ptr: *mut c_void) {
  let state = unsafe { state() };
  unsafe { heap(state).free(ptr.cast()) }
}

/// # Safety
///
/// Single-threaded callers only.
#[cfg(not(test))]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn calloc(
  count: usize,
  size: usize,
) -> *mut c_void {
  let state = unsafe { state() };
  raw(allocating(state, register_exit_report).zero_allocate(count, size))
}

/// # Safety
///
/// See [`Heap::resize`].
#[cfg(not(test))]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn realloc(
  ptr: *mut c_void,
  size: usize,
) -> *mut c_void {
  let state = unsafe { state() };
  raw(unsafe { allocating(state, register_exit_report).resize(ptr.cast(), size) })
}

/// # Safety
///
/// Single-threaded callers only.
#[cfg(not(test))]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn malloc_usable_size(ptr: *mut c_void) -> usize {
  let state = unsafe { state() };
  heap(state).usable_size(ptr.cast()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::fit::Fit;

  #[test]
  fn test_exit_report_registered_once_across_calls() {
    let mut state = State {
      heap: None,
      exit_hook: false,
    };
    let mut registered = 0;

    allocating(&mut state, || registered += 1);
    allocating(&mut state, || registered += 1);

    assert_eq!(registered, 1);
    assert!(state.exit_hook);
    assert!(state.heap.is_some());
  }

  #[test]
  fn test_shim_never_unwinds_on_fault() {
    let config = HeapConfig::new(Fit::Best).with_fault_action(FaultAction::Panic);

    assert_eq!(
      shim_config(config),
      HeapConfig::new(Fit::Best).with_fault_action(FaultAction::Abort)
    );
  }
}
