//! # fitalloc - A Fit-Strategy Heap Allocator
//!
//! This crate provides a classic **block-list allocator**: one growable heap
//! segment, obtained from the operating system with `sbrk`, carved into
//! header-prefixed blocks that are chained in address order.
//!
//! ## Overview
//!
//! Every byte the heap ever obtained belongs to exactly one block, free or in
//! use:
//!
//! ```text
//!   Managed region (grows only to the right):
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                                                                      │
//!   │   ┌────┬──────┬────┬───────────┬────┬────┬────┬──────────────────┐   │
//!   │   │ H  │ used │ H  │   free    │ H  │used│ H  │      used        │   │
//!   │   └────┴──────┴────┴───────────┴────┴────┴────┴──────────────────┘   │
//!   │   ▲                                                              ▲   │
//!   │   │                                                              │   │
//!   │  head                                                      Program   │
//!   │                                                             Break    │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   H = block header (size, next, free flag)
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   fitalloc
//!   ├── align      - Rounding to the 4-byte granularity (align!)
//!   ├── block      - Block header and its in-memory encoding
//!   ├── region     - Bounds-checked view of the grown memory
//!   ├── free_list  - Address-ordered block chain, split and merge
//!   ├── fit        - First, best, worst and next fit searches
//!   ├── grower     - HeapGrower trait, Sbrk and Arena
//!   ├── heap       - Heap: allocate, free, zero_allocate, resize
//!   ├── stats      - Counters and the exit report
//!   ├── config     - HeapConfig from TOML or the environment
//!   ├── error      - Fault and ConfigError
//!   └── preload    - malloc/free/calloc/realloc exports (feature "preload")
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use fitalloc::{Arena, Fit, Heap, HeapConfig};
//!
//! let mut heap = Heap::with_config(Arena::new(4096), HeapConfig::new(Fit::Best));
//!
//! let ptr = heap.allocate(10).unwrap();
//! unsafe {
//!   ptr.as_ptr().write_bytes(0x2A, 10);
//!   heap.free(ptr.as_ptr());
//! }
//!
//! assert_eq!(heap.stats().mallocs, 1);
//! assert_eq!(heap.stats().frees, 1);
//! ```
//!
//! ## How It Works
//!
//! An allocation rounds the request up to a multiple of 4 and asks the fit
//! strategy for a free block. A block that is larger than needed by at least
//! a header plus 4 bytes is split; otherwise it is handed out whole. When no
//! block fits, the heap grows by exactly one header plus the request and the
//! new block is appended at the tail:
//!
//! ```text
//!   Splitting a free block:
//!
//!   before  ┌────┬──────────────────────────────────┐
//!           │ H  │            free (100)            │
//!           └────┴──────────────────────────────────┘
//!   after   ┌────┬──────────┬────┬──────────────────┐
//!           │ H  │ used(20) │ H  │ free(100-20-H)   │
//!           └────┴──────────┴────┴──────────────────┘
//! ```
//!
//! Freeing merges the block with a free successor, then sweeps the whole
//! chain so that no two neighbouring blocks are ever both free. Memory is
//! never returned to the operating system.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: no synchronization at all
//! - **Grow-only heap**: the program break never moves back
//! - **4-byte alignment**: payloads are not aligned for wider types
//! - **Unix-only sbrk**: [`Arena`] is available everywhere
//!
//! ## Safety
//!
//! Freeing and resizing take raw pointers and are `unsafe`. Contract
//! violations such as a double free are detected and reported as a [`Fault`];
//! by default the process aborts.

pub mod align;
mod block;
mod config;
mod error;
mod fit;
mod free_list;
mod grower;
mod heap;
#[cfg(all(feature = "preload", unix))]
mod preload;
mod region;
mod stats;

pub use block::{Block, BlockRef};
pub use config::{FIT_VAR, FaultAction, HeapConfig, ON_FAULT_VAR};
pub use error::{ConfigError, Fault};
pub use fit::Fit;
#[cfg(unix)]
pub use grower::Sbrk;
pub use grower::{Arena, HeapGrower};
pub use heap::Heap;
pub use stats::Stats;
