use thiserror::Error;

/// Contract violations and corruption detected by the heap.
///
/// None of these are recoverable in a production build: the plain
/// operations on [`crate::Heap`] hand them to the configured
/// [`crate::FaultAction`]. The `try_*` variants return them instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
  #[error("double free of block at {address:#x}")]
  DoubleFree { address: usize },

  #[error("address {address:#x} is not the payload of any block in this heap")]
  ForeignAddress { address: usize },

  #[error("program break moved behind the heap's back: expected {expected:#x}, got {found:#x}")]
  BreakMoved { expected: usize, found: usize },

  #[error("block chain does not cover the region at offset {offset}")]
  BrokenChain { offset: usize },

  #[error("adjacent free blocks left uncoalesced at offset {offset}")]
  AdjacentFree { offset: usize },
}

/// Errors raised while building a [`crate::HeapConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to parse heap configuration: {0}")]
  Toml(#[from] toml::de::Error),

  #[error("unknown fit strategy (expected first, best, worst or next)")]
  UnknownFit,

  #[error("unknown fault action (expected abort or panic)")]
  UnknownFaultAction,
}
