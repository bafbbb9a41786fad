use std::{fmt, io};

/// Counters maintained by a [`crate::Heap`] over its lifetime.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
  /// Successful allocations.
  pub mallocs: usize,
  pub frees: usize,
  /// Allocations served from an existing free block.
  pub reuses: usize,
  pub grows: usize,
  pub splits: usize,
  pub coalesces: usize,
  /// Blocks currently in the chain.
  pub blocks: usize,
  /// Sum of rounded request sizes.
  pub requested: usize,
  /// Bytes obtained from the grower, headers included.
  pub max_heap: usize,
}

impl Stats {
  /// Writes the report preceded by a blank line, as printed on shutdown.
  pub fn write_report(
    &self,
    out: &mut impl io::Write,
  ) -> io::Result<()> {
    writeln!(out)?;
    write!(out, "{self}")?;
    out.flush()
  }
}

impl fmt::Display for Stats {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    writeln!(f, "heap management statistics")?;
    writeln!(f, "mallocs:\t{}", self.mallocs)?;
    writeln!(f, "frees:\t\t{}", self.frees)?;
    writeln!(f, "reuses:\t\t{}", self.reuses)?;
    writeln!(f, "grows:\t\t{}", self.grows)?;
    writeln!(f, "splits:\t\t{}", self.splits)?;
    writeln!(f, "coalesces:\t{}", self.coalesces)?;
    writeln!(f, "blocks:\t\t{}", self.blocks)?;
    writeln!(f, "requested:\t{}", self.requested)?;
    writeln!(f, "max heap:\t{}", self.max_heap)
  }
}
