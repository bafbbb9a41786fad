/// Allocation granularity in bytes. Every payload size handed out is a
/// multiple of this.
pub const ALIGNMENT: usize = 4;

/// Rounds the given size up to the next multiple of [`ALIGNMENT`].
///
/// # Examples
///
/// ```rust
/// use fitalloc::align;
///
/// assert_eq!(align!(1), 4);
/// assert_eq!(align!(10), 12);
/// assert_eq!(align!(12), 12);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value + $crate::align::ALIGNMENT - 1) & !($crate::align::ALIGNMENT - 1)
  };
}

#[cfg(test)]
mod tests {
  #[test]
  fn test_align_rounds_up_to_granule() {
    let cases: [(usize, usize); 8] = [
      (0, 0),
      (1, 4),
      (3, 4),
      (4, 4),
      (10, 12),
      (12, 12),
      (13, 16),
      (1021, 1024),
    ];

    for (size, expected) in cases {
      assert_eq!(align!(size), expected, "align!({size})");
    }
  }
}
