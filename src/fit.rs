use std::{fmt, str::FromStr};

use serde::Deserialize;

use crate::{
  block::{Block, BlockRef},
  error::ConfigError,
  free_list::FreeList,
};

/// Placement policy used to pick a free block for a request.
///
/// Fixed for the lifetime of a [`crate::Heap`]. The default follows the
/// `best-fit`, `worst-fit` and `next-fit` Cargo features, falling back to
/// first fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fit {
  /// Lowest-addressed free block that is large enough.
  First,
  /// Free block leaving the smallest leftover; earliest wins ties.
  Best,
  /// Free block leaving the largest non-zero leftover; earliest wins ties.
  Worst,
  /// First fit resuming from where the previous search stopped.
  Next,
}

impl Default for Fit {
  fn default() -> Self {
    if cfg!(feature = "next-fit") {
      Fit::Next
    } else if cfg!(feature = "worst-fit") {
      Fit::Worst
    } else if cfg!(feature = "best-fit") {
      Fit::Best
    } else {
      Fit::First
    }
  }
}

impl FromStr for Fit {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim() {
      s if s.eq_ignore_ascii_case("first") => Ok(Fit::First),
      s if s.eq_ignore_ascii_case("best") => Ok(Fit::Best),
      s if s.eq_ignore_ascii_case("worst") => Ok(Fit::Worst),
      s if s.eq_ignore_ascii_case("next") => Ok(Fit::Next),
      _ => Err(ConfigError::UnknownFit),
    }
  }
}

impl fmt::Display for Fit {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    let name = match self {
      Fit::First => "first",
      Fit::Best => "best",
      Fit::Worst => "worst",
      Fit::Next => "next",
    };
    f.write_str(name)
  }
}

/// Outcome of a free-block search.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Search {
  pub found: Option<BlockRef>,
  /// Last block visited by a scan that ran to the end of the list; growth
  /// appends after it.
  pub last: Option<BlockRef>,
}

impl Fit {
  pub(crate) fn search(
    self,
    list: &FreeList,
    size: usize,
    cursor: &mut Option<BlockRef>,
  ) -> Search {
    match self {
      Fit::First => first_fit(list, list.head(), size),
      Fit::Best => best_fit(list, size),
      Fit::Worst => worst_fit(list, size),
      Fit::Next => next_fit(list, size, cursor),
    }
  }
}

fn fits(
  block: &Block,
  size: usize,
) -> bool {
  block.is_free && block.size >= size
}

fn first_fit(
  list: &FreeList,
  start: Option<BlockRef>,
  size: usize,
) -> Search {
  let mut search = Search::default();

  for (at, block) in list.iter_from(start) {
    if fits(&block, size) {
      search.found = Some(at);
      break;
    }
    search.last = Some(at);
  }

  search
}

fn best_fit(
  list: &FreeList,
  size: usize,
) -> Search {
  let mut search = Search::default();
  let mut winning_leftover: Option<usize> = None;

  for (at, block) in list.iter() {
    if fits(&block, size) {
      let leftover = block.size - size;

      if winning_leftover.is_none_or(|winning| leftover < winning) {
        winning_leftover = Some(leftover);
        search.found = Some(at);
      }
    }
    search.last = Some(at);
  }

  search
}

fn worst_fit(
  list: &FreeList,
  size: usize,
) -> Search {
  let mut search = Search::default();
  // Strict comparison against a zero floor: an exact fit never wins.
  let mut winning_leftover = 0;

  for (at, block) in list.iter() {
    if fits(&block, size) {
      let leftover = block.size - size;

      if leftover > winning_leftover {
        winning_leftover = leftover;
        search.found = Some(at);
      }
    }
    search.last = Some(at);
  }

  search
}

fn next_fit(
  list: &FreeList,
  size: usize,
  cursor: &mut Option<BlockRef>,
) -> Search {
  let Some(start) = *cursor else {
    let search = first_fit(list, list.head(), size);
    *cursor = search.found;
    return search;
  };

  let mut search = first_fit(list, Some(start), size);

  if search.found.is_none() {
    search.found = list
      .iter()
      .take_while(|&(at, _)| at != start)
      .find(|(_, block)| fits(block, size))
      .map(|(at, _)| at);
  }

  *cursor = search.found;
  search
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;
  use crate::{free_list::tests::chain, grower::Arena};

  /// Free blocks of 20, 50 and 30 bytes, in that address order.
  fn twenty_fifty_thirty(arena: &mut Arena) -> (FreeList, Vec<BlockRef>) {
    chain(arena, &[(20, true), (50, true), (30, true)])
  }

  #[test]
  fn test_first_fit_takes_earliest_large_enough() {
    let mut arena = Arena::new(512);
    let (list, refs) = twenty_fifty_thirty(&mut arena);

    let search = Fit::First.search(&list, 25, &mut None);

    assert_eq!(search.found, Some(refs[1]));
  }

  #[test]
  fn test_best_fit_minimises_leftover() {
    let mut arena = Arena::new(512);
    let (list, refs) = twenty_fifty_thirty(&mut arena);

    let search = Fit::Best.search(&list, 25, &mut None);

    assert_eq!(search.found, Some(refs[2]));
    assert_eq!(search.last, Some(refs[2]));
  }

  #[test]
  fn test_worst_fit_maximises_leftover() {
    let mut arena = Arena::new(512);
    let (list, refs) = twenty_fifty_thirty(&mut arena);

    let search = Fit::Worst.search(&list, 25, &mut None);

    assert_eq!(search.found, Some(refs[1]));
  }

  #[test]
  fn test_ties_go_to_lowest_address() {
    let mut arena = Arena::new(512);
    let (list, refs) = chain(&mut arena, &[(8, false), (40, true), (40, true)]);

    assert_eq!(Fit::Best.search(&list, 16, &mut None).found, Some(refs[1]));
    assert_eq!(Fit::Worst.search(&list, 16, &mut None).found, Some(refs[1]));
  }

  #[test]
  fn test_worst_fit_never_picks_exact_fit() {
    let mut arena = Arena::new(512);
    let (list, refs) = chain(&mut arena, &[(16, true), (8, false)]);

    let search = Fit::Worst.search(&list, 16, &mut None);

    assert_eq!(search.found, None);
    assert_eq!(search.last, Some(refs[1]));
    assert_eq!(Fit::Best.search(&list, 16, &mut None).found, Some(refs[0]));
  }

  #[test]
  fn test_in_use_blocks_are_skipped() {
    let mut arena = Arena::new(512);
    let (list, refs) = chain(&mut arena, &[(64, false), (32, true)]);

    for fit in [Fit::First, Fit::Best, Fit::Worst, Fit::Next] {
      assert_eq!(fit.search(&list, 24, &mut None).found, Some(refs[1]), "{fit}");
    }
  }

  #[test]
  fn test_failed_search_reports_tail() {
    let mut arena = Arena::new(512);
    let (list, refs) = twenty_fifty_thirty(&mut arena);

    for fit in [Fit::First, Fit::Best, Fit::Worst, Fit::Next] {
      let search = fit.search(&list, 60, &mut None);
      assert_eq!(search, Search { found: None, last: Some(refs[2]) }, "{fit}");
    }
  }

  #[test]
  fn test_empty_list_finds_nothing() {
    let list = FreeList::new();

    assert_eq!(Fit::First.search(&list, 4, &mut None), Search::default());
    assert_eq!(Fit::Next.search(&list, 4, &mut None), Search::default());
  }

  #[test]
  fn test_next_fit_without_cursor_behaves_as_first_fit() {
    let mut arena = Arena::new(512);
    let (list, refs) = twenty_fifty_thirty(&mut arena);
    let mut cursor = None;

    let search = Fit::Next.search(&list, 25, &mut cursor);

    assert_eq!(search.found, Some(refs[1]));
    assert_eq!(cursor, Some(refs[1]));
  }

  #[test]
  fn test_next_fit_resumes_from_cursor() {
    let mut arena = Arena::new(512);
    let (list, refs) = twenty_fifty_thirty(&mut arena);
    let mut cursor = Some(refs[1]);

    assert_eq!(Fit::Next.search(&list, 25, &mut cursor).found, Some(refs[1]));
    assert_eq!(cursor, Some(refs[1]));

    let mut cursor = Some(refs[2]);
    assert_eq!(Fit::Next.search(&list, 4, &mut cursor).found, Some(refs[2]));
    assert_eq!(cursor, Some(refs[2]));
  }

  #[test]
  fn test_next_fit_wraps_to_head() {
    let mut arena = Arena::new(512);
    let (list, refs) = twenty_fifty_thirty(&mut arena);
    let mut cursor = Some(refs[2]);

    let search = Fit::Next.search(&list, 40, &mut cursor);

    assert_eq!(search.found, Some(refs[1]));
    assert_eq!(search.last, Some(refs[2]));
    assert_eq!(cursor, Some(refs[1]));
  }

  #[test]
  fn test_next_fit_wrap_stops_before_cursor() {
    let mut arena = Arena::new(512);
    let (list, refs) = chain(&mut arena, &[(8, true), (64, false), (16, true)]);
    let mut cursor = Some(refs[1]);

    let search = Fit::Next.search(&list, 32, &mut cursor);

    assert_eq!(search.found, None);
    assert_eq!(search.last, Some(refs[2]));
    assert_eq!(cursor, None);
  }

  #[test]
  fn test_fit_names_parse() {
    assert_eq!("first".parse::<Fit>().unwrap(), Fit::First);
    assert_eq!("Best".parse::<Fit>().unwrap(), Fit::Best);
    assert_eq!(" worst ".parse::<Fit>().unwrap(), Fit::Worst);
    assert_eq!("NEXT".parse::<Fit>().unwrap(), Fit::Next);
    assert!(matches!("buddy".parse::<Fit>(), Err(ConfigError::UnknownFit)));
  }

  #[test]
  fn test_display_round_trips_through_parse() {
    for fit in [Fit::First, Fit::Best, Fit::Worst, Fit::Next] {
      assert_eq!(fit.to_string().parse::<Fit>().unwrap(), fit);
    }
  }
}
