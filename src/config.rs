use std::{ffi::CStr, str::FromStr};

use log::warn;
use serde::Deserialize;

use crate::{error::ConfigError, fit::Fit};

/// Environment variable naming the fit strategy for [`HeapConfig::from_env`].
pub const FIT_VAR: &CStr = c"FITALLOC_FIT";
/// Environment variable naming the [`FaultAction`] for [`HeapConfig::from_env`].
pub const ON_FAULT_VAR: &CStr = c"FITALLOC_ON_FAULT";

/// What the plain (non-`try_`) heap operations do with a [`crate::Fault`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultAction {
  /// Terminate the process immediately.
  #[default]
  Abort,
  /// Unwind, so a test harness or supervisor can observe the fault.
  ///
  /// Only meaningful when the heap is driven from Rust. The preload exports
  /// ignore it and always abort, since unwinding out of them is undefined.
  Panic,
}

impl FromStr for FaultAction {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim() {
      s if s.eq_ignore_ascii_case("abort") => Ok(FaultAction::Abort),
      s if s.eq_ignore_ascii_case("panic") => Ok(FaultAction::Panic),
      _ => Err(ConfigError::UnknownFaultAction),
    }
  }
}

/// Settings fixed when a [`crate::Heap`] is constructed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeapConfig {
  pub fit: Fit,
  pub on_fault: FaultAction,
}

impl HeapConfig {
  pub fn new(fit: Fit) -> Self {
    Self {
      fit,
      ..Self::default()
    }
  }

  pub fn with_fault_action(
    mut self,
    on_fault: FaultAction,
  ) -> Self {
    self.on_fault = on_fault;
    self
  }

  /// Parses a TOML document such as:
  ///
  /// ```toml
  /// fit = "best"
  /// on_fault = "panic"
  /// ```
  pub fn from_toml(document: &str) -> Result<Self, ConfigError> {
    Ok(toml::from_str(document)?)
  }

  /// Reads [`FIT_VAR`] and [`ON_FAULT_VAR`], keeping defaults for unset or
  /// unparsable values.
  ///
  /// Does not allocate, so it can run inside an exported `malloc`.
  pub fn from_env() -> Self {
    let mut config = Self::default();

    if let Some(value) = env_value(FIT_VAR) {
      match value.parse() {
        Ok(fit) => config.fit = fit,
        Err(err) => warn!("ignoring {FIT_VAR:?}={value:?}: {err}"),
      }
    }

    if let Some(value) = env_value(ON_FAULT_VAR) {
      match value.parse() {
        Ok(action) => config.on_fault = action,
        Err(err) => warn!("ignoring {ON_FAULT_VAR:?}={value:?}: {err}"),
      }
    }

    config
  }
}

fn env_value(name: &CStr) -> Option<&'static str> {
  // SAFETY: `name` is NUL-terminated. The returned string lives in the
  // environment block, which this crate never modifies.
  let value = unsafe { libc::getenv(name.as_ptr()) };

  if value.is_null() {
    return None;
  }

  unsafe { CStr::from_ptr(value) }.to_str().ok()
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn test_toml_selects_strategy_and_fault_action() {
    let config = HeapConfig::from_toml("fit = \"worst\"\non_fault = \"panic\"\n").unwrap();

    assert_eq!(config, HeapConfig::new(Fit::Worst).with_fault_action(FaultAction::Panic));
  }

  #[test]
  fn test_toml_fields_default() {
    let config = HeapConfig::from_toml("fit = \"next\"").unwrap();

    assert_eq!(config.fit, Fit::Next);
    assert_eq!(config.on_fault, FaultAction::Abort);
    assert_eq!(HeapConfig::from_toml("").unwrap(), HeapConfig::default());
  }

  #[test]
  fn test_toml_rejects_unknown_input() {
    assert!(matches!(HeapConfig::from_toml("fit = \"buddy\""), Err(ConfigError::Toml(_))));
    assert!(matches!(HeapConfig::from_toml("arenas = 4"), Err(ConfigError::Toml(_))));
  }

  #[test]
  fn test_fault_action_names_parse() {
    assert_eq!("abort".parse::<FaultAction>().unwrap(), FaultAction::Abort);
    assert_eq!("Panic".parse::<FaultAction>().unwrap(), FaultAction::Panic);
    assert!(matches!("ignore".parse::<FaultAction>(), Err(ConfigError::UnknownFaultAction)));
  }
}
