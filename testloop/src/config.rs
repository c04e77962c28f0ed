use crate::error::EngineError;
use crate::sequence::{build_filter, Selection};
use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_RUN_ID: &str = "run";

/// Everything a host needs to schedule one suite run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
  /// Namespace scanned for test units.
  pub namespace: String,
  /// Sort by sequence number instead of keeping discovery order.
  pub ordered: bool,
  pub drop_skipped: bool,
  pub loop_count: u32,
  /// Scopes report output locations.
  pub run_id: String,
  /// Glob or regex over fully-qualified test names.
  pub filter: Option<String>,
  pub labels: Vec<String>,
  /// Known-to-fail manifest.
  pub known_to_fail: Option<PathBuf>,
  pub report_dir: Option<PathBuf>,
}

impl Default for RunConfig {
  fn default() -> Self {
    Self {
      namespace: String::new(),
      ordered: true,
      drop_skipped: true,
      loop_count: 1,
      run_id: DEFAULT_RUN_ID.to_string(),
      filter: None,
      labels: Vec::new(),
      known_to_fail: None,
      report_dir: None,
    }
  }
}

impl RunConfig {
  pub fn for_namespace(namespace: impl Into<String>) -> Self {
    Self {
      namespace: namespace.into(),
      ..Self::default()
    }
  }

  pub fn from_path(path: &Path) -> Result<Self, EngineError> {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("read {}", path.display()))
      .map_err(EngineError::Config)?;
    Self::parse(&raw).map_err(|err| match err {
      EngineError::Config(source) => {
        EngineError::Config(source.context(path.display().to_string()))
      }
      other => other,
    })
  }

  /// Parses TOML, falling back to JSON.
  pub fn parse(raw: &str) -> Result<Self, EngineError> {
    match toml::from_str::<RunConfig>(raw) {
      Ok(config) => Ok(config),
      Err(toml_err) => serde_json::from_str::<RunConfig>(raw).map_err(|json_err| {
        EngineError::Config(anyhow!(
          "failed to parse config as TOML ({toml_err}) or JSON ({json_err})"
        ))
      }),
    }
  }

  pub fn validate(&self) -> Result<(), EngineError> {
    if self.loop_count == 0 {
      return Err(EngineError::InvalidSequenceConfig(
        "loop count must be a positive integer".to_string(),
      ));
    }
    if self.run_id.trim().is_empty() {
      return Err(EngineError::InvalidSequenceConfig(
        "run id must not be empty".to_string(),
      ));
    }
    if self
      .run_id
      .chars()
      .any(|c| matches!(c, '/' | '\\') || c.is_control())
      || self.run_id == "."
      || self.run_id == ".."
    {
      return Err(EngineError::InvalidSequenceConfig(format!(
        "run id `{}` cannot be used as a directory name",
        self.run_id
      )));
    }
    self.selection()?;
    Ok(())
  }

  pub fn selection(&self) -> Result<Selection, EngineError> {
    let filter = build_filter(self.filter.as_deref())
      .map_err(|err| EngineError::InvalidSequenceConfig(format!("filter: {err}")))?;
    Ok(Selection::new(filter, &self.labels))
  }

  /// `<report_dir>/<run_id>`, when a report directory is configured.
  pub fn run_dir(&self) -> Option<PathBuf> {
    self
      .report_dir
      .as_ref()
      .map(|dir| dir.join(&self.run_id))
  }
}
