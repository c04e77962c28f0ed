use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiscoveryError {
  #[error("malformed namespace `{0}`")]
  MalformedNamespace(String),
  #[error("test unit `{0}` is registered more than once")]
  DuplicateTest(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
  SuiteSetup,
  SuiteTeardown,
}

impl fmt::Display for HookPhase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let value = match self {
      HookPhase::SuiteSetup => "suite setup",
      HookPhase::SuiteTeardown => "suite teardown",
    };
    f.write_str(value)
  }
}

/// Errors that abort a run. Anything raised inside a single test's scope is
/// recovered as a [`TestFault`] instead.
#[derive(Debug, Error)]
pub enum EngineError {
  #[error(transparent)]
  Discovery(#[from] DiscoveryError),
  #[error("{phase} hook failed: {source:#}")]
  Hook {
    phase: HookPhase,
    #[source]
    source: anyhow::Error,
  },
  #[error("invalid sequence configuration: {0}")]
  InvalidSequenceConfig(String),
  #[error("report sink failed: {0:#}")]
  Report(#[source] anyhow::Error),
  #[error("invalid run configuration: {0:#}")]
  Config(#[source] anyhow::Error),
}

/// Where inside a test's scope a fault surfaced.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FaultOrigin {
  PreTest,
  Body,
  PostTest,
  Cleanup,
}

impl fmt::Display for FaultOrigin {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let value = match self {
      FaultOrigin::PreTest => "pre-test hook",
      FaultOrigin::Body => "test body",
      FaultOrigin::PostTest => "post-test hook",
      FaultOrigin::Cleanup => "cleanup",
    };
    f.write_str(value)
  }
}

/// An error or panic caught at the per-test boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{origin} fault: {detail}")]
pub struct TestFault {
  pub origin: FaultOrigin,
  pub detail: String,
}

impl TestFault {
  pub fn new(origin: FaultOrigin, detail: impl Into<String>) -> Self {
    Self {
      origin,
      detail: detail.into(),
    }
  }
}
