use crate::context::RunContext;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Placeholder for plan fields the author did not fill in.
pub const PLAN_PLACEHOLDER: &str = "???";
/// Description used when a test unit declares no plan at all.
pub const PLAN_NOT_SET: &str = "Warning: test plan not set";

/// An executable test body.
pub trait TestUnit {
  fn execute(&self, ctx: &mut RunContext) -> anyhow::Result<()>;
}

impl<F> TestUnit for F
where
  F: Fn(&mut RunContext) -> anyhow::Result<()>,
{
  fn execute(&self, ctx: &mut RunContext) -> anyhow::Result<()> {
    self(ctx)
  }
}

/// Free-form plan metadata attached to a test unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestPlan {
  pub description: String,
  pub prepared_by: String,
  pub prepared_date: String,
  pub reviewed_by: String,
  pub reviewed_date: String,
}

impl Default for TestPlan {
  fn default() -> Self {
    Self {
      description: PLAN_NOT_SET.to_string(),
      prepared_by: PLAN_PLACEHOLDER.to_string(),
      prepared_date: PLAN_PLACEHOLDER.to_string(),
      reviewed_by: PLAN_PLACEHOLDER.to_string(),
      reviewed_date: PLAN_PLACEHOLDER.to_string(),
    }
  }
}

impl TestPlan {
  pub fn new(description: impl Into<String>) -> Self {
    Self {
      description: or_placeholder(description.into()),
      ..Self::default()
    }
  }

  pub fn prepared(mut self, by: impl Into<String>, date: impl Into<String>) -> Self {
    self.prepared_by = or_placeholder(by.into());
    self.prepared_date = or_placeholder(date.into());
    self
  }

  pub fn reviewed(mut self, by: impl Into<String>, date: impl Into<String>) -> Self {
    self.reviewed_by = or_placeholder(by.into());
    self.reviewed_date = or_placeholder(date.into());
    self
  }
}

fn or_placeholder(value: String) -> String {
  if value.trim().is_empty() {
    PLAN_PLACEHOLDER.to_string()
  } else {
    value
  }
}

/// Immutable description of one discoverable test unit.
///
/// Descriptors are identified by their fully-qualified `name`; cloning only
/// shares the underlying body.
#[derive(Clone)]
pub struct TestDescriptor {
  name: String,
  unit: Arc<dyn TestUnit>,
  skip: bool,
  sequence: i64,
  label: String,
  plan: TestPlan,
}

impl TestDescriptor {
  pub fn new(name: impl Into<String>, unit: impl TestUnit + 'static) -> Self {
    Self {
      name: name.into(),
      unit: Arc::new(unit),
      skip: false,
      sequence: 0,
      label: String::new(),
      plan: TestPlan::default(),
    }
  }

  pub fn with_skip(mut self, skip: bool) -> Self {
    self.skip = skip;
    self
  }

  pub fn with_sequence(mut self, sequence: i64) -> Self {
    self.sequence = sequence;
    self
  }

  pub fn with_label(mut self, label: impl Into<String>) -> Self {
    self.label = label.into();
    self
  }

  pub fn with_plan(mut self, plan: TestPlan) -> Self {
    self.plan = plan;
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn is_skipped(&self) -> bool {
    self.skip
  }

  pub fn sequence(&self) -> i64 {
    self.sequence
  }

  /// The raw label string as declared.
  pub fn label(&self) -> &str {
    &self.label
  }

  /// Normalized labels: lower-cased, trimmed, de-duplicated.
  pub fn labels(&self) -> Vec<String> {
    split_labels(&self.label)
  }

  pub fn plan(&self) -> &TestPlan {
    &self.plan
  }

  pub fn execute(&self, ctx: &mut RunContext) -> anyhow::Result<()> {
    self.unit.execute(ctx)
  }
}

impl fmt::Debug for TestDescriptor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TestDescriptor")
      .field("name", &self.name)
      .field("skip", &self.skip)
      .field("sequence", &self.sequence)
      .field("label", &self.label)
      .finish_non_exhaustive()
  }
}

/// Splits a label string on `:` and whitespace, keeping the first occurrence
/// of each lower-cased tag.
pub fn split_labels(raw: &str) -> Vec<String> {
  let mut out: Vec<String> = Vec::new();
  for part in raw.split(|c: char| c == ':' || c.is_whitespace()) {
    let tag = part.trim().to_lowercase();
    if tag.is_empty() || out.contains(&tag) {
      continue;
    }
    out.push(tag);
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  fn noop(_ctx: &mut RunContext) -> anyhow::Result<()> {
    Ok(())
  }

  #[test]
  fn labels_split_on_colon_and_space() {
    assert_eq!(
      split_labels("Smoke: regression  SMOKE:nightly"),
      vec!["smoke", "regression", "nightly"]
    );
    assert!(split_labels("  : ").is_empty());
  }

  #[test]
  fn missing_plan_uses_placeholders() {
    let descriptor = TestDescriptor::new("a::b", noop);
    let plan = descriptor.plan();
    assert_eq!(plan.description, PLAN_NOT_SET);
    assert_eq!(plan.prepared_by, PLAN_PLACEHOLDER);
    assert_eq!(plan.reviewed_date, PLAN_PLACEHOLDER);
  }

  #[test]
  fn partial_plan_fills_blanks() {
    let plan = TestPlan::new("checks login").prepared("ana", "");
    assert_eq!(plan.description, "checks login");
    assert_eq!(plan.prepared_by, "ana");
    assert_eq!(plan.prepared_date, PLAN_PLACEHOLDER);
    assert_eq!(plan.reviewed_by, PLAN_PLACEHOLDER);
  }

  #[test]
  fn builder_sets_fields() {
    let descriptor = TestDescriptor::new("a::b", noop)
      .with_skip(true)
      .with_sequence(-4)
      .with_label("Slow");
    assert!(descriptor.is_skipped());
    assert_eq!(descriptor.sequence(), -4);
    assert_eq!(descriptor.label(), "Slow");
    assert_eq!(descriptor.labels(), vec!["slow"]);
  }
}
