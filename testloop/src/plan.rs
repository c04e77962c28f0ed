use crate::descriptor::{TestDescriptor, TestPlan};
use serde::Serialize;
use std::fmt::Write;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PlanEntry {
  pub name: String,
  pub sequence: i64,
  pub skip: bool,
  pub labels: Vec<String>,
  #[serde(flatten)]
  pub plan: TestPlan,
}

impl PlanEntry {
  pub fn from_descriptor(descriptor: &TestDescriptor) -> Self {
    Self {
      name: descriptor.name().to_string(),
      sequence: descriptor.sequence(),
      skip: descriptor.is_skipped(),
      labels: descriptor.labels(),
      plan: descriptor.plan().clone(),
    }
  }
}

pub fn plan_entries(descriptors: &[TestDescriptor]) -> Vec<PlanEntry> {
  descriptors.iter().map(PlanEntry::from_descriptor).collect()
}

/// Renders the plan as an aligned table followed by each test's plan fields.
pub fn render_text(entries: &[PlanEntry]) -> String {
  let name_width = entries
    .iter()
    .map(|e| e.name.len())
    .max()
    .unwrap_or(0)
    .max("TEST".len());

  let mut out = String::new();
  let _ = writeln!(out, "{:>5}  {:<4}  {:<name_width$}  LABELS", "SEQ", "SKIP", "TEST");
  for entry in entries {
    let skip = if entry.skip { "yes" } else { "no" };
    let _ = writeln!(
      out,
      "{:>5}  {:<4}  {:<name_width$}  {}",
      entry.sequence,
      skip,
      entry.name,
      entry.labels.join(":")
    );
  }

  for entry in entries {
    let plan = &entry.plan;
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", entry.name);
    let _ = writeln!(out, "  description: {}", plan.description);
    let _ = writeln!(out, "  prepared:    {} ({})", plan.prepared_by, plan.prepared_date);
    let _ = writeln!(out, "  reviewed:    {} ({})", plan.reviewed_by, plan.reviewed_date);
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::RunContext;

  fn noop(_ctx: &mut RunContext) -> anyhow::Result<()> {
    Ok(())
  }

  #[test]
  fn text_plan_lists_skipped_tests_too() {
    let descriptors = vec![
      TestDescriptor::new("lab::boot", noop)
        .with_sequence(1)
        .with_label("smoke")
        .with_plan(TestPlan::new("boots the device").prepared("ops", "2024-01-02")),
      TestDescriptor::new("lab::soak", noop)
        .with_sequence(2)
        .with_skip(true),
    ];
    let text = render_text(&plan_entries(&descriptors));
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines[0], "  SEQ  SKIP  TEST       LABELS");
    assert_eq!(lines[1], "    1  no    lab::boot  smoke");
    assert_eq!(lines[2], "    2  yes   lab::soak  ");
    assert!(text.contains("  prepared:    ops (2024-01-02)"));
    assert!(text.contains("  description: Warning: test plan not set"));
  }

  #[test]
  fn json_plan_flattens_plan_fields() {
    let descriptors = vec![TestDescriptor::new("lab::boot", noop).with_label("a:b")];
    let json = serde_json::to_value(plan_entries(&descriptors)).unwrap();
    assert_eq!(json[0]["name"], "lab::boot");
    assert_eq!(json[0]["labels"][1], "b");
    assert_eq!(json[0]["reviewed_by"], "???");
  }
}
