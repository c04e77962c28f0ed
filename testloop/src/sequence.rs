use crate::descriptor::TestDescriptor;
use anyhow::{anyhow, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;

/// Orders `descriptors` and optionally drops skipped ones.
///
/// Without `sort_by_sequence` discovery order is kept. Sorting is stable, so
/// equal sequence numbers keep their discovery order.
pub fn order(
  descriptors: &[TestDescriptor],
  sort_by_sequence: bool,
  drop_skipped: bool,
) -> Vec<TestDescriptor> {
  let mut out = descriptors.to_vec();
  if sort_by_sequence {
    out.sort_by_key(TestDescriptor::sequence);
  }
  if drop_skipped {
    out.retain(|d| !d.is_skipped());
  }
  out
}

/// The two views derived from one discovery.
#[derive(Debug, Clone, Default)]
pub struct Schedule {
  /// Every descriptor, used for plan printing.
  pub full: Vec<TestDescriptor>,
  /// What actually runs.
  pub scheduled: Vec<TestDescriptor>,
}

impl Schedule {
  pub fn build(descriptors: &[TestDescriptor], sort_by_sequence: bool, drop_skipped: bool) -> Self {
    Self {
      full: order(descriptors, sort_by_sequence, false),
      scheduled: order(descriptors, sort_by_sequence, drop_skipped),
    }
  }

  /// Narrows the scheduled view; the full view is untouched.
  pub fn select(mut self, selection: &Selection) -> Self {
    self.scheduled.retain(|d| selection.matches(d));
    self
  }
}

#[derive(Debug, Clone)]
pub enum Filter {
  All,
  Glob(GlobSet),
  Regex(Regex),
}

pub fn build_filter(pattern: Option<&str>) -> Result<Filter> {
  match pattern {
    None => Ok(Filter::All),
    Some(raw) => {
      if let Ok(glob) = Glob::new(raw) {
        let mut builder = GlobSetBuilder::new();
        builder.add(glob);
        let set = builder
          .build()
          .map_err(|err| anyhow!("invalid glob: {err}"))?;
        return Ok(Filter::Glob(set));
      }

      let regex = Regex::new(raw).map_err(|err| anyhow!("invalid regex: {err}"))?;
      Ok(Filter::Regex(regex))
    }
  }
}

impl Filter {
  pub fn matches(&self, name: &str) -> bool {
    match self {
      Filter::All => true,
      Filter::Glob(set) => set.is_match(name),
      Filter::Regex(re) => re.is_match(name),
    }
  }
}

/// Name and label based narrowing of a schedule.
#[derive(Debug, Clone)]
pub struct Selection {
  pub filter: Filter,
  /// A descriptor is kept when it carries any of these labels. Empty keeps
  /// everything.
  pub labels: Vec<String>,
}

impl Default for Selection {
  fn default() -> Self {
    Self {
      filter: Filter::All,
      labels: Vec::new(),
    }
  }
}

impl Selection {
  pub fn new(filter: Filter, labels: &[String]) -> Self {
    let labels = labels
      .iter()
      .map(|label| label.trim().to_lowercase())
      .filter(|label| !label.is_empty())
      .collect();
    Self { filter, labels }
  }

  pub fn matches(&self, descriptor: &TestDescriptor) -> bool {
    if !self.filter.matches(descriptor.name()) {
      return false;
    }
    if self.labels.is_empty() {
      return true;
    }
    descriptor
      .labels()
      .iter()
      .any(|label| self.labels.contains(label))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::RunContext;

  fn noop(_ctx: &mut RunContext) -> anyhow::Result<()> {
    Ok(())
  }

  fn descriptor(name: &str, sequence: i64, skip: bool, label: &str) -> TestDescriptor {
    TestDescriptor::new(name, noop)
      .with_sequence(sequence)
      .with_skip(skip)
      .with_label(label)
  }

  fn names(descriptors: &[TestDescriptor]) -> Vec<&str> {
    descriptors.iter().map(|d| d.name()).collect()
  }

  #[test]
  fn sort_is_stable_for_equal_sequences() {
    let discovered = vec![
      descriptor("A", 3, false, ""),
      descriptor("B", 1, false, ""),
      descriptor("C", 1, false, ""),
      descriptor("D", 2, false, ""),
    ];
    assert_eq!(names(&order(&discovered, true, false)), vec!["B", "C", "D", "A"]);
    assert_eq!(names(&order(&discovered, false, false)), vec!["A", "B", "C", "D"]);
  }

  #[test]
  fn skipped_descriptors_only_leave_the_scheduled_view() {
    let discovered = vec![
      descriptor("smoke", 2, false, "smoke"),
      descriptor("slow", 1, true, "slow"),
    ];
    assert_eq!(names(&order(&discovered, true, true)), vec!["smoke"]);
    assert_eq!(names(&order(&discovered, false, false)), vec!["smoke", "slow"]);

    let schedule = Schedule::build(&discovered, true, true);
    assert_eq!(names(&schedule.full), vec!["slow", "smoke"]);
    assert_eq!(names(&schedule.scheduled), vec!["smoke"]);
  }

  #[test]
  fn filter_prefers_glob_then_regex() {
    let glob = build_filter(Some("lab::power::*")).unwrap();
    assert!(matches!(glob, Filter::Glob(_)));
    assert!(glob.matches("lab::power::reboot"));
    assert!(!glob.matches("lab::net::ping"));

    let err = build_filter(Some("lab::[power")).unwrap_err();
    assert!(err.to_string().contains("invalid regex"));

    assert!(build_filter(None).unwrap().matches("anything"));
  }

  #[test]
  fn selection_matches_any_label() {
    let discovered = vec![
      descriptor("a", 0, false, "Smoke:power"),
      descriptor("b", 0, false, "nightly"),
      descriptor("c", 0, false, ""),
    ];
    let selection = Selection::new(Filter::All, &["POWER".to_string(), "nightly".to_string()]);
    let schedule = Schedule::build(&discovered, false, true).select(&selection);
    assert_eq!(names(&schedule.scheduled), vec!["a", "b"]);
    assert_eq!(schedule.full.len(), 3);
  }
}
