use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Outcome of a single test, ordered by severity.
///
/// Within one test the status only ever escalates: `Pass < Skip < Ktf < Fail`.
#[derive(
  Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
  #[default]
  Pass,
  Skip,
  Ktf,
  Fail,
}

impl Status {
  pub fn rank(self) -> u8 {
    match self {
      Status::Pass => 0,
      Status::Skip => 1,
      Status::Ktf => 2,
      Status::Fail => 3,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Status::Pass => "PASS",
      Status::Skip => "SKIP",
      Status::Ktf => "KTF",
      Status::Fail => "FAIL",
    }
  }
}

impl fmt::Display for Status {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Suite-wide outcome counters.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Counters {
  pub total: usize,
  pub pass: usize,
  pub fail: usize,
  pub skip: usize,
  pub ktf: usize,
}

impl Counters {
  pub(crate) fn record(&mut self, status: Status) {
    self.total += 1;
    match status {
      Status::Pass => self.pass += 1,
      Status::Skip => self.skip += 1,
      Status::Ktf => self.ktf += 1,
      Status::Fail => self.fail += 1,
    }
  }

  /// Whether `total == pass + fail + skip + ktf`.
  pub fn is_closed(&self) -> bool {
    self.total == self.pass + self.fail + self.skip + self.ktf
  }
}

impl fmt::Display for Counters {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "PASS:{} FAIL:{} SKIP:{} KTF:{} TOTAL:{}",
      self.pass, self.fail, self.skip, self.ktf, self.total
    )
  }
}

/// Per-test status state, re-entered for every scheduled test.
#[derive(Debug, Default)]
pub(crate) struct StatusScope {
  status: Status,
  known_to_fail: bool,
  bug_reference: String,
  test_name: Option<String>,
  cycle: u32,
  started: Option<Instant>,
  fault: Option<String>,
}

/// What remains of a scope once it has been concluded.
#[derive(Debug)]
pub(crate) struct Concluded {
  pub name: String,
  pub cycle: u32,
  pub status: Status,
  pub bug_reference: String,
  pub overridden_from_pass: bool,
  pub fault: Option<String>,
  pub elapsed: Duration,
}

impl StatusScope {
  pub fn enter(&mut self, name: &str, cycle: u32) {
    self.reset();
    self.test_name = Some(name.to_string());
    self.cycle = cycle;
    self.started = Some(Instant::now());
  }

  pub fn status(&self) -> Status {
    self.status
  }

  pub fn known_to_fail(&self) -> bool {
    self.known_to_fail
  }

  pub fn bug_reference(&self) -> &str {
    &self.bug_reference
  }

  pub fn test_name(&self) -> Option<&str> {
    self.test_name.as_deref()
  }

  pub fn cycle(&self) -> u32 {
    self.cycle
  }

  pub fn set_known_to_fail(&mut self, known_to_fail: bool, bug_reference: String) {
    self.known_to_fail = known_to_fail;
    self.bug_reference = bug_reference;
  }

  /// Applies `status` if it does not rank below the current one. Returns
  /// whether the status changed.
  pub fn escalate(&mut self, status: Status) -> bool {
    if status.rank() < self.status.rank() {
      return false;
    }
    let changed = status != self.status;
    self.status = status;
    changed
  }

  /// Keeps the first fault description of the test.
  pub fn note_fault(&mut self, fault: String) {
    if self.fault.is_none() {
      self.fault = Some(fault);
    }
  }

  /// Applies the known-to-fail override, then resets the scope.
  pub fn conclude(&mut self) -> Concluded {
    let overridden_from_pass = self.known_to_fail && self.status == Status::Pass;
    if overridden_from_pass {
      self.status = Status::Fail;
      self.note_fault(format!(
        "known to fail ({}) but passed",
        display_bug(&self.bug_reference)
      ));
    }

    let concluded = Concluded {
      name: self.test_name.take().unwrap_or_default(),
      cycle: self.cycle,
      status: self.status,
      bug_reference: std::mem::take(&mut self.bug_reference),
      overridden_from_pass,
      fault: self.fault.take(),
      elapsed: self.started.map(|s| s.elapsed()).unwrap_or_default(),
    };
    self.reset();
    concluded
  }

  fn reset(&mut self) {
    *self = StatusScope::default();
  }
}

pub(crate) fn display_bug(bug_reference: &str) -> &str {
  if bug_reference.is_empty() {
    "no bug reference"
  } else {
    bug_reference
  }
}
