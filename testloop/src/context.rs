use crate::error::TestFault;
use crate::logger::Logger;
use crate::report::{Reporter, SummaryRecord};
use crate::status::{display_bug, Counters, Status, StatusScope};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

const FAIL_MARKER: &str = "******************** FAIL HERE ********************";
const SECTION_RULE: &str = "--------------------";

pub(crate) type Cleanup = Box<dyn FnOnce(&mut RunContext) -> anyhow::Result<()>>;

/// Mutable state shared by every hook and test body of one suite run.
///
/// Execution is sequential, so nothing here is synchronized. Counters are
/// only written when a test is finalized by the orchestrator.
pub struct RunContext {
  run_id: String,
  logger: Arc<dyn Logger>,
  scope: StatusScope,
  counters: Counters,
  globals: HashMap<String, Box<dyn Any>>,
  cleanups: Vec<Cleanup>,
  suite_start_time: SystemTime,
  suite_started: Instant,
  suite_finish_time: Option<SystemTime>,
  suite_elapsed: Option<Duration>,
}

impl RunContext {
  pub fn new(run_id: impl Into<String>, logger: Arc<dyn Logger>) -> Self {
    Self {
      run_id: run_id.into(),
      logger,
      scope: StatusScope::default(),
      counters: Counters::default(),
      globals: HashMap::new(),
      cleanups: Vec::new(),
      suite_start_time: SystemTime::now(),
      suite_started: Instant::now(),
      suite_finish_time: None,
      suite_elapsed: None,
    }
  }

  pub fn run_id(&self) -> &str {
    &self.run_id
  }

  pub fn logger(&self) -> &dyn Logger {
    self.logger.as_ref()
  }

  pub fn logger_handle(&self) -> Arc<dyn Logger> {
    Arc::clone(&self.logger)
  }

  // Global store.

  /// Stores `value` under `key`, replacing whatever was there.
  pub fn set_global<T: Any>(&mut self, key: impl Into<String>, value: T) {
    self.globals.insert(key.into(), Box::new(value));
  }

  /// Returns the value under `key` if present and of type `T`.
  pub fn global<T: Any>(&self, key: &str) -> Option<&T> {
    self.globals.get(key)?.downcast_ref::<T>()
  }

  pub fn global_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
    self.globals.get_mut(key)?.downcast_mut::<T>()
  }

  /// Removes and returns the value under `key`. A value of another type is
  /// left in place.
  pub fn take_global<T: Any>(&mut self, key: &str) -> Option<T> {
    let (key, value) = self.globals.remove_entry(key)?;
    match value.downcast::<T>() {
      Ok(value) => Some(*value),
      Err(value) => {
        self.globals.insert(key, value);
        None
      }
    }
  }

  pub fn contains_global(&self, key: &str) -> bool {
    self.globals.contains_key(key)
  }

  pub fn global_keys(&self) -> Vec<&str> {
    let mut keys: Vec<&str> = self.globals.keys().map(String::as_str).collect();
    keys.sort_unstable();
    keys
  }

  // Status scope.

  pub fn current_test(&self) -> Option<&str> {
    self.scope.test_name()
  }

  /// Zero-based loop cycle of the current test.
  pub fn cycle(&self) -> u32 {
    self.scope.cycle()
  }

  pub fn current_status(&self) -> Status {
    self.scope.status()
  }

  /// Escalates the current test's status. Lower-ranked statuses are ignored.
  #[track_caller]
  pub fn set_status(&mut self, status: Status) -> bool {
    let location = Location::caller();
    self.escalate(
      status,
      format!(
        "status set to FAIL at {}:{}",
        location.file(),
        location.line()
      ),
    )
  }

  pub fn set_known_to_fail(&mut self, known_to_fail: bool, bug_reference: impl Into<String>) {
    self.scope.set_known_to_fail(known_to_fail, bug_reference.into());
  }

  pub fn known_to_fail(&self) -> bool {
    self.scope.known_to_fail()
  }

  pub fn bug_reference(&self) -> &str {
    self.scope.bug_reference()
  }

  /// Registers work to run after the post-test hook, whatever the outcome.
  /// Cleanups run in reverse registration order.
  pub fn defer_cleanup<F>(&mut self, cleanup: F)
  where
    F: FnOnce(&mut RunContext) -> anyhow::Result<()> + 'static,
  {
    self.cleanups.push(Box::new(cleanup));
  }

  /// Logs a section banner naming the running test and the call site.
  #[track_caller]
  pub fn print_current_caller_name(&self) {
    let location = Location::caller();
    let name = self.current_test().unwrap_or("<suite>");
    self.logger.info(&format!(
      "{SECTION_RULE} {name} ({}:{}) {SECTION_RULE}",
      location.file(),
      location.line()
    ));
  }

  // Suite bookkeeping.

  pub fn counters(&self) -> Counters {
    self.counters
  }

  pub fn suite_start_time(&self) -> SystemTime {
    self.suite_start_time
  }

  pub fn suite_finish_time(&self) -> Option<SystemTime> {
    self.suite_finish_time
  }

  /// Wall clock since the suite started, frozen once it has finished.
  pub fn suite_elapsed(&self) -> Duration {
    self
      .suite_elapsed
      .unwrap_or_else(|| self.suite_started.elapsed())
  }

  pub(crate) fn mark_suite_start(&mut self) {
    self.suite_start_time = SystemTime::now();
    self.suite_started = Instant::now();
    self.suite_finish_time = None;
    self.suite_elapsed = None;
  }

  pub(crate) fn mark_suite_finish(&mut self) {
    self.suite_finish_time = Some(SystemTime::now());
    self.suite_elapsed = Some(self.suite_started.elapsed());
  }

  pub(crate) fn enter_test(&mut self, name: &str, cycle: u32) {
    self.cleanups.clear();
    self.scope.enter(name, cycle);
  }

  pub(crate) fn record_fault(&mut self, fault: &TestFault) {
    let name = self.current_test().unwrap_or("<suite>").to_string();
    self
      .logger
      .error(&format!("{} raised by {name}:\n{}", fault.origin, fault.detail));
    self.escalate(Status::Fail, fault.to_string());
  }

  pub(crate) fn take_cleanups(&mut self) -> Vec<Cleanup> {
    std::mem::take(&mut self.cleanups)
  }

  /// Concludes the current test: applies the known-to-fail override, updates
  /// the counters, hands the record to `reporter` and resets the scope.
  ///
  /// Must run exactly once per scheduled test.
  pub(crate) fn finalize(&mut self, reporter: &mut dyn Reporter) -> anyhow::Result<SummaryRecord> {
    let concluded = self.scope.conclude();
    if concluded.overridden_from_pass {
      self.logger.warn(&format!(
        "{} is known to fail ({}) but passed; marking it FAIL",
        concluded.name,
        display_bug(&concluded.bug_reference)
      ));
    }
    if concluded.status == Status::Fail {
      self.logger.error(&format!(
        "fault trace for {}:\n{}",
        concluded.name,
        concluded.fault.as_deref().unwrap_or("status set to FAIL")
      ));
    }

    self.counters.record(concluded.status);
    let record = SummaryRecord {
      name: concluded.name,
      status: concluded.status,
      cycle: concluded.cycle,
      bug_reference: concluded.bug_reference,
      counters: self.counters,
      elapsed_ms: duration_ms(concluded.elapsed),
      overridden_from_pass: concluded.overridden_from_pass,
      fault: concluded.fault,
    };
    self.logger.info(&format!(
      "{} = {} [{} ms] {}",
      record.status, record.name, record.elapsed_ms, record.counters
    ));

    reporter.append(&record)?;
    Ok(record)
  }

  fn escalate(&mut self, status: Status, fault: String) -> bool {
    let was_failed = self.scope.status() == Status::Fail;
    let changed = self.scope.escalate(status);
    if status == Status::Fail {
      if !was_failed {
        let name = self.current_test().unwrap_or("<suite>");
        self.logger.error(&format!("{FAIL_MARKER} {name}"));
      }
      self.scope.note_fault(fault);
    }
    changed
  }
}

impl fmt::Debug for RunContext {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RunContext")
      .field("run_id", &self.run_id)
      .field("scope", &self.scope)
      .field("counters", &self.counters)
      .field("globals", &self.global_keys())
      .field("cleanups", &self.cleanups.len())
      .finish_non_exhaustive()
  }
}

pub(crate) fn duration_ms(duration: Duration) -> u64 {
  u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
