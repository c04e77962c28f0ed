use crate::context::RunContext;
use crate::descriptor::TestDescriptor;
use crate::error::{EngineError, FaultOrigin, HookPhase, TestFault};
use crate::expectations::KnownToFail;
use crate::logger::Logger;
use crate::report::{Reporter, RunSummary, SummaryRecord};
use anyhow::anyhow;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// User-supplied lifecycle callbacks. Every hook defaults to a no-op.
pub trait SuiteHooks {
  fn suite_setup(&mut self, _ctx: &mut RunContext) -> anyhow::Result<()> {
    Ok(())
  }

  fn suite_teardown(&mut self, _ctx: &mut RunContext) -> anyhow::Result<()> {
    Ok(())
  }

  fn pre_test(&mut self, _ctx: &mut RunContext) -> anyhow::Result<()> {
    Ok(())
  }

  fn post_test(&mut self, _ctx: &mut RunContext) -> anyhow::Result<()> {
    Ok(())
  }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl SuiteHooks for NoHooks {}

/// Drives a schedule through the suite lifecycle.
///
/// Faults inside a test's scope (pre-test hook, body, post-test hook,
/// cleanups) turn the test into a FAIL and the run moves on. Only suite
/// setup/teardown failures and invalid input abort the run.
pub struct Orchestrator {
  run_id: String,
  logger: Arc<dyn Logger>,
  known_to_fail: KnownToFail,
}

impl Orchestrator {
  pub fn new(run_id: impl Into<String>, logger: Arc<dyn Logger>) -> Self {
    Self {
      run_id: run_id.into(),
      logger,
      known_to_fail: KnownToFail::empty(),
    }
  }

  pub fn with_known_to_fail(mut self, known_to_fail: KnownToFail) -> Self {
    self.known_to_fail = known_to_fail;
    self
  }

  /// Creates a fresh context for this run.
  pub fn context(&self) -> RunContext {
    RunContext::new(self.run_id.clone(), Arc::clone(&self.logger))
  }

  pub fn run(
    &self,
    schedule: &[TestDescriptor],
    loop_count: u32,
    hooks: &mut dyn SuiteHooks,
    reporter: &mut dyn Reporter,
  ) -> Result<RunSummary, EngineError> {
    let mut ctx = self.context();
    self.run_with_context(&mut ctx, schedule, loop_count, hooks, reporter)
  }

  /// Like [`Orchestrator::run`], with a caller-prepared context (for example
  /// one whose global store was seeded with fixtures).
  pub fn run_with_context(
    &self,
    ctx: &mut RunContext,
    schedule: &[TestDescriptor],
    loop_count: u32,
    hooks: &mut dyn SuiteHooks,
    reporter: &mut dyn Reporter,
  ) -> Result<RunSummary, EngineError> {
    if loop_count == 0 {
      return Err(EngineError::InvalidSequenceConfig(
        "loop count must be a positive integer".to_string(),
      ));
    }

    ctx.mark_suite_start();
    ctx.logger().info(&format!(
      "run `{}`: {} test(s) scheduled, {loop_count} loop cycle(s)",
      ctx.run_id(),
      schedule.len()
    ));

    guard_hook(|| hooks.suite_setup(ctx)).map_err(|source| EngineError::Hook {
      phase: HookPhase::SuiteSetup,
      source,
    })?;

    let mut report_error: Option<anyhow::Error> = None;
    for cycle in 0..loop_count {
      ctx
        .logger()
        .info(&format!("loop cycle {}/{loop_count}", cycle + 1));
      for descriptor in schedule {
        if let Err(err) = self.run_test(ctx, descriptor, cycle, hooks, reporter) {
          ctx.logger().error(&format!(
            "failed to report {}: {err:#}",
            descriptor.name()
          ));
          report_error.get_or_insert(err);
        }
      }
    }

    let teardown = guard_hook(|| hooks.suite_teardown(ctx));
    ctx.mark_suite_finish();

    let summary = RunSummary::from_context(ctx, loop_count, schedule.len());
    ctx
      .logger()
      .info(&format!("test duration: {}", summary.elapsed_display()));
    ctx.logger().info(&summary.counters.to_string());

    // Reporters see the summary even when teardown failed; the teardown
    // error still wins.
    let finished = reporter.finish(&summary);
    teardown.map_err(|source| EngineError::Hook {
      phase: HookPhase::SuiteTeardown,
      source,
    })?;

    if let Err(err) = finished {
      report_error.get_or_insert(err);
    }
    match report_error {
      Some(err) => Err(EngineError::Report(err)),
      None => Ok(summary),
    }
  }

  fn run_test(
    &self,
    ctx: &mut RunContext,
    descriptor: &TestDescriptor,
    cycle: u32,
    hooks: &mut dyn SuiteHooks,
    reporter: &mut dyn Reporter,
  ) -> anyhow::Result<SummaryRecord> {
    ctx.enter_test(descriptor.name(), cycle);
    if let Some(bug) = self.known_to_fail.lookup(descriptor.name()) {
      ctx.set_known_to_fail(true, bug);
    }
    ctx.print_current_caller_name();

    match isolate(|| hooks.pre_test(ctx)) {
      Ok(()) => {
        if let Err(detail) = isolate(|| descriptor.execute(ctx)) {
          ctx.record_fault(&TestFault::new(FaultOrigin::Body, detail));
        }
      }
      Err(detail) => {
        ctx.logger().warn(&format!(
          "skipping body of {}: pre-test hook failed",
          descriptor.name()
        ));
        ctx.record_fault(&TestFault::new(FaultOrigin::PreTest, detail));
      }
    }

    if let Err(detail) = isolate(|| hooks.post_test(ctx)) {
      ctx.record_fault(&TestFault::new(FaultOrigin::PostTest, detail));
    }

    // Cleanups may defer further cleanups; those run after the current batch.
    loop {
      let cleanups = ctx.take_cleanups();
      if cleanups.is_empty() {
        break;
      }
      for cleanup in cleanups.into_iter().rev() {
        if let Err(detail) = isolate(|| cleanup(ctx)) {
          ctx.record_fault(&TestFault::new(FaultOrigin::Cleanup, detail));
        }
      }
    }

    ctx.finalize(reporter)
  }
}

/// Runs `f`, turning both returned errors and panics into a fault trace.
fn isolate<F>(f: F) -> Result<(), String>
where
  F: FnOnce() -> anyhow::Result<()>,
{
  match panic::catch_unwind(AssertUnwindSafe(f)) {
    Ok(Ok(())) => Ok(()),
    Ok(Err(err)) => Err(format!("{err:?}")),
    Err(payload) => Err(format!("panicked: {}", panic_message(payload.as_ref()))),
  }
}

/// Suite-level counterpart of [`isolate`]: a panicking hook becomes an error.
fn guard_hook<F>(f: F) -> anyhow::Result<()>
where
  F: FnOnce() -> anyhow::Result<()>,
{
  match panic::catch_unwind(AssertUnwindSafe(f)) {
    Ok(result) => result,
    Err(payload) => Err(anyhow!("panicked: {}", panic_message(payload.as_ref()))),
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
  if let Some(message) = payload.downcast_ref::<&'static str>() {
    message
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.as_str()
  } else {
    "<non-string panic payload>"
  }
}
