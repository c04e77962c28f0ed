//! Command line surface shared by host binaries.
//!
//! A host links its test units, builds a [`Registry`] and a base
//! [`RunConfig`] naming its default namespace, then hands the parsed
//! arguments to [`run_command`], [`plan_command`] or [`labels_command`].

use crate::config::RunConfig;
use crate::expectations::KnownToFail;
use crate::logger::{Logger, TracingLogger};
use crate::orchestrator::{Orchestrator, SuiteHooks};
use crate::plan::{plan_entries, render_text};
use crate::registry::Registry;
use crate::report::{JsonReporter, Reporters, TextReporter};
use crate::sequence::Schedule;
use anyhow::Result;
use clap::Args;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Args, Debug, Clone, Default)]
pub struct SelectArgs {
  /// Namespace to scan for test units.
  #[arg(value_name = "NAMESPACE")]
  pub namespace: Option<String>,

  /// Read defaults from a TOML or JSON run configuration.
  #[arg(long, value_name = "PATH")]
  pub config: Option<PathBuf>,

  /// Keep discovery order instead of sorting by sequence number.
  #[arg(long)]
  pub unordered: bool,

  /// Glob or regex over fully-qualified test names.
  #[arg(long)]
  pub filter: Option<String>,

  /// Only keep tests carrying this label (repeatable).
  #[arg(long = "label", value_name = "LABEL")]
  pub labels: Vec<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
  #[command(flatten)]
  pub select: SelectArgs,

  /// Also run tests declared with `skip`.
  #[arg(long)]
  pub include_skipped: bool,

  /// Number of loop cycles over the schedule.
  #[arg(long = "loop", value_name = "COUNT")]
  pub loop_count: Option<u32>,

  /// Identifier scoping this run's report directory.
  #[arg(long)]
  pub run_id: Option<String>,

  /// Known-to-fail manifest (TOML or JSON).
  #[arg(long, value_name = "PATH")]
  pub known_to_fail: Option<PathBuf>,

  /// Write `summary.txt` and `report.json` under `<DIR>/<run-id>/`.
  #[arg(long, value_name = "DIR")]
  pub report_dir: Option<PathBuf>,

  /// Print the JSON report to stdout instead of summary lines.
  #[arg(long)]
  pub json: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct PlanArgs {
  #[command(flatten)]
  pub select: SelectArgs,

  /// Print the plan as JSON.
  #[arg(long)]
  pub json: bool,
}

impl SelectArgs {
  fn resolve(&self, base: RunConfig) -> Result<RunConfig> {
    let mut config = match &self.config {
      Some(path) => {
        let mut loaded = RunConfig::from_path(path)?;
        if loaded.namespace.is_empty() {
          loaded.namespace = base.namespace;
        }
        loaded
      }
      None => base,
    };
    if let Some(namespace) = &self.namespace {
      config.namespace = namespace.clone();
    }
    if self.unordered {
      config.ordered = false;
    }
    if let Some(filter) = &self.filter {
      config.filter = Some(filter.clone());
    }
    if !self.labels.is_empty() {
      config.labels = self.labels.clone();
    }
    Ok(config)
  }
}

impl RunArgs {
  /// Layers file configuration over `base`, then command line flags.
  pub fn resolve(&self, base: RunConfig) -> Result<RunConfig> {
    let mut config = self.select.resolve(base)?;
    if self.include_skipped {
      config.drop_skipped = false;
    }
    if let Some(loop_count) = self.loop_count {
      config.loop_count = loop_count;
    }
    if let Some(run_id) = &self.run_id {
      config.run_id = run_id.clone();
    }
    if let Some(path) = &self.known_to_fail {
      config.known_to_fail = Some(path.clone());
    }
    if let Some(dir) = &self.report_dir {
      config.report_dir = Some(dir.clone());
    }
    config.validate()?;
    Ok(config)
  }
}

fn schedule_for(config: &RunConfig, registry: &Registry) -> Result<Schedule> {
  let discovery = registry.scan(&config.namespace)?;
  let schedule = Schedule::build(&discovery.descriptors, config.ordered, config.drop_skipped)
    .select(&config.selection()?);
  Ok(schedule)
}

/// Runs the selected suite. The exit code reflects the final `fail` counter.
pub fn run_command(
  args: &RunArgs,
  base: RunConfig,
  registry: &Registry,
  hooks: &mut dyn SuiteHooks,
) -> Result<ExitCode> {
  let config = args.resolve(base)?;
  let schedule = schedule_for(&config, registry)?;

  let known_to_fail = match &config.known_to_fail {
    Some(path) => KnownToFail::from_path(path)?,
    None => KnownToFail::empty(),
  };

  let mut reporters = Reporters::new();
  if let Some(dir) = config.run_dir() {
    reporters.push(TextReporter::create(&dir.join("summary.txt"))?);
    reporters.push(JsonReporter::new(dir.join("report.json")));
  }
  if args.json {
    reporters.push(JsonReporter::stdout());
  } else {
    reporters.push(TextReporter::new(io::stdout()));
  }

  let logger: Arc<dyn Logger> = Arc::new(TracingLogger);
  let orchestrator =
    Orchestrator::new(config.run_id.clone(), logger).with_known_to_fail(known_to_fail);
  let summary = orchestrator.run(
    &schedule.scheduled,
    config.loop_count,
    hooks,
    &mut reporters,
  )?;
  Ok(summary.exit_code())
}

/// Prints the full (unfiltered by skip) test plan.
pub fn plan_command(args: &PlanArgs, base: RunConfig, registry: &Registry) -> Result<ExitCode> {
  let mut config = args.select.resolve(base)?;
  config.drop_skipped = false;
  config.validate()?;
  let schedule = schedule_for(&config, registry)?;
  let entries = plan_entries(&schedule.scheduled);
  if args.json {
    println!("{}", serde_json::to_string_pretty(&entries)?);
  } else {
    print!("{}", render_text(&entries));
  }
  Ok(ExitCode::SUCCESS)
}

/// Prints the corpus-wide label set of a namespace, one per line.
pub fn labels_command(args: &SelectArgs, base: RunConfig, registry: &Registry) -> Result<ExitCode> {
  let config = args.resolve(base)?;
  let discovery = registry.scan(&config.namespace)?;
  for label in discovery.labels {
    println!("{label}");
  }
  Ok(ExitCode::SUCCESS)
}
