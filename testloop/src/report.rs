use crate::context::{duration_ms, RunContext};
use crate::status::{Counters, Status};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// One finalized test.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SummaryRecord {
  pub name: String,
  pub status: Status,
  /// Zero-based loop cycle.
  pub cycle: u32,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub bug_reference: String,
  /// Running totals including this test.
  pub counters: Counters,
  pub elapsed_ms: u64,
  /// Set when a known-to-fail test passed and was forced to FAIL.
  #[serde(default, skip_serializing_if = "is_false")]
  pub overridden_from_pass: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub fault: Option<String>,
}

fn is_false(value: &bool) -> bool {
  !*value
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunSummary {
  pub run_id: String,
  pub counters: Counters,
  pub loop_count: u32,
  pub scheduled: usize,
  pub started_at_ms: u64,
  pub finished_at_ms: u64,
  pub elapsed_ms: u64,
}

impl RunSummary {
  pub(crate) fn from_context(ctx: &RunContext, loop_count: u32, scheduled: usize) -> Self {
    let started = ctx.suite_start_time();
    let finished = ctx.suite_finish_time().unwrap_or_else(SystemTime::now);
    Self {
      run_id: ctx.run_id().to_string(),
      counters: ctx.counters(),
      loop_count,
      scheduled,
      started_at_ms: unix_ms(started),
      finished_at_ms: unix_ms(finished),
      elapsed_ms: duration_ms(ctx.suite_elapsed()),
    }
  }

  pub fn succeeded(&self) -> bool {
    self.counters.fail == 0
  }

  /// Success when no test failed.
  pub fn exit_code(&self) -> ExitCode {
    if self.succeeded() {
      ExitCode::SUCCESS
    } else {
      ExitCode::FAILURE
    }
  }

  pub fn elapsed(&self) -> Duration {
    Duration::from_millis(self.elapsed_ms)
  }

  /// Elapsed wall clock as `N min M sec`.
  pub fn elapsed_display(&self) -> String {
    let secs = self.elapsed().as_secs();
    format!("{} min {} sec", secs / 60, secs % 60)
  }
}

fn unix_ms(time: SystemTime) -> u64 {
  time
    .duration_since(UNIX_EPOCH)
    .map(duration_ms)
    .unwrap_or_default()
}

/// Append-only sink for finalized test records.
pub trait Reporter {
  fn append(&mut self, record: &SummaryRecord) -> anyhow::Result<()>;

  fn finish(&mut self, _summary: &RunSummary) -> anyhow::Result<()> {
    Ok(())
  }
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemoryReporter {
  records: Vec<SummaryRecord>,
  summary: Option<RunSummary>,
}

impl MemoryReporter {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn records(&self) -> &[SummaryRecord] {
    &self.records
  }

  pub fn summary(&self) -> Option<&RunSummary> {
    self.summary.as_ref()
  }
}

impl Reporter for MemoryReporter {
  fn append(&mut self, record: &SummaryRecord) -> anyhow::Result<()> {
    self.records.push(record.clone());
    Ok(())
  }

  fn finish(&mut self, summary: &RunSummary) -> anyhow::Result<()> {
    self.summary = Some(summary.clone());
    Ok(())
  }
}

/// Human-readable summary lines.
pub struct TextReporter<W: Write> {
  writer: W,
}

impl<W: Write> TextReporter<W> {
  pub fn new(writer: W) -> Self {
    Self { writer }
  }

  pub fn into_inner(self) -> W {
    self.writer
  }
}

impl TextReporter<BufWriter<fs::File>> {
  /// Creates `path`, including missing parent directories.
  pub fn create(path: &Path) -> anyhow::Result<Self> {
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let file = fs::File::create(path).with_context(|| format!("create {}", path.display()))?;
    Ok(Self::new(BufWriter::new(file)))
  }
}

impl<W: Write> Reporter for TextReporter<W> {
  fn append(&mut self, record: &SummaryRecord) -> anyhow::Result<()> {
    let bug = if record.bug_reference.is_empty() {
      String::new()
    } else {
      format!(" ({})", record.bug_reference)
    };
    let overridden = if record.overridden_from_pass {
      " [known to fail, passed]"
    } else {
      ""
    };
    writeln!(
      self.writer,
      "{:<4} = #{} {}{bug}{overridden} P:{} F:{} S:{} K:{} [{} ms]",
      record.status.as_str(),
      record.cycle + 1,
      record.name,
      record.counters.pass,
      record.counters.fail,
      record.counters.skip,
      record.counters.ktf,
      record.elapsed_ms,
    )
    .context("write summary record")
  }

  fn finish(&mut self, summary: &RunSummary) -> anyhow::Result<()> {
    writeln!(
      self.writer,
      "{} in {} ({} loop cycle(s))",
      summary.counters,
      summary.elapsed_display(),
      summary.loop_count
    )
    .context("write summary totals")?;
    self.writer.flush().context("flush summary")
  }
}

#[derive(Debug, Serialize)]
struct ReportRef<'a> {
  schema_version: u32,
  summary: &'a RunSummary,
  results: &'a [SummaryRecord],
}

#[derive(Debug)]
enum JsonTarget {
  File(PathBuf),
  Stdout,
}

/// Collects records and writes a JSON report when the run finishes.
#[derive(Debug)]
pub struct JsonReporter {
  target: JsonTarget,
  records: Vec<SummaryRecord>,
}

impl JsonReporter {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      target: JsonTarget::File(path.into()),
      records: Vec::new(),
    }
  }

  /// Prints the report to stdout instead of a file.
  pub fn stdout() -> Self {
    Self {
      target: JsonTarget::Stdout,
      records: Vec::new(),
    }
  }

  /// Destination file; `None` for [`JsonReporter::stdout`].
  pub fn path(&self) -> Option<&Path> {
    match &self.target {
      JsonTarget::File(path) => Some(path),
      JsonTarget::Stdout => None,
    }
  }
}

impl Reporter for JsonReporter {
  fn append(&mut self, record: &SummaryRecord) -> anyhow::Result<()> {
    self.records.push(record.clone());
    Ok(())
  }

  fn finish(&mut self, summary: &RunSummary) -> anyhow::Result<()> {
    let report = ReportRef {
      schema_version: REPORT_SCHEMA_VERSION,
      summary,
      results: &self.records,
    };
    match &self.target {
      JsonTarget::File(path) => write_json_report(path, &report),
      JsonTarget::Stdout => {
        let mut out = io::stdout().lock();
        serde_json::to_writer_pretty(&mut out, &report).context("write report to stdout")?;
        writeln!(out).context("write report to stdout")
      }
    }
  }
}

/// Fans every record out to several reporters. Every sink is tried; the
/// first error is returned.
#[derive(Default)]
pub struct Reporters {
  reporters: Vec<Box<dyn Reporter>>,
}

impl Reporters {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, reporter: impl Reporter + 'static) {
    self.reporters.push(Box::new(reporter));
  }

  pub fn len(&self) -> usize {
    self.reporters.len()
  }

  pub fn is_empty(&self) -> bool {
    self.reporters.is_empty()
  }
}

impl Reporter for Reporters {
  fn append(&mut self, record: &SummaryRecord) -> anyhow::Result<()> {
    first_error(self.reporters.iter_mut().map(|r| r.append(record)))
  }

  fn finish(&mut self, summary: &RunSummary) -> anyhow::Result<()> {
    first_error(self.reporters.iter_mut().map(|r| r.finish(summary)))
  }
}

fn first_error(results: impl Iterator<Item = anyhow::Result<()>>) -> anyhow::Result<()> {
  let mut first = None;
  for result in results {
    if let Err(err) = result {
      first.get_or_insert(err);
    }
  }
  match first {
    Some(err) => Err(err),
    None => Ok(()),
  }
}

/// Write a pretty, deterministic JSON report to `path`, creating parent
/// directories as needed.
pub fn write_json_report<T: Serialize>(path: &Path, report: &T) -> anyhow::Result<()> {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
  }

  let file = fs::File::create(path).with_context(|| format!("create {}", path.display()))?;
  let mut writer = BufWriter::new(file);
  serde_json::to_writer_pretty(&mut writer, report)
    .with_context(|| format!("write report to {}", path.display()))?;
  writeln!(writer).ok();
  writer
    .flush()
    .with_context(|| format!("flush {}", path.display()))
}
