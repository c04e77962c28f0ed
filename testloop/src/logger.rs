use std::sync::Mutex;
use tracing::Level;

/// Line-oriented logging sink used by the engine and by test bodies.
///
/// Implementors only provide [`Logger::log`]; the level helpers split
/// multi-line text so every line reaches the sink on its own.
pub trait Logger {
  fn log(&self, level: Level, line: &str);

  fn info(&self, text: &str) {
    emit_lines(self, Level::INFO, text);
  }

  fn warn(&self, text: &str) {
    emit_lines(self, Level::WARN, text);
  }

  fn error(&self, text: &str) {
    emit_lines(self, Level::ERROR, text);
  }
}

fn emit_lines<L: Logger + ?Sized>(logger: &L, level: Level, text: &str) {
  if text.is_empty() {
    logger.log(level, "");
    return;
  }
  for line in text.lines() {
    logger.log(level, line);
  }
}

/// Forwards to `tracing` events under the `testloop` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
  fn log(&self, level: Level, line: &str) {
    match level {
      Level::ERROR => tracing::error!(target: "testloop", "{line}"),
      Level::WARN => tracing::warn!(target: "testloop", "{line}"),
      Level::INFO => tracing::info!(target: "testloop", "{line}"),
      Level::DEBUG => tracing::debug!(target: "testloop", "{line}"),
      _ => tracing::trace!(target: "testloop", "{line}"),
    }
  }
}

/// Keeps every logged line in memory.
#[derive(Debug, Default)]
pub struct RecordingLogger {
  lines: Mutex<Vec<(Level, String)>>,
}

impl RecordingLogger {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn lines(&self) -> Vec<(Level, String)> {
    match self.lines.lock() {
      Ok(lines) => lines.clone(),
      Err(poisoned) => poisoned.into_inner().clone(),
    }
  }

  pub fn lines_at(&self, level: Level) -> Vec<String> {
    self
      .lines()
      .into_iter()
      .filter(|(l, _)| *l == level)
      .map(|(_, line)| line)
      .collect()
  }

  pub fn contains(&self, needle: &str) -> bool {
    self.lines().iter().any(|(_, line)| line.contains(needle))
  }
}

impl Logger for RecordingLogger {
  fn log(&self, level: Level, line: &str) {
    let mut lines = match self.lines.lock() {
      Ok(lines) => lines,
      Err(poisoned) => poisoned.into_inner(),
    };
    lines.push((level, line.to_string()));
  }
}
