use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use testloop::cli::{labels_command, plan_command, run_command, PlanArgs, RunArgs, SelectArgs};
use testloop::{Registry, RunConfig};
use tracing_subscriber::{fmt, EnvFilter};

mod demo;

/// Namespace scanned when none is given on the command line.
const DEFAULT_NAMESPACE: &str = "testloop_cli::demo";

#[derive(Parser, Debug)]
#[command(version, about = "Run loop-cycle test suites")]
struct Cli {
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Run the scheduled tests for `--loop` cycles.
  Run(RunArgs),
  /// Print the test plan without running anything.
  Plan(PlanArgs),
  /// List every label used in a namespace.
  Labels(SelectArgs),
}

fn main() -> ExitCode {
  match try_main() {
    Ok(code) => code,
    Err(err) => {
      eprintln!("error: {err:#}");
      ExitCode::FAILURE
    }
  }
}

fn try_main() -> Result<ExitCode> {
  let cli = Cli::parse();
  init_tracing();

  let registry = Registry::from_inventory()?;
  let base = RunConfig::for_namespace(DEFAULT_NAMESPACE);
  match cli.command {
    Command::Run(args) => run_command(&args, base, &registry, &mut demo::DemoHooks::default()),
    Command::Plan(args) => plan_command(&args, base, &registry),
    Command::Labels(args) => labels_command(&args, base, &registry),
  }
}

fn init_tracing() {
  let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let builder = fmt()
    .with_env_filter(env_filter)
    .with_writer(std::io::stderr);
  if let Err(err) = builder.try_init() {
    eprintln!("failed to install tracing subscriber: {err}");
  }
}
