//! Loop-cycle test orchestration.
//!
//! Test units are declared with [`test_unit!`] (or registered by hand on a
//! [`Registry`]), ordered by the [`sequence`] module and driven by the
//! [`Orchestrator`] through suite setup, `loop_count` cycles of
//! pre-test/body/post-test, and suite teardown. Each test's outcome follows
//! the [`Status`] precedence rule and is finalized into a [`SummaryRecord`]
//! for the configured [`Reporter`].

pub mod cli;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod expectations;
pub mod logger;
pub mod orchestrator;
pub mod plan;
pub mod registry;
pub mod report;
pub mod sequence;
pub mod status;

pub use config::RunConfig;
pub use context::RunContext;
pub use descriptor::{TestDescriptor, TestPlan, TestUnit};
pub use error::{DiscoveryError, EngineError, FaultOrigin, HookPhase, TestFault};
pub use expectations::KnownToFail;
pub use logger::{Logger, RecordingLogger, TracingLogger};
pub use orchestrator::{NoHooks, Orchestrator, SuiteHooks};
pub use registry::{Discovery, Registry, StaticPlan, TestRegistration};
pub use report::{
  JsonReporter, MemoryReporter, Reporter, Reporters, RunSummary, SummaryRecord, TextReporter,
  REPORT_SCHEMA_VERSION,
};
pub use sequence::{build_filter, order, Filter, Schedule, Selection};
pub use status::{Counters, Status};

#[doc(hidden)]
pub use inventory;
