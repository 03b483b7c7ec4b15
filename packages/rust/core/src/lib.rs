//! Build orchestration for Jackline.
//!
//! This crate ties the gateway and the syntax catalogs together into the
//! build flow: render the job definition, create or update the job, trigger
//! it, wait for it to appear and stream its console into an [`OutputSink`].

pub mod orchestrator;
pub mod sink;
pub mod stream;
pub mod template;

pub use orchestrator::{BuildOutcome, BuildPhase, ConsoleMode, Orchestrator, OrchestratorOptions};
pub use sink::{OutputSink, SilentSink};
pub use stream::{ConsoleStream, decode_chunk};
pub use template::render_job_config;
