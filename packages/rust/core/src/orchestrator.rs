//! Build orchestration: create or update the job, trigger it, wait for it, stream it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use jackline_gateway::JenkinsClient;
use jackline_shared::{
    AppConfig, BuildHandle, BuildState, BuildStatus, JacklineError, JobTarget, Result,
};
use jackline_syntax::{GlobalVar, StepCatalog, parse_gdsl, parse_globals_html};

use crate::sink::OutputSink;
use crate::stream::{ConsoleStream, DEFAULT_POLL_INTERVAL};
use crate::template::render_job_config;

/// Lower bound on a single readiness probe's timeout.
const MIN_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Options and outcomes
// ---------------------------------------------------------------------------

/// How console output of a started build is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsoleMode {
    /// Poll the log and write it to the sink.
    #[default]
    Stream,
    /// Hand the console page URL to the sink's browser launcher.
    Browser,
}

/// Tunables for an [`Orchestrator`].
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Namespace prepended to job names.
    pub job_prefix: String,
    /// How long a triggered build may take to become reachable.
    pub ready_timeout: Duration,
    /// Pause between readiness probes.
    pub ready_poll_interval: Duration,
    /// Pause between progressive-text polls.
    pub stream_poll_interval: Duration,
    pub console_mode: ConsoleMode,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            job_prefix: String::new(),
            ready_timeout: Duration::from_secs(10),
            ready_poll_interval: Duration::from_secs(1),
            stream_poll_interval: DEFAULT_POLL_INTERVAL,
            console_mode: ConsoleMode::Stream,
        }
    }
}

impl From<&AppConfig> for OrchestratorOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            job_prefix: config.pipeline.job_prefix.clone(),
            ready_timeout: Duration::from_secs(config.pipeline.ready_timeout_secs),
            console_mode: if config.pipeline.browser_build_output {
                ConsoleMode::Browser
            } else {
                ConsoleMode::Stream
            },
            ..Self::default()
        }
    }
}

/// Where the build flow currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    Idle,
    Resolving,
    CreatingOrUpdating,
    Triggered,
    AwaitingReady,
    Streaming,
    Done,
    Aborted,
    Failed,
}

impl std::fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Resolving => "resolving job",
            Self::CreatingOrUpdating => "creating or updating job",
            Self::Triggered => "build triggered",
            Self::AwaitingReady => "waiting for build to start",
            Self::Streaming => "streaming console",
            Self::Done => "done",
            Self::Aborted => "aborted",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Result of [`Orchestrator::start_build`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Another build is live; nothing was sent to Jenkins.
    Rejected { active_url: String },
    /// The flow ran to the end.
    Finished(BuildHandle),
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// The flow that currently owns the orchestrator.
#[derive(Debug)]
struct LiveFlow {
    id: u64,
    /// Reported to rejected starts until the build itself exists.
    job_url: String,
    /// Set once the build is triggered.
    build: Option<BuildHandle>,
}

impl LiveFlow {
    fn active_url(&self) -> &str {
        self.build.as_ref().map_or(&self.job_url, |b| &b.build_url)
    }
}

/// Runs one build flow at a time against a Jenkins controller.
///
/// Every method takes `&self`; wrap it in an `Arc` to call [`Orchestrator::abort`]
/// from another task while a build streams.
pub struct Orchestrator {
    client: JenkinsClient,
    options: OrchestratorOptions,
    // Lock order: `live` before `phase`.
    live: Mutex<Option<LiveFlow>>,
    next_flow: AtomicU64,
    phase: Mutex<BuildPhase>,
    last_job: Mutex<Option<String>>,
    steps: Mutex<Option<StepCatalog>>,
    globals: Mutex<Option<Vec<GlobalVar>>>,
}

impl Orchestrator {
    pub fn new(client: JenkinsClient, options: OrchestratorOptions) -> Self {
        Self {
            client,
            options,
            live: Mutex::new(None),
            next_flow: AtomicU64::new(1),
            phase: Mutex::new(BuildPhase::Idle),
            last_job: Mutex::new(None),
            steps: Mutex::new(None),
            globals: Mutex::new(None),
        }
    }

    /// The underlying gateway, for one-off queries.
    pub fn client(&self) -> &JenkinsClient {
        &self.client
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    pub async fn phase(&self) -> BuildPhase {
        *self.phase.lock().await
    }

    /// The build currently in flight, if any.
    pub async fn active_build(&self) -> Option<BuildHandle> {
        self.live.lock().await.as_ref().and_then(|flow| flow.build.clone())
    }

    /// Job name used by the most recent build or update.
    pub async fn last_job(&self) -> Option<String> {
        self.last_job.lock().await.clone()
    }

    // -- build flow ----------------------------------------------------------

    /// Create or update the job for `path`, build it and deliver its console.
    ///
    /// The orchestrator is claimed before anything is sent, so a start that
    /// overlaps another flow gets [`BuildOutcome::Rejected`] without any network
    /// traffic, even before the other flow has triggered its build. Any error
    /// releases the claim so a new flow can start.
    #[instrument(skip_all, fields(path = %path))]
    pub async fn start_build(
        &self,
        path: &str,
        source: &str,
        sink: &dyn OutputSink,
    ) -> Result<BuildOutcome> {
        let (id, target) = {
            let mut live = self.live.lock().await;
            if let Some(active) = live.as_ref() {
                let active_url = active.active_url().to_string();
                warn!(%active_url, "pipeline already building, request rejected");
                return Ok(BuildOutcome::Rejected { active_url });
            }

            // Resolution failures surface before anything is sent.
            let target = match JobTarget::from_source_path(path, &self.options.job_prefix) {
                Ok(target) => target,
                Err(e) => {
                    *self.phase.lock().await = BuildPhase::Failed;
                    drop(live);
                    report_failure(&e, sink);
                    return Err(e);
                }
            };

            let id = self.next_flow.fetch_add(1, Ordering::Relaxed);
            *live = Some(LiveFlow {
                id,
                job_url: format!(
                    "{}/job/{}",
                    self.client.base_uri().trim_end_matches('/'),
                    target.name()
                ),
                build: None,
            });
            *self.phase.lock().await = BuildPhase::Resolving;
            (id, target)
        };
        debug!(flow = id, job = target.name(), "flow claimed");
        sink.phase(BuildPhase::Resolving);

        match self.run_build(id, &target, source, sink).await {
            Ok(handle) => Ok(BuildOutcome::Finished(handle)),
            Err(e) => {
                // An aborted flow no longer owns the phase.
                if self.release(id, BuildPhase::Failed).await {
                    report_failure(&e, sink);
                } else {
                    error!(flow = id, error = %e, "aborted build flow failed");
                }
                Err(e)
            }
        }
    }

    async fn run_build(
        &self,
        id: u64,
        target: &JobTarget,
        source: &str,
        sink: &dyn OutputSink,
    ) -> Result<BuildHandle> {
        self.enter(id, BuildPhase::CreatingOrUpdating, sink).await;
        self.upsert(target, source).await?;
        sink.line(&format!("Successfully updated pipeline: {target}"));
        let job = target.name();

        let build_number = self.client.next_build_number(job).await;
        self.client.trigger_build(job).await?;

        let mut handle = BuildHandle::new(self.client.base_uri(), job, build_number);
        self.with_flow(id, |flow| flow.build = Some(handle.clone())).await;
        self.enter(id, BuildPhase::Triggered, sink).await;
        info!(job, url = %handle.build_url, "build started");
        sink.line(&format!("Build started for '{job}' at {}", handle.build_url));

        self.enter(id, BuildPhase::AwaitingReady, sink).await;
        self.await_ready(&handle.build_url).await?;
        handle.state = BuildState::Running;
        self.with_flow(id, |flow| {
            if let Some(build) = flow.build.as_mut() {
                build.state = BuildState::Running;
            }
        })
        .await;

        self.enter(id, BuildPhase::Streaming, sink).await;
        let final_status = match self.options.console_mode {
            ConsoleMode::Browser => {
                let url = handle.console_url();
                sink.line(&format!("Opening browser to console output: {url}"));
                sink.open_url(&url);
                None
            }
            ConsoleMode::Stream => {
                let mut stream = ConsoleStream::new(&self.client, handle.build_url.clone())
                    .with_poll_interval(self.options.stream_poll_interval);
                stream.run(sink).await?;
                stream.last_status().cloned()
            }
        };

        // abort() takes the claim away; a newer flow may hold it by now.
        if self.release(id, BuildPhase::Done).await {
            handle.state = final_state(final_status.as_ref());
            debug!(flow = id, phase = %BuildPhase::Done, "phase");
            sink.phase(BuildPhase::Done);
        } else {
            handle.state = BuildState::Aborted;
        }
        info!(url = %handle.build_url, state = %handle.state, "build flow finished");
        Ok(handle)
    }

    /// Probe the predicted build URL until it answers or the timeout passes.
    async fn await_ready(&self, build_url: &str) -> Result<()> {
        let started = Instant::now();
        let probe_timeout = self.options.ready_poll_interval.max(MIN_PROBE_TIMEOUT);

        loop {
            if self.client.build_reachable(build_url, probe_timeout).await {
                debug!(url = build_url, elapsed_ms = started.elapsed().as_millis() as u64, "build reachable");
                return Ok(());
            }
            let elapsed = started.elapsed();
            if elapsed >= self.options.ready_timeout {
                return Err(JacklineError::Timeout {
                    url: build_url.to_string(),
                    elapsed,
                });
            }
            tokio::time::sleep(self.options.ready_poll_interval).await;
        }
    }

    /// Render the job definition for `source` and create or reconfigure the job.
    ///
    /// Does not touch the live build or the phase; sending the same source
    /// twice posts the same document twice.
    #[instrument(skip_all, fields(path = %path))]
    pub async fn create_or_update(&self, path: &str, source: &str) -> Result<JobTarget> {
        let target = JobTarget::from_source_path(path, &self.options.job_prefix)?;
        self.upsert(&target, source).await?;
        Ok(target)
    }

    async fn upsert(&self, target: &JobTarget, source: &str) -> Result<()> {
        let job = target.name();

        self.client.ensure_crumb().await;
        let config_xml = render_job_config(source);

        if self.client.job_exists(job).await? {
            info!(job, "job exists, reconfiguring");
            self.client.update_job(job, &config_xml).await?;
        } else {
            info!(job, "job does not exist, creating");
            self.client.create_job(job, &config_xml).await?;
        }

        *self.last_job.lock().await = Some(job.to_string());
        Ok(())
    }

    /// Ask Jenkins to stop the live build and forget it immediately.
    ///
    /// Returns the aborted build's URL, or `None` when no build has been
    /// triggered yet. The claim is released even if the stop request fails,
    /// and the aborted flow stops reporting phases.
    pub async fn abort(&self) -> Result<Option<String>> {
        let handle = {
            let mut live = self.live.lock().await;
            let Some(handle) = live.as_ref().and_then(|flow| flow.build.clone()) else {
                if live.is_some() {
                    info!("build not triggered yet, nothing to abort");
                } else {
                    info!("no active build to abort");
                }
                return Ok(None);
            };
            *live = None;
            *self.phase.lock().await = BuildPhase::Aborted;
            handle
        };
        info!(url = %handle.build_url, "aborting build");

        self.client.abort_build(&handle.build_url).await?;
        Ok(Some(handle.build_url))
    }

    /// Run `f` on flow `id` if it still owns the orchestrator.
    async fn with_flow(&self, id: u64, f: impl FnOnce(&mut LiveFlow)) {
        if let Some(flow) = self.live.lock().await.as_mut().filter(|flow| flow.id == id) {
            f(flow);
        }
    }

    async fn enter(&self, id: u64, next: BuildPhase, sink: &dyn OutputSink) {
        {
            let live = self.live.lock().await;
            if !live.as_ref().is_some_and(|flow| flow.id == id) {
                return;
            }
            *self.phase.lock().await = next;
        }
        debug!(flow = id, phase = %next, "phase");
        sink.phase(next);
    }

    /// Drop flow `id`'s claim and record its last phase.
    ///
    /// Returns false, changing nothing, when the flow was aborted.
    async fn release(&self, id: u64, last: BuildPhase) -> bool {
        let mut live = self.live.lock().await;
        if !live.as_ref().is_some_and(|flow| flow.id == id) {
            return false;
        }
        *live = None;
        *self.phase.lock().await = last;
        true
    }

    // -- reference data ------------------------------------------------------

    /// Lint `source` with the declarative pipeline validator.
    pub async fn validate(&self, source: &str) -> Result<String> {
        self.client.ensure_crumb().await;
        self.client.validate_pipeline(source).await
    }

    /// Fetch and parse the step grammar, replacing any cached catalog.
    pub async fn refresh_steps(&self) -> Result<StepCatalog> {
        let text = self.client.fetch_gdsl().await?;
        let catalog = parse_gdsl(&text);
        info!(steps = catalog.len(), "step catalog refreshed");
        *self.steps.lock().await = Some(catalog.clone());
        Ok(catalog)
    }

    /// Cached step catalog, fetched on first use.
    pub async fn steps(&self) -> Result<StepCatalog> {
        if let Some(catalog) = self.steps.lock().await.as_ref() {
            return Ok(catalog.clone());
        }
        self.refresh_steps().await
    }

    /// Fetch the globals reference, scoped to `job` when given.
    pub async fn refresh_globals(&self, job: Option<&str>) -> Result<Vec<GlobalVar>> {
        let html = self.client.fetch_globals_html(job).await?;
        let vars = parse_globals_html(&html);
        info!(vars = vars.len(), job, "globals reference refreshed");
        *self.globals.lock().await = Some(vars.clone());
        Ok(vars)
    }

    /// Cached globals, fetched on first use for the last built job.
    pub async fn globals(&self) -> Result<Vec<GlobalVar>> {
        if let Some(vars) = self.globals.lock().await.as_ref() {
            return Ok(vars.clone());
        }
        let job = self.last_job().await;
        self.refresh_globals(job.as_deref()).await
    }
}

fn report_failure(e: &JacklineError, sink: &dyn OutputSink) {
    error!(error = %e, "build flow failed");
    sink.phase(BuildPhase::Failed);
    sink.line(&format!("Build failed: {e}"));
}

fn final_state(status: Option<&BuildStatus>) -> BuildState {
    match status.and_then(|s| s.result.as_deref()) {
        Some("FAILURE") => BuildState::Failed,
        Some("ABORTED") => BuildState::Aborted,
        _ => BuildState::Completed,
    }
}
