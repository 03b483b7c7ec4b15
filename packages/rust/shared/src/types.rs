//! Core domain types for Jackline builds.

use serde::{Deserialize, Serialize};

use crate::error::{JacklineError, Result};

// ---------------------------------------------------------------------------
// JobTarget
// ---------------------------------------------------------------------------

/// The remote Jenkins job a pipeline source maps onto.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobTarget {
    name: String,
}

impl JobTarget {
    /// Derive the job name from a source file path and an optional prefix.
    ///
    /// The path's directories and final extension are stripped. A prefix that is
    /// non-empty after trimming yields `<prefix>-<stem>`.
    pub fn from_source_path(path: &str, prefix: &str) -> Result<Self> {
        let stem = file_stem(path);
        if stem.is_empty() {
            return Err(JacklineError::validation(format!(
                "cannot derive a job name from '{path}'"
            )));
        }
        Ok(Self::with_prefix(stem, prefix))
    }

    /// Apply the namespace rule to an already-bare job name.
    pub fn with_prefix(base: &str, prefix: &str) -> Self {
        let name = if prefix.trim().is_empty() {
            base.to_string()
        } else {
            format!("{prefix}-{base}")
        };
        Self { name }
    }

    /// The job name as sent to Jenkins.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for JobTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// File name without directories (either separator) or its final extension.
fn file_stem(path: &str) -> &str {
    let base = path.rsplit(['/', '\\']).next().unwrap_or(path);
    match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => base,
    }
}

// ---------------------------------------------------------------------------
// BuildHandle
// ---------------------------------------------------------------------------

/// Lifecycle state of a single triggered build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildState {
    Pending,
    Running,
    Completed,
    Failed,
    Aborted,
}

impl std::fmt::Display for BuildState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// One in-flight or finished build, addressed by a locally derived URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildHandle {
    /// Job the build belongs to.
    pub job_name: String,
    /// Build number predicted before the trigger.
    pub build_number: u64,
    /// `{base_uri}/job/{job_name}/{build_number}`.
    pub build_url: String,
    /// Current lifecycle state.
    pub state: BuildState,
}

impl BuildHandle {
    /// A freshly triggered build at the configured base URI.
    pub fn new(base_uri: &str, job_name: &str, build_number: u64) -> Self {
        Self {
            job_name: job_name.to_string(),
            build_number,
            build_url: format!(
                "{}/job/{job_name}/{build_number}",
                base_uri.trim_end_matches('/')
            ),
            state: BuildState::Pending,
        }
    }

    /// URL of the build's console page in the Jenkins UI.
    pub fn console_url(&self) -> String {
        format!("{}/console", self.build_url)
    }
}

// ---------------------------------------------------------------------------
// AuthCrumb
// ---------------------------------------------------------------------------

/// Jenkins CSRF token, sent as a header on state-changing requests.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthCrumb {
    /// Header name (`crumbRequestField`).
    #[serde(rename = "crumbRequestField")]
    pub header_name: String,
    /// Header value (`crumb`).
    #[serde(rename = "crumb")]
    pub header_value: String,
}

// ---------------------------------------------------------------------------
// Remote API payloads
// ---------------------------------------------------------------------------

/// A build agent as listed by `/computer/api/json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub display_name: String,
    #[serde(default)]
    pub offline: bool,
    #[serde(default)]
    pub idle: bool,
    #[serde(default)]
    pub num_executors: u32,
}

/// A buildable job found while walking folders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    /// Slash-separated full name (`folder/job`).
    pub full_name: String,
    /// Job URL rewritten onto the configured base URI.
    pub url: String,
    /// Jenkins `_class` of the job.
    pub class: String,
}

/// The subset of `{build_url}/api/json` used to detect completion.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildStatus {
    #[serde(default)]
    pub building: bool,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub number: Option<u64>,
}
