//! Application configuration for Jackline.
//!
//! User config lives at `~/.jackline/jackline.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{JacklineError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "jackline.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".jackline";

// ---------------------------------------------------------------------------
// Config structs (matching jackline.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Jenkins connection settings.
    #[serde(default)]
    pub jenkins: JenkinsSection,

    /// Pipeline build behaviour.
    #[serde(default)]
    pub pipeline: PipelineSection,
}

/// `[jenkins]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JenkinsSection {
    /// Base URI of the Jenkins controller.
    #[serde(default = "default_uri")]
    pub uri: String,

    /// User for basic authentication. Empty disables credentials.
    #[serde(default)]
    pub username: String,

    /// Name of the env var holding the API token (never store the token itself).
    #[serde(default = "default_api_token_env")]
    pub api_token_env: String,

    /// Timeout applied to each individual HTTP request.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for JenkinsSection {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            username: String::new(),
            api_token_env: default_api_token_env(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_uri() -> String {
    "http://127.0.0.1:8080".into()
}
fn default_api_token_env() -> String {
    "JENKINS_API_TOKEN".into()
}
fn default_request_timeout() -> u64 {
    30
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSection {
    /// Namespace prepended to job names (`<prefix>-<file stem>`).
    #[serde(default)]
    pub job_prefix: String,

    /// Seconds to wait for a triggered build to become reachable.
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_secs: u64,

    /// Open the console in a browser instead of streaming it.
    #[serde(default)]
    pub browser_build_output: bool,

    /// Open the pipeline-syntax page in a browser instead of listing steps.
    #[serde(default)]
    pub browser_steps_api: bool,

    /// Show insertable snippets alongside step signatures.
    #[serde(default = "default_true")]
    pub snippets_enabled: bool,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            job_prefix: String::new(),
            ready_timeout_secs: default_ready_timeout(),
            browser_build_output: false,
            browser_steps_api: false,
            snippets_enabled: true,
        }
    }
}

fn default_ready_timeout() -> u64 {
    10
}
fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Jenkins connection config (runtime, resolved from config + env)
// ---------------------------------------------------------------------------

/// Runtime connection settings, with the API token resolved from the environment.
#[derive(Clone)]
pub struct JenkinsConfig {
    /// Base URI without a trailing slash.
    pub uri: String,
    /// Basic-auth user, if configured.
    pub username: Option<String>,
    /// Basic-auth token, if present in the environment.
    pub api_token: Option<String>,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl std::fmt::Debug for JenkinsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JenkinsConfig")
            .field("uri", &self.uri)
            .field("username", &self.username)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl JenkinsConfig {
    /// Connection settings for `uri` with no credentials.
    pub fn new(uri: impl Into<String>) -> Result<Self> {
        let uri = validate_uri(&uri.into())?;
        Ok(Self {
            uri,
            username: None,
            api_token: None,
            request_timeout: Duration::from_secs(default_request_timeout()),
        })
    }

    /// Attach basic-auth credentials.
    pub fn with_credentials(mut self, username: impl Into<String>, token: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.api_token = Some(token.into());
        self
    }
}

impl TryFrom<&AppConfig> for JenkinsConfig {
    type Error = JacklineError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        let uri = validate_uri(&config.jenkins.uri)?;
        let username = Some(config.jenkins.username.trim().to_string()).filter(|u| !u.is_empty());
        let api_token = std::env::var(&config.jenkins.api_token_env)
            .ok()
            .filter(|t| !t.is_empty());

        if username.is_some() && api_token.is_none() {
            tracing::warn!(
                env = %config.jenkins.api_token_env,
                "username configured but no API token found, requests will be anonymous"
            );
        }

        Ok(Self {
            uri,
            username,
            api_token,
            request_timeout: Duration::from_secs(config.jenkins.request_timeout_secs),
        })
    }
}

/// Check the URI parses as http(s) and strip any trailing slash.
fn validate_uri(uri: &str) -> Result<String> {
    let trimmed = uri.trim().trim_end_matches('/');
    let parsed = Url::parse(trimmed)
        .map_err(|e| JacklineError::config(format!("invalid Jenkins uri '{uri}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        other => Err(JacklineError::config(format!(
            "unsupported scheme '{other}' in Jenkins uri '{uri}'"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.jackline/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| JacklineError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.jackline/jackline.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| JacklineError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        JacklineError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| JacklineError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| JacklineError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| JacklineError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
