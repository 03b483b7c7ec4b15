//! Shared types, error model, and configuration for Jackline.
//!
//! This crate is the foundation depended on by all other Jackline crates.
//! It provides:
//! - [`JacklineError`], the unified error type
//! - Domain types ([`JobTarget`], [`BuildHandle`], [`AuthCrumb`], [`NodeInfo`])
//! - Configuration ([`AppConfig`], [`JenkinsConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, JenkinsConfig, JenkinsSection, PipelineSection, config_dir, config_file_path,
    init_config, load_config, load_config_from,
};
pub use error::{JacklineError, Result};
pub use types::{AuthCrumb, BuildHandle, BuildState, BuildStatus, JobSummary, JobTarget, NodeInfo};
