//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use jackline_core::{BuildOutcome, ConsoleMode, Orchestrator, OrchestratorOptions};
use jackline_gateway::JenkinsClient;
use jackline_shared::{AppConfig, JenkinsConfig, init_config, load_config};
use tracing::{info, warn};

use crate::sink::{TerminalSink, open_in_browser};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Jackline: run Jenkins pipelines from your editor or terminal.
#[derive(Parser)]
#[command(
    name = "jackline",
    version,
    about = "Push pipeline scripts to Jenkins, build them and stream their console.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Jenkins base URI, overriding the config file.
    #[arg(long, env = "JACKLINE_URI", global = true)]
    pub uri: Option<String>,

    /// Job name prefix, overriding the config file.
    #[arg(long, global = true)]
    pub prefix: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Create or update the job for a script, build it and follow its console.
    Build {
        /// Pipeline script; its file name (minus extension) names the job.
        file: PathBuf,

        /// Open the console page in a browser instead of streaming it.
        #[arg(long)]
        browser: bool,
    },

    /// Create or update the job for a script without building it.
    Update {
        /// Pipeline script.
        file: PathBuf,
    },

    /// Lint a declarative pipeline script.
    Validate {
        /// Pipeline script.
        file: PathBuf,
    },

    /// List pipeline steps known to the controller.
    Steps {
        /// Only show steps whose name contains this text.
        filter: Option<String>,

        /// Print the catalog as JSON.
        #[arg(long)]
        json: bool,

        /// Open the pipeline-syntax page in a browser instead.
        #[arg(long)]
        browser: bool,
    },

    /// List global variables, including shared-library vars of a job.
    Globals {
        /// Scope the reference to this job.
        #[arg(long)]
        job: Option<String>,

        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List build agents.
    Nodes,

    /// List jobs, descending into folders.
    Jobs,

    /// Print the full console log of a build.
    Log {
        /// Job name.
        job: String,

        /// Build number (defaults to the latest).
        #[arg(short, long)]
        number: Option<u64>,
    },

    /// Run a Groovy script on the script console.
    Script {
        /// Groovy script file.
        file: PathBuf,

        /// Run on this node instead of the controller.
        #[arg(long)]
        node: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "jackline=warn",
        1 => "jackline=info",
        2 => "jackline=debug",
        _ => "jackline=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let overrides = Overrides {
        uri: cli.uri,
        prefix: cli.prefix,
    };

    match cli.command {
        Command::Build { file, browser } => cmd_build(&overrides, &file, browser).await,
        Command::Update { file } => cmd_update(&overrides, &file).await,
        Command::Validate { file } => cmd_validate(&overrides, &file).await,
        Command::Steps {
            filter,
            json,
            browser,
        } => cmd_steps(&overrides, filter.as_deref(), json, browser).await,
        Command::Globals { job, json } => cmd_globals(&overrides, job.as_deref(), json).await,
        Command::Nodes => cmd_nodes(&overrides).await,
        Command::Jobs => cmd_jobs(&overrides).await,
        Command::Log { job, number } => cmd_log(&overrides, &job, number).await,
        Command::Script { file, node } => cmd_script(&overrides, &file, node.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Values given on the command line that win over the config file.
struct Overrides {
    uri: Option<String>,
    prefix: Option<String>,
}

impl Overrides {
    fn load(&self) -> Result<AppConfig> {
        let mut config = load_config()?;
        if let Some(uri) = &self.uri {
            config.jenkins.uri = uri.clone();
        }
        if let Some(prefix) = &self.prefix {
            config.pipeline.job_prefix = prefix.clone();
        }
        Ok(config)
    }
}

fn connect(config: &AppConfig) -> Result<JenkinsClient> {
    let jenkins = JenkinsConfig::try_from(config)?;
    info!(uri = %jenkins.uri, "connecting to jenkins");
    Ok(JenkinsClient::new(jenkins)?)
}

fn orchestrator(config: &AppConfig, console_mode: Option<ConsoleMode>) -> Result<Orchestrator> {
    let mut options = OrchestratorOptions::from(config);
    if let Some(mode) = console_mode {
        options.console_mode = mode;
    }
    Ok(Orchestrator::new(connect(config)?, options))
}

async fn read_source(file: &Path) -> Result<String> {
    tokio::fs::read_to_string(file)
        .await
        .wrap_err_with(|| format!("failed to read {}", file.display()))
}

// ---------------------------------------------------------------------------
// Build commands
// ---------------------------------------------------------------------------

async fn cmd_build(overrides: &Overrides, file: &Path, browser: bool) -> Result<()> {
    let config = overrides.load()?;
    let source = read_source(file).await?;
    let mode = browser.then_some(ConsoleMode::Browser);
    let orch = Arc::new(orchestrator(&config, mode)?);

    // First Ctrl-C stops the build, the streamer then drains until Jenkins
    // reports it finished. A second one exits immediately.
    let aborter = Arc::clone(&orch);
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        match aborter.abort().await {
            Ok(Some(url)) => eprintln!("Abort requested for {url}"),
            Ok(None) => eprintln!("No build triggered yet; press Ctrl-C again to quit"),
            Err(e) => warn!(error = %e, "abort request failed"),
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });

    let sink = TerminalSink::new();
    let path = file.to_string_lossy();
    let outcome = orch.start_build(&path, &source, &sink).await;
    sink.finish();
    ctrl_c.abort();

    match outcome? {
        BuildOutcome::Rejected { active_url } => {
            println!("A build is already running: {active_url}");
        }
        BuildOutcome::Finished(handle) => {
            println!();
            println!("  Job:    {}", handle.job_name);
            println!("  Build:  #{}", handle.build_number);
            println!("  State:  {}", handle.state);
            println!("  URL:    {}", handle.build_url);
        }
    }
    Ok(())
}

async fn cmd_update(overrides: &Overrides, file: &Path) -> Result<()> {
    let config = overrides.load()?;
    let source = read_source(file).await?;
    let orch = orchestrator(&config, None)?;

    let target = orch.create_or_update(&file.to_string_lossy(), &source).await?;
    println!("Successfully updated pipeline: {target}");
    Ok(())
}

async fn cmd_validate(overrides: &Overrides, file: &Path) -> Result<()> {
    let config = overrides.load()?;
    let source = read_source(file).await?;
    let orch = orchestrator(&config, None)?;

    let report = orch.validate(&source).await?;
    print!("{report}");
    if !report.ends_with('\n') {
        println!();
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Reference commands
// ---------------------------------------------------------------------------

async fn cmd_steps(
    overrides: &Overrides,
    filter: Option<&str>,
    json: bool,
    browser: bool,
) -> Result<()> {
    let config = overrides.load()?;

    if browser || config.pipeline.browser_steps_api {
        let url = format!(
            "{}/pipeline-syntax",
            config.jenkins.uri.trim_end_matches('/')
        );
        println!("Opening browser to {url}");
        open_in_browser(&url);
        return Ok(());
    }

    let orch = orchestrator(&config, None)?;
    let catalog = orch.steps().await?;
    let steps: Vec<_> = catalog
        .iter()
        .filter(|s| filter.is_none_or(|f| s.name.contains(f)))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&steps)?);
        return Ok(());
    }

    for step in &steps {
        println!("{}: {}", step.signature(), step.doc);
        if config.pipeline.snippets_enabled {
            println!("    {}", step.snippet());
        }
    }
    println!("{} steps", steps.len());
    Ok(())
}

async fn cmd_globals(overrides: &Overrides, job: Option<&str>, json: bool) -> Result<()> {
    let config = overrides.load()?;
    let orch = orchestrator(&config, None)?;
    let vars = orch.refresh_globals(job).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&vars)?);
        return Ok(());
    }

    for var in &vars {
        println!("## {}", var.name);
        println!();
        println!("{}", var.description_markdown);
        println!();
    }
    Ok(())
}

async fn cmd_nodes(overrides: &Overrides) -> Result<()> {
    let client = connect(&overrides.load()?)?;
    let nodes = client.list_nodes().await?;

    if nodes.is_empty() {
        println!("No nodes reported.");
        return Ok(());
    }

    println!("{:<32} {:<8} {:<6} EXECUTORS", "NAME", "STATUS", "IDLE");
    for node in &nodes {
        let status = if node.offline { "offline" } else { "online" };
        println!(
            "{:<32} {:<8} {:<6} {}",
            node.display_name, status, node.idle, node.num_executors
        );
    }
    Ok(())
}

async fn cmd_jobs(overrides: &Overrides) -> Result<()> {
    let client = connect(&overrides.load()?)?;
    let jobs = client.list_jobs().await?;

    for job in &jobs {
        println!("{:<48} {}", job.full_name, job.url);
    }
    println!("{} jobs", jobs.len());
    Ok(())
}

async fn cmd_log(overrides: &Overrides, job: &str, number: Option<u64>) -> Result<()> {
    let client = connect(&overrides.load()?)?;

    let number = match number {
        Some(n) => n,
        None => {
            let job_url = format!("{}/job/{job}", client.base_uri());
            client
                .build_numbers(&job_url)
                .await?
                .into_iter()
                .max()
                .ok_or_else(|| eyre!("job '{job}' has no builds"))?
        }
    };

    let log = client.get_build_log(job, number).await?;
    print!("{log}");
    Ok(())
}

async fn cmd_script(overrides: &Overrides, file: &Path, node: Option<&str>) -> Result<()> {
    let client = connect(&overrides.load()?)?;
    let source = read_source(file).await?;

    client.ensure_crumb().await;
    let output = client.run_script(&source, node).await?;
    print!("{output}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
