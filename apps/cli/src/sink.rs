//! Terminal output for build flows.

use std::io::Write;
use std::process::{Command, Stdio};

use indicatif::{ProgressBar, ProgressStyle};
use jackline_core::{BuildPhase, OutputSink};
use tracing::warn;

/// Spinner on stderr for phases, console text on stdout.
pub(crate) struct TerminalSink {
    spinner: ProgressBar,
}

impl TerminalSink {
    pub(crate) fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    pub(crate) fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl OutputSink for TerminalSink {
    fn line(&self, text: &str) {
        self.spinner.suspend(|| println!("{text}"));
    }

    fn chunk(&self, text: &str) {
        self.spinner.suspend(|| {
            if let Err(e) = write_chunk(&mut std::io::stdout().lock(), text) {
                warn!(error = %e, "could not write console output");
            }
        });
    }

    fn open_url(&self, url: &str) {
        open_in_browser(url);
    }

    fn phase(&self, phase: BuildPhase) {
        match phase {
            // Console text takes over the terminal from here.
            BuildPhase::Streaming | BuildPhase::Done | BuildPhase::Aborted | BuildPhase::Failed => {
                self.spinner.finish_and_clear();
            }
            other => self.spinner.set_message(format!("{other}...")),
        }
    }
}

/// Write console text unbuffered so partial lines show up immediately.
fn write_chunk(out: &mut impl Write, text: &str) -> std::io::Result<()> {
    out.write_all(text.as_bytes())?;
    out.flush()
}

/// Launch the platform's URL handler without waiting for it.
pub(crate) fn open_in_browser(url: &str) {
    let mut cmd = if cfg!(target_os = "macos") {
        Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    } else {
        Command::new("xdg-open")
    };

    let spawned = cmd
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();
    if let Err(e) = spawned {
        warn!(url, error = %e, "could not launch browser");
        println!("Open {url} in your browser.");
    }
}
