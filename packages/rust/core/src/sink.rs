//! Where build output goes.

use crate::orchestrator::BuildPhase;

/// Receiver for everything a build flow wants to show the user.
///
/// Implemented by the CLI (terminal + browser launcher) and by tests.
pub trait OutputSink: Send + Sync {
    /// A complete status line.
    fn line(&self, text: &str);
    /// A piece of console output, written as is.
    fn chunk(&self, text: &str);
    /// Ask the host to open a URL in a browser.
    fn open_url(&self, url: &str);
    /// Called on every phase transition.
    fn phase(&self, _phase: BuildPhase) {}
}

/// Sink that discards everything.
pub struct SilentSink;

impl OutputSink for SilentSink {
    fn line(&self, _text: &str) {}
    fn chunk(&self, _text: &str) {}
    fn open_url(&self, _url: &str) {}
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records every call for assertions.
    #[derive(Default)]
    pub(crate) struct CollectingSink {
        pub lines: Mutex<Vec<String>>,
        pub chunks: Mutex<Vec<String>>,
        pub opened: Mutex<Vec<String>>,
        pub phases: Mutex<Vec<BuildPhase>>,
    }

    impl OutputSink for CollectingSink {
        fn line(&self, text: &str) {
            self.lines.lock().unwrap().push(text.to_string());
        }
        fn chunk(&self, text: &str) {
            self.chunks.lock().unwrap().push(text.to_string());
        }
        fn open_url(&self, url: &str) {
            self.opened.lock().unwrap().push(url.to_string());
        }
        fn phase(&self, phase: BuildPhase) {
            self.phases.lock().unwrap().push(phase);
        }
    }
}
