//! Incremental console streaming over Jenkins' progressive-text API.
//!
//! Jenkins answers `logText/progressiveText?start=N` with whatever log bytes
//! exist past offset `N` and the next offset in `X-Text-Size`. An empty answer
//! does not mean the build is over, so after two empty polls in a row the
//! build status is checked. Once Jenkins reports the build as no longer
//! building, one more round of polls is granted to pick up trailing output
//! before the stream closes.

use std::time::Duration;

use tracing::{debug, instrument};

use jackline_gateway::JenkinsClient;
use jackline_shared::{BuildStatus, Result};

use crate::sink::OutputSink;

/// Number of consecutive empty polls tolerated before checking build status.
const IDLE_POLLS_BEFORE_STATUS: u32 = 1;

/// Default pause between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Streams one build's console log in order.
pub struct ConsoleStream<'a> {
    client: &'a JenkinsClient,
    build_url: String,
    start_at: u64,
    idle: u32,
    grace_used: bool,
    finished: bool,
    // A chunk was handed out; wait before the next poll.
    pause_pending: bool,
    poll_interval: Duration,
    last_status: Option<BuildStatus>,
}

impl<'a> ConsoleStream<'a> {
    /// Stream `build_url` from the beginning of its log.
    pub fn new(client: &'a JenkinsClient, build_url: impl Into<String>) -> Self {
        Self {
            client,
            build_url: build_url.into(),
            start_at: 0,
            idle: 0,
            grace_used: false,
            finished: false,
            pause_pending: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
            last_status: None,
        }
    }

    /// Resume from a byte offset already consumed elsewhere.
    pub fn starting_at(mut self, offset: u64) -> Self {
        self.start_at = offset;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Offset the next poll will request.
    pub fn offset(&self) -> u64 {
        self.start_at
    }

    /// The most recent build status seen while deciding whether to stop.
    pub fn last_status(&self) -> Option<&BuildStatus> {
        self.last_status.as_ref()
    }

    /// Next piece of console text, or `None` once the build is confirmed finished.
    ///
    /// Text is returned as soon as it arrives; the pause between polls comes
    /// at the start of the following call. A failed poll is returned as an error and is not retried.
    pub async fn next_chunk(&mut self) -> Result<Option<String>> {
        loop {
            if self.finished {
                return Ok(None);
            }
            if std::mem::take(&mut self.pause_pending) {
                tokio::time::sleep(self.poll_interval).await;
            }

            let chunk = self
                .client
                .progressive_text(&self.build_url, self.start_at)
                .await?;
            debug!(
                start = self.start_at,
                length = chunk.content_length,
                "progressive text poll"
            );

            if chunk.content_length > 0 {
                self.idle = 0;
                let consumed = chunk.bytes.len() as u64;
                self.start_at = chunk.text_size.unwrap_or(self.start_at + consumed);
                self.pause_pending = true;
                return Ok(Some(decode_chunk(&chunk.bytes)));
            }

            tokio::time::sleep(self.poll_interval).await;
            self.idle += 1;
            if self.idle > IDLE_POLLS_BEFORE_STATUS {
                self.check_status().await?;
            }
        }
    }

    async fn check_status(&mut self) -> Result<()> {
        let status = self.client.build_status(&self.build_url).await?;
        if status.building {
            self.idle = 0;
        } else if self.grace_used {
            debug!(url = %self.build_url, "build finished, closing stream");
            self.finished = true;
        } else {
            debug!(url = %self.build_url, "build reports finished, polling once more");
            self.grace_used = true;
        }
        self.last_status = Some(status);
        Ok(())
    }

    /// Drive the stream to completion, writing every chunk to `sink`.
    #[instrument(skip_all, fields(url = %self.build_url))]
    pub async fn run(&mut self, sink: &dyn OutputSink) -> Result<()> {
        let barrier = "-".repeat(80);
        sink.line(&barrier);
        sink.line(&format!("Console output: {}", self.build_url));
        sink.line(&barrier);

        while let Some(text) = self.next_chunk().await? {
            sink.chunk(&text);
        }

        sink.line(&barrier);
        Ok(())
    }
}

/// Decode log bytes for display: lossy UTF-8, literal `\t` to tab, CRLF to LF.
pub fn decode_chunk(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .replace("\\t", "\t")
        .replace("\r\n", "\n")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use jackline_shared::{JacklineError, JenkinsConfig};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    use super::*;
    use crate::sink::testing::CollectingSink;

    const FAST: Duration = Duration::from_millis(1);

    /// Serves progressive-text responses with the given body lengths, then empty ones.
    struct LogSequence {
        lengths: Vec<usize>,
        calls: AtomicUsize,
    }

    impl LogSequence {
        fn new(lengths: &[usize]) -> Self {
            Self {
                lengths: lengths.to_vec(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Respond for LogSequence {
        fn respond(&self, _request: &Request) -> ResponseTemplate {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let len = self.lengths.get(n).copied().unwrap_or(0);
            let offset: usize = self.lengths.iter().take(n + 1).sum();
            ResponseTemplate::new(200)
                .insert_header("X-Text-Size", offset.to_string().as_str())
                .set_body_string("x".repeat(len))
        }
    }

    async fn mount_status(server: &MockServer, building: bool) {
        let body = format!(r#"{{"building":{building},"number":1,"result":"SUCCESS"}}"#);
        Mock::given(method("GET"))
            .and(path("/job/demo/1/api/json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    async fn count(server: &MockServer, suffix: &str) -> usize {
        server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path().ends_with(suffix))
            .count()
    }

    fn client_for(server: &MockServer) -> JenkinsClient {
        JenkinsClient::new(JenkinsConfig::new(server.uri()).unwrap()).unwrap()
    }

    #[test]
    fn decoding_normalizes_tabs_and_newlines() {
        assert_eq!(decode_chunk(b"a\\tb\r\nc\n"), "a\tb\nc\n");
        assert_eq!(decode_chunk(&[b'o', b'k', 0xff]), "ok\u{fffd}");
    }

    #[tokio::test]
    async fn single_chunk_then_one_grace_round() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/job/demo/1/logText/progressiveText"))
            .respond_with(LogSequence::new(&[0, 0, 5, 0, 0, 0]))
            .mount(&server)
            .await;
        mount_status(&server, false).await;

        let client = client_for(&server);
        let mut stream = ConsoleStream::new(&client, format!("{}/job/demo/1", server.uri()))
            .with_poll_interval(FAST);
        let sink = CollectingSink::default();
        stream.run(&sink).await.unwrap();

        assert_eq!(*sink.chunks.lock().unwrap(), vec!["xxxxx".to_string()]);
        assert_eq!(stream.offset(), 5);
        // First status check grants grace, second one closes the stream.
        assert_eq!(count(&server, "/api/json").await, 2);
        assert_eq!(count(&server, "/progressiveText").await, 5);
        assert_eq!(stream.last_status().and_then(|s| s.result.as_deref()), Some("SUCCESS"));
    }

    #[tokio::test]
    async fn empty_log_gets_exactly_one_grace_poll() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/job/demo/1/logText/progressiveText"))
            .respond_with(LogSequence::new(&[]))
            .mount(&server)
            .await;
        mount_status(&server, false).await;

        let client = client_for(&server);
        let mut stream = ConsoleStream::new(&client, format!("{}/job/demo/1", server.uri()))
            .with_poll_interval(FAST);

        assert_eq!(stream.next_chunk().await.unwrap(), None);
        assert_eq!(count(&server, "/progressiveText").await, 3);
        assert_eq!(count(&server, "/api/json").await, 2);

        // Finished streams stay finished without touching the network.
        assert_eq!(stream.next_chunk().await.unwrap(), None);
        assert_eq!(count(&server, "/progressiveText").await, 3);
    }

    #[tokio::test]
    async fn offsets_follow_text_size() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/job/demo/1/logText/progressiveText"))
            .respond_with(LogSequence::new(&[3, 4]))
            .mount(&server)
            .await;
        mount_status(&server, false).await;

        let client = client_for(&server);
        let mut stream = ConsoleStream::new(&client, format!("{}/job/demo/1", server.uri()))
            .with_poll_interval(FAST);

        assert_eq!(stream.next_chunk().await.unwrap().as_deref(), Some("xxx"));
        assert_eq!(stream.offset(), 3);
        assert_eq!(stream.next_chunk().await.unwrap().as_deref(), Some("xxxx"));
        assert_eq!(stream.offset(), 7);

        let bodies: Vec<String> = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|r| String::from_utf8_lossy(&r.body).into_owned())
            .collect();
        assert_eq!(bodies, vec!["start=0", "start=3"]);
    }

    #[tokio::test]
    async fn chunk_is_returned_before_the_pause() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/job/demo/1/logText/progressiveText"))
            .respond_with(LogSequence::new(&[3, 4]))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let mut stream = ConsoleStream::new(&client, format!("{}/job/demo/1", server.uri()))
            .with_poll_interval(Duration::from_secs(30));

        let first = tokio::time::timeout(Duration::from_secs(5), stream.next_chunk())
            .await
            .expect("chunk held back by the poll interval")
            .unwrap();
        assert_eq!(first.as_deref(), Some("xxx"));

        // The interval runs before the following poll.
        let second = tokio::time::timeout(Duration::from_millis(200), stream.next_chunk()).await;
        assert!(second.is_err());
        assert_eq!(count(&server, "/progressiveText").await, 1);
    }

    #[tokio::test]
    async fn resumes_from_given_offset() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/job/demo/1/logText/progressiveText"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-Text-Size", "52")
                    .set_body_string("tail"),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let mut stream = ConsoleStream::new(&client, format!("{}/job/demo/1", server.uri()))
            .starting_at(48)
            .with_poll_interval(FAST);
        assert_eq!(stream.next_chunk().await.unwrap().as_deref(), Some("tail"));
        assert_eq!(stream.offset(), 52);

        let first = &server.received_requests().await.unwrap()[0];
        assert_eq!(String::from_utf8_lossy(&first.body), "start=48");
    }

    #[tokio::test]
    async fn still_building_resets_idle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/job/demo/1/logText/progressiveText"))
            .respond_with(LogSequence::new(&[0, 0, 0, 0, 2]))
            .mount(&server)
            .await;
        mount_status(&server, true).await;

        let client = client_for(&server);
        let mut stream = ConsoleStream::new(&client, format!("{}/job/demo/1", server.uri()))
            .with_poll_interval(FAST);

        assert_eq!(stream.next_chunk().await.unwrap().as_deref(), Some("xx"));
        // Status is checked after polls 2 and 4; both say still building.
        assert_eq!(count(&server, "/api/json").await, 2);
    }

    #[tokio::test]
    async fn poll_failure_ends_stream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/job/demo/1/logText/progressiveText"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such build"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let mut stream = ConsoleStream::new(&client, format!("{}/job/demo/1", server.uri()))
            .with_poll_interval(FAST);
        let err = stream.next_chunk().await.unwrap_err();
        assert!(matches!(err, JacklineError::Status { status: 404, .. }));
        assert_eq!(count(&server, "/progressiveText").await, 1);
    }
}
