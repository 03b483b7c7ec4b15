//! Authenticated HTTP access to the Jenkins REST surface.
//!
//! [`JenkinsClient`] is a thin wrapper: one method per remote endpoint, no
//! retries and no business logic. Non-2xx answers come back as
//! [`JacklineError::Status`] carrying method, URL, status and body. Two lookups
//! recover instead of failing: [`JenkinsClient::next_build_number`] defaults to
//! 1 and [`JenkinsClient::fetch_crumb`] proceeds without a crumb.

mod urls;

use std::time::Duration;

use reqwest::header::CONTENT_LENGTH;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use jackline_shared::{
    AuthCrumb, BuildStatus, JacklineError, JenkinsConfig, JobSummary, NodeInfo, Result,
};

pub use urls::normalize_url;

/// Maximum number of redirects to follow (`/stop` answers with a redirect).
const MAX_REDIRECTS: usize = 5;

/// User-Agent string for Jenkins requests.
const USER_AGENT: &str = concat!("Jackline/", env!("CARGO_PKG_VERSION"));

/// Header carrying the next progressive-text offset.
const TEXT_SIZE_HEADER: &str = "X-Text-Size";

const FOLDER_CLASS: &str = "com.cloudbees.hudson.plugins.folder.Folder";
const MULTIBRANCH_CLASS: &str =
    "org.jenkinsci.plugins.workflow.multibranch.WorkflowMultiBranchProject";
const ORG_FOLDER_CLASS: &str = "jenkins.branch.OrganizationFolder";

/// Job properties requested three levels deep when listing jobs.
const JOB_TREE: &str = "jobs[fullName,url,jobs[fullName,url,jobs[fullName,url]]]";

// ---------------------------------------------------------------------------
// LogChunk
// ---------------------------------------------------------------------------

/// One answer from the progressive-text log endpoint.
#[derive(Debug, Clone)]
pub struct LogChunk {
    /// Value of `Content-Length` (body length when the header is absent).
    pub content_length: u64,
    /// Value of `X-Text-Size`: the offset to request next.
    pub text_size: Option<u64>,
    /// Raw log bytes.
    pub bytes: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct RawJob {
    #[serde(rename = "_class", default)]
    class: String,
    #[serde(rename = "fullName", default)]
    full_name: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    jobs: Vec<RawJob>,
}

#[derive(Debug, Deserialize)]
struct JobList {
    #[serde(default)]
    jobs: Vec<RawJob>,
}

#[derive(Debug, Deserialize)]
struct NodeList {
    #[serde(default)]
    computer: Vec<NodeInfo>,
}

#[derive(Debug, Deserialize)]
struct BuildList {
    #[serde(default)]
    builds: Vec<BuildNumber>,
}

#[derive(Debug, Deserialize)]
struct BuildNumber {
    number: u64,
}

// ---------------------------------------------------------------------------
// JenkinsClient
// ---------------------------------------------------------------------------

/// Client for one Jenkins controller.
pub struct JenkinsClient {
    config: JenkinsConfig,
    http: Client,
    crumb: RwLock<Option<AuthCrumb>>,
}

impl JenkinsClient {
    /// Create a client for the given connection settings.
    pub fn new(config: JenkinsConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| JacklineError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            http,
            crumb: RwLock::new(None),
        })
    }

    /// Configured base URI, without trailing slash.
    pub fn base_uri(&self) -> &str {
        &self.config.uri
    }

    /// The crumb currently cached for this session, if any.
    pub async fn cached_crumb(&self) -> Option<AuthCrumb> {
        self.crumb.read().await.clone()
    }

    // -- crumb ---------------------------------------------------------------

    /// Fetch a CSRF crumb and cache it. Failure is logged and yields `None`:
    /// some controllers do not issue crumbs at all.
    pub async fn fetch_crumb(&self) -> Option<AuthCrumb> {
        let url = format!("{}/crumbIssuer/api/json", self.config.uri);
        let fetched = async {
            let response = self.send("GET", &url, self.get(&url)).await?;
            let response = expect_success("GET", &url, response).await?;
            read_json::<AuthCrumb>("GET", &url, response).await
        }
        .await;

        match fetched {
            Ok(crumb) => {
                info!(header = %crumb.header_name, "crumb retrieved");
                *self.crumb.write().await = Some(crumb.clone());
                Some(crumb)
            }
            Err(e) => {
                warn!(%url, error = %e, "could not retrieve crumb, continuing without one");
                None
            }
        }
    }

    /// Return the cached crumb, fetching one only if none is cached yet.
    pub async fn ensure_crumb(&self) -> Option<AuthCrumb> {
        if let Some(crumb) = self.cached_crumb().await {
            return Some(crumb);
        }
        self.fetch_crumb().await
    }

    // -- jobs ----------------------------------------------------------------

    /// Whether a job with this name exists. Any non-2xx answer counts as absent.
    pub async fn job_exists(&self, name: &str) -> Result<bool> {
        let url = format!("{}/job/{name}/api/json", self.config.uri);
        let response = self.send("GET", &url, self.get(&url)).await?;
        let exists = response.status().is_success();
        debug!(job = name, status = response.status().as_u16(), exists, "job lookup");
        Ok(exists)
    }

    /// The job's `config.xml`, or `None` when the job does not exist.
    pub async fn get_job_config(&self, name: &str) -> Result<Option<String>> {
        let url = format!("{}/job/{name}/config.xml", self.config.uri);
        let response = self.send("GET", &url, self.get(&url)).await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = expect_success("GET", &url, response).await?;
        read_text("GET", &url, response).await.map(Some)
    }

    /// Create a new job from a `config.xml` document.
    pub async fn create_job(&self, name: &str, config_xml: &str) -> Result<()> {
        let url = format!("{}/createItem?name={name}", self.config.uri);
        let request = self
            .post(&url)
            .await
            .header(reqwest::header::CONTENT_TYPE, "text/xml")
            .body(config_xml.to_string());
        let response = self.send("POST", &url, request).await?;
        expect_success("POST", &url, response).await?;
        Ok(())
    }

    /// Replace an existing job's `config.xml`.
    pub async fn update_job(&self, name: &str, config_xml: &str) -> Result<()> {
        let url = format!("{}/job/{name}/config.xml", self.config.uri);
        let request = self
            .post(&url)
            .await
            .header(reqwest::header::CONTENT_TYPE, "text/xml")
            .body(config_xml.to_string());
        let response = self.send("POST", &url, request).await?;
        expect_success("POST", &url, response).await?;
        Ok(())
    }

    /// Queue a build of the job.
    pub async fn trigger_build(&self, name: &str) -> Result<()> {
        let url = format!("{}/job/{name}/build", self.config.uri);
        let request = self.post(&url).await;
        let response = self.send("POST", &url, request).await?;
        expect_success("POST", &url, response).await?;
        Ok(())
    }

    /// The number the next build of this job will get.
    ///
    /// A job that has never run has no `lastBuild`, so every failure here is
    /// recovered as build number 1.
    pub async fn next_build_number(&self, name: &str) -> u64 {
        let url = format!("{}/job/{name}/lastBuild/buildNumber", self.config.uri);
        let fetched = async {
            let response = self.send("GET", &url, self.get(&url)).await?;
            let response = expect_success("GET", &url, response).await?;
            let body = read_text("GET", &url, response).await?;
            body.trim()
                .parse::<u64>()
                .map_err(|e| JacklineError::parse(format!("{url}: build number '{}': {e}", body.trim())))
        }
        .await;

        match fetched {
            Ok(last) => last + 1,
            Err(e) => {
                warn!(job = name, error = %e, "could not retrieve last build number, defaulting to 1");
                1
            }
        }
    }

    /// Walk the job tree, descending into folders, multibranch projects and
    /// organization folders. Results are sorted by full name.
    #[instrument(skip_all)]
    pub async fn list_jobs(&self) -> Result<Vec<JobSummary>> {
        let mut pending = vec![self.config.uri.clone()];
        let mut found = Vec::new();

        while let Some(root) = pending.pop() {
            for job in self.jobs_at(&root).await? {
                let class = job.class.clone();
                match class.as_str() {
                    FOLDER_CLASS => pending.push(normalize_url(&self.config.uri, &job.url)),
                    MULTIBRANCH_CLASS => {
                        found.extend(job.jobs.into_iter().map(|c| self.summary(c)));
                    }
                    ORG_FOLDER_CLASS => {
                        for project in job.jobs {
                            found.extend(project.jobs.into_iter().map(|c| self.summary(c)));
                        }
                    }
                    _ => found.push(self.summary(job)),
                }
            }
        }

        found.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        info!(jobs = found.len(), "listed jobs");
        Ok(found)
    }

    async fn jobs_at(&self, root_url: &str) -> Result<Vec<RawJob>> {
        let root = normalize_url(&self.config.uri, root_url);
        let url = format!("{root}/api/json?tree={JOB_TREE}");
        let response = self.send("GET", &url, self.get(&url)).await?;
        let response = expect_success("GET", &url, response).await?;
        Ok(read_json::<JobList>("GET", &url, response).await?.jobs)
    }

    fn summary(&self, job: RawJob) -> JobSummary {
        JobSummary {
            url: normalize_url(&self.config.uri, &job.url),
            full_name: job.full_name,
            class: job.class,
        }
    }

    // -- builds --------------------------------------------------------------

    /// Build numbers recorded for the job at `job_url`, newest first as Jenkins reports them.
    pub async fn build_numbers(&self, job_url: &str) -> Result<Vec<u64>> {
        let root = normalize_url(&self.config.uri, job_url);
        let url = format!("{root}/api/json?tree=builds[number]");
        let response = self.send("GET", &url, self.get(&url)).await?;
        let response = expect_success("GET", &url, response).await?;
        let list = read_json::<BuildList>("GET", &url, response).await?;
        Ok(list.builds.into_iter().map(|b| b.number).collect())
    }

    /// Ask Jenkins to stop a running build.
    pub async fn abort_build(&self, build_url: &str) -> Result<()> {
        let url = format!("{}/stop", build_url.trim_end_matches('/'));
        let request = self.post(&url).await;
        let response = self.send("POST", &url, request).await?;
        expect_success("POST", &url, response).await?;
        Ok(())
    }

    /// The complete console log of a build.
    pub async fn get_build_log(&self, job: &str, number: u64) -> Result<String> {
        let url = format!("{}/job/{job}/{number}/consoleText", self.config.uri);
        let response = self.send("GET", &url, self.get(&url)).await?;
        let response = expect_success("GET", &url, response).await?;
        read_text("GET", &url, response).await
    }

    /// Whether the build is still marked as building.
    pub async fn build_status(&self, build_url: &str) -> Result<BuildStatus> {
        let url = format!("{}/api/json", build_url.trim_end_matches('/'));
        let response = self.send("GET", &url, self.get(&url)).await?;
        let response = expect_success("GET", &url, response).await?;
        read_json::<BuildStatus>("GET", &url, response).await
    }

    /// Fetch log output starting at byte offset `start`.
    ///
    /// Anything but 200 is an error; the caller decides whether to give up.
    pub async fn progressive_text(&self, build_url: &str, start: u64) -> Result<LogChunk> {
        let url = format!("{}/logText/progressiveText", build_url.trim_end_matches('/'));
        let request = self.post(&url).await.form(&[("start", start.to_string())]);
        let response = self.send("POST", &url, request).await?;

        if response.status() != reqwest::StatusCode::OK {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(JacklineError::status("POST", &url, status, body));
        }

        let header_length = header_u64(&response, CONTENT_LENGTH.as_str());
        let text_size = header_u64(&response, TEXT_SIZE_HEADER);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| JacklineError::transport("POST", &url, format!("failed to read body: {e}")))?
            .to_vec();

        Ok(LogChunk {
            content_length: header_length.unwrap_or(bytes.len() as u64),
            text_size,
            bytes,
        })
    }

    /// Plain unauthenticated existence probe used while waiting for a build.
    pub async fn build_reachable(&self, build_url: &str, timeout: Duration) -> bool {
        match self.http.get(build_url).timeout(timeout).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(url = build_url, error = %e, "build probe failed");
                false
            }
        }
    }

    // -- pipeline tooling ----------------------------------------------------

    /// Run the declarative-pipeline linter on `source`.
    pub async fn validate_pipeline(&self, source: &str) -> Result<String> {
        let url = format!("{}/pipeline-model-converter/validate", self.config.uri);
        let request = self.post(&url).await.form(&[("jenkinsfile", source)]);
        let response = self.send("POST", &url, request).await?;
        let response = expect_success("POST", &url, response).await?;
        Ok(read_text("POST", &url, response).await?.replace("\r\n", "\n"))
    }

    /// Raw GDSL step descriptor text.
    pub async fn fetch_gdsl(&self) -> Result<String> {
        let url = format!("{}/pipeline-syntax/gdsl", self.config.uri);
        let response = self.send("GET", &url, self.get(&url)).await?;
        let response = expect_success("GET", &url, response).await?;
        read_text("GET", &url, response).await
    }

    /// HTML globals reference, scoped to a job when one is given (that also
    /// lists the job's shared-library variables).
    pub async fn fetch_globals_html(&self, job: Option<&str>) -> Result<String> {
        let url = match job {
            Some(job) => format!("{}/job/{job}/pipeline-syntax/globals", self.config.uri),
            None => format!("{}/pipeline-syntax/globals", self.config.uri),
        };
        let response = self.send("GET", &url, self.get(&url)).await?;
        let response = expect_success("GET", &url, response).await?;
        read_text("GET", &url, response).await
    }

    /// Build agents known to the controller.
    pub async fn list_nodes(&self) -> Result<Vec<NodeInfo>> {
        let url = format!("{}/computer/api/json", self.config.uri);
        let response = self.send("GET", &url, self.get(&url)).await?;
        let response = expect_success("GET", &url, response).await?;
        Ok(read_json::<NodeList>("GET", &url, response).await?.computer)
    }

    /// Execute a Groovy script on the controller's script console, or on a node's.
    pub async fn run_script(&self, source: &str, node: Option<&str>) -> Result<String> {
        let url = match node {
            Some(node) => format!("{}/computer/{node}/scriptText", self.config.uri),
            None => format!("{}/scriptText", self.config.uri),
        };
        let request = self.post(&url).await.form(&[("script", source)]);
        let response = self.send("POST", &url, request).await?;
        let response = expect_success("POST", &url, response).await?;
        Ok(read_text("POST", &url, response).await?.replace("\r\n", "\n"))
    }

    // -- request plumbing ----------------------------------------------------

    fn get(&self, url: &str) -> RequestBuilder {
        self.authorize(self.http.get(url))
    }

    async fn post(&self, url: &str) -> RequestBuilder {
        let request = self.authorize(self.http.post(url));
        match self.crumb.read().await.as_ref() {
            Some(crumb) => request.header(crumb.header_name.as_str(), crumb.header_value.as_str()),
            None => request,
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.timeout(self.config.request_timeout);
        match &self.config.username {
            Some(user) => request.basic_auth(user, self.config.api_token.as_deref()),
            None => request,
        }
    }

    async fn send(&self, method: &str, url: &str, request: RequestBuilder) -> Result<Response> {
        info!(method, %url, "jenkins request");
        request
            .send()
            .await
            .map_err(|e| JacklineError::transport(method, url, e))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Turn a non-2xx response into a status error carrying the body.
async fn expect_success(method: &str, url: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(JacklineError::status(method, url, status.as_u16(), body))
}

async fn read_text(method: &str, url: &str, response: Response) -> Result<String> {
    response
        .text()
        .await
        .map_err(|e| JacklineError::transport(method, url, format!("failed to read body: {e}")))
}

async fn read_json<T: DeserializeOwned>(method: &str, url: &str, response: Response) -> Result<T> {
    let body = read_text(method, url, response).await?;
    serde_json::from_str(&body).map_err(|e| JacklineError::parse(format!("{url}: {e}")))
}

fn header_u64(response: &Response, name: &str) -> Option<u64> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{basic_auth, body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> JenkinsClient {
        let config = JenkinsConfig::new(server.uri()).unwrap();
        JenkinsClient::new(config).unwrap()
    }

    async fn mount_crumb(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/crumbIssuer/api/json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"crumb":"c0ffee","crumbRequestField":"Jenkins-Crumb"}"#,
            ))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn crumb_is_cached_and_sent_on_posts() {
        let server = MockServer::start().await;
        mount_crumb(&server).await;

        Mock::given(method("POST"))
            .and(path("/job/demo/build"))
            .and(header("Jenkins-Crumb", "c0ffee"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let crumb = client.ensure_crumb().await.expect("crumb");
        assert_eq!(crumb.header_value, "c0ffee");

        // Second call must not hit the issuer again.
        client.ensure_crumb().await;
        let issuer_hits = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path() == "/crumbIssuer/api/json")
            .count();
        assert_eq!(issuer_hits, 1);

        client.trigger_build("demo").await.unwrap();
    }

    #[tokio::test]
    async fn missing_crumb_issuer_is_not_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/crumbIssuer/api/json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/job/demo/build"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.fetch_crumb().await.is_none());
        assert!(client.cached_crumb().await.is_none());
        client.trigger_build("demo").await.unwrap();
    }

    #[tokio::test]
    async fn credentials_are_attached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/job/demo/api/json"))
            .and(basic_auth("builder", "tok3n"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;

        let config = JenkinsConfig::new(server.uri())
            .unwrap()
            .with_credentials("builder", "tok3n");
        let client = JenkinsClient::new(config).unwrap();
        assert!(client.job_exists("demo").await.unwrap());
    }

    #[tokio::test]
    async fn job_exists_false_on_404() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/job/ghost/api/json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(!client.job_exists("ghost").await.unwrap());
        assert!(client.get_job_config("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_job_failure_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/createItem"))
            .and(query_param("name", "demo"))
            .and(header("Content-Type", "text/xml"))
            .respond_with(ResponseTemplate::new(400).set_body_string("A job already exists"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.create_job("demo", "<flow-definition/>").await.unwrap_err();
        match err {
            JacklineError::Status {
                method,
                status,
                body,
                ..
            } => {
                assert_eq!(method, "POST");
                assert_eq!(status, 400);
                assert_eq!(body, "A job already exists");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn next_build_number_increments_last() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/job/demo/lastBuild/buildNumber"))
            .respond_with(ResponseTemplate::new(200).set_body_string("41\n"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(client.next_build_number("demo").await, 42);
    }

    #[tokio::test]
    async fn next_build_number_defaults_to_one() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/job/fresh/lastBuild/buildNumber"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/job/garbled/lastBuild/buildNumber"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(client.next_build_number("fresh").await, 1);
        assert_eq!(client.next_build_number("garbled").await, 1);
    }

    #[tokio::test]
    async fn progressive_text_reads_offsets() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/job/demo/3/logText/progressiveText"))
            .and(body_string("start=10"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-Text-Size", "15")
                    .set_body_string("hello"),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let build_url = format!("{}/job/demo/3", server.uri());
        let chunk = client.progressive_text(&build_url, 10).await.unwrap();
        assert_eq!(chunk.content_length, 5);
        assert_eq!(chunk.text_size, Some(15));
        assert_eq!(chunk.bytes, b"hello");
    }

    #[tokio::test]
    async fn progressive_text_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/job/demo/3/logText/progressiveText"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let build_url = format!("{}/job/demo/3", server.uri());
        let err = client.progressive_text(&build_url, 0).await.unwrap_err();
        assert_eq!(err.status_code(), Some(500));
    }

    #[tokio::test]
    async fn build_status_parses_building_flag() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/job/demo/3/api/json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"_class":"org.jenkinsci.plugins.workflow.job.WorkflowRun","building":false,"number":3,"result":"SUCCESS"}"#,
            ))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let status = client
            .build_status(&format!("{}/job/demo/3", server.uri()))
            .await
            .unwrap();
        assert!(!status.building);
        assert_eq!(status.result.as_deref(), Some("SUCCESS"));
        assert_eq!(status.number, Some(3));
    }

    #[tokio::test]
    async fn list_jobs_flattens_folders_and_multibranch() {
        let server = MockServer::start().await;
        // Jenkins reports its own external hostname in job URLs.
        let root = r#"{"jobs":[
            {"_class":"org.jenkinsci.plugins.workflow.job.WorkflowJob","fullName":"solo","url":"http://jenkins.internal/job/solo/"},
            {"_class":"com.cloudbees.hudson.plugins.folder.Folder","fullName":"team","url":"http://jenkins.internal/job/team/","jobs":[]},
            {"_class":"org.jenkinsci.plugins.workflow.multibranch.WorkflowMultiBranchProject","fullName":"svc","url":"http://jenkins.internal/job/svc/","jobs":[
                {"_class":"org.jenkinsci.plugins.workflow.job.WorkflowJob","fullName":"svc/main","url":"http://jenkins.internal/job/svc/job/main/"}
            ]}
        ]}"#;
        let team = r#"{"jobs":[
            {"_class":"org.jenkinsci.plugins.workflow.job.WorkflowJob","fullName":"team/nightly","url":"http://jenkins.internal/job/team/job/nightly/"}
        ]}"#;

        Mock::given(method("GET"))
            .and(path("/api/json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(root))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/job/team/api/json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(team))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let jobs = client.list_jobs().await.unwrap();
        let names: Vec<_> = jobs.iter().map(|j| j.full_name.as_str()).collect();
        assert_eq!(names, vec!["solo", "svc/main", "team/nightly"]);
        assert_eq!(jobs[2].url, format!("{}/job/team/job/nightly", server.uri()));
    }

    #[tokio::test]
    async fn list_nodes_reads_computer_array() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/computer/api/json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"computer":[{"displayName":"built-in","offline":false,"idle":true,"numExecutors":2},{"displayName":"linux-1","offline":true}]}"#,
            ))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let nodes = client.list_nodes().await.unwrap();
        assert_eq!(nodes.len(), 2);
        assert!(nodes[1].offline);
    }

    #[tokio::test]
    async fn validate_posts_jenkinsfile_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/pipeline-model-converter/validate"))
            .and(body_string("jenkinsfile=pipeline+%7B%7D"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("Jenkinsfile successfully validated.\r\n"),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let out = client.validate_pipeline("pipeline {}").await.unwrap();
        assert_eq!(out, "Jenkinsfile successfully validated.\n");
    }

    #[tokio::test]
    async fn globals_endpoint_scoped_to_job() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/job/demo/pipeline-syntax/globals"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>job</html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/pipeline-syntax/globals"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>root</html>"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(client.fetch_globals_html(Some("demo")).await.unwrap(), "<html>job</html>");
        assert_eq!(client.fetch_globals_html(None).await.unwrap(), "<html>root</html>");
    }

    #[tokio::test]
    async fn build_reachable_only_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/job/demo/1"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let timeout = Duration::from_secs(1);
        assert!(client.build_reachable(&format!("{}/job/demo/1", server.uri()), timeout).await);
        assert!(!client.build_reachable(&format!("{}/job/demo/2", server.uri()), timeout).await);
    }

    #[tokio::test]
    async fn transport_failure_is_reported() {
        // Nothing listens on port 9 of the loopback interface.
        let config = JenkinsConfig::new("http://127.0.0.1:9").unwrap();
        let client = JenkinsClient::new(config).unwrap();
        let err = client.trigger_build("demo").await.unwrap_err();
        assert!(matches!(err, JacklineError::Transport { .. }));
    }
}
