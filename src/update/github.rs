use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::ACCEPT;
use std::io::Read;
use std::time::Duration;
use tracing::debug;

use crate::error::SourceError;
use crate::models::{ArtifactDescriptor, ReleaseDescriptor, RepoRef};

const GITHUB_API_URL: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("swapover/", env!("CARGO_PKG_VERSION"));
const METADATA_TIMEOUT: Duration = Duration::from_secs(30);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Where releases come from.
///
/// Implementations own transport, authentication and retry policy; the
/// orchestrator calls each method once and treats any error as final.
pub trait ReleaseSource {
    fn fetch_latest_release(
        &self,
        repo: &RepoRef,
        token: Option<&str>,
    ) -> Result<ReleaseDescriptor, SourceError>;

    fn fetch_artifact(
        &self,
        artifact: &ArtifactDescriptor,
        token: Option<&str>,
    ) -> Result<Box<dyn Read>, SourceError>;
}

/// [`ReleaseSource`] backed by the GitHub releases REST API
pub struct GithubReleaseSource {
    client: Client,
    api_base: String,
    show_progress: bool,
}

impl GithubReleaseSource {
    pub fn new() -> Result<Self, SourceError> {
        Self::with_api_base(GITHUB_API_URL)
    }

    /// Point at a GitHub Enterprise (or test) API root
    pub fn with_api_base(api_base: &str) -> Result<Self, SourceError> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            show_progress: false,
        })
    }

    /// Draw a progress bar on stderr while artifact bytes are read
    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn latest_release_url(&self, repo: &RepoRef) -> String {
        format!(
            "{}/repos/{}/{}/releases/latest",
            self.api_base, repo.owner, repo.name
        )
    }

    fn progress_bar(&self, total: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}

fn authorize(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) if !token.is_empty() => request.bearer_auth(token),
        _ => request,
    }
}

impl ReleaseSource for GithubReleaseSource {
    fn fetch_latest_release(
        &self,
        repo: &RepoRef,
        token: Option<&str>,
    ) -> Result<ReleaseDescriptor, SourceError> {
        let url = self.latest_release_url(repo);
        debug!(%url, "Fetching latest release");

        let request = self
            .client
            .get(&url)
            .header(ACCEPT, "application/vnd.github+json")
            .timeout(METADATA_TIMEOUT);
        let response = authorize(request, token).send()?;

        if !response.status().is_success() {
            return Err(SourceError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let body = response.text()?;
        Ok(serde_json::from_str(&body)?)
    }

    fn fetch_artifact(
        &self,
        artifact: &ArtifactDescriptor,
        token: Option<&str>,
    ) -> Result<Box<dyn Read>, SourceError> {
        debug!(url = %artifact.url, size = artifact.size, "Downloading artifact");

        let request = self
            .client
            .get(&artifact.url)
            .header(ACCEPT, "application/octet-stream")
            .timeout(DOWNLOAD_TIMEOUT);
        let response = authorize(request, token).send()?;

        if !response.status().is_success() {
            return Err(SourceError::Status {
                url: artifact.url.clone(),
                status: response.status().as_u16(),
            });
        }

        let pb = self.progress_bar(artifact.size);
        Ok(Box::new(pb.wrap_read(response)))
    }
}
