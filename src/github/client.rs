use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{header, Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::RetryIf;

use crate::config::{Config, DEFAULT_API_URL};
use crate::error::{Error, Result};
use crate::github::paginator::Paginator;
use crate::github::rate_limiter::RateLimiter;
use crate::models::{
    CommitSummary, Contents, FileContent, Issue, PullRequest, PullRequestFile, Release, Repository,
};

/// How often a request is attempted and how long to back off in between.
/// Delays double per attempt starting at `base_delay`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// One attempt, used for existence probes.
    pub const fn single() -> Self {
        Self::new(1, Duration::ZERO)
    }

    fn strategy(&self) -> impl Iterator<Item = Duration> {
        let factor = (self.base_delay.as_millis() as u64) / 2;
        ExponentialBackoff::from_millis(2)
            .factor(factor)
            .take(self.max_attempts.saturating_sub(1) as usize)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

pub struct GitHubClient {
    client: Client,
    rate_limiter: RateLimiter,
    base_url: String,
    retry: RetryPolicy,
}

impl GitHubClient {
    pub fn new(token: Option<&str>) -> Result<Self> {
        Self::build(token, Duration::from_secs(10))
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Self::build(config.github_token.as_deref(), config.request_timeout)?
            .with_base_url(&config.api_url)
            .with_retry_policy(RetryPolicy::new(config.max_retries.max(1), Duration::from_secs(1)));

        Ok(Self {
            rate_limiter: RateLimiter::with_requests_per_minute(config.requests_per_minute),
            ..client
        })
    }

    fn build(token: Option<&str>, timeout: Duration) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            header::HeaderValue::from_static("2022-11-28"),
        );
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static("fnstore/0.1"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            rate_limiter: RateLimiter::new(),
            base_url: DEFAULT_API_URL.to_string(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    /// Sends one request. A 404 is reported as `Ok(None)`.
    async fn send_once<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Option<T>> {
        self.rate_limiter.wait().await;

        let mut request = self.client.request(method.clone(), url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        self.rate_limiter.update_from_headers(response.headers()).await;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if status == StatusCode::FORBIDDEN && self.rate_limiter.remaining().await == 0 {
            let wait = self.rate_limiter.seconds_until_reset().await.unwrap_or(60);
            return Err(Error::RateLimited(wait));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::GitHubApi {
                status: status.as_u16(),
                message: format!("{} {} failed: {}", method, url, body),
            });
        }

        Ok(Some(response.json().await?))
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
        policy: RetryPolicy,
    ) -> Result<Option<T>> {
        let url = self.url(endpoint);
        RetryIf::spawn(
            policy.strategy(),
            || self.send_once(method.clone(), &url, body),
            |e: &Error| {
                let retry = e.is_retryable();
                if retry {
                    tracing::warn!("Request to {} failed, retrying: {}", url, e);
                }
                retry
            },
        )
        .await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Option<T>> {
        self.request(Method::GET, endpoint, None, self.retry).await
    }

    async fn post_json(&self, endpoint: &str, body: &Value) -> Result<Value> {
        self.request(Method::POST, endpoint, Some(body), self.retry)
            .await?
            .ok_or_else(|| Error::GitHubApi {
                status: 404,
                message: format!("POST {} returned not found", endpoint),
            })
    }

    pub async fn get_repo(&self, owner: &str, repo: &str) -> Result<Option<Repository>> {
        tracing::debug!("Fetching repository: {}/{}", owner, repo);
        self.get_json(&format!("repos/{}/{}", owner, repo)).await
    }

    /// Committer date of the most recent commit touching `path`.
    pub async fn latest_commit_date(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<Option<String>> {
        let commits: Option<Vec<CommitSummary>> = self
            .get_json(&format!("repos/{}/{}/commits?path={}&per_page=1", owner, repo, path))
            .await?;

        Ok(commits
            .unwrap_or_default()
            .first()
            .and_then(|c| c.committed_at())
            .map(str::to_string))
    }

    pub async fn list_releases(&self, owner: &str, repo: &str) -> Result<Vec<Release>> {
        let releases: Option<Vec<Release>> = self
            .get_json(&format!("repos/{}/{}/releases", owner, repo))
            .await?;
        Ok(releases.unwrap_or_default())
    }

    pub async fn get_contents(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<Option<Contents>> {
        let mut endpoint = format!("repos/{}/{}/contents/{}", owner, repo, path);
        if let Some(git_ref) = git_ref {
            endpoint.push_str(&format!("?ref={}", git_ref));
        }
        self.get_json(&endpoint).await
    }

    /// Decoded text of a file, `None` when it does not exist or is a directory.
    pub async fn get_file_text(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<Option<String>> {
        match self.get_contents(owner, repo, path, git_ref).await? {
            Some(Contents::File(file)) => decode_content(&file).map(Some),
            _ => Ok(None),
        }
    }

    pub async fn get_readme(&self, owner: &str, repo: &str) -> Result<Option<String>> {
        let readme: Option<FileContent> = self
            .get_json(&format!("repos/{}/{}/readme", owner, repo))
            .await?;
        readme.map(|f| decode_content(&f)).transpose()
    }

    /// Single-attempt existence check; any failure counts as absent.
    pub async fn path_exists(&self, owner: &str, repo: &str, path: &str) -> bool {
        let endpoint = format!("repos/{}/{}/contents/{}", owner, repo, path);
        match self
            .request::<Value>(Method::GET, &endpoint, None, RetryPolicy::single())
            .await
        {
            Ok(found) => found.is_some(),
            Err(e) => {
                tracing::debug!("Probe for {}/{}/{} failed: {}", owner, repo, path, e);
                false
            }
        }
    }

    pub async fn get_issue(&self, owner: &str, repo: &str, number: u64) -> Result<Issue> {
        self.get_json(&format!("repos/{}/{}/issues/{}", owner, repo, number))
            .await?
            .ok_or(Error::IssueNotFound(number))
    }

    pub async fn add_issue_comment(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        body: &str,
    ) -> Result<()> {
        self.post_json(
            &format!("repos/{}/{}/issues/{}/comments", owner, repo, number),
            &json!({ "body": body }),
        )
        .await?;
        tracing::info!("Commented on {}/{}#{}", owner, repo, number);
        Ok(())
    }

    pub async fn add_issue_labels(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        labels: &[&str],
    ) -> Result<()> {
        self.post_json(
            &format!("repos/{}/{}/issues/{}/labels", owner, repo, number),
            &json!({ "labels": labels }),
        )
        .await?;
        tracing::info!("Labelled {}/{}#{} with {:?}", owner, repo, number, labels);
        Ok(())
    }

    pub async fn get_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<PullRequest> {
        self.get_json(&format!("repos/{}/{}/pulls/{}", owner, repo, number))
            .await?
            .ok_or(Error::IssueNotFound(number))
    }

    pub async fn list_pull_request_files(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<Vec<PullRequestFile>> {
        let url = self.url(&format!("repos/{}/{}/pulls/{}/files", owner, repo, number));
        let paginator = Paginator::new(&self.client, &self.rate_limiter);
        paginator.fetch_all(&url, 100).await
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }
}

/// The contents API returns base64 wrapped at 60 columns.
pub fn decode_content(file: &FileContent) -> Result<String> {
    let compact: String = file.content.split_whitespace().collect();
    let bytes = STANDARD.decode(compact)?;
    String::from_utf8(bytes)
        .map_err(|e| Error::ParseError(format!("{} is not valid UTF-8: {}", file.path, e)))
}
