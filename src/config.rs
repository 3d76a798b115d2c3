use crate::error::{Error, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

#[derive(Debug, Clone)]
pub struct Config {
    pub github_token: Option<String>,
    pub api_url: String,
    pub catalog_root: PathBuf,
    pub concurrency_limit: usize,
    pub max_retries: u32,
    pub request_timeout: Duration,
    pub requests_per_minute: Option<u32>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let github_token = env::var("GITHUB_TOKEN")
            .or_else(|_| env::var("PERSONAL_TOKEN"))
            .ok()
            .filter(|t| !t.trim().is_empty());

        if github_token.is_none() {
            tracing::warn!("No GITHUB_TOKEN set, using unauthenticated GitHub API limits");
        }

        let api_url = env::var("GITHUB_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let catalog_root = env::var("CATALOG_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        let concurrency_limit = env::var("CONCURRENCY_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);

        if concurrency_limit == 0 {
            return Err(Error::Config("CONCURRENCY_LIMIT must be at least 1".to_string()));
        }

        let max_retries = env::var("GITHUB_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3);

        let request_timeout = env::var("REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(10));

        let requests_per_minute = env::var("GITHUB_REQUESTS_PER_MINUTE")
            .ok()
            .and_then(|v| v.parse().ok());

        Ok(Self {
            github_token,
            api_url,
            catalog_root,
            concurrency_limit,
            max_retries,
            request_timeout,
            requests_per_minute,
        })
    }

    pub fn paths(&self) -> CatalogPaths {
        CatalogPaths::new(&self.catalog_root)
    }
}

/// Locations of the catalog files relative to the catalog repository root.
#[derive(Debug, Clone)]
pub struct CatalogPaths {
    pub root: PathBuf,
    pub apps_json: PathBuf,
    pub fnpacks_json: PathBuf,
    pub app_details: PathBuf,
    pub fnpack_details: PathBuf,
}

impl CatalogPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref().to_path_buf();
        let data = root.join("data");
        Self {
            apps_json: root.join("apps.json"),
            fnpacks_json: root.join("fnpacks.json"),
            app_details: data.join("app_details.json"),
            fnpack_details: data.join("fnpack_details.json"),
            root,
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn ensure_data_dir(&self) -> Result<PathBuf> {
        let dir = self.data_dir();
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

/// Identifies the catalog repository and the issue or pull request a CI job runs for.
#[derive(Debug, Clone)]
pub struct WorkflowContext {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl WorkflowContext {
    pub fn from_env(number_var: &str) -> Result<Self> {
        let owner = required_var("REPO_OWNER")?;
        let repo = required_var("REPO_NAME")?;
        let number = required_var(number_var)?
            .parse()
            .map_err(|_| Error::Config(format!("{} must be a number", number_var)))?;

        Ok(Self { owner, repo, number })
    }
}

fn required_var(name: &str) -> Result<String> {
    env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::Config(format!("{} environment variable not set", name)))
}
