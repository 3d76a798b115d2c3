use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::fetch::manifest::parse_manifest;
use crate::fetch::raw_url;
use crate::github::GitHubClient;
use crate::models::{AppDetail, AppInfo, Release, Repository, DEFAULT_DESCRIPTION, DEFAULT_VERSION};
use crate::taxonomy::{classify, Category};
use crate::validators::RepoRef;

const MANIFEST_PATH: &str = "manifest";
const PACKAGE_SUFFIX: &str = ".fpk";

pub const APP_ICON_VARIANTS: &[&str] = &[
    "ICON_256.PNG",
    "ICON_256.png",
    "icon_256.png",
    "ICON.PNG",
    "ICON.png",
    "icon.png",
    "Icon.png",
];

static README_VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)version[:\s]+v?([\d.]+)").expect("static regex compile"));
static README_CATEGORY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)category[:\s]+(\w+)").expect("static regex compile"));
static README_IMAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[[^\]]*\]\((https?://[^)]+)\)").expect("static regex compile"));

/// Builds [`AppInfo`] for a repository that ships a `manifest` file.
pub struct AppFetcher {
    github: Arc<GitHubClient>,
}

impl AppFetcher {
    pub fn new(github: Arc<GitHubClient>) -> Self {
        Self { github }
    }

    /// Fetches metadata for `repo_url`.
    ///
    /// When `existing` carries the same update stamp and already has a
    /// version and description, only stars and forks are refreshed.
    pub async fn fetch(&self, repo_url: &str, existing: Option<&AppDetail>) -> Result<AppInfo> {
        let repo_ref = RepoRef::parse(repo_url)?;
        let (owner, name) = (repo_ref.owner.as_str(), repo_ref.repo.as_str());

        let repo = self
            .github
            .get_repo(owner, name)
            .await?
            .ok_or_else(|| Error::RepoNotFound(repo_ref.to_string()))?;

        let manifest_update = match self.github.latest_commit_date(owner, name, MANIFEST_PATH).await {
            Ok(date) => date,
            Err(e) => {
                tracing::warn!("Failed to read manifest history of {}: {}", repo_ref, e);
                None
            }
        };
        let releases = match self.github.list_releases(owner, name).await {
            Ok(releases) => releases,
            Err(e) => {
                tracing::warn!("Failed to list releases of {}: {}", repo_ref, e);
                Vec::new()
            }
        };
        let latest_release = releases.first();

        let current_update = latest_update(
            manifest_update.as_deref(),
            latest_release.and_then(Release::timestamp),
        )
        .map(str::to_string)
        .or_else(|| repo.updated_at.clone());

        if let Some(existing) = existing {
            let cached = &existing.info;
            if cached.last_update == current_update
                && !cached.version.is_empty()
                && !cached.description.is_empty()
            {
                tracing::info!(
                    "{} unchanged since {}, refreshing counters only",
                    repo_ref,
                    current_update.as_deref().unwrap_or("-")
                );
                let mut info = cached.clone();
                info.stars = repo.stargazers_count;
                info.forks = repo.forks_count;
                return Ok(info);
            }
        }

        let manifest = self.load_manifest(owner, name).await;
        let readme = match self.github.get_readme(owner, name).await {
            Ok(text) => text.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Failed to read README of {}: {}", repo_ref, e);
                String::new()
            }
        };
        let icon_url = self.find_icon(&repo, owner, name).await;

        Ok(build_app_info(
            &repo,
            name,
            &manifest,
            &readme,
            latest_release,
            icon_url,
            current_update,
        ))
    }

    async fn load_manifest(&self, owner: &str, repo: &str) -> HashMap<String, String> {
        match self.github.get_file_text(owner, repo, MANIFEST_PATH, None).await {
            Ok(Some(text)) => parse_manifest(&text),
            Ok(None) => {
                tracing::debug!("{}/{} has no manifest", owner, repo);
                HashMap::new()
            }
            Err(e) => {
                tracing::warn!("Failed to read manifest of {}/{}: {}", owner, repo, e);
                HashMap::new()
            }
        }
    }

    async fn find_icon(&self, repo: &Repository, owner: &str, name: &str) -> String {
        for variant in APP_ICON_VARIANTS {
            if self.github.path_exists(owner, name, variant).await {
                let url = raw_url(owner, name, &repo.default_branch, variant);
                tracing::debug!("Found icon {}", url);
                return url;
            }
        }
        String::new()
    }
}

/// Later of two ISO-8601 stamps, compared as strings.
fn latest_update<'a>(manifest: Option<&'a str>, release: Option<&'a str>) -> Option<&'a str> {
    match (manifest, release) {
        (Some(m), Some(r)) => Some(if r > m { r } else { m }),
        (m, r) => m.or(r),
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}

fn build_app_info(
    repo: &Repository,
    repo_name: &str,
    manifest: &HashMap<String, String>,
    readme: &str,
    latest_release: Option<&Release>,
    icon_url: String,
    last_update: Option<String>,
) -> AppInfo {
    let description = non_empty(manifest.get("desc"))
        .or(repo.description.as_deref().filter(|d| !d.is_empty()))
        .unwrap_or(DEFAULT_DESCRIPTION)
        .to_string();

    let mut version = non_empty(manifest.get("version"))
        .or(latest_release.map(|r| r.tag_name.as_str()).filter(|t| !t.is_empty()))
        .unwrap_or(DEFAULT_VERSION)
        .to_string();
    if version == DEFAULT_VERSION {
        if let Some(caps) = README_VERSION_RE.captures(readme) {
            version = caps[1].to_string();
        }
    }

    let category = match non_empty(manifest.get("category")) {
        Some(c) if c != Category::Uncategorized.as_str() => c.to_string(),
        _ => match README_CATEGORY_RE.captures(readme) {
            Some(caps) => caps[1].to_string(),
            None => {
                let category = classify(repo_name, &description);
                tracing::info!("Classified {} as {}", repo_name, category);
                category.to_string()
            }
        },
    };

    let screenshots = README_IMAGE_RE
        .captures_iter(readme)
        .map(|caps| caps[1].to_string())
        .collect();

    let download_url = match latest_release.and_then(|r| r.first_asset_with_suffix(PACKAGE_SUFFIX)) {
        Some(asset) => asset.browser_download_url.clone(),
        None => {
            if latest_release.is_some() {
                tracing::warn!("Latest release of {} has no {} asset", repo.full_name, PACKAGE_SUFFIX);
            }
            String::new()
        }
    };

    AppInfo {
        description,
        version,
        icon_url,
        download_url,
        screenshots,
        author: repo.owner.login.clone(),
        stars: repo.stargazers_count,
        forks: repo.forks_count,
        category,
        last_update,
    }
}
