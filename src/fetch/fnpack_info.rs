use std::sync::Arc;

use crate::error::{Error, Result};
use crate::fetch::raw_url;
use crate::github::GitHubClient;
use crate::models::{
    Contents, FnpackAppConfig, FnpackAppDetail, FnpackDescriptor, Repository, DEFAULT_DESCRIPTION,
    DEFAULT_VERSION,
};
use crate::taxonomy::{category_from_labels, classify};
use crate::validators::{validate_app_key, RepoRef};

pub const DESCRIPTOR_PATH: &str = "fnpack.json";
pub const EXPECTED_REPO_NAME: &str = "FnDepot";
pub const MAX_PREVIEWS: usize = 9;

pub const FNPACK_ICON_VARIANTS: &[&str] = &["ICON.PNG", "ICON.png", "icon.png", "Icon.png", "icon.PNG"];
const PREVIEW_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".webp"];

/// Reads `fnpack.json` from a FnDepot repository and expands every app it
/// lists into a catalog record.
pub struct FnpackFetcher {
    github: Arc<GitHubClient>,
}

impl FnpackFetcher {
    pub fn new(github: Arc<GitHubClient>) -> Self {
        Self { github }
    }

    /// Fetches the apps of `repo_url`, or only `only_key` when given.
    ///
    /// `existing` holds previously stored records; records of this repository
    /// are reused with refreshed counters when `fnpack.json` has not changed.
    pub async fn fetch(
        &self,
        repo_url: &str,
        only_key: Option<&str>,
        existing: &[FnpackAppDetail],
    ) -> Result<Vec<FnpackAppDetail>> {
        let repo_ref = RepoRef::parse(repo_url)?;
        let (owner, name) = (repo_ref.owner.as_str(), repo_ref.repo.as_str());

        if name != EXPECTED_REPO_NAME {
            tracing::warn!(
                "Repository name '{}' does not follow the '{}' convention",
                name,
                EXPECTED_REPO_NAME
            );
        }

        let repo = self
            .github
            .get_repo(owner, name)
            .await?
            .ok_or_else(|| Error::RepoNotFound(repo_ref.to_string()))?;

        let current_update = self
            .github
            .latest_commit_date(owner, name, DESCRIPTOR_PATH)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to read {} history of {}: {}", DESCRIPTOR_PATH, repo_ref, e);
                None
            })
            .or_else(|| repo.updated_at.clone());

        if let Some(cached) = reuse_cached(repo_url, &repo, current_update.as_deref(), existing) {
            tracing::info!(
                "{} unchanged since {}, refreshing counters only",
                repo_ref,
                current_update.as_deref().unwrap_or("-")
            );
            return filter_key(cached, only_key, repo_url);
        }

        let text = self
            .github
            .get_file_text(owner, name, DESCRIPTOR_PATH, None)
            .await?
            .ok_or_else(|| Error::FnpackMissing(repo_ref.to_string()))?;
        let descriptor = FnpackDescriptor::parse(&text)?;

        let selected: Vec<&(String, FnpackAppConfig)> = match only_key {
            Some(key) => {
                let entry = descriptor
                    .apps
                    .iter()
                    .find(|(k, _)| k == key)
                    .ok_or_else(|| Error::FnpackKeyMissing {
                        repo: repo_url.to_string(),
                        key: key.to_string(),
                    })?;
                vec![entry]
            }
            None => descriptor.apps.iter().collect(),
        };

        if selected.is_empty() {
            tracing::warn!("{} lists no apps", DESCRIPTOR_PATH);
        }

        let mut details = Vec::with_capacity(selected.len());
        for (key, config) in selected {
            tracing::debug!("Processing fnpack app {}", key);
            details.push(
                self.build_detail(repo_url, &repo, owner, name, key, config, current_update.clone())
                    .await,
            );
        }

        tracing::info!("Read {} apps from {}", details.len(), repo_ref);
        Ok(details)
    }

    #[allow(clippy::too_many_arguments)]
    async fn build_detail(
        &self,
        repo_url: &str,
        repo: &Repository,
        owner: &str,
        name: &str,
        key: &str,
        config: &FnpackAppConfig,
        last_update: Option<String>,
    ) -> FnpackAppDetail {
        if !validate_app_key(key) {
            tracing::warn!(
                "App key '{}' should only use lowercase letters, digits and hyphens",
                key
            );
        }
        let branch = repo.default_branch.as_str();

        let mut icon_url = String::new();
        for variant in FNPACK_ICON_VARIANTS {
            let path = format!("{}/{}", key, variant);
            if self.github.path_exists(owner, name, &path).await {
                icon_url = raw_url(owner, name, branch, &path);
                break;
            }
        }
        if icon_url.is_empty() {
            tracing::warn!("No icon found under /{}/", key);
        }

        let download_url = match config.download_url.as_deref().filter(|u| !u.is_empty()) {
            Some(url) => url.to_string(),
            None => {
                let path = format!("{}/{}.fpk", key, key);
                if !self.github.path_exists(owner, name, &path).await {
                    tracing::warn!("Package /{} not found", path);
                }
                raw_url(owner, name, branch, &path)
            }
        };

        let screenshots = self.list_previews(owner, name, branch, key).await;

        let display_name = config.display_name.clone().unwrap_or_else(|| key.to_string());
        let description = config
            .desc
            .clone()
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string());

        let category = match config.labels.as_deref().and_then(category_from_labels) {
            Some(category) => category,
            None => classify(
                config.display_name.as_deref().unwrap_or_default(),
                config.desc.as_deref().unwrap_or_default(),
            ),
        };

        FnpackAppDetail {
            id: FnpackAppDetail::compose_id(owner, key),
            name: display_name,
            repository: repo_url.to_string(),
            description,
            version: config
                .version
                .clone()
                .unwrap_or_else(|| DEFAULT_VERSION.to_string()),
            icon_url,
            download_url,
            screenshots,
            author: config
                .author
                .clone()
                .filter(|a| !a.is_empty())
                .unwrap_or_else(|| repo.owner.login.clone()),
            author_url: config.author_url.clone().unwrap_or_default(),
            bug_report_url: config.bug_report_url.clone().unwrap_or_default(),
            history: config.history.clone(),
            stars: repo.stargazers_count,
            forks: repo.forks_count,
            category: category.to_string(),
            last_update,
            fnpack_app_key: key.to_string(),
            fnpack_repo_key: owner.to_string(),
            install_type: config.install_type.clone().unwrap_or_default(),
            size: config.size.clone(),
        }
    }

    async fn list_previews(&self, owner: &str, name: &str, branch: &str, key: &str) -> Vec<String> {
        let dir = format!("{}/Preview", key);
        let entries = match self.github.get_contents(owner, name, &dir, None).await {
            Ok(Some(Contents::Directory(entries))) => entries,
            Ok(_) => return Vec::new(),
            Err(e) => {
                tracing::warn!("Failed to list /{}: {}", dir, e);
                return Vec::new();
            }
        };

        entries
            .iter()
            .filter(|e| {
                let lower = e.name.to_lowercase();
                PREVIEW_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
            })
            .take(MAX_PREVIEWS)
            .map(|e| raw_url(owner, name, branch, &format!("{}/{}", dir, e.name)))
            .collect()
    }
}

/// Stored records of `repo_url` with refreshed counters, when the first of
/// them carries `current_update`.
fn reuse_cached(
    repo_url: &str,
    repo: &Repository,
    current_update: Option<&str>,
    existing: &[FnpackAppDetail],
) -> Option<Vec<FnpackAppDetail>> {
    let same_repo = |d: &&FnpackAppDetail| d.repository.eq_ignore_ascii_case(repo_url);

    let sample = existing.iter().find(same_repo)?;
    if sample.last_update.as_deref() != current_update {
        return None;
    }

    Some(
        existing
            .iter()
            .filter(same_repo)
            .filter(|d| !d.fnpack_app_key.is_empty())
            .map(|d| {
                let mut detail = d.clone();
                detail.stars = repo.stargazers_count;
                detail.forks = repo.forks_count;
                detail
            })
            .collect(),
    )
}

fn filter_key(
    details: Vec<FnpackAppDetail>,
    only_key: Option<&str>,
    repo_url: &str,
) -> Result<Vec<FnpackAppDetail>> {
    let Some(key) = only_key else {
        return Ok(details);
    };
    let selected: Vec<_> = details
        .into_iter()
        .filter(|d| d.fnpack_app_key == key)
        .collect();
    if selected.is_empty() {
        return Err(Error::FnpackKeyMissing {
            repo: repo_url.to_string(),
            key: key.to_string(),
        });
    }
    Ok(selected)
}
