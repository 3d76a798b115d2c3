use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::config::{CatalogPaths, Config};
use crate::error::{Error, Result};
use crate::fetch::{AppFetcher, FnpackFetcher};
use crate::github::GitHubClient;
use crate::models::{AppDetail, AppEntry, AppInfo, FnpackAppDetail, FnpackEntry};
use crate::storage::{AppDetailsStore, AppsStore, FnpackDetailsStore, FnpacksStore};
use crate::sync::report::BatchReport;
use crate::validators::{validate_app_info, RepoRef};

/// Selects a listed FnDepot repository either by key or by URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FnpackTarget {
    Key(String),
    Url(String),
}

impl FnpackTarget {
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.starts_with("http://") || value.starts_with("https://") {
            FnpackTarget::Url(value.to_string())
        } else {
            FnpackTarget::Key(value.to_string())
        }
    }
}

/// Keeps the catalog files in sync with the upstream repositories.
pub struct CatalogUpdater {
    github: Arc<GitHubClient>,
    apps: AppsStore,
    app_details: AppDetailsStore,
    fnpacks: FnpacksStore,
    fnpack_details: FnpackDetailsStore,
    app_fetcher: AppFetcher,
    fnpack_fetcher: FnpackFetcher,
    concurrency_limit: usize,
    show_progress: bool,
}

impl CatalogUpdater {
    pub fn new(github: GitHubClient, paths: &CatalogPaths, concurrency_limit: usize) -> Self {
        let github = Arc::new(github);
        Self {
            apps: AppsStore::new(&paths.apps_json),
            app_details: AppDetailsStore::new(&paths.app_details),
            fnpacks: FnpacksStore::new(&paths.fnpacks_json),
            fnpack_details: FnpackDetailsStore::new(&paths.fnpack_details),
            app_fetcher: AppFetcher::new(github.clone()),
            fnpack_fetcher: FnpackFetcher::new(github.clone()),
            github,
            concurrency_limit: concurrency_limit.max(1),
            show_progress: true,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let github = GitHubClient::from_config(config)?;
        Ok(Self::new(github, &config.paths(), config.concurrency_limit))
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn github(&self) -> &GitHubClient {
        &self.github
    }

    pub fn apps(&self) -> &AppsStore {
        &self.apps
    }

    pub fn app_details(&self) -> &AppDetailsStore {
        &self.app_details
    }

    pub fn fnpacks(&self) -> &FnpacksStore {
        &self.fnpacks
    }

    pub fn fnpack_details(&self) -> &FnpackDetailsStore {
        &self.fnpack_details
    }

    pub fn app_fetcher(&self) -> &AppFetcher {
        &self.app_fetcher
    }

    pub fn fnpack_fetcher(&self) -> &FnpackFetcher {
        &self.fnpack_fetcher
    }

    fn progress_bar(&self, len: usize, unit: &str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        let template = format!(
            "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {}",
            unit
        );
        if let Ok(style) = ProgressStyle::default_bar().template(&template) {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }

    // ---- manifest-style apps ----

    /// Refreshes one app's detail record.
    pub async fn update_app(&self, entry: &AppEntry) -> Result<AppDetail> {
        let existing = self.app_details.find(&entry.id);
        let info = self
            .app_fetcher
            .fetch(&entry.repository, existing.as_ref())
            .await?;

        let detail = AppDetail::new(entry, info);
        self.app_details.upsert(detail.clone())?;
        tracing::info!("Updated details of {}", entry.id);
        Ok(detail)
    }

    /// Prunes details of delisted apps and refreshes every listed app.
    pub async fn batch_update_apps(&self) -> Result<BatchReport> {
        let entries = self.apps.get_apps();
        let mut report = BatchReport {
            total: entries.len(),
            ..Default::default()
        };
        if entries.is_empty() {
            tracing::info!("No apps listed");
            return Ok(report);
        }

        report.pruned = self.app_details.retain_ids(&self.apps.app_ids())?;

        let (valid, invalid): (Vec<_>, Vec<_>) =
            entries.into_iter().partition(AppEntry::is_complete);
        for entry in &invalid {
            tracing::warn!("Skipping incomplete app entry {:?}", entry);
        }
        report.skipped = invalid.len();

        let existing: HashMap<String, AppDetail> = self
            .app_details
            .get_apps()
            .into_iter()
            .map(|d| (d.id.clone(), d))
            .collect();

        let semaphore = Arc::new(Semaphore::new(self.concurrency_limit));
        let pb = self.progress_bar(valid.len(), "apps");

        let fetches = valid.iter().map(|entry| {
            let sem = semaphore.clone();
            let pb = pb.clone();
            let cached = existing.get(&entry.id);
            async move {
                let _permit = sem.acquire().await.ok();
                let result = self.app_fetcher.fetch(&entry.repository, cached).await;
                pb.inc(1);
                (entry, result)
            }
        });
        let results = join_all(fetches).await;
        pb.finish_with_message("Fetched all apps");

        let mut details = Vec::new();
        for (entry, result) in results {
            match result {
                Ok(info) => details.push(AppDetail::new(entry, info)),
                Err(e) => {
                    tracing::error!("Failed to update {} ({}): {}", entry.name, entry.id, e);
                    report.record_failure(&entry.id, e);
                }
            }
        }

        report.succeeded = details.len();
        report.records_written = self.app_details.upsert_batch(details)?;
        tracing::info!("App batch finished: {}", report);
        Ok(report)
    }

    /// Lists a new app. Returns `false` when the id is already taken.
    pub fn add_app(&self, app_id: &str, app_name: &str, repo_url: &str) -> Result<bool> {
        validate_app_info(app_id, app_name, repo_url)?;
        let added = self.apps.add_app(AppEntry::new(app_id, app_name, repo_url))?;
        if added {
            tracing::info!("Added app {} ({})", app_name, app_id);
        } else {
            tracing::warn!("App {} is already listed", app_id);
        }
        Ok(added)
    }

    /// Delists an app and drops its detail record.
    pub fn remove_app(&self, app_id: &str) -> Result<bool> {
        let removed = self.apps.remove_app(app_id)?;
        if removed {
            self.app_details.remove(app_id)?;
            tracing::info!("Removed app {}", app_id);
        } else {
            tracing::warn!("App {} not found", app_id);
        }
        Ok(removed)
    }

    pub fn list_apps(&self) -> Vec<AppEntry> {
        self.apps.get_apps()
    }

    /// Fetches metadata without touching the catalog.
    pub async fn preview_app(&self, repo_url: &str) -> Result<AppInfo> {
        self.app_fetcher.fetch(repo_url, None).await
    }

    // ---- FnDepot repositories ----

    /// Fetches one repository's apps and stores them.
    pub async fn update_fnpack_repo(
        &self,
        repo_url: &str,
        only_key: Option<&str>,
    ) -> Result<Vec<FnpackAppDetail>> {
        let existing = self.fnpack_details.get_apps();
        let details = self.fnpack_fetcher.fetch(repo_url, only_key, &existing).await?;
        let written = self.fnpack_details.upsert_batch(details.clone())?;
        tracing::info!("Stored {} apps from {}", written, repo_url);
        Ok(details)
    }

    /// Refreshes every listed FnDepot repository.
    ///
    /// Stored apps survive only when a successfully fetched repository still
    /// produces them, or when their repository is listed but failed to fetch.
    pub async fn batch_update_fnpacks(&self) -> Result<BatchReport> {
        let entries = self.fnpacks.get_fnpacks();
        let mut report = BatchReport {
            total: entries.len(),
            ..Default::default()
        };
        if entries.is_empty() {
            tracing::info!("No fnpack repositories listed");
            return Ok(report);
        }

        let (valid, invalid): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .partition(|f| !f.key.is_empty() && !f.repo.is_empty());
        for entry in &invalid {
            tracing::warn!("Skipping incomplete fnpack entry {:?}", entry);
        }
        report.skipped = invalid.len();

        let existing = self.fnpack_details.get_apps();
        let semaphore = Arc::new(Semaphore::new(self.concurrency_limit));
        let pb = self.progress_bar(valid.len(), "repositories");

        let fetches = valid.iter().map(|entry| {
            let sem = semaphore.clone();
            let pb = pb.clone();
            let existing = &existing;
            async move {
                let _permit = sem.acquire().await.ok();
                let result = self.fnpack_fetcher.fetch(&entry.repo, None, existing).await;
                pb.inc(1);
                (entry, result)
            }
        });
        let results = join_all(fetches).await;
        pb.finish_with_message("Fetched all repositories");

        let mut produced: HashSet<String> = HashSet::new();
        let mut failed_repos: Vec<&str> = Vec::new();
        let mut details = Vec::new();
        for (entry, result) in results {
            match result {
                Ok(apps) => {
                    tracing::info!("{} lists {} apps", entry.key, apps.len());
                    produced.extend(apps.iter().map(|a| a.id.clone()));
                    details.extend(apps);
                    report.succeeded += 1;
                }
                Err(e) => {
                    tracing::error!("Failed to update {} ({}): {}", entry.key, entry.repo, e);
                    failed_repos.push(entry.repo.as_str());
                    report.record_failure(&entry.key, e);
                }
            }
        }

        report.records_written = self.fnpack_details.upsert_batch(details)?;
        report.pruned = self.fnpack_details.retain(|app| {
            produced.contains(&app.id)
                || failed_repos
                    .iter()
                    .any(|repo| repo.eq_ignore_ascii_case(&app.repository))
        })?;

        tracing::info!("Fnpack batch finished: {}", report);
        Ok(report)
    }

    /// Lists a FnDepot repository under its owner's name and stores its apps.
    /// Returns `None` when the repository or the owner key is already listed.
    pub async fn add_fnpack(
        &self,
        repo_url: &str,
        only_key: Option<&str>,
    ) -> Result<Option<Vec<FnpackAppDetail>>> {
        let repo_ref = RepoRef::parse(repo_url)?;
        if self.fnpacks.find_by_repo(repo_url).is_some() {
            tracing::warn!("Fnpack repository {} is already listed", repo_url);
            return Ok(None);
        }
        if let Some(listed) = self.fnpacks.find_by_key(&repo_ref.owner) {
            tracing::warn!(
                "Key {} is already used by {}, app ids would collide",
                repo_ref.owner,
                listed.repo
            );
            return Ok(None);
        }

        let details = self.fnpack_fetcher.fetch(repo_url, only_key, &[]).await?;
        self.fnpacks
            .add_or_update_fnpack(FnpackEntry::new(&repo_ref.owner, repo_url))?;
        let written = self.fnpack_details.upsert_batch(details.clone())?;
        tracing::info!("Added {} apps from {}", written, repo_url);
        Ok(Some(details))
    }

    /// Refreshes a repository selected by key or URL. URLs are listed on the fly.
    pub async fn update_fnpack(
        &self,
        target: &FnpackTarget,
        only_key: Option<&str>,
    ) -> Result<Vec<FnpackAppDetail>> {
        let repo_url = match target {
            FnpackTarget::Url(url) => {
                let repo_ref = RepoRef::parse(url)?;
                let details = self.update_fnpack_repo(url, only_key).await?;
                self.fnpacks
                    .add_or_update_fnpack(FnpackEntry::new(&repo_ref.owner, url.as_str()))?;
                return Ok(details);
            }
            FnpackTarget::Key(key) => self
                .fnpacks
                .find_by_key(key)
                .map(|f| f.repo)
                .ok_or_else(|| Error::Config(format!("No fnpack repository with key '{}'", key)))?,
        };
        self.update_fnpack_repo(&repo_url, only_key).await
    }

    pub async fn preview_fnpack(
        &self,
        repo_url: &str,
        only_key: Option<&str>,
    ) -> Result<Vec<FnpackAppDetail>> {
        self.fnpack_fetcher.fetch(repo_url, only_key, &[]).await
    }
}
