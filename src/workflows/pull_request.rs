use serde::de::DeserializeOwned;

use crate::config::WorkflowContext;
use crate::error::{Error, Result};
use crate::github::GitHubClient;
use crate::models::{AppEntry, AppsFile, FnpackEntry, FnpacksFile};
use crate::sync::{find_modified_apps, find_modified_fnpacks, CatalogUpdater};
use crate::validators::{validate_app_info, validate_fnpack_key, validate_fnpack_repo_url};

pub const APPS_FILE: &str = "apps.json";
pub const FNPACKS_FILE: &str = "fnpacks.json";

/// Result of checking one added or modified catalog entry.
#[derive(Debug, Clone)]
pub struct EntryCheck {
    pub id: String,
    /// Whether the id is already listed on the default branch.
    pub exists: bool,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PrValidationReport {
    pub checked: Vec<EntryCheck>,
    pub deleted: Vec<String>,
    pub errors: Vec<String>,
}

impl PrValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

async fn read_catalog_file<T: DeserializeOwned>(
    github: &GitHubClient,
    owner: &str,
    repo: &str,
    path: &str,
    git_ref: Option<&str>,
) -> Result<Option<T>> {
    match github.get_file_text(owner, repo, path, git_ref).await? {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

/// Base-branch copy of a catalog file; unreadable copies count as empty.
async fn read_base<T: DeserializeOwned + Default>(
    github: &GitHubClient,
    ctx: &WorkflowContext,
    path: &str,
    sha: &str,
) -> T {
    match read_catalog_file(github, &ctx.owner, &ctx.repo, path, Some(sha)).await {
        Ok(Some(data)) => data,
        Ok(None) => T::default(),
        Err(e) => {
            tracing::warn!("Failed to read {} at {}: {}", path, sha, e);
            T::default()
        }
    }
}

/// Whether `app_id` is listed in `apps.json` on the default branch.
pub async fn check_app_id_exists(github: &GitHubClient, owner: &str, repo: &str, app_id: &str) -> bool {
    match read_catalog_file::<AppsFile>(github, owner, repo, APPS_FILE, None).await {
        Ok(data) => data.is_some_and(|d| d.apps.iter().any(|a| a.id == app_id)),
        Err(e) => {
            tracing::warn!("Could not check app id {}: {}", app_id, e);
            false
        }
    }
}

/// Whether `key` is listed in `fnpacks.json` on the default branch.
pub async fn check_fnpack_key_exists(github: &GitHubClient, owner: &str, repo: &str, key: &str) -> bool {
    match read_catalog_file::<FnpacksFile>(github, owner, repo, FNPACKS_FILE, None).await {
        Ok(data) => data.is_some_and(|d| d.fnpacks.iter().any(|f| f.key == key)),
        Err(e) => {
            tracing::warn!("Could not check fnpack key {}: {}", key, e);
            false
        }
    }
}

/// Validates the catalog changes of a pull request.
///
/// A pull request touching neither catalog file is an error.
pub async fn validate_pr(
    github: &GitHubClient,
    updater: &CatalogUpdater,
    ctx: &WorkflowContext,
) -> Result<PrValidationReport> {
    let pr = github.get_pull_request(&ctx.owner, &ctx.repo, ctx.number).await?;
    let files = github
        .list_pull_request_files(&ctx.owner, &ctx.repo, ctx.number)
        .await?;

    let changed: Vec<&str> = files.iter().map(|f| f.filename.as_str()).collect();
    tracing::info!("PR #{} changes: {:?}", ctx.number, changed);

    let apps_changed = changed.contains(&APPS_FILE);
    let fnpacks_changed = changed.contains(&FNPACKS_FILE);

    let mut report = PrValidationReport::default();
    if !apps_changed && !fnpacks_changed {
        report
            .errors
            .push(format!("PR changes neither {} nor {}", APPS_FILE, FNPACKS_FILE));
        return Ok(report);
    }

    if fnpacks_changed {
        let head: Option<FnpacksFile> =
            read_catalog_file(github, &ctx.owner, &ctx.repo, FNPACKS_FILE, Some(pr.head.sha.as_str()))
                .await?;
        match head {
            Some(head) => {
                let base: FnpacksFile = read_base(github, ctx, FNPACKS_FILE, &pr.base.sha).await;
                let diff = find_modified_fnpacks(&head.fnpacks, &base.fnpacks);
                for gone in &diff.deleted {
                    tracing::warn!("PR removes fnpack repository {} ({})", gone.key, gone.repo);
                    report.deleted.push(gone.key.clone());
                }
                for entry in &diff.modified {
                    check_fnpack_entry(github, updater, ctx, entry, &mut report).await;
                }
            }
            None => tracing::warn!("{} is missing on the PR head", FNPACKS_FILE),
        }
    }

    if apps_changed {
        let head: AppsFile =
            read_catalog_file(github, &ctx.owner, &ctx.repo, APPS_FILE, Some(pr.head.sha.as_str()))
                .await?
                .ok_or_else(|| Error::ParseError(format!("{} is empty on the PR head", APPS_FILE)))?;
        let base: AppsFile = read_base(github, ctx, APPS_FILE, &pr.base.sha).await;
        let diff = find_modified_apps(&head.apps, &base.apps);
        for gone in &diff.deleted {
            tracing::warn!("PR removes app {} ({})", gone.name, gone.id);
            report.deleted.push(gone.id.clone());
        }
        for entry in &diff.modified {
            check_app_entry(github, updater, ctx, entry, &mut report).await;
        }
    }

    if report.is_valid() {
        tracing::info!("PR #{} passed validation", ctx.number);
    }
    Ok(report)
}

async fn check_app_entry(
    github: &GitHubClient,
    updater: &CatalogUpdater,
    ctx: &WorkflowContext,
    entry: &AppEntry,
    report: &mut PrValidationReport,
) {
    tracing::info!("Validating app {} ({})", entry.name, entry.id);

    if let Err(e) = validate_app_info(&entry.id, &entry.name, &entry.repository) {
        report.errors.push(format!("{}: {}", entry.id, e));
        return;
    }

    let info = match updater.app_fetcher().fetch(&entry.repository, None).await {
        Ok(info) => info,
        Err(e) => {
            report
                .errors
                .push(format!("{}: failed to fetch metadata: {}", entry.id, e));
            return;
        }
    };

    let mut notes = vec![
        format!("version {}", info.version),
        format!("author {}", info.author),
        format!("category {}", info.category),
    ];
    if info.download_url.is_empty() {
        tracing::warn!("{} has no .fpk asset in its latest release", entry.id);
        notes.push("no download URL".to_string());
    }

    let exists = check_app_id_exists(github, &ctx.owner, &ctx.repo, &entry.id).await;
    if exists {
        tracing::info!("App id {} already exists and will be updated", entry.id);
    }
    report.checked.push(EntryCheck {
        id: entry.id.clone(),
        exists,
        notes,
    });
}

async fn check_fnpack_entry(
    github: &GitHubClient,
    updater: &CatalogUpdater,
    ctx: &WorkflowContext,
    entry: &FnpackEntry,
    report: &mut PrValidationReport,
) {
    tracing::info!("Validating fnpack repository {} ({})", entry.key, entry.repo);

    if !validate_fnpack_key(&entry.key) {
        report.errors.push(format!(
            "{}: key must start with a letter and contain only letters, digits, '_' or '-'",
            entry.key
        ));
        return;
    }
    if !validate_fnpack_repo_url(&entry.repo) {
        report
            .errors
            .push(format!("{}: invalid repository URL {}", entry.key, entry.repo));
        return;
    }

    let apps = match updater.fnpack_fetcher().fetch(&entry.repo, None, &[]).await {
        Ok(apps) if !apps.is_empty() => apps,
        Ok(_) => {
            report
                .errors
                .push(format!("{}: fnpack.json lists no apps", entry.key));
            return;
        }
        Err(e) => {
            report.errors.push(format!("{}: {}", entry.key, e));
            return;
        }
    };

    let notes = apps
        .iter()
        .map(|app| {
            format!(
                "{} {} (icon: {}, download: {})",
                app.name,
                app.version,
                if app.icon_url.is_empty() { "no" } else { "yes" },
                if app.download_url.is_empty() { "no" } else { "yes" }
            )
        })
        .collect();

    let exists = check_fnpack_key_exists(github, &ctx.owner, &ctx.repo, &entry.key).await;
    report.checked.push(EntryCheck {
        id: entry.key.clone(),
        exists,
        notes,
    });
}
