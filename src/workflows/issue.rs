use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::WorkflowContext;
use crate::error::{Error, Result};
use crate::github::GitHubClient;
use crate::models::{AppEntry, FnpackEntry, Issue};
use crate::sync::CatalogUpdater;
use crate::validators::{validate_app_info, RepoRef};
use crate::workflows::report;

pub const PROCESSED_LABEL: &str = "processed";
pub const INVALID_LABEL: &str = "invalid";

static APP_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)### 应用唯一ID\s+(\S+)").expect("static regex compile"));
static APP_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)### 应用名称\s+([^\n]+)").expect("static regex compile"));
static REPO_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)### GitHub仓库URL\s+([^\n]+)").expect("static regex compile"));
static FNPACK_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)### FnDepot 仓库URL\s+([^\n]+)").expect("static regex compile"));

/// What happened to a submission issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueOutcome {
    AlreadyProcessed,
    Accepted { id: String },
    Rejected { reason: String },
}

/// Fields of the app submission form; absent headings stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppSubmission {
    pub app_id: Option<String>,
    pub app_name: Option<String>,
    pub repo_url: Option<String>,
}

impl AppSubmission {
    pub fn from_body(body: &str) -> Self {
        Self {
            app_id: capture(&APP_ID_RE, body),
            app_name: capture(&APP_NAME_RE, body),
            repo_url: capture(&REPO_URL_RE, body),
        }
    }

    /// All three fields, when present.
    pub fn complete(&self) -> Option<(&str, &str, &str)> {
        Some((
            self.app_id.as_deref()?,
            self.app_name.as_deref()?,
            self.repo_url.as_deref()?,
        ))
    }
}

pub fn extract_fnpack_repo_url(body: &str) -> Option<String> {
    capture(&FNPACK_URL_RE, body)
}

fn capture(re: &Regex, body: &str) -> Option<String> {
    re.captures(body)
        .map(|caps| caps[1].trim().to_string())
        .filter(|v| !v.is_empty())
}

async fn load_issue(github: &GitHubClient, ctx: &WorkflowContext) -> Result<Option<Issue>> {
    let issue = github.get_issue(&ctx.owner, &ctx.repo, ctx.number).await?;
    if issue.has_label(PROCESSED_LABEL) {
        tracing::info!("Issue #{} already processed, skipping", ctx.number);
        return Ok(None);
    }
    Ok(Some(issue))
}

async fn reject(github: &GitHubClient, ctx: &WorkflowContext, comment: String) -> Result<IssueOutcome> {
    tracing::warn!("Rejecting issue #{}: {}", ctx.number, comment);
    github
        .add_issue_comment(&ctx.owner, &ctx.repo, ctx.number, &comment)
        .await?;
    github
        .add_issue_labels(&ctx.owner, &ctx.repo, ctx.number, &[INVALID_LABEL])
        .await?;
    Ok(IssueOutcome::Rejected { reason: comment })
}

async fn accept(
    github: &GitHubClient,
    ctx: &WorkflowContext,
    id: &str,
    comment: String,
) -> Result<IssueOutcome> {
    github
        .add_issue_comment(&ctx.owner, &ctx.repo, ctx.number, &comment)
        .await?;
    github
        .add_issue_labels(&ctx.owner, &ctx.repo, ctx.number, &[PROCESSED_LABEL])
        .await?;
    tracing::info!("Accepted issue #{} as {}", ctx.number, id);
    Ok(IssueOutcome::Accepted { id: id.to_string() })
}

/// Handles an app submission issue and records it in `apps.json`.
pub async fn process_app_issue(
    github: &GitHubClient,
    updater: &CatalogUpdater,
    ctx: &WorkflowContext,
) -> Result<IssueOutcome> {
    let Some(issue) = load_issue(github, ctx).await? else {
        return Ok(IssueOutcome::AlreadyProcessed);
    };

    let submission = AppSubmission::from_body(issue.body());
    tracing::info!("Extracted submission: {:?}", submission);

    let Some((app_id, app_name, repo_url)) = submission.complete() else {
        return reject(
            github,
            ctx,
            report::failure_comment("无法从Issue中提取完整的应用信息，请确保所有字段都已正确填写。"),
        )
        .await;
    };

    match validate_app_info(app_id, app_name, repo_url) {
        Ok(()) => {}
        Err(Error::Validation(errors)) => {
            return reject(github, ctx, report::validation_failure_comment(&errors)).await;
        }
        Err(e) => return Err(e),
    }

    let info = match updater.app_fetcher().fetch(repo_url, None).await {
        Ok(info) => info,
        Err(e) => {
            return reject(github, ctx, report::processing_failure_comment(&e.to_string())).await;
        }
    };

    if info.download_url.is_empty() {
        return reject(
            github,
            ctx,
            report::failure_comment("下载链接是必填项，请确保GitHub仓库的Release中有.fpk文件。"),
        )
        .await;
    }

    updater
        .apps()
        .add_or_update_app(AppEntry::new(app_id, app_name, repo_url))?;

    let comment = report::app_summary_comment(app_id, app_name, repo_url, &info);
    accept(github, ctx, app_id, comment).await
}

/// Handles a FnDepot submission issue and records it in `fnpacks.json`
/// under the repository owner's name.
pub async fn process_fnpack_issue(
    github: &GitHubClient,
    updater: &CatalogUpdater,
    ctx: &WorkflowContext,
) -> Result<IssueOutcome> {
    let Some(issue) = load_issue(github, ctx).await? else {
        return Ok(IssueOutcome::AlreadyProcessed);
    };

    let Some(repo_url) = extract_fnpack_repo_url(issue.body()) else {
        return reject(
            github,
            ctx,
            report::failure_comment("无法从Issue中提取仓库URL，请确保已正确填写。"),
        )
        .await;
    };
    tracing::info!("Extracted FnDepot URL: {}", repo_url);

    let Ok(repo_ref) = RepoRef::parse(&repo_url) else {
        return reject(github, ctx, report::failure_comment("无效的GitHub仓库URL格式。")).await;
    };

    let apps = match updater.fnpack_fetcher().fetch(&repo_url, None, &[]).await {
        Ok(apps) if !apps.is_empty() => apps,
        Ok(_) | Err(Error::FnpackMissing(_)) | Err(Error::ParseError(_)) => {
            return reject(
                github,
                ctx,
                report::failure_comment(
                    "无法从仓库获取有效的 fnpack.json 文件，请确保：\n- 仓库根目录存在 fnpack.json 文件\n- fnpack.json 格式正确",
                ),
            )
            .await;
        }
        Err(e) => {
            return reject(github, ctx, report::processing_failure_comment(&e.to_string())).await;
        }
    };

    updater
        .fnpacks()
        .add_or_update_fnpack(FnpackEntry::new(&repo_ref.owner, repo_url.as_str()))?;

    let comment = report::fnpack_summary_comment(&repo_url, &apps);
    accept(github, ctx, &repo_ref.owner, comment).await
}

#[cfg(test)]
mod tests {
    use super::*;

    const APP_BODY: &str = "### 应用唯一ID\n\nmy-app extra\n\n### 应用名称\n\n我的 应用 \n\n### GitHub仓库URL\n\nhttps://github.com/alice/my-app\n";

    #[test]
    fn test_extract_app_submission() {
        let submission = AppSubmission::from_body(APP_BODY);
        assert_eq!(
            submission.complete(),
            Some(("my-app", "我的 应用", "https://github.com/alice/my-app"))
        );
    }

    #[test]
    fn test_missing_heading_leaves_field_empty() {
        let submission = AppSubmission::from_body("### 应用名称\n\nDemo\n");
        assert_eq!(submission.app_name.as_deref(), Some("Demo"));
        assert!(submission.app_id.is_none());
        assert!(submission.complete().is_none());
    }

    #[test]
    fn test_extract_fnpack_repo_url() {
        let body = "### FnDepot 仓库URL\n\nhttps://github.com/alice/FnDepot\n\n### 备注\n\n无";
        assert_eq!(
            extract_fnpack_repo_url(body).as_deref(),
            Some("https://github.com/alice/FnDepot")
        );
        assert_eq!(extract_fnpack_repo_url("nothing here"), None);
    }
}
