use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

static APP_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9-]+$").expect("static regex compile"));
static GITHUB_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https://github\.com/[^/]+/[^/]+/?$").expect("static regex compile"));
static REPO_PARTS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"github\.com/([^/]+)/([^/]+?)(?:\.git)?/?$").expect("static regex compile")
});
static VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(\.\d+)*(-\w+)?$").expect("static regex compile"));
static FNPACK_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9_-]*$").expect("static regex compile"));
static FNPACK_REPO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https://github\.com/[^/]+/[^/]+$").expect("static regex compile"));

pub const MAX_APP_NAME_CHARS: usize = 100;

/// Owner and name of a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    pub fn parse(url: &str) -> Result<Self> {
        parse_github_url(url).ok_or_else(|| Error::InvalidRepoUrl(url.to_string()))
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Lowercase letters, digits and hyphens only.
pub fn validate_app_key(app_key: &str) -> bool {
    APP_KEY_RE.is_match(app_key)
}

pub fn validate_github_url(url: &str) -> bool {
    GITHUB_URL_RE.is_match(url)
}

pub fn parse_github_url(url: &str) -> Option<RepoRef> {
    let caps = REPO_PARTS_RE.captures(url.trim())?;
    Some(RepoRef {
        owner: caps[1].to_string(),
        repo: caps[2].to_string(),
    })
}

/// Accepts `x`, `x.y`, `x.y.z` and a single `-suffix` such as `1.0.0-beta`.
pub fn validate_version(version: &str) -> bool {
    VERSION_RE.is_match(version)
}

pub fn validate_fnpack_key(key: &str) -> bool {
    FNPACK_KEY_RE.is_match(key)
}

pub fn validate_fnpack_repo_url(url: &str) -> bool {
    FNPACK_REPO_RE.is_match(url)
}

/// Validates a submission, collecting every problem instead of stopping at the first.
pub fn validate_app_info(app_id: &str, app_name: &str, repo_url: &str) -> Result<()> {
    let mut errors = Vec::new();

    if app_id.trim().is_empty() {
        errors.push("App id must not be empty".to_string());
    } else if !validate_app_key(app_id) {
        errors.push("App id may only contain lowercase letters, digits and hyphens".to_string());
    }

    if app_name.trim().is_empty() {
        errors.push("App name must not be empty".to_string());
    } else if app_name.chars().count() > MAX_APP_NAME_CHARS {
        errors.push(format!(
            "App name must not exceed {} characters",
            MAX_APP_NAME_CHARS
        ));
    }

    if repo_url.trim().is_empty() {
        errors.push("GitHub repository URL must not be empty".to_string());
    } else if !validate_github_url(repo_url) {
        errors.push("Please provide a valid GitHub repository URL".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_app_key() {
        assert!(validate_app_key("my-app-2"));
        assert!(!validate_app_key("My-App"));
        assert!(!validate_app_key("my_app"));
        assert!(!validate_app_key(""));
    }

    #[test]
    fn test_parse_github_url_variants() {
        let expected = Some(RepoRef {
            owner: "alice".into(),
            repo: "tool".into(),
        });
        assert_eq!(parse_github_url("https://github.com/alice/tool"), expected);
        assert_eq!(parse_github_url("https://github.com/alice/tool/"), expected);
        assert_eq!(parse_github_url("https://github.com/alice/tool.git"), expected);
        assert_eq!(parse_github_url("https://gitlab.com/alice"), None);
        assert!(RepoRef::parse("not a url").is_err());
    }

    #[test]
    fn test_validate_github_url() {
        assert!(validate_github_url("https://github.com/alice/tool"));
        assert!(validate_github_url("https://github.com/alice/tool/"));
        assert!(!validate_github_url("http://github.com/alice/tool"));
        assert!(!validate_github_url("https://github.com/alice/tool/tree/main"));
    }

    #[test]
    fn test_validate_version() {
        assert!(validate_version("1"));
        assert!(validate_version("1.2.3"));
        assert!(validate_version("1.2.3-beta"));
        assert!(!validate_version("v1.2"));
        assert!(!validate_version("1..2"));
    }

    #[test]
    fn test_fnpack_rules() {
        assert!(validate_fnpack_key("Alice_01"));
        assert!(!validate_fnpack_key("1alice"));
        assert!(validate_fnpack_repo_url("https://github.com/alice/FnDepot"));
        assert!(!validate_fnpack_repo_url("https://github.com/alice/FnDepot/"));
    }

    #[test]
    fn test_validate_app_info_collects_all_errors() {
        assert!(validate_app_info("demo", "Demo", "https://github.com/o/demo").is_ok());

        let long_name = "名".repeat(101);
        match validate_app_info("Bad_Id", &long_name, "https://example.com") {
            Err(Error::Validation(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("expected validation errors, got {:?}", other),
        }
    }
}
