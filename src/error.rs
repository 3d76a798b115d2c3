use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("GitHub API error ({status}): {message}")]
    GitHubApi { status: u16, message: String },

    #[error("Rate limit exceeded, retry after {0} seconds")]
    RateLimited(u64),

    #[error("Repository not found: {0}")]
    RepoNotFound(String),

    #[error("Issue or pull request not found: #{0}")]
    IssueNotFound(u64),

    #[error("Invalid GitHub repository URL: {0}")]
    InvalidRepoUrl(String),

    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("No fnpack.json found in {0}")]
    FnpackMissing(String),

    #[error("App key '{key}' not present in fnpack.json of {repo}")]
    FnpackKeyMissing { repo: String, key: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::RateLimited(_) => true,
            Error::Network(e) => !e.is_decode(),
            Error::GitHubApi { status, .. } => matches!(status, 429 | 502 | 503 | 504),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        let gateway = Error::GitHubApi { status: 502, message: String::new() };
        let throttled = Error::GitHubApi { status: 429, message: String::new() };
        let forbidden = Error::GitHubApi { status: 403, message: String::new() };

        assert!(gateway.is_retryable());
        assert!(throttled.is_retryable());
        assert!(!forbidden.is_retryable());
        assert!(!Error::RepoNotFound("a/b".into()).is_retryable());
    }

    #[test]
    fn test_validation_message_joins_errors() {
        let err = Error::Validation(vec!["first".into(), "second".into()]);
        assert_eq!(err.to_string(), "Validation failed: first; second");
    }
}
