pub mod app_info;
pub mod fnpack_info;
pub mod manifest;

pub use app_info::AppFetcher;
pub use fnpack_info::FnpackFetcher;
pub use manifest::parse_manifest;

pub const RAW_CONTENT_URL: &str = "https://raw.githubusercontent.com";

/// Raw download URL of `path` on `branch`.
pub fn raw_url(owner: &str, repo: &str, branch: &str, path: &str) -> String {
    format!("{}/{}/{}/{}/{}", RAW_CONTENT_URL, owner, repo, branch, path)
}
