#![allow(dead_code)]

use base64::{engine::general_purpose::STANDARD, Engine};
use fnstore::{GitHubClient, RetryPolicy};
use mockito::ServerGuard;
use serde_json::json;

/// Client pointed at the mock server, without retries.
pub fn client(server: &ServerGuard) -> GitHubClient {
    GitHubClient::new(None)
        .expect("client")
        .with_base_url(&server.url())
        .with_retry_policy(RetryPolicy::single())
}

pub fn repo_body(owner: &str, name: &str, stars: u32, forks: u32) -> String {
    json!({
        "name": name,
        "full_name": format!("{}/{}", owner, name),
        "description": "A repository",
        "stargazers_count": stars,
        "forks_count": forks,
        "default_branch": "main",
        "updated_at": "2023-12-31T00:00:00Z",
        "owner": { "login": owner }
    })
    .to_string()
}

/// Contents API response for a text file, base64-wrapped the way GitHub does.
pub fn file_body(path: &str, text: &str) -> String {
    let encoded = STANDARD.encode(text);
    let wrapped: Vec<String> = encoded
        .as_bytes()
        .chunks(60)
        .map(|c| String::from_utf8_lossy(c).into_owned())
        .collect();
    json!({
        "name": path.rsplit('/').next().unwrap_or(path),
        "path": path,
        "content": wrapped.join("\n"),
        "encoding": "base64"
    })
    .to_string()
}

pub fn commits_body(date: &str) -> String {
    json!([{ "sha": "abc123", "commit": { "committer": { "date": date } } }]).to_string()
}
