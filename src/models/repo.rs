use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub stargazers_count: u32,
    #[serde(default)]
    pub forks_count: u32,
    #[serde(default = "default_branch")]
    pub default_branch: String,
    pub updated_at: Option<String>,
    pub owner: RepositoryOwner,
}

fn default_branch() -> String {
    "main".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryOwner {
    pub login: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Release {
    pub tag_name: String,
    pub published_at: Option<String>,
    pub created_at: Option<String>,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

impl Release {
    pub fn timestamp(&self) -> Option<&str> {
        self.published_at
            .as_deref()
            .or(self.created_at.as_deref())
    }

    pub fn first_asset_with_suffix(&self, suffix: &str) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|a| a.name.ends_with(suffix))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitSummary {
    pub sha: String,
    pub commit: CommitDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitDetails {
    pub committer: Option<CommitSignature>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitSignature {
    pub date: Option<String>,
}

impl CommitSummary {
    pub fn committed_at(&self) -> Option<&str> {
        self.commit.committer.as_ref().and_then(|c| c.date.as_deref())
    }
}

/// Response of the contents API: a single file or a directory listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Contents {
    File(FileContent),
    Directory(Vec<ContentEntry>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileContent {
    pub name: String,
    pub path: String,
    pub content: String,
    #[serde(default)]
    pub encoding: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
}
