use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::models::lenient;

pub const DEFAULT_DESCRIPTION: &str = "暂无描述";
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Records stored in a catalog file are addressed by a string id.
pub trait CatalogRecord {
    fn id(&self) -> &str;
}

/// One entry of `apps.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppEntry {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub repository: String,
}

impl AppEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            repository: repository.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.id.is_empty() && !self.name.is_empty() && !self.repository.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppsFile {
    #[serde(default)]
    pub apps: Vec<AppEntry>,
}

/// One entry of `fnpacks.json`. Older submissions wrote `id`/`repository`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FnpackEntry {
    #[serde(default, alias = "id", deserialize_with = "lenient::string")]
    pub key: String,
    #[serde(default, alias = "repository", deserialize_with = "lenient::string")]
    pub repo: String,
}

impl FnpackEntry {
    pub fn new(key: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            repo: repo.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FnpacksFile {
    #[serde(default)]
    pub fnpacks: Vec<FnpackEntry>,
}

/// Metadata fetched from a manifest-style app repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppInfo {
    #[serde(default, deserialize_with = "lenient::string")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub version: String,
    #[serde(rename = "iconUrl", default, deserialize_with = "lenient::string")]
    pub icon_url: String,
    #[serde(rename = "downloadUrl", default, deserialize_with = "lenient::string")]
    pub download_url: String,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub screenshots: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub author: String,
    #[serde(default, deserialize_with = "lenient::count")]
    pub stars: u32,
    #[serde(default, deserialize_with = "lenient::count")]
    pub forks: u32,
    #[serde(default, deserialize_with = "lenient::string")]
    pub category: String,
    #[serde(rename = "lastUpdate", default, deserialize_with = "lenient::opt_string")]
    pub last_update: Option<String>,
}

/// One entry of `data/app_details.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppDetail {
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub repository: String,
    #[serde(flatten)]
    pub info: AppInfo,
}

impl AppDetail {
    pub fn new(entry: &AppEntry, info: AppInfo) -> Self {
        Self {
            id: entry.id.clone(),
            name: entry.name.clone(),
            repository: entry.repository.clone(),
            info,
        }
    }
}

impl CatalogRecord for AppDetail {
    fn id(&self) -> &str {
        &self.id
    }
}

/// One entry of `data/fnpack_details.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FnpackAppDetail {
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub repository: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub version: String,
    #[serde(rename = "iconUrl", default, deserialize_with = "lenient::string")]
    pub icon_url: String,
    #[serde(rename = "downloadUrl", default, deserialize_with = "lenient::string")]
    pub download_url: String,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub screenshots: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub author: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub author_url: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub bug_report_url: String,
    #[serde(default = "empty_object")]
    pub history: Value,
    #[serde(default, deserialize_with = "lenient::count")]
    pub stars: u32,
    #[serde(default, deserialize_with = "lenient::count")]
    pub forks: u32,
    #[serde(default, deserialize_with = "lenient::string")]
    pub category: String,
    #[serde(rename = "lastUpdate", default, deserialize_with = "lenient::opt_string")]
    pub last_update: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub fnpack_app_key: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub fnpack_repo_key: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub install_type: String,
    #[serde(default = "empty_string")]
    pub size: Value,
}

impl FnpackAppDetail {
    pub fn compose_id(repo_key: &str, app_key: &str) -> String {
        format!("{}_{}", repo_key, app_key)
    }
}

impl CatalogRecord for FnpackAppDetail {
    fn id(&self) -> &str {
        &self.id
    }
}

pub(crate) fn empty_object() -> Value {
    Value::Object(Default::default())
}

pub(crate) fn empty_string() -> Value {
    Value::String(String::new())
}

/// Shape shared by both detail files.
#[derive(Debug, Clone, Serialize)]
pub struct DetailsFile<T> {
    pub apps: Vec<T>,
    #[serde(rename = "lastUpdated")]
    pub last_updated: String,
}

/// Records are read one at a time; an unreadable record is logged and
/// skipped instead of failing the whole file.
impl<'de, T: DeserializeOwned> Deserialize<'de> for DetailsFile<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct RawDetails {
            #[serde(default)]
            apps: Option<Vec<Value>>,
            #[serde(rename = "lastUpdated", default, deserialize_with = "lenient::string")]
            last_updated: String,
        }

        let raw = RawDetails::deserialize(deserializer)?;
        let apps = raw
            .apps
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .filter_map(|(i, record)| match serde_json::from_value::<T>(record) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!("Skipping unreadable detail record #{}: {}", i, e);
                    None
                }
            })
            .collect();

        Ok(Self {
            apps,
            last_updated: raw.last_updated,
        })
    }
}

impl<T> Default for DetailsFile<T> {
    fn default() -> Self {
        Self {
            apps: Vec::new(),
            last_updated: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_detail_uses_front_end_field_names() {
        let detail = AppDetail {
            id: "demo".into(),
            name: "Demo".into(),
            repository: "https://github.com/o/demo".into(),
            info: AppInfo {
                description: "d".into(),
                version: "1.2.0".into(),
                icon_url: "icon".into(),
                download_url: "dl".into(),
                screenshots: vec![],
                author: "o".into(),
                stars: 3,
                forks: 1,
                category: "media".into(),
                last_update: Some("2024-01-01T00:00:00Z".into()),
            },
        };

        let value = serde_json::to_value(&detail).unwrap();
        assert_eq!(value["iconUrl"], "icon");
        assert_eq!(value["downloadUrl"], "dl");
        assert_eq!(value["lastUpdate"], "2024-01-01T00:00:00Z");
        assert_eq!(value["id"], "demo");
        assert!(value.get("info").is_none());
    }

    #[test]
    fn test_fnpack_entry_accepts_legacy_field_names() {
        let legacy: FnpackEntry =
            serde_json::from_str(r#"{"id": "alice", "repository": "https://github.com/alice/FnDepot"}"#)
                .unwrap();
        assert_eq!(legacy.key, "alice");
        assert_eq!(legacy.repo, "https://github.com/alice/FnDepot");

        let out = serde_json::to_value(&legacy).unwrap();
        assert_eq!(out["key"], "alice");
    }

    #[test]
    fn test_details_file_skips_unreadable_records() {
        let file: DetailsFile<FnpackAppDetail> = serde_json::from_value(serde_json::json!({
            "apps": [
                {"id": "bob_tool", "stars": 4},
                {"id": "carol_x", "author_url": null, "version": 2, "screenshots": null},
                {"name": "no id"},
                "garbage"
            ],
            "lastUpdated": "2024-01-01T00:00:00.000000Z"
        }))
        .unwrap();

        let ids: Vec<_> = file.apps.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["bob_tool", "carol_x"]);
        assert_eq!(file.apps[1].author_url, "");
        assert_eq!(file.apps[1].version, "2");
        assert_eq!(file.apps[0].stars, 4);
    }

    #[test]
    fn test_fnpack_detail_defaults_for_sparse_records() {
        let detail: FnpackAppDetail = serde_json::from_str(r#"{"id": "alice_tool"}"#).unwrap();
        assert_eq!(detail.history, serde_json::json!({}));
        assert_eq!(detail.size, serde_json::json!(""));
        assert!(detail.last_update.is_none());
    }
}
