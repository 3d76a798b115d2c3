use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::models::catalog::{empty_object, empty_string};
use crate::models::lenient;

/// Per-app configuration block inside `fnpack.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FnpackAppConfig {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub desc: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub version: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub download_url: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub author_url: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub bug_report_url: Option<String>,
    #[serde(default = "empty_object")]
    pub history: Value,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub labels: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub install_type: Option<String>,
    #[serde(default = "empty_string")]
    pub size: Value,
}

/// `fnpack.json`: app keys in document order mapped to their configuration.
#[derive(Debug, Clone, Default)]
pub struct FnpackDescriptor {
    pub apps: Vec<(String, FnpackAppConfig)>,
}

impl FnpackDescriptor {
    pub fn parse(text: &str) -> Result<Self> {
        let root: Map<String, Value> = serde_json::from_str(text)
            .map_err(|e| Error::ParseError(format!("fnpack.json is not a JSON object: {}", e)))?;

        let mut apps = Vec::with_capacity(root.len());
        for (key, value) in root {
            match serde_json::from_value::<FnpackAppConfig>(value) {
                Ok(config) => apps.push((key, config)),
                Err(e) => tracing::warn!("Skipping malformed fnpack entry '{}': {}", key, e),
            }
        }

        Ok(Self { apps })
    }

    pub fn get(&self, key: &str) -> Option<&FnpackAppConfig> {
        self.apps.iter().find(|(k, _)| k == key).map(|(_, c)| c)
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }
}
