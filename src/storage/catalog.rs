use chrono::{SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::models::{
    AppDetail, AppEntry, AppsFile, CatalogRecord, DetailsFile, FnpackAppDetail, FnpackEntry,
    FnpacksFile,
};
use crate::storage::json_store::{load_json, read_json, save_json};

/// `apps.json`: the list of submitted manifest-style apps.
pub struct AppsStore {
    path: PathBuf,
}

impl AppsStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self) -> AppsFile {
        load_json(&self.path)
    }

    pub fn save(&self, data: &AppsFile) -> Result<()> {
        save_json(&self.path, data)
    }

    fn load_for_update(&self) -> Result<AppsFile> {
        read_json(&self.path)
    }

    pub fn get_apps(&self) -> Vec<AppEntry> {
        self.load().apps
    }

    pub fn app_ids(&self) -> HashSet<String> {
        self.get_apps()
            .into_iter()
            .filter(|a| !a.id.is_empty())
            .map(|a| a.id)
            .collect()
    }

    pub fn find_app(&self, app_id: &str) -> Option<AppEntry> {
        self.get_apps().into_iter().find(|a| a.id == app_id)
    }

    /// Returns `false` without writing when the id is already listed.
    pub fn add_app(&self, entry: AppEntry) -> Result<bool> {
        let mut data = self.load_for_update()?;
        if data.apps.iter().any(|a| a.id == entry.id) {
            tracing::info!("App {} already listed", entry.id);
            return Ok(false);
        }
        data.apps.push(entry);
        self.save(&data)?;
        Ok(true)
    }

    /// Returns `true` when a new entry was appended.
    pub fn add_or_update_app(&self, entry: AppEntry) -> Result<bool> {
        let mut data = self.load_for_update()?;
        let inserted = match data.apps.iter_mut().find(|a| a.id == entry.id) {
            Some(existing) => {
                *existing = entry;
                false
            }
            None => {
                data.apps.push(entry);
                true
            }
        };
        self.save(&data)?;
        Ok(inserted)
    }

    pub fn update_app(
        &self,
        app_id: &str,
        name: Option<&str>,
        repository: Option<&str>,
    ) -> Result<bool> {
        let mut data = self.load_for_update()?;
        let Some(app) = data.apps.iter_mut().find(|a| a.id == app_id) else {
            tracing::warn!("App {} not found", app_id);
            return Ok(false);
        };

        if let Some(name) = name.filter(|n| !n.is_empty()) {
            app.name = name.to_string();
        }
        if let Some(repository) = repository.filter(|r| !r.is_empty()) {
            app.repository = repository.to_string();
        }
        self.save(&data)?;
        Ok(true)
    }

    pub fn remove_app(&self, app_id: &str) -> Result<bool> {
        let mut data = self.load_for_update()?;
        let before = data.apps.len();
        data.apps.retain(|a| a.id != app_id);
        if data.apps.len() == before {
            return Ok(false);
        }
        self.save(&data)?;
        Ok(true)
    }
}

/// `fnpacks.json`: the list of FnDepot repositories.
pub struct FnpacksStore {
    path: PathBuf,
}

impl FnpacksStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self) -> FnpacksFile {
        load_json(&self.path)
    }

    pub fn save(&self, data: &FnpacksFile) -> Result<()> {
        save_json(&self.path, data)
    }

    fn load_for_update(&self) -> Result<FnpacksFile> {
        read_json(&self.path)
    }

    pub fn get_fnpacks(&self) -> Vec<FnpackEntry> {
        self.load().fnpacks
    }

    pub fn find_by_key(&self, key: &str) -> Option<FnpackEntry> {
        self.get_fnpacks().into_iter().find(|f| f.key == key)
    }

    pub fn find_by_repo(&self, repo_url: &str) -> Option<FnpackEntry> {
        self.get_fnpacks().into_iter().find(|f| f.repo == repo_url)
    }

    /// Returns `false` when either the key or the repository is already listed.
    pub fn add_fnpack(&self, entry: FnpackEntry) -> Result<bool> {
        let mut data = self.load_for_update()?;
        if data
            .fnpacks
            .iter()
            .any(|f| f.key == entry.key || f.repo == entry.repo)
        {
            tracing::info!("Fnpack repository {} already listed", entry.repo);
            return Ok(false);
        }
        data.fnpacks.push(entry);
        self.save(&data)?;
        Ok(true)
    }

    /// Matches on repository URL; returns `true` when a new entry was appended.
    pub fn add_or_update_fnpack(&self, entry: FnpackEntry) -> Result<bool> {
        let mut data = self.load_for_update()?;
        let inserted = match data.fnpacks.iter_mut().find(|f| f.repo == entry.repo) {
            Some(existing) => {
                existing.key = entry.key;
                false
            }
            None => {
                data.fnpacks.push(entry);
                true
            }
        };
        self.save(&data)?;
        Ok(inserted)
    }

    pub fn remove_fnpack(&self, key: &str) -> Result<bool> {
        let mut data = self.load_for_update()?;
        let before = data.fnpacks.len();
        data.fnpacks.retain(|f| f.key != key);
        if data.fnpacks.len() == before {
            return Ok(false);
        }
        self.save(&data)?;
        Ok(true)
    }
}

/// A details file (`app_details.json` or `fnpack_details.json`). Saving
/// stamps `lastUpdated`.
pub struct DetailsStore<T> {
    path: PathBuf,
    _record: PhantomData<T>,
}

pub type AppDetailsStore = DetailsStore<AppDetail>;
pub type FnpackDetailsStore = DetailsStore<FnpackAppDetail>;

impl<T> DetailsStore<T>
where
    T: CatalogRecord + Serialize + DeserializeOwned + Clone,
{
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> DetailsFile<T> {
        load_json(&self.path)
    }

    fn load_for_update(&self) -> Result<DetailsFile<T>> {
        read_json(&self.path)
    }

    pub fn save(&self, data: &mut DetailsFile<T>) -> Result<()> {
        data.last_updated = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        save_json(&self.path, data)
    }

    pub fn get_apps(&self) -> Vec<T> {
        self.load().apps
    }

    pub fn find(&self, id: &str) -> Option<T> {
        self.get_apps().into_iter().find(|a| a.id() == id)
    }

    pub fn upsert(&self, detail: T) -> Result<bool> {
        Ok(self.upsert_batch(vec![detail])? == 1)
    }

    /// Replaces records with matching ids in place and appends the rest.
    /// Records without an id are skipped. Returns how many were stored.
    pub fn upsert_batch(&self, details: Vec<T>) -> Result<usize> {
        let mut data = self.load_for_update()?;
        let mut index: HashMap<String, usize> = data
            .apps
            .iter()
            .enumerate()
            .map(|(i, a)| (a.id().to_string(), i))
            .collect();

        let mut count = 0;
        for detail in details {
            if detail.id().is_empty() {
                tracing::warn!("Skipping detail record without id");
                continue;
            }
            match index.get(detail.id()) {
                Some(&i) => data.apps[i] = detail,
                None => {
                    index.insert(detail.id().to_string(), data.apps.len());
                    data.apps.push(detail);
                }
            }
            count += 1;
        }

        if count > 0 {
            self.save(&mut data)?;
        }
        Ok(count)
    }

    pub fn remove(&self, id: &str) -> Result<bool> {
        Ok(self.retain(|a| a.id() != id)? > 0)
    }

    /// Drops every record whose id is not in `active_ids`.
    pub fn retain_ids(&self, active_ids: &HashSet<String>) -> Result<usize> {
        let removed = self.retain(|a| active_ids.contains(a.id()))?;
        if removed > 0 {
            tracing::info!("Pruned {} stale records from {}", removed, self.path.display());
        }
        Ok(removed)
    }

    /// Keeps records matching `keep`; returns the number removed.
    pub fn retain<F: FnMut(&T) -> bool>(&self, keep: F) -> Result<usize> {
        let mut data = self.load_for_update()?;
        let before = data.apps.len();
        data.apps.retain(keep);
        let removed = before - data.apps.len();
        if removed > 0 {
            self.save(&mut data)?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppInfo;

    fn detail(id: &str, version: &str) -> AppDetail {
        AppDetail {
            id: id.to_string(),
            name: id.to_uppercase(),
            repository: format!("https://github.com/o/{}", id),
            info: AppInfo {
                description: "desc".into(),
                version: version.into(),
                icon_url: String::new(),
                download_url: String::new(),
                screenshots: vec![],
                author: "o".into(),
                stars: 0,
                forks: 0,
                category: "utility".into(),
                last_update: None,
            },
        }
    }

    #[test]
    fn test_apps_store_crud() {
        let dir = tempfile::tempdir().unwrap();
        let store = AppsStore::new(dir.path().join("apps.json"));

        assert!(store.add_app(AppEntry::new("a", "A", "https://github.com/o/a")).unwrap());
        assert!(!store.add_app(AppEntry::new("a", "A2", "https://github.com/o/a")).unwrap());
        assert!(store.add_or_update_app(AppEntry::new("b", "B", "https://github.com/o/b")).unwrap());
        assert!(!store.add_or_update_app(AppEntry::new("b", "Bee", "https://github.com/o/b")).unwrap());

        assert!(store.update_app("a", Some("Alpha"), None).unwrap());
        assert!(!store.update_app("zzz", Some("nope"), None).unwrap());

        let a = store.find_app("a").unwrap();
        assert_eq!(a.name, "Alpha");
        assert_eq!(a.repository, "https://github.com/o/a");
        assert_eq!(store.find_app("b").unwrap().name, "Bee");

        assert!(store.remove_app("a").unwrap());
        assert!(!store.remove_app("a").unwrap());
        assert_eq!(store.app_ids(), HashSet::from(["b".to_string()]));
    }

    #[test]
    fn test_fnpacks_store_matches_key_and_repo() {
        let dir = tempfile::tempdir().unwrap();
        let store = FnpacksStore::new(dir.path().join("fnpacks.json"));
        let repo = "https://github.com/alice/FnDepot";

        assert!(store.add_fnpack(FnpackEntry::new("alice", repo)).unwrap());
        assert!(!store.add_fnpack(FnpackEntry::new("other", repo)).unwrap());
        assert!(!store.add_or_update_fnpack(FnpackEntry::new("alice2", repo)).unwrap());

        assert_eq!(store.find_by_repo(repo).unwrap().key, "alice2");
        assert!(store.find_by_key("alice").is_none());
        assert!(store.remove_fnpack("alice2").unwrap());
        assert!(store.get_fnpacks().is_empty());
    }

    #[test]
    fn test_details_upsert_replaces_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let store = AppDetailsStore::new(dir.path().join("data").join("app_details.json"));

        store.upsert_batch(vec![detail("a", "1.0"), detail("b", "1.0")]).unwrap();
        let count = store
            .upsert_batch(vec![detail("b", "2.0"), detail("c", "1.0"), detail("", "9")])
            .unwrap();
        assert_eq!(count, 2);

        let ids: Vec<_> = store.get_apps().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(store.find("b").unwrap().info.version, "2.0");
        assert!(store.load().last_updated.ends_with('Z'));
    }

    #[test]
    fn test_details_retain_ids_prunes_stale_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = AppDetailsStore::new(dir.path().join("app_details.json"));
        store
            .upsert_batch(vec![detail("a", "1"), detail("b", "1"), detail("c", "1")])
            .unwrap();

        let active = HashSet::from(["a".to_string(), "c".to_string()]);
        assert_eq!(store.retain_ids(&active).unwrap(), 1);
        assert_eq!(store.retain_ids(&active).unwrap(), 0);
        assert!(store.remove("a").unwrap());
        assert_eq!(store.get_apps().len(), 1);
    }

    #[test]
    fn test_upsert_keeps_records_with_null_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fnpack_details.json");
        std::fs::write(
            &path,
            serde_json::json!({
                "apps": [
                    {"id": "bob_tool", "repository": "https://github.com/bob/FnDepot"},
                    {"id": "carol_x", "author_url": null, "bug_report_url": null}
                ],
                "lastUpdated": "2024-01-01T00:00:00.000000Z"
            })
            .to_string(),
        )
        .unwrap();

        let store = FnpackDetailsStore::new(&path);
        let fresh: FnpackAppDetail =
            serde_json::from_value(serde_json::json!({"id": "alice_a"})).unwrap();
        assert_eq!(store.upsert_batch(vec![fresh]).unwrap(), 1);

        let ids: Vec<_> = store.get_apps().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["bob_tool", "carol_x", "alice_a"]);
    }

    #[test]
    fn test_invalid_file_is_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app_details.json");
        std::fs::write(&path, "{\"apps\": [ truncated").unwrap();

        let store = AppDetailsStore::new(&path);
        assert!(matches!(
            store.upsert_batch(vec![detail("a", "1.0")]),
            Err(crate::error::Error::ParseError(_))
        ));
        assert!(store.retain_ids(&HashSet::new()).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"apps\": [ truncated");

        let apps_path = dir.path().join("apps.json");
        std::fs::write(&apps_path, "[oops").unwrap();
        let apps = AppsStore::new(&apps_path);
        assert!(apps.add_app(AppEntry::new("a", "A", "https://github.com/o/a")).is_err());
        assert!(apps.get_apps().is_empty());
    }
}
