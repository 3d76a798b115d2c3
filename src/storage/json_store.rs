use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Reads a JSON file, falling back to `T::default()` when the file is
/// missing, blank or unparseable.
pub fn load_json<T: DeserializeOwned + Default>(path: &Path) -> T {
    match read_json(path) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Using empty contents for {}: {}", path.display(), e);
            T::default()
        }
    }
}

/// Reads a JSON file for a read-modify-write cycle.
///
/// A missing or blank file is `T::default()`. Unreadable or invalid files
/// are errors so the caller never saves over data it could not load.
pub fn read_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => return Err(e.into()),
    };

    if text.trim().is_empty() {
        return Ok(T::default());
    }

    serde_json::from_str(&text)
        .map_err(|e| Error::ParseError(format!("invalid JSON in {}: {}", path.display(), e)))
}

/// Pretty-prints `data` to `path` with two-space indentation.
///
/// Writes go to a sibling temp file first so readers never see a truncated file.
pub fn save_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let text = serde_json::to_string_pretty(data)?;
    let tmp = temp_path(path);
    fs::write(&tmp, text)?;
    fs::rename(&tmp, path)?;

    tracing::debug!("Saved {}", path.display());
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_missing_and_broken_files_yield_default() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert_eq!(load_json::<Value>(&missing), Value::Null);

        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{ not json").unwrap();
        assert_eq!(load_json::<Vec<String>>(&broken), Vec::<String>::new());

        let blank = dir.path().join("blank.json");
        fs::write(&blank, "  \n").unwrap();
        assert_eq!(load_json::<Vec<String>>(&blank), Vec::<String>::new());
    }

    #[test]
    fn test_read_json_reports_invalid_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert_eq!(read_json::<Vec<String>>(&missing).unwrap(), Vec::<String>::new());

        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{ not json").unwrap();
        assert!(matches!(
            read_json::<Vec<String>>(&broken),
            Err(Error::ParseError(_))
        ));
    }

    #[test]
    fn test_save_creates_parents_and_keeps_unicode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data.json");

        save_json(&path, &json!({"name": "网盘助手"})).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("网盘助手"));
        assert!(text.contains("\n  \"name\""));
        assert!(!temp_path(&path).exists());
    }
}
