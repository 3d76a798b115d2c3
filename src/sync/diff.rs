use std::collections::HashMap;

use crate::models::{AppEntry, FnpackEntry};

/// Entries added or changed in `head`, and entries of `base` missing from `head`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogDiff<T> {
    pub modified: Vec<T>,
    pub deleted: Vec<T>,
}

impl<T> CatalogDiff<T> {
    pub fn is_empty(&self) -> bool {
        self.modified.is_empty() && self.deleted.is_empty()
    }
}

pub fn find_modified_apps(head: &[AppEntry], base: &[AppEntry]) -> CatalogDiff<AppEntry> {
    diff_by(head, base, |a| a.id.as_str(), |h, b| {
        h.name != b.name || h.repository != b.repository
    })
}

pub fn find_modified_fnpacks(head: &[FnpackEntry], base: &[FnpackEntry]) -> CatalogDiff<FnpackEntry> {
    diff_by(head, base, |f| f.key.as_str(), |h, b| h.repo != b.repo)
}

fn diff_by<T, K, C>(head: &[T], base: &[T], key: K, changed: C) -> CatalogDiff<T>
where
    T: Clone,
    K: Fn(&T) -> &str,
    C: Fn(&T, &T) -> bool,
{
    let base_by_key: HashMap<&str, &T> = base.iter().map(|e| (key(e), e)).collect();
    let head_by_key: HashMap<&str, &T> = head.iter().map(|e| (key(e), e)).collect();

    let modified = head
        .iter()
        .filter(|h| match base_by_key.get(key(h)) {
            Some(b) => changed(h, b),
            None => true,
        })
        .cloned()
        .collect();

    let deleted = base
        .iter()
        .filter(|b| !head_by_key.contains_key(key(b)))
        .cloned()
        .collect();

    CatalogDiff { modified, deleted }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_modified_apps() {
        let base = vec![
            AppEntry::new("keep", "Keep", "https://github.com/o/keep"),
            AppEntry::new("rename", "Old", "https://github.com/o/rename"),
            AppEntry::new("gone", "Gone", "https://github.com/o/gone"),
        ];
        let head = vec![
            AppEntry::new("keep", "Keep", "https://github.com/o/keep"),
            AppEntry::new("rename", "New", "https://github.com/o/rename"),
            AppEntry::new("fresh", "Fresh", "https://github.com/o/fresh"),
        ];

        let diff = find_modified_apps(&head, &base);
        let modified: Vec<_> = diff.modified.iter().map(|a| a.id.as_str()).collect();
        let deleted: Vec<_> = diff.deleted.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(modified, vec!["rename", "fresh"]);
        assert_eq!(deleted, vec!["gone"]);
    }

    #[test]
    fn test_find_modified_fnpacks_compares_repo_only() {
        let base = vec![
            FnpackEntry::new("alice", "https://github.com/alice/FnDepot"),
            FnpackEntry::new("bob", "https://github.com/bob/FnDepot"),
        ];
        let head = vec![
            FnpackEntry::new("alice", "https://github.com/alice/Other"),
            FnpackEntry::new("bob", "https://github.com/bob/FnDepot"),
        ];

        let diff = find_modified_fnpacks(&head, &base);
        assert_eq!(diff.modified, vec![head[0].clone()]);
        assert!(diff.deleted.is_empty());
        assert!(find_modified_fnpacks(&base, &base).is_empty());
    }
}
