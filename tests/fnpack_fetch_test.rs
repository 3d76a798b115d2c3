mod common;

use std::collections::HashSet;
use std::sync::Arc;

use fnstore::models::{FnpackAppDetail, FnpackEntry, FnpacksFile};
use fnstore::storage::{save_json, FnpackDetailsStore};
use fnstore::{CatalogPaths, CatalogUpdater, Error, FnpackFetcher};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;

const REPO_URL: &str = "https://github.com/alice/FnDepot";
const STAMP: &str = "2024-04-01T10:00:00Z";

fn descriptor() -> String {
    json!({
        "demo-app": {
            "display_name": "Demo Player",
            "desc": "Plays things",
            "version": "0.3.1",
            "labels": "媒体,工具",
            "history": { "0.3.1": "first release" },
            "size": 1024
        },
        "other": {
            "display_name": "Other",
            "download_url": "https://dl.example/other.fpk",
            "author": "carol"
        }
    })
    .to_string()
}

async fn mock_depot(server: &mut ServerGuard) {
    server
        .mock("GET", "/repos/alice/FnDepot")
        .with_status(200)
        .with_body(common::repo_body("alice", "FnDepot", 12, 4))
        .create_async()
        .await;
    server
        .mock("GET", "/repos/alice/FnDepot/commits")
        .match_query(Matcher::UrlEncoded("path".into(), "fnpack.json".into()))
        .with_status(200)
        .with_body(common::commits_body(STAMP))
        .create_async()
        .await;
    server
        .mock("GET", "/repos/alice/FnDepot/contents/fnpack.json")
        .with_status(200)
        .with_body(common::file_body("fnpack.json", &descriptor()))
        .create_async()
        .await;
    server
        .mock("GET", "/repos/alice/FnDepot/contents/demo-app/ICON.PNG")
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;
    server
        .mock("GET", "/repos/alice/FnDepot/contents/demo-app/demo-app.fpk")
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let mut previews: Vec<_> = (1..=10)
        .map(|i| json!({ "name": format!("shot{}.PNG", i), "path": format!("demo-app/Preview/shot{}.PNG", i), "type": "file" }))
        .collect();
    previews.insert(0, json!({ "name": "notes.txt", "path": "demo-app/Preview/notes.txt", "type": "file" }));
    server
        .mock("GET", "/repos/alice/FnDepot/contents/demo-app/Preview")
        .with_status(200)
        .with_body(json!(previews).to_string())
        .create_async()
        .await;
}

#[tokio::test]
async fn test_fetch_expands_every_app() {
    let mut server = Server::new_async().await;
    mock_depot(&mut server).await;

    let fetcher = FnpackFetcher::new(Arc::new(common::client(&server)));
    let apps = fetcher.fetch(REPO_URL, None, &[]).await.expect("fetch");
    assert_eq!(apps.len(), 2);

    let demo = &apps[0];
    assert_eq!(demo.id, "alice_demo-app");
    assert_eq!(demo.name, "Demo Player");
    assert_eq!(demo.version, "0.3.1");
    assert_eq!(demo.category, "media");
    assert_eq!(demo.author, "alice");
    assert_eq!(demo.last_update.as_deref(), Some(STAMP));
    assert_eq!(
        demo.icon_url,
        "https://raw.githubusercontent.com/alice/FnDepot/main/demo-app/ICON.PNG"
    );
    assert_eq!(
        demo.download_url,
        "https://raw.githubusercontent.com/alice/FnDepot/main/demo-app/demo-app.fpk"
    );
    assert_eq!(demo.screenshots.len(), 9);
    assert!(demo.screenshots[0].ends_with("/demo-app/Preview/shot1.PNG"));
    assert_eq!(demo.size, json!(1024));
    assert_eq!(demo.history["0.3.1"], "first release");
    assert_eq!((demo.stars, demo.forks), (12, 4));

    let other = &apps[1];
    assert_eq!(other.id, "alice_other");
    assert_eq!(other.description, "暂无描述");
    assert_eq!(other.version, "1.0.0");
    assert_eq!(other.download_url, "https://dl.example/other.fpk");
    assert_eq!(other.author, "carol");
    assert!(other.icon_url.is_empty());
    assert!(other.screenshots.is_empty());
    assert_eq!(other.category, "uncategorized");
    assert_eq!(other.fnpack_repo_key, "alice");
}

#[tokio::test]
async fn test_fetch_single_key() {
    let mut server = Server::new_async().await;
    mock_depot(&mut server).await;

    let fetcher = FnpackFetcher::new(Arc::new(common::client(&server)));
    let apps = fetcher
        .fetch(REPO_URL, Some("other"), &[])
        .await
        .expect("fetch");
    assert_eq!(apps.len(), 1);
    assert_eq!(apps[0].fnpack_app_key, "other");

    let missing = fetcher.fetch(REPO_URL, Some("nope"), &[]).await;
    assert!(matches!(missing, Err(Error::FnpackKeyMissing { .. })));
}

#[tokio::test]
async fn test_unchanged_descriptor_reuses_stored_apps() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/repos/alice/FnDepot")
        .with_status(200)
        .with_body(common::repo_body("alice", "FnDepot", 30, 6))
        .create_async()
        .await;
    server
        .mock("GET", "/repos/alice/FnDepot/commits")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(common::commits_body(STAMP))
        .create_async()
        .await;
    let descriptor_mock = server
        .mock("GET", "/repos/alice/FnDepot/contents/fnpack.json")
        .expect(0)
        .create_async()
        .await;

    let stored: FnpackAppDetail = serde_json::from_value(json!({
        "id": "alice_demo-app",
        "name": "Demo Player",
        "repository": "https://github.com/Alice/FnDepot",
        "version": "0.3.0",
        "lastUpdate": STAMP,
        "fnpack_app_key": "demo-app",
        "fnpack_repo_key": "alice"
    }))
    .unwrap();

    let fetcher = FnpackFetcher::new(Arc::new(common::client(&server)));
    let apps = fetcher
        .fetch(REPO_URL, None, std::slice::from_ref(&stored))
        .await
        .expect("fetch");

    assert_eq!(apps.len(), 1);
    assert_eq!(apps[0].version, "0.3.0");
    assert_eq!((apps[0].stars, apps[0].forks), (30, 6));
    descriptor_mock.assert_async().await;
}

#[tokio::test]
async fn test_missing_descriptor_is_an_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/repos/bob/FnDepot")
        .with_status(200)
        .with_body(common::repo_body("bob", "FnDepot", 0, 0))
        .create_async()
        .await;
    server
        .mock("GET", "/repos/bob/FnDepot/commits")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;
    server
        .mock("GET", "/repos/bob/FnDepot/contents/fnpack.json")
        .with_status(404)
        .create_async()
        .await;

    let fetcher = FnpackFetcher::new(Arc::new(common::client(&server)));
    let result = fetcher
        .fetch("https://github.com/bob/FnDepot", None, &[])
        .await;
    assert!(matches!(result, Err(Error::FnpackMissing(_))));
}

#[tokio::test]
async fn test_descriptor_history_failure_uses_repository_stamp() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/repos/dave/FnDepot")
        .with_status(200)
        .with_body(common::repo_body("dave", "FnDepot", 1, 0))
        .create_async()
        .await;
    server
        .mock("GET", "/repos/dave/FnDepot/commits")
        .match_query(Matcher::Any)
        .with_status(409)
        .with_body(r#"{"message":"Git Repository is empty."}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/repos/dave/FnDepot/contents/fnpack.json")
        .with_status(200)
        .with_body(common::file_body(
            "fnpack.json",
            r#"{"tool": {"display_name": "Tool", "version": 1.2, "labels": ["工具"]}}"#,
        ))
        .create_async()
        .await;

    let fetcher = FnpackFetcher::new(Arc::new(common::client(&server)));
    let apps = fetcher
        .fetch("https://github.com/dave/FnDepot", None, &[])
        .await
        .expect("fetch");

    assert_eq!(apps.len(), 1);
    assert_eq!(apps[0].version, "1.2");
    assert_eq!(apps[0].category, "utility");
    assert_eq!(apps[0].last_update.as_deref(), Some("2023-12-31T00:00:00Z"));
}

#[tokio::test]
async fn test_batch_update_keeps_apps_of_failed_repositories() {
    let mut server = Server::new_async().await;
    mock_depot(&mut server).await;
    server
        .mock("GET", "/repos/bob/FnDepot")
        .with_status(404)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let paths = CatalogPaths::new(dir.path());
    save_json(
        &paths.fnpacks_json,
        &FnpacksFile {
            fnpacks: vec![
                FnpackEntry::new("alice", REPO_URL),
                FnpackEntry::new("bob", "https://github.com/bob/FnDepot"),
            ],
        },
    )
    .unwrap();

    let seed = |id: &str, repo: &str, key: &str| -> FnpackAppDetail {
        serde_json::from_value(json!({
            "id": id,
            "repository": repo,
            "lastUpdate": "2020-01-01T00:00:00Z",
            "fnpack_app_key": key
        }))
        .unwrap()
    };
    let details = FnpackDetailsStore::new(&paths.fnpack_details);
    details
        .upsert_batch(vec![
            seed("alice_gone", REPO_URL, "gone"),
            seed("bob_kept", "https://github.com/bob/FnDepot", "kept"),
            seed("carol_delisted", "https://github.com/carol/FnDepot", "delisted"),
        ])
        .unwrap();

    let updater = CatalogUpdater::new(common::client(&server), &paths, 2).with_progress(false);
    let report = updater.batch_update_fnpacks().await.expect("batch");

    assert_eq!(report.total, 2);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].id, "bob");
    assert_eq!(report.records_written, 2);
    assert_eq!(report.pruned, 2);

    let ids: HashSet<String> = details.get_apps().into_iter().map(|a| a.id).collect();
    let expected: HashSet<String> = ["alice_demo-app", "alice_other", "bob_kept"]
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(ids, expected);
}
