//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for the IPFS API and ipfs-tika, and
//! run the full worker setup against a SQLite index in a temporary directory.

use dweb_crawler::config::{parse_config, Config};
use dweb_crawler::index::SqliteDatabase;
use dweb_crawler::service::Service;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a configuration pointing at the mock servers
fn create_test_config(ipfs_url: &str, tika_url: &str, db_path: &Path) -> Config {
    let toml = format!(
        r#"
[ipfs]
api-url = "{ipfs}"
gateway-url = "http://localhost:8080"

[tika]
url = "{tika}"

[index]
database-path = "{db}"

[workers]
file-workers = 2
directory-workers = 1
hash-workers = 2
requeue-on-error = false
"#,
        ipfs = ipfs_url,
        tika = tika_url,
        db = db_path.display()
    );

    parse_config(&toml).expect("Failed to parse test config")
}

fn link(name: &str, hash: &str, unixfs_type: i32) -> String {
    json!({
        "Objects": [{
            "Hash": "QmRoot",
            "Links": [{"Name": name, "Hash": hash, "Size": 0, "Type": unixfs_type, "Target": ""}]
        }]
    })
    .to_string()
}

async fn mock_stat(server: &MockServer, id: &str, body: Value) {
    Mock::given(method("POST"))
        .and(path("/api/v0/files/stat"))
        .and(query_param("arg", format!("/ipfs/{}", id).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mock_ls(server: &MockServer, id: &str, body: String) {
    Mock::given(method("POST"))
        .and(path("/api/v0/ls"))
        .and(query_param("arg", format!("/ipfs/{}", id).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// A root directory holding a file, a raw block, a subdirectory and a symlink
async fn mock_tree(ipfs: &MockServer) {
    mock_stat(
        ipfs,
        "QmRoot",
        json!({"Hash": "QmRoot", "Size": 0, "CumulativeSize": 4096, "Type": "directory"}),
    )
    .await;
    mock_stat(
        ipfs,
        "QmRaw",
        json!({"Hash": "QmRaw", "Size": 10, "CumulativeSize": 21, "Type": "file"}),
    )
    .await;

    let listing = [
        link("a.txt", "QmA", 2),
        link("raw", "QmRaw", 0),
        link("sub", "QmSub", 1),
        link("link", "QmLink", 4),
    ]
    .join("\n");
    mock_ls(ipfs, "QmRoot", listing).await;
    mock_ls(ipfs, "QmSub", String::new()).await;
}

async fn run_until_idle(config: &Config, seeds: &[&str]) -> SqliteDatabase {
    let service = Service::from_config(config).expect("Failed to build service");
    let database = service.database().clone();

    let seeds: Vec<String> = seeds.iter().map(|s| s.to_string()).collect();
    service.seed(&seeds).await.expect("Failed to seed");

    tokio::time::timeout(
        Duration::from_secs(10),
        service.run(CancellationToken::new(), true),
    )
    .await
    .expect("Crawl did not go idle")
    .expect("Crawl failed");

    database
}

#[tokio::test]
async fn test_full_crawl_of_directory_tree() {
    let ipfs = MockServer::start().await;
    let tika = MockServer::start().await;
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("index.db");

    mock_tree(&ipfs).await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": "testContent",
            "ipfs_tika_version": "0.1",
            "metadata": {"Content-Type": ["text/plain"]}
        })))
        .expect(2)
        .mount(&tika)
        .await;

    let config = create_test_config(&ipfs.uri(), &tika.uri(), &db_path);
    let database = run_until_idle(&config, &["QmRoot"]).await;

    let files = database.index("ipfs_files");
    let directories = database.index("ipfs_directories");
    let invalids = database.index("ipfs_invalids");

    let root = directories.get_document("QmRoot").unwrap().unwrap();
    assert_eq!(root["links"].as_array().unwrap().len(), 4);
    assert_eq!(root["size"], 4096);
    assert!(root["references"].as_array().unwrap().is_empty());

    let sub = directories.get_document("QmSub").unwrap().unwrap();
    assert!(sub["links"].as_array().unwrap().is_empty());

    let a = files.get_document("QmA").unwrap().unwrap();
    assert_eq!(a["content"], "testContent");
    assert_eq!(
        a["references"],
        json!([{"parent_hash": "QmRoot", "name": "a.txt"}])
    );

    let raw = files.get_document("QmRaw").unwrap().unwrap();
    assert_eq!(raw["size"], 10);

    let symlink = invalids.get_document("QmLink").unwrap().unwrap();
    assert_eq!(symlink["error"], "unsupported type");

    assert_eq!(files.count().unwrap(), 2);
    assert_eq!(directories.count().unwrap(), 2);
    assert_eq!(invalids.count().unwrap(), 1);
}

#[tokio::test]
async fn test_recrawl_does_not_rewrite_documents() {
    let ipfs = MockServer::start().await;
    let tika = MockServer::start().await;
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("index.db");

    mock_tree(&ipfs).await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": "testContent"
        })))
        .mount(&tika)
        .await;

    let config = create_test_config(&ipfs.uri(), &tika.uri(), &db_path);

    let first = run_until_idle(&config, &["QmRoot"]).await;
    let before = first.counts().unwrap();
    let root_before = first
        .index("ipfs_directories")
        .get_document("QmRoot")
        .unwrap();
    drop(first);

    let ls_calls = ipfs
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/api/v0/ls")
        .count();

    let second = run_until_idle(&config, &["QmRoot"]).await;

    assert_eq!(second.counts().unwrap(), before);
    assert_eq!(
        second
            .index("ipfs_directories")
            .get_document("QmRoot")
            .unwrap(),
        root_before
    );

    // The root was already indexed, so it is not listed again
    let ls_calls_after = ipfs
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/api/v0/ls")
        .count();
    assert_eq!(ls_calls_after, ls_calls);
}

#[tokio::test]
async fn test_corrupt_seed_is_indexed_as_invalid() {
    let ipfs = MockServer::start().await;
    let tika = MockServer::start().await;
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("index.db");

    Mock::given(method("POST"))
        .and(path("/api/v0/files/stat"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "Message": "unexpected EOF",
            "Code": 0,
            "Type": "error"
        })))
        .mount(&ipfs)
        .await;

    let config = create_test_config(&ipfs.uri(), &tika.uri(), &db_path);
    let database = run_until_idle(&config, &["QmBroken"]).await;

    let invalid = database
        .index("ipfs_invalids")
        .get_document("QmBroken")
        .unwrap()
        .unwrap();
    assert_eq!(invalid["error"], "unexpected EOF");
    assert_eq!(database.counts().unwrap(), vec![("ipfs_invalids".to_string(), 1)]);
}
