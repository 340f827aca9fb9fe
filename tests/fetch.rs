//! Fetch-stage tests against an in-memory remote library.

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use lidia_browser::config::Config;
use lidia_browser::db;
use lidia_browser::ingest::populate;
use lidia_browser::migrate;
use lidia_browser::raw::{self, RawKind};
use lidia_browser::sync::fetch;
use lidia_browser::zotero::RemoteLibrary;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Items are tagged with the version they were last modified in.
struct MemoryLibrary {
    version: Mutex<i64>,
    top: Mutex<Vec<(i64, Value)>>,
    annotations: Mutex<Vec<(i64, Value)>>,
    requested_since: Mutex<Vec<i64>>,
}

impl MemoryLibrary {
    fn new() -> Self {
        Self {
            version: Mutex::new(0),
            top: Mutex::new(Vec::new()),
            annotations: Mutex::new(Vec::new()),
            requested_since: Mutex::new(Vec::new()),
        }
    }

    fn commit(&self, top: Vec<Value>, annotations: Vec<Value>) {
        let mut version = self.version.lock().unwrap();
        *version += 1;
        let v = *version;
        let mut stored_top = self.top.lock().unwrap();
        for item in top {
            stored_top.retain(|(_, existing)| existing["key"] != item["key"]);
            stored_top.push((v, item));
        }
        let mut stored_annotations = self.annotations.lock().unwrap();
        for item in annotations {
            stored_annotations.retain(|(_, existing)| existing["key"] != item["key"]);
            stored_annotations.push((v, item));
        }
    }

    fn since(items: &Mutex<Vec<(i64, Value)>>, since: i64) -> Vec<Value> {
        items
            .lock()
            .unwrap()
            .iter()
            .filter(|(v, _)| *v > since)
            .map(|(_, item)| item.clone())
            .collect()
    }
}

#[async_trait]
impl RemoteLibrary for MemoryLibrary {
    fn library_id(&self) -> &str {
        "groups/2829873"
    }

    async fn last_modified_version(&self) -> Result<i64> {
        Ok(*self.version.lock().unwrap())
    }

    async fn top_items(&self, since: i64) -> Result<Vec<Value>> {
        self.requested_since.lock().unwrap().push(since);
        Ok(Self::since(&self.top, since))
    }

    async fn annotation_items(&self, since: i64) -> Result<Vec<Value>> {
        Ok(Self::since(&self.annotations, since))
    }
}

async fn setup() -> (TempDir, SqlitePool) {
    let tmp = TempDir::new().unwrap();
    let config = Config::with_db_path(tmp.path().join("lidia.sqlite"));
    let pool = db::connect(&config).await.unwrap();
    migrate::apply_schema(&pool).await.unwrap();
    (tmp, pool)
}

fn publication(key: &str, attachment_id: &str) -> Value {
    json!({
        "key": key,
        "data": { "key": key, "title": format!("Title {}", key) },
        "links": { "attachment": { "href": format!("https://api.zotero.org/groups/2829873/items/{}", attachment_id) } }
    })
}

fn annotation(key: &str, parent: &str, comment: &str) -> Value {
    json!({
        "key": key,
        "data": {
            "key": key,
            "parentItem": parent,
            "annotationText": "highlighted",
            "annotationComment": comment,
            "annotationSortIndex": "00002|000001|00001"
        }
    })
}

#[tokio::test]
async fn test_first_fetch_downloads_everything() {
    let (_tmp, pool) = setup().await;
    let library = MemoryLibrary::new();
    library.commit(
        vec![publication("PUB00001", "ATT00001")],
        vec![annotation("ANN00001", "ATT00001", "~~~~LIDIA~~~~\nargname: One\n")],
    );

    let report = fetch(&pool, &library, false).await.unwrap();

    assert_eq!(report.local_version, -1);
    assert_eq!(report.remote_version, 1);
    assert!(!report.up_to_date);
    assert_eq!(report.publications_created, 1);
    assert_eq!(report.annotations_created, 1);
    assert_eq!(*library.requested_since.lock().unwrap(), vec![0]);
    assert_eq!(
        raw::get_library_version(&pool, "groups/2829873").await.unwrap(),
        1
    );
}

#[tokio::test]
async fn test_fetch_skips_when_up_to_date() {
    let (_tmp, pool) = setup().await;
    let library = MemoryLibrary::new();
    library.commit(vec![publication("PUB00001", "ATT00001")], vec![]);
    fetch(&pool, &library, false).await.unwrap();

    let report = fetch(&pool, &library, false).await.unwrap();

    assert!(report.up_to_date);
    assert_eq!(report.publications_created + report.publications_updated, 0);
    // the second call never asked for items
    assert_eq!(library.requested_since.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_incremental_fetch_only_requests_changes() {
    let (_tmp, pool) = setup().await;
    let library = MemoryLibrary::new();
    library.commit(
        vec![publication("PUB00001", "ATT00001")],
        vec![annotation("ANN00001", "ATT00001", "~~~~LIDIA~~~~\nargname: One\n")],
    );
    fetch(&pool, &library, false).await.unwrap();

    library.commit(
        vec![],
        vec![
            annotation("ANN00001", "ATT00001", "~~~~LIDIA~~~~\nargname: One, edited\n"),
            annotation("ANN00002", "ATT00001", "~~~~LIDIA~~~~\nargname: Two\n"),
        ],
    );
    let report = fetch(&pool, &library, false).await.unwrap();

    assert_eq!(report.local_version, 1);
    assert_eq!(report.remote_version, 2);
    assert_eq!(report.publications_created + report.publications_updated, 0);
    assert_eq!(report.annotations_created, 1);
    assert_eq!(report.annotations_updated, 1);
    assert_eq!(*library.requested_since.lock().unwrap(), vec![0, 1]);
    assert_eq!(raw::count_items(&pool, RawKind::Annotation).await.unwrap(), 2);

    let ingest = populate(&pool).await.unwrap();
    assert_eq!(ingest.annotations_created, 2);
    let argname: String = sqlx::query_scalar(
        "SELECT a.argname FROM annotations a JOIN base_annotations b ON b.id = a.base_id WHERE b.lidia_id = 'ANN00001'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(argname, "One, edited");
}

#[tokio::test]
async fn test_full_fetch_ignores_stored_version() {
    let (_tmp, pool) = setup().await;
    let library = MemoryLibrary::new();
    library.commit(vec![publication("PUB00001", "ATT00001")], vec![]);
    fetch(&pool, &library, false).await.unwrap();

    let report = fetch(&pool, &library, true).await.unwrap();

    assert!(!report.up_to_date);
    assert_eq!(report.publications_updated, 1);
    assert_eq!(*library.requested_since.lock().unwrap(), vec![0, 0]);
}
