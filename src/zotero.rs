//! Remote library access.
//!
//! [`RemoteLibrary`] is the seam between the fetch driver and the Zotero
//! Web API. [`ZoteroClient`] implements it over HTTP; tests substitute an
//! in-memory library.
//!
//! # Zotero Web API v3
//!
//! | Request | Purpose |
//! |---------|---------|
//! | `GET /{prefix}/items/top?since=V` | publications (top-level items) |
//! | `GET /{prefix}/items?itemType=annotation&since=V` | PDF annotations |
//!
//! Responses are JSON arrays of items, paginated with `start`/`limit` and a
//! `Total-Results` header. Every response carries the library version in
//! `Last-Modified-Version`.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::config::ZoteroConfig;

const API_VERSION: &str = "3";

/// A remote reference library that can list items changed since a version.
#[async_trait]
pub trait RemoteLibrary: Send + Sync {
    /// Identifier under which the fetched version is stored locally.
    fn library_id(&self) -> &str;

    /// Current version of the remote library.
    async fn last_modified_version(&self) -> Result<i64>;

    /// Top-level items modified after `since`.
    async fn top_items(&self, since: i64) -> Result<Vec<Value>>;

    /// Annotation items modified after `since`.
    async fn annotation_items(&self, since: i64) -> Result<Vec<Value>>;
}

/// HTTP client for one Zotero library.
pub struct ZoteroClient {
    client: reqwest::Client,
    config: ZoteroConfig,
    api_key: Option<String>,
}

impl ZoteroClient {
    pub fn new(config: &ZoteroConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("lidia-browser/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            api_key: config.resolve_api_key(),
            config: config.clone(),
        })
    }

    fn items_url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.library_prefix(),
            path
        )
    }

    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<reqwest::Response> {
        let mut req = self
            .client
            .get(url)
            .header("Zotero-API-Version", API_VERSION)
            .query(query);
        if let Some(ref key) = self.api_key {
            req = req.header("Zotero-API-Key", key);
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!(
                "Zotero API request failed (HTTP {}): {}",
                status,
                body.chars().take(500).collect::<String>()
            );
        }
        Ok(resp)
    }

    /// Follow `start`/`limit` pagination until `Total-Results` is reached.
    async fn everything(&self, path: &str, extra: &[(&str, String)]) -> Result<Vec<Value>> {
        let url = self.items_url(path);
        let limit = self.config.page_size;
        let mut items = Vec::new();
        let mut start = 0usize;

        loop {
            let mut query: Vec<(&str, String)> = vec![
                ("format", "json".to_string()),
                ("start", start.to_string()),
                ("limit", limit.to_string()),
            ];
            query.extend(extra.iter().cloned());

            let resp = self.get(&url, &query).await?;
            let total = header_i64(&resp, "Total-Results");
            let page: Vec<Value> = resp
                .json()
                .await
                .context("Failed to decode Zotero items response")?;

            let fetched = page.len();
            items.extend(page);
            start += fetched;

            let done = match total {
                Some(t) => start as i64 >= t,
                None => fetched < limit as usize,
            };
            if done || fetched == 0 {
                break;
            }
        }

        tracing::debug!(path, count = items.len(), "fetched items");
        Ok(items)
    }
}

#[async_trait]
impl RemoteLibrary for ZoteroClient {
    fn library_id(&self) -> &str {
        &self.config.library_id
    }

    async fn last_modified_version(&self) -> Result<i64> {
        let resp = self
            .get(&self.items_url("items"), &[("limit", "1".to_string())])
            .await?;
        header_i64(&resp, "Last-Modified-Version")
            .context("Zotero response has no Last-Modified-Version header")
    }

    async fn top_items(&self, since: i64) -> Result<Vec<Value>> {
        self.everything("items/top", &[("since", since.to_string())])
            .await
    }

    async fn annotation_items(&self, since: i64) -> Result<Vec<Value>> {
        self.everything(
            "items",
            &[
                ("itemType", "annotation".to_string()),
                ("since", since.to_string()),
            ],
        )
        .await
    }
}

fn header_i64(resp: &reqwest::Response, name: &str) -> Option<i64> {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}
