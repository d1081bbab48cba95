//! Contentful boundary: the [`ContentPlatform`] trait the migration
//! core consumes, and the reqwest-backed [`ContentfulClient`].
//!
//! Listing goes through the Preview API, where unpublished assets
//! already count as existing; all writes go through the Management
//! API with `X-Contentful-Version` optimistic locking.

use async_trait::async_trait;
use mockall::automock;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::Config;
use crate::locale::DEFAULT_REMOTE_LOCALE;

/// Boxed error for platform implementations.
pub type PlatformError = Box<dyn std::error::Error + Send + Sync>;

/// Fields for a new asset; wrapped into the default locale on upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAsset {
    pub title: String,
    /// `None` when the source row has no file format.
    pub content_type: Option<String>,
    pub file_name: String,
    /// Where Contentful fetches the binary from.
    pub upload_url: String,
}

/// Handle to a remote asset, carrying the version Contentful requires
/// on every mutating call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAsset {
    pub id: String,
    pub version: i64,
}

/// A pre-existing structured entry; fields keyed by name, then locale.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteEntry {
    pub id: String,
    pub version: i64,
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// Operations the migration performs against the content platform.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ContentPlatform: Send + Sync {
    /// One page of asset ids: `limit` items starting at `skip`.
    async fn list_asset_ids(&self, limit: usize, skip: usize)
        -> Result<Vec<String>, PlatformError>;

    /// File URL of an existing asset (protocol-relative).
    async fn get_asset_url(&self, asset_id: &str) -> Result<String, PlatformError>;

    /// Creates an asset under a client-chosen id.
    async fn create_asset_with_id(
        &self,
        asset_id: &str,
        fields: NewAsset,
    ) -> Result<RemoteAsset, PlatformError>;

    /// Triggers file processing for every locale of the asset and
    /// waits for it to complete.
    async fn process_asset_for_all_locales(
        &self,
        asset: &RemoteAsset,
    ) -> Result<RemoteAsset, PlatformError>;

    /// Publishes a processed asset.
    async fn publish_asset(&self, asset: &RemoteAsset) -> Result<(), PlatformError>;

    /// Finds the single entry of `content_type` whose identifier field
    /// matches exactly, or `None`.
    async fn find_entry(
        &self,
        content_type: &str,
        locale: &str,
        identifier: &str,
    ) -> Result<Option<RemoteEntry>, PlatformError>;

    /// Writes back the entry fields, returning the bumped version.
    async fn update_entry(&self, entry: &RemoteEntry) -> Result<RemoteEntry, PlatformError>;

    /// Publishes an updated entry.
    async fn publish_entry(&self, entry: &RemoteEntry) -> Result<(), PlatformError>;
}

const PROCESS_POLL_ATTEMPTS: u32 = 20;
const PROCESS_POLL_DELAY: Duration = Duration::from_millis(500);

/// Contentful client over the Preview and Management APIs.
pub struct ContentfulClient {
    http: reqwest::Client,
    management_base: String,
    preview_base: String,
    cma_token: String,
    preview_token: String,
}

impl ContentfulClient {
    pub fn new(config: &Config) -> Self {
        let scope = format!(
            "spaces/{}/environments/{}",
            config.space_id, config.environment_id
        );
        ContentfulClient {
            http: reqwest::Client::new(),
            management_base: format!("https://api.contentful.com/{scope}"),
            preview_base: format!("https://preview.contentful.com/{scope}"),
            cma_token: config.cma_token.clone(),
            preview_token: config.preview_token.clone(),
        }
    }

    async fn get_management_json(&self, url: &str) -> Result<serde_json::Value, PlatformError> {
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.cma_token)
            .send()
            .await?;
        let resp = error_for_status("management fetch", resp).await?;
        Ok(resp.json().await?)
    }
}

async fn error_for_status(
    op: &str,
    resp: reqwest::Response,
) -> Result<reqwest::Response, PlatformError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(format!("{op} failed ({status}): {body}").into())
}

fn sys_version(value: &serde_json::Value, what: &str) -> Result<i64, PlatformError> {
    value
        .pointer("/sys/version")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| format!("{what} response has no sys.version").into())
}

#[async_trait]
impl ContentPlatform for ContentfulClient {
    async fn list_asset_ids(
        &self,
        limit: usize,
        skip: usize,
    ) -> Result<Vec<String>, PlatformError> {
        let url = format!("{}/assets?limit={limit}&skip={skip}", self.preview_base);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.preview_token)
            .send()
            .await?;
        let resp = error_for_status("asset listing", resp).await?;
        let page: serde_json::Value = resp.json().await?;

        let ids = page
            .get("items")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.pointer("/sys/id").and_then(|v| v.as_str()))
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        debug!(skip, count = ids.len(), "fetched asset id page");
        Ok(ids)
    }

    async fn get_asset_url(&self, asset_id: &str) -> Result<String, PlatformError> {
        let url = format!("{}/assets/{asset_id}", self.management_base);
        let asset = self.get_management_json(&url).await?;
        match asset
            .pointer(&format!("/fields/file/{DEFAULT_REMOTE_LOCALE}/url"))
            .and_then(|v| v.as_str())
        {
            Some(file_url) => Ok(file_url.to_string()),
            None => Err(format!("asset {asset_id} has no {DEFAULT_REMOTE_LOCALE} file url").into()),
        }
    }

    async fn create_asset_with_id(
        &self,
        asset_id: &str,
        fields: NewAsset,
    ) -> Result<RemoteAsset, PlatformError> {
        let url = format!("{}/assets/{asset_id}", self.management_base);
        let body = json!({
            "fields": {
                "title": { DEFAULT_REMOTE_LOCALE: fields.title },
                "file": {
                    DEFAULT_REMOTE_LOCALE: {
                        "contentType": fields.content_type,
                        "fileName": fields.file_name,
                        "upload": fields.upload_url,
                    }
                }
            }
        });

        let resp = self
            .http
            .put(&url)
            .bearer_auth(&self.cma_token)
            .json(&body)
            .send()
            .await?;
        let resp = error_for_status("asset creation", resp).await?;
        let created: serde_json::Value = resp.json().await?;
        info!(asset_id, "asset created");
        Ok(RemoteAsset {
            id: asset_id.to_string(),
            version: sys_version(&created, "asset creation")?,
        })
    }

    async fn process_asset_for_all_locales(
        &self,
        asset: &RemoteAsset,
    ) -> Result<RemoteAsset, PlatformError> {
        let asset_url = format!("{}/assets/{}", self.management_base, asset.id);
        let current = self.get_management_json(&asset_url).await?;
        let locales: Vec<String> = current
            .pointer("/fields/file")
            .and_then(|v| v.as_object())
            .map(|file| file.keys().cloned().collect())
            .unwrap_or_default();

        for locale in &locales {
            let url = format!("{asset_url}/files/{locale}/process");
            let resp = self
                .http
                .put(&url)
                .bearer_auth(&self.cma_token)
                .header("X-Contentful-Version", asset.version)
                .send()
                .await?;
            error_for_status("asset processing", resp).await?;
        }

        // Processing is asynchronous on the Contentful side: the file
        // url appears once the upload has been ingested.
        for _ in 0..PROCESS_POLL_ATTEMPTS {
            let current = self.get_management_json(&asset_url).await?;
            let done = locales.iter().all(|locale| {
                current
                    .pointer(&format!("/fields/file/{locale}/url"))
                    .and_then(|v| v.as_str())
                    .is_some()
            });
            if done {
                return Ok(RemoteAsset {
                    id: asset.id.clone(),
                    version: sys_version(&current, "asset processing")?,
                });
            }
            tokio::time::sleep(PROCESS_POLL_DELAY).await;
        }
        Err(format!("asset {} did not finish processing", asset.id).into())
    }

    async fn publish_asset(&self, asset: &RemoteAsset) -> Result<(), PlatformError> {
        let url = format!("{}/assets/{}/published", self.management_base, asset.id);
        let resp = self
            .http
            .put(&url)
            .bearer_auth(&self.cma_token)
            .header("X-Contentful-Version", asset.version)
            .send()
            .await?;
        error_for_status("asset publish", resp).await?;
        info!(asset_id = %asset.id, "asset published");
        Ok(())
    }

    async fn find_entry(
        &self,
        content_type: &str,
        locale: &str,
        identifier: &str,
    ) -> Result<Option<RemoteEntry>, PlatformError> {
        let url = format!("{}/entries", self.management_base);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.cma_token)
            .query(&[
                ("content_type", content_type),
                ("locale", locale),
                ("fields.identifier", identifier),
                ("limit", "1"),
            ])
            .send()
            .await?;
        let resp = error_for_status("entry lookup", resp).await?;
        let page: serde_json::Value = resp.json().await?;

        let Some(item) = page
            .get("items")
            .and_then(|v| v.as_array())
            .and_then(|items| items.first())
        else {
            return Ok(None);
        };

        let id = item
            .pointer("/sys/id")
            .and_then(|v| v.as_str())
            .ok_or("entry lookup response has no sys.id")?
            .to_string();
        let fields = item
            .get("fields")
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_default();
        Ok(Some(RemoteEntry {
            id,
            version: sys_version(item, "entry lookup")?,
            fields,
        }))
    }

    async fn update_entry(&self, entry: &RemoteEntry) -> Result<RemoteEntry, PlatformError> {
        let url = format!("{}/entries/{}", self.management_base, entry.id);
        let resp = self
            .http
            .put(&url)
            .bearer_auth(&self.cma_token)
            .header("X-Contentful-Version", entry.version)
            .json(&json!({ "fields": entry.fields }))
            .send()
            .await?;
        let resp = error_for_status("entry update", resp).await?;
        let updated: serde_json::Value = resp.json().await?;
        Ok(RemoteEntry {
            id: entry.id.clone(),
            version: sys_version(&updated, "entry update")?,
            fields: entry.fields.clone(),
        })
    }

    async fn publish_entry(&self, entry: &RemoteEntry) -> Result<(), PlatformError> {
        let url = format!("{}/entries/{}/published", self.management_base, entry.id);
        let resp = self
            .http
            .put(&url)
            .bearer_auth(&self.cma_token)
            .header("X-Contentful-Version", entry.version)
            .send()
            .await?;
        error_for_status("entry publish", resp).await?;
        info!(entry_id = %entry.id, "entry published");
        Ok(())
    }
}
