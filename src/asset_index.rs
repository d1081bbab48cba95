//! Index of the asset ids already present on Contentful.
//!
//! Listing every remote asset is expensive and rate-limited, so the
//! index can be persisted to a local JSON artifact and reused by later
//! runs; `assets cache` forces a fresh remote enumeration when the
//! artifact is known stale.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tracing::{info, warn};

use crate::contentful::ContentPlatform;

/// Page size for the remote asset listing.
const PAGE_SIZE: usize = 100;

/// The set of asset ids known to exist remotely.
///
/// Constructed once per run by the driver and passed by reference. It
/// is never updated mid-run: assets created during a run only become
/// visible to the next run's index.
#[derive(Debug, Default)]
pub struct AssetIndex {
    ids: HashSet<String>,
}

impl AssetIndex {
    /// Builds an index from already known ids.
    pub fn from_ids<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        AssetIndex {
            ids: ids.into_iter().collect(),
        }
    }

    /// Loads the index from the local cache artifact when present and
    /// well-formed, falling back to a full remote refresh.
    pub async fn load<P>(platform: &P, cache_path: &Path) -> Result<Self>
    where
        P: ContentPlatform + ?Sized,
    {
        if let Some(index) = Self::from_cache(cache_path) {
            info!(
                path = %cache_path.display(),
                ids = index.len(),
                "asset index loaded from cache"
            );
            return Ok(index);
        }
        let index = Self::refresh_from_remote(platform).await?;
        info!(ids = index.len(), "asset index loaded from Contentful");
        Ok(index)
    }

    fn from_cache(cache_path: &Path) -> Option<Self> {
        let contents = std::fs::read_to_string(cache_path).ok()?;
        match serde_json::from_str::<Vec<String>>(&contents) {
            Ok(ids) => Some(Self::from_ids(ids)),
            Err(e) => {
                warn!(
                    error = %e,
                    path = %cache_path.display(),
                    "asset id cache is malformed, refreshing from remote"
                );
                None
            }
        }
    }

    /// Pages through the full remote asset listing. There is no total
    /// count to rely on: the enumeration terminates solely when a page
    /// comes back empty. A failed page fails the whole refresh.
    pub async fn refresh_from_remote<P>(platform: &P) -> Result<Self>
    where
        P: ContentPlatform + ?Sized,
    {
        let mut ids = HashSet::new();
        let mut skip = 0;
        loop {
            let page = platform
                .list_asset_ids(PAGE_SIZE, skip)
                .await
                .map_err(|e| anyhow!("asset listing failed at skip {skip}: {e}"))?;
            if page.is_empty() {
                break;
            }
            ids.extend(page);
            skip += PAGE_SIZE;
        }
        Ok(AssetIndex { ids })
    }

    /// Writes the index to the cache artifact, replacing any previous
    /// contents.
    pub fn persist(&self, cache_path: &Path) -> Result<()> {
        if let Some(parent) = cache_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating cache directory {}", parent.display()))?;
        }
        let json = serde_json::to_string(&self.sorted_ids())?;
        std::fs::write(cache_path, json)
            .with_context(|| format!("writing asset id cache {}", cache_path.display()))?;
        info!(
            path = %cache_path.display(),
            ids = self.ids.len(),
            "asset id cache written"
        );
        Ok(())
    }

    pub fn contains(&self, asset_id: &str) -> bool {
        self.ids.contains(asset_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Ids in sorted order, for stable output.
    pub fn sorted_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.ids.iter().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contentful::MockContentPlatform;
    use tempfile::tempdir;

    fn page_of(skip: usize, count: usize) -> Vec<String> {
        (0..count).map(|i| format!("id{}", skip + i)).collect()
    }

    #[tokio::test]
    async fn refresh_terminates_on_empty_page_and_accumulates_all_ids() {
        let mut platform = MockContentPlatform::new();
        platform
            .expect_list_asset_ids()
            .times(4)
            .returning(|limit, skip| {
                assert_eq!(limit, 100);
                Ok(match skip {
                    0 | 100 => page_of(skip, 100),
                    200 => page_of(skip, 37),
                    _ => Vec::new(),
                })
            });

        let index = AssetIndex::refresh_from_remote(&platform).await.unwrap();
        assert_eq!(index.len(), 237);
        assert!(index.contains("id0"));
        assert!(index.contains("id236"));
    }

    #[tokio::test]
    async fn refresh_propagates_listing_failure() {
        let mut platform = MockContentPlatform::new();
        platform
            .expect_list_asset_ids()
            .returning(|_, _| Err("rate limited".into()));

        let err = AssetIndex::refresh_from_remote(&platform).await.unwrap_err();
        assert!(err.to_string().contains("rate limited"));
    }

    #[tokio::test]
    async fn cache_round_trip_without_remote_calls() {
        let dir = tempdir().unwrap();
        let cache_path = dir.path().join("asset_ids.json");

        let index = AssetIndex::from_ids(["b".to_string(), "a".to_string(), "c".to_string()]);
        index.persist(&cache_path).unwrap();

        // Any remote call would panic: the mock has no expectations.
        let platform = MockContentPlatform::new();
        let loaded = AssetIndex::load(&platform, &cache_path).await.unwrap();
        assert_eq!(loaded.sorted_ids(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn malformed_cache_falls_back_to_remote_refresh() {
        let dir = tempdir().unwrap();
        let cache_path = dir.path().join("asset_ids.json");
        std::fs::write(&cache_path, "{not json").unwrap();

        let mut platform = MockContentPlatform::new();
        platform.expect_list_asset_ids().returning(|_, skip| {
            Ok(if skip == 0 {
                vec!["remote-id".to_string()]
            } else {
                Vec::new()
            })
        });

        let index = AssetIndex::load(&platform, &cache_path).await.unwrap();
        assert!(index.contains("remote-id"));
    }

    #[tokio::test]
    async fn missing_cache_is_not_an_error() {
        let dir = tempdir().unwrap();
        let cache_path = dir.path().join("never-written.json");

        let mut platform = MockContentPlatform::new();
        platform
            .expect_list_asset_ids()
            .returning(|_, _| Ok(Vec::new()));

        let index = AssetIndex::load(&platform, &cache_path).await.unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn persist_overwrites_previous_contents() {
        let dir = tempdir().unwrap();
        let cache_path = dir.path().join("asset_ids.json");

        AssetIndex::from_ids(["old".to_string()])
            .persist(&cache_path)
            .unwrap();
        AssetIndex::from_ids(["new".to_string()])
            .persist(&cache_path)
            .unwrap();

        let contents = std::fs::read_to_string(&cache_path).unwrap();
        assert_eq!(contents, r#"["new"]"#);
    }
}
