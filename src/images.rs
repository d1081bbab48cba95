//! Migrates Alchemy pictures into Contentful assets, at most once each.

use anyhow::{anyhow, Result};
use tracing::{error, info};

use crate::asset_id::derive_asset_id;
use crate::asset_index::AssetIndex;
use crate::contentful::{ContentPlatform, NewAsset, PlatformError};
use crate::store::{ContentStore, PictureRow};

/// Contentful rejects asset titles longer than this.
const MAX_TITLE_LEN: usize = 255;

/// Terminal state of one picture migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    /// The derived asset id was already in the index; nothing written.
    AlreadyExists { uid: String, asset_id: String },
    /// Created, processed and published in this run.
    Published { uid: String, asset_id: String },
    /// A remote write failed; the batch continues with the next row.
    Failed { uid: String, detail: String },
}

/// Summary of a full image migration run.
#[derive(Debug, Default)]
pub struct ImageReport {
    pub published: usize,
    pub existing: usize,
    pub failed: usize,
    pub outcomes: Vec<ImageOutcome>,
}

/// Migrates one picture.
///
/// Never returns an error: anything that goes wrong past the index
/// check is captured as a `Failed` outcome so sibling pictures still
/// run. The index is a pre-run snapshot; assets created during the
/// run are not reflected back into it.
pub async fn migrate_image<P>(
    platform: &P,
    index: &AssetIndex,
    image_server: &str,
    picture: &PictureRow,
) -> ImageOutcome
where
    P: ContentPlatform + ?Sized,
{
    let asset_id = derive_asset_id(&picture.uid);

    if index.contains(&asset_id) {
        info!(uid = %picture.uid, asset_id = %asset_id, "asset already exists, skipping");
        return ImageOutcome::AlreadyExists {
            uid: picture.uid.clone(),
            asset_id,
        };
    }

    match upload_picture(platform, image_server, &asset_id, picture).await {
        Ok(()) => {
            info!(uid = %picture.uid, asset_id = %asset_id, "new asset published");
            ImageOutcome::Published {
                uid: picture.uid.clone(),
                asset_id,
            }
        }
        Err(e) => {
            error!(uid = %picture.uid, error = %e, "asset migration failed");
            ImageOutcome::Failed {
                uid: picture.uid.clone(),
                detail: e.to_string(),
            }
        }
    }
}

async fn upload_picture<P>(
    platform: &P,
    image_server: &str,
    asset_id: &str,
    picture: &PictureRow,
) -> Result<(), PlatformError>
where
    P: ContentPlatform + ?Sized,
{
    // Assets cannot be published without a title; fall back to the
    // file name.
    let title = match picture.title.as_deref() {
        Some(t) if !t.is_empty() => t,
        _ => picture.file_name.as_str(),
    };

    let fields = NewAsset {
        title: truncate(title, MAX_TITLE_LEN).to_string(),
        content_type: picture.format.as_deref().map(|f| format!("image/{f}")),
        file_name: picture.file_name.clone(),
        upload_url: format!("{image_server}{}", urlencoding::encode(&picture.uid)),
    };

    let created = platform.create_asset_with_id(asset_id, fields).await?;
    let processed = platform.process_asset_for_all_locales(&created).await?;
    platform.publish_asset(&processed).await?;
    Ok(())
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Migrates every candidate picture, strictly sequentially.
pub async fn migrate_images<S, P>(
    store: &S,
    platform: &P,
    index: &AssetIndex,
    image_server: &str,
) -> Result<ImageReport>
where
    S: ContentStore + ?Sized,
    P: ContentPlatform + ?Sized,
{
    let pictures = store
        .pictures()
        .await
        .map_err(|e| anyhow!("picture query failed: {e}"))?;
    info!(pictures = pictures.len(), "starting image migration");

    let mut report = ImageReport::default();
    for picture in &pictures {
        let outcome = migrate_image(platform, index, image_server, picture).await;
        match &outcome {
            ImageOutcome::Published { .. } => report.published += 1,
            ImageOutcome::AlreadyExists { .. } => report.existing += 1,
            ImageOutcome::Failed { .. } => report.failed += 1,
        }
        report.outcomes.push(outcome);
    }
    Ok(report)
}
