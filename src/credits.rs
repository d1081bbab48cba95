//! Assembles per-locale markdown credit documents and publishes them
//! onto their pre-existing Contentful exhibition entries.

use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Result};
use serde_json::json;
use tracing::{error, info};

use crate::asset_id::derive_asset_id;
use crate::asset_index::AssetIndex;
use crate::contentful::{ContentPlatform, PlatformError, RemoteEntry};
use crate::essence::{fetch_essence, EssenceKind, EssenceRef};
use crate::locale;
use crate::markdown;
use crate::store::{ContentStore, PageRow};

/// Content type of the entries the credits are written onto.
const ENTRY_CONTENT_TYPE: &str = "exhibitionPage";
/// Entry field receiving the per-locale markdown.
const CREDITS_FIELD: &str = "credits";

/// Terminal state of one credit document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreditOutcome {
    Published {
        document: String,
        locales: Vec<String>,
    },
    /// No remote entry matches the document key. The document is
    /// skipped, not failed: this migration only updates entries that
    /// already exist, it never creates them.
    SkippedNoEntry { document: String },
    /// The remote write failed; sibling documents still run.
    Failed { document: String, detail: String },
}

/// Summary of a full credit migration run.
#[derive(Debug, Default)]
pub struct CreditReport {
    pub published: usize,
    pub skipped: usize,
    pub failed: usize,
    pub outcomes: Vec<CreditOutcome>,
}

/// Groups page rows by document key, then by source language code.
///
/// The document key is the first segment of the hierarchical url name;
/// depth below the top level carries no meaning here. Essence order
/// within a row is preserved. A later row for the same key and locale
/// replaces the earlier one.
pub fn group_pages(rows: Vec<PageRow>) -> BTreeMap<String, BTreeMap<String, Vec<EssenceRef>>> {
    let mut grouped: BTreeMap<String, BTreeMap<String, Vec<EssenceRef>>> = BTreeMap::new();
    for row in rows {
        let document = row
            .urlname
            .split('/')
            .next()
            .unwrap_or_default()
            .to_string();
        grouped
            .entry(document)
            .or_default()
            .insert(row.language_code, row.essences);
    }
    grouped
}

/// Folds an ordered essence sequence into one markdown document.
///
/// Fragments resolve in their given order; empty ones are dropped.
/// Pictures that have not been migrated yet contribute nothing rather
/// than a broken reference.
pub async fn assemble<S, P>(
    store: &S,
    platform: &P,
    index: &AssetIndex,
    refs: &[EssenceRef],
) -> Result<String>
where
    S: ContentStore + ?Sized,
    P: ContentPlatform + ?Sized,
{
    let mut credits = String::new();
    for essence in refs {
        let Some(data) = fetch_essence(store, essence).await? else {
            continue;
        };
        match data.kind {
            EssenceKind::Text => {
                credits.push_str("## ");
                credits.push_str(&data.value);
                credits.push('\n');
            }
            EssenceKind::RichText => credits.push_str(&markdown::from_html(&data.value)),
            EssenceKind::Picture => {
                credits.push_str(&picture_embed(platform, index, &data.value).await?)
            }
            EssenceKind::Unknown(_) => unreachable!("unknown essence kinds fail at fetch"),
        }
    }
    Ok(credits)
}

/// Markdown image embed for an already migrated picture, or the empty
/// string when the picture is not in the asset index.
async fn picture_embed<P>(platform: &P, index: &AssetIndex, uid: &str) -> Result<String>
where
    P: ContentPlatform + ?Sized,
{
    let asset_id = derive_asset_id(uid);
    if !index.contains(&asset_id) {
        return Ok(String::new());
    }
    let url = platform
        .get_asset_url(&asset_id)
        .await
        .map_err(|e| anyhow!("asset lookup failed for {asset_id}: {e}"))?;
    Ok(markdown::image_embed(&url))
}

/// Builds and publishes the credit document for one exhibition.
///
/// Fatal conditions (store failures, unknown essence types, a source
/// locale with no Contentful mapping) propagate as errors; the remote
/// write failing is reported in the outcome instead so the rest of the
/// batch proceeds.
pub async fn publish_credits<S, P>(
    store: &S,
    platform: &P,
    index: &AssetIndex,
    document: &str,
    per_locale: &BTreeMap<String, Vec<EssenceRef>>,
) -> Result<CreditOutcome>
where
    S: ContentStore + ?Sized,
    P: ContentPlatform + ?Sized,
{
    info!(document = %document, "migrating credits");

    let entry = platform
        .find_entry(ENTRY_CONTENT_TYPE, locale::DEFAULT_REMOTE_LOCALE, document)
        .await
        .map_err(|e| anyhow!("entry lookup failed for {document}: {e}"))?;
    let Some(mut entry) = entry else {
        info!(document = %document, "no matching entry, skipping");
        return Ok(CreditOutcome::SkippedNoEntry {
            document: document.to_string(),
        });
    };

    let mut locales = Vec::with_capacity(per_locale.len());
    for (source_locale, refs) in per_locale {
        let Some(remote) = locale::remote_locale(source_locale) else {
            bail!("no Contentful locale mapped for source locale {source_locale} (document {document})");
        };
        info!(source = %source_locale, remote = %remote, "assembling locale");
        let credits = assemble(store, platform, index, refs).await?;
        set_credits(&mut entry, remote, credits);
        locales.push(remote.to_string());
    }

    match push_entry(platform, &entry).await {
        Ok(()) => Ok(CreditOutcome::Published {
            document: document.to_string(),
            locales,
        }),
        Err(e) => {
            error!(document = %document, error = %e, "entry publish failed");
            Ok(CreditOutcome::Failed {
                document: document.to_string(),
                detail: e.to_string(),
            })
        }
    }
}

/// Merges one locale's markdown into the entry's credits field,
/// leaving every other locale key in place.
fn set_credits(entry: &mut RemoteEntry, remote_locale: &str, credits: String) {
    let field = entry
        .fields
        .entry(CREDITS_FIELD.to_string())
        .or_insert_with(|| json!({}));
    if !field.is_object() {
        *field = json!({});
    }
    if let Some(map) = field.as_object_mut() {
        map.insert(
            remote_locale.to_string(),
            serde_json::Value::String(credits),
        );
    }
}

async fn push_entry<P>(platform: &P, entry: &RemoteEntry) -> Result<(), PlatformError>
where
    P: ContentPlatform + ?Sized,
{
    let updated = platform.update_entry(entry).await?;
    platform.publish_entry(&updated).await?;
    Ok(())
}

/// Rebuilds and publishes every credit document, strictly sequentially.
pub async fn migrate_credits<S, P>(
    store: &S,
    platform: &P,
    index: &AssetIndex,
) -> Result<CreditReport>
where
    S: ContentStore + ?Sized,
    P: ContentPlatform + ?Sized,
{
    let rows = store
        .credit_pages()
        .await
        .map_err(|e| anyhow!("credit pages query failed: {e}"))?;
    let grouped = group_pages(rows);
    info!(documents = grouped.len(), "starting credit migration");

    let mut report = CreditReport::default();
    for (document, per_locale) in &grouped {
        let outcome = publish_credits(store, platform, index, document, per_locale).await?;
        match &outcome {
            CreditOutcome::Published { .. } => report.published += 1,
            CreditOutcome::SkippedNoEntry { .. } => report.skipped += 1,
            CreditOutcome::Failed { .. } => report.failed += 1,
        }
        report.outcomes.push(outcome);
    }
    Ok(report)
}
