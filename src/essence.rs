//! Typed essence fragments and the closed fetch dispatch.

use anyhow::{anyhow, bail, Result};
use serde::Deserialize;

use crate::store::ContentStore;

/// The Alchemy essence types exhibition credit pages are built from.
///
/// The set is closed: any other label in the schema means an assumption
/// about the source data no longer holds, and the run must stop instead
/// of silently skipping content. `Unknown` carries the raw label so the
/// error can name it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EssenceKind {
    Text,
    RichText,
    Picture,
    Unknown(String),
}

impl EssenceKind {
    pub fn from_label(label: &str) -> Self {
        match label {
            "Alchemy::EssenceText" => EssenceKind::Text,
            "Alchemy::EssenceRichtext" => EssenceKind::RichText,
            "Alchemy::EssencePicture" => EssenceKind::Picture,
            other => EssenceKind::Unknown(other.to_string()),
        }
    }
}

/// One content fragment reference, in authored page order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EssenceRef {
    pub kind: EssenceKind,
    pub id: i64,
}

#[derive(Deserialize)]
struct RawEssenceRef {
    id: i64,
    #[serde(rename = "type")]
    kind: String,
}

impl EssenceRef {
    /// Parses the ordered `jsonb` essence aggregation emitted by the
    /// credit pages query.
    pub fn parse_list(value: &serde_json::Value) -> Result<Vec<EssenceRef>, serde_json::Error> {
        let raw: Vec<RawEssenceRef> = serde_json::from_value(value.clone())?;
        Ok(raw
            .into_iter()
            .map(|r| EssenceRef {
                kind: EssenceKind::from_label(&r.kind),
                id: r.id,
            })
            .collect())
    }
}

/// Resolved content of an essence reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EssenceData {
    pub kind: EssenceKind,
    pub value: String,
}

/// Fetches one essence fragment from the store.
///
/// Returns `None` when the underlying row is missing or stores an empty
/// value; such fragments are dropped from the assembled document. For
/// pictures the value is the binary-file uid, not rendered content. An
/// `Unknown` kind is a fatal error.
pub async fn fetch_essence<S>(store: &S, essence: &EssenceRef) -> Result<Option<EssenceData>>
where
    S: ContentStore + ?Sized,
{
    let value = match &essence.kind {
        EssenceKind::Text => store.essence_text(essence.id).await,
        EssenceKind::RichText => store.essence_richtext(essence.id).await,
        EssenceKind::Picture => store.essence_picture_uid(essence.id).await,
        EssenceKind::Unknown(label) => {
            bail!("unknown essence type {label} (essence id {})", essence.id)
        }
    }
    .map_err(|e| anyhow!("essence lookup failed for id {}: {e}", essence.id))?;

    Ok(value.filter(|v| !v.is_empty()).map(|value| EssenceData {
        kind: essence.kind.clone(),
        value,
    }))
}
