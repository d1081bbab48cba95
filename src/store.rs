//! Read-only boundary against the Alchemy CMS Postgres schema.
//!
//! The [`ContentStore`] trait is what the migration core consumes; it
//! is implemented by [`PgStore`] in production and by a generated mock
//! in tests. All methods are async and return boxed errors, so the
//! core stays agnostic of driver details.

use async_trait::async_trait;
use mockall::automock;
use tokio_postgres::NoTls;
use tracing::{error, info};

use crate::essence::EssenceRef;

/// Boxed error for store implementations.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// One credit page row: the hierarchical url name, its language code
/// and the page's essence references in authored order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRow {
    pub urlname: String,
    pub language_code: String,
    pub essences: Vec<EssenceRef>,
}

/// Snapshot of one distinct picture referenced by content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PictureRow {
    /// Opaque binary-file uid, unique per distinct picture file.
    pub uid: String,
    pub title: Option<String>,
    pub file_name: String,
    pub format: Option<String>,
}

/// Read access to the Alchemy content tables.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// All exhibition credit pages with their ordered essence refs.
    async fn credit_pages(&self) -> Result<Vec<PageRow>, StoreError>;

    /// All distinct pictures referenced by picture essences.
    async fn pictures(&self) -> Result<Vec<PictureRow>, StoreError>;

    /// Body of a text essence; `None` when the row is missing.
    async fn essence_text(&self, id: i64) -> Result<Option<String>, StoreError>;

    /// Body of a richtext essence; `None` when the row is missing.
    async fn essence_richtext(&self, id: i64) -> Result<Option<String>, StoreError>;

    /// Binary-file uid of the picture behind a picture essence.
    async fn essence_picture_uid(&self, id: i64) -> Result<Option<String>, StoreError>;
}

const CREDIT_PAGES_SQL: &str = "
    select ap.urlname, ap.language_code,
           coalesce((
             select jsonb_agg(
                      jsonb_build_object('id', ac.essence_id, 'type', ac.essence_type)
                      order by ae.position, ac.position)
             from alchemy_elements ae
             inner join alchemy_contents ac on ac.element_id = ae.id
             where ae.page_id = ap.id
           ), '[]'::jsonb) as essences
    from alchemy_pages ap
    where ap.depth > 1
      and ap.page_layout = 'exhibition_credit_page'
    order by ap.urlname, ap.language_code";

const PICTURES_SQL: &str = "
    select distinct on (ap.id, ap.image_file_uid, ap.image_file_format, ap.image_file_name)
           aec.title, ap.image_file_uid, ap.image_file_format, ap.image_file_name
    from alchemy_essence_pictures aep
    inner join alchemy_pictures ap on aep.picture_id = ap.id
    inner join alchemy_contents ac
            on ac.essence_id = aep.id and ac.essence_type = 'Alchemy::EssencePicture'
    inner join alchemy_elements ae on ac.element_id = ae.id
    left join alchemy_contents acc
           on acc.element_id = ae.id and acc.essence_type = 'Alchemy::EssenceCredit'
    left join alchemy_essence_credits aec on acc.essence_id = aec.id";

const ESSENCE_TEXT_SQL: &str = "select body from alchemy_essence_texts where id = $1";

const ESSENCE_RICHTEXT_SQL: &str = "select body from alchemy_essence_richtexts where id = $1";

const ESSENCE_PICTURE_UID_SQL: &str = "
    select ap.image_file_uid
    from alchemy_essence_pictures aep
    inner join alchemy_pictures ap on aep.picture_id = ap.id
    where aep.id = $1";

/// Production store backed by the Alchemy Postgres database.
pub struct PgStore {
    client: tokio_postgres::Client,
}

impl PgStore {
    /// Connects to the Alchemy database and spawns the connection
    /// driver task. The connection closes when the store is dropped.
    pub async fn connect(pg_url: &str) -> Result<Self, StoreError> {
        let (client, connection) = tokio_postgres::connect(pg_url, NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "database connection closed with error");
            }
        });
        info!("connected to the Alchemy database");
        Ok(PgStore { client })
    }

    async fn scalar(&self, sql: &str, id: i64) -> Result<Option<String>, StoreError> {
        let row = self.client.query_opt(sql, &[&id]).await?;
        Ok(row.and_then(|r| r.get(0)))
    }
}

#[async_trait]
impl ContentStore for PgStore {
    async fn credit_pages(&self) -> Result<Vec<PageRow>, StoreError> {
        let rows = self.client.query(CREDIT_PAGES_SQL, &[]).await?;
        let mut pages = Vec::with_capacity(rows.len());
        for row in rows {
            let essences: serde_json::Value = row.get("essences");
            pages.push(PageRow {
                urlname: row.get("urlname"),
                language_code: row.get("language_code"),
                essences: EssenceRef::parse_list(&essences)?,
            });
        }
        Ok(pages)
    }

    async fn pictures(&self) -> Result<Vec<PictureRow>, StoreError> {
        let rows = self.client.query(PICTURES_SQL, &[]).await?;
        Ok(rows
            .into_iter()
            .map(|row| PictureRow {
                uid: row.get("image_file_uid"),
                title: row.get("title"),
                file_name: row.get("image_file_name"),
                format: row.get("image_file_format"),
            })
            .collect())
    }

    async fn essence_text(&self, id: i64) -> Result<Option<String>, StoreError> {
        self.scalar(ESSENCE_TEXT_SQL, id).await
    }

    async fn essence_richtext(&self, id: i64) -> Result<Option<String>, StoreError> {
        self.scalar(ESSENCE_RICHTEXT_SQL, id).await
    }

    async fn essence_picture_uid(&self, id: i64) -> Result<Option<String>, StoreError> {
        self.scalar(ESSENCE_PICTURE_UID_SQL, id).await
    }
}
