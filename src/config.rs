//! Environment-sourced configuration for a migration run.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

/// Default location of the asset id cache artifact.
const DEFAULT_CACHE_PATH: &str = "tmp/asset_ids.json";

/// Everything a run needs, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string for the Alchemy database.
    pub pg_url: String,
    /// Contentful management (write) token.
    pub cma_token: String,
    /// Contentful preview (read) token, used for asset listing.
    pub preview_token: String,
    pub space_id: String,
    pub environment_id: String,
    /// Base URL of the image server; the encoded picture uid is
    /// appended to form each asset's upload source.
    pub image_server: String,
    /// Where the asset id cache artifact lives.
    pub cache_path: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config = Config {
            pg_url: require("PG_URL")?,
            cma_token: require("CTF_CMA_ACCESS_TOKEN")?,
            preview_token: require("CTF_CPA_ACCESS_TOKEN")?,
            space_id: require("CTF_SPACE_ID")?,
            environment_id: require("CTF_ENVIRONMENT_ID")?,
            image_server: require("ALCHEMY_IMAGE_SERVER")?,
            cache_path: std::env::var("ASSET_CACHE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CACHE_PATH)),
        };
        info!(
            space = %config.space_id,
            environment = %config.environment_id,
            cache = %config.cache_path.display(),
            "configuration loaded"
        );
        Ok(config)
    }
}

fn require(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("{name} environment variable not set"))
}
