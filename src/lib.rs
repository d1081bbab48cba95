pub mod asset_id;
pub mod asset_index;
pub mod config;
pub mod contentful;
pub mod credits;
pub mod essence;
pub mod images;
pub mod locale;
pub mod markdown;
pub mod store;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use crate::asset_index::AssetIndex;
use crate::config::Config;
use crate::contentful::ContentfulClient;
use crate::store::PgStore;

/// CLI for exhibit-migrate: move exhibition images and multilingual
/// credit texts from an Alchemy database into Contentful.
#[derive(Parser)]
#[clap(
    name = "exhibit-migrate",
    version,
    about = "Migrate exhibition images and multilingual credit texts from an Alchemy database into Contentful"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload every referenced picture as a Contentful asset, skipping
    /// assets that already exist
    Images,
    /// Rebuild per-locale credit documents and publish them onto their
    /// exhibition entries
    Credits,
    /// Inspect or refresh the local asset id index
    Assets {
        #[clap(subcommand)]
        action: AssetsAction,
    },
}

#[derive(Subcommand)]
pub enum AssetsAction {
    /// Ensure the index is loaded and print it as JSON
    List,
    /// Force a full remote refresh and persist it to the cache file
    Cache,
}

/// Extracted async CLI entrypoint shared by main() and integration
/// tests. Per-item failures end up in the printed report; only fatal
/// errors surface here and set the exit status.
pub async fn run(cli: Cli) -> Result<()> {
    let config = Config::from_env()?;
    let platform = ContentfulClient::new(&config);

    match cli.command {
        Commands::Images => {
            let store = PgStore::connect(&config.pg_url)
                .await
                .map_err(|e| anyhow!("database connection failed: {e}"))?;
            let index = AssetIndex::load(&platform, &config.cache_path).await?;
            let report =
                images::migrate_images(&store, &platform, &index, &config.image_server).await?;
            println!("Image migration complete.\nReport:");
            println!("{report:#?}");
        }
        Commands::Credits => {
            let store = PgStore::connect(&config.pg_url)
                .await
                .map_err(|e| anyhow!("database connection failed: {e}"))?;
            let index = AssetIndex::load(&platform, &config.cache_path).await?;
            let report = credits::migrate_credits(&store, &platform, &index).await?;
            println!("Credit migration complete.\nReport:");
            println!("{report:#?}");
        }
        Commands::Assets { action } => match action {
            AssetsAction::List => {
                let index = AssetIndex::load(&platform, &config.cache_path).await?;
                println!("{}", serde_json::to_string(&index.sorted_ids())?);
            }
            AssetsAction::Cache => {
                let index = AssetIndex::refresh_from_remote(&platform).await?;
                index.persist(&config.cache_path)?;
                info!(
                    ids = index.len(),
                    path = %config.cache_path.display(),
                    "asset id cache refreshed"
                );
            }
        },
    }

    Ok(())
}
