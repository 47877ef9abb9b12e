//! `StreamSift` - Catalog-to-stream resolution
//!
//! Turns a catalog entry into an ordered list of directly playable streams.
//!
//! # Features
//!
//! - **Catalogs**: a Jellyfin-style media server (listing, search, detail,
//!   episodes, playback info) and a scraped PelisPlusHD-style site
//! - **Sessions**: cached backend credentials with single-flight refresh
//! - **Embeds**: unwrapping of obfuscated references, host classification
//!   and per-host decoders dispatched with bounded concurrency
//! - **Quality ladder**: transcoding variants derived from stream metadata
//! - **Ranking**: stable ordering by preferred host and quality
//!
//! # Example
//!
//! ```rust,no_run
//! use streamsift::catalog::{resolve_ranked, CatalogSource, JellyfinSource};
//! use streamsift::{Config, FetchClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     let client = FetchClient::with_settings(&config.http)?;
//!     let source = JellyfinSource::from_config(&config, client)?;
//!
//!     let page = source.fetch_listing(1).await?;
//!     let episodes = source.fetch_episodes(&page.items[0]).await?;
//!     for candidate in resolve_ranked(&source, &episodes[0], &config.preferences).await? {
//!         println!("{} {}", candidate.label, candidate.playback_url);
//!     }
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod decoder;
pub mod embed;
pub mod error;
pub mod http_client;
pub mod ladder;
pub mod model;
pub mod rank;
pub mod session;

pub use catalog::{resolve_ranked, CatalogSource, JellyfinSource, PelisplusSource, SearchQuery};
pub use config::{Config, Preferences};
pub use decoder::{DecoderRegistry, Dispatcher, EmbedDecoder};
pub use embed::{classify, HostKind};
pub use error::{Error, Result};
pub use http_client::FetchClient;
pub use ladder::build_ladder;
pub use model::{Candidate, CatalogItem, CatalogPage, Episode, ItemDetail, ItemKind, Track};
pub use rank::rank;
pub use session::{Session, SessionProvider};

/// Version of streamsift
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
