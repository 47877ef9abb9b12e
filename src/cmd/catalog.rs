use anyhow::Result;
use tracing::debug;

use streamsift::{
    resolve_ranked, CatalogSource, Config, Episode, FetchClient, JellyfinSource, PelisplusSource,
    SearchQuery,
};

use super::output;
use crate::SourceKind;

fn open_source(kind: SourceKind, config: &Config) -> Result<Box<dyn CatalogSource>> {
    let client = FetchClient::with_settings(&config.http)?;
    let source: Box<dyn CatalogSource> = match kind {
        SourceKind::Jellyfin => Box::new(JellyfinSource::from_config(config, client)?),
        SourceKind::Pelisplus => Box::new(PelisplusSource::new(client, config)?),
    };
    debug!("Using catalog source {}", source.name());
    Ok(source)
}

pub async fn cmd_popular(kind: SourceKind, config: &Config, page: u32, json: bool) -> Result<()> {
    let source = open_source(kind, config)?;
    let listing = source.fetch_listing(page).await?;
    output::print_page(&listing, page, json)
}

pub async fn cmd_latest(kind: SourceKind, config: &Config, page: u32, json: bool) -> Result<()> {
    let source = open_source(kind, config)?;
    let listing = source.fetch_latest(page).await?;
    output::print_page(&listing, page, json)
}

pub async fn cmd_search(
    kind: SourceKind,
    config: &Config,
    query: &SearchQuery,
    page: u32,
    json: bool,
) -> Result<()> {
    let source = open_source(kind, config)?;
    let results = source.search(page, query).await?;
    output::print_page(&results, page, json)
}

pub async fn cmd_detail(kind: SourceKind, config: &Config, id: &str, json: bool) -> Result<()> {
    let source = open_source(kind, config)?;
    let item = source.lookup(id).await?;
    let detail = source.fetch_detail(&item).await?;
    output::print_detail(&detail, json)
}

pub async fn cmd_episodes(kind: SourceKind, config: &Config, id: &str, json: bool) -> Result<()> {
    let source = open_source(kind, config)?;
    let item = source.lookup(id).await?;
    let episodes = source.fetch_episodes(&item).await?;
    output::print_episodes(&episodes, json)
}

/// Ranked candidates for one episode id (as printed by `episodes`).
pub async fn cmd_videos(kind: SourceKind, config: &Config, id: &str, json: bool) -> Result<()> {
    let source = open_source(kind, config)?;
    let episode = Episode {
        id: id.to_string(),
        name: id.to_string(),
        number: 0.0,
        details: None,
    };
    let candidates = resolve_ranked(source.as_ref(), &episode, &config.preferences)
        .await?;
    output::print_candidates(&candidates, json)
}

pub async fn cmd_libraries(config: &Config, json: bool) -> Result<()> {
    let client = FetchClient::with_settings(&config.http)?;
    let source = JellyfinSource::from_config(config, client)?;
    let libraries = source.fetch_libraries().await?;
    output::print_libraries(&libraries, json)
}
