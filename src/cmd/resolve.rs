use anyhow::Result;

use streamsift::{rank, Config, DecoderRegistry, Dispatcher, FetchClient};

use super::output;

/// Decode embed references directly, without a catalog.
pub async fn cmd_resolve(config: &Config, embeds: &[String], json: bool) -> Result<()> {
    let client = FetchClient::with_settings(&config.http)?;
    let dispatcher = Dispatcher::new(client, DecoderRegistry::with_defaults())
        .with_concurrency(config.http.max_concurrent_decodes);

    let candidates = rank(
        dispatcher.resolve_all(embeds).await,
        &config.preferences.preferred_host_label,
        &config.preferences.preferred_quality_label,
    );
    output::print_candidates(&candidates, json)
}
