//! Legacy per-server URLs behind the `api.mycdn.moe` relay.
//!
//! Older pages point every server tab at the relay with the host's own
//! video id in the query (`…?id=abc123`). The id is lifted out and placed
//! into the host's direct embed template, keyed by the tab's label.

/// Relay domain used by legacy server tabs.
pub const LEGACY_RELAY: &str = "api.mycdn.moe";

/// `(label, template)` pairs; `{id}` is replaced with the relay id.
const LEGACY_TEMPLATES: &[(&str, &str)] = &[
    ("sbfast", "https://sbfull.com/e/{id}"),
    ("plusto", "https://owodeuwu.xyz/v/{id}"),
    ("doodstream", "https://dood.to/e/{id}"),
    ("upload", "https://uqload.com/embed-{id}.html"),
    ("uqload", "https://uqload.com/embed-{id}.html"),
];

/// Rewrite a relay URL into the direct embed for `server_label`.
///
/// The label match is case-insensitive and exact. URLs not behind the
/// relay, and labels without a template, are returned unchanged.
pub fn rewrite_legacy(server_label: &str, url: &str) -> String {
    if !url.contains(LEGACY_RELAY) {
        return url.to_string();
    }
    let Some((_, id)) = url.split_once("id=") else {
        return url.to_string();
    };
    let id = id.split('&').next().unwrap_or(id).trim();
    let label = server_label.trim().to_lowercase();

    LEGACY_TEMPLATES
        .iter()
        .find(|(name, _)| *name == label)
        .map_or_else(
            || url.to_string(),
            |(_, template)| template.replace("{id}", id),
        )
}
