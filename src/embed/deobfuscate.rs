//! Unwrapping of obfuscated embed references.
//!
//! Source pages hand out embed targets wrapped in one or more layers:
//! poster/cover markers appended to the URL, a base64-encoded token in
//! place of the URL, or a redirector page (`…?data=…`) whose iframe holds
//! the real embed. [`clean`] removes the offline layers; the
//! [`Deobfuscator`] adds the redirector round trip.

use std::sync::LazyLock;

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

use crate::error::{DecodeError, Result};
use crate::http_client::FetchClient;

/// Appended by the source page; never part of the embed URL.
const TRAILING_MARKERS: &[&str] = &["?cover_url=", "#poster=", "?poster"];

/// Redirector pages carry the real target in an iframe.
const REDIRECTOR_MARKER: &str = "?data=";

static URL_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"https?://(www\.)?[-a-zA-Z0-9@:%._+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b([-a-zA-Z0-9()@:%_+.~#?&/=]*)",
    )
    .unwrap()
});

static IFRAME: LazyLock<Selector> = LazyLock::new(|| Selector::parse("iframe[src]").unwrap());

/// Whether `token` contains something URL-shaped.
pub fn looks_like_url(token: &str) -> bool {
    URL_SHAPE.is_match(token)
}

/// Cut `raw` at the first trailing marker.
pub fn strip_markers(raw: &str) -> &str {
    let end = TRAILING_MARKERS
        .iter()
        .filter_map(|m| raw.find(m))
        .min()
        .unwrap_or(raw.len());
    raw[..end].trim()
}

/// Decode a base64 token into a URL, trying the common alphabets.
///
/// Returns `None` unless the payload is UTF-8 and URL-shaped.
pub fn decode_base64_url(token: &str) -> Option<String> {
    let compact: String = token.chars().filter(|c| !c.is_whitespace()).collect();
    [&STANDARD, &STANDARD_NO_PAD, &URL_SAFE, &URL_SAFE_NO_PAD]
        .into_iter()
        .find_map(|engine| engine.decode(compact.as_bytes()).ok())
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .map(|decoded| decoded.trim().to_string())
        .filter(|decoded| looks_like_url(decoded))
}

/// Remove offline obfuscation: trailing markers, then base64.
///
/// Tokens that are neither URLs nor base64-encoded URLs come back
/// stripped but otherwise unchanged. Idempotent on clean URLs.
pub fn clean(raw: &str) -> String {
    let stripped = strip_markers(raw);
    if looks_like_url(stripped) {
        return stripped.to_string();
    }
    match decode_base64_url(stripped) {
        Some(decoded) => strip_markers(&decoded).to_string(),
        None => stripped.to_string(),
    }
}

/// Whether `url` points at a redirector page.
pub fn is_redirector(url: &str) -> bool {
    url.contains(REDIRECTOR_MARKER)
}

/// First iframe `src` of a page.
pub fn iframe_src(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(&IFRAME)
        .filter_map(|el| el.value().attr("src"))
        .map(str::trim)
        .find(|src| !src.is_empty())
        .map(str::to_string)
}

/// Full resolver: [`clean`] plus the redirector round trip.
#[derive(Clone)]
pub struct Deobfuscator {
    client: FetchClient,
}

impl Deobfuscator {
    pub fn new(client: FetchClient) -> Self {
        Self { client }
    }

    /// Resolve `raw` to the real embed URL.
    ///
    /// Redirector pages cost one extra GET; a redirector without an
    /// iframe is a [`DecodeError::MissingMarkup`].
    pub async fn deobfuscate(&self, raw: &str) -> Result<String> {
        let cleaned = clean(raw);
        if !is_redirector(&cleaned) {
            return Ok(cleaned);
        }

        debug!("Following redirector page: {}", cleaned);
        let html = self.client.fetch_text(&cleaned).await?;
        let target = iframe_src(&html)
            .ok_or_else(|| DecodeError::MissingMarkup(format!("iframe in {cleaned}")))?;
        Ok(clean(&target))
    }
}
