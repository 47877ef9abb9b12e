//! Tomatomatela embeds.
//!
//! `…/embed.html#TOKEN` pages load their source from
//! `details.php?v=TOKEN`, which answers `{"status": "200", "file": …}`.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, REFERER};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::EmbedDecoder;
use crate::error::{DecodeError, Result};
use crate::http_client::FetchClient;
use crate::model::Candidate;

const EMBED_MARKER: &str = "/embed.html#";

#[derive(Debug, Deserialize)]
struct Details {
    status: Value,
    file: Option<String>,
}

/// `details.php` URL for an embed link.
pub fn details_url(url: &str) -> Result<String> {
    let (_, token) = url
        .split_once(EMBED_MARKER)
        .filter(|(_, token)| !token.is_empty())
        .ok_or_else(|| DecodeError::InvalidPayload(format!("no embed token in {url}")))?;
    let parsed = Url::parse(url)?;
    Ok(format!(
        "{}/details.php?v={token}",
        parsed.origin().ascii_serialization()
    ))
}

/// Playable file from a `details.php` reply, if the status is OK.
pub fn parse_details(body: &str) -> Result<Option<String>> {
    let details: Details = serde_json::from_str(body.trim())?;
    let ok = match &details.status {
        Value::String(s) => s == "200",
        Value::Number(n) => n.as_u64() == Some(200),
        _ => false,
    };
    Ok(details.file.filter(|f| ok && !f.is_empty()))
}

pub struct TomatomatelaDecoder;

#[async_trait]
impl EmbedDecoder for TomatomatelaDecoder {
    fn name(&self) -> &'static str {
        "tomatomatela"
    }

    async fn resolve(
        &self,
        url: &str,
        client: &FetchClient,
        headers: Option<&HeaderMap>,
    ) -> Result<Vec<Candidate>> {
        let details = details_url(url)?;

        let mut request_headers = headers.cloned().unwrap_or_default();
        request_headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/javascript, */*; q=0.01"),
        );
        request_headers.insert(
            "x-requested-with",
            HeaderValue::from_static("XMLHttpRequest"),
        );
        if let Ok(referer) = HeaderValue::from_str(url) {
            request_headers.insert(REFERER, referer);
        }

        let body = client
            .fetch_text_with(&details, Some(&request_headers))
            .await?;
        Ok(parse_details(&body)?
            .and_then(|file| Candidate::new(file, "Tomatomatela"))
            .into_iter()
            .collect())
    }
}
