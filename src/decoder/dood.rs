//! DoodStream player pages.
//!
//! Two round trips: the page names a `/pass_md5/` endpoint, which returns
//! a URL prefix; the playable link is that prefix plus ten random
//! alphanumerics, the endpoint's token and an expiry timestamp.

use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use url::Url;

use super::EmbedDecoder;
use crate::error::{DecodeError, Result};
use crate::http_client::FetchClient;
use crate::model::Candidate;

static PASS_MD5: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"/pass_md5/[^'"\s]+"#).unwrap());

static QUALITY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{3,4})p\b").unwrap());

/// `/pass_md5/…` path named by the page, and its trailing token.
pub fn pass_md5_path(html: &str) -> Option<(&str, &str)> {
    let path = PASS_MD5.find(html)?.as_str();
    let token = path.rsplit('/').next().filter(|t| !t.is_empty())?;
    Some((path, token))
}

/// Assemble the final link from the endpoint's prefix.
pub fn assemble(prefix: &str, token: &str, expiry_millis: u128) -> String {
    let padding: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();
    format!(
        "{}{padding}?token={token}&expiry={expiry_millis}",
        prefix.trim()
    )
}

fn label_for(html: &str) -> String {
    let title = html
        .split_once("<title>")
        .and_then(|(_, rest)| rest.split_once("</title>"))
        .map_or("", |(title, _)| title);
    QUALITY
        .captures(title)
        .and_then(|c| c.get(1))
        .map_or_else(
            || "DoodStream".to_string(),
            |q| format!("DoodStream:{}p", q.as_str()),
        )
}

pub struct DoodDecoder;

#[async_trait]
impl EmbedDecoder for DoodDecoder {
    fn name(&self) -> &'static str {
        "doodstream"
    }

    async fn resolve(
        &self,
        url: &str,
        client: &FetchClient,
        headers: Option<&HeaderMap>,
    ) -> Result<Vec<Candidate>> {
        let html = client.fetch_text_with(url, headers).await?;
        let (path, token) = pass_md5_path(&html)
            .ok_or_else(|| DecodeError::MissingMarkup("DoodStream pass_md5".into()))?;
        let label = label_for(&html);

        let embed = Url::parse(url)?;
        let pass_url = embed.join(path)?;
        let referer = format!("{}/", embed.origin().ascii_serialization());

        let mut request_headers = headers.cloned().unwrap_or_default();
        request_headers.insert(
            REFERER,
            HeaderValue::from_str(url)
                .map_err(|_| DecodeError::InvalidPayload(format!("header value {url}")))?,
        );
        let prefix = client
            .fetch_text_with(pass_url.as_str(), Some(&request_headers))
            .await?;
        if prefix.trim().is_empty() {
            return Err(DecodeError::InvalidPayload("empty pass_md5 reply".into()).into());
        }

        let expiry = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis());
        let video = assemble(&prefix, token, expiry);

        let player_headers = BTreeMap::from([("referer".to_string(), referer)]);
        Ok(Candidate::new(video, label)
            .map(|c| c.with_headers(player_headers))
            .into_iter()
            .collect())
    }
}
