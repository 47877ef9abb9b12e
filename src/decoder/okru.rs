//! Odnoklassniki (ok.ru) embeds.
//!
//! The player element carries a `data-options` JSON blob whose
//! `flashvars.metadata` field is itself a JSON string listing one MP4 per
//! quality name.

use std::sync::LazyLock;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::Value;

use super::EmbedDecoder;
use crate::error::{DecodeError, Result};
use crate::http_client::FetchClient;
use crate::model::Candidate;

static DATA_OPTIONS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[data-options]").unwrap());

#[derive(Debug, Deserialize)]
struct Metadata {
    #[serde(default)]
    videos: Vec<Video>,
}

#[derive(Debug, Deserialize)]
struct Video {
    name: String,
    url: String,
}

/// Pixel height behind an ok.ru quality name.
fn quality_of(name: &str) -> Option<&'static str> {
    Some(match name {
        "mobile" => "144p",
        "lowest" => "240p",
        "low" => "360p",
        "sd" => "480p",
        "hd" => "720p",
        "full" => "1080p",
        "quad" => "1440p",
        "ultra" => "2160p",
        _ => return None,
    })
}

fn data_options(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(&DATA_OPTIONS)
        .find_map(|el| el.value().attr("data-options"))
        .map(str::to_string)
}

/// All `(url, label)` pairs listed by an ok.ru embed page.
pub fn parse_player(html: &str) -> Result<Vec<(String, String)>> {
    let options = data_options(html)
        .ok_or_else(|| DecodeError::MissingMarkup("ok.ru data-options".into()))?;
    let options: Value = serde_json::from_str(&options)?;
    let metadata = options
        .pointer("/flashvars/metadata")
        .and_then(Value::as_str)
        .ok_or_else(|| DecodeError::MissingMarkup("ok.ru flashvars.metadata".into()))?;
    let metadata: Metadata = serde_json::from_str(metadata)?;

    Ok(metadata
        .videos
        .into_iter()
        .filter(|v| !v.url.is_empty())
        .map(|v| {
            let label = match quality_of(&v.name) {
                Some(q) => format!("Okru:{q}"),
                None => format!("Okru:{}", v.name),
            };
            (v.url, label)
        })
        .collect())
}

pub struct OkruDecoder;

#[async_trait]
impl EmbedDecoder for OkruDecoder {
    fn name(&self) -> &'static str {
        "okru"
    }

    async fn resolve(
        &self,
        url: &str,
        client: &FetchClient,
        headers: Option<&HeaderMap>,
    ) -> Result<Vec<Candidate>> {
        let html = client.fetch_text_with(url, headers).await?;
        Ok(parse_player(&html)?
            .into_iter()
            .filter_map(|(url, label)| Candidate::new(url, label))
            .collect())
    }
}
