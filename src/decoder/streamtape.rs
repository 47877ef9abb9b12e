//! StreamTape player pages.
//!
//! The direct link is assembled in script from two string pieces: the
//! `robotlink` head and the tail after the `xcd` concatenation.

use async_trait::async_trait;
use reqwest::header::HeaderMap;

use super::EmbedDecoder;
use crate::error::{DecodeError, Result};
use crate::http_client::FetchClient;
use crate::model::Candidate;

const ROBOTLINK: &str = "document.getElementById('robotlink').innerHTML = '";
const TAIL_MARKER: &str = "+ ('xcd";

/// Build the direct video URL from a StreamTape page.
pub fn parse_player(html: &str) -> Result<String> {
    let start = html
        .find(ROBOTLINK)
        .ok_or_else(|| DecodeError::MissingMarkup("StreamTape robotlink".into()))?;
    let script = &html[start + ROBOTLINK.len()..];

    let head = script.split('\'').next().unwrap_or_default();
    let tail = script
        .split_once(TAIL_MARKER)
        .map(|(_, rest)| rest.split('\'').next().unwrap_or_default())
        .ok_or_else(|| DecodeError::MissingMarkup("StreamTape link tail".into()))?;

    Ok(format!("https:{head}{tail}"))
}

pub struct StreamTapeDecoder;

#[async_trait]
impl EmbedDecoder for StreamTapeDecoder {
    fn name(&self) -> &'static str {
        "streamtape"
    }

    async fn resolve(
        &self,
        url: &str,
        client: &FetchClient,
        headers: Option<&HeaderMap>,
    ) -> Result<Vec<Candidate>> {
        let html = client.fetch_text_with(url, headers).await?;
        let video = parse_player(&html)?;
        Ok(Candidate::new(video, "StreamTape").into_iter().collect())
    }
}
