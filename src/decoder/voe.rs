//! Voe player pages.
//!
//! The HLS source sits in an inline `sources` object, either as a plain URL
//! or base64-encoded. Some mirrors serve a bounce page that sets
//! `window.location.href` first; that redirect is followed once.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::HeaderMap;
use tracing::debug;

use super::EmbedDecoder;
use crate::embed::deobfuscate::{decode_base64_url, looks_like_url};
use crate::error::{DecodeError, Result};
use crate::http_client::FetchClient;
use crate::model::Candidate;

static BOUNCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"window\.location\.href\s*=\s*'([^']+)'"#).unwrap());

static HLS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"['"]hls['"]\s*:\s*['"]([^'"]+)['"]"#).unwrap());

static HEIGHT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"['"]?video_height['"]?\s*:\s*['"]?(\d{3,4})"#).unwrap());

/// Extract `(source, label)` from a Voe player page.
pub fn parse_player(html: &str) -> Result<(String, String)> {
    let raw = HLS
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| DecodeError::MissingMarkup("Voe hls source".into()))?;

    let source = if looks_like_url(raw) {
        raw.to_string()
    } else {
        decode_base64_url(raw)
            .ok_or_else(|| DecodeError::InvalidPayload(format!("Voe hls token {raw}")))?
    };

    let label = HEIGHT
        .captures(html)
        .and_then(|c| c.get(1))
        .map_or_else(|| "Voe".to_string(), |h| format!("Voe:{}p", h.as_str()));

    Ok((source, label))
}

pub struct VoeDecoder;

#[async_trait]
impl EmbedDecoder for VoeDecoder {
    fn name(&self) -> &'static str {
        "voe"
    }

    async fn resolve(
        &self,
        url: &str,
        client: &FetchClient,
        headers: Option<&HeaderMap>,
    ) -> Result<Vec<Candidate>> {
        let mut html = client.fetch_text_with(url, headers).await?;

        if !HLS.is_match(&html) {
            let bounce = BOUNCE
                .captures(&html)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string());
            if let Some(next) = bounce {
                debug!("Voe bounce page, following {}", next);
                html = client.fetch_text_with(&next, headers).await?;
            }
        }

        let (source, label) = parse_player(&html)?;
        Ok(Candidate::new(source, label).into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PLAIN: &str = r#"<script>
        var sources = {
            'hls': 'https://delivery.voe.example/engine/hls/master.m3u8?t=1',
            'video_height': 1080,
        };
    </script>"#;

    #[test]
    fn parses_plain_source_with_height() {
        let (source, label) = parse_player(PLAIN).unwrap();
        assert_eq!(
            source,
            "https://delivery.voe.example/engine/hls/master.m3u8?t=1"
        );
        assert_eq!(label, "Voe:1080p");
    }

    #[test]
    fn parses_base64_source() {
        // "https://voe.sx/e/123"
        let html = r#"let sources = {"hls": "aHR0cHM6Ly92b2Uuc3gvZS8xMjM="};"#;
        let (source, label) = parse_player(html).unwrap();
        assert_eq!(source, "https://voe.sx/e/123");
        assert_eq!(label, "Voe");
    }

    #[test]
    fn missing_source_is_missing_markup() {
        let err = parse_player("<html></html>").unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Decode(DecodeError::MissingMarkup(_))
        ));
    }

    #[test]
    fn undecodable_token_is_invalid_payload() {
        let err = parse_player(r#"'hls': '%%%'"#).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Decode(DecodeError::InvalidPayload(_))
        ));
    }

    #[tokio::test]
    async fn follows_bounce_page_once() {
        let server = MockServer::start().await;
        let target = format!("{}/voe/real", server.uri());
        Mock::given(method("GET"))
            .and(path("/voe/e/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                "<script>window.location.href = '{target}';</script>"
            )))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/voe/real"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PLAIN))
            .mount(&server)
            .await;

        let client = FetchClient::new().unwrap();
        let found = VoeDecoder
            .resolve(&format!("{}/voe/e/1", server.uri()), &client, None)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].label, "Voe:1080p");
    }
}
