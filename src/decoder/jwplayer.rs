//! Generic decoder for JW-player style embed pages.
//!
//! Filemoon, StreamWish, FileLions and friends all configure a player with
//! `file:"…m3u8"` (or `src:`), usually inside a Dean Edwards
//! `eval(function(p,a,c,k,e,d)…)` packed script. Packed blocks are unpacked
//! first, then every script is searched for media sources.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::{Captures, Regex};
use reqwest::header::HeaderMap;
use url::Url;

use super::EmbedDecoder;
use crate::embed::HostKind;
use crate::error::{DecodeError, Result};
use crate::http_client::FetchClient;
use crate::model::Candidate;

static PACKED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\}\s*\(\s*'(.*?)'\s*,\s*(\d+)\s*,\s*(\d+)\s*,\s*'(.*?)'\.split\(\s*'\|'\s*\)")
        .unwrap()
});

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w+\b").unwrap());

static SOURCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:file|src)\s*:\s*["']([^"']+?\.(?:m3u8|mp4)[^"']*)["']"#).unwrap()
});

static QUALITY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{3,4})p").unwrap());

const BASE62: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

fn unbase(word: &str, radix: u32) -> Option<usize> {
    match radix {
        2..=36 => usize::from_str_radix(word, radix).ok(),
        37..=62 => word.bytes().try_fold(0usize, |acc, b| {
            let digit = BASE62.iter().position(|&c| c == b)?;
            (digit < radix as usize).then_some(acc.checked_mul(radix as usize)? + digit)
        }),
        _ => None,
    }
}

/// Unpack every `p,a,c,k,e,d` block in `html`.
pub fn unpack_all(html: &str) -> Vec<String> {
    PACKED
        .captures_iter(html)
        .filter_map(|c| {
            let payload = c.get(1)?.as_str().replace("\\'", "'");
            let radix: u32 = c.get(2)?.as_str().parse().ok()?;
            let keywords: Vec<&str> = c.get(4)?.as_str().split('|').collect();
            let unpacked = WORD.replace_all(&payload, |w: &Captures| {
                let word = &w[0];
                unbase(word, radix)
                    .and_then(|i| keywords.get(i))
                    .filter(|k| !k.is_empty())
                    .map_or_else(|| word.to_string(), |k| (*k).to_string())
            });
            Some(unpacked.into_owned())
        })
        .collect()
}

/// Media sources found in the page and its unpacked scripts, deduplicated
/// in order of appearance and resolved against `page_url`.
pub fn find_sources(html: &str, page_url: &str) -> Vec<String> {
    let base = Url::parse(page_url).ok();
    let mut scripts = unpack_all(html);
    scripts.push(html.to_string());

    let mut sources: Vec<String> = Vec::new();
    for script in &scripts {
        for cap in SOURCE.captures_iter(script) {
            let raw = cap[1].replace("\\/", "/");
            let absolute = match &base {
                Some(base) => base.join(&raw).map_or(raw, |u| u.to_string()),
                None => raw,
            };
            if !sources.contains(&absolute) {
                sources.push(absolute);
            }
        }
    }
    sources
}

fn label_for(host: &str, source: &str) -> String {
    QUALITY
        .captures(source)
        .map_or_else(|| host.to_string(), |c| format!("{host}:{}p", &c[1]))
}

/// One instance per host family, labelled after it.
pub struct JwPlayerDecoder {
    host: &'static str,
}

impl JwPlayerDecoder {
    pub fn new(kind: HostKind) -> Self {
        Self { host: kind.label() }
    }
}

#[async_trait]
impl EmbedDecoder for JwPlayerDecoder {
    fn name(&self) -> &'static str {
        "jwplayer"
    }

    async fn resolve(
        &self,
        url: &str,
        client: &FetchClient,
        headers: Option<&HeaderMap>,
    ) -> Result<Vec<Candidate>> {
        let html = client.fetch_text_with(url, headers).await?;
        let sources = find_sources(&html, url);
        if sources.is_empty() {
            return Err(DecodeError::MissingMarkup(format!("{} player source", self.host)).into());
        }
        Ok(sources
            .into_iter()
            .filter_map(|s| {
                let label = label_for(self.host, &s);
                Candidate::new(s, label)
            })
            .collect())
    }
}
