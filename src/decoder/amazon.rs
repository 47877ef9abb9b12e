//! Amazon Drive shared links.
//!
//! The share page exposes a `shareId`; the drive API maps it to a folder
//! node whose children carry short-lived `tempLink` download URLs.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde_json::Value;

use super::EmbedDecoder;
use crate::error::{DecodeError, Result};
use crate::http_client::FetchClient;
use crate::model::Candidate;

pub const DEFAULT_API_BASE: &str = "https://www.amazon.com";

const SHARE_ID_MARKER: &str = "var shareId = \"";

/// `shareId` declared by a share page.
pub fn share_id(html: &str) -> Option<&str> {
    let (_, rest) = html.split_once(SHARE_ID_MARKER)?;
    rest.split('"').next().filter(|id| !id.is_empty())
}

/// First playable `tempLink` among a node's children, files first.
pub fn temp_link(children: &Value) -> Option<&str> {
    let nodes = children.get("data")?.as_array()?;
    nodes
        .iter()
        .filter(|n| n.get("kind").and_then(Value::as_str) == Some("FILE"))
        .find_map(link_of)
        .or_else(|| nodes.iter().find_map(link_of))
}

fn link_of(node: &Value) -> Option<&str> {
    node.get("tempLink").and_then(Value::as_str)
}

pub struct AmazonDecoder {
    api_base: String,
}

impl AmazonDecoder {
    /// Decoder against a custom drive API host.
    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }
}

impl Default for AmazonDecoder {
    fn default() -> Self {
        Self::with_api_base(DEFAULT_API_BASE)
    }
}

#[async_trait]
impl EmbedDecoder for AmazonDecoder {
    fn name(&self) -> &'static str {
        "amazon"
    }

    async fn resolve(
        &self,
        url: &str,
        client: &FetchClient,
        headers: Option<&HeaderMap>,
    ) -> Result<Vec<Candidate>> {
        let html = client.fetch_text_with(url, headers).await?;
        let share_id = share_id(&html)
            .ok_or_else(|| DecodeError::MissingMarkup("Amazon shareId".into()))?
            .to_string();

        let share: Value = client
            .get_json(&format!(
                "{}/drive/v1/shares/{share_id}?resourceVersion=V2&ContentType=JSON&asset=ALL",
                self.api_base
            ))
            .await?;
        let node_id = share
            .pointer("/nodeInfo/id")
            .and_then(Value::as_str)
            .ok_or_else(|| DecodeError::InvalidPayload("Amazon share without nodeInfo.id".into()))?;

        let children: Value = client
            .get_json(&format!(
                "{}/drive/v1/nodes/{node_id}/children?resourceVersion=V2&ContentType=JSON\
                 &limit=200&sort=%5B%22kind+DESC%22%2C+%22modifiedDate+DESC%22%5D\
                 &asset=ALL&tempLink=true&shareId={share_id}",
                self.api_base
            ))
            .await?;
        let link = temp_link(&children)
            .ok_or_else(|| DecodeError::InvalidPayload("Amazon node without tempLink".into()))?;

        Ok(Candidate::new(link, "Amazon").into_iter().collect())
    }
}
