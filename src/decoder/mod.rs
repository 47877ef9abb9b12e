//! Embed decoders and the soft-failing dispatch loop.
//!
//! # Architecture
//!
//! - [`EmbedDecoder`]: async trait, one implementation per host family
//! - [`DecoderRegistry`]: maps a [`HostKind`] to its decoder
//! - [`Dispatcher`]: deobfuscates, classifies and decodes a batch of embed
//!   URLs; any per-URL failure yields zero candidates for that URL
//!
//! # Example
//!
//! ```rust,no_run
//! use streamsift::decoder::{DecoderRegistry, Dispatcher};
//! use streamsift::FetchClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let dispatcher = Dispatcher::new(FetchClient::new()?, DecoderRegistry::with_defaults());
//! let candidates = dispatcher
//!     .resolve_all(&["aHR0cHM6Ly92b2Uuc3gvZS8xMjM=".to_string()])
//!     .await;
//! for c in candidates {
//!     println!("{} {}", c.label, c.playback_url);
//! }
//! # Ok(())
//! # }
//! ```

pub mod amazon;
pub mod dood;
pub mod jwplayer;
pub mod okru;
pub mod streamtape;
pub mod tomatomatela;
pub mod voe;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, ORIGIN, REFERER};
use tracing::{debug, warn};

use crate::embed::{classify, Deobfuscator, HostKind};
use crate::error::Result;
use crate::http_client::FetchClient;
use crate::model::Candidate;

pub use amazon::AmazonDecoder;
pub use dood::DoodDecoder;
pub use jwplayer::JwPlayerDecoder;
pub use okru::OkruDecoder;
pub use streamtape::StreamTapeDecoder;
pub use tomatomatela::TomatomatelaDecoder;
pub use voe::VoeDecoder;

/// Default bound on embed URLs decoded at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Host families served by the generic JW-player page decoder.
const JWPLAYER_HOSTS: &[HostKind] = &[
    HostKind::Filemoon,
    HostKind::StreamWish,
    HostKind::FileLions,
    HostKind::StreamHide,
    HostKind::Fastream,
    HostKind::Upstream,
    HostKind::Uqload,
    HostKind::Mp4Upload,
    HostKind::YourUpload,
    HostKind::BurstCloud,
];

/// Turns one embed URL into playable candidates.
#[async_trait]
pub trait EmbedDecoder: Send + Sync {
    /// Decoder name for logs (e.g., `"voe"`).
    fn name(&self) -> &'static str;

    /// Resolve an embed URL. `headers` carries Origin/Referer overrides
    /// for hosts that check them.
    async fn resolve(
        &self,
        url: &str,
        client: &FetchClient,
        headers: Option<&HeaderMap>,
    ) -> Result<Vec<Candidate>>;
}

/// Maps host kinds to decoders.
#[derive(Default, Clone)]
pub struct DecoderRegistry {
    decoders: HashMap<HostKind, Arc<dyn EmbedDecoder>>,
}

impl DecoderRegistry {
    /// Registry without decoders.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with every shipped decoder.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(HostKind::Voe, VoeDecoder);
        registry.register(HostKind::StreamTape, StreamTapeDecoder);
        registry.register(HostKind::DoodStream, DoodDecoder);
        registry.register(HostKind::Okru, OkruDecoder);
        registry.register(HostKind::Amazon, AmazonDecoder::default());
        registry.register(HostKind::Tomatomatela, TomatomatelaDecoder);
        for kind in JWPLAYER_HOSTS {
            registry.register(*kind, JwPlayerDecoder::new(*kind));
        }
        registry
    }

    /// Register (or replace) the decoder for `kind`.
    pub fn register(&mut self, kind: HostKind, decoder: impl EmbedDecoder + 'static) {
        self.decoders.insert(kind, Arc::new(decoder));
    }

    pub fn get(&self, kind: HostKind) -> Option<&Arc<dyn EmbedDecoder>> {
        self.decoders.get(&kind)
    }

    pub fn contains(&self, kind: HostKind) -> bool {
        self.decoders.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }
}

/// Origin/Referer overrides some hosts require on every request.
pub fn override_headers(kind: HostKind, url: &str) -> Option<HeaderMap> {
    let origin = match kind {
        HostKind::Filemoon => {
            let host = url::Url::parse(url).ok()?.host_str()?.to_string();
            format!("https://{host}")
        }
        HostKind::StreamWish => "https://streamwish.to".to_string(),
        _ => return None,
    };

    let mut headers = HeaderMap::new();
    headers.insert(ORIGIN, HeaderValue::from_str(&origin).ok()?);
    headers.insert(REFERER, HeaderValue::from_str(&format!("{origin}/")).ok()?);
    Some(headers)
}

/// Host-specific URL fixes applied before decoding.
fn normalize_embed(kind: HostKind, url: &str) -> String {
    match kind {
        HostKind::DoodStream => url.replace("https://doodstream.com/e/", "https://dood.to/e/"),
        _ => url.to_string(),
    }
}

fn header_pairs(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

/// Resolves batches of embed URLs through a [`DecoderRegistry`].
pub struct Dispatcher {
    client: FetchClient,
    deobfuscator: Deobfuscator,
    registry: DecoderRegistry,
    concurrency: usize,
}

impl Dispatcher {
    pub fn new(client: FetchClient, registry: DecoderRegistry) -> Self {
        Self {
            deobfuscator: Deobfuscator::new(client.clone()),
            client,
            registry,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Bound the number of embed URLs decoded at once (minimum 1).
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn registry(&self) -> &DecoderRegistry {
        &self.registry
    }

    /// Resolve every embed URL; failures are logged and skipped.
    ///
    /// Results are grouped by input position regardless of which decode
    /// finishes first.
    pub async fn resolve_all(&self, embed_urls: &[String]) -> Vec<Candidate> {
        let pending: Vec<_> = embed_urls.iter().map(|raw| self.resolve_one(raw)).collect();
        stream::iter(pending)
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    /// Resolve one embed URL, absorbing every failure.
    pub async fn resolve_one(&self, raw: &str) -> Vec<Candidate> {
        let url = match self.deobfuscator.deobfuscate(raw).await {
            Ok(url) => url,
            Err(e) => {
                warn!("Could not unwrap embed {}: {}", raw, e);
                return Vec::new();
            }
        };

        let kind = classify(&url);
        if kind == HostKind::Unknown {
            debug!("No host rule matches {}", url);
            return Vec::new();
        }
        let Some(decoder) = self.registry.get(kind) else {
            debug!("No decoder registered for {} ({})", kind, url);
            return Vec::new();
        };

        let url = normalize_embed(kind, &url);
        let headers = override_headers(kind, &url);
        debug!("Dispatching {} to decoder {}", url, decoder.name());

        match decoder.resolve(&url, &self.client, headers.as_ref()).await {
            Ok(candidates) => {
                let Some(headers) = headers else {
                    return candidates;
                };
                let pairs = header_pairs(&headers);
                candidates
                    .into_iter()
                    .map(|c| {
                        if c.headers.is_empty() {
                            c.with_headers(pairs.clone())
                        } else {
                            c
                        }
                    })
                    .collect()
            }
            Err(e) => {
                warn!("Decoder {} failed for {}: {}", decoder.name(), url, e);
                Vec::new()
            }
        }
    }
}
