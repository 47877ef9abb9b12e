//! Shared value types.
//!
//! Everything here is immutable once built: candidates are handed to the
//! caller as-is, stream descriptors are consumed by the quality ladder.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A subtitle track delivered alongside a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Track {
    pub url: String,
    pub label: String,
}

impl Track {
    pub fn new(url: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            label: label.into(),
        }
    }
}

/// One directly playable stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    /// Never empty.
    pub playback_url: String,
    /// Human-readable label, e.g. `"Voe:1080p"` or `"720p - 4 Mbps"`.
    pub label: String,
    pub subtitle_tracks: Vec<Track>,
    pub audio_track_index: Option<u32>,
    /// Headers the player must send (Origin/Referer for picky hosts).
    pub headers: BTreeMap<String, String>,
}

impl Candidate {
    /// Build a candidate. Returns `None` for an empty URL.
    pub fn new(playback_url: impl Into<String>, label: impl Into<String>) -> Option<Self> {
        let playback_url = playback_url.into();
        if playback_url.trim().is_empty() {
            return None;
        }
        Some(Self {
            playback_url,
            label: label.into(),
            subtitle_tracks: Vec::new(),
            audio_track_index: None,
            headers: BTreeMap::new(),
        })
    }

    #[must_use]
    pub fn with_subtitles(mut self, tracks: Vec<Track>) -> Self {
        self.subtitle_tracks = tracks;
        self
    }

    #[must_use]
    pub fn with_audio_index(mut self, index: u32) -> Self {
        self.audio_track_index = Some(index);
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }
}

/// Media stream type as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
    #[serde(other)]
    Other,
}

/// Metadata for one stream of a playable item.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StreamDescriptor {
    #[serde(rename = "Type")]
    pub kind: StreamKind,
    pub index: u32,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub codec: Option<String>,
    pub language: Option<String>,
    pub display_title: Option<String>,
    #[serde(default)]
    pub is_external: bool,
    #[serde(default, rename = "SupportsExternalStream")]
    pub supports_external_delivery: bool,
}

impl StreamDescriptor {
    /// Bare descriptor of the given kind; fill the rest with struct update syntax.
    #[must_use]
    pub fn new(kind: StreamKind, index: u32) -> Self {
        Self {
            kind,
            index,
            width: None,
            height: None,
            codec: None,
            language: None,
            display_title: None,
            is_external: false,
            supports_external_delivery: false,
        }
    }
}

/// Catalog item type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ItemKind {
    Movie,
    Series,
    Season,
    Episode,
    Folder,
    Other,
}

impl ItemKind {
    /// Map a backend type name (`"Movie"`, `"Season"`, ...).
    #[must_use]
    pub fn from_type_name(name: &str) -> Self {
        match name {
            "Movie" => Self::Movie,
            "Series" => Self::Series,
            "Season" => Self::Season,
            "Episode" => Self::Episode,
            "Folder" | "CollectionFolder" | "UserView" => Self::Folder,
            _ => Self::Other,
        }
    }
}

/// One entry of a catalog listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogItem {
    /// Backend id, or site-relative path for scraped sources.
    pub id: String,
    pub title: String,
    pub kind: ItemKind,
    pub series_id: Option<String>,
    pub thumbnail_url: Option<String>,
}

/// A page of catalog items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogPage {
    pub items: Vec<CatalogItem>,
    pub has_next_page: bool,
}

/// Full metadata of one catalog item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemDetail {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub genres: Vec<String>,
    pub thumbnail_url: Option<String>,
    pub completed: bool,
}

/// A playable unit within an item (an episode, or the movie itself).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Episode {
    pub id: String,
    pub name: String,
    pub number: f32,
    /// Extra details such as overview, runtime or file size.
    pub details: Option<String>,
}

/// A media library the listing can be scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Library {
    pub id: String,
    pub name: String,
}
