//! Configuration loaded from `~/.config/streamsift/config.toml`.
//!
//! ```toml
//! [preferences]
//! preferred_audio_lang = "jpn"
//! preferred_sub_lang = "eng"
//! preferred_host_label = "Voe"
//! preferred_quality_label = "1080"
//! use_expanded_metadata_scope = false
//! episode_details = ["Overview", "Runtime"]
//!
//! [jellyfin]
//! host_url = "http://127.0.0.1:8096"
//! username = "me"
//! password = "secret"
//! library_id = "f137a2dd21bbc1b99aa5c0f6bf02a805"
//!
//! [pelisplus]
//! base_url = "https://pelisplushd.nz"
//! ```
//!
//! Every table is optional; a missing file yields the defaults.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigurationError;

/// Playback preferences.
///
/// Taken as an immutable snapshot at the start of a resolution pass.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub preferred_audio_lang: String,
    pub preferred_sub_lang: String,
    pub preferred_host_label: String,
    pub preferred_quality_label: String,
    /// Pull item metadata from the parent series instead of the season.
    pub use_expanded_metadata_scope: bool,
    /// Extra fields shown with each episode: `Overview`, `Runtime`, `Size`.
    pub episode_details: BTreeSet<String>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            preferred_audio_lang: "jpn".to_string(),
            preferred_sub_lang: "eng".to_string(),
            preferred_host_label: "Voe".to_string(),
            preferred_quality_label: "1080".to_string(),
            use_expanded_metadata_scope: false,
            episode_details: BTreeSet::new(),
        }
    }
}

impl Preferences {
    /// Apply one flat, string-keyed preference (`preferredAudioLang=jpn`).
    pub fn apply_flat(&mut self, key: &str, value: &str) -> Result<(), ConfigurationError> {
        match key {
            "preferredAudioLang" => self.preferred_audio_lang = value.to_string(),
            "preferredSubLang" => self.preferred_sub_lang = value.to_string(),
            "preferredHostLabel" => self.preferred_host_label = value.to_string(),
            "preferredQualityLabel" => self.preferred_quality_label = value.to_string(),
            "useExpandedMetadataScope" => {
                self.use_expanded_metadata_scope = match value.to_lowercase().as_str() {
                    "true" | "1" | "yes" | "on" => true,
                    "false" | "0" | "no" | "off" => false,
                    _ => {
                        return Err(ConfigurationError::InvalidPreference {
                            key: key.to_string(),
                            value: value.to_string(),
                        })
                    }
                };
            }
            _ => return Err(ConfigurationError::UnknownPreference(key.to_string())),
        }
        Ok(())
    }

    /// Language-only view consumed by the quality ladder.
    #[must_use]
    pub fn languages(&self) -> LanguagePrefs<'_> {
        LanguagePrefs {
            audio: &self.preferred_audio_lang,
            subtitles: &self.preferred_sub_lang,
        }
    }
}

/// Preferred audio and subtitle languages (ISO 639-2, e.g. `"jpn"`).
#[derive(Debug, Clone, Copy)]
pub struct LanguagePrefs<'a> {
    pub audio: &'a str,
    pub subtitles: &'a str,
}

/// Connection settings for the Jellyfin backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct JellyfinSettings {
    pub host_url: String,
    pub username: String,
    pub password: String,
    /// Media library used as the listing scope.
    pub library_id: String,
    /// Previously issued token; skips the first login when set with `user_id`.
    pub api_key: Option<String>,
    pub user_id: Option<String>,
}

impl Default for JellyfinSettings {
    fn default() -> Self {
        Self {
            host_url: "http://127.0.0.1:8096".to_string(),
            username: String::new(),
            password: String::new(),
            library_id: String::new(),
            api_key: None,
            user_id: None,
        }
    }
}

/// Settings for the scraped PelisPlusHD-style site.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PelisplusSettings {
    pub base_url: String,
}

impl Default for PelisplusSettings {
    fn default() -> Self {
        Self {
            base_url: "https://pelisplushd.nz".to_string(),
        }
    }
}

/// HTTP transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub connect_timeout_secs: u64,
    pub timeout_secs: u64,
    pub user_agent: Option<String>,
    /// Upper bound on embed URLs decoded at once.
    pub max_concurrent_decodes: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            timeout_secs: 30,
            user_agent: None,
            max_concurrent_decodes: 4,
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub preferences: Preferences,
    pub jellyfin: JellyfinSettings,
    pub pelisplus: PelisplusSettings,
    pub http: HttpSettings,
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// A missing file yields the defaults; an unreadable or invalid one is
    /// an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        let path = path.map_or_else(config_path, Path::to_path_buf);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigurationError::Read {
            path: path.display().to_string(),
            source,
        })?;

        Self::parse(&content, &path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self, ConfigurationError> {
        toml::from_str(content).map_err(|source| ConfigurationError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Return the path to the default config file.
fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("streamsift")
        .join("config.toml")
}
