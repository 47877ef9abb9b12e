//! Error taxonomy.
//!
//! Per-host failures ([`DecodeError`], and [`TransportError`] raised while
//! decoding an embed) are absorbed by the dispatch loop. Failures of the
//! primary catalog requests and rejected credentials propagate to the
//! caller through [`Error`].

use thiserror::Error;

/// Credential exchange failures.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("login failed: the server rejected the credentials")]
    InvalidCredentials,

    #[error("no username/password configured")]
    MissingCredentials,

    #[error("login request failed: {0}")]
    Transport(#[from] TransportError),
}

/// Missing or malformed settings, detected before any network call.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("select a media library in the settings (jellyfin.library_id)")]
    MissingLibrary,

    #[error("invalid host URL {url:?}: {source}")]
    InvalidHostUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unknown preference key: {0}")]
    UnknownPreference(String),

    #[error("invalid value {value:?} for preference {key}")]
    InvalidPreference { key: String, value: String },

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// A page or payload did not have the shape a scraper expected.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("expected markup not found: {0}")]
    MissingMarkup(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Network-level failures.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Crate-level error.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(TransportError::Request(err))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::Transport(TransportError::InvalidUrl(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(DecodeError::Json(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
