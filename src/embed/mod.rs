//! Embed reference handling.
//!
//! An embed URL points at a third-party player page rather than at media.
//! Before a decoder can run, the raw reference scraped from a source page
//! has to be unwrapped ([`deobfuscate`]), possibly rewritten from a legacy
//! relay form ([`legacy`]), and classified by host ([`classify`]).
//!
//! # Example
//!
//! ```rust
//! use streamsift::embed::{classify, clean, HostKind};
//!
//! let url = clean("aHR0cHM6Ly92b2Uuc3gvZS8xMjM=");
//! assert_eq!(url, "https://voe.sx/e/123");
//! assert_eq!(classify(&url), HostKind::Voe);
//! ```

pub mod classify;
pub mod deobfuscate;
pub mod legacy;

pub use classify::{classify, HostKind, HostRule, HOST_RULES};
pub use deobfuscate::{clean, Deobfuscator};
pub use legacy::rewrite_legacy;

/// Argument of a `go_to_player('…')` click handler.
///
/// Handlers without the call are returned trimmed, as-is.
pub fn player_token(onclick: &str) -> &str {
    let start = onclick
        .find("go_to_player('")
        .map_or(0, |i| i + "go_to_player('".len());
    let rest = &onclick[start..];
    let end = ["')", "',"]
        .iter()
        .filter_map(|m| rest.find(m))
        .min()
        .unwrap_or(rest.len());
    rest[..end].trim()
}
