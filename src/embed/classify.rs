//! Host classification by ordered substring rules.

use std::fmt;

/// Decoder family of an embed URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HostKind {
    Voe,
    Amazon,
    Okru,
    Filemoon,
    Uqload,
    Mp4Upload,
    StreamWish,
    DoodStream,
    Streamlare,
    YourUpload,
    BurstCloud,
    Fastream,
    Upstream,
    StreamTape,
    StreamHide,
    FileLions,
    Tomatomatela,
    Unknown,
}

impl HostKind {
    /// Label used as candidate prefix and matched by the preferred-host setting.
    pub fn label(self) -> &'static str {
        match self {
            Self::Voe => "Voe",
            Self::Amazon => "Amazon",
            Self::Okru => "Okru",
            Self::Filemoon => "Filemoon",
            Self::Uqload => "Uqload",
            Self::Mp4Upload => "Mp4Upload",
            Self::StreamWish => "StreamWish",
            Self::DoodStream => "DoodStream",
            Self::Streamlare => "Streamlare",
            Self::YourUpload => "YourUpload",
            Self::BurstCloud => "BurstCloud",
            Self::Fastream => "Fastream",
            Self::Upstream => "Upstream",
            Self::StreamTape => "StreamTape",
            Self::StreamHide => "StreamHide",
            Self::FileLions => "FileLions",
            Self::Tomatomatela => "Tomatomatela",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for HostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One classification rule: any fragment matches, no exclusion matches.
#[derive(Debug)]
pub struct HostRule {
    pub kind: HostKind,
    pub fragments: &'static [&'static str],
    pub excludes: &'static [&'static str],
}

impl HostRule {
    fn matches(&self, lowered: &str) -> bool {
        self.fragments.iter().any(|f| lowered.contains(f))
            && !self.excludes.iter().any(|e| lowered.contains(e))
    }
}

const fn rule(kind: HostKind, fragments: &'static [&'static str]) -> HostRule {
    HostRule {
        kind,
        fragments,
        excludes: &[],
    }
}

/// Evaluated top to bottom, first match wins. Exact host names come
/// first; the loose fragments at the bottom only catch what is left.
pub static HOST_RULES: &[HostRule] = &[
    rule(HostKind::Mp4Upload, &["mp4upload"]),
    rule(HostKind::YourUpload, &["yourupload"]),
    rule(HostKind::Uqload, &["uqload"]),
    rule(HostKind::Upstream, &["upstream"]),
    rule(HostKind::StreamTape, &["streamtape", "stape"]),
    rule(
        HostKind::StreamWish,
        &["wishembed", "streamwish", "strwish"],
    ),
    rule(HostKind::StreamHide, &["ahvsh", "streamhide"]),
    rule(HostKind::Streamlare, &["streamlare"]),
    rule(HostKind::FileLions, &["filelions"]),
    rule(HostKind::Filemoon, &["filemoon", "moonplayer"]),
    rule(HostKind::DoodStream, &["doodstream", "dood."]),
    rule(HostKind::Okru, &["ok.ru", "okru"]),
    HostRule {
        kind: HostKind::Amazon,
        fragments: &["amazon"],
        excludes: &["disable"],
    },
    rule(HostKind::BurstCloud, &["burstcloud"]),
    rule(HostKind::Fastream, &["fastream"]),
    rule(HostKind::Tomatomatela, &["tomatomatela"]),
    rule(HostKind::Voe, &["voe"]),
    rule(HostKind::StreamWish, &["wish"]),
    rule(HostKind::FileLions, &["lion"]),
    rule(HostKind::YourUpload, &["upload"]),
    rule(HostKind::BurstCloud, &["burst"]),
    rule(HostKind::StreamTape, &["stp"]),
    HostRule {
        kind: HostKind::Amazon,
        fragments: &["amz"],
        excludes: &["disable"],
    },
];

/// Classify a URL (or any string) by its host fragment.
///
/// Case-insensitive and total: unmatched input is [`HostKind::Unknown`].
pub fn classify(raw: &str) -> HostKind {
    let lowered = raw.to_lowercase();
    HOST_RULES
        .iter()
        .find(|r| r.matches(&lowered))
        .map_or(HostKind::Unknown, |r| r.kind)
}
