//! Candidate ordering by user preference.

use std::cmp::Reverse;
use std::sync::LazyLock;

use regex::Regex;

use crate::model::Candidate;

static QUALITY_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)p").unwrap());

/// Numeric quality of a label: the first `<digits>p` token, `0` if absent.
pub fn label_quality(label: &str) -> u32 {
    QUALITY_REGEX
        .captures(label)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// Stable sort, best first, by:
///
/// 1. label contains `preferred_host` (case-insensitive),
/// 2. label contains `preferred_quality` (exact fragment),
/// 3. numeric quality, descending.
///
/// Ties keep their input order, so the result is deterministic and
/// `rank(rank(l)) == rank(l)`. Empty preferences never match.
pub fn rank(
    mut candidates: Vec<Candidate>,
    preferred_host: &str,
    preferred_quality: &str,
) -> Vec<Candidate> {
    let host = preferred_host.to_lowercase();

    candidates.sort_by_cached_key(|c| {
        let host_match = !host.is_empty() && c.label.to_lowercase().contains(&host);
        let quality_match = !preferred_quality.is_empty() && c.label.contains(preferred_quality);
        Reverse((host_match, quality_match, label_quality(&c.label)))
    });
    candidates
}
