//! Adaptive quality ladder.
//!
//! Turns the stream metadata of a playable backend item into an ordered
//! set of playback candidates: one HLS transcode per quality profile the
//! source resolution reaches, a direct remux when the source is smaller
//! than the next profile, and a terminal direct "Source" fallback.
//!
//! Output is reversed (highest fidelity first) but callers should treat
//! the order as advisory; [`crate::rank`] owns the final order.

use url::form_urlencoded;

use crate::config::LanguagePrefs;
use crate::model::{Candidate, StreamDescriptor, StreamKind, Track};

/// A named bitrate/resolution ceiling for one rung of the ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityProfile {
    pub label: &'static str,
    pub max_width: u32,
    pub max_height: u32,
    pub video_bitrate: u32,
    pub audio_bitrate: u32,
}

/// Profile catalog, strictly ascending in `(max_width, max_height)`.
pub const QUALITY_PROFILES: &[QualityProfile] = &[
    QualityProfile {
        label: "360p - 420 kbps",
        max_width: 640,
        max_height: 360,
        video_bitrate: 292_000,
        audio_bitrate: 128_000,
    },
    QualityProfile {
        label: "480p - 720 kbps",
        max_width: 854,
        max_height: 480,
        video_bitrate: 528_000,
        audio_bitrate: 192_000,
    },
    QualityProfile {
        label: "720p - 4 Mbps",
        max_width: 1280,
        max_height: 720,
        video_bitrate: 3_808_000,
        audio_bitrate: 192_000,
    },
    QualityProfile {
        label: "1080p - 10 Mbps",
        max_width: 1920,
        max_height: 1080,
        video_bitrate: 9_808_000,
        audio_bitrate: 192_000,
    },
    QualityProfile {
        label: "1440p - 20 Mbps",
        max_width: 2560,
        max_height: 1440,
        video_bitrate: 19_808_000,
        audio_bitrate: 192_000,
    },
    QualityProfile {
        label: "2160p - 60 Mbps",
        max_width: 3840,
        max_height: 2160,
        video_bitrate: 59_808_000,
        audio_bitrate: 192_000,
    },
];

/// Used when the item reports no video stream dimensions.
const DEFAULT_RESOLUTION: (u32, u32) = (1920, 1080);

/// Audio stream used when no track matches the preferred language.
const DEFAULT_AUDIO_INDEX: u32 = 1;

pub const REMUX_LABEL: &str = "Remux";
pub const SOURCE_LABEL: &str = "Source";

/// Where the generated URLs point.
#[derive(Debug, Clone)]
pub struct PlaybackTarget {
    /// Backend base URL, without trailing slash.
    pub host: String,
    pub api_key: String,
    pub item_id: String,
    pub play_session_id: String,
}

impl PlaybackTarget {
    fn static_url(&self) -> String {
        format!(
            "{}/Videos/{}/stream?static=True&api_key={}",
            self.host, self.item_id, self.api_key
        )
    }

    fn subtitle_url(&self, index: u32, codec: &str) -> String {
        format!(
            "{host}/Videos/{id}/{id}/Subtitles/{index}/0/Stream.{codec}?api_key={key}",
            host = self.host,
            id = self.item_id,
            key = self.api_key,
        )
    }

    fn transcode_url(
        &self,
        profile: &QualityProfile,
        audio_index: u32,
        subtitle_index: Option<u32>,
    ) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query
            .append_pair("api_key", &self.api_key)
            .append_pair("VideoCodec", "h264")
            .append_pair("AudioCodec", "aac,mp3")
            .append_pair("AudioStreamIndex", &audio_index.to_string());
        if let Some(index) = subtitle_index {
            query.append_pair("SubtitleStreamIndex", &index.to_string());
        }
        query
            .append_pair("VideoBitrate", &profile.video_bitrate.to_string())
            .append_pair("AudioBitrate", &profile.audio_bitrate.to_string())
            .append_pair("PlaySessionId", &self.play_session_id)
            .append_pair("TranscodingMaxAudioChannels", "6")
            .append_pair("RequireAvc", "false")
            .append_pair("SegmentContainer", "ts")
            .append_pair("MinSegments", "1")
            .append_pair("BreakOnNonKeyFrames", "true")
            .append_pair("h264-profile", "high,main,baseline,constrainedbaseline")
            .append_pair("h264-level", "51")
            .append_pair("h264-deinterlace", "true")
            .append_pair(
                "TranscodeReasons",
                "VideoCodecNotSupported,AudioCodecNotSupported,ContainerBitrateExceedsLimit",
            );

        format!(
            "{}/videos/{}/main.m3u8?{}",
            self.host, self.item_id, query.finish()
        )
    }
}

/// Stream selections derived from the item's descriptors.
#[derive(Debug, Default)]
struct Selection {
    width: u32,
    height: u32,
    audio_index: u32,
    subtitle_index: Option<u32>,
    subtitles: Vec<Track>,
    external_subtitles: Vec<Track>,
}

fn select_streams(
    streams: &[StreamDescriptor],
    prefs: LanguagePrefs<'_>,
    target: &PlaybackTarget,
) -> Selection {
    let (mut width, mut height) = DEFAULT_RESOLUTION;
    if let Some(video) = streams.iter().find(|s| s.kind == StreamKind::Video) {
        width = video.width.unwrap_or(DEFAULT_RESOLUTION.0);
        height = video.height.unwrap_or(DEFAULT_RESOLUTION.1);
    }

    let audio_index = streams
        .iter()
        .filter(|s| s.kind == StreamKind::Audio)
        .find(|s| s.language.as_deref() == Some(prefs.audio))
        .map_or(DEFAULT_AUDIO_INDEX, |s| s.index);

    // (preferred, track) pairs; preferred ones are hoisted afterwards
    let mut subtitles: Vec<(bool, Track)> = Vec::new();
    let mut external: Vec<(bool, Track)> = Vec::new();
    let mut subtitle_index = None;

    for stream in streams.iter().filter(|s| s.kind == StreamKind::Subtitle) {
        let preferred = stream.language.as_deref() == Some(prefs.subtitles);

        if !stream.supports_external_delivery {
            // Can only be burned in by the transcoder
            if preferred && subtitle_index.is_none() {
                subtitle_index = Some(stream.index);
            }
            continue;
        }

        let codec = stream.codec.as_deref().unwrap_or("srt");
        let label = stream
            .display_title
            .clone()
            .or_else(|| stream.language.clone())
            .unwrap_or_else(|| format!("Subtitle {}", stream.index));
        let track = Track::new(target.subtitle_url(stream.index, codec), label);

        if stream.is_external {
            external.push((preferred, track.clone()));
        }
        subtitles.push((preferred, track));
    }

    Selection {
        width,
        height,
        audio_index,
        subtitle_index,
        subtitles: preferred_first(subtitles),
        external_subtitles: preferred_first(external),
    }
}

/// Stable partition: preferred tracks first, relative order kept.
fn preferred_first(tracks: Vec<(bool, Track)>) -> Vec<Track> {
    let (mut preferred, rest): (Vec<_>, Vec<_>) = tracks.into_iter().partition(|(p, _)| *p);
    preferred.extend(rest);
    preferred.into_iter().map(|(_, t)| t).collect()
}

/// Build the ladder against [`QUALITY_PROFILES`].
pub fn build_ladder(
    streams: &[StreamDescriptor],
    prefs: LanguagePrefs<'_>,
    target: &PlaybackTarget,
) -> Vec<Candidate> {
    build_ladder_with(QUALITY_PROFILES, streams, prefs, target)
}

/// Build the ladder against an explicit, ascending profile catalog.
pub fn build_ladder_with(
    profiles: &[QualityProfile],
    streams: &[StreamDescriptor],
    prefs: LanguagePrefs<'_>,
    target: &PlaybackTarget,
) -> Vec<Candidate> {
    let selection = select_streams(streams, prefs, target);
    let mut ladder = Vec::with_capacity(profiles.len() + 1);

    for profile in profiles {
        if selection.width < profile.max_width && selection.height < profile.max_height {
            // Source is below this rung: nothing left worth transcoding
            ladder.extend(
                Candidate::new(target.static_url(), REMUX_LABEL)
                    .map(|c| c.with_subtitles(selection.external_subtitles.clone())),
            );
            break;
        }

        let url = target.transcode_url(profile, selection.audio_index, selection.subtitle_index);
        ladder.extend(Candidate::new(url, profile.label).map(|c| {
            c.with_subtitles(selection.subtitles.clone())
                .with_audio_index(selection.audio_index)
        }));
    }

    ladder.extend(
        Candidate::new(target.static_url(), SOURCE_LABEL)
            .map(|c| c.with_subtitles(selection.external_subtitles.clone())),
    );

    ladder.reverse();
    ladder
}
