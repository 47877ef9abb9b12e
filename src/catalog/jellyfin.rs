//! Jellyfin-backed catalog.
//!
//! Listings come from `/Users/{uid}/Items`, episodes from
//! `/Shows/{series}/Episodes`, and playback candidates from the item's
//! `PlaybackInfo` run through the quality ladder.

use std::collections::BTreeSet;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use super::{has_next_page, CatalogSource, ListingQuery, SearchQuery, SEASONS_LIMIT, SERIES_LIMIT};
use crate::config::{Config, JellyfinSettings, Preferences};
use crate::decoder::DEFAULT_CONCURRENCY;
use crate::error::{ConfigurationError, Result};
use crate::http_client::FetchClient;
use crate::ladder::{build_ladder, PlaybackTarget};
use crate::model::{
    Candidate, CatalogItem, CatalogPage, Episode, ItemDetail, ItemKind, Library, StreamDescriptor,
};
use crate::session::{Authenticator, JellyfinAuthenticator, Session, SessionProvider};

const DETAIL_SEPARATOR: &str = " • ";
const TICKS_PER_MINUTE: u64 = 600_000_000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ItemsDto {
    #[serde(default)]
    items: Vec<ItemDto>,
    #[serde(default)]
    total_record_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ItemDto {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(rename = "Type", default)]
    type_name: String,
    series_id: Option<String>,
    series_name: Option<String>,
    index_number: Option<f32>,
    overview: Option<String>,
    run_time_ticks: Option<u64>,
    #[serde(default)]
    genres: Vec<String>,
    status: Option<String>,
    #[serde(default)]
    media_sources: Vec<MediaSourceDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MediaSourceDto {
    size: Option<u64>,
    #[serde(default)]
    media_streams: Vec<StreamDescriptor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PlaybackInfoDto {
    #[serde(default)]
    media_sources: Vec<MediaSourceDto>,
    #[serde(default)]
    play_session_id: String,
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    #[allow(clippy::cast_precision_loss)]
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

impl ItemDto {
    fn kind(&self) -> ItemKind {
        ItemKind::from_type_name(&self.type_name)
    }

    fn title(&self) -> String {
        match (self.kind(), &self.series_name) {
            (ItemKind::Season, Some(series)) => format!("{series} {}", self.name),
            _ => self.name.clone(),
        }
    }

    /// Episode details, in `Overview`, `Runtime`, `Size` order.
    fn details(&self, wanted: &BTreeSet<String>) -> Option<String> {
        let mut parts = Vec::new();
        if wanted.contains("Overview") {
            parts.extend(self.overview.clone().filter(|o| !o.trim().is_empty()));
        }
        if wanted.contains("Runtime") {
            parts.extend(
                self.run_time_ticks
                    .map(|ticks| format!("{} min", ticks / TICKS_PER_MINUTE)),
            );
        }
        if wanted.contains("Size") {
            parts.extend(
                self.media_sources
                    .first()
                    .and_then(|m| m.size)
                    .map(format_size),
            );
        }
        (!parts.is_empty()).then(|| parts.join(DETAIL_SEPARATOR))
    }

    fn episode_name(&self) -> String {
        match self.index_number {
            Some(n) => format!("Ep. {n} - {}", self.name),
            None => self.name.clone(),
        }
    }
}

/// Catalog backed by a Jellyfin server.
pub struct JellyfinSource<A = JellyfinAuthenticator> {
    client: FetchClient,
    host: String,
    library_id: String,
    preferences: Preferences,
    sessions: SessionProvider<A>,
    concurrency: usize,
}

impl JellyfinSource<JellyfinAuthenticator> {
    /// Source from the `[jellyfin]` table, seeded with any stored token.
    pub fn from_config(config: &Config, client: FetchClient) -> Result<Self> {
        let settings = &config.jellyfin;
        let authenticator = JellyfinAuthenticator::new(client.clone(), settings.host_url.clone());
        let mut sessions = SessionProvider::new(
            authenticator,
            settings.username.clone(),
            settings.password.clone(),
        );
        if let (Some(api_key), Some(user_id)) = (&settings.api_key, &settings.user_id) {
            sessions = sessions.with_session(Session::new(api_key.clone(), user_id.clone()));
        }
        Ok(Self::new(client, settings, config.preferences.clone(), sessions)?
            .with_concurrency(config.http.max_concurrent_decodes))
    }
}

impl<A: Authenticator> JellyfinSource<A> {
    pub fn new(
        client: FetchClient,
        settings: &JellyfinSettings,
        preferences: Preferences,
        sessions: SessionProvider<A>,
    ) -> Result<Self> {
        Url::parse(&settings.host_url).map_err(|source| ConfigurationError::InvalidHostUrl {
            url: settings.host_url.clone(),
            source,
        })?;
        Ok(Self {
            client,
            host: settings.host_url.trim_end_matches('/').to_string(),
            library_id: settings.library_id.clone(),
            preferences,
            sessions,
            concurrency: DEFAULT_CONCURRENCY,
        })
    }

    /// Bound on concurrent search fan-out requests (minimum 1).
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    async fn session(&self) -> Result<Session> {
        Ok(self.sessions.ensure_authenticated(false).await?)
    }

    fn require_library(&self) -> Result<()> {
        if self.library_id.is_empty() {
            return Err(ConfigurationError::MissingLibrary.into());
        }
        Ok(())
    }

    /// Primary artwork URL of an item.
    pub fn thumbnail_url(&self, id: &str, session: &Session) -> String {
        format!(
            "{}/Items/{id}/Images/Primary?api_key={}",
            self.host, session.api_key
        )
    }

    fn to_item(&self, dto: &ItemDto, session: &Session) -> CatalogItem {
        CatalogItem {
            id: dto.id.clone(),
            title: dto.title(),
            kind: dto.kind(),
            series_id: dto.series_id.clone(),
            thumbnail_url: Some(self.thumbnail_url(&dto.id, session)),
        }
    }

    async fn fetch_items(&self, query: &ListingQuery, session: &Session) -> Result<ItemsDto> {
        let request = query.build(&self.host, session)?;
        debug!("Listing items at offset {}", request.offset);
        Ok(self.client.get_json(&request.url).await?)
    }

    async fn fetch_item(&self, id: &str, session: &Session) -> Result<ItemDto> {
        let url = format!(
            "{}/Users/{}/Items/{id}?api_key={}",
            self.host, session.user_id, session.api_key
        );
        Ok(self.client.get_json(&url).await?)
    }

    async fn listing_page(&self, query: ListingQuery) -> Result<CatalogPage> {
        self.require_library()?;
        let session = self.session().await?;
        let page = query.page.max(1);
        let data = self.fetch_items(&query, &session).await?;
        Ok(CatalogPage {
            items: data
                .items
                .iter()
                .map(|i| self.to_item(i, &session))
                .collect(),
            has_next_page: has_next_page(page, SEASONS_LIMIT, data.total_record_count),
        })
    }

    /// Media libraries visible to the user.
    pub async fn fetch_libraries(&self) -> Result<Vec<Library>> {
        let session = self.session().await?;
        let url = format!(
            "{}/Users/{}/Items?api_key={}",
            self.host, session.user_id, session.api_key
        );
        let data: ItemsDto = self.client.get_json(&url).await?;
        Ok(data
            .items
            .into_iter()
            .map(|i| Library {
                id: i.id,
                name: i.name,
            })
            .collect())
    }

    /// One search hit expanded into its movies and seasons.
    async fn expand_hit(&self, hit: ItemDto, session: &Session) -> Vec<CatalogItem> {
        if hit.kind() != ItemKind::Series {
            return vec![self.to_item(&hit, session)];
        }
        let children = ListingQuery::children(hit.id.clone());
        match self.fetch_items(&children, session).await {
            Ok(data) => data
                .items
                .iter()
                .map(|c| self.to_item(c, session))
                .collect(),
            Err(e) => {
                warn!("Could not list seasons of {} ({}): {}", hit.name, hit.id, e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl<A: Authenticator> CatalogSource for JellyfinSource<A> {
    fn name(&self) -> &'static str {
        "jellyfin"
    }

    async fn lookup(&self, id: &str) -> Result<CatalogItem> {
        let session = self.session().await?;
        let dto = self.fetch_item(id, &session).await?;
        Ok(self.to_item(&dto, &session))
    }

    async fn fetch_listing(&self, page: u32) -> Result<CatalogPage> {
        self.listing_page(ListingQuery::popular(page, self.library_id.clone()))
            .await
    }

    async fn fetch_latest(&self, page: u32) -> Result<CatalogPage> {
        self.listing_page(ListingQuery::latest(page, self.library_id.clone()))
            .await
    }

    async fn search(&self, page: u32, query: &SearchQuery) -> Result<CatalogPage> {
        if query.text.trim().is_empty() {
            return self.fetch_listing(page).await;
        }
        self.require_library()?;
        let session = self.session().await?;

        let stage_one = ListingQuery::search(page, self.library_id.clone(), query.text.trim());
        let hits = self.fetch_items(&stage_one, &session).await?;
        let total = hits.total_record_count;

        let session = &session;
        let pending: Vec<_> = hits
            .items
            .into_iter()
            .map(|hit| self.expand_hit(hit, session))
            .collect();
        let items = stream::iter(pending)
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .flatten()
            .collect();

        Ok(CatalogPage {
            items,
            has_next_page: has_next_page(page.max(1), SERIES_LIMIT, total),
        })
    }

    async fn fetch_detail(&self, item: &CatalogItem) -> Result<ItemDetail> {
        let session = self.session().await?;
        let dto = self.fetch_item(&item.id, &session).await?;
        let info = match (&dto.series_id, self.preferences.use_expanded_metadata_scope) {
            (Some(series_id), true) => self.fetch_item(series_id, &session).await?,
            _ => dto,
        };

        Ok(ItemDetail {
            id: item.id.clone(),
            title: info.title(),
            description: info.overview.clone(),
            genres: info.genres.clone(),
            thumbnail_url: Some(self.thumbnail_url(&info.id, &session)),
            completed: info.status.as_deref() == Some("Ended"),
        })
    }

    async fn fetch_episodes(&self, item: &CatalogItem) -> Result<Vec<Episode>> {
        let session = self.session().await?;
        let wanted = &self.preferences.episode_details;

        let series_scope = match item.kind {
            ItemKind::Season => item
                .series_id
                .clone()
                .map(|series| (series, Some(item.id.clone()))),
            ItemKind::Series => Some((item.id.clone(), None)),
            _ => None,
        };

        let mut episodes = match series_scope {
            Some((series_id, season_id)) => {
                let mut url = Url::parse(&format!("{}/Shows/{series_id}/Episodes", self.host))?;
                {
                    let mut query = url.query_pairs_mut();
                    query.append_pair("api_key", &session.api_key);
                    if let Some(season_id) = &season_id {
                        query.append_pair("seasonId", season_id);
                    }
                    query
                        .append_pair("userId", &session.user_id)
                        .append_pair("Fields", "Overview,MediaSources");
                }
                let data: ItemsDto = self.client.get_json(url.as_str()).await?;
                data.items
                    .iter()
                    .map(|e| Episode {
                        id: e.id.clone(),
                        name: e.episode_name(),
                        number: e.index_number.unwrap_or(0.0),
                        details: e.details(wanted),
                    })
                    .collect()
            }
            None => {
                let dto = self.fetch_item(&item.id, &session).await?;
                vec![Episode {
                    id: dto.id.clone(),
                    name: if dto.kind() == ItemKind::Movie {
                        "Movie".to_string()
                    } else {
                        dto.episode_name()
                    },
                    number: 1.0,
                    details: dto.details(wanted),
                }]
            }
        };

        episodes.reverse();
        Ok(episodes)
    }

    async fn fetch_video_candidates(&self, episode: &Episode) -> Result<Vec<Candidate>> {
        let session = self.session().await?;
        let url = format!(
            "{}/Items/{}/PlaybackInfo?userId={}&api_key={}",
            self.host, episode.id, session.user_id, session.api_key
        );
        let info: PlaybackInfoDto = self.client.get_json(&url).await?;

        let Some(source) = info.media_sources.first() else {
            debug!("No media sources for {}", episode.id);
            return Ok(Vec::new());
        };
        let target = PlaybackTarget {
            host: self.host.clone(),
            api_key: session.api_key.clone(),
            item_id: episode.id.clone(),
            play_session_id: info.play_session_id.clone(),
        };
        Ok(build_ladder(&source.media_streams, self.preferences.languages(), &target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AuthError, Error};
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct NeverAuthenticator;

    #[async_trait]
    impl Authenticator for NeverAuthenticator {
        async fn login(
            &self,
            _username: &str,
            _password: &str,
        ) -> std::result::Result<Session, AuthError> {
            panic!("login must not be attempted");
        }
    }

    fn source(
        host: &str,
        library_id: &str,
        preferences: Preferences,
    ) -> JellyfinSource<NeverAuthenticator> {
        let settings = JellyfinSettings {
            host_url: host.to_string(),
            library_id: library_id.to_string(),
            ..JellyfinSettings::default()
        };
        let sessions = SessionProvider::new(NeverAuthenticator, "", "")
            .with_session(Session::new("KEY", "UID"));
        let client = FetchClient::new().unwrap();
        JellyfinSource::new(client, &settings, preferences, sessions).unwrap()
    }

    fn item(id: &str, name: &str, type_name: &str) -> serde_json::Value {
        json!({"Id": id, "Name": name, "Type": type_name})
    }

    #[tokio::test]
    async fn listing_maps_items_and_pagination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Users/UID/Items"))
            .and(query_param("StartIndex", "20"))
            .and(query_param("ParentId", "LIB"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Items": [
                    {"Id": "s1", "Name": "Season 1", "Type": "Season", "SeriesId": "show", "SeriesName": "Show"},
                    item("m1", "Film", "Movie"),
                ],
                "TotalRecordCount": 41
            })))
            .mount(&server)
            .await;

        let page = source(&server.uri(), "LIB", Preferences::default())
            .fetch_listing(2)
            .await
            .unwrap();
        assert!(page.has_next_page);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].title, "Show Season 1");
        assert_eq!(page.items[0].kind, ItemKind::Season);
        assert_eq!(page.items[0].series_id.as_deref(), Some("show"));
        assert_eq!(
            page.items[1].thumbnail_url.as_deref(),
            Some(format!("{}/Items/m1/Images/Primary?api_key=KEY", server.uri()).as_str())
        );
    }

    #[tokio::test]
    async fn missing_library_fails_before_any_request() {
        let source = source("http://127.0.0.1:9", "", Preferences::default());
        let err = source.fetch_listing(1).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration(ConfigurationError::MissingLibrary)
        ));
    }

    #[tokio::test]
    async fn search_fans_out_and_omits_failed_series() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Users/UID/Items"))
            .and(query_param("SearchTerm", "hero"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Items": [
                    item("A", "Hero A", "Series"),
                    item("M", "Hero Movie", "Movie"),
                    item("B", "Hero B", "Series"),
                ],
                "TotalRecordCount": 3
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/Users/UID/Items"))
            .and(query_param("ParentId", "A"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Items": [
                    {"Id": "A1", "Name": "Season 1", "Type": "Season", "SeriesName": "Hero A"},
                    {"Id": "A2", "Name": "Season 2", "Type": "Season", "SeriesName": "Hero A"},
                ],
                "TotalRecordCount": 2
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/Users/UID/Items"))
            .and(query_param("ParentId", "B"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let page = source(&server.uri(), "LIB", Preferences::default())
            .search(1, &SearchQuery::text("hero"))
            .await
            .unwrap();
        let ids: Vec<&str> = page.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["A1", "A2", "M"]);
        assert!(!page.has_next_page);
    }

    #[tokio::test]
    async fn season_episodes_are_reversed_with_details() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Shows/show/Episodes"))
            .and(query_param("seasonId", "s1"))
            .and(query_param("userId", "UID"))
            .and(query_param("Fields", "Overview,MediaSources"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Items": [
                    {"Id": "e1", "Name": "Start", "Type": "Episode", "IndexNumber": 1,
                     "Overview": "It begins", "RunTimeTicks": 14_400_000_000_u64},
                    {"Id": "e2", "Name": "Middle", "Type": "Episode", "IndexNumber": 2},
                ]
            })))
            .mount(&server)
            .await;

        let mut preferences = Preferences::default();
        preferences.episode_details = ["Overview".to_string(), "Runtime".to_string()].into();
        let season = CatalogItem {
            id: "s1".into(),
            title: "Show Season 1".into(),
            kind: ItemKind::Season,
            series_id: Some("show".into()),
            thumbnail_url: None,
        };

        let episodes = source(&server.uri(), "LIB", preferences)
            .fetch_episodes(&season)
            .await
            .unwrap();
        assert_eq!(episodes.len(), 2);
        assert_eq!(episodes[0].id, "e2");
        assert_eq!(episodes[1].name, "Ep. 1 - Start");
        assert_eq!(episodes[1].details.as_deref(), Some("It begins • 24 min"));
        assert_eq!(episodes[0].details, None);
    }

    #[tokio::test]
    async fn expanded_scope_reads_series_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Users/UID/Items/s1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Id": "s1", "Name": "Season 1", "Type": "Season", "SeriesId": "show", "Overview": "season text"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/Users/UID/Items/show"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Id": "show", "Name": "Show", "Type": "Series", "Overview": "series text",
                "Genres": ["Drama"], "Status": "Ended"
            })))
            .mount(&server)
            .await;

        let season = CatalogItem {
            id: "s1".into(),
            title: "Season 1".into(),
            kind: ItemKind::Season,
            series_id: Some("show".into()),
            thumbnail_url: None,
        };

        let narrow = source(&server.uri(), "LIB", Preferences::default())
            .fetch_detail(&season)
            .await
            .unwrap();
        assert_eq!(narrow.description.as_deref(), Some("season text"));
        assert!(!narrow.completed);

        let preferences = Preferences {
            use_expanded_metadata_scope: true,
            ..Preferences::default()
        };
        let wide = source(&server.uri(), "LIB", preferences)
            .fetch_detail(&season)
            .await
            .unwrap();
        assert_eq!(wide.id, "s1");
        assert_eq!(wide.description.as_deref(), Some("series text"));
        assert_eq!(wide.genres, vec!["Drama"]);
        assert!(wide.completed);
    }

    #[tokio::test]
    async fn playback_info_feeds_the_ladder() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Items/e1/PlaybackInfo"))
            .and(query_param("userId", "UID"))
            .and(query_param("api_key", "KEY"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "PlaySessionId": "PS1",
                "MediaSources": [{
                    "MediaStreams": [
                        {"Type": "Video", "Index": 0, "Width": 1920, "Height": 1080},
                        {"Type": "Audio", "Index": 1, "Language": "eng"},
                        {"Type": "Audio", "Index": 2, "Language": "jpn"},
                        {"Type": "Subtitle", "Index": 3, "Language": "eng", "Codec": "srt",
                         "DisplayTitle": "English", "IsExternal": true, "SupportsExternalStream": true}
                    ]
                }]
            })))
            .mount(&server)
            .await;

        let episode = Episode {
            id: "e1".into(),
            name: "Ep. 1".into(),
            number: 1.0,
            details: None,
        };
        let candidates = source(&server.uri(), "LIB", Preferences::default())
            .fetch_video_candidates(&episode)
            .await
            .unwrap();

        assert_eq!(candidates.first().map(|c| c.label.as_str()), Some("Source"));
        let transcode = candidates
            .iter()
            .find(|c| c.label.starts_with("720p"))
            .unwrap();
        assert_eq!(transcode.audio_track_index, Some(2));
        assert!(transcode.playback_url.contains("PlaySessionId=PS1"));
        assert_eq!(transcode.subtitle_tracks.len(), 1);
    }

    #[tokio::test]
    async fn item_without_media_sources_has_no_candidates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Items/e1/PlaybackInfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"MediaSources": []})))
            .mount(&server)
            .await;

        let episode = Episode {
            id: "e1".into(),
            name: "Ep. 1".into(),
            number: 1.0,
            details: None,
        };
        let candidates = source(&server.uri(), "LIB", Preferences::default())
            .fetch_video_candidates(&episode)
            .await
            .unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn libraries_are_listed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Users/UID/Items"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Items": [item("L1", "Anime", "CollectionFolder"), item("L2", "Movies", "CollectionFolder")]
            })))
            .mount(&server)
            .await;

        let libraries = source(&server.uri(), "", Preferences::default())
            .fetch_libraries()
            .await
            .unwrap();
        assert_eq!(
            libraries,
            vec![
                Library {
                    id: "L1".into(),
                    name: "Anime".into(),
                },
                Library {
                    id: "L2".into(),
                    name: "Movies".into(),
                },
            ]
        );
    }

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.00 GB");
    }
}
