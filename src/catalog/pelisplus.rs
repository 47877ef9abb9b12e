//! PelisPlusHD-style scraped catalog.
//!
//! Listing, detail and episode pages are parsed with CSS selectors.
//! Episode pages embed a player API URL (`video[1] = '…'`); its option list
//! and the page's legacy server tabs yield embed references that go through
//! the decoder [`Dispatcher`].

use std::sync::LazyLock;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

use super::{CatalogSource, SearchQuery};
use crate::config::Config;
use crate::decoder::{DecoderRegistry, Dispatcher};
use crate::embed::{player_token, rewrite_legacy};
use crate::error::{ConfigurationError, DecodeError, Result};
use crate::http_client::FetchClient;
use crate::model::{Candidate, CatalogItem, CatalogPage, Episode, ItemDetail, ItemKind};

/// `(display name, path)` of the site's genre filter.
pub const GENRES: &[(&str, &str)] = &[
    ("Peliculas", "peliculas"),
    ("Series", "series"),
    ("Doramas", "generos/dorama"),
    ("Animes", "animes"),
    ("Acción", "generos/accion"),
    ("Animación", "generos/animacion"),
    ("Aventura", "generos/aventura"),
    ("Ciencia Ficción", "generos/ciencia-ficcion"),
    ("Comedia", "generos/comedia"),
    ("Crimen", "generos/crimen"),
    ("Documental", "generos/documental"),
    ("Drama", "generos/drama"),
    ("Fantasía", "generos/fantasia"),
    ("Foreign", "generos/foreign"),
    ("Guerra", "generos/guerra"),
    ("Historia", "generos/historia"),
    ("Misterio", "generos/misterio"),
    ("Pelicula de Televisión", "generos/pelicula-de-la-television"),
    ("Romance", "generos/romance"),
    ("Suspense", "generos/suspense"),
    ("Terror", "generos/terror"),
    ("Western", "generos/western"),
];

const MOVIE_PATH: &str = "/pelicula/";
const MOVIE_EPISODE_NAME: &str = "PELÍCULA";
const PLAYER_MARKER: &str = "video[1] = ";

static POSTER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.Posters a.Posters-link").unwrap());
static POSTER_TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.listing-content p").unwrap());
static POSTER_IMG: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").unwrap());
static NEXT_PAGE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a.page-link").unwrap());
static DETAIL_TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1.m-b-5").unwrap());
static DETAIL_THUMB: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.card-body div.row div.col-sm-3 img.img-fluid").unwrap());
static DETAIL_TEXT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.col-sm-4 div.text-large").unwrap());
static DETAIL_GENRES: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.p-v-20.p-h-15.text-center a span").unwrap());
static EPISODE_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.tab-content div a").unwrap());
static SCRIPT: LazyLock<Selector> = LazyLock::new(|| Selector::parse("script").unwrap());
static PLAYER_OPTION: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        r#"#PlayerDisplay div[class*="OptionsLangDisp"] div[class*="ODDIV"] div[class*="OD"] li"#,
    )
    .unwrap()
});
static SERVER_TAB: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("ul.TbVideoNv.nav.nav-tabs li").unwrap());
static ALTERNATIVE_TAB: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("ul.TbVideoNv.nav.nav-tabs li:not(:first-child)").unwrap());
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());

/// Site path of a genre, by display name or path (case-insensitive).
pub fn genre_path(genre: &str) -> Option<&'static str> {
    let wanted = genre.trim().to_lowercase();
    GENRES
        .iter()
        .find(|(name, path)| name.to_lowercase() == wanted || *path == wanted)
        .map(|(_, path)| *path)
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of the element's own text nodes, ignoring child elements.
fn own_text(el: ElementRef<'_>) -> String {
    el.children()
        .filter_map(|n| n.value().as_text().map(|t| t.to_string()))
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Path (and query) of `href` resolved against `base`.
fn site_path(base: &Url, href: &str) -> Option<String> {
    let url = base.join(href.trim()).ok()?;
    Some(match url.query() {
        Some(q) => format!("{}?{q}", url.path()),
        None => url.path().to_string(),
    })
}

fn kind_of(path: &str) -> ItemKind {
    if path.contains(MOVIE_PATH) {
        ItemKind::Movie
    } else {
        ItemKind::Series
    }
}

/// Parse a poster listing page.
pub fn parse_listing(html: &str, base: &Url) -> CatalogPage {
    let document = Html::parse_document(html);
    let items = document
        .select(&POSTER)
        .filter_map(|poster| {
            let id = site_path(base, poster.value().attr("href")?)?;
            let title = poster
                .select(&POSTER_TITLE)
                .next()
                .map(text_of)
                .unwrap_or_default();
            let thumbnail_url = poster
                .select(&POSTER_IMG)
                .next()
                .and_then(|img| img.value().attr("src"))
                .map(|src| src.replace("/w154/", "/w200/"));
            Some(CatalogItem {
                kind: kind_of(&id),
                id,
                title,
                series_id: None,
                thumbnail_url,
            })
        })
        .collect();

    CatalogPage {
        items,
        has_next_page: document.select(&NEXT_PAGE).next().is_some(),
    }
}

/// Parse a title's detail page.
pub fn parse_detail(html: &str, id: &str) -> Result<ItemDetail> {
    let document = Html::parse_document(html);
    let title = document
        .select(&DETAIL_TITLE)
        .next()
        .map(text_of)
        .ok_or_else(|| DecodeError::MissingMarkup("detail title".into()))?;
    let thumbnail_url = document
        .select(&DETAIL_THUMB)
        .next()
        .and_then(|img| img.value().attr("src"))
        .map(|src| src.replace("/w154/", "/w500/"));
    let description = document
        .select(&DETAIL_TEXT)
        .next()
        .map(own_text)
        .filter(|d| !d.is_empty());
    let genres = document.select(&DETAIL_GENRES).map(text_of).collect();

    Ok(ItemDetail {
        id: id.to_string(),
        title,
        description,
        genres,
        thumbnail_url,
        // the site only lists finished titles
        completed: true,
    })
}

/// Parse a title page into episodes, newest first.
#[allow(clippy::cast_precision_loss)]
pub fn parse_episodes(html: &str, page_path: &str, base: &Url) -> Vec<Episode> {
    if page_path.contains(MOVIE_PATH) {
        return vec![Episode {
            id: page_path.to_string(),
            name: MOVIE_EPISODE_NAME.to_string(),
            number: 1.0,
            details: None,
        }];
    }

    let document = Html::parse_document(html);
    let mut episodes: Vec<Episode> = document
        .select(&EPISODE_LINK)
        .filter_map(|a| {
            let id = site_path(base, a.value().attr("href")?)?;
            Some((id, text_of(a)))
        })
        .enumerate()
        .map(|(i, (id, name))| Episode {
            id,
            name,
            number: (i + 1) as f32,
            details: None,
        })
        .collect();
    episodes.reverse();
    episodes
}

/// Player data scraped from an episode page.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PlayerPage {
    /// The inline script declaring `video[n]` URLs.
    pub script: String,
    /// Player API URL (`video[1]`), empty when absent.
    pub api_url: String,
    /// `(label, data-id)` of every server tab.
    pub tabs: Vec<(String, String)>,
    pub has_alternatives: bool,
}

impl PlayerPage {
    /// Whether the legacy server tabs must be consulted.
    pub fn needs_legacy(&self) -> bool {
        !self.api_url.contains("/video/") || self.has_alternatives
    }

    /// Legacy embed URLs, one per tab, rewritten off the relay.
    pub fn legacy_embeds(&self) -> Vec<String> {
        self.tabs
            .iter()
            .filter_map(|(label, id)| {
                let url = script_value(&self.script, &format!("video[{id}] = '"))?;
                Some(rewrite_legacy(label, url))
            })
            .collect()
    }
}

fn script_value<'a>(script: &'a str, marker: &str) -> Option<&'a str> {
    let (_, rest) = script.split_once(marker)?;
    let (value, _) = rest.split_once("';")?;
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

/// Parse the player script and server tabs of an episode page.
pub fn parse_player_page(html: &str) -> Result<PlayerPage> {
    let document = Html::parse_document(html);
    let script = document
        .select(&SCRIPT)
        .map(|s| s.text().collect::<String>())
        .find(|text| text.contains(PLAYER_MARKER))
        .ok_or_else(|| DecodeError::MissingMarkup("player script".into()))?;

    let tabs = document
        .select(&SERVER_TAB)
        .filter_map(|li| {
            let id = li.value().attr("data-id")?.trim().to_string();
            let label = li.select(&ANCHOR).next().map(text_of).unwrap_or_default();
            Some((label, id))
        })
        .collect();

    Ok(PlayerPage {
        api_url: script_value(&script, "video[1] = '")
            .unwrap_or_default()
            .to_string(),
        has_alternatives: document.select(&ALTERNATIVE_TAB).next().is_some(),
        tabs,
        script,
    })
}

/// Raw embed tokens from the player API page's option list.
pub fn parse_player_options(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&PLAYER_OPTION)
        .filter_map(|li| li.value().attr("onclick"))
        .map(|onclick| player_token(onclick).to_string())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Catalog scraped from a PelisPlusHD-style site.
pub struct PelisplusSource {
    client: FetchClient,
    base: Url,
    dispatcher: Dispatcher,
}

impl PelisplusSource {
    /// Source from the `[pelisplus]` table with every shipped decoder.
    pub fn new(client: FetchClient, config: &Config) -> Result<Self> {
        let base = Url::parse(&config.pelisplus.base_url).map_err(|source| {
            ConfigurationError::InvalidHostUrl {
                url: config.pelisplus.base_url.clone(),
                source,
            }
        })?;
        let dispatcher = Dispatcher::new(client.clone(), DecoderRegistry::with_defaults())
            .with_concurrency(config.http.max_concurrent_decodes);
        Ok(Self::with_dispatcher(client, base, dispatcher))
    }

    pub fn with_dispatcher(client: FetchClient, base: Url, dispatcher: Dispatcher) -> Self {
        Self {
            client,
            base,
            dispatcher,
        }
    }

    fn absolute(&self, path: &str) -> Result<String> {
        Ok(self.base.join(path)?.into())
    }

    /// URL of a search results page.
    pub fn search_url(&self, page: u32, query: &SearchQuery) -> Result<String> {
        let page = page.max(1);
        let path = if !query.text.trim().is_empty() {
            format!(
                "search?s={}&page={page}",
                urlencoding::encode(query.text.trim())
            )
        } else if let Some(genre) = query.genre.as_deref().and_then(genre_path) {
            format!("{genre}?page={page}")
        } else if let Some(year) = query.year {
            format!("year/{year}?page={page}")
        } else {
            if let Some(genre) = &query.genre {
                debug!("Unknown genre filter {:?}, ignoring", genre);
            }
            format!("peliculas?page={page}")
        };
        self.absolute(&format!("/{path}"))
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        Ok(self.client.fetch_text(url).await?)
    }

    /// Embed references of an episode page, API options first.
    async fn collect_embeds(&self, html: &str) -> Result<Vec<String>> {
        let player = parse_player_page(html)?;
        let mut embeds = Vec::new();
        let mut api_failed = false;

        if !player.api_url.is_empty() {
            match self.fetch_page(&player.api_url).await {
                Ok(api_html) => embeds.extend(parse_player_options(&api_html)),
                Err(e) => {
                    warn!(
                        "Player API {} unavailable, using server tabs: {}",
                        player.api_url, e
                    );
                    api_failed = true;
                }
            }
        }

        if api_failed || player.needs_legacy() {
            embeds.extend(player.legacy_embeds());
        }
        Ok(embeds)
    }
}

#[async_trait]
impl CatalogSource for PelisplusSource {
    fn name(&self) -> &'static str {
        "pelisplus"
    }

    async fn lookup(&self, id: &str) -> Result<CatalogItem> {
        let html = self.fetch_page(&self.absolute(id)?).await?;
        let detail = parse_detail(&html, id)?;
        Ok(CatalogItem {
            id: id.to_string(),
            title: detail.title,
            kind: kind_of(id),
            series_id: None,
            thumbnail_url: detail.thumbnail_url,
        })
    }

    async fn fetch_listing(&self, page: u32) -> Result<CatalogPage> {
        let url = self.absolute(&format!("/series?page={}", page.max(1)))?;
        let html = self.fetch_page(&url).await?;
        Ok(parse_listing(&html, &self.base))
    }

    /// The site has no separate feed of recent additions.
    async fn fetch_latest(&self, page: u32) -> Result<CatalogPage> {
        self.fetch_listing(page).await
    }

    async fn search(&self, page: u32, query: &SearchQuery) -> Result<CatalogPage> {
        let html = self.fetch_page(&self.search_url(page, query)?).await?;
        Ok(parse_listing(&html, &self.base))
    }

    async fn fetch_detail(&self, item: &CatalogItem) -> Result<ItemDetail> {
        let html = self.fetch_page(&self.absolute(&item.id)?).await?;
        parse_detail(&html, &item.id)
    }

    async fn fetch_episodes(&self, item: &CatalogItem) -> Result<Vec<Episode>> {
        if item.id.contains(MOVIE_PATH) {
            return Ok(parse_episodes("", &item.id, &self.base));
        }
        let html = self.fetch_page(&self.absolute(&item.id)?).await?;
        Ok(parse_episodes(&html, &item.id, &self.base))
    }

    async fn fetch_video_candidates(&self, episode: &Episode) -> Result<Vec<Candidate>> {
        let html = self.fetch_page(&self.absolute(&episode.id)?).await?;
        let embeds = self.collect_embeds(&html).await?;
        debug!("{} embed references for {}", embeds.len(), episode.id);
        Ok(self.dispatcher.resolve_all(&embeds).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::EmbedDecoder;
    use crate::embed::HostKind;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use reqwest::header::HeaderMap;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LISTING: &str = r#"<html><body>
        <div class="Posters">
            <a class="Posters-link" href="https://pelisplushd.nz/serie/the-show">
                <img src="https://image.tmdb.org/t/p/w154/show.jpg">
                <div class="listing-content"><p>The Show</p></div>
            </a>
            <a class="Posters-link" href="/pelicula/the-film">
                <img src="https://image.tmdb.org/t/p/w154/film.jpg">
                <div class="listing-content"><p>The Film</p></div>
            </a>
        </div>
        <ul class="pagination"><li><a class="page-link" href="?page=2">2</a></li></ul>
    </body></html>"#;

    const DETAIL: &str = r#"<html><body>
        <h1 class="m-b-5">The Show</h1>
        <div class="card-body"><div class="row">
            <div class="col-sm-3"><img class="img-fluid" src="https://image.tmdb.org/t/p/w154/show.jpg"></div>
            <div class="col-sm-4"><div class="text-large">A long story. <span>(more)</span></div></div>
        </div></div>
        <div class="p-v-20 p-h-15 text-center">
            <a href="/generos/drama"><span>Drama</span></a>
            <a href="/generos/misterio"><span>Misterio</span></a>
        </div>
    </body></html>"#;

    const SERIES_PAGE: &str = r#"<html><body><div class="tab-content">
        <div id="season-1">
            <a href="/serie/the-show/temporada/1/capitulo/1">T1 - E1: Pilot</a>
            <a href="/serie/the-show/temporada/1/capitulo/2">T1 - E2: Next</a>
        </div>
    </div></body></html>"#;

    fn base() -> Url {
        Url::parse("https://pelisplushd.nz").unwrap()
    }

    fn episode_page(api_url: &str, legacy: &str) -> String {
        format!(
            r#"<html><body>
            <ul class="TbVideoNv nav nav-tabs">
                <li data-id="1"><a>Opción 1</a></li>
                <li data-id="2"><a>doodstream</a></li>
            </ul>
            <script>
                var video = [];
                video[1] = '{api_url}';
                video[2] = '{legacy}';
            </script>
            </body></html>"#
        )
    }

    fn api_page(tokens: &[String]) -> String {
        let items: String = tokens
            .iter()
            .map(|t| format!(r#"<li onclick="go_to_player('{t}')"><span>Server</span></li>"#))
            .collect();
        format!(
            r#"<div id="PlayerDisplay"><div class="OptionsLangDisp"><div class="ODDIV"><div class="OD_1 REactiv">{items}</div></div></div></div>"#
        )
    }

    #[test]
    fn listing_items_and_next_page() {
        let page = parse_listing(LISTING, &base());
        assert!(page.has_next_page);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].id, "/serie/the-show");
        assert_eq!(page.items[0].title, "The Show");
        assert_eq!(page.items[0].kind, ItemKind::Series);
        assert_eq!(
            page.items[0].thumbnail_url.as_deref(),
            Some("https://image.tmdb.org/t/p/w200/show.jpg")
        );
        assert_eq!(page.items[1].id, "/pelicula/the-film");
        assert_eq!(page.items[1].kind, ItemKind::Movie);
    }

    #[test]
    fn last_listing_page_has_no_next() {
        let page = parse_listing(r#"<div class="Posters"></div>"#, &base());
        assert!(page.items.is_empty());
        assert!(!page.has_next_page);
    }

    #[test]
    fn detail_fields() {
        let detail = parse_detail(DETAIL, "/serie/the-show").unwrap();
        assert_eq!(detail.title, "The Show");
        assert_eq!(detail.description.as_deref(), Some("A long story."));
        assert_eq!(detail.genres, vec!["Drama", "Misterio"]);
        assert_eq!(
            detail.thumbnail_url.as_deref(),
            Some("https://image.tmdb.org/t/p/w500/show.jpg")
        );
        assert!(detail.completed);
    }

    #[test]
    fn detail_without_title_is_missing_markup() {
        assert!(parse_detail("<html></html>", "/x").is_err());
    }

    #[test]
    fn series_episodes_are_numbered_then_reversed() {
        let episodes = parse_episodes(SERIES_PAGE, "/serie/the-show", &base());
        assert_eq!(episodes.len(), 2);
        assert_eq!(episodes[0].name, "T1 - E2: Next");
        assert!((episodes[0].number - 2.0).abs() < f32::EPSILON);
        assert_eq!(episodes[1].id, "/serie/the-show/temporada/1/capitulo/1");
    }

    #[test]
    fn movie_is_a_single_episode() {
        let episodes = parse_episodes("", "/pelicula/the-film", &base());
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].name, "PELÍCULA");
        assert_eq!(episodes[0].id, "/pelicula/the-film");
    }

    #[test]
    fn player_page_script_and_tabs() {
        let html = episode_page(
            "https://api.example/video/abc",
            "https://api.mycdn.moe/player/?id=xyz",
        );
        let player = parse_player_page(&html).unwrap();
        assert_eq!(player.api_url, "https://api.example/video/abc");
        assert_eq!(player.tabs.len(), 2);
        assert!(player.has_alternatives);
        assert!(player.needs_legacy());
        assert_eq!(
            player.legacy_embeds(),
            vec![
                "https://api.example/video/abc".to_string(),
                "https://dood.to/e/xyz".to_string(),
            ]
        );
    }

    #[test]
    fn page_without_player_script_fails() {
        assert!(parse_player_page("<html><script>var x = 1;</script></html>").is_err());
    }

    #[test]
    fn player_options_yield_tokens() {
        let html = api_page(&["aHR0cHM6Ly92b2Uuc3gvZS8xMjM=?cover_url=x".to_string()]);
        assert_eq!(
            parse_player_options(&html),
            vec!["aHR0cHM6Ly92b2Uuc3gvZS8xMjM=?cover_url=x"]
        );
    }

    #[test]
    fn genre_lookup_by_name_or_path() {
        assert_eq!(genre_path("Acción"), Some("generos/accion"));
        assert_eq!(
            genre_path("ciencia ficción"),
            Some("generos/ciencia-ficcion")
        );
        assert_eq!(genre_path("generos/terror"), Some("generos/terror"));
        assert_eq!(genre_path("Opera"), None);
    }

    fn source_at(base: &str, registry: DecoderRegistry) -> PelisplusSource {
        let client = FetchClient::new().unwrap();
        let dispatcher = Dispatcher::new(client.clone(), registry);
        PelisplusSource::with_dispatcher(client, Url::parse(base).unwrap(), dispatcher)
    }

    #[test]
    fn search_url_precedence() {
        let source = source_at("https://pelisplushd.nz", DecoderRegistry::empty());
        let text = SearchQuery {
            text: "la casa".into(),
            genre: Some("Drama".into()),
            year: Some(2020),
        };
        assert_eq!(
            source.search_url(2, &text).unwrap(),
            "https://pelisplushd.nz/search?s=la%20casa&page=2"
        );
        let genre = SearchQuery {
            genre: Some("Drama".into()),
            year: Some(2020),
            ..SearchQuery::default()
        };
        assert_eq!(
            source.search_url(1, &genre).unwrap(),
            "https://pelisplushd.nz/generos/drama?page=1"
        );
        let year = SearchQuery {
            year: Some(2020),
            ..SearchQuery::default()
        };
        assert_eq!(
            source.search_url(1, &year).unwrap(),
            "https://pelisplushd.nz/year/2020?page=1"
        );
        assert_eq!(
            source.search_url(3, &SearchQuery::default()).unwrap(),
            "https://pelisplushd.nz/peliculas?page=3"
        );
    }

    /// Labels candidates with the embed's last path segment.
    struct EchoDecoder(&'static str);

    #[async_trait]
    impl EmbedDecoder for EchoDecoder {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn resolve(
            &self,
            url: &str,
            _client: &FetchClient,
            _headers: Option<&HeaderMap>,
        ) -> Result<Vec<Candidate>> {
            let id = url.rsplit('/').next().unwrap_or_default();
            let label = format!("{}:{id}", self.0);
            Ok(Candidate::new(format!("https://cdn.example/{id}"), label)
                .into_iter()
                .collect())
        }
    }

    fn echo_registry() -> DecoderRegistry {
        let mut registry = DecoderRegistry::empty();
        registry.register(HostKind::Voe, EchoDecoder("Voe"));
        registry.register(HostKind::DoodStream, EchoDecoder("DoodStream"));
        registry
    }

    #[tokio::test]
    async fn video_candidates_from_api_options_and_legacy_tabs() {
        let server = MockServer::start().await;
        let api_url = format!("{}/player/video/abc", server.uri());
        Mock::given(method("GET"))
            .and(path("/serie/the-show/temporada/1/capitulo/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(episode_page(
                &api_url,
                "https://api.mycdn.moe/player/?id=xyz",
            )))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/player/video/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_string(api_page(&[
                STANDARD.encode("https://voe.sx/e/v1"),
                "https://unknown.example/e/skip".to_string(),
            ])))
            .mount(&server)
            .await;

        let source = source_at(&server.uri(), echo_registry());
        let episode = Episode {
            id: "/serie/the-show/temporada/1/capitulo/1".into(),
            name: "Pilot".into(),
            number: 1.0,
            details: None,
        };
        let candidates = source.fetch_video_candidates(&episode).await.unwrap();
        let labels: Vec<&str> = candidates.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["Voe:v1", "DoodStream:xyz"]);
    }

    #[tokio::test]
    async fn video_candidates_resolve_on_a_spawned_task() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pelicula/the-film"))
            .respond_with(ResponseTemplate::new(200).set_body_string(episode_page(
                &format!("{}/player/video/none", server.uri()),
                "https://api.mycdn.moe/player/?id=m1",
            )))
            .mount(&server)
            .await;

        let source: Arc<dyn CatalogSource> = Arc::new(source_at(&server.uri(), echo_registry()));
        let episode = Episode {
            id: "/pelicula/the-film".into(),
            name: "Película".into(),
            number: 1.0,
            details: None,
        };

        let task = tokio::spawn(async move { source.fetch_video_candidates(&episode).await });

        let candidates = task.await.unwrap().unwrap();
        let labels: Vec<&str> = candidates.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["DoodStream:m1"]);
    }

    #[tokio::test]
    async fn unavailable_player_api_falls_back_to_tabs() {
        let server = MockServer::start().await;
        let api_url = format!("{}/player/video/abc", server.uri());
        Mock::given(method("GET"))
            .and(path("/serie/x/temporada/1/capitulo/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                r#"<ul class="TbVideoNv nav nav-tabs"><li data-id="1"><a>Voe</a></li></ul>
                <script>video[1] = '{api_url}';</script>
                <ul class="TbVideoNv nav nav-tabs"></ul>"#
            )))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/player/video/abc"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let source = source_at(&server.uri(), echo_registry());
        let episode = Episode {
            id: "/serie/x/temporada/1/capitulo/1".into(),
            name: "E1".into(),
            number: 1.0,
            details: None,
        };
        // the only tab points back at the failed API URL, which classifies
        // as no known host
        let candidates = source.fetch_video_candidates(&episode).await.unwrap();
        assert!(candidates.is_empty());
    }
}
