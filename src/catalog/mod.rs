//! Catalog sources.
//!
//! A catalog source lists items, expands them into episodes and turns an
//! episode into playback candidates. Two sources ship:
//!
//! - [`jellyfin::JellyfinSource`]: a structured media backend; candidates
//!   come from the quality ladder
//! - [`pelisplus::PelisplusSource`]: a scraped site; candidates come from
//!   third-party embeds through the decoder dispatcher
//!
//! [`ListingQuery`] builds the paginated listing requests of the
//! structured backend.
//!
//! # Example
//!
//! ```rust,no_run
//! use streamsift::catalog::{resolve_ranked, CatalogSource, PelisplusSource};
//! use streamsift::{Config, FetchClient};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::default();
//! let source = PelisplusSource::new(FetchClient::new()?, &config)?;
//!
//! let page = source.fetch_listing(1).await?;
//! let item = &page.items[0];
//! let episodes = source.fetch_episodes(item).await?;
//! let ranked = resolve_ranked(&source, &episodes[0], &config.preferences).await?;
//! println!("{} candidates", ranked.len());
//! # Ok(())
//! # }
//! ```

pub mod jellyfin;
pub mod pelisplus;

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::config::Preferences;
use crate::error::{ConfigurationError, Result};
use crate::model::{Candidate, CatalogItem, CatalogPage, Episode, ItemDetail};
use crate::rank::rank;
use crate::session::Session;

pub use jellyfin::JellyfinSource;
pub use pelisplus::PelisplusSource;

/// Page size of library listings.
pub const SEASONS_LIMIT: u32 = 20;

/// Page size of search listings; each hit fans out into its seasons.
pub const SERIES_LIMIT: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ascending => "Ascending",
            Self::Descending => "Descending",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    /// Comma-separated backend sort fields, e.g. `"DateCreated,SortName"`.
    pub field: String,
    pub order: SortOrder,
}

impl Sort {
    pub fn new(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            field: field.into(),
            order,
        }
    }
}

/// Parameters of one item listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    /// 1-based; `0` is read as `1`.
    pub page: u32,
    pub sort: Sort,
    pub item_types: Vec<String>,
    /// Library (or series) the listing is scoped to.
    pub parent_id: String,
    pub search_term: Option<String>,
    /// Page size; `None` lists everything without paging.
    pub limit: Option<u32>,
}

/// A built listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRequest {
    pub url: String,
    pub offset: u32,
    pub limit: Option<u32>,
}

fn types(list: &[&str]) -> Vec<String> {
    list.iter().map(|t| (*t).to_string()).collect()
}

impl ListingQuery {
    /// Library listing sorted by name.
    pub fn popular(page: u32, library_id: impl Into<String>) -> Self {
        Self {
            page,
            sort: Sort::new("SortName", SortOrder::Ascending),
            item_types: types(&["Movie", "Season"]),
            parent_id: library_id.into(),
            search_term: None,
            limit: Some(SEASONS_LIMIT),
        }
    }

    /// Library listing, newest additions first.
    pub fn latest(page: u32, library_id: impl Into<String>) -> Self {
        Self {
            sort: Sort::new("DateCreated,SortName", SortOrder::Descending),
            ..Self::popular(page, library_id)
        }
    }

    /// First search stage: movies and whole series matching `term`.
    pub fn search(page: u32, library_id: impl Into<String>, term: impl Into<String>) -> Self {
        Self {
            item_types: types(&["Movie", "Series"]),
            search_term: Some(term.into()),
            limit: Some(SERIES_LIMIT),
            ..Self::popular(page, library_id)
        }
    }

    /// Second search stage: every movie and season under `parent_id`.
    pub fn children(parent_id: impl Into<String>) -> Self {
        Self {
            limit: None,
            ..Self::popular(1, parent_id)
        }
    }

    /// Items skipped before this page.
    pub fn offset(&self) -> u32 {
        let Some(limit) = self.limit else { return 0 };
        self.page.max(1).saturating_sub(1).saturating_mul(limit)
    }

    /// Build the listing URL against `host` for `session`.
    pub fn build(&self, host: &str, session: &Session) -> Result<ListingRequest> {
        if self.parent_id.is_empty() {
            return Err(ConfigurationError::MissingLibrary.into());
        }

        let base = format!(
            "{}/Users/{}/Items",
            host.trim_end_matches('/'),
            session.user_id
        );
        let mut url = Url::parse(&base).map_err(|source| ConfigurationError::InvalidHostUrl {
            url: host.to_string(),
            source,
        })?;

        let offset = self.offset();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("api_key", &session.api_key);
            if let Some(limit) = self.limit {
                query
                    .append_pair("StartIndex", &offset.to_string())
                    .append_pair("Limit", &limit.to_string());
            }
            query
                .append_pair("Recursive", "true")
                .append_pair("SortBy", &self.sort.field)
                .append_pair("SortOrder", self.sort.order.as_str())
                .append_pair("IncludeItemTypes", &self.item_types.join(","))
                .append_pair("ImageTypeLimit", "1")
                .append_pair("ParentId", &self.parent_id)
                .append_pair("EnableImageTypes", "Primary");
            if let Some(term) = &self.search_term {
                query.append_pair("SearchTerm", term);
            }
        }

        Ok(ListingRequest {
            url: url.into(),
            offset,
            limit: self.limit,
        })
    }
}

/// Whether items remain after `page` (1-based).
pub fn has_next_page(page: u32, page_size: u32, total: u32) -> bool {
    u64::from(page_size) * u64::from(page.max(1)) < u64::from(total)
}

/// Free-text search plus the filters a scraped site understands.
///
/// Text wins over genre, genre over year.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub text: String,
    pub genre: Option<String>,
    pub year: Option<u32>,
}

impl SearchQuery {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// A browsable catalog that ends in playback candidates.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Source name (e.g., `"jellyfin"`).
    fn name(&self) -> &'static str;

    /// Resolve a single item by id.
    async fn lookup(&self, id: &str) -> Result<CatalogItem>;

    async fn fetch_listing(&self, page: u32) -> Result<CatalogPage>;

    async fn fetch_latest(&self, page: u32) -> Result<CatalogPage>;

    async fn search(&self, page: u32, query: &SearchQuery) -> Result<CatalogPage>;

    async fn fetch_detail(&self, item: &CatalogItem) -> Result<ItemDetail>;

    /// Episodes of an item, newest first. Movies yield one entry.
    async fn fetch_episodes(&self, item: &CatalogItem) -> Result<Vec<Episode>>;

    /// Unordered playback candidates for one episode. Empty is a valid
    /// answer.
    async fn fetch_video_candidates(&self, episode: &Episode) -> Result<Vec<Candidate>>;
}

/// Fetch an episode's candidates and order them by preference.
pub async fn resolve_ranked(
    source: &dyn CatalogSource,
    episode: &Episode,
    preferences: &Preferences,
) -> Result<Vec<Candidate>> {
    let candidates = source.fetch_video_candidates(episode).await?;
    debug!(
        "{} produced {} candidates for {}",
        source.name(),
        candidates.len(),
        episode.id
    );
    Ok(rank(
        candidates,
        &preferences.preferred_host_label,
        &preferences.preferred_quality_label,
    ))
}
