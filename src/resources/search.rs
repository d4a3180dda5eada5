use serde::Serialize;

use crate::transport::{BlockingTransport, Transport};
use crate::types::SearchHtsItem;
use crate::{ApiRequest, Result};

const SEARCH_HTS_PATH: &str = "/search/hts";

/// Parameters for an HTS code search.
///
/// Unset fields are left out of the query string. Flags that default to off
/// are only sent when switched on. `limit` is always sent and starts at
/// [`DEFAULT_SEARCH_LIMIT`].
///
/// # Examples
///
/// ```
/// use neo_tariff::HtsSearchParams;
///
/// let params = HtsSearchParams::query("hot-rolled steel")
///     .chapter("72")
///     .limit(5);
/// assert_eq!(params.limit, Some(5));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HtsSearchParams {
    pub query: Option<String>,
    pub code: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub fuzzy: bool,
    pub section: Option<String>,
    pub chapter: Option<String>,
    /// Maximum number of results; [`DEFAULT_SEARCH_LIMIT`] unless changed.
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "is_false")]
    pub include_notes: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub semantic: bool,
    /// `YYYY-MM-DD`; selects the revision in force on that date.
    pub hts_date: Option<String>,
    pub hts_year: Option<i32>,
    pub hts_version: Option<i32>,
}

/// Result limit sent when the caller does not pick one.
pub const DEFAULT_SEARCH_LIMIT: u32 = 10;

impl Default for HtsSearchParams {
    fn default() -> Self {
        Self {
            query: None,
            code: None,
            fuzzy: false,
            section: None,
            chapter: None,
            limit: Some(DEFAULT_SEARCH_LIMIT),
            include_notes: false,
            semantic: false,
            hts_date: None,
            hts_year: None,
            hts_version: None,
        }
    }
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

impl HtsSearchParams {
    /// Search by description text.
    pub fn query(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::default()
        }
    }

    /// Search by code prefix.
    pub fn code(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            ..Self::default()
        }
    }

    pub fn fuzzy(mut self, fuzzy: bool) -> Self {
        self.fuzzy = fuzzy;
        self
    }

    pub fn section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    pub fn chapter(mut self, chapter: impl Into<String>) -> Self {
        self.chapter = Some(chapter.into());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn include_notes(mut self, include_notes: bool) -> Self {
        self.include_notes = include_notes;
        self
    }

    pub fn semantic(mut self, semantic: bool) -> Self {
        self.semantic = semantic;
        self
    }

    pub fn hts_date(mut self, hts_date: impl Into<String>) -> Self {
        self.hts_date = Some(hts_date.into());
        self
    }

    /// Pins the search to one revision.
    pub fn revision(mut self, hts_year: i32, hts_version: i32) -> Self {
        self.hts_year = Some(hts_year);
        self.hts_version = Some(hts_version);
        self
    }

    fn to_request(&self) -> Result<ApiRequest> {
        ApiRequest::get(SEARCH_HTS_PATH).with_query(self)
    }
}

/// HTS code search, async flavor.
#[derive(Debug)]
pub struct Search<'a, C> {
    transport: &'a C,
}

impl<'a, C: Transport> Search<'a, C> {
    pub(crate) fn new(transport: &'a C) -> Self {
        Self { transport }
    }

    /// Searches HTS codes by description or code prefix.
    ///
    /// Calls `GET /search/hts`.
    pub async fn hts(&self, params: &HtsSearchParams) -> Result<C::Response<Vec<SearchHtsItem>>> {
        let request = params.to_request()?;
        self.transport.send::<Vec<SearchHtsItem>>(request).await
    }
}

/// HTS code search, blocking flavor.
#[derive(Debug)]
pub struct BlockingSearch<'a, C> {
    transport: &'a C,
}

impl<'a, C: BlockingTransport> BlockingSearch<'a, C> {
    pub(crate) fn new(transport: &'a C) -> Self {
        Self { transport }
    }

    pub fn hts(&self, params: &HtsSearchParams) -> Result<C::Response<Vec<SearchHtsItem>>> {
        let request = params.to_request()?;
        self.transport.send::<Vec<SearchHtsItem>>(request)
    }
}
