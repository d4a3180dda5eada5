//! Resource facades.
//!
//! A facade turns typed arguments into an [`ApiRequest`](crate::ApiRequest)
//! and hands it to whichever transport it was created from. Each facade
//! comes in an async and a blocking flavor.

mod search;
mod versions;

pub use search::{BlockingSearch, HtsSearchParams, Search, DEFAULT_SEARCH_LIMIT};
pub use versions::{BlockingVersions, Versions};
