//! Payload shapes returned by the resource facades.
//!
//! Every shape keeps unknown fields in `extra`, so new server fields never
//! break decoding.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata for an available HTS revision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HtsSourceVersion {
    #[serde(default)]
    pub source_id: Option<i64>,

    /// Tariff source year.
    #[serde(default)]
    pub year: Option<i32>,

    /// Revision number within the year.
    #[serde(default)]
    pub version: Option<i32>,

    #[serde(default)]
    pub release_date_unixts: Option<f64>,

    #[serde(default)]
    pub release_effective_date_unixts: Option<f64>,

    #[serde(default)]
    pub release_notes: Option<String>,

    #[serde(default)]
    pub import_unixts: Option<f64>,

    /// Whether this revision is served by the API.
    #[serde(default)]
    pub is_active: bool,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single HTS search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHtsItem {
    /// Result type, `"hts"` unless the server says otherwise.
    #[serde(rename = "type", default = "default_item_type")]
    pub item_type: String,

    pub hts_code: String,

    pub description: String,

    #[serde(default)]
    pub score: Option<f64>,

    #[serde(default)]
    pub section_name: Option<String>,

    #[serde(default)]
    pub chapter_name: Option<String>,

    /// Footnotes, present when notes were requested.
    #[serde(default)]
    pub lst_footnotes_text: Option<Vec<String>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_item_type() -> String {
    "hts".to_string()
}
