//! The response envelope every API call is decoded into.
//!
//! Every endpoint answers with the same wrapper: a `success` flag, an optional
//! payload, an optional list of structured errors and optional operational
//! metadata. Unknown keys at any level are kept in the `extra` maps instead of
//! being rejected, so newer servers never break older clients.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::decoder::DecoderCache;
use crate::{Error, Result};

/// Standard API response envelope.
///
/// `T` is the declared payload shape. `Envelope<Value>` (the default) carries
/// the payload undecoded.
///
/// # Examples
///
/// ```
/// use neo_tariff::Envelope;
/// use serde_json::json;
///
/// let envelope = Envelope::parse(json!({"success": true, "data": {"year": 2025}})).unwrap();
/// assert_eq!(envelope.require_data().unwrap(), &json!({"year": 2025}));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T = Value> {
    /// Whether the API considers the operation successful.
    pub success: bool,

    /// The payload. May be `null` even when `success` is true.
    #[serde(default = "none")]
    pub data: Option<T>,

    /// Structured errors, normally present when `success` is false.
    #[serde(default)]
    pub errors: Option<Vec<ErrorItem>>,

    /// Operational metadata echoed by the server.
    #[serde(default)]
    pub meta: Option<Meta>,

    /// Top-level keys this client does not know about.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn none<T>() -> Option<T> {
    None
}

impl Envelope<Value> {
    /// Validates a raw JSON body as an untyped envelope.
    ///
    /// Fails only when `success` is missing or not a boolean, or when `errors`
    /// or `meta` have an incompatible structure.
    pub fn parse(body: Value) -> serde_json::Result<Self> {
        serde_json::from_value(body)
    }
}

impl<T> Envelope<T>
where
    T: DeserializeOwned + 'static,
{
    /// Validates a raw JSON body as an envelope whose `data` must match `T`.
    ///
    /// Uses the process-wide decoder cache.
    pub fn parse_typed(body: Value) -> serde_json::Result<Self> {
        DecoderCache::global().decoder::<T>().decode(body)
    }
}

impl<T> Envelope<T> {
    /// Returns the payload, or [`Error::NoData`] when it is `null`.
    pub fn require_data(&self) -> Result<&T> {
        self.data.as_ref().ok_or(Error::NoData)
    }

    /// Consumes the envelope and returns the payload, or [`Error::NoData`].
    pub fn into_data(self) -> Result<T> {
        self.data.ok_or(Error::NoData)
    }

    /// Message of the first structured error, if any.
    pub fn first_error_message(&self) -> Option<&str> {
        self.errors
            .as_deref()?
            .first()
            .map(|e| e.message.as_str())
            .filter(|m| !m.is_empty())
    }
}

/// A single structured error reported by the API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorItem {
    /// Machine-readable error code.
    #[serde(default)]
    pub code: String,

    /// Human-readable description.
    #[serde(default)]
    pub message: String,

    /// The request field the error refers to.
    #[serde(default)]
    pub field: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Pagination block inside [`Meta`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    pub total: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub next_offset: Option<i64>,
    pub has_more: Option<bool>,
    pub returned_count: Option<i64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Request/response metadata. Informational only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    /// Server timestamp of the response, in Unix seconds.
    pub timestamp_unixts: Option<f64>,
    /// Name of the operation that handled the request.
    pub operation: Option<String>,
    /// Request parameters as the server understood them.
    pub params: Option<Map<String, Value>>,
    pub hts_year: Option<i64>,
    pub hts_version: Option<i64>,
    pub pagination: Option<Pagination>,
    pub result_count: Option<i64>,
    pub window_info: Option<Map<String, Value>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
