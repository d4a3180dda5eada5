//! Error types for Neo Tariff API calls.
//!
//! Every failure is an [`Error`], so callers can match on the kind they care
//! about and fall through to a catch-all. Failures come in three layers:
//!
//! - [`Error::Connection`]: the network call itself could not complete, even
//!   after retries.
//! - The HTTP-status kinds ([`Error::Authentication`], [`Error::NotFound`],
//!   [`Error::Validation`], [`Error::RateLimited`], [`Error::Server`] and the
//!   generic [`Error::Http`]): the server answered with a non-2xx status. All of
//!   them carry the same [`HttpFailure`] payload.
//! - [`Error::Api`]: a 2xx response whose envelope says `success: false`.

use http::{HeaderMap, StatusCode};
use serde_json::Value;
use std::fmt;

use crate::envelope::{ErrorItem, Meta};

/// Fallback message when a JSON error body carries no usable message.
pub(crate) const DEFAULT_API_MESSAGE: &str = "API error";

/// Fallback message when the error body is not JSON at all.
pub(crate) const DEFAULT_UNKNOWN_MESSAGE: &str = "Unknown error";

/// Details of a non-2xx response, shared by all HTTP-status error kinds.
#[derive(Debug, Clone)]
pub struct HttpFailure {
    /// The HTTP status code.
    pub status: StatusCode,
    /// Best-effort human-readable message extracted from the body.
    pub message: String,
    /// Structured errors from the body, when it was an envelope.
    pub errors: Option<Vec<ErrorItem>>,
    /// Metadata from the body, when it was an envelope.
    pub meta: Option<Meta>,
    /// The raw response body, kept for diagnosing non-JSON error pages.
    pub raw_body: String,
    /// The response headers.
    pub headers: HeaderMap,
}

impl fmt::Display for HttpFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}: {}", self.status.as_u16(), self.message)
    }
}

/// The main error type for Neo Tariff API calls.
///
/// # Examples
///
/// ```no_run
/// use neo_tariff::{Client, ClientConfig, Error};
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::new(ClientConfig::builder().api_key("ntf_...").build()?)?;
///
/// match client.versions().list().await {
///     Ok(envelope) => println!("{} versions", envelope.require_data()?.len()),
///     Err(Error::Authentication(failure)) => eprintln!("check the API key: {}", failure.message),
///     Err(Error::Server(failure)) => eprintln!("server error, body: {}", failure.raw_body),
///     Err(Error::Api { message, .. }) => eprintln!("request rejected: {}", message),
///     Err(e) => eprintln!("other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The request could not be completed at the network level (DNS, refused
    /// connection, timeout) after every allowed attempt.
    #[error("Request failed after {attempts} attempts: {source}")]
    Connection {
        /// How many attempts were made.
        attempts: u32,
        /// The last network error.
        #[source]
        source: reqwest::Error,
    },

    /// 401 or 403: invalid or missing API key.
    #[error("Authentication failed: {0}")]
    Authentication(Box<HttpFailure>),

    /// 404: the requested resource does not exist.
    #[error("Not found: {0}")]
    NotFound(Box<HttpFailure>),

    /// 422: the server rejected the request parameters.
    #[error("Validation failed: {0}")]
    Validation(Box<HttpFailure>),

    /// 429: rate limit exceeded, even after retries.
    #[error("Rate limited: {0}")]
    RateLimited(Box<HttpFailure>),

    /// 5xx: the server failed, even after retries.
    #[error("Server error: {0}")]
    Server(Box<HttpFailure>),

    /// Any other non-2xx status.
    #[error("{0}")]
    Http(Box<HttpFailure>),

    /// The server answered 2xx but the envelope reported `success: false`.
    #[error("{message}")]
    Api {
        /// The HTTP status code, normally 200.
        status: StatusCode,
        /// The first structured error's message, or a generic summary.
        message: String,
        /// Structured errors from the envelope.
        errors: Option<Vec<ErrorItem>>,
        /// Metadata from the envelope.
        meta: Option<Meta>,
    },

    /// A successful envelope carried no `data` where some was required.
    #[error("Response contained no data")]
    NoData,

    /// A 2xx response whose body was not JSON.
    #[error("Expected JSON response, got: {excerpt}")]
    UnexpectedResponse {
        /// The HTTP status code.
        status: StatusCode,
        /// The first characters of the body.
        excerpt: String,
    },

    /// The body was JSON but did not match the envelope or the declared payload shape.
    #[error("Failed to deserialize response (status {status}): {serde_error}")]
    DeserializationFailed {
        /// The raw response body that failed to deserialize
        raw_response: String,
        /// The serde error message
        serde_error: String,
        /// The HTTP status code
        status: StatusCode,
    },

    /// Failed to serialize the request body or query parameters.
    #[error("Failed to serialize request: {0}")]
    SerializationFailed(String),

    /// Invalid client configuration (missing API key, bad timeout, bad header...).
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// An invalid URL was provided or built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The transport was closed before the call.
    #[error("Transport is closed")]
    Closed,
}

impl Error {
    /// Builds the HTTP-status error matching `status`.
    ///
    /// `body` is the parsed JSON body, if the body was JSON; the message, the
    /// structured errors and the metadata are extracted from it on a
    /// best-effort basis.
    pub fn from_http_status(
        status: StatusCode,
        body: Option<&Value>,
        raw_body: String,
        headers: HeaderMap,
    ) -> Self {
        let details = ErrorDetails::extract(body);
        let failure = Box::new(HttpFailure {
            status,
            message: details.message,
            errors: details.errors,
            meta: details.meta,
            raw_body,
            headers,
        });

        match status.as_u16() {
            401 | 403 => Error::Authentication(failure),
            404 => Error::NotFound(failure),
            422 => Error::Validation(failure),
            429 => Error::RateLimited(failure),
            code if code >= 500 => Error::Server(failure),
            _ => Error::Http(failure),
        }
    }

    /// Builds the business failure for a 2xx envelope with `success: false`.
    pub fn from_envelope(
        status: StatusCode,
        errors: Option<Vec<ErrorItem>>,
        meta: Option<Meta>,
    ) -> Self {
        let message = errors
            .as_deref()
            .and_then(<[ErrorItem]>::first)
            .map(|e| e.message.clone())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "API returned success=false".to_string());

        Error::Api {
            status,
            message,
            errors,
            meta,
        }
    }

    /// Returns the shared payload of the HTTP-status error kinds.
    pub fn http_failure(&self) -> Option<&HttpFailure> {
        match self {
            Error::Authentication(f)
            | Error::NotFound(f)
            | Error::Validation(f)
            | Error::RateLimited(f)
            | Error::Server(f)
            | Error::Http(f) => Some(f),
            _ => None,
        }
    }

    /// Returns `true` if this error is one of the HTTP-status kinds.
    pub fn is_http(&self) -> bool {
        self.http_failure().is_some()
    }

    /// Returns `true` for failures a later attempt could plausibly fix:
    /// connection failures and the retryable statuses.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Connection { .. } => true,
            _ => self
                .status()
                .is_some_and(|s| crate::retry::is_retryable_status(s) && self.is_http()),
        }
    }

    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Api { status, .. }
            | Error::UnexpectedResponse { status, .. }
            | Error::DeserializationFailed { status, .. } => Some(*status),
            _ => self.http_failure().map(|f| f.status),
        }
    }

    /// Returns the human-readable message of an HTTP or business failure.
    pub fn message(&self) -> Option<&str> {
        match self {
            Error::Api { message, .. } => Some(message),
            _ => self.http_failure().map(|f| f.message.as_str()),
        }
    }

    /// Returns the raw response body if this error has one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::DeserializationFailed { raw_response, .. } => Some(raw_response),
            _ => self.http_failure().map(|f| f.raw_body.as_str()),
        }
    }

    /// Returns the structured error list if this error has one.
    pub fn errors(&self) -> Option<&[ErrorItem]> {
        match self {
            Error::Api { errors, .. } => errors.as_deref(),
            _ => self.http_failure()?.errors.as_deref(),
        }
    }

    /// Returns the envelope metadata if this error has any.
    pub fn meta(&self) -> Option<&Meta> {
        match self {
            Error::Api { meta, .. } => meta.as_ref(),
            _ => self.http_failure()?.meta.as_ref(),
        }
    }
}

/// A specialized `Result` type for Neo Tariff API calls.
pub type Result<T> = std::result::Result<T, Error>;

/// What could be salvaged from an error body.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ErrorDetails {
    pub(crate) meta: Option<Meta>,
    pub(crate) errors: Option<Vec<ErrorItem>>,
    pub(crate) message: String,
}

impl ErrorDetails {
    /// Never fails: malformed parts are dropped and the message falls back to
    /// a generic default.
    pub(crate) fn extract(body: Option<&Value>) -> Self {
        let Some(body) = body else {
            return Self {
                meta: None,
                errors: None,
                message: DEFAULT_UNKNOWN_MESSAGE.to_string(),
            };
        };

        let meta = parse_meta(body);
        let errors = parse_errors(body);
        let message = errors
            .as_deref()
            .and_then(<[ErrorItem]>::first)
            .map(|e| e.message.clone())
            .filter(|m| !m.is_empty())
            .or_else(|| detail_message(body))
            .unwrap_or_else(|| DEFAULT_API_MESSAGE.to_string());

        Self {
            meta,
            errors,
            message,
        }
    }
}

fn parse_meta(body: &Value) -> Option<Meta> {
    let meta = body.get("meta").filter(|m| !m.is_null())?;
    serde_json::from_value(meta.clone()).ok()
}

fn parse_errors(body: &Value) -> Option<Vec<ErrorItem>> {
    let errors = body.get("errors").filter(|e| !e.is_null())?;
    serde_json::from_value(errors.clone()).ok()
}

/// Reads a validation-framework `detail`: either a string, or a list whose
/// first element is an object with a `msg` field. Other list elements are
/// stringified.
fn detail_message(body: &Value) -> Option<String> {
    match body.get("detail")? {
        Value::String(detail) => Some(detail.clone()),
        Value::Array(items) => {
            match items.first()? {
                Value::Object(fields) => fields.get("msg").map(stringify),
                other => Some(stringify(other)),
            }
        }
        _ => None,
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn classify(status: u16, body: Option<Value>) -> Error {
        Error::from_http_status(
            StatusCode::from_u16(status).unwrap(),
            body.as_ref(),
            String::new(),
            HeaderMap::new(),
        )
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(classify(401, None), Error::Authentication(_)));
        assert!(matches!(classify(403, None), Error::Authentication(_)));
        assert!(matches!(classify(404, None), Error::NotFound(_)));
        assert!(matches!(classify(422, None), Error::Validation(_)));
        assert!(matches!(classify(429, None), Error::RateLimited(_)));
        assert!(matches!(classify(500, None), Error::Server(_)));
        assert!(matches!(classify(502, None), Error::Server(_)));
        assert!(matches!(classify(599, None), Error::Server(_)));
        assert!(matches!(classify(400, None), Error::Http(_)));
        assert!(matches!(classify(408, None), Error::Http(_)));
        assert!(matches!(classify(409, None), Error::Http(_)));
    }

    #[test]
    fn test_forbidden_keeps_its_status() {
        let err = classify(403, Some(json!({"detail": "Forbidden"})));
        assert_eq!(err.status(), Some(StatusCode::FORBIDDEN));
        assert_eq!(err.message(), Some("Forbidden"));
    }

    #[test]
    fn test_message_from_structured_errors() {
        let body = json!({
            "success": false,
            "errors": [{"code": "E1", "message": "bad code", "field": "hts_code"}],
            "meta": {"operation": "rates.entry"}
        });
        let err = classify(400, Some(body));

        assert_eq!(err.message(), Some("bad code"));
        let errors = err.errors().unwrap();
        assert_eq!(errors[0].code, "E1");
        assert_eq!(errors[0].field.as_deref(), Some("hts_code"));
        assert_eq!(err.meta().unwrap().operation.as_deref(), Some("rates.entry"));
    }

    #[test]
    fn test_message_from_string_detail() {
        let err = classify(401, Some(json!({"detail": "Invalid API key"})));
        assert_eq!(err.message(), Some("Invalid API key"));
        assert!(err.errors().is_none());
    }

    #[test]
    fn test_message_from_validation_detail_list() {
        let body = json!({"detail": [
            {"loc": ["query", "limit"], "msg": "value is not a valid integer", "type": "type_error"},
            {"loc": ["query", "code"], "msg": "field required"}
        ]});
        let err = classify(422, Some(body));
        assert_eq!(err.message(), Some("value is not a valid integer"));
    }

    #[test]
    fn test_message_from_detail_list_of_scalars() {
        assert_eq!(classify(422, Some(json!({"detail": ["oops"]}))).message(), Some("oops"));
        assert_eq!(classify(422, Some(json!({"detail": [42]}))).message(), Some("42"));
    }

    #[test]
    fn test_detail_object_without_msg_falls_back() {
        let body = json!({"detail": [{"loc": ["query", "limit"], "type": "missing"}]});
        let err = classify(422, Some(body));
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(err.message(), Some(DEFAULT_API_MESSAGE));
    }

    #[test]
    fn test_message_defaults() {
        assert_eq!(classify(500, None).message(), Some(DEFAULT_UNKNOWN_MESSAGE));
        assert_eq!(
            classify(500, Some(json!({"unexpected": true}))).message(),
            Some(DEFAULT_API_MESSAGE)
        );
        assert_eq!(
            classify(422, Some(json!({"detail": [{"loc": []}]}))).message(),
            Some(DEFAULT_API_MESSAGE)
        );
        assert_eq!(
            classify(400, Some(json!({"errors": [{"code": "E", "message": ""}]}))).message(),
            Some(DEFAULT_API_MESSAGE)
        );
    }

    #[test]
    fn test_malformed_parts_are_dropped() {
        let body = json!({
            "errors": "not a list",
            "meta": ["not", "an", "object"],
            "detail": "still readable"
        });
        let err = classify(500, Some(body));

        assert_eq!(err.message(), Some("still readable"));
        assert!(err.errors().is_none());
        assert!(err.meta().is_none());
    }

    #[test]
    fn test_raw_body_is_kept() {
        let err = Error::from_http_status(
            StatusCode::BAD_GATEWAY,
            None,
            "<html>Bad Gateway</html>".to_string(),
            HeaderMap::new(),
        );
        assert!(matches!(err, Error::Server(_)));
        assert_eq!(err.raw_response(), Some("<html>Bad Gateway</html>"));
        assert_eq!(err.to_string(), "Server error: HTTP 502: Unknown error");
    }

    #[test]
    fn test_business_failure_message() {
        let errors = vec![ErrorItem {
            code: "E1".to_string(),
            message: "bad input".to_string(),
            ..Default::default()
        }];
        let err = Error::from_envelope(StatusCode::OK, Some(errors), None);

        assert_eq!(err.to_string(), "bad input");
        assert_eq!(err.status(), Some(StatusCode::OK));
        assert!(!err.is_http());

        let err = Error::from_envelope(StatusCode::OK, None, None);
        assert_eq!(err.message(), Some("API returned success=false"));
    }

    #[test]
    fn test_is_retryable() {
        assert!(classify(503, None).is_retryable());
        assert!(classify(429, None).is_retryable());
        assert!(classify(408, None).is_retryable());
        assert!(!classify(404, None).is_retryable());
        assert!(!classify(501, None).is_retryable());
        assert!(!Error::NoData.is_retryable());
        assert!(!Error::ConfigurationError("x".to_string()).is_retryable());
    }
}
