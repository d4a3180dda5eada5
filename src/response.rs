//! What happens to a response once the retry loop is done with it.
//!
//! Both clients read every attempt into a [`Reply`] and hand the final one to
//! [`Reply::into_envelope`] (raising) or [`RawResponse::from_reply`]
//! (passthrough), so response classification is shared by every transport.

use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use crate::decoder::DecoderCache;
use crate::envelope::Envelope;
use crate::{Error, Result};

/// Longest body excerpt quoted in [`Error::UnexpectedResponse`].
const EXCERPT_CHARS: usize = 200;

/// A fully read HTTP response.
#[derive(Debug, Clone)]
pub(crate) struct Reply {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) body: String,
}

impl Reply {
    /// Classifies the reply and decodes it as `Envelope<T>`.
    ///
    /// Non-2xx statuses become the matching HTTP-status error, a non-JSON 2xx
    /// body becomes [`Error::UnexpectedResponse`], a body that does not fit the
    /// envelope or `T` becomes [`Error::DeserializationFailed`], and an
    /// envelope with `success: false` becomes [`Error::Api`].
    pub(crate) fn into_envelope<T>(self, decoders: &DecoderCache) -> Result<Envelope<T>>
    where
        T: DeserializeOwned + 'static,
    {
        let Reply {
            status,
            headers,
            body,
        } = self;
        let json = serde_json::from_str::<Value>(&body).ok();

        if !status.is_success() {
            if status.is_client_error() {
                tracing::error!(status = status.as_u16(), response = %body, "Client error (4xx)");
            } else {
                tracing::warn!(status = status.as_u16(), response = %body, "Non-success response");
            }
            return Err(Error::from_http_status(status, json.as_ref(), body, headers));
        }

        let Some(json) = json else {
            tracing::error!(status = status.as_u16(), response = %body, "Expected a JSON response");
            return Err(Error::UnexpectedResponse {
                status,
                excerpt: body.chars().take(EXCERPT_CHARS).collect(),
            });
        };

        let envelope = decoders.decoder::<T>().decode(json).map_err(|e| {
            tracing::error!(error = %e, raw_response = %body, "Failed to deserialize response");
            Error::DeserializationFailed {
                raw_response: body.clone(),
                serde_error: e.to_string(),
                status,
            }
        })?;

        if !envelope.success {
            return Err(Error::from_envelope(status, envelope.errors, envelope.meta));
        }

        Ok(envelope)
    }
}

/// A response returned as data instead of being raised as an error.
///
/// Produced by the raw adapters ([`RawClient`](crate::RawClient),
/// [`RawBlockingClient`](crate::RawBlockingClient)). `parsed` is a
/// best-effort decode: `None` when the body was not JSON or not an envelope.
///
/// # Examples
///
/// ```no_run
/// use neo_tariff::{Client, ClientConfig};
///
/// # async fn example() -> Result<(), neo_tariff::Error> {
/// let client = Client::new(ClientConfig::builder().api_key("ntf_...").build()?)?;
///
/// let raw = client.with_raw_response().versions().list().await?;
/// println!("status {} after {} attempts", raw.status, raw.attempts);
/// match &raw.parsed {
///     Some(envelope) if envelope.success => println!("data: {:?}", envelope.data),
///     Some(envelope) => println!("errors: {:?}", envelope.errors),
///     None => println!("not an envelope: {}", raw.raw_body),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// The HTTP status code of the last attempt.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// The raw response body.
    pub raw_body: String,

    /// The total latency of the call, including all retry attempts.
    pub latency: Duration,

    /// The number of attempts made.
    pub attempts: u32,

    /// The body decoded as an untyped envelope, if it was one.
    pub parsed: Option<Envelope<Value>>,
}

impl RawResponse {
    pub(crate) fn from_reply(reply: Reply, latency: Duration, attempts: u32) -> Self {
        let parsed = serde_json::from_str::<Value>(&reply.body)
            .ok()
            .and_then(|json| Envelope::parse(json).ok());

        Self {
            status: reply.status,
            headers: reply.headers,
            raw_body: reply.body,
            latency,
            attempts,
            parsed,
        }
    }

    /// Returns `true` for a 2xx status whose envelope reports success.
    pub fn is_success(&self) -> bool {
        self.status.is_success() && self.parsed.as_ref().is_some_and(|e| e.success)
    }

    /// Returns `true` if the call required retries.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}
