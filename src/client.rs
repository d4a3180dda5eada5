//! Async HTTP client with retry logic and rich error handling.
//!
//! The [`Client`] suspends only the calling task: while an attempt is in
//! flight and while a backoff elapses. Each call keeps its retry state on its
//! own stack, so any number of calls can be interleaved on one runtime.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;
use url::Url;

use crate::decoder::DecoderCache;
use crate::raw::RawClient;
use crate::resources::{Search, Versions};
use crate::response::Reply;
use crate::retry::{Decision, Outcome};
use crate::transport::Transport;
use crate::{ApiRequest, ClientConfig, Envelope, Error, RawResponse, Result};

/// An async client for the Neo Tariff API.
///
/// The client is designed to be reused across many calls; clones share one
/// connection pool. Every call is retried on network errors and on the
/// statuses in [`RETRYABLE_STATUS_CODES`](crate::retry::RETRYABLE_STATUS_CODES).
///
/// # Examples
///
/// ```no_run
/// use neo_tariff::{ApiRequest, Client, ClientConfig};
/// use serde::Deserialize;
/// use std::time::Duration;
///
/// #[derive(Deserialize)]
/// struct Country {
///     code: String,
///     name: String,
/// }
///
/// # async fn example() -> Result<(), neo_tariff::Error> {
/// let client = Client::new(
///     ClientConfig::builder()
///         .api_key("ntf_...")
///         .timeout(Duration::from_secs(10))
///         .max_retries(3)
///         .build()?,
/// )?;
///
/// let versions = client.versions().list().await?;
/// println!("{} versions", versions.require_data()?.len());
///
/// let countries = client
///     .request::<Vec<Country>>(ApiRequest::get("/countries"))
///     .await?;
/// for country in countries.into_data()? {
///     println!("{} {}", country.code, country.name);
/// }
///
/// client.close();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: RwLock<Option<reqwest::Client>>,
    config: ClientConfig,
}

impl Client {
    /// Creates a client from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .default_headers(config.headers()?)
            .timeout(config.timeout())
            .build()
            .map_err(|e| {
                Error::ConfigurationError(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client: RwLock::new(Some(http_client)),
                config,
            }),
        })
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Performs a call and decodes the payload as `T`.
    ///
    /// # Errors
    ///
    /// - [`Error::Connection`] if every attempt failed at the network level
    /// - an HTTP-status error for a non-2xx response (after retries for the
    ///   retryable statuses)
    /// - [`Error::UnexpectedResponse`] or [`Error::DeserializationFailed`] if
    ///   the body is not a valid envelope of `T`
    /// - [`Error::Api`] if the envelope reports `success: false`
    pub async fn request<T>(&self, request: ApiRequest) -> Result<Envelope<T>>
    where
        T: DeserializeOwned + 'static,
    {
        let (reply, _) = self.send_with_retries(&request).await?;
        reply.into_envelope(DecoderCache::global())
    }

    /// Performs a call and returns the payload undecoded.
    pub async fn request_untyped(&self, request: ApiRequest) -> Result<Envelope<Value>> {
        self.request::<Value>(request).await
    }

    /// Performs a call and returns the response as data, whatever its status.
    ///
    /// # Errors
    ///
    /// Only fails when no response could be obtained at all
    /// ([`Error::Connection`]) or the client is misused (closed, bad URL).
    pub async fn request_raw(&self, request: ApiRequest) -> Result<RawResponse> {
        let start_time = Instant::now();
        let (reply, attempts) = self.send_with_retries(&request).await?;
        Ok(RawResponse::from_reply(reply, start_time.elapsed(), attempts))
    }

    /// A non-raising view of this client sharing its connection pool.
    pub fn with_raw_response(&self) -> RawClient<'_> {
        RawClient::new(self)
    }

    /// HTS source versions.
    pub fn versions(&self) -> Versions<'_, Self> {
        Versions::new(self)
    }

    /// HTS code search.
    pub fn search(&self) -> Search<'_, Self> {
        Search::new(self)
    }

    /// Releases the connection pool. Later calls fail with [`Error::Closed`].
    ///
    /// Closing twice is harmless. Clones of this client are closed too.
    pub fn close(&self) {
        let mut http_client = self
            .inner
            .http_client
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if http_client.take().is_some() {
            tracing::debug!(base_url = %self.inner.config.base_url(), "Closed HTTP client");
        }
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner
            .http_client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    fn http_client(&self) -> Result<reqwest::Client> {
        self.inner
            .http_client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(Error::Closed)
    }

    /// Runs the retry loop and returns the final reply with the number of
    /// attempts it took.
    async fn send_with_retries(&self, request: &ApiRequest) -> Result<(Reply, u32)> {
        let http_client = self.http_client()?;
        let url = self.inner.config.url_for(&request.path)?;
        let policy = self.inner.config.retry_policy();
        let start_time = Instant::now();
        let mut attempt = 0;

        loop {
            let result = self
                .execute_request(&http_client, &url, request, attempt)
                .await;

            let decision = match &result {
                Ok(reply) => policy.decide(
                    attempt,
                    Outcome::Response {
                        status: reply.status,
                        headers: &reply.headers,
                    },
                ),
                Err(_) => policy.decide(attempt, Outcome::NetworkError),
            };

            match (result, decision) {
                (Ok(reply), Decision::Stop) => {
                    tracing::info!(
                        status = reply.status.as_u16(),
                        latency_ms = start_time.elapsed().as_millis(),
                        attempts = attempt + 1,
                        "Received HTTP response"
                    );
                    return Ok((reply, attempt + 1));
                }
                (Err(source), Decision::Stop) => {
                    tracing::error!(
                        error = %source,
                        attempts = attempt + 1,
                        method = %request.method,
                        path = %request.path,
                        "Request failed, no attempts left"
                    );
                    return Err(Error::Connection {
                        attempts: attempt + 1,
                        source,
                    });
                }
                (Ok(reply), Decision::RetryAfter(delay)) => {
                    tracing::warn!(
                        status = reply.status.as_u16(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis(),
                        method = %request.method,
                        path = %request.path,
                        "Retryable status, retrying after delay"
                    );
                    tokio::time::sleep(delay).await;
                }
                (Err(e), Decision::RetryAfter(delay)) => {
                    tracing::warn!(
                        error = %e,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis(),
                        method = %request.method,
                        path = %request.path,
                        "Network error, retrying after delay"
                    );
                    tokio::time::sleep(delay).await;
                }
            }

            attempt += 1;
        }
    }

    /// Executes a single attempt, reading the whole body.
    async fn execute_request(
        &self,
        http_client: &reqwest::Client,
        url: &Url,
        request: &ApiRequest,
        attempt: u32,
    ) -> std::result::Result<Reply, reqwest::Error> {
        tracing::debug!(
            method = %request.method,
            url = %url,
            attempt = attempt + 1,
            "Executing HTTP request"
        );

        let mut builder = http_client.request(request.method.clone(), url.clone());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;

        Ok(Reply {
            status,
            headers,
            body,
        })
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Transport for Client {
    type Response<T> = Envelope<T>;

    fn send<T>(&self, request: ApiRequest) -> impl Future<Output = Result<Envelope<T>>> + Send
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.request::<T>(request)
    }

    fn close(&self) {
        Client::close(self);
    }
}
