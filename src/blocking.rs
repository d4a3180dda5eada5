//! Blocking HTTP client.
//!
//! Same retry policy, error mapping and decoding as [`Client`](crate::Client),
//! but every attempt and every backoff blocks the calling thread. Must not be
//! used from within an async runtime.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;
use url::Url;

use crate::decoder::DecoderCache;
use crate::raw::RawBlockingClient;
use crate::resources::{BlockingSearch, BlockingVersions};
use crate::response::Reply;
use crate::retry::{Decision, Outcome};
use crate::transport::BlockingTransport;
use crate::{ApiRequest, ClientConfig, Envelope, Error, RawResponse, Result};

/// A blocking client for the Neo Tariff API.
///
/// # Examples
///
/// ```no_run
/// use neo_tariff::{BlockingClient, ClientConfig};
///
/// # fn example() -> Result<(), neo_tariff::Error> {
/// let client = BlockingClient::new(ClientConfig::builder().load_env()?.build()?)?;
///
/// for version in client.versions().list()?.into_data()? {
///     println!("{:?} rev {:?}", version.year, version.version);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct BlockingClient {
    inner: Arc<BlockingInner>,
}

struct BlockingInner {
    http_client: RwLock<Option<reqwest::blocking::Client>>,
    config: ClientConfig,
}

impl BlockingClient {
    /// Creates a client from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http_client = reqwest::blocking::Client::builder()
            .default_headers(config.headers()?)
            .timeout(config.timeout())
            .build()
            .map_err(|e| {
                Error::ConfigurationError(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            inner: Arc::new(BlockingInner {
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
    /// Fails the same way as [`Client::request`](crate::Client::request).
    pub fn request<T>(&self, request: ApiRequest) -> Result<Envelope<T>>
    where
        T: DeserializeOwned + 'static,
    {
        let (reply, _) = self.send_with_retries(&request)?;
        reply.into_envelope(DecoderCache::global())
    }

    /// Performs a call and returns the payload undecoded.
    pub fn request_untyped(&self, request: ApiRequest) -> Result<Envelope<Value>> {
        self.request::<Value>(request)
    }

    /// Performs a call and returns the response as data, whatever its status.
    pub fn request_raw(&self, request: ApiRequest) -> Result<RawResponse> {
        let start_time = Instant::now();
        let (reply, attempts) = self.send_with_retries(&request)?;
        Ok(RawResponse::from_reply(reply, start_time.elapsed(), attempts))
    }

    /// A non-raising view of this client sharing its connection pool.
    pub fn with_raw_response(&self) -> RawBlockingClient<'_> {
        RawBlockingClient::new(self)
    }

    /// HTS source versions.
    pub fn versions(&self) -> BlockingVersions<'_, Self> {
        BlockingVersions::new(self)
    }

    /// HTS code search.
    pub fn search(&self) -> BlockingSearch<'_, Self> {
        BlockingSearch::new(self)
    }

    /// Releases the connection pool. Later calls fail with [`Error::Closed`].
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

    fn http_client(&self) -> Result<reqwest::blocking::Client> {
        self.inner
            .http_client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(Error::Closed)
    }

    fn send_with_retries(&self, request: &ApiRequest) -> Result<(Reply, u32)> {
        let http_client = self.http_client()?;
        let url = self.inner.config.url_for(&request.path)?;
        let policy = self.inner.config.retry_policy();
        let start_time = Instant::now();
        let mut attempt = 0;

        loop {
            let result = execute_request(&http_client, &url, request, attempt);

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
                    std::thread::sleep(delay);
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
                    std::thread::sleep(delay);
                }
            }

            attempt += 1;
        }
    }
}

fn execute_request(
    http_client: &reqwest::blocking::Client,
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

    let response = builder.send()?;
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.text()?;

    Ok(Reply {
        status,
        headers,
        body,
    })
}

impl std::fmt::Debug for BlockingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingClient")
            .field("config", &self.inner.config)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl BlockingTransport for BlockingClient {
    type Response<T> = Envelope<T>;

    fn send<T>(&self, request: ApiRequest) -> Result<Envelope<T>>
    where
        T: DeserializeOwned + 'static,
    {
        self.request::<T>(request)
    }

    fn close(&self) {
        BlockingClient::close(self);
    }
}
