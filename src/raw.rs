//! Raw-response adapters.
//!
//! A raw adapter borrows a client and returns every response as a
//! [`RawResponse`] instead of raising for error statuses or failed envelopes.
//! Retries still run; only a call that never got a response at all
//! ([`Error::Connection`](crate::Error::Connection)) is still an error.
//!
//! The adapter never owns the connection pool: closing it does nothing, and
//! the underlying client stays usable.

use serde::de::DeserializeOwned;
use std::future::Future;

use crate::resources::{BlockingSearch, BlockingVersions, Search, Versions};
use crate::transport::{BlockingTransport, Transport};
use crate::{ApiRequest, BlockingClient, Client, RawResponse, Result};

/// Async raw adapter, see [`Client::with_raw_response`].
#[derive(Debug, Clone, Copy)]
pub struct RawClient<'a> {
    client: &'a Client,
}

impl<'a> RawClient<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Performs a call and returns whatever came back.
    pub async fn request(&self, request: ApiRequest) -> Result<RawResponse> {
        self.client.request_raw(request).await
    }

    pub fn versions(&self) -> Versions<'_, Self> {
        Versions::new(self)
    }

    pub fn search(&self) -> Search<'_, Self> {
        Search::new(self)
    }
}

impl Transport for RawClient<'_> {
    type Response<T> = RawResponse;

    fn send<T>(&self, request: ApiRequest) -> impl Future<Output = Result<RawResponse>> + Send
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.client.request_raw(request)
    }

    fn close(&self) {
        tracing::debug!("Ignoring close on a raw adapter; the client owns the connection pool");
    }
}

/// Blocking raw adapter, see [`BlockingClient::with_raw_response`].
#[derive(Debug, Clone, Copy)]
pub struct RawBlockingClient<'a> {
    client: &'a BlockingClient,
}

impl<'a> RawBlockingClient<'a> {
    pub(crate) fn new(client: &'a BlockingClient) -> Self {
        Self { client }
    }

    pub fn request(&self, request: ApiRequest) -> Result<RawResponse> {
        self.client.request_raw(request)
    }

    pub fn versions(&self) -> BlockingVersions<'_, Self> {
        BlockingVersions::new(self)
    }

    pub fn search(&self) -> BlockingSearch<'_, Self> {
        BlockingSearch::new(self)
    }
}

impl BlockingTransport for RawBlockingClient<'_> {
    type Response<T> = RawResponse;

    fn send<T>(&self, request: ApiRequest) -> Result<RawResponse>
    where
        T: DeserializeOwned + 'static,
    {
        self.request(request)
    }

    fn close(&self) {
        tracing::debug!("Ignoring close on a raw adapter; the client owns the connection pool");
    }
}
