//! The narrow interface resource facades call into.
//!
//! A facade only knows how to describe a call ([`ApiRequest`]) and which
//! payload shape it expects. What comes back is up to the transport: the
//! raising clients return an [`Envelope<T>`](crate::Envelope), the raw
//! adapters a [`RawResponse`](crate::RawResponse). Swapping the transport is
//! all it takes to reuse every facade in passthrough mode.

use serde::de::DeserializeOwned;
use std::future::Future;

use crate::{ApiRequest, Result};

/// A cooperatively scheduled (async) transport.
pub trait Transport: Sync {
    /// What a call expecting payload shape `T` resolves to.
    type Response<T>;

    /// Performs one logical call, retries included.
    fn send<T>(&self, request: ApiRequest) -> impl Future<Output = Result<Self::Response<T>>> + Send
    where
        T: DeserializeOwned + Send + 'static;

    /// Releases the connection pool, if this transport owns one.
    fn close(&self);
}

/// A transport that blocks the calling thread.
pub trait BlockingTransport {
    /// What a call expecting payload shape `T` returns.
    type Response<T>;

    /// Performs one logical call, retries included.
    fn send<T>(&self, request: ApiRequest) -> Result<Self::Response<T>>
    where
        T: DeserializeOwned + 'static;

    /// Releases the connection pool, if this transport owns one.
    fn close(&self);
}
