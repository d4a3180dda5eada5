//! # neo-tariff - Typed client for the Neo Tariff API
//!
//! Every API response arrives in a uniform envelope
//! (`{success, data, errors, meta}`). This crate provides the transport core
//! behind it: a retrying async [`Client`] and a retrying [`BlockingClient`],
//! an error taxonomy keyed on HTTP status, a process-wide cache of typed
//! envelope decoders, and a raw-response mode that returns responses as data
//! instead of raising.
//!
//! ## Quick Start
//!
//! ```no_run
//! use neo_tariff::{Client, ClientConfig, HtsSearchParams};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), neo_tariff::Error> {
//!     // Reads NEO_TARIFF_API_KEY and friends from the environment
//!     let client = Client::new(ClientConfig::builder().load_env()?.build()?)?;
//!
//!     let results = client
//!         .search()
//!         .hts(&HtsSearchParams::query("hot-rolled steel").limit(5))
//!         .await?;
//!
//!     for item in results.into_data()? {
//!         println!("{} {}", item.hts_code, item.description);
//!     }
//!
//!     client.close();
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Non-2xx responses map to a kind chosen by status code. Every HTTP-status
//! kind carries the status, the best available message, the raw body and the
//! response headers:
//!
//! ```no_run
//! use neo_tariff::{ApiRequest, Client, Error};
//!
//! # async fn example(client: Client) {
//! match client.request_untyped(ApiRequest::get("/rates/hts/7208100000")).await {
//!     Ok(envelope) => println!("{:?}", envelope.data),
//!     Err(Error::NotFound(failure)) => eprintln!("no such code: {}", failure.message),
//!     Err(Error::RateLimited(failure)) => eprintln!("slow down: {:?}", failure.headers),
//!     Err(Error::Api { message, errors, .. }) => eprintln!("{} ({:?})", message, errors),
//!     Err(e) if e.is_http() => eprintln!("HTTP {:?}: {:?}", e.status(), e.raw_response()),
//!     Err(e) => eprintln!("{}", e),
//! }
//! # }
//! ```
//!
//! ## Retries
//!
//! Network errors and the statuses 408, 429, 500, 502, 503 and 504 are
//! retried up to `max_retries` times with exponential backoff. A numeric
//! `Retry-After` header extends the delay when it is longer. See
//! [`retry::RetryPolicy`].
//!
//! ## Raw responses
//!
//! [`Client::with_raw_response`] returns a borrowed adapter whose facades
//! yield a [`RawResponse`] for every status, still retrying transient
//! failures.

mod blocking;
mod client;
pub mod config;
pub mod decoder;
mod envelope;
mod error;
mod raw;
mod request;
pub mod resources;
mod response;
pub mod retry;
pub mod transport;
pub mod types;

pub use blocking::BlockingClient;
pub use client::Client;
pub use config::{ClientConfig, ClientConfigBuilder};
pub use envelope::{Envelope, ErrorItem, Meta, Pagination};
pub use error::{Error, HttpFailure, Result};
pub use raw::{RawBlockingClient, RawClient};
pub use request::ApiRequest;
pub use resources::HtsSearchParams;
pub use response::RawResponse;
pub use retry::{Backoff, RetryPolicy};
pub use transport::{BlockingTransport, Transport};
pub use types::{HtsSourceVersion, SearchHtsItem};
