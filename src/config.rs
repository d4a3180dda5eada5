//! Client configuration.
//!
//! A transport needs exactly four validated values: the API key, the base
//! URL, the request timeout and the retry budget. [`ClientConfigBuilder`]
//! collects them from explicit setters, an optional dotenv file and the
//! process environment, in that order of precedence:
//!
//! ```no_run
//! use neo_tariff::ClientConfig;
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), neo_tariff::Error> {
//! let config = ClientConfig::builder()
//!     .timeout(Duration::from_secs(10))
//!     .load_env_file(".env")?
//!     .load_env()?
//!     .build()?;
//! # Ok(())
//! # }
//! ```
//!
//! | Env Var                  | Default                                   |
//! |--------------------------|-------------------------------------------|
//! | `NEO_TARIFF_API_KEY`     | required                                  |
//! | `NEO_TARIFF_BASE_URL`    | `https://tariff-data.enterprise-neo.com`  |
//! | `NEO_TARIFF_TIMEOUT`     | `30` (seconds, may be fractional)         |
//! | `NEO_TARIFF_MAX_RETRIES` | `2`                                       |

use http::header::{ACCEPT, USER_AGENT as USER_AGENT_HEADER};
use http::{HeaderMap, HeaderName, HeaderValue};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::retry::{Backoff, RetryPolicy};
use crate::{Error, Result};

/// Default API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://tariff-data.enterprise-neo.com";

/// Default per-attempt request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// `User-Agent` sent with every request.
pub const USER_AGENT: &str = concat!("neo-tariff-rust/", env!("CARGO_PKG_VERSION"));

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

pub const API_KEY_ENV: &str = "NEO_TARIFF_API_KEY";
pub const BASE_URL_ENV: &str = "NEO_TARIFF_BASE_URL";
pub const TIMEOUT_ENV: &str = "NEO_TARIFF_TIMEOUT";
pub const MAX_RETRIES_ENV: &str = "NEO_TARIFF_MAX_RETRIES";

/// Validated settings shared by [`Client`](crate::Client) and
/// [`BlockingClient`](crate::BlockingClient).
#[derive(Clone)]
pub struct ClientConfig {
    api_key: String,
    base_url: Url,
    timeout: Duration,
    retry_policy: RetryPolicy,
    default_headers: HeaderMap,
}

impl ClientConfig {
    /// Creates a new builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// The API key sent in `X-API-Key`.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// The base endpoint all request paths are joined onto.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The per-attempt request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Maximum number of retries after the first attempt.
    pub fn max_retries(&self) -> u32 {
        self.retry_policy.max_retries
    }

    /// The retry policy derived from this configuration.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }

    /// Headers sent with every request: the caller's defaults plus
    /// `X-API-Key`, `User-Agent` and `Accept`.
    pub(crate) fn headers(&self) -> Result<HeaderMap> {
        let mut headers = self.default_headers.clone();

        let mut api_key = HeaderValue::from_str(&self.api_key)
            .map_err(|e| Error::ConfigurationError(format!("Invalid API key: {}", e)))?;
        api_key.set_sensitive(true);

        headers.insert(HeaderName::from_static(API_KEY_HEADER), api_key);
        headers.insert(USER_AGENT_HEADER, HeaderValue::from_static(USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// Joins `path` onto the base URL, keeping any path prefix of the base.
    pub(crate) fn url_for(&self, path: &str) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!("{}/{}", base, path))?)
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .field("retry_policy", &self.retry_policy)
            .finish()
    }
}

/// Builder for [`ClientConfig`].
///
/// Setters always win. [`load_env_file`](Self::load_env_file) and
/// [`load_env`](Self::load_env) only fill values that are still unset, so the
/// order of calls decides precedence. The first source that defines a
/// variable decides it: a variable present but blank in an env file means
/// "use the default" and is not looked up again in the process environment.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    timeout: Option<Duration>,
    max_retries: Option<u32>,
    backoff: Backoff,
    default_headers: HeaderMap,
    /// Variables already defined by an earlier source, blank or not.
    settled: HashSet<&'static str>,
}

impl ClientConfigBuilder {
    /// Creates a builder with nothing set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the base endpoint URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the per-attempt request timeout. Must be non-zero.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the number of retries after the first attempt. `0` disables retries.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Overrides the backoff between attempts.
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Adds a header sent with every request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Fills unset values from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable is malformed or out of range.
    pub fn load_env(self) -> Result<Self> {
        self.fill_from(|name| std::env::var(name).ok())
    }

    /// Fills unset values from a dotenv file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a numeric
    /// value is malformed or out of range.
    pub fn load_env_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let entries = dotenvy::from_path_iter(path).map_err(|e| {
            Error::ConfigurationError(format!("Cannot read env file {}: {}", path.display(), e))
        })?;

        let mut values = HashMap::new();
        for entry in entries {
            let (key, value) = entry.map_err(|e| {
                Error::ConfigurationError(format!("Invalid env file {}: {}", path.display(), e))
            })?;
            values.insert(key, value);
        }

        self.fill_from(|name| values.get(name).cloned())
    }

    fn fill_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let settled = &mut self.settled;
        let mut read = |name: &'static str| {
            if settled.contains(name) {
                return None;
            }
            let value = lookup(name)?;
            settled.insert(name);
            Some(value.trim().to_string()).filter(|v| !v.is_empty())
        };

        let api_key = read(API_KEY_ENV);
        let base_url = read(BASE_URL_ENV);
        let timeout = read(TIMEOUT_ENV);
        let max_retries = read(MAX_RETRIES_ENV);

        if self.api_key.is_none() {
            self.api_key = api_key;
        }
        if self.base_url.is_none() {
            self.base_url = base_url;
        }
        if self.timeout.is_none() {
            if let Some(raw) = timeout {
                self.timeout = Some(parse_timeout(&raw)?);
            }
        }
        if self.max_retries.is_none() {
            if let Some(raw) = max_retries {
                self.max_retries = Some(parse_max_retries(&raw)?);
            }
        }
        Ok(self)
    }

    /// Validates and builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is missing or blank, the base URL is
    /// not an absolute URL, the timeout is zero, or the API key cannot be
    /// sent as a header value.
    pub fn build(self) -> Result<ClientConfig> {
        let api_key = self
            .api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                Error::ConfigurationError(format!(
                    "No API key provided. Set it on the builder or set the {} environment variable.",
                    API_KEY_ENV
                ))
            })?;

        let base_url = Url::parse(self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::ConfigurationError(format!(
                "Base URL must be absolute: {}",
                base_url
            )));
        }

        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        if timeout.is_zero() {
            return Err(Error::ConfigurationError("timeout must be > 0".to_string()));
        }

        let config = ClientConfig {
            api_key,
            base_url,
            timeout,
            retry_policy: RetryPolicy {
                max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
                backoff: self.backoff,
            },
            default_headers: self.default_headers,
        };
        config.headers()?;
        Ok(config)
    }
}

fn parse_timeout(raw: &str) -> Result<Duration> {
    let seconds: f64 = raw.parse().map_err(|_| {
        Error::ConfigurationError(format!("Invalid {} value; expected a number.", TIMEOUT_ENV))
    })?;
    if seconds.is_nan() || seconds <= 0.0 {
        return Err(Error::ConfigurationError(format!("{} must be > 0", TIMEOUT_ENV)));
    }
    Duration::try_from_secs_f64(seconds)
        .map_err(|e| Error::ConfigurationError(format!("Invalid {} value: {}", TIMEOUT_ENV, e)))
}

fn parse_max_retries(raw: &str) -> Result<u32> {
    let retries: i64 = raw.parse().map_err(|_| {
        Error::ConfigurationError(format!(
            "Invalid {} value; expected an integer.",
            MAX_RETRIES_ENV
        ))
    })?;
    if retries < 0 {
        return Err(Error::ConfigurationError(format!(
            "{} must be >= 0",
            MAX_RETRIES_ENV
        )));
    }
    u32::try_from(retries).map_err(|_| {
        Error::ConfigurationError(format!("{} is too large", MAX_RETRIES_ENV))
    })
}
