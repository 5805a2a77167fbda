//! `retrying-http` wraps an HTTP transport and retries failed requests.
//!
//! - [`RetryingHttpClient::request`] sends a request, retrying with a fixed
//!   delay that doubles whenever the server answers `429 Too Many Requests`.
//! - [`RetryOptions`] holds the instance defaults: 5000 ms delay and 3 attempts
//!   (`0` attempts means retry until success).
//! - [`Transport`] is the seam for the actual HTTP stack; [`ReqwestTransport`]
//!   is the default.

mod client;
mod error;
mod logger;
mod options;
mod retry;
mod transport;
mod types;

pub use client::RetryingHttpClient;
pub use error::{RetryError, TransportError};
#[cfg(feature = "tracing")]
pub use logger::TracingLogger;
pub use logger::{Logger, NoopLogger};
pub use options::{RetryOptions, TransportConfig, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY_MS};
pub use reqwest::Method;
pub use transport::{ReqwestTransport, Transport};
pub use types::{HttpResponse, RequestBody, RequestSpec};

pub type Result<T> = std::result::Result<T, RetryError>;
