use std::fmt;
use std::sync::Arc;

use tokio::time::sleep;

use crate::{
    logger::{default_logger, Logger},
    ReqwestTransport, Result, RetryError, RetryOptions, Transport, TransportConfig,
};

/// HTTP client that retries failed requests.
///
/// Every failure reported by the transport is retried the same way, except
/// that a `429 Too Many Requests` doubles the delay used for the retry after
/// next. Requests are independent of each other: each call to
/// [`RetryingHttpClient::request`] carries its own attempt counter and delay.
pub struct RetryingHttpClient<T: Transport = ReqwestTransport> {
    transport: Arc<T>,
    logger: Arc<dyn Logger>,
    options: RetryOptions,
}

impl<T: Transport> Clone for RetryingHttpClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            logger: Arc::clone(&self.logger),
            options: self.options,
        }
    }
}

impl<T: Transport> fmt::Debug for RetryingHttpClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryingHttpClient")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl RetryingHttpClient<ReqwestTransport> {
    /// Creates a client backed by `reqwest` with default retry options.
    pub fn new(config: &TransportConfig) -> Result<Self> {
        Ok(Self::with_transport(ReqwestTransport::new(config)?))
    }

    /// Creates a client from environment variables.
    ///
    /// See [`TransportConfig::from_env`] and [`RetryOptions::from_env`] for
    /// the variables read.
    pub fn from_env() -> Result<Self> {
        let config = TransportConfig::from_env().map_err(RetryError::Config)?;
        let options = RetryOptions::from_env().map_err(RetryError::Config)?;
        Ok(Self::new(&config)?.with_options(options))
    }
}

impl<T: Transport> RetryingHttpClient<T> {
    /// Wraps an existing transport with default retry options.
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
            logger: default_logger(),
            options: RetryOptions::default(),
        }
    }

    /// Applies instance-wide retry defaults.
    pub fn with_options(mut self, options: RetryOptions) -> Self {
        self.options = options;
        self
    }

    /// Replaces the log sink. Failed attempts are logged at error level and
    /// scheduled retries at debug level.
    pub fn with_logger(mut self, logger: impl Logger + 'static) -> Self {
        self.logger = Arc::new(logger);
        self
    }

    /// Instance-wide retry defaults.
    pub fn options(&self) -> &RetryOptions {
        &self.options
    }

    /// Returns a reference to the wrapped transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sends `spec` using the instance defaults.
    pub async fn send(&self, spec: &T::Request) -> Result<T::Response> {
        self.request(spec, None, None).await
    }

    /// Sends `spec`, retrying until it succeeds or the attempt cap is hit.
    ///
    /// `retry_delay_ms` falls back to the instance default when `None` or
    /// zero. `max_attempts` falls back when `None`; `Some(0)` removes the cap.
    ///
    /// Resolves with the first successful response. When the cap is hit the
    /// error is [`RetryError::AttemptsExceeded`] carrying the last failure.
    pub async fn request(
        &self,
        spec: &T::Request,
        retry_delay_ms: Option<u64>,
        max_attempts: Option<u32>,
    ) -> Result<T::Response> {
        let mut state = self.options.initial_state(retry_delay_ms, max_attempts);

        loop {
            let failure = match self.transport.send(spec).await {
                Ok(response) => return Ok(response),
                Err(failure) => failure,
            };

            if !state.can_retry() {
                return Err(RetryError::AttemptsExceeded { last: failure });
            }

            self.logger.error(&failure.to_string());
            let next = state.next(&failure);
            self.logger
                .debug(&format!("retrying request in {} ms", state.retry_delay_ms));

            // The delay escalated by a 429 applies from the retry after this one.
            sleep(state.delay()).await;

            self.logger
                .debug(&format!("starting attempt {}", next.attempts + 1));
            state = next;
        }
    }
}
