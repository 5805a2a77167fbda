/// Failure of a single send attempt, as reported by a [`crate::Transport`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Network or request execution error from `reqwest`.
    #[error("transport error: {0}")]
    Request(reqwest::Error),
    /// Non-success HTTP status code with raw response body.
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },
    /// Failure raised by a custom transport.
    #[error("{0}")]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl TransportError {
    /// Builds a [`TransportError::Other`] from any error or message.
    pub fn other(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Other(error.into())
    }

    /// HTTP status carried by the failed response, if there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Request(err) => err.status().map(|status| status.as_u16()),
            Self::Http { status, .. } => Some(*status),
            Self::Other(_) => None,
        }
    }

    /// Whether the server answered `429 Too Many Requests`.
    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(429)
    }
}

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum RetryError {
    /// Every allowed attempt failed. The failure of the final attempt is
    /// available through [`std::error::Error::source`].
    #[error("Number of attempts exceeded.")]
    AttemptsExceeded {
        #[source]
        last: TransportError,
    },
    /// The default transport could not be built.
    #[error("failed to build http client: {0}")]
    Build(reqwest::Error),
    /// Invalid transport configuration (base URL, header names or values).
    #[error("invalid configuration: {0}")]
    Config(String),
}
