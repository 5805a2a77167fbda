//! Log sink used by [`crate::RetryingHttpClient`].
//!
//! Logging never influences retry decisions.

use std::sync::Arc;

pub trait Logger: Send + Sync {
    fn error(&self, message: &str);
    fn debug(&self, message: &str);
}

/// Discards every message.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn error(&self, _message: &str) {}
    fn debug(&self, _message: &str) {}
}

/// Forwards messages to `tracing` under the `retrying_http` target.
///
/// Enabled with the `tracing` feature.
#[cfg(feature = "tracing")]
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

#[cfg(feature = "tracing")]
impl Logger for TracingLogger {
    fn error(&self, message: &str) {
        tracing::error!(target: "retrying_http", "{}", message);
    }

    fn debug(&self, message: &str) {
        tracing::debug!(target: "retrying_http", "{}", message);
    }
}

impl<L: Logger + ?Sized> Logger for Arc<L> {
    fn error(&self, message: &str) {
        (**self).error(message);
    }

    fn debug(&self, message: &str) {
        (**self).debug(message);
    }
}

#[cfg(feature = "tracing")]
pub(crate) fn default_logger() -> Arc<dyn Logger> {
    Arc::new(TracingLogger)
}

#[cfg(not(feature = "tracing"))]
pub(crate) fn default_logger() -> Arc<dyn Logger> {
    Arc::new(NoopLogger)
}
