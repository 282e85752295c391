//! Per-operation context: cancellation and the optional log sink.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::StorageError;
use crate::Result;

/// Receives human-readable diagnostic lines from storage operations.
pub type LogSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Threaded through every storage operation.
///
/// Cloning is cheap; clones share the same cancellation token and sink.
#[derive(Clone, Default)]
pub struct OpContext {
    cancel: CancellationToken,
    sink: Option<LogSink>,
}

impl OpContext {
    /// A context that is never cancelled and logs only through `tracing`.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context cancelled together with `token`.
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            cancel: token,
            sink: None,
        }
    }

    /// Attach a log sink.
    pub fn with_log_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.sink = Some(Arc::new(sink));
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fail with `Cancelled` if the token has fired.
    pub fn ensure_active(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(StorageError::Cancelled.into());
        }
        Ok(())
    }

    /// Run one native I/O call, aborting it if the token fires first.
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.ensure_active()?;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(StorageError::Cancelled.into()),
            result = fut => result,
        }
    }

    /// Emit a diagnostic line to `tracing` and the sink, if any.
    pub fn log(&self, message: &str) {
        debug!("{}", message);
        if let Some(sink) = &self.sink {
            sink(message);
        }
    }
}

impl fmt::Debug for OpContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpContext")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("sink", &self.sink.is_some())
            .finish()
    }
}
