//! Stream connection with fixed backoff retry

use media_io::{MediaBackend, StreamSource};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Opens the remote stream, retrying until it succeeds or is cancelled
#[derive(Clone)]
pub struct StreamConnector {
    backend: Arc<dyn MediaBackend>,
    url: String,
    backoff: Duration,
}

impl StreamConnector {
    pub fn new(backend: Arc<dyn MediaBackend>, url: impl Into<String>, backoff: Duration) -> Self {
        Self {
            backend,
            url: url.into(),
            backoff,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Wait `initial_delay`, then try to open the stream every `backoff`
    /// until one attempt succeeds. `None` when cancelled.
    pub async fn connect(self, initial_delay: Duration, cancel: CancellationToken) -> Option<Box<dyn StreamSource>> {
        let mut delay = initial_delay;
        let mut attempt: u64 = 0;

        loop {
            if !delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => return None,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            if cancel.is_cancelled() {
                return None;
            }

            attempt += 1;
            if attempt > 1 {
                metrics::counter!("stream_reconnects_total").increment(1);
            }

            let backend = self.backend.clone();
            let url = self.url.clone();
            let opened = tokio::task::spawn_blocking(move || backend.open_stream(&url)).await;

            match opened {
                Ok(Ok(source)) => {
                    info!("Connected to {} after {} attempt(s)", self.url, attempt);
                    return Some(source);
                }
                Ok(Err(e)) => warn!("Connection to {} failed: {}", self.url, e),
                Err(e) => warn!("Connection task failed: {}", e),
            }
            delay = self.backoff;
        }
    }
}
