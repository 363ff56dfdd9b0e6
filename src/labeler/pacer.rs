// Fixed spacing between consecutive calls to the generative service.
//
// Backoff only reacts to a 429 after the fact; the pacer keeps us under the
// limit in the first place. The gap is measured from the end of one call to
// the start of the next, whatever the first call's outcome. The first call
// goes through immediately.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::debug;

/// Shared pacer. Clones share state, so every task holding one is spaced
/// against the same outbound service.
#[derive(Clone)]
pub struct Pacer {
    inner: Arc<Mutex<PacerInner>>,
}

struct PacerInner {
    interval: Duration,
    /// When the previous paced call finished.
    last_finished: Option<Instant>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PacerInner {
                interval,
                last_finished: None,
            })),
        }
    }

    /// Wait out the gap since the previous call, then run `call`.
    ///
    /// The lock is held for the whole call so concurrent callers queue up
    /// behind it instead of racing the interval.
    pub async fn run<Fut: Future>(&self, call: Fut) -> Fut::Output {
        let mut inner = self.inner.lock().await;

        if let Some(last) = inner.last_finished {
            let ready_at = last + inner.interval;
            let now = Instant::now();
            if ready_at > now {
                debug!(
                    wait_ms = (ready_at - now).as_millis() as u64,
                    "Pacing generative service call"
                );
                tokio::time::sleep_until(ready_at).await;
            }
        }

        let output = call.await;
        inner.last_finished = Some(Instant::now());
        output
    }
}
