//! Time-windowed batching queue.
//!
//! [`BatchProcessor`] collects individual items and hands them to a bulk
//! handler in FIFO slices of at most `batch_size`, pausing `delay` between
//! slices while work remains. Each caller gets its own future that resolves
//! with the result at its position in the handler's output.
//!
//! A single drain task runs per processor. It is started by the first `add`
//! on an idle processor and exits once the queue is empty; `add` calls made
//! while it runs only append.

use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::telemetry;
use crate::{OptimizerError, Result};

/// Default number of items per handler call.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Default pause between two slices.
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(100);

/// Configuration for [`BatchProcessor`].
///
/// ```rust
/// # use autopost_optimizer::BatchConfig;
/// # use std::time::Duration;
/// let config = BatchConfig::new()
///     .batch_size(25)
///     .delay(Duration::from_millis(50));
/// assert_eq!(config.batch_size, 25);
/// ```
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum items per handler call. Default: 10.
    pub batch_size: usize,
    /// Pause between slices while the queue is non-empty. Default: 100ms.
    pub delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            delay: DEFAULT_BATCH_DELAY,
        }
    }
}

impl BatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch_size(mut self, n: usize) -> Self {
        self.batch_size = n;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

type Handler<T, R> = Arc<dyn Fn(Vec<T>) -> BoxFuture<'static, Result<Vec<R>>> + Send + Sync>;

struct Pending<T, R> {
    data: T,
    reply: oneshot::Sender<Result<R>>,
}

struct QueueState<T, R> {
    items: VecDeque<Pending<T, R>>,
    draining: bool,
}

struct Inner<T, R> {
    state: Mutex<QueueState<T, R>>,
    handler: Handler<T, R>,
    config: BatchConfig,
}

impl<T, R> Inner<T, R> {
    fn lock(&self) -> MutexGuard<'_, QueueState<T, R>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Generic batching queue in front of a bulk handler.
///
/// The handler must return one result per input, in input order. A result
/// missing at some index fails only that item; a handler error or panic
/// fails every item of that slice and nothing else.
///
/// # Panics
///
/// [`add`](Self::add) spawns the drain task and therefore requires a tokio
/// runtime context.
pub struct BatchProcessor<T, R> {
    inner: Arc<Inner<T, R>>,
}

impl<T, R> Clone for BatchProcessor<T, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, R> BatchProcessor<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    /// Create a processor around `handler`.
    pub fn new<F, Fut>(handler: F, config: BatchConfig) -> Self
    where
        F: Fn(Vec<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<R>>> + Send + 'static,
    {
        let handler: Handler<T, R> =
            Arc::new(move |items: Vec<T>| -> BoxFuture<'static, Result<Vec<R>>> {
                Box::pin(handler(items))
            });
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState {
                    items: VecDeque::new(),
                    draining: false,
                }),
                handler,
                config,
            }),
        }
    }

    /// Queue `item` and return a future for its result.
    ///
    /// The item is enqueued immediately, before the returned future is
    /// polled, so call order is dispatch order.
    pub fn add(&self, item: T) -> impl Future<Output = Result<R>> + Send + 'static {
        let (reply, response) = oneshot::channel();

        let start_drain = {
            let mut state = self.inner.lock();
            state.items.push_back(Pending { data: item, reply });
            !std::mem::replace(&mut state.draining, true)
        };

        if start_drain {
            tokio::spawn(drain(Arc::clone(&self.inner)));
        }

        async move { response.await.unwrap_or(Err(OptimizerError::BatchClosed)) }
    }

    /// Number of items waiting for dispatch.
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Clears the busy flag if the drain task unwinds outside the handler.
struct DrainGuard<T, R> {
    inner: Arc<Inner<T, R>>,
    finished: bool,
}

impl<T, R> Drop for DrainGuard<T, R> {
    fn drop(&mut self) {
        if !self.finished {
            self.inner.lock().draining = false;
        }
    }
}

async fn drain<T, R>(inner: Arc<Inner<T, R>>)
where
    T: Send + 'static,
    R: Send + 'static,
{
    let mut guard = DrainGuard {
        inner,
        finished: false,
    };

    loop {
        let slice: Vec<Pending<T, R>> = {
            let mut state = guard.inner.lock();
            if state.items.is_empty() {
                state.draining = false;
                guard.finished = true;
                return;
            }
            let n = guard.inner.config.batch_size.max(1).min(state.items.len());
            state.items.drain(..n).collect()
        };

        let (data, replies): (Vec<T>, Vec<_>) =
            slice.into_iter().map(|p| (p.data, p.reply)).unzip();
        let count = data.len();

        let handler = Arc::clone(&guard.inner.handler);
        let outcome = AssertUnwindSafe(async move { handler(data).await })
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(results)) => {
                metrics::counter!(telemetry::BATCHES_TOTAL, "status" => "ok").increment(1);
                if results.len() < count {
                    warn!(
                        expected = count,
                        received = results.len(),
                        "batch handler returned too few results"
                    );
                } else {
                    debug!(items = count, "batch dispatched");
                }
                let mut results = results.into_iter();
                for (index, reply) in replies.into_iter().enumerate() {
                    let outcome = results
                        .next()
                        .ok_or(OptimizerError::MissingBatchResult { index });
                    // Receiver may have been dropped; nothing to deliver then.
                    let _ = reply.send(outcome);
                }
            }
            Ok(Err(e)) => {
                warn!(items = count, error = %e, "batch handler failed");
                fail_slice(replies, &e.to_string());
            }
            Err(_) => {
                warn!(items = count, "batch handler panicked");
                fail_slice(replies, "handler panicked");
            }
        }

        let more = !guard.inner.lock().items.is_empty();
        if more {
            tokio::time::sleep(guard.inner.config.delay).await;
        }
    }
}

fn fail_slice<R>(replies: Vec<oneshot::Sender<Result<R>>>, message: &str) {
    metrics::counter!(telemetry::BATCHES_TOTAL, "status" => "error").increment(1);
    for reply in replies {
        let _ = reply.send(Err(OptimizerError::Batch(message.to_string())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = BatchConfig::default();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.delay, Duration::from_millis(100));
    }

    #[tokio::test]
    async fn single_item_round_trip() {
        let processor = BatchProcessor::new(
            |items: Vec<u32>| async move {
                Ok(items.into_iter().map(|x| x + 1).collect::<Vec<_>>())
            },
            BatchConfig::default(),
        );
        assert_eq!(processor.add(41).await.unwrap(), 42);
        assert!(processor.is_empty());
    }
}
