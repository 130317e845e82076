//! Purpose: Per-collection FIFO operation queue with a single worker.
//! Exports: `OperationQueue`, `Pending`.
//! Role: Gives each collection a single-threaded, strictly ordered view of its log.
//! Invariants: Jobs run in submission order; at most one job per queue is in flight.
//! Invariants: A failed or panicking job resolves only its own caller; the queue keeps going.
//! Notes: Submission happens when `submit` is called, not when the `Pending` is first polled.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

use crate::core::error::{Error, ErrorKind};
use crate::core::log::LogStore;

type Job = Box<dyn FnOnce(&LogStore) + Send + 'static>;

pub(crate) struct OperationQueue {
    name: String,
    jobs: mpsc::UnboundedSender<Job>,
}

impl OperationQueue {
    /// Spawns the worker for `store` on `runtime`.
    pub(crate) fn spawn(name: &str, store: Arc<LogStore>, runtime: &Handle) -> Self {
        let (jobs, rx) = mpsc::unbounded_channel();
        runtime.spawn(run_worker(name.to_string(), store, rx));
        Self {
            name: name.to_string(),
            jobs,
        }
    }

    pub(crate) fn submit<T, F>(&self, op: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce(&LogStore) -> Result<T, Error> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move |store| {
            let _ = tx.send(op(store));
        });
        if self.jobs.send(job).is_err() {
            return Pending::ready(Err(Error::new(ErrorKind::Internal)
                .with_message("collection worker has stopped")
                .with_collection(&self.name)));
        }
        Pending::queued(rx, &self.name)
    }
}

async fn run_worker(name: String, store: Arc<LogStore>, mut jobs: mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = jobs.recv().await {
        let store = Arc::clone(&store);
        if let Err(err) = tokio::task::spawn_blocking(move || job(&store)).await {
            tracing::error!(collection = %name, error = %err, "queued operation aborted");
        }
    }
    tracing::debug!(collection = %name, "collection worker stopped");
}

/// Completion handle for a queued operation.
///
/// The operation is already queued when this is returned; dropping it does not
/// cancel the operation, it only discards the result.
#[must_use = "the operation runs regardless; await the handle to observe its result"]
pub struct Pending<T> {
    state: PendingState<T>,
}

enum PendingState<T> {
    Ready(Option<Result<T, Error>>),
    Queued {
        rx: oneshot::Receiver<Result<T, Error>>,
        collection: String,
    },
}

impl<T> Pending<T> {
    pub(crate) fn ready(result: Result<T, Error>) -> Self {
        Self {
            state: PendingState::Ready(Some(result)),
        }
    }

    fn queued(rx: oneshot::Receiver<Result<T, Error>>, collection: &str) -> Self {
        Self {
            state: PendingState::Queued {
                rx,
                collection: collection.to_string(),
            },
        }
    }
}

// Never pin-projects into `T`.
impl<T> Unpin for Pending<T> {}

impl<T> Future for Pending<T> {
    type Output = Result<T, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.state {
            PendingState::Ready(result) => Poll::Ready(result.take().unwrap_or_else(|| {
                Err(Error::new(ErrorKind::Internal).with_message("result already taken"))
            })),
            PendingState::Queued { rx, collection } => match Pin::new(rx).poll(cx) {
                Poll::Ready(Ok(result)) => Poll::Ready(result),
                Poll::Ready(Err(_)) => Poll::Ready(Err(Error::new(ErrorKind::Internal)
                    .with_message("operation aborted before completing")
                    .with_collection(collection.as_str()))),
                Poll::Pending => Poll::Pending,
            },
        }
    }
}
