//! Streaming Result Facade
//!
//! [`StreamingResult`] wraps an open [`RecordReader`] and hands its records
//! to exactly one consumer view:
//!
//! - [`StreamingResult::iter`]: blocking pull iterator
//! - [`StreamingResult::stream`]: async `futures::Stream`
//! - [`StreamingResult::subscribe`]: push delivery to a [`RecordObserver`]
//!
//! Whichever view is asked for first claims the result; every later request
//! fails with [`UsageError::AlreadyConsumed`]. Disposal (explicit or on drop)
//! stops the producer, waits for it, and releases the reader.

use std::fmt;
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread::JoinHandle;

use futures::{Stream, StreamExt};
use parking_lot::Mutex;

use super::producer;
use super::queue::{record_queue, Next, RecordDrain};
use super::shared::{Shared, StreamId};
use super::state::ProductionState;
use crate::error::{DecodeError, StreamError, UsageError};
use crate::reader::RecordReader;

// ============================================================================
// Facade
// ============================================================================

struct Lifecycle<R: Send + 'static> {
    /// Present until a consumer view moves it into the producer
    reader: Option<Box<dyn RecordReader<Record = R>>>,
    worker: Option<JoinHandle<()>>,
    disposed: bool,
}

/// Single-pass result over a record stream
///
/// Dropping runs [`dispose`](Self::dispose), which joins the producer
/// thread. Inside async code, move the result into `spawn_blocking` to
/// dispose or drop it.
pub struct StreamingResult<R: Send + 'static> {
    shared: Arc<Shared>,
    lifecycle: Mutex<Lifecycle<R>>,
}

impl<R: Send + 'static> StreamingResult<R> {
    /// Wrap an already-open reader
    ///
    /// Nothing is read until a consumer view is requested.
    pub fn wrap<Rd>(reader: Rd) -> Self
    where
        Rd: RecordReader<Record = R>,
    {
        let shared = Shared::new();
        tracing::debug!(stream_id = %shared.id, "Streaming result created");
        Self {
            shared,
            lifecycle: Mutex::new(Lifecycle {
                reader: Some(Box::new(reader)),
                worker: None,
                disposed: false,
            }),
        }
    }

    /// Identifier used in log output
    #[must_use]
    pub fn id(&self) -> StreamId {
        self.shared.id
    }

    /// Current production state
    #[must_use]
    pub fn state(&self) -> ProductionState {
        self.shared.state.get()
    }

    /// Records delivered to the consumer so far
    #[must_use]
    pub fn read_count(&self) -> u64 {
        self.shared.delivered()
    }

    /// Records read by the producer so far (may run ahead of `read_count`)
    #[must_use]
    pub fn produced_count(&self) -> u64 {
        self.shared.produced()
    }

    /// The error that stopped production, if any
    ///
    /// Same allocation as the one carried by [`StreamError::Decode`].
    #[must_use]
    pub fn last_error(&self) -> Option<Arc<DecodeError>> {
        self.shared.last_error()
    }

    /// Whether [`dispose`](Self::dispose) has run
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.lifecycle.lock().disposed
    }

    /// Consume records with a blocking iterator
    ///
    /// Each call to `next` blocks the current thread, so this must not be
    /// driven from inside an async task. Use [`stream`](Self::stream) there.
    pub fn iter(&self) -> Result<RecordIter<'_, R>, StreamError> {
        let drain = self.begin("pull")?;
        Ok(RecordIter {
            drain,
            _result: PhantomData,
        })
    }

    /// Consume records as an async stream
    pub fn stream(&self) -> Result<RecordStream<R>, StreamError> {
        let drain = self.begin("stream")?;
        Ok(RecordStream { drain })
    }

    /// Push records to `observer` from a task on the current tokio runtime
    ///
    /// Fails with [`UsageError::NoRuntime`] outside a runtime; the result is
    /// not claimed in that case.
    pub fn subscribe<O>(&self, observer: O) -> Result<Subscription, StreamError>
    where
        O: RecordObserver<R>,
    {
        let handle =
            tokio::runtime::Handle::try_current().map_err(|_| UsageError::NoRuntime)?;
        let stream = RecordStream {
            drain: self.begin("push")?,
        };
        let id = self.shared.id;
        let task = handle.spawn(deliver(stream, observer, id));
        Ok(Subscription { id, task })
    }

    /// Stop production, wait for the producer, release the reader
    ///
    /// Idempotent. Blocks until the producer thread has exited, so the
    /// underlying stream is never released while a read is in flight.
    pub fn dispose(&self) {
        let mut life = self.lifecycle.lock();
        if life.disposed {
            return;
        }
        life.disposed = true;
        self.shared.cancel.cancel();

        if self.shared.state.cancel_unstarted().is_ok() {
            tracing::debug!(stream_id = %self.shared.id, "Disposed before consumption");
        }
        drop(life.reader.take());

        if let Some(worker) = life.worker.take() {
            if worker.join().is_err() {
                tracing::warn!(stream_id = %self.shared.id, "Record producer thread panicked");
            }
        }

        tracing::debug!(
            stream_id = %self.shared.id,
            state = %self.shared.state.get(),
            records = self.shared.delivered(),
            "Streaming result disposed"
        );
    }

    /// Claim the result for one consumer view and start the producer
    fn begin(&self, view: &'static str) -> Result<RecordDrain<R>, StreamError> {
        let mut life = self.lifecycle.lock();
        if life.disposed {
            return Err(UsageError::Disposed.into());
        }
        if let Err(current) = self.shared.state.claim_running() {
            tracing::debug!(
                stream_id = %self.shared.id,
                state = %current,
                view,
                "Rejected second consumption"
            );
            return Err(UsageError::AlreadyConsumed.into());
        }
        let Some(reader) = life.reader.take() else {
            return Err(UsageError::AlreadyConsumed.into());
        };

        let (queue, drain) = record_queue(&self.shared);
        match producer::spawn(reader, queue, Arc::clone(&self.shared)) {
            Ok(worker) => {
                life.worker = Some(worker);
                tracing::debug!(stream_id = %self.shared.id, view, "Consumption started");
                Ok(drain)
            }
            Err(e) => {
                let _ = self.shared.state.settle(ProductionState::Faulted);
                tracing::warn!(
                    stream_id = %self.shared.id,
                    error = %e,
                    "Failed to spawn record producer"
                );
                Err(StreamError::Spawn(e))
            }
        }
    }
}

impl<R: Send + 'static> Drop for StreamingResult<R> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<R: Send + 'static> fmt::Debug for StreamingResult<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingResult")
            .field("id", &self.shared.id)
            .field("state", &self.state())
            .field("read_count", &self.read_count())
            .field("last_error", &self.last_error())
            .finish_non_exhaustive()
    }
}

/// Map a queue value onto the item shape both consumer views share
fn into_item<R>(next: Next<R>) -> Option<Result<R, StreamError>> {
    match next {
        Next::Record(record) => Some(Ok(record)),
        Next::End | Next::Cancelled => None,
        Next::Faulted(error) => Some(Err(StreamError::Decode(error))),
        Next::Lost => Some(Err(StreamError::ProducerLost)),
    }
}

// ============================================================================
// Pull view
// ============================================================================

/// Blocking iterator over a [`StreamingResult`]
///
/// A fault yields one `Err` and then the iterator is exhausted. Disposal ends
/// iteration without an error.
pub struct RecordIter<'a, R: Send + 'static> {
    drain: RecordDrain<R>,
    _result: PhantomData<&'a StreamingResult<R>>,
}

impl<R: Send + 'static> Iterator for RecordIter<'_, R> {
    type Item = Result<R, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        into_item(self.drain.await_next_blocking())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.drain.is_settled() {
            (0, Some(0))
        } else {
            (0, None)
        }
    }
}

impl<R: Send + 'static> FusedIterator for RecordIter<'_, R> {}

// ============================================================================
// Async view
// ============================================================================

/// Async stream over a [`StreamingResult`]
///
/// Wakes on new records, on the terminal marker, and on disposal.
pub struct RecordStream<R> {
    drain: RecordDrain<R>,
}

impl<R> RecordStream<R> {
    /// Take a record that is already queued, without waiting
    ///
    /// `None` means nothing is available yet.
    pub fn try_next_ready(&mut self) -> Option<Option<Result<R, StreamError>>> {
        self.drain.try_dequeue().map(into_item)
    }
}

// Never pin-projected; the drain is polled through `&mut`.
impl<R> Unpin for RecordStream<R> {}

impl<R> Stream for RecordStream<R> {
    type Item = Result<R, StreamError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().drain.poll_next(cx).map(into_item)
    }
}

impl<R> fmt::Debug for RecordStream<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStream")
            .field("settled", &self.drain.is_settled())
            .finish()
    }
}

// ============================================================================
// Push view
// ============================================================================

/// Receiver of pushed records
///
/// `on_next` is called for each record in order, then exactly one of
/// `on_error` or `on_completed`.
pub trait RecordObserver<R>: Send + 'static {
    /// A record arrived
    fn on_next(&mut self, record: R);

    /// Production failed; no further calls follow
    fn on_error(&mut self, error: StreamError);

    /// Production ended normally or was cancelled; no further calls follow
    fn on_completed(&mut self);
}

/// Observer assembled from three closures
pub struct FnObserver<N, E, C> {
    on_next: N,
    on_error: E,
    on_completed: C,
}

impl<N, E, C> FnObserver<N, E, C> {
    /// Create an observer from its callbacks
    pub fn new(on_next: N, on_error: E, on_completed: C) -> Self {
        Self {
            on_next,
            on_error,
            on_completed,
        }
    }
}

impl<R, N, E, C> RecordObserver<R> for FnObserver<N, E, C>
where
    N: FnMut(R) + Send + 'static,
    E: FnMut(StreamError) + Send + 'static,
    C: FnMut() + Send + 'static,
{
    fn on_next(&mut self, record: R) {
        (self.on_next)(record);
    }

    fn on_error(&mut self, error: StreamError) {
        (self.on_error)(error);
    }

    fn on_completed(&mut self) {
        (self.on_completed)();
    }
}

async fn deliver<R, O>(mut stream: RecordStream<R>, mut observer: O, id: StreamId)
where
    O: RecordObserver<R>,
{
    let mut delivered = 0u64;
    while let Some(item) = stream.next().await {
        match item {
            Ok(record) => {
                delivered += 1;
                observer.on_next(record);
            }
            Err(error) => {
                tracing::debug!(stream_id = %id, records = delivered, error = %error, "Push delivery failed");
                observer.on_error(error);
                return;
            }
        }
    }
    tracing::debug!(stream_id = %id, records = delivered, "Push delivery completed");
    observer.on_completed();
}

/// Handle to a running push delivery
#[derive(Debug)]
pub struct Subscription {
    id: StreamId,
    task: tokio::task::JoinHandle<()>,
}

impl Subscription {
    /// Identifier of the subscribed result
    #[must_use]
    pub fn id(&self) -> StreamId {
        self.id
    }

    /// Whether the terminal notification has been delivered
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait until the observer has received its terminal notification
    pub async fn finished(self) {
        if let Err(e) = self.task.await {
            if e.is_panic() {
                tracing::warn!(stream_id = %self.id, "Record observer panicked");
            }
        }
    }

    /// Stop delivering to the observer
    ///
    /// The observer receives no terminal notification after an abort.
    pub fn abort(&self) {
        self.task.abort();
    }
}
