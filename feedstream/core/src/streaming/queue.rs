//! Record Queue and Completion Signal
//!
//! An unbounded channel carrying tagged deliveries from the producer to the
//! single consumer view:
//!
//! ```text
//! producer ──enqueue(R)──┐
//!          ──finish()────┼──► [ Record | Record | End ] ──► await_next() ─► Next<R>
//!          ──fault(e)────┘
//! ```
//!
//! The producer owns [`RecordQueue`], the consumer owns [`RecordDrain`].
//! Because the drain is owned (never shared), at most one `await_next` can be
//! pending at a time. Terminal markers are sent after every record, so they
//! are always observed last.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::mpsc;
use tokio_util::sync::WaitForCancellationFutureOwned;

use super::shared::Shared;
use crate::error::DecodeError;

/// What the producer puts on the queue
#[derive(Debug)]
pub(crate) enum Delivery<R> {
    Record(R),
    End,
    Fault(Arc<DecodeError>),
}

/// What a consumer gets back from the queue
#[derive(Debug)]
pub(crate) enum Next<R> {
    /// The next record, in production order
    Record(R),
    /// The reader was exhausted cleanly
    End,
    /// The reader failed; no records follow
    Faulted(Arc<DecodeError>),
    /// The result was disposed
    Cancelled,
    /// The producer went away without a terminal marker
    Lost,
}

/// Consumer went away; the producer should stop
#[derive(Debug)]
pub(crate) struct Detached;

/// Create a connected queue/drain pair
pub(crate) fn record_queue<R>(shared: &Arc<Shared>) -> (RecordQueue<R>, RecordDrain<R>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        RecordQueue { tx },
        RecordDrain {
            rx,
            cancelled: Box::pin(shared.cancel.clone().cancelled_owned()),
            shared: Arc::clone(shared),
            settled: false,
        },
    )
}

/// Producer half
pub(crate) struct RecordQueue<R> {
    tx: mpsc::UnboundedSender<Delivery<R>>,
}

impl<R> RecordQueue<R> {
    /// Append a record and wake the consumer
    pub(crate) fn enqueue(&self, record: R) -> Result<(), Detached> {
        self.tx.send(Delivery::Record(record)).map_err(|_| Detached)
    }

    /// Signal clean exhaustion
    pub(crate) fn finish(self) {
        let _ = self.tx.send(Delivery::End);
    }

    /// Signal a fault
    pub(crate) fn fault(self, error: Arc<DecodeError>) {
        let _ = self.tx.send(Delivery::Fault(error));
    }
}

/// Consumer half: the suspension point for both blocking and async views
pub(crate) struct RecordDrain<R> {
    rx: mpsc::UnboundedReceiver<Delivery<R>>,
    shared: Arc<Shared>,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    settled: bool,
}

impl<R> RecordDrain<R> {
    /// Whether a terminal value was already returned
    pub(crate) fn is_settled(&self) -> bool {
        self.settled
    }

    /// Take the oldest queued value without waiting
    ///
    /// `None` means nothing is queued yet and the producer is still running.
    pub(crate) fn try_dequeue(&mut self) -> Option<Next<R>> {
        if let Some(early) = self.early_exit() {
            return Some(early);
        }
        match self.rx.try_recv() {
            Ok(delivery) => Some(self.accept(delivery)),
            Err(mpsc::error::TryRecvError::Empty) => None,
            Err(mpsc::error::TryRecvError::Disconnected) => Some(self.closed()),
        }
    }

    /// Wait for the next value, blocking the calling thread
    ///
    /// Wakes on cancellation like the async variant, even while the producer
    /// is still stuck in a read. Must not be called from inside an async
    /// execution context.
    pub(crate) fn await_next_blocking(&mut self) -> Next<R> {
        futures::executor::block_on(self.await_next())
    }

    /// Wait for the next value asynchronously
    pub(crate) async fn await_next(&mut self) -> Next<R> {
        std::future::poll_fn(|cx| self.poll_next(cx)).await
    }

    /// Poll for the next value; also wakes on cancellation
    pub(crate) fn poll_next(&mut self, cx: &mut Context<'_>) -> Poll<Next<R>> {
        if let Some(early) = self.early_exit() {
            return Poll::Ready(early);
        }
        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(delivery)) => Poll::Ready(self.accept(delivery)),
            Poll::Ready(None) => Poll::Ready(self.closed()),
            Poll::Pending => {
                if self.cancelled.as_mut().poll(cx).is_ready() {
                    self.settled = true;
                    return Poll::Ready(Next::Cancelled);
                }
                Poll::Pending
            }
        }
    }

    fn early_exit(&mut self) -> Option<Next<R>> {
        if self.settled {
            return Some(Next::End);
        }
        if self.shared.cancel.is_cancelled() {
            self.settled = true;
            return Some(Next::Cancelled);
        }
        None
    }

    fn accept(&mut self, delivery: Delivery<R>) -> Next<R> {
        match delivery {
            Delivery::Record(record) => {
                self.shared.mark_delivered();
                Next::Record(record)
            }
            Delivery::End => {
                self.settled = true;
                Next::End
            }
            Delivery::Fault(error) => {
                self.settled = true;
                Next::Faulted(error)
            }
        }
    }

    fn closed(&mut self) -> Next<R> {
        self.settled = true;
        if self.shared.cancel.is_cancelled() {
            Next::Cancelled
        } else {
            Next::Lost
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_fifo_then_end() {
        let shared = Shared::new();
        let (queue, mut drain) = record_queue::<u32>(&shared);

        assert!(drain.try_dequeue().is_none());

        queue.enqueue(1).unwrap();
        queue.enqueue(2).unwrap();
        queue.finish();

        assert!(matches!(drain.await_next_blocking(), Next::Record(1)));
        assert!(matches!(drain.try_dequeue(), Some(Next::Record(2))));
        assert!(matches!(drain.await_next_blocking(), Next::End));
        assert!(drain.is_settled());
        // Settled drains stay at End
        assert!(matches!(drain.try_dequeue(), Some(Next::End)));
        assert_eq!(shared.delivered(), 2);
    }

    #[test]
    fn test_fault_is_terminal() {
        let shared = Shared::new();
        let (queue, mut drain) = record_queue::<u32>(&shared);

        let error = Arc::new(DecodeError::InvalidRecord("broken".to_string()));
        queue.enqueue(7).unwrap();
        queue.fault(Arc::clone(&error));

        assert!(matches!(drain.await_next_blocking(), Next::Record(7)));
        match drain.await_next_blocking() {
            Next::Faulted(e) => assert!(Arc::ptr_eq(&e, &error)),
            other => panic!("expected fault, got {other:?}"),
        }
        assert!(matches!(drain.await_next_blocking(), Next::End));
    }

    #[test]
    fn test_dropped_producer_is_lost() {
        let shared = Shared::new();
        let (queue, mut drain) = record_queue::<u32>(&shared);
        drop(queue);

        assert!(matches!(drain.await_next_blocking(), Next::Lost));
    }

    #[test]
    fn test_cancellation_wins_over_queued_records() {
        let shared = Shared::new();
        let (queue, mut drain) = record_queue::<u32>(&shared);
        queue.enqueue(1).unwrap();

        shared.cancel.cancel();
        assert!(matches!(drain.try_dequeue(), Some(Next::Cancelled)));
        assert_eq!(shared.delivered(), 0);
    }

    #[test]
    fn test_enqueue_after_consumer_detached() {
        let shared = Shared::new();
        let (queue, drain) = record_queue::<u32>(&shared);
        drop(drain);

        assert!(queue.enqueue(1).is_err());
    }

    #[test]
    fn test_blocking_wait_wakes_on_enqueue() {
        let shared = Shared::new();
        let (queue, mut drain) = record_queue::<u32>(&shared);

        let producer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            queue.enqueue(42).unwrap();
            queue.finish();
        });

        assert!(matches!(drain.await_next_blocking(), Next::Record(42)));
        assert!(matches!(drain.await_next_blocking(), Next::End));
        producer.join().unwrap();
    }

    #[test]
    fn test_blocking_wait_wakes_on_cancel() {
        let shared = Shared::new();
        let (queue, mut drain) = record_queue::<u32>(&shared);

        let cancel = shared.cancel.clone();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            cancel.cancel();
        });

        // Producer half stays alive: only the token can wake us
        assert!(matches!(drain.await_next_blocking(), Next::Cancelled));
        assert!(drain.is_settled());
        canceller.join().unwrap();
        drop(queue);
    }

    #[tokio::test]
    async fn test_async_wait_wakes_on_cancel() {
        let shared = Shared::new();
        let (queue, mut drain) = record_queue::<u32>(&shared);

        let cancel = shared.cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        // Producer half stays alive: only the token can wake us
        let next = tokio::time::timeout(Duration::from_secs(2), drain.await_next())
            .await
            .unwrap();
        assert!(matches!(next, Next::Cancelled));
        drop(queue);
    }
}
