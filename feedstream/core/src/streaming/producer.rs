//! Background Producer
//!
//! One named OS thread per streaming result. It owns the reader for its whole
//! life, so the underlying stream is released exactly when the thread exits.
//!
//! ```text
//! loop {
//!     cancelled?            -> Cancelled
//!     reader.read_next()
//!         Some(record)      -> enqueue (consumer gone -> Cancelled)
//!         None              -> Finished, End
//!         Err(e) / panic    -> Faulted, Fault(e)
//! }
//! ```

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;

use super::queue::RecordQueue;
use super::shared::Shared;
use super::state::ProductionState;
use crate::error::DecodeError;
use crate::reader::RecordReader;

/// Start the producer thread
///
/// The caller must already have claimed `NotStarted -> Running`.
pub(crate) fn spawn<Rd>(
    reader: Rd,
    queue: RecordQueue<Rd::Record>,
    shared: Arc<Shared>,
) -> std::io::Result<JoinHandle<()>>
where
    Rd: RecordReader,
{
    let name = format!("feedstream-{}", &shared.id.0.simple().to_string()[..8]);
    std::thread::Builder::new()
        .name(name)
        .spawn(move || run(reader, queue, &shared))
}

fn run<Rd: RecordReader>(mut reader: Rd, queue: RecordQueue<Rd::Record>, shared: &Shared) {
    tracing::debug!(stream_id = %shared.id, "Record producer started");

    loop {
        if shared.cancel.is_cancelled() {
            settle(shared, ProductionState::Cancelled);
            tracing::debug!(
                stream_id = %shared.id,
                records = shared.produced(),
                "Record producer cancelled"
            );
            return;
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| reader.read_next()))
            .unwrap_or_else(|payload| Err(DecodeError::ReaderPanicked(panic_message(&*payload))));

        match outcome {
            Ok(Some(record)) => {
                shared.mark_produced();
                if queue.enqueue(record).is_err() {
                    settle(shared, ProductionState::Cancelled);
                    tracing::debug!(
                        stream_id = %shared.id,
                        records = shared.produced(),
                        "Consumer detached, stopping record producer"
                    );
                    return;
                }
            }
            Ok(None) => {
                settle(shared, ProductionState::Finished);
                queue.finish();
                tracing::debug!(
                    stream_id = %shared.id,
                    records = shared.produced(),
                    "Record producer finished"
                );
                return;
            }
            Err(error) => {
                let error = Arc::new(error);
                shared.retain_error(&error);
                settle(shared, ProductionState::Faulted);
                tracing::warn!(
                    stream_id = %shared.id,
                    records = shared.produced(),
                    error = %error,
                    "Record producer faulted"
                );
                queue.fault(error);
                return;
            }
        }
    }
}

fn settle(shared: &Shared, terminal: ProductionState) {
    if let Err(current) = shared.state.settle(terminal) {
        tracing::warn!(
            stream_id = %shared.id,
            current = %current,
            requested = %terminal,
            "Record producer settled outside the running state"
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
