//! Single-Pass Streaming Results
//!
//! Decouples record production (slow, I/O-bound, sequential) from record
//! consumption (blocking pull, async stream, or push observer) while
//! guaranteeing that each underlying stream is read exactly once.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        StreamingResult<R>                         │
//! │                                                                   │
//! │  ┌──────────────────┐   Record | End | Fault    ┌──────────────┐  │
//! │  │ producer thread  │ ────────────────────────► │ RecordDrain  │  │
//! │  │  owns the reader │     (unbounded mpsc)      │ await_next() │  │
//! │  └────────┬─────────┘                           └──────┬───────┘  │
//! │           │ checks before each read                    │          │
//! │   CancellationToken ◄──── dispose() ───────────────────┤          │
//! │                                                        │          │
//! └────────────────────────────────────────────────────────┼──────────┘
//!                            ┌─────────────────────────────┼───────────┐
//!                            ▼                             ▼           ▼
//!                      RecordIter (pull)     RecordStream (async)  RecordObserver (push)
//! ```
//!
//! # State Machine
//!
//! ```text
//! NotStarted ──first view──► Running ──┬──► Finished
//!      │                               ├──► Faulted
//!      │                               └──► Cancelled
//!      └──────────dispose──────────────────► Cancelled
//! ```
//!
//! # Example
//!
//! ```ignore
//! use feedstream_core::streaming::StreamingResult;
//!
//! let result = StreamingResult::wrap(reader);
//! for record in result.iter()? {
//!     println!("{:?}", record?);
//! }
//! println!("read {} records", result.read_count());
//! ```

pub mod consumer;
mod producer;
mod queue;
mod shared;
mod state;

pub use consumer::{
    FnObserver, RecordIter, RecordObserver, RecordStream, StreamingResult, Subscription,
};
pub use shared::StreamId;
pub use state::ProductionState;
