//! feedstream Core - Single-Pass Consumption of Paginated Atom Feeds
//!
//! This crate reads a remote service's streamed Atom (XML) responses record by
//! record as bytes arrive, and exposes them to application code either as a
//! blocking iterator, an async stream, or push notifications to an observer.
//! Each underlying stream is consumed exactly once, with deterministic cleanup
//! and error surfacing even when consumption is cancelled mid-stream.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          FeedClient                              │
//! │   query() ──► first page ──► PagedFeedReader (follows next)      │
//! │   fetch_entity() (retry on not-ready)   metadata() (TTL cache)  │
//! └───────────────────────────────┬─────────────────────────────────┘
//!                                 │ RecordReader
//! ┌───────────────────────────────┼─────────────────────────────────┐
//! │                       StreamingResult<R>                          │
//! │  ┌─────────────────┐   ┌────────────┐   ┌──────────────────────┐ │
//! │  │ producer thread │──►│ mpsc queue │──►│ iter / stream /      │ │
//! │  │ (owns reader)   │   │ Record|End │   │ subscribe (one only) │ │
//! │  └─────────────────┘   └────────────┘   └──────────────────────┘ │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`StreamingResult`]: the single-pass result facade
//! - [`RecordReader`]: sequential parser over an open stream
//! - [`AtomEntryReader`]: Atom `<entry>` reader built on `quick_xml`
//! - [`FeedClient`]: HTTP client producing streaming results
//!
//! # Quick Start
//!
//! ```ignore
//! use feedstream_core::{ClientConfig, FeedClient};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = FeedClient::new(ClientConfig::default())?;
//!     let result = client.query("jobs").await?;
//!
//!     let mut records = result.stream()?;
//!     while let Some(entry) = records.next().await {
//!         println!("{:?}", entry?.title);
//!     }
//!     println!("{} entries", result.read_count());
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`streaming`]: streaming result, producer thread, consumer views
//! - [`reader`]: record reader trait and the Atom reader
//! - [`client`]: HTTP client, addressing, paging, retry, metadata cache
//! - [`config`]: TOML/env configuration
//! - [`error`]: error types

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod reader;
pub mod streaming;

// Re-exports for convenience
pub use client::{ClientConfig, FeedClient, MetadataCache, ResourceAddress, RetryPolicy};
pub use config::{load_config, load_config_from_path, ConfigOverrides, ConfigSource, FeedstreamConfig};
pub use error::{ClientError, DecodeError, StreamError, UsageError};
pub use reader::{AtomEntry, AtomEntryReader, FeedMetadata, RecordReader, RecordReaderExt};
pub use streaming::{
    FnObserver, ProductionState, RecordIter, RecordObserver, RecordStream, StreamId,
    StreamingResult, Subscription,
};
