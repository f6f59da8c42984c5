//! Record Readers
//!
//! A [`RecordReader`] advances a cursor over an already-open stream and
//! yields one record per call. The streaming core never inspects records and
//! never rewinds the cursor.
//!
//! - [`atom`]: Atom entry reader built on `quick_xml`
//! - [`MapRecords`]: adapter turning raw records into typed ones

pub mod atom;

pub use atom::{AtomEntry, AtomEntryReader, AtomLink, FeedMetadata};

use crate::error::DecodeError;

/// Sequential reader over a single-pass stream
///
/// Returns `Ok(Some(record))` for each record, `Ok(None)` once the stream is
/// cleanly exhausted, and `Err` on malformed input. After `Ok(None)` or `Err`
/// the reader is not called again.
pub trait RecordReader: Send + 'static {
    /// Record type produced by this reader
    type Record: Send + 'static;

    /// Read the next record from the stream
    fn read_next(&mut self) -> Result<Option<Self::Record>, DecodeError>;
}

impl<R: RecordReader + ?Sized> RecordReader for Box<R> {
    type Record = R::Record;

    fn read_next(&mut self) -> Result<Option<Self::Record>, DecodeError> {
        (**self).read_next()
    }
}

/// Reader adapter mapping each record through a fallible conversion
///
/// A conversion failure ends production the same way a malformed record does.
pub struct MapRecords<R, F> {
    inner: R,
    map: F,
}

impl<R, F, T> RecordReader for MapRecords<R, F>
where
    R: RecordReader,
    F: FnMut(R::Record) -> Result<T, DecodeError> + Send + 'static,
    T: Send + 'static,
{
    type Record = T;

    fn read_next(&mut self) -> Result<Option<T>, DecodeError> {
        match self.inner.read_next()? {
            Some(record) => (self.map)(record).map(Some),
            None => Ok(None),
        }
    }
}

/// Extension methods for record readers
pub trait RecordReaderExt: RecordReader + Sized {
    /// Convert every record with `map`
    fn map_records<F, T>(self, map: F) -> MapRecords<Self, F>
    where
        F: FnMut(Self::Record) -> Result<T, DecodeError> + Send + 'static,
        T: Send + 'static,
    {
        MapRecords { inner: self, map }
    }
}

impl<R: RecordReader> RecordReaderExt for R {}
