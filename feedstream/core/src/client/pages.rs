//! Paged Feed Reader
//!
//! Presents a server-paginated feed as one record sequence. Entries of the
//! current page are drained first; then the feed-level `next` link is
//! followed and the following page is opened on the same (producer) thread.
//!
//! ```text
//! page 1: entry entry entry <link rel="next" href="page 2">
//! page 2: entry entry       <link rel="next" href="page 3">
//! page 3: entry                                  -> end
//! ```
//!
//! Page bodies are opened through a [`PageSource`]. The HTTP implementation
//! bridges the async reqwest body into a blocking [`BufRead`] with
//! `SyncIoBridge`, so it must only be read from a non-async thread.

use std::io::{self, BufRead, BufReader};

use futures::StreamExt;
use reqwest::Url;
use tokio::runtime::Handle;
use tokio_util::io::{StreamReader, SyncIoBridge};

use crate::error::DecodeError;
use crate::reader::{AtomEntry, AtomEntryReader, FeedMetadata, RecordReader};

/// Blocking reader over one page body
pub type PageBody = Box<dyn BufRead + Send>;

/// Opens feed pages by URL
pub trait PageSource: Send + 'static {
    /// Open the page at `url`, positioned at the start of the document
    fn open(&mut self, url: &str) -> Result<PageBody, DecodeError>;
}

/// Wrap a reqwest response body as a blocking reader
///
/// Reads block the calling thread while `handle` drives the transfer.
pub(crate) fn blocking_body(response: reqwest::Response, handle: Handle) -> PageBody {
    let chunks = response.bytes_stream().map(|chunk| chunk.map_err(io::Error::other));
    let reader = StreamReader::new(Box::pin(chunks));
    Box::new(BufReader::new(SyncIoBridge::new_with_handle(reader, handle)))
}

/// [`PageSource`] fetching follow-up pages over HTTP
pub struct HttpPageSource {
    http: reqwest::Client,
    handle: Handle,
}

impl HttpPageSource {
    /// Create a source using `handle` to drive requests
    #[must_use]
    pub fn new(http: reqwest::Client, handle: Handle) -> Self {
        Self { http, handle }
    }
}

impl PageSource for HttpPageSource {
    fn open(&mut self, url: &str) -> Result<PageBody, DecodeError> {
        let page_error = |message: String| DecodeError::Page {
            url: url.to_string(),
            message,
        };

        let response = self
            .handle
            .block_on(
                self.http
                    .get(url)
                    .header(reqwest::header::ACCEPT, super::ATOM_ACCEPT)
                    .send(),
            )
            .map_err(|e| page_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(page_error(format!("server returned {status}")));
        }

        tracing::info!(url, status = status.as_u16(), "Fetched feed page");
        Ok(blocking_body(response, self.handle.clone()))
    }
}

/// Record reader spanning every page of a feed
pub struct PagedFeedReader<S> {
    source: S,
    current: AtomEntryReader<PageBody>,
    current_url: String,
    pages_read: usize,
    max_pages: Option<usize>,
}

impl<S: PageSource> PagedFeedReader<S> {
    /// Start from a first page that is already open
    ///
    /// `max_pages` bounds the total number of pages read, including the
    /// first one.
    pub fn new(
        source: S,
        first_url: impl Into<String>,
        first_page: PageBody,
        max_pages: Option<usize>,
    ) -> Self {
        Self {
            source,
            current: AtomEntryReader::new(first_page),
            current_url: first_url.into(),
            pages_read: 1,
            max_pages,
        }
    }

    /// Open the first page through `source` and start from it
    pub fn open(
        mut source: S,
        first_url: impl Into<String>,
        max_pages: Option<usize>,
    ) -> Result<Self, DecodeError> {
        let first_url = first_url.into();
        let first_page = source.open(&first_url)?;
        Ok(Self::new(source, first_url, first_page, max_pages))
    }

    /// Pages opened so far
    #[must_use]
    pub fn pages_read(&self) -> usize {
        self.pages_read
    }

    /// Address of the page being read
    #[must_use]
    pub fn current_url(&self) -> &str {
        &self.current_url
    }

    /// Header of the page being read
    #[must_use]
    pub fn metadata(&self) -> &FeedMetadata {
        self.current.metadata()
    }

    fn page_limit_reached(&self) -> bool {
        self.max_pages.is_some_and(|max| self.pages_read >= max)
    }

    /// Resolve the current page's next link against its own address
    fn next_url(&self, href: &str) -> Result<String, DecodeError> {
        let resolved = Url::parse(&self.current_url)
            .and_then(|base| base.join(href))
            .map_err(|e| DecodeError::Page {
                url: href.to_string(),
                message: format!("invalid next link: {e}"),
            })?;
        if resolved.as_str() == self.current_url {
            return Err(DecodeError::Page {
                url: href.to_string(),
                message: "next link points back to the current page".to_string(),
            });
        }
        Ok(resolved.into())
    }
}

impl<S: PageSource> RecordReader for PagedFeedReader<S> {
    type Record = AtomEntry;

    fn read_next(&mut self) -> Result<Option<AtomEntry>, DecodeError> {
        loop {
            if let Some(entry) = self.current.next_entry()? {
                return Ok(Some(entry));
            }

            let Some(href) = self.current.next_link() else {
                tracing::debug!(pages = self.pages_read, "Last feed page drained");
                return Ok(None);
            };
            if self.page_limit_reached() {
                tracing::debug!(pages = self.pages_read, "Page limit reached, not following next link");
                return Ok(None);
            }

            let next = self.next_url(href)?;
            tracing::debug!(url = %next, page = self.pages_read + 1, "Following next link");
            let body = self.source.open(&next)?;
            self.current = AtomEntryReader::new(body);
            self.current_url = next;
            self.pages_read += 1;
        }
    }
}
