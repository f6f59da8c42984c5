//! Feed Client
//!
//! Thin HTTP layer that opens Atom responses and hands them to the streaming
//! core. Nothing here inspects records beyond parsing them.
//!
//! # Operations
//!
//! ```text
//! query(resource)           GET base/ns/resource        -> StreamingResult<AtomEntry>
//! fetch_entity(res, id)     GET base/ns/res('id')       -> AtomEntry      (retried on not-ready)
//! metadata(resource)        GET base/ns/resource        -> FeedMetadata   (cached)
//! ```
//!
//! `query` needs a multi-threaded tokio runtime: follow-up pages are fetched
//! from the producer thread with `Handle::block_on`, which a current-thread
//! runtime cannot service while its only thread is blocked in a pull
//! iterator.

pub mod address;
pub mod metadata;
pub mod pages;
pub mod retry;

pub use address::ResourceAddress;
pub use metadata::MetadataCache;
pub use pages::{HttpPageSource, PageBody, PageSource, PagedFeedReader};
pub use retry::RetryPolicy;

use std::io::{self, Cursor};
use std::time::Duration;

use reqwest::{StatusCode, Url};
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::error::{ClientError, DecodeError};
use crate::reader::{AtomEntry, AtomEntryReader, FeedMetadata};
use crate::streaming::StreamingResult;

pub(crate) const ATOM_ACCEPT: &str = "application/atom+xml, application/xml;q=0.9";

// ============================================================================
// Configuration
// ============================================================================

/// Settings for [`FeedClient`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Service root, e.g. `http://localhost:8080/api`
    pub base_url: String,

    /// Namespace segment under the service root
    pub namespace: String,

    /// Connect timeout for every request; long body streams are not capped
    pub timeout: Duration,

    /// `User-Agent` header value
    pub user_agent: String,

    /// Retry policy for entity fetches
    pub retry: RetryPolicy,

    /// How long feed headers stay cached
    pub metadata_ttl: Duration,

    /// Upper bound on pages read by one query (`None` = follow every link)
    pub max_pages: Option<usize>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            namespace: "default".to_string(),
            timeout: Duration::from_secs(30),
            user_agent: format!("feedstream/{}", env!("CARGO_PKG_VERSION")),
            retry: RetryPolicy::default(),
            metadata_ttl: MetadataCache::DEFAULT_TTL,
            max_pages: None,
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// HTTP client for a namespaced Atom service
#[derive(Debug)]
pub struct FeedClient {
    http: reqwest::Client,
    address: ResourceAddress,
    config: ClientConfig,
    metadata: MetadataCache,
}

impl FeedClient {
    /// Build a client
    ///
    /// # Errors
    ///
    /// Fails if the base URL or namespace is invalid or the HTTP client
    /// cannot be constructed.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let address = ResourceAddress::new(&config.base_url, &config.namespace)?;
        let http = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        tracing::debug!(
            base_url = %address.base_url(),
            namespace = %address.namespace(),
            "Feed client created"
        );

        Ok(Self {
            http,
            address,
            metadata: MetadataCache::new(config.metadata_ttl),
            config,
        })
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Address builder for this client's namespace
    #[must_use]
    pub fn address(&self) -> &ResourceAddress {
        &self.address
    }

    /// Feed header cache
    #[must_use]
    pub fn metadata_cache(&self) -> &MetadataCache {
        &self.metadata
    }

    /// Open a streaming query over every entry of a collection
    ///
    /// The first page is requested before this returns, so HTTP errors on
    /// it surface here. Later pages are fetched lazily as the consumer
    /// reads; their failures end the stream with [`DecodeError::Page`].
    ///
    /// # Errors
    ///
    /// [`ClientError::UnsupportedRuntime`] outside a multi-threaded tokio
    /// runtime, otherwise any addressing or HTTP error on the first page.
    pub async fn query(&self, resource: &str) -> Result<StreamingResult<AtomEntry>, ClientError> {
        let handle = multi_thread_handle()?;
        let url = self.address.collection(resource)?;

        tracing::info!(url = %url, "Querying feed");
        let response = self.get(&url).await?;
        let first_page = pages::blocking_body(response, handle.clone());

        let reader = PagedFeedReader::new(
            HttpPageSource::new(self.http.clone(), handle),
            url.as_str(),
            first_page,
            self.config.max_pages,
        );
        Ok(StreamingResult::wrap(reader))
    }

    /// Fetch one entity by key
    ///
    /// Not-ready statuses are retried according to the client's
    /// [`RetryPolicy`].
    pub async fn fetch_entity(&self, resource: &str, id: &str) -> Result<AtomEntry, ClientError> {
        let url = self.address.entity(resource, id)?;
        self.config
            .retry
            .run(|attempt| self.fetch_entity_once(&url, attempt))
            .await
    }

    async fn fetch_entity_once(&self, url: &Url, attempt: u32) -> Result<AtomEntry, ClientError> {
        tracing::info!(url = %url, attempt, "Fetching entity");
        let response = self.get(url).await.map_err(|e| match e {
            ClientError::Status { status: 404, url } => ClientError::NotFound(url),
            other => other,
        })?;
        let body = response.bytes().await?;

        let mut reader = AtomEntryReader::new(Cursor::new(body));
        reader.next_entry()?.ok_or_else(|| {
            ClientError::Decode(DecodeError::InvalidRecord(format!(
                "response from {url} contained no entry"
            )))
        })
    }

    /// Feed header of a collection, served from cache while fresh
    pub async fn metadata(&self, resource: &str) -> Result<FeedMetadata, ClientError> {
        let url = self.address.collection(resource)?;
        if let Some(cached) = self.metadata.get(url.as_str()) {
            tracing::debug!(url = %url, "Feed metadata served from cache");
            return Ok(cached);
        }

        tracing::info!(url = %url, "Refreshing feed metadata");
        let response = self.get(&url).await?;
        let handle = Handle::try_current().map_err(|_| ClientError::UnsupportedRuntime)?;
        let body = pages::blocking_body(response, handle);

        // Header fields precede the entries, so stop at the first entry
        let metadata = tokio::task::spawn_blocking(move || {
            let mut reader = AtomEntryReader::new(body);
            reader.next_entry()?;
            Ok::<_, DecodeError>(reader.metadata().clone())
        })
        .await
        .map_err(|e| DecodeError::Io(io::Error::other(e)))??;

        self.metadata.insert(url.as_str(), metadata.clone());
        Ok(metadata)
    }

    /// GET an Atom document, mapping error statuses
    async fn get(&self, url: &Url) -> Result<reqwest::Response, ClientError> {
        let response = self
            .http
            .get(url.clone())
            .header(reqwest::header::ACCEPT, ATOM_ACCEPT)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let code = status.as_u16();
        let url = url.to_string();
        if self.config.retry.is_not_ready(code) {
            tracing::debug!(url = %url, status = code, "Resource not ready");
            return Err(ClientError::NotReady { status: code, url });
        }
        if status != StatusCode::NOT_FOUND {
            tracing::warn!(url = %url, status = code, "Request failed");
        }
        Err(ClientError::Status { status: code, url })
    }
}

fn multi_thread_handle() -> Result<Handle, ClientError> {
    let handle = Handle::try_current().map_err(|_| ClientError::UnsupportedRuntime)?;
    if handle.runtime_flavor() == RuntimeFlavor::CurrentThread {
        return Err(ClientError::UnsupportedRuntime);
    }
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.metadata_ttl, Duration::from_secs(300));
        assert!(config.user_agent.starts_with("feedstream/"));
        assert!(config.max_pages.is_none());
    }

    #[test]
    fn test_new_rejects_bad_address() {
        let config = ClientConfig {
            namespace: "a/b".to_string(),
            ..ClientConfig::default()
        };
        assert!(matches!(
            FeedClient::new(config),
            Err(ClientError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn test_query_requires_multi_thread_runtime() {
        let client = FeedClient::new(ClientConfig::default()).unwrap();
        let err = client.query("jobs").await.unwrap_err();
        assert!(matches!(err, ClientError::UnsupportedRuntime));
    }

    #[test]
    fn test_query_outside_runtime() {
        let client = FeedClient::new(ClientConfig::default()).unwrap();
        let err = futures::executor::block_on(client.query("jobs")).unwrap_err();
        assert!(matches!(err, ClientError::UnsupportedRuntime));
    }
}
