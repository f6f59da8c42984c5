//! Resource Addressing
//!
//! ```text
//! base_url / namespace / resource            collection (feed)
//! base_url / namespace / resource('id')      single entity
//! ```

use reqwest::Url;

use crate::error::ClientError;

/// Builds collection and entity URLs under one service namespace
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceAddress {
    base: Url,
    namespace: String,
}

impl ResourceAddress {
    /// Create an address root
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidAddress`] if `base_url` is not an
    /// absolute http(s) URL or `namespace` is not a valid path segment.
    pub fn new(base_url: &str, namespace: &str) -> Result<Self, ClientError> {
        let base = Url::parse(base_url.trim())
            .map_err(|e| ClientError::InvalidAddress(format!("base URL {base_url:?}: {e}")))?;
        if !matches!(base.scheme(), "http" | "https") || base.cannot_be_a_base() {
            return Err(ClientError::InvalidAddress(format!(
                "base URL {base_url:?} must be an absolute http(s) URL"
            )));
        }
        check_segment("namespace", namespace)?;

        Ok(Self {
            base,
            namespace: namespace.to_string(),
        })
    }

    /// The service root
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// The namespace segment
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Address of a resource collection
    pub fn collection(&self, resource: &str) -> Result<Url, ClientError> {
        check_segment("resource", resource)?;
        self.join(resource)
    }

    /// Address of one entity, using the `resource('id')` key form
    ///
    /// Single quotes inside `id` are doubled; everything else is
    /// percent-encoded as a path segment.
    pub fn entity(&self, resource: &str, id: &str) -> Result<Url, ClientError> {
        check_segment("resource", resource)?;
        if id.is_empty() {
            return Err(ClientError::InvalidAddress(
                "entity id must not be empty".to_string(),
            ));
        }
        self.join(&format!("{resource}('{}')", id.replace('\'', "''")))
    }

    fn join(&self, last: &str) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|()| {
                ClientError::InvalidAddress(format!("{} cannot be a base URL", self.base))
            })?
            .pop_if_empty()
            .push(&self.namespace)
            .push(last);
        Ok(url)
    }
}

fn check_segment(kind: &str, segment: &str) -> Result<(), ClientError> {
    if segment.is_empty() {
        return Err(ClientError::InvalidAddress(format!(
            "{kind} must not be empty"
        )));
    }
    if segment.contains(['/', '?', '#']) {
        return Err(ClientError::InvalidAddress(format!(
            "{kind} {segment:?} must not contain '/', '?' or '#'"
        )));
    }
    Ok(())
}
