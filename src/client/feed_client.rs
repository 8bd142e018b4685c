use reqwest::Method;
use std::sync::Arc;
use thiserror::Error;

use super::transport::{atom_headers, AtomRequest, ReqwestTransport, Transport, TransportError};
use crate::atom::{namespaces, EntryExtractor, ExtractError, FEED_ENTRIES_PATH};
use crate::config::Config;
use crate::util::url_decode;
use crate::xml::{Document, Element, XmlError};

/// Errors returned by [`FeedClient`] operations.
///
/// Nothing is retried or swallowed; each variant carries enough context to
/// tell which call failed and why.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The operation needs an authorized client.
    #[error("Authorization is required for this operation")]
    MissingAuthorization,

    /// The HTTP exchange failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The response body was not a well-formed XML document.
    #[error("Error parsing response XML from {operation} {url}: {source}")]
    Parse {
        operation: &'static str,
        url: String,
        #[source]
        source: XmlError,
    },

    /// The caller's extractor rejected an entry.
    #[error(transparent)]
    Extraction(#[from] ExtractError),

    /// The request could not be formed from the caller's input.
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

/// Client for an Atom-based web API.
///
/// Each operation is one stateless GET or POST exchange: the response is
/// parsed as a single XML document and handed to a caller-supplied
/// [`EntryExtractor`]. The authorization flag is fixed at construction and
/// checked before every request.
///
/// # Example
///
/// ```ignore
/// use atomclient::{FeedClient, atom::AtomEntryExtractor};
///
/// let client = FeedClient::from_config(&config)?;
/// let entries = client
///     .fetch_feed_entries("https://example.com/feeds/default", &AtomEntryExtractor)
///     .await?;
/// ```
#[derive(Clone)]
pub struct FeedClient {
    transport: Arc<dyn Transport>,
    is_authorized: bool,
}

impl std::fmt::Debug for FeedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedClient")
            .field("is_authorized", &self.is_authorized)
            .finish_non_exhaustive()
    }
}

impl FeedClient {
    /// Creates a client over `transport`. No I/O happens here.
    pub fn new(transport: Arc<dyn Transport>, is_authorized: bool) -> Self {
        Self {
            transport,
            is_authorized,
        }
    }

    /// Builds a [`ReqwestTransport`] from `config`. The client is authorized
    /// exactly when an access token is configured.
    pub fn from_config(config: &Config) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::from_config(config)?;
        let is_authorized = transport.has_access_token();
        Ok(Self::new(Arc::new(transport), is_authorized))
    }

    pub fn is_authorized(&self) -> bool {
        self.is_authorized
    }

    /// Fails with [`FeedError::MissingAuthorization`] unless the client is authorized.
    pub fn require_authorized(&self) -> Result<(), FeedError> {
        if self.is_authorized {
            Ok(())
        } else {
            Err(FeedError::MissingAuthorization)
        }
    }

    /// Fetches a single entry document and extracts its root element.
    ///
    /// `url` is form-decoded before dispatch.
    ///
    /// # Errors
    ///
    /// - [`FeedError::MissingAuthorization`] - the client is not authorized
    /// - [`FeedError::Configuration`] - `url` has a malformed escape
    /// - [`FeedError::Transport`] - the exchange failed
    /// - [`FeedError::Parse`] - the body is not well-formed XML
    /// - [`FeedError::Extraction`] - `extractor` failed
    #[tracing::instrument(skip(self, extractor))]
    pub async fn fetch_entry<E, X>(&self, url: &str, extractor: &X) -> Result<E, FeedError>
    where
        X: EntryExtractor<E> + ?Sized,
    {
        self.require_authorized()?;
        let document = self.get_document("fetch_entry", url).await?;
        Ok(extractor.extract_entry(document.root_element())?)
    }

    /// Fetches a feed and extracts every `/atom:feed/atom:entry` in document order.
    ///
    /// An empty feed yields an empty `Vec`. The first extractor failure aborts
    /// the call and discards entries already extracted.
    ///
    /// # Errors
    ///
    /// Same as [`FeedClient::fetch_entry`].
    #[tracing::instrument(skip(self, extractor))]
    pub async fn fetch_feed_entries<E, X>(
        &self,
        url: &str,
        extractor: &X,
    ) -> Result<Vec<E>, FeedError>
    where
        X: EntryExtractor<E> + ?Sized,
    {
        self.require_authorized()?;
        let document = self.get_document("fetch_feed_entries", url).await?;

        let entries = document
            .query(FEED_ENTRIES_PATH, namespaces())
            .map_err(|e| FeedError::Configuration(e.to_string()))?;
        tracing::debug!(url = %url, entries = entries.len(), "Extracting feed entries");

        entries
            .into_iter()
            .map(|entry| extractor.extract_entry(entry).map_err(FeedError::from))
            .collect()
    }

    /// Posts `entry` as the request body and extracts the response document's root.
    ///
    /// Unlike the fetch operations, `url` is sent as given.
    ///
    /// # Errors
    ///
    /// Same as [`FeedClient::fetch_entry`], except that `url` is not decoded.
    #[tracing::instrument(skip(self, entry, response_extractor))]
    pub async fn post_entry<E, X>(
        &self,
        url: &str,
        entry: &Element,
        response_extractor: &X,
    ) -> Result<E, FeedError>
    where
        X: EntryExtractor<E> + ?Sized,
    {
        self.require_authorized()?;

        let body = entry.to_xml();
        tracing::debug!(url = %url, body = %body, "Posting entry");

        let request = AtomRequest {
            headers: atom_headers(),
            ..AtomRequest::new(Method::POST, url)
        }
        .with_body(body);

        let response = self.transport.exchange(request).await?;
        let document = parse_response("post_entry", url, &response.body)?;
        Ok(response_extractor.extract_entry(document.root_element())?)
    }

    async fn get_document(&self, operation: &'static str, url: &str) -> Result<Document, FeedError> {
        let decoded = url_decode(url)
            .map_err(|e| FeedError::Configuration(format!("cannot decode URL '{}': {}", url, e)))?;

        tracing::debug!(url = %decoded, "GET");
        let request = AtomRequest {
            headers: atom_headers(),
            ..AtomRequest::new(Method::GET, decoded.as_str())
        };
        let response = self.transport.exchange(request).await?;
        parse_response(operation, &decoded, &response.body)
    }
}

fn parse_response(operation: &'static str, url: &str, body: &[u8]) -> Result<Document, FeedError> {
    Document::parse(body).map_err(|source| FeedError::Parse {
        operation,
        url: url.to_owned(),
        source,
    })
}
