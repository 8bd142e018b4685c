//! Authenticated request/parse/extract pipeline for Atom APIs.
//!
//! - [`FeedClient`] - the three operations: fetch one entry, fetch a feed's
//!   entries, post an entry
//! - [`Transport`] - the HTTP exchange the client runs on, with
//!   [`ReqwestTransport`] as the default implementation
//!
//! # Example
//!
//! ```ignore
//! use atomclient::client::FeedClient;
//! use atomclient::atom::{AtomEntry, AtomEntryExtractor};
//!
//! let client = FeedClient::from_config(&config)?;
//! let entry = AtomEntry::new("Hello").to_element();
//! let created = client.post_entry(url, &entry, &AtomEntryExtractor).await?;
//! ```

mod feed_client;
mod transport;

pub use feed_client::{FeedClient, FeedError};
pub use transport::{AtomRequest, AtomResponse, ReqwestTransport, Transport, TransportError};
