//! Atom vocabulary: namespaces, the entry extraction contract, and a built-in
//! entry model.
//!
//! - [`namespaces`] - the shared prefix bindings every query uses
//! - [`EntryExtractor`] - turns one `<entry>` element into a typed value
//! - [`AtomEntry`] - the common Atom fields, with an extractor and a builder
//!   for posting

mod entry;
mod extractor;

use std::sync::OnceLock;

use crate::xml::NamespaceContext;

pub use entry::{AtomEntry, AtomEntryExtractor, AtomLink, AtomPerson};
pub use extractor::{BoxError, EntryExtractor, ExtractError};

/// Atom Syndication Format (RFC 4287).
pub const ATOM_NAMESPACE: &str = "http://www.w3.org/2005/Atom";
/// Atom Publishing Protocol (RFC 5023).
pub const APP_NAMESPACE: &str = "http://www.w3.org/2007/app";
/// Google Data extensions.
pub const GD_NAMESPACE: &str = "http://schemas.google.com/g/2005";
pub const OPENSEARCH_NAMESPACE: &str = "http://a9.com/-/spec/opensearch/1.1/";

/// Media type sent as `Content-Type` (and `Accept`) on every request.
pub const ATOM_CONTENT_TYPE: &str = "application/atom+xml";

/// Path selecting the entries of a feed document.
pub const FEED_ENTRIES_PATH: &str = "/atom:feed/atom:entry";

static NAMESPACES: OnceLock<NamespaceContext> = OnceLock::new();

/// Process-wide namespace bindings: `atom`, `app`, `gd` and `openSearch`.
///
/// Built on first use and never modified afterwards.
pub fn namespaces() -> &'static NamespaceContext {
    NAMESPACES.get_or_init(|| {
        NamespaceContext::new()
            .with_binding("atom", ATOM_NAMESPACE)
            .with_binding("app", APP_NAMESPACE)
            .with_binding("gd", GD_NAMESPACE)
            .with_binding("openSearch", OPENSEARCH_NAMESPACE)
    })
}
