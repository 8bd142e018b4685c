//! Namespace-aware XML document model.
//!
//! A small DOM on top of `quick-xml`'s namespace reader:
//!
//! - [`Document::parse`] builds a tree of [`Element`]s with resolved namespace URIs
//! - [`Document::query`] / [`Element::query`] select elements by child paths
//!   such as `/atom:feed/atom:entry`, with prefixes bound by a [`NamespaceContext`]
//! - [`Element::to_xml`] writes a subtree back out as self-contained XML text

mod element;
mod encoding;
mod parser;
mod query;
mod writer;

use thiserror::Error;

pub use element::{Attribute, Element, Node};
pub use parser::{Document, MAX_DEPTH};
pub use query::NamespaceContext;

/// Namespace permanently bound to the `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Errors from parsing or querying XML.
#[derive(Debug, Error)]
pub enum XmlError {
    /// The reader rejected the input (bad syntax, mismatched end tag, unknown entity).
    #[error("malformed XML: {0}")]
    Syntax(#[from] quick_xml::Error),

    #[error("malformed attribute: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("invalid UTF-8 in XML: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("unsupported document encoding '{0}'")]
    UnsupportedEncoding(String),

    #[error("input is not valid {0}")]
    InvalidEncoding(&'static str),

    #[error("document has no root element")]
    NoRootElement,

    #[error("document has more than one root element")]
    MultipleRoots,

    #[error("text content outside the root element")]
    TextOutsideRoot,

    #[error("element <{0}> is never closed")]
    UnclosedElement(String),

    #[error("end tag </{0}> has no matching start tag")]
    UnmatchedEndTag(String),

    /// SEC-003: Element nesting exceeds the safety limit.
    #[error("XML nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),

    #[error("namespace prefix '{0}' is not bound")]
    UnboundPrefix(String),

    #[error("unsupported path expression '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },
}
