use thiserror::Error;

use crate::xml::Element;

/// Boxed error carried through extraction untouched.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure to turn an entry element into a typed value.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// A required child element is absent.
    #[error("entry has no <{0}> element")]
    MissingElement(String),

    /// An element or attribute is present but its value is unusable.
    #[error("invalid value for {field}: {source}")]
    InvalidValue {
        field: String,
        #[source]
        source: BoxError,
    },

    #[error("{0}")]
    Other(String),

    /// An extractor's own error. Callers can downcast it back out.
    #[error("{0}")]
    Custom(#[source] BoxError),
}

impl ExtractError {
    /// `reason` may be a message or an underlying error, which stays
    /// reachable through `source()`.
    pub fn invalid(field: impl Into<String>, reason: impl Into<BoxError>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            source: reason.into(),
        }
    }

    pub fn custom<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Custom(Box::new(error))
    }
}

impl From<BoxError> for ExtractError {
    fn from(error: BoxError) -> Self {
        Self::Custom(error)
    }
}

/// Converts one Atom `<entry>` element into a value of type `E`.
///
/// Extractors only read the element. Any `Fn(&Element) -> Result<E, ExtractError>`
/// is an extractor, so most callers pass a closure:
///
/// ```
/// use atomclient::atom::{EntryExtractor, ExtractError, ATOM_NAMESPACE};
/// use atomclient::xml::Element;
///
/// let title = |entry: &Element| {
///     entry
///         .child_text(Some(ATOM_NAMESPACE), "title")
///         .ok_or_else(|| ExtractError::MissingElement("title".into()))
/// };
/// let entry = Element::new_ns("entry", ATOM_NAMESPACE)
///     .with_child(Element::new_ns("title", ATOM_NAMESPACE).with_text("A"));
/// assert_eq!(title.extract_entry(&entry).unwrap(), "A");
/// ```
pub trait EntryExtractor<E> {
    fn extract_entry(&self, entry: &Element) -> Result<E, ExtractError>;
}

impl<E, F> EntryExtractor<E> for F
where
    F: Fn(&Element) -> Result<E, ExtractError>,
{
    fn extract_entry(&self, entry: &Element) -> Result<E, ExtractError> {
        self(entry)
    }
}
