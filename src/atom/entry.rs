use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::{namespaces, EntryExtractor, ExtractError, ATOM_NAMESPACE};
use crate::xml::Element;

/// An Atom `<link>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomLink {
    pub href: String,
    pub rel: Option<String>,
    #[serde(rename = "type")]
    pub media_type: Option<String>,
}

/// An Atom person construct (`<author>`, `<contributor>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomPerson {
    pub name: String,
    pub email: Option<String>,
    pub uri: Option<String>,
}

/// The fields of an Atom `<entry>` most APIs rely on.
///
/// `id` and `title` are required when extracting; everything else is optional.
/// Entries being prepared for posting usually have an empty `id`, which the
/// server assigns.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AtomEntry {
    pub id: String,
    pub title: String,
    pub updated: Option<DateTime<FixedOffset>>,
    pub published: Option<DateTime<FixedOffset>>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub links: Vec<AtomLink>,
    pub categories: Vec<String>,
    pub authors: Vec<AtomPerson>,
}

impl AtomEntry {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// `href` of the first link with the given `rel`.
    pub fn link(&self, rel: &str) -> Option<&str> {
        self.links
            .iter()
            .find(|l| l.rel.as_deref() == Some(rel))
            .map(|l| l.href.as_str())
    }

    /// Builds the `<entry>` element for this entry. Empty `id` and absent
    /// optional fields are left out.
    pub fn to_element(&self) -> Element {
        let atom = |name: &str| Element::new_ns(name, ATOM_NAMESPACE);

        let mut entry = atom("entry");
        if !self.id.is_empty() {
            entry.push_child(atom("id").with_text(&self.id));
        }
        entry.push_child(atom("title").with_attribute("type", "text").with_text(&self.title));
        if let Some(updated) = &self.updated {
            entry.push_child(atom("updated").with_text(updated.to_rfc3339()));
        }
        if let Some(published) = &self.published {
            entry.push_child(atom("published").with_text(published.to_rfc3339()));
        }
        if let Some(summary) = &self.summary {
            entry.push_child(atom("summary").with_attribute("type", "text").with_text(summary));
        }
        if let Some(content) = &self.content {
            entry.push_child(atom("content").with_attribute("type", "text").with_text(content));
        }
        for link in &self.links {
            let mut e = atom("link");
            if let Some(rel) = &link.rel {
                e.set_attribute("rel", rel);
            }
            if let Some(media_type) = &link.media_type {
                e.set_attribute("type", media_type);
            }
            e.set_attribute("href", &link.href);
            entry.push_child(e);
        }
        for term in &self.categories {
            entry.push_child(atom("category").with_attribute("term", term));
        }
        for author in &self.authors {
            let mut e = atom("author").with_child(atom("name").with_text(&author.name));
            if let Some(email) = &author.email {
                e.push_child(atom("email").with_text(email));
            }
            if let Some(uri) = &author.uri {
                e.push_child(atom("uri").with_text(uri));
            }
            entry.push_child(e);
        }
        entry
    }
}

/// Extracts [`AtomEntry`] values.
#[derive(Debug, Clone, Copy, Default)]
pub struct AtomEntryExtractor;

impl EntryExtractor<AtomEntry> for AtomEntryExtractor {
    fn extract_entry(&self, entry: &Element) -> Result<AtomEntry, ExtractError> {
        if !entry.is(Some(ATOM_NAMESPACE), "entry") {
            return Err(ExtractError::invalid(
                "entry",
                format!("expected atom:entry, found <{}>", entry.qualified_name()),
            ));
        }
        let atom = Some(ATOM_NAMESPACE);

        let required = |name: &str| {
            entry
                .child_text(atom, name)
                .map(|t| t.trim().to_owned())
                .ok_or_else(|| ExtractError::MissingElement(name.to_owned()))
        };
        let optional = |name: &str| entry.child_text(atom, name);

        let links = entry
            .children_named(atom, "link")
            .map(|l| -> Result<AtomLink, ExtractError> {
                let href = l
                    .attribute("href")
                    .ok_or_else(|| ExtractError::invalid("link", "missing href attribute"))?;
                Ok(AtomLink {
                    href: href.to_owned(),
                    rel: l.attribute("rel").map(str::to_owned),
                    media_type: l.attribute("type").map(str::to_owned),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let categories = entry
            .children_named(atom, "category")
            .filter_map(|c| c.attribute("term").map(str::to_owned))
            .collect();

        let authors = entry
            .query("atom:author", namespaces())
            .map_err(ExtractError::custom)?
            .into_iter()
            .map(|a| -> Result<AtomPerson, ExtractError> {
                Ok(AtomPerson {
                    name: a
                        .child_text(atom, "name")
                        .ok_or_else(|| ExtractError::MissingElement("author/name".to_owned()))?,
                    email: a.child_text(atom, "email"),
                    uri: a.child_text(atom, "uri"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(AtomEntry {
            id: required("id")?,
            title: required("title")?,
            updated: optional("updated").map(|t| parse_date("updated", &t)).transpose()?,
            published: optional("published")
                .map(|t| parse_date("published", &t))
                .transpose()?,
            summary: optional("summary"),
            content: optional("content"),
            links,
            categories,
            authors,
        })
    }
}

fn parse_date(field: &str, value: &str) -> Result<DateTime<FixedOffset>, ExtractError> {
    DateTime::parse_from_rfc3339(value.trim()).map_err(|e| ExtractError::invalid(field, e))
}
