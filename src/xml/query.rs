//! Child-axis path queries over the DOM.
//!
//! Supports the subset of XPath that Atom navigation needs: `/` separated
//! child steps, `prefix:name`, `prefix:*` and `*`. Prefixes are resolved
//! through a [`NamespaceContext`]; an unprefixed name matches only elements in
//! no namespace, as in XPath 1.0.

use super::{Document, Element, XmlError};

/// Prefix to namespace URI bindings used to evaluate path queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceContext {
    bindings: Vec<(String, String)>,
}

impl NamespaceContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `prefix` to `namespace`, replacing an earlier binding of the same prefix.
    pub fn with_binding(mut self, prefix: impl Into<String>, namespace: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.bindings.retain(|(p, _)| *p != prefix);
        self.bindings.push((prefix, namespace.into()));
        self
    }

    pub fn lookup(&self, prefix: &str) -> Option<&str> {
        self.bindings
            .iter()
            .find(|(p, _)| p == prefix)
            .map(|(_, ns)| ns.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings.iter().map(|(p, ns)| (p.as_str(), ns.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NameTest {
    Any,
    AnyIn(String),
    Name {
        namespace: Option<String>,
        local: String,
    },
}

impl NameTest {
    fn matches(&self, element: &Element) -> bool {
        match self {
            NameTest::Any => true,
            NameTest::AnyIn(ns) => element.namespace() == Some(ns.as_str()),
            NameTest::Name { namespace, local } => element.is(namespace.as_deref(), local),
        }
    }
}

/// A compiled path expression.
#[derive(Debug, Clone)]
pub(crate) struct Path {
    absolute: bool,
    steps: Vec<NameTest>,
}

impl Path {
    pub(crate) fn compile(path: &str, namespaces: &NamespaceContext) -> Result<Self, XmlError> {
        let invalid = |reason: &'static str| XmlError::InvalidPath {
            path: path.to_owned(),
            reason,
        };

        let trimmed = path.trim();
        if trimmed.contains("//") {
            return Err(invalid("descendant axis is not supported"));
        }
        let (absolute, body) = match trimmed.strip_prefix('/') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        if body.is_empty() {
            return Err(invalid("path has no steps"));
        }

        let steps = body
            .split('/')
            .map(|step| compile_step(step, namespaces).map_err(|e| e.with_path(path)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { absolute, steps })
    }

    pub(crate) fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// Applies every step as a child step starting from `context`.
    pub(crate) fn select_children<'a>(&self, context: Vec<&'a Element>) -> Vec<&'a Element> {
        self.apply(context, &self.steps)
    }

    /// Evaluates against a document. The first step selects the root element.
    pub(crate) fn select_from_document<'a>(&self, document: &'a Document) -> Vec<&'a Element> {
        let Some((first, rest)) = self.steps.split_first() else {
            return Vec::new();
        };
        let root = document.root_element();
        if !first.matches(root) {
            return Vec::new();
        }
        self.apply(vec![root], rest)
    }

    fn apply<'a>(&self, mut frontier: Vec<&'a Element>, steps: &[NameTest]) -> Vec<&'a Element> {
        for test in steps {
            frontier = frontier
                .into_iter()
                .flat_map(|e| e.child_elements().filter(move |c| test.matches(c)))
                .collect();
            if frontier.is_empty() {
                break;
            }
        }
        frontier
    }
}

fn compile_step(step: &str, namespaces: &NamespaceContext) -> Result<NameTest, XmlError> {
    let step = step.trim();
    let bad = |reason: &'static str| XmlError::InvalidPath {
        path: step.to_owned(),
        reason,
    };
    if step.is_empty() {
        return Err(bad("empty step"));
    }
    if step == "*" {
        return Ok(NameTest::Any);
    }
    let well_formed = match step.split_once(':') {
        Some((prefix, local)) => is_name(prefix) && (local == "*" || is_name(local)),
        None => is_name(step),
    };
    if !well_formed {
        return Err(bad("only element name tests are supported"));
    }

    match step.split_once(':') {
        Some((prefix, local)) => {
            let namespace = namespaces
                .lookup(prefix)
                .ok_or_else(|| XmlError::UnboundPrefix(prefix.to_owned()))?
                .to_owned();
            if local == "*" {
                Ok(NameTest::AnyIn(namespace))
            } else {
                Ok(NameTest::Name {
                    namespace: Some(namespace),
                    local: local.to_owned(),
                })
            }
        }
        None => Ok(NameTest::Name {
            namespace: None,
            local: step.to_owned(),
        }),
    }
}

fn is_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

impl XmlError {
    fn with_path(self, path: &str) -> Self {
        match self {
            XmlError::InvalidPath { reason, .. } => XmlError::InvalidPath {
                path: path.to_owned(),
                reason,
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ATOM: &str = "http://www.w3.org/2005/Atom";

    fn ctx() -> NamespaceContext {
        NamespaceContext::new().with_binding("atom", ATOM)
    }

    fn titles(elements: &[&Element]) -> Vec<String> {
        elements
            .iter()
            .map(|e| e.child_text(Some(ATOM), "title").unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_absolute_query_in_document_order() {
        let doc = Document::parse(
            br#"<feed xmlns="http://www.w3.org/2005/Atom">
                <entry><title>A</title></entry>
                <id>feed</id>
                <entry><title>B</title></entry>
            </feed>"#,
        )
        .unwrap();

        let entries = doc.query("/atom:feed/atom:entry", &ctx()).unwrap();
        assert_eq!(titles(&entries), vec!["A", "B"]);
    }

    #[test]
    fn test_unprefixed_name_does_not_match_namespaced_elements() {
        let doc = Document::parse(
            br#"<feed xmlns="http://www.w3.org/2005/Atom"><entry/></feed>"#,
        )
        .unwrap();
        assert!(doc.query("/feed/entry", &ctx()).unwrap().is_empty());
    }

    #[test]
    fn test_prefix_in_query_independent_of_document_prefix() {
        let doc = Document::parse(
            br#"<a:feed xmlns:a="http://www.w3.org/2005/Atom"><a:entry/><a:entry/></a:feed>"#,
        )
        .unwrap();
        assert_eq!(doc.query("/atom:feed/atom:entry", &ctx()).unwrap().len(), 2);
    }

    #[test]
    fn test_wildcards() {
        let doc = Document::parse(
            br#"<feed xmlns="http://www.w3.org/2005/Atom" xmlns:x="urn:x">
                <entry/><x:ext/><title/>
            </feed>"#,
        )
        .unwrap();
        assert_eq!(doc.query("/*/*", &ctx()).unwrap().len(), 3);
        assert_eq!(doc.query("/atom:feed/atom:*", &ctx()).unwrap().len(), 2);
    }

    #[test]
    fn test_relative_query_from_element() {
        let doc = Document::parse(
            br#"<entry xmlns="http://www.w3.org/2005/Atom">
                <author><name>Ann</name></author>
                <author><name>Bob</name></author>
            </entry>"#,
        )
        .unwrap();
        let names: Vec<String> = doc
            .root_element()
            .query("atom:author/atom:name", &ctx())
            .unwrap()
            .into_iter()
            .map(Element::text)
            .collect();
        assert_eq!(names, vec!["Ann", "Bob"]);
    }

    #[test]
    fn test_unbound_prefix_is_an_error() {
        let doc = Document::parse(b"<feed/>").unwrap();
        let err = doc.query("/gd:feed", &ctx()).unwrap_err();
        assert!(matches!(err, XmlError::UnboundPrefix(p) if p == "gd"));
    }

    #[test]
    fn test_unsupported_syntax_rejected() {
        let doc = Document::parse(b"<feed/>").unwrap();
        for path in ["//entry", "/feed/entry[1]", "/feed/@id", "", "/"] {
            assert!(
                matches!(doc.query(path, &ctx()), Err(XmlError::InvalidPath { .. })),
                "expected InvalidPath for {:?}",
                path
            );
        }
    }

    #[test]
    fn test_with_binding_replaces_prefix() {
        let ctx = NamespaceContext::new()
            .with_binding("a", "urn:one")
            .with_binding("a", "urn:two");
        assert_eq!(ctx.lookup("a"), Some("urn:two"));
        assert_eq!(ctx.iter().count(), 1);
    }
}
