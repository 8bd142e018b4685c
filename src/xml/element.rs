use super::query::{NamespaceContext, Path};
use super::XmlError;

/// A single attribute of an [`Element`].
///
/// Namespace declarations (`xmlns`, `xmlns:p`) are not attributes; they live in
/// [`Element::namespace_declarations`].
#[derive(Debug, Clone)]
pub struct Attribute {
    pub(crate) name: String,
    pub(crate) prefix: Option<String>,
    pub(crate) namespace: Option<String>,
    pub(crate) value: String,
}

impl Attribute {
    /// Local name of the attribute.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Namespace URI, `None` for unprefixed attributes.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Attributes compare by namespace, local name and value. The prefix is syntax.
impl PartialEq for Attribute {
    fn eq(&self, other: &Self) -> bool {
        self.namespace == other.namespace && self.name == other.name && self.value == other.value
    }
}

impl Eq for Attribute {}

/// A child of an [`Element`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An XML element with resolved namespaces.
///
/// Elements are built either by [`Document::parse`](super::Document::parse) or
/// with the builder methods below, e.g. when preparing an entry to post:
///
/// ```
/// use atomclient::xml::Element;
///
/// let entry = Element::new_ns("entry", "http://www.w3.org/2005/Atom")
///     .with_child(Element::new_ns("title", "http://www.w3.org/2005/Atom").with_text("Hello"));
/// assert_eq!(entry.child_text(Some("http://www.w3.org/2005/Atom"), "title").as_deref(), Some("Hello"));
/// ```
///
/// Equality is namespace-aware: two elements are equal when they have the same
/// namespace, local name, attributes and children. Prefixes and namespace
/// declarations are serialization details and are ignored.
#[derive(Debug, Clone)]
pub struct Element {
    pub(crate) name: String,
    pub(crate) prefix: Option<String>,
    pub(crate) namespace: Option<String>,
    pub(crate) attributes: Vec<Attribute>,
    pub(crate) namespace_declarations: Vec<(Option<String>, String)>,
    pub(crate) children: Vec<Node>,
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.namespace == other.namespace
            && self.name == other.name
            && self.attributes == other.attributes
            && self.children == other.children
    }
}

impl Eq for Element {}

impl Element {
    /// Creates an element in no namespace.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: None,
            namespace: None,
            attributes: Vec::new(),
            namespace_declarations: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Creates an element in `namespace`, serialized with a default namespace
    /// declaration.
    pub fn new_ns(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        let mut element = Self::new(name);
        element.namespace = Some(namespace.into());
        element
    }

    /// Creates an element in `namespace`, serialized as `prefix:name`.
    pub fn new_prefixed(
        prefix: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        let mut element = Self::new_ns(name, namespace);
        element.prefix = Some(prefix.into());
        element
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn with_attribute_ns(
        mut self,
        prefix: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let namespace = namespace.into();
        self.attributes
            .retain(|a| !(a.name == name && a.namespace.as_deref() == Some(namespace.as_str())));
        self.attributes.push(Attribute {
            name,
            prefix: Some(prefix.into()),
            namespace: Some(namespace),
            value: value.into(),
        });
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.push_text(text);
        self
    }

    /// Adds an explicit namespace declaration, kept even if nothing in the
    /// subtree uses it.
    pub fn with_namespace_declaration(
        mut self,
        prefix: Option<&str>,
        namespace: impl Into<String>,
    ) -> Self {
        self.namespace_declarations
            .push((prefix.map(str::to_owned), namespace.into()));
        self
    }

    /// Sets an un-namespaced attribute, replacing any previous value.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(existing) = self
            .attributes
            .iter_mut()
            .find(|a| a.namespace.is_none() && a.name == name)
        {
            existing.value = value;
            return;
        }
        self.attributes.push(Attribute {
            name,
            prefix: None,
            namespace: None,
            value,
        });
    }

    pub fn push_child(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Appends text, merging with a preceding text node.
    pub fn push_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        match self.children.last_mut() {
            Some(Node::Text(existing)) => existing.push_str(&text),
            _ => self.children.push(Node::Text(text)),
        }
    }

    /// Local name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Name as written in XML, `prefix:name` or `name`.
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.name),
            None => self.name.clone(),
        }
    }

    /// Whether this element has the given namespace and local name.
    pub fn is(&self, namespace: Option<&str>, name: &str) -> bool {
        self.namespace.as_deref() == namespace && self.name == name
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn namespace_declarations(&self) -> &[(Option<String>, String)] {
        &self.namespace_declarations
    }

    /// Value of an un-namespaced attribute.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attribute_ns(None, name)
    }

    pub fn attribute_ns(&self, namespace: Option<&str>, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.as_deref() == namespace && a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Child elements in document order, skipping text.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    pub fn first_child(&self, namespace: Option<&str>, name: &str) -> Option<&Element> {
        self.child_elements().find(|e| e.is(namespace, name))
    }

    pub fn children_named<'a>(
        &'a self,
        namespace: Option<&'a str>,
        name: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.child_elements().filter(move |e| e.is(namespace, name))
    }

    /// Text of the first matching child, see [`Element::text`].
    pub fn child_text(&self, namespace: Option<&str>, name: &str) -> Option<String> {
        self.first_child(namespace, name).map(Element::text)
    }

    /// Concatenated text of all descendants (the XPath string-value).
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                Node::Text(t) => out.push_str(t),
                Node::Element(e) => e.collect_text(out),
            }
        }
    }

    /// Evaluates a relative child path such as `atom:link` or `atom:author/atom:name`.
    ///
    /// Absolute paths are rejected; use [`Document::query`](super::Document::query).
    pub fn query(&self, path: &str, namespaces: &NamespaceContext) -> Result<Vec<&Element>, XmlError> {
        let compiled = Path::compile(path, namespaces)?;
        if compiled.is_absolute() {
            return Err(XmlError::InvalidPath {
                path: path.to_owned(),
                reason: "absolute paths are only supported on documents",
            });
        }
        Ok(compiled.select_children(vec![self]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ATOM: &str = "http://www.w3.org/2005/Atom";

    #[test]
    fn test_push_text_merges_adjacent_text() {
        let mut e = Element::new("title");
        e.push_text("Hello, ");
        e.push_text("world");
        assert_eq!(e.children().len(), 1);
        assert_eq!(e.text(), "Hello, world");
    }

    #[test]
    fn test_text_includes_descendants() {
        let e = Element::new("p")
            .with_text("a")
            .with_child(Element::new("b").with_text("b"))
            .with_text("c");
        assert_eq!(e.text(), "abc");
    }

    #[test]
    fn test_namespace_aware_lookup() {
        let e = Element::new_ns("entry", ATOM)
            .with_child(Element::new("title").with_text("plain"))
            .with_child(Element::new_ns("title", ATOM).with_text("atom"));

        assert_eq!(e.child_text(Some(ATOM), "title").as_deref(), Some("atom"));
        assert_eq!(e.child_text(None, "title").as_deref(), Some("plain"));
    }

    #[test]
    fn test_set_attribute_replaces() {
        let mut e = Element::new("link").with_attribute("rel", "self");
        e.set_attribute("rel", "edit");
        assert_eq!(e.attributes().len(), 1);
        assert_eq!(e.attribute("rel"), Some("edit"));
    }

    #[test]
    fn test_equality_ignores_prefix() {
        let a = Element::new_ns("entry", ATOM);
        let b = Element::new_prefixed("atom", "entry", ATOM);
        assert_eq!(a, b);
        assert_ne!(a, Element::new("entry"));
    }

    #[test]
    fn test_query_rejects_absolute_path() {
        let ctx = NamespaceContext::new().with_binding("atom", ATOM);
        let e = Element::new_ns("entry", ATOM);
        let err = e.query("/atom:entry", &ctx).unwrap_err();
        assert!(matches!(err, XmlError::InvalidPath { .. }));
    }
}
