use quick_xml::escape::{escape, partial_escape};

use super::element::{Element, Node};
use super::XML_NAMESPACE;

/// In-scope prefix bindings while serializing. `None` is the default namespace.
struct Scope {
    bindings: Vec<(Option<String>, String)>,
}

impl Scope {
    fn lookup(&self, prefix: Option<&str>) -> Option<&str> {
        if prefix == Some("xml") {
            return Some(XML_NAMESPACE);
        }
        self.bindings
            .iter()
            .rev()
            .find(|(p, _)| p.as_deref() == prefix)
            .map(|(_, ns)| ns.as_str())
    }

    /// The binding `prefix` has right now. The default namespace starts out
    /// as "no namespace".
    fn current(&self, prefix: Option<&str>) -> Option<&str> {
        match prefix {
            None => Some(self.lookup(None).unwrap_or("")),
            Some(_) => self.lookup(prefix),
        }
    }

    /// Binds `prefix` unless it already maps to `namespace`.
    fn bind(&mut self, prefix: Option<&str>, namespace: &str) {
        if self.current(prefix) != Some(namespace) {
            self.bindings.push((prefix.map(str::to_owned), namespace.to_owned()));
        }
    }

    fn declared_since(&self, mark: usize, prefix: Option<&str>) -> bool {
        self.bindings[mark..]
            .iter()
            .any(|(p, _)| p.as_deref() == prefix)
    }

    /// An in-scope, unshadowed prefix for `namespace`.
    fn prefix_for(&self, namespace: &str) -> Option<&str> {
        self.bindings
            .iter()
            .rev()
            .filter_map(|(p, ns)| match p {
                Some(p) if ns == namespace => Some(p.as_str()),
                _ => None,
            })
            .find(|p| self.lookup(Some(p)) == Some(namespace))
    }

    fn fresh_prefix(&self) -> String {
        let mut n = 1;
        loop {
            let candidate = format!("ns{}", n);
            if self.lookup(Some(&candidate)).is_none() {
                return candidate;
            }
            n += 1;
        }
    }

    /// Picks the prefix an attribute in `namespace` is written with, binding
    /// one if needed. Attributes never use the default namespace, and a
    /// prefix already bound elsewhere is never rebound on the same element.
    fn attribute_prefix(&mut self, preferred: Option<&str>, namespace: &str) -> String {
        if namespace == XML_NAMESPACE {
            return "xml".to_owned();
        }
        if let Some(p) = preferred.filter(|p| *p != "xmlns") {
            match self.lookup(Some(p)) {
                Some(ns) if ns == namespace => return p.to_owned(),
                None => {
                    self.bindings.push((Some(p.to_owned()), namespace.to_owned()));
                    return p.to_owned();
                }
                _ => {}
            }
        }
        if let Some(p) = self.prefix_for(namespace) {
            return p.to_owned();
        }
        let fresh = self.fresh_prefix();
        self.bindings.push((Some(fresh.clone()), namespace.to_owned()));
        fresh
    }
}

impl Element {
    /// Serializes the element and its subtree to XML text.
    ///
    /// The output has no XML declaration. Namespace declarations are added
    /// wherever an element or attribute needs a binding that is not already in
    /// scope, so any subtree serializes to a self-contained document. An
    /// attribute whose prefix is taken by another namespace is written with a
    /// generated `nsN` prefix.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        let mut scope = Scope {
            bindings: Vec::new(),
        };
        write_element(self, &mut scope, &mut out);
        out
    }
}

fn write_element(element: &Element, scope: &mut Scope, out: &mut String) {
    let mark = scope.bindings.len();

    // The element's own binding wins over any explicit declaration
    let prefix = element.namespace.as_ref().and(element.prefix.as_deref());
    scope.bind(prefix, element.namespace.as_deref().unwrap_or(""));

    for (declared, namespace) in &element.namespace_declarations {
        let declared = declared.as_deref();
        let reserved = matches!(declared, Some("xml") | Some("xmlns"));
        let undeclaring_prefix = declared.is_some() && namespace.is_empty();
        if reserved || undeclaring_prefix || declared == prefix || scope.declared_since(mark, declared) {
            continue;
        }
        scope.bind(declared, namespace);
    }

    let attribute_prefixes: Vec<Option<String>> = element
        .attributes
        .iter()
        .map(|attr| {
            attr.namespace
                .as_deref()
                .map(|ns| scope.attribute_prefix(attr.prefix.as_deref(), ns))
        })
        .collect();

    let qname = match prefix {
        Some(p) => format!("{}:{}", p, element.name),
        None => element.name.clone(),
    };
    out.push('<');
    out.push_str(&qname);

    for (declared, namespace) in &scope.bindings[mark..] {
        match declared {
            Some(p) => {
                out.push_str(" xmlns:");
                out.push_str(p);
            }
            None => out.push_str(" xmlns"),
        }
        out.push_str("=\"");
        out.push_str(&escape_attribute(namespace));
        out.push('"');
    }

    for (attr, attr_prefix) in element.attributes.iter().zip(&attribute_prefixes) {
        out.push(' ');
        if let Some(p) = attr_prefix {
            out.push_str(p);
            out.push(':');
        }
        out.push_str(&attr.name);
        out.push_str("=\"");
        out.push_str(&escape_attribute(&attr.value));
        out.push('"');
    }

    if element.children.is_empty() {
        out.push_str("/>");
    } else {
        out.push('>');
        for child in &element.children {
            match child {
                Node::Text(text) => out.push_str(&partial_escape(text.as_str())),
                Node::Element(e) => write_element(e, scope, out),
            }
        }
        out.push_str("</");
        out.push_str(&qname);
        out.push('>');
    }

    scope.bindings.truncate(mark);
}

/// Escapes markup and quotes, plus the whitespace characters attribute-value
/// normalization would otherwise turn into spaces.
fn escape_attribute(value: &str) -> String {
    let escaped = escape(value);
    let mut out = String::with_capacity(escaped.len());
    for c in escaped.chars() {
        match c {
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#9;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::{Document, NamespaceContext};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const ATOM: &str = "http://www.w3.org/2005/Atom";
    const GD: &str = "http://schemas.google.com/g/2005";

    #[test]
    fn test_to_xml_declares_default_namespace_once() {
        let entry = Element::new_ns("entry", ATOM)
            .with_child(Element::new_ns("title", ATOM).with_text("Hi"));
        assert_eq!(
            entry.to_xml(),
            r#"<entry xmlns="http://www.w3.org/2005/Atom"><title>Hi</title></entry>"#
        );
    }

    #[test]
    fn test_to_xml_escapes_text_and_attributes() {
        let e = Element::new("t")
            .with_attribute("q", r#"a "b" & <c>"#)
            .with_text("1 < 2 & 3");
        assert_eq!(
            e.to_xml(),
            r#"<t q="a &quot;b&quot; &amp; &lt;c&gt;">1 &lt; 2 &amp; 3</t>"#
        );
    }

    #[test]
    fn test_to_xml_undeclares_default_namespace_for_plain_child() {
        let e = Element::new_ns("entry", ATOM).with_child(Element::new("plain"));
        assert_eq!(
            e.to_xml(),
            r#"<entry xmlns="http://www.w3.org/2005/Atom"><plain xmlns=""/></entry>"#
        );
    }

    #[test]
    fn test_subtree_of_parsed_feed_is_self_contained() {
        let doc = Document::parse(
            br#"<feed xmlns="http://www.w3.org/2005/Atom" xmlns:gd="http://schemas.google.com/g/2005">
<entry gd:etag="x"><title>A</title></entry></feed>"#,
        )
        .unwrap();
        let ctx = NamespaceContext::new().with_binding("atom", ATOM);
        let entry = doc.query("/atom:feed/atom:entry", &ctx).unwrap()[0];

        let xml = entry.to_xml();
        let reparsed = Document::parse(xml.as_bytes()).unwrap();
        assert_eq!(reparsed.root_element(), entry);
        assert_eq!(reparsed.root_element().attribute_ns(Some(GD), "etag"), Some("x"));
    }

    #[test]
    fn test_round_trip_keeps_explicit_declarations() {
        let e = Element::new_ns("entry", ATOM).with_namespace_declaration(Some("gd"), GD);
        let reparsed = Document::parse(e.to_xml().as_bytes()).unwrap();
        assert!(reparsed
            .root_element()
            .namespace_declarations()
            .contains(&(Some("gd".to_string()), GD.to_string())));
    }

    #[test]
    fn test_attribute_prefix_clash_gets_fresh_prefix() {
        let e = Element::new_prefixed("a", "entry", "urn:one").with_attribute_ns("a", "x", "urn:two", "v");
        let xml = e.to_xml();
        assert_eq!(
            xml,
            r#"<a:entry xmlns:a="urn:one" xmlns:ns1="urn:two" ns1:x="v"/>"#
        );

        let reparsed = Document::parse(xml.as_bytes()).unwrap();
        assert_eq!(reparsed.root_element(), &e);
        assert_eq!(reparsed.root_element().attribute_ns(Some("urn:two"), "x"), Some("v"));
    }

    #[test]
    fn test_attribute_reuses_prefix_bound_by_ancestor() {
        let e = Element::new_prefixed("g", "feed", GD)
            .with_child(Element::new_ns("entry", ATOM).with_attribute_ns("x", "etag", GD, "1"));
        assert_eq!(
            e.to_xml(),
            r#"<g:feed xmlns:g="http://schemas.google.com/g/2005"><entry xmlns="http://www.w3.org/2005/Atom" g:etag="1"/></g:feed>"#
        );
    }

    #[test]
    fn test_prefix_rebound_in_subtree_is_not_reused() {
        let e = Element::new_prefixed("g", "feed", GD).with_child(
            Element::new_prefixed("g", "entry", "urn:other").with_attribute_ns("g", "etag", GD, "1"),
        );
        let reparsed = Document::parse(e.to_xml().as_bytes()).unwrap();
        assert_eq!(reparsed.root_element(), &e);
    }

    #[test]
    fn test_conflicting_explicit_declaration_is_dropped() {
        let e = Element::new("entry").with_namespace_declaration(None, ATOM);
        assert_eq!(e.to_xml(), "<entry/>");
        let reparsed = Document::parse(e.to_xml().as_bytes()).unwrap();
        assert_eq!(reparsed.root_element().namespace(), None);

        let e = Element::new_prefixed("g", "entry", GD).with_namespace_declaration(Some("g"), ATOM);
        assert_eq!(
            e.to_xml(),
            r#"<g:entry xmlns:g="http://schemas.google.com/g/2005"/>"#
        );
    }

    #[test]
    fn test_attribute_whitespace_survives_round_trip() {
        let e = Element::new("t").with_attribute("v", "a\nb\tc\rd");
        let xml = e.to_xml();
        assert_eq!(xml, r#"<t v="a&#10;b&#9;c&#13;d"/>"#);

        let reparsed = Document::parse(xml.as_bytes()).unwrap();
        assert_eq!(reparsed.root_element().attribute("v"), Some("a\nb\tc\rd"));
    }

    fn arb_element() -> impl Strategy<Value = Element> {
        let name = "[a-w][a-z0-9]{0,6}";
        let text = "[ -~]{1,12}";
        let prefix = prop::sample::select(vec!["g", "a"]);
        let namespace = prop::sample::select(vec![ATOM, GD, "urn:x"]);
        let leaf = (name, proptest::option::of(text), any::<bool>()).prop_map(|(n, t, atom)| {
            let e = if atom { Element::new_ns(n, ATOM) } else { Element::new(n) };
            match t {
                Some(t) => e.with_text(t),
                None => e,
            }
        });
        leaf.prop_recursive(3, 24, 4, move |inner| {
            (
                name,
                proptest::collection::vec(inner, 0..4),
                proptest::option::of(("[a-w][a-z]{0,3}", "[ -~\n\t\r]{0,8}")),
                proptest::option::of((prefix.clone(), "[a-w][a-z]{0,3}", namespace.clone(), text)),
                proptest::option::of((proptest::option::of(prefix.clone()), namespace.clone())),
                any::<bool>(),
            )
                .prop_map(|(n, children, attr, ns_attr, declaration, prefixed)| {
                    let mut e = if prefixed {
                        Element::new_prefixed("g", n, GD)
                    } else {
                        Element::new_ns(n, ATOM)
                    };
                    if let Some((p, ns)) = declaration {
                        e = e.with_namespace_declaration(p, ns);
                    }
                    if let Some((k, v)) = attr {
                        e.set_attribute(k, v);
                    }
                    if let Some((p, k, ns, v)) = ns_attr {
                        e = e.with_attribute_ns(p, k, ns, v);
                    }
                    for child in children {
                        e.push_child(child);
                    }
                    e
                })
        })
    }

    proptest! {
        #[test]
        fn prop_serialized_element_reparses_equivalent(element in arb_element()) {
            let xml = element.to_xml();
            let reparsed = Document::parse(xml.as_bytes()).unwrap();
            prop_assert_eq!(reparsed.root_element(), &element);
        }
    }
}
