use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{PrefixDeclaration, ResolveResult};
use quick_xml::NsReader;

use super::element::{Attribute, Element};
use super::encoding::to_utf8;
use super::query::{NamespaceContext, Path};
use super::XmlError;

/// SEC-003: Maximum element nesting depth.
/// Prevents unbounded memory growth from maliciously deep documents.
pub const MAX_DEPTH: usize = 256;

/// A parsed XML document. Holds exactly one root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    root: Element,
}

impl Document {
    /// Parses a complete XML document.
    ///
    /// The document must be well-formed: a single root element, matching end
    /// tags, bound namespace prefixes and no text outside the root. Comments,
    /// processing instructions and the doctype are discarded. Input in an
    /// encoding other than UTF-8 is recognized by its byte order mark or XML
    /// declaration and transcoded first.
    ///
    /// SEC-002: XXE protection comes from quick-xml (0.37), which never expands
    /// `<!ENTITY>` declarations; unknown entity references are reported as
    /// errors by `unescape()`.
    pub fn parse(bytes: &[u8]) -> Result<Self, XmlError> {
        let bytes = to_utf8(bytes)?;
        let mut reader = NsReader::from_reader(bytes.as_ref());
        let mut buf = Vec::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let (resolved, event) = reader.read_resolved_event_into(&mut buf)?;
            let namespace = owned_namespace(resolved)?;

            match event {
                Event::Start(e) => {
                    if stack.len() >= MAX_DEPTH {
                        return Err(XmlError::MaxDepthExceeded(MAX_DEPTH));
                    }
                    if stack.is_empty() && root.is_some() {
                        return Err(XmlError::MultipleRoots);
                    }
                    stack.push(start_element(&reader, namespace, &e)?);
                }
                Event::Empty(e) => {
                    let element = start_element(&reader, namespace, &e)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(e) => {
                    let element = stack.pop().ok_or_else(|| {
                        XmlError::UnmatchedEndTag(String::from_utf8_lossy(e.name().as_ref()).into_owned())
                    })?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(t) => {
                    let text = t.unescape()?;
                    match stack.last_mut() {
                        Some(parent) => parent.push_text(text),
                        None if text.trim().is_empty() => {}
                        None => return Err(XmlError::TextOutsideRoot),
                    }
                }
                Event::CData(c) => {
                    let bytes = c.into_inner();
                    let text = std::str::from_utf8(&bytes)?;
                    match stack.last_mut() {
                        Some(parent) => parent.push_text(text),
                        None => return Err(XmlError::TextOutsideRoot),
                    }
                }
                Event::Eof => break,
                // Declarations, comments, processing instructions, doctype
                _ => {}
            }
            buf.clear();
        }

        if let Some(open) = stack.last() {
            return Err(XmlError::UnclosedElement(open.qualified_name()));
        }
        root.map(|root| Self { root }).ok_or(XmlError::NoRootElement)
    }

    /// Wraps an element as the root of a new document.
    pub fn from_root(root: Element) -> Self {
        Self { root }
    }

    pub fn root_element(&self) -> &Element {
        &self.root
    }

    pub fn into_root_element(self) -> Element {
        self.root
    }

    /// Evaluates a child path such as `/atom:feed/atom:entry` against the document.
    ///
    /// Absolute and relative paths are both evaluated from the document node,
    /// so the first step names the root element.
    pub fn query(&self, path: &str, namespaces: &NamespaceContext) -> Result<Vec<&Element>, XmlError> {
        Ok(Path::compile(path, namespaces)?.select_from_document(self))
    }
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => parent.push_child(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(XmlError::MultipleRoots),
    }
    Ok(())
}

fn start_element(
    reader: &NsReader<&[u8]>,
    namespace: Option<String>,
    e: &BytesStart<'_>,
) -> Result<Element, XmlError> {
    let name = std::str::from_utf8(e.local_name().as_ref())?.to_owned();
    let prefix = match e.name().prefix() {
        Some(p) => Some(std::str::from_utf8(p.as_ref())?.to_owned()),
        None => None,
    };

    let mut element = Element::new(name);
    element.prefix = prefix;
    element.namespace = namespace;

    for attr in e.attributes() {
        let attr = attr?;
        let value = attr
            .decode_and_unescape_value(reader.decoder())?
            .into_owned();

        if let Some(binding) = attr.key.as_namespace_binding() {
            let prefix = match binding {
                PrefixDeclaration::Default => None,
                PrefixDeclaration::Named(p) => Some(std::str::from_utf8(p)?.to_owned()),
            };
            element.namespace_declarations.push((prefix, value));
            continue;
        }

        let (resolved, local) = reader.resolve_attribute(attr.key);
        let namespace = owned_namespace(resolved)?;
        let prefix = match attr.key.prefix() {
            Some(p) => Some(std::str::from_utf8(p.as_ref())?.to_owned()),
            None => None,
        };
        element.attributes.push(Attribute {
            name: std::str::from_utf8(local.as_ref())?.to_owned(),
            prefix,
            namespace,
            value,
        });
    }

    Ok(element)
}

fn owned_namespace(resolved: ResolveResult<'_>) -> Result<Option<String>, XmlError> {
    match resolved {
        ResolveResult::Bound(ns) => Ok(Some(std::str::from_utf8(ns.as_ref())?.to_owned())),
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Unknown(prefix) => Err(XmlError::UnboundPrefix(
            String::from_utf8_lossy(&prefix).into_owned(),
        )),
    }
}
