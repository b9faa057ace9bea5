//! Minimal owned element tree over `quick-xml` events.
//!
//! Corpus documents are small (one manifest per root, one detail document per
//! compound entity), and detail parsing needs mixed access to child elements
//! and the text interleaved between them (type expressions embed `<ref>`
//! elements mid-text). A DOM-style tree keeps that traversal simple; the
//! streaming reader stays an implementation detail of [`parse_document`].

use std::fs;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

/// Errors produced while building an element tree.
#[derive(Debug, Error)]
pub enum XmlError {
    /// Low-level syntax error from the event reader.
    #[error("XML syntax error: {0}")]
    Syntax(#[from] quick_xml::Error),

    /// Malformed attribute list on an element.
    #[error("malformed attribute: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    /// A close tag appeared without a matching open tag.
    #[error("unmatched close tag '{0}'")]
    UnmatchedClose(String),

    /// The document ended before the root element was closed.
    #[error("unexpected end of document inside '{0}'")]
    UnexpectedEof(String),

    /// The document contains no root element.
    #[error("document has no root element")]
    NoRoot,
}

/// One piece of element content, in document order.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// Character data between child elements.
    Text(String),
    /// A nested element.
    Element(Element),
}

/// An owned XML element: name, attributes, and ordered mixed content.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    /// Ordered mixed content (text runs interleaved with child elements).
    pub contents: Vec<Content>,
}

impl Element {
    fn new(name: String, attrs: Vec<(String, String)>) -> Self {
        Element {
            name,
            attrs,
            contents: Vec::new(),
        }
    }

    /// Element (tag) name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value of the named attribute, if present.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate over child elements (text runs skipped).
    pub fn children(&self) -> impl Iterator<Item = &Element> {
        self.contents.iter().filter_map(|c| match c {
            Content::Element(e) => Some(e),
            Content::Text(_) => None,
        })
    }

    /// First child element with the given name.
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.children().find(|e| e.name == name)
    }

    /// All child elements with the given name, in document order.
    pub fn find_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children().filter(move |e| e.name == name)
    }

    /// Concatenated text of this element and all descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for content in &self.contents {
            match content {
                Content::Text(t) => out.push_str(t),
                Content::Element(e) => e.collect_text(out),
            }
        }
    }

    /// Direct text of this element only (children excluded).
    pub fn direct_text(&self) -> String {
        let mut out = String::new();
        for content in &self.contents {
            if let Content::Text(t) = content {
                out.push_str(t);
            }
        }
        out
    }

    /// Text of the first child element with the given name.
    pub fn find_text(&self, name: &str) -> Option<String> {
        self.find(name).map(Element::text)
    }
}

/// Parse a complete document into its root element.
pub fn parse_document(input: &str) -> Result<Element, XmlError> {
    let mut reader = Reader::from_str(input);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let element = element_from_start(&start)?;
                stack.push(element);
            }
            Event::Empty(start) => {
                let element = element_from_start(&start)?;
                attach(&mut stack, &mut root, element);
            }
            Event::End(end) => {
                let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                let element = stack.pop().ok_or(XmlError::UnmatchedClose(name))?;
                attach(&mut stack, &mut root, element);
            }
            Event::Text(text) => {
                let text = text.unescape()?.into_owned();
                if let Some(parent) = stack.last_mut() {
                    push_text(parent, &text);
                }
            }
            Event::CData(data) => {
                let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                if let Some(parent) = stack.last_mut() {
                    push_text(parent, &text);
                }
            }
            Event::Eof => break,
            // Declarations, processing instructions, comments, doctypes.
            _ => {}
        }
    }

    if let Some(open) = stack.pop() {
        return Err(XmlError::UnexpectedEof(open.name));
    }
    root.ok_or(XmlError::NoRoot)
}

/// Read and parse a document from disk, attaching the path to any failure.
pub fn load_document(path: &Path) -> Result<Element, crate::error::CorpusError> {
    let input = fs::read_to_string(path).map_err(|source| crate::error::CorpusError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_document(&input).map_err(|source| crate::error::CorpusError::Xml {
        path: path.to_path_buf(),
        source,
    })
}

fn element_from_start(
    start: &quick_xml::events::BytesStart<'_>,
) -> Result<Element, XmlError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        attrs.push((key, value));
    }
    Ok(Element::new(name, attrs))
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.contents.push(Content::Element(element)),
        // Only the first top-level element becomes the root.
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

fn push_text(parent: &mut Element, text: &str) {
    // Merge adjacent text runs so consumers see ElementTree-style tails.
    if let Some(Content::Text(last)) = parent.contents.last_mut() {
        last.push_str(text);
    } else {
        parent.contents.push(Content::Text(text.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_and_attributes() {
        let doc = parse_document(
            r#"<compound refid="classFoo" kind="class"><name>ns::Foo</name></compound>"#,
        )
        .unwrap();
        assert_eq!(doc.name(), "compound");
        assert_eq!(doc.attr("refid"), Some("classFoo"));
        assert_eq!(doc.attr("kind"), Some("class"));
        assert_eq!(doc.find_text("name").as_deref(), Some("ns::Foo"));
    }

    #[test]
    fn preserves_mixed_content_order() {
        let doc = parse_document(r#"<type>const <ref refid="r1">Foo</ref> &amp;</type>"#).unwrap();
        assert_eq!(doc.contents.len(), 3);
        assert_eq!(doc.contents[0], Content::Text("const ".to_string()));
        match &doc.contents[1] {
            Content::Element(e) => {
                assert_eq!(e.name(), "ref");
                assert_eq!(e.text(), "Foo");
            }
            other => panic!("expected ref element, got {other:?}"),
        }
        assert_eq!(doc.contents[2], Content::Text(" &".to_string()));
    }

    #[test]
    fn empty_elements_become_childless_nodes() {
        let doc = parse_document(r#"<para><sp/>tail</para>"#).unwrap();
        assert_eq!(doc.children().count(), 1);
        assert_eq!(doc.find("sp").unwrap().contents.len(), 0);
        assert_eq!(doc.text(), "tail");
    }

    #[test]
    fn deep_text_concatenates_descendants() {
        let doc =
            parse_document(r#"<para>one <bold>two</bold> three</para>"#).unwrap();
        assert_eq!(doc.text(), "one two three");
    }

    #[test]
    fn unterminated_document_is_an_error() {
        let err = parse_document("<open><inner></inner>").unwrap_err();
        match err {
            XmlError::UnexpectedEof(name) => assert_eq!(name, "open"),
            // quick-xml may also flag the missing close itself
            XmlError::Syntax(_) => {}
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn empty_input_has_no_root() {
        assert!(matches!(parse_document(""), Err(XmlError::NoRoot)));
    }
}
