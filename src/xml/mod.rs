//! Parse and serialize entry points.
//!
//! The engine parser never fails: like a browser `DOMParser`, it reports
//! malformed input by returning a document that contains a `parsererror`
//! marker element. [`XmlParser`] looks for that marker and turns it into a
//! [`ParseError`].
//!
//! ```
//! let doc = xmldom::parse("<list><item>one</item></list>").unwrap();
//! assert_eq!(xmldom::node_to_string(&doc), "<list><item>one</item></list>");
//!
//! let err = xmldom::parse("<a><b></a>").unwrap_err();
//! assert_eq!(err.input, "<a><b></a>");
//! ```

use tracing::{debug, trace};

use crate::dom::{CharacterData, Document, DomNode, Element, Node, NodeCollection};
use crate::engine::encoding::decode_to_utf8;
use crate::engine::names::XHTML_NAMESPACE;
use crate::engine::parser::{GECKO_PARSER_ERROR_NAMESPACE, PARSER_ERROR_TAG};
use crate::engine::{self, NameMatch, ParseOptions};
use crate::error::{DomError, ParseError};

/// How a parsed document is checked for a parser-error marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorDetection {
    /// Looks only at the top of the tree: the document element is a Gecko
    /// marker (`parsererror` in the Mozilla parser-error namespace) or an
    /// XHTML `parsererror`, or its first child is an XHTML `parsererror`
    /// (Blink's marker inside a partial tree). User elements named
    /// `parsererror` deeper in the document are ignored.
    RootElement,
    /// Any element with local name `parsererror`, in any namespace.
    #[default]
    AnyNamespace,
}

/// A configured parser.
///
/// ```
/// use xmldom::engine::{HostEngine, ParseOptions};
/// use xmldom::{ErrorDetection, XmlParser};
///
/// let parser = XmlParser::new()
///     .options(ParseOptions::default().host(HostEngine::Blink))
///     .detection(ErrorDetection::AnyNamespace);
/// assert!(parser.parse("<a><b></a>").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct XmlParser {
    options: ParseOptions,
    detection: ErrorDetection,
}

impl XmlParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the engine parse options.
    #[must_use]
    pub fn options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the marker detection strategy.
    #[must_use]
    pub fn detection(mut self, detection: ErrorDetection) -> Self {
        self.detection = detection;
        self
    }

    /// A new, empty document.
    #[must_use]
    pub fn create_document(&self) -> Document {
        create_document()
    }

    /// A new document whose document element is `qualified_name` in
    /// `namespace`.
    ///
    /// # Errors
    ///
    /// `INVALID_CHARACTER_ERR` when the name is rejected.
    pub fn create_document_with(
        &self,
        namespace: Option<&str>,
        qualified_name: &str,
    ) -> Result<Document, DomError> {
        let doc = self.create_document();
        let root = doc.create_element_ns(namespace, qualified_name)?;
        doc.append_child(&root)?;
        Ok(doc)
    }

    /// Parses `text` into a document.
    ///
    /// # Errors
    ///
    /// [`ParseError`] when the engine marks the result as malformed.
    pub fn parse(&self, text: &str) -> Result<Document, ParseError> {
        let doc = Document::from_native(engine::parse_from_string(text, &self.options));
        match self.find_marker(&doc) {
            None => Ok(doc),
            Some(marker) => {
                let message = marker_message(&marker);
                debug!(%message, detection = ?self.detection, "parser-error marker found");
                Err(ParseError {
                    input: text.to_string(),
                    message,
                })
            }
        }
    }

    /// Decodes `bytes` (byte order mark, then the declared encoding, then
    /// UTF-8) and parses the result.
    ///
    /// # Errors
    ///
    /// [`ParseError`] when the bytes cannot be decoded or the text is
    /// malformed.
    pub fn parse_bytes(&self, bytes: &[u8]) -> Result<Document, ParseError> {
        let text = decode_to_utf8(bytes).map_err(|e| ParseError {
            input: String::from_utf8_lossy(bytes).into_owned(),
            message: e.to_string(),
        })?;
        self.parse(&text)
    }

    fn find_marker(&self, doc: &Document) -> Option<Element> {
        match self.detection {
            ErrorDetection::RootElement => {
                let root = doc.document_element()?;
                if is_marker(&root, GECKO_PARSER_ERROR_NAMESPACE)
                    || is_marker(&root, XHTML_NAMESPACE)
                {
                    return Some(root);
                }
                match root.first_child() {
                    Some(Node::Element(first)) if is_marker(&first, XHTML_NAMESPACE) => {
                        Some(first)
                    }
                    _ => None,
                }
            }
            ErrorDetection::AnyNamespace => doc
                .native()
                .elements_by_tag_name(PARSER_ERROR_TAG, NameMatch::Local)
                .into_iter()
                .next()
                .map(Element::from_native),
        }
    }
}

fn is_marker(element: &Element, namespace: &str) -> bool {
    element.tag_name() == PARSER_ERROR_TAG && element.namespace_uri().as_deref() == Some(namespace)
}

/// The human-readable part of a marker: the `div` detail line of a Blink
/// marker, or the leading text of a Gecko one.
fn marker_message(marker: &Element) -> String {
    let detail = marker
        .elements_by_tag_name("div")
        .item(0)
        .and_then(|div| div.first_child());
    let text = detail.or_else(|| marker.first_child());
    match text {
        Some(Node::Text(text)) => text.data().trim_end().to_string(),
        _ => String::new(),
    }
}

/// Parses `text` with the default [`XmlParser`].
///
/// # Errors
///
/// [`ParseError`] when the text is not well-formed.
pub fn parse(text: &str) -> Result<Document, ParseError> {
    XmlParser::default().parse(text)
}

/// A new, empty document.
#[must_use]
pub fn create_document() -> Document {
    Document::from_native(engine::create_document())
}

/// Serializes `node` and its subtree.
#[must_use]
pub fn node_to_string(node: &dyn DomNode) -> String {
    node.to_xml_string()
}

/// Removes every text node under `node` whose data is only spaces, tabs
/// and newlines. CDATA sections are kept; `node` itself is never removed.
///
/// # Errors
///
/// Propagates a [`DomError`] if the engine refuses a removal.
pub fn remove_whitespace(node: &dyn DomNode) -> Result<(), DomError> {
    let mut pending: Vec<(Node, Option<Node>)> = vec![(node.as_node(), None)];
    while let Some((node, parent)) = pending.pop() {
        if let (Node::Text(text), Some(parent)) = (&node, &parent) {
            if is_whitespace(&text.data()) {
                trace!(parent = %parent.node_name(), "removing whitespace text node");
                parent.remove_child(text)?;
                continue;
            }
        }
        let children = node.child_nodes().nodes();
        pending.extend(children.into_iter().rev().map(|child| (child, Some(node.clone()))));
    }
    Ok(())
}

fn is_whitespace(data: &str) -> bool {
    data.chars().all(|c| matches!(c, ' ' | '\t' | '\n'))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::engine::HostEngine;
    use crate::error::DomErrorCode;
    use pretty_assertions::assert_eq;

    fn parser(host: HostEngine, detection: ErrorDetection) -> XmlParser {
        XmlParser::new()
            .options(ParseOptions::default().host(host))
            .detection(detection)
    }

    #[test]
    fn test_parse_well_formed() {
        let doc = parse("<r><c a=\"1\"/></r>").unwrap();
        assert_eq!(doc.document_element().unwrap().tag_name(), "r");
    }

    #[test]
    fn test_gecko_error_message() {
        let err = parser(HostEngine::Gecko, ErrorDetection::RootElement)
            .parse("<a><b></a>")
            .unwrap_err();
        assert_eq!(err.input, "<a><b></a>");
        assert!(err.message.starts_with("XML Parsing Error: "), "{}", err.message);
        assert!(err.message.contains("mismatched end tag"));
        assert!(err.message.contains("\nLine Number 1, Column "), "{}", err.message);
    }

    #[test]
    fn test_blink_error_message() {
        let err = parser(HostEngine::Blink, ErrorDetection::AnyNamespace)
            .parse("<a><b></a>")
            .unwrap_err();
        assert_eq!(err.input, "<a><b></a>");
        assert!(err.message.starts_with("error on line 1 at column "), "{}", err.message);
        assert!(err.message.contains("mismatched end tag"));
    }

    #[test]
    fn test_root_element_detection_finds_blink_markers() {
        // A Blink marker sits inside the partial document element.
        let parser = parser(HostEngine::Blink, ErrorDetection::RootElement);
        let err = parser.parse("<a><b></a>").unwrap_err();
        assert!(err.message.contains("mismatched end tag"), "{}", err.message);

        let err = parser.parse("").unwrap_err();
        assert!(err.message.contains("missing root element"), "{}", err.message);
    }

    #[test]
    fn test_root_element_detection_ignores_nested_user_elements() {
        let parser = parser(HostEngine::Gecko, ErrorDetection::RootElement);
        assert!(parser.parse("<doc><x/><parsererror/></doc>").is_ok());
        assert!(parser
            .parse("<doc><parsererror xmlns=\"urn:other\"/></doc>")
            .is_ok());
    }

    #[test]
    fn test_blink_marker_without_partial_tree() {
        let err = parser(HostEngine::Blink, ErrorDetection::AnyNamespace)
            .parse("")
            .unwrap_err();
        assert!(err.message.contains("missing root element"), "{}", err.message);
    }

    #[test]
    fn test_any_namespace_matches_user_parsererror_elements() {
        let err = parse("<doc><parsererror/></doc>").unwrap_err();
        assert_eq!(err.message, "");
    }

    #[test]
    fn test_parse_bytes() {
        let doc = XmlParser::new()
            .parse_bytes(b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><r>caf\xE9</r>")
            .unwrap();
        let root = doc.document_element().unwrap();
        assert_eq!(
            root.first_child().unwrap().node_value().as_deref(),
            Some("caf\u{e9}")
        );

        let err = XmlParser::new().parse_bytes(b"<r>\xFF</r>").unwrap_err();
        assert!(err.message.contains("UTF-8"), "{}", err.message);
    }

    #[test]
    fn test_create_document_with() {
        let parser = XmlParser::new();
        let doc = parser.create_document_with(Some("urn:x"), "x:root").unwrap();
        assert_eq!(doc.to_xml_string(), "<x:root xmlns:x=\"urn:x\"/>");
        let err = parser.create_document_with(None, "bad name").unwrap_err();
        assert_eq!(err.code, DomErrorCode::InvalidCharacter);
        assert!(!parser.create_document().has_child_nodes());
    }

    #[test]
    fn test_remove_whitespace() {
        let doc = parse("<r>\n  <a> </a>\t<b>x</b><![CDATA[  ]]>\n</r>").unwrap();
        remove_whitespace(&doc).unwrap();
        assert_eq!(
            node_to_string(&doc),
            "<r><a/><b>x</b><![CDATA[  ]]></r>"
        );
    }

    #[test]
    fn test_remove_whitespace_keeps_the_root() {
        let doc = create_document();
        let text = doc.create_text_node("   ");
        remove_whitespace(&text).unwrap();
        assert_eq!(text.data(), "   ");
    }

    #[test]
    fn test_remove_whitespace_on_wide_and_deep_trees() {
        let wide = format!("<r>{}</r>", "<c/> ".repeat(20_000));
        let doc = parse(&wide).unwrap();
        remove_whitespace(&doc).unwrap();
        assert_eq!(doc.document_element().unwrap().child_nodes().length(), 20_000);

        let doc = create_document();
        let mut chain = doc.create_element("d").unwrap();
        for _ in 0..50_000 {
            let parent = doc.create_element("d").unwrap();
            parent.append_child(&doc.create_text_node(" ")).unwrap();
            parent.append_child(&chain).unwrap();
            chain = parent;
        }
        doc.append_child(&chain).unwrap();
        remove_whitespace(&doc).unwrap();
        assert!(!doc.to_xml_string().contains(' '));
    }

    #[test]
    fn test_is_whitespace() {
        assert!(is_whitespace(""));
        assert!(is_whitespace(" \t\n"));
        assert!(!is_whitespace(" \r\n"));
        assert!(!is_whitespace("\u{a0}"));
        assert!(!is_whitespace(" x "));
    }
}
