//! # xmldom
//!
//! Typed W3C DOM wrappers over a small XML engine that behaves like a
//! browser's `DOMParser` and `XMLSerializer`.
//!
//! The [`engine`] owns the node trees and does all the real work: parsing,
//! tree mutation, serialization. The [`dom`] layer wraps engine handles in
//! typed nodes ([`dom::Element`], [`dom::Text`], ...) and turns engine
//! rejections into [`DomError`]s. The [`xml`] module holds the entry
//! points.
//!
//! ## Quick Start
//!
//! ```
//! use xmldom::dom::{DomNode, NodeCollection};
//!
//! let doc = xmldom::parse("<root><child>Hello</child></root>").unwrap();
//! let root = doc.document_element().unwrap();
//! assert_eq!(root.tag_name(), "root");
//!
//! let child = doc.create_element("child").unwrap();
//! child.set_attribute("n", "2").unwrap();
//! root.append_child(&child).unwrap();
//! assert_eq!(root.child_nodes().length(), 2);
//! assert_eq!(
//!     xmldom::node_to_string(&doc),
//!     "<root><child>Hello</child><child n=\"2\"/></root>"
//! );
//! ```
//!
//! Malformed input is reported as a [`ParseError`] carrying the input:
//!
//! ```
//! let err = xmldom::parse("<a><b></a>").unwrap_err();
//! assert_eq!(err.input, "<a><b></a>");
//! ```
//!
//! ## Memory
//!
//! A document's nodes live in one arena that only grows: removing a node
//! detaches it but does not free it. Documents that are mutated heavily
//! over a long time can be compacted with a deep clone, which keeps only
//! the nodes still in the tree:
//!
//! ```
//! use xmldom::dom::DomNode;
//!
//! let doc = xmldom::parse("<log/>").unwrap();
//! // ... many insertions and removals later ...
//! let compact = doc.clone_node(true);
//! assert_eq!(compact.to_xml_string(), doc.to_xml_string());
//! ```

pub mod dom;
pub mod engine;
pub mod error;
pub mod xml;

pub use dom::{Document, DomNode, Element, Node, NodeList};
pub use error::{DomError, DomErrorCode, Error, ParseError, Result};
pub use xml::{create_document, node_to_string, parse, remove_whitespace, ErrorDetection, XmlParser};
