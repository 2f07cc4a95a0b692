//! Typed DOM wrappers over engine node handles.
//!
//! Every wrapper holds exactly one [`NativeNode`] and nothing else. Wrappers
//! are cheap views: they cache nothing, every read goes back to the engine,
//! and two wrappers are equal when they refer to the same engine node.
//!
//! [`Node`] is the closed set of wrapper kinds and [`Node::build`] is the
//! only place that decides which kind a handle gets. Shared behavior lives
//! in the [`DomNode`] trait, implemented by `Node` and by every typed
//! wrapper.
//!
//! ```
//! use xmldom::dom::DomNode;
//!
//! let doc = xmldom::parse("<greeting lang=\"en\">hi</greeting>").unwrap();
//! let root = doc.document_element().unwrap();
//! assert_eq!(root.tag_name(), "greeting");
//! assert_eq!(root.attribute("lang").as_deref(), Some("en"));
//! assert_eq!(root.first_child().unwrap().node_value().as_deref(), Some("hi"));
//! ```

mod character_data;
mod document;
mod element;
mod named_node_map;
mod node_list;
mod processing_instruction;

use std::fmt;

use tracing::trace;

use crate::engine::names::split_qname;
use crate::engine::NativeNode;
use crate::error::{DomError, DomErrorCode, EngineError};

pub use self::character_data::CharacterData;
pub use self::named_node_map::NamedNodeMap;
pub use self::node_list::{Items, NodeCollection, NodeList};
pub use crate::engine::NodeType;

macro_rules! wrapper {
    ($(#[$meta:meta])* $name:ident => $variant:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name {
            native: NativeNode,
        }

        impl $name {
            pub(crate) fn from_native(native: NativeNode) -> Self {
                Self { native }
            }
        }

        impl DomNode for $name {
            fn native(&self) -> &NativeNode {
                &self.native
            }
        }

        impl From<$name> for Node {
            fn from(node: $name) -> Self {
                Node::$variant(node)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_xml_string())
            }
        }
    };
}

wrapper!(
    /// An element.
    Element => Element
);
wrapper!(
    /// An attribute node, as found in a [`NamedNodeMap`].
    Attr => Attr
);
wrapper!(
    /// A text node.
    Text => Text
);
wrapper!(
    /// A `<![CDATA[...]]>` section.
    CdataSection => CdataSection
);
wrapper!(
    /// A comment.
    Comment => Comment
);
wrapper!(
    /// A processing instruction.
    ProcessingInstruction => ProcessingInstruction
);
wrapper!(
    /// A document: the root of a tree and the factory for its nodes.
    Document => Document
);
wrapper!(
    /// A lightweight container whose children move when it is inserted.
    DocumentFragment => DocumentFragment
);
wrapper!(
    /// Any node without a dedicated wrapper (doctype, entity, notation, ...).
    GenericNode => Other
);

/// A wrapper of any kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    Element(Element),
    Attr(Attr),
    Text(Text),
    CdataSection(CdataSection),
    Comment(Comment),
    ProcessingInstruction(ProcessingInstruction),
    Document(Document),
    DocumentFragment(DocumentFragment),
    Other(GenericNode),
}

impl Node {
    /// Wraps a handle in the wrapper matching its node type. `None` stays
    /// `None`.
    #[must_use]
    pub fn build(native: Option<NativeNode>) -> Option<Node> {
        native.map(Self::wrap)
    }

    pub(crate) fn wrap(native: NativeNode) -> Node {
        let node_type = native.node_type();
        trace!(?node_type, name = %native.node_name(), "wrapping engine node");
        match node_type {
            NodeType::Attribute => Node::Attr(Attr::from_native(native)),
            NodeType::CdataSection => Node::CdataSection(CdataSection::from_native(native)),
            NodeType::Comment => Node::Comment(Comment::from_native(native)),
            NodeType::DocumentFragment => {
                Node::DocumentFragment(DocumentFragment::from_native(native))
            }
            NodeType::Document => Node::Document(Document::from_native(native)),
            NodeType::Element => Node::Element(Element::from_native(native)),
            NodeType::ProcessingInstruction => {
                Node::ProcessingInstruction(ProcessingInstruction::from_native(native))
            }
            NodeType::Text => Node::Text(Text::from_native(native)),
            NodeType::DocumentType
            | NodeType::EntityReference
            | NodeType::Entity
            | NodeType::Notation => Node::Other(GenericNode::from_native(native)),
        }
    }

    #[must_use]
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }

    /// The character-data view of text, CDATA and comment nodes.
    #[must_use]
    pub fn as_character_data(&self) -> Option<&dyn CharacterData> {
        match self {
            Node::Text(t) => Some(t),
            Node::CdataSection(c) => Some(c),
            Node::Comment(c) => Some(c),
            _ => None,
        }
    }
}

impl DomNode for Node {
    fn native(&self) -> &NativeNode {
        match self {
            Node::Element(n) => n.native(),
            Node::Attr(n) => n.native(),
            Node::Text(n) => n.native(),
            Node::CdataSection(n) => n.native(),
            Node::Comment(n) => n.native(),
            Node::ProcessingInstruction(n) => n.native(),
            Node::Document(n) => n.native(),
            Node::DocumentFragment(n) => n.native(),
            Node::Other(n) => n.native(),
        }
    }

    fn as_node(&self) -> Node {
        self.clone()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_xml_string())
    }
}

/// Builds the [`DomError`] for a rejected engine call on `node`.
pub(crate) fn dom_error<N: DomNode + ?Sized>(
    node: &N,
    code: DomErrorCode,
    source: EngineError,
) -> DomError {
    DomError::new(code, node.as_node(), source)
}

/// Navigation, identity and mutation shared by every wrapper.
///
/// Only [`native`](Self::native) is required; everything else forwards to
/// the engine and re-wraps what comes back through [`Node::build`].
pub trait DomNode {
    /// The engine handle behind this wrapper.
    fn native(&self) -> &NativeNode;

    /// This wrapper as a [`Node`].
    fn as_node(&self) -> Node {
        Node::wrap(self.native().clone())
    }

    fn node_name(&self) -> String {
        self.native().node_name()
    }

    fn node_type(&self) -> NodeType {
        self.native().node_type()
    }

    fn node_value(&self) -> Option<String> {
        self.native().node_value()
    }

    /// Sets the node value; nodes whose value is null ignore it.
    ///
    /// # Errors
    ///
    /// `INVALID_MODIFICATION_ERR` if the engine rejects the change.
    fn set_node_value(&self, value: &str) -> Result<(), DomError> {
        self.native()
            .set_node_value(value)
            .map_err(|e| dom_error(self, DomErrorCode::InvalidModification, e))
    }

    fn namespace_uri(&self) -> Option<String> {
        self.native().namespace_uri()
    }

    /// The part of the node name before the first colon.
    fn prefix(&self) -> Option<String> {
        split_qname(&self.node_name()).0.map(str::to_string)
    }

    /// The owning document; `None` for a document.
    fn owner_document(&self) -> Option<Document> {
        self.native().owner_document().map(Document::from_native)
    }

    fn parent_node(&self) -> Option<Node> {
        Node::build(self.native().parent())
    }

    fn first_child(&self) -> Option<Node> {
        let children = self.child_nodes();
        if children.length() == 0 {
            return None;
        }
        children.get(0)
    }

    fn last_child(&self) -> Option<Node> {
        let children = self.child_nodes();
        children
            .length()
            .checked_sub(1)
            .and_then(|last| children.get(last))
    }

    fn next_sibling(&self) -> Option<Node> {
        Node::build(self.native().next_sibling())
    }

    fn previous_sibling(&self) -> Option<Node> {
        Node::build(self.native().previous_sibling())
    }

    /// A live view of the children.
    fn child_nodes(&self) -> NodeList {
        NodeList::children(self.native().clone())
    }

    /// A live view of the attributes; empty for non-elements.
    fn attributes(&self) -> NamedNodeMap {
        NamedNodeMap::new(self.native().clone())
    }

    fn has_child_nodes(&self) -> bool {
        self.native().child_count() > 0
    }

    fn has_attributes(&self) -> bool {
        self.attributes().length() > 0
    }

    /// Appends `new_child`, moving it from wherever it was. A fragment
    /// contributes its children and is returned empty.
    ///
    /// # Errors
    ///
    /// `INVALID_MODIFICATION_ERR` when the engine rejects the insertion
    /// (cycle, node of another document, hierarchy violation).
    fn append_child(&self, new_child: &dyn DomNode) -> Result<Node, DomError> {
        self.native()
            .append_child(new_child.native())
            .map(Node::wrap)
            .map_err(|e| dom_error(self, DomErrorCode::InvalidModification, e))
    }

    /// Inserts `new_child` before `ref_child`, or at the end for `None`.
    ///
    /// # Errors
    ///
    /// As for [`append_child`](Self::append_child), and when `ref_child`
    /// is not a child of this node.
    fn insert_before(
        &self,
        new_child: &dyn DomNode,
        ref_child: Option<&dyn DomNode>,
    ) -> Result<Node, DomError> {
        self.native()
            .insert_before(new_child.native(), ref_child.map(|r| r.native()))
            .map(Node::wrap)
            .map_err(|e| dom_error(self, DomErrorCode::InvalidModification, e))
    }

    /// # Errors
    ///
    /// `INVALID_MODIFICATION_ERR` when `old_child` is not a child of this node.
    fn remove_child(&self, old_child: &dyn DomNode) -> Result<Node, DomError> {
        self.native()
            .remove_child(old_child.native())
            .map(Node::wrap)
            .map_err(|e| dom_error(self, DomErrorCode::InvalidModification, e))
    }

    /// Puts `new_child` where `old_child` was and returns `old_child`.
    ///
    /// # Errors
    ///
    /// `INVALID_MODIFICATION_ERR` on any engine rejection.
    fn replace_child(
        &self,
        new_child: &dyn DomNode,
        old_child: &dyn DomNode,
    ) -> Result<Node, DomError> {
        self.native()
            .replace_child(new_child.native(), old_child.native())
            .map(Node::wrap)
            .map_err(|e| dom_error(self, DomErrorCode::InvalidModification, e))
    }

    fn clone_node(&self, deep: bool) -> Node {
        Node::wrap(self.native().clone_node(deep))
    }

    fn normalize(&self) {
        self.native().normalize();
    }

    /// The serializer's rendering of this subtree.
    fn to_xml_string(&self) -> String {
        self.native().to_xml_string()
    }

    /// Whether both wrappers refer to the same engine node.
    fn is_same_node(&self, other: &dyn DomNode) -> bool {
        self.native() == other.native()
    }
}
