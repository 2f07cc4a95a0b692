use crate::engine::NativeNode;
use crate::error::{DomError, DomErrorCode, EngineError};

use super::node_list::{Items, NodeCollection};
use super::{dom_error, DomNode, Node};

/// The attributes of an element, addressed by index or qualified name.
///
/// Like [`NodeList`](super::NodeList) it is a live view: it holds the
/// element, not a copy of its attributes. The map of a non-element is
/// always empty and rejects mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedNodeMap {
    element: NativeNode,
}

impl NamedNodeMap {
    pub(crate) fn new(element: NativeNode) -> Self {
        Self { element }
    }

    #[must_use]
    pub fn iter(&self) -> Items {
        Items::new(self)
    }

    /// The attribute with qualified name `name`.
    #[must_use]
    pub fn get_named_item(&self, name: &str) -> Option<Node> {
        Node::build(self.element.named_attribute(name))
    }

    /// Adds `attr`, replacing any attribute of the same name, and returns
    /// the one it replaced.
    ///
    /// # Errors
    ///
    /// `INVALID_MODIFICATION_ERR` when `attr` is not an attribute, belongs
    /// to another document or element, or this map has no element.
    pub fn set_named_item(&self, attr: &dyn DomNode) -> Result<Option<Node>, DomError> {
        self.element
            .set_named_item(attr.native())
            .map(Node::build)
            .map_err(|e| self.error(e))
    }

    /// Removes and returns the attribute named `name`.
    ///
    /// # Errors
    ///
    /// `INVALID_MODIFICATION_ERR` when no such attribute exists.
    pub fn remove_named_item(&self, name: &str) -> Result<Node, DomError> {
        self.element
            .remove_named_item(name)
            .map(Node::wrap)
            .map_err(|e| self.error(e))
    }

    fn error(&self, source: EngineError) -> DomError {
        dom_error(
            &Node::wrap(self.element.clone()),
            DomErrorCode::InvalidModification,
            source,
        )
    }
}

impl NodeCollection for NamedNodeMap {
    fn length(&self) -> usize {
        self.element.attribute_count()
    }

    fn get(&self, index: usize) -> Option<Node> {
        Node::build(self.element.attribute_at(index))
    }
}

impl<'a> IntoIterator for &'a NamedNodeMap {
    type Item = Node;
    type IntoIter = Items;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
