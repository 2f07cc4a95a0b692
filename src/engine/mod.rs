//! The native XML engine behind the DOM wrappers.
//!
//! The engine plays the part a browser's built-in DOM plays for script:
//! it owns every tree, enforces the DOM mutation rules and reports
//! rejected calls with [`EngineError`]s named after DOMException names.
//! Callers only ever hold [`NativeNode`] handles.
//!
//! Each document's nodes live in one [`Tree`] arena shared through
//! `Rc<RefCell<_>>`. A handle pins the whole tree, so detached nodes stay
//! usable for as long as someone refers to them. Every operation validates
//! before it mutates; a rejected call leaves the tree untouched.
//!
//! Arena slots are never reused. Removed, replaced and never-attached
//! nodes keep their memory until the last handle to the tree is dropped.
//! A long-lived document under heavy churn can be compacted by cloning it
//! deeply ([`NativeNode::clone_node`] on the document), which copies only
//! the reachable nodes into a fresh arena, or by serializing and
//! re-parsing it.

pub mod encoding;
pub(crate) mod input;
pub mod names;
pub mod parser;
pub mod serializer;
pub mod tree;

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::error::EngineError;

use names::{is_valid_name, local_name, split_qname, validate_qname, XMLNS_NAMESPACE, XML_NAMESPACE};
use tree::{NodeId, NodeKind, Tree};

pub use parser::{parse_from_string, HostEngine, ParseOptions};

/// DOM node type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Element,
    Attribute,
    Text,
    CdataSection,
    EntityReference,
    Entity,
    ProcessingInstruction,
    Comment,
    Document,
    DocumentType,
    DocumentFragment,
    Notation,
}

impl NodeType {
    /// The numeric `nodeType` value.
    #[must_use]
    pub fn code(self) -> u16 {
        match self {
            Self::Element => 1,
            Self::Attribute => 2,
            Self::Text => 3,
            Self::CdataSection => 4,
            Self::EntityReference => 5,
            Self::Entity => 6,
            Self::ProcessingInstruction => 7,
            Self::Comment => 8,
            Self::Document => 9,
            Self::DocumentType => 10,
            Self::DocumentFragment => 11,
            Self::Notation => 12,
        }
    }
}

impl From<&NodeKind> for NodeType {
    fn from(kind: &NodeKind) -> Self {
        match kind {
            NodeKind::Document => Self::Document,
            NodeKind::DocumentFragment => Self::DocumentFragment,
            NodeKind::DocumentType { .. } => Self::DocumentType,
            NodeKind::Element { .. } => Self::Element,
            NodeKind::Attribute { .. } => Self::Attribute,
            NodeKind::Text { .. } => Self::Text,
            NodeKind::CData { .. } => Self::CdataSection,
            NodeKind::Comment { .. } => Self::Comment,
            NodeKind::ProcessingInstruction { .. } => Self::ProcessingInstruction,
        }
    }
}

/// How a tag-name query compares element names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameMatch {
    /// Compare against the qualified name (`Document.getElementsByTagName`).
    Qualified,
    /// Compare against the local name, in any namespace.
    Local,
}

/// Creates an empty document.
#[must_use]
pub fn create_document() -> NativeNode {
    NativeNode::from_tree(Tree::new())
}

/// An opaque handle to one node inside an engine tree.
///
/// Two handles are equal when they name the same node of the same tree.
#[derive(Clone)]
pub struct NativeNode {
    tree: Rc<RefCell<Tree>>,
    id: NodeId,
}

impl PartialEq for NativeNode {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.tree, &other.tree) && self.id == other.id
    }
}

impl Eq for NativeNode {}

impl Hash for NativeNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.tree) as usize).hash(state);
        self.id.hash(state);
    }
}

impl fmt::Debug for NativeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeNode")
            .field("tree", &Rc::as_ptr(&self.tree))
            .field("id", &self.id.into_raw())
            .finish()
    }
}

impl NativeNode {
    /// Wraps a freshly built tree and returns its document node.
    pub(crate) fn from_tree(tree: Tree) -> Self {
        let id = tree.root();
        Self {
            tree: Rc::new(RefCell::new(tree)),
            id,
        }
    }

    fn with(&self, id: NodeId) -> Self {
        Self {
            tree: Rc::clone(&self.tree),
            id,
        }
    }

    fn same_tree(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.tree, &other.tree)
    }

    // --- Basic reads ---

    #[must_use]
    pub fn node_type(&self) -> NodeType {
        NodeType::from(&self.tree.borrow().node(self.id).kind)
    }

    /// `nodeName`: the qualified name, target, or a `#`-prefixed constant.
    #[must_use]
    pub fn node_name(&self) -> String {
        match &self.tree.borrow().node(self.id).kind {
            NodeKind::Element { name, .. }
            | NodeKind::Attribute { name, .. }
            | NodeKind::DocumentType { name, .. } => name.clone(),
            NodeKind::ProcessingInstruction { target, .. } => target.clone(),
            NodeKind::Text { .. } => "#text".to_string(),
            NodeKind::CData { .. } => "#cdata-section".to_string(),
            NodeKind::Comment { .. } => "#comment".to_string(),
            NodeKind::Document => "#document".to_string(),
            NodeKind::DocumentFragment => "#document-fragment".to_string(),
        }
    }

    /// `nodeValue`; `None` for kinds whose value is null.
    #[must_use]
    pub fn node_value(&self) -> Option<String> {
        match &self.tree.borrow().node(self.id).kind {
            NodeKind::Attribute { value, .. } => Some(value.clone()),
            NodeKind::Text { content } | NodeKind::CData { content } | NodeKind::Comment { content } => {
                Some(content.clone())
            }
            NodeKind::ProcessingInstruction { data, .. } => Some(data.clone()),
            _ => None,
        }
    }

    /// Sets `nodeValue`. A no-op on kinds whose value is null.
    ///
    /// # Errors
    ///
    /// Never fails today; the signature leaves room for read-only nodes.
    pub fn set_node_value(&self, value: &str) -> Result<(), EngineError> {
        let mut tree = self.tree.borrow_mut();
        match &mut tree.node_mut(self.id).kind {
            NodeKind::Attribute { value: v, .. } => *v = value.to_string(),
            NodeKind::Text { content } | NodeKind::CData { content } | NodeKind::Comment { content } => {
                *content = value.to_string();
            }
            NodeKind::ProcessingInstruction { data, .. } => *data = value.to_string(),
            _ => {}
        }
        Ok(())
    }

    #[must_use]
    pub fn namespace_uri(&self) -> Option<String> {
        match &self.tree.borrow().node(self.id).kind {
            NodeKind::Element { namespace, .. } | NodeKind::Attribute { namespace, .. } => {
                namespace.clone()
            }
            _ => None,
        }
    }

    /// The document this node belongs to; `None` for the document itself.
    #[must_use]
    pub fn owner_document(&self) -> Option<NativeNode> {
        let root = self.tree.borrow().root();
        (root != self.id).then(|| self.with(root))
    }

    // --- Navigation ---

    #[must_use]
    pub fn parent(&self) -> Option<NativeNode> {
        let parent = self.tree.borrow().parent(self.id);
        parent.map(|id| self.with(id))
    }

    #[must_use]
    pub fn next_sibling(&self) -> Option<NativeNode> {
        let next = self.tree.borrow().next_sibling(self.id);
        next.map(|id| self.with(id))
    }

    #[must_use]
    pub fn previous_sibling(&self) -> Option<NativeNode> {
        let prev = self.tree.borrow().prev_sibling(self.id);
        prev.map(|id| self.with(id))
    }

    #[must_use]
    pub fn child_count(&self) -> usize {
        self.tree.borrow().children(self.id).count()
    }

    #[must_use]
    pub fn child_at(&self, index: usize) -> Option<NativeNode> {
        let child = self.tree.borrow().children(self.id).nth(index);
        child.map(|id| self.with(id))
    }

    /// A snapshot of the current children.
    #[must_use]
    pub fn children(&self) -> Vec<NativeNode> {
        let tree = self.tree.borrow();
        tree.children(self.id).map(|id| self.with(id)).collect()
    }

    // --- Mutation ---

    /// `appendChild`. Appending a fragment moves its children.
    ///
    /// # Errors
    ///
    /// See [`insert_before`](Self::insert_before).
    pub fn append_child(&self, child: &NativeNode) -> Result<NativeNode, EngineError> {
        self.insert_before(child, None)
    }

    /// `insertBefore`. A `None` reference appends.
    ///
    /// # Errors
    ///
    /// `WrongDocument` for a child from another tree, `NotFound` when the
    /// reference is not a child of this node, `HierarchyRequest` when the
    /// result would not be a valid tree.
    pub fn insert_before(
        &self,
        child: &NativeNode,
        reference: Option<&NativeNode>,
    ) -> Result<NativeNode, EngineError> {
        if !self.same_tree(child) {
            return Err(EngineError::WrongDocument(
                "the node belongs to a different document".to_string(),
            ));
        }
        let mut tree = self.tree.borrow_mut();
        let reference = match reference {
            Some(r) if !self.same_tree(r) || tree.parent(r.id) != Some(self.id) => {
                return Err(EngineError::NotFound(
                    "the reference node is not a child of this node".to_string(),
                ));
            }
            Some(r) => Some(r.id),
            None => None,
        };
        check_insertion(&tree, self.id, child.id, None)?;
        insert_node(&mut tree, self.id, child.id, reference);
        Ok(child.clone())
    }

    /// `removeChild`.
    ///
    /// # Errors
    ///
    /// `NotFound` when `child` is not a child of this node.
    pub fn remove_child(&self, child: &NativeNode) -> Result<NativeNode, EngineError> {
        let mut tree = self.tree.borrow_mut();
        if !self.same_tree(child) || tree.parent(child.id) != Some(self.id) {
            return Err(EngineError::NotFound(
                "the node to remove is not a child of this node".to_string(),
            ));
        }
        tree.detach(child.id);
        Ok(child.clone())
    }

    /// `replaceChild`. Returns the replaced node.
    ///
    /// # Errors
    ///
    /// As for [`insert_before`](Self::insert_before), with `NotFound` when
    /// `old` is not a child of this node.
    pub fn replace_child(
        &self,
        new: &NativeNode,
        old: &NativeNode,
    ) -> Result<NativeNode, EngineError> {
        if !self.same_tree(new) {
            return Err(EngineError::WrongDocument(
                "the node belongs to a different document".to_string(),
            ));
        }
        let mut tree = self.tree.borrow_mut();
        if !self.same_tree(old) || tree.parent(old.id) != Some(self.id) {
            return Err(EngineError::NotFound(
                "the node to replace is not a child of this node".to_string(),
            ));
        }
        if new.id == old.id {
            return Ok(old.clone());
        }
        check_insertion(&tree, self.id, new.id, Some(old.id))?;
        let mut reference = tree.next_sibling(old.id);
        if reference == Some(new.id) {
            reference = tree.next_sibling(new.id);
        }
        tree.detach(old.id);
        insert_node(&mut tree, self.id, new.id, reference);
        Ok(old.clone())
    }

    /// `cloneNode`. Cloning a document yields a new document; every other
    /// clone is a detached node of this node's document.
    #[must_use]
    pub fn clone_node(&self, deep: bool) -> NativeNode {
        let tree = self.tree.borrow();
        let snapshot = Snapshot::capture(&tree, self.id, deep);
        if snapshot.is_document() {
            let mut copy = Tree::new();
            copy.version.clone_from(&tree.version);
            copy.encoding.clone_from(&tree.encoding);
            copy.standalone = tree.standalone;
            let root = copy.root();
            snapshot.materialize_children(&mut copy, root);
            return NativeNode::from_tree(copy);
        }
        drop(tree);
        let id = snapshot.materialize(&mut self.tree.borrow_mut());
        self.with(id)
    }

    /// Merges adjacent text nodes and drops empty ones throughout the subtree.
    pub fn normalize(&self) {
        let mut tree = self.tree.borrow_mut();
        let containers: Vec<NodeId> = std::iter::once(self.id)
            .chain(tree.descendants(self.id))
            .filter(|&id| tree.first_child(id).is_some())
            .collect();
        for container in containers {
            let mut cursor = tree.first_child(container);
            while let Some(current) = cursor {
                if !matches!(tree.node(current).kind, NodeKind::Text { .. }) {
                    cursor = tree.next_sibling(current);
                    continue;
                }
                while let Some(next) = tree.next_sibling(current) {
                    let NodeKind::Text { content } = &tree.node(next).kind else {
                        break;
                    };
                    let tail = content.clone();
                    if let NodeKind::Text { content } = &mut tree.node_mut(current).kind {
                        content.push_str(&tail);
                    }
                    tree.detach(next);
                }
                cursor = tree.next_sibling(current);
                if matches!(&tree.node(current).kind, NodeKind::Text { content } if content.is_empty())
                {
                    tree.detach(current);
                }
            }
        }
    }

    /// Serializes this node and its subtree.
    #[must_use]
    pub fn to_xml_string(&self) -> String {
        serializer::serialize(&self.tree.borrow(), self.id)
    }

    // --- Attributes ---

    #[must_use]
    pub fn attribute_count(&self) -> usize {
        self.tree.borrow().attribute_ids(self.id).len()
    }

    #[must_use]
    pub fn attribute_at(&self, index: usize) -> Option<NativeNode> {
        let attr = self.tree.borrow().attribute_ids(self.id).get(index).copied();
        attr.map(|id| self.with(id))
    }

    /// The attribute node with qualified name `name`.
    #[must_use]
    pub fn named_attribute(&self, name: &str) -> Option<NativeNode> {
        let tree = self.tree.borrow();
        find_attribute(&tree, self.id, name).map(|id| self.with(id))
    }

    /// The value of attribute `name`.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<String> {
        let tree = self.tree.borrow();
        find_attribute(&tree, self.id, name).and_then(|id| match &tree.node(id).kind {
            NodeKind::Attribute { value, .. } => Some(value.clone()),
            _ => None,
        })
    }

    /// `setAttribute`.
    ///
    /// # Errors
    ///
    /// `InvalidCharacter` for an invalid name, `NotSupported` on a
    /// non-element.
    pub fn set_attribute(&self, name: &str, value: &str) -> Result<(), EngineError> {
        check_name(name)?;
        let mut tree = self.tree.borrow_mut();
        if !matches!(tree.node(self.id).kind, NodeKind::Element { .. }) {
            return Err(EngineError::NotSupported(
                "only elements carry attributes".to_string(),
            ));
        }
        if let Some(existing) = find_attribute(&tree, self.id, name) {
            if let NodeKind::Attribute { value: v, .. } = &mut tree.node_mut(existing).kind {
                *v = value.to_string();
            }
            return Ok(());
        }
        let attr = tree.create_node(NodeKind::Attribute {
            name: name.to_string(),
            namespace: implied_attribute_namespace(name),
            value: value.to_string(),
            owner: Some(self.id),
        });
        if let NodeKind::Element { attributes, .. } = &mut tree.node_mut(self.id).kind {
            attributes.push(attr);
        }
        Ok(())
    }

    /// `removeAttribute`. Removing an absent attribute does nothing.
    pub fn remove_attribute(&self, name: &str) {
        let mut tree = self.tree.borrow_mut();
        if let Some(attr) = find_attribute(&tree, self.id, name) {
            detach_attribute(&mut tree, self.id, attr);
        }
    }

    /// `NamedNodeMap.setNamedItem`. Returns the attribute it replaced.
    ///
    /// # Errors
    ///
    /// `NotSupported` on a non-element, `HierarchyRequest` for a
    /// non-attribute, `WrongDocument` for an attribute of another tree and
    /// `InUseAttribute` when another element owns it.
    pub fn set_named_item(&self, attr: &NativeNode) -> Result<Option<NativeNode>, EngineError> {
        if !self.same_tree(attr) {
            return Err(EngineError::WrongDocument(
                "the attribute belongs to a different document".to_string(),
            ));
        }
        let mut tree = self.tree.borrow_mut();
        if !matches!(tree.node(self.id).kind, NodeKind::Element { .. }) {
            return Err(EngineError::NotSupported(
                "only elements carry attributes".to_string(),
            ));
        }
        let (name, owner) = match &tree.node(attr.id).kind {
            NodeKind::Attribute { name, owner, .. } => (name.clone(), *owner),
            _ => {
                return Err(EngineError::HierarchyRequest(
                    "only attributes can be stored in an attribute map".to_string(),
                ));
            }
        };
        match owner {
            Some(owner) if owner == self.id => return Ok(Some(attr.clone())),
            Some(_) => {
                return Err(EngineError::InUseAttribute(format!(
                    "attribute '{name}' is in use by another element"
                )));
            }
            None => {}
        }

        let replaced = find_attribute(&tree, self.id, &name);
        if let NodeKind::Attribute { owner, .. } = &mut tree.node_mut(attr.id).kind {
            *owner = Some(self.id);
        }
        if let Some(old) = replaced {
            if let NodeKind::Attribute { owner, .. } = &mut tree.node_mut(old).kind {
                *owner = None;
            }
        }
        if let NodeKind::Element { attributes, .. } = &mut tree.node_mut(self.id).kind {
            match replaced.and_then(|old| attributes.iter().position(|&a| a == old)) {
                Some(pos) => attributes[pos] = attr.id,
                None => attributes.push(attr.id),
            }
        }
        Ok(replaced.map(|id| self.with(id)))
    }

    /// `NamedNodeMap.removeNamedItem`. Returns the removed attribute.
    ///
    /// # Errors
    ///
    /// `NotFound` when no attribute has that name.
    pub fn remove_named_item(&self, name: &str) -> Result<NativeNode, EngineError> {
        let mut tree = self.tree.borrow_mut();
        let attr = find_attribute(&tree, self.id, name)
            .ok_or_else(|| EngineError::NotFound(format!("no attribute named '{name}'")))?;
        detach_attribute(&mut tree, self.id, attr);
        Ok(self.with(attr))
    }

    /// The element an attribute is attached to.
    #[must_use]
    pub fn owner_element(&self) -> Option<NativeNode> {
        let owner = match &self.tree.borrow().node(self.id).kind {
            NodeKind::Attribute { owner, .. } => *owner,
            _ => None,
        };
        owner.map(|id| self.with(id))
    }

    // --- Character data and PI data ---

    /// Text of a character-data node, data of a PI, value of an attribute.
    #[must_use]
    pub fn data(&self) -> String {
        self.node_value().unwrap_or_default()
    }

    /// Replaces the whole data buffer.
    ///
    /// # Errors
    ///
    /// `NotSupported` for nodes without a data buffer.
    pub fn set_data(&self, data: &str) -> Result<(), EngineError> {
        let mut tree = self.tree.borrow_mut();
        let buffer = data_buffer(&mut tree, self.id)?;
        *buffer = data.to_string();
        Ok(())
    }

    /// Length of the data in characters.
    #[must_use]
    pub fn data_length(&self) -> usize {
        self.data().chars().count()
    }

    /// `substringData`. `count` is clamped to the end of the data.
    ///
    /// # Errors
    ///
    /// `IndexSize` when `offset` is past the end.
    pub fn substring_data(&self, offset: usize, count: usize) -> Result<String, EngineError> {
        let data = self.data();
        let (start, end) = char_range(&data, offset, count)?;
        Ok(data[start..end].to_string())
    }

    /// `replaceData`; `appendData`, `insertData` and `deleteData` are
    /// special cases of it.
    ///
    /// # Errors
    ///
    /// `IndexSize` when `offset` is past the end, `NotSupported` for nodes
    /// without a data buffer.
    pub fn replace_data(&self, offset: usize, count: usize, data: &str) -> Result<(), EngineError> {
        let mut tree = self.tree.borrow_mut();
        let buffer = data_buffer(&mut tree, self.id)?;
        let (start, end) = char_range(buffer, offset, count)?;
        buffer.replace_range(start..end, data);
        Ok(())
    }

    /// `splitText`. The tail moves to a new sibling of the same kind, which
    /// is returned.
    ///
    /// # Errors
    ///
    /// `IndexSize` when `offset` is past the end, `NotSupported` for nodes
    /// that are not text or CDATA.
    pub fn split_text(&self, offset: usize) -> Result<NativeNode, EngineError> {
        let mut tree = self.tree.borrow_mut();
        let tail_kind = match &mut tree.node_mut(self.id).kind {
            NodeKind::Text { content } => {
                let (start, _) = char_range(content, offset, 0)?;
                NodeKind::Text {
                    content: content.split_off(start),
                }
            }
            NodeKind::CData { content } => {
                let (start, _) = char_range(content, offset, 0)?;
                NodeKind::CData {
                    content: content.split_off(start),
                }
            }
            _ => {
                return Err(EngineError::NotSupported(
                    "only text nodes can be split".to_string(),
                ));
            }
        };
        let tail = tree.create_node(tail_kind);
        if let Some(parent) = tree.parent(self.id) {
            match tree.next_sibling(self.id) {
                Some(next) => tree.insert_before(next, tail),
                None => tree.append_child(parent, tail),
            }
        }
        Ok(self.with(tail))
    }

    /// The target of a processing instruction.
    #[must_use]
    pub fn target(&self) -> Option<String> {
        match &self.tree.borrow().node(self.id).kind {
            NodeKind::ProcessingInstruction { target, .. } => Some(target.clone()),
            _ => None,
        }
    }

    // --- Document operations ---

    fn create(&self, kind: NodeKind) -> NativeNode {
        let id = self.tree.borrow_mut().create_node(kind);
        self.with(id)
    }

    /// `createElement`. The element has no namespace.
    ///
    /// # Errors
    ///
    /// `InvalidCharacter` for an invalid name.
    pub fn create_element(&self, name: &str) -> Result<NativeNode, EngineError> {
        check_name(name)?;
        Ok(self.create(NodeKind::Element {
            name: name.to_string(),
            namespace: None,
            attributes: Vec::new(),
        }))
    }

    /// `createElementNS`.
    ///
    /// # Errors
    ///
    /// `InvalidCharacter` for an invalid qualified name or a prefix without
    /// a namespace.
    pub fn create_element_ns(
        &self,
        namespace: Option<&str>,
        qualified_name: &str,
    ) -> Result<NativeNode, EngineError> {
        check_name(qualified_name)?;
        if let Some(msg) = validate_qname(qualified_name) {
            return Err(EngineError::InvalidCharacter(format!(
                "{msg}: '{qualified_name}'"
            )));
        }
        let namespace = namespace.filter(|ns| !ns.is_empty());
        if split_qname(qualified_name).0.is_some() && namespace.is_none() {
            return Err(EngineError::InvalidCharacter(format!(
                "prefixed name '{qualified_name}' requires a namespace"
            )));
        }
        Ok(self.create(NodeKind::Element {
            name: qualified_name.to_string(),
            namespace: namespace.map(str::to_string),
            attributes: Vec::new(),
        }))
    }

    #[must_use]
    pub fn create_text_node(&self, data: &str) -> NativeNode {
        self.create(NodeKind::Text {
            content: data.to_string(),
        })
    }

    #[must_use]
    pub fn create_comment(&self, data: &str) -> NativeNode {
        self.create(NodeKind::Comment {
            content: data.to_string(),
        })
    }

    /// `createCDATASection`.
    ///
    /// # Errors
    ///
    /// `InvalidCharacter` when `data` contains `]]>`.
    pub fn create_cdata_section(&self, data: &str) -> Result<NativeNode, EngineError> {
        if data.contains("]]>") {
            return Err(EngineError::InvalidCharacter(
                "CDATA section data must not contain ']]>'".to_string(),
            ));
        }
        Ok(self.create(NodeKind::CData {
            content: data.to_string(),
        }))
    }

    /// `createProcessingInstruction`.
    ///
    /// # Errors
    ///
    /// `InvalidCharacter` for an invalid target or data containing `?>`.
    pub fn create_processing_instruction(
        &self,
        target: &str,
        data: &str,
    ) -> Result<NativeNode, EngineError> {
        check_name(target)?;
        if data.contains("?>") {
            return Err(EngineError::InvalidCharacter(
                "processing instruction data must not contain '?>'".to_string(),
            ));
        }
        Ok(self.create(NodeKind::ProcessingInstruction {
            target: target.to_string(),
            data: data.to_string(),
        }))
    }

    #[must_use]
    pub fn create_document_fragment(&self) -> NativeNode {
        self.create(NodeKind::DocumentFragment)
    }

    /// `createAttribute`. The attribute starts detached with an empty value.
    ///
    /// # Errors
    ///
    /// `InvalidCharacter` for an invalid name.
    pub fn create_attribute(&self, name: &str) -> Result<NativeNode, EngineError> {
        check_name(name)?;
        Ok(self.create(NodeKind::Attribute {
            name: name.to_string(),
            namespace: implied_attribute_namespace(name),
            value: String::new(),
            owner: None,
        }))
    }

    /// The first element child of this node's document.
    #[must_use]
    pub fn document_element(&self) -> Option<NativeNode> {
        let element = self.tree.borrow().document_element();
        element.map(|id| self.with(id))
    }

    /// First element in document order with an `id` or `xml:id`
    /// attribute equal to `id`.
    #[must_use]
    pub fn element_by_id(&self, id: &str) -> Option<NativeNode> {
        let tree = self.tree.borrow();
        let root = tree.root();
        tree.descendants(root)
            .find(|&node| {
                ["id", "xml:id"].iter().any(|name| {
                    find_attribute(&tree, node, name).is_some_and(|attr| {
                        matches!(&tree.node(attr).kind, NodeKind::Attribute { value, .. } if value == id)
                    })
                })
            })
            .map(|node| self.with(node))
    }

    /// Descendant elements of this node matching `name` (`*` matches all),
    /// in document order.
    #[must_use]
    pub fn elements_by_tag_name(&self, name: &str, mode: NameMatch) -> Vec<NativeNode> {
        let tree = self.tree.borrow();
        tree.descendants(self.id)
            .filter(|&id| match &tree.node(id).kind {
                NodeKind::Element { name: qname, .. } => {
                    name == "*"
                        || match mode {
                            NameMatch::Qualified => qname == name,
                            NameMatch::Local => local_name(qname) == name,
                        }
                }
                _ => false,
            })
            .map(|id| self.with(id))
            .collect()
    }

    /// `importNode`: copies `node` (and its subtree when `deep`) into this
    /// node's document. The copy starts detached.
    ///
    /// # Errors
    ///
    /// `NotSupported` when `node` is a document.
    pub fn import_node(&self, node: &NativeNode, deep: bool) -> Result<NativeNode, EngineError> {
        let snapshot = {
            let source = node.tree.borrow();
            if matches!(source.node(node.id).kind, NodeKind::Document) {
                return Err(EngineError::NotSupported(
                    "documents cannot be imported".to_string(),
                ));
            }
            Snapshot::capture(&source, node.id, deep)
        };
        let id = snapshot.materialize(&mut self.tree.borrow_mut());
        Ok(self.with(id))
    }
}

// -------------------------------------------------------------------------
// Helpers
// -------------------------------------------------------------------------

fn check_name(name: &str) -> Result<(), EngineError> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(EngineError::InvalidCharacter(format!(
            "'{name}' is not a valid XML name"
        )))
    }
}

fn implied_attribute_namespace(name: &str) -> Option<String> {
    match split_qname(name) {
        (Some("xml"), _) => Some(XML_NAMESPACE.to_string()),
        (Some("xmlns"), _) | (None, "xmlns") => Some(XMLNS_NAMESPACE.to_string()),
        _ => None,
    }
}

fn find_attribute(tree: &Tree, element: NodeId, name: &str) -> Option<NodeId> {
    tree.attribute_ids(element).iter().copied().find(|&id| {
        matches!(&tree.node(id).kind, NodeKind::Attribute { name: n, .. } if n == name)
    })
}

fn detach_attribute(tree: &mut Tree, element: NodeId, attr: NodeId) {
    if let NodeKind::Element { attributes, .. } = &mut tree.node_mut(element).kind {
        attributes.retain(|&a| a != attr);
    }
    if let NodeKind::Attribute { owner, .. } = &mut tree.node_mut(attr).kind {
        *owner = None;
    }
}

fn data_buffer(tree: &mut Tree, id: NodeId) -> Result<&mut String, EngineError> {
    match &mut tree.node_mut(id).kind {
        NodeKind::Text { content } | NodeKind::CData { content } | NodeKind::Comment { content } => {
            Ok(content)
        }
        NodeKind::ProcessingInstruction { data, .. } => Ok(data),
        _ => Err(EngineError::NotSupported(
            "node has no character data".to_string(),
        )),
    }
}

/// Maps a character offset and count onto byte indices of `s`, clamping
/// the count at the end.
fn char_range(s: &str, offset: usize, count: usize) -> Result<(usize, usize), EngineError> {
    let length = s.chars().count();
    if offset > length {
        return Err(EngineError::IndexSize(format!(
            "offset {offset} is past the end of data of length {length}"
        )));
    }
    let byte_at = |chars: usize| s.char_indices().nth(chars).map_or(s.len(), |(i, _)| i);
    Ok((byte_at(offset), byte_at(offset.saturating_add(count).min(length))))
}

/// DOM pre-insertion validity. `replacing` names a child about to be
/// removed, so it does not count against the document's limits.
fn check_insertion(
    tree: &Tree,
    parent: NodeId,
    child: NodeId,
    replacing: Option<NodeId>,
) -> Result<(), EngineError> {
    let parent_kind = &tree.node(parent).kind;
    let parent_is_document = matches!(parent_kind, NodeKind::Document);
    if !matches!(
        parent_kind,
        NodeKind::Document | NodeKind::DocumentFragment | NodeKind::Element { .. }
    ) {
        return Err(EngineError::HierarchyRequest(
            "this node type cannot have children".to_string(),
        ));
    }
    if tree.ancestors(parent).any(|id| id == child) {
        return Err(EngineError::HierarchyRequest(
            "the new child is an ancestor of the parent".to_string(),
        ));
    }

    let child_kind = &tree.node(child).kind;
    match child_kind {
        NodeKind::Document => {
            return Err(EngineError::HierarchyRequest(
                "a document cannot be inserted".to_string(),
            ));
        }
        NodeKind::Attribute { .. } => {
            return Err(EngineError::HierarchyRequest(
                "attributes are not children".to_string(),
            ));
        }
        NodeKind::DocumentType { .. } if !parent_is_document => {
            return Err(EngineError::HierarchyRequest(
                "a doctype can only be a child of a document".to_string(),
            ));
        }
        _ => {}
    }
    if !parent_is_document {
        return Ok(());
    }

    let incoming: Vec<NodeId> = match child_kind {
        NodeKind::DocumentFragment => tree.children(child).collect(),
        _ => vec![child],
    };
    let existing: Vec<NodeId> = tree
        .children(parent)
        .filter(|&id| Some(id) != replacing && id != child)
        .collect();
    let count = |ids: &[NodeId], pred: fn(&NodeKind) -> bool| {
        ids.iter().filter(|&&id| pred(&tree.node(id).kind)).count()
    };

    if count(&incoming, is_text) > 0 {
        return Err(EngineError::HierarchyRequest(
            "text cannot be a child of a document".to_string(),
        ));
    }
    if count(&incoming, is_element) + count(&existing, is_element) > 1 {
        return Err(EngineError::HierarchyRequest(
            "a document can have only one document element".to_string(),
        ));
    }
    if count(&incoming, is_doctype) + count(&existing, is_doctype) > 1 {
        return Err(EngineError::HierarchyRequest(
            "a document can have only one doctype".to_string(),
        ));
    }
    Ok(())
}

fn is_element(kind: &NodeKind) -> bool {
    matches!(kind, NodeKind::Element { .. })
}

fn is_doctype(kind: &NodeKind) -> bool {
    matches!(kind, NodeKind::DocumentType { .. })
}

fn is_text(kind: &NodeKind) -> bool {
    matches!(kind, NodeKind::Text { .. } | NodeKind::CData { .. })
}

/// Moves `child` (or a fragment's children) under `parent`, before
/// `reference` or at the end.
fn insert_node(tree: &mut Tree, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
    let reference = if reference == Some(child) {
        tree.next_sibling(child)
    } else {
        reference
    };
    let nodes: Vec<NodeId> = match tree.node(child).kind {
        NodeKind::DocumentFragment => tree.children(child).collect(),
        _ => vec![child],
    };
    for node in nodes {
        tree.detach(node);
        match reference {
            Some(r) => tree.insert_before(r, node),
            None => tree.append_child(parent, node),
        }
    }
}

/// An owned copy of a subtree, used to clone within a tree or import
/// across trees without holding two borrows at once. Descendants are kept
/// in document order with the index of their parent (0 is `root`).
struct Snapshot {
    root: Entry,
    descendants: Vec<(usize, Entry)>,
}

struct Entry {
    kind: NodeKind,
    attributes: Vec<NodeKind>,
}

impl Entry {
    fn capture(tree: &Tree, id: NodeId) -> Self {
        let mut kind = tree.node(id).kind.clone();
        match &mut kind {
            NodeKind::Element { attributes, .. } => attributes.clear(),
            NodeKind::Attribute { owner, .. } => *owner = None,
            _ => {}
        }
        let attributes = tree
            .attribute_ids(id)
            .iter()
            .map(|&attr| tree.node(attr).kind.clone())
            .collect();
        Self { kind, attributes }
    }

    fn materialize(self, tree: &mut Tree) -> NodeId {
        let id = tree.create_node(self.kind);
        let mut attribute_ids = Vec::with_capacity(self.attributes.len());
        for mut kind in self.attributes {
            if let NodeKind::Attribute { owner, .. } = &mut kind {
                *owner = Some(id);
            }
            attribute_ids.push(tree.create_node(kind));
        }
        if let NodeKind::Element { attributes, .. } = &mut tree.node_mut(id).kind {
            *attributes = attribute_ids;
        }
        id
    }
}

impl Snapshot {
    fn capture(tree: &Tree, id: NodeId, deep: bool) -> Self {
        let root = Entry::capture(tree, id);
        let mut descendants = Vec::new();
        if deep {
            let mut pending: Vec<(usize, NodeId)> = Vec::new();
            queue_children(tree, id, 0, &mut pending);
            while let Some((parent, node)) = pending.pop() {
                descendants.push((parent, Entry::capture(tree, node)));
                queue_children(tree, node, descendants.len(), &mut pending);
            }
        }
        Self { root, descendants }
    }

    fn is_document(&self) -> bool {
        matches!(self.root.kind, NodeKind::Document)
    }

    fn materialize(self, tree: &mut Tree) -> NodeId {
        let id = self.root.materialize(tree);
        attach_descendants(self.descendants, tree, id);
        id
    }

    /// Materializes only the descendants, under an existing `parent`.
    fn materialize_children(self, tree: &mut Tree, parent: NodeId) {
        attach_descendants(self.descendants, tree, parent);
    }
}

fn queue_children(tree: &Tree, id: NodeId, index: usize, pending: &mut Vec<(usize, NodeId)>) {
    let children: Vec<NodeId> = tree.children(id).collect();
    pending.extend(children.into_iter().rev().map(|child| (index, child)));
}

fn attach_descendants(descendants: Vec<(usize, Entry)>, tree: &mut Tree, root: NodeId) {
    let mut ids = Vec::with_capacity(descendants.len() + 1);
    ids.push(root);
    for (parent, entry) in descendants {
        let id = entry.materialize(tree);
        tree.append_child(ids[parent], id);
        ids.push(id);
    }
}
