use std::fmt;

use crate::engine::{NameMatch, NativeNode};

use super::{DomNode, Node};

/// Index-addressed, live access to a sequence of nodes.
pub trait NodeCollection {
    /// The current number of nodes.
    fn length(&self) -> usize;

    /// The node at `index`, if in range.
    fn get(&self, index: usize) -> Option<Node>;

    /// DOM-style `item`: negative and out-of-range indices yield `None`.
    fn item(&self, index: isize) -> Option<Node> {
        usize::try_from(index).ok().and_then(|i| self.get(i))
    }

    fn is_empty(&self) -> bool {
        self.length() == 0
    }

    /// The nodes currently in the collection, in order.
    fn nodes(&self) -> Vec<Node> {
        (0..self.length()).filter_map(|i| self.get(i)).collect()
    }
}

/// Iterator over the nodes a [`NodeCollection`] held when iteration began.
/// Later mutations do not affect it; use `item` for live reads.
#[derive(Debug)]
pub struct Items {
    nodes: std::vec::IntoIter<Node>,
}

impl Items {
    pub(crate) fn new<C: NodeCollection + ?Sized>(collection: &C) -> Self {
        Self {
            nodes: collection.nodes().into_iter(),
        }
    }
}

impl Iterator for Items {
    type Item = Node;

    fn next(&mut self) -> Option<Node> {
        self.nodes.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.nodes.size_hint()
    }
}

impl ExactSizeIterator for Items {}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    Children(NativeNode),
    ElementsByTagName {
        root: NativeNode,
        name: String,
        mode: NameMatch,
    },
}

/// A live list of nodes: the children of a node, or the result of a
/// tag-name query that is re-run on every access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeList {
    source: Source,
}

impl NodeList {
    pub(crate) fn children(parent: NativeNode) -> Self {
        Self {
            source: Source::Children(parent),
        }
    }

    pub(crate) fn elements_by_tag_name(root: NativeNode, name: &str, mode: NameMatch) -> Self {
        Self {
            source: Source::ElementsByTagName {
                root,
                name: name.to_string(),
                mode,
            },
        }
    }

    #[must_use]
    pub fn iter(&self) -> Items {
        Items::new(self)
    }
}

impl NodeCollection for NodeList {
    fn length(&self) -> usize {
        match &self.source {
            Source::Children(parent) => parent.child_count(),
            Source::ElementsByTagName { root, name, mode } => {
                root.elements_by_tag_name(name, *mode).len()
            }
        }
    }

    fn get(&self, index: usize) -> Option<Node> {
        let native = match &self.source {
            Source::Children(parent) => parent.child_at(index),
            Source::ElementsByTagName { root, name, mode } => {
                root.elements_by_tag_name(name, *mode).into_iter().nth(index)
            }
        };
        Node::build(native)
    }

    fn nodes(&self) -> Vec<Node> {
        let natives = match &self.source {
            Source::Children(parent) => parent.children(),
            Source::ElementsByTagName { root, name, mode } => {
                root.elements_by_tag_name(name, *mode)
            }
        };
        natives.into_iter().map(Node::wrap).collect()
    }
}

impl<'a> IntoIterator for &'a NodeList {
    type Item = Node;
    type IntoIter = Items;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for NodeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in self {
            f.write_str(&node.to_xml_string())?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dom::Document;
    use crate::engine::{parse_from_string, ParseOptions};
    use pretty_assertions::assert_eq;

    fn parse(text: &str) -> Document {
        Document::from_native(parse_from_string(text, &ParseOptions::default()))
    }

    #[test]
    fn test_item_bounds() {
        let doc = parse("<r><a/><b/><c/></r>");
        let list = doc.document_element().unwrap().child_nodes();
        assert_eq!(list.length(), 3);
        assert_eq!(list.item(-1), None);
        assert_eq!(list.item(3), None);
        assert_eq!(list.item(isize::MAX), None);
        assert_eq!(list.item(0).unwrap().node_name(), "a");
        assert_eq!(list.item(2).unwrap().node_name(), "c");
    }

    #[test]
    fn test_child_list_is_live() {
        let doc = parse("<r><a/></r>");
        let r = doc.document_element().unwrap();
        let list = r.child_nodes();
        assert_eq!(list.length(), 1);
        r.append_child(&doc.create_element("b").unwrap()).unwrap();
        assert_eq!(list.length(), 2);
        assert_eq!(list.item(1).unwrap().node_name(), "b");
    }

    #[test]
    fn test_tag_name_list_is_live() {
        let doc = parse("<r><x/><y><x/></y></r>");
        let list = doc.elements_by_tag_name("x");
        assert_eq!(list.length(), 2);
        let y = doc.document_element().unwrap().last_child().unwrap();
        y.append_child(&doc.create_element("x").unwrap()).unwrap();
        assert_eq!(list.length(), 3);
    }

    #[test]
    fn test_iter_and_display() {
        let doc = parse("<r><a/>t<!--c--></r>");
        let list = doc.document_element().unwrap().child_nodes();
        let names: Vec<String> = list.iter().map(|n| n.node_name()).collect();
        assert_eq!(names, vec!["a", "#text", "#comment"]);
        assert_eq!(list.to_string(), "<a/>t<!--c-->");
        assert!(!list.is_empty());
    }

    #[test]
    fn test_iteration_sees_the_list_as_it_was() {
        let doc = parse("<r><a/><b/></r>");
        let r = doc.document_element().unwrap();
        let list = r.child_nodes();
        let mut items = list.iter();
        assert_eq!(items.len(), 2);
        r.remove_child(&items.next().unwrap()).unwrap();
        assert_eq!(items.next().unwrap().node_name(), "b");
        assert_eq!(items.next(), None);
        assert_eq!(list.length(), 1);
    }

    #[test]
    fn test_iterating_a_tag_name_list() {
        let doc = parse("<r><x i=\"1\"/><y><x i=\"2\"/></y><x i=\"3\"/></r>");
        let ids: Vec<String> = doc
            .elements_by_tag_name("x")
            .iter()
            .filter_map(|n| n.as_element().and_then(|e| e.attribute("i")))
            .collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_iterating_many_children() {
        let doc = parse("<r/>");
        let r = doc.document_element().unwrap();
        for _ in 0..20_000 {
            r.append_child(&doc.create_element("c").unwrap()).unwrap();
        }
        assert_eq!(r.child_nodes().iter().count(), 20_000);
        assert_eq!(r.child_nodes().nodes().len(), 20_000);
    }
}
