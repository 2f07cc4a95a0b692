//! The engine's `XMLSerializer`.
//!
//! Output follows browser conventions. There is no pretty printing,
//! childless elements close as `<a/>`, and a document only gets an XML
//! declaration when the parsed input carried one.
//!
//! Namespaces are fixed up on the way out. An element or attribute whose
//! namespace is not declared by an in-scope `xmlns` attribute gets the
//! declaration it needs, so serializing a detached subtree still yields
//! namespace-well-formed XML.

use super::names::{split_qname, XMLNS_NAMESPACE, XML_NAMESPACE};
use super::tree::{NodeId, NodeKind, Tree};

/// Serializes `id` and its subtree.
#[must_use]
pub fn serialize(tree: &Tree, id: NodeId) -> String {
    let mut out = String::new();
    let mut scope = NamespaceScope::default();
    let mut pending = vec![Step::Open(id)];
    while let Some(step) = pending.pop() {
        match step {
            Step::Open(id) => write_node(tree, id, &mut out, &mut scope, &mut pending),
            Step::Close(id) => {
                if let NodeKind::Element { name, .. } = &tree.node(id).kind {
                    out.push_str("</");
                    out.push_str(name);
                    out.push('>');
                }
                scope.pop_frame();
            }
        }
    }
    out
}

/// Work left on the explicit traversal stack.
enum Step {
    Open(NodeId),
    Close(NodeId),
}

/// In-scope prefix bindings while walking down the tree. Bindings live in
/// one flat list; each open element remembers where its own start.
#[derive(Default)]
struct NamespaceScope {
    bindings: Vec<(Option<String>, String)>,
    frames: Vec<usize>,
}

impl NamespaceScope {
    fn push_frame(&mut self) {
        self.frames.push(self.bindings.len());
    }

    fn pop_frame(&mut self) {
        if let Some(start) = self.frames.pop() {
            self.bindings.truncate(start);
        }
    }

    fn lookup(&self, prefix: Option<&str>) -> Option<&str> {
        if prefix == Some("xml") {
            return Some(XML_NAMESPACE);
        }
        self.bindings
            .iter()
            .rev()
            .find(|(p, _)| p.as_deref() == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    fn is_bound(&self, prefix: Option<&str>, uri: &str) -> bool {
        self.lookup(prefix) == Some(uri)
    }

    fn bind(&mut self, prefix: Option<&str>, uri: &str) {
        self.bindings
            .push((prefix.map(str::to_string), uri.to_string()));
    }
}

/// Queues the children of `id` so the first child is popped next.
fn push_children(tree: &Tree, id: NodeId, pending: &mut Vec<Step>) {
    let children: Vec<NodeId> = tree.children(id).collect();
    pending.extend(children.into_iter().rev().map(Step::Open));
}

fn write_node(
    tree: &Tree,
    id: NodeId,
    out: &mut String,
    scope: &mut NamespaceScope,
    pending: &mut Vec<Step>,
) {
    match &tree.node(id).kind {
        NodeKind::Document => {
            if let Some(version) = &tree.version {
                write_xml_decl(tree, version, out);
            }
            push_children(tree, id, pending);
        }
        NodeKind::DocumentFragment => push_children(tree, id, pending),
        NodeKind::Element {
            name,
            namespace,
            attributes,
        } => {
            write_start_tag(tree, name, namespace.as_deref(), attributes, out, scope);
            if tree.first_child(id).is_none() {
                out.push_str("/>");
                scope.pop_frame();
            } else {
                out.push('>');
                pending.push(Step::Close(id));
                push_children(tree, id, pending);
            }
        }
        NodeKind::Attribute { value, .. } => write_escaped_attr(out, value),
        NodeKind::Text { content } => write_escaped_text(out, content),
        NodeKind::CData { content } => {
            out.push_str("<![CDATA[");
            out.push_str(content);
            out.push_str("]]>");
        }
        NodeKind::Comment { content } => {
            out.push_str("<!--");
            out.push_str(content);
            out.push_str("-->");
        }
        NodeKind::ProcessingInstruction { target, data } => {
            out.push_str("<?");
            out.push_str(target);
            if !data.is_empty() {
                out.push(' ');
                out.push_str(data);
            }
            out.push_str("?>");
        }
        NodeKind::DocumentType {
            name,
            public_id,
            system_id,
        } => {
            out.push_str("<!DOCTYPE ");
            out.push_str(name);
            match (public_id, system_id) {
                (Some(pub_id), sys_id) => {
                    out.push_str(" PUBLIC ");
                    write_quoted_literal(out, pub_id);
                    if let Some(sys_id) = sys_id {
                        out.push(' ');
                        write_quoted_literal(out, sys_id);
                    }
                }
                (None, Some(sys_id)) => {
                    out.push_str(" SYSTEM ");
                    write_quoted_literal(out, sys_id);
                }
                (None, None) => {}
            }
            out.push('>');
        }
    }
}

/// Writes a DOCTYPE literal. Literals have no escapes, so one containing a
/// double quote is wrapped in single quotes.
fn write_quoted_literal(out: &mut String, literal: &str) {
    let quote = if literal.contains('"') { '\'' } else { '"' };
    out.push(quote);
    out.push_str(literal);
    out.push(quote);
}

fn write_xml_decl(tree: &Tree, version: &str, out: &mut String) {
    out.push_str("<?xml version=\"");
    out.push_str(version);
    out.push('"');
    if let Some(encoding) = &tree.encoding {
        out.push_str(" encoding=\"");
        out.push_str(encoding);
        out.push('"');
    }
    if let Some(standalone) = tree.standalone {
        out.push_str(" standalone=\"");
        out.push_str(if standalone { "yes" } else { "no" });
        out.push('"');
    }
    out.push_str("?>\n");
}

/// Opens a namespace frame and writes `<name` with its attributes. The
/// caller closes the tag and pops the frame.
fn write_start_tag(
    tree: &Tree,
    name: &str,
    namespace: Option<&str>,
    attributes: &[NodeId],
    out: &mut String,
    scope: &mut NamespaceScope,
) {
    scope.push_frame();

    // Declarations written explicitly on this element come first.
    for &attr in attributes {
        if let NodeKind::Attribute {
            name: attr_name,
            value,
            ..
        } = &tree.node(attr).kind
        {
            if attr_name == "xmlns" {
                scope.bind(None, value);
            } else if let Some(prefix) = attr_name.strip_prefix("xmlns:") {
                scope.bind(Some(prefix), value);
            }
        }
    }

    out.push('<');
    out.push_str(name);

    let (prefix, _) = split_qname(name);
    match namespace {
        Some(uri) if !scope.is_bound(prefix, uri) && prefix != Some("xml") => {
            write_ns_decl(out, prefix, uri);
            scope.bind(prefix, uri);
        }
        None if prefix.is_none() && scope.lookup(None).is_some_and(|uri| !uri.is_empty()) => {
            write_ns_decl(out, None, "");
            scope.bind(None, "");
        }
        _ => {}
    }

    for &attr in attributes {
        let NodeKind::Attribute {
            name: attr_name,
            namespace: attr_ns,
            value,
            ..
        } = &tree.node(attr).kind
        else {
            continue;
        };
        let (attr_prefix, _) = split_qname(attr_name);
        if let (Some(p), Some(uri)) = (attr_prefix, attr_ns.as_deref()) {
            if uri != XMLNS_NAMESPACE && uri != XML_NAMESPACE && !scope.is_bound(Some(p), uri) {
                write_ns_decl(out, Some(p), uri);
                scope.bind(Some(p), uri);
            }
        }
        out.push(' ');
        out.push_str(attr_name);
        out.push_str("=\"");
        write_escaped_attr(out, value);
        out.push('"');
    }
}

fn write_ns_decl(out: &mut String, prefix: Option<&str>, uri: &str) {
    out.push_str(" xmlns");
    if let Some(p) = prefix {
        out.push(':');
        out.push_str(p);
    }
    out.push_str("=\"");
    write_escaped_attr(out, uri);
    out.push('"');
}

/// Escapes character data: `&`, `<` and `>`, plus carriage returns, which
/// a parser would otherwise fold into line feeds.
fn write_escaped_text(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#13;"),
            _ => out.push(ch),
        }
    }
}

/// Escapes an attribute value. Whitespace other than a space becomes a
/// character reference so it survives attribute-value normalization.
fn write_escaped_attr(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#9;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            _ => out.push(ch),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn element(tree: &mut Tree, name: &str, namespace: Option<&str>) -> NodeId {
        tree.create_node(NodeKind::Element {
            name: name.to_string(),
            namespace: namespace.map(str::to_string),
            attributes: vec![],
        })
    }

    fn add_attribute(tree: &mut Tree, owner: NodeId, name: &str, value: &str) {
        let attr = tree.create_node(NodeKind::Attribute {
            name: name.to_string(),
            namespace: None,
            value: value.to_string(),
            owner: Some(owner),
        });
        if let NodeKind::Element { attributes, .. } = &mut tree.node_mut(owner).kind {
            attributes.push(attr);
        }
    }

    #[test]
    fn test_serialize_empty_element() {
        let mut tree = Tree::new();
        let root = tree.root();
        let a = element(&mut tree, "a", None);
        tree.append_child(root, a);
        assert_eq!(serialize(&tree, a), "<a/>");
        assert_eq!(serialize(&tree, root), "<a/>");
    }

    #[test]
    fn test_serialize_mixed_content() {
        let mut tree = Tree::new();
        let p = element(&mut tree, "p", None);
        let t = tree.create_node(NodeKind::Text {
            content: "1 < 2 & 3 > 0".to_string(),
        });
        let c = tree.create_node(NodeKind::CData {
            content: "<raw>".to_string(),
        });
        let pi = tree.create_node(NodeKind::ProcessingInstruction {
            target: "go".to_string(),
            data: String::new(),
        });
        let comment = tree.create_node(NodeKind::Comment {
            content: " note ".to_string(),
        });
        tree.append_child(p, t);
        tree.append_child(p, c);
        tree.append_child(p, pi);
        tree.append_child(p, comment);
        assert_eq!(
            serialize(&tree, p),
            "<p>1 &lt; 2 &amp; 3 &gt; 0<![CDATA[<raw>]]><?go?><!-- note --></p>"
        );
    }

    #[test]
    fn test_serialize_attribute_escaping() {
        let mut tree = Tree::new();
        let a = element(&mut tree, "a", None);
        add_attribute(&mut tree, a, "title", "say \"hi\"\t<&>\n");
        assert_eq!(
            serialize(&tree, a),
            "<a title=\"say &quot;hi&quot;&#9;&lt;&amp;&gt;&#10;\"/>"
        );
    }

    #[test]
    fn test_declared_namespace_is_not_repeated() {
        let mut tree = Tree::new();
        let r = element(&mut tree, "r", Some("urn:x"));
        add_attribute(&mut tree, r, "xmlns", "urn:x");
        let c = element(&mut tree, "c", Some("urn:x"));
        tree.append_child(r, c);
        assert_eq!(serialize(&tree, r), "<r xmlns=\"urn:x\"><c/></r>");
    }

    #[test]
    fn test_missing_namespace_declaration_is_added() {
        let mut tree = Tree::new();
        let r = element(&mut tree, "p:r", Some("urn:p"));
        assert_eq!(serialize(&tree, r), "<p:r xmlns:p=\"urn:p\"/>");
        let d = element(&mut tree, "d", Some("urn:d"));
        assert_eq!(serialize(&tree, d), "<d xmlns=\"urn:d\"/>");
    }

    #[test]
    fn test_no_namespace_child_undeclares_default() {
        let mut tree = Tree::new();
        let r = element(&mut tree, "r", Some("urn:d"));
        let c = element(&mut tree, "c", None);
        tree.append_child(r, c);
        assert_eq!(serialize(&tree, r), "<r xmlns=\"urn:d\"><c xmlns=\"\"/></r>");
    }

    #[test]
    fn test_xml_declaration_only_when_present() {
        let mut tree = Tree::new();
        let root = tree.root();
        let a = element(&mut tree, "a", None);
        tree.append_child(root, a);
        assert_eq!(serialize(&tree, root), "<a/>");
        tree.version = Some("1.0".to_string());
        tree.encoding = Some("UTF-8".to_string());
        assert_eq!(
            serialize(&tree, root),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<a/>"
        );
    }

    #[test]
    fn test_doctype_forms() {
        let mut tree = Tree::new();
        let d = tree.create_node(NodeKind::DocumentType {
            name: "html".to_string(),
            public_id: Some("-//W3C//DTD XHTML 1.0 Strict//EN".to_string()),
            system_id: Some("x.dtd".to_string()),
        });
        assert_eq!(
            serialize(&tree, d),
            "<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0 Strict//EN\" \"x.dtd\">"
        );
        let s = tree.create_node(NodeKind::DocumentType {
            name: "note".to_string(),
            public_id: None,
            system_id: Some("note.dtd".to_string()),
        });
        assert_eq!(serialize(&tree, s), "<!DOCTYPE note SYSTEM \"note.dtd\">");
    }

    #[test]
    fn test_doctype_literal_with_double_quote() {
        let mut tree = Tree::new();
        let d = tree.create_node(NodeKind::DocumentType {
            name: "r".to_string(),
            public_id: Some("a\"b".to_string()),
            system_id: Some("s".to_string()),
        });
        assert_eq!(serialize(&tree, d), "<!DOCTYPE r PUBLIC 'a\"b' \"s\">");
    }

    #[test]
    fn test_carriage_return_in_text_is_a_reference() {
        let mut tree = Tree::new();
        let p = element(&mut tree, "p", None);
        let t = tree.create_node(NodeKind::Text {
            content: "a\r\nb".to_string(),
        });
        tree.append_child(p, t);
        assert_eq!(serialize(&tree, p), "<p>a&#13;\nb</p>");
    }

    #[test]
    fn test_deep_tree_does_not_recurse() {
        let mut tree = Tree::new();
        let root = tree.root();
        let mut chain = element(&mut tree, "e", Some("urn:e"));
        for _ in 0..100_000 {
            let parent = element(&mut tree, "e", Some("urn:e"));
            tree.append_child(parent, chain);
            chain = parent;
        }
        tree.append_child(root, chain);
        let out = serialize(&tree, root);
        assert!(out.starts_with("<e xmlns=\"urn:e\"><e><e>"));
        assert!(out.ends_with("<e/></e></e>"));
        assert_eq!(out.matches("xmlns").count(), 1);
    }
}
