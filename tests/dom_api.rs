//! Wrapper behavior: identity, navigation, mutation errors and live views.

#![allow(clippy::unwrap_used)]

use std::collections::HashSet;

use pretty_assertions::assert_eq;

use xmldom::dom::{CharacterData, DomNode, Node, NodeCollection, NodeType};
use xmldom::{create_document, parse, DomErrorCode, XmlParser};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[test]
fn test_wrappers_of_one_node_are_equal_and_hash_alike() {
    let doc = parse("<r><c/></r>").unwrap();
    let root = doc.document_element().unwrap();
    let via_parent = root.first_child().unwrap().parent_node().unwrap();
    assert_eq!(via_parent, root.as_node());
    assert!(via_parent.is_same_node(&root));

    let mut set = HashSet::new();
    set.insert(root.as_node());
    set.insert(via_parent);
    assert_eq!(set.len(), 1);
}

#[test]
fn test_identical_content_is_not_identity() {
    let a = parse("<r/>").unwrap().document_element().unwrap();
    let b = parse("<r/>").unwrap().document_element().unwrap();
    assert_eq!(a.to_string(), b.to_string());
    assert_ne!(a, b);
}

#[test]
fn test_prefix() {
    let doc = parse("<ns:tag xmlns:ns=\"urn:ns\"><tag/></ns:tag>").unwrap();
    let root = doc.document_element().unwrap();
    assert_eq!(root.prefix().as_deref(), Some("ns"));
    assert_eq!(root.first_child().unwrap().prefix(), None);
}

#[test]
fn test_node_types_and_names() {
    let doc = parse("<!DOCTYPE r><r a=\"v\"><!--c--><?t d?><![CDATA[x]]>y</r>").unwrap();
    assert_eq!(doc.node_type(), NodeType::Document);
    assert_eq!(doc.node_name(), "#document");
    let doctype = doc.first_child().unwrap();
    assert!(matches!(doctype, Node::Other(_)));
    assert_eq!(doctype.node_type(), NodeType::DocumentType);
    assert_eq!(doctype.node_name(), "r");

    let root = doc.document_element().unwrap();
    let names: Vec<(String, u16)> = root
        .child_nodes()
        .iter()
        .map(|n| (n.node_name(), n.node_type().code()))
        .collect();
    assert_eq!(
        names,
        vec![
            ("#comment".to_string(), 8),
            ("t".to_string(), 7),
            ("#cdata-section".to_string(), 4),
            ("#text".to_string(), 3),
        ]
    );
    let attr = root.attributes().item(0).unwrap();
    assert_eq!(attr.node_type().code(), 2);
    assert_eq!(attr.node_value().as_deref(), Some("v"));
}

// ---------------------------------------------------------------------------
// Mutation
// ---------------------------------------------------------------------------

#[test]
fn test_appending_an_ancestor_fails() {
    let doc = parse("<r><a><b/></a></r>").unwrap();
    let root = doc.document_element().unwrap();
    let b = root.first_child().unwrap().first_child().unwrap();
    let err = b.append_child(&root).unwrap_err();
    assert_eq!(err.code, DomErrorCode::InvalidModification);
    assert_eq!(err.code.code(), 13);
    assert_eq!(err.node, b);
    assert_eq!(doc.to_string(), "<r><a><b/></a></r>");
}

#[test]
fn test_appending_a_node_to_itself_fails() {
    let doc = parse("<r/>").unwrap();
    let root = doc.document_element().unwrap();
    assert!(root.append_child(&root).is_err());
}

#[test]
fn test_node_from_another_document_is_rejected() {
    let doc = parse("<r/>").unwrap();
    let other = parse("<o/>").unwrap();
    let foreign = other.create_element("f").unwrap();
    let err = doc
        .document_element()
        .unwrap()
        .append_child(&foreign)
        .unwrap_err();
    assert_eq!(err.code, DomErrorCode::InvalidModification);

    let imported = doc.import_node(&foreign, true).unwrap();
    doc.document_element().unwrap().append_child(&imported).unwrap();
    assert_eq!(doc.to_string(), "<r><f/></r>");
}

#[test]
fn test_document_accepts_one_element() {
    let doc = parse("<r/>").unwrap();
    let second = doc.create_element("s").unwrap();
    assert!(doc.append_child(&second).is_err());
    assert!(doc.append_child(&doc.create_text_node("t")).is_err());
    doc.append_child(&doc.create_comment("ok")).unwrap();
    assert_eq!(doc.to_string(), "<r/><!--ok-->");
}

#[test]
fn test_moving_a_node() {
    let doc = parse("<r><a><x/></a><b/></r>").unwrap();
    let root = doc.document_element().unwrap();
    let a = root.first_child().unwrap();
    let b = root.last_child().unwrap();
    let x = a.first_child().unwrap();
    b.append_child(&x).unwrap();
    assert_eq!(doc.to_string(), "<r><a/><b><x/></b></r>");
    assert_eq!(x.parent_node(), Some(b));
}

#[test]
fn test_fragment_insertion_moves_children() {
    let doc = parse("<r><z/></r>").unwrap();
    let root = doc.document_element().unwrap();
    let frag = doc.create_document_fragment();
    frag.append_child(&doc.create_element("a").unwrap()).unwrap();
    frag.append_child(&doc.create_element("b").unwrap()).unwrap();
    let z = root.first_child().unwrap();
    root.insert_before(&frag, Some(&z)).unwrap();
    assert_eq!(doc.to_string(), "<r><a/><b/><z/></r>");
    assert!(!frag.has_child_nodes());
}

#[test]
fn test_insert_before_foreign_reference_fails() {
    let doc = parse("<r><a/></r><!--c-->").unwrap();
    let root = doc.document_element().unwrap();
    let comment = doc.last_child().unwrap();
    let err = root
        .insert_before(&doc.create_element("n").unwrap(), Some(&comment))
        .unwrap_err();
    assert_eq!(err.code, DomErrorCode::InvalidModification);
    assert_eq!(err.node, root.as_node());
}

#[test]
fn test_normalize() {
    let doc = parse("<r>a</r>").unwrap();
    let root = doc.document_element().unwrap();
    root.append_child(&doc.create_text_node("")).unwrap();
    root.append_child(&doc.create_text_node("b")).unwrap();
    root.append_child(&doc.create_cdata_section("c").unwrap())
        .unwrap();
    root.append_child(&doc.create_text_node("d")).unwrap();
    root.normalize();
    assert_eq!(root.child_nodes().length(), 3);
    let Some(Node::Text(first)) = root.first_child() else {
        panic!("expected a text node");
    };
    assert_eq!(first.data(), "ab");
}

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

#[test]
fn test_remove_absent_named_item_fails() {
    let doc = parse("<r a=\"1\"/>").unwrap();
    let root = doc.document_element().unwrap();
    let err = root.attributes().remove_named_item("b").unwrap_err();
    assert_eq!(err.code, DomErrorCode::InvalidModification);
    assert_eq!(err.node, root.as_node());
}

#[test]
fn test_attribute_in_use_elsewhere_is_rejected() {
    let doc = parse("<r a=\"1\"><s/></r>").unwrap();
    let root = doc.document_element().unwrap();
    let attr = root.attribute_node("a").unwrap();
    let s = root.first_child().unwrap();
    let err = s.attributes().set_named_item(&attr).unwrap_err();
    assert_eq!(err.code, DomErrorCode::InvalidModification);
    assert_eq!(attr.owner_element(), Some(root));
}

#[test]
fn test_has_attributes() {
    let doc = parse("<r a=\"1\"><s/></r>").unwrap();
    let root = doc.document_element().unwrap();
    assert!(root.has_attributes());
    assert!(!root.first_child().unwrap().has_attributes());
    assert!(!doc.has_attributes());
}

// ---------------------------------------------------------------------------
// Live views
// ---------------------------------------------------------------------------

#[test]
fn test_node_list_item_bounds() {
    let doc = parse("<r><a/><b/></r>").unwrap();
    let list = doc.document_element().unwrap().child_nodes();
    assert_eq!(list.item(-1), None);
    assert_eq!(list.item(2), None);
    assert_eq!(list.item(1).unwrap().node_name(), "b");
}

#[test]
fn test_attribute_map_is_live() {
    let doc = parse("<r/>").unwrap();
    let root = doc.document_element().unwrap();
    let map = root.attributes();
    assert!(map.is_empty());
    root.set_attribute("k", "v").unwrap();
    assert_eq!(map.length(), 1);
    assert_eq!(map.get_named_item("k").unwrap().node_value().as_deref(), Some("v"));
}

#[test]
fn test_document_factories() {
    let doc = create_document();
    assert_eq!(doc.document_element(), None);
    let built = XmlParser::new()
        .create_document_with(Some("urn:a"), "a:root")
        .unwrap();
    let root = built.document_element().unwrap();
    assert_eq!(root.prefix().as_deref(), Some("a"));
    assert_eq!(root.namespace_uri().as_deref(), Some("urn:a"));
    assert_eq!(root.owner_document(), Some(built));
}
