use crate::engine::NameMatch;
use crate::error::{DomError, DomErrorCode};

use super::{
    dom_error, Attr, CdataSection, Comment, Document, DocumentFragment, DomNode, Element, Node,
    NodeList, ProcessingInstruction, Text,
};

impl Document {
    /// Creates an element with no namespace.
    ///
    /// # Errors
    ///
    /// `INVALID_CHARACTER_ERR` when `tag_name` is not a valid XML name.
    pub fn create_element(&self, tag_name: &str) -> Result<Element, DomError> {
        self.native()
            .create_element(tag_name)
            .map(Element::from_native)
            .map_err(|e| dom_error(self, DomErrorCode::InvalidCharacter, e))
    }

    /// Creates an element in `namespace`.
    ///
    /// # Errors
    ///
    /// `INVALID_CHARACTER_ERR` when `qualified_name` is not a valid
    /// qualified name, or is prefixed without a namespace.
    pub fn create_element_ns(
        &self,
        namespace: Option<&str>,
        qualified_name: &str,
    ) -> Result<Element, DomError> {
        self.native()
            .create_element_ns(namespace, qualified_name)
            .map(Element::from_native)
            .map_err(|e| dom_error(self, DomErrorCode::InvalidCharacter, e))
    }

    #[must_use]
    pub fn create_text_node(&self, data: &str) -> Text {
        Text::from_native(self.native().create_text_node(data))
    }

    #[must_use]
    pub fn create_comment(&self, data: &str) -> Comment {
        Comment::from_native(self.native().create_comment(data))
    }

    /// # Errors
    ///
    /// `INVALID_CHARACTER_ERR` when `data` contains `]]>`.
    pub fn create_cdata_section(&self, data: &str) -> Result<CdataSection, DomError> {
        self.native()
            .create_cdata_section(data)
            .map(CdataSection::from_native)
            .map_err(|e| dom_error(self, DomErrorCode::InvalidCharacter, e))
    }

    /// # Errors
    ///
    /// `INVALID_CHARACTER_ERR` for an invalid target or data containing `?>`.
    pub fn create_processing_instruction(
        &self,
        target: &str,
        data: &str,
    ) -> Result<ProcessingInstruction, DomError> {
        self.native()
            .create_processing_instruction(target, data)
            .map(ProcessingInstruction::from_native)
            .map_err(|e| dom_error(self, DomErrorCode::InvalidCharacter, e))
    }

    #[must_use]
    pub fn create_document_fragment(&self) -> DocumentFragment {
        DocumentFragment::from_native(self.native().create_document_fragment())
    }

    /// Creates a detached attribute with an empty value.
    ///
    /// # Errors
    ///
    /// `INVALID_CHARACTER_ERR` when `name` is not a valid XML name.
    pub fn create_attribute(&self, name: &str) -> Result<Attr, DomError> {
        self.native()
            .create_attribute(name)
            .map(Attr::from_native)
            .map_err(|e| dom_error(self, DomErrorCode::InvalidCharacter, e))
    }

    #[must_use]
    pub fn document_element(&self) -> Option<Element> {
        self.native().document_element().map(Element::from_native)
    }

    /// The first element, in document order, whose `id` or `xml:id`
    /// attribute is `element_id`.
    #[must_use]
    pub fn element_by_id(&self, element_id: &str) -> Option<Element> {
        self.native()
            .element_by_id(element_id)
            .map(Element::from_native)
    }

    /// A live list of every element whose qualified name is `tag_name`;
    /// `*` matches all elements.
    #[must_use]
    pub fn elements_by_tag_name(&self, tag_name: &str) -> NodeList {
        NodeList::elements_by_tag_name(self.native().clone(), tag_name, NameMatch::Qualified)
    }

    /// Copies `node` into this document. The copy has no parent.
    ///
    /// # Errors
    ///
    /// `INVALID_STATE_ERR` when the engine refuses, e.g. for a document.
    pub fn import_node(&self, node: &dyn DomNode, deep: bool) -> Result<Node, DomError> {
        self.native()
            .import_node(node.native(), deep)
            .map(Node::wrap)
            .map_err(|e| dom_error(self, DomErrorCode::InvalidState, e))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dom::{CharacterData, NodeCollection, NodeType};
    use crate::engine::{create_document, parse_from_string, ParseOptions};
    use crate::error::EngineError;
    use pretty_assertions::assert_eq;

    fn parse(text: &str) -> Document {
        Document::from_native(parse_from_string(text, &ParseOptions::default()))
    }

    fn empty() -> Document {
        Document::from_native(create_document())
    }

    #[test]
    fn test_build_a_document() {
        let doc = empty();
        let root = doc.create_element("catalog").unwrap();
        doc.append_child(&root).unwrap();
        let book = doc.create_element("book").unwrap();
        book.set_attribute("id", "b1").unwrap();
        book.append_child(&doc.create_text_node("Dune & co")).unwrap();
        book.append_child(&doc.create_cdata_section("<raw>").unwrap())
            .unwrap();
        root.append_child(&book).unwrap();
        root.append_child(&doc.create_comment(" end ")).unwrap();
        root.append_child(&doc.create_processing_instruction("pi", "x").unwrap())
            .unwrap();
        assert_eq!(
            doc.to_xml_string(),
            "<catalog><book id=\"b1\">Dune &amp; co<![CDATA[<raw>]]></book><!-- end --><?pi x?></catalog>"
        );
        assert_eq!(doc.document_element(), Some(root));
    }

    #[test]
    fn test_creation_errors_are_invalid_character() {
        let doc = empty();
        let err = doc.create_element("not valid").unwrap_err();
        assert_eq!(err.code, DomErrorCode::InvalidCharacter);
        assert_eq!(err.node, doc.as_node());
        assert!(matches!(err.source, EngineError::InvalidCharacter(_)));

        for err in [
            doc.create_cdata_section("a]]>b").unwrap_err(),
            doc.create_processing_instruction("1t", "").unwrap_err(),
            doc.create_processing_instruction("t", "?>").unwrap_err(),
            doc.create_attribute("").unwrap_err(),
            doc.create_element_ns(None, "p:x").unwrap_err(),
        ] {
            assert_eq!(err.code, DomErrorCode::InvalidCharacter);
        }
    }

    #[test]
    fn test_created_nodes_are_owned_and_detached() {
        let doc = empty();
        let text = doc.create_text_node("t");
        assert_eq!(text.owner_document(), Some(doc.clone()));
        assert_eq!(text.parent_node(), None);
        assert_eq!(text.data(), "t");
        let frag = doc.create_document_fragment();
        assert_eq!(frag.node_type(), NodeType::DocumentFragment);
        assert_eq!(frag.node_name(), "#document-fragment");
    }

    #[test]
    fn test_element_by_id() {
        let doc = parse("<r><a id=\"one\"/><b xml:id=\"two\"/><c id=\"one\"/></r>");
        assert_eq!(doc.element_by_id("one").unwrap().tag_name(), "a");
        assert_eq!(doc.element_by_id("two").unwrap().tag_name(), "b");
        assert_eq!(doc.element_by_id("three"), None);
    }

    #[test]
    fn test_elements_by_tag_name_uses_qualified_names() {
        let doc = parse("<r xmlns:p=\"urn:p\"><item/><p:item/><g><item/></g></r>");
        assert_eq!(doc.elements_by_tag_name("item").length(), 2);
        assert_eq!(doc.elements_by_tag_name("p:item").length(), 1);
        assert_eq!(doc.elements_by_tag_name("*").length(), 5);
        assert_eq!(doc.elements_by_tag_name("none").item(0), None);
    }

    #[test]
    fn test_import_node() {
        let source = parse("<s><item k=\"v\"><sub/></item></s>");
        let item = source.document_element().unwrap().first_child().unwrap();
        let target = parse("<t/>");

        let shallow = target.import_node(&item, false).unwrap();
        assert_eq!(shallow.to_xml_string(), "<item k=\"v\"/>");
        let deep = target.import_node(&item, true).unwrap();
        assert_eq!(deep.owner_document(), Some(target.clone()));
        assert_eq!(deep.parent_node(), None);
        target.document_element().unwrap().append_child(&deep).unwrap();
        assert_eq!(target.to_xml_string(), "<t><item k=\"v\"><sub/></item></t>");
        // The source is untouched.
        assert_eq!(source.to_xml_string(), "<s><item k=\"v\"><sub/></item></s>");
    }

    #[test]
    fn test_import_document_is_invalid_state() {
        let source = parse("<s/>");
        let target = parse("<t/>");
        let err = target.import_node(&source, true).unwrap_err();
        assert_eq!(err.code, DomErrorCode::InvalidState);
        assert_eq!(err.node, target.as_node());
    }

    #[test]
    fn test_clone_document() {
        let doc = parse("<?xml version=\"1.0\"?><r>t</r>");
        let copy = doc.clone_node(true);
        assert!(matches!(copy, Node::Document(_)));
        assert_ne!(copy, doc.as_node());
        assert_eq!(copy.to_xml_string(), doc.to_xml_string());
    }
}
