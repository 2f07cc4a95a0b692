use crate::error::{DomError, DomErrorCode};

use super::{dom_error, CdataSection, Comment, DomNode, Text};

/// Editing operations on the data of text, CDATA and comment nodes.
///
/// Offsets and counts are in characters. A count that runs past the end
/// is clamped; an offset past the end is an error.
pub trait CharacterData: DomNode {
    fn data(&self) -> String {
        self.native().data()
    }

    /// # Errors
    ///
    /// `INVALID_MODIFICATION_ERR` if the engine rejects the data.
    fn set_data(&self, data: &str) -> Result<(), DomError> {
        self.native()
            .set_data(data)
            .map_err(|e| dom_error(self, DomErrorCode::InvalidModification, e))
    }

    /// Length of the data in characters.
    fn length(&self) -> usize {
        self.native().data_length()
    }

    /// # Errors
    ///
    /// `INVALID_ACCESS_ERR` when `offset` is past the end.
    fn substring_data(&self, offset: usize, count: usize) -> Result<String, DomError> {
        self.native()
            .substring_data(offset, count)
            .map_err(|e| dom_error(self, DomErrorCode::InvalidAccess, e))
    }

    /// # Errors
    ///
    /// `INVALID_MODIFICATION_ERR` if the engine rejects the data.
    fn append_data(&self, data: &str) -> Result<(), DomError> {
        self.replace_data(self.length(), 0, data)
    }

    /// # Errors
    ///
    /// `INVALID_MODIFICATION_ERR` when `offset` is past the end.
    fn insert_data(&self, offset: usize, data: &str) -> Result<(), DomError> {
        self.replace_data(offset, 0, data)
    }

    /// # Errors
    ///
    /// `INVALID_MODIFICATION_ERR` when `offset` is past the end.
    fn delete_data(&self, offset: usize, count: usize) -> Result<(), DomError> {
        self.replace_data(offset, count, "")
    }

    /// # Errors
    ///
    /// `INVALID_MODIFICATION_ERR` when `offset` is past the end.
    fn replace_data(&self, offset: usize, count: usize, data: &str) -> Result<(), DomError> {
        self.native()
            .replace_data(offset, count, data)
            .map_err(|e| dom_error(self, DomErrorCode::InvalidModification, e))
    }
}

impl CharacterData for Text {}
impl CharacterData for CdataSection {}
impl CharacterData for Comment {}

impl Text {
    /// Splits this node at `offset`. The tail becomes a new text node,
    /// inserted after this one if it has a parent, and is returned.
    ///
    /// # Errors
    ///
    /// `INVALID_MODIFICATION_ERR` when `offset` is past the end.
    pub fn split_text(&self, offset: usize) -> Result<Text, DomError> {
        self.native()
            .split_text(offset)
            .map(Text::from_native)
            .map_err(|e| dom_error(self, DomErrorCode::InvalidModification, e))
    }
}

impl CdataSection {
    /// Like [`Text::split_text`]; the tail is a CDATA section.
    ///
    /// # Errors
    ///
    /// `INVALID_MODIFICATION_ERR` when `offset` is past the end.
    pub fn split_text(&self, offset: usize) -> Result<CdataSection, DomError> {
        self.native()
            .split_text(offset)
            .map(CdataSection::from_native)
            .map_err(|e| dom_error(self, DomErrorCode::InvalidModification, e))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dom::{Document, Node, NodeCollection};
    use crate::engine::{parse_from_string, ParseOptions};
    use crate::error::EngineError;
    use pretty_assertions::assert_eq;

    fn parse(text: &str) -> Document {
        Document::from_native(parse_from_string(text, &ParseOptions::default()))
    }

    fn first_text(doc: &Document) -> Text {
        match doc.document_element().unwrap().first_child().unwrap() {
            Node::Text(text) => text,
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn test_editing() {
        let doc = parse("<r>hello</r>");
        let text = first_text(&doc);
        assert_eq!(text.length(), 5);
        text.append_data(" world").unwrap();
        text.insert_data(0, ">").unwrap();
        assert_eq!(text.data(), ">hello world");
        text.delete_data(0, 1).unwrap();
        text.replace_data(6, 5, "there").unwrap();
        assert_eq!(text.data(), "hello there");
        assert_eq!(text.substring_data(6, 100).unwrap(), "there");
        text.set_data("x & y").unwrap();
        assert_eq!(doc.to_xml_string(), "<r>x &amp; y</r>");
    }

    #[test]
    fn test_offsets_count_characters() {
        let doc = parse("<r>h\u{e9}llo \u{1f600}!</r>");
        let text = first_text(&doc);
        assert_eq!(text.length(), 8);
        assert_eq!(text.substring_data(1, 1).unwrap(), "\u{e9}");
        assert_eq!(text.substring_data(6, 1).unwrap(), "\u{1f600}");
        text.delete_data(6, 1).unwrap();
        assert_eq!(text.data(), "h\u{e9}llo !");
    }

    #[test]
    fn test_offset_past_end() {
        let doc = parse("<r>abc</r>");
        let text = first_text(&doc);
        // The end itself is a valid offset.
        assert_eq!(text.substring_data(3, 1).unwrap(), "");

        let err = text.substring_data(4, 1).unwrap_err();
        assert_eq!(err.code, DomErrorCode::InvalidAccess);
        assert!(matches!(err.source, EngineError::IndexSize(_)));
        let err = text.insert_data(4, "x").unwrap_err();
        assert_eq!(err.code, DomErrorCode::InvalidModification);
        assert_eq!(err.node, text.as_node());
        assert_eq!(text.data(), "abc");
    }

    #[test]
    fn test_comment_is_character_data() {
        let doc = parse("<r><!--note--></r>");
        let node = doc.document_element().unwrap().first_child().unwrap();
        let data = node.as_character_data().unwrap();
        data.append_data("s").unwrap();
        assert_eq!(doc.to_xml_string(), "<r><!--notes--></r>");
        assert!(doc.document_element().unwrap().as_node().as_character_data().is_none());
    }

    #[test]
    fn test_split_text() {
        let doc = parse("<r>headtail<e/></r>");
        let text = first_text(&doc);
        let tail = text.split_text(4).unwrap();
        assert_eq!(text.data(), "head");
        assert_eq!(tail.data(), "tail");
        assert_eq!(text.next_sibling(), Some(tail.as_node()));
        assert_eq!(doc.to_xml_string(), "<r>headtail<e/></r>");
        assert_eq!(doc.document_element().unwrap().child_nodes().length(), 3);

        let err = tail.split_text(9).unwrap_err();
        assert_eq!(err.code, DomErrorCode::InvalidModification);
    }

    #[test]
    fn test_split_detached_cdata() {
        let doc = parse("<r/>");
        let cdata = doc.create_cdata_section("abcd").unwrap();
        let tail = cdata.split_text(1).unwrap();
        assert_eq!(cdata.data(), "a");
        assert_eq!(tail.to_xml_string(), "<![CDATA[bcd]]>");
        assert_eq!(tail.parent_node(), None);
    }
}
