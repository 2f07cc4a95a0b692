use crate::engine::NameMatch;
use crate::error::{DomError, DomErrorCode};

use super::{dom_error, Attr, DomNode, Element, NodeList};

impl Element {
    /// The qualified name as written.
    #[must_use]
    pub fn tag_name(&self) -> String {
        self.node_name()
    }

    /// The value of attribute `name`, if present.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<String> {
        self.native().attribute(name)
    }

    /// Sets attribute `name`, creating it if needed.
    ///
    /// # Errors
    ///
    /// `INVALID_CHARACTER_ERR` when `name` is not a valid XML name.
    pub fn set_attribute(&self, name: &str, value: &str) -> Result<(), DomError> {
        self.native()
            .set_attribute(name, value)
            .map_err(|e| dom_error(self, DomErrorCode::InvalidCharacter, e))
    }

    /// Removes attribute `name`; absent attributes are ignored.
    pub fn remove_attribute(&self, name: &str) {
        self.native().remove_attribute(name);
    }

    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.native().named_attribute(name).is_some()
    }

    #[must_use]
    pub fn attribute_node(&self, name: &str) -> Option<Attr> {
        self.native().named_attribute(name).map(Attr::from_native)
    }

    /// A live list of descendant elements whose local name is `name`, in
    /// any namespace; `*` matches all.
    #[must_use]
    pub fn elements_by_tag_name(&self, name: &str) -> NodeList {
        NodeList::elements_by_tag_name(self.native().clone(), name, NameMatch::Local)
    }
}

impl Attr {
    #[must_use]
    pub fn name(&self) -> String {
        self.node_name()
    }

    #[must_use]
    pub fn value(&self) -> String {
        self.node_value().unwrap_or_default()
    }

    /// Always `true`: no DTD defaults are ever applied.
    #[must_use]
    pub fn specified(&self) -> bool {
        true
    }

    /// The element carrying this attribute.
    #[must_use]
    pub fn owner_element(&self) -> Option<Element> {
        self.native().owner_element().map(Element::from_native)
    }
}
