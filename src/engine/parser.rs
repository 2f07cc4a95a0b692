//! The engine's `DOMParser`.
//!
//! A hand-rolled recursive descent parser for namespace-well-formed XML 1.0.
//! Like a browser's `DOMParser.parseFromString(text, "text/xml")`, it never
//! fails: malformed input yields a document that carries a parser-error
//! marker element. The marker's shape depends on the [`HostEngine`] being
//! modelled.

use tracing::debug;

use crate::error::SyntaxError;

use super::input::{
    parse_cdata_content, parse_comment_content, parse_pi_content, parse_xml_decl,
    NamespaceResolver, ParserInput, DEFAULT_MAX_DEPTH, DEFAULT_MAX_ENTITY_EXPANSIONS,
    DEFAULT_MAX_NAME_LENGTH,
};
use super::names::{split_qname, validate_qname, XHTML_NAMESPACE, XMLNS_NAMESPACE, XML_NAMESPACE};
use super::tree::{NodeId, NodeKind, Tree};
use super::NativeNode;

/// Namespace of the Gecko parser-error document element.
pub const GECKO_PARSER_ERROR_NAMESPACE: &str =
    "http://www.mozilla.org/newlayout/xml/parsererror.xml";

/// Local name of the parser-error marker element.
pub const PARSER_ERROR_TAG: &str = "parsererror";

/// Which browser engine's parser-error reporting to reproduce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostEngine {
    /// Replace the whole document with a `parsererror` root element in the
    /// Mozilla parser-error namespace.
    #[default]
    Gecko,
    /// Keep the partial tree and insert an XHTML `parsererror` element as
    /// the first child of its document element.
    Blink,
}

/// Parse options controlling the engine parser.
///
/// ```
/// use xmldom::engine::{HostEngine, ParseOptions};
///
/// let opts = ParseOptions::default()
///     .host(HostEngine::Blink)
///     .max_depth(64);
/// assert_eq!(opts.max_depth, 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Marker flavor.
    pub host: HostEngine,
    /// Maximum element nesting depth (default: 256).
    pub max_depth: u32,
    /// Maximum length in bytes of an element or attribute name (default: 50,000).
    pub max_name_length: usize,
    /// Maximum number of entity and character references (default: 10,000).
    pub max_entity_expansions: u32,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            host: HostEngine::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            max_name_length: DEFAULT_MAX_NAME_LENGTH,
            max_entity_expansions: DEFAULT_MAX_ENTITY_EXPANSIONS,
        }
    }
}

impl ParseOptions {
    /// Sets the host engine whose marker shape is produced.
    #[must_use]
    pub fn host(mut self, host: HostEngine) -> Self {
        self.host = host;
        self
    }

    /// Sets the maximum element nesting depth.
    #[must_use]
    pub fn max_depth(mut self, max: u32) -> Self {
        self.max_depth = max;
        self
    }

    /// Sets the maximum element/attribute name length in bytes.
    #[must_use]
    pub fn max_name_length(mut self, max: usize) -> Self {
        self.max_name_length = max;
        self
    }

    /// Sets the maximum number of references expanded per document.
    #[must_use]
    pub fn max_entity_expansions(mut self, max: u32) -> Self {
        self.max_entity_expansions = max;
        self
    }
}

/// Parses `text` into a new document. Never fails; see the module docs.
#[must_use]
pub fn parse_from_string(text: &str, options: &ParseOptions) -> NativeNode {
    let mut parser = DomParser::new(text, options);
    let tree = match parser.parse() {
        Ok(()) => parser.tree,
        Err(err) => {
            debug!(error = %err, host = ?options.host, "building parser-error document");
            match options.host {
                HostEngine::Gecko => gecko_error_tree(text, &err),
                HostEngine::Blink => blink_error_tree(parser.tree, &err),
            }
        }
    };
    NativeNode::from_tree(tree)
}

struct DomParser<'a> {
    input: ParserInput<'a>,
    tree: Tree,
    ns: NamespaceResolver,
}

struct RawAttribute {
    name: String,
    value: String,
}

impl<'a> DomParser<'a> {
    fn new(text: &'a str, options: &ParseOptions) -> Self {
        let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);
        let mut input = ParserInput::new(text);
        input.set_max_depth(options.max_depth);
        input.set_max_name_length(options.max_name_length);
        input.set_max_entity_expansions(options.max_entity_expansions);
        Self {
            input,
            tree: Tree::new(),
            ns: NamespaceResolver::new(),
        }
    }

    fn parse(&mut self) -> Result<(), SyntaxError> {
        if self.looking_at_xml_decl() {
            let decl = parse_xml_decl(&mut self.input)?;
            self.tree.version = Some(decl.version);
            self.tree.encoding = decl.encoding;
            self.tree.standalone = decl.standalone;
        }

        let root = self.tree.root();
        self.parse_misc(root)?;

        if self.input.looking_at(b"<!DOCTYPE") {
            self.parse_doctype(root)?;
            self.parse_misc(root)?;
        }

        if self.input.peek() == Some(b'<')
            && self
                .input
                .peek_at(1)
                .is_some_and(|b| b != b'!' && b != b'?')
        {
            self.parse_element(root)?;
        } else {
            return Err(self.input.fatal("missing root element"));
        }

        self.parse_misc(root)?;
        if !self.input.at_end() {
            return Err(self.input.fatal("content after document element"));
        }
        Ok(())
    }

    fn looking_at_xml_decl(&self) -> bool {
        self.input.looking_at(b"<?xml ")
            || self.input.looking_at(b"<?xml\t")
            || self.input.looking_at(b"<?xml\r")
            || self.input.looking_at(b"<?xml\n")
    }

    // --- Misc (comments, PIs, whitespace) outside the document element ---

    fn parse_misc(&mut self, parent: NodeId) -> Result<(), SyntaxError> {
        loop {
            self.input.skip_whitespace();
            if self.looking_at_xml_decl() {
                return Err(self
                    .input
                    .fatal("XML declaration allowed only at the start of the document"));
            }
            if self.input.looking_at(b"<!--") {
                self.parse_comment(parent)?;
            } else if self.input.looking_at(b"<?") {
                self.parse_processing_instruction(parent)?;
            } else {
                return Ok(());
            }
        }
    }

    // --- DOCTYPE (XML 1.0 §2.8 [28]) ---

    fn parse_doctype(&mut self, parent: NodeId) -> Result<(), SyntaxError> {
        self.input.expect_str(b"<!DOCTYPE")?;
        self.input.skip_whitespace_required()?;
        let name = self.input.parse_name()?;
        self.input.skip_whitespace();

        let mut public_id = None;
        let mut system_id = None;
        if self.input.looking_at(b"SYSTEM") {
            self.input.expect_str(b"SYSTEM")?;
            self.input.skip_whitespace_required()?;
            system_id = Some(self.input.parse_quoted_value()?);
        } else if self.input.looking_at(b"PUBLIC") {
            self.input.expect_str(b"PUBLIC")?;
            self.input.skip_whitespace_required()?;
            public_id = Some(self.input.parse_quoted_value()?);
            self.input.skip_whitespace_required()?;
            system_id = Some(self.input.parse_quoted_value()?);
        }
        self.input.skip_whitespace();

        // The internal subset is skipped; entity declarations are not
        // honored by this engine.
        if self.input.peek() == Some(b'[') {
            self.skip_internal_subset()?;
            self.input.skip_whitespace();
        }
        self.input.expect_byte(b'>')?;

        let doctype = self.tree.create_node(NodeKind::DocumentType {
            name,
            public_id,
            system_id,
        });
        self.tree.append_child(parent, doctype);
        Ok(())
    }

    fn skip_internal_subset(&mut self) -> Result<(), SyntaxError> {
        self.input.expect_byte(b'[')?;
        let mut quote: Option<u8> = None;
        loop {
            let b = self
                .input
                .next_byte()
                .map_err(|_| self.input.fatal("unexpected end of input in internal subset"))?;
            match (quote, b) {
                (Some(q), _) if b == q => quote = None,
                (Some(_), _) => {}
                (None, b'"' | b'\'') => quote = Some(b),
                (None, b']') => return Ok(()),
                _ => {}
            }
        }
    }

    // --- Elements (XML 1.0 §3.1) ---

    fn parse_element(&mut self, parent: NodeId) -> Result<(), SyntaxError> {
        self.input.increment_depth()?;
        self.input.expect_byte(b'<')?;
        let name = self.input.parse_name()?;
        if let Some(msg) = validate_qname(&name) {
            return Err(self.input.fatal(format!("{msg}: '{name}'")));
        }

        let mut raw_attributes: Vec<RawAttribute> = Vec::new();
        loop {
            let had_ws = self.input.skip_whitespace();
            if self.input.peek() == Some(b'>') || self.input.looking_at(b"/>") {
                break;
            }
            if !had_ws {
                return Err(self.input.fatal("whitespace required between attributes"));
            }
            let attr = self.parse_attribute()?;
            if raw_attributes.iter().any(|a| a.name == attr.name) {
                return Err(self
                    .input
                    .fatal(format!("duplicate attribute: '{}'", attr.name)));
            }
            raw_attributes.push(attr);
        }

        // Namespace declarations on this element are in scope for the
        // element's own name and all of its attributes.
        self.ns.push_scope();
        for attr in &raw_attributes {
            if attr.name == "xmlns" {
                self.ns.bind(None, attr.value.clone());
            } else if let Some(prefix) = attr.name.strip_prefix("xmlns:") {
                if attr.value.is_empty() {
                    return Err(self
                        .input
                        .fatal(format!("namespace prefix '{prefix}' bound to empty URI")));
                }
                self.ns.bind(Some(prefix.to_string()), attr.value.clone());
            }
        }

        let namespace = self.resolve_element_namespace(&name)?;
        let element = self.tree.create_node(NodeKind::Element {
            name: name.clone(),
            namespace,
            attributes: Vec::with_capacity(raw_attributes.len()),
        });

        let mut attribute_ids = Vec::with_capacity(raw_attributes.len());
        let mut expanded_names: Vec<(Option<String>, String)> = Vec::new();
        for attr in raw_attributes {
            let namespace = self.resolve_attribute_namespace(&attr.name)?;
            let expanded = (namespace.clone(), split_qname(&attr.name).1.to_string());
            if namespace.is_some() && expanded_names.contains(&expanded) {
                return Err(self.input.fatal(format!(
                    "duplicate expanded attribute name: '{}'",
                    attr.name
                )));
            }
            expanded_names.push(expanded);
            attribute_ids.push(self.tree.create_node(NodeKind::Attribute {
                name: attr.name,
                namespace,
                value: attr.value,
                owner: Some(element),
            }));
        }
        if let NodeKind::Element { attributes, .. } = &mut self.tree.node_mut(element).kind {
            *attributes = attribute_ids;
        }
        self.tree.append_child(parent, element);

        if self.input.looking_at(b"/>") {
            self.input.advance(2);
        } else {
            self.input.expect_byte(b'>')?;
            self.parse_content(element)?;
            self.input.expect_str(b"</")?;
            let end_name = self.input.parse_name()?;
            if end_name != name {
                return Err(self.input.fatal(format!(
                    "mismatched end tag: expected '</{name}>', found '</{end_name}>'"
                )));
            }
            self.input.skip_whitespace();
            self.input.expect_byte(b'>')?;
        }

        self.ns.pop_scope();
        self.input.decrement_depth();
        Ok(())
    }

    fn resolve_element_namespace(&self, name: &str) -> Result<Option<String>, SyntaxError> {
        match split_qname(name) {
            (Some("xmlns"), _) => Err(self
                .input
                .fatal("element names must not use the 'xmlns' prefix")),
            (Some(prefix), _) => self
                .ns
                .resolve(Some(prefix))
                .map(|uri| Some(uri.to_string()))
                .ok_or_else(|| self.input.fatal(format!("unbound namespace prefix '{prefix}'"))),
            (None, _) => Ok(self.ns.resolve(None).map(str::to_string)),
        }
    }

    fn resolve_attribute_namespace(&self, name: &str) -> Result<Option<String>, SyntaxError> {
        if name == "xmlns" {
            return Ok(Some(XMLNS_NAMESPACE.to_string()));
        }
        match split_qname(name) {
            (Some("xmlns"), _) => Ok(Some(XMLNS_NAMESPACE.to_string())),
            (Some("xml"), _) => Ok(Some(XML_NAMESPACE.to_string())),
            (Some(prefix), _) => self
                .ns
                .resolve(Some(prefix))
                .map(|uri| Some(uri.to_string()))
                .ok_or_else(|| self.input.fatal(format!("unbound namespace prefix '{prefix}'"))),
            // Unprefixed attributes are in no namespace.
            (None, _) => Ok(None),
        }
    }

    fn parse_attribute(&mut self) -> Result<RawAttribute, SyntaxError> {
        let name = self.input.parse_name()?;
        if let Some(msg) = validate_qname(&name) {
            return Err(self.input.fatal(format!("{msg}: '{name}'")));
        }
        self.input.skip_whitespace();
        self.input.expect_byte(b'=')?;
        self.input.skip_whitespace();
        let value = self.input.parse_attribute_value()?;
        Ok(RawAttribute { name, value })
    }

    // --- Content (XML 1.0 §3.1 [43]) ---

    fn parse_content(&mut self, parent: NodeId) -> Result<(), SyntaxError> {
        loop {
            if self.input.at_end() {
                return Err(self
                    .input
                    .fatal("unexpected end of input in element content"));
            }
            if self.input.looking_at(b"</") {
                return Ok(());
            }
            if self.input.looking_at(b"<![CDATA[") {
                self.parse_cdata(parent)?;
            } else if self.input.looking_at(b"<!--") {
                self.parse_comment(parent)?;
            } else if self.input.looking_at(b"<?") {
                self.parse_processing_instruction(parent)?;
            } else if self.input.peek() == Some(b'<') {
                self.parse_element(parent)?;
            } else {
                self.parse_char_data(parent)?;
            }
        }
    }

    // --- Character data (XML 1.0 §2.4) ---

    fn parse_char_data(&mut self, parent: NodeId) -> Result<(), SyntaxError> {
        let mut text = String::new();
        while let Some(b) = self.input.peek() {
            match b {
                b'<' => break,
                b'&' => text.push_str(&self.input.parse_reference()?),
                b']' if self.input.looking_at(b"]]>") => {
                    return Err(self.input.fatal("']]>' not allowed in character data"));
                }
                _ => text.push(self.input.next_char()?),
            }
        }
        if text.is_empty() {
            return Ok(());
        }
        let node = self.tree.create_node(NodeKind::Text { content: text });
        self.tree.append_child(parent, node);
        Ok(())
    }

    fn parse_comment(&mut self, parent: NodeId) -> Result<(), SyntaxError> {
        let content = parse_comment_content(&mut self.input)?;
        let node = self.tree.create_node(NodeKind::Comment { content });
        self.tree.append_child(parent, node);
        Ok(())
    }

    fn parse_cdata(&mut self, parent: NodeId) -> Result<(), SyntaxError> {
        let content = parse_cdata_content(&mut self.input)?;
        let node = self.tree.create_node(NodeKind::CData { content });
        self.tree.append_child(parent, node);
        Ok(())
    }

    fn parse_processing_instruction(&mut self, parent: NodeId) -> Result<(), SyntaxError> {
        let (target, data) = parse_pi_content(&mut self.input)?;
        let node = self
            .tree
            .create_node(NodeKind::ProcessingInstruction { target, data });
        self.tree.append_child(parent, node);
        Ok(())
    }
}

// -------------------------------------------------------------------------
// Parser-error markers
// -------------------------------------------------------------------------

fn append_element(tree: &mut Tree, parent: NodeId, name: &str, namespace: &str) -> NodeId {
    let id = tree.create_node(NodeKind::Element {
        name: name.to_string(),
        namespace: Some(namespace.to_string()),
        attributes: Vec::new(),
    });
    tree.append_child(parent, id);
    id
}

fn append_text(tree: &mut Tree, parent: NodeId, content: String) {
    let id = tree.create_node(NodeKind::Text { content });
    tree.append_child(parent, id);
}

fn set_attribute(tree: &mut Tree, element: NodeId, name: &str, value: &str) {
    let attr = tree.create_node(NodeKind::Attribute {
        name: name.to_string(),
        namespace: None,
        value: value.to_string(),
        owner: Some(element),
    });
    if let NodeKind::Element { attributes, .. } = &mut tree.node_mut(element).kind {
        attributes.push(attr);
    }
}

/// `<parsererror xmlns="…parsererror.xml">message<sourcetext>…</sourcetext></parsererror>`
fn gecko_error_tree(text: &str, err: &SyntaxError) -> Tree {
    let mut tree = Tree::new();
    let root = tree.root();
    let marker = append_element(&mut tree, root, PARSER_ERROR_TAG, GECKO_PARSER_ERROR_NAMESPACE);
    append_text(
        &mut tree,
        marker,
        format!(
            "XML Parsing Error: {}\nLocation: \nLine Number {}, Column {}:",
            err.message, err.location.line, err.location.column
        ),
    );

    let line_index = err.location.line.saturating_sub(1) as usize;
    let source_line = text.lines().nth(line_index).unwrap_or_default();
    let caret_pad = "-".repeat(err.location.column.saturating_sub(1) as usize);
    let source = append_element(&mut tree, marker, "sourcetext", GECKO_PARSER_ERROR_NAMESPACE);
    append_text(&mut tree, source, format!("{source_line}\n{caret_pad}^"));
    tree
}

/// Keeps the partial tree and prepends an XHTML `parsererror` block.
fn blink_error_tree(mut tree: Tree, err: &SyntaxError) -> Tree {
    let root = tree.root();
    let marker = tree.create_node(NodeKind::Element {
        name: PARSER_ERROR_TAG.to_string(),
        namespace: Some(XHTML_NAMESPACE.to_string()),
        attributes: Vec::new(),
    });
    set_attribute(
        &mut tree,
        marker,
        "style",
        "display: block; white-space: pre; border: 2px solid #c77; padding: 0 1em 0 1em; \
         margin: 1em; background-color: #fdd; color: black",
    );
    let heading = append_element(&mut tree, marker, "h3", XHTML_NAMESPACE);
    append_text(
        &mut tree,
        heading,
        "This page contains the following errors:".to_string(),
    );
    let detail = append_element(&mut tree, marker, "div", XHTML_NAMESPACE);
    set_attribute(&mut tree, detail, "style", "font-family:monospace;font-size:12px");
    append_text(
        &mut tree,
        detail,
        format!(
            "error on line {} at column {}: {}\n",
            err.location.line, err.location.column, err.message
        ),
    );
    let footer = append_element(&mut tree, marker, "h3", XHTML_NAMESPACE);
    append_text(
        &mut tree,
        footer,
        "Below is a rendering of the page up to the first error.".to_string(),
    );

    match tree.document_element() {
        Some(element) => match tree.first_child(element) {
            Some(first) => tree.insert_before(first, marker),
            None => tree.append_child(element, marker),
        },
        None => tree.append_child(root, marker),
    }
    tree
}
