//! Error types for the engine and the DOM wrapper layer.
//!
//! Two kinds of failure reach callers of the wrapper API:
//!
//! - [`ParseError`]: the engine parser reported malformed input by emitting
//!   a parser-error marker element. Carries the original input text.
//! - [`DomError`]: an engine mutation or access call rejected the request.
//!   Carries a fixed [`DomErrorCode`], the node the operation was invoked on,
//!   and the engine's own [`EngineError`] detail.
//!
//! [`SyntaxError`] and [`SourceLocation`] are the engine parser's internal
//! diagnostics; they only surface to users as the text of the marker.

use std::fmt;

use crate::dom::Node;

/// Source location within an XML document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number (in characters, not bytes).
    pub column: u32,
    /// 0-based byte offset from the start of the input.
    pub byte_offset: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A fatal well-formedness error raised inside the engine parser.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("syntax error at {location}: {message}")]
pub struct SyntaxError {
    /// The primary error message.
    pub message: String,
    /// Where in the source the error occurred.
    pub location: SourceLocation,
}

/// A rejection raised by the engine, named after the DOMException it models.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The operation would yield an incorrect node tree (cycles, text under a
    /// document, a second document element, inserting into a leaf, ...).
    #[error("HierarchyRequestError: {0}")]
    HierarchyRequest(String),
    /// The referenced node is not where the operation expected it.
    #[error("NotFoundError: {0}")]
    NotFound(String),
    /// The node belongs to a different document.
    #[error("WrongDocumentError: {0}")]
    WrongDocument(String),
    /// A name or data string contains characters the engine rejects.
    #[error("InvalidCharacterError: {0}")]
    InvalidCharacter(String),
    /// An offset lies outside a character buffer.
    #[error("IndexSizeError: {0}")]
    IndexSize(String),
    /// The attribute already belongs to another element.
    #[error("InUseAttributeError: {0}")]
    InUseAttribute(String),
    /// The engine does not support the operation for this node.
    #[error("NotSupportedError: {0}")]
    NotSupported(String),
}

/// DOM error classification attached to every [`DomError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomErrorCode {
    /// A name or data string was rejected.
    InvalidCharacter,
    /// The object is in a state that does not allow the operation.
    InvalidState,
    /// A tree or buffer modification was rejected.
    InvalidModification,
    /// An access to part of the object was rejected.
    InvalidAccess,
}

impl DomErrorCode {
    /// The numeric `DOMException` code.
    #[must_use]
    pub fn code(self) -> u16 {
        match self {
            Self::InvalidCharacter => 5,
            Self::InvalidState => 11,
            Self::InvalidModification => 13,
            Self::InvalidAccess => 15,
        }
    }
}

impl fmt::Display for DomErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCharacter => write!(f, "INVALID_CHARACTER_ERR"),
            Self::InvalidState => write!(f, "INVALID_STATE_ERR"),
            Self::InvalidModification => write!(f, "INVALID_MODIFICATION_ERR"),
            Self::InvalidAccess => write!(f, "INVALID_ACCESS_ERR"),
        }
    }
}

/// A rejected DOM mutation or access.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{code} on {}: {source}", node_label(.node))]
pub struct DomError {
    /// The fixed classification chosen by the failing operation.
    pub code: DomErrorCode,
    /// The node the failing operation was invoked on.
    pub node: Node,
    /// The engine's rejection.
    #[source]
    pub source: EngineError,
}

impl DomError {
    pub(crate) fn new(code: DomErrorCode, node: Node, source: EngineError) -> Self {
        Self { code, node, source }
    }
}

fn node_label(node: &Node) -> String {
    use crate::dom::DomNode;
    node.node_name()
}

/// Raised when the engine parser marks its output with a parser-error element.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to parse XML: {message}")]
pub struct ParseError {
    /// The original, unparsed input text.
    pub input: String,
    /// The engine's description of the failure (the marker's text).
    pub message: String,
}

/// Umbrella error for callers that mix parsing and tree manipulation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// See [`ParseError`].
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// See [`DomError`].
    #[error(transparent)]
    Dom(#[from] DomError),
}

/// Convenience alias for results carrying the umbrella [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_source_location_display() {
        let loc = SourceLocation {
            line: 10,
            column: 5,
            byte_offset: 42,
        };
        assert_eq!(loc.to_string(), "10:5");
    }

    #[test]
    fn test_syntax_error_display() {
        let err = SyntaxError {
            message: "unexpected end of input".to_string(),
            location: SourceLocation {
                line: 1,
                column: 15,
                byte_offset: 14,
            },
        };
        assert_eq!(
            err.to_string(),
            "syntax error at 1:15: unexpected end of input"
        );
    }

    #[test]
    fn test_engine_error_display_uses_dom_exception_names() {
        let err = EngineError::HierarchyRequest("cycle".to_string());
        assert_eq!(err.to_string(), "HierarchyRequestError: cycle");
        let err = EngineError::NotFound("no such attribute".to_string());
        assert_eq!(err.to_string(), "NotFoundError: no such attribute");
    }

    #[test]
    fn test_dom_error_codes() {
        assert_eq!(DomErrorCode::InvalidCharacter.code(), 5);
        assert_eq!(DomErrorCode::InvalidState.code(), 11);
        assert_eq!(DomErrorCode::InvalidModification.code(), 13);
        assert_eq!(DomErrorCode::InvalidAccess.code(), 15);
        assert_eq!(
            DomErrorCode::InvalidModification.to_string(),
            "INVALID_MODIFICATION_ERR"
        );
    }

    #[test]
    fn test_parse_error_keeps_input() {
        let err = ParseError {
            input: "<a><b></a>".to_string(),
            message: "mismatched end tag".to_string(),
        };
        assert_eq!(err.input, "<a><b></a>");
        assert_eq!(err.to_string(), "failed to parse XML: mismatched end tag");
        let wrapped: Error = err.into();
        assert!(matches!(wrapped, Error::Parse(_)));
    }
}
