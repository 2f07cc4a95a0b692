//! Byte decoding ahead of the engine parser.
//!
//! The parser itself works on `&str`. Raw bytes are decoded first, the way
//! a host decodes a response body before handing it to `DOMParser`:
//!
//! 1. A Byte Order Mark picks UTF-8, UTF-16BE or UTF-16LE and is skipped.
//! 2. Without a BOM the input is UTF-8 unless the XML declaration names
//!    another encoding, in which case `encoding_rs` transcodes it.

/// Decoding failure for [`decode_to_utf8`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("encoding error: {message}")]
pub struct EncodingError {
    /// What went wrong.
    pub message: String,
}

impl EncodingError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Sniffs the Byte Order Mark.
///
/// Returns the encoding label and the number of BOM bytes to skip; no BOM
/// means UTF-8.
///
/// ```
/// use xmldom::engine::encoding::detect_encoding;
///
/// assert_eq!(detect_encoding(b"\xEF\xBB\xBF<a/>"), ("UTF-8", 3));
/// assert_eq!(detect_encoding(b"\xFF\xFE<\0"), ("UTF-16LE", 2));
/// assert_eq!(detect_encoding(b"<a/>"), ("UTF-8", 0));
/// ```
#[must_use]
pub fn detect_encoding(bytes: &[u8]) -> (&'static str, usize) {
    match bytes {
        [0xEF, 0xBB, 0xBF, ..] => ("UTF-8", 3),
        [0xFE, 0xFF, ..] => ("UTF-16BE", 2),
        [0xFF, 0xFE, ..] => ("UTF-16LE", 2),
        _ => ("UTF-8", 0),
    }
}

/// Transcodes `bytes` from the encoding named by `label` into UTF-8.
///
/// # Errors
///
/// Fails on an unknown label or a malformed byte sequence.
pub fn transcode(bytes: &[u8], label: &str) -> Result<String, EncodingError> {
    let encoding = encoding_rs::Encoding::for_label(label.as_bytes())
        .ok_or_else(|| EncodingError::new(format!("unsupported encoding: {label}")))?;
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        return Err(EncodingError::new(format!(
            "malformed byte sequence for encoding {label}"
        )));
    }
    Ok(text.into_owned())
}

/// Decodes raw XML bytes into a `String`.
///
/// # Errors
///
/// Fails when the bytes are not valid in the detected or declared encoding,
/// or when the declared encoding is unknown.
///
/// ```
/// use xmldom::engine::encoding::decode_to_utf8;
///
/// let text = decode_to_utf8(b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><a>\xE9</a>").unwrap();
/// assert!(text.ends_with("<a>\u{e9}</a>"));
/// ```
pub fn decode_to_utf8(bytes: &[u8]) -> Result<String, EncodingError> {
    let (bom_encoding, skip) = detect_encoding(bytes);
    let content = &bytes[skip..];

    if bom_encoding != "UTF-8" {
        // A BOM wins over whatever the declaration says.
        return transcode(content, bom_encoding);
    }

    // The declaration is ASCII in every encoding this path accepts. A
    // declared UTF-16 without a BOM cannot be what the bytes really are.
    match declared_encoding(content) {
        Some(label) if !is_utf8_label(&label) && !is_utf16_label(&label) => {
            transcode(content, &label)
        }
        _ => std::str::from_utf8(content)
            .map(str::to_string)
            .map_err(|e| {
                EncodingError::new(format!(
                    "input is not valid UTF-8 (at byte {})",
                    e.valid_up_to() + skip
                ))
            }),
    }
}

/// Reads `encoding="..."` out of a leading XML declaration.
fn declared_encoding(bytes: &[u8]) -> Option<String> {
    if !bytes.starts_with(b"<?xml") {
        return None;
    }
    let end = bytes.windows(2).position(|w| w == b"?>")?;
    let decl = std::str::from_utf8(&bytes[..end]).ok()?;
    let rest = &decl[decl.find("encoding")? + "encoding".len()..];
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|&c| c == '"' || c == '\'')?;
    let value = &rest[1..];
    Some(value[..value.find(quote)?].to_string())
}

fn is_utf8_label(label: &str) -> bool {
    matches!(label.to_ascii_uppercase().as_str(), "UTF-8" | "UTF8")
}

fn is_utf16_label(label: &str) -> bool {
    label.to_ascii_uppercase().starts_with("UTF-16")
}
