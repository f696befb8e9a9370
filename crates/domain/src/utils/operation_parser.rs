//! GraphQL operation-document classifier.
//!
//! Finds the first executable definition of a document and reports its
//! kind and (optional) name. Fragment definitions, comments and string
//! literals are skipped; a shorthand selection set (`{ ... }`) is a query.
//!
//! Only ASCII punctuation and names are significant at the top level, so the
//! scanner walks bytes; multi-byte UTF-8 sequences can only occur inside
//! strings and comments, which are skipped as opaque runs.

use crate::types::transport::OperationKind;

/// Result of classifying an operation document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedOperation {
    pub kind: OperationKind,
    pub name: Option<String>,
}

/// Classify the first executable definition in `document`.
///
/// Returns `None` when the document has no query, mutation or subscription
/// (empty, fragment-only, or not GraphQL at all).
pub fn parse_operation(document: &str) -> Option<ParsedOperation> {
    let bytes = document.as_bytes();
    let mut depth = 0usize;
    let mut in_fragment = false;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'#' => {
                i = skip_comment(bytes, i);
                continue;
            }
            b'"' => {
                i = skip_string(bytes, i);
                continue;
            }
            b'{' => {
                if depth == 0 && !in_fragment {
                    return Some(ParsedOperation { kind: OperationKind::Query, name: None });
                }
                depth += 1;
            }
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    in_fragment = false;
                }
            }
            b if depth == 0 && is_name_start(b) => {
                let start = i;
                i = scan_name(bytes, i);
                let word = &document[start..i];

                if word == "fragment" {
                    in_fragment = true;
                } else if !in_fragment {
                    if let Some(kind) = keyword_kind(word) {
                        let name = next_name(document, i);
                        return Some(ParsedOperation { kind, name });
                    }
                }
                continue;
            }
            _ => {}
        }
        i += 1;
    }

    None
}

/// Exact (case-sensitive) operation keyword match.
fn keyword_kind(word: &str) -> Option<OperationKind> {
    word.parse::<OperationKind>().ok().filter(|kind| kind.to_string() == word)
}

/// Name token following an operation keyword, if any.
fn next_name(document: &str, from: usize) -> Option<String> {
    let bytes = document.as_bytes();
    let mut i = from;

    while i < bytes.len() {
        match bytes[i] {
            b' ' | b'\t' | b'\n' | b'\r' | b',' => i += 1,
            b'#' => i = skip_comment(bytes, i),
            b if is_name_start(b) => {
                let end = scan_name(bytes, i);
                return Some(document[i..end].to_string());
            }
            _ => return None,
        }
    }

    None
}

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn scan_name(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
    }
    i
}

fn skip_comment(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < bytes.len() && bytes[i] != b'\n' {
        i += 1;
    }
    i
}

/// Index just past the string literal opening at `start`.
fn skip_string(bytes: &[u8], start: usize) -> usize {
    if bytes[start..].starts_with(b"\"\"\"") {
        let mut i = start + 3;
        while i < bytes.len() {
            if bytes[i..].starts_with(b"\\\"\"\"") {
                i += 4;
            } else if bytes[i..].starts_with(b"\"\"\"") {
                return i + 3;
            } else {
                i += 1;
            }
        }
        return bytes.len();
    }

    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' | b'\n' => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}
