//! Delimiter-balanced block scanning.
//!
//! Locates the end of a block such as
//! `const x = useMemo(() => { ... }, [a, b]);` by counting `()`, `[]` and
//! `{}` instead of relying on a regex that stops at the first closing brace.
//! String literals (`'`, `"`, backtick) and `//` / `/* */` comments are
//! skipped so delimiters inside them do not count.

use std::fmt;

/// Why a block could not be delimited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// No opening delimiter before the end of input.
    NoOpening,
    /// A closing delimiter did not match the innermost open one.
    Mismatched { offset: usize },
    /// Input ended with delimiters still open.
    Unterminated { offset: usize },
}

impl ScanError {
    /// Byte offset (relative to the scan start) where scanning gave up.
    pub fn offset(&self) -> Option<usize> {
        match self {
            ScanError::NoOpening => None,
            ScanError::Mismatched { offset } | ScanError::Unterminated { offset } => Some(*offset),
        }
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::NoOpening => write!(f, "no opening delimiter found"),
            ScanError::Mismatched { offset } => {
                write!(f, "mismatched closing delimiter at byte {}", offset)
            }
            ScanError::Unterminated { offset } => {
                write!(f, "block opened at byte {} is never closed", offset)
            }
        }
    }
}

impl std::error::Error for ScanError {}

fn closing_for(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

/// Find the exclusive end offset of the balanced block starting in `text`.
///
/// Scanning begins at offset 0. The block ends at the delimiter that brings
/// the depth back to zero, extended by an immediately following `;` and then
/// by up to `trailing_newlines` newline characters.
pub fn block_end(text: &str, trailing_newlines: usize) -> Result<usize, ScanError> {
    let bytes = text.as_bytes();
    let mut stack: Vec<(char, usize)> = Vec::new();
    let mut close_at = None;
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            '\'' | '"' | '`' => {
                i = skip_string(bytes, i);
                continue;
            }
            '/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            '/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
                continue;
            }
            '(' | '[' | '{' => stack.push((c, i)),
            ')' | ']' | '}' => {
                match stack.pop() {
                    Some((open, _)) if closing_for(open) == c => {}
                    _ => return Err(ScanError::Mismatched { offset: i }),
                }
                if stack.is_empty() {
                    close_at = Some(i + 1);
                    break;
                }
            }
            _ => {}
        }
        i += 1;
    }

    let mut end = match (close_at, stack.first()) {
        (Some(end), _) => end,
        (None, Some(&(_, opened))) => return Err(ScanError::Unterminated { offset: opened }),
        (None, None) => return Err(ScanError::NoOpening),
    };

    if bytes.get(end) == Some(&b';') {
        end += 1;
    }
    let mut newlines = 0;
    while newlines < trailing_newlines && bytes.get(end) == Some(&b'\n') {
        end += 1;
        newlines += 1;
    }

    Ok(end)
}

/// Skip a quoted literal starting at `start`, returning the offset just past
/// the closing quote (or end of input).
fn skip_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            // Plain quotes do not span lines; template literals do
            b'\n' if quote != b'`' => return i,
            _ => i += 1,
        }
    }
    bytes.len()
}
