//! Comment stripping ahead of parsing.
//!
//! The scanner walks the text byte by byte and tracks quoting state, so
//! comment markers inside string literals, quoted identifiers and dollar
//! quotes are left alone. Every marker is ASCII, which keeps all slice
//! boundaries on UTF-8 character boundaries.

use crate::catalog::dialect::Dialect;

/// Lexical rules that decide where comments start and where quoting hides them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentSyntax {
    /// `#` starts a line comment.
    pub hash_comments: bool,
    /// `--` only starts a comment when followed by whitespace or end of input.
    pub dash_comment_needs_space: bool,
    /// Backslash escapes the next character inside quoted strings.
    pub backslash_escapes: bool,
    /// `$tag$ ... $tag$` dollar-quoted strings.
    pub dollar_quotes: bool,
    /// `E'...'` strings honor backslash escapes even when `backslash_escapes` is off.
    pub escape_string_prefix: bool,
    /// Backtick-quoted identifiers.
    pub backtick_identifiers: bool,
    /// `[bracketed]` identifiers.
    pub bracket_identifiers: bool,
    /// `/*! ... */` bodies are executed by the server and must be kept.
    pub executable_comments: bool,
    /// `/*` inside a block comment opens a nested comment that needs its own `*/`.
    pub nested_block_comments: bool,
}

impl Default for CommentSyntax {
    fn default() -> Self {
        Self {
            hash_comments: false,
            dash_comment_needs_space: false,
            backslash_escapes: false,
            dollar_quotes: false,
            escape_string_prefix: false,
            backtick_identifiers: true,
            bracket_identifiers: false,
            executable_comments: false,
            nested_block_comments: false,
        }
    }
}

impl CommentSyntax {
    /// Lexical rules of `dialect`.
    pub fn for_dialect(dialect: Dialect) -> Self {
        let base = Self::default();
        match dialect {
            Dialect::PostgreSql => Self {
                dollar_quotes: true,
                escape_string_prefix: true,
                backtick_identifiers: false,
                nested_block_comments: true,
                ..base
            },
            Dialect::MySql => Self {
                hash_comments: true,
                dash_comment_needs_space: true,
                backslash_escapes: true,
                executable_comments: true,
                ..base
            },
            Dialect::Databricks => Self {
                backslash_escapes: true,
                nested_block_comments: true,
                ..base
            },
            Dialect::ClickHouse => Self {
                hash_comments: true,
                backslash_escapes: true,
                nested_block_comments: true,
                ..base
            },
            Dialect::Sqlite => Self {
                bracket_identifiers: true,
                ..base
            },
        }
    }
}

/// Remove `--` line comments and `/* */` block comments.
///
/// Quoting follows ANSI rules plus backtick identifiers. Use
/// [`strip_comments_for`] to apply a dialect's full lexical rules.
pub fn strip_comments(text: &str) -> String {
    strip_comments_with(text, CommentSyntax::default())
}

/// Remove comments using the lexical rules of `dialect`.
pub fn strip_comments_for(text: &str, dialect: Dialect) -> String {
    strip_comments_with(text, CommentSyntax::for_dialect(dialect))
}

/// Remove comments using explicit lexical rules.
///
/// A block comment is replaced by one space so the tokens around it never
/// fuse; a line comment is removed up to, not including, its newline. An
/// unterminated block comment is left in place for the parser to reject.
pub fn strip_comments_with(text: &str, syntax: CommentSyntax) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut copied = 0usize;
    let mut i = 0usize;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' => {
                let escapes = syntax.backslash_escapes
                    || (syntax.escape_string_prefix && has_escape_string_prefix(bytes, i));
                i = skip_quoted(bytes, i, b'\'', escapes);
            }
            b'"' => i = skip_quoted(bytes, i, b'"', syntax.backslash_escapes),
            b'`' if syntax.backtick_identifiers => i = skip_quoted(bytes, i, b'`', false),
            b'[' if syntax.bracket_identifiers => {
                i = find_byte(bytes, i + 1, b']').map_or(bytes.len(), |end| end + 1);
            }
            b'$' if syntax.dollar_quotes => i = skip_dollar_quoted(bytes, i),
            b'-' if starts_dash_comment(bytes, i, syntax) => {
                out.push_str(&text[copied..i]);
                i = line_end(bytes, i);
                copied = i;
            }
            b'#' if syntax.hash_comments => {
                out.push_str(&text[copied..i]);
                i = line_end(bytes, i);
                copied = i;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let Some((body_end, comment_end)) =
                    block_comment_end(bytes, i, syntax.nested_block_comments)
                else {
                    break;
                };
                out.push_str(&text[copied..i]);
                out.push(' ');
                if syntax.executable_comments && bytes.get(i + 2) == Some(&b'!') {
                    let mut body_start = i + 3;
                    while body_start < body_end && bytes[body_start].is_ascii_digit() {
                        body_start += 1;
                    }
                    out.push_str(&text[body_start..body_end]);
                    out.push(' ');
                }
                i = comment_end;
                copied = i;
            }
            _ => i += 1,
        }
    }

    out.push_str(&text[copied..]);
    out
}

// ---- Helper functions ----

/// Index just past the quoted run that opens at `start`, or end of input.
fn skip_quoted(bytes: &[u8], start: usize, quote: u8, backslash_escapes: bool) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        let b = bytes[i];
        if backslash_escapes && b == b'\\' {
            i += 2;
            continue;
        }
        if b == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

/// True for `E'...'` / `e'...'` where the `E` is not the tail of an identifier.
fn has_escape_string_prefix(bytes: &[u8], quote_pos: usize) -> bool {
    if quote_pos == 0 || !matches!(bytes[quote_pos - 1], b'e' | b'E') {
        return false;
    }
    quote_pos < 2 || !is_identifier_byte(bytes[quote_pos - 2])
}

/// Skip a `$tag$ ... $tag$` string starting at `start`; a lone `$` or a
/// positional parameter such as `$1` only advances one byte.
fn skip_dollar_quoted(bytes: &[u8], start: usize) -> usize {
    let mut j = start + 1;
    while j < bytes.len() && is_identifier_byte(bytes[j]) {
        j += 1;
    }
    let tag_starts_with_digit = bytes.get(start + 1).is_some_and(u8::is_ascii_digit);
    if j >= bytes.len() || bytes[j] != b'$' || tag_starts_with_digit {
        return start + 1;
    }
    let delimiter = &bytes[start..=j];
    match find_seq(bytes, j + 1, delimiter) {
        Some(close) => close + delimiter.len(),
        None => bytes.len(),
    }
}

fn starts_dash_comment(bytes: &[u8], i: usize, syntax: CommentSyntax) -> bool {
    if bytes.get(i + 1) != Some(&b'-') {
        return false;
    }
    if !syntax.dash_comment_needs_space {
        return true;
    }
    bytes
        .get(i + 2)
        .is_none_or(|b| b.is_ascii_whitespace() || b.is_ascii_control())
}

/// `(body_end, comment_end)` of the block comment opening at `start`, or
/// `None` when it never closes.
fn block_comment_end(bytes: &[u8], start: usize, nested: bool) -> Option<(usize, usize)> {
    let mut depth = 1usize;
    let mut i = start + 2;
    while i + 1 < bytes.len() {
        match (bytes[i], bytes[i + 1]) {
            (b'*', b'/') => {
                depth -= 1;
                if depth == 0 {
                    return Some((i, i + 2));
                }
                i += 2;
            }
            (b'/', b'*') if nested => {
                depth += 1;
                i += 2;
            }
            _ => i += 1,
        }
    }
    None
}

/// Index of the newline ending the line comment at `start`, or end of input.
fn line_end(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < bytes.len() && bytes[i] != b'\n' && bytes[i] != b'\r' {
        i += 1;
    }
    i
}

fn find_byte(bytes: &[u8], from: usize, needle: u8) -> Option<usize> {
    bytes
        .get(from..)?
        .iter()
        .position(|b| *b == needle)
        .map(|offset| from + offset)
}

fn find_seq(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| from + offset)
}

fn is_identifier_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}
