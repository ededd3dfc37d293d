use sqlparser::ast::Ident;
use std::fmt;

/// One identifier as written: its text without delimiters, and whether it
/// was delimited.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    /// Identifier text without surrounding quotes.
    pub value: String,
    /// Whether the identifier was written inside `"..."`, `` `...` `` or `[...]`.
    pub quoted: bool,
}

impl Identifier {
    /// An unquoted identifier.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            quoted: false,
        }
    }

    /// A delimited identifier, compared exactly by dialects that fold case.
    pub fn quoted(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            quoted: true,
        }
    }

    /// Read one identifier token, recognizing `"..."`, `` `...` `` and `[...]`.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let inner = unquote_identifier(raw);
        if inner.len() == raw.len() {
            Self::new(raw)
        } else {
            Self::quoted(inner)
        }
    }
}

impl From<&Ident> for Identifier {
    fn from(ident: &Ident) -> Self {
        Self {
            value: ident.value.clone(),
            quoted: ident.quote_style.is_some(),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.quoted {
            write!(f, "\"{}\"", self.value)
        } else {
            f.write_str(&self.value)
        }
    }
}

/// How a dialect decides whether two identifiers name the same object.
///
/// Comparison keys only ever fold ASCII letters. A server that folds more
/// than that can only see two names as equal where sqlgate sees them as
/// different, never the other way round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierCase {
    /// Unquoted identifiers fold to lowercase; quoted identifiers are exact.
    FoldUnquoted,
    /// Identifiers compare without regard to case, quoted or not.
    Insensitive,
    /// Identifiers compare exactly, quoted or not.
    Sensitive,
}

impl IdentifierCase {
    /// Comparison key of `ident` under this rule.
    pub fn key(self, ident: &Identifier) -> String {
        match self {
            IdentifierCase::FoldUnquoted if ident.quoted => ident.value.clone(),
            IdentifierCase::FoldUnquoted | IdentifierCase::Insensitive => {
                ident.value.to_ascii_lowercase()
            }
            IdentifierCase::Sensitive => ident.value.clone(),
        }
    }
}

/// Return the identifier without its surrounding quote characters.
///
/// Recognizes `"ident"`, `` `ident` `` and `[ident]`.
pub fn unquote_identifier(ident: &str) -> &str {
    for (open, close) in [('"', '"'), ('`', '`'), ('[', ']')] {
        if let Some(inner) = ident
            .strip_prefix(open)
            .and_then(|s| s.strip_suffix(close))
        {
            return inner;
        }
    }
    ident
}

/// Normalize a configured name for case-insensitive matching.
///
/// Trims whitespace, removes surrounding quotes on a single identifier,
/// and lowercases the result.
pub fn normalize_identifier(ident: &str) -> String {
    unquote_identifier(ident.trim()).to_ascii_lowercase()
}

/// Split a potentially qualified name into its identifiers.
///
/// Handles dots inside quoted identifiers, e.g. `"my.schema"."table.name"`
/// yields `my.schema` and `table.name`, both marked quoted.
pub fn split_qualified_name(name: &str) -> Vec<Identifier> {
    let mut closing: Option<char> = None;
    let mut start = 0usize;
    let mut parts = Vec::new();

    for (idx, ch) in name.char_indices() {
        match closing {
            Some(close) if ch == close => closing = None,
            Some(_) => {}
            None => match ch {
                '"' => closing = Some('"'),
                '`' => closing = Some('`'),
                '[' => closing = Some(']'),
                '.' => {
                    parts.push(Identifier::parse(&name[start..idx]));
                    start = idx + 1;
                }
                _ => {}
            },
        }
    }
    parts.push(Identifier::parse(&name[start..]));
    parts
}
