//! Identifier canonicalisation.
//!
//! Every name is checked before it enters the atom table. Plain identifiers
//! pass through; operator names are rewritten to `operator<sym>` whether
//! they were spelled with the symbol (`operator+`, `operator +`) or the
//! textual keyword (`operator add`, `operator_add`).

use std::borrow::Cow;

use crate::ResolveError;

/// Names the language reserves for itself.
pub const RESERVED: &[&str] = &[
    "assert", "break", "cast", "class", "continue", "destroy", "dtor", "else", "false", "fn",
    "global", "if", "let", "module", "namespace", "new", "operator", "return", "true", "while",
];

/// Operator symbols that may be overloaded.
pub const OPERATOR_SYMBOLS: &[&str] = &[
    "+", "-", "*", "/", "%", "==", "!=", "<", "<=", ">", ">=", "&", "|", "^", "<<", ">>", "!", "[]",
];

const OPERATOR_KEYWORDS: &[(&str, &str)] = &[
    ("add", "+"),
    ("sub", "-"),
    ("mul", "*"),
    ("div", "/"),
    ("rem", "%"),
    ("eq", "=="),
    ("ne", "!="),
    ("lt", "<"),
    ("le", "<="),
    ("gt", ">"),
    ("ge", ">="),
    ("and", "&"),
    ("or", "|"),
    ("xor", "^"),
    ("not", "!"),
    ("shl", "<<"),
    ("shr", ">>"),
    ("index", "[]"),
];

/// Canonical name of the operator overload for `symbol`.
pub fn operator_name(symbol: &str) -> String {
    format!("operator{symbol}")
}

pub fn is_plain_identifier(raw: &str) -> bool {
    let mut chars = raw.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validate `raw` and return its canonical spelling.
pub fn canonicalize(raw: &str) -> Result<Cow<'_, str>, ResolveError> {
    let invalid = || ResolveError::InvalidIdentifier {
        name: raw.to_string(),
    };

    if let Some(rest) = raw.strip_prefix("operator") {
        let op = rest.strip_prefix('_').unwrap_or(rest).trim_start();
        if OPERATOR_SYMBOLS.contains(&op) {
            return Ok(if op.len() == rest.len() {
                Cow::Borrowed(raw)
            } else {
                Cow::Owned(operator_name(op))
            });
        }
        if let Some((_, sym)) = OPERATOR_KEYWORDS.iter().find(|(kw, _)| *kw == op) {
            return Ok(Cow::Owned(operator_name(sym)));
        }
        if !rest.is_empty() && is_plain_identifier(raw) {
            // `operators`, `operator_count`: ordinary identifiers.
            return Ok(Cow::Borrowed(raw));
        }
        return Err(invalid());
    }

    if !is_plain_identifier(raw) || RESERVED.contains(&raw) {
        return Err(invalid());
    }
    Ok(Cow::Borrowed(raw))
}
