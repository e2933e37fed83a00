//! Single-token predicates used by the parsers.

use std::fmt;

use crate::lexer::{Token, TokenKind};

/// Matches one token by kind, by exact text, or by both.
///
/// A condition can be inverted with [`not`](Condition::not), which is how
/// "anything but a closing brace" style loops are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Condition<'a> {
    kind: Option<TokenKind>,
    text: Option<&'a str>,
    negated: bool,
}

impl<'a> Condition<'a> {
    pub fn kind(kind: TokenKind) -> Self {
        Self {
            kind: Some(kind),
            text: None,
            negated: false,
        }
    }

    pub fn text(text: &'a str) -> Self {
        Self {
            kind: None,
            text: Some(text),
            negated: false,
        }
    }

    pub fn exact(kind: TokenKind, text: &'a str) -> Self {
        Self {
            kind: Some(kind),
            text: Some(text),
            negated: false,
        }
    }

    /// Identifier with the given text, the common keyword case.
    pub fn keyword(text: &'a str) -> Self {
        Self::exact(TokenKind::Identifier, text)
    }

    pub fn not(self) -> Self {
        Self {
            negated: !self.negated,
            ..self
        }
    }

    pub fn test(&self, token: &Token) -> bool {
        let kind_ok = self.kind.is_none_or(|k| token.kind == k);
        let text_ok = self.text.is_none_or(|t| token.text == t);
        (kind_ok && text_ok) != self.negated
    }
}

impl fmt::Display for Condition<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            f.write_str("anything but ")?;
        }
        match (self.kind, self.text) {
            (Some(kind), Some(text)) => write!(f, "{kind} '{text}'"),
            (Some(kind), None) => write!(f, "{kind}"),
            (None, Some(text)) => write!(f, "'{text}'"),
            (None, None) => f.write_str("any token"),
        }
    }
}
