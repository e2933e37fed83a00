//! Source locations attached to tokens, resources and diagnostics.

use std::fmt;
use std::sync::Arc;

/// A file name plus a 1-based line number.
///
/// File names are shared between every token lexed from the same file,
/// so cloning a location is cheap.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub file: Arc<str>,
    pub line: usize,
}

impl SourceLocation {
    pub fn new(file: impl Into<Arc<str>>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// Location used for things that have no source text behind them,
    /// such as defaults synthesised by the compiler.
    pub fn unknown() -> Self {
        Self::new("<unknown>", 0)
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}
