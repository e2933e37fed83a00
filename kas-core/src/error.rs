use std::path::PathBuf;

use thiserror::Error;

use crate::diagnostic::Diagnostic;
use crate::span::SourceLocation;

/// The single fatal error type of the compiler.
///
/// There is no recovery: the first `CompileError` produced by any stage
/// aborts the run and no output file is written.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{location}: lexical error: {message}")]
    Lexical {
        location: SourceLocation,
        message: String,
    },
    #[error("{location}: syntax error: {message}")]
    Syntax {
        location: SourceLocation,
        message: String,
    },
    #[error("{location}: {message}")]
    Semantic {
        location: SourceLocation,
        message: String,
    },
    #[error("layout error: {0}")]
    Layout(String),
    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),
}

impl CompileError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CompileError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn lexical(location: SourceLocation, message: impl Into<String>) -> Self {
        CompileError::Lexical {
            location,
            message: message.into(),
        }
    }

    pub fn syntax(location: SourceLocation, message: impl Into<String>) -> Self {
        CompileError::Syntax {
            location,
            message: message.into(),
        }
    }

    pub fn semantic(location: SourceLocation, message: impl Into<String>) -> Self {
        CompileError::Semantic {
            location,
            message: message.into(),
        }
    }

    pub fn layout(message: impl Into<String>) -> Self {
        CompileError::Layout(message.into())
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            CompileError::Lexical { location, .. }
            | CompileError::Syntax { location, .. }
            | CompileError::Semantic { location, .. } => Some(location),
            _ => None,
        }
    }

    /// Convert the error into a diagnostic for a sink.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let (message, code) = match self {
            CompileError::Io { .. } => (self.to_string(), "E0000"),
            CompileError::Lexical { message, .. } => (message.clone(), "E0001"),
            CompileError::Syntax { message, .. } => (message.clone(), "E0002"),
            CompileError::Semantic { message, .. } => (message.clone(), "E0003"),
            CompileError::Layout(message) => (message.clone(), "E0004"),
            CompileError::UnsupportedFormat(_) => (self.to_string(), "E0005"),
        };
        let location = match self {
            CompileError::Io { path, .. } => SourceLocation::new(path.display().to_string(), 0),
            _ => self
                .location()
                .cloned()
                .unwrap_or_else(SourceLocation::unknown),
        };
        Diagnostic::error(message, location).with_code(code)
    }
}
