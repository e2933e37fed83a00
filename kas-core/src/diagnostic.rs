//! Diagnostics and the sinks that receive them.
//!
//! Fatal problems travel as [`CompileError`](crate::CompileError) values;
//! everything that should be reported without stopping the run (deprecated
//! fields, duplicate ids) is pushed into a [`DiagnosticSink`].

use std::fmt;

use tracing::{error, info, warn};

use crate::span::SourceLocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub location: SourceLocation,
    pub code: Option<&'static str>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, location: SourceLocation) -> Self {
        Self::new(Severity::Error, message, location)
    }

    pub fn warning(message: impl Into<String>, location: SourceLocation) -> Self {
        Self::new(Severity::Warning, message, location)
    }

    pub fn note(message: impl Into<String>, location: SourceLocation) -> Self {
        Self::new(Severity::Note, message, location)
    }

    fn new(severity: Severity, message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            severity,
            message: message.into(),
            location,
            code: None,
        }
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(
                f,
                "{}: {}[{}]: {}",
                self.location, self.severity, code, self.message
            ),
            None => write!(f, "{}: {}: {}", self.location, self.severity, self.message),
        }
    }
}

/// Receiver for every diagnostic the pipeline emits.
pub trait DiagnosticSink {
    fn emit(&mut self, diagnostic: Diagnostic);
}

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => error!("{diagnostic}"),
            Severity::Warning => warn!("{diagnostic}"),
            Severity::Note => info!("{diagnostic}"),
        }
    }
}

/// Keeps every diagnostic in emission order.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub diagnostics: Vec<Diagnostic>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> + '_ {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

impl DiagnosticSink for CollectingSink {
    fn emit(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

/// Collects diagnostics and also forwards them to `tracing`.
#[derive(Debug, Default)]
pub struct LoggingCollector {
    inner: CollectingSink,
}

impl LoggingCollector {
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.inner.into_diagnostics()
    }
}

impl DiagnosticSink for LoggingCollector {
    fn emit(&mut self, diagnostic: Diagnostic) {
        TracingSink.emit(diagnostic.clone());
        self.inner.emit(diagnostic);
    }
}
