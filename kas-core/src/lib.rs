//! Core pipeline of the KDL resource compiler.
//!
//! The pipeline is roughly:
//!
//!   source .kdl
//!     -> lexer       (tokens)
//!     -> sema        (directives, type definitions, declarations)
//!     -> registry + target (schemas and declared instances)
//!     -> assembler   (one binary blob per instance)
//!     -> rsrc        (standard, extended or rez container)
//!
//! The CLI depends on this crate rather than reimplementing the pipeline.

// ---------------------------------------------------------------------
// Error handling and diagnostics
// ---------------------------------------------------------------------

pub mod span;
pub mod diagnostic;
pub mod error;

// ---------------------------------------------------------------------
// Front-end: sources and lexing
// ---------------------------------------------------------------------

pub mod charset;
pub mod sources;
pub mod lexer;

// ---------------------------------------------------------------------
// Semantic layers: schemas, instances, parsing
// ---------------------------------------------------------------------

pub mod schema;
pub mod registry;
pub mod resource;
pub mod sema;

// ---------------------------------------------------------------------
// Back-end: assembly, container encoding and orchestration
// ---------------------------------------------------------------------

pub mod buffer;
pub mod resolver;
pub mod assembler;
pub mod target;
pub mod rsrc;
pub mod compiler;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use compiler::{
    CompilationArtifact, CompileOptions, ResourceSummary, compile_path, compile_source,
    compile_to_file,
};
pub use diagnostic::{Diagnostic, DiagnosticSink, Severity};
pub use error::CompileError;
pub use rsrc::Format;
