use std::path::{Path, PathBuf};

use tracing::info;

use crate::diagnostic::{Diagnostic, DiagnosticSink, LoggingCollector};
use crate::error::CompileError;
use crate::lexer::{Token, tokenize};
use crate::registry::TypeRegistry;
use crate::resolver::DiskFileResolver;
use crate::rsrc::Format;
use crate::sema::Sema;
use crate::sources::{load_sources, tokenize_all};
use crate::target::Target;

pub const DEFAULT_OUTPUT: &str = "kestrel-plugin.kdat";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOptions {
    pub format: Format,
    /// Searched by `@import` after the importing file's directory.
    pub include_dirs: Vec<PathBuf>,
}

/// One resource as laid out in the output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSummary {
    pub type_code: String,
    pub id: i64,
    pub name: String,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationArtifact {
    pub bytes: Vec<u8>,
    pub resources: Vec<ResourceSummary>,
    /// Text printed by `@out`.
    pub messages: Vec<String>,
    /// Warnings and `@out` notes emitted along the way.
    pub diagnostics: Vec<Diagnostic>,
}

pub fn compile_source(
    source: &str,
    file_name: &str,
    options: &CompileOptions,
) -> Result<CompilationArtifact, CompileError> {
    let mut sink = LoggingCollector::default();
    let result = tokenize(source, file_name).and_then(|tokens| {
        compile_tokens(tokens, &mut Target::new(DEFAULT_OUTPUT), options, &mut sink)
    });
    finish(result, sink)
}

/// Compile a `.kdl` file or every `.kdl` file below a directory.
pub fn compile_path(
    input: impl AsRef<Path>,
    options: &CompileOptions,
) -> Result<CompilationArtifact, CompileError> {
    let mut sink = LoggingCollector::default();
    let result = load_tokens(input.as_ref()).and_then(|tokens| {
        compile_tokens(tokens, &mut Target::new(DEFAULT_OUTPUT), options, &mut sink)
    });
    finish(result, sink)
}

/// [`compile_path`], then write the container to `output`. Nothing is
/// written when compilation fails.
pub fn compile_to_file(
    input: impl AsRef<Path>,
    output: impl Into<PathBuf>,
    options: &CompileOptions,
) -> Result<CompilationArtifact, CompileError> {
    let mut sink = LoggingCollector::default();
    let mut target = Target::new(output);
    let result = load_tokens(input.as_ref())
        .and_then(|tokens| compile_tokens(tokens, &mut target, options, &mut sink))
        .and_then(|artifact| {
            target.write(&artifact.bytes)?;
            Ok(artifact)
        });
    finish(result, sink)
}

fn load_tokens(input: &Path) -> Result<Vec<Token>, CompileError> {
    tokenize_all(&load_sources(input)?)
}

/// Fatal errors go through the same sink as warnings before being returned.
fn finish(
    result: Result<CompilationArtifact, CompileError>,
    mut sink: LoggingCollector,
) -> Result<CompilationArtifact, CompileError> {
    let result = report_failure(result, &mut sink);
    result.map(|mut artifact| {
        artifact.diagnostics = sink.into_diagnostics();
        artifact
    })
}

fn report_failure<T>(
    result: Result<T, CompileError>,
    sink: &mut dyn DiagnosticSink,
) -> Result<T, CompileError> {
    if let Err(err) = &result {
        sink.emit(err.to_diagnostic());
    }
    result
}

fn compile_tokens(
    tokens: Vec<Token>,
    target: &mut Target,
    options: &CompileOptions,
    sink: &mut dyn DiagnosticSink,
) -> Result<CompilationArtifact, CompileError> {
    let mut registry = TypeRegistry::new();

    let messages = {
        let mut sema = Sema::new(tokens, &mut registry, target, &mut *sink)
            .with_include_dirs(options.include_dirs.clone());
        sema.run()?;
        sema.into_messages()
    };

    let mut resolver = DiskFileResolver::new();
    let file = target.assemble(&registry, &mut resolver, &mut *sink)?;
    let bytes = file.encode(options.format)?;
    info!(
        format = %options.format,
        types = registry.len(),
        resources = file.resource_count(),
        bytes = bytes.len(),
        "compiled resource file"
    );

    let resources = file
        .resources()
        .map(|(code, resource)| ResourceSummary {
            type_code: code.to_string(),
            id: resource.id,
            name: resource.name.clone(),
            size: resource.data.len(),
        })
        .collect();

    Ok(CompilationArtifact {
        bytes,
        resources,
        messages,
        diagnostics: Vec::new(),
    })
}
