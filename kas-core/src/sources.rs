use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::CompileError;
use crate::lexer::{Token, tokenize};

pub const SOURCE_EXTENSION: &str = "kdl";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub contents: String,
}

impl SourceFile {
    pub fn read(path: impl Into<PathBuf>) -> Result<Self, CompileError> {
        let path = path.into();
        let contents = fs::read_to_string(&path).map_err(|e| CompileError::io(&path, e))?;
        Ok(Self { path, contents })
    }

    pub fn tokenize(&self) -> Result<Vec<Token>, CompileError> {
        tokenize(&self.contents, self.path.display().to_string())
    }
}

/// A single file, or every `.kdl` file below a directory sorted by path.
pub fn load_sources(input: impl AsRef<Path>) -> Result<Vec<SourceFile>, CompileError> {
    let input = input.as_ref();
    if !input.is_dir() {
        return Ok(vec![SourceFile::read(input)?]);
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(input).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(input).to_path_buf();
            CompileError::io(path, e.into())
        })?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == SOURCE_EXTENSION) {
            paths.push(path.to_path_buf());
        }
    }
    paths.sort();
    paths.into_iter().map(SourceFile::read).collect()
}

/// Lex each file on its own and concatenate the tokens in order.
pub fn tokenize_all(sources: &[SourceFile]) -> Result<Vec<Token>, CompileError> {
    let mut tokens = Vec::new();
    for source in sources {
        tokens.extend(source.tokenize()?);
    }
    Ok(tokens)
}
