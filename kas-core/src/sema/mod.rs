//! Semantic analysis: walks the token stream, executes directives and
//! turns `declare` blocks into resource instances on the target.
//!
//! The cursor API (`peek`, `read`, `expect`, `ensure`, `consume`) is shared
//! by every sub-parser; each one lives in its own module and exposes a
//! `test` / `parse` pair.

use std::path::PathBuf;

use tracing::debug;

use crate::diagnostic::DiagnosticSink;
use crate::error::CompileError;
use crate::lexer::Token;
use crate::registry::TypeRegistry;
use crate::target::Target;

pub mod condition;
pub mod declaration;
pub mod define;
pub mod directive;
pub mod stream;
pub mod value;

pub use condition::Condition;
pub use stream::TokenStream;

/// Imports may nest at most this deep.
pub const MAX_IMPORT_DEPTH: usize = 64;

pub struct Sema<'a> {
    stream: TokenStream,
    registry: &'a mut TypeRegistry,
    target: &'a mut Target,
    diagnostics: &'a mut dyn DiagnosticSink,
    include_dirs: Vec<PathBuf>,
    messages: Vec<String>,
}

impl<'a> Sema<'a> {
    pub fn new(
        tokens: Vec<Token>,
        registry: &'a mut TypeRegistry,
        target: &'a mut Target,
        diagnostics: &'a mut dyn DiagnosticSink,
    ) -> Self {
        Self {
            stream: TokenStream::new(tokens),
            registry,
            target,
            diagnostics,
            include_dirs: Vec::new(),
            messages: Vec::new(),
        }
    }

    /// Extra directories searched by `@import` after the importing file's
    /// own directory.
    pub fn with_include_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.include_dirs = dirs;
        self
    }

    /// Process the whole stream. Stops at the first fatal error.
    pub fn run(&mut self) -> Result<(), CompileError> {
        while !self.finished() {
            if directive::test(self) {
                directive::parse(self)?;
            } else if declaration::test(self) {
                let nodes = declaration::parse(self)?;
                for node in nodes {
                    self.target.add_tree(node);
                }
            } else {
                let token = self.peek(0)?;
                return Err(CompileError::syntax(
                    token.location.clone(),
                    format!("unexpected token '{}'", token.text),
                ));
            }
        }
        debug!(resources = self.target.len(), "semantic analysis finished");
        Ok(())
    }

    // -----------------------------------------------------------------
    // Cursor
    // -----------------------------------------------------------------

    pub fn finished(&self) -> bool {
        self.stream.is_finished()
    }

    pub fn peek(&self, offset: usize) -> Result<&Token, CompileError> {
        self.stream.peek(offset).ok_or_else(|| self.end_of_input())
    }

    /// Discard `offset` tokens, then consume and return the next one.
    pub fn read(&mut self, offset: usize) -> Result<Token, CompileError> {
        for _ in 0..offset {
            if self.stream.next_token().is_none() {
                return Err(self.end_of_input());
            }
        }
        match self.stream.next_token() {
            Some(token) => Ok(token),
            None => Err(self.end_of_input()),
        }
    }

    /// True when the upcoming tokens satisfy `conditions` one-to-one.
    pub fn expect(&self, conditions: &[Condition<'_>]) -> bool {
        conditions
            .iter()
            .enumerate()
            .all(|(i, c)| self.stream.peek(i).is_some_and(|t| c.test(t)))
    }

    /// Read one token per condition, failing on the first mismatch.
    pub fn ensure(&mut self, conditions: &[Condition<'_>]) -> Result<Vec<Token>, CompileError> {
        let mut tokens = Vec::with_capacity(conditions.len());
        for condition in conditions {
            tokens.push(self.ensure_one(*condition)?);
        }
        Ok(tokens)
    }

    pub fn ensure_one(&mut self, condition: Condition<'_>) -> Result<Token, CompileError> {
        let mismatch = match self.stream.peek(0) {
            Some(token) if condition.test(token) => None,
            Some(token) => Some(CompileError::syntax(
                token.location.clone(),
                format!("expected {condition} but found '{}'", token.text),
            )),
            None => Some(CompileError::syntax(
                self.stream.last_location().clone(),
                format!("expected {condition} but reached the end of input"),
            )),
        };
        match mismatch {
            Some(err) => Err(err),
            None => self.read(0),
        }
    }

    /// Read tokens while `condition` holds.
    pub fn consume(&mut self, condition: Condition<'_>) -> Vec<Token> {
        let mut tokens = Vec::new();
        while self.stream.peek(0).is_some_and(|t| condition.test(t)) {
            if let Some(token) = self.stream.next_token() {
                tokens.push(token);
            }
        }
        tokens
    }

    /// Read the next token if it matches.
    pub fn accept(&mut self, condition: Condition<'_>) -> Option<Token> {
        if self.expect(&[condition]) {
            self.stream.next_token()
        } else {
            None
        }
    }

    /// Splice `tokens` in front of the unread remainder.
    pub fn insert_tokens(&mut self, tokens: Vec<Token>) -> Result<(), CompileError> {
        if self.stream.depth() >= MAX_IMPORT_DEPTH {
            return Err(CompileError::semantic(
                self.stream.last_location().clone(),
                format!("imports are nested deeper than {MAX_IMPORT_DEPTH} levels"),
            ));
        }
        self.stream.splice(tokens);
        Ok(())
    }

    fn end_of_input(&self) -> CompileError {
        CompileError::syntax(
            self.stream.last_location().clone(),
            "unexpected end of input",
        )
    }

    // -----------------------------------------------------------------
    // Shared state
    // -----------------------------------------------------------------

    pub fn registry(&self) -> &TypeRegistry {
        self.registry
    }

    pub fn registry_mut(&mut self) -> &mut TypeRegistry {
        self.registry
    }

    pub fn diagnostics(&mut self) -> &mut dyn DiagnosticSink {
        &mut *self.diagnostics
    }

    pub fn include_dirs(&self) -> &[PathBuf] {
        &self.include_dirs
    }

    pub fn push_message(&mut self, message: String) {
        self.messages.push(message);
    }

    pub fn into_messages(self) -> Vec<String> {
        self.messages
    }
}
