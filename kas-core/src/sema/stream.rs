//! A token cursor made of spliced segments.
//!
//! `@import` pushes the imported file's tokens as a new segment in front
//! of whatever remains of the current one, so the imported text is read
//! to the end before the importing file resumes. Segments are never
//! copied into each other.
//!
//! Each segment records how many splices deep it sits, so a file that
//! imports itself is caught even when the import is its last statement.

use crate::lexer::Token;
use crate::span::SourceLocation;

#[derive(Debug)]
struct Segment {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Segment {
    fn remaining(&self) -> &[Token] {
        &self.tokens[self.pos..]
    }

    fn is_exhausted(&self) -> bool {
        self.pos >= self.tokens.len()
    }
}

#[derive(Debug)]
pub struct TokenStream {
    /// Innermost (currently read) segment last.
    segments: Vec<Segment>,
    last_location: SourceLocation,
    last_depth: usize,
}

impl TokenStream {
    pub fn new(tokens: Vec<Token>) -> Self {
        let mut segments = Vec::new();
        if !tokens.is_empty() {
            segments.push(Segment {
                tokens,
                pos: 0,
                depth: 0,
            });
        }
        Self {
            segments,
            last_location: SourceLocation::unknown(),
            last_depth: 0,
        }
    }

    /// Insert `tokens` so they are read next, one level deeper than the
    /// segment the last token was read from.
    pub fn splice(&mut self, tokens: Vec<Token>) {
        self.drop_exhausted();
        if tokens.is_empty() {
            return;
        }
        self.segments.push(Segment {
            tokens,
            pos: 0,
            depth: self.last_depth + 1,
        });
    }

    /// Splice depth of the segment the last token was read from.
    pub fn depth(&self) -> usize {
        self.last_depth
    }

    pub fn is_finished(&self) -> bool {
        self.segments.iter().all(Segment::is_exhausted)
    }

    pub fn peek(&self, offset: usize) -> Option<&Token> {
        let mut skip = offset;
        for segment in self.segments.iter().rev() {
            let remaining = segment.remaining();
            if skip < remaining.len() {
                return Some(&remaining[skip]);
            }
            skip -= remaining.len();
        }
        None
    }

    pub fn next_token(&mut self) -> Option<Token> {
        self.drop_exhausted();
        let segment = self.segments.last_mut()?;
        let token = segment.tokens[segment.pos].clone();
        segment.pos += 1;
        self.last_depth = segment.depth;
        self.last_location = token.location.clone();
        self.drop_exhausted();
        Some(token)
    }

    /// Where the most recently read token came from, for end-of-input
    /// errors.
    pub fn last_location(&self) -> &SourceLocation {
        &self.last_location
    }

    fn drop_exhausted(&mut self) {
        while self.segments.last().is_some_and(Segment::is_exhausted) {
            self.segments.pop();
        }
    }
}
