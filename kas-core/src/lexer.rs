//! Lexer for KDL source text.
//!
//! Produces a flat token list; every token remembers the file and line it
//! came from. There is no end-of-file token: the sema cursor checks for
//! the end of the stream itself.

use std::fmt;
use std::sync::Arc;

use crate::error::CompileError;
use crate::span::SourceLocation;

/// Kind of a token produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Words and literals
    Directive,
    Identifier,
    String,
    ResourceId,
    Integer,
    Percentage,

    // Punctuation
    LBrace,    // {
    RBrace,    // }
    LParen,    // (
    RParen,    // )
    LAngle,    // <
    RAngle,    // >
    Equals,    // =
    Plus,      // +
    Minus,     // -
    Star,      // *
    Slash,     // /
    Colon,     // :
    Comma,     // ,
    Dot,       // .
    Ampersand, // &
    Pipe,      // |
    Caret,     // ^
    Semicolon, // ;
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Directive => "directive",
            TokenKind::Identifier => "identifier",
            TokenKind::String => "string",
            TokenKind::ResourceId => "resource id",
            TokenKind::Integer => "integer",
            TokenKind::Percentage => "percentage",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LAngle => "'<'",
            TokenKind::RAngle => "'>'",
            TokenKind::Equals => "'='",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Colon => "':'",
            TokenKind::Comma => "','",
            TokenKind::Dot => "'.'",
            TokenKind::Ampersand => "'&'",
            TokenKind::Pipe => "'|'",
            TokenKind::Caret => "'^'",
            TokenKind::Semicolon => "';'",
        };
        f.write_str(text)
    }
}

/// A single token.
///
/// `text` holds the meaningful part only: string tokens drop their quotes,
/// directives their `@`, resource ids their `#` and percentages their `%`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub location: SourceLocation,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            kind,
            text: text.into(),
            location,
        }
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

/// Lex `source`, tagging tokens with `file_name`.
pub fn tokenize(source: &str, file_name: impl Into<Arc<str>>) -> Result<Vec<Token>, CompileError> {
    // A trailing newline guarantees every construct is terminated.
    let mut text = String::with_capacity(source.len() + 1);
    text.push_str(source);
    text.push('\n');

    let mut lexer = Lexer {
        file: file_name.into(),
        chars: text.chars().collect(),
        index: 0,
        line: 1,
        line_has_content: false,
    };
    lexer.run()
}

struct Lexer {
    file: Arc<str>,
    chars: Vec<char>,
    index: usize,
    line: usize,
    line_has_content: bool,
}

impl Lexer {
    fn run(&mut self) -> Result<Vec<Token>, CompileError> {
        let mut tokens = Vec::new();

        while let Some(ch) = self.peek_char() {
            if ch == '\n' {
                self.consume_char();
                self.line += 1;
                self.line_has_content = false;
                continue;
            }
            if is_horizontal_whitespace(ch) {
                self.consume_char();
                continue;
            }
            if ch == ';' && !self.line_has_content {
                self.skip_comment();
                continue;
            }

            self.line_has_content = true;
            let token = match ch {
                '@' => self.lex_directive()?,
                '"' => self.lex_string()?,
                '#' => self.lex_resource_id()?,
                '0'..='9' => self.lex_number(),
                c if is_ident_start(c) => self.lex_identifier(),
                _ => {
                    let kind = punctuation(ch).ok_or_else(|| {
                        CompileError::lexical(
                            self.location(),
                            format!("unrecognised character '{ch}'"),
                        )
                    })?;
                    self.consume_char();
                    self.token(kind, ch.to_string())
                }
            };
            tokens.push(token);
        }

        Ok(tokens)
    }

    fn skip_comment(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch == '\n' {
                break;
            }
            self.consume_char();
        }
    }

    fn lex_directive(&mut self) -> Result<Token, CompileError> {
        let location = self.location();
        self.consume_char(); // '@'
        let name = self.take_while(is_ident_continue);
        if name.is_empty() {
            return Err(CompileError::lexical(
                location,
                "expected a directive name after '@'",
            ));
        }
        Ok(Token::new(TokenKind::Directive, name, location))
    }

    fn lex_string(&mut self) -> Result<Token, CompileError> {
        let location = self.location();
        self.consume_char(); // opening quote

        let mut content = String::new();
        while let Some(ch) = self.peek_char() {
            self.consume_char();
            match ch {
                '"' => return Ok(Token::new(TokenKind::String, content, location)),
                '\n' => {
                    self.line += 1;
                    content.push(ch);
                }
                _ => content.push(ch),
            }
        }

        Err(CompileError::lexical(location, "unterminated string literal"))
    }

    fn lex_resource_id(&mut self) -> Result<Token, CompileError> {
        let location = self.location();
        self.consume_char(); // '#'
        let digits = self.take_while(|c| c.is_ascii_digit());
        if digits.is_empty() {
            return Err(CompileError::lexical(
                location,
                "expected digits after '#' in resource id",
            ));
        }
        Ok(Token::new(TokenKind::ResourceId, digits, location))
    }

    fn lex_number(&mut self) -> Token {
        let location = self.location();
        let mut digits = String::new();
        while let Some(ch) = self.peek_char() {
            if ch.is_ascii_digit() {
                digits.push(ch);
                self.consume_char();
            } else if is_digit_separator(ch) && self.peek_next().is_some_and(|c| c.is_ascii_digit())
            {
                digits.push(ch);
                self.consume_char();
            } else {
                break;
            }
        }

        if self.peek_char() == Some('%') {
            self.consume_char();
            Token::new(TokenKind::Percentage, digits, location)
        } else {
            Token::new(TokenKind::Integer, digits, location)
        }
    }

    fn lex_identifier(&mut self) -> Token {
        let location = self.location();
        let name = self.take_while(is_ident_continue);
        Token::new(TokenKind::Identifier, name, location)
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut text = String::new();
        while let Some(ch) = self.peek_char() {
            if !pred(ch) {
                break;
            }
            text.push(ch);
            self.consume_char();
        }
        text
    }

    fn token(&self, kind: TokenKind, text: String) -> Token {
        Token::new(kind, text, self.location())
    }

    fn location(&self) -> SourceLocation {
        SourceLocation {
            file: Arc::clone(&self.file),
            line: self.line,
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.index + 1).copied()
    }

    fn consume_char(&mut self) {
        if self.index < self.chars.len() {
            self.index += 1;
        }
    }
}

fn punctuation(ch: char) -> Option<TokenKind> {
    let kind = match ch {
        '{' => TokenKind::LBrace,
        '}' => TokenKind::RBrace,
        '(' => TokenKind::LParen,
        ')' => TokenKind::RParen,
        '<' => TokenKind::LAngle,
        '>' => TokenKind::RAngle,
        '=' => TokenKind::Equals,
        '+' => TokenKind::Plus,
        '-' => TokenKind::Minus,
        '*' => TokenKind::Star,
        '/' => TokenKind::Slash,
        ':' => TokenKind::Colon,
        ',' => TokenKind::Comma,
        '.' => TokenKind::Dot,
        '&' => TokenKind::Ampersand,
        '|' => TokenKind::Pipe,
        '^' => TokenKind::Caret,
        ';' => TokenKind::Semicolon,
        _ => return None,
    };
    Some(kind)
}

fn is_horizontal_whitespace(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\r')
}

fn is_digit_separator(ch: char) -> bool {
    matches!(ch, '_' | ',')
}

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn is_ident_continue(ch: char) -> bool {
    is_ident_start(ch) || ch.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source, "test.kdl")
            .expect("lex")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_directive_block() {
        let tokens = tokenize("@out { \"hello\" }", "test.kdl").expect("lex");
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0].kind, TokenKind::Directive);
        assert_eq!(tokens[0].text, "out");
        assert_eq!(tokens[2].kind, TokenKind::String);
        assert_eq!(tokens[2].text, "hello");
    }

    #[test]
    fn lexes_literals() {
        let tokens = tokenize("#128 42 75% rgb", "test.kdl").expect("lex");
        let pairs: Vec<_> = tokens.iter().map(|t| (t.kind, t.text.as_str())).collect();
        assert_eq!(
            pairs,
            vec![
                (TokenKind::ResourceId, "128"),
                (TokenKind::Integer, "42"),
                (TokenKind::Percentage, "75"),
                (TokenKind::Identifier, "rgb"),
            ]
        );
    }

    #[test]
    fn keeps_digit_grouping_inside_numbers() {
        let tokens = tokenize("1_000 2,500 3, 4", "test.kdl").expect("lex");
        let texts: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["1_000", "2,500", "3", ",", "4"]);
    }

    #[test]
    fn tracks_lines() {
        let tokens = tokenize("a\n\nb\n  c", "test.kdl").expect("lex");
        let lines: Vec<_> = tokens.iter().map(|t| t.location.line).collect();
        assert_eq!(lines, vec![1, 3, 4]);
    }

    #[test]
    fn semicolon_at_line_start_is_a_comment() {
        let source = "; a comment with \"quotes\" and @ signs\nname = \"x\"; code = \"y\";\n  ; indented comment\n";
        assert_eq!(
            kinds(source),
            vec![
                TokenKind::Identifier,
                TokenKind::Equals,
                TokenKind::String,
                TokenKind::Semicolon,
                TokenKind::Identifier,
                TokenKind::Equals,
                TokenKind::String,
                TokenKind::Semicolon,
            ]
        );
    }

    #[test]
    fn lexes_every_punctuation_character() {
        assert_eq!(
            kinds("{ } ( ) < > = + - * / : , . & | ^ x;"),
            vec![
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::LAngle,
                TokenKind::RAngle,
                TokenKind::Equals,
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::Slash,
                TokenKind::Colon,
                TokenKind::Comma,
                TokenKind::Dot,
                TokenKind::Ampersand,
                TokenKind::Pipe,
                TokenKind::Caret,
                TokenKind::Identifier,
                TokenKind::Semicolon,
            ]
        );
    }

    #[test]
    fn strings_do_not_process_escapes() {
        let tokens = tokenize(r#""a\n""#, "test.kdl").expect("lex");
        assert_eq!(tokens[0].text, "a\\n");
    }

    #[test]
    fn rejects_unknown_characters() {
        let err = tokenize("name = $", "bad.kdl").unwrap_err();
        match err {
            CompileError::Lexical { location, message } => {
                assert_eq!(location.line, 1);
                assert!(message.contains('$'));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn rejects_unterminated_strings() {
        let err = tokenize("\"open", "bad.kdl").unwrap_err();
        assert!(matches!(err, CompileError::Lexical { .. }));
    }

    #[test]
    fn rejects_bare_hash() {
        assert!(tokenize("# 12", "bad.kdl").is_err());
    }
}
