//! Value literals as they appear on the right of a field assignment or in
//! a `default =` attribute.

use crate::error::CompileError;
use crate::lexer::{Token, TokenKind};
use crate::resource::{Value, ValueType};

use super::{Condition, Sema};

/// Begins a value literal.
pub fn test(sema: &Sema<'_>) -> bool {
    sema.peek(0).is_ok_and(|t| {
        matches!(
            t.kind,
            TokenKind::String
                | TokenKind::Integer
                | TokenKind::Percentage
                | TokenKind::ResourceId
                | TokenKind::Identifier
                | TokenKind::Minus
        )
    })
}

pub fn parse(sema: &mut Sema<'_>) -> Result<Value, CompileError> {
    let token = sema.read(0)?;
    let location = token.location.clone();
    match token.kind {
        TokenKind::String => Ok(Value::new(ValueType::String, token.text, location)),
        TokenKind::Integer => Ok(Value::new(ValueType::Integer, token.text, location)),
        TokenKind::Percentage => Ok(Value::new(ValueType::Percentage, token.text, location)),
        TokenKind::ResourceId => Ok(Value::new(ValueType::ResourceId, token.text, location)),
        TokenKind::Minus => {
            let number = match sema.accept(Condition::kind(TokenKind::Percentage)) {
                Some(percentage) => percentage,
                None => sema.ensure_one(Condition::kind(TokenKind::Integer))?,
            };
            Ok(Value::new(
                ValueType::Integer,
                format!("-{}", number.text),
                location,
            ))
        }
        TokenKind::Identifier if token.text == "file" && opens_call(sema) => parse_file(sema, &token),
        TokenKind::Identifier if token.text == "rgb" && opens_call(sema) => parse_rgb(sema, &token),
        TokenKind::Identifier => Ok(Value::new(ValueType::Identifier, token.text, location)),
        _ => Err(CompileError::syntax(
            location,
            format!("expected a value but found '{}'", token.text),
        )),
    }
}

fn opens_call(sema: &Sema<'_>) -> bool {
    sema.expect(&[Condition::kind(TokenKind::LParen)])
}

fn parse_file(sema: &mut Sema<'_>, head: &Token) -> Result<Value, CompileError> {
    let tokens = sema.ensure(&[
        Condition::kind(TokenKind::LParen),
        Condition::kind(TokenKind::String),
        Condition::kind(TokenKind::RParen),
    ])?;
    Ok(Value::new(
        ValueType::FileReference,
        tokens[1].text.clone(),
        head.location.clone(),
    ))
}

/// `rgb(r, g, b)`, folded into `0x00RRGGBB` and stored as decimal text.
///
/// The lexer may fuse `255,0,128` into one grouped integer, so the
/// components are recovered by splitting the joined argument text.
fn parse_rgb(sema: &mut Sema<'_>, head: &Token) -> Result<Value, CompileError> {
    sema.ensure_one(Condition::kind(TokenKind::LParen))?;
    let mut joined = String::new();
    loop {
        let token = sema.read(0)?;
        match token.kind {
            TokenKind::RParen => break,
            TokenKind::Integer => joined.push_str(&token.text),
            TokenKind::Comma => joined.push(','),
            _ => {
                return Err(CompileError::syntax(
                    token.location,
                    format!("unexpected '{}' in rgb()", token.text),
                ));
            }
        }
    }

    let components: Vec<&str> = joined.split(',').collect();
    if components.len() != 3 {
        return Err(CompileError::semantic(
            head.location.clone(),
            format!("rgb() takes 3 components, found {}", components.len()),
        ));
    }

    let mut color: u32 = 0;
    for component in components {
        let cleaned: String = component.chars().filter(|c| *c != '_').collect();
        let channel: u8 = cleaned.parse().map_err(|_| {
            CompileError::semantic(
                head.location.clone(),
                format!("rgb() component '{component}' is not in 0..=255"),
            )
        })?;
        color = (color << 8) | u32::from(channel);
    }

    Ok(Value::new(
        ValueType::Color,
        color.to_string(),
        head.location.clone(),
    ))
}
