//! `declare Type { new(...) { field = value...; } ... }`
//!
//! A field whose right-hand side is itself `new { ... }` declares a nested
//! resource through the enclosing type's reference definition for that
//! field. Nested resources become children of the declaring instance.

use tracing::debug;

use crate::error::CompileError;
use crate::lexer::{Token, TokenKind};
use crate::resource::{InstanceField, InstanceNode, ResourceInstance, parse_integer};

use super::{Condition, Sema, value};

pub fn test(sema: &Sema<'_>) -> bool {
    sema.expect(&[
        Condition::keyword("declare"),
        Condition::kind(TokenKind::Identifier),
        Condition::kind(TokenKind::LBrace),
    ])
}

pub fn parse(sema: &mut Sema<'_>) -> Result<Vec<InstanceNode>, CompileError> {
    let head = sema.ensure(&[
        Condition::keyword("declare"),
        Condition::kind(TokenKind::Identifier),
        Condition::kind(TokenKind::LBrace),
    ])?;
    let type_token = &head[1];
    sema.registry().lookup(&type_token.text, &type_token.location)?;

    let mut nodes = Vec::new();
    while !sema.expect(&[Condition::kind(TokenKind::RBrace)]) {
        let node = parse_instance(sema, &type_token.text, Inherited::default())?;
        sema.accept(Condition::kind(TokenKind::Semicolon));
        nodes.push(node);
    }
    sema.ensure_one(Condition::kind(TokenKind::RBrace))?;

    debug!(resource_type = %type_token.text, instances = nodes.len(), "parsed declaration");
    Ok(nodes)
}

/// Id and name an instance starts from before its own attributes apply.
#[derive(Default)]
struct Inherited {
    id: i64,
    name: String,
}

fn parse_instance(
    sema: &mut Sema<'_>,
    type_name: &str,
    inherited: Inherited,
) -> Result<InstanceNode, CompileError> {
    let head = sema.ensure_one(Condition::keyword("new"))?;
    let Inherited { mut id, mut name } = inherited;

    if sema.accept(Condition::kind(TokenKind::LParen)).is_some() {
        while !sema.expect(&[Condition::kind(TokenKind::RParen)]) {
            let mut attr = sema.ensure(&[
                Condition::kind(TokenKind::Identifier),
                Condition::kind(TokenKind::Equals),
            ])?;
            let key = attr.remove(0);
            match key.text.as_str() {
                "id" => {
                    let token = sema.ensure_one(Condition::kind(TokenKind::ResourceId))?;
                    id = resource_id(&token)?;
                }
                "name" => name = sema.ensure_one(Condition::kind(TokenKind::String))?.text,
                other => {
                    return Err(CompileError::syntax(
                        key.location.clone(),
                        format!("unknown resource attribute '{other}'"),
                    ));
                }
            }
            if sema.accept(Condition::kind(TokenKind::Comma)).is_none() {
                break;
            }
        }
        sema.ensure_one(Condition::kind(TokenKind::RParen))?;
    }
    sema.ensure_one(Condition::kind(TokenKind::LBrace))?;

    let mut node = InstanceNode::new(ResourceInstance::new(type_name, id, name, head.location));

    while !sema.expect(&[Condition::kind(TokenKind::RBrace)]) {
        let mut target = sema.ensure(&[
            Condition::kind(TokenKind::Identifier),
            Condition::kind(TokenKind::Equals),
        ])?;
        let field = target.remove(0);

        if opens_nested(sema) {
            let child = parse_nested(sema, &node.instance, &field)?;
            node.children.push(child);
            sema.accept(Condition::kind(TokenKind::Semicolon));
            continue;
        }

        let mut values = Vec::new();
        while !sema.expect(&[Condition::kind(TokenKind::Semicolon)]) {
            values.push(value::parse(sema)?);
        }
        sema.ensure_one(Condition::kind(TokenKind::Semicolon))?;

        if values.is_empty() {
            return Err(CompileError::syntax(
                field.location.clone(),
                format!("field '{}' is assigned no values", field.text),
            ));
        }
        node.instance.add_field(InstanceField {
            name: field.text,
            values,
            location: field.location,
        })?;
    }
    sema.ensure_one(Condition::kind(TokenKind::RBrace))?;

    Ok(node)
}

/// `new {` or `new (` on the right of an assignment.
fn opens_nested(sema: &Sema<'_>) -> bool {
    sema.expect(&[Condition::keyword("new"), Condition::kind(TokenKind::LBrace)])
        || sema.expect(&[Condition::keyword("new"), Condition::kind(TokenKind::LParen)])
}

fn parse_nested(
    sema: &mut Sema<'_>,
    parent: &ResourceInstance,
    field: &Token,
) -> Result<InstanceNode, CompileError> {
    let reference = sema
        .registry()
        .lookup(&parent.type_name, &field.location)?
        .reference_for(&field.text)
        .cloned()
        .ok_or_else(|| {
            CompileError::semantic(
                field.location.clone(),
                format!(
                    "field '{}' of '{}' cannot declare a nested resource",
                    field.text, parent.type_name
                ),
            )
        })?;
    sema.registry()
        .lookup(&reference.target_type, &field.location)?;

    let id = reference.id_mapping.evaluate(parent.id, &field.location)?;
    let child = parse_instance(
        sema,
        &reference.target_type,
        Inherited {
            id,
            name: parent.name.clone(),
        },
    )?;

    let child_id = child.instance.id;
    if !reference.valid_ids.contains(&child_id) {
        return Err(CompileError::semantic(
            field.location.clone(),
            format!(
                "nested {} id #{child_id} is outside the valid range #{} #{}",
                reference.target_type,
                reference.valid_ids.start(),
                reference.valid_ids.end()
            ),
        ));
    }
    debug!(field = %field.text, resource_type = %reference.target_type, id = child_id, "nested resource");
    Ok(child)
}

fn resource_id(token: &Token) -> Result<i64, CompileError> {
    parse_integer(&token.text)
        .and_then(|v| i64::try_from(v).ok())
        .ok_or_else(|| {
            CompileError::semantic(
                token.location.clone(),
                format!("'#{}' is not a valid resource id", token.text),
            )
        })
}
