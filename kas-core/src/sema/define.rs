//! `@define { ... }`: compiles a resource type definition into a
//! [`TypeSchema`] and registers it.
//!
//! ```text
//! @define {
//!     name = "Asteroid";
//!     code = "röid";
//!     field("strength") {
//!         required;
//!         value(name = "value", offset = 0, size = word, type = integer);
//!     };
//!     field("spin") {
//!         value(offset = 2, size = byte, type = integer, default = slow) {
//!             slow = 1;
//!             fast = 4;
//!         };
//!     };
//!     reference("explosion") {
//!         type = "Explosion";
//!         valid_id_range = #128 #2175;
//!         id_mapping = id + 1000;
//!     };
//! }
//! ```

use tracing::debug;

use crate::error::CompileError;
use crate::lexer::{Token, TokenKind};
use crate::resource::{Value, ValueType, parse_integer};
use crate::schema::{
    Field, IdMapping, IdOperand, IdOperator, Reference, Symbol, TypeSchema, ValueKind, ValueSlot,
};

use super::{Condition, Sema, value};

pub fn parse(sema: &mut Sema<'_>, head: &Token) -> Result<(), CompileError> {
    sema.ensure_one(Condition::kind(TokenKind::LBrace))?;

    let mut name = String::new();
    let mut code = String::new();
    let mut fields: Vec<Field> = Vec::new();
    let mut references: Vec<Reference> = Vec::new();

    while !sema.expect(&[Condition::kind(TokenKind::RBrace)]) {
        let item = sema.ensure_one(Condition::kind(TokenKind::Identifier))?;
        match item.text.as_str() {
            "name" => name = string_assignment(sema)?,
            "code" => code = string_assignment(sema)?,
            "field" => {
                let field = parse_field(sema)?;
                if fields.iter().any(|f| f.name == field.name) {
                    return Err(CompileError::semantic(
                        item.location.clone(),
                        format!("field '{}' is defined more than once", field.name),
                    ));
                }
                fields.push(field);
            }
            "reference" => {
                let reference = parse_reference(sema, &item)?;
                if references.iter().any(|r| r.field == reference.field) {
                    return Err(CompileError::semantic(
                        item.location.clone(),
                        format!("reference '{}' is defined more than once", reference.field),
                    ));
                }
                references.push(reference);
            }
            other => {
                return Err(CompileError::syntax(
                    item.location.clone(),
                    format!("unexpected '{other}' in type definition"),
                ));
            }
        }
        sema.ensure_one(Condition::kind(TokenKind::Semicolon))?;
    }
    sema.ensure_one(Condition::kind(TokenKind::RBrace))?;

    if name.is_empty() {
        return Err(CompileError::semantic(
            head.location.clone(),
            "type definition must include a type name",
        ));
    }
    if code.is_empty() {
        return Err(CompileError::semantic(
            head.location.clone(),
            format!("type definition '{name}' must include a type code"),
        ));
    }
    if fields.is_empty() {
        return Err(CompileError::semantic(
            head.location.clone(),
            format!("type definition '{name}' must define at least one field"),
        ));
    }

    debug!(%name, %code, fields = fields.len(), references = references.len(), "compiled type definition");
    sema.registry_mut().register(TypeSchema {
        name,
        code,
        fields,
        references,
        location: head.location.clone(),
    })
}

fn string_assignment(sema: &mut Sema<'_>) -> Result<String, CompileError> {
    let mut tokens = sema.ensure(&[
        Condition::kind(TokenKind::Equals),
        Condition::kind(TokenKind::String),
    ])?;
    Ok(tokens.remove(1).text)
}

/// `("name") {`, shared by fields and references.
fn named_block_head(sema: &mut Sema<'_>) -> Result<String, CompileError> {
    let mut tokens = sema.ensure(&[
        Condition::kind(TokenKind::LParen),
        Condition::kind(TokenKind::String),
        Condition::kind(TokenKind::RParen),
        Condition::kind(TokenKind::LBrace),
    ])?;
    Ok(tokens.remove(1).text)
}

// ---------------------------------------------------------------------
// Fields
// ---------------------------------------------------------------------

fn parse_field(sema: &mut Sema<'_>) -> Result<Field, CompileError> {
    let location = sema.peek(0)?.location.clone();
    let mut field = Field::new(named_block_head(sema)?);

    while !sema.expect(&[Condition::kind(TokenKind::RBrace)]) {
        let item = sema.ensure_one(Condition::kind(TokenKind::Identifier))?;
        match item.text.as_str() {
            "required" => field.required = true,
            "deprecated" => {
                field.deprecation_note = String::from("deprecated");
                if sema.accept(Condition::kind(TokenKind::LParen)).is_some() {
                    let mut tokens = sema.ensure(&[
                        Condition::kind(TokenKind::String),
                        Condition::kind(TokenKind::RParen),
                    ])?;
                    let note = tokens.remove(0).text;
                    if !note.is_empty() {
                        field.deprecation_note = note;
                    }
                }
            }
            "value" => {
                let slot = parse_value_slot(sema, &field.name)?;
                field.values.push(slot);
            }
            other => {
                return Err(CompileError::syntax(
                    item.location.clone(),
                    format!("unexpected '{other}' in field '{}'", field.name),
                ));
            }
        }
        sema.ensure_one(Condition::kind(TokenKind::Semicolon))?;
    }
    sema.ensure_one(Condition::kind(TokenKind::RBrace))?;

    if field.values.is_empty() {
        return Err(CompileError::semantic(
            location,
            format!("field '{}' defines no values", field.name),
        ));
    }
    Ok(field)
}

#[derive(Default)]
struct SlotAttributes {
    name: Option<String>,
    offset: Option<usize>,
    length: Option<usize>,
    size: Option<usize>,
    ty: Option<Token>,
    default: Option<Value>,
}

fn parse_value_slot(sema: &mut Sema<'_>, field_name: &str) -> Result<ValueSlot, CompileError> {
    let open = sema.ensure_one(Condition::kind(TokenKind::LParen))?;
    let mut attrs = SlotAttributes::default();

    while !sema.expect(&[Condition::kind(TokenKind::RParen)]) {
        let mut head = sema.ensure(&[
            Condition::kind(TokenKind::Identifier),
            Condition::kind(TokenKind::Equals),
        ])?;
        let key = head.remove(0);
        let duplicate = match key.text.as_str() {
            "name" => {
                let text = sema.ensure_one(Condition::kind(TokenKind::String))?.text;
                attrs.name.replace(text).is_some()
            }
            "offset" => {
                let offset = unsigned_literal(sema)?;
                attrs.offset.replace(offset).is_some()
            }
            "length" => {
                let length = unsigned_literal(sema)?;
                attrs.length.replace(length).is_some()
            }
            "size" => {
                let size = size_literal(sema)?;
                attrs.size.replace(size).is_some()
            }
            "type" => {
                let ty = sema.ensure_one(Condition::kind(TokenKind::Identifier))?;
                attrs.ty.replace(ty).is_some()
            }
            "default" => {
                let default = value::parse(sema)?;
                attrs.default.replace(default).is_some()
            }
            other => {
                return Err(CompileError::syntax(
                    key.location.clone(),
                    format!("unknown value attribute '{other}'"),
                ));
            }
        };
        if duplicate {
            return Err(CompileError::semantic(
                key.location.clone(),
                format!("value attribute '{}' is given more than once", key.text),
            ));
        }
        if sema.accept(Condition::kind(TokenKind::Comma)).is_none() {
            break;
        }
    }
    sema.ensure_one(Condition::kind(TokenKind::RParen))?;

    let ty = attrs.ty.ok_or_else(|| {
        CompileError::semantic(
            open.location.clone(),
            format!("value in field '{field_name}' must specify a type"),
        )
    })?;
    let offset = attrs.offset.ok_or_else(|| {
        CompileError::semantic(
            open.location.clone(),
            format!("value in field '{field_name}' must specify an offset"),
        )
    })?;
    let (kind, size) = resolve_kind(&ty, attrs.size, attrs.length)?;
    let name = attrs.name.unwrap_or_else(|| field_name.to_string());

    let mut slot = ValueSlot::new(name, kind, offset, size);
    if sema.expect(&[Condition::kind(TokenKind::LBrace)]) {
        slot = slot.with_symbols(parse_symbols(sema)?);
    }
    if let Some(default) = attrs.default {
        check_default(&slot, &default)?;
        slot = slot.with_default(default);
    }
    Ok(slot)
}

/// Turns the `type` attribute and the size constraints it implies into a
/// slot kind and reserved size.
fn resolve_kind(
    ty: &Token,
    size: Option<usize>,
    length: Option<usize>,
) -> Result<(ValueKind, usize), CompileError> {
    let require = |value: Option<usize>, attr: &str| {
        value.ok_or_else(|| {
            CompileError::semantic(
                ty.location.clone(),
                format!("'{}' values require a {attr}", ty.text),
            )
        })
    };
    let fixed = |expected: usize| match size {
        Some(given) if given != expected => Err(CompileError::semantic(
            ty.location.clone(),
            format!("'{}' values are always {expected} bytes, not {given}", ty.text),
        )),
        _ => Ok(expected),
    };
    let integer_width = |width: usize| {
        if matches!(width, 1 | 2 | 4 | 8) {
            Ok(width)
        } else {
            Err(CompileError::semantic(
                ty.location.clone(),
                format!("unsupported size of {width} bytes for '{}'", ty.text),
            ))
        }
    };

    let resolved = match ty.text.as_str() {
        "integer" => {
            let width = integer_width(require(size, "size")?)?;
            (ValueKind::Integer { width, signed: true }, width)
        }
        "unsigned" | "unsigned_integer" => {
            let width = integer_width(require(size, "size")?)?;
            (ValueKind::Integer { width, signed: false }, width)
        }
        "bitmask" => {
            let width = integer_width(require(size, "size")?)?;
            (ValueKind::Bitmask { width }, width)
        }
        "resource_reference" => (ValueKind::ResourceRef, fixed(2)?),
        "color" => (ValueKind::Color, fixed(4)?),
        "string" => {
            let length = require(length, "length")?;
            (cstring(length), length)
        }
        "c_string" => {
            let length = length.unwrap_or(0);
            (cstring(length), length)
        }
        "p_string" => (ValueKind::PascalString, length.unwrap_or(0)),
        other => {
            return Err(CompileError::semantic(
                ty.location.clone(),
                format!("unknown value type '{other}'"),
            ));
        }
    };
    Ok(resolved)
}

fn cstring(length: usize) -> ValueKind {
    ValueKind::CString {
        fixed_len: (length > 0).then_some(length),
    }
}

fn unsigned_literal(sema: &mut Sema<'_>) -> Result<usize, CompileError> {
    let token = sema.ensure_one(Condition::kind(TokenKind::Integer))?;
    parse_integer(&token.text)
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| {
            CompileError::semantic(
                token.location.clone(),
                format!("'{}' is not a valid byte count", token.text),
            )
        })
}

/// An integer or one of the symbolic widths.
fn size_literal(sema: &mut Sema<'_>) -> Result<usize, CompileError> {
    if !sema.expect(&[Condition::kind(TokenKind::Identifier)]) {
        return unsigned_literal(sema);
    }
    let token = sema.read(0)?;
    match token.text.as_str() {
        "byte" => Ok(1),
        "word" => Ok(2),
        "dword" | "long" => Ok(4),
        "qword" | "quad" => Ok(8),
        other => Err(CompileError::semantic(
            token.location.clone(),
            format!("unknown size '{other}'"),
        )),
    }
}

/// `{ name = integer; ... }`
fn parse_symbols(sema: &mut Sema<'_>) -> Result<Vec<Symbol>, CompileError> {
    sema.ensure_one(Condition::kind(TokenKind::LBrace))?;
    let mut symbols: Vec<Symbol> = Vec::new();

    while !sema.expect(&[Condition::kind(TokenKind::RBrace)]) {
        let mut head = sema.ensure(&[
            Condition::kind(TokenKind::Identifier),
            Condition::kind(TokenKind::Equals),
        ])?;
        let name = head.remove(0);
        let value = symbol_literal(sema)?;
        sema.ensure_one(Condition::kind(TokenKind::Semicolon))?;

        if symbols.iter().any(|s| s.name == name.text) {
            return Err(CompileError::semantic(
                name.location.clone(),
                format!("symbol '{}' is defined more than once", name.text),
            ));
        }
        symbols.push(Symbol {
            name: name.text,
            value,
        });
    }
    sema.ensure_one(Condition::kind(TokenKind::RBrace))?;
    Ok(symbols)
}

fn symbol_literal(sema: &mut Sema<'_>) -> Result<i64, CompileError> {
    let negative = sema.accept(Condition::kind(TokenKind::Minus)).is_some();
    let token = if negative {
        sema.ensure_one(Condition::kind(TokenKind::Integer))?
    } else {
        match sema.accept(Condition::kind(TokenKind::ResourceId)) {
            Some(id) => id,
            None => sema.ensure_one(Condition::kind(TokenKind::Integer))?,
        }
    };
    parse_integer(&token.text)
        .map(|v| if negative { -v } else { v })
        .and_then(|v| i64::try_from(v).ok())
        .ok_or_else(|| {
            CompileError::semantic(
                token.location.clone(),
                format!("symbol value '{}' is out of range", token.text),
            )
        })
}

fn check_default(slot: &ValueSlot, default: &Value) -> Result<(), CompileError> {
    if !slot.permits(default.ty) {
        return Err(CompileError::semantic(
            default.location.clone(),
            format!(
                "default {} '{}' is not valid for {} value '{}'",
                default.ty, default.text, slot.kind, slot.name
            ),
        ));
    }
    if default.ty == ValueType::Identifier && slot.symbol(&default.text).is_none() {
        return Err(CompileError::semantic(
            default.location.clone(),
            format!(
                "default '{}' is not a symbol of value '{}'",
                default.text, slot.name
            ),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------
// References
// ---------------------------------------------------------------------

fn parse_reference(sema: &mut Sema<'_>, head: &Token) -> Result<Reference, CompileError> {
    let mut reference = Reference::new(named_block_head(sema)?);

    while !sema.expect(&[Condition::kind(TokenKind::RBrace)]) {
        let item = sema.ensure_one(Condition::kind(TokenKind::Identifier))?;
        sema.ensure_one(Condition::kind(TokenKind::Equals))?;
        match item.text.as_str() {
            "type" => {
                reference.target_type = sema.ensure_one(Condition::kind(TokenKind::String))?.text;
            }
            "valid_id_range" => {
                let bounds = sema.ensure(&[
                    Condition::kind(TokenKind::ResourceId),
                    Condition::kind(TokenKind::ResourceId),
                ])?;
                let lo = id_literal(&bounds[0])?;
                let hi = id_literal(&bounds[1])?;
                if lo > hi {
                    return Err(CompileError::semantic(
                        item.location.clone(),
                        format!("valid_id_range #{lo} #{hi} is empty"),
                    ));
                }
                reference.valid_ids = lo..=hi;
            }
            "id_mapping" => reference.id_mapping = parse_id_mapping(sema)?,
            other => {
                return Err(CompileError::syntax(
                    item.location.clone(),
                    format!("unexpected '{other}' in reference '{}'", reference.field),
                ));
            }
        }
        sema.ensure_one(Condition::kind(TokenKind::Semicolon))?;
    }
    sema.ensure_one(Condition::kind(TokenKind::RBrace))?;

    if reference.target_type.is_empty() {
        return Err(CompileError::semantic(
            head.location.clone(),
            format!("reference '{}' must name a target type", reference.field),
        ));
    }
    Ok(reference)
}

fn id_literal(token: &Token) -> Result<i64, CompileError> {
    parse_integer(&token.text)
        .and_then(|v| i64::try_from(v).ok())
        .ok_or_else(|| {
            CompileError::semantic(
                token.location.clone(),
                format!("'{}' is not a valid resource id", token.text),
            )
        })
}

/// `[op] operand (op operand)*`, stopping before the terminating `;`.
fn parse_id_mapping(sema: &mut Sema<'_>) -> Result<IdMapping, CompileError> {
    let mut mapping = IdMapping::default();
    let mut operator = id_operator(sema).unwrap_or(IdOperator::Add);
    loop {
        let operand = id_operand(sema)?;
        mapping.operations.push((operator, operand));
        match id_operator(sema) {
            Some(next) => operator = next,
            None => break,
        }
    }
    Ok(mapping)
}

fn id_operator(sema: &mut Sema<'_>) -> Option<IdOperator> {
    let operator = match sema.peek(0).ok()?.kind {
        TokenKind::Plus => IdOperator::Add,
        TokenKind::Minus => IdOperator::Subtract,
        TokenKind::Star => IdOperator::Multiply,
        TokenKind::Slash => IdOperator::Divide,
        _ => return None,
    };
    sema.read(0).ok()?;
    Some(operator)
}

fn id_operand(sema: &mut Sema<'_>) -> Result<IdOperand, CompileError> {
    let token = sema.read(0)?;
    match token.kind {
        TokenKind::Identifier if token.text == "id" => Ok(IdOperand::ParentId),
        TokenKind::Integer | TokenKind::ResourceId => Ok(IdOperand::Literal(id_literal(&token)?)),
        _ => Err(CompileError::syntax(
            token.location.clone(),
            format!("expected 'id' or an integer in id_mapping but found '{}'", token.text),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::CollectingSink;
    use crate::lexer::tokenize;
    use crate::registry::TypeRegistry;
    use crate::span::SourceLocation;
    use crate::target::Target;

    fn define(source: &str) -> Result<TypeRegistry, CompileError> {
        let mut registry = TypeRegistry::new();
        let mut target = Target::new("out.kdat");
        let mut sink = CollectingSink::new();
        {
            let tokens = tokenize(source, "types.kdl")?;
            let mut sema = Sema::new(tokens, &mut registry, &mut target, &mut sink);
            sema.run()?;
        }
        Ok(registry)
    }

    const ASTEROID: &str = r#"
@define {
    name = "Asteroid";
    code = "röid";
    field("strength") {
        required;
        value(name = "value", offset = 0, size = word, type = integer);
    };
    field("spin") {
        value(offset = 2, size = byte, type = unsigned, default = slow) {
            slow = 1;
            fast = 4;
        };
    };
    field("title") {
        deprecated("use label");
        value(offset = 3, length = 8, type = c_string);
    };
    field("art") {
        value(offset = 11, type = resource_reference);
    };
    reference("explosion") {
        type = "Explosion";
        valid_id_range = #128 #2175;
        id_mapping = id + 1000;
    };
}
"#;

    #[test]
    fn compiles_a_full_definition() {
        let registry = define(ASTEROID).expect("define");
        let schema = registry.get("Asteroid").expect("registered");
        assert_eq!(schema.code, "röid");
        assert_eq!(schema.fields.len(), 4);
        assert_eq!(schema.required_data_size(), 13);

        let strength = schema.field_named("strength").expect("strength");
        assert!(strength.required);
        assert_eq!(
            strength.values[0].kind,
            ValueKind::Integer {
                width: 2,
                signed: true
            }
        );

        let spin = &schema.field_named("spin").expect("spin").values[0];
        assert_eq!(spin.name, "spin");
        assert_eq!(spin.symbol("fast").map(|s| s.value), Some(4));
        assert_eq!(spin.default.as_ref().map(|d| d.text.as_str()), Some("slow"));

        let title = schema.field_named("title").expect("title");
        assert_eq!(title.deprecation_note, "use label");
        assert_eq!(
            title.values[0].kind,
            ValueKind::CString { fixed_len: Some(8) }
        );

        let explosion = schema.reference_for("explosion").expect("reference");
        assert_eq!(explosion.target_type, "Explosion");
        assert_eq!(explosion.valid_ids, 128..=2175);
        assert_eq!(
            explosion
                .id_mapping
                .evaluate(128, &SourceLocation::unknown())
                .expect("eval"),
            1128
        );
    }

    #[test]
    fn missing_code_is_fatal() {
        let err = define(
            r#"@define {
    name = "Thing";
    field("x") { value(offset = 0, size = 1, type = integer); };
}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("must include a type code"));
    }

    #[test]
    fn definition_needs_a_field() {
        let err = define(r#"@define { name = "Thing"; code = "thng"; }"#).unwrap_err();
        assert!(err.to_string().contains("at least one field"));
    }

    #[test]
    fn integer_requires_size() {
        let err = define(
            r#"@define {
    name = "Thing";
    code = "thng";
    field("x") { value(offset = 0, type = integer); };
}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("'integer' values require a size"));
    }

    #[test]
    fn string_requires_length() {
        let err = define(
            r#"@define {
    name = "Thing";
    code = "thng";
    field("x") { value(offset = 0, type = string); };
}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("require a length"));
    }

    #[test]
    fn default_must_fit_the_slot() {
        let err = define(
            r#"@define {
    name = "Thing";
    code = "thng";
    field("x") { value(offset = 0, size = 2, type = integer, default = "text"); };
}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("default string 'text' is not valid"));
    }

    #[test]
    fn duplicate_code_under_another_name_is_fatal() {
        let err = define(
            r#"@define {
    name = "One";
    code = "same";
    field("x") { value(offset = 0, size = 1, type = integer); };
}
@define {
    name = "Two";
    code = "same";
    field("x") { value(offset = 0, size = 1, type = integer); };
}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate type code 'same'"));
    }

    #[test]
    fn id_mapping_reads_operators_in_order() {
        let registry = define(
            r#"@define {
    name = "Thing";
    code = "thng";
    field("x") { value(offset = 0, size = 1, type = integer); };
    reference("r") {
        type = "Other";
        id_mapping = id - 128 * 2 + #500;
    };
}"#,
        )
        .expect("define");
        let reference = registry
            .get("Thing")
            .and_then(|s| s.reference_for("r"))
            .expect("reference");
        assert_eq!(
            reference
                .id_mapping
                .evaluate(130, &SourceLocation::unknown())
                .expect("eval"),
            504
        );
    }
}
