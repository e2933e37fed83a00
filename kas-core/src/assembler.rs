//! Encodes one resource instance into its binary blob, driven by the
//! schema of its type.
//!
//! Fields are processed in schema order. Before a field is written the
//! blob is zero-padded to the field's required size, so slots that receive
//! no value read back as zero.

use tracing::trace;

use crate::buffer::{BinaryBuffer, ByteOrder};
use crate::diagnostic::{Diagnostic, DiagnosticSink};
use crate::error::CompileError;
use crate::resolver::{FileResolver, ResolvedFile};
use crate::resource::{ResourceInstance, Value, ValueType};
use crate::schema::{Field, TypeSchema, ValueKind, ValueSlot};

pub struct Assembler<'a> {
    resolver: &'a mut dyn FileResolver,
    diagnostics: &'a mut dyn DiagnosticSink,
    imports: Vec<ResolvedFile>,
}

impl<'a> Assembler<'a> {
    pub fn new(resolver: &'a mut dyn FileResolver, diagnostics: &'a mut dyn DiagnosticSink) -> Self {
        Self {
            resolver,
            diagnostics,
            imports: Vec::new(),
        }
    }

    pub fn assemble(
        &mut self,
        schema: &TypeSchema,
        instance: &ResourceInstance,
    ) -> Result<Vec<u8>, CompileError> {
        for provided in &instance.fields {
            if schema.field_named(&provided.name).is_none() {
                return Err(CompileError::semantic(
                    provided.location.clone(),
                    format!("'{}' has no field named '{}'", schema.name, provided.name),
                ));
            }
        }

        let mut blob = BinaryBuffer::new(ByteOrder::Big);
        for field in &schema.fields {
            let required = field.required_data_size();
            if blob.size() < required {
                blob.seek_to_end();
                blob.pad_to(required);
            }
            self.assemble_field(&mut blob, schema, field, instance)?;
        }

        trace!(resource_type = %schema.name, id = instance.id, bytes = blob.size(), "assembled resource");
        Ok(blob.into_bytes())
    }

    /// Resources created from `file(...)` values since the last call.
    pub fn take_imports(&mut self) -> Vec<ResolvedFile> {
        std::mem::take(&mut self.imports)
    }

    fn assemble_field(
        &mut self,
        blob: &mut BinaryBuffer,
        schema: &TypeSchema,
        field: &Field,
        instance: &ResourceInstance,
    ) -> Result<(), CompileError> {
        let provided = instance.field_named(&field.name);
        if field.is_deprecated() {
            let location = provided.map_or(&instance.location, |p| &p.location);
            self.diagnostics.emit(
                Diagnostic::warning(
                    format!(
                        "field '{}' of {} is deprecated: {}",
                        field.name, schema.name, field.deprecation_note
                    ),
                    location.clone(),
                )
                .with_code("W0001"),
            );
        }

        let Some(provided) = provided else {
            if field.required {
                return Err(CompileError::semantic(
                    instance.location.clone(),
                    format!(
                        "{} #{} is missing required field '{}'",
                        schema.name, instance.id, field.name
                    ),
                ));
            }
            for slot in &field.values {
                if let Some(default) = &slot.default {
                    self.encode_value(blob, slot, default, instance)?;
                }
            }
            return Ok(());
        };

        if provided.values.len() != field.values.len() {
            return Err(CompileError::semantic(
                provided.location.clone(),
                format!(
                    "field '{}' expects {} value(s) but {} were given",
                    field.name,
                    field.values.len(),
                    provided.values.len()
                ),
            ));
        }

        for (slot, value) in field.values.iter().zip(&provided.values) {
            if !slot.permits(value.ty) {
                return Err(CompileError::semantic(
                    value.location.clone(),
                    format!(
                        "{} '{}' cannot be stored in {} value '{}' of field '{}'",
                        value.ty, value.text, slot.kind, slot.name, field.name
                    ),
                ));
            }
            self.encode_value(blob, slot, value, instance)?;
        }
        Ok(())
    }

    fn encode_value(
        &mut self,
        blob: &mut BinaryBuffer,
        slot: &ValueSlot,
        value: &Value,
        instance: &ResourceInstance,
    ) -> Result<(), CompileError> {
        blob.seek(slot.offset);
        match value.ty {
            ValueType::Integer | ValueType::Percentage => {
                write_integer(blob, slot, value.integer()?, value)
            }
            ValueType::ResourceId => write_resource_id(blob, value.integer()?, value),
            ValueType::String => write_string(blob, slot, value),
            ValueType::Identifier => {
                let symbol = slot.symbol(&value.text).ok_or_else(|| {
                    CompileError::semantic(
                        value.location.clone(),
                        format!("'{}' is not a known symbol of value '{}'", value.text, slot.name),
                    )
                })?;
                match slot.kind {
                    ValueKind::ResourceRef => {
                        write_resource_id(blob, i128::from(symbol.value), value)
                    }
                    _ => write_integer(blob, slot, i128::from(symbol.value), value),
                }
            }
            ValueType::FileReference => {
                let resolved = self
                    .resolver
                    .resolve(&value.text, instance.id, &value.location)?;
                write_resource_id(blob, i128::from(resolved.id), value)?;
                self.imports.push(resolved);
                Ok(())
            }
            ValueType::Color => {
                let color = value.integer()?;
                if !(0..=0x00FF_FFFF).contains(&color) {
                    return Err(out_of_range(value, "a 24-bit color"));
                }
                blob.write_u32(color as u32);
                Ok(())
            }
        }
    }
}

fn write_integer(
    blob: &mut BinaryBuffer,
    slot: &ValueSlot,
    number: i128,
    value: &Value,
) -> Result<(), CompileError> {
    let width = match slot.kind {
        ValueKind::Integer { width, .. } | ValueKind::Bitmask { width } => width,
        ValueKind::ResourceRef => 2,
        ValueKind::Color => 4,
        ValueKind::PascalString | ValueKind::CString { .. } => slot.size,
    };
    let signed = slot.kind.is_signed();
    if !matches!(width, 1 | 2 | 4 | 8) {
        return Err(CompileError::semantic(
            value.location.clone(),
            format!("value '{}' has no integer width ({} bytes)", slot.name, width),
        ));
    }

    let bits = (width * 8) as u32;
    let max = (1i128 << bits) - 1;
    let min = if signed { -(1i128 << (bits - 1)) } else { 0 };
    if number < min || number > max {
        return Err(out_of_range(value, &format!("{width} byte(s)")));
    }
    blob.write_integer(number, width)
}

fn write_resource_id(blob: &mut BinaryBuffer, id: i128, value: &Value) -> Result<(), CompileError> {
    let id = i16::try_from(id).map_err(|_| out_of_range(value, "a 16-bit resource id"))?;
    blob.write_i16(id);
    Ok(())
}

fn write_string(blob: &mut BinaryBuffer, slot: &ValueSlot, value: &Value) -> Result<(), CompileError> {
    match slot.kind {
        ValueKind::PascalString => {
            if slot.size > 0 {
                let limited: String = value.text.chars().take(slot.size - 1).collect();
                blob.write_pstr(&limited);
            } else {
                blob.write_pstr(&value.text);
            }
            Ok(())
        }
        ValueKind::CString { fixed_len } => {
            blob.write_cstr(&value.text, fixed_len.unwrap_or(0));
            Ok(())
        }
        other => Err(CompileError::semantic(
            value.location.clone(),
            format!("string '{}' cannot be stored in a {other} value", value.text),
        )),
    }
}

fn out_of_range(value: &Value, what: &str) -> CompileError {
    CompileError::semantic(
        value.location.clone(),
        format!("'{}' does not fit {what}", value.text),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::CollectingSink;
    use crate::resource::InstanceField;
    use crate::schema::Symbol;
    use crate::span::SourceLocation;

    /// Hands out ids from 500 and records what was asked for.
    #[derive(Default)]
    struct FakeResolver {
        requests: Vec<(String, i64)>,
    }

    impl FileResolver for FakeResolver {
        fn resolve(
            &mut self,
            path: &str,
            desired_id: i64,
            _location: &SourceLocation,
        ) -> Result<ResolvedFile, CompileError> {
            self.requests.push((path.to_string(), desired_id));
            Ok(ResolvedFile {
                id: 500,
                type_code: "PNG ".into(),
                name: path.into(),
                data: vec![1, 2, 3],
            })
        }
    }

    fn int(width: usize) -> ValueKind {
        ValueKind::Integer {
            width,
            signed: true,
        }
    }

    fn field(name: &str, slots: Vec<ValueSlot>) -> Field {
        let mut field = Field::new(name);
        field.values = slots;
        field
    }

    fn schema(fields: Vec<Field>) -> TypeSchema {
        TypeSchema {
            name: "Asteroid".into(),
            code: "röid".into(),
            fields,
            references: vec![],
            location: SourceLocation::unknown(),
        }
    }

    fn value(ty: ValueType, text: &str) -> Value {
        Value::new(ty, text, SourceLocation::new("main.kdl", 4))
    }

    fn instance(fields: Vec<(&str, Vec<Value>)>) -> ResourceInstance {
        let mut instance = ResourceInstance::new("Asteroid", 128, "Rock", SourceLocation::new("main.kdl", 2));
        for (name, values) in fields {
            instance
                .add_field(InstanceField {
                    name: name.into(),
                    values,
                    location: SourceLocation::new("main.kdl", 3),
                })
                .expect("field");
        }
        instance
    }

    fn assemble(schema: &TypeSchema, instance: &ResourceInstance) -> Result<Vec<u8>, CompileError> {
        let mut resolver = FakeResolver::default();
        let mut sink = CollectingSink::new();
        Assembler::new(&mut resolver, &mut sink).assemble(schema, instance)
    }

    #[test]
    fn integers_round_trip_at_every_width() {
        for (width, number) in [(1usize, -5i128), (2, 1234), (4, -70_000), (8, 1 << 40)] {
            let schema = schema(vec![field("n", vec![ValueSlot::new("n", int(width), 2, width)])]);
            let blob = assemble(
                &schema,
                &instance(vec![("n", vec![value(ValueType::Integer, &number.to_string())])]),
            )
            .expect("assemble");
            assert_eq!(blob.len(), 2 + width);
            let mut raw = [0u8; 16];
            let fill = if number < 0 { 0xFF } else { 0 };
            raw[..16 - width].fill(fill);
            raw[16 - width..].copy_from_slice(&blob[2..]);
            assert_eq!(i128::from_be_bytes(raw), number);
        }
    }

    #[test]
    fn absent_field_without_default_is_zero() {
        let schema = schema(vec![
            field("a", vec![ValueSlot::new("a", int(2), 0, 2)]),
            field("b", vec![ValueSlot::new("b", int(4), 2, 4)]),
        ]);
        let blob = assemble(&schema, &instance(vec![("a", vec![value(ValueType::Integer, "258")])]))
            .expect("assemble");
        assert_eq!(blob, vec![1, 2, 0, 0, 0, 0]);
    }

    #[test]
    fn defaults_fill_absent_fields() {
        let slot = ValueSlot::new("spin", int(1), 0, 1)
            .with_symbols(vec![Symbol {
                name: "fast".into(),
                value: 4,
            }])
            .with_default(value(ValueType::Identifier, "fast"));
        let schema = schema(vec![field("spin", vec![slot])]);
        assert_eq!(assemble(&schema, &instance(vec![])).expect("assemble"), vec![4]);
    }

    #[test]
    fn encodes_strings_colors_and_ids() {
        let schema = schema(vec![
            field("title", vec![ValueSlot::new("t", ValueKind::PascalString, 0, 4)]),
            field("label", vec![ValueSlot::new("l", ValueKind::CString { fixed_len: Some(3) }, 4, 3)]),
            field("tint", vec![ValueSlot::new("c", ValueKind::Color, 7, 4)]),
            field("art", vec![ValueSlot::new("r", ValueKind::ResourceRef, 11, 2)]),
        ]);
        let blob = assemble(
            &schema,
            &instance(vec![
                ("title", vec![value(ValueType::String, "Hello")]),
                ("label", vec![value(ValueType::String, "ab")]),
                ("tint", vec![value(ValueType::Color, &0x00FF_0080u32.to_string())]),
                ("art", vec![value(ValueType::ResourceId, "-2")]),
            ]),
        )
        .expect("assemble");
        assert_eq!(
            blob,
            vec![3, b'H', b'e', b'l', b'a', b'b', 0, 0x00, 0xFF, 0x00, 0x80, 0xFF, 0xFE]
        );
    }

    #[test]
    fn file_references_go_through_the_resolver() {
        let schema = schema(vec![field("art", vec![ValueSlot::new("r", ValueKind::ResourceRef, 0, 2)])]);
        let instance = instance(vec![("art", vec![value(ValueType::FileReference, "rock.png")])]);
        let mut resolver = FakeResolver::default();
        let mut sink = CollectingSink::new();
        let (blob, imports) = {
            let mut assembler = Assembler::new(&mut resolver, &mut sink);
            let blob = assembler.assemble(&schema, &instance).expect("assemble");
            (blob, assembler.take_imports())
        };
        assert_eq!(blob, vec![0x01, 0xF4]);
        assert_eq!(imports.len(), 1);
        assert_eq!(resolver.requests, vec![("rock.png".to_string(), 128)]);
    }

    #[test]
    fn missing_required_field_names_the_field() {
        let mut strength = field("strength", vec![ValueSlot::new("v", int(2), 0, 2)]);
        strength.required = true;
        let err = assemble(&schema(vec![strength]), &instance(vec![])).unwrap_err();
        assert!(err.to_string().contains("missing required field 'strength'"));
    }

    #[test]
    fn value_count_and_kind_are_checked() {
        let schema = schema(vec![field(
            "yield",
            vec![
                ValueSlot::new("type", int(2), 0, 2),
                ValueSlot::new("quantity", int(2), 2, 2),
            ],
        )]);
        let err = assemble(&schema, &instance(vec![("yield", vec![value(ValueType::Integer, "1")])]))
            .unwrap_err();
        assert!(err.to_string().contains("expects 2 value(s) but 1 were given"));

        let err = assemble(
            &schema,
            &instance(vec![(
                "yield",
                vec![value(ValueType::String, "x"), value(ValueType::Integer, "1")],
            )]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("cannot be stored"));
    }

    #[test]
    fn unknown_fields_and_symbols_are_fatal() {
        let schema = schema(vec![field("a", vec![ValueSlot::new("a", int(1), 0, 1)])]);
        let err = assemble(&schema, &instance(vec![("b", vec![value(ValueType::Integer, "1")])]))
            .unwrap_err();
        assert!(err.to_string().contains("has no field named 'b'"));

        let err = assemble(&schema, &instance(vec![("a", vec![value(ValueType::Identifier, "huge")])]))
            .unwrap_err();
        assert!(err.to_string().contains("'huge' is not a known symbol"));
    }

    #[test]
    fn integers_must_fit_their_slot() {
        let unsigned = ValueKind::Integer {
            width: 1,
            signed: false,
        };
        let schema = schema(vec![
            field("s", vec![ValueSlot::new("s", int(1), 0, 1)]),
            field("u", vec![ValueSlot::new("u", unsigned, 1, 1)]),
        ]);
        assert!(assemble(&schema, &instance(vec![("s", vec![value(ValueType::Integer, "255")])])).is_ok());
        assert!(assemble(&schema, &instance(vec![("s", vec![value(ValueType::Integer, "-129")])])).is_err());
        assert!(assemble(&schema, &instance(vec![("u", vec![value(ValueType::Integer, "-1")])])).is_err());
        assert!(assemble(&schema, &instance(vec![("u", vec![value(ValueType::Integer, "256")])])).is_err());
    }

    #[test]
    fn deprecated_fields_warn_even_when_unset() {
        let mut old = field("old", vec![ValueSlot::new("v", int(1), 1, 1)]);
        old.deprecation_note = "gone".into();
        let schema = schema(vec![field("n", vec![ValueSlot::new("n", int(1), 0, 1)]), old]);
        let mut resolver = FakeResolver::default();
        let mut sink = CollectingSink::new();
        {
            let mut assembler = Assembler::new(&mut resolver, &mut sink);
            for _ in 0..2 {
                assembler
                    .assemble(&schema, &instance(vec![("n", vec![value(ValueType::Integer, "1")])]))
                    .expect("assemble");
            }
        }
        let warnings: Vec<_> = sink.warnings().collect();
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(|w| w.code == Some("W0001")));
        assert_eq!(warnings[0].message, "field 'old' of Asteroid is deprecated: gone");
        assert_eq!(warnings[0].location, SourceLocation::new("main.kdl", 2));
    }

    #[test]
    fn deprecated_fields_warn_when_used() {
        let mut old = field("old", vec![ValueSlot::new("v", int(1), 0, 1)]);
        old.deprecation_note = "use new".into();
        let schema = schema(vec![old]);
        let mut resolver = FakeResolver::default();
        let mut sink = CollectingSink::new();
        Assembler::new(&mut resolver, &mut sink)
            .assemble(&schema, &instance(vec![("old", vec![value(ValueType::Integer, "1")])]))
            .expect("assemble");
        let warnings: Vec<_> = sink.warnings().collect();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("deprecated: use new"));
        assert_eq!(warnings[0].location, SourceLocation::new("main.kdl", 3));
    }
}
