//! Compiled resource type schemas.
//!
//! A schema describes the binary layout of one resource type: an ordered
//! list of fields, each made of fixed-offset value slots, plus the
//! references through which a field can declare a nested resource of
//! another type.

use std::fmt;
use std::ops::RangeInclusive;

use crate::error::CompileError;
use crate::resource::{Value, ValueType};
use crate::span::SourceLocation;

/// How a value slot is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Integer { width: usize, signed: bool },
    ResourceRef,
    Bitmask { width: usize },
    PascalString,
    /// `None` means a null-terminated string of any length.
    CString { fixed_len: Option<usize> },
    Color,
}

impl ValueKind {
    /// Whether a source value of type `ty` may be stored in this slot.
    ///
    /// Identifiers are also accepted by any slot carrying a symbol table;
    /// that case is handled by [`ValueSlot::permits`].
    pub fn accepts(self, ty: ValueType) -> bool {
        use ValueKind::*;
        match ty {
            ValueType::FileReference | ValueType::ResourceId => matches!(self, ResourceRef),
            ValueType::Identifier | ValueType::Integer => {
                matches!(self, Integer { .. } | Bitmask { .. })
            }
            ValueType::String => matches!(self, PascalString | CString { .. }),
            ValueType::Percentage => matches!(self, Integer { .. }),
            ValueType::Color => matches!(self, Color),
        }
    }

    pub fn is_signed(self) -> bool {
        match self {
            ValueKind::Integer { signed, .. } => signed,
            ValueKind::ResourceRef => true,
            _ => false,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Integer { width, signed: true } => write!(f, "integer({width})"),
            ValueKind::Integer {
                width,
                signed: false,
            } => write!(f, "unsigned({width})"),
            ValueKind::ResourceRef => f.write_str("resource_reference"),
            ValueKind::Bitmask { width } => write!(f, "bitmask({width})"),
            ValueKind::PascalString => f.write_str("p_string"),
            ValueKind::CString { fixed_len: None } => f.write_str("c_string"),
            ValueKind::CString {
                fixed_len: Some(len),
            } => write!(f, "c_string({len})"),
            ValueKind::Color => f.write_str("color"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub value: i64,
}

/// One typed component of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueSlot {
    pub name: String,
    pub kind: ValueKind,
    pub offset: usize,
    /// Bytes reserved for the slot within the resource.
    pub size: usize,
    pub symbols: Vec<Symbol>,
    pub default: Option<Value>,
}

impl ValueSlot {
    pub fn new(name: impl Into<String>, kind: ValueKind, offset: usize, size: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            offset,
            size,
            symbols: Vec::new(),
            default: None,
        }
    }

    pub fn with_symbols(mut self, symbols: Vec<Symbol>) -> Self {
        self.symbols = symbols;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn permits(&self, ty: ValueType) -> bool {
        if ty == ValueType::Identifier && !self.symbols.is_empty() {
            return true;
        }
        self.kind.accepts(ty)
    }

    pub fn symbol(&self, name: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.name == name)
    }

    pub fn end(&self) -> usize {
        self.offset + self.size
    }
}

/// A named slot of a resource type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub required: bool,
    /// Empty when the field is not deprecated.
    pub deprecation_note: String,
    pub values: Vec<ValueSlot>,
}

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
            deprecation_note: String::new(),
            values: Vec::new(),
        }
    }

    pub fn is_deprecated(&self) -> bool {
        !self.deprecation_note.is_empty()
    }

    /// `max(offset + size)` over the field's value slots.
    pub fn required_data_size(&self) -> usize {
        self.values.iter().map(ValueSlot::end).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdOperand {
    /// The id of the instance that declares the nested resource.
    ParentId,
    Literal(i64),
}

/// Left-to-right arithmetic over the parent id, starting from zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdMapping {
    pub operations: Vec<(IdOperator, IdOperand)>,
}

impl IdMapping {
    /// Maps every parent id to itself.
    pub fn identity() -> Self {
        Self {
            operations: vec![(IdOperator::Add, IdOperand::ParentId)],
        }
    }

    pub fn evaluate(&self, parent_id: i64, location: &SourceLocation) -> Result<i64, CompileError> {
        let mut acc: i64 = 0;
        for &(op, operand) in &self.operations {
            let rhs = match operand {
                IdOperand::ParentId => parent_id,
                IdOperand::Literal(v) => v,
            };
            let next = match op {
                IdOperator::Add => acc.checked_add(rhs),
                IdOperator::Subtract => acc.checked_sub(rhs),
                IdOperator::Multiply => acc.checked_mul(rhs),
                IdOperator::Divide => {
                    if rhs == 0 {
                        return Err(CompileError::semantic(
                            location.clone(),
                            "division by zero in id mapping",
                        ));
                    }
                    acc.checked_div(rhs)
                }
            };
            acc = next.ok_or_else(|| {
                CompileError::semantic(location.clone(), "id mapping overflowed")
            })?;
        }
        Ok(acc)
    }
}

/// A field that declares a nested resource of another type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub field: String,
    pub target_type: String,
    pub valid_ids: RangeInclusive<i64>,
    pub id_mapping: IdMapping,
}

impl Reference {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            target_type: String::new(),
            valid_ids: i64::MIN..=i64::MAX,
            id_mapping: IdMapping::identity(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSchema {
    pub name: String,
    pub code: String,
    pub fields: Vec<Field>,
    pub references: Vec<Reference>,
    pub location: SourceLocation,
}

impl TypeSchema {
    pub fn field_named(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn reference_for(&self, field: &str) -> Option<&Reference> {
        self.references.iter().find(|r| r.field == field)
    }

    /// Minimum size of an encoded resource of this type.
    pub fn required_data_size(&self) -> usize {
        self.fields
            .iter()
            .map(Field::required_data_size)
            .max()
            .unwrap_or(0)
    }
}
