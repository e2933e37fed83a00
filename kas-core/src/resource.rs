//! Resource instances as declared in source, before encoding.
//!
//! Values stay textual here; the assembler interprets them against the
//! registered schema of the instance's type.

use std::fmt;

use crate::error::CompileError;
use crate::span::SourceLocation;

/// The kind of a value as detected from its source syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Identifier,
    ResourceId,
    Integer,
    String,
    Percentage,
    FileReference,
    Color,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ValueType::Identifier => "identifier",
            ValueType::ResourceId => "resource id",
            ValueType::Integer => "integer",
            ValueType::String => "string",
            ValueType::Percentage => "percentage",
            ValueType::FileReference => "file reference",
            ValueType::Color => "color",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
    pub ty: ValueType,
    pub text: String,
    pub location: SourceLocation,
}

impl Value {
    pub fn new(ty: ValueType, text: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            ty,
            text: text.into(),
            location,
        }
    }

    /// Numeric value of an integer-like literal, ignoring `_` and `,`
    /// digit grouping.
    pub fn integer(&self) -> Result<i128, CompileError> {
        parse_integer(&self.text).ok_or_else(|| {
            CompileError::semantic(
                self.location.clone(),
                format!("'{}' is not a valid integer", self.text),
            )
        })
    }
}

pub fn parse_integer(text: &str) -> Option<i128> {
    let cleaned: String = text.chars().filter(|c| !matches!(c, '_' | ',')).collect();
    cleaned.parse().ok()
}

/// One `field = value...;` assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceField {
    pub name: String,
    pub values: Vec<Value>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInstance {
    pub type_name: String,
    pub id: i64,
    pub name: String,
    pub fields: Vec<InstanceField>,
    pub location: SourceLocation,
}

impl ResourceInstance {
    pub fn new(
        type_name: impl Into<String>,
        id: i64,
        name: impl Into<String>,
        location: SourceLocation,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            id,
            name: name.into(),
            fields: Vec::new(),
            location,
        }
    }

    pub fn field_named(&self, name: &str) -> Option<&InstanceField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn add_field(&mut self, field: InstanceField) -> Result<(), CompileError> {
        if self.field_named(&field.name).is_some() {
            return Err(CompileError::semantic(
                field.location,
                format!(
                    "field '{}' is assigned more than once in resource #{}",
                    field.name, self.id
                ),
            ));
        }
        self.fields.push(field);
        Ok(())
    }
}

/// A parsed instance together with the implicit resources declared inside
/// its fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceNode {
    pub instance: ResourceInstance,
    pub children: Vec<InstanceNode>,
}

impl InstanceNode {
    pub fn new(instance: ResourceInstance) -> Self {
        Self {
            instance,
            children: Vec::new(),
        }
    }

    /// Append every instance of the tree to `out`, nested children ahead
    /// of the instance that declared them.
    pub fn flatten_into(self, out: &mut Vec<ResourceInstance>) {
        for child in self.children {
            child.flatten_into(out);
        }
        out.push(self.instance);
    }
}
