//! In-memory resource container and its on-disk encodings.
//!
//! Resources are grouped by type code. Types keep the order in which they
//! were first seen and resources keep insertion order within their type;
//! every writer lays out data and map entries in that order.

use std::fmt;
use std::str::FromStr;

use crate::charset;
use crate::error::CompileError;

pub mod extended;
pub mod rez;
pub mod standard;

/// Output container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Classic resource fork with 16-bit map offsets.
    #[default]
    Standard,
    /// 64-bit variant of the classic layout.
    Extended,
    /// Little-endian indexed container with a trailing big-endian map.
    Rez,
}

impl Format {
    pub const ALL: [Format; 3] = [Format::Standard, Format::Extended, Format::Rez];

    pub fn name(self) -> &'static str {
        match self {
            Format::Standard => "standard",
            Format::Extended => "extended",
            Format::Rez => "rez",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Format::ALL
            .into_iter()
            .find(|format| format.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| CompileError::UnsupportedFormat(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub id: i64,
    pub name: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeContainer {
    pub code: String,
    pub resources: Vec<Resource>,
}

impl TypeContainer {
    pub fn contains(&self, id: i64) -> bool {
        self.resources.iter().any(|r| r.id == id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerFile {
    types: Vec<TypeContainer>,
}

impl ContainerFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resource under `code`, creating the type on first use.
    pub fn add_resource(&mut self, code: &str, id: i64, name: impl Into<String>, data: Vec<u8>) {
        let resource = Resource {
            id,
            name: name.into(),
            data,
        };
        match self.types.iter_mut().find(|t| t.code == code) {
            Some(container) => container.resources.push(resource),
            None => self.types.push(TypeContainer {
                code: code.to_string(),
                resources: vec![resource],
            }),
        }
    }

    pub fn type_container(&self, code: &str) -> Option<&TypeContainer> {
        self.types.iter().find(|t| t.code == code)
    }

    pub fn contains(&self, code: &str, id: i64) -> bool {
        self.type_container(code).is_some_and(|t| t.contains(id))
    }

    pub fn types(&self) -> &[TypeContainer] {
        &self.types
    }

    /// Every resource with its type code, in layout order.
    pub fn resources(&self) -> impl Iterator<Item = (&str, &Resource)> {
        self.types
            .iter()
            .flat_map(|t| t.resources.iter().map(move |r| (t.code.as_str(), r)))
    }

    pub fn resource_count(&self) -> usize {
        self.types.iter().map(|t| t.resources.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn encode(&self, format: Format) -> Result<Vec<u8>, CompileError> {
        match format {
            Format::Standard => standard::encode(self),
            Format::Extended => extended::encode(self),
            Format::Rez => rez::encode(self),
        }
    }
}

/// The four legacy-charset bytes of a type code.
pub fn type_code_bytes(code: &str) -> Result<[u8; 4], CompileError> {
    let encoded = charset::encode(code);
    <[u8; 4]>::try_from(encoded.as_slice()).map_err(|_| {
        CompileError::layout(format!(
            "type code '{code}' encodes to {} bytes, expected 4",
            encoded.len()
        ))
    })
}

/// Narrow `value` to a fixed-width field, reporting what overflowed.
pub(crate) fn fit<T: TryFrom<u128>>(value: u128, what: &str) -> Result<T, CompileError> {
    T::try_from(value)
        .map_err(|_| CompileError::layout(format!("{what} ({value}) does not fit its field")))
}
