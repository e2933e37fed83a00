use std::collections::HashMap;

use tracing::info;

use crate::error::CompileError;
use crate::schema::TypeSchema;
use crate::span::SourceLocation;

/// Every type schema defined during one compile run, keyed by type name
/// and by type code. Append-only.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    schemas: Vec<TypeSchema>,
    by_name: HashMap<String, usize>,
    by_code: HashMap<String, usize>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: TypeSchema) -> Result<(), CompileError> {
        if self.by_name.contains_key(&schema.name) {
            return Err(CompileError::semantic(
                schema.location.clone(),
                format!("duplicate type name '{}'", schema.name),
            ));
        }
        if let Some(&existing) = self.by_code.get(&schema.code) {
            return Err(CompileError::semantic(
                schema.location.clone(),
                format!(
                    "duplicate type code '{}' (already used by '{}')",
                    schema.code, self.schemas[existing].name
                ),
            ));
        }

        info!(name = %schema.name, code = %schema.code, fields = schema.fields.len(), "registered resource type");
        let index = self.schemas.len();
        self.by_name.insert(schema.name.clone(), index);
        self.by_code.insert(schema.code.clone(), index);
        self.schemas.push(schema);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TypeSchema> {
        self.by_name.get(name).map(|&i| &self.schemas[i])
    }

    /// Like [`get`](Self::get) but reports an unknown type at `location`.
    pub fn lookup(&self, name: &str, location: &SourceLocation) -> Result<&TypeSchema, CompileError> {
        self.get(name).ok_or_else(|| {
            CompileError::semantic(location.clone(), format!("unknown resource type '{name}'"))
        })
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
