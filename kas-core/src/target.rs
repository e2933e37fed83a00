//! The output of one compile run: every declared resource instance, in
//! the order it will be encoded.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::assembler::Assembler;
use crate::diagnostic::{Diagnostic, DiagnosticSink};
use crate::error::CompileError;
use crate::registry::TypeRegistry;
use crate::resolver::FileResolver;
use crate::resource::{InstanceNode, ResourceInstance};
use crate::rsrc::ContainerFile;

#[derive(Debug, Clone)]
pub struct Target {
    path: PathBuf,
    resources: Vec<ResourceInstance>,
}

impl Target {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            resources: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn add_resource(&mut self, instance: ResourceInstance) {
        self.resources.push(instance);
    }

    /// Add a parsed instance and everything nested inside it.
    pub fn add_tree(&mut self, node: InstanceNode) {
        node.flatten_into(&mut self.resources);
    }

    pub fn resources(&self) -> &[ResourceInstance] {
        &self.resources
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Encode every instance against its schema and collect the results,
    /// plus any resources imported through `file(...)`, into a container.
    pub fn assemble(
        &self,
        registry: &TypeRegistry,
        resolver: &mut dyn FileResolver,
        diagnostics: &mut dyn DiagnosticSink,
    ) -> Result<ContainerFile, CompileError> {
        let mut schemas = Vec::with_capacity(self.resources.len());
        for instance in &self.resources {
            let schema = registry.lookup(&instance.type_name, &instance.location)?;
            resolver.reserve(&schema.code, instance.id);
            schemas.push(schema);
        }

        let mut duplicates = Vec::new();
        let mut file = ContainerFile::new();
        {
            let mut assembler = Assembler::new(resolver, diagnostics);
            for (instance, schema) in self.resources.iter().zip(schemas) {
                let blob = assembler.assemble(schema, instance)?;
                if file.contains(&schema.code, instance.id) {
                    duplicates.push(Diagnostic::warning(
                        format!(
                            "duplicate resource id #{} for type '{}'",
                            instance.id, schema.name
                        ),
                        instance.location.clone(),
                    ));
                }
                file.add_resource(&schema.code, instance.id, instance.name.clone(), blob);
                for import in assembler.take_imports() {
                    file.add_resource(&import.type_code, import.id, import.name, import.data);
                }
            }
        }
        for warning in duplicates {
            diagnostics.emit(warning.with_code("W0002"));
        }

        debug!(types = file.types().len(), resources = file.resource_count(), "assembled target");
        Ok(file)
    }

    /// Persist already-encoded bytes to the target path, creating parent
    /// directories as needed.
    pub fn write(&self, bytes: &[u8]) -> Result<(), CompileError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| CompileError::io(parent, e))?;
            }
        }
        fs::write(&self.path, bytes).map_err(|e| CompileError::io(&self.path, e))?;
        info!(path = %self.path.display(), bytes = bytes.len(), "wrote resource file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::CollectingSink;
    use crate::resolver::DiskFileResolver;
    use crate::resource::{InstanceField, Value, ValueType};
    use crate::schema::{Field, TypeSchema, ValueKind, ValueSlot};
    use crate::span::SourceLocation;
    use tempfile::tempdir;

    fn registry() -> TypeRegistry {
        let mut field = Field::new("n");
        field.values.push(ValueSlot::new(
            "n",
            ValueKind::Integer {
                width: 2,
                signed: true,
            },
            0,
            2,
        ));
        let mut registry = TypeRegistry::new();
        registry
            .register(TypeSchema {
                name: "Thing".into(),
                code: "thng".into(),
                fields: vec![field],
                references: vec![],
                location: SourceLocation::unknown(),
            })
            .expect("register");
        registry
    }

    fn thing(id: i64, n: &str) -> ResourceInstance {
        let mut instance = ResourceInstance::new("Thing", id, "", SourceLocation::new("main.kdl", 1));
        instance
            .add_field(InstanceField {
                name: "n".into(),
                values: vec![Value::new(ValueType::Integer, n, SourceLocation::unknown())],
                location: SourceLocation::unknown(),
            })
            .expect("field");
        instance
    }

    #[test]
    fn assembles_in_declaration_order() {
        let mut target = Target::new("out.kdat");
        target.add_resource(thing(2, "7"));
        target.add_resource(thing(1, "9"));
        let mut resolver = DiskFileResolver::new();
        let mut sink = CollectingSink::new();
        let file = target
            .assemble(&registry(), &mut resolver, &mut sink)
            .expect("assemble");
        let ids: Vec<_> = file.resources().map(|(_, r)| r.id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(file.resources().next().map(|(_, r)| r.data.clone()), Some(vec![0, 7]));
    }

    #[test]
    fn duplicate_ids_warn() {
        let mut target = Target::new("out.kdat");
        target.add_resource(thing(1, "1"));
        target.add_resource(thing(1, "2"));
        let mut resolver = DiskFileResolver::new();
        let mut sink = CollectingSink::new();
        target
            .assemble(&registry(), &mut resolver, &mut sink)
            .expect("assemble");
        let warnings: Vec<_> = sink.warnings().collect();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("duplicate resource id #1"));
    }

    #[test]
    fn unknown_type_fails_before_encoding() {
        let mut target = Target::new("out.kdat");
        target.add_resource(ResourceInstance::new("Ghost", 1, "", SourceLocation::new("main.kdl", 5)));
        let mut resolver = DiskFileResolver::new();
        let mut sink = CollectingSink::new();
        let err = target
            .assemble(&registry(), &mut resolver, &mut sink)
            .unwrap_err();
        assert_eq!(err.to_string(), "main.kdl:5: unknown resource type 'Ghost'");
    }

    #[test]
    fn writes_into_new_directories() {
        let dir = tempdir().expect("tempdir");
        let target = Target::new(dir.path().join("build/plugin.kdat"));
        target.write(&[1, 2, 3]).expect("write");
        assert_eq!(fs::read(target.path()).expect("read"), vec![1, 2, 3]);
    }
}
