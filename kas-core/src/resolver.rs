//! Resolution of `file("...")` values into imported resources.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::CompileError;
use crate::span::SourceLocation;

/// An external file turned into a resource of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub id: i64,
    pub type_code: String,
    pub name: String,
    pub data: Vec<u8>,
}

pub trait FileResolver {
    /// Turn `path`, written at `location`, into a resource whose id is
    /// `desired_id` or the next free id above it.
    fn resolve(
        &mut self,
        path: &str,
        desired_id: i64,
        location: &SourceLocation,
    ) -> Result<ResolvedFile, CompileError>;

    /// Mark `(code, id)` as used by a declared resource.
    fn reserve(&mut self, _code: &str, _id: i64) {}
}

/// Reads files from disk relative to the directory of the source file
/// that references them.
#[derive(Debug, Default)]
pub struct DiskFileResolver {
    taken: HashMap<String, BTreeSet<i64>>,
}

impl DiskFileResolver {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self, code: &str, desired: i64) -> i64 {
        let taken = self.taken.entry(code.to_string()).or_default();
        let mut id = desired;
        while taken.contains(&id) {
            id += 1;
        }
        taken.insert(id);
        id
    }
}

impl FileResolver for DiskFileResolver {
    fn resolve(
        &mut self,
        path: &str,
        desired_id: i64,
        location: &SourceLocation,
    ) -> Result<ResolvedFile, CompileError> {
        let full = resolve_relative(path, location);
        let data = fs::read(&full).map_err(|e| CompileError::io(&full, e))?;
        let type_code = type_code_for(&full);
        let id = self.allocate(&type_code, desired_id);
        let name = full
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        debug!(path = %full.display(), code = %type_code, id, bytes = data.len(), "imported file resource");
        Ok(ResolvedFile {
            id,
            type_code,
            name,
            data,
        })
    }

    fn reserve(&mut self, code: &str, id: i64) {
        self.taken.entry(code.to_string()).or_default().insert(id);
    }
}

fn resolve_relative(path: &str, location: &SourceLocation) -> PathBuf {
    let requested = Path::new(path);
    if requested.is_absolute() {
        return requested.to_path_buf();
    }
    Path::new(location.file.as_ref())
        .parent()
        .map(|dir| dir.join(requested))
        .unwrap_or_else(|| requested.to_path_buf())
}

/// Resource type code implied by a file's extension.
pub fn type_code_for(path: &Path) -> String {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "PNG ".to_string(),
        "pict" | "pct" => "PICT".to_string(),
        "wav" | "snd" => "snd ".to_string(),
        "txt" => "TEXT".to_string(),
        other => {
            let mut code: String = other.to_ascii_uppercase().chars().take(4).collect();
            while code.chars().count() < 4 {
                code.push(' ');
            }
            code
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn maps_extensions_to_type_codes() {
        assert_eq!(type_code_for(Path::new("a/rock.png")), "PNG ");
        assert_eq!(type_code_for(Path::new("rock.PCT")), "PICT");
        assert_eq!(type_code_for(Path::new("boom.wav")), "snd ");
        assert_eq!(type_code_for(Path::new("notes.txt")), "TEXT");
        assert_eq!(type_code_for(Path::new("tune.ogg")), "OGG ");
        assert_eq!(type_code_for(Path::new("noext")), "    ");
    }

    #[test]
    fn reads_relative_to_the_source_and_allocates_ids() {
        let dir = tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("art")).expect("mkdir");
        fs::write(dir.path().join("art/rock.png"), [0x89, b'P', b'N', b'G']).expect("write");
        let source = dir.path().join("main.kdl");
        let location = SourceLocation::new(source.display().to_string(), 3);

        let mut resolver = DiskFileResolver::new();
        resolver.reserve("PNG ", 128);
        let first = resolver.resolve("art/rock.png", 128, &location).expect("resolve");
        assert_eq!(first.id, 129);
        assert_eq!(first.type_code, "PNG ");
        assert_eq!(first.name, "rock");
        assert_eq!(first.data, vec![0x89, b'P', b'N', b'G']);

        let second = resolver.resolve("art/rock.png", 128, &location).expect("resolve");
        assert_eq!(second.id, 130);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let mut resolver = DiskFileResolver::new();
        let err = resolver
            .resolve("nope.png", 1, &SourceLocation::new("/tmp/none/main.kdl", 1))
            .unwrap_err();
        assert!(matches!(err, CompileError::Io { .. }));
    }
}
