//! `@name { ... }` directives.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::diagnostic::Diagnostic;
use crate::error::CompileError;
use crate::lexer::{Token, TokenKind, tokenize};

use super::{Condition, Sema, define};

pub fn test(sema: &Sema<'_>) -> bool {
    sema.expect(&[Condition::kind(TokenKind::Directive)])
}

pub fn parse(sema: &mut Sema<'_>) -> Result<(), CompileError> {
    let head = sema.ensure_one(Condition::kind(TokenKind::Directive))?;
    debug!(directive = %head.text, location = %head.location, "directive");

    match head.text.as_str() {
        "out" => parse_out(sema),
        "import" => parse_import(sema, &head),
        "define" => define::parse(sema, &head),
        other => Err(CompileError::syntax(
            head.location.clone(),
            format!("unknown directive '@{other}'"),
        )),
    }
}

/// `@out { tokens... }` reports every argument token as a note.
fn parse_out(sema: &mut Sema<'_>) -> Result<(), CompileError> {
    let args = braced_arguments(sema)?;
    for arg in args {
        sema.diagnostics().emit(Diagnostic::note(arg.text.clone(), arg.location));
        sema.push_message(arg.text);
    }
    Ok(())
}

/// `@import { "path" ... }` splices each named file in front of the
/// remaining tokens, in argument order.
fn parse_import(sema: &mut Sema<'_>, head: &Token) -> Result<(), CompileError> {
    let args = braced_arguments(sema)?;
    if args.is_empty() {
        return Err(CompileError::syntax(
            head.location.clone(),
            "@import expects at least one file path",
        ));
    }

    let mut spliced = Vec::new();
    for arg in &args {
        if !arg.is(TokenKind::String) {
            return Err(CompileError::syntax(
                arg.location.clone(),
                format!("@import expects string paths, found '{}'", arg.text),
            ));
        }
        let path = resolve_import(sema, arg)?;
        let source = fs::read_to_string(&path).map_err(|e| CompileError::io(&path, e))?;
        debug!(path = %path.display(), "imported source file");
        spliced.extend(tokenize(&source, path.display().to_string())?);
    }
    sema.insert_tokens(spliced)
}

fn braced_arguments(sema: &mut Sema<'_>) -> Result<Vec<Token>, CompileError> {
    sema.ensure_one(Condition::kind(TokenKind::LBrace))?;
    let args = sema.consume(Condition::kind(TokenKind::RBrace).not());
    sema.ensure_one(Condition::kind(TokenKind::RBrace))?;
    Ok(args)
}

/// The importing file's directory first, then each include directory.
fn resolve_import(sema: &Sema<'_>, arg: &Token) -> Result<PathBuf, CompileError> {
    let requested = Path::new(&arg.text);
    if requested.is_absolute() {
        return if requested.is_file() {
            Ok(requested.to_path_buf())
        } else {
            Err(missing_import(arg))
        };
    }

    let importing_dir = Path::new(arg.location.file.as_ref())
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    std::iter::once(importing_dir)
        .chain(sema.include_dirs().iter().cloned())
        .map(|dir| dir.join(requested))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| missing_import(arg))
}

fn missing_import(arg: &Token) -> CompileError {
    CompileError::semantic(
        arg.location.clone(),
        format!("imported file '{}' could not be found", arg.text),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::CollectingSink;
    use crate::registry::TypeRegistry;
    use crate::target::Target;
    use tempfile::tempdir;

    fn run_file(path: &Path, include_dirs: Vec<PathBuf>) -> Result<Vec<String>, CompileError> {
        let mut registry = TypeRegistry::new();
        let mut target = Target::new("out.kdat");
        let mut sink = CollectingSink::new();
        let source = fs::read_to_string(path).expect("read");
        let tokens = tokenize(&source, path.display().to_string())?;
        let mut sema =
            Sema::new(tokens, &mut registry, &mut target, &mut sink).with_include_dirs(include_dirs);
        sema.run()?;
        Ok(sema.into_messages())
    }

    #[test]
    fn out_collects_each_argument() {
        let dir = tempdir().expect("tempdir");
        let main = dir.path().join("main.kdl");
        fs::write(&main, "@out { \"hello\" world 42 }").expect("write");
        assert_eq!(
            run_file(&main, vec![]).expect("run"),
            vec!["hello", "world", "42"]
        );
    }

    #[test]
    fn out_reports_notes_at_each_token() {
        let mut registry = TypeRegistry::new();
        let mut target = Target::new("out.kdat");
        let mut sink = CollectingSink::new();
        let tokens = tokenize("@out {\n  \"ready\"\n}", "main.kdl").expect("lex");
        Sema::new(tokens, &mut registry, &mut target, &mut sink)
            .run()
            .expect("run");
        assert_eq!(sink.diagnostics.len(), 1);
        assert_eq!(sink.diagnostics[0].severity, crate::diagnostic::Severity::Note);
        assert_eq!(sink.diagnostics[0].to_string(), "main.kdl:2: note: ready");
    }

    #[test]
    fn import_splices_before_the_remainder() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("a.kdl"), "@out { \"from a\" }").expect("write");
        let main = dir.path().join("main.kdl");
        fs::write(&main, "@import { \"a.kdl\" }\n@out { \"after\" }").expect("write");
        assert_eq!(
            run_file(&main, vec![]).expect("run"),
            vec!["from a", "after"]
        );
    }

    #[test]
    fn import_falls_back_to_include_dirs() {
        let dir = tempdir().expect("tempdir");
        let shared = dir.path().join("shared");
        fs::create_dir_all(&shared).expect("mkdir");
        fs::write(shared.join("types.kdl"), "@out { \"shared\" }").expect("write");
        let main = dir.path().join("main.kdl");
        fs::write(&main, "@import { \"types.kdl\" }").expect("write");

        assert!(run_file(&main, vec![]).is_err());
        assert_eq!(
            run_file(&main, vec![shared]).expect("run"),
            vec!["shared"]
        );
    }

    #[test]
    fn self_import_hits_the_depth_limit() {
        let dir = tempdir().expect("tempdir");
        let main = dir.path().join("loop.kdl");
        fs::write(&main, "@import { \"loop.kdl\" }").expect("write");
        let err = run_file(&main, vec![]).unwrap_err();
        assert!(err.to_string().contains("nested deeper than 64"));
    }

    #[test]
    fn unknown_directive_is_fatal() {
        let dir = tempdir().expect("tempdir");
        let main = dir.path().join("main.kdl");
        fs::write(&main, "@frobnicate { }").expect("write");
        let err = run_file(&main, vec![]).unwrap_err();
        assert!(err.to_string().contains("unknown directive '@frobnicate'"));
    }
}
