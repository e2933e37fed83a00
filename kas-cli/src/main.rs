use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use kas_core::{CompileOptions, Format, Severity, compile_to_file};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

/// Compile KDL sources into a resource file.
#[derive(Parser, Debug)]
#[command(name = "kas", version, about, long_about = None)]
struct Cli {
    /// A `.kdl` file, or a directory whose `.kdl` files are all compiled.
    input: PathBuf,

    #[arg(short, long, default_value = kas_core::compiler::DEFAULT_OUTPUT)]
    output: PathBuf,

    #[arg(
        short,
        long,
        value_name = "FORMAT",
        default_value = "standard",
        help = "Output format: standard, extended, rez"
    )]
    format: Format,

    #[arg(
        short = 'I',
        long = "include",
        value_name = "DIR",
        help = "Additional directory searched by @import (repeatable)"
    )]
    include: Vec<PathBuf>,
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    execute(cli)
}

/// `RUST_LOG` overrides the default `info` filter.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn execute(cli: Cli) -> Result<()> {
    let options = CompileOptions {
        format: cli.format,
        include_dirs: cli.include,
    };

    let artifact = compile_to_file(&cli.input, &cli.output, &options)
        .with_context(|| format!("failed to compile {}", cli.input.display()))?;

    for message in &artifact.messages {
        println!("{message}");
    }
    let warnings = artifact
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Warning)
        .count();
    info!(
        output = %cli.output.display(),
        format = %options.format,
        resources = artifact.resources.len(),
        warnings,
        "done"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_cmd::Command;
    use predicates::prelude::*;
    use std::fs;
    use tempfile::tempdir;

    const PLUGIN: &str = r#"
@define {
    name = "Weapon";
    code = "weap";
    field("damage") {
        required;
        value(offset = 0, size = word, type = integer);
    };
}
@out { "weapons ready" }
declare Weapon {
    new (id = #128, name = "Laser") {
        damage = 12;
    }
}
"#;

    #[test]
    fn compiles_a_file() {
        let dir = tempdir().expect("tempdir");
        let input_path = dir.path().join("plugin.kdl");
        fs::write(&input_path, PLUGIN).expect("write input");
        let output_path = dir.path().join("out/plugin.kdat");

        Command::cargo_bin("kas")
            .expect("binary exists")
            .arg(&input_path)
            .arg("--output")
            .arg(&output_path)
            .assert()
            .success()
            .stdout(predicate::str::contains("weapons ready"));

        let bytes = fs::read(&output_path).expect("read output");
        assert_eq!(&bytes[0..4], &[0, 0, 1, 0]);
    }

    #[test]
    fn compiles_a_directory_as_rez() {
        let dir = tempdir().expect("tempdir");
        let sources = dir.path().join("src");
        fs::create_dir_all(&sources).expect("mkdir");
        fs::write(sources.join("plugin.kdl"), PLUGIN).expect("write input");
        let output_path = dir.path().join("plugin.rez");

        Command::cargo_bin("kas")
            .expect("binary exists")
            .arg(&sources)
            .arg("-o")
            .arg(&output_path)
            .arg("-f")
            .arg("rez")
            .assert()
            .success();

        let bytes = fs::read(&output_path).expect("read output");
        assert_eq!(&bytes[0..4], b"BRGR");
    }

    #[test]
    fn imports_through_include_dirs() {
        let dir = tempdir().expect("tempdir");
        let shared = dir.path().join("shared");
        fs::create_dir_all(&shared).expect("mkdir");
        fs::write(shared.join("common.kdl"), PLUGIN).expect("write shared");
        let input_path = dir.path().join("main.kdl");
        fs::write(&input_path, "@import { \"common.kdl\" }").expect("write input");
        let output_path = dir.path().join("out.kdat");

        Command::cargo_bin("kas")
            .expect("binary exists")
            .arg(&input_path)
            .arg("-o")
            .arg(&output_path)
            .arg("-I")
            .arg(&shared)
            .assert()
            .success();

        assert!(output_path.exists(), "output was not created");
    }

    #[test]
    fn reports_compile_errors() {
        let dir = tempdir().expect("tempdir");
        let input_path = dir.path().join("broken.kdl");
        fs::write(
            &input_path,
            PLUGIN.replace("damage = 12;", "range = 3;"),
        )
        .expect("write input");
        let output_path = dir.path().join("out.kdat");

        Command::cargo_bin("kas")
            .expect("binary exists")
            .arg(&input_path)
            .arg("-o")
            .arg(&output_path)
            .assert()
            .failure()
            .stderr(predicate::str::contains("no field named 'range'"));

        assert!(!output_path.exists(), "failed compile wrote output");
    }

    #[test]
    fn rejects_unknown_formats() {
        let dir = tempdir().expect("tempdir");
        let input_path = dir.path().join("plugin.kdl");
        fs::write(&input_path, PLUGIN).expect("write input");

        Command::cargo_bin("kas")
            .expect("binary exists")
            .arg(&input_path)
            .arg("--format")
            .arg("zip")
            .assert()
            .failure()
            .stderr(predicate::str::contains("zip"));
    }

    #[test]
    fn reports_missing_input() {
        let dir = tempdir().expect("tempdir");

        Command::cargo_bin("kas")
            .expect("binary exists")
            .arg(dir.path().join("missing.kdl"))
            .arg("-o")
            .arg(dir.path().join("out.kdat"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("missing.kdl"));
    }
}
