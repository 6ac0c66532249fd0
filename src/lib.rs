pub mod cli;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod processor;
pub mod project;
pub mod writer;

pub use error::{Error, Result};
pub use orchestrator::{GenerateOptions, GenerateReport, generate};

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command, Format};

/// Entry point of the `athalar` binary.
pub fn run() -> ExitCode {
    let args = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if args.verbose { "athalar=debug" } else { "athalar=info" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    execute(args.command)
}

/// Run one command and map its outcome to the process exit code.
pub fn execute(command: Command) -> ExitCode {
    match dispatch(command) {
        Ok(code) => code,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

fn dispatch(command: Command) -> anyhow::Result<ExitCode> {
    match command {
        Command::Info { path, format } => {
            let root = resolve_root(path)?;
            let info = orchestrator::info(&root)
                .with_context(|| format!("Inspecting {}", root.display()))?;
            match format {
                Format::Text => println!("{info}"),
                Format::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&info).context("Serialising project info")?
                ),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Generate { path } => {
            let root = resolve_root(path)?;
            let report = generate(&GenerateOptions::new(&root))
                .with_context(|| format!("Generating bindings for {}", root.display()))?;

            for target in report.failures() {
                if let Err(e) = &target.outcome {
                    let output = target.output.display();
                    eprintln!("error: {} ({output}): {}", target.language, chain(e));
                }
            }
            if report.is_success() {
                Ok(ExitCode::SUCCESS)
            } else {
                eprintln!(
                    "error: {} of {} target(s) failed",
                    report.failures().count(),
                    report.targets.len()
                );
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

/// The working directory is only consulted here.
fn resolve_root(path: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match path {
        Some(path) => Ok(path),
        None => std::env::current_dir().context("Resolving the current directory"),
    }
}

/// Print one line per diagnostic, then the context chain.
fn report(err: &anyhow::Error) {
    match err.downcast_ref::<Error>() {
        Some(inner) => {
            for line in inner.diagnostics() {
                eprintln!("error: {line}");
            }
            let context: Vec<String> = err
                .chain()
                .take_while(|cause| !cause.is::<Error>())
                .map(ToString::to_string)
                .collect();
            if !context.is_empty() {
                eprintln!("note: {}", context.join(": "));
            }
        }
        None => eprintln!("error: {err:#}"),
    }
}

fn chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::model::MANIFEST_FILE;

    fn project(manifest: &str, schema: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), manifest).unwrap();
        fs::write(dir.path().join("bag.ath"), schema).unwrap();
        dir
    }

    const MIXED: &str = r#"
name = "mixed"
schemas = ["*.ath"]

[[targets]]
language = "c"
output = "gen/c"

[[targets]]
language = "typescript"
output = "gen/ts"
"#;

    #[test]
    fn info_exit_codes() {
        let empty = TempDir::new().unwrap();
        let code = execute(Command::Info {
            path: Some(empty.path().to_path_buf()),
            format: Format::Text,
        });
        assert_eq!(code, ExitCode::FAILURE);

        let dir = project(MIXED, "type Bag { item: int }");
        let code = execute(Command::Info {
            path: Some(dir.path().to_path_buf()),
            format: Format::Json,
        });
        assert_eq!(code, ExitCode::SUCCESS);
    }

    #[test]
    fn generate_fails_when_any_target_fails() {
        let dir = project(MIXED, "type Bag { item: any }");
        let code = execute(Command::Generate {
            path: Some(dir.path().to_path_buf()),
        });

        assert_eq!(code, ExitCode::FAILURE);
        assert!(dir.path().join("gen/ts/types.ts").is_file());
        assert!(!dir.path().join("gen/c").exists());
    }

    #[test]
    fn generate_succeeds_when_every_target_does() {
        let dir = project(MIXED, "type Bag { item: int }");
        let code = execute(Command::Generate {
            path: Some(dir.path().to_path_buf()),
        });

        assert_eq!(code, ExitCode::SUCCESS);
        assert!(dir.path().join("gen/c/types.h").is_file());
    }

    #[test]
    fn validation_errors_fail_before_any_target() {
        let dir = project(MIXED, "type Bag { item: Missing }");
        let code = execute(Command::Generate {
            path: Some(dir.path().to_path_buf()),
        });

        assert_eq!(code, ExitCode::FAILURE);
        assert!(!dir.path().join("gen").exists());
    }
}
