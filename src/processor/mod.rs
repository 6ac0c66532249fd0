//! The functional core: schema discovery, parsing and IR construction.
pub mod ast;
pub mod ir;
pub mod ir_builder;
pub mod lexer;
pub mod schema_parser;

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::{Error, Result, SyntaxError};
use crate::model::Project;
use ast::SchemaFile;
use ir::IrModule;

/// Runs every validation pass and returns the read-only IR handed to writers.
pub fn run(project: &Project) -> Result<IrModule> {
    let paths = discover(project)?;
    let files = parse_schemas(&project.root, &paths)?;
    let ir = ir_builder::build(&files).map_err(Error::Validation)?;
    info!(types = ir.len(), "schema validated");
    Ok(ir)
}

/// Expand one manifest pattern. Only regular files count as matches.
pub fn match_pattern(root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full = if Path::new(pattern).is_absolute() {
        pattern.to_string()
    } else {
        let root = glob::Pattern::escape(&root.to_string_lossy());
        format!("{}/{}", root.trim_end_matches('/'), pattern)
    };

    let entries = glob::glob(&full).map_err(|e| Error::SchemaPattern {
        pattern: pattern.to_string(),
        message: e.msg.to_string(),
    })?;

    let mut matched = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| Error::Read {
            path: e.path().to_path_buf(),
            source: e.into(),
        })?;
        if path.is_file() {
            matched.push(path);
        }
    }
    Ok(matched)
}

/// Expand every schema pattern of the manifest. The result is deduplicated and
/// sorted. Patterns without a match are reported together.
pub fn discover(project: &Project) -> Result<Vec<PathBuf>> {
    let mut found = BTreeSet::new();
    let mut missing = Vec::new();

    for pattern in &project.manifest.schemas {
        let matched = match_pattern(&project.root, pattern)?;
        debug!(pattern = %pattern, matches = matched.len(), "expanded schema pattern");
        if matched.is_empty() {
            missing.push(pattern.clone());
        }
        found.extend(matched);
    }

    if !missing.is_empty() {
        return Err(Error::SchemaNotFound { patterns: missing });
    }
    Ok(found.into_iter().collect())
}

/// Read and parse every file concurrently. Syntax errors of all files are
/// returned as one batch.
pub fn parse_schemas(root: &Path, paths: &[PathBuf]) -> Result<Vec<SchemaFile>> {
    let results: Vec<Result<Result<SchemaFile, Vec<SyntaxError>>>> = paths
        .par_iter()
        .map(|path| {
            let source = fs::read_to_string(path).map_err(|source| Error::Read {
                path: path.clone(),
                source,
            })?;
            let relative = path.strip_prefix(root).unwrap_or(path);
            debug!(file = %relative.display(), bytes = source.len(), "parsing schema");
            Ok(schema_parser::parse(relative, &source))
        })
        .collect();

    let mut files = Vec::with_capacity(paths.len());
    let mut syntax_errors = Vec::new();
    for result in results {
        match result? {
            Ok(file) => files.push(file),
            Err(errors) => syntax_errors.extend(errors),
        }
    }

    if !syntax_errors.is_empty() {
        return Err(Error::Syntax(syntax_errors));
    }
    info!(files = files.len(), "schemas parsed");
    Ok(files)
}
