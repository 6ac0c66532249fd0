//! Error taxonomy.
//!
//! Validation-phase errors (manifest through IR build) are [`Error`]s and abort the
//! run before any emitter starts. Emission-phase errors are [`TargetError`]s and only
//! fail the target they belong to.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::model::{Language, Span};
use crate::processor::ast::Validator;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no project found at {}: {reason}", .path.display())]
    ProjectNotFound { path: PathBuf, reason: String },

    #[error("{}:{line}:{column}: invalid manifest: {message}", .file.display())]
    ManifestParse {
        file: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("targets `{first}` and `{second}` both write to {}", .output.display())]
    OutputConflict {
        output: PathBuf,
        first: Language,
        second: Language,
    },

    #[error("schema pattern(s) matched no files: {}", .patterns.join(", "))]
    SchemaNotFound { patterns: Vec<String> },

    #[error("invalid schema pattern `{pattern}`: {message}")]
    SchemaPattern { pattern: String, message: String },

    #[error("failed to read {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("found {} syntax error(s)", .0.len())]
    Syntax(Vec<SyntaxError>),

    #[error("found {} schema error(s)", .0.len())]
    Validation(Vec<IrError>),
}

impl Error {
    /// One line per user-actionable problem. Batch errors expand to every entry.
    pub fn diagnostics(&self) -> Vec<String> {
        match self {
            Error::Syntax(errors) => errors.iter().map(ToString::to_string).collect(),
            Error::Validation(errors) => errors.iter().map(ToString::to_string).collect(),
            Error::Read { source, .. } => vec![format!("{self}: {source}")],
            other => vec![other.to_string()],
        }
    }
}

/// A lexical or grammatical problem at one location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub span: Span,
    pub message: String,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.span, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionKind {
    Type,
    Field,
}

impl fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefinitionKind::Type => f.write_str("type"),
            DefinitionKind::Field => f.write_str("field"),
        }
    }
}

/// Problems found while merging schema files into the IR.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IrError {
    #[error("{second}: duplicate definition of {kind} `{name}` (first defined at {first})")]
    DuplicateDefinition {
        kind: DefinitionKind,
        name: String,
        first: Span,
        second: Span,
    },

    #[error("{span}: field `{field}` refers to unknown type `{reference}`")]
    UnresolvedTypeReference {
        field: String,
        reference: String,
        span: Span,
    },

    #[error(
        "{span}: type `{ty}` contains itself through non-optional fields ({})",
        .cycle.join(" -> ")
    )]
    InvalidRecursiveType {
        ty: String,
        cycle: Vec<String>,
        span: Span,
    },

    #[error("{span}: default value {value} does not fit field `{field}` of type `{ty}`")]
    InvalidDefault {
        field: String,
        ty: String,
        value: String,
        span: Span,
    },

    #[error("{span}: validator `{validator}` cannot check field `{field}` of type `{ty}`")]
    InvalidValidator {
        field: String,
        validator: Validator,
        ty: String,
        span: Span,
    },
}

/// Raised by an emitter for an IR shape its target cannot express.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmitError {
    #[error("{language} cannot represent `{location}`: {reason}")]
    UnsupportedConstruct {
        language: Language,
        location: String,
        reason: String,
    },

    #[error("failed to format generated code")]
    Format(#[from] fmt::Error),
}

/// Failure of a single target. Other targets are unaffected.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error(transparent)]
    Unsupported(#[from] EmitError),

    #[error("failed to write {}", .path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cancelled before completion")]
    Cancelled,
}
