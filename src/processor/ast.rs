//! Per-file AST for one schema *before* it is merged into the IR.

use std::fmt;
use std::path::PathBuf;

use crate::model::Span;

/// Names that always resolve to a built-in type and cannot be redeclared.
pub const PRIMITIVE_NAMES: &[&str] = &["int", "float", "bool", "string", "any"];

/// One parsed schema file.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaFile {
    /// Path relative to the project root.
    pub path: PathBuf,
    pub source: String,
    /// Dotted namespace, empty for the root namespace.
    pub namespace: String,
    pub decls: Vec<TypeDecl>,
}

/// `type Name { … }`
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub name: String,
    pub namespace: String,
    pub fields: Vec<Field>,
    pub doc: Option<String>,
    pub span: Span,
}

/// `name: Type? = default @validator`
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: TypeRef,
    pub optional: bool,
    pub default: Option<Literal>,
    /// In source order, without repeats.
    pub validators: Vec<Validator>,
    pub doc: Option<String>,
    pub span: Span,
}

/// A type as written in source, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    /// `Point`, `geo.Point`, `int`
    Named(Vec<String>),
    /// `[T]`
    List(Box<TypeRef>),
}

impl TypeRef {
    pub fn named(path: &str) -> Self {
        TypeRef::Named(path.split('.').map(str::to_string).collect())
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named(path) => f.write_str(&path.join(".")),
            TypeRef::List(inner) => write!(f, "[{inner}]"),
        }
    }
}

/// A value check attached to a field with `@name`. Generated code enforces it
/// where the target language has a way to; elsewhere it is documented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Validator {
    /// Any number. Fits `int` and `float`.
    Number,
    /// Any string. Fits `string`.
    String,
    /// An absolute URL. Fits `string`.
    Url,
    /// A TCP/UDP port, `0..=65535`. Fits `int`.
    Port,
}

impl Validator {
    pub const ALL: [Validator; 4] =
        [Validator::Number, Validator::String, Validator::Url, Validator::Port];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Validator::Number => "number",
            Validator::String => "string",
            Validator::Url => "url",
            Validator::Port => "port",
        }
    }
}

impl fmt::Display for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name())
    }
}

/// Default value literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl Literal {
    pub fn kind(&self) -> &'static str {
        match self {
            Literal::Int(_) => "integer",
            Literal::Float(_) => "float",
            Literal::Str(_) => "string",
            Literal::Bool(_) => "boolean",
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(v) => write!(f, "{v}"),
            Literal::Float(v) => write!(f, "{v:?}"),
            Literal::Str(s) => write!(f, "{s:?}"),
            Literal::Bool(b) => write!(f, "{b}"),
        }
    }
}
