//! Intermediate representation shared by every emitter.
//!
//! The IR is keyed and ordered by `(namespace, name)` only, so the order in which
//! files or fields were discovered never shows up in it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::ast::{Literal, Validator};
use crate::model::Span;

/// Stable identifier of a type: its namespace and name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeId {
    pub namespace: String,
    pub name: String,
}

impl TypeId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}.{}", self.namespace, self.name)
        }
    }
}

/// Stable identifier of a field: its owner and name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldId {
    pub owner: TypeId,
    pub name: String,
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Primitive {
    Int,
    Float,
    Bool,
    String,
    Any,
}

impl Primitive {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "int" => Some(Primitive::Int),
            "float" => Some(Primitive::Float),
            "bool" => Some(Primitive::Bool),
            "string" => Some(Primitive::String),
            "any" => Some(Primitive::Any),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Primitive::Int => "int",
            Primitive::Float => "float",
            Primitive::Bool => "bool",
            Primitive::String => "string",
            Primitive::Any => "any",
        }
    }
}

/// A fully resolved field type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IrType {
    Primitive(Primitive),
    Named(TypeId),
    List(Box<IrType>),
}

impl IrType {
    /// The user type this refers to, looking through lists.
    pub fn named_target(&self) -> Option<&TypeId> {
        match self {
            IrType::Primitive(_) => None,
            IrType::Named(id) => Some(id),
            IrType::List(inner) => inner.named_target(),
        }
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrType::Primitive(p) => f.write_str(p.name()),
            IrType::Named(id) => write!(f, "{id}"),
            IrType::List(inner) => write!(f, "[{inner}]"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IrField {
    pub id: FieldId,
    pub name: String,
    pub ty: IrType,
    pub optional: bool,
    pub default: Option<Literal>,
    pub validators: Vec<Validator>,
    pub doc: Option<String>,
    /// The referenced type can reach the owner again, so the field needs an
    /// indirect representation in value-layout languages.
    pub recursive: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IrTypeDecl {
    pub id: TypeId,
    /// Sorted by name.
    pub fields: Vec<IrField>,
    pub doc: Option<String>,
    pub span: Span,
}

impl IrTypeDecl {
    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn namespace(&self) -> &str {
        &self.id.namespace
    }
}

/// The validated type graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IrModule {
    types: BTreeMap<TypeId, IrTypeDecl>,
}

impl IrModule {
    pub(crate) fn new(types: BTreeMap<TypeId, IrTypeDecl>) -> Self {
        Self { types }
    }

    /// All types in `(namespace, name)` order.
    pub fn types(&self) -> impl Iterator<Item = &IrTypeDecl> {
        self.types.values()
    }

    pub fn get(&self, id: &TypeId) -> Option<&IrTypeDecl> {
        self.types.get(id)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Types grouped by namespace, both levels in sorted order.
    pub fn namespaces(&self) -> BTreeMap<&str, Vec<&IrTypeDecl>> {
        let mut out: BTreeMap<&str, Vec<&IrTypeDecl>> = BTreeMap::new();
        for decl in self.types.values() {
            out.entry(decl.namespace()).or_default().push(decl);
        }
        out
    }

    /// Namespaces (other than `namespace`) referenced by types declared in `namespace`.
    pub fn foreign_namespaces(&self, namespace: &str) -> BTreeSet<&str> {
        self.types
            .values()
            .filter(|decl| decl.namespace() == namespace)
            .flat_map(|decl| decl.fields.iter())
            .filter_map(|field| field.ty.named_target())
            .map(|target| target.namespace.as_str())
            .filter(|ns| *ns != namespace)
            .collect()
    }
}
