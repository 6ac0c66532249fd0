//! pydantic v2 models, one module per namespace plus a package `__init__.py`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use super::naming::{self, NameTable, TypeScope};
use super::{BANNER, EmitResult, Emitter, doc_lines, escape_with_suffix, module_stems};
use crate::error::EmitError;
use crate::model::{Case, Language, TargetConfig};
use crate::processor::ast::{Literal, Validator};
use crate::processor::ir::{IrField, IrModule, IrType, Primitive};

/// Keywords plus the names the generated modules import.
const RESERVED: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield", "Annotated", "Any", "List", "Optional", "AnyUrl",
    "BaseModel", "ConfigDict", "Field", "annotations",
];

pub struct PythonEmitter;

impl Emitter for PythonEmitter {
    fn language(&self) -> Language {
        Language::Python
    }

    fn emit(&self, ir: &IrModule, config: &TargetConfig) -> Result<EmitResult, EmitError> {
        let (type_case, field_case) = naming::cases(&config.naming, Case::Pascal, Case::Snake);
        let stems: BTreeMap<String, String> = module_stems(ir, Language::Python)?
            .into_iter()
            .map(|(ns, stem)| (ns, escape_with_suffix(stem, RESERVED)))
            .collect();
        let names = NameTable::build(
            ir,
            Language::Python,
            TypeScope::PerNamespace,
            |decl| escape_with_suffix(type_case.apply(decl.name()), RESERVED),
            |field| escape_with_suffix(field_case.apply(&field.name), RESERVED),
        )?;

        let mut result = EmitResult::default();
        for (namespace, decls) in ir.namespaces() {
            let ctx = Context {
                namespace,
                names: &names,
                stems: &stems,
            };

            let mut body = String::new();
            let mut typing = BTreeSet::new();
            let mut pydantic = BTreeSet::from(["BaseModel"]);

            for decl in &decls {
                writeln!(body)?;
                writeln!(body)?;
                writeln!(body, "class {}(BaseModel):", names.ty(&decl.id))?;
                let doc = doc_lines(decl.doc.as_deref(), None);
                if !doc.is_empty() {
                    write_docstring(&mut body, &doc)?;
                    if !decl.fields.is_empty() {
                        writeln!(body)?;
                    }
                }

                let aliased = decl.fields.iter().any(|f| names.field(&f.id) != f.name);
                if aliased {
                    pydantic.insert("ConfigDict");
                    writeln!(body, "    model_config = ConfigDict(populate_by_name=True)")?;
                    writeln!(body)?;
                }

                for field in &decl.fields {
                    for line in doc_lines(field.doc.as_deref(), None) {
                        writeln!(body, "    # {line}")?;
                    }
                    let annotation = ctx.annotation(field, &mut typing, &mut pydantic);
                    let name = names.field(&field.id);
                    match initialiser(field, name != field.name) {
                        Some(init) => {
                            if init.starts_with("Field(") {
                                pydantic.insert("Field");
                            }
                            writeln!(body, "    {name}: {annotation} = {init}")?;
                        }
                        None => writeln!(body, "    {name}: {annotation}")?,
                    }
                }

                if decl.fields.is_empty() && doc.is_empty() {
                    writeln!(body, "    pass")?;
                }
            }

            let mut out = String::new();
            writeln!(out, "# {BANNER}")?;
            writeln!(out)?;
            writeln!(out, "from __future__ import annotations")?;
            writeln!(out)?;
            if !typing.is_empty() {
                let list: Vec<_> = typing.into_iter().collect();
                writeln!(out, "from typing import {}", list.join(", "))?;
                writeln!(out)?;
            }
            let list: Vec<_> = pydantic.into_iter().collect();
            writeln!(out, "from pydantic import {}", list.join(", "))?;

            let imports = ir.foreign_namespaces(namespace);
            if !imports.is_empty() {
                writeln!(out)?;
                for foreign in imports {
                    writeln!(out, "from . import {}", ctx.stem(foreign))?;
                }
            }
            out.push_str(&body);

            result.add(format!("{}.py", ctx.stem(namespace)), out);
        }

        result.add("__init__.py", package_init(ir, &names, &stems)?);
        Ok(result)
    }
}

/// Imports every module, then resolves the string annotations of every model.
fn package_init(
    ir: &IrModule,
    names: &NameTable,
    stems: &BTreeMap<String, String>,
) -> Result<String, EmitError> {
    let mut out = String::new();
    writeln!(out, "# {BANNER}")?;
    if stems.is_empty() {
        return Ok(out);
    }
    writeln!(out)?;
    for stem in stems.values() {
        writeln!(out, "from . import {stem}")?;
    }
    writeln!(out)?;
    for decl in ir.types() {
        let stem = stems.get(decl.namespace()).map_or(decl.namespace(), String::as_str);
        writeln!(out, "{stem}.{}.model_rebuild()", names.ty(&decl.id))?;
    }
    Ok(out)
}

struct Context<'a> {
    namespace: &'a str,
    names: &'a NameTable,
    stems: &'a BTreeMap<String, String>,
}

impl Context<'_> {
    fn stem<'s>(&'s self, namespace: &'s str) -> &'s str {
        self.stems.get(namespace).map_or(namespace, String::as_str)
    }

    fn annotation(
        &self,
        field: &IrField,
        typing: &mut BTreeSet<&'static str>,
        pydantic: &mut BTreeSet<&'static str>,
    ) -> String {
        let mut inner = if field.validators.contains(&Validator::Url) {
            pydantic.insert("AnyUrl");
            "AnyUrl".to_string()
        } else {
            self.type_ref(&field.ty, typing)
        };

        let constraints = constraints(&field.validators);
        if !constraints.is_empty() {
            typing.insert("Annotated");
            pydantic.insert("Field");
            inner = format!("Annotated[{inner}, Field({})]", constraints.join(", "));
        }

        if field.optional {
            typing.insert("Optional");
            format!("Optional[{inner}]")
        } else {
            inner
        }
    }

    fn type_ref(&self, ty: &IrType, typing: &mut BTreeSet<&'static str>) -> String {
        match ty {
            IrType::Primitive(Primitive::Int) => "int".into(),
            IrType::Primitive(Primitive::Float) => "float".into(),
            IrType::Primitive(Primitive::Bool) => "bool".into(),
            IrType::Primitive(Primitive::String) => "str".into(),
            IrType::Primitive(Primitive::Any) => {
                typing.insert("Any");
                "Any".into()
            }
            IrType::Named(id) if id.namespace == self.namespace => self.names.ty(id).to_string(),
            IrType::Named(id) => {
                format!("{}.{}", self.stem(&id.namespace), self.names.ty(id))
            }
            IrType::List(inner) => {
                typing.insert("List");
                format!("List[{}]", self.type_ref(inner, typing))
            }
        }
    }
}

/// `Field` arguments enforcing the validators. `@number` and `@string` turn off
/// coercion; `@url` is carried by the `AnyUrl` type instead.
fn constraints(validators: &[Validator]) -> Vec<&'static str> {
    let mut out = Vec::new();
    let strict = validators.iter().any(|v| matches!(v, Validator::Number | Validator::String));
    if strict && !validators.contains(&Validator::Url) {
        out.push("strict=True");
    }
    if validators.contains(&Validator::Port) {
        out.extend(["ge=0", "le=65535"]);
    }
    out
}

/// Right-hand side of a field, if it needs one.
fn initialiser(field: &IrField, aliased: bool) -> Option<String> {
    let default = match &field.default {
        Some(value) => Some(literal(value, &field.ty)),
        None if field.optional => Some("None".to_string()),
        None => None,
    };
    match (default, aliased) {
        (default, false) => default,
        (Some(default), true) => Some(format!(
            "Field(default={default}, alias={})",
            quote(&field.name)
        )),
        (None, true) => Some(format!("Field(alias={})", quote(&field.name))),
    }
}

fn literal(value: &Literal, ty: &IrType) -> String {
    match value {
        Literal::Int(v) if *ty == IrType::Primitive(Primitive::Float) => format!("{v}.0"),
        Literal::Int(v) => v.to_string(),
        Literal::Float(v) => format!("{v:?}"),
        Literal::Bool(true) => "True".into(),
        Literal::Bool(false) => "False".into(),
        Literal::Str(s) => quote(s),
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn write_docstring(out: &mut String, lines: &[String]) -> std::fmt::Result {
    let escaped: Vec<String> = lines.iter().map(|l| l.replace("\"\"\"", "\\\"\\\"\\\"")).collect();
    if let [line] = escaped.as_slice() {
        return writeln!(out, "    \"\"\"{line}\"\"\"");
    }
    writeln!(out, "    \"\"\"")?;
    for line in &escaped {
        if line.is_empty() {
            writeln!(out)?;
        } else {
            writeln!(out, "    {line}")?;
        }
    }
    writeln!(out, "    \"\"\"")
}
