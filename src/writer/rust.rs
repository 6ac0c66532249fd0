//! serde structs, one module per namespace plus a `mod.rs` declaring them.

use std::collections::BTreeMap;
use std::fmt::Write;

use super::naming::{self, NameTable, TypeScope};
use super::{BANNER, EmitResult, Emitter, doc_lines, escape_with_suffix, field_doc, module_stems};
use crate::error::EmitError;
use crate::model::{Case, Language, TargetConfig};
use crate::processor::ast::Literal;
use crate::processor::ir::{IrField, IrModule, IrType, Primitive};

/// Keywords usable as raw identifiers.
const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "dyn", "else", "enum", "extern",
    "false", "fn", "for", "gen", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "pub", "ref", "return", "static", "struct", "trait", "true", "try", "type",
    "unsafe", "use", "where", "while", "abstract", "become", "box", "do", "final", "macro",
    "override", "priv", "typeof", "unsized", "virtual", "yield",
];

/// Keywords that cannot be raw, and prelude names the generated code relies on.
const RESERVED: &[&str] = &[
    "self", "Self", "super", "crate", "Box", "Option", "Vec", "String", "Serialize",
    "Deserialize",
];

pub struct RustEmitter;

impl Emitter for RustEmitter {
    fn language(&self) -> Language {
        Language::Rust
    }

    fn emit(&self, ir: &IrModule, config: &TargetConfig) -> Result<EmitResult, EmitError> {
        let (type_case, field_case) = naming::cases(&config.naming, Case::Pascal, Case::Snake);
        let stems: BTreeMap<String, String> = module_stems(ir, Language::Rust)?
            .into_iter()
            .map(|(ns, stem)| (ns, ident(stem)))
            .collect();
        let names = NameTable::build(
            ir,
            Language::Rust,
            TypeScope::PerNamespace,
            |decl| ident(type_case.apply(decl.name())),
            |field| ident(field_case.apply(&field.name)),
        )?;

        let mut result = EmitResult::default();
        for (namespace, decls) in ir.namespaces() {
            let ctx = Context {
                namespace,
                names: &names,
                stems: &stems,
            };
            let mut out = String::new();

            writeln!(out, "// {BANNER}")?;
            writeln!(out)?;
            writeln!(out, "use serde::{{Deserialize, Serialize}};")?;

            for decl in &decls {
                let type_name = names.ty(&decl.id);
                writeln!(out)?;
                write_doc(&mut out, "", &doc_lines(decl.doc.as_deref(), None))?;
                writeln!(out, "#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]")?;
                if decl.fields.is_empty() {
                    writeln!(out, "pub struct {type_name} {{}}")?;
                    continue;
                }
                writeln!(out, "pub struct {type_name} {{")?;
                let mut defaults = String::new();
                let mut default_fns = Vec::new();
                for field in &decl.fields {
                    let name = names.field(&field.id);
                    let ty = ctx.field_type(field);
                    write_doc(&mut out, "    ", &field_doc(field, false))?;

                    let mut attrs = Vec::new();
                    if unraw(name) != field.name {
                        attrs.push(format!("rename = \"{}\"", field.name));
                    }
                    if let Some(value) = &field.default {
                        let function = format!("default_{}", Case::Snake.apply(unraw(name)));
                        attrs.push(format!("default = \"{type_name}::{function}\""));
                        if !defaults.is_empty() {
                            writeln!(defaults)?;
                        }
                        writeln!(defaults, "    fn {function}() -> {ty} {{")?;
                        writeln!(defaults, "        {}", default_expr(value, field))?;
                        writeln!(defaults, "    }}")?;
                        default_fns.push((field.name.clone(), function));
                    } else if field.optional {
                        attrs.push(
                            "default, skip_serializing_if = \"Option::is_none\"".to_string(),
                        );
                    }
                    if !attrs.is_empty() {
                        writeln!(out, "    #[serde({})]", attrs.join(", "))?;
                    }
                    writeln!(out, "    pub {name}: {ty},")?;
                }
                writeln!(out, "}}")?;

                // Defaults live on the type, so equal field names of two types never clash.
                naming::ensure_distinct(Language::Rust, &decl.id.to_string(), default_fns)?;
                if !defaults.is_empty() {
                    writeln!(out)?;
                    writeln!(out, "impl {type_name} {{")?;
                    out.push_str(&defaults);
                    writeln!(out, "}}")?;
                }
            }

            result.add(format!("{}.rs", unraw(ctx.stem(namespace))), out);
        }

        result.add("mod.rs", module_index(&stems)?);
        Ok(result)
    }
}

fn module_index(stems: &BTreeMap<String, String>) -> Result<String, EmitError> {
    let mut out = String::new();
    writeln!(out, "// {BANNER}")?;
    if !stems.is_empty() {
        writeln!(out)?;
    }
    let sorted: std::collections::BTreeSet<&String> = stems.values().collect();
    for stem in sorted {
        writeln!(out, "pub mod {stem};")?;
    }
    Ok(out)
}

/// Turn a cased name into a usable identifier.
fn ident(name: String) -> String {
    if KEYWORDS.contains(&name.as_str()) {
        format!("r#{name}")
    } else {
        escape_with_suffix(name, RESERVED)
    }
}

fn unraw(name: &str) -> &str {
    name.strip_prefix("r#").unwrap_or(name)
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

    fn field_type(&self, field: &IrField) -> String {
        let mut ty = self.type_ref(&field.ty);
        if field.recursive && matches!(field.ty, IrType::Named(_)) {
            ty = format!("Box<{ty}>");
        }
        if field.optional {
            ty = format!("Option<{ty}>");
        }
        ty
    }

    fn type_ref(&self, ty: &IrType) -> String {
        match ty {
            IrType::Primitive(p) => match p {
                Primitive::Int => "i64",
                Primitive::Float => "f64",
                Primitive::Bool => "bool",
                Primitive::String => "String",
                Primitive::Any => "serde_json::Value",
            }
            .to_string(),
            IrType::Named(id) if id.namespace == self.namespace => self.names.ty(id).to_string(),
            IrType::Named(id) => {
                format!("super::{}::{}", self.stem(&id.namespace), self.names.ty(id))
            }
            IrType::List(inner) => format!("Vec<{}>", self.type_ref(inner)),
        }
    }
}

/// Body of a `#[serde(default = ...)]` function.
fn default_expr(value: &Literal, field: &IrField) -> String {
    let expr = match (value, &field.ty) {
        (_, IrType::Primitive(Primitive::Any)) => {
            format!("serde_json::Value::from({})", plain(value))
        }
        (Literal::Int(v), IrType::Primitive(Primitive::Float)) => format!("{:?}", *v as f64),
        (Literal::Str(s), _) => format!("{s:?}.to_string()"),
        _ => plain(value),
    };
    if field.optional {
        format!("Some({expr})")
    } else {
        expr
    }
}

fn plain(value: &Literal) -> String {
    match value {
        Literal::Int(v) => format!("{v}_i64"),
        Literal::Float(v) => format!("{v:?}_f64"),
        Literal::Str(s) => format!("{s:?}"),
        Literal::Bool(b) => b.to_string(),
    }
}

fn write_doc(out: &mut String, indent: &str, lines: &[String]) -> std::fmt::Result {
    for line in lines {
        if line.is_empty() {
            writeln!(out, "{indent}///")?;
        } else {
            writeln!(out, "{indent}/// {line}")?;
        }
    }
    Ok(())
}
