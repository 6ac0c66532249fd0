//! TypeScript interfaces, one `.ts` module per namespace.

use std::fmt::Write;

use super::naming::{self, NameTable, TypeScope};
use super::{
    BANNER, EmitResult, Emitter, doc_lines, escape_with_suffix, field_doc, module_stems,
    write_block_doc,
};
use crate::error::EmitError;
use crate::model::{Case, Language, TargetConfig};
use crate::processor::ir::{IrModule, IrType, Primitive};

/// Words that cannot be used as an import alias.
const RESERVED: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete",
    "do", "else", "enum", "export", "extends", "false", "finally", "for", "function", "if",
    "import", "in", "instanceof", "new", "null", "return", "super", "switch", "this", "throw",
    "true", "try", "typeof", "var", "void", "while", "with", "let", "static", "yield", "await",
    "implements", "interface", "package", "private", "protected", "public",
];

/// Built-in type names a user interface must not shadow.
const BUILTIN_TYPES: &[&str] = &[
    "number", "string", "boolean", "unknown", "any", "never", "object", "symbol", "bigint",
    "undefined", "Array",
];

pub struct TypeScriptEmitter;

impl Emitter for TypeScriptEmitter {
    fn language(&self) -> Language {
        Language::TypeScript
    }

    fn emit(&self, ir: &IrModule, config: &TargetConfig) -> Result<EmitResult, EmitError> {
        let (type_case, field_case) = naming::cases(&config.naming, Case::Pascal, Case::Camel);
        let stems = module_stems(ir, Language::TypeScript)?;
        let names = NameTable::build(
            ir,
            Language::TypeScript,
            TypeScope::PerNamespace,
            |decl| escape_with_suffix(type_case.apply(decl.name()), BUILTIN_TYPES),
            |field| field_case.apply(&field.name),
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

            let imports = ir.foreign_namespaces(namespace);
            for foreign in &imports {
                let stem = ctx.stem(foreign);
                writeln!(out, "import type * as {} from \"./{stem}\";", alias(stem))?;
            }
            if !imports.is_empty() {
                writeln!(out)?;
            }

            for (i, decl) in decls.iter().enumerate() {
                if i > 0 {
                    writeln!(out)?;
                }
                write_block_doc(&mut out, "", &doc_lines(decl.doc.as_deref(), None))?;
                writeln!(out, "export interface {} {{", names.ty(&decl.id))?;
                for field in &decl.fields {
                    write_block_doc(&mut out, "  ", &field_doc(field, true))?;
                    let marker = if field.optional { "?" } else { "" };
                    writeln!(
                        out,
                        "  {}{marker}: {};",
                        names.field(&field.id),
                        ctx.type_ref(&field.ty)
                    )?;
                }
                writeln!(out, "}}")?;
            }

            result.add(format!("{}.ts", ctx.stem(namespace)), out);
        }
        Ok(result)
    }
}

struct Context<'a> {
    namespace: &'a str,
    names: &'a NameTable,
    stems: &'a std::collections::BTreeMap<String, String>,
}

impl Context<'_> {
    fn stem<'s>(&'s self, namespace: &'s str) -> &'s str {
        self.stems.get(namespace).map_or(namespace, String::as_str)
    }

    fn type_ref(&self, ty: &IrType) -> String {
        match ty {
            IrType::Primitive(p) => match p {
                Primitive::Int | Primitive::Float => "number",
                Primitive::Bool => "boolean",
                Primitive::String => "string",
                Primitive::Any => "unknown",
            }
            .to_string(),
            IrType::Named(id) if id.namespace == self.namespace => self.names.ty(id).to_string(),
            IrType::Named(id) => {
                format!("{}.{}", alias(self.stem(&id.namespace)), self.names.ty(id))
            }
            IrType::List(inner) => format!("{}[]", self.type_ref(inner)),
        }
    }
}

fn alias(stem: &str) -> String {
    escape_with_suffix(stem.to_string(), RESERVED)
}
