//! Emit one C header holding every type as a plain struct.
//!
//! C has no optionals or dynamic arrays, so the layout falls back to:
//! optional fields get a `bool has_<f>` flag next to the value, lists become a
//! pointer plus a `size_t <f>_len`, and fields on a cycle are pointers (NULL
//! meaning absent when optional).

use std::collections::HashSet;
use std::fmt::Write;

use super::naming::{self, NameTable, TypeScope, ensure_distinct};
use super::{
    BANNER, EmitResult, Emitter, doc_lines, escape_with_suffix, field_doc, module_stems,
    write_block_doc,
};
use crate::error::EmitError;
use crate::model::{Case, Language, TargetConfig};
use crate::processor::ir::{IrField, IrModule, IrType, IrTypeDecl, Primitive, TypeId};

pub const HEADER_FILE: &str = "types.h";

const RESERVED: &[&str] = &[
    "auto", "break", "case", "char", "const", "continue", "default", "do", "double", "else",
    "enum", "extern", "float", "for", "goto", "if", "inline", "int", "long", "register",
    "restrict", "return", "short", "signed", "sizeof", "static", "struct", "switch",
    "typedef", "union", "unsigned", "void", "volatile", "while", "bool", "true", "false",
    "NULL", "size_t", "int64_t",
];

pub struct CEmitter;

impl Emitter for CEmitter {
    fn language(&self) -> Language {
        Language::C
    }

    fn emit(&self, ir: &IrModule, config: &TargetConfig) -> Result<EmitResult, EmitError> {
        let (type_case, field_case) = naming::cases(&config.naming, Case::Preserve, Case::Snake);
        let stems = module_stems(ir, Language::C)?;
        let names = NameTable::build(
            ir,
            Language::C,
            TypeScope::Global,
            |decl| {
                let base = type_case.apply(decl.name());
                match stems.get(decl.namespace()) {
                    Some(stem) if !decl.namespace().is_empty() => format!("{stem}_{base}"),
                    _ => escape_with_suffix(base, RESERVED),
                }
            },
            |field| escape_with_suffix(field_case.apply(&field.name), RESERVED),
        )?;

        // Lay out every struct first so unsupported shapes fail before writing.
        let mut layouts = Vec::with_capacity(ir.len());
        for decl in dependency_order(ir) {
            let mut members = Vec::new();
            for field in &decl.fields {
                members.extend(field_members(field, names.field(&field.id), &names)?);
            }
            ensure_distinct(
                Language::C,
                &decl.id.to_string(),
                members.iter().map(|m| (m.source.clone(), m.name.clone())),
            )?;
            layouts.push((decl, members));
        }

        let mut h = String::new();
        writeln!(h, "/* {BANNER} */")?;
        writeln!(h)?;
        writeln!(h, "#pragma once")?;
        writeln!(h)?;
        writeln!(h, "#include <stdbool.h>")?;
        writeln!(h, "#include <stddef.h>")?;
        writeln!(h, "#include <stdint.h>")?;

        // ── forward declarations, so pointers may refer to any type ──
        if !layouts.is_empty() {
            writeln!(h)?;
        }
        for decl in ir.types() {
            let name = names.ty(&decl.id);
            writeln!(h, "typedef struct {name} {name};")?;
        }

        // ── structs, dependencies first ──
        for (decl, members) in &layouts {
            writeln!(h)?;
            write_block_doc(&mut h, "", &doc_lines(decl.doc.as_deref(), None))?;
            writeln!(h, "struct {} {{", names.ty(&decl.id))?;
            if members.is_empty() {
                writeln!(h, "    uint8_t unused_;")?;
            }
            for member in members {
                write_block_doc(&mut h, "    ", &member.doc)?;
                writeln!(h, "    {};", member.declaration)?;
            }
            writeln!(h, "}};")?;
        }

        let mut result = EmitResult::default();
        result.add(HEADER_FILE, h);
        Ok(result)
    }
}

/// One struct member, possibly synthesised from a field.
struct Member {
    source: String,
    name: String,
    declaration: String,
    doc: Vec<String>,
}

fn field_members(
    field: &IrField,
    name: &str,
    names: &NameTable,
) -> Result<Vec<Member>, EmitError> {
    let unsupported = |reason: &str| EmitError::UnsupportedConstruct {
        language: Language::C,
        location: field.id.to_string(),
        reason: reason.to_string(),
    };
    let mut members = Vec::new();
    let doc = field_doc(field, true);

    // Recursive references are pointers and use NULL for "absent".
    let by_pointer = field.recursive && matches!(field.ty, IrType::Named(_));
    if field.optional && !by_pointer {
        let flag = format!("has_{name}");
        members.push(Member {
            source: field.name.clone(),
            declaration: format!("bool {flag}"),
            name: flag,
            doc: Vec::new(),
        });
    }

    match &field.ty {
        IrType::List(inner) => {
            if matches!(**inner, IrType::List(_)) {
                return Err(unsupported("nested lists have no C representation"));
            }
            let element = scalar(inner, names)
                .ok_or_else(|| unsupported("`any` has no C representation"))?;
            members.push(Member {
                source: field.name.clone(),
                declaration: declare(&element, 1, name),
                name: name.to_string(),
                doc,
            });
            let len = format!("{name}_len");
            members.push(Member {
                source: field.name.clone(),
                declaration: format!("size_t {len}"),
                name: len,
                doc: Vec::new(),
            });
        }
        ty => {
            let base =
                scalar(ty, names).ok_or_else(|| unsupported("`any` has no C representation"))?;
            let pointers = usize::from(by_pointer);
            members.push(Member {
                source: field.name.clone(),
                declaration: declare(&base, pointers, name),
                name: name.to_string(),
                doc,
            });
        }
    }
    Ok(members)
}

fn scalar(ty: &IrType, names: &NameTable) -> Option<String> {
    match ty {
        IrType::Primitive(Primitive::Int) => Some("int64_t".into()),
        IrType::Primitive(Primitive::Float) => Some("double".into()),
        IrType::Primitive(Primitive::Bool) => Some("bool".into()),
        IrType::Primitive(Primitive::String) => Some("const char *".into()),
        IrType::Primitive(Primitive::Any) => None,
        IrType::Named(id) => Some(names.ty(id).to_string()),
        IrType::List(_) => None,
    }
}

fn declare(base: &str, pointers: usize, name: &str) -> String {
    let stars = "*".repeat(pointers);
    if base.ends_with('*') {
        format!("{base}{stars}{name}")
    } else {
        format!("{base} {stars}{name}")
    }
}

/// Types ordered so that every struct embedded by value comes before its user.
fn dependency_order(ir: &IrModule) -> Vec<&IrTypeDecl> {
    fn visit<'a>(
        ir: &'a IrModule,
        decl: &'a IrTypeDecl,
        seen: &mut HashSet<&'a TypeId>,
        out: &mut Vec<&'a IrTypeDecl>,
    ) {
        if !seen.insert(&decl.id) {
            return;
        }
        for field in &decl.fields {
            if field.recursive {
                continue;
            }
            if let IrType::Named(id) = &field.ty {
                if let Some(dep) = ir.get(id) {
                    visit(ir, dep, seen, out);
                }
            }
        }
        out.push(decl);
    }

    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(ir.len());
    for decl in ir.types() {
        visit(ir, decl, &mut seen, &mut out);
    }
    out
}
