//! Target emitters. Every emitter is a pure function from the IR to a set of
//! files; writing them out is [`output`]'s job.
pub mod c;
pub mod naming;
pub mod output;
pub mod python;
pub mod rust;
pub mod typescript;

use std::collections::BTreeMap;
use std::fmt::{self, Write};
use std::path::PathBuf;

use crate::error::EmitError;
use crate::model::{Language, TargetConfig};
use crate::processor::ast::Literal;
use crate::processor::ir::{IrField, IrModule};

/// First line of every generated file, wrapped in the target's comment syntax.
pub const BANNER: &str = "Auto-generated by athalar - DO NOT EDIT";

/// Stem used for the root namespace's module.
pub const ROOT_STEM: &str = "types";

/// Generated files keyed by path relative to the output directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmitResult {
    pub files: BTreeMap<PathBuf, String>,
}

impl EmitResult {
    pub fn add(&mut self, path: impl Into<PathBuf>, content: String) {
        self.files.insert(path.into(), content);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

pub trait Emitter: Sync {
    fn language(&self) -> Language;

    fn emit(&self, ir: &IrModule, config: &TargetConfig) -> Result<EmitResult, EmitError>;
}

/// The emitter responsible for `language`.
pub fn emitter_for(language: Language) -> &'static dyn Emitter {
    match language {
        Language::C => &c::CEmitter,
        Language::Python => &python::PythonEmitter,
        Language::Rust => &rust::RustEmitter,
        Language::TypeScript => &typescript::TypeScriptEmitter,
    }
}

/// Module stem of a namespace: dotted path joined by `_`.
pub fn module_stem(namespace: &str) -> String {
    if namespace.is_empty() {
        ROOT_STEM.to_string()
    } else {
        namespace.replace('.', "_")
    }
}

/// Stems of every namespace in the IR. Two namespaces flattening onto one stem
/// (`a.b` and `a_b`) cannot both get a module.
pub fn module_stems(
    ir: &IrModule,
    language: Language,
) -> Result<BTreeMap<String, String>, EmitError> {
    let stems: BTreeMap<String, String> = ir
        .namespaces()
        .into_keys()
        .map(|ns| (ns.to_string(), module_stem(ns)))
        .collect();

    naming::ensure_distinct(
        language,
        "<modules>",
        stems.iter().map(|(ns, stem)| {
            let source = if ns.is_empty() { "<root>".to_string() } else { ns.clone() };
            (source, stem.clone())
        }),
    )?;
    Ok(stems)
}

/// Doc comment lines of a declaration, with its default value appended.
pub fn doc_lines(doc: Option<&str>, default: Option<&Literal>) -> Vec<String> {
    let mut lines: Vec<String> = doc
        .map(|d| d.lines().map(|l| l.trim_end().to_string()).collect())
        .unwrap_or_default();
    if let Some(value) = default {
        lines.push(format!("Default: {value}"));
    }
    lines
}

/// Doc comment lines of a field. Targets that cannot enforce validators list
/// them here instead.
pub fn field_doc(field: &IrField, with_default: bool) -> Vec<String> {
    let default = field.default.as_ref().filter(|_| with_default);
    let mut lines = doc_lines(field.doc.as_deref(), default);
    if !field.validators.is_empty() {
        let names: Vec<_> = field.validators.iter().map(ToString::to_string).collect();
        lines.push(format!("Validated: {}", names.join(", ")));
    }
    lines
}

/// Append `_` to `name` when it is in `reserved`.
pub fn escape_with_suffix(name: String, reserved: &[&str]) -> String {
    if reserved.contains(&name.as_str()) {
        format!("{name}_")
    } else {
        name
    }
}

/// Write `lines` as a `/** */` block, collapsed to one line when short.
pub fn write_block_doc(out: &mut String, indent: &str, lines: &[String]) -> fmt::Result {
    match lines {
        [] => Ok(()),
        [line] => writeln!(out, "{indent}/** {} */", line.replace("*/", "* /")),
        _ => {
            writeln!(out, "{indent}/**")?;
            for line in lines {
                let line = line.replace("*/", "* /");
                if line.is_empty() {
                    writeln!(out, "{indent} *")?;
                } else {
                    writeln!(out, "{indent} * {line}")?;
                }
            }
            writeln!(out, "{indent} */")
        }
    }
}
