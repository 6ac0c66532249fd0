//! Identifier casing and per-target name tables.

use std::collections::BTreeMap;

use crate::error::EmitError;
use crate::model::{Case, Language, NamingOptions};
use crate::processor::ir::{FieldId, IrField, IrModule, IrTypeDecl, TypeId};

impl Case {
    /// Re-case `name`. Names without any alphanumeric word come back unchanged.
    pub fn apply(self, name: &str) -> String {
        if self == Case::Preserve {
            return name.to_string();
        }
        let words = split_words(name);
        if words.is_empty() {
            return name.to_string();
        }

        match self {
            Case::Pascal => words.iter().map(|w| capitalize(w)).collect(),
            Case::Camel => words
                .iter()
                .enumerate()
                .map(|(i, w)| if i == 0 { w.to_lowercase() } else { capitalize(w) })
                .collect(),
            Case::Snake => join_mapped(&words, str::to_lowercase),
            Case::ScreamingSnake => join_mapped(&words, str::to_uppercase),
            Case::Preserve => name.to_string(),
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn join_mapped(words: &[String], f: fn(&str) -> String) -> String {
    words.iter().map(|w| f(w)).collect::<Vec<_>>().join("_")
}

/// Split an identifier into words at separators and case changes.
///
/// `HTTPServer` gives `HTTP`, `Server`; `vec2d` stays one word.
pub fn split_words(name: &str) -> Vec<String> {
    let chars: Vec<char> = name.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let boundary = prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_is_lower);
            if boundary {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Resolve a target's naming options against the emitter's defaults.
pub fn cases(options: &NamingOptions, types: Case, fields: Case) -> (Case, Case) {
    (options.types.unwrap_or(types), options.fields.unwrap_or(fields))
}

/// Which types must have distinct emitted names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeScope {
    /// Every namespace is its own module.
    PerNamespace,
    /// All types share one global scope.
    Global,
}

/// Final identifiers of every type and field for one target.
#[derive(Debug, Default)]
pub struct NameTable {
    types: BTreeMap<TypeId, String>,
    fields: BTreeMap<FieldId, String>,
}

impl NameTable {
    /// Name every type and field with the given functions, failing when two
    /// source names end up as the same identifier.
    pub fn build(
        ir: &IrModule,
        language: Language,
        scope: TypeScope,
        type_name: impl Fn(&IrTypeDecl) -> String,
        field_name: impl Fn(&IrField) -> String,
    ) -> Result<Self, EmitError> {
        let mut table = NameTable::default();
        let mut type_scopes: BTreeMap<&str, Vec<(String, String)>> = BTreeMap::new();

        for decl in ir.types() {
            let name = type_name(decl);
            let key = match scope {
                TypeScope::PerNamespace => decl.namespace(),
                TypeScope::Global => "",
            };
            type_scopes
                .entry(key)
                .or_default()
                .push((decl.id.to_string(), name.clone()));
            table.types.insert(decl.id.clone(), name);

            let mut members = Vec::with_capacity(decl.fields.len());
            for field in &decl.fields {
                let name = field_name(field);
                members.push((field.name.clone(), name.clone()));
                table.fields.insert(field.id.clone(), name);
            }
            ensure_distinct(language, &decl.id.to_string(), members)?;
        }

        for (namespace, names) in type_scopes {
            let scope = if namespace.is_empty() { "<root>" } else { namespace };
            ensure_distinct(language, scope, names)?;
        }
        Ok(table)
    }

    pub fn ty<'a>(&'a self, id: &'a TypeId) -> &'a str {
        self.types.get(id).map_or(id.name.as_str(), String::as_str)
    }

    pub fn field<'a>(&'a self, id: &'a FieldId) -> &'a str {
        self.fields.get(id).map_or(id.name.as_str(), String::as_str)
    }
}

/// Fail if two `(source, emitted)` pairs share an emitted name.
pub fn ensure_distinct(
    language: Language,
    scope: &str,
    names: impl IntoIterator<Item = (String, String)>,
) -> Result<(), EmitError> {
    let mut seen: BTreeMap<String, String> = BTreeMap::new();
    for (source, emitted) in names {
        if let Some(first) = seen.get(&emitted) {
            return Err(EmitError::UnsupportedConstruct {
                language,
                location: format!("{scope}.{emitted}"),
                reason: format!("`{first}` and `{source}` both become `{emitted}`"),
            });
        }
        seen.insert(emitted, source);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_case_and_separators() {
        assert_eq!(split_words("first_name"), ["first", "name"]);
        assert_eq!(split_words("firstName"), ["first", "Name"]);
        assert_eq!(split_words("HTTPServer"), ["HTTP", "Server"]);
        assert_eq!(split_words("vec2d"), ["vec2d"]);
        assert_eq!(split_words("point2D"), ["point2", "D"]);
        assert_eq!(split_words("__"), Vec::<String>::new());
    }

    #[test]
    fn applies_each_case() {
        let cases = [
            (Case::Pascal, "user_id", "UserId"),
            (Case::Pascal, "HTTPServer", "HttpServer"),
            (Case::Camel, "user_id", "userId"),
            (Case::Camel, "UserID", "userId"),
            (Case::Snake, "HTTPServer", "http_server"),
            (Case::Snake, "userId", "user_id"),
            (Case::ScreamingSnake, "maxValue", "MAX_VALUE"),
            (Case::Preserve, "weird_Name", "weird_Name"),
        ];
        for (case, input, expected) in cases {
            assert_eq!(case.apply(input), expected, "{case:?} of {input}");
        }
    }

    #[test]
    fn wordless_names_are_kept() {
        assert_eq!(Case::Snake.apply("_"), "_");
    }

    #[test]
    fn overrides_win_over_defaults() {
        let options = NamingOptions {
            types: None,
            fields: Some(Case::ScreamingSnake),
        };
        assert_eq!(
            cases(&options, Case::Pascal, Case::Camel),
            (Case::Pascal, Case::ScreamingSnake)
        );
    }

    #[test]
    fn collision_is_unsupported() {
        let err = ensure_distinct(
            Language::Rust,
            "Point",
            [
                ("userId".to_string(), "user_id".to_string()),
                ("user_id".to_string(), "user_id".to_string()),
            ],
        )
        .unwrap_err();

        assert_eq!(
            err.to_string(),
            "rust cannot represent `Point.user_id`: `userId` and `user_id` both become `user_id`"
        );
    }
}
