use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// File name of the manifest every project root must contain.
pub const MANIFEST_FILE: &str = "athalar.toml";

/// A position inside a project file. Lines and columns are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(file: impl Into<PathBuf>, line: usize, column: usize) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}

/// Entire project as it comes out of the loader.
///
/// Schema patterns are kept as written; expanding them is the job of
/// [`crate::processor::discover`].
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub manifest_path: PathBuf,
    pub manifest: Manifest,
}

impl Project {
    /// Absolute (root-joined) output directory of a target.
    pub fn output_dir(&self, target: &TargetConfig) -> PathBuf {
        self.root.join(&target.output)
    }
}

/// Contents of `athalar.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub name: String,

    /// Glob patterns, relative to the project root.
    pub schemas: Vec<String>,

    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

/// One `[[targets]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    pub language: Language,

    /// Output directory, relative to the project root.
    pub output: PathBuf,

    #[serde(default)]
    pub naming: NamingOptions,
}

impl TargetConfig {
    pub fn new(language: Language, output: impl Into<PathBuf>) -> Self {
        Self {
            language,
            output: output.into(),
            naming: NamingOptions::default(),
        }
    }
}

/// Languages a binding can be generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    C,
    Python,
    Rust,
    TypeScript,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Language::C => "c",
            Language::Python => "python",
            Language::Rust => "rust",
            Language::TypeScript => "typescript",
        };
        f.write_str(name)
    }
}

/// Case overrides for a target. `None` means "use the emitter's default".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NamingOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<Case>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Case>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Case {
    Pascal,
    Camel,
    Snake,
    ScreamingSnake,
    Preserve,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_from_toml() {
        let src = r#"
            name = "shapes"
            schemas = ["schema/*.ath"]

            [[targets]]
            language = "typescript"
            output = "gen/ts"

            [targets.naming]
            fields = "screaming-snake"

            [[targets]]
            language = "c"
            output = "gen/c"
        "#;
        let manifest: Manifest = toml::from_str(src).unwrap();

        assert_eq!(manifest.name, "shapes");
        assert_eq!(manifest.schemas, vec!["schema/*.ath".to_string()]);
        assert_eq!(manifest.targets.len(), 2);
        assert_eq!(manifest.targets[0].language, Language::TypeScript);
        assert_eq!(manifest.targets[0].naming.fields, Some(Case::ScreamingSnake));
        assert_eq!(manifest.targets[0].naming.types, None);
        assert_eq!(manifest.targets[1].naming, NamingOptions::default());
    }

    #[test]
    fn unknown_language_is_rejected() {
        let src = r#"
            name = "x"
            schemas = []
            [[targets]]
            language = "cobol"
            output = "out"
        "#;
        assert!(toml::from_str::<Manifest>(src).is_err());
    }

    #[test]
    fn span_display() {
        let span = Span::new("schema/geo.ath", 3, 14);
        assert_eq!(span.to_string(), "schema/geo.ath:3:14");
    }
}
