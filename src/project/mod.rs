use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};
use crate::model::{MANIFEST_FILE, Manifest, Project};

/// Locate and parse the manifest of the project rooted at `root`.
///
/// Schema patterns are not expanded here, so a missing manifest and a pattern
/// without matches stay distinguishable.
pub fn load(root: &Path) -> Result<Project> {
    if !root.exists() {
        return Err(Error::ProjectNotFound {
            path: root.to_path_buf(),
            reason: "path does not exist".into(),
        });
    }

    let manifest_path = root.join(MANIFEST_FILE);
    if !manifest_path.is_file() {
        return Err(Error::ProjectNotFound {
            path: root.to_path_buf(),
            reason: format!("no {MANIFEST_FILE} found"),
        });
    }

    let text = fs::read_to_string(&manifest_path).map_err(|source| Error::Read {
        path: manifest_path.clone(),
        source,
    })?;
    let manifest = load_from_toml(&manifest_path, &text)?;

    let project = Project {
        root: root.to_path_buf(),
        manifest_path,
        manifest,
    };
    check_output_conflicts(&project)?;

    info!(
        project = %project.manifest.name,
        targets = project.manifest.targets.len(),
        "manifest loaded"
    );
    Ok(project)
}

/// Parse manifest text. `path` is only used in error messages.
pub fn load_from_toml(path: &Path, text: &str) -> Result<Manifest> {
    toml::from_str::<Manifest>(text).map_err(|e| {
        let (line, column) = e
            .span()
            .map_or((1, 1), |span| line_column(text, span.start));
        Error::ManifestParse {
            file: path.to_path_buf(),
            line,
            column,
            message: e.message().trim().to_string(),
        }
    })
}

/// 1-based line and column of a byte offset.
fn line_column(text: &str, offset: usize) -> (usize, usize) {
    let before = text.get(..offset).unwrap_or(text);
    let line = before.matches('\n').count() + 1;
    let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
    (line, column)
}

fn check_output_conflicts(project: &Project) -> Result<()> {
    let mut claimed: HashMap<PathBuf, &crate::model::TargetConfig> = HashMap::new();
    for target in &project.manifest.targets {
        let output = normalize(&project.output_dir(target));
        if let Some(first) = claimed.get(&output) {
            return Err(Error::OutputConflict {
                output: target.output.clone(),
                first: first.language,
                second: target.language,
            });
        }
        claimed.insert(output, target);
    }
    Ok(())
}

/// Lexical normalisation so `gen/./ts` and `gen/ts/` compare equal.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Language;
    use tempfile::TempDir;

    fn project_with(manifest: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), manifest).unwrap();
        dir
    }

    #[test]
    fn loads_valid_manifest() {
        let dir = project_with(
            r#"
name = "shapes"
schemas = ["schema/*.ath"]

[[targets]]
language = "rust"
output = "gen/rs"
"#,
        );
        let project = load(dir.path()).unwrap();

        assert_eq!(project.manifest.name, "shapes");
        assert_eq!(project.manifest.targets[0].language, Language::Rust);
        assert_eq!(project.output_dir(&project.manifest.targets[0]), dir.path().join("gen/rs"));
    }

    #[test]
    fn missing_path_and_missing_manifest() {
        let dir = TempDir::new().unwrap();

        let err = load(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(
            err,
            Error::ProjectNotFound { ref reason, .. } if reason == "path does not exist"
        ));

        let err = load(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            Error::ProjectNotFound { ref reason, .. } if reason.contains(MANIFEST_FILE)
        ));
    }

    #[test]
    fn malformed_manifest_reports_position() {
        let dir = project_with("name = \"x\"\nschemas = [\"a\"]\ntargets = 3 3\n");
        let err = load(dir.path()).unwrap_err();

        match err {
            Error::ManifestParse { file, line, .. } => {
                assert_eq!(file, dir.path().join(MANIFEST_FILE));
                assert_eq!(line, 3);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn unknown_key_is_a_manifest_error() {
        let dir = project_with("name = \"x\"\nschemas = []\ncolour = \"red\"\n");
        assert!(matches!(load(dir.path()), Err(Error::ManifestParse { .. })));
    }

    #[test]
    fn two_targets_sharing_an_output_conflict() {
        let dir = project_with(
            r#"
name = "x"
schemas = []

[[targets]]
language = "rust"
output = "gen"

[[targets]]
language = "c"
output = "./gen/"
"#,
        );
        let err = load(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            Error::OutputConflict { first: Language::Rust, second: Language::C, .. }
        ));
    }

    #[test]
    fn line_column_counts_from_one() {
        assert_eq!(line_column("ab\ncd", 0), (1, 1));
        assert_eq!(line_column("ab\ncd", 4), (2, 2));
    }
}
