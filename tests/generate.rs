use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use athalar::error::TargetError;
use athalar::model::{Language, MANIFEST_FILE};
use athalar::{Error, GenerateOptions, generate};
use tempfile::TempDir;

fn project(manifest: &str, schemas: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(MANIFEST_FILE), manifest).unwrap();
    for (path, src) in schemas {
        let path = dir.path().join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, src).unwrap();
    }
    dir
}

/// Copy the read-only fixture into a scratch directory.
fn fixture_copy() -> TempDir {
    let fixture = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/shapes");
    let dir = TempDir::new().unwrap();
    copy_tree(&fixture, dir.path());
    dir
}

fn copy_tree(from: &Path, to: &Path) {
    fs::create_dir_all(to).unwrap();
    for entry in fs::read_dir(from).unwrap() {
        let entry = entry.unwrap();
        let target = to.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_tree(&entry.path(), &target);
        } else {
            fs::copy(entry.path(), target).unwrap();
        }
    }
}

/// Every file below `dir`, keyed by relative path.
fn snapshot(dir: &Path) -> BTreeMap<PathBuf, String> {
    fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<PathBuf, String>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                let content = fs::read_to_string(&path).unwrap();
                out.insert(path.strip_prefix(root).unwrap().to_path_buf(), content);
            }
        }
    }
    let mut out = BTreeMap::new();
    walk(dir, dir, &mut out);
    out
}

const POINT_TS: &str = r#"
name = "points"
schemas = ["*.ath"]

[[targets]]
language = "typescript"
output = "gen"
"#;

#[test]
fn point_to_typescript_is_idempotent() {
    let dir = project(POINT_TS, &[("point.ath", "type Point { x: int, y: int }")]);

    let report = generate(&GenerateOptions::new(dir.path())).unwrap();
    assert!(report.is_success());

    let first = fs::read_to_string(dir.path().join("gen/types.ts")).unwrap();
    assert!(first.contains("  x: number;\n  y: number;\n"));

    generate(&GenerateOptions::new(dir.path())).unwrap();
    let second = fs::read_to_string(dir.path().join("gen/types.ts")).unwrap();
    assert_eq!(first, second);
}

#[test]
fn fixture_generates_every_target() {
    let dir = fixture_copy();
    let report = generate(&GenerateOptions::new(dir.path())).unwrap();

    assert!(report.is_success(), "{:?}", report.targets);
    let files = snapshot(&dir.path().join("gen"));
    let names: Vec<_> = files.keys().map(|p| p.to_string_lossy().replace('\\', "/")).collect();
    assert_eq!(
        names,
        [
            "c/types.h",
            "py/__init__.py",
            "py/geo.py",
            "py/shapes.py",
            "rs/geo.rs",
            "rs/mod.rs",
            "rs/shapes.rs",
            "ts/geo.ts",
            "ts/shapes.ts",
        ]
    );

    let ts = &files[Path::new("ts/shapes.ts")];
    assert!(ts.starts_with("// Auto-generated by athalar - DO NOT EDIT\n"));
    assert!(ts.contains("import type * as geo from \"./geo\";"));
    assert!(ts.contains("  parent?: Group;"));

    let rs = &files[Path::new("rs/shapes.rs")];
    assert!(rs.contains("    pub parent: Option<Box<Group>>,"));
    assert!(rs.contains("    pub centre: super::geo::Point,"));

    let h = &files[Path::new("c/types.h")];
    let pos = |needle: &str| h.find(needle).unwrap();
    assert!(pos("struct geo_Point {") < pos("struct shapes_Circle {"));
    assert!(h.contains("    shapes_Group *parent;"));
}

#[test]
fn output_does_not_depend_on_file_or_field_order() {
    let a = project(
        POINT_TS,
        &[
            ("a.ath", "type Line { from: Point, to: Point }"),
            ("b.ath", "type Point { x: int, y: int }"),
        ],
    );
    let b = project(
        POINT_TS,
        &[
            ("a.ath", "type Point { y: int, x: int }"),
            ("b.ath", "type Line { to: Point, from: Point }"),
        ],
    );

    generate(&GenerateOptions::new(a.path())).unwrap();
    generate(&GenerateOptions::new(b.path())).unwrap();
    assert_eq!(snapshot(&a.path().join("gen")), snapshot(&b.path().join("gen")));
}

#[test]
fn one_failing_target_does_not_stop_the_others() {
    let manifest = r#"
name = "mixed"
schemas = ["*.ath"]

[[targets]]
language = "c"
output = "gen/c"

[[targets]]
language = "typescript"
output = "gen/ts"
"#;
    let dir = project(manifest, &[("bag.ath", "type Bag { item: any }")]);
    let report = generate(&GenerateOptions::new(dir.path())).unwrap();

    assert!(!report.is_success());
    let failures: Vec<_> = report.failures().map(|t| t.language).collect();
    assert_eq!(failures, [Language::C]);
    assert!(matches!(report.targets[0].outcome, Err(TargetError::Unsupported(_))));
    assert!(matches!(report.targets[1].outcome, Ok(1)));

    assert!(!dir.path().join("gen/c").exists());
    assert!(dir.path().join("gen/ts/types.ts").is_file());
}

#[test]
fn cancelled_run_writes_nothing() {
    let dir = fixture_copy();
    let flag = Arc::new(AtomicBool::new(true));

    let report = generate(&GenerateOptions::new(dir.path()).with_cancel(flag)).unwrap();

    assert_eq!(report.targets.len(), 4);
    assert!(report
        .targets
        .iter()
        .all(|t| matches!(t.outcome, Err(TargetError::Cancelled))));
    assert!(!dir.path().join("gen").exists());
}

#[test]
fn syntax_errors_abort_before_any_output() {
    let dir = project(
        POINT_TS,
        &[
            ("a.ath", "type A { x int }"),
            ("b.ath", "type B { y: }"),
        ],
    );
    let err = generate(&GenerateOptions::new(dir.path())).unwrap_err();

    match &err {
        Error::Syntax(errors) => assert_eq!(errors.len(), 2),
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(err.diagnostics().len(), 2);
    assert!(!dir.path().join("gen").exists());
}

#[test]
fn missing_schemas_are_reported_together() {
    let manifest = r#"
name = "empty"
schemas = ["schema/*.ath", "more/*.ath"]
"#;
    let dir = project(manifest, &[]);
    let err = generate(&GenerateOptions::new(dir.path())).unwrap_err();

    assert!(matches!(
        err,
        Error::SchemaNotFound { ref patterns } if patterns == &["schema/*.ath", "more/*.ath"]
    ));
}

#[test]
fn invalid_recursion_is_a_validation_error() {
    let dir = project(POINT_TS, &[("a.ath", "type A { a: A }")]);
    let err = generate(&GenerateOptions::new(dir.path())).unwrap_err();

    assert_eq!(
        err.diagnostics(),
        ["a.ath:1:10: type `A` contains itself through non-optional fields (A -> A)"]
    );
}
