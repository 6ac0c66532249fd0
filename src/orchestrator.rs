//! Runs the whole pipeline: load, parse, build the IR, then emit and write
//! every target in parallel.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Result, TargetError};
use crate::model::{Language, Project, TargetConfig};
use crate::processor::ir::IrModule;
use crate::writer::{emitter_for, output};
use crate::{processor, project};

/// Ambient inputs of a run. Nothing below the orchestrator reads the working
/// directory or the environment.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub root: PathBuf,
    /// Checked before each target emits and again before it writes.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl GenerateOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

#[derive(Debug)]
pub struct TargetReport {
    pub language: Language,
    pub output: PathBuf,
    /// Number of files written.
    pub outcome: std::result::Result<usize, TargetError>,
}

/// Outcome of every configured target, in manifest order.
#[derive(Debug)]
pub struct GenerateReport {
    pub project: String,
    pub targets: Vec<TargetReport>,
}

impl GenerateReport {
    pub fn is_success(&self) -> bool {
        self.targets.iter().all(|t| t.outcome.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &TargetReport> {
        self.targets.iter().filter(|t| t.outcome.is_err())
    }

    pub fn files_written(&self) -> usize {
        self.targets.iter().filter_map(|t| t.outcome.as_ref().ok()).sum()
    }
}

/// Validate the project, then emit every target. Validation failures abort
/// before any output is touched; target failures end up in the report.
pub fn generate(options: &GenerateOptions) -> Result<GenerateReport> {
    let project = project::load(&options.root)?;
    let ir = processor::run(&project)?;

    let targets = project
        .manifest
        .targets
        .par_iter()
        .map(|target| run_target(&project, &ir, target, options))
        .collect();

    Ok(GenerateReport {
        project: project.manifest.name.clone(),
        targets,
    })
}

fn run_target(
    project: &Project,
    ir: &IrModule,
    target: &TargetConfig,
    options: &GenerateOptions,
) -> TargetReport {
    let out_dir = project.output_dir(target);
    let outcome = emit_and_write(ir, target, &out_dir, options);

    match &outcome {
        Ok(files) => {
            info!(language = %target.language, files, dir = %out_dir.display(), "target written")
        }
        Err(TargetError::Cancelled) => warn!(language = %target.language, "target cancelled"),
        Err(e) => warn!(language = %target.language, error = %e, "target failed"),
    }

    TargetReport {
        language: target.language,
        output: target.output.clone(),
        outcome,
    }
}

fn emit_and_write(
    ir: &IrModule,
    target: &TargetConfig,
    out_dir: &Path,
    options: &GenerateOptions,
) -> std::result::Result<usize, TargetError> {
    if options.cancelled() {
        return Err(TargetError::Cancelled);
    }
    let result = emitter_for(target.language).emit(ir, target)?;
    if options.cancelled() {
        return Err(TargetError::Cancelled);
    }
    output::write_atomic(out_dir, &result)
}

// ── info ─────────────────────────────────────────────────────────────

/// What `athalar info` reports about a project.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectInfo {
    pub name: String,
    pub manifest: PathBuf,
    pub schemas: Vec<PatternInfo>,
    pub targets: Vec<TargetConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatternInfo {
    pub pattern: String,
    pub matches: usize,
}

/// Load the manifest and count the files each schema pattern matches.
/// Schemas are not parsed.
pub fn info(root: &Path) -> Result<ProjectInfo> {
    let project = project::load(root)?;
    let schemas = project
        .manifest
        .schemas
        .iter()
        .map(|pattern| {
            Ok(PatternInfo {
                pattern: pattern.clone(),
                matches: processor::match_pattern(&project.root, pattern)?.len(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ProjectInfo {
        name: project.manifest.name.clone(),
        manifest: project.manifest_path.clone(),
        schemas,
        targets: project.manifest.targets.clone(),
    })
}

impl fmt::Display for ProjectInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "project:  {}", self.name)?;
        writeln!(f, "manifest: {}", self.manifest.display())?;
        writeln!(f, "schemas:")?;
        for schema in &self.schemas {
            writeln!(f, "  {} ({} file(s))", schema.pattern, schema.matches)?;
        }
        write!(f, "targets:")?;
        if self.targets.is_empty() {
            write!(f, " none")?;
        }
        for target in &self.targets {
            write!(f, "\n  {} -> {}", target.language, target.output.display())?;
        }
        Ok(())
    }
}
