//! Batch compilation of a template tree into JSON artifacts.

use crate::compiler::{compile_from_file, CompiledTemplate};
use crate::error::{Result, TemplateError};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const GENERATOR: &str = concat!("tmpl ", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Options / results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CompileOptions {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub verbose: bool,
    /// File-name glob patterns to skip.
    pub exclude: Vec<String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from(paths::DEFAULT_INPUT_DIR),
            output_dir: PathBuf::from(paths::DEFAULT_OUTPUT_DIR),
            verbose: false,
            exclude: vec![paths::DEFAULT_EXCLUDE.to_string()],
        }
    }
}

impl CompileOptions {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchItemError {
    pub file: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CompilationResult {
    pub success: bool,
    pub compiled: usize,
    pub failed: usize,
    pub errors: Vec<BatchItemError>,
    pub output: Vec<PathBuf>,
}

/// On-disk form of a compiled template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    #[serde(rename = "$notice")]
    pub notice: String,
    pub generator: String,
    pub source: String,
    pub template: CompiledTemplate,
}

impl GeneratedArtifact {
    pub fn new(source: impl Into<String>, template: CompiledTemplate) -> Self {
        let source = source.into();
        Self {
            notice: format!("Generated by tmpl from {source}. DO NOT EDIT."),
            generator: GENERATOR.to_string(),
            source,
            template,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

pub(crate) fn compile_patterns(exclude: &[String]) -> Result<Vec<glob::Pattern>> {
    exclude
        .iter()
        .map(|p| {
            glob::Pattern::new(p).map_err(|e| TemplateError::Pattern {
                pattern: p.clone(),
                message: e.to_string(),
            })
        })
        .collect()
}

fn is_excluded(path: &Path, patterns: &[glob::Pattern]) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    patterns.iter().any(|p| p.matches(name))
}

/// Every `*.yaml` under `dir`, sorted, minus excluded file names.
pub(crate) fn discover(dir: &Path, exclude: &[glob::Pattern]) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| match e.into_io_error() {
            Some(io) => TemplateError::Io(io),
            None => TemplateError::Io(std::io::Error::other("filesystem loop detected")),
        })?;
        let path = entry.path();
        if !entry.file_type().is_file() || !paths::is_template_source(path) {
            continue;
        }
        if is_excluded(path, exclude) {
            tracing::debug!(path = %path.display(), "excluded");
            continue;
        }
        found.push(entry.into_path());
    }
    Ok(found)
}

/// Sources under `input_dir` that `compile_directory` would pick up.
pub fn list_sources(input_dir: &Path, exclude: &[String]) -> Result<Vec<PathBuf>> {
    discover(input_dir, &compile_patterns(exclude)?)
}

// ---------------------------------------------------------------------------
// Compilation
// ---------------------------------------------------------------------------

/// Compile one source and write its artifact. Returns the artifact path.
pub fn compile_file_to(source: &Path, input_dir: &Path, output_dir: &Path) -> Result<PathBuf> {
    let compiled = compile_from_file(source)?;
    let relative = paths::display_relative(input_dir, source);
    let artifact = GeneratedArtifact::new(relative, compiled);
    let target = paths::artifact_path(input_dir, output_dir, source);
    let mut data = serde_json::to_string_pretty(&artifact)?;
    data.push('\n');
    crate::io::atomic_write(&target, data.as_bytes())?;
    Ok(target)
}

/// Compile every template under `input_dir`. Per-file failures are
/// collected; only an unreadable input tree or a bad exclude pattern fails
/// the whole call.
pub fn compile_directory(options: &CompileOptions) -> Result<CompilationResult> {
    let sources = list_sources(&options.input_dir, &options.exclude)?;
    let mut result = CompilationResult::default();

    for source in &sources {
        match compile_file_to(source, &options.input_dir, &options.output_dir) {
            Ok(target) => {
                if options.verbose {
                    tracing::info!(
                        source = %source.display(),
                        output = %target.display(),
                        "compiled"
                    );
                } else {
                    tracing::debug!(source = %source.display(), "compiled");
                }
                result.compiled += 1;
                result.output.push(target);
            }
            Err(e) => {
                tracing::warn!(source = %source.display(), "compile failed: {e}");
                result.failed += 1;
                result.errors.push(BatchItemError {
                    file: source.clone(),
                    message: e.to_string(),
                });
            }
        }
    }

    result.success = result.failed == 0;
    tracing::info!(
        compiled = result.compiled,
        failed = result.failed,
        output = %options.output_dir.display(),
        "batch compile finished"
    );
    Ok(result)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
