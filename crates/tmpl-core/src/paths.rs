use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const CONFIG_FILE: &str = "tmpl.yaml";
pub const DEFAULT_INPUT_DIR: &str = "templates";
pub const DEFAULT_OUTPUT_DIR: &str = "generated/templates";
pub const DEFAULT_EXCLUDE: &str = "qa-gate-tmpl.yaml";

pub const SOURCE_EXTENSION: &str = "yaml";
pub const ARTIFACT_EXTENSION: &str = "json";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Resolve `dir` against `root` unless it is already absolute.
pub fn resolve(root: &Path, dir: &Path) -> PathBuf {
    if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        root.join(dir)
    }
}

pub fn is_template_source(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(SOURCE_EXTENSION)
}

/// Where the generated artifact for `source` lands: the same relative path
/// under `output_dir`, with `.yaml` swapped for `.json`.
pub fn artifact_path(input_dir: &Path, output_dir: &Path, source: &Path) -> PathBuf {
    let relative = source.strip_prefix(input_dir).unwrap_or(source);
    let relative = if relative.is_absolute() {
        relative.file_name().map(PathBuf::from).unwrap_or_default()
    } else {
        relative.to_path_buf()
    };
    output_dir.join(relative).with_extension(ARTIFACT_EXTENSION)
}

/// Source path relative to the input directory, with forward slashes.
pub fn display_relative(input_dir: &Path, source: &Path) -> String {
    source
        .strip_prefix(input_dir)
        .unwrap_or(source)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
