pub mod compile;
pub mod config;
pub mod expand;
pub mod render;
pub mod show;
pub mod validate;
pub mod watch;

use anyhow::Context;
use clap::Args;
use std::path::{Path, PathBuf};
use tmpl_core::batch::CompileOptions;
use tmpl_core::config::TemplatesConfig;

/// Directory overrides shared by `compile` and `watch`.
#[derive(Args, Debug, Default)]
pub struct DirArgs {
    /// Template source directory (default: from tmpl.yaml)
    #[arg(long, short = 'i')]
    pub input: Option<PathBuf>,

    /// Artifact output directory (default: from tmpl.yaml)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// File-name glob to skip; repeatable, replaces the configured list
    #[arg(long = "exclude", value_name = "PATTERN")]
    pub exclude: Vec<String>,
}

impl DirArgs {
    /// Merge flags over `tmpl.yaml`. Relative paths resolve against `root`.
    pub fn compile_options(&self, root: &Path, config: &TemplatesConfig) -> CompileOptions {
        let input = match &self.input {
            Some(dir) => tmpl_core::paths::resolve(root, dir),
            None => config.input_dir(root),
        };
        let output = match &self.output {
            Some(dir) => tmpl_core::paths::resolve(root, dir),
            None => config.output_dir(root),
        };
        let exclude = if self.exclude.is_empty() {
            config.exclude.clone()
        } else {
            self.exclude.clone()
        };
        CompileOptions {
            input_dir: input,
            output_dir: output,
            verbose: false,
            exclude,
        }
    }
}

/// Read a render context from a JSON or YAML file.
pub fn load_context(path: &Path) -> anyhow::Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read context file {}", path.display()))?;
    let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
    let value = if is_json {
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid JSON in {}", path.display()))?
    } else {
        serde_yaml::from_str(&raw)
            .with_context(|| format!("invalid YAML in {}", path.display()))?
    };
    Ok(value)
}
