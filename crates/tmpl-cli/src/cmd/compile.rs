use super::DirArgs;
use crate::output::{print_json, print_table};
use anyhow::Context;
use std::path::Path;
use tmpl_core::batch::compile_directory;
use tmpl_core::config::TemplatesConfig;
use tmpl_core::paths::display_relative;

pub fn run(root: &Path, dirs: &DirArgs, verbose: bool, json: bool) -> anyhow::Result<()> {
    let config = TemplatesConfig::load(root).context("failed to load tmpl.yaml")?;
    let mut options = dirs.compile_options(root, &config);
    options.verbose = verbose;

    let result = compile_directory(&options).with_context(|| {
        format!(
            "failed to compile templates in {}",
            options.input_dir.display()
        )
    })?;

    if json {
        print_json(&result)?;
    } else {
        if verbose {
            let rows: Vec<Vec<String>> = result
                .output
                .iter()
                .map(|p| vec![display_relative(&options.output_dir, p)])
                .collect();
            print_table(&["ARTIFACT"], &rows);
        }
        for err in &result.errors {
            eprintln!(
                "failed: {}: {}",
                display_relative(&options.input_dir, &err.file),
                err.message
            );
        }
        println!(
            "Compiled {} template(s), {} failed. Output: {}",
            result.compiled,
            result.failed,
            options.output_dir.display()
        );
    }

    if !result.success {
        anyhow::bail!("{} template(s) failed to compile", result.failed);
    }
    Ok(())
}
