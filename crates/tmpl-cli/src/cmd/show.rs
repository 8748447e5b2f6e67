use crate::output::print_json;
use anyhow::Context;
use std::path::Path;
use tmpl_core::compiler::compile_from_file;

pub fn run(file: &Path) -> anyhow::Result<()> {
    let compiled = compile_from_file(file)
        .with_context(|| format!("failed to compile {}", file.display()))?;
    print_json(&compiled)
}
