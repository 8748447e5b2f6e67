use super::load_context;
use anyhow::Context;
use std::path::Path;
use tmpl_core::helpers::HelperRenderer;

pub fn run(file: &Path, context: &Path) -> anyhow::Result<()> {
    let template = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let ctx = load_context(context)?;
    let rendered = HelperRenderer::new()
        .render_str(&template, &ctx)
        .with_context(|| format!("failed to expand {}", file.display()))?;
    print!("{rendered}");
    Ok(())
}
