use super::load_context;
use anyhow::Context;
use std::path::Path;
use tmpl_core::compiler::compile_from_file;
use tmpl_core::config::TemplatesConfig;
use tmpl_core::manager::TemplateManager;

pub fn run(
    root: &Path,
    file: Option<&Path>,
    id: Option<&str>,
    context: &Path,
    out: Option<&Path>,
) -> anyhow::Result<()> {
    let config = TemplatesConfig::load(root).context("failed to load tmpl.yaml")?;
    let mut manager = TemplateManager::from_config(&config.cache);
    let ctx = load_context(context)?;

    let template = match (file, id) {
        (Some(file), _) => std::sync::Arc::new(
            compile_from_file(file)
                .with_context(|| format!("failed to compile {}", file.display()))?,
        ),
        (None, Some(id)) => {
            let input = config.input_dir(root);
            manager
                .register_directory(&input, &config.exclude)
                .with_context(|| format!("failed to scan {}", input.display()))?;
            manager.load_template(id)?
        }
        (None, None) => anyhow::bail!("either a template file or --id is required"),
    };

    for issue in template.validate_context(&ctx) {
        tracing::warn!(section = %issue.section, "{}", issue.message);
    }

    let document = manager.render_compiled_template(&template, &ctx);
    match out {
        Some(path) => {
            tmpl_core::io::atomic_write(path, document.as_bytes())
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => print!("{document}"),
    }
    Ok(())
}
