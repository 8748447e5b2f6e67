use crate::output::print_json;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tmpl_core::parser::{parse_template_file, validate_template};

#[derive(Serialize)]
struct FileReport {
    file: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    errors: Vec<String>,
}

fn check(path: &Path) -> FileReport {
    match parse_template_file(path) {
        Ok(config) => FileReport {
            file: path.to_path_buf(),
            id: Some(config.template.id.clone()),
            errors: validate_template(&config),
        },
        Err(e) => FileReport {
            file: path.to_path_buf(),
            id: None,
            errors: vec![e.to_string()],
        },
    }
}

pub fn run(files: &[PathBuf], json: bool) -> anyhow::Result<()> {
    let reports: Vec<FileReport> = files.iter().map(|f| check(f)).collect();
    let problems: usize = reports.iter().map(|r| r.errors.len()).sum();

    if json {
        print_json(&reports)?;
    } else {
        for report in &reports {
            if report.errors.is_empty() {
                println!("ok      {}", report.file.display());
            } else {
                println!("invalid {}", report.file.display());
                for err in &report.errors {
                    println!("  - {err}");
                }
            }
        }
    }

    if problems > 0 {
        anyhow::bail!("{problems} problem(s) found");
    }
    Ok(())
}
