#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

const BRIEF: &str = r#"
template:
  id: brief-v1
  name: Project Brief
  output:
    format: markdown
    filename: docs/brief.md
    title: "{{project}} Brief"
sections:
  - id: summary
    title: Summary
  - id: goals
    title: Goals
    type: bullet-list
  - id: release
    title: Release
    condition: "status === 'done'"
    type: template-text
    template: "Shipped {{version}}"
"#;

fn tmpl(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tmpl").unwrap();
    cmd.current_dir(dir.path()).env("TMPL_ROOT", dir.path());
    cmd
}

fn write(dir: &TempDir, rel: &str, body: &str) {
    let path = dir.path().join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, body).unwrap();
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

// ---------------------------------------------------------------------------
// tmpl compile
// ---------------------------------------------------------------------------

#[test]
fn compile_writes_artifacts_from_config_dirs() {
    let dir = TempDir::new().unwrap();
    write(&dir, "templates/brief-tmpl.yaml", BRIEF);
    write(&dir, "templates/qa-gate-tmpl.yaml", "schema: 1\n");

    tmpl(&dir)
        .arg("compile")
        .assert()
        .success()
        .stdout(predicate::str::contains("Compiled 1 template(s), 0 failed"));

    let artifact = read_json(&dir.path().join("generated/templates/brief-tmpl.json"));
    assert_eq!(artifact["source"], "brief-tmpl.yaml");
    assert_eq!(artifact["template"]["template"]["id"], "brief-v1");
    assert!(!dir.path().join("generated/templates/qa-gate-tmpl.json").exists());
}

#[test]
fn compile_flags_override_dirs() {
    let dir = TempDir::new().unwrap();
    write(&dir, "src/brief.yaml", BRIEF);

    tmpl(&dir)
        .args(["compile", "--input", "src", "--output", "out", "--verbose"])
        .assert()
        .success()
        .stdout(predicate::str::contains("brief.json"));

    assert!(dir.path().join("out/brief.json").exists());
}

#[test]
fn compile_reports_failures_and_exits_nonzero() {
    let dir = TempDir::new().unwrap();
    write(&dir, "templates/good.yaml", BRIEF);
    write(&dir, "templates/bad.yaml", "sections: []\n");

    tmpl(&dir)
        .arg("compile")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Compiled 1 template(s), 1 failed"))
        .stderr(predicate::str::contains("bad.yaml"));

    assert!(dir.path().join("generated/templates/good.json").exists());
}

#[test]
fn compile_json_output() {
    let dir = TempDir::new().unwrap();
    write(&dir, "templates/brief.yaml", BRIEF);

    let out = tmpl(&dir).args(["compile", "--json"]).output().unwrap();
    assert!(out.status.success());
    let result: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(result["success"], true);
    assert_eq!(result["compiled"], 1);
}

#[test]
fn compile_missing_input_dir_fails() {
    let dir = TempDir::new().unwrap();
    tmpl(&dir)
        .arg("compile")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to compile templates"));
}

// ---------------------------------------------------------------------------
// tmpl validate / show
// ---------------------------------------------------------------------------

#[test]
fn validate_clean_template_passes() {
    let dir = TempDir::new().unwrap();
    write(&dir, "brief.yaml", BRIEF);
    tmpl(&dir)
        .args(["validate", "brief.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ok"));
}

#[test]
fn validate_reports_findings() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "bad.yaml",
        "template:\n  id: t\n  name: T\nsections:\n  - id: pick\n    type: choice\n",
    );
    tmpl(&dir)
        .args(["validate", "bad.yaml"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("choice section has no choices"));
}

#[test]
fn show_prints_compiled_json() {
    let dir = TempDir::new().unwrap();
    write(&dir, "brief.yaml", BRIEF);
    let out = tmpl(&dir).args(["show", "brief.yaml"]).output().unwrap();
    assert!(out.status.success());
    let compiled: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(compiled["sections"][1]["type"], "bullet-list");
    assert!(compiled["sections"][0].get("renderer").is_none());
}

// ---------------------------------------------------------------------------
// tmpl render / expand
// ---------------------------------------------------------------------------

#[test]
fn render_file_with_context() {
    let dir = TempDir::new().unwrap();
    write(&dir, "brief.yaml", BRIEF);
    write(
        &dir,
        "ctx.yaml",
        "project: Atlas\nsummary: Maps.\ngoals: [one, two]\nstatus: done\nversion: '2.0'\n",
    );

    tmpl(&dir)
        .args(["render", "brief.yaml", "--context", "ctx.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("# Atlas Brief"))
        .stdout(predicate::str::contains("## Goals\n\n- one\n- two"))
        .stdout(predicate::str::contains("## Release\n\nShipped 2.0"));
}

#[test]
fn render_by_id_uses_input_dir() {
    let dir = TempDir::new().unwrap();
    write(&dir, "templates/brief-tmpl.yaml", BRIEF);
    write(&dir, "ctx.json", r#"{"project": "Atlas", "status": "open"}"#);

    tmpl(&dir)
        .args(["render", "--id", "brief-v1", "--context", "ctx.json", "--out", "docs/brief.md"])
        .assert()
        .success();

    let doc = std::fs::read_to_string(dir.path().join("docs/brief.md")).unwrap();
    assert_eq!(doc, "# Atlas Brief\n");
}

#[test]
fn render_unknown_id_fails() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("templates")).unwrap();
    write(&dir, "ctx.json", "{}");
    tmpl(&dir)
        .args(["render", "--id", "nonexistent", "--context", "ctx.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn expand_uses_helpers() {
    let dir = TempDir::new().unwrap();
    write(&dir, "note.hbs", "{{upper name}}: {{join tags \", \"}}\n");
    write(&dir, "ctx.yaml", "name: atlas\ntags: [a, b]\n");
    tmpl(&dir)
        .args(["expand", "note.hbs", "--context", "ctx.yaml"])
        .assert()
        .success()
        .stdout("ATLAS: a, b\n");
}

// ---------------------------------------------------------------------------
// tmpl config
// ---------------------------------------------------------------------------

#[test]
fn config_show_prints_defaults() {
    let dir = TempDir::new().unwrap();
    tmpl(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("input_dir: templates"))
        .stdout(predicate::str::contains("qa-gate-tmpl.yaml"));
}

#[test]
fn config_validate_flags_errors() {
    let dir = TempDir::new().unwrap();
    write(&dir, "tmpl.yaml", "input_dir: same\noutput_dir: same\n");
    tmpl(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error]"));
}

#[test]
fn config_validate_clean() {
    let dir = TempDir::new().unwrap();
    tmpl(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Config is valid"));
}
