//! Template compilation.
//!
//! Each section's `type` selects a [`SectionBody`] at compile time. Rendering
//! and validation are a `match` over that body, so a compiled template is
//! plain data: it compares, clones and serializes without losing behavior.

use crate::context::{display_value, lookup, substitute};
use crate::error::Result;
use crate::parser::{parse_template, parse_template_file};
use crate::schema::{
    AgentConfig, ChoiceOption, TemplateConfig, TemplateMetadata, TemplateSection,
    TemplateWorkflow,
};
use crate::types::SectionKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

// ---------------------------------------------------------------------------
// SectionBody
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SectionBody {
    Text,
    TemplateText {
        template: String,
    },
    BulletList,
    NumberedList {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prefix: Option<String>,
    },
    Table {
        columns: Vec<String>,
    },
    Choice {
        choices: Vec<ChoiceOption>,
    },
}

impl SectionBody {
    fn for_section(kind: &SectionKind, section: &TemplateSection) -> Self {
        match kind {
            SectionKind::TemplateText => SectionBody::TemplateText {
                template: section.template.clone().unwrap_or_default(),
            },
            SectionKind::BulletList => SectionBody::BulletList,
            SectionKind::NumberedList => SectionBody::NumberedList {
                prefix: section.prefix.clone(),
            },
            SectionKind::Table => SectionBody::Table {
                columns: section.columns.clone(),
            },
            SectionKind::Choice => SectionBody::Choice {
                choices: section.choices.iter().map(|c| c.to_option()).collect(),
            },
            SectionKind::Text | SectionKind::Other(_) => SectionBody::Text,
        }
    }
}

// ---------------------------------------------------------------------------
// CompiledSection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledSection {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    kind: SectionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    #[serde(default)]
    pub elicit: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default)]
    pub repeatable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub editors: Vec<String>,
    #[serde(rename = "render")]
    body: SectionBody,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sections: Vec<CompiledSection>,
}

impl CompiledSection {
    /// The section type this section was compiled as. Fixed after compilation.
    pub fn kind(&self) -> &SectionKind {
        &self.kind
    }

    pub fn body(&self) -> &SectionBody {
        &self.body
    }

    /// Whether the section's condition (if any) holds for `context`.
    pub fn is_visible(&self, context: &Value) -> bool {
        match &self.condition {
            Some(cond) if !cond.trim().is_empty() => crate::condition::evaluate(cond, context),
            _ => true,
        }
    }

    /// Render this section's own content (subsections excluded).
    pub fn render(&self, context: &Value) -> String {
        let value = lookup(context, &self.id);
        match &self.body {
            SectionBody::Text => value.map(display_value).unwrap_or_default(),
            SectionBody::TemplateText { template } => substitute(template, context),
            SectionBody::BulletList => match value.and_then(Value::as_array) {
                Some(items) => items
                    .iter()
                    .map(|item| format!("- {}", display_value(item)))
                    .collect::<Vec<_>>()
                    .join("\n"),
                None => String::new(),
            },
            SectionBody::NumberedList { prefix } => match value.and_then(Value::as_array) {
                Some(items) => {
                    let prefix = prefix.as_deref().unwrap_or("");
                    items
                        .iter()
                        .enumerate()
                        .map(|(i, item)| format!("{prefix}{}: {}", i + 1, display_value(item)))
                        .collect::<Vec<_>>()
                        .join("\n")
                }
                None => String::new(),
            },
            SectionBody::Table { columns } => match value.and_then(Value::as_array) {
                Some(rows) if !columns.is_empty() => render_table(columns, rows),
                _ => String::new(),
            },
            SectionBody::Choice { choices } => match value {
                Some(v) => selected_choice(choices, v)
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| display_value(v)),
                None => String::new(),
            },
        }
    }

    /// Check a candidate value for this section. `None` means absent.
    pub fn validate(&self, value: Option<&Value>) -> bool {
        self.check(value).is_none()
    }

    fn check(&self, value: Option<&Value>) -> Option<String> {
        match &self.body {
            SectionBody::Text | SectionBody::TemplateText { .. } => match value {
                None | Some(Value::Null) => Some("value is missing".to_string()),
                Some(_) => None,
            },
            SectionBody::BulletList | SectionBody::NumberedList { .. } => match value {
                Some(Value::Array(_)) => None,
                _ => Some("expected a list".to_string()),
            },
            SectionBody::Table { .. } => match value {
                Some(Value::Array(rows)) if rows.iter().all(Value::is_object) => None,
                Some(Value::Array(_)) => Some("every table row must be an object".to_string()),
                _ => Some("expected a list of rows".to_string()),
            },
            SectionBody::Choice { choices } => {
                if value.and_then(|v| selected_choice(choices, v)).is_some() {
                    return None;
                }
                let allowed: Vec<&str> = choices.iter().map(|c| c.value.as_str()).collect();
                Some(format!(
                    "'{}' is not one of: {}",
                    value.map(display_value).unwrap_or_default(),
                    allowed.join(", ")
                ))
            }
        }
    }
}

/// The choice whose value matches a scalar context value. `3` matches `"3"`.
fn selected_choice<'a>(choices: &'a [ChoiceOption], value: &Value) -> Option<&'a ChoiceOption> {
    match value {
        Value::String(_) | Value::Number(_) | Value::Bool(_) => {
            let key = display_value(value);
            choices.iter().find(|c| c.value == key)
        }
        _ => None,
    }
}

fn render_table(columns: &[String], rows: &[Value]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(format!("| {} |", columns.join(" | ")));
    lines.push(format!(
        "| {} |",
        columns.iter().map(|_| "---").collect::<Vec<_>>().join(" | ")
    ));
    for row in rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|col| row.get(col).map(display_value).unwrap_or_default())
            .collect();
        lines.push(format!("| {} |", cells.join(" | ")));
    }
    lines.join("\n")
}

// ---------------------------------------------------------------------------
// CompiledTemplate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledTemplate {
    pub template: TemplateMetadata,
    pub workflow: TemplateWorkflow,
    pub sections: Vec<CompiledSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_config: Option<AgentConfig>,
}

/// A context value that a section's validator rejects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextIssue {
    /// Dotted section-id path, e.g. `requirements.functional`.
    pub section: String,
    pub message: String,
}

impl CompiledTemplate {
    pub fn id(&self) -> &str {
        &self.template.id
    }

    /// Depth-first lookup of a section by id.
    pub fn find_section(&self, id: &str) -> Option<&CompiledSection> {
        fn find<'a>(sections: &'a [CompiledSection], id: &str) -> Option<&'a CompiledSection> {
            sections
                .iter()
                .find_map(|s| if s.id == id { Some(s) } else { find(&s.sections, id) })
        }
        find(&self.sections, id)
    }

    /// Run each section's validator against the context value keyed by its
    /// id. Sections with no value in the context are not checked, nor are
    /// template-text sections, whose data is addressed by placeholder paths.
    pub fn validate_context(&self, context: &Value) -> Vec<ContextIssue> {
        let mut issues = Vec::new();
        collect_issues(&self.sections, "", context, &mut issues);
        issues
    }
}

fn collect_issues(
    sections: &[CompiledSection],
    prefix: &str,
    context: &Value,
    issues: &mut Vec<ContextIssue>,
) {
    for section in sections {
        let path = if prefix.is_empty() {
            section.id.clone()
        } else {
            format!("{prefix}.{}", section.id)
        };
        if !matches!(section.body, SectionBody::TemplateText { .. }) {
            if let Some(value) = lookup(context, &section.id) {
                if let Some(message) = section.check(Some(value)) {
                    issues.push(ContextIssue {
                        section: path.clone(),
                        message,
                    });
                }
            }
        }
        collect_issues(&section.sections, &path, context, issues);
    }
}

// ---------------------------------------------------------------------------
// Compilation
// ---------------------------------------------------------------------------

/// Compile a parsed template. Pure and deterministic.
pub fn compile(config: &TemplateConfig) -> CompiledTemplate {
    CompiledTemplate {
        template: config.template.clone(),
        workflow: config.workflow.clone(),
        sections: compile_sections(&config.sections),
        agent_config: config.agent_config.clone(),
    }
}

fn compile_sections(sections: &[TemplateSection]) -> Vec<CompiledSection> {
    sections
        .iter()
        .enumerate()
        .map(|(index, section)| compile_section(index, section))
        .collect()
}

fn compile_section(index: usize, section: &TemplateSection) -> CompiledSection {
    let id = section
        .id
        .clone()
        .unwrap_or_else(|| format!("section_{index}"));
    let kind = section.kind.clone().unwrap_or_default();
    CompiledSection {
        title: section.title.clone().unwrap_or_else(|| id.clone()),
        body: SectionBody::for_section(&kind, section),
        kind,
        id,
        instruction: section.instruction.clone(),
        elicit: section.elicit,
        condition: section.condition.clone(),
        repeatable: section.repeatable,
        owner: section.owner.clone(),
        editors: section.editors.clone(),
        sections: compile_sections(&section.sections),
    }
}

pub fn compile_from_yaml(raw: &str) -> Result<CompiledTemplate> {
    Ok(compile(&parse_template(raw)?))
}

pub fn compile_from_file(path: &Path) -> Result<CompiledTemplate> {
    Ok(compile(&parse_template_file(path)?))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE: &str = r#"
template:
  id: story-template-v2
  name: Story Document
  version: "2.0"
  output:
    format: markdown
    filename: "docs/stories/{{epic}}.{{story}}.md"
    title: "Story {{epic}}.{{story}}: {{title}}"
sections:
  - id: status
    type: choice
    choices: [Draft, Approved, InProgress, Done]
  - id: story
    title: Story
    type: template-text
    template: "**As a** {{role}},\n**I want** {{action}},\n**so that** {{benefit}}"
  - id: acceptance
    title: Acceptance Criteria
    type: numbered-list
    prefix: AC
  - id: tasks
    title: Tasks
    type: bullet-list
  - id: changes
    title: Change Log
    type: table
    columns: [date, version, description]
  - id: notes
    title: Dev Notes
    type: paragraphs
"#;

    fn sample() -> CompiledTemplate {
        compile_from_yaml(SAMPLE).unwrap()
    }

    fn section<'a>(t: &'a CompiledTemplate, id: &str) -> &'a CompiledSection {
        t.find_section(id).unwrap()
    }

    #[test]
    fn compiling_twice_is_structurally_equal() {
        assert_eq!(sample(), sample());
    }

    #[test]
    fn body_follows_type() {
        let t = sample();
        assert_eq!(section(&t, "tasks").body(), &SectionBody::BulletList);
        assert_eq!(
            section(&t, "acceptance").body(),
            &SectionBody::NumberedList {
                prefix: Some("AC".to_string())
            }
        );
        let notes = section(&t, "notes");
        assert_eq!(notes.kind(), &SectionKind::Other("paragraphs".to_string()));
        assert_eq!(notes.body(), &SectionBody::Text);
    }

    #[test]
    fn template_text_substitutes_and_keeps_unresolved() {
        let t = sample();
        let ctx = json!({"role": "reviewer", "action": "to approve"});
        assert_eq!(
            section(&t, "story").render(&ctx),
            "**As a** reviewer,\n**I want** to approve,\n**so that** {{benefit}}"
        );
    }

    #[test]
    fn bullet_and_numbered_lists() {
        let t = sample();
        let ctx = json!({"tasks": ["write", "test"], "acceptance": ["loads", "saves"]});
        assert_eq!(section(&t, "tasks").render(&ctx), "- write\n- test");
        assert_eq!(
            section(&t, "acceptance").render(&ctx),
            "AC1: loads\nAC2: saves"
        );
        assert_eq!(section(&t, "tasks").render(&json!({"tasks": "nope"})), "");
    }

    #[test]
    fn numbered_list_without_prefix() {
        let t = compile_from_yaml(
            "template: {id: t, name: T}\nsections:\n  - id: steps\n    type: numbered-list\n",
        )
        .unwrap();
        let out = t.sections[0].render(&json!({"steps": ["a", "b"]}));
        assert_eq!(out, "1: a\n2: b");
    }

    #[test]
    fn table_renders_header_separator_and_rows() {
        let t = compile_from_yaml(
            "template: {id: t, name: T}\nsections:\n  - id: people\n    type: table\n    columns: [name, age]\n",
        )
        .unwrap();
        let ctx = json!({"people": [{"name": "A", "age": 1}, {"name": "B"}]});
        let out = t.sections[0].render(&ctx);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "| name | age |");
        assert_eq!(lines[1], "| --- | --- |");
        assert_eq!(lines[2], "| A | 1 |");
        let cells: Vec<&str> = lines[3]
            .trim_matches('|')
            .split('|')
            .map(str::trim)
            .collect();
        assert_eq!(cells, ["B", ""]);
    }

    #[test]
    fn choice_renders_display_name_or_raw_value() {
        let t = compile_from_yaml(
            "template: {id: t, name: T}\nsections:\n  - id: gate\n    type: choice\n    choices:\n      - {name: Pass, value: PASS}\n      - FAIL\n",
        )
        .unwrap();
        let gate = &t.sections[0];
        assert_eq!(gate.render(&json!({"gate": "PASS"})), "Pass");
        assert_eq!(gate.render(&json!({"gate": "FAIL"})), "FAIL");
        assert_eq!(gate.render(&json!({"gate": "MAYBE"})), "MAYBE");
        assert_eq!(gate.render(&json!({})), "");
    }

    #[test]
    fn choice_validator_is_case_sensitive() {
        let config = crate::parser::gate_template();
        let t = compile(&config);
        let gate = section(&t, "gate");
        assert!(gate.validate(Some(&json!("PASS"))));
        assert!(!gate.validate(Some(&json!("pass"))));
        assert!(!gate.validate(Some(&json!("UNKNOWN"))));
        assert!(!gate.validate(None));
    }

    #[test]
    fn numeric_choices_match_numeric_context_values() {
        let t = compile_from_yaml(
            "template: {id: t, name: T}\nsections:\n  - id: rating\n    title: 2024\n    type: choice\n    choices: [1, 2, {name: Three, value: 3}]\n",
        )
        .unwrap();
        let rating = &t.sections[0];
        assert_eq!(rating.title, "2024");
        assert_eq!(rating.render(&json!({"rating": 3})), "Three");
        assert_eq!(rating.render(&json!({"rating": "3"})), "Three");
        assert_eq!(rating.render(&json!({"rating": 2})), "2");
        assert!(rating.validate(Some(&json!(1))));
        assert!(rating.validate(Some(&json!("2"))));
        assert!(!rating.validate(Some(&json!(4))));
        assert!(!rating.validate(Some(&json!([3]))));
    }

    #[test]
    fn validators_by_type() {
        let t = sample();
        assert!(section(&t, "tasks").validate(Some(&json!([]))));
        assert!(!section(&t, "tasks").validate(Some(&json!("x"))));
        assert!(section(&t, "changes").validate(Some(&json!([{"date": "today"}]))));
        assert!(!section(&t, "changes").validate(Some(&json!([{"date": "today"}, 3]))));
        assert!(section(&t, "notes").validate(Some(&json!(0))));
        assert!(!section(&t, "notes").validate(Some(&Value::Null)));
        assert!(!section(&t, "story").validate(None));
    }

    #[test]
    fn text_renders_raw_context_value() {
        let t = sample();
        assert_eq!(section(&t, "notes").render(&json!({"notes": 42})), "42");
        assert_eq!(section(&t, "notes").render(&json!({})), "");
    }

    #[test]
    fn nested_sections_compile_recursively() {
        let t = compile_from_yaml(
            "template: {id: t, name: T}\nsections:\n  - id: outer\n    sections:\n      - id: inner\n        sections:\n          - type: bullet-list\n",
        )
        .unwrap();
        let inner = section(&t, "inner");
        assert_eq!(inner.sections[0].id, "section_0");
        assert_eq!(inner.sections[0].body(), &SectionBody::BulletList);
    }

    #[test]
    fn validate_context_reports_bad_values() {
        let t = sample();
        let ctx = json!({
            "status": "Closed",
            "tasks": ["ok"],
            "changes": "not a table",
            "story": 5,
        });
        let issues = t.validate_context(&ctx);
        let sections: Vec<&str> = issues.iter().map(|i| i.section.as_str()).collect();
        assert_eq!(sections, ["status", "changes"]);
        assert!(issues[0].message.contains("Draft, Approved"));
    }

    #[test]
    fn serialized_form_has_no_function_fields() {
        let json = serde_json::to_value(sample()).unwrap();
        let first = &json["sections"][0];
        assert_eq!(first["type"], "choice");
        assert_eq!(first["render"]["kind"], "choice");
        assert!(first.get("renderer").is_none());
        assert!(first.get("validator").is_none());
        let back: CompiledTemplate = serde_json::from_value(json).unwrap();
        assert_eq!(back, sample());
    }
}
