//! YAML template parsing, normalization and structural validation.
//!
//! Two source dialects are accepted. Standard templates carry a `template`
//! metadata block and a `sections` tree. Gate-decision records have no
//! `template` key but a top-level `schema` key; they are mapped onto a fixed
//! seven-section template (see [`gate_template`]).

use crate::error::{Result, TemplateError};
use crate::schema::{
    AgentConfig, Choice, ChoiceOption, OutputSpec, TemplateConfig, TemplateMetadata,
    TemplateSection, TemplateWorkflow,
};
use crate::types::{OutputFormat, SectionKind};
use serde::Deserialize;
use serde_yaml::Value;
use std::path::Path;

pub const GATE_TEMPLATE_ID: &str = "qa-gate-template-v1";
pub const GATE_DECISIONS: [&str; 4] = ["PASS", "CONCERNS", "FAIL", "WAIVED"];

const DEFAULT_VERSION: &str = "1.0";

// ---------------------------------------------------------------------------
// Dialect detection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Standard,
    Gate,
}

pub fn detect_dialect(doc: &Value) -> Dialect {
    if doc.get("template").is_none() && doc.get("schema").is_some() {
        Dialect::Gate
    } else {
        Dialect::Standard
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct OutputSource {
    #[serde(default)]
    format: Option<OutputFormat>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

/// Parse raw template source into a normalized [`TemplateConfig`].
pub fn parse_template(raw: &str) -> Result<TemplateConfig> {
    let doc: Value = serde_yaml::from_str(raw).map_err(|e| TemplateError::Parse(e.to_string()))?;

    if detect_dialect(&doc) == Dialect::Gate {
        return Ok(gate_template());
    }

    let meta = doc
        .get("template")
        .filter(|v| v.is_mapping())
        .ok_or(TemplateError::MissingField("template"))?;
    let id = scalar_string(meta.get("id")).ok_or(TemplateError::MissingField("template.id"))?;
    let name =
        scalar_string(meta.get("name")).ok_or(TemplateError::MissingField("template.name"))?;
    let version = scalar_string(meta.get("version")).unwrap_or_else(|| DEFAULT_VERSION.into());

    let output: OutputSource = match meta.get("output") {
        Some(v) if !v.is_null() => from_value(v)?,
        _ => OutputSource::default(),
    };
    let format = output.format.unwrap_or_default();
    let output = OutputSpec {
        format,
        filename: output
            .filename
            .unwrap_or_else(|| format!("{id}.{}", format.extension())),
        title: output.title.unwrap_or_else(|| name.clone()),
    };

    let raw_sections = doc
        .get("sections")
        .and_then(Value::as_sequence)
        .filter(|seq| !seq.is_empty())
        .ok_or(TemplateError::MissingField("sections"))?;
    let mut sections: Vec<TemplateSection> = raw_sections
        .iter()
        .map(from_value::<TemplateSection>)
        .collect::<Result<_>>()?;
    normalize_sections(&mut sections);

    let workflow: TemplateWorkflow = match doc.get("workflow") {
        Some(v) if !v.is_null() => from_value(v)?,
        _ => TemplateWorkflow::default(),
    };
    let agent_config: Option<AgentConfig> = match doc.get("agent_config") {
        Some(v) if !v.is_null() => Some(from_value(v)?),
        _ => None,
    };

    Ok(TemplateConfig {
        template: TemplateMetadata {
            id,
            name,
            version,
            output,
        },
        workflow,
        sections,
        agent_config,
    })
}

/// Read and parse a template file.
pub fn parse_template_file(path: &Path) -> Result<TemplateConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| TemplateError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    parse_template(&raw)
}

fn from_value<T: serde::de::DeserializeOwned>(value: &Value) -> Result<T> {
    serde_yaml::from_value(value.clone()).map_err(|e| TemplateError::Parse(e.to_string()))
}

/// Scalars (strings, numbers, bools) as strings. `version: 2.0` is common.
fn scalar_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Fill in positional ids, titles and types, and upgrade literal choices.
///
/// Generated ids are `section_<index>` within the sibling list, so reordering
/// anonymous sections changes their ids.
pub fn normalize_sections(sections: &mut [TemplateSection]) {
    for (index, section) in sections.iter_mut().enumerate() {
        let id = section
            .id
            .get_or_insert_with(|| format!("section_{index}"))
            .clone();
        section.title.get_or_insert(id);
        section.kind.get_or_insert(SectionKind::Text);
        for choice in section.choices.iter_mut() {
            *choice = Choice::Pair(choice.to_option());
        }
        normalize_sections(&mut section.sections);
    }
}

// ---------------------------------------------------------------------------
// Gate dialect
// ---------------------------------------------------------------------------

/// The fixed template used for gate-decision records.
pub fn gate_template() -> TemplateConfig {
    let text = |id: &str, title: &str| TemplateSection {
        id: Some(id.to_string()),
        title: Some(title.to_string()),
        kind: Some(SectionKind::Text),
        ..Default::default()
    };

    let gate = TemplateSection {
        id: Some("gate".to_string()),
        title: Some("Gate Decision".to_string()),
        kind: Some(SectionKind::Choice),
        choices: GATE_DECISIONS
            .iter()
            .map(|d| Choice::Pair(ChoiceOption::literal(*d)))
            .collect(),
        ..Default::default()
    };

    TemplateConfig {
        template: TemplateMetadata {
            id: GATE_TEMPLATE_ID.to_string(),
            name: "Quality Gate Decision".to_string(),
            version: DEFAULT_VERSION.to_string(),
            output: OutputSpec {
                format: OutputFormat::Yaml,
                filename: "qa-gate.yml".to_string(),
                title: "Quality Gate Decision".to_string(),
            },
        },
        workflow: TemplateWorkflow::default(),
        sections: vec![
            text("schema", "Schema Version"),
            text("story", "Story"),
            text("story_title", "Story Title"),
            gate,
            text("status_reason", "Status Reason"),
            text("reviewer", "Reviewer"),
            text("updated", "Updated"),
        ],
        agent_config: None,
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Structural checks over the whole section tree. Never fails; returns every
/// finding with a path such as `sections[2].sections[0]`.
pub fn validate_template(config: &TemplateConfig) -> Vec<String> {
    let mut errors = Vec::new();
    validate_sections(&config.sections, "sections", &mut errors);
    errors
}

fn validate_sections(sections: &[TemplateSection], prefix: &str, errors: &mut Vec<String>) {
    for (index, section) in sections.iter().enumerate() {
        let path = format!("{prefix}[{index}]");
        let label = match &section.id {
            Some(id) => format!("{path} ('{id}')"),
            None => path.clone(),
        };

        if section.id.as_deref().map_or(true, |s| s.trim().is_empty()) {
            errors.push(format!("{label}: missing id"));
        }
        if section.title.as_deref().map_or(true, |s| s.trim().is_empty()) {
            errors.push(format!("{label}: missing title"));
        }
        match &section.kind {
            None => errors.push(format!("{label}: missing type")),
            Some(SectionKind::Choice) if section.choices.is_empty() => {
                errors.push(format!("{label}: choice section has no choices"));
            }
            Some(SectionKind::Table) if section.columns.is_empty() => {
                errors.push(format!("{label}: table section has no columns"));
            }
            Some(_) => {}
        }
        if section.elicit
            && section
                .instruction
                .as_deref()
                .map_or(true, |s| s.trim().is_empty())
        {
            errors.push(format!("{label}: elicit is set but no instruction is given"));
        }

        validate_sections(&section.sections, &format!("{path}.sections"), errors);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
