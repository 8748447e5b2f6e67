use crate::types::{OutputFormat, SectionKind, WorkflowMode};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value;

// ---------------------------------------------------------------------------
// TemplateMetadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSpec {
    pub format: OutputFormat,
    pub filename: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateMetadata {
    pub id: String,
    pub name: String,
    pub version: String,
    pub output: OutputSpec,
}

// ---------------------------------------------------------------------------
// TemplateWorkflow
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateWorkflow {
    #[serde(default)]
    pub mode: WorkflowMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elicitation: Option<String>,
}

// ---------------------------------------------------------------------------
// Choices
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    #[serde(deserialize_with = "scalar")]
    pub name: String,
    #[serde(deserialize_with = "scalar")]
    pub value: String,
}

impl ChoiceOption {
    pub fn literal(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            name: value.clone(),
            value,
        }
    }
}

/// A `choices` entry as written in the source: either a bare scalar or a
/// `{name, value}` pair. Normalization upgrades every literal to a pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Choice {
    Literal(String),
    Pair(ChoiceOption),
}

impl<'de> Deserialize<'de> for Choice {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        if let Some(literal) = scalar_text(&value) {
            return Ok(Choice::Literal(literal));
        }
        ChoiceOption::deserialize(value)
            .map(Choice::Pair)
            .map_err(|e| D::Error::custom(format!("choice must be a scalar or {{name, value}}: {e}")))
    }
}

impl Choice {
    pub fn value(&self) -> &str {
        match self {
            Choice::Literal(v) => v,
            Choice::Pair(opt) => &opt.value,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Choice::Literal(v) => v,
            Choice::Pair(opt) => &opt.name,
        }
    }

    pub fn to_option(&self) -> ChoiceOption {
        match self {
            Choice::Literal(v) => ChoiceOption::literal(v.clone()),
            Choice::Pair(opt) => opt.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// TemplateSection
// ---------------------------------------------------------------------------

/// A section as read from the template source.
///
/// `id`, `title` and `kind` are optional here because the source may omit
/// them; [`crate::parser::parse_template`] fills all three in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateSection {
    #[serde(default, deserialize_with = "scalar_opt", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "scalar_opt", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<SectionKind>,
    #[serde(default, deserialize_with = "scalar_opt", skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub elicit: bool,
    #[serde(default, deserialize_with = "scalar_opt", skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub repeatable: bool,
    #[serde(default, deserialize_with = "scalar_opt", skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,
    #[serde(default, deserialize_with = "scalar_list", skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
    #[serde(default, deserialize_with = "scalar_opt", skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, deserialize_with = "scalar_opt", skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, deserialize_with = "scalar_list", skip_serializing_if = "Vec::is_empty")]
    pub editors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sections: Vec<TemplateSection>,
}

pub(crate) fn is_false(b: &bool) -> bool {
    !*b
}

// ---------------------------------------------------------------------------
// Scalar coercion
// ---------------------------------------------------------------------------

// YAML reads `title: 2024` or `choices: [1, 2]` as numbers; string slots
// take any scalar.

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_text(&tagged.value),
        _ => None,
    }
}

fn scalar<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    scalar_text(&value).ok_or_else(|| D::Error::custom("expected a string, number or boolean"))
}

fn scalar_opt<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        value => scalar_text(&value)
            .map(Some)
            .ok_or_else(|| D::Error::custom("expected a string, number or boolean")),
    }
}

fn scalar_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(items) => items
            .iter()
            .map(|item| {
                scalar_text(item)
                    .ok_or_else(|| D::Error::custom("list entries must be strings, numbers or booleans"))
            })
            .collect(),
        _ => Err(D::Error::custom("expected a list")),
    }
}

// ---------------------------------------------------------------------------
// TemplateConfig
// ---------------------------------------------------------------------------

/// Section ids an external editor may change. Advisory only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub editable_sections: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateConfig {
    pub template: TemplateMetadata,
    #[serde(default)]
    pub workflow: TemplateWorkflow,
    pub sections: Vec<TemplateSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_config: Option<AgentConfig>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
