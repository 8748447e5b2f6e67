use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// OutputFormat
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Json,
    Yaml,
    Text,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Markdown => "markdown",
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
            OutputFormat::Text => "text",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
            OutputFormat::Text => "txt",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = crate::error::TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            "text" | "txt" => Ok(OutputFormat::Text),
            _ => Err(crate::error::TemplateError::Parse(format!(
                "unknown output format '{s}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// WorkflowMode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowMode {
    #[default]
    Interactive,
    Batch,
    Yolo,
}

impl WorkflowMode {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowMode::Interactive => "interactive",
            WorkflowMode::Batch => "batch",
            WorkflowMode::Yolo => "yolo",
        }
    }
}

impl fmt::Display for WorkflowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SectionKind
// ---------------------------------------------------------------------------

/// The `type` of a template section.
///
/// Type names outside the known set are kept verbatim in `Other` so they
/// survive a parse/serialize cycle; they render as plain text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SectionKind {
    #[default]
    Text,
    BulletList,
    NumberedList,
    Table,
    Choice,
    TemplateText,
    Other(String),
}

impl SectionKind {
    pub fn as_str(&self) -> &str {
        match self {
            SectionKind::Text => "text",
            SectionKind::BulletList => "bullet-list",
            SectionKind::NumberedList => "numbered-list",
            SectionKind::Table => "table",
            SectionKind::Choice => "choice",
            SectionKind::TemplateText => "template-text",
            SectionKind::Other(name) => name,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, SectionKind::Other(_))
    }
}

impl From<String> for SectionKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "text" => SectionKind::Text,
            "bullet-list" => SectionKind::BulletList,
            "numbered-list" => SectionKind::NumberedList,
            "table" => SectionKind::Table,
            "choice" => SectionKind::Choice,
            "template-text" => SectionKind::TemplateText,
            _ => SectionKind::Other(s),
        }
    }
}

impl From<&str> for SectionKind {
    fn from(s: &str) -> Self {
        SectionKind::from(s.to_string())
    }
}

impl From<SectionKind> for String {
    fn from(kind: SectionKind) -> Self {
        match kind {
            SectionKind::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
