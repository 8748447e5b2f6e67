use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("invalid template YAML: {0}")]
    Parse(String),

    #[error("invalid template: missing required field '{0}'")]
    MissingField(&'static str),

    #[error("template validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("template '{0}' not found in registry")]
    NotRegistered(String),

    #[error("failed to compile template '{id}': {source}")]
    Compile {
        id: String,
        #[source]
        source: Box<TemplateError>,
    },

    #[error("failed to read template file {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid exclude pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error("helper template error: {0}")]
    Helper(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TemplateError>;
