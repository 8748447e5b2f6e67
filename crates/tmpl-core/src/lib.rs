pub mod batch;
pub mod cache;
pub mod compiler;
pub mod condition;
pub mod config;
pub mod context;
pub mod error;
pub mod helpers;
pub mod io;
pub mod manager;
pub mod parser;
pub mod paths;
pub mod schema;
pub mod types;
pub mod watch;

pub use batch::{compile_directory, CompilationResult, CompileOptions, GeneratedArtifact};
pub use cache::{SharedCache, TemplateCache};
pub use compiler::{compile, compile_from_file, compile_from_yaml, CompiledSection, CompiledTemplate};
pub use config::TemplatesConfig;
pub use error::{Result, TemplateError};
pub use helpers::HelperRenderer;
pub use manager::TemplateManager;
pub use parser::{parse_template, parse_template_file, validate_template};
pub use schema::{TemplateConfig, TemplateSection};
pub use watch::{watch_directory, WatchEvent, WatchHandle, WatchOptions};
