//! Registry + cache + compiler facade.

use crate::cache::{SharedCache, TemplateCache};
use crate::compiler::{compile_from_file, CompiledSection, CompiledTemplate};
use crate::config::CacheSettings;
use crate::context::substitute;
use crate::error::{Result, TemplateError};
use crate::parser::parse_template_file;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, MutexGuard};

/// Top-level sections render under `##`; each nesting level adds one `#`.
const TOP_LEVEL_HEADING: usize = 2;
const MAX_HEADING: usize = 6;

pub struct TemplateManager {
    registry: HashMap<String, PathBuf>,
    cache: SharedCache,
}

impl TemplateManager {
    /// A manager with its own private cache.
    pub fn new() -> Self {
        Self::with_cache(TemplateCache::new().shared())
    }

    /// A manager using a caller-supplied cache, possibly shared.
    pub fn with_cache(cache: SharedCache) -> Self {
        Self {
            registry: HashMap::new(),
            cache,
        }
    }

    pub fn from_config(settings: &CacheSettings) -> Self {
        Self::with_cache(TemplateCache::with_limits(settings.max_size, settings.ttl()).shared())
    }

    pub fn cache(&self) -> SharedCache {
        Arc::clone(&self.cache)
    }

    fn lock_cache(&self) -> MutexGuard<'_, TemplateCache> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    // -----------------------------------------------------------------------
    // Registry
    // -----------------------------------------------------------------------

    pub fn register_template(&mut self, id: impl Into<String>, path: impl Into<PathBuf>) {
        self.registry.insert(id.into(), path.into());
    }

    /// Drop the registration and any cached compilation. Returns whether the
    /// id was registered.
    pub fn unregister_template(&mut self, id: &str) -> bool {
        self.lock_cache().delete(id);
        self.registry.remove(id).is_some()
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.registry.contains_key(id)
    }

    pub fn registered_path(&self, id: &str) -> Option<&Path> {
        self.registry.get(id).map(PathBuf::as_path)
    }

    pub fn registered_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.registry.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Register every `*.yaml` under `dir` by its `template.id`. Files whose
    /// name matches an `exclude` glob, or that fail to parse, are skipped.
    /// When two files share an id the later one in path order wins.
    pub fn register_directory(&mut self, dir: &Path, exclude: &[String]) -> Result<usize> {
        let patterns = crate::batch::compile_patterns(exclude)?;
        let mut registered = 0;
        for path in crate::batch::discover(dir, &patterns)? {
            match parse_template_file(&path) {
                Ok(config) => {
                    let id = config.template.id;
                    tracing::debug!(id = %id, path = %path.display(), "registered template");
                    if let Some(previous) = self.registry.insert(id.clone(), path.clone()) {
                        tracing::warn!(
                            id = %id,
                            previous = %previous.display(),
                            path = %path.display(),
                            "duplicate template id; replacing earlier registration"
                        );
                        self.lock_cache().delete(&id);
                    }
                    registered += 1;
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), "skipping template: {e}");
                }
            }
        }
        Ok(registered)
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// Cached compile of a registered template.
    pub fn load_template(&self, id: &str) -> Result<Arc<CompiledTemplate>> {
        if let Some(hit) = self.lock_cache().get(id) {
            tracing::debug!(id, "template cache hit");
            return Ok(hit);
        }

        let path = self
            .registry
            .get(id)
            .ok_or_else(|| TemplateError::NotRegistered(id.to_string()))?;

        let compiled = compile_from_file(path).map_err(|e| TemplateError::Compile {
            id: id.to_string(),
            source: Box::new(e),
        })?;
        let compiled = Arc::new(compiled);
        self.lock_cache().set(id, Arc::clone(&compiled));
        tracing::debug!(id, path = %path.display(), "compiled template");
        Ok(compiled)
    }

    pub fn clear_cache(&self) {
        self.lock_cache().clear();
    }

    // -----------------------------------------------------------------------
    // Rendering
    // -----------------------------------------------------------------------

    /// Render a compiled template into a markdown document.
    ///
    /// Sections whose condition is false are dropped with their subtree.
    /// Sections with nothing to show, neither content nor rendered
    /// subsections, are dropped too.
    pub fn render_compiled_template(&self, template: &CompiledTemplate, context: &Value) -> String {
        let title = substitute(&template.template.output.title, context);
        let mut doc = format!("# {title}\n\n");
        for section in &template.sections {
            if let Some(block) = render_section(section, context, TOP_LEVEL_HEADING) {
                doc.push_str(&block);
                doc.push_str("\n\n");
            }
        }
        doc.truncate(doc.trim_end().len());
        doc.push('\n');
        doc
    }

    pub fn render_template(&self, id: &str, context: &Value) -> Result<String> {
        let template = self.load_template(id)?;
        Ok(self.render_compiled_template(&template, context))
    }
}

impl Default for TemplateManager {
    fn default() -> Self {
        Self::new()
    }
}

fn render_section(section: &CompiledSection, context: &Value, level: usize) -> Option<String> {
    if !section.is_visible(context) {
        return None;
    }

    let mut body = section.render(context);
    for child in &section.sections {
        if let Some(block) = render_section(child, context, level + 1) {
            if !body.is_empty() {
                body.push_str("\n\n");
            }
            body.push_str(&block);
        }
    }

    if body.trim().is_empty() {
        return None;
    }
    let hashes = "#".repeat(level.min(MAX_HEADING));
    Some(format!("{hashes} {}\n\n{body}", section.title))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
