use crate::error::Result;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// CacheSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_max_size")]
    pub max_size: usize,
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,
}

fn default_max_size() -> usize {
    crate::cache::DEFAULT_MAX_SIZE
}

fn default_ttl_ms() -> u64 {
    crate::cache::DEFAULT_TTL.as_millis() as u64
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
            ttl_ms: default_ttl_ms(),
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

// ---------------------------------------------------------------------------
// WatchSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchSettings {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    800
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl WatchSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// ---------------------------------------------------------------------------
// TemplatesConfig (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplatesConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// File-name glob patterns skipped by batch compilation.
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub watch: WatchSettings,
}

fn default_version() -> u32 {
    1
}

fn default_input_dir() -> PathBuf {
    PathBuf::from(paths::DEFAULT_INPUT_DIR)
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(paths::DEFAULT_OUTPUT_DIR)
}

fn default_exclude() -> Vec<String> {
    vec![paths::DEFAULT_EXCLUDE.to_string()]
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
            exclude: default_exclude(),
            cache: CacheSettings::default(),
            watch: WatchSettings::default(),
        }
    }
}

impl TemplatesConfig {
    /// Load `tmpl.yaml` from `root`; defaults when the file does not exist.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: TemplatesConfig = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn input_dir(&self, root: &Path) -> PathBuf {
        paths::resolve(root, &self.input_dir)
    }

    pub fn output_dir(&self, root: &Path) -> PathBuf {
        paths::resolve(root, &self.output_dir)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        for pattern in &self.exclude {
            if let Err(e) = glob::Pattern::new(pattern) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("exclude pattern '{pattern}' is invalid: {e}"),
                });
            }
        }

        if self.input_dir == self.output_dir {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "input_dir and output_dir are both '{}'",
                    self.input_dir.display()
                ),
            });
        }

        if self.cache.max_size == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "cache.max_size is 0: compiled templates will never be cached"
                    .to_string(),
            });
        }
        if self.cache.ttl_ms == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "cache.ttl_ms is 0: cached templates expire immediately".to_string(),
            });
        }

        if self.watch.poll_interval_ms < 50 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "watch.poll_interval_ms={} (<50 rescans the tree very often)",
                    self.watch.poll_interval_ms
                ),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = TemplatesConfig::load(dir.path()).unwrap();
        assert_eq!(cfg, TemplatesConfig::default());
        assert_eq!(cfg.exclude, ["qa-gate-tmpl.yaml"]);
        assert_eq!(cfg.cache.max_size, 100);
        assert_eq!(cfg.cache.ttl(), Duration::from_millis(300_000));
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut cfg = TemplatesConfig::default();
        cfg.input_dir = PathBuf::from("tmpl-src");
        cfg.exclude.push("draft-*.yaml".to_string());
        cfg.save(dir.path()).unwrap();
        let loaded = TemplatesConfig::load(dir.path()).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("tmpl.yaml"),
            "output_dir: out\ncache:\n  max_size: 5\n",
        )
        .unwrap();
        let cfg = TemplatesConfig::load(dir.path()).unwrap();
        assert_eq!(cfg.output_dir, PathBuf::from("out"));
        assert_eq!(cfg.cache.max_size, 5);
        assert_eq!(cfg.cache.ttl_ms, 300_000);
        assert_eq!(cfg.input_dir, PathBuf::from("templates"));
        assert_eq!(cfg.watch.poll_interval_ms, 800);
    }

    #[test]
    fn dirs_resolve_against_root() {
        let cfg = TemplatesConfig::default();
        assert_eq!(
            cfg.input_dir(Path::new("/proj")),
            PathBuf::from("/proj/templates")
        );
        assert_eq!(
            cfg.output_dir(Path::new("/proj")),
            PathBuf::from("/proj/generated/templates")
        );
    }

    #[test]
    fn default_config_is_clean() {
        assert!(TemplatesConfig::default().validate().is_empty());
    }

    #[test]
    fn validate_flags_problems() {
        let cfg = TemplatesConfig {
            output_dir: PathBuf::from("templates"),
            exclude: vec!["[unclosed".to_string()],
            cache: CacheSettings {
                max_size: 0,
                ttl_ms: 0,
            },
            watch: WatchSettings {
                poll_interval_ms: 10,
            },
            ..TemplatesConfig::default()
        };
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 5);
        let errors = warnings
            .iter()
            .filter(|w| w.level == WarnLevel::Error)
            .count();
        assert_eq!(errors, 2);
    }
}
