//! Run configuration files.
//!
//! A YAML document that adds to the engine's filter sets and picks the output mode and entrypoint:
//!
//! ```yaml
//! include_groups: [smoke]
//! exclude_modules: [slow]
//! output: minimal
//! entrypoint: ci
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::Engine;
use crate::error::ConfigError;
use crate::logger::OutputMode;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub include_modules: Vec<String>,
    pub exclude_modules: Vec<String>,
    pub include_groups: Vec<String>,
    pub exclude_groups: Vec<String>,
    pub output: Option<OutputMode>,
    pub entrypoint: Option<String>,
}

impl RunConfig {
    pub fn from_yaml(path: &str, text: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(text).map_err(|err| ConfigError::Invalid {
            path: path.to_string(),
            message: err.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        // An empty document means "no settings".
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Self::from_yaml(&display, &text)
    }

    /// Adds this configuration's filters to the engine.
    pub fn apply(&self, engine: &mut Engine) {
        engine.include_modules(self.include_modules.iter().cloned());
        engine.exclude_modules(self.exclude_modules.iter().cloned());
        engine.include_groups(self.include_groups.iter().cloned());
        engine.exclude_groups(self.exclude_groups.iter().cloned());
    }

    /// Overlays `other` on top of this configuration: lists are extended, scalars replaced.
    pub fn merge(&mut self, other: RunConfig) {
        self.include_modules.extend(other.include_modules);
        self.exclude_modules.extend(other.exclude_modules);
        self.include_groups.extend(other.include_groups);
        self.exclude_groups.extend(other.exclude_groups);
        if other.output.is_some() {
            self.output = other.output;
        }
        if other.entrypoint.is_some() {
            self.entrypoint = other.entrypoint;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parses_all_keys() {
        let config = RunConfig::from_yaml(
            "run.yaml",
            "include_groups: [smoke]\nexclude_modules: [slow]\noutput: verbose\nentrypoint: ci\n",
        )
        .unwrap();
        assert_eq!(config.include_groups, vec!["smoke"]);
        assert_eq!(config.exclude_modules, vec!["slow"]);
        assert_eq!(config.output, Some(OutputMode::Verbose));
        assert_eq!(config.entrypoint.as_deref(), Some("ci"));
        assert!(config.include_modules.is_empty());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let err = RunConfig::from_yaml("run.yaml", "include_group: [typo]\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
        assert!(err.to_string().contains("run.yaml"));
    }

    #[test]
    fn test_load_from_file_and_missing_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "exclude_groups: [slow]").unwrap();
        let config = RunConfig::load(file.path()).unwrap();
        assert_eq!(config.exclude_groups, vec!["slow"]);

        let missing = RunConfig::load(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }

    #[test]
    fn test_merge_extends_lists_and_replaces_scalars() {
        let mut base = RunConfig {
            include_groups: vec!["a".into()],
            output: Some(OutputMode::Minimal),
            ..RunConfig::default()
        };
        base.merge(RunConfig {
            include_groups: vec!["b".into()],
            entrypoint: Some("ci".into()),
            ..RunConfig::default()
        });
        assert_eq!(base.include_groups, vec!["a", "b"]);
        assert_eq!(base.output, Some(OutputMode::Minimal));
        assert_eq!(base.entrypoint.as_deref(), Some("ci"));
    }
}
