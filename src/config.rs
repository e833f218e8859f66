//! Registry configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::document::BuildOptions;
use crate::error::{ErrorContext, Result, XapiError};
use crate::template::ValidationMode;

/// Where profiles come from and how statements are finalized
///
/// Every field has a default, so a YAML file only needs the keys it changes:
///
/// ```yaml
/// profile_dirs:
///   - ./profiles
/// fail_on_parse_error: true
/// validation: collect
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// Directories scanned recursively for `*.json`, `*.yml` and `*.yaml` profiles
    pub profile_dirs: Vec<PathBuf>,

    /// Abort loading on the first unreadable profile instead of skipping it
    pub fail_on_parse_error: bool,

    /// Language tag used for `display` and `name` maps
    pub language: String,

    /// How template violations are reported
    pub validation: ValidationMode,

    /// Fill a missing statement `id`
    pub generate_ids: bool,

    /// Fill a missing statement `timestamp`
    pub generate_timestamps: bool,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            profile_dirs: Vec::new(),
            fail_on_parse_error: false,
            language: "en".to_string(),
            validation: ValidationMode::FailFast,
            generate_ids: true,
            generate_timestamps: true,
        }
    }
}

impl ProfileConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a YAML configuration
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: ProfileConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a YAML configuration file
    ///
    /// Relative profile directories are taken relative to the file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(XapiError::from)
            .with_context(|| format!("reading {}", path.display()))?;
        let mut config = Self::from_yaml_str(&contents)
            .map_err(|e| XapiError::Configuration(format!("parsing {}: {}", path.display(), e)))?;

        if let Some(base) = path.parent() {
            for dir in &mut config.profile_dirs {
                if dir.is_relative() {
                    *dir = base.join(&*dir);
                }
            }
        }
        Ok(config)
    }

    /// Add a profile directory
    pub fn add_profile_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.profile_dirs.push(dir.into());
        self
    }

    /// Set whether to abort on unreadable profiles
    pub fn fail_on_parse_error(mut self, fail: bool) -> Self {
        self.fail_on_parse_error = fail;
        self
    }

    /// Set the display language
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set the validation mode
    pub fn validation(mut self, mode: ValidationMode) -> Self {
        self.validation = mode;
        self
    }

    /// Set whether statement ids are generated
    pub fn generate_ids(mut self, generate: bool) -> Self {
        self.generate_ids = generate;
        self
    }

    /// Set whether statement timestamps are generated
    pub fn generate_timestamps(mut self, generate: bool) -> Self {
        self.generate_timestamps = generate;
        self
    }

    /// Options handed to every builder the registry creates
    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            generate_ids: self.generate_ids,
            generate_timestamps: self.generate_timestamps,
            language: self.language.clone(),
            validation: self.validation,
        }
    }

    /// Check the configuration for obvious mistakes
    pub fn validate(&self) -> Result<()> {
        if self.language.trim().is_empty() {
            return Err(XapiError::Configuration("language cannot be empty".to_string()));
        }
        if let Some(dir) = self.profile_dirs.iter().find(|d| d.as_os_str().is_empty()) {
            return Err(XapiError::Configuration(format!(
                "empty profile directory entry {:?}",
                dir
            )));
        }
        Ok(())
    }
}
