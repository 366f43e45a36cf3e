use std::{
  fs,
  path::{Path, PathBuf},
  sync::{Arc, OnceLock},
};

use marklite_engine::{
  LexerOptions,
  Pipeline,
  Severity,
  Validator,
  snippet::LanguageRegistry,
  validate::{self, HeadingValidator, TagValidator},
};
use marklite_macros::Configurable;
use serde::{Deserialize, Serialize};

use crate::{
  error::ConfigError,
  sections::{DialectConfig, SnippetConfig, ValidationConfig},
};

/// Extensions treated as Markdown when none are configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &["md", "markdown"];

/// Configuration for marklite.
///
/// Usually loaded from a TOML or JSON file, then adjusted with
/// `--config KEY=VALUE` overrides from the command line.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Configurable)]
#[serde(default)]
pub struct Config {
  /// Directory searched for Markdown files when no paths are given.
  #[config(key = "input_dir", allow_empty)]
  pub input_dir: Option<PathBuf>,

  /// Worker threads for batch processing.
  #[config(allow_empty)]
  pub jobs: Option<usize>,

  /// Markdown file extensions, without the dot.
  pub extensions: Vec<String>,

  /// Dialect switches.
  #[config(nested)]
  pub dialect: Option<DialectConfig>,

  /// Validators to run.
  #[config(nested)]
  pub validation: Option<ValidationConfig>,

  /// Snippet languages.
  #[config(nested)]
  pub snippet: Option<SnippetConfig>,
}

impl Config {
  /// Load configuration from a file (TOML or JSON).
  ///
  /// # Errors
  ///
  /// Returns an error if the file cannot be read or parsed, or if the format is
  /// unsupported.
  pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
      ConfigError::Config(format!(
        "Failed to read config file: {}: {}",
        path.display(),
        e
      ))
    })?;

    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
      return Err(ConfigError::Config(format!(
        "Config file has no extension: {}",
        path.display()
      )));
    };

    match ext.to_lowercase().as_str() {
      "json" => {
        serde_json::from_str(&content).map_err(|e| {
          ConfigError::Config(format!(
            "Failed to parse JSON config from {}: {}",
            path.display(),
            e
          ))
        })
      },
      "toml" => {
        toml::from_str(&content).map_err(|e| {
          ConfigError::Config(format!(
            "Failed to parse TOML config from {}: {}",
            path.display(),
            e
          ))
        })
      },
      _ => {
        Err(ConfigError::Config(format!(
          "Unsupported config file format: {}",
          path.display()
        )))
      },
    }
  }

  /// Load configuration from the given files, or a discovered one, then
  /// apply overrides and validate the result.
  ///
  /// Files are merged in order, so later files win.
  ///
  /// # Errors
  ///
  /// Returns an error if a file cannot be loaded, an override is invalid or
  /// the merged configuration does not validate.
  pub fn load(
    config_files: &[PathBuf],
    config_overrides: &[String],
  ) -> Result<Self, ConfigError> {
    let mut config = if let Some((first, rest)) = config_files.split_first() {
      let mut merged = Self::from_file(first).map_err(|e| {
        ConfigError::Config(format!(
          "Failed to load config from {}: {}",
          first.display(),
          e
        ))
      })?;

      for config_path in rest {
        let additional = Self::from_file(config_path).map_err(|e| {
          ConfigError::Config(format!(
            "Failed to load config from {}: {}",
            config_path.display(),
            e
          ))
        })?;
        merged.merge(additional);
      }

      if config_files.len() > 1 {
        log::info!("Loaded and merged {} config files", config_files.len());
      }

      merged
    } else if let Some(discovered) = Self::find_config_file() {
      log::info!("Using discovered config file: {}", discovered.display());
      Self::from_file(&discovered).map_err(|e| {
        ConfigError::Config(format!(
          "Failed to load discovered config from {}: {}",
          discovered.display(),
          e
        ))
      })?
    } else {
      Self::default()
    };

    if !config_overrides.is_empty() {
      config.apply_overrides(config_overrides)?;
    }

    config.validate()?;
    Ok(config)
  }

  /// Apply configuration overrides from KEY=VALUE strings.
  ///
  /// Keys of nested sections are dotted, e.g. `dialect.gfm=false`.
  ///
  /// # Errors
  ///
  /// Returns an error if:
  ///
  /// - An override string is not in KEY=VALUE format
  /// - A key is not recognized
  /// - A value cannot be parsed as the expected type
  pub fn apply_overrides(
    &mut self,
    overrides: &[String],
  ) -> Result<(), ConfigError> {
    for override_str in overrides {
      let (key, value) = override_str.split_once('=').ok_or_else(|| {
        ConfigError::Config(format!(
          "Invalid config override format: '{override_str}'. Expected \
           KEY=VALUE"
        ))
      })?;

      self.apply_override(key.trim(), value.trim())?;
    }

    Ok(())
  }

  /// Merge another config into this one, with the other config's values taking
  /// precedence.
  ///
  /// # Merge Rules
  ///
  /// - [`Option<T>`] fields: Other's [`Some`] value replaces this config's
  ///   value
  /// - [`Vec<T>`] fields: Other's vec is appended to this config's vec
  /// - Sections present in both are merged field by field
  pub fn merge(&mut self, other: Self) {
    self.merge_fields(other);
    self.extensions.dedup();
  }

  /// Search for config files in common locations
  #[must_use]
  pub fn find_config_file() -> Option<PathBuf> {
    static RESULT: OnceLock<Option<PathBuf>> = OnceLock::new();
    RESULT
      .get_or_init(|| {
        let config_filenames = [
          "marklite.toml",
          "marklite.json",
          ".marklite.toml",
          ".marklite.json",
          ".config/marklite.toml",
        ];

        let current_dir = std::env::current_dir().ok()?;
        if let Some(found) = first_existing(&current_dir, &config_filenames) {
          return Some(found);
        }

        if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME")
          && let Some(found) =
            first_existing(Path::new(&xdg_config_home), &["marklite.toml"])
        {
          return Some(found);
        }

        if let Ok(home) = std::env::var("HOME") {
          let home_config_dir =
            PathBuf::from(home).join(".config").join("marklite");
          return first_existing(&home_config_dir, &["config.toml"]);
        }

        None
      })
      .clone()
  }

  /// Check values that deserialize fine but cannot be used.
  ///
  /// # Errors
  ///
  /// Returns an error for zero jobs, an empty extension, a tag rule without
  /// tags or a snippet language whose patterns do not compile.
  pub fn validate(&self) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if self.jobs == Some(0) {
      errors.push("jobs must be at least 1".to_owned());
    }

    if self.extensions.iter().any(|ext| normalize(ext).is_empty()) {
      errors.push("extensions must not contain empty entries".to_owned());
    }

    if let Some(validation) = &self.validation
      && let Err(e) = validation.validate()
    {
      errors.push(e.to_string());
    }

    if let Some(snippet) = &self.snippet {
      for language in &snippet.languages {
        if let Err(e) = language.to_language() {
          errors.push(e.to_string());
        }
      }
    }

    if errors.is_empty() {
      Ok(())
    } else {
      Err(ConfigError::Config(errors.join("\n")))
    }
  }

  /// Lexer options for the configured dialect.
  #[must_use]
  pub fn to_engine_options(&self) -> LexerOptions {
    self
      .dialect
      .as_ref()
      .map_or_else(LexerOptions::dfm, LexerOptions::from)
  }

  /// The configured validators, combined into one.
  #[must_use]
  pub fn build_validator(&self) -> Arc<dyn Validator> {
    let validation = self.validation.clone().unwrap_or_default();
    let mut validators: Vec<Arc<dyn Validator>> = Vec::new();
    if validation.headings {
      validators.push(Arc::new(HeadingValidator::default()));
    }
    if !validation.tags.is_empty() {
      validators.push(Arc::new(TagValidator::new(validation.tags)));
    }
    validate::combine(validators)
  }

  /// A pipeline for the configured dialect and validators.
  ///
  /// # Errors
  ///
  /// Returns an error if the rule table cannot be built.
  pub fn build_pipeline(&self) -> Result<Pipeline, ConfigError> {
    Ok(
      Pipeline::builder()
        .options(self.to_engine_options())
        .validator(self.build_validator())
        .build()?,
    )
  }

  /// Built-in snippet languages plus the configured ones, which take over
  /// the extensions they list.
  ///
  /// # Errors
  ///
  /// Returns an error if a configured language does not compile.
  pub fn language_registry(&self) -> Result<LanguageRegistry, ConfigError> {
    let mut registry = LanguageRegistry::builtin();
    if let Some(snippet) = &self.snippet {
      for language in &snippet.languages {
        registry.register(language.to_language()?);
      }
    }
    Ok(registry)
  }

  /// Extension to fall back to for unknown code files.
  #[must_use]
  pub fn fallback_language(&self) -> Option<&str> {
    self
      .snippet
      .as_ref()
      .and_then(|snippet| snippet.fallback_language.as_deref())
  }

  /// Lowest severity that fails a check.
  #[must_use]
  pub fn failure_threshold(&self) -> Severity {
    if self
      .validation
      .as_ref()
      .is_some_and(|validation| validation.fail_on_warning)
    {
      Severity::Warning
    } else {
      Severity::Error
    }
  }

  /// Configured Markdown extensions, or the defaults when none are set.
  #[must_use]
  pub fn markdown_extensions(&self) -> Vec<String> {
    if self.extensions.is_empty() {
      DEFAULT_EXTENSIONS.iter().map(|ext| (*ext).to_owned()).collect()
    } else {
      self.extensions.iter().map(|ext| normalize(ext)).collect()
    }
  }

  /// Whether `path` has one of the Markdown extensions.
  #[must_use]
  pub fn is_markdown(&self, path: &Path) -> bool {
    path
      .extension()
      .and_then(|ext| ext.to_str())
      .is_some_and(|ext| {
        let ext = normalize(ext);
        self.markdown_extensions().contains(&ext)
      })
  }

  /// Generate a default configuration file with commented explanations
  ///
  /// # Errors
  ///
  /// Returns an error if the template cannot be retrieved or the file cannot be
  /// written.
  pub fn generate_default_config(
    format: &str,
    path: &Path,
  ) -> Result<(), ConfigError> {
    let config_content = crate::templates::get_template(format)
      .map_err(|e| ConfigError::Template(e.to_string()))?;

    fs::write(path, config_content).map_err(|e| {
      ConfigError::Config(format!(
        "Failed to write default config to {}: {}",
        path.display(),
        e
      ))
    })?;

    log::info!("Created default configuration file: {}", path.display());
    Ok(())
  }
}

fn normalize(ext: &str) -> String {
  ext.trim().trim_start_matches('.').to_lowercase()
}

fn first_existing(dir: &Path, names: &[&str]) -> Option<PathBuf> {
  names
    .iter()
    .map(|name| dir.join(name))
    .find(|path| path.exists())
}

#[cfg(test)]
mod tests {
  #![allow(
    clippy::unwrap_used,
    clippy::field_reassign_with_default,
    reason = "Fine in tests"
  )]

  use marklite_engine::validate::TagRule;

  use super::*;
  use crate::sections::LanguageConfig;

  fn overrides(pairs: &[&str]) -> Vec<String> {
    pairs.iter().map(|pair| (*pair).to_owned()).collect()
  }

  #[test]
  fn test_merge_option_fields() {
    let mut base = Config::default();
    base.input_dir = Some(PathBuf::from("base-docs"));
    base.jobs = None;

    let mut later = Config::default();
    later.input_dir = None;
    later.jobs = Some(2);

    base.merge(later);

    assert_eq!(base.input_dir, Some(PathBuf::from("base-docs")));
    assert_eq!(base.jobs, Some(2));
  }

  #[test]
  fn test_merge_vec_fields_append() {
    let mut base = Config::default();
    base.extensions = vec!["md".to_owned()];
    let mut later = Config::default();
    later.extensions = vec!["mdx".to_owned()];

    base.merge(later);

    assert_eq!(base.extensions, ["md", "mdx"]);
  }

  #[test]
  fn test_merge_sections() {
    let mut base = Config::default();
    base.validation = Some(ValidationConfig {
      tags: vec![TagRule::new(["script"])],
      ..Default::default()
    });

    let mut later = Config::default();
    later.validation = Some(ValidationConfig {
      fail_on_warning: true,
      tags: vec![TagRule::new(["iframe"])],
      ..Default::default()
    });
    later.dialect = Some(DialectConfig {
      dfm: false,
      ..Default::default()
    });

    base.merge(later);

    let validation = base.validation.as_ref().unwrap();
    assert!(validation.fail_on_warning);
    assert_eq!(validation.tags.len(), 2);
    assert!(!base.to_engine_options().dfm);
  }

  #[test]
  fn test_apply_overrides() {
    let mut config = Config::default();
    config
      .apply_overrides(&overrides(&[
        "jobs=4",
        "input_dir = docs",
        "extensions=md, mdx",
        "dialect.gfm=false",
        "validation.fail_on_warning=on",
        "snippet.fallback_language=cs",
      ]))
      .unwrap();

    assert_eq!(config.jobs, Some(4));
    assert_eq!(config.input_dir, Some(PathBuf::from("docs")));
    assert_eq!(config.markdown_extensions(), ["md", "mdx"]);
    assert!(!config.dialect.as_ref().unwrap().gfm);
    assert!(config.dialect.as_ref().unwrap().dfm);
    assert_eq!(config.failure_threshold(), Severity::Warning);
    assert_eq!(config.fallback_language(), Some("cs"));
  }

  #[test]
  fn test_apply_overrides_empty_resets_option() {
    let mut config = Config::default();
    config.jobs = Some(8);
    config.input_dir = Some(PathBuf::from("docs"));
    config
      .apply_overrides(&overrides(&["jobs=", "input_dir="]))
      .unwrap();
    assert_eq!(config.jobs, None);
    assert_eq!(config.input_dir, None);
  }

  #[test]
  fn test_apply_overrides_invalid_format() {
    let mut config = Config::default();
    let err = config.apply_overrides(&overrides(&["jobs"])).unwrap_err();
    assert!(err.to_string().contains("Expected KEY=VALUE"));
  }

  #[test]
  fn test_apply_overrides_unknown_key() {
    let mut config = Config::default();
    let err = config
      .apply_overrides(&overrides(&["title=Docs"]))
      .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("Unknown configuration key: 'title'"));
    assert!(message.contains("dialect.gfm"));

    let err = config
      .apply_overrides(&overrides(&["validation.tags=script"]))
      .unwrap_err();
    assert!(err.to_string().contains("Unknown configuration key"));
  }

  #[test]
  fn test_apply_overrides_invalid_values() {
    let mut config = Config::default();
    let err = config
      .apply_overrides(&overrides(&["jobs=many"]))
      .unwrap_err();
    assert!(err.to_string().contains("Invalid value for 'jobs'"));

    let err = config
      .apply_overrides(&overrides(&["validation.headings=maybe"]))
      .unwrap_err();
    assert!(err.to_string().contains("Invalid boolean value"));
  }

  #[test]
  fn test_config_keys() {
    let keys = Config::config_keys();
    for key in [
      "input_dir",
      "jobs",
      "extensions",
      "dialect.dfm",
      "validation.headings",
      "validation.fail_on_warning",
      "snippet.fallback_language",
    ] {
      assert!(keys.iter().any(|k| k == key), "missing {key}");
    }
    assert!(!keys.iter().any(|k| k == "validation.tags"));
  }

  #[test]
  fn test_validate() {
    let mut config = Config::default();
    config.validate().unwrap();

    config.jobs = Some(0);
    config.extensions = vec![" . ".to_owned()];
    config.snippet = Some(SnippetConfig {
      fallback_language: None,
      languages:         vec![LanguageConfig {
        name:       "bad".to_owned(),
        extensions: vec!["bad".to_owned()],
        start:      "(".to_owned(),
        end:        "x".to_owned(),
      }],
    });

    let message = config.validate().unwrap_err().to_string();
    assert!(message.contains("jobs"));
    assert!(message.contains("extensions"));
    assert!(message.contains("'bad'"));
  }

  #[test]
  fn test_engine_options_default_to_dfm() {
    assert_eq!(Config::default().to_engine_options(), LexerOptions::dfm());
    assert_eq!(Config::default().failure_threshold(), Severity::Error);
  }

  #[test]
  fn test_build_validator() {
    let config = Config::default();
    let pipeline = config.build_pipeline().unwrap();
    let document = pipeline.process("# One\n\n# Two\n", None).unwrap();
    assert_eq!(document.diagnostics.len(), 1);

    let mut config = Config::default();
    config.validation = Some(ValidationConfig {
      headings: false,
      ..Default::default()
    });
    assert!(config.build_validator().is_null());
  }

  #[test]
  fn test_language_registry() {
    let mut config = Config::default();
    config.snippet = Some(SnippetConfig {
      fallback_language: None,
      languages:         vec![LanguageConfig {
        name:       "custom-python".to_owned(),
        extensions: vec!["py".to_owned()],
        start:      r"^\s*##\s*begin\s+(?P<name>\w+)$".to_owned(),
        end:        r"^\s*##\s*end\s+(?P<name>\w+)$".to_owned(),
      }],
    });
    let registry = config.language_registry().unwrap();
    assert_eq!(registry.for_extension("py").unwrap().name(), "custom-python");
    assert_eq!(registry.for_extension("cs").unwrap().name(), "csharp");
  }

  #[test]
  fn test_is_markdown() {
    let mut config = Config::default();
    assert!(config.is_markdown(Path::new("docs/index.MD")));
    assert!(!config.is_markdown(Path::new("docs/index.mdx")));
    config.extensions = vec![".mdx".to_owned()];
    assert!(config.is_markdown(Path::new("docs/index.mdx")));
    assert!(!config.is_markdown(Path::new("README")));
  }
}
