use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
  #[error("Unsupported format: {0}")]
  UnsupportedFormat(String),
}

/// Default configuration template in TOML format, with every option
/// explained.
pub const DEFAULT_TOML_TEMPLATE: &str = r#"# marklite configuration file

# Directory searched by `marklite check` when no paths are given
input_dir = "docs"

# Number of worker threads (defaults to the number of CPUs)
# jobs = 4

# File extensions treated as Markdown (defaults to "md" and "markdown")
extensions = ["md", "markdown"]

# Markdown dialect. Without this section the full DocFX dialect is used.
[dialect]
# GitHub flavored extensions: fenced code, strike-through, bare URLs
gfm = true

# Pipe tables (turns on gfm)
tables = true

# Every newline inside a paragraph becomes a hard break (turns on gfm)
breaks = false

# Stricter emphasis and list handling
pedantic = false

# DocFX extensions: YAML header, notes, includes, code snippets and xrefs
# (turns on gfm and tables)
dfm = true

[validation]
# Warn about more than one level-1 heading and about skipped heading levels
headings = true

# Fail `marklite check` on warnings, not only on errors
fail_on_warning = false

# HTML tags to report. `{0}` in the message is replaced by the tag name.
# [[validation.tags]]
# tags = ["script", "iframe"]
# opening_only = true
# severity = "error"
# message = "Html tag {0} is not allowed"

[snippet]
# Language used for code files whose extension no language claims
# fallback_language = "cs"

# Extra snippet languages. Both patterns need a `name` capture group.
# [[snippet.languages]]
# name = "lisp"
# extensions = ["lisp", "el"]
# start = '^\s*;+\s*<(?P<name>[\w.\-]+)>\s*$'
# end = '^\s*;+\s*</(?P<name>[\w.\-]+)>\s*$'
"#;

/// Default configuration template in JSON format.
pub const DEFAULT_JSON_TEMPLATE: &str = r#"{
  "input_dir": "docs",
  "extensions": ["md", "markdown"],
  "dialect": {
    "gfm": true,
    "tables": true,
    "breaks": false,
    "pedantic": false,
    "dfm": true
  },
  "validation": {
    "headings": true,
    "fail_on_warning": false,
    "tags": [
      {
        "tags": ["script", "iframe"],
        "opening_only": true,
        "severity": "error",
        "message": "Html tag {0} is not allowed"
      }
    ]
  },
  "snippet": {
    "languages": []
  }
}
"#;

/// Get the correct configuration template based on the requested format.
///
/// # Errors
///
/// Returns an error if the requested format is not supported.
pub fn get_template(format: &str) -> Result<&'static str, TemplateError> {
  match format.to_lowercase().as_str() {
    "toml" => Ok(DEFAULT_TOML_TEMPLATE),
    "json" => Ok(DEFAULT_JSON_TEMPLATE),
    _ => Err(TemplateError::UnsupportedFormat(format.to_string())),
  }
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Fine in tests")]
  use super::*;
  use crate::Config;

  #[test]
  fn test_templates_parse() {
    let from_toml: Config = toml::from_str(DEFAULT_TOML_TEMPLATE).unwrap();
    let from_json: Config = serde_json::from_str(DEFAULT_JSON_TEMPLATE).unwrap();

    for config in [&from_toml, &from_json] {
      config.validate().unwrap();
      assert_eq!(config.markdown_extensions(), ["md", "markdown"]);
      assert!(config.dialect.as_ref().unwrap().dfm);
    }
    assert!(from_toml.validation.as_ref().unwrap().tags.is_empty());
    assert_eq!(from_json.validation.as_ref().unwrap().tags.len(), 1);
  }

  #[test]
  fn test_unsupported_format() {
    assert!(get_template("TOML").is_ok());
    assert!(matches!(
      get_template("yaml"),
      Err(TemplateError::UnsupportedFormat(_))
    ));
  }
}
