//! Diagnostics collected while rewriting and validating a document.
use std::fmt;

use serde::{Deserialize, Serialize};

/// How serious a [`Diagnostic`] is.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  Info,
  Warning,
  Error,
}

impl fmt::Display for Severity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Info => "info",
      Self::Warning => "warning",
      Self::Error => "error",
    })
  }
}

/// A message attached to a source location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
  pub severity: Severity,
  pub message:  String,
  pub file:     Option<String>,
  pub line:     Option<usize>,
}

impl Diagnostic {
  #[must_use]
  pub fn new(severity: Severity, message: impl Into<String>) -> Self {
    Self {
      severity,
      message: message.into(),
      file: None,
      line: None,
    }
  }

  #[must_use]
  pub fn at(mut self, file: Option<&str>, line: usize) -> Self {
    self.file = file.map(str::to_owned);
    self.line = Some(line);
    self
  }
}

impl fmt::Display for Diagnostic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match (&self.file, self.line) {
      (Some(file), Some(line)) => write!(f, "{file}:{line}: ")?,
      (Some(file), None) => write!(f, "{file}: ")?,
      (None, Some(line)) => write!(f, "line {line}: ")?,
      (None, None) => {},
    }
    write!(f, "{}: {}", self.severity, self.message)
  }
}

/// Whether any diagnostic in `diagnostics` is at least `threshold`.
#[must_use]
pub fn has_severity(diagnostics: &[Diagnostic], threshold: Severity) -> bool {
  diagnostics.iter().any(|d| d.severity >= threshold)
}
