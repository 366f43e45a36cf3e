use std::{
  fs,
  io::Write,
  path::{Path, PathBuf},
};

use color_eyre::eyre::{Context, Result};
use log::{info, warn};
use marklite_config::Config;
use marklite_engine::{Pipeline, ProcessedDocument, Severity};
use rayon::prelude::*;

use crate::files::collect_markdown_files;

/// Totals of one `check` run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckSummary {
  pub documents: usize,
  pub errors:    usize,
  pub warnings:  usize,
  /// Whether any document reached the configured failure threshold.
  pub failed:    bool,
}

/// Process every Markdown file under `paths` in parallel and write its
/// diagnostics to `out`, one per line, in file order.
///
/// # Errors
///
/// Returns an error if the files cannot be collected, the pipeline cannot be
/// built or `out` cannot be written. Problems inside a document are reported
/// as diagnostics instead.
pub fn run<W: Write>(
  config: &Config,
  paths: &[PathBuf],
  out: &mut W,
) -> Result<CheckSummary> {
  let files = collect_markdown_files(paths, config)?;
  let pipeline = config
    .build_pipeline()
    .wrap_err("Failed to build the Markdown pipeline")?;

  info!("Checking {} Markdown files...", files.len());
  let documents: Vec<ProcessedDocument> = files
    .par_iter()
    .map(|path| check_file(&pipeline, path))
    .collect();

  let threshold = config.failure_threshold();
  let mut summary = CheckSummary {
    documents: documents.len(),
    ..CheckSummary::default()
  };

  for document in &documents {
    for diagnostic in &document.diagnostics {
      writeln!(out, "{diagnostic}")?;
      match diagnostic.severity {
        Severity::Error => summary.errors += 1,
        Severity::Warning => summary.warnings += 1,
        Severity::Info => {},
      }
    }
    summary.failed |= document.has_severity(threshold);
  }

  info!(
    "Checked {} documents: {} errors, {} warnings",
    summary.documents, summary.errors, summary.warnings
  );
  Ok(summary)
}

fn check_file(pipeline: &Pipeline, path: &Path) -> ProcessedDocument {
  let name = path.display().to_string();
  match fs::read_to_string(path) {
    Ok(source) => pipeline.process_with_recovery(&source, Some(&name)),
    Err(e) => {
      warn!("Failed to read {name}: {e}");
      ProcessedDocument::failed(Some(&name), format!("Failed to read file: {e}"))
    },
  }
}
