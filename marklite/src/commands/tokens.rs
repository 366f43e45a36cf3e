use std::{fs, io::Write, path::Path};

use color_eyre::eyre::{Context, Result};
use marklite_config::Config;

/// Write the processed document for `file` as JSON: its final token tree,
/// link definitions and diagnostics.
///
/// # Errors
///
/// Returns an error if the file cannot be read or processed.
pub fn run<W: Write>(
  config: &Config,
  file: &Path,
  pretty: bool,
  out: &mut W,
) -> Result<()> {
  let source = fs::read_to_string(file)
    .wrap_err_with(|| format!("Failed to read {}", file.display()))?;
  let name = file.display().to_string();

  let document = config
    .build_pipeline()?
    .process(&source, Some(&name))
    .wrap_err_with(|| format!("Failed to process {name}"))?;

  let json = if pretty {
    serde_json::to_string_pretty(&document)?
  } else {
    serde_json::to_string(&document)?
  };
  writeln!(out, "{json}")?;
  Ok(())
}
