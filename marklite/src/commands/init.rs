use std::{fs, path::Path};

use color_eyre::eyre::{Context, Result, bail};
use log::info;
use marklite_config::Config;

/// Write a default configuration file to `output`.
///
/// # Errors
///
/// Returns an error if the file exists and `force` is not set, or if it
/// cannot be written.
pub fn run(output: &Path, format: &str, force: bool) -> Result<()> {
  if output.exists() && !force {
    bail!(
      "Configuration file already exists: {}. Use --force to overwrite.",
      output.display()
    );
  }

  if let Some(parent) = output.parent()
    && !parent.as_os_str().is_empty()
    && !parent.exists()
  {
    fs::create_dir_all(parent).wrap_err_with(|| {
      format!("Failed to create directory: {}", parent.display())
    })?;
    info!("Created directory: {}", parent.display());
  }

  Config::generate_default_config(format, output).wrap_err_with(|| {
    format!("Failed to generate configuration file: {}", output.display())
  })?;

  info!(
    "Configuration file created successfully. Edit it to customize how your \
     documents are checked."
  );
  Ok(())
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Fine in tests")]
  use tempfile::TempDir;

  use super::*;

  #[test]
  fn test_init_refuses_to_overwrite() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("nested/dir/marklite.json");

    run(&output, "json", false).unwrap();
    Config::from_file(&output).unwrap();

    let err = run(&output, "json", false).unwrap_err();
    assert!(err.to_string().contains("--force"));

    run(&output, "json", true).unwrap();
  }
}
