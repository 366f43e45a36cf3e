use std::path::{Path, PathBuf};

use color_eyre::eyre::{Result, bail};
use log::debug;
use marklite_config::Config;
use walkdir::WalkDir;

/// Collect the Markdown files to process.
///
/// Directories are walked recursively and filtered by the configured
/// extensions. Files named explicitly are kept whatever their extension. With
/// no paths, the configured input directory (or the current directory) is
/// walked.
///
/// # Errors
///
/// Returns an error if a path does not exist.
pub fn collect_markdown_files(
  paths: &[PathBuf],
  config: &Config,
) -> Result<Vec<PathBuf>> {
  let default_root = config
    .input_dir
    .clone()
    .unwrap_or_else(|| PathBuf::from("."));
  let roots = if paths.is_empty() {
    std::slice::from_ref(&default_root)
  } else {
    paths
  };

  let mut files = Vec::new();
  for root in roots {
    if root.is_file() {
      files.push(root.clone());
    } else if root.is_dir() {
      files.extend(walk(root, config));
    } else {
      bail!("Path does not exist: {}", root.display());
    }
  }

  files.sort();
  files.dedup();
  debug!("Collected {} Markdown files", files.len());
  Ok(files)
}

fn walk(root: &Path, config: &Config) -> Vec<PathBuf> {
  WalkDir::new(root)
    .follow_links(true)
    .into_iter()
    .filter_map(|entry| {
      entry
        .map_err(|e| debug!("Skipping unreadable entry: {e}"))
        .ok()
    })
    .filter(|entry| entry.file_type().is_file())
    .map(walkdir::DirEntry::into_path)
    .filter(|path| config.is_markdown(path))
    .collect()
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Fine in tests")]
  use std::fs;

  use tempfile::TempDir;

  use super::*;

  fn tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("guide/nested")).unwrap();
    for name in [
      "index.md",
      "guide/intro.markdown",
      "guide/nested/deep.md",
      "guide/code.cs",
      "notes.txt",
    ] {
      fs::write(dir.path().join(name), "# Title\n").unwrap();
    }
    dir
  }

  fn relative(dir: &TempDir, files: &[PathBuf]) -> Vec<String> {
    files
      .iter()
      .map(|f| {
        f.strip_prefix(dir.path())
          .unwrap()
          .to_string_lossy()
          .replace('\\', "/")
      })
      .collect()
  }

  #[test]
  fn test_walks_directories_by_extension() {
    let dir = tree();
    let files =
      collect_markdown_files(&[dir.path().to_path_buf()], &Config::default())
        .unwrap();
    assert_eq!(relative(&dir, &files), [
      "guide/intro.markdown",
      "guide/nested/deep.md",
      "index.md"
    ]);
  }

  #[test]
  fn test_explicit_files_and_input_dir() {
    let dir = tree();
    let explicit = dir.path().join("notes.txt");
    let files = collect_markdown_files(
      &[explicit.clone(), explicit.clone()],
      &Config::default(),
    )
    .unwrap();
    assert_eq!(files, [explicit]);

    let config = Config {
      input_dir: Some(dir.path().join("guide")),
      extensions: vec!["cs".to_owned()],
      ..Default::default()
    };
    let files = collect_markdown_files(&[], &config).unwrap();
    assert_eq!(relative(&dir, &files), ["guide/code.cs"]);
  }

  #[test]
  fn test_missing_path() {
    let dir = tree();
    let missing = dir.path().join("missing");
    let err = collect_markdown_files(&[missing], &Config::default()).unwrap_err();
    assert!(err.to_string().contains("Path does not exist"));
  }
}
