use std::{fs, io::Write, path::Path};

use color_eyre::eyre::{Context, Result, bail};
use log::debug;
use marklite_config::Config;
use marklite_engine::snippet::{
  Language,
  LineSelector,
  SnippetQuery,
  extract,
  resolve_tags,
};

/// What the `snippet` command should print.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnippetRequest<'a> {
  /// Extract the region of this tag.
  pub tag:   Option<&'a str>,
  /// Extract with a reference suffix such as `#L3-L7`.
  pub query: Option<&'a str>,
  /// Language extension overriding the file's own.
  pub lang:  Option<&'a str>,
}

/// Print the tags of `file` and where they resolve to, or, given a tag or a
/// query, the extracted lines.
///
/// # Errors
///
/// Returns an error if the file cannot be read, no language applies when one
/// is needed, the query is invalid or extraction fails.
pub fn run<W: Write>(
  config: &Config,
  file: &Path,
  request: SnippetRequest<'_>,
  out: &mut W,
) -> Result<()> {
  let source = fs::read_to_string(file)
    .wrap_err_with(|| format!("Failed to read {}", file.display()))?;
  let lines: Vec<&str> = source.lines().collect();

  let registry = config.language_registry()?;
  let language = match request.lang {
    Some(ext) => {
      let Some(language) = registry.for_extension(ext) else {
        bail!("Unknown snippet language: {ext}");
      };
      Some(language)
    },
    None => {
      registry.for_path(file).or_else(|| {
        config
          .fallback_language()
          .and_then(|ext| registry.for_extension(ext))
      })
    },
  };
  debug!(
    "Snippet language for {}: {}",
    file.display(),
    language.map_or("none", Language::name)
  );

  let query = match (request.tag, request.query) {
    (Some(tag), _) => {
      SnippetQuery {
        selector: LineSelector::Tag(tag.to_owned()),
        ..SnippetQuery::default()
      }
    },
    (None, Some(query)) => query.parse::<SnippetQuery>()?,
    (None, None) => return list_tags(&lines, file, language, out),
  };

  let snippet = extract(&lines, &query, language)
    .wrap_err_with(|| format!("Failed to extract snippet from {}", file.display()))?;
  writeln!(out, "{}", snippet.text())?;
  Ok(())
}

fn list_tags<W: Write>(
  lines: &[&str],
  file: &Path,
  language: Option<&Language>,
  out: &mut W,
) -> Result<()> {
  let Some(language) = language else {
    bail!(
      "No snippet language for {}. Pass --lang to choose one.",
      file.display()
    );
  };

  for resolution in resolve_tags(lines, language.patterns()).values() {
    match (resolution.success, resolution.start_line, resolution.end_line) {
      (true, Some(start), Some(end)) => {
        writeln!(out, "{}: lines {start}-{end}", resolution.name)?;
      },
      _ => {
        writeln!(
          out,
          "{}: {}",
          resolution.name,
          resolution.error.as_deref().unwrap_or("unresolved")
        )?;
      },
    }
  }
  Ok(())
}
