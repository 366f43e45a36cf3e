use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Command line interface for marklite
#[derive(Parser, Debug)]
#[command(
  author,
  version,
  about = "marklite: lint and inspect DocFX flavored Markdown"
)]
pub struct Cli {
  /// Subcommand to execute (see [`Commands`])
  #[command(subcommand)]
  pub command: Commands,

  /// Enable verbose debug logging
  #[arg(short, long, global = true)]
  pub verbose: bool,

  /// Path to configuration file(s) (TOML or JSON, can be specified multiple
  /// times) Multiple files are merged in order, with later files overriding
  /// earlier ones
  #[arg(
    short = 'c',
    long = "config-file",
    global = true,
    action = clap::ArgAction::Append
  )]
  pub config_files: Vec<PathBuf>,

  /// Override configuration values (KEY=VALUE format, can be used multiple
  /// times)
  #[arg(long = "config", global = true, action = clap::ArgAction::Append)]
  pub config_overrides: Vec<String>,
}

/// All supported subcommands for the marklite CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
  /// Initialize a new marklite configuration file
  Init {
    /// Path to create the configuration file at
    #[arg(short, long, default_value = "marklite.toml")]
    output: PathBuf,

    /// Format of the configuration file.
    #[arg(short = 'F', long, default_value = "toml", value_parser = ["toml", "json"])]
    format: String,

    /// Force overwrite if file already exists
    #[arg(short, long)]
    force: bool,
  },

  /// Lex and validate Markdown files, printing every diagnostic.
  Check {
    /// Files or directories to check. Defaults to the configured input
    /// directory, or the current directory.
    paths: Vec<PathBuf>,
  },

  /// Print the token tree of a Markdown file as JSON.
  Tokens {
    /// Markdown file to tokenize.
    file: PathBuf,

    /// Pretty-print the JSON output.
    #[arg(short, long)]
    pretty: bool,
  },

  /// Resolve snippet tags in a code file, or extract a snippet from it.
  Snippet {
    /// Code file to read.
    file: PathBuf,

    /// Extract the region between the markers of this tag.
    #[arg(short, long, conflicts_with = "query")]
    tag: Option<String>,

    /// Extract using a reference suffix such as `#L3-L7` or `?range=1-3,5-`.
    #[arg(short, long)]
    query: Option<String>,

    /// Language extension to use instead of the file's own.
    #[arg(short, long)]
    lang: Option<String>,
  },
}

impl Cli {
  /// Parse command line arguments
  #[must_use]
  pub fn parse_args() -> Self {
    Self::parse()
  }
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, clippy::panic, reason = "Fine in tests")]
  use clap::CommandFactory;

  use super::*;

  #[test]
  fn test_cli_is_consistent() {
    Cli::command().debug_assert();
  }

  #[test]
  fn test_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from([
      "marklite",
      "check",
      "docs",
      "-v",
      "--config",
      "jobs=2",
      "-c",
      "a.toml",
      "-c",
      "b.json",
    ])
    .unwrap();

    assert!(cli.verbose);
    assert_eq!(cli.config_overrides, ["jobs=2"]);
    assert_eq!(cli.config_files, [
      PathBuf::from("a.toml"),
      PathBuf::from("b.json")
    ]);
    let Commands::Check { paths } = cli.command else {
      panic!("Expected check command");
    };
    assert_eq!(paths, [PathBuf::from("docs")]);
  }

  #[test]
  fn test_snippet_tag_conflicts_with_query() {
    assert!(
      Cli::try_parse_from([
        "marklite", "snippet", "a.cs", "--tag", "x", "--query", "#L1",
      ])
      .is_err()
    );
  }

  #[test]
  fn test_init_defaults() {
    let cli = Cli::try_parse_from(["marklite", "init"]).unwrap();
    let Commands::Init {
      output,
      format,
      force,
    } = cli.command
    else {
      panic!("Expected init command");
    };
    assert_eq!(output, PathBuf::from("marklite.toml"));
    assert_eq!(format, "toml");
    assert!(!force);
    assert!(Cli::try_parse_from(["marklite", "init", "-F", "yaml"]).is_err());
  }
}
