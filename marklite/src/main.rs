use std::io::{self, Write};

use color_eyre::eyre::{Result, bail};
use log::LevelFilter;
use marklite::{
  cli::{Cli, Commands},
  commands::{self, snippet::SnippetRequest},
};
use marklite_config::Config;

fn main() -> Result<()> {
  color_eyre::install()?;

  let cli = Cli::parse_args();

  env_logger::Builder::new()
    .filter_level(if cli.verbose {
      LevelFilter::Debug
    } else {
      LevelFilter::Info
    })
    .write_style(env_logger::WriteStyle::Always)
    .init();

  // Init must not require a loadable config
  if let Commands::Init {
    output,
    format,
    force,
  } = &cli.command
  {
    return commands::init::run(output, format, *force);
  }

  let config = Config::load(&cli.config_files, &cli.config_overrides)?;

  let thread_count = config.jobs.unwrap_or_else(num_cpus::get);
  rayon::ThreadPoolBuilder::new()
    .num_threads(thread_count)
    .build_global()?;

  let mut out = io::stdout().lock();
  match &cli.command {
    Commands::Check { paths } => {
      let summary = commands::check::run(&config, paths, &mut out)?;
      out.flush()?;
      if summary.failed {
        bail!(
          "Check failed: {} errors, {} warnings in {} documents",
          summary.errors,
          summary.warnings,
          summary.documents
        );
      }
    },
    Commands::Tokens { file, pretty } => {
      commands::tokens::run(&config, file, *pretty, &mut out)?;
    },
    Commands::Snippet {
      file,
      tag,
      query,
      lang,
    } => {
      commands::snippet::run(
        &config,
        file,
        SnippetRequest {
          tag:   tag.as_deref(),
          query: query.as_deref(),
          lang:  lang.as_deref(),
        },
        &mut out,
      )?;
    },
    Commands::Init { .. } => {},
  }

  out.flush()?;
  Ok(())
}
