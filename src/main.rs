// src/main.rs

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::CookOptions;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::List { long } => commands::cmd_list(&cli.repo, long),
        Commands::Info { package } => commands::cmd_info(&cli.repo, &package),
        Commands::Validate => commands::cmd_validate(&cli.repo),
        Commands::Deps {
            package,
            selection,
            reverse,
        } => commands::cmd_deps(&cli.repo, &package, &selection, reverse),
        Commands::Cook {
            package,
            prefix,
            source,
            selection,
            deps,
            tests,
            jobs,
            scratch,
            keep_builddir,
            dry_run,
        } => commands::cmd_cook(
            &cli.repo,
            &package,
            CookOptions {
                prefix,
                source,
                selection,
                deps,
                tests,
                jobs,
                scratch,
                keep_builddir,
                dry_run,
            },
        ),
    }
}
