// src/cli/mod.rs
//! CLI definitions for the pantry tool
//!
//! This module contains the command-line interface definitions using clap.
//! The command implementations live in the `commands` module.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pantry")]
#[command(author = "Pantry Contributors")]
#[command(version)]
#[command(about = "Package recipes for building scientific software from source", long_about = None)]
pub struct Cli {
    /// Repository root (the directory holding repo.toml)
    #[arg(short, long, global = true, default_value = ".")]
    pub repo: PathBuf,

    /// Show debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Version and variant selection shared by `deps` and `cook`
#[derive(Args, Debug, Clone, Default)]
pub struct Selection {
    /// Version to use (default: the preferred version)
    #[arg(long = "version", value_name = "VERSION")]
    pub version: Option<String>,

    /// Variant setting: +name, ~name or name=value (repeatable)
    #[arg(long = "variant", value_name = "SETTING", allow_hyphen_values = true)]
    pub variants: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List all recipes in the repository
    List {
        /// Also show the preferred version and description
        #[arg(short, long)]
        long: bool,
    },

    /// Show the versions, variants and dependencies of a recipe
    Info {
        /// Package name
        package: String,
    },

    /// Load the repository and report every validation problem
    Validate,

    /// Show the dependencies active for one version and variant setting
    Deps {
        /// Package name
        package: String,

        #[command(flatten)]
        selection: Selection,

        /// List recipes that depend on this package instead
        #[arg(long)]
        reverse: bool,
    },

    /// Build a recipe into an installation prefix
    Cook {
        /// Package name
        package: String,

        /// Installation prefix
        #[arg(long)]
        prefix: PathBuf,

        /// Unpacked source tree
        #[arg(long)]
        source: PathBuf,

        #[command(flatten)]
        selection: Selection,

        /// Installed dependency: name=path (repeatable)
        #[arg(long = "dep", value_name = "NAME=PATH")]
        deps: Vec<String>,

        /// Run the check phase
        #[arg(long)]
        tests: bool,

        /// Number of parallel build jobs
        #[arg(short, long)]
        jobs: Option<u32>,

        /// Directory for scratch build trees (default: system temp)
        #[arg(long)]
        scratch: Option<PathBuf>,

        /// Keep the scratch build tree after the build
        #[arg(long)]
        keep_builddir: bool,

        /// Check the context and print the configure arguments without building
        #[arg(long)]
        dry_run: bool,
    },
}
