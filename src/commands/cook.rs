// src/commands/cook.rs

//! Cook command - build one recipe into a prefix

use super::{open_repository, resolve_selection};
use crate::cli::Selection;
use anyhow::{Context, Result};
use pantry::{BuildContext, Error, Kitchen, KitchenConfig};
use std::path::{Path, PathBuf};
use tracing::info;

/// Options for `pantry cook`
pub struct CookOptions {
    pub prefix: PathBuf,
    pub source: PathBuf,
    pub selection: Selection,
    pub deps: Vec<String>,
    pub tests: bool,
    pub jobs: Option<u32>,
    pub scratch: Option<PathBuf>,
    pub keep_builddir: bool,
    pub dry_run: bool,
}

pub fn cmd_cook(repo: &Path, package: &str, options: CookOptions) -> Result<()> {
    let repository = open_repository(repo)?;
    let recipe = repository.get(package)?;
    let (version, variants) = resolve_selection(recipe, &options.selection)?;

    let source = options
        .source
        .canonicalize()
        .with_context(|| format!("Source tree not found: {}", options.source.display()))?;

    let mut context = BuildContext::new(version, absolute(&options.prefix)?, source)
        .with_variants(variants)
        .with_tests(options.tests);
    for dep in &options.deps {
        let (name, path) = dep
            .split_once('=')
            .with_context(|| format!("Expected --dep NAME=PATH, got '{}'", dep))?;
        context = context.with_dependency(name, absolute(Path::new(path))?);
    }

    println!(
        "Cooking {}@{} {}",
        recipe.name(),
        context.version,
        context.variants
    );

    if options.dry_run {
        recipe
            .check_context(&context)
            .with_context(|| format!("Context is not valid for {}", recipe.name()))?;
        let args = recipe
            .procedure()
            .configure_arguments(&context.condition_env())?;
        println!("Configure arguments:");
        for arg in args {
            println!("  {}", arg);
        }
        println!("[OK] Context is valid (dry run, nothing built)");
        return Ok(());
    }

    let mut config = KitchenConfig {
        keep_builddir: options.keep_builddir,
        ..Default::default()
    };
    if let Some(jobs) = options.jobs {
        config = config.with_jobs(jobs);
    }
    if let Some(scratch) = options.scratch {
        config = config.with_scratch_root(scratch);
    }

    let kitchen = Kitchen::new(config);
    let manifest = match kitchen.build(recipe, &context) {
        Ok(manifest) => manifest,
        Err(e @ Error::BuildFailure { .. }) => {
            let output = e.captured_output().unwrap_or_default();
            if !output.is_empty() {
                eprintln!("{}", output);
            }
            return Err(e).with_context(|| format!("Failed to build {}", recipe.name()));
        }
        Err(e) => return Err(e).with_context(|| format!("Failed to build {}", recipe.name())),
    };

    info!("Install manifest written for {}", manifest.name);
    let phases: Vec<String> = manifest.phases.iter().map(|p| p.to_string()).collect();
    println!("[OK] Installed {}@{} into {}", manifest.name, manifest.version, context.prefix.display());
    println!("  Phases run: {}", phases.join(", "));
    Ok(())
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Ok(cwd.join(path))
}
