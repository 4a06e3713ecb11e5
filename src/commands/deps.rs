// src/commands/deps.rs
//! Show dependencies for a concrete version and variant setting

use super::{open_repository, resolve_selection};
use crate::cli::Selection;
use anyhow::Result;
use pantry::ConditionEnv;
use std::path::Path;

pub fn cmd_deps(repo: &Path, package: &str, selection: &Selection, reverse: bool) -> Result<()> {
    let repository = open_repository(repo)?;
    let recipe = repository.get(package)?;

    if reverse {
        let dependents = repository.dependents(package)?;
        if dependents.is_empty() {
            println!("Nothing in '{}' depends on {}", repository.namespace(), package);
        }
        for name in dependents {
            println!("{}", name);
        }
        return Ok(());
    }

    let (version, variants) = resolve_selection(recipe, selection)?;
    println!("{}@{} {}", recipe.name(), version, variants);

    // Platform-dependent conditions are evaluated against the host
    let platform = pantry::Platform::detect();
    let env = ConditionEnv::new(&variants)
        .with_version(&version)
        .with_platform(&platform);
    let active = recipe.active_dependencies(&env);
    if active.is_empty() {
        println!("  (no dependencies)");
    }
    for dep in active {
        let origin = if repository.contains(dep.name()) { "recipe" } else { "external" };
        println!("  {:<20} {:<16} {}", dep.target.to_string(), dep.types.to_string(), origin);
    }
    Ok(())
}
