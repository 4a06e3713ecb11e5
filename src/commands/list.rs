// src/commands/list.rs
//! List recipes

use super::open_repository;
use anyhow::Result;
use std::path::Path;

pub fn cmd_list(repo: &Path, long: bool) -> Result<()> {
    let repository = open_repository(repo)?;

    for recipe in repository.all() {
        if !long {
            println!("{}", recipe.name());
            continue;
        }
        let preferred = recipe
            .preferred_version()
            .map(|v| v.identifier.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<24} {:<10} {}",
            recipe.name(),
            preferred,
            recipe.metadata.description
        );
    }

    if long {
        println!();
        println!(
            "{} recipe(s) in namespace '{}'",
            repository.len(),
            repository.namespace()
        );
    }
    Ok(())
}
