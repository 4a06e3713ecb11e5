// src/commands/validate.rs
//! Validate a repository

use anyhow::{Context, Result};
use pantry::recipe::validate_recipe;
use pantry::{Error, RecipeRepository};
use std::path::Path;

/// Load the repository; on failure print every violation and fail
pub fn cmd_validate(repo: &Path) -> Result<()> {
    let repository = match RecipeRepository::load(repo) {
        Ok(repository) => repository,
        Err(Error::RepositoryValidation { violations }) => {
            println!("Repository at {} is invalid:", repo.display());
            for violation in &violations {
                println!("  [FAIL] {}", violation);
            }
            anyhow::bail!("{} violation(s) found", violations.len());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to load repository at {}", repo.display()));
        }
    };

    let mut warnings = 0;
    for recipe in repository.all() {
        for warning in validate_recipe(recipe) {
            println!("  [WARN] {}: {}", recipe.name(), warning);
            warnings += 1;
        }
    }

    println!(
        "[OK] {} recipe(s) in '{}', {} external(s), {} warning(s)",
        repository.len(),
        repository.namespace(),
        repository.externals().count(),
        warnings
    );
    Ok(())
}
