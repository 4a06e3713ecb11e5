// src/commands/mod.rs
//! Command handlers for the pantry CLI

mod cook;
mod deps;
mod info;
mod list;
mod validate;

pub use cook::{cmd_cook, CookOptions};
pub use deps::cmd_deps;
pub use info::cmd_info;
pub use list::cmd_list;
pub use validate::cmd_validate;

use crate::cli::Selection;
use anyhow::{Context, Result};
use pantry::{PackageRecipe, RecipeRepository, Version, VariantMap};
use std::path::Path;

/// Load the repository at `root`, attaching the path to any failure
fn open_repository(root: &Path) -> Result<RecipeRepository> {
    RecipeRepository::load(root)
        .with_context(|| format!("Failed to load repository at {}", root.display()))
}

/// Resolve `--version` and `--variant` against a recipe
fn resolve_selection(recipe: &PackageRecipe, selection: &Selection) -> Result<(Version, VariantMap)> {
    let version = match &selection.version {
        Some(text) => {
            let version = Version::parse(text)?;
            if !recipe.has_version(&version) {
                anyhow::bail!("{} has no version {}", recipe.name(), version);
            }
            version
        }
        None => recipe
            .preferred_version()
            .map(|v| v.identifier.clone())
            .with_context(|| format!("{} declares no versions", recipe.name()))?,
    };

    let overrides = VariantMap::parse_overrides(&selection.variants)?;
    let variants = recipe
        .resolve_variants(&overrides)
        .with_context(|| format!("Invalid variant setting for {}", recipe.name()))?;
    Ok((version, variants))
}
