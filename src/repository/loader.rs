// src/repository/loader.rs

//! Reading recipe files from a repository directory
//!
//! Layout:
//!
//! ```text
//! <root>/repo.toml
//! <root>/packages/<name>/package.toml
//! <root>/packages/<name>/*.patch
//! ```
//!
//! Directories are visited in name order, so two loads of the same tree
//! produce the same recipes in the same order.

use crate::error::{Error, Result};
use crate::recipe::{parse_recipe_file, validate_recipe, PackageRecipe};
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::validate::{Violation, ViolationKind};

/// File name of a recipe inside its package directory
pub const RECIPE_FILE: &str = "package.toml";

/// Recipes read from disk, plus the files that could not be read
#[derive(Debug, Default)]
pub(crate) struct LoadedRecipes {
    pub recipes: Vec<PackageRecipe>,
    pub violations: Vec<Violation>,
}

/// Read every `<packages_dir>/<name>/package.toml`
///
/// A recipe that fails to parse, declares something invalid, or sits in a
/// directory that cannot be read is recorded as a violation against its
/// directory name; the rest still load.
pub(crate) fn load_recipes(packages_dir: &Path) -> Result<LoadedRecipes> {
    if !packages_dir.is_dir() {
        return Err(Error::NotFound(format!(
            "Recipe directory {} does not exist",
            packages_dir.display()
        )));
    }

    let mut loaded = LoadedRecipes::default();
    let walker = WalkDir::new(packages_dir)
        .min_depth(2)
        .max_depth(2)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let directory = e
                    .path()
                    .and_then(|p| p.strip_prefix(packages_dir).ok())
                    .and_then(|p| p.components().next())
                    .map(|c| c.as_os_str().to_string_lossy().into_owned());
                // Without a package directory to blame, the repository itself is unreadable
                let Some(directory) = directory else {
                    return Err(Error::IoError(format!(
                        "Failed to read recipe directory {}: {}",
                        packages_dir.display(),
                        e
                    )));
                };
                warn!("Failed to read package directory {}: {}", directory, e);
                loaded
                    .violations
                    .push(Violation::new(&directory, ViolationKind::InvalidRecipe(e.to_string())));
                continue;
            }
        };
        if !entry.file_type().is_file() || entry.file_name() != RECIPE_FILE {
            continue;
        }

        let path = entry.path();
        let directory = path
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let recipe = match parse_recipe_file(path) {
            Ok(recipe) => recipe,
            Err(e) => {
                warn!("Failed to load recipe {}: {}", path.display(), e);
                // Parse and read errors already name the file
                let message = match &e {
                    Error::ParseError(_) | Error::IoError(_) => e.to_string(),
                    _ => format!("{}: {}", path.display(), e),
                };
                loaded
                    .violations
                    .push(Violation::new(&directory, ViolationKind::InvalidRecipe(message)));
                continue;
            }
        };

        if recipe.name() != directory {
            loaded.violations.push(Violation::new(
                recipe.name(),
                ViolationKind::MisplacedRecipe { directory },
            ));
        }

        for warning in validate_recipe(&recipe) {
            debug!("{}: {}", recipe.name(), warning);
        }
        debug!(
            "Loaded recipe {} ({} versions, {} variants, {} dependencies)",
            recipe.name(),
            recipe.versions().len(),
            recipe.variants().len(),
            recipe.dependencies().len()
        );
        loaded.recipes.push(recipe);
    }

    Ok(loaded)
}
