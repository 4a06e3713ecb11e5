// src/recipe/kitchen/mod.rs

//! Kitchen: where a recipe is cooked into an installed prefix
//!
//! The kitchen checks the build context against the recipe, runs the
//! phases in order inside a private scratch area and, only when every phase
//! succeeded, writes the install marker into the prefix. A failed build
//! leaves no marker and removes whatever it put into the prefix.

mod config;
mod cook;
mod manifest;
mod runner;

pub use config::KitchenConfig;
use cook::Cook;
pub use manifest::{InstallManifest, MARKER_DIR};
pub use runner::{CommandOutput, CommandRunner, CommandSpec, ShellRunner};

use crate::error::{Error, Result};
use crate::recipe::{BuildContext, BuildPhase, PackageRecipe};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// The Kitchen: where recipes are cooked
pub struct Kitchen {
    pub(crate) config: KitchenConfig,
    runner: Arc<dyn CommandRunner>,
}

impl Kitchen {
    /// Create a new Kitchen that runs commands through the shell
    pub fn new(config: KitchenConfig) -> Self {
        let runner = Arc::new(ShellRunner::new(config.timeout));
        Self { config, runner }
    }

    /// Create a new Kitchen with a custom command runner
    pub fn with_runner(config: KitchenConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self { config, runner }
    }

    /// Create a Kitchen with default configuration
    pub fn with_defaults() -> Self {
        Self::new(KitchenConfig::default())
    }

    pub fn config(&self) -> &KitchenConfig {
        &self.config
    }

    /// Build `recipe` for one resolved context
    ///
    /// Nothing runs unless the context is valid for the recipe and the
    /// prefix is not already installed. The recipe performs no retries: the
    /// first failing command ends the build with [`Error::BuildFailure`].
    pub fn build(&self, recipe: &PackageRecipe, context: &BuildContext) -> Result<InstallManifest> {
        recipe.check_context(context)?;

        if InstallManifest::is_installed(&context.prefix) {
            return Err(Error::InvalidContext(format!(
                "Prefix {} already holds an installed package",
                context.prefix.display()
            )));
        }

        info!(
            "Cooking {}@{} {} into {}",
            recipe.name(),
            context.version,
            context.variants,
            context.prefix.display()
        );

        let guard = PrefixGuard::prepare(&context.prefix)?;
        let mut cook = Cook::new(self, recipe, context)?;

        let outcome = run_phases(&mut cook, context.run_tests).and_then(|phases| {
            InstallManifest::new(recipe, context, phases).write(&context.prefix)?;
            InstallManifest::load(&context.prefix)
        });
        cook.finish();

        let manifest = outcome?;
        guard.commit();
        info!("Installed {}@{} into {}", recipe.name(), context.version, context.prefix.display());
        Ok(manifest)
    }
}

fn run_phases(cook: &mut Cook<'_>, run_tests: bool) -> Result<Vec<BuildPhase>> {
    let mut ran = Vec::new();
    for phase in BuildPhase::ALL {
        if phase == BuildPhase::Check && !run_tests {
            debug!("Skipping check phase (tests not requested)");
            continue;
        }
        if cook.run_phase(phase)? {
            ran.push(phase);
        }
    }
    Ok(ran)
}

/// Undoes a build's changes to its prefix unless the build is committed
///
/// Cleanup happens on drop, so an early return or a panic mid-build
/// leaves the prefix as it was found.
struct PrefixGuard {
    prefix: PathBuf,
    created: bool,
    /// Every path under the prefix, relative to it, present before the build
    preexisting: BTreeSet<PathBuf>,
    committed: bool,
}

impl PrefixGuard {
    fn prepare(prefix: &Path) -> Result<Self> {
        let created = !prefix.exists();
        let preexisting = if created {
            BTreeSet::new()
        } else {
            snapshot(prefix)?
        };
        fs::create_dir_all(prefix)?;
        Ok(Self {
            prefix: prefix.to_path_buf(),
            created,
            preexisting,
            committed: false,
        })
    }

    fn commit(mut self) {
        self.committed = true;
    }

    fn rollback(&self) -> std::io::Result<()> {
        if self.created {
            return fs::remove_dir_all(&self.prefix);
        }
        // Children come before their directory, so new directories are empty
        // by the time they are reached
        for entry in WalkDir::new(&self.prefix).min_depth(1).contents_first(true) {
            let entry = entry?;
            let relative = entry.path().strip_prefix(&self.prefix).unwrap_or(entry.path());
            if self.preexisting.contains(relative) {
                continue;
            }
            debug!("Removing {}", entry.path().display());
            if entry.file_type().is_dir() {
                fs::remove_dir(entry.path())?;
            } else {
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }
}

/// Relative paths of everything below `prefix`
fn snapshot(prefix: &Path) -> Result<BTreeSet<PathBuf>> {
    let mut paths = BTreeSet::new();
    for entry in WalkDir::new(prefix).min_depth(1) {
        let entry = entry.map_err(|e| {
            Error::IoError(format!("Failed to scan prefix {}: {}", prefix.display(), e))
        })?;
        if let Ok(relative) = entry.path().strip_prefix(prefix) {
            paths.insert(relative.to_path_buf());
        }
    }
    Ok(paths)
}

impl Drop for PrefixGuard {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        warn!("Removing partial install from {}", self.prefix.display());
        if let Err(e) = self.rollback() {
            warn!("Failed to clean up {}: {}", self.prefix.display(), e);
        }
    }
}
