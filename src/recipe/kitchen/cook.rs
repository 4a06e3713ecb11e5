// src/recipe/kitchen/cook.rs

//! Cook: the phase-by-phase execution of a single build
//!
//! The engine's source tree is read-only to a build. When patches apply, the
//! tree is first copied into the scratch area and every later phase works
//! from that copy.

use crate::error::{Error, Result};
use crate::recipe::build::{substitute, PhaseInput};
use crate::recipe::{BuildContext, BuildPhase, PackageRecipe};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::runner::CommandSpec;
use super::Kitchen;

/// Lines of captured output echoed to the log when a phase fails
const FAILURE_TAIL_LINES: usize = 40;

/// A single cook operation
pub struct Cook<'a> {
    pub(super) kitchen: &'a Kitchen,
    pub(super) recipe: &'a PackageRecipe,
    pub(super) context: &'a BuildContext,
    /// Scratch area holding the build tree and logs
    pub(super) scratch: TempDir,
    pub(super) build_dir: PathBuf,
    pub(super) log_dir: PathBuf,
    /// The tree phases run against: the context's, or a patched copy
    pub(super) source_dir: PathBuf,
    /// Placeholder values for command templates
    vars: BTreeMap<String, String>,
    env: Vec<(String, String)>,
    commands_run: usize,
}

impl<'a> Cook<'a> {
    pub(super) fn new(
        kitchen: &'a Kitchen,
        recipe: &'a PackageRecipe,
        context: &'a BuildContext,
    ) -> Result<Self> {
        let prefix = format!("pantry-{}-", recipe.name());
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let scratch = match &kitchen.config.scratch_root {
            Some(root) => {
                fs::create_dir_all(root)?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .map_err(|e| Error::IoError(format!("Failed to create scratch directory: {}", e)))?;

        let build_dir = scratch.path().join("build");
        let log_dir = scratch.path().join("logs");
        fs::create_dir_all(&build_dir)?;
        fs::create_dir_all(&log_dir)?;

        let jobs = kitchen.config.jobs;
        let mut vars = BTreeMap::new();
        vars.insert("name".to_string(), recipe.name().to_string());
        vars.insert("version".to_string(), context.version.to_string());
        vars.insert("prefix".to_string(), path_string(&context.prefix));
        vars.insert("source_dir".to_string(), path_string(&context.source_dir));
        vars.insert("build_dir".to_string(), path_string(&build_dir));
        vars.insert("jobs".to_string(), jobs.to_string());
        for (dep, path) in &context.dependencies {
            vars.insert(format!("dep.{}", dep), path_string(path));
        }

        let env = build_environment(context, jobs, &kitchen.config.env);

        Ok(Self {
            kitchen,
            recipe,
            context,
            scratch,
            build_dir,
            log_dir,
            source_dir: context.source_dir.clone(),
            vars,
            env,
            commands_run: 0,
        })
    }

    /// Run one phase; returns whether any command ran
    pub(super) fn run_phase(&mut self, phase: BuildPhase) -> Result<bool> {
        let input = PhaseInput {
            phase,
            context: self.context,
            build_dir: &self.build_dir,
            recipe_dir: self.recipe.recipe_dir(),
            jobs: self.kitchen.config.jobs,
        };
        let commands = self.recipe.procedure().commands_for(&input)?;

        if commands.is_empty() {
            debug!("Nothing to do in {} phase", phase);
            return Ok(false);
        }

        info!("Running {} phase for {}", phase, self.recipe.name());
        // Patches apply to a private copy of the source; everything else
        // runs out of tree
        let workdir = match phase {
            BuildPhase::Patch => {
                self.stage_source()?;
                self.source_dir.clone()
            }
            _ => self.build_dir.clone(),
        };

        for template in &commands {
            let command = substitute(template, &self.vars);
            self.run_command(phase, &command, &workdir)?;
        }

        info!("Finished {} phase for {}", phase, self.recipe.name());
        Ok(true)
    }

    fn run_command(&mut self, phase: BuildPhase, command: &str, workdir: &Path) -> Result<()> {
        self.commands_run += 1;
        let log_path = self
            .log_dir
            .join(format!("{:02}-{}.log", self.commands_run, phase));

        let spec = CommandSpec {
            phase,
            command,
            workdir,
            env: &self.env,
            log_path: &log_path,
        };

        let output = match self.kitchen.runner.run(&spec) {
            Ok(output) => output,
            Err(e) => {
                return Err(Error::BuildFailure {
                    phase,
                    exit_status: None,
                    captured_output: e.to_string(),
                });
            }
        };

        if output.success() {
            return Ok(());
        }

        warn!(
            "{} phase of {} failed: {}",
            phase,
            self.recipe.name(),
            command
        );
        let lines: Vec<&str> = output.output.lines().collect();
        for line in &lines[lines.len().saturating_sub(FAILURE_TAIL_LINES)..] {
            warn!("[{}] {}", phase, line);
        }

        Err(Error::BuildFailure {
            phase,
            exit_status: output.exit_status,
            captured_output: output.output,
        })
    }

    /// Copy the context's source tree into the scratch area and use the copy
    fn stage_source(&mut self) -> Result<()> {
        let staged = self.scratch.path().join("source");
        if self.source_dir == staged {
            return Ok(());
        }
        debug!(
            "Staging {} into {} for patching",
            self.context.source_dir.display(),
            staged.display()
        );
        copy_tree(&self.context.source_dir, &staged)?;
        self.vars
            .insert("source_dir".to_string(), path_string(&staged));
        self.source_dir = staged;
        Ok(())
    }

    /// Keep or drop the scratch area according to the kitchen config
    pub(super) fn finish(self) {
        if self.kitchen.config.keep_builddir {
            let kept = self.scratch.keep();
            info!("Keeping build directory: {}", kept.display());
        }
    }
}

/// Recursive copy keeping symlinks as links and file permissions as they are
fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    for entry in WalkDir::new(from).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            Error::IoError(format!("Failed to read source tree {}: {}", from.display(), e))
        })?;
        let relative = entry.path().strip_prefix(from).map_err(|e| {
            Error::IoError(format!("{} is outside {}: {}", entry.path().display(), from.display(), e))
        })?;
        let target = to.join(relative);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            std::os::unix::fs::symlink(fs::read_link(entry.path())?, &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Environment seen by every build command
///
/// Dependency prefixes are exposed the way CMake, pkg-config and the shell
/// look for them; `PATH` keeps the caller's entries after the dependencies.
fn build_environment(context: &BuildContext, jobs: u32, extra: &[(String, String)]) -> Vec<(String, String)> {
    let prefixes: Vec<&PathBuf> = context.dependencies.values().collect();
    let mut env = Vec::new();

    if !prefixes.is_empty() {
        let joined: Vec<String> = prefixes.iter().map(|p| path_string(p)).collect();
        env.push(("CMAKE_PREFIX_PATH".to_string(), joined.join(":")));

        let pkgconfig: Vec<String> = prefixes
            .iter()
            .flat_map(|p| {
                ["lib/pkgconfig", "lib64/pkgconfig", "share/pkgconfig"]
                    .into_iter()
                    .map(move |sub| p.join(sub))
            })
            .filter(|dir| dir.is_dir())
            .map(|dir| path_string(&dir))
            .collect();
        if !pkgconfig.is_empty() {
            env.push(("PKG_CONFIG_PATH".to_string(), pkgconfig.join(":")));
        }
    }

    let mut path: Vec<String> = prefixes
        .iter()
        .map(|p| p.join("bin"))
        .filter(|dir| dir.is_dir())
        .map(|dir| path_string(&dir))
        .collect();
    if let Ok(existing) = std::env::var("PATH") {
        path.push(existing);
    }
    if !path.is_empty() {
        env.push(("PATH".to_string(), path.join(":")));
    }

    if let Some(compiler) = &context.platform.compiler {
        if let Some(cc) = &compiler.cc {
            env.push(("CC".to_string(), cc.clone()));
        }
        if let Some(cxx) = &compiler.cxx {
            env.push(("CXX".to_string(), cxx.clone()));
        }
    }

    env.push(("MAKEFLAGS".to_string(), format!("-j{}", jobs)));
    env.extend(extra.iter().cloned());
    env
}
