// src/recipe/mod.rs

//! Package recipes: what can be built, and how
//!
//! A recipe declares the versions of one package, its variants, its
//! dependencies on other packages, and the phases that turn a source tree
//! into an installed prefix. Declarations are pure data and can be inspected
//! without building anything; only [`Kitchen::build`] touches the filesystem.
//!
//! # Example Recipe
//!
//! ```toml
//! [package]
//! name = "hermes-3"
//! git = "https://github.com/boutproject/hermes-3.git"
//! build_system = "cmake"
//!
//! [[version]]
//! id = "1.3.1"
//! tag = "v1.3.1"
//! submodules = true
//!
//! [[variant]]
//! name = "limiter"
//! default = "MC"
//! values = ["MC", "MinMod"]
//!
//! [[depends_on]]
//! spec = "boutpp"
//! type = ["build", "link"]
//!
//! [[configure_arg]]
//! define = "HERMES_SLOPE_LIMITER"
//! from_variant = "limiter"
//! ```
//!
//! # Culinary Terminology
//!
//! - **Recipe**: the declarations for one package
//! - **Kitchen**: runs builds, owns the configuration and the command runner
//! - **Cook**: one build of one recipe in its own scratch area

mod build;
mod context;
pub mod format;
mod kitchen;
mod package;
pub mod parser;
mod source;

pub use build::{
    shell_quote, substitute, BuildPhase, BuildProcedure, BuildSystem, ConfigureArg, DefineValue,
    Patch, PhaseAction, PhaseHook, PhaseInput, PhaseOverride,
};
pub use context::BuildContext;
pub use format::RecipeFile;
pub use kitchen::{
    CommandOutput, CommandRunner, CommandSpec, InstallManifest, Kitchen, KitchenConfig,
    ShellRunner, MARKER_DIR,
};
pub use package::{PackageRecipe, RecipeMetadata};
pub use parser::{parse_recipe, parse_recipe_file, validate_recipe};
pub use source::{GitRef, SourceLocator, VersionDescriptor};
