// src/lib.rs

//! Pantry: package recipes for source builds
//!
//! A recipe repository describes how scientific software is built from
//! source: which versions exist and where to fetch them, which build-time
//! variants a package offers, what it depends on under which conditions, and
//! how its configure, compile and install phases run.
//!
//! # Architecture
//!
//! - Declarative recipes: one `package.toml` per package, pure data
//! - Load-time validation: a repository that loads is consistent
//! - Conditions: `+mpi`, `@5.1:`, `platform=darwin` select what applies
//! - Kitchen: builds one recipe for one fully resolved context

pub mod dependency;
mod error;
pub mod platform;
pub mod recipe;
pub mod repository;
pub mod variant;
pub mod version;

pub use dependency::{DepType, DepTypes, Dependency, TargetSpec};
pub use error::{Error, Result};
pub use platform::{Compiler, Platform};
pub use recipe::{
    BuildContext, BuildPhase, InstallManifest, Kitchen, KitchenConfig, PackageRecipe,
    SourceLocator, VersionDescriptor,
};
pub use repository::{RecipeRepository, RepositoryBuilder, Violation, ViolationKind};
pub use variant::{Condition, ConditionEnv, Variant, VariantKind, VariantMap, VariantValue};
pub use version::{Version, VersionRange};
