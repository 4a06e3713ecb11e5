// src/recipe/context.rs

//! The resolved input handed to a recipe for exactly one build

use crate::platform::Platform;
use crate::variant::{ConditionEnv, VariantMap};
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A concrete version, variant assignment and set of dependency paths
///
/// Produced by the engine after concretization. The recipe checks it
/// against its declarations before running any phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildContext {
    pub version: Version,
    pub variants: VariantMap,
    /// Installed prefix of each satisfied dependency, by package name
    pub dependencies: BTreeMap<String, PathBuf>,
    /// Where the installed artifact tree goes
    pub prefix: PathBuf,
    /// Unpacked source tree, already fetched by the engine
    pub source_dir: PathBuf,
    pub platform: Platform,
    /// Run the `check` phase
    pub run_tests: bool,
}

impl BuildContext {
    pub fn new(version: Version, prefix: PathBuf, source_dir: PathBuf) -> Self {
        Self {
            version,
            variants: VariantMap::new(),
            dependencies: BTreeMap::new(),
            prefix,
            source_dir,
            platform: Platform::detect(),
            run_tests: false,
        }
    }

    pub fn with_variants(mut self, variants: VariantMap) -> Self {
        self.variants = variants;
        self
    }

    pub fn with_dependency(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.dependencies.insert(name.into(), path.into());
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_tests(mut self, run_tests: bool) -> Self {
        self.run_tests = run_tests;
        self
    }

    pub fn dependency_path(&self, name: &str) -> Option<&Path> {
        self.dependencies.get(name).map(|p| p.as_path())
    }

    /// Inputs for evaluating the recipe's own conditions
    pub fn condition_env(&self) -> ConditionEnv<'_> {
        ConditionEnv::new(&self.variants)
            .with_version(&self.version)
            .with_platform(&self.platform)
    }
}
