// src/repository/mod.rs

//! Recipe repositories
//!
//! A [`RecipeRepository`] is the validated, read-only set of recipes in one
//! namespace. It is assembled once, either from a directory with
//! [`RecipeRepository::load`] or programmatically with [`RepositoryBuilder`],
//! and cross-recipe validation runs at that point. Every problem is gathered
//! into a single [`Error::RepositoryValidation`]; a repository that exists
//! is consistent. After construction nothing mutates it, so it can be shared
//! between threads and queried concurrently.

mod config;
mod graph;
mod loader;
mod validate;

pub use config::{RepoConfig, REPO_CONFIG_FILE};
pub use graph::RecipeGraph;
pub use loader::RECIPE_FILE;
pub use validate::{Violation, ViolationKind};

use crate::error::{Error, Result};
use crate::recipe::PackageRecipe;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A validated collection of recipes
#[derive(Debug, Clone)]
pub struct RecipeRepository {
    namespace: String,
    root: Option<PathBuf>,
    recipes: BTreeMap<String, PackageRecipe>,
    externals: BTreeSet<String>,
    graph: RecipeGraph,
}

impl RecipeRepository {
    /// Start assembling a repository in memory
    pub fn builder(namespace: impl Into<String>) -> RepositoryBuilder {
        RepositoryBuilder::new(namespace)
    }

    /// Load and validate the repository rooted at `root`
    pub fn load(root: &Path) -> Result<Self> {
        let config = RepoConfig::load(root)?;
        let packages_dir = root.join(&config.packages_dir);
        info!(
            "Loading repository '{}' from {}",
            config.namespace,
            packages_dir.display()
        );

        let loaded = loader::load_recipes(&packages_dir)?;
        let mut builder = RepositoryBuilder::new(config.namespace).externals(config.externals);
        builder.root = Some(root.to_path_buf());
        builder.violations = loaded.violations;
        for recipe in loaded.recipes {
            builder = builder.add_recipe(recipe);
        }
        builder.build()
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Directory the repository was loaded from, if any
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Look up a recipe by package name
    pub fn get(&self, name: &str) -> Result<&PackageRecipe> {
        self.recipes
            .get(name)
            .ok_or_else(|| Error::UnknownPackage(name.to_string()))
    }

    /// Every recipe, in name order
    ///
    /// Each call starts a fresh iteration.
    pub fn all(&self) -> impl ExactSizeIterator<Item = &PackageRecipe> {
        self.recipes.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.recipes.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.recipes.contains_key(name)
    }

    /// Whether `name` is provided outside the repository
    pub fn is_external(&self, name: &str) -> bool {
        self.externals.contains(name)
    }

    pub fn externals(&self) -> impl Iterator<Item = &str> {
        self.externals.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    /// Recipes that may depend on `name`, directly or transitively
    pub fn dependents(&self, name: &str) -> Result<BTreeSet<String>> {
        self.get(name)?;
        Ok(self.graph.transitive_dependents(name))
    }

    /// In-repository recipes `name` may depend on, directly or transitively
    pub fn dependencies(&self, name: &str) -> Result<BTreeSet<String>> {
        self.get(name)?;
        Ok(self.graph.transitive_dependencies(name))
    }

    /// Every recipe, dependencies before dependents
    pub fn build_order(&self) -> Result<Vec<String>> {
        self.graph.topological_sort()
    }

    /// `name` and what it needs from this repository, dependencies first
    pub fn build_order_for(&self, name: &str) -> Result<Vec<String>> {
        let mut needed = self.dependencies(name)?;
        needed.insert(name.to_string());
        Ok(self
            .build_order()?
            .into_iter()
            .filter(|n| needed.contains(n))
            .collect())
    }

    pub fn graph(&self) -> &RecipeGraph {
        &self.graph
    }
}

/// Collects recipes and externals, then validates them as a whole
#[derive(Debug, Default)]
pub struct RepositoryBuilder {
    namespace: String,
    root: Option<PathBuf>,
    recipes: Vec<PackageRecipe>,
    externals: BTreeSet<String>,
    /// Problems found before validation, e.g. unreadable recipe files
    violations: Vec<Violation>,
}

impl RepositoryBuilder {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    pub fn add_recipe(mut self, recipe: PackageRecipe) -> Self {
        self.recipes.push(recipe);
        self
    }

    /// Declare a package provided outside the repository
    pub fn external(mut self, name: impl Into<String>) -> Self {
        self.externals.insert(name.into());
        self
    }

    pub fn externals<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.externals.extend(names.into_iter().map(Into::into));
        self
    }

    /// Validate and freeze
    ///
    /// `if_available` dependencies on unknown packages are dropped first.
    /// Every remaining problem is reported together.
    pub fn build(self) -> Result<RecipeRepository> {
        let RepositoryBuilder {
            namespace,
            root,
            mut recipes,
            externals,
            mut violations,
        } = self;

        for (recipe, target) in validate::prune_unavailable(&mut recipes, &externals) {
            warn!(
                "{}: dropping optional dependency on unavailable package '{}'",
                recipe, target
            );
        }

        violations.extend(validate::validate(&recipes, &externals));
        if !violations.is_empty() {
            violations.sort();
            violations.dedup();
            for violation in &violations {
                warn!("{}", violation);
            }
            return Err(Error::RepositoryValidation { violations });
        }

        let graph = {
            let by_name: BTreeMap<&str, &PackageRecipe> =
                recipes.iter().map(|r| (r.name(), r)).collect();
            validate::dependency_graph(&recipes, &by_name)
        };
        let recipes: BTreeMap<String, PackageRecipe> = recipes
            .into_iter()
            .map(|r| (r.name().to_string(), r))
            .collect();

        info!(
            "Repository '{}' ready: {} recipes, {} externals",
            namespace,
            recipes.len(),
            externals.len()
        );
        debug!("Recipes: {}", recipes.keys().cloned().collect::<Vec<_>>().join(", "));

        Ok(RecipeRepository {
            namespace,
            root,
            recipes,
            externals,
            graph,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::Dependency;
    use crate::recipe::SourceLocator;

    fn recipe(name: &str, deps: &[&str]) -> PackageRecipe {
        let mut recipe = PackageRecipe::new(name);
        recipe
            .declare_version("1.0", SourceLocator::url("https://example.org/src.tar.gz"), None)
            .unwrap();
        for dep in deps {
            recipe.declare_dependency(Dependency::new(dep).unwrap()).unwrap();
        }
        recipe
    }

    fn sample() -> RecipeRepository {
        RecipeRepository::builder("test")
            .external("cmake")
            .add_recipe(recipe("hermes-3", &["boutpp", "cmake"]))
            .add_recipe(recipe("boutpp", &["cmake"]))
            .add_recipe(recipe("xhermes", &[]))
            .build()
            .unwrap()
    }

    #[test]
    fn test_get_and_unknown() {
        let repo = sample();
        assert_eq!(repo.get("boutpp").unwrap().name(), "boutpp");
        assert!(matches!(repo.get("nope"), Err(Error::UnknownPackage(name)) if name == "nope"));
    }

    #[test]
    fn test_all_is_restartable() {
        let repo = sample();
        let first: Vec<&str> = repo.all().map(|r| r.name()).collect();
        let second: Vec<&str> = repo.all().map(|r| r.name()).collect();
        assert_eq!(first, vec!["boutpp", "hermes-3", "xhermes"]);
        assert_eq!(first, second);
        assert_eq!(repo.all().len(), 3);
    }

    #[test]
    fn test_externals_are_not_recipes() {
        let repo = sample();
        assert!(repo.is_external("cmake"));
        assert!(!repo.contains("cmake"));
        assert!(matches!(repo.get("cmake"), Err(Error::UnknownPackage(_))));
    }

    #[test]
    fn test_graph_queries() {
        let repo = sample();
        assert_eq!(
            repo.dependents("boutpp").unwrap().into_iter().collect::<Vec<_>>(),
            vec!["hermes-3"]
        );
        assert_eq!(
            repo.build_order().unwrap(),
            vec!["boutpp", "hermes-3", "xhermes"]
        );
        assert_eq!(repo.build_order_for("hermes-3").unwrap(), vec!["boutpp", "hermes-3"]);
        assert!(repo.dependents("nope").is_err());
    }

    #[test]
    fn test_violations_aggregate() {
        let err = RecipeRepository::builder("test")
            .add_recipe(recipe("a", &["b", "ghost"]))
            .add_recipe(recipe("b", &["a", "phantom"]))
            .build()
            .unwrap_err();
        let Error::RepositoryValidation { violations } = err else {
            panic!("expected RepositoryValidation");
        };
        assert_eq!(violations.len(), 3);
        assert!(violations.iter().any(|v| matches!(
            &v.kind,
            ViolationKind::DanglingDependency { target } if target == "ghost"
        )));
        assert!(violations.iter().any(|v| matches!(
            &v.kind,
            ViolationKind::DanglingDependency { target } if target == "phantom"
        )));
        assert!(violations
            .iter()
            .any(|v| matches!(v.kind, ViolationKind::DependencyCycle { .. })));
    }

    #[test]
    fn test_repository_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RecipeRepository>();
    }
}
