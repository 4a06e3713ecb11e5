// src/repository/validate.rs

//! Cross-recipe validation performed when a repository is assembled
//!
//! Declaration errors inside one recipe are caught by the recipe itself.
//! What remains are problems that only show up once every recipe is known:
//! names used twice, dependencies on packages nobody provides, constraints on
//! variants the target never declared, and cycles. Every problem found is
//! collected, so one load reports all of them.

use crate::dependency::Dependency;
use crate::recipe::PackageRecipe;
use crate::variant::Condition;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::graph::RecipeGraph;

/// One problem found while validating a repository
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Violation {
    /// Recipe the problem was found in
    pub recipe: String,
    pub kind: ViolationKind,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ViolationKind {
    /// The recipe file could not be read or declared something invalid
    InvalidRecipe(String),
    /// Recipe directory and declared package name disagree
    MisplacedRecipe { directory: String },
    /// Two recipes claim the same package name
    DuplicateName,
    /// Dependency on a package that is neither a recipe nor an external
    DanglingDependency { target: String },
    /// Dependency constrains a variant the target does not declare
    UnknownTargetVariant { target: String, variant: String },
    /// Dependency asks for a value the target's variant does not allow
    InvalidTargetVariantValue {
        target: String,
        variant: String,
        value: String,
    },
    /// No declared version of the target satisfies the requested range
    UnsatisfiableVersion { target: String, range: String },
    /// Recipes that depend on each other in a loop
    DependencyCycle { cycle: Vec<String> },
}

impl Violation {
    pub fn new(recipe: impl Into<String>, kind: ViolationKind) -> Self {
        Self {
            recipe: recipe.into(),
            kind,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.recipe, self.kind)
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::InvalidRecipe(message) => write!(f, "{}", message),
            ViolationKind::MisplacedRecipe { directory } => {
                write!(f, "recipe lives in directory '{}' of a different name", directory)
            }
            ViolationKind::DuplicateName => write!(f, "package name is declared more than once"),
            ViolationKind::DanglingDependency { target } => {
                write!(f, "depends on unknown package '{}'", target)
            }
            ViolationKind::UnknownTargetVariant { target, variant } => {
                write!(f, "constrains variant '{}' which '{}' does not declare", variant, target)
            }
            ViolationKind::InvalidTargetVariantValue {
                target,
                variant,
                value,
            } => write!(
                f,
                "requires {}={} but '{}' does not allow that value",
                variant, value, target
            ),
            ViolationKind::UnsatisfiableVersion { target, range } => {
                write!(f, "no version of '{}' satisfies @{}", target, range)
            }
            ViolationKind::DependencyCycle { cycle } => {
                write!(f, "dependency cycle {} -> {}", cycle.join(" -> "), cycle[0])
            }
        }
    }
}

/// Drop `if_available` dependencies whose target nobody provides
///
/// Returns `(recipe, target)` for every edge removed.
pub(crate) fn prune_unavailable(
    recipes: &mut [PackageRecipe],
    externals: &BTreeSet<String>,
) -> Vec<(String, String)> {
    let known: BTreeSet<String> = recipes
        .iter()
        .map(|r| r.name().to_string())
        .chain(externals.iter().cloned())
        .collect();

    let mut pruned = Vec::new();
    for recipe in recipes.iter_mut() {
        let dropped = recipe.prune_dependencies(|dep| !dep.if_available || known.contains(dep.name()));
        let name = recipe.name().to_string();
        pruned.extend(dropped.into_iter().map(|target| (name.clone(), target)));
    }
    pruned
}

/// Check every cross-recipe rule; the result is sorted and free of repeats
pub(crate) fn validate(recipes: &[PackageRecipe], externals: &BTreeSet<String>) -> Vec<Violation> {
    let mut violations = BTreeSet::new();

    let mut by_name: BTreeMap<&str, &PackageRecipe> = BTreeMap::new();
    for recipe in recipes {
        if by_name.insert(recipe.name(), recipe).is_some() {
            violations.insert(Violation::new(recipe.name(), ViolationKind::DuplicateName));
        }
    }

    for recipe in recipes {
        for dep in recipe.dependencies() {
            match by_name.get(dep.name()) {
                Some(target) => check_target(recipe.name(), dep, target, &mut violations),
                None if externals.contains(dep.name()) => {}
                None => {
                    violations.insert(Violation::new(
                        recipe.name(),
                        ViolationKind::DanglingDependency {
                            target: dep.name().to_string(),
                        },
                    ));
                }
            }
        }
    }

    for cycle in dependency_graph(recipes, &by_name).find_cycles() {
        violations.insert(Violation::new(
            cycle[0].clone(),
            ViolationKind::DependencyCycle { cycle },
        ));
    }

    violations.into_iter().collect()
}

/// Graph over in-repository edges only
pub(crate) fn dependency_graph(
    recipes: &[PackageRecipe],
    by_name: &BTreeMap<&str, &PackageRecipe>,
) -> RecipeGraph {
    let mut graph = RecipeGraph::new();
    for recipe in recipes {
        let deps = recipe
            .dependency_names()
            .into_iter()
            .filter(|name| by_name.contains_key(name));
        graph.add_recipe(recipe.name(), deps);
    }
    graph
}

fn check_target(
    recipe: &str,
    dep: &Dependency,
    target: &PackageRecipe,
    violations: &mut BTreeSet<Violation>,
) {
    for atom in dep.target.variant_constraints.atoms() {
        let (variant, value) = match atom {
            Condition::Enabled(name) => (name, None),
            Condition::Disabled(name) => (name, None),
            Condition::Equals { variant, value } | Condition::NotEquals { variant, value } => {
                (variant, Some(value))
            }
            _ => continue,
        };

        let Some(declared) = target.variant(variant) else {
            violations.insert(Violation::new(
                recipe,
                ViolationKind::UnknownTargetVariant {
                    target: target.name().to_string(),
                    variant: variant.clone(),
                },
            ));
            continue;
        };

        let allowed = match value {
            Some(value) => declared.allows_text(value),
            None => declared.is_bool(),
        };
        if !allowed {
            let value = match (atom, value) {
                (_, Some(value)) => value.clone(),
                (Condition::Enabled(_), None) => "true".to_string(),
                _ => "false".to_string(),
            };
            violations.insert(Violation::new(
                recipe,
                ViolationKind::InvalidTargetVariantValue {
                    target: target.name().to_string(),
                    variant: variant.clone(),
                    value,
                },
            ));
        }
    }

    let range = &dep.target.version_range;
    if !range.is_any() && !target.versions().any(|v| range.satisfies(&v.identifier)) {
        violations.insert(Violation::new(
            recipe,
            ViolationKind::UnsatisfiableVersion {
                target: target.name().to_string(),
                range: range.to_string(),
            },
        ));
    }
}
