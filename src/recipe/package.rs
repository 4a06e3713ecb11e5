// src/recipe/package.rs

//! The package recipe aggregate
//!
//! A recipe is assembled by a series of `declare_*` calls. Each call checks
//! its declaration against what is already known about the recipe, so a
//! fully constructed [`PackageRecipe`] is internally consistent: version
//! identifiers and variant names are unique, every default is allowed, and
//! every condition only mentions declared variants with values they accept.
//! Inspecting a recipe never touches the filesystem.

use crate::dependency::Dependency;
use crate::error::{Error, Result};
use crate::recipe::build::{BuildPhase, BuildProcedure, ConfigureArg, Patch, PhaseHook, PhaseOverride};
use crate::recipe::context::BuildContext;
use crate::recipe::kitchen::{InstallManifest, Kitchen};
use crate::recipe::source::{SourceLocator, VersionDescriptor};
use crate::variant::{Condition, ConditionEnv, Variant, VariantMap};
use crate::version::Version;
use sha2::{Digest, Sha256};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Words a condition parses as something other than a variant name
const RESERVED_VARIANT_NAMES: &[&str] = &["platform", "target", "arch"];

/// Descriptive fields of a recipe
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeMetadata {
    pub description: String,
    pub homepage: Option<String>,
    /// Default repository for git-based versions
    pub git: Option<String>,
    pub url: Option<String>,
    pub maintainers: Vec<String>,
    pub license: Option<String>,
}

/// Versions, variants, dependencies and build procedure of one package
#[derive(Debug, Clone)]
pub struct PackageRecipe {
    name: String,
    pub metadata: RecipeMetadata,
    versions: BTreeMap<Version, VersionDescriptor>,
    variants: Vec<Variant>,
    dependencies: Vec<Dependency>,
    procedure: BuildProcedure,
    recipe_dir: Option<PathBuf>,
}

impl PackageRecipe {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metadata: RecipeMetadata::default(),
            versions: BTreeMap::new(),
            variants: Vec::new(),
            dependencies: Vec::new(),
            procedure: BuildProcedure::default(),
            recipe_dir: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a buildable version
    ///
    /// Returns the stored descriptor so callers can mark it preferred.
    pub fn declare_version(
        &mut self,
        identifier: &str,
        source: SourceLocator,
        integrity: Option<&str>,
    ) -> Result<&mut VersionDescriptor> {
        let version = Version::parse(identifier)?;
        match self.versions.entry(version) {
            Entry::Occupied(existing) => Err(Error::DuplicateVersion {
                recipe: self.name.clone(),
                version: existing.key().to_string(),
            }),
            Entry::Vacant(slot) => {
                let mut descriptor = VersionDescriptor::new(slot.key().clone(), source);
                descriptor.integrity = integrity.map(str::to_string);
                Ok(slot.insert(descriptor))
            }
        }
    }

    /// Register a build option
    pub fn declare_variant(&mut self, variant: Variant) -> Result<()> {
        if RESERVED_VARIANT_NAMES.contains(&variant.name.as_str()) {
            return Err(Error::ParseError(format!(
                "Variant name '{}' in recipe '{}' is reserved",
                variant.name, self.name
            )));
        }
        if self.variant(&variant.name).is_some() {
            return Err(Error::DuplicateVariant {
                recipe: self.name.clone(),
                variant: variant.name,
            });
        }
        if !variant.allows(&variant.default) {
            return Err(Error::InvalidDefault {
                recipe: self.name.clone(),
                variant: variant.name.clone(),
                default: variant.default.to_string(),
                allowed: variant.allowed_values().join(", "),
            });
        }
        self.variants.push(variant);
        Ok(())
    }

    /// Register a dependency declaration
    ///
    /// Declarations are additive: several may target the same package, and
    /// the edge exists whenever any of their conditions holds.
    pub fn declare_dependency(&mut self, dependency: Dependency) -> Result<()> {
        self.check_condition(&dependency.when)?;
        self.dependencies.push(dependency);
        Ok(())
    }

    pub fn declare_patch(&mut self, patch: Patch) -> Result<()> {
        self.check_condition(&patch.when)?;
        self.procedure.patches.push(patch);
        Ok(())
    }

    pub fn declare_configure_arg(&mut self, arg: ConfigureArg) -> Result<()> {
        match &arg {
            ConfigureArg::Define { .. } => {}
            ConfigureArg::FromVariant { variant, .. } => {
                self.declared_variant(variant)?;
            }
            ConfigureArg::Conditional { when, .. } => self.check_condition(when)?,
        }
        self.procedure.configure_args.push(arg);
        Ok(())
    }

    pub fn declare_override(&mut self, over: PhaseOverride) -> Result<()> {
        self.check_condition(&over.when)?;
        self.procedure.overrides.push(over);
        Ok(())
    }

    /// Replace `phase` with a programmatic hook
    pub fn set_hook(&mut self, phase: BuildPhase, hook: Arc<dyn PhaseHook>) {
        self.procedure.set_hook(phase, hook);
    }

    pub fn set_procedure(&mut self, procedure: BuildProcedure) {
        self.procedure = procedure;
    }

    pub fn procedure(&self) -> &BuildProcedure {
        &self.procedure
    }

    /// Directory holding the recipe file and its patches
    pub fn recipe_dir(&self) -> Option<&Path> {
        self.recipe_dir.as_deref()
    }

    pub fn set_recipe_dir(&mut self, dir: impl Into<PathBuf>) {
        self.recipe_dir = Some(dir.into());
    }

    /// Declared versions, oldest first
    pub fn versions(&self) -> impl DoubleEndedIterator<Item = &VersionDescriptor> + ExactSizeIterator {
        self.versions.values()
    }

    pub fn version(&self, id: &Version) -> Option<&VersionDescriptor> {
        self.versions.get(id)
    }

    pub fn has_version(&self, id: &Version) -> bool {
        self.versions.contains_key(id)
    }

    /// The version picked when nothing else is asked for
    ///
    /// A version flagged preferred wins; otherwise the newest numbered
    /// release; otherwise the newest development branch.
    pub fn preferred_version(&self) -> Option<&VersionDescriptor> {
        self.versions
            .values()
            .rev()
            .find(|d| d.preferred)
            .or_else(|| self.versions.values().rev().find(|d| !d.identifier.is_branch()))
            .or_else(|| self.versions.values().next_back())
    }

    /// Declared variants, in declaration order
    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    pub fn variant(&self, name: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.name == name)
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Every declaration that targets `target`
    pub fn dependencies_on(&self, target: &str) -> Vec<&Dependency> {
        self.dependencies
            .iter()
            .filter(|d| d.name() == target)
            .collect()
    }

    /// Names of all packages this recipe may depend on
    pub fn dependency_names(&self) -> BTreeSet<&str> {
        self.dependencies.iter().map(|d| d.name()).collect()
    }

    /// Declarations whose condition holds for the given configuration
    pub fn active_dependencies(&self, env: &ConditionEnv<'_>) -> Vec<&Dependency> {
        self.dependencies
            .iter()
            .filter(|d| d.is_active(env))
            .collect()
    }

    /// Drop declarations whose target fails `keep`; returns the dropped names
    pub(crate) fn prune_dependencies(&mut self, mut keep: impl FnMut(&Dependency) -> bool) -> Vec<String> {
        let mut dropped = Vec::new();
        self.dependencies.retain(|d| {
            let retained = keep(d);
            if !retained {
                dropped.push(d.name().to_string());
            }
            retained
        });
        dropped
    }

    /// Every variant at its default value
    pub fn default_variants(&self) -> VariantMap {
        self.variants
            .iter()
            .map(|v| (v.name.clone(), v.default.clone()))
            .collect()
    }

    /// Defaults with textual overrides applied (`("limiter", "MinMod")`)
    pub fn resolve_variants(&self, overrides: &[(String, String)]) -> Result<VariantMap> {
        let mut map = self.default_variants();
        for (name, text) in overrides {
            let variant = self.declared_variant(name)?;
            let value = variant
                .parse_value(text)
                .ok_or_else(|| Error::InvalidVariantValue {
                    recipe: self.name.clone(),
                    variant: name.clone(),
                    value: text.clone(),
                })?;
            map.insert(name.clone(), value);
        }
        Ok(map)
    }

    /// A context for the preferred version with default variants
    pub fn default_context(&self, prefix: PathBuf, source_dir: PathBuf) -> Result<BuildContext> {
        let version = self
            .preferred_version()
            .ok_or_else(|| Error::NotFound(format!("Recipe '{}' declares no versions", self.name)))?;
        Ok(BuildContext::new(version.identifier.clone(), prefix, source_dir)
            .with_variants(self.default_variants()))
    }

    /// Check that `context` is a valid instantiation of this recipe
    ///
    /// The version must be declared, the variant map must assign an allowed
    /// value to exactly the declared variants, and every active dependency
    /// needed while building must come with an installed path.
    pub fn check_context(&self, context: &BuildContext) -> Result<()> {
        if !self.has_version(&context.version) {
            return Err(Error::InvalidContext(format!(
                "Version '{}' is not declared by recipe '{}'",
                context.version, self.name
            )));
        }

        for (name, value) in context.variants.iter() {
            let variant = self.declared_variant(name)?;
            if !variant.allows(value) {
                return Err(Error::InvalidVariantValue {
                    recipe: self.name.clone(),
                    variant: name.clone(),
                    value: value.to_string(),
                });
            }
        }
        if let Some(missing) = self
            .variants
            .iter()
            .find(|v| !context.variants.contains(&v.name))
        {
            return Err(Error::InvalidContext(format!(
                "No value given for variant '{}' of recipe '{}'",
                missing.name, self.name
            )));
        }

        let env = context.condition_env();
        for dep in self.active_dependencies(&env) {
            if dep.needed_for_build(context.run_tests) && context.dependency_path(dep.name()).is_none() {
                return Err(Error::MissingDependency {
                    recipe: self.name.clone(),
                    dependency: dep.name().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Build this recipe with a default kitchen
    pub fn build(&self, context: &BuildContext) -> Result<InstallManifest> {
        Kitchen::with_defaults().build(self, context)
    }

    /// Stable digest of the declarations, recorded in install manifests
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.name.as_bytes());
        for desc in self.versions.values() {
            hasher.update(format!("\nversion {} {}", desc.identifier, desc.source).as_bytes());
            if let Some(integrity) = &desc.integrity {
                hasher.update(integrity.as_bytes());
            }
        }
        for variant in &self.variants {
            hasher.update(format!("\nvariant {}", variant).as_bytes());
        }
        for dep in &self.dependencies {
            hasher.update(format!("\ndepends_on {}", dep).as_bytes());
        }
        hasher.update(format!("\nprocedure {:?}", self.procedure).as_bytes());
        hex::encode(hasher.finalize())
    }

    fn declared_variant(&self, name: &str) -> Result<&Variant> {
        self.variant(name).ok_or_else(|| Error::UndeclaredVariant {
            recipe: self.name.clone(),
            variant: name.to_string(),
        })
    }

    /// Conditions may only mention declared variants, with values they accept
    fn check_condition(&self, condition: &Condition) -> Result<()> {
        for atom in condition.atoms() {
            match atom {
                Condition::Enabled(name) | Condition::Disabled(name) => {
                    let variant = self.declared_variant(name)?;
                    if !variant.is_bool() {
                        return Err(Error::InvalidVariantValue {
                            recipe: self.name.clone(),
                            variant: name.clone(),
                            value: atom.to_string(),
                        });
                    }
                }
                Condition::Equals { variant, value } | Condition::NotEquals { variant, value } => {
                    if !self.declared_variant(variant)?.allows_text(value) {
                        return Err(Error::InvalidVariantValue {
                            recipe: self.name.clone(),
                            variant: variant.clone(),
                            value: value.clone(),
                        });
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}
