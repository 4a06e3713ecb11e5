// src/dependency/mod.rs

//! Dependency declarations between recipes
//!
//! A declaration is an edge from the declaring recipe to a target package,
//! narrowed by a version range and variant constraints on the target, scoped
//! to the dependency types it is needed for, and activated by a condition on
//! the declaring recipe. Several declarations for the same target may coexist;
//! the edge is present whenever any of their conditions holds.

use crate::error::{Error, Result};
use crate::variant::{Condition, ConditionEnv};
use crate::version::VersionRange;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

/// When a dependency is needed
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter,
    Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DepType {
    /// Tools run while building (compilers, cmake, code generators)
    Build,
    /// Libraries linked into the installed artifact
    Link,
    /// Needed when the installed artifact runs
    Run,
    /// Needed only to run the package's own tests
    Test,
}

/// A non-empty set of dependency types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<DepType>", into = "Vec<DepType>")]
pub struct DepTypes(BTreeSet<DepType>);

impl DepTypes {
    pub fn new(types: impl IntoIterator<Item = DepType>) -> Result<Self> {
        let set: BTreeSet<DepType> = types.into_iter().collect();
        if set.is_empty() {
            return Err(Error::ParseError(
                "A dependency needs at least one type".to_string(),
            ));
        }
        Ok(Self(set))
    }

    pub fn only(ty: DepType) -> Self {
        Self(BTreeSet::from([ty]))
    }

    /// Parse `build,link` or `build link`
    pub fn parse(s: &str) -> Result<Self> {
        let types = s
            .split([',', ' '])
            .filter(|t| !t.is_empty())
            .map(|t| {
                DepType::from_str(t.trim()).map_err(|_| {
                    let known: Vec<String> = DepType::iter().map(|t| t.to_string()).collect();
                    Error::ParseError(format!(
                        "Unknown dependency type '{}' (expected one of: {})",
                        t,
                        known.join(", ")
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(types)
    }

    pub fn contains(&self, ty: DepType) -> bool {
        self.0.contains(&ty)
    }

    /// Whether any of `types` is in this set
    pub fn intersects(&self, types: &[DepType]) -> bool {
        types.iter().any(|t| self.0.contains(t))
    }

    pub fn iter(&self) -> impl Iterator<Item = DepType> + '_ {
        self.0.iter().copied()
    }
}

impl Default for DepTypes {
    /// `build` and `link`, the usual needs of a compiled library dependency
    fn default() -> Self {
        Self(BTreeSet::from([DepType::Build, DepType::Link]))
    }
}

impl TryFrom<Vec<DepType>> for DepTypes {
    type Error = Error;

    fn try_from(types: Vec<DepType>) -> Result<Self> {
        Self::new(types)
    }
}

impl From<DepTypes> for Vec<DepType> {
    fn from(types: DepTypes) -> Self {
        types.0.into_iter().collect()
    }
}

impl fmt::Display for DepTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.0.iter().map(|t| t.to_string()).collect();
        write!(f, "{}", names.join(","))
    }
}

/// A requested target: name, version range and variant constraints
///
/// Parsed from strings such as `petsc+hypre+mpi~debug`, `sundials@2.6:6.7.0`
/// or `py-boutdata@0.3.0:`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    pub name: String,
    pub version_range: VersionRange,
    /// Constraints the chosen target's own variants must satisfy
    pub variant_constraints: Condition,
}

impl TargetSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version_range: VersionRange::Any,
            variant_constraints: Condition::Always,
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let end = s.find(['@', '+', '~', '!', '%', ' ']).unwrap_or(s.len());
        let name = &s[..end];
        if name.is_empty() {
            return Err(Error::ParseError(format!(
                "Missing package name in dependency '{}'",
                s
            )));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(Error::ParseError(format!(
                "Invalid package name '{}' in dependency '{}'",
                name, s
            )));
        }

        let mut ranges = Vec::new();
        let mut constraints = Vec::new();
        for atom in Condition::parse(&s[end..])?.into_atoms() {
            match atom {
                Condition::Version(range) => ranges.push(range),
                Condition::Platform(_) | Condition::Target(_) => {
                    return Err(Error::ParseError(format!(
                        "Platform constraints are not allowed on dependency '{}'",
                        s
                    )));
                }
                other => constraints.push(other),
            }
        }

        let version_range = match ranges.len() {
            0 => VersionRange::Any,
            1 => ranges.remove(0),
            _ => VersionRange::All(ranges),
        };

        Ok(Self {
            name: name.to_string(),
            version_range,
            variant_constraints: Condition::from_atoms(constraints),
        })
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.version_range.is_any() {
            write!(f, "@{}", self.version_range)?;
        }
        // Boolean atoms read naturally juxtaposed; key=value atoms need a space
        for atom in self.variant_constraints.atoms() {
            match atom {
                Condition::Enabled(_) | Condition::Disabled(_) | Condition::Compiler { .. } => {
                    write!(f, "{}", atom)?
                }
                other => write!(f, " {}", other)?,
            }
        }
        Ok(())
    }
}

impl FromStr for TargetSpec {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        TargetSpec::parse(s)
    }
}

/// One `depends_on` declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub target: TargetSpec,
    pub types: DepTypes,
    /// Condition on the declaring recipe under which this edge exists
    pub when: Condition,
    /// Declared only if the target is known when the repository loads
    pub if_available: bool,
}

impl Dependency {
    /// An unconditional `build,link` dependency on `spec`
    pub fn new(spec: &str) -> Result<Self> {
        Ok(Self {
            target: TargetSpec::parse(spec)?,
            types: DepTypes::default(),
            when: Condition::Always,
            if_available: false,
        })
    }

    pub fn with_types(mut self, types: DepTypes) -> Self {
        self.types = types;
        self
    }

    pub fn when(mut self, when: Condition) -> Self {
        self.when = when;
        self
    }

    pub fn if_available(mut self) -> Self {
        self.if_available = true;
        self
    }

    /// Name of the target package
    pub fn name(&self) -> &str {
        &self.target.name
    }

    /// Whether this edge is active for the declaring recipe's configuration
    pub fn is_active(&self, env: &ConditionEnv<'_>) -> bool {
        self.when.evaluate(env)
    }

    /// Whether a build must be handed an installed path for this dependency
    ///
    /// `build` and `link` dependencies are needed by every build phase;
    /// `test` dependencies only when the package's tests run.
    pub fn needed_for_build(&self, run_tests: bool) -> bool {
        self.types.intersects(&[DepType::Build, DepType::Link])
            || (run_tests && self.types.contains(DepType::Test))
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (type={})", self.target, self.types)?;
        if !self.when.is_always() {
            write!(f, " when {}", self.when)?;
        }
        if self.if_available {
            write!(f, " [if available]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::{VariantMap, VariantValue};
    use crate::version::Version;

    #[test]
    fn test_target_spec_plain_name() {
        let spec = TargetSpec::parse("netcdf-cxx4").unwrap();
        assert_eq!(spec.name, "netcdf-cxx4");
        assert!(spec.version_range.is_any());
        assert!(spec.variant_constraints.is_always());
    }

    #[test]
    fn test_target_spec_version_range() {
        let spec = TargetSpec::parse("sundials@2.6:6.7.0").unwrap();
        assert_eq!(spec.name, "sundials");
        assert!(spec.version_range.satisfies(&Version::parse("5.8.0").unwrap()));
        assert!(!spec.version_range.satisfies(&Version::parse("7.0").unwrap()));
    }

    #[test]
    fn test_target_spec_variant_constraints() {
        let spec = TargetSpec::parse("petsc+hypre+mpi~debug~fortran").unwrap();
        assert_eq!(spec.name, "petsc");
        assert_eq!(spec.variant_constraints.atoms().len(), 4);

        let satisfying = VariantMap::new()
            .with("hypre", VariantValue::Bool(true))
            .with("mpi", VariantValue::Bool(true))
            .with("debug", VariantValue::Bool(false))
            .with("fortran", VariantValue::Bool(false));
        assert!(spec
            .variant_constraints
            .evaluate(&ConditionEnv::new(&satisfying)));

        let debug = satisfying.clone().with("debug", VariantValue::Bool(true));
        assert!(!spec.variant_constraints.evaluate(&ConditionEnv::new(&debug)));
    }

    #[test]
    fn test_target_spec_mixed() {
        let spec = TargetSpec::parse("petsc@3.7:3.23+mpi").unwrap();
        assert_eq!(spec.to_string(), "petsc@3.7:3.23+mpi");
        let spec = TargetSpec::parse("boutpp@5: limiter=MC").unwrap();
        assert_eq!(spec.to_string(), "boutpp@5: limiter=MC");
    }

    #[test]
    fn test_target_spec_errors() {
        assert!(TargetSpec::parse("").is_err());
        assert!(TargetSpec::parse("@1.0").is_err());
        assert!(TargetSpec::parse("pet$c").is_err());
        assert!(TargetSpec::parse("petsc platform=linux").is_err());
    }

    #[test]
    fn test_dep_types_parse() {
        let types = DepTypes::parse("build,link").unwrap();
        assert!(types.contains(DepType::Build));
        assert!(types.contains(DepType::Link));
        assert!(!types.contains(DepType::Run));
        assert_eq!(types.to_string(), "build,link");
        assert!(DepTypes::parse("").is_err());
        assert!(DepTypes::parse("runtime").is_err());
    }

    #[test]
    fn test_dep_types_serde() {
        let types: DepTypes = serde_json::from_str(r#"["run","build"]"#).unwrap();
        assert_eq!(types.to_string(), "build,run");
        assert!(serde_json::from_str::<DepTypes>("[]").is_err());
    }

    #[test]
    fn test_dependency_activation() {
        let dep = Dependency::new("sundials")
            .unwrap()
            .when(Condition::parse("+sundials").unwrap());

        let on = VariantMap::new().with("sundials", VariantValue::Bool(true));
        let off = VariantMap::new().with("sundials", VariantValue::Bool(false));
        assert!(dep.is_active(&ConditionEnv::new(&on)));
        assert!(!dep.is_active(&ConditionEnv::new(&off)));
    }

    #[test]
    fn test_needed_for_build() {
        let run_only = Dependency::new("py-xhermes")
            .unwrap()
            .with_types(DepTypes::only(DepType::Run));
        assert!(!run_only.needed_for_build(false));

        let test_only = Dependency::new("py-pytest")
            .unwrap()
            .with_types(DepTypes::only(DepType::Test));
        assert!(!test_only.needed_for_build(false));
        assert!(test_only.needed_for_build(true));

        let cmake = Dependency::new("cmake@3.24:")
            .unwrap()
            .with_types(DepTypes::only(DepType::Build));
        assert!(cmake.needed_for_build(false));
    }

    #[test]
    fn test_dependency_display() {
        let dep = Dependency::new("petsc+mpi")
            .unwrap()
            .when(Condition::parse("+petsc").unwrap());
        assert_eq!(dep.to_string(), "petsc+mpi (type=build,link) when +petsc");
    }
}
