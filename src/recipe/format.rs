// src/recipe/format.rs

//! Recipe file format definitions
//!
//! Recipes are TOML files, one per package, at `packages/<name>/package.toml`.
//! Each table array maps onto one kind of `declare_*` call on
//! [`crate::recipe::PackageRecipe`]; see [`crate::recipe::parser`] for how they
//! are applied.

use crate::dependency::DepTypes;
use crate::error::{Error, Result};
use crate::recipe::build::{BuildPhase, BuildSystem, DefineValue};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A complete recipe file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecipeFile {
    pub package: PackageSection,

    #[serde(default, rename = "version")]
    pub versions: Vec<VersionEntry>,

    #[serde(default, rename = "variant")]
    pub variants: Vec<VariantEntry>,

    #[serde(default)]
    pub depends_on: Vec<DependsOnEntry>,

    #[serde(default, rename = "patch")]
    pub patches: Vec<PatchEntry>,

    #[serde(default)]
    pub configure_arg: Vec<ConfigureArgEntry>,

    #[serde(default, rename = "phase")]
    pub phases: Vec<PhaseEntry>,
}

/// `[package]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageSection {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub homepage: Option<String>,
    /// Repository used by versions that name a tag, branch or commit
    #[serde(default)]
    pub git: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub maintainers: Vec<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub build_system: BuildSystem,
}

/// `[[version]]`
///
/// Exactly one of `tag`, `branch`, `commit` or `url` says where the
/// source comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VersionEntry {
    pub id: String,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub commit: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Overrides `package.git` for this version
    #[serde(default)]
    pub git: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub submodules: bool,
    #[serde(default)]
    pub preferred: bool,
}

/// A value as written in TOML: `true`, `"MC"` or `["a", "b"]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TomlValue {
    Bool(bool),
    Text(String),
    List(Vec<String>),
}

impl TomlValue {
    /// Interpret as a configure define value; lists use CMake's `;` separator
    pub fn to_define(&self) -> DefineValue {
        match self {
            TomlValue::Bool(b) => DefineValue::Bool(*b),
            TomlValue::Text(s) => DefineValue::Text(s.clone()),
            TomlValue::List(items) => DefineValue::Text(items.join(";")),
        }
    }
}

/// Written the way a value is given on the command line: `true`, `MC`, `a,b`
impl fmt::Display for TomlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TomlValue::Bool(b) => write!(f, "{}", b),
            TomlValue::Text(s) => write!(f, "{}", s),
            TomlValue::List(items) => write!(f, "{}", items.join(",")),
        }
    }
}

/// `[[variant]]`
///
/// A variant without `values` is boolean.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariantEntry {
    pub name: String,
    pub default: TomlValue,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub multi: bool,
}

/// `type = "run"` or `type = ["build", "link"]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn to_dep_types(&self) -> Result<DepTypes> {
        match self {
            OneOrMany::One(s) => DepTypes::parse(s),
            OneOrMany::Many(items) => DepTypes::parse(&items.join(",")),
        }
    }
}

/// `[[depends_on]]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DependsOnEntry {
    /// Target spec, e.g. `petsc@3.7:3.23+mpi`
    pub spec: String,
    #[serde(default, rename = "type")]
    pub types: Option<OneOrMany>,
    #[serde(default)]
    pub when: Option<String>,
    #[serde(default)]
    pub if_available: bool,
}

/// `[[patch]]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatchEntry {
    pub file: String,
    #[serde(default)]
    pub when: Option<String>,
    #[serde(default = "default_patch_level")]
    pub level: u32,
}

fn default_patch_level() -> u32 {
    1
}

/// `[[configure_arg]]`
///
/// Either `value`, `from_variant`, or `when` with `then` and `otherwise`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigureArgEntry {
    pub define: String,
    #[serde(default)]
    pub value: Option<TomlValue>,
    #[serde(default)]
    pub from_variant: Option<String>,
    #[serde(default)]
    pub when: Option<String>,
    #[serde(default)]
    pub then: Option<TomlValue>,
    #[serde(default)]
    pub otherwise: Option<TomlValue>,
}

/// What a `[[phase]]` entry does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Skip,
    Replace,
    Extend,
}

/// `[[phase]]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhaseEntry {
    pub name: BuildPhase,
    #[serde(default)]
    pub when: Option<String>,
    pub action: ActionKind,
    /// Replacement commands (`replace`)
    #[serde(default)]
    pub commands: Vec<String>,
    /// Commands run before the defaults (`extend`)
    #[serde(default)]
    pub before: Vec<String>,
    /// Commands run after the defaults (`extend`)
    #[serde(default)]
    pub after: Vec<String>,
}

impl RecipeFile {
    /// Serialize back to TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::ParseError(format!("Failed to serialize recipe: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal() {
        let file: RecipeFile = toml::from_str(
            r#"
[package]
name = "liba"
"#,
        )
        .unwrap();
        assert_eq!(file.package.name, "liba");
        assert_eq!(file.package.build_system, BuildSystem::CMake);
        assert!(file.versions.is_empty());
    }

    #[test]
    fn test_deserialize_values() {
        let file: RecipeFile = toml::from_str(
            r#"
[package]
name = "boutpp"
build_system = "cmake"

[[variant]]
name = "shared"
default = true

[[variant]]
name = "buildtests"
default = ["none"]
values = ["all", "default", "none"]
multi = true

[[depends_on]]
spec = "mpi"
type = ["build", "link", "run"]

[[depends_on]]
spec = "py-xhermes"
type = "run"
when = "+xhermes"
"#,
        )
        .unwrap();
        assert_eq!(file.variants[0].default, TomlValue::Bool(true));
        assert_eq!(
            file.variants[1].default,
            TomlValue::List(vec!["none".to_string()])
        );
        let types = file.depends_on[0].types.as_ref().unwrap().to_dep_types().unwrap();
        assert_eq!(types.to_string(), "build,link,run");
        let types = file.depends_on[1].types.as_ref().unwrap().to_dep_types().unwrap();
        assert_eq!(types.to_string(), "run");
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result: std::result::Result<RecipeFile, _> = toml::from_str(
            r#"
[package]
name = "liba"
versoin = "1.0"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_phase_entry() {
        let file: RecipeFile = toml::from_str(
            r#"
[package]
name = "liba"
build_system = "autotools"

[[phase]]
name = "install"
when = "platform=darwin"
action = "extend"
after = ["install_name_tool -id %(prefix)s/lib/liba.dylib %(prefix)s/lib/liba.dylib"]
"#,
        )
        .unwrap();
        assert_eq!(file.phases[0].name, BuildPhase::Install);
        assert_eq!(file.phases[0].action, ActionKind::Extend);
        assert_eq!(file.phases[0].after.len(), 1);
    }

    #[test]
    fn test_to_define() {
        assert_eq!(TomlValue::Bool(false).to_define(), DefineValue::Bool(false));
        assert_eq!(
            TomlValue::List(vec!["a".into(), "b".into()]).to_define(),
            DefineValue::Text("a;b".into())
        );
    }
}
