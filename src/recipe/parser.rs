// src/recipe/parser.rs

//! Recipe file parsing
//!
//! A recipe file is applied to a fresh [`PackageRecipe`] in a fixed order:
//! versions, variants, dependencies, then the build procedure. Conditions
//! are checked against variants as they are declared, so variants always
//! come before anything that mentions them.

use crate::dependency::Dependency;
use crate::error::{Error, Result};
use crate::recipe::build::{BuildProcedure, ConfigureArg, Patch, PhaseAction, PhaseOverride};
use crate::recipe::format::{
    ActionKind, ConfigureArgEntry, PhaseEntry, RecipeFile, TomlValue, VariantEntry, VersionEntry,
};
use crate::recipe::package::{PackageRecipe, RecipeMetadata};
use crate::recipe::source::{GitRef, SourceLocator};
use crate::variant::{Condition, Variant};
use std::path::Path;

/// Parse a recipe from a TOML string
pub fn parse_recipe(content: &str) -> Result<PackageRecipe> {
    let file: RecipeFile =
        toml::from_str(content).map_err(|e| Error::ParseError(format!("Invalid recipe: {}", e)))?;
    build_recipe(&file)
}

/// Parse a recipe from a file
///
/// The recipe's directory (where its patches live) is set to the file's
/// parent directory.
pub fn parse_recipe_file(path: &Path) -> Result<PackageRecipe> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::IoError(format!("Failed to read recipe file {}: {}", path.display(), e))
    })?;

    let mut recipe = parse_recipe(&content).map_err(|e| match e {
        Error::ParseError(msg) => Error::ParseError(format!("{}: {}", path.display(), msg)),
        other => other,
    })?;
    if let Some(dir) = path.parent() {
        recipe.set_recipe_dir(dir);
    }
    Ok(recipe)
}

/// Turn a deserialized recipe file into a declared recipe
pub fn build_recipe(file: &RecipeFile) -> Result<PackageRecipe> {
    let pkg = &file.package;
    if !is_valid_name(&pkg.name) {
        return Err(Error::ParseError(format!(
            "Invalid package name '{}'",
            pkg.name
        )));
    }

    let mut recipe = PackageRecipe::new(&pkg.name);
    recipe.metadata = RecipeMetadata {
        description: pkg.description.trim().to_string(),
        homepage: pkg.homepage.clone(),
        git: pkg.git.clone(),
        url: pkg.url.clone(),
        maintainers: pkg.maintainers.clone(),
        license: pkg.license.clone(),
    };
    recipe.set_procedure(BuildProcedure::new(pkg.build_system));

    for entry in &file.versions {
        let source = source_for(entry, pkg.git.as_deref())?;
        let integrity = entry.sha256.as_ref().map(|h| format!("sha256:{}", h));
        let descriptor = recipe.declare_version(&entry.id, source, integrity.as_deref())?;
        descriptor.preferred = entry.preferred;
    }

    for entry in &file.variants {
        recipe.declare_variant(variant_for(&recipe, entry)?)?;
    }

    for entry in &file.depends_on {
        let mut dep = Dependency::new(&entry.spec)?.when(parse_when(entry.when.as_deref())?);
        if let Some(types) = &entry.types {
            dep = dep.with_types(types.to_dep_types()?);
        }
        if entry.if_available {
            dep = dep.if_available();
        }
        recipe.declare_dependency(dep)?;
    }

    for entry in &file.patches {
        let mut patch = Patch::new(&entry.file).when(parse_when(entry.when.as_deref())?);
        patch.level = entry.level;
        recipe.declare_patch(patch)?;
    }

    for entry in &file.configure_arg {
        recipe.declare_configure_arg(configure_arg_for(entry)?)?;
    }

    for entry in &file.phases {
        recipe.declare_override(override_for(entry)?)?;
    }

    Ok(recipe)
}

/// Warnings about a recipe that loads but looks incomplete
pub fn validate_recipe(recipe: &PackageRecipe) -> Vec<String> {
    let mut warnings = Vec::new();

    if recipe.versions().len() == 0 {
        warnings.push("No versions declared".to_string());
    }
    if recipe.metadata.description.is_empty() {
        warnings.push("Missing package description".to_string());
    }
    if recipe.metadata.license.is_none() {
        warnings.push("Missing package license".to_string());
    }

    for desc in recipe.versions() {
        if let SourceLocator::Url { url } = &desc.source {
            match &desc.integrity {
                None => warnings.push(format!(
                    "Version {} downloads {} without a checksum",
                    desc.identifier, url
                )),
                Some(token) if !is_valid_sha256(token) => warnings.push(format!(
                    "Version {} has a malformed checksum: {}",
                    desc.identifier, token
                )),
                Some(_) => {}
            }
        }
    }

    warnings
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.'))
}

fn is_valid_sha256(token: &str) -> bool {
    token
        .strip_prefix("sha256:")
        .is_some_and(|h| h.len() == 64 && hex::decode(h).is_ok())
}

fn parse_when(when: Option<&str>) -> Result<Condition> {
    when.map_or(Ok(Condition::Always), Condition::parse)
}

fn source_for(entry: &VersionEntry, default_git: Option<&str>) -> Result<SourceLocator> {
    let reference = match (&entry.tag, &entry.branch, &entry.commit) {
        (Some(tag), None, None) => Some(GitRef::Tag(tag.clone())),
        (None, Some(branch), None) => Some(GitRef::Branch(branch.clone())),
        (None, None, Some(commit)) => Some(GitRef::Commit(commit.clone())),
        (None, None, None) => None,
        _ => {
            return Err(Error::ParseError(format!(
                "Version '{}' names more than one of tag, branch and commit",
                entry.id
            )));
        }
    };

    match (reference, &entry.url) {
        (Some(reference), None) => {
            let url = entry.git.as_deref().or(default_git).ok_or_else(|| {
                Error::ParseError(format!(
                    "Version '{}' uses git but the recipe has no git repository",
                    entry.id
                ))
            })?;
            let source = SourceLocator::git(url, reference);
            Ok(if entry.submodules {
                source.with_submodules()
            } else {
                source
            })
        }
        (None, Some(url)) => Ok(SourceLocator::url(url)),
        (Some(_), Some(_)) => Err(Error::ParseError(format!(
            "Version '{}' names both a url and a git reference",
            entry.id
        ))),
        (None, None) => Err(Error::ParseError(format!(
            "Version '{}' needs one of tag, branch, commit or url",
            entry.id
        ))),
    }
}

fn variant_for(recipe: &PackageRecipe, entry: &VariantEntry) -> Result<Variant> {
    let invalid_default = || Error::InvalidDefault {
        recipe: recipe.name().to_string(),
        variant: entry.name.clone(),
        default: entry.default.to_string(),
        allowed: entry.values.join(", "),
    };

    if entry.values.is_empty() {
        return match entry.default {
            TomlValue::Bool(default) => Ok(Variant::boolean(&entry.name, default, &entry.description)),
            _ => Err(Error::InvalidDefault {
                recipe: recipe.name().to_string(),
                variant: entry.name.clone(),
                default: entry.default.to_string(),
                allowed: "true, false".to_string(),
            }),
        };
    }

    if entry.multi {
        let defaults: Vec<String> = match &entry.default {
            TomlValue::Text(s) => s.split(',').map(|v| v.trim().to_string()).collect(),
            TomlValue::List(items) => items.clone(),
            TomlValue::Bool(_) => return Err(invalid_default()),
        };
        Ok(Variant::multi(
            &entry.name,
            entry.values.iter().cloned(),
            defaults,
            &entry.description,
        ))
    } else {
        match &entry.default {
            TomlValue::Text(s) => Ok(Variant::single(
                &entry.name,
                entry.values.iter().cloned(),
                s.clone(),
                &entry.description,
            )),
            _ => Err(invalid_default()),
        }
    }
}

fn configure_arg_for(entry: &ConfigureArgEntry) -> Result<ConfigureArg> {
    let name = entry.define.clone();
    match (&entry.value, &entry.from_variant, &entry.when) {
        (Some(value), None, None) => Ok(ConfigureArg::Define {
            name,
            value: value.to_define(),
        }),
        (None, Some(variant), None) => Ok(ConfigureArg::from_variant(name, variant)),
        (None, None, Some(when)) => {
            let (Some(then), Some(otherwise)) = (&entry.then, &entry.otherwise) else {
                return Err(Error::ParseError(format!(
                    "Conditional configure argument '{}' needs both then and otherwise",
                    entry.define
                )));
            };
            Ok(ConfigureArg::Conditional {
                name,
                when: Condition::parse(when)?,
                then: then.to_define(),
                otherwise: otherwise.to_define(),
            })
        }
        _ => Err(Error::ParseError(format!(
            "Configure argument '{}' needs exactly one of value, from_variant or when",
            entry.define
        ))),
    }
}

fn override_for(entry: &PhaseEntry) -> Result<PhaseOverride> {
    let action = match entry.action {
        ActionKind::Skip => PhaseAction::Skip,
        ActionKind::Replace => PhaseAction::Replace(entry.commands.clone()),
        ActionKind::Extend => {
            if entry.before.is_empty() && entry.after.is_empty() {
                return Err(Error::ParseError(format!(
                    "Extending the {} phase needs before or after commands",
                    entry.name
                )));
            }
            PhaseAction::Extend {
                before: entry.before.clone(),
                after: entry.after.clone(),
            }
        }
    };
    Ok(PhaseOverride {
        phase: entry.name,
        when: parse_when(entry.when.as_deref())?,
        action,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::DepType;
    use crate::recipe::BuildPhase;
    use crate::variant::{ConditionEnv, VariantValue};
    use crate::version::Version;

    const LIBB: &str = r#"
[package]
name = "libb"
description = "Second test library"
git = "https://example.org/libb.git"
license = "MIT"

[[version]]
id = "1.0"
tag = "v1.0"

[[version]]
id = "main"
branch = "main"
submodules = true
preferred = true

[[variant]]
name = "shared"
default = true
description = "Build shared libraries"

[[variant]]
name = "limiter"
default = "MC"
values = ["MC", "MinMod"]

[[depends_on]]
spec = "liba@>=1.0 shared=true"
type = "build"

[[depends_on]]
spec = "py-tools"
type = ["run"]
when = "limiter=MinMod"

[[patch]]
file = "fix-build.patch"
when = "@1.0"

[[configure_arg]]
define = "LIBB_SHARED"
from_variant = "shared"

[[configure_arg]]
define = "LIBB_FAST"
when = "limiter=MC"
then = true
otherwise = false

[[phase]]
name = "check"
action = "replace"
commands = ["ctest --test-dir %(build_dir)s -L quick"]
"#;

    #[test]
    fn test_parse_full_recipe() {
        let recipe = parse_recipe(LIBB).unwrap();
        assert_eq!(recipe.name(), "libb");
        assert_eq!(recipe.metadata.license.as_deref(), Some("MIT"));
        assert_eq!(recipe.versions().len(), 2);
        assert_eq!(recipe.preferred_version().unwrap().identifier.as_str(), "main");

        let main = recipe.version(&Version::parse("main").unwrap()).unwrap();
        assert_eq!(
            main.source,
            SourceLocator::git("https://example.org/libb.git", GitRef::Branch("main".into()))
                .with_submodules()
        );

        assert_eq!(recipe.variants().len(), 2);
        let liba = recipe.dependencies_on("liba");
        assert_eq!(liba.len(), 1);
        assert!(liba[0].types.contains(DepType::Build));
        assert!(!liba[0].types.contains(DepType::Link));
        assert!(liba[0]
            .target
            .version_range
            .satisfies(&Version::parse("1.0").unwrap()));

        let procedure = recipe.procedure();
        assert_eq!(procedure.patches.len(), 1);
        assert_eq!(procedure.configure_args.len(), 2);
        assert_eq!(procedure.overrides[0].phase, BuildPhase::Check);
    }

    #[test]
    fn test_parse_defaults_to_build_link() {
        let recipe = parse_recipe(
            r#"
[package]
name = "liba"

[[depends_on]]
spec = "zlib"
"#,
        )
        .unwrap();
        assert_eq!(recipe.dependencies()[0].types.to_string(), "build,link");
    }

    #[test]
    fn test_parse_variant_conditions_evaluate() {
        let recipe = parse_recipe(LIBB).unwrap();
        let variants = recipe
            .resolve_variants(&[("limiter".to_string(), "MinMod".to_string())])
            .unwrap();
        let names: Vec<&str> = recipe
            .active_dependencies(&ConditionEnv::new(&variants))
            .into_iter()
            .map(|d| d.name())
            .collect();
        assert_eq!(names, vec!["liba", "py-tools"]);
        assert_eq!(
            variants.get("limiter"),
            Some(&VariantValue::Single("MinMod".into()))
        );
    }

    #[test]
    fn test_parse_duplicate_version() {
        let err = parse_recipe(
            r#"
[package]
name = "liba"
url = "https://example.org"

[[version]]
id = "1.0"
url = "https://example.org/liba-1.0.tar.gz"

[[version]]
id = "1.0"
url = "https://example.org/liba-1.0.tar.gz"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::DuplicateVersion { .. }));
    }

    #[test]
    fn test_parse_invalid_default() {
        let err = parse_recipe(
            r#"
[package]
name = "liba"

[[variant]]
name = "mode"
default = "foo"
values = ["on", "off"]
"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidDefault { .. }));

        let err = parse_recipe(
            r#"
[package]
name = "liba"

[[variant]]
name = "shared"
default = "yes"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidDefault { .. }));
        assert!(err.to_string().contains("Invalid default 'yes'"), "{}", err);

        let err = parse_recipe(
            r#"
[package]
name = "liba"

[[variant]]
name = "precision"
default = ["single", "double"]
values = ["single", "double"]
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Invalid default 'single,double'"), "{}", err);
    }

    #[test]
    fn test_parse_undeclared_variant_in_when() {
        let err = parse_recipe(
            r#"
[package]
name = "liba"

[[depends_on]]
spec = "cuda"
when = "+cuda"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::UndeclaredVariant { .. }));
    }

    #[test]
    fn test_parse_source_errors() {
        let both = r#"
[package]
name = "liba"
git = "https://example.org/liba.git"

[[version]]
id = "1.0"
tag = "v1.0"
branch = "main"
"#;
        assert!(matches!(parse_recipe(both), Err(Error::ParseError(_))));

        let no_git = r#"
[package]
name = "liba"

[[version]]
id = "1.0"
tag = "v1.0"
"#;
        assert!(matches!(parse_recipe(no_git), Err(Error::ParseError(_))));

        let nothing = r#"
[package]
name = "liba"

[[version]]
id = "1.0"
"#;
        assert!(matches!(parse_recipe(nothing), Err(Error::ParseError(_))));
    }

    #[test]
    fn test_parse_invalid_toml() {
        assert!(parse_recipe("this is not valid toml at all {}").is_err());
        assert!(parse_recipe("[package]\nname = \"Bad Name\"\n").is_err());
    }

    #[test]
    fn test_validate_recipe_warnings() {
        let recipe = parse_recipe(
            r#"
[package]
name = "liba"

[[version]]
id = "1.0"
url = "https://example.org/liba-1.0.tar.gz"

[[version]]
id = "2.0"
url = "https://example.org/liba-2.0.tar.gz"
sha256 = "abc"
"#,
        )
        .unwrap();
        let warnings = validate_recipe(&recipe);
        assert!(warnings.iter().any(|w| w.contains("description")));
        assert!(warnings.iter().any(|w| w.contains("license")));
        assert!(warnings.iter().any(|w| w.contains("without a checksum")));
        assert!(warnings.iter().any(|w| w.contains("malformed")));

        assert!(validate_recipe(&parse_recipe(LIBB).unwrap()).is_empty());
    }
}
