// src/commands/info.rs
//! Show one recipe

use super::open_repository;
use anyhow::Result;
use pantry::VariantKind;
use std::path::Path;

pub fn cmd_info(repo: &Path, package: &str) -> Result<()> {
    let repository = open_repository(repo)?;
    let recipe = repository.get(package)?;
    let meta = &recipe.metadata;

    println!("Package: {}", recipe.name());
    if !meta.description.is_empty() {
        println!("  {}", meta.description);
    }
    if let Some(homepage) = &meta.homepage {
        println!("Homepage: {}", homepage);
    }
    if let Some(license) = &meta.license {
        println!("License: {}", license);
    }
    if !meta.maintainers.is_empty() {
        println!("Maintainers: {}", meta.maintainers.join(", "));
    }
    println!("Build system: {}", recipe.procedure().system);

    println!();
    println!("Versions:");
    let preferred = recipe.preferred_version().map(|v| &v.identifier);
    for version in recipe.versions().rev() {
        let marker = if Some(&version.identifier) == preferred { " [preferred]" } else { "" };
        println!("  {:<10} {}{}", version.identifier, version.source, marker);
    }

    if !recipe.variants().is_empty() {
        println!();
        println!("Variants:");
        for variant in recipe.variants() {
            let values = match &variant.kind {
                VariantKind::Bool => "on, off".to_string(),
                VariantKind::Single(values) => values.join(", "),
                VariantKind::Multi(values) => format!("any of {}", values.join(", ")),
            };
            println!(
                "  {:<20} [{}] ({})  {}",
                variant.name, variant.default, values, variant.description
            );
        }
    }

    if !recipe.dependencies().is_empty() {
        println!();
        println!("Dependencies:");
        for dep in recipe.dependencies() {
            let origin = if repository.contains(dep.name()) { "" } else { "  (external)" };
            println!("  {}{}", dep, origin);
        }
    }

    let procedure = recipe.procedure();
    if !procedure.patches.is_empty() {
        println!();
        println!("Patches:");
        for patch in &procedure.patches {
            if patch.when.is_always() {
                println!("  {}", patch.file);
            } else {
                println!("  {} when {}", patch.file, patch.when);
            }
        }
    }

    let dependents = repository.dependents(package)?;
    if !dependents.is_empty() {
        println!();
        println!(
            "Needed by: {}",
            dependents.into_iter().collect::<Vec<_>>().join(", ")
        );
    }
    Ok(())
}
