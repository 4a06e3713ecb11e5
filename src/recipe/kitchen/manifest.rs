// src/recipe/kitchen/manifest.rs

//! The install marker written into a prefix after a successful build
//!
//! A prefix counts as installed exactly when it holds this marker. The
//! kitchen writes it last, so an interrupted or failed build never leaves a
//! prefix that looks installed.

use crate::error::{Error, Result};
use crate::recipe::{BuildContext, BuildPhase, PackageRecipe};
use crate::variant::VariantMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory inside the prefix that holds pantry's own files
pub const MARKER_DIR: &str = ".pantry";
const MARKER_FILE: &str = "install.json";

/// Record of one completed build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallManifest {
    pub name: String,
    pub version: String,
    pub variants: VariantMap,
    pub dependencies: BTreeMap<String, PathBuf>,
    /// Digest of the recipe declarations the build used
    pub fingerprint: String,
    pub platform: String,
    /// Phases that ran at least one command
    pub phases: Vec<BuildPhase>,
    pub installed_at: DateTime<Utc>,
}

impl InstallManifest {
    pub fn new(recipe: &PackageRecipe, context: &BuildContext, phases: Vec<BuildPhase>) -> Self {
        Self {
            name: recipe.name().to_string(),
            version: context.version.to_string(),
            variants: context.variants.clone(),
            dependencies: context.dependencies.clone(),
            fingerprint: recipe.fingerprint(),
            platform: context.platform.to_string(),
            phases,
            installed_at: Utc::now(),
        }
    }

    /// Location of the marker inside `prefix`
    pub fn path_in(prefix: &Path) -> PathBuf {
        prefix.join(MARKER_DIR).join(MARKER_FILE)
    }

    pub fn is_installed(prefix: &Path) -> bool {
        Self::path_in(prefix).is_file()
    }

    /// Write the marker, replacing it atomically
    pub fn write(&self, prefix: &Path) -> Result<PathBuf> {
        let path = Self::path_in(prefix);
        let dir = prefix.join(MARKER_DIR);
        fs::create_dir_all(&dir)?;

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::IoError(format!("Failed to serialize install manifest: {}", e)))?;
        let tmp = dir.join(format!("{}.tmp", MARKER_FILE));
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        Ok(path)
    }

    pub fn load(prefix: &Path) -> Result<Self> {
        let path = Self::path_in(prefix);
        let content = fs::read_to_string(&path).map_err(|e| {
            Error::NotFound(format!("No install manifest at {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            Error::ParseError(format!("Invalid install manifest {}: {}", path.display(), e))
        })
    }
}
