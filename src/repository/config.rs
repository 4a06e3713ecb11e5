// src/repository/config.rs
//! Repository configuration (`repo.toml`)

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File name of the repository configuration at the repository root
pub const REPO_CONFIG_FILE: &str = "repo.toml";

/// Contents of `repo.toml`
///
/// ```toml
/// namespace = "bout"
/// externals = ["cmake", "mpi", "fftw"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepoConfig {
    pub namespace: String,

    /// Packages provided outside this repository
    #[serde(default)]
    pub externals: Vec<String>,

    /// Directory holding one subdirectory per recipe
    #[serde(default = "default_packages_dir")]
    pub packages_dir: String,
}

fn default_packages_dir() -> String {
    "packages".to_string()
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            namespace: "local".to_string(),
            externals: Vec::new(),
            packages_dir: default_packages_dir(),
        }
    }
}

impl RepoConfig {
    pub fn parse(content: &str) -> Result<Self> {
        let config: RepoConfig = toml::from_str(content)
            .map_err(|e| Error::ParseError(format!("Invalid {}: {}", REPO_CONFIG_FILE, e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read `repo.toml` from a repository root
    ///
    /// A root without one gets the default configuration.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(REPO_CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::IoError(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::parse(&content).map_err(|e| match e {
            Error::ParseError(msg) => Error::ParseError(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() {
            return Err(Error::ParseError("Repository namespace is empty".to_string()));
        }
        let packages = Path::new(&self.packages_dir);
        if packages.is_absolute() || packages.components().any(|c| c.as_os_str() == "..") {
            return Err(Error::ParseError(format!(
                "packages_dir must stay inside the repository: {}",
                self.packages_dir
            )));
        }
        Ok(())
    }
}
