// src/recipe/source.rs

//! Version descriptors and where their sources come from
//!
//! Fetching and checksum verification belong to the engine driving the
//! build; these types only describe the source so it can be introspected.

use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A git reference pinned by a version declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GitRef {
    Tag(String),
    Branch(String),
    Commit(String),
}

impl fmt::Display for GitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GitRef::Tag(t) => write!(f, "tag={}", t),
            GitRef::Branch(b) => write!(f, "branch={}", b),
            GitRef::Commit(c) => write!(f, "commit={}", c),
        }
    }
}

/// Where the source tree of one version comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceLocator {
    /// A release archive
    Url { url: String },
    /// A checkout of a git repository
    Git {
        url: String,
        reference: GitRef,
        #[serde(default)]
        submodules: bool,
    },
}

impl SourceLocator {
    pub fn url(url: impl Into<String>) -> Self {
        SourceLocator::Url { url: url.into() }
    }

    pub fn git(url: impl Into<String>, reference: GitRef) -> Self {
        SourceLocator::Git {
            url: url.into(),
            reference,
            submodules: false,
        }
    }

    /// Also check out submodules (no effect on archives)
    pub fn with_submodules(mut self) -> Self {
        if let SourceLocator::Git { submodules, .. } = &mut self {
            *submodules = true;
        }
        self
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocator::Url { url } => write!(f, "{}", url),
            SourceLocator::Git {
                url,
                reference,
                submodules,
            } => {
                write!(f, "{} ({})", url, reference)?;
                if *submodules {
                    write!(f, " +submodules")?;
                }
                Ok(())
            }
        }
    }
}

/// One buildable version of a recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDescriptor {
    pub identifier: Version,
    pub source: SourceLocator,
    /// Checksum token such as `sha256:<hex>`, verified by the fetcher
    #[serde(default)]
    pub integrity: Option<String>,
    /// Picked when the engine has no other preference
    #[serde(default)]
    pub preferred: bool,
}

impl VersionDescriptor {
    pub fn new(identifier: Version, source: SourceLocator) -> Self {
        Self {
            identifier,
            source,
            integrity: None,
            preferred: false,
        }
    }

    pub fn with_integrity(mut self, integrity: impl Into<String>) -> Self {
        self.integrity = Some(integrity.into());
        self
    }

    pub fn preferred(mut self) -> Self {
        self.preferred = true;
        self
    }
}
