// src/error.rs

//! Error types shared across the recipe model, repository, and kitchen

use crate::recipe::BuildPhase;
use crate::repository::Violation;
use thiserror::Error;

/// Errors raised while declaring, loading, or building recipes
#[derive(Debug, Error)]
pub enum Error {
    /// A recipe declared the same version identifier twice
    #[error("Duplicate version '{version}' in recipe '{recipe}'")]
    DuplicateVersion { recipe: String, version: String },

    /// A recipe declared two variants with the same name
    #[error("Duplicate variant '{variant}' in recipe '{recipe}'")]
    DuplicateVariant { recipe: String, variant: String },

    /// A variant default is not one of its allowed values
    #[error("Invalid default '{default}' for variant '{variant}' in recipe '{recipe}' (allowed: {allowed})")]
    InvalidDefault {
        recipe: String,
        variant: String,
        default: String,
        allowed: String,
    },

    /// A condition or assignment names a variant the recipe never declared
    #[error("Variant '{variant}' is not declared by recipe '{recipe}'")]
    UndeclaredVariant { recipe: String, variant: String },

    /// A condition or assignment uses a value the variant does not allow
    #[error("Invalid value '{value}' for variant '{variant}' in recipe '{recipe}'")]
    InvalidVariantValue {
        recipe: String,
        variant: String,
        value: String,
    },

    /// Lookup of a package name that the repository does not hold
    #[error("Unknown package: {0}")]
    UnknownPackage(String),

    /// Aggregate load-time validation failure
    #[error("Repository validation failed with {} violation(s):\n{}", .violations.len(), format_violations(.violations))]
    RepositoryValidation { violations: Vec<Violation> },

    /// A build phase terminated abnormally
    #[error("{phase} phase failed with exit status {}", format_status(.exit_status))]
    BuildFailure {
        phase: BuildPhase,
        exit_status: Option<i32>,
        captured_output: String,
    },

    /// The build context lacks a path for a dependency active at build time
    #[error("No installed path provided for dependency '{dependency}' of '{recipe}'")]
    MissingDependency { recipe: String, dependency: String },

    /// The build context does not fit the recipe it was handed to
    #[error("Invalid build context: {0}")]
    InvalidContext(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IoError(e.to_string())
    }
}

impl Error {
    /// Captured build output, if this is a build failure
    pub fn captured_output(&self) -> Option<&str> {
        match self {
            Error::BuildFailure {
                captured_output, ..
            } => Some(captured_output),
            _ => None,
        }
    }
}

fn format_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "none (killed or timed out)".to_string(),
    }
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| format!("  - {}", v))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
