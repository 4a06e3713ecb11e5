// src/platform.rs

//! Target platform and compiler descriptors handed in by the build engine

use crate::error::{Error, Result};
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A compiler the engine selected for one build (`gcc@12.2.0`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compiler {
    pub name: String,
    pub version: Version,
    /// C compiler executable, exported as `CC`
    #[serde(default)]
    pub cc: Option<String>,
    /// C++ compiler executable, exported as `CXX`
    #[serde(default)]
    pub cxx: Option<String>,
}

impl Compiler {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            cc: None,
            cxx: None,
        }
    }

    /// Parse `name@version`
    pub fn parse(s: &str) -> Result<Self> {
        let (name, version) = s.trim().split_once('@').ok_or_else(|| {
            Error::ParseError(format!("Compiler '{}' must be written as name@version", s))
        })?;
        if name.is_empty() {
            return Err(Error::ParseError(format!("Missing compiler name in '{}'", s)));
        }
        Ok(Self::new(name, Version::parse(version)?))
    }

    pub fn with_executables(mut self, cc: impl Into<String>, cxx: impl Into<String>) -> Self {
        self.cc = Some(cc.into());
        self.cxx = Some(cxx.into());
        self
    }
}

impl fmt::Display for Compiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Operating system, architecture and compiler of one concrete build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    /// Operating system family (`linux`, `darwin`)
    pub os: String,
    /// Target architecture (`x86_64`, `aarch64`)
    pub arch: String,
    #[serde(default)]
    pub compiler: Option<Compiler>,
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
            compiler: None,
        }
    }

    pub fn with_compiler(mut self, compiler: Compiler) -> Self {
        self.compiler = Some(compiler);
        self
    }

    /// Describe the machine this process runs on
    pub fn detect() -> Self {
        let os = match std::env::consts::OS {
            "macos" => "darwin",
            other => other,
        };
        Self::new(os, std::env::consts::ARCH)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "platform={} target={}", self.os, self.arch)?;
        if let Some(compiler) = &self.compiler {
            write!(f, " %{}", compiler)?;
        }
        Ok(())
    }
}
