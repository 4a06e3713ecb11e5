// src/variant/condition.rs

//! Tagged predicates for `when` clauses
//!
//! Syntax follows the recipe conventions: `+petsc`, `~debug`, `limiter=MC`,
//! `buildtests!=all`, `@5.0.0`, `platform=linux`, `target=x86_64`, `%gcc@12:`. Atoms may be
//! juxtaposed (`+python~cuda`) or separated by whitespace; all of them must hold.

use super::VariantMap;
use crate::error::{Error, Result};
use crate::platform::Platform;
use crate::version::{Version, VersionRange};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Inputs a condition is evaluated against
///
/// Atoms whose input is absent (no version, no platform) evaluate to false.
#[derive(Debug, Clone, Copy)]
pub struct ConditionEnv<'a> {
    pub version: Option<&'a Version>,
    pub variants: &'a VariantMap,
    pub platform: Option<&'a Platform>,
}

impl<'a> ConditionEnv<'a> {
    pub fn new(variants: &'a VariantMap) -> Self {
        Self {
            version: None,
            variants,
            platform: None,
        }
    }

    pub fn with_version(mut self, version: &'a Version) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_platform(mut self, platform: &'a Platform) -> Self {
        self.platform = Some(platform);
        self
    }
}

/// A predicate over a recipe's variants, version and platform
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Condition {
    /// Always true (an absent `when`)
    #[default]
    Always,
    /// `+name`: boolean variant enabled
    Enabled(String),
    /// `~name`: boolean variant disabled
    Disabled(String),
    /// `name=value`: variant holds (or, for multi-valued variants, includes) value
    Equals { variant: String, value: String },
    /// `name!=value`: variant does not hold (or include) value
    NotEquals { variant: String, value: String },
    /// `@range`
    Version(VersionRange),
    /// `platform=os`
    Platform(String),
    /// `target=arch`
    Target(String),
    /// `%name` or `%name@range`
    Compiler { name: String, range: VersionRange },
    /// Conjunction
    All(Vec<Condition>),
}

impl Condition {
    /// Parse a condition string; an empty string is [`Condition::Always`]
    pub fn parse(s: &str) -> Result<Self> {
        let mut atoms = Vec::new();
        for token in s.split_whitespace() {
            parse_token(token, &mut atoms)?;
        }
        Ok(Self::from_atoms(atoms))
    }

    /// Combine atoms into the smallest equivalent condition
    pub fn from_atoms(mut atoms: Vec<Condition>) -> Self {
        atoms.retain(|a| *a != Condition::Always);
        match atoms.len() {
            0 => Condition::Always,
            1 => atoms.remove(0),
            _ => Condition::All(atoms),
        }
    }

    /// Conjunction of `self` and `other`
    pub fn and(self, other: Condition) -> Self {
        let mut atoms = self.into_atoms();
        atoms.extend(other.into_atoms());
        Self::from_atoms(atoms)
    }

    /// Flatten into the list of atoms that must all hold
    pub fn into_atoms(self) -> Vec<Condition> {
        match self {
            Condition::Always => Vec::new(),
            Condition::All(items) => items.into_iter().flat_map(|c| c.into_atoms()).collect(),
            atom => vec![atom],
        }
    }

    /// Borrowing view of [`Condition::into_atoms`]
    pub fn atoms(&self) -> Vec<&Condition> {
        match self {
            Condition::Always => Vec::new(),
            Condition::All(items) => items.iter().flat_map(|c| c.atoms()).collect(),
            atom => vec![atom],
        }
    }

    pub fn is_always(&self) -> bool {
        matches!(self, Condition::Always)
    }

    /// Evaluate against a fixed environment
    ///
    /// Pure: no I/O, and the same environment always yields the same answer.
    pub fn evaluate(&self, env: &ConditionEnv<'_>) -> bool {
        match self {
            Condition::Always => true,
            Condition::Enabled(name) => env.variants.get(name).and_then(|v| v.as_bool()) == Some(true),
            Condition::Disabled(name) => {
                env.variants.get(name).and_then(|v| v.as_bool()) == Some(false)
            }
            Condition::Equals { variant, value } => env
                .variants
                .get(variant)
                .is_some_and(|v| v.matches(value)),
            Condition::NotEquals { variant, value } => env
                .variants
                .get(variant)
                .is_some_and(|v| !v.matches(value)),
            Condition::Version(range) => env.version.is_some_and(|v| range.satisfies(v)),
            Condition::Platform(os) => env.platform.is_some_and(|p| p.os == *os),
            Condition::Target(arch) => env.platform.is_some_and(|p| p.arch == *arch),
            Condition::Compiler { name, range } => env
                .platform
                .and_then(|p| p.compiler.as_ref())
                .is_some_and(|c| c.name == *name && range.satisfies(&c.version)),
            Condition::All(items) => items.iter().all(|c| c.evaluate(env)),
        }
    }

    /// Names of variants this condition reads
    pub fn referenced_variants(&self) -> BTreeSet<&str> {
        self.atoms()
            .into_iter()
            .filter_map(|atom| match atom {
                Condition::Enabled(name) | Condition::Disabled(name) => Some(name.as_str()),
                Condition::Equals { variant, .. } | Condition::NotEquals { variant, .. } => {
                    Some(variant.as_str())
                }
                _ => None,
            })
            .collect()
    }

    /// Whether any atom depends on the platform or compiler
    pub fn is_platform_dependent(&self) -> bool {
        self.atoms().into_iter().any(|atom| {
            matches!(
                atom,
                Condition::Platform(_) | Condition::Target(_) | Condition::Compiler { .. }
            )
        })
    }
}

fn is_sigil(c: char) -> bool {
    matches!(c, '+' | '~' | '!' | '@' | '%')
}

fn parse_token(token: &str, atoms: &mut Vec<Condition>) -> Result<()> {
    // `@>=1.0` is a version atom even though it contains '='
    let starts_with_sigil = token.starts_with(is_sigil);
    if let Some((key, value)) = token.split_once('=').filter(|_| !starts_with_sigil) {
        let (key, negated) = match key.strip_suffix('!') {
            Some(key) => (key, true),
            None => (key, false),
        };
        if key.is_empty() || value.is_empty() || key.contains(is_sigil) || value.contains(is_sigil) {
            return Err(Error::ParseError(format!(
                "Invalid key=value condition '{}'",
                token
            )));
        }
        atoms.push(match key {
            "platform" | "target" | "arch" if negated => {
                return Err(Error::ParseError(format!(
                    "Negated {} conditions are not supported: '{}'",
                    key, token
                )));
            }
            "platform" => Condition::Platform(value.to_string()),
            "target" | "arch" => Condition::Target(value.to_string()),
            _ if negated => Condition::NotEquals {
                variant: key.to_string(),
                value: value.to_string(),
            },
            _ => Condition::Equals {
                variant: key.to_string(),
                value: value.to_string(),
            },
        });
        return Ok(());
    }

    let mut rest = token;
    while let Some(sigil) = rest.chars().next() {
        rest = &rest[sigil.len_utf8()..];
        match sigil {
            '+' | '~' | '!' => {
                let end = rest.find(is_sigil).unwrap_or(rest.len());
                let name = &rest[..end];
                if name.is_empty() {
                    return Err(Error::ParseError(format!(
                        "Missing name after '{}' in condition '{}'",
                        sigil, token
                    )));
                }
                atoms.push(if sigil == '+' {
                    Condition::Enabled(name.to_string())
                } else {
                    Condition::Disabled(name.to_string())
                });
                rest = &rest[end..];
            }
            '@' => {
                let end = rest.find(is_sigil).unwrap_or(rest.len());
                if end == 0 {
                    return Err(Error::ParseError(format!(
                        "Missing version range after '@' in condition '{}'",
                        token
                    )));
                }
                atoms.push(Condition::Version(VersionRange::parse(&rest[..end])?));
                rest = &rest[end..];
            }
            '%' => {
                let end = rest.find(is_sigil).unwrap_or(rest.len());
                let name = &rest[..end];
                if name.is_empty() {
                    return Err(Error::ParseError(format!(
                        "Missing compiler name after '%' in condition '{}'",
                        token
                    )));
                }
                rest = &rest[end..];
                let mut range = VersionRange::Any;
                if let Some(after) = rest.strip_prefix('@') {
                    let end = after.find(is_sigil).unwrap_or(after.len());
                    range = VersionRange::parse(&after[..end])?;
                    rest = &after[end..];
                }
                atoms.push(Condition::Compiler {
                    name: name.to_string(),
                    range,
                });
            }
            _ => {
                return Err(Error::ParseError(format!(
                    "Unexpected '{}' in condition '{}' (expected +, ~, @, % or name=value)",
                    sigil, token
                )));
            }
        }
    }
    Ok(())
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Always => Ok(()),
            Condition::Enabled(name) => write!(f, "+{}", name),
            Condition::Disabled(name) => write!(f, "~{}", name),
            Condition::Equals { variant, value } => write!(f, "{}={}", variant, value),
            Condition::NotEquals { variant, value } => write!(f, "{}!={}", variant, value),
            Condition::Version(range) => write!(f, "@{}", range),
            Condition::Platform(os) => write!(f, "platform={}", os),
            Condition::Target(arch) => write!(f, "target={}", arch),
            Condition::Compiler { name, range } => {
                if range.is_any() {
                    write!(f, "%{}", name)
                } else {
                    write!(f, "%{}@{}", name, range)
                }
            }
            Condition::All(items) => {
                let parts: Vec<String> = items.iter().map(|c| c.to_string()).collect();
                write!(f, "{}", parts.join(" "))
            }
        }
    }
}

impl FromStr for Condition {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Condition::parse(s)
    }
}
