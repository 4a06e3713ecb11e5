// src/variant/mod.rs
//! Variant declarations and concrete variant assignments
//!
//! Variants are user-selectable build options: booleans (`+petsc` / `~petsc`),
//! single-valued enumerations (`limiter=MC`) and multi-valued enumerations
//! (`buildtests=default`). Conditions over a recipe's own variants are
//! expressed with the [`Condition`] predicate type.

mod condition;

pub use condition::{Condition, ConditionEnv};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// The shape of values a variant accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantKind {
    /// `true` or `false`
    Bool,
    /// Exactly one of the listed values
    Single(Vec<String>),
    /// A non-empty subset of the listed values
    Multi(Vec<String>),
}

/// A concrete value for one variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariantValue {
    Bool(bool),
    Single(String),
    Multi(BTreeSet<String>),
}

impl VariantValue {
    /// Check whether this value matches `text` as written in a `name=value` condition
    ///
    /// Multi-valued assignments match when `text` is one of the selected values.
    pub fn matches(&self, text: &str) -> bool {
        match self {
            VariantValue::Bool(b) => parse_bool(text) == Some(*b),
            VariantValue::Single(s) => s == text,
            VariantValue::Multi(set) => set.contains(text),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            VariantValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for VariantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantValue::Bool(b) => write!(f, "{}", b),
            VariantValue::Single(s) => write!(f, "{}", s),
            VariantValue::Multi(set) => {
                let values: Vec<&str> = set.iter().map(|s| s.as_str()).collect();
                write!(f, "{}", values.join(","))
            }
        }
    }
}

/// Accepted spellings for boolean variant values
pub(crate) fn parse_bool(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Some(true),
        "false" | "off" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// A declared build option
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub name: String,
    pub kind: VariantKind,
    pub default: VariantValue,
    pub description: String,
}

impl Variant {
    /// Declare a boolean variant
    pub fn boolean(name: impl Into<String>, default: bool, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: VariantKind::Bool,
            default: VariantValue::Bool(default),
            description: description.into(),
        }
    }

    /// Declare a single-valued variant
    pub fn single<I, S>(
        name: impl Into<String>,
        values: I,
        default: impl Into<String>,
        description: impl Into<String>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            kind: VariantKind::Single(values.into_iter().map(Into::into).collect()),
            default: VariantValue::Single(default.into()),
            description: description.into(),
        }
    }

    /// Declare a multi-valued variant
    pub fn multi<I, S, D, T>(
        name: impl Into<String>,
        values: I,
        default: D,
        description: impl Into<String>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        D: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            name: name.into(),
            kind: VariantKind::Multi(values.into_iter().map(Into::into).collect()),
            default: VariantValue::Multi(default.into_iter().map(Into::into).collect()),
            description: description.into(),
        }
    }

    pub fn is_bool(&self) -> bool {
        self.kind == VariantKind::Bool
    }

    /// The allowed values, rendered as text
    pub fn allowed_values(&self) -> Vec<String> {
        match &self.kind {
            VariantKind::Bool => vec!["true".to_string(), "false".to_string()],
            VariantKind::Single(values) | VariantKind::Multi(values) => values.clone(),
        }
    }

    /// Check whether a concrete value is permitted by this variant
    pub fn allows(&self, value: &VariantValue) -> bool {
        match (&self.kind, value) {
            (VariantKind::Bool, VariantValue::Bool(_)) => true,
            (VariantKind::Single(values), VariantValue::Single(v)) => values.contains(v),
            (VariantKind::Multi(values), VariantValue::Multi(set)) => {
                !set.is_empty() && set.iter().all(|v| values.contains(v))
            }
            _ => false,
        }
    }

    /// Check whether `text` names one allowed value (as used in `name=value`)
    pub fn allows_text(&self, text: &str) -> bool {
        match &self.kind {
            VariantKind::Bool => parse_bool(text).is_some(),
            VariantKind::Single(values) | VariantKind::Multi(values) => {
                values.iter().any(|v| v == text)
            }
        }
    }

    /// Parse a textual value for this variant
    ///
    /// Multi-valued variants take a comma-separated list.
    pub fn parse_value(&self, text: &str) -> Option<VariantValue> {
        let value = match &self.kind {
            VariantKind::Bool => VariantValue::Bool(parse_bool(text)?),
            VariantKind::Single(_) => VariantValue::Single(text.to_string()),
            VariantKind::Multi(_) => VariantValue::Multi(
                text.split(',')
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_string())
                    .collect(),
            ),
        };
        self.allows(&value).then_some(value)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] (default: {})",
            self.name,
            self.allowed_values().join(", "),
            self.default
        )
    }
}

/// A closed assignment of values to variant names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantMap(BTreeMap<String, VariantValue>);

impl VariantMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: VariantValue) -> Option<VariantValue> {
        self.0.insert(name.into(), value)
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: VariantValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&VariantValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// True only for a boolean variant set to `true`
    pub fn is_enabled(&self, name: &str) -> bool {
        matches!(self.0.get(name), Some(VariantValue::Bool(true)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &VariantValue)> {
        self.0.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse a list of overrides such as `+petsc`, `~xhermes`, `limiter=MinMod`
    ///
    /// Values stay textual until they are checked against a recipe's
    /// declarations; see [`crate::recipe::PackageRecipe::resolve_variants`].
    pub fn parse_overrides<S: AsRef<str>>(items: &[S]) -> Result<Vec<(String, String)>> {
        let mut overrides = Vec::new();
        for item in items {
            for token in item.as_ref().split_whitespace() {
                let mut rest = token;
                if let Some((name, value)) = token.split_once('=') {
                    if name.is_empty() || value.is_empty() {
                        return Err(Error::ParseError(format!(
                            "Variant assignment '{}' needs both a name and a value",
                            token
                        )));
                    }
                    overrides.push((name.to_string(), value.to_string()));
                    continue;
                }
                while !rest.is_empty() {
                    let enabled = match rest.as_bytes()[0] {
                        b'+' => true,
                        b'~' | b'!' => false,
                        _ => {
                            return Err(Error::ParseError(format!(
                                "Expected +name, ~name or name=value, found '{}'",
                                token
                            )));
                        }
                    };
                    rest = &rest[1..];
                    let end = rest.find(['+', '~', '!']).unwrap_or(rest.len());
                    if end == 0 {
                        return Err(Error::ParseError(format!(
                            "Missing variant name in '{}'",
                            token
                        )));
                    }
                    overrides.push((rest[..end].to_string(), enabled.to_string()));
                    rest = &rest[end..];
                }
            }
        }
        Ok(overrides)
    }
}

impl FromIterator<(String, VariantValue)> for VariantMap {
    fn from_iter<T: IntoIterator<Item = (String, VariantValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for VariantMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(name, value)| match value {
                VariantValue::Bool(true) => format!("+{}", name),
                VariantValue::Bool(false) => format!("~{}", name),
                other => format!("{}={}", name, other),
            })
            .collect();
        write!(f, "{}", parts.join(" "))
    }
}
