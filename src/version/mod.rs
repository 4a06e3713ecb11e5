// src/version/mod.rs

//! Version identifiers and version-range predicates for recipe declarations
//!
//! Versions are dotted identifiers such as `5.1.0`, `2.6` or `v1.3.1`, or
//! source-control references such as `develop` and `master`. Ranges use the
//! colon syntax common in scientific package recipes (`3.24:`, `:3.17`,
//! `2.6:6.7.0`) as well as comparator forms (`>= 1.0`, `< 2.0`).

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Branch names that sort above every numbered release, lowest first
const INFINITY_VERSIONS: &[&str] = &["stable", "trunk", "head", "master", "main", "develop"];

/// One component of a version identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Segment {
    // Declaration order matters: alphabetic components sort below numeric ones
    Alpha(String),
    Numeric(u64),
}

/// A declared or requested version of a package
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    segments: Vec<Segment>,
    infinity: Option<usize>,
}

impl Version {
    /// Parse a version identifier
    ///
    /// Examples:
    /// - "1.2.3" → [1, 2, 3]
    /// - "2.6rc1" → [2, 6, "rc", 1] (numeric and alphabetic runs split apart)
    /// - "develop" → a branch version ordered above all releases
    pub fn parse(s: &str) -> Result<Self> {
        let raw = s.trim();
        if raw.is_empty() {
            return Err(Error::ParseError("Empty version identifier".to_string()));
        }
        if raw.contains(|c: char| c.is_whitespace() || matches!(c, ':' | ',' | '@' | '=')) {
            return Err(Error::ParseError(format!(
                "Invalid character in version '{}'",
                raw
            )));
        }

        let mut segments = Vec::new();
        for chunk in raw.split(['.', '-', '_']).filter(|c| !c.is_empty()) {
            let mut current = String::new();
            let mut numeric = None;
            for ch in chunk.chars() {
                let is_digit = ch.is_ascii_digit();
                if numeric.is_some_and(|n| n != is_digit) {
                    segments.push(Segment::from_run(&current));
                    current.clear();
                }
                numeric = Some(is_digit);
                current.push(ch);
            }
            if !current.is_empty() {
                segments.push(Segment::from_run(&current));
            }
        }

        let infinity = INFINITY_VERSIONS.iter().position(|name| *name == raw);

        Ok(Self {
            raw: raw.to_string(),
            segments,
            infinity,
        })
    }

    /// The identifier exactly as declared
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether this is a branch version such as `develop` or `master`
    pub fn is_branch(&self) -> bool {
        self.infinity.is_some()
    }

    /// Check whether `self` names `other` or a release series containing it
    ///
    /// `5.1` is a prefix of `5.1`, `5.1.0` and `5.1.1`, but not of `5.10`.
    pub fn is_prefix_of(&self, other: &Version) -> bool {
        self.infinity == other.infinity
            && self.segments.len() <= other.segments.len()
            && self.segments.iter().zip(&other.segments).all(|(a, b)| a == b)
    }
}

impl Segment {
    fn from_run(run: &str) -> Self {
        match run.parse::<u64>() {
            Ok(n) if run.bytes().all(|b| b.is_ascii_digit()) => Segment::Numeric(n),
            _ => Segment::Alpha(run.to_string()),
        }
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        // Option ordering puts every numbered release (None) below branches
        self.infinity
            .cmp(&other.infinity)
            .then_with(|| self.segments.cmp(&other.segments))
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Version::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A predicate over versions
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VersionRange {
    /// Any version is acceptable
    #[default]
    Any,
    /// Exactly this version (`=1.2`)
    Exact(Version),
    /// This version or any release in its series (`5.1` admits `5.1.1`)
    Series(Version),
    /// Inclusive interval (`2.6:6.7.0`, `3.24:`, `:3.17`)
    ///
    /// The upper bound also admits its own series, so `:3.17` admits `3.17.4`.
    Between {
        low: Option<Version>,
        high: Option<Version>,
    },
    /// Greater than
    GreaterThan(Version),
    /// Greater than or equal
    GreaterOrEqual(Version),
    /// Less than
    LessThan(Version),
    /// Less than or equal
    LessOrEqual(Version),
    /// Not equal
    NotEqual(Version),
    /// Every term must be satisfied (`>= 1.0, < 2.0`)
    All(Vec<VersionRange>),
}

impl VersionRange {
    /// Parse a version range
    ///
    /// Examples:
    /// - "3.24:" → Between(3.24, ∞)
    /// - ":3.17" → Between(-∞, 3.17)
    /// - "5.0.0" → Series(5.0.0)
    /// - ">= 1.0, < 2.0" → All([GreaterOrEqual(1.0), LessThan(2.0)])
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        if s.is_empty() || s == "*" || s == ":" {
            return Ok(VersionRange::Any);
        }

        if s.contains(',') {
            let terms = s
                .split(',')
                .map(Self::parse)
                .collect::<Result<Vec<_>>>()?;
            return Ok(VersionRange::All(terms));
        }

        if let Some(rest) = s.strip_prefix(">=") {
            Ok(VersionRange::GreaterOrEqual(Version::parse(rest)?))
        } else if let Some(rest) = s.strip_prefix("<=") {
            Ok(VersionRange::LessOrEqual(Version::parse(rest)?))
        } else if let Some(rest) = s.strip_prefix("!=") {
            Ok(VersionRange::NotEqual(Version::parse(rest)?))
        } else if let Some(rest) = s.strip_prefix("==") {
            Ok(VersionRange::Exact(Version::parse(rest)?))
        } else if let Some(rest) = s.strip_prefix('>') {
            Ok(VersionRange::GreaterThan(Version::parse(rest)?))
        } else if let Some(rest) = s.strip_prefix('<') {
            Ok(VersionRange::LessThan(Version::parse(rest)?))
        } else if let Some(rest) = s.strip_prefix('=') {
            Ok(VersionRange::Exact(Version::parse(rest)?))
        } else if let Some((low, high)) = s.split_once(':') {
            let bound = |b: &str| -> Result<Option<Version>> {
                let b = b.trim();
                if b.is_empty() {
                    Ok(None)
                } else {
                    Version::parse(b).map(Some)
                }
            };
            let (low, high) = (bound(low)?, bound(high)?);
            if let (Some(l), Some(h)) = (&low, &high)
                && l > h
                && !h.is_prefix_of(l)
            {
                return Err(Error::ParseError(format!(
                    "Empty version range '{}': lower bound exceeds upper bound",
                    s
                )));
            }
            Ok(VersionRange::Between { low, high })
        } else {
            Ok(VersionRange::Series(Version::parse(s)?))
        }
    }

    /// Check if a version satisfies this range
    pub fn satisfies(&self, version: &Version) -> bool {
        match self {
            VersionRange::Any => true,
            VersionRange::Exact(v) => version == v,
            VersionRange::Series(v) => v.is_prefix_of(version),
            VersionRange::Between { low, high } => {
                let above = low.as_ref().is_none_or(|l| version >= l);
                let below = high
                    .as_ref()
                    .is_none_or(|h| version <= h || h.is_prefix_of(version));
                above && below
            }
            VersionRange::GreaterThan(v) => version > v,
            VersionRange::GreaterOrEqual(v) => version >= v,
            VersionRange::LessThan(v) => version < v,
            VersionRange::LessOrEqual(v) => version <= v,
            VersionRange::NotEqual(v) => version != v,
            VersionRange::All(terms) => terms.iter().all(|t| t.satisfies(version)),
        }
    }

    /// Whether this range admits every version
    pub fn is_any(&self) -> bool {
        matches!(self, VersionRange::Any)
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionRange::Any => write!(f, ":"),
            VersionRange::Exact(v) => write!(f, "={}", v),
            VersionRange::Series(v) => write!(f, "{}", v),
            VersionRange::Between { low, high } => {
                if let Some(low) = low {
                    write!(f, "{}", low)?;
                }
                write!(f, ":")?;
                if let Some(high) = high {
                    write!(f, "{}", high)?;
                }
                Ok(())
            }
            VersionRange::GreaterThan(v) => write!(f, ">{}", v),
            VersionRange::GreaterOrEqual(v) => write!(f, ">={}", v),
            VersionRange::LessThan(v) => write!(f, "<{}", v),
            VersionRange::LessOrEqual(v) => write!(f, "<={}", v),
            VersionRange::NotEqual(v) => write!(f, "!={}", v),
            VersionRange::All(terms) => {
                let parts: Vec<String> = terms.iter().map(|t| t.to_string()).collect();
                write!(f, "{}", parts.join(","))
            }
        }
    }
}

impl FromStr for VersionRange {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        VersionRange::parse(s)
    }
}
