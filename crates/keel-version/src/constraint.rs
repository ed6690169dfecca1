//! Version constraints.
//!
//! A [`VersionSpec`] is a predicate over [`Version`]s. The parser accepts the
//! constraint syntax used in manifests: `*`, exact versions, comparator
//! ranges (`>=1.2`, `<2`), caret (`^1.2.3`) and tilde (`~1.2`) shorthands,
//! x-ranges (`1.2.x`), space-joined conjunction and `||` disjunction.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::version::{Identifier, Semver, Version, VersionError};

/// Comparison operators for version constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equal,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    NotEqual,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::LessThan => "<",
            Operator::LessThanOrEqual => "<=",
            Operator::GreaterThan => ">",
            Operator::GreaterThanOrEqual => ">=",
            Operator::NotEqual => "!=",
        }
    }

    fn matches(&self, ordering: Ordering) -> bool {
        match self {
            Operator::Equal => ordering == Ordering::Equal,
            Operator::LessThan => ordering == Ordering::Less,
            Operator::LessThanOrEqual => ordering != Ordering::Greater,
            Operator::GreaterThan => ordering == Ordering::Greater,
            Operator::GreaterThanOrEqual => ordering != Ordering::Less,
            Operator::NotEqual => ordering != Ordering::Equal,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A predicate over versions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionSpec {
    /// Matches every version.
    Any,
    /// Matches exactly one version.
    Exact(Version),
    /// A single comparator range.
    Range(Operator, Version),
    /// Conjunction: all parts must match.
    And(Vec<VersionSpec>),
    /// Disjunction: at least one part must match.
    Or(Vec<VersionSpec>),
}

lazy_static! {
    // Collapses "> = 1.0" style spacing so conjunctions split on whitespace.
    static ref OP_SPACE_RE: Regex = Regex::new(r"(>=|<=|==|!=|[<>=^~])\s+").unwrap();
    static ref PARTIAL_RE: Regex =
        Regex::new(r"^v?(\d+|[xX*])(?:\.(\d+|[xX*]))?(?:\.(\d+|[xX*]))?(?:-([0-9A-Za-z][0-9A-Za-z.-]*))?(?:\+[0-9A-Za-z.-]+)?$").unwrap();
}

impl VersionSpec {
    /// Check whether `version` satisfies this spec.
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            VersionSpec::Any => true,
            VersionSpec::Exact(v) => version == v,
            VersionSpec::Range(op, v) => op.matches(version.cmp(v)),
            VersionSpec::And(parts) => parts.iter().all(|p| p.matches(version)),
            VersionSpec::Or(parts) => parts.iter().any(|p| p.matches(version)),
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, VersionSpec::Any)
    }

    /// Parse a constraint expression.
    pub fn parse(input: &str) -> Result<VersionSpec, VersionError> {
        let normalized = OP_SPACE_RE.replace_all(input.trim(), "$1");
        let text = normalized.as_ref();
        if text.is_empty() || text == "*" || text == "x" || text == "X" {
            return Ok(VersionSpec::Any);
        }

        let mut alternatives = Vec::new();
        for branch in text.split("||") {
            let branch = branch.trim();
            if branch.is_empty() {
                return Err(invalid(input, "empty alternative"));
            }
            let mut parts = Vec::new();
            for token in branch.split_whitespace() {
                parts.push(parse_comparator(token, input)?);
            }
            alternatives.push(match parts.len() {
                0 => return Err(invalid(input, "empty alternative")),
                1 => parts.into_iter().next().unwrap(),
                _ => VersionSpec::And(parts),
            });
        }

        Ok(match alternatives.len() {
            1 => alternatives.into_iter().next().unwrap(),
            _ => VersionSpec::Or(alternatives),
        })
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSpec::Any => f.write_str("*"),
            VersionSpec::Exact(v) => write!(f, "{}", v),
            VersionSpec::Range(op, v) => write!(f, "{}{}", op, v),
            VersionSpec::And(parts) => {
                for (i, p) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", p)?;
                }
                Ok(())
            }
            VersionSpec::Or(parts) => {
                for (i, p) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" || ")?;
                    }
                    write!(f, "{}", p)?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for VersionSpec {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionSpec::parse(s)
    }
}

impl Serialize for VersionSpec {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionSpec {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        VersionSpec::parse(&raw).map_err(serde::de::Error::custom)
    }
}

fn invalid(constraint: &str, reason: impl Into<String>) -> VersionError {
    VersionError::InvalidConstraint {
        constraint: constraint.to_string(),
        reason: reason.into(),
    }
}

/// A version expression with wildcard/omitted components, as written inside
/// a constraint (`1`, `1.2`, `1.2.x`, `1.2.3-rc.1`).
struct Partial {
    /// `None` marks an omitted or wildcard component.
    nums: [Option<u64>; 3],
    prerelease: Vec<Identifier>,
}

impl Partial {
    fn parse(token: &str) -> Option<Partial> {
        let caps = PARTIAL_RE.captures(token)?;
        let mut nums = [None; 3];
        for (slot, idx) in nums.iter_mut().zip(1..=3) {
            *slot = match caps.get(idx) {
                None => None,
                Some(m) if matches!(m.as_str(), "x" | "X" | "*") => None,
                Some(m) => Some(m.as_str().parse().ok()?),
            };
        }
        let prerelease = match caps.get(4) {
            None => Vec::new(),
            Some(m) => m
                .as_str()
                .split('.')
                .map(|part| match part.parse::<u64>() {
                    Ok(n) => Identifier::Numeric(n),
                    Err(_) => Identifier::Alpha(part.to_string()),
                })
                .collect(),
        };
        Some(Partial { nums, prerelease })
    }

    fn has_wildcard(&self) -> bool {
        self.nums.iter().any(|n| n.is_none())
    }

    fn floor(&self) -> Version {
        let mut v = Semver::new(
            self.nums[0].unwrap_or(0),
            self.nums[1].unwrap_or(0),
            self.nums[2].unwrap_or(0),
        );
        v.prerelease = self.prerelease.clone();
        Version::Semver(v)
    }
}

fn half_open(lower: Version, upper: Version) -> VersionSpec {
    VersionSpec::And(vec![
        VersionSpec::Range(Operator::GreaterThanOrEqual, lower),
        VersionSpec::Range(Operator::LessThan, upper),
    ])
}

fn parse_comparator(token: &str, whole: &str) -> Result<VersionSpec, VersionError> {
    for (prefix, op) in [
        (">=", Operator::GreaterThanOrEqual),
        ("<=", Operator::LessThanOrEqual),
        ("==", Operator::Equal),
        ("!=", Operator::NotEqual),
        (">", Operator::GreaterThan),
        ("<", Operator::LessThan),
        ("=", Operator::Equal),
    ] {
        if let Some(rest) = token.strip_prefix(prefix) {
            let version = Version::parse(rest)
                .map_err(|e| invalid(whole, e.to_string()))?;
            return Ok(VersionSpec::Range(op, version));
        }
    }

    if let Some(rest) = token.strip_prefix('^') {
        return caret(rest, whole);
    }
    if let Some(rest) = token.strip_prefix('~') {
        return tilde(rest, whole);
    }

    // Opam versions only support exact and comparator forms.
    if token.starts_with("opam:") {
        let version = Version::parse(token).map_err(|e| invalid(whole, e.to_string()))?;
        return Ok(VersionSpec::Exact(version));
    }

    let partial =
        Partial::parse(token).ok_or_else(|| invalid(whole, format!("bad token \"{}\"", token)))?;
    if partial.has_wildcard() {
        return Ok(x_range(partial));
    }
    Ok(VersionSpec::Exact(partial.floor()))
}

/// `^` allows changes that do not modify the leftmost non-zero component.
fn caret(rest: &str, whole: &str) -> Result<VersionSpec, VersionError> {
    let partial = Partial::parse(rest)
        .ok_or_else(|| invalid(whole, "caret requires a semver-like version"))?;
    let lower = partial.floor();
    let [major, minor, _] = partial.nums;
    let major = major.unwrap_or(0);
    let upper = match (major, minor) {
        (0, Some(0)) => match partial.nums[2] {
            // ^0.0.3 pins the patch level.
            Some(patch) => Version::Semver(Semver::new(0, 0, patch + 1)),
            None => Version::Semver(Semver::new(0, 1, 0)),
        },
        (0, Some(minor)) => Version::Semver(Semver::new(0, minor + 1, 0)),
        (0, None) => Version::Semver(Semver::new(1, 0, 0)),
        (major, _) => Version::Semver(Semver::new(major + 1, 0, 0)),
    };
    Ok(half_open(lower, upper))
}

/// `~` allows patch-level changes, or minor-level when only a major is given.
fn tilde(rest: &str, whole: &str) -> Result<VersionSpec, VersionError> {
    let partial = Partial::parse(rest)
        .ok_or_else(|| invalid(whole, "tilde requires a semver-like version"))?;
    let lower = partial.floor();
    let [major, minor, _] = partial.nums;
    let major = major.unwrap_or(0);
    let upper = match minor {
        Some(minor) => Version::Semver(Semver::new(major, minor + 1, 0)),
        None => Version::Semver(Semver::new(major + 1, 0, 0)),
    };
    Ok(half_open(lower, upper))
}

fn x_range(partial: Partial) -> VersionSpec {
    match partial.nums {
        [None, ..] => VersionSpec::Any,
        [Some(major), None, _] => half_open(
            Version::Semver(Semver::new(major, 0, 0)),
            Version::Semver(Semver::new(major + 1, 0, 0)),
        ),
        [Some(major), Some(minor), None] => half_open(
            Version::Semver(Semver::new(major, minor, 0)),
            Version::Semver(Semver::new(major, minor + 1, 0)),
        ),
        [Some(major), Some(minor), Some(patch)] => {
            VersionSpec::Exact(Version::Semver(Semver::new(major, minor, patch)))
        }
    }
}
