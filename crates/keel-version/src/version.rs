//! Version parsing and total ordering.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::opam::OpamVersion;

/// Error type for version and constraint parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("invalid version string \"{0}\"")]
    InvalidVersion(String),

    #[error("invalid version constraint \"{constraint}\": {reason}")]
    InvalidConstraint { constraint: String, reason: String },
}

lazy_static! {
    static ref SEMVER_RE: Regex = Regex::new(
        r"^v?(\d+)(?:\.(\d+))?(?:\.(\d+))?(?:-([0-9A-Za-z][0-9A-Za-z.-]*))?(?:\+[0-9A-Za-z.-]+)?$"
    )
    .unwrap();
}

/// A prerelease identifier. Numeric identifiers compare numerically and sort
/// before alphanumeric ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identifier {
    Numeric(u64),
    Alpha(String),
}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Identifier::Numeric(a), Identifier::Numeric(b)) => a.cmp(b),
            (Identifier::Numeric(_), Identifier::Alpha(_)) => Ordering::Less,
            (Identifier::Alpha(_), Identifier::Numeric(_)) => Ordering::Greater,
            (Identifier::Alpha(a), Identifier::Alpha(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Numeric(n) => write!(f, "{}", n),
            Identifier::Alpha(s) => f.write_str(s),
        }
    }
}

/// A semver-like version: `major.minor.patch` with an optional prerelease.
///
/// Build metadata (`+...`) is accepted by the parser and discarded, as it
/// never participates in ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Semver {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prerelease: Vec<Identifier>,
}

impl Semver {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Semver {
            major,
            minor,
            patch,
            prerelease: Vec::new(),
        }
    }

    pub fn is_prerelease(&self) -> bool {
        !self.prerelease.is_empty()
    }
}

impl Ord for Semver {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (self.prerelease.is_empty(), other.prerelease.is_empty()) {
                (true, true) => Ordering::Equal,
                // A release sorts after any of its prereleases.
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => self.prerelease.cmp(&other.prerelease),
            })
    }
}

impl PartialOrd for Semver {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Semver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        for (i, id) in self.prerelease.iter().enumerate() {
            f.write_str(if i == 0 { "-" } else { "." })?;
            write!(f, "{}", id)?;
        }
        Ok(())
    }
}

/// A package version from either version family.
///
/// The order is total: the two families never mix within one package name,
/// so the cross-family rule (all semver versions before all opam versions)
/// only exists to keep sorting stable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Version {
    Semver(Semver),
    Opam(OpamVersion),
}

impl Version {
    /// Parse a version string. An `opam:` prefix selects the opam family,
    /// everything else must be a semver-like version.
    pub fn parse(input: &str) -> Result<Version, VersionError> {
        let input = input.trim();
        if let Some(rest) = input.strip_prefix("opam:") {
            if rest.is_empty() {
                return Err(VersionError::InvalidVersion(input.to_string()));
            }
            return Ok(Version::Opam(OpamVersion::new(rest)));
        }

        let caps = SEMVER_RE
            .captures(input)
            .ok_or_else(|| VersionError::InvalidVersion(input.to_string()))?;

        let number = |idx: usize| -> u64 {
            caps.get(idx)
                .map(|m| m.as_str().parse().unwrap_or(0))
                .unwrap_or(0)
        };

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

        Ok(Version::Semver(Semver {
            major: number(1),
            minor: number(2),
            patch: number(3),
            prerelease,
        }))
    }

    pub fn as_semver(&self) -> Option<&Semver> {
        match self {
            Version::Semver(v) => Some(v),
            Version::Opam(_) => None,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Semver(v) => write!(f, "{}", v),
            Version::Opam(v) => write!(f, "opam:{}", v),
        }
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Version::parse(&raw).map_err(serde::de::Error::custom)
    }
}
