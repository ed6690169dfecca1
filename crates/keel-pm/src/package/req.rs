use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use keel_version::{VersionError, VersionSpec};

/// A dependency requirement: a package name plus a version predicate.
///
/// Two requirements are equal iff their textual forms are equal; the text is
/// fixed at construction time and used for display, hashing, and
/// de-duplication throughout the solver.
#[derive(Debug, Clone)]
pub struct Req {
    name: String,
    spec: VersionSpec,
    raw: String,
}

impl Req {
    pub fn new(name: impl Into<String>, spec: VersionSpec) -> Req {
        let name = name.into();
        let raw = format!("{}@{}", name, spec);
        Req { name, spec, raw }
    }

    /// A requirement matching every version of `name`.
    pub fn any(name: impl Into<String>) -> Req {
        Req::new(name, VersionSpec::Any)
    }

    /// Build a requirement from a name and the constraint text as written in
    /// a manifest, keeping the original spelling as the display form.
    pub fn from_parts(name: impl Into<String>, constraint: &str) -> Result<Req, VersionError> {
        let name = name.into();
        let spec = VersionSpec::parse(constraint)?;
        let raw = format!("{}@{}", name, constraint);
        Ok(Req { name, spec, raw })
    }

    /// Parse `name@constraint`; a bare name means any version. A leading `@`
    /// belongs to the scope, not the constraint separator.
    pub fn parse(input: &str) -> Result<Req, VersionError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(VersionError::InvalidVersion(input.to_string()));
        }
        match input[1..].rfind('@') {
            Some(idx) => {
                let (name, constraint) = input.split_at(idx + 1);
                let spec = VersionSpec::parse(&constraint[1..])?;
                Ok(Req {
                    name: name.to_string(),
                    spec,
                    raw: input.to_string(),
                })
            }
            None => Ok(Req {
                name: input.to_string(),
                spec: VersionSpec::Any,
                raw: input.to_string(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &VersionSpec {
        &self.spec
    }

    /// The constraint portion of the display form, as originally written.
    pub fn constraint_text(&self) -> &str {
        if self.raw.len() > self.name.len() {
            &self.raw[self.name.len() + 1..]
        } else {
            "*"
        }
    }
}

impl fmt::Display for Req {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for Req {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Req {}

impl Hash for Req {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl FromStr for Req {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Req::parse(s)
    }
}

/// Serde helpers mapping manifest dependency tables
/// (`{"name": "constraint", ...}`) to requirement lists.
pub(crate) mod req_table {
    use super::Req;
    use indexmap::IndexMap;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(reqs: &[Req], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(reqs.iter().map(|r| (r.name(), r.constraint_text())))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Req>, D::Error> {
        let table: IndexMap<String, String> = IndexMap::deserialize(deserializer)?;
        table
            .into_iter()
            .map(|(name, constraint)| Req::from_parts(name, &constraint).map_err(D::Error::custom))
            .collect()
    }
}

/// Requirement overrides, keyed by package name.
///
/// When an override exists for a name, every requirement for that name is
/// replaced wholesale before it reaches the resolver or the universe.
/// Serializes as the manifest's flat `{"name": "constraint"}` table.
#[derive(Debug, Clone, Default)]
pub struct Resolutions {
    overrides: IndexMap<String, Req>,
}

impl Serialize for Resolutions {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(
            self.overrides
                .iter()
                .map(|(name, req)| (name, req.constraint_text())),
        )
    }
}

impl<'de> Deserialize<'de> for Resolutions {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error as _;
        let raw: IndexMap<String, String> = IndexMap::deserialize(deserializer)?;
        let mut resolutions = Resolutions::new();
        for (name, constraint) in raw {
            let req = Req::from_parts(name, &constraint).map_err(D::Error::custom)?;
            resolutions.insert(req);
        }
        Ok(resolutions)
    }
}

impl Resolutions {
    pub fn new() -> Resolutions {
        Resolutions::default()
    }

    pub fn insert(&mut self, req: Req) {
        self.overrides.insert(req.name().to_string(), req);
    }

    pub fn get(&self, name: &str) -> Option<&Req> {
        self.overrides.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }

    /// Apply the override for `req`'s name, if any.
    pub fn apply(&self, req: &Req) -> Req {
        match self.overrides.get(req.name()) {
            Some(replacement) => replacement.clone(),
            None => req.clone(),
        }
    }

    /// Rewrite a dependency list through the overrides.
    pub fn rewrite(&self, deps: &[Req]) -> Vec<Req> {
        deps.iter().map(|req| self.apply(req)).collect()
    }
}

impl FromIterator<Req> for Resolutions {
    fn from_iter<I: IntoIterator<Item = Req>>(iter: I) -> Self {
        let mut resolutions = Resolutions::new();
        for req in iter {
            resolutions.insert(req);
        }
        resolutions
    }
}
