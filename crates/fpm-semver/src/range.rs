//! Range parsing and matching

use lazy_static::lazy_static;
use regex::Regex;
use semver::{BuildMetadata, Prerelease, Version};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::comparator::Comparator;
use crate::operator::Operator;

/// Error type for range parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    #[error("Invalid version \"{input}\"")]
    InvalidVersion { input: String },
    #[error("Invalid comparator \"{input}\"")]
    InvalidComparator { input: String },
}

lazy_static! {
    // OR splitter
    static ref OR_RE: Regex = Regex::new(r"\s*\|\|\s*").unwrap();

    // Hyphen range, e.g. "1.2.3 - 2.3.4"
    static ref HYPHEN_RE: Regex = Regex::new(r"^(?P<from>\S+)\s+-\s+(?P<to>\S+)$").unwrap();

    // Glue an operator to its version (">= 1.2.3" -> ">=1.2.3")
    static ref OPERATOR_SPACE_RE: Regex = Regex::new(r"(~>?|\^|[<>]=?|=)\s+").unwrap();

    // AND separators
    static ref AND_RE: Regex = Regex::new(r"[\s,]+").unwrap();

    static ref COMPARATOR_RE: Regex = Regex::new(r"^(?P<op>~>?|\^|[<>]=?|=)?(?P<version>.+)$").unwrap();

    // Possibly partial version with x-wildcards
    static ref PARTIAL_RE: Regex = Regex::new(
        r"^[vV=]?(?P<major>\d+|[xX*])(?:\.(?P<minor>\d+|[xX*]))?(?:\.(?P<patch>\d+|[xX*]))?(?:-(?P<pre>[0-9A-Za-z.-]+))?(?:\+(?P<build>[0-9A-Za-z.-]+))?$"
    ).unwrap();
}

/// Parse a published version leniently (`v1.2.3`, `=1.2.3`, surrounding whitespace).
pub fn parse_version(input: &str) -> Result<Version, RangeError> {
    let trimmed = input.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('='))
        .unwrap_or(trimmed)
        .trim_start();

    Version::parse(trimmed).map_err(|_| RangeError::InvalidVersion {
        input: input.to_string(),
    })
}

/// A version range: alternatives (`||`) of comparator sets that must all hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    raw: String,
    sets: Vec<Vec<Comparator>>,
}

impl Range {
    /// Parse an npm range expression. An empty expression matches every release.
    pub fn parse(input: &str) -> Result<Self, RangeError> {
        let trimmed = input.trim();
        let mut sets = Vec::new();

        for alternative in OR_RE.split(trimmed) {
            sets.push(parse_comparator_set(alternative.trim())?);
        }

        Ok(Self {
            raw: input.to_string(),
            sets,
        })
    }

    /// A range matching every release
    pub fn any() -> Self {
        Self {
            raw: "*".to_string(),
            sets: vec![Vec::new()],
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The desugared comparator sets
    pub fn comparator_sets(&self) -> &[Vec<Comparator>] {
        &self.sets
    }

    /// Check whether a version satisfies any alternative of this range.
    ///
    /// A prerelease only matches an alternative that mentions a prerelease of the
    /// same `major.minor.patch`, so `^1.0.0` never selects `1.5.0-beta`.
    pub fn satisfies(&self, version: &Version) -> bool {
        self.sets.iter().any(|set| {
            set.iter().all(|c| c.matches(version))
                && (version.pre.is_empty() || set.iter().any(|c| c.admits_prerelease_of(version)))
        })
    }

    /// The highest version satisfying this range
    pub fn max_satisfying<'a, I>(&self, versions: I) -> Option<&'a Version>
    where
        I: IntoIterator<Item = &'a Version>,
    {
        versions.into_iter().filter(|v| self.satisfies(v)).max()
    }
}

impl FromStr for Range {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Range::parse(s)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Version with optional trailing components; `None` marks a missing or wildcard part.
#[derive(Debug, Clone)]
struct Partial {
    raw: String,
    major: Option<u64>,
    minor: Option<u64>,
    patch: Option<u64>,
    pre: Prerelease,
}

impl Partial {
    fn parse(input: &str) -> Result<Self, RangeError> {
        let invalid = || RangeError::InvalidVersion {
            input: input.to_string(),
        };
        let caps = PARTIAL_RE.captures(input).ok_or_else(invalid)?;

        let component = |name: &str| -> Result<Option<u64>, RangeError> {
            match caps.name(name).map(|m| m.as_str()) {
                None | Some("x") | Some("X") | Some("*") => Ok(None),
                Some(digits) => digits.parse().map(Some).map_err(|_| invalid()),
            }
        };

        let major = component("major")?;
        // Anything after a wildcard is a wildcard too ("1.x.3" reads as "1.x")
        let minor = major.and(component("minor")?);
        let patch = minor.and(component("patch")?);

        let pre = match caps.name("pre") {
            Some(pre) if patch.is_some() => Prerelease::new(pre.as_str()).map_err(|_| invalid())?,
            Some(_) => return Err(invalid()),
            None => Prerelease::EMPTY,
        };

        Ok(Self {
            raw: input.to_string(),
            major,
            minor,
            patch,
            pre,
        })
    }

    fn is_any(&self) -> bool {
        self.major.is_none()
    }

    fn is_full(&self) -> bool {
        self.patch.is_some()
    }

    /// Lowest version the partial covers
    fn floor(&self) -> Version {
        Version {
            major: self.major.unwrap_or(0),
            minor: self.minor.unwrap_or(0),
            patch: self.patch.unwrap_or(0),
            pre: self.pre.clone(),
            build: BuildMetadata::EMPTY,
        }
    }

    /// First version past the partial (`1` -> `2.0.0`, `1.2` -> `1.3.0`)
    fn ceiling(&self) -> Result<Version, RangeError> {
        Ok(match (self.major, self.minor) {
            (Some(major), None) => Version::new(self.next(major)?, 0, 0),
            (Some(major), Some(minor)) => Version::new(major, self.next(minor)?, 0),
            (None, _) => Version::new(0, 0, 0),
        })
    }

    /// Increment a component; a component at `u64::MAX` has no successor.
    fn next(&self, component: u64) -> Result<u64, RangeError> {
        component.checked_add(1).ok_or_else(|| RangeError::InvalidVersion {
            input: self.raw.clone(),
        })
    }
}

fn parse_comparator_set(alternative: &str) -> Result<Vec<Comparator>, RangeError> {
    if alternative.is_empty() {
        return Ok(Vec::new());
    }

    if let Some(caps) = HYPHEN_RE.captures(alternative) {
        let mut set = Vec::new();
        expand_hyphen(&caps["from"], &caps["to"], &mut set)?;
        return Ok(set);
    }

    let glued = OPERATOR_SPACE_RE.replace_all(alternative, "$1");
    let mut set = Vec::new();
    for token in AND_RE.split(&glued).filter(|t| !t.is_empty()) {
        expand_comparator(token, &mut set)?;
    }
    Ok(set)
}

fn expand_hyphen(from: &str, to: &str, set: &mut Vec<Comparator>) -> Result<(), RangeError> {
    let from = Partial::parse(from)?;
    let to = Partial::parse(to)?;

    if !from.is_any() {
        set.push(Comparator::new(Operator::GreaterThanOrEqual, from.floor()));
    }
    if to.is_full() {
        set.push(Comparator::new(Operator::LessThanOrEqual, to.floor()));
    } else if !to.is_any() {
        set.push(Comparator::new(Operator::LessThan, to.ceiling()?));
    }
    Ok(())
}

fn expand_comparator(token: &str, set: &mut Vec<Comparator>) -> Result<(), RangeError> {
    let caps = COMPARATOR_RE
        .captures(token)
        .ok_or_else(|| RangeError::InvalidComparator {
            input: token.to_string(),
        })?;
    let op = caps.name("op").map(|m| m.as_str()).unwrap_or("");
    let partial = Partial::parse(&caps["version"])?;

    match op {
        "^" => expand_caret(&partial, set)?,
        "~" | "~>" => expand_tilde(&partial, set)?,
        _ => {
            let operator = Operator::parse(op).ok_or_else(|| RangeError::InvalidComparator {
                input: token.to_string(),
            })?;
            expand_primitive(operator, &partial, set)?;
        }
    }
    Ok(())
}

fn expand_caret(partial: &Partial, set: &mut Vec<Comparator>) -> Result<(), RangeError> {
    let Some(major) = partial.major else {
        return Ok(());
    };

    let upper = match (major, partial.minor, partial.patch) {
        (_, None, _) => Version::new(partial.next(major)?, 0, 0),
        (0, Some(minor), None) => Version::new(0, partial.next(minor)?, 0),
        (0, Some(0), Some(patch)) => Version::new(0, 0, partial.next(patch)?),
        (0, Some(minor), Some(_)) => Version::new(0, partial.next(minor)?, 0),
        _ => Version::new(partial.next(major)?, 0, 0),
    };

    set.push(Comparator::new(Operator::GreaterThanOrEqual, partial.floor()));
    set.push(Comparator::new(Operator::LessThan, upper));
    Ok(())
}

fn expand_tilde(partial: &Partial, set: &mut Vec<Comparator>) -> Result<(), RangeError> {
    let Some(major) = partial.major else {
        return Ok(());
    };

    let upper = match partial.minor {
        None => Version::new(partial.next(major)?, 0, 0),
        Some(minor) => Version::new(major, partial.next(minor)?, 0),
    };

    set.push(Comparator::new(Operator::GreaterThanOrEqual, partial.floor()));
    set.push(Comparator::new(Operator::LessThan, upper));
    Ok(())
}

fn expand_primitive(operator: Operator, partial: &Partial, set: &mut Vec<Comparator>) -> Result<(), RangeError> {
    if partial.is_any() {
        if matches!(operator, Operator::LessThan | Operator::GreaterThan) {
            set.push(Comparator::match_none());
        }
        return Ok(());
    }

    if partial.is_full() {
        set.push(Comparator::new(operator, partial.floor()));
        return Ok(());
    }

    match operator {
        Operator::Equal => {
            set.push(Comparator::new(Operator::GreaterThanOrEqual, partial.floor()));
            set.push(Comparator::new(Operator::LessThan, partial.ceiling()?));
        }
        Operator::GreaterThan => {
            set.push(Comparator::new(Operator::GreaterThanOrEqual, partial.ceiling()?));
        }
        Operator::GreaterThanOrEqual | Operator::LessThan => {
            set.push(Comparator::new(operator, partial.floor()));
        }
        Operator::LessThanOrEqual => {
            set.push(Comparator::new(Operator::LessThan, partial.ceiling()?));
        }
    }
    Ok(())
}
