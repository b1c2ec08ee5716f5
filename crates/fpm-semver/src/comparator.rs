use semver::{BuildMetadata, Prerelease, Version};
use std::fmt;

use crate::operator::Operator;

/// A single `<op><version>` test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparator {
    pub operator: Operator,
    pub version: Version,
}

impl Comparator {
    pub fn new(operator: Operator, version: Version) -> Self {
        Self { operator, version }
    }

    /// A comparator nothing satisfies (`<0.0.0-0`).
    pub(crate) fn match_none() -> Self {
        let mut floor = Version::new(0, 0, 0);
        floor.pre = Prerelease::new("0").unwrap_or(Prerelease::EMPTY);
        Self::new(Operator::LessThan, floor)
    }

    /// Test a version against this comparator. Build metadata never takes part.
    pub fn matches(&self, version: &Version) -> bool {
        let ordering = if version.build.is_empty() {
            version.cmp(&self.version)
        } else {
            let mut stripped = version.clone();
            stripped.build = BuildMetadata::EMPTY;
            stripped.cmp(&self.version)
        };
        self.operator.accepts(ordering)
    }

    /// Whether this comparator opts a prerelease of the same release tuple into matching.
    pub(crate) fn admits_prerelease_of(&self, version: &Version) -> bool {
        !self.version.pre.is_empty()
            && self.version.major == version.major
            && self.version.minor == version.minor
            && self.version.patch == version.patch
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.operator, self.version)
    }
}
