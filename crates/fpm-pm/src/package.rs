//! Package requests and install records.

use std::fmt;
use std::path::PathBuf;

use crate::{FpmError, Result};

/// Range used when a request names no version
pub const DEFAULT_RANGE: &str = "latest";

/// A name plus the range it should be resolved against
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageRequest {
    pub name: String,
    pub range: String,
}

impl PackageRequest {
    pub fn new(name: impl Into<String>, range: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            range: range.into(),
        }
    }

    /// Parse a command-line argument: `name`, `name@range`, `@scope/name`
    /// or `@scope/name@range`. The range defaults to `latest`.
    pub fn parse(arg: &str) -> Self {
        let arg = arg.trim();
        let (scope, rest) = match arg.strip_prefix('@') {
            Some(rest) => ("@", rest),
            None => ("", arg),
        };

        match rest.split_once('@') {
            Some((name, range)) if !range.is_empty() => Self::new(format!("{}{}", scope, name), range),
            Some((name, _)) => Self::new(format!("{}{}", scope, name), DEFAULT_RANGE),
            None => Self::new(arg, DEFAULT_RANGE),
        }
    }

    pub fn is_scoped(&self) -> bool {
        self.name.starts_with('@')
    }
}

/// Check that `name` is a single `name` or `@scope/name` that stays inside
/// the install root when joined onto it.
pub fn validate_package_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| -> Result<()> {
        Err(FpmError::InvalidPackageName {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    };

    let segments: Vec<&str> = match name.strip_prefix('@') {
        Some(scoped) => {
            let segments: Vec<&str> = scoped.split('/').collect();
            if segments.len() != 2 {
                return invalid("scoped names must look like @scope/name");
            }
            segments
        }
        None if name.contains('/') => return invalid("unscoped names cannot contain '/'"),
        None => vec![name],
    };

    for segment in segments {
        if segment.is_empty() {
            return invalid("empty name segment");
        }
        if segment == "." || segment == ".." {
            return invalid("relative path segment");
        }
        if segment.contains('\\') || segment.contains('\0') {
            return invalid("contains a path separator");
        }
    }

    Ok(())
}

impl fmt::Display for PackageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.range)
    }
}

/// A package that reached its installed state during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRecord {
    pub name: String,
    pub version: String,
    pub path: PathBuf,
}

impl fmt::Display for InstallRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_names() {
        assert_eq!(PackageRequest::parse("react"), PackageRequest::new("react", "latest"));
        assert_eq!(PackageRequest::parse("react@18.2.0"), PackageRequest::new("react", "18.2.0"));
        assert_eq!(PackageRequest::parse("lodash@^4.0.0"), PackageRequest::new("lodash", "^4.0.0"));
        assert_eq!(PackageRequest::parse("react@"), PackageRequest::new("react", "latest"));
    }

    #[test]
    fn test_parse_scoped_names() {
        let request = PackageRequest::parse("@types/node");
        assert_eq!(request, PackageRequest::new("@types/node", "latest"));
        assert!(request.is_scoped());

        assert_eq!(
            PackageRequest::parse("@babel/core@^7.0.0"),
            PackageRequest::new("@babel/core", "^7.0.0")
        );
    }

    #[test]
    fn test_validate_package_name() {
        for name in ["lodash", "@types/node", "left-pad", "@babel/core", "lodash.merge"] {
            assert!(validate_package_name(name).is_ok(), "{name}");
        }

        for name in [
            "",
            "..",
            ".",
            "../escaped",
            "/tmp/x",
            "a/b",
            "@scope",
            "@scope/",
            "@/name",
            "@scope/..",
            "@scope/a/b",
            "..\\evil",
        ] {
            assert!(
                matches!(validate_package_name(name), Err(FpmError::InvalidPackageName { .. })),
                "{name}"
            );
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(PackageRequest::new("a", "^1.0.0").to_string(), "a@^1.0.0");
    }
}
