//! Semantic version ranges as understood by the npm registry ecosystem.
//!
//! Versions themselves are `semver::Version`; this crate adds the range grammar
//! (`^1.2.3`, `~1.2`, `1.x`, `>=1.0.0 <2.0.0 || 3.0.0 - 3.4`, ...) and matching
//! with npm's prerelease rules.

mod comparator;
mod operator;
mod range;

pub use comparator::Comparator;
pub use operator::Operator;
pub use range::{parse_version, Range, RangeError};
pub use semver::Version;
