//! Package installation.
//!
//! Packages are resolved against the registry, fetched, extracted into the
//! install root and their declared dependencies followed. All tasks of one
//! `add` or `install` share an [`InstallRun`], which deduplicates work by
//! package name and records the dependency graph.

mod dedup;
mod installer;
mod presence;
mod run;

pub use dedup::{Claim, ClaimGuard, DedupState};
pub use installer::Installer;
pub use presence::InstallTree;
pub use run::{FailurePolicy, InstallReport, InstallRun};
