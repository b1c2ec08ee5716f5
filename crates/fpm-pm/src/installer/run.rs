use std::fmt;

use super::dedup::DedupState;
use crate::dependency_graph::DependencyGraph;
use crate::package::{InstallRecord, PackageRequest};

/// How failures below a directly requested package are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// The first failing transitive dependency fails the whole request
    Strict,
    /// Transitive failures are logged and the remaining siblings still install
    BestEffort,
}

/// State shared by every task of one `add` or `install` invocation.
#[derive(Default)]
pub struct InstallRun {
    dedup: DedupState,
    graph: DependencyGraph,
}

impl InstallRun {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dedup(&self) -> &DedupState {
        &self.dedup
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn cancel(&self) {
        self.dedup.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.dedup.is_cancelled()
    }

    /// Packages fetched and extracted so far, in completion order
    pub fn records(&self) -> Vec<InstallRecord> {
        self.dedup.records()
    }
}

/// Result of installing every declared dependency of a project
#[derive(Debug, Clone, Default)]
pub struct InstallReport {
    /// Direct requests and the version each one resolved to
    pub requested: Vec<(PackageRequest, String)>,
    /// Packages that were actually fetched during the run
    pub installed: Vec<InstallRecord>,
}

impl InstallReport {
    pub fn is_up_to_date(&self) -> bool {
        self.installed.is_empty()
    }
}

impl fmt::Display for InstallReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} direct dependencies, {} packages installed",
            self.requested.len(),
            self.installed.len()
        )
    }
}
