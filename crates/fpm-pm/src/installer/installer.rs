use indicatif::ProgressBar;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::dedup::{Claim, ClaimGuard};
use super::presence::InstallTree;
use super::run::{FailurePolicy, InstallRun};
use crate::downloader::{ArchiveExtractor, ArchiveFetcher};
use crate::json::declared_dependencies;
use crate::package::{validate_package_name, InstallRecord, PackageRequest};
use crate::registry::Registry;
use crate::{FpmError, Result};

const DEFAULT_MAX_CONCURRENCY: usize = 16;

/// One package handled by [`Installer::install_step`]
struct Step {
    version: String,
    /// Dependencies still to visit; empty unless the package was fetched
    children: Vec<PackageRequest>,
}

/// Resolves, fetches and extracts packages into the install root, then walks
/// their declared dependencies.
#[derive(Clone)]
pub struct Installer {
    registry: Arc<dyn Registry>,
    fetcher: Arc<dyn ArchiveFetcher>,
    tree: InstallTree,
    max_concurrency: usize,
    progress: Option<ProgressBar>,
}

impl Installer {
    pub fn new(
        registry: Arc<dyn Registry>,
        fetcher: Arc<dyn ArchiveFetcher>,
        install_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            registry,
            fetcher,
            tree: InstallTree::new(install_dir),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            progress: None,
        }
    }

    /// Bound on direct dependencies installed at once
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Ticked once per fetched package
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn install_dir(&self) -> &Path {
        self.tree.root()
    }

    /// Install `request` and its dependency tree, returning the version the
    /// request itself resolved to.
    ///
    /// The tree is walked depth-first with an explicit stack. Under
    /// [`FailurePolicy::BestEffort`] a failing dependency is logged and its
    /// siblings are still attempted; a failure of `request` itself is always
    /// returned.
    pub async fn install_package(
        &self,
        run: &InstallRun,
        request: &PackageRequest,
        policy: FailurePolicy,
    ) -> Result<String> {
        if run.is_cancelled() {
            return Err(FpmError::Cancelled);
        }

        let root = self.install_step(run, request).await?;

        let mut visited = HashSet::from([request.name.clone()]);
        let mut stack: Vec<(String, PackageRequest)> = Vec::new();
        push_children(&mut stack, &request.name, root.children);

        while let Some((parent, dependency)) = stack.pop() {
            if run.is_cancelled() {
                return Err(FpmError::Cancelled);
            }

            run.graph().add_vertex(&dependency.name);
            if let Err(e) = run.graph().add_edge(&parent, &dependency.name) {
                log::warn!("Not recording dependency: {}", e);
            }

            if !visited.insert(dependency.name.clone()) {
                continue;
            }

            match self.install_step(run, &dependency).await {
                Ok(step) => push_children(&mut stack, &dependency.name, step.children),
                Err(e) => match policy {
                    FailurePolicy::Strict => return Err(e),
                    FailurePolicy::BestEffort => {
                        log::warn!("Failed to install {} (required by {}): {}", dependency, parent, e);
                    }
                },
            }
        }

        Ok(root.version)
    }

    /// Install every direct request concurrently, one task per request.
    ///
    /// At most `max_concurrency` tasks run at once. The first failure cancels
    /// the run so remaining tasks stop before their next package; all tasks
    /// are drained before that failure is returned. Resolved versions come
    /// back in request order.
    pub async fn install_all(
        &self,
        run: &Arc<InstallRun>,
        requests: Vec<PackageRequest>,
    ) -> Result<Vec<(PackageRequest, String)>> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();

        for (index, request) in requests.into_iter().enumerate() {
            let installer = self.clone();
            let run = Arc::clone(run);
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| FpmError::InstallationFailed(e.to_string()))?;

                let result = installer
                    .install_package(&run, &request, FailurePolicy::BestEffort)
                    .await;
                if let Err(ref e) = result {
                    if !matches!(e, FpmError::Cancelled) {
                        run.cancel();
                    }
                }
                result.map(|version| (index, request, version))
            });
        }

        let mut resolved = Vec::new();
        let mut first_error: Option<FpmError> = None;

        while let Some(joined) = tasks.join_next().await {
            let outcome = joined
                .unwrap_or_else(|e| Err(FpmError::InstallationFailed(format!("install task failed: {}", e))));
            match outcome {
                Ok(entry) => resolved.push(entry),
                Err(FpmError::Cancelled) => {}
                Err(e) if first_error.is_none() => first_error = Some(e),
                Err(e) => log::debug!("Additional install failure: {}", e),
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        resolved.sort_by_key(|(index, _, _)| *index);
        Ok(resolved
            .into_iter()
            .map(|(_, request, version)| (request, version))
            .collect())
    }

    async fn install_step(&self, run: &InstallRun, request: &PackageRequest) -> Result<Step> {
        validate_package_name(&request.name)?;

        match run.dedup().claim(&request.name) {
            Claim::Resolved(version) => {
                log::trace!("{} already handled in this run ({})", request.name, version);
                run.graph().add_vertex(&request.name);
                Ok(Step {
                    version,
                    children: Vec::new(),
                })
            }
            Claim::Pending(mut receiver) => {
                log::debug!("Waiting for concurrent install of {}", request.name);
                let version = receiver
                    .wait_for(Option::is_some)
                    .await
                    .ok()
                    .and_then(|v| v.clone())
                    .unwrap_or_else(|| request.range.clone());
                Ok(Step {
                    version,
                    children: Vec::new(),
                })
            }
            Claim::Owner(guard) => self.install_claimed(run, request, guard).await,
        }
    }

    async fn install_claimed(
        &self,
        run: &InstallRun,
        request: &PackageRequest,
        guard: ClaimGuard<'_>,
    ) -> Result<Step> {
        let name = request.name.clone();

        let tree = self.tree.clone();
        let (present, installed_version) = blocking({
            let name = name.clone();
            let range = request.range.clone();
            move || -> Result<(bool, Option<String>)> {
                if !tree.is_fully_present(&name) {
                    return Ok((false, None));
                }
                let version = tree.installed_version(&name);
                match version {
                    Some(ref installed) if !satisfies(installed, &range) => {
                        log::debug!("Replacing {}@{}, which does not satisfy {}", name, installed, range);
                        std::fs::remove_dir_all(tree.package_dir(&name))?;
                        Ok((false, None))
                    }
                    _ => Ok((true, version)),
                }
            }
        })
        .await?;

        if present {
            let version = installed_version.unwrap_or_else(|| request.range.clone());
            log::debug!("{}@{} is already installed", name, version);
            run.graph().add_vertex(&name);
            guard.complete(&version);
            return Ok(Step {
                version,
                children: Vec::new(),
            });
        }

        let manifest = self.registry.resolve(&name, &request.range).await?;
        log::debug!("Installing {}@{} from {}", name, manifest.version, manifest.dist.tarball);

        let archive = self
            .fetcher
            .fetch(&manifest.dist.tarball, &manifest.dist.shasum, self.tree.root())
            .await?;

        let root = self.tree.root().to_path_buf();
        let target = blocking({
            let name = name.clone();
            move || ArchiveExtractor::extract(&archive, &root, &name)
        })
        .await?;

        run.graph().add_vertex(&name);
        guard.complete(&manifest.version);

        let record = InstallRecord {
            name: name.clone(),
            version: manifest.version.clone(),
            path: target.clone(),
        };
        if let Some(ref progress) = self.progress {
            progress.inc(1);
            progress.set_message(record.to_string());
        }
        run.dedup().record(record);

        let children = blocking({
            let name = name.clone();
            move || declared_dependencies(&target, &name)
        })
        .await
        .unwrap_or_else(|e| {
            log::warn!("Not following dependencies of {}: {}", name, e);
            Vec::new()
        });

        Ok(Step {
            version: manifest.version,
            children,
        })
    }
}

/// Whether an installed version meets `range`. Dist-tags and other
/// non-range requests accept whatever is installed.
fn satisfies(version: &str, range: &str) -> bool {
    match (fpm_semver::parse_version(version), fpm_semver::Range::parse(range)) {
        (Ok(version), Ok(range)) => range.satisfies(&version),
        _ => true,
    }
}

/// Queue `children` so they pop in declaration order.
fn push_children(stack: &mut Vec<(String, PackageRequest)>, parent: &str, children: Vec<PackageRequest>) {
    stack.extend(
        children
            .into_iter()
            .rev()
            .map(|child| (parent.to_string(), child)),
    );
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| FpmError::InstallationFailed(format!("blocking task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{package_tarball, FakeRegistry};
    use std::time::Duration;

    fn installer(fake: &Arc<FakeRegistry>, root: &Path) -> Installer {
        Installer::new(fake.clone(), fake.clone(), root)
    }

    #[tokio::test]
    async fn test_install_with_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeRegistry::new());
        fake.publish("app-lib", "1.0.0", &[("left", "^1.0.0"), ("right", "^2.0.0")]);
        fake.publish("left", "1.4.0", &[("shared", "~0.3.0")]);
        fake.publish("right", "2.0.1", &[("shared", "~0.3.0")]);
        fake.publish("shared", "0.3.9", &[]);

        let run = InstallRun::new();
        let version = installer(&fake, dir.path())
            .install_package(&run, &PackageRequest::new("app-lib", "^1.0.0"), FailurePolicy::Strict)
            .await
            .unwrap();

        assert_eq!(version, "1.0.0");
        for name in ["app-lib", "left", "right", "shared"] {
            assert!(dir.path().join(name).join("package.json").is_file(), "{} missing", name);
        }
        assert_eq!(fake.fetch_count("shared"), 1);
        assert_eq!(run.graph().dependencies_of("app-lib"), vec!["left", "right"]);
        assert!(run.graph().contains_edge("right", "shared"));
        assert_eq!(run.records().len(), 4);
    }

    #[tokio::test]
    async fn test_highest_satisfying_version() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeRegistry::new());
        fake.publish("lodash", "4.17.20", &[]);
        fake.publish("lodash", "4.17.21", &[]);
        fake.publish("lodash", "5.0.0", &[]);

        let run = InstallRun::new();
        let version = installer(&fake, dir.path())
            .install_package(&run, &PackageRequest::new("lodash", "^4.0.0"), FailurePolicy::Strict)
            .await
            .unwrap();

        assert_eq!(version, "4.17.21");
        assert_eq!(fake.fetch_count("lodash"), 1);
    }

    #[tokio::test]
    async fn test_name_cycle_installs_each_once() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeRegistry::new());
        fake.publish("a", "1.0.0", &[("b", "^1.0.0")]);
        fake.publish("b", "1.0.0", &[("a", "^1.0.0")]);

        let run = InstallRun::new();
        installer(&fake, dir.path())
            .install_package(&run, &PackageRequest::new("a", "^1.0.0"), FailurePolicy::Strict)
            .await
            .unwrap();

        assert_eq!(fake.fetch_count("a"), 1);
        assert_eq!(fake.fetch_count("b"), 1);
        assert!(run.graph().contains_edge("a", "b"));
        assert!(!run.graph().contains_edge("b", "a"));
        assert!(run.graph().is_acyclic());
    }

    #[tokio::test]
    async fn test_concurrent_requests_fetch_once() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeRegistry::new());
        fake.publish("react", "18.2.0", &[]);
        fake.set_fetch_delay(Duration::from_millis(50));

        let run = Arc::new(InstallRun::new());
        let installer = installer(&fake, dir.path());
        let request = PackageRequest::new("react", "^18.0.0");

        let (first, second) = tokio::join!(
            installer.install_package(&run, &request, FailurePolicy::Strict),
            installer.install_package(&run, &request, FailurePolicy::Strict),
        );

        assert_eq!(first.unwrap(), "18.2.0");
        assert_eq!(second.unwrap(), "18.2.0");
        assert_eq!(fake.fetch_count("react"), 1);
        assert_eq!(fake.resolve_count("react"), 1);
    }

    #[tokio::test]
    async fn test_second_install_is_offline() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeRegistry::new());
        fake.publish("a", "1.0.0", &[("b", "^1.0.0")]);
        fake.publish("b", "1.1.0", &[]);
        let installer = installer(&fake, dir.path());
        let requests = vec![PackageRequest::new("a", "^1.0.0"), PackageRequest::new("b", "^1.0.0")];

        installer
            .install_all(&Arc::new(InstallRun::new()), requests.clone())
            .await
            .unwrap();
        let fetched = fake.total_fetches();

        let run = Arc::new(InstallRun::new());
        let resolved = installer.install_all(&run, requests).await.unwrap();

        assert_eq!(fake.total_fetches(), fetched);
        assert_eq!(fake.resolve_count("a"), 1);
        assert!(run.records().is_empty());
        assert_eq!(resolved[0].1, "1.0.0");
        assert_eq!(resolved[1].1, "1.1.0");
    }

    #[tokio::test]
    async fn test_partial_tree_installs_missing_dependency() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeRegistry::new());
        fake.publish("a", "1.0.0", &[("b", "^1.0.0")]);
        fake.publish("b", "1.0.0", &[]);
        let installer = installer(&fake, dir.path());
        let request = PackageRequest::new("a", "^1.0.0");

        installer
            .install_package(&InstallRun::new(), &request, FailurePolicy::Strict)
            .await
            .unwrap();
        std::fs::remove_dir_all(dir.path().join("b")).unwrap();

        installer
            .install_package(&InstallRun::new(), &request, FailurePolicy::Strict)
            .await
            .unwrap();

        assert!(dir.path().join("b/package.json").is_file());
        assert_eq!(fake.fetch_count("b"), 2);
    }

    #[tokio::test]
    async fn test_failure_policies() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeRegistry::new());
        fake.publish("top", "1.0.0", &[("broken", "^1.0.0"), ("fine", "^1.0.0")]);
        fake.publish("fine", "1.0.0", &[]);
        fake.publish_raw(
            "broken",
            "1.0.0",
            &[],
            package_tarball("broken", "1.0.0", &[]),
            "0000000000000000000000000000000000000000",
        );
        let request = PackageRequest::new("top", "^1.0.0");

        let strict_dir = dir.path().join("strict");
        let err = installer(&fake, &strict_dir)
            .install_package(&InstallRun::new(), &request, FailurePolicy::Strict)
            .await
            .unwrap_err();
        assert!(matches!(err, FpmError::Integrity { .. }));
        assert!(!strict_dir.join("broken").exists());

        let lenient_dir = dir.path().join("lenient");
        let version = installer(&fake, &lenient_dir)
            .install_package(&InstallRun::new(), &request, FailurePolicy::BestEffort)
            .await
            .unwrap();
        assert_eq!(version, "1.0.0");
        assert!(lenient_dir.join("fine/package.json").is_file());
        assert!(!lenient_dir.join("broken").exists());
    }

    #[tokio::test]
    async fn test_failing_direct_dependency_fails_run() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeRegistry::new());
        fake.publish("ok", "1.0.0", &[]);

        let run = Arc::new(InstallRun::new());
        let err = installer(&fake, dir.path())
            .with_max_concurrency(1)
            .install_all(
                &run,
                vec![
                    PackageRequest::new("ok", "latest"),
                    PackageRequest::new("nope", "^1.0.0"),
                ],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, FpmError::Upstream { status: 404, .. }));
        assert!(run.is_cancelled());
    }

    #[tokio::test]
    async fn test_scoped_package_nests_under_scope() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeRegistry::new());
        fake.publish("@types/node", "20.1.0", &[]);

        installer(&fake, dir.path())
            .install_package(&InstallRun::new(), &PackageRequest::new("@types/node", "latest"), FailurePolicy::Strict)
            .await
            .unwrap();

        assert!(dir.path().join("@types/node/package.json").is_file());
    }

    #[tokio::test]
    async fn test_installed_version_outside_range_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeRegistry::new());
        fake.publish("lodash", "4.17.21", &[]);
        fake.publish("lodash", "5.0.0", &[]);
        let installer = installer(&fake, dir.path());

        installer
            .install_package(&InstallRun::new(), &PackageRequest::new("lodash", "5.0.0"), FailurePolicy::Strict)
            .await
            .unwrap();

        let run = InstallRun::new();
        let version = installer
            .install_package(&run, &PackageRequest::new("lodash", "^4.0.0"), FailurePolicy::Strict)
            .await
            .unwrap();

        assert_eq!(version, "4.17.21");
        assert_eq!(fake.fetch_count("lodash"), 2);
        assert_eq!(run.records().len(), 1);
        assert_eq!(
            InstallTree::new(dir.path()).installed_version("lodash").as_deref(),
            Some("4.17.21")
        );

        // A dist-tag accepts whatever is installed
        installer
            .install_package(&InstallRun::new(), &PackageRequest::new("lodash", "latest"), FailurePolicy::Strict)
            .await
            .unwrap();
        assert_eq!(fake.fetch_count("lodash"), 2);
    }

    #[tokio::test]
    async fn test_dependency_names_cannot_leave_install_root() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeRegistry::new());
        fake.publish("innocent", "1.0.0", &[("../escaped", "*"), ("/tmp/absolute", "*")]);
        let request = PackageRequest::new("innocent", "latest");

        let strict_root = dir.path().join("strict/node_modules");
        let err = installer(&fake, &strict_root)
            .install_package(&InstallRun::new(), &request, FailurePolicy::Strict)
            .await
            .unwrap_err();
        assert!(matches!(err, FpmError::InvalidPackageName { .. }));
        assert!(!dir.path().join("strict/escaped").exists());

        let lenient_root = dir.path().join("lenient/node_modules");
        let version = installer(&fake, &lenient_root)
            .install_package(&InstallRun::new(), &request, FailurePolicy::BestEffort)
            .await
            .unwrap();
        assert_eq!(version, "1.0.0");
        assert!(lenient_root.join("innocent/package.json").is_file());
        assert!(!dir.path().join("lenient/escaped").exists());
        assert_eq!(fake.total_fetches(), 2);
    }
}
