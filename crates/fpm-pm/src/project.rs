use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::downloader::{remove_stale_archives, ArchiveFetcher, HttpFetcher};
use crate::http::HttpClient;
use crate::installer::{FailurePolicy, InstallReport, InstallRun, Installer};
use crate::json::{DependencySection, ProjectManifest};
use crate::package::{validate_package_name, InstallRecord, PackageRequest};
use crate::registry::{Registry, RegistryClient};
use crate::Result;

/// A project directory with its manifest, install root and registry.
pub struct Project {
    working_dir: PathBuf,
    config: Config,
    registry: Arc<dyn Registry>,
    fetcher: Arc<dyn ArchiveFetcher>,
    progress: Option<ProgressBar>,
}

impl Project {
    pub fn builder(working_dir: impl Into<PathBuf>) -> ProjectBuilder {
        ProjectBuilder::new(working_dir.into())
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn install_dir(&self) -> PathBuf {
        self.config.get_install_dir()
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.config.get_manifest_path()
    }

    fn installer(&self) -> Installer {
        let installer = Installer::new(self.registry.clone(), self.fetcher.clone(), self.install_dir())
            .with_max_concurrency(self.config.max_concurrency);
        match self.progress {
            Some(ref progress) => installer.with_progress(progress.clone()),
            None => installer,
        }
    }

    /// Install one `name[@range]` with its dependencies and record it in the
    /// manifest's `dependencies`, or `devDependencies` when `dev` is set.
    ///
    /// Any failure in the tree fails the command and leaves the manifest
    /// untouched.
    pub async fn add(&self, arg: &str, dev: bool) -> Result<InstallRecord> {
        let request = PackageRequest::parse(arg);
        validate_package_name(&request.name)?;

        let mut manifest = ProjectManifest::load(&self.manifest_path())?;
        let install_dir = self.install_dir();
        tokio::fs::create_dir_all(&install_dir).await?;

        let run = InstallRun::new();
        let result = self
            .installer()
            .install_package(&run, &request, FailurePolicy::Strict)
            .await;
        self.sweep(&install_dir);
        let version = result?;

        let section = DependencySection::for_dev(dev);
        let saved = saved_range(&self.config.save_prefix, &version);
        manifest.set_dependency(section, &request.name, &saved)?;
        manifest.save()?;
        log::info!("Added {}@{} to {}", request.name, saved, section.key());

        Ok(InstallRecord {
            path: install_dir.join(&request.name),
            name: request.name,
            version,
        })
    }

    /// Install everything the manifest declares, regular and dev
    /// dependencies alike, one concurrent task per direct dependency.
    pub async fn install(&self) -> Result<InstallReport> {
        let manifest = ProjectManifest::load(&self.manifest_path())?;
        let requests = manifest.all_requests()?;
        log::debug!("{} declared dependencies", requests.len());

        let install_dir = self.install_dir();
        tokio::fs::create_dir_all(&install_dir).await?;

        let run = Arc::new(InstallRun::new());
        let result = self.installer().install_all(&run, requests).await;
        self.sweep(&install_dir);

        Ok(InstallReport {
            requested: result?,
            installed: run.records(),
        })
    }

    fn sweep(&self, install_dir: &Path) {
        if let Err(e) = remove_stale_archives(install_dir) {
            log::warn!("Failed to clean up {}: {}", install_dir.display(), e);
        }
    }
}

/// Version string written to the manifest for a resolved version
fn saved_range(prefix: &str, version: &str) -> String {
    if fpm_semver::Version::parse(version).is_ok() {
        format!("{}{}", prefix, version)
    } else {
        version.to_string()
    }
}

/// Builder for [`Project`]; anything not supplied comes from the config.
pub struct ProjectBuilder {
    working_dir: PathBuf,
    config: Option<Config>,
    registry: Option<Arc<dyn Registry>>,
    fetcher: Option<Arc<dyn ArchiveFetcher>>,
    http_client: Option<Arc<HttpClient>>,
    progress: Option<ProgressBar>,
}

impl ProjectBuilder {
    pub fn new(working_dir: PathBuf) -> Self {
        Self {
            working_dir,
            config: None,
            registry: None,
            fetcher: None,
            http_client: None,
            progress: None,
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_registry(mut self, registry: Arc<dyn Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn ArchiveFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_http_client(mut self, http_client: Arc<HttpClient>) -> Self {
        self.http_client = Some(http_client);
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn build(self) -> Result<Project> {
        let mut config = match self.config {
            Some(config) => config,
            None => Config::build(Some(&self.working_dir), true)?,
        };
        if config.base_dir().is_none() {
            config.set_base_dir(&self.working_dir);
        }

        let http_client = match self.http_client {
            Some(client) => client,
            None => Arc::new(HttpClient::with_config(config.http_client_config())?),
        };

        let registry: Arc<dyn Registry> = match self.registry {
            Some(registry) => registry,
            None => Arc::new(RegistryClient::new(http_client.clone(), config.registry.clone())),
        };
        let fetcher: Arc<dyn ArchiveFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpFetcher::new(http_client)),
        };

        Ok(Project {
            working_dir: self.working_dir,
            config,
            registry,
            fetcher,
            progress: self.progress,
        })
    }
}
