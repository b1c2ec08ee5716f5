mod add;
mod install;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use fpm_pm::cli::{Output, ProgressManager, Verbosity};
use fpm_pm::config::Config;
use fpm_pm::Project;
use indicatif::ProgressBar;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "fpm")]
#[command(about = "A minimal npm-compatible package manager", version)]
#[command(subcommand_required = true, arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Do not output any message
    #[arg(short = 'q', long, global = true)]
    quiet: bool,

    /// Working directory
    #[arg(short = 'd', long, default_value = ".", global = true)]
    working_dir: PathBuf,

    /// Registry base URL, overriding configuration
    #[arg(long, value_name = "URL", global = true)]
    registry: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Add a dependency to package.json and install it
    Add(add::AddArgs),

    /// Install every dependency declared in package.json
    #[command(alias = "i")]
    Install(install::InstallArgs),
}

/// Settings shared by every command
pub struct Context {
    pub working_dir: PathBuf,
    pub registry: Option<String>,
    pub verbosity: Verbosity,
}

impl Context {
    pub fn output(&self) -> Output {
        Output::new(self.verbosity)
    }

    pub fn progress(&self) -> ProgressManager {
        ProgressManager::new(self.verbosity != Verbosity::Quiet && console::Term::stderr().is_term())
    }

    pub fn project(&self, progress: ProgressBar) -> Result<Project> {
        let working_dir = self
            .working_dir
            .canonicalize()
            .with_context(|| format!("Failed to resolve working directory {}", self.working_dir.display()))?;

        let mut config = Config::build(Some(&working_dir), true).context("Failed to load configuration")?;
        if let Some(ref registry) = self.registry {
            log::debug!("Using registry {} from the command line", registry);
            config
                .set_command_value("registry", serde_json::Value::String(registry.clone()))
                .context("Invalid --registry")?;
        }

        log::debug!("Project root {}", working_dir.display());
        Project::builder(working_dir)
            .with_config(config)
            .with_progress(progress)
            .build()
            .context("Failed to set up project")
    }
}

fn init_logging(verbosity: Verbosity) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(verbosity.log_filter()))
        .format_timestamp(None)
        .init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let verbosity = Verbosity::from_flags(cli.verbose, cli.quiet);
    init_logging(verbosity);

    let context = Context {
        working_dir: cli.working_dir,
        registry: cli.registry,
        verbosity,
    };

    let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
    match cli.command {
        Commands::Add(args) => rt.block_on(add::execute(args, &context)),
        Commands::Install(args) => rt.block_on(install::execute(args, &context)),
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            Output::default().error(&*e);
            ExitCode::FAILURE
        }
    }
}
