//! Output formatting for CLI.

use console::{style, Term};
use std::io::Write;

use crate::installer::InstallReport;
use crate::package::InstallRecord;

/// Verbosity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
    VeryVerbose,
    Debug,
}

impl Verbosity {
    /// Map `-q` and the number of `-v` flags to a level
    pub fn from_flags(verbose: u8, quiet: bool) -> Self {
        if quiet {
            return Verbosity::Quiet;
        }
        match verbose {
            0 => Verbosity::Normal,
            1 => Verbosity::Verbose,
            2 => Verbosity::VeryVerbose,
            _ => Verbosity::Debug,
        }
    }

    /// Log filter matching this level
    pub fn log_filter(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn",
            Verbosity::Verbose => "info",
            Verbosity::VeryVerbose => "debug",
            Verbosity::Debug => "trace",
        }
    }
}

/// Output handler for CLI
pub struct Output {
    term: Term,
    verbosity: Verbosity,
}

impl Output {
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            term: Term::stderr(),
            verbosity,
        }
    }

    fn should_output(&self, min_verbosity: Verbosity) -> bool {
        self.verbosity >= min_verbosity
    }

    pub fn success(&self, message: &str) {
        if self.should_output(Verbosity::Normal) {
            let _ = writeln!(&self.term, "{}", style(message).green());
        }
    }

    /// Print an error and every cause below it; shown even in quiet mode.
    pub fn error(&self, error: &dyn std::error::Error) {
        let mut lines = error_lines(error).into_iter();
        if let Some(first) = lines.next() {
            let _ = writeln!(&self.term, "{} {}", style("Error:").red().bold(), first);
        }
        for cause in lines {
            let _ = writeln!(&self.term, "  {} {}", style("Caused by:").dim(), cause);
        }
    }

    pub fn verbose(&self, message: &str) {
        if self.should_output(Verbosity::Verbose) {
            let _ = writeln!(&self.term, "{}", style(message).dim());
        }
    }

    pub fn list_item(&self, prefix: &str, message: &str) {
        if self.should_output(Verbosity::Normal) {
            let _ = writeln!(&self.term, "  {} {}", style(prefix).green(), message);
        }
    }

    /// One line per fetched package, then a summary
    pub fn install_report(&self, report: &InstallReport) {
        for record in &report.installed {
            self.record(record);
        }
        if report.is_up_to_date() {
            self.success("All dependencies are already installed");
        } else {
            self.success(&format!("Installed {} packages", report.installed.len()));
        }
    }

    pub fn record(&self, record: &InstallRecord) {
        self.list_item("+", &record.to_string());
        self.verbose(&format!("    {}", record.path.display()));
    }

    pub fn is_quiet(&self) -> bool {
        self.verbosity == Verbosity::Quiet
    }
}

/// Messages of `error` and its sources, outermost first
fn error_lines(error: &dyn std::error::Error) -> Vec<String> {
    let mut lines = vec![error.to_string()];
    let mut source = error.source();
    while let Some(cause) = source {
        lines.push(cause.to_string());
        source = cause.source();
    }
    lines
}

impl Default for Output {
    fn default() -> Self {
        Self::new(Verbosity::Normal)
    }
}
