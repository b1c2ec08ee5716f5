//! Install command - install every dependency declared in package.json.

use anyhow::{Context as _, Result};
use clap::Args;
use console::style;

use crate::Context;

#[derive(Args, Debug)]
pub struct InstallArgs {}

pub async fn execute(_args: InstallArgs, context: &Context) -> Result<i32> {
    let output = context.output();
    let progress = context.progress();
    let spinner = progress.create_counter("Installing dependencies");

    let project = context.project(spinner.clone())?;
    output.verbose(&format!("Reading {}", project.manifest_path().display()));

    let result = project.install().await;
    spinner.finish_and_clear();

    let report = result.context("Failed to install dependencies")?;

    output.install_report(&report);
    for (request, version) in &report.requested {
        output.verbose(&format!("  {} {} {}", request, style("->").dim(), version));
    }

    Ok(0)
}
