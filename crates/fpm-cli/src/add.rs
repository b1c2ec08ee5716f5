//! Add command - install one package and record it in package.json.

use anyhow::{Context as _, Result};
use clap::Args;

use crate::Context;

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Package to add (e.g., lodash, lodash@^4.17.0, @types/node@20)
    #[arg(value_name = "PACKAGE")]
    pub package: String,

    /// Add to devDependencies
    #[arg(short = 'D', long = "save-dev")]
    pub save_dev: bool,
}

pub async fn execute(args: AddArgs, context: &Context) -> Result<i32> {
    let output = context.output();
    let progress = context.progress();
    let spinner = progress.create_counter(&format!("Adding {}", args.package));

    let project = context.project(spinner.clone())?;
    let result = project.add(&args.package, args.save_dev).await;
    spinner.finish_and_clear();

    let record = result.with_context(|| format!("Failed to add {}", args.package))?;

    let section = if args.save_dev { "devDependencies" } else { "dependencies" };
    output.success(&format!("Added {} to {}", record, section));
    output.verbose(&format!("Installed into {}", record.path.display()));

    Ok(0)
}
