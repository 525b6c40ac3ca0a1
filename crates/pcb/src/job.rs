use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use pcb_cam::{ExporterRegistry, Job, VarStore};

use crate::list::ListExporter;
use crate::stack;

#[derive(Args, Debug)]
pub struct JobArgs {
    /// Layer stack file (TOML)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub stack: PathBuf,

    /// CAM job script
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub script: PathBuf,

    /// File name template variable
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = stack::parse_key_value)]
    pub vars: Vec<(String, String)>,
}

pub fn execute(args: JobArgs) -> Result<()> {
    let mut board = stack::load(&args.stack)?;
    let script = std::fs::read_to_string(&args.script)
        .with_context(|| format!("Failed to read {}", args.script.display()))?;
    let job = Job::compile(&script)
        .with_context(|| format!("Failed to compile CAM job {}", args.script.display()))?;

    let mut registry = ExporterRegistry::new();
    registry.register(Box::new(ListExporter));

    let vars: VarStore = args.vars.into_iter().collect();
    let report = job
        .run(&mut board, &mut registry, vars)
        .with_context(|| format!("CAM job {} failed", args.script.display()))?;

    for line in &report.description {
        println!("{}", line.dimmed());
    }
    for write in &report.writes {
        println!("{} {write}", "wrote".green());
    }
    Ok(())
}
