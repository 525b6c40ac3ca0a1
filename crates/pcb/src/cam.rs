use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Cell, Color, Table};
use pcb_cam::{CamError, CamOptions, CamSession, CamTarget, CamWarning, TransformOverride};
use serde::Serialize;

use crate::{stack, OutputFormat};

#[derive(Args, Debug)]
pub struct CamArgs {
    /// Layer stack file (TOML)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub stack: PathBuf,

    /// CAM instruction, e.g. `gerber/%name%.gbr=top-copper,bottom-copper`
    pub instruction: String,

    /// File name template variable
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = stack::parse_key_value)]
    pub vars: Vec<(String, String)>,

    /// Value for `$(KEY)` in file names
    #[arg(long = "config", value_name = "KEY=VALUE", value_parser = stack::parse_key_value)]
    pub config: Vec<(String, String)>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Debug, Serialize)]
struct PlanEntry {
    file: String,
    address: String,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    xform: Option<TransformOverride>,
}

#[derive(Debug, Serialize)]
struct PlanReport {
    entries: Vec<PlanEntry>,
    exported: usize,
    warnings: Vec<CamWarning>,
}

pub fn execute(args: CamArgs) -> Result<()> {
    let mut board = stack::load(&args.stack)?;
    let options = CamOptions {
        default_file_name: None,
        vars: Some(args.vars.into_iter().collect()),
        config: args.config.into_iter().collect(),
    };

    let mut session = CamSession::new(&mut board);
    session
        .begin(&args.instruction, &options)
        .with_context(|| format!("Invalid CAM instruction '{}'", args.instruction))?;

    let mut entries = Vec::new();
    session.export_each(|t: &CamTarget<'_>| -> Result<(), CamError> {
        entries.push(PlanEntry {
            file: t.file_name.to_string(),
            address: t.address.clone(),
            name: t.name.to_string(),
            xform: t.xform,
        });
        Ok(())
    })?;
    let warnings = session.warnings().to_vec();
    let outcome = session.end()?;

    let report = PlanReport {
        entries,
        exported: outcome.exported,
        warnings,
    };
    match args.format {
        OutputFormat::Text => print_text(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    outcome.verify(true)?;
    Ok(())
}

fn print_text(report: &PlanReport) {
    for warning in &report.warnings {
        eprintln!("{} {warning}", "Warning:".yellow());
    }
    if report.entries.is_empty() {
        println!("{}", "Nothing to export".dimmed());
        return;
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(comfy_table::ContentArrangement::Dynamic);
    table.set_header(vec!["File", "Address", "Name", "Overrides"]);
    for entry in &report.entries {
        let overrides = entry
            .xform
            .map(|x| x.describe().join(", "))
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(&entry.file).fg(Color::Green),
            Cell::new(&entry.address).fg(Color::Cyan),
            Cell::new(&entry.name),
            Cell::new(overrides),
        ]);
    }
    println!("{table}");
    println!("{} targets exported", report.exported.to_string().bold());
}
