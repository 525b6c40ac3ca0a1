use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Cell, Color, Table};
use pcb_cam::{to_address, AddressTarget};
use pcb_layer::{Board, VIRTUAL_LAYERS};
use serde::Serialize;

use crate::{stack, OutputFormat};

#[derive(Args, Debug)]
pub struct LayersArgs {
    /// Layer stack file (TOML)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub stack: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Debug, Serialize)]
struct GroupRow {
    id: usize,
    name: String,
    #[serde(rename = "type")]
    ltype: String,
    position: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    purpose: Option<String>,
    layers: Vec<String>,
    address: String,
}

#[derive(Debug, Serialize)]
struct VirtualRow {
    id: usize,
    name: &'static str,
    address: String,
}

#[derive(Debug, Serialize)]
struct LayersReport {
    groups: Vec<GroupRow>,
    #[serde(rename = "virtual")]
    virtual_layers: Vec<VirtualRow>,
}

fn report(board: &Board) -> LayersReport {
    let groups = board
        .group_ids()
        .filter_map(|gid| {
            let group = board.group(gid)?;
            Some(GroupRow {
                id: gid.0,
                name: group.name.clone(),
                ltype: group.ltype.to_expr(),
                position: group.ltype.position_class().to_string(),
                purpose: group.purpose.clone(),
                layers: group
                    .layers
                    .iter()
                    .filter_map(|lid| board.layer(*lid))
                    .map(|l| l.name.clone())
                    .collect(),
                address: to_address(board, AddressTarget::Group(gid)).unwrap_or_default(),
            })
        })
        .collect();

    let virtual_layers = VIRTUAL_LAYERS
        .iter()
        .map(|vl| VirtualRow {
            id: vl.id.0,
            name: vl.name,
            address: to_address(board, AddressTarget::Virtual(vl.id)).unwrap_or_default(),
        })
        .collect();

    LayersReport {
        groups,
        virtual_layers,
    }
}

pub fn execute(args: LayersArgs) -> Result<()> {
    let board = stack::load(&args.stack)?;
    let report = report(&board);

    match args.format {
        OutputFormat::Text => print_text(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

fn print_text(report: &LayersReport) {
    println!("{}", "Layer Groups".bold());
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(comfy_table::ContentArrangement::Dynamic);
    table.set_header(vec!["#", "Name", "Type", "Purpose", "Layers", "Address"]);
    for row in &report.groups {
        let layers = if row.layers.is_empty() {
            Cell::new("(empty)").fg(Color::DarkGrey)
        } else {
            Cell::new(row.layers.join(", "))
        };
        table.add_row(vec![
            Cell::new(row.id),
            Cell::new(&row.name),
            Cell::new(&row.ltype),
            Cell::new(row.purpose.as_deref().unwrap_or("")),
            layers,
            Cell::new(&row.address).fg(Color::Cyan),
        ]);
    }
    println!("{table}");

    println!();
    println!("{}", "Virtual Layers".bold());
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec!["#", "Name", "Address"]);
    for row in &report.virtual_layers {
        table.add_row(vec![
            Cell::new(row.id),
            Cell::new(row.name),
            Cell::new(&row.address).fg(Color::Cyan),
        ]);
    }
    println!("{table}");
}
