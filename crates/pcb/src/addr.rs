use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use pcb_cam::{layer_address_to_id, layer_group_address_to_id};

use crate::stack;

#[derive(Args, Debug)]
pub struct AddrArgs {
    /// Layer stack file (TOML)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub stack: PathBuf,

    /// Addresses such as `#2`, `@top_silk` or `intern-copper:-1`
    #[arg(required = true)]
    pub addresses: Vec<String>,

    /// Resolve to layer ids instead of layer group ids
    #[arg(long)]
    pub layer: bool,
}

/// Prints `<address>\t<id>` per address; `-1` when it does not resolve.
pub fn execute(args: AddrArgs) -> Result<()> {
    let board = stack::load(&args.stack)?;
    for address in &args.addresses {
        let id = if args.layer {
            layer_address_to_id(&board, address).map(|lid| lid.0)
        } else {
            layer_group_address_to_id(&board, address).map(|gid| gid.0)
        };
        let id = id.map_or(-1, |id| id as i64);
        println!("{address}\t{id}");
    }
    Ok(())
}
