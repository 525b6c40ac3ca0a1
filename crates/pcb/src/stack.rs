use std::path::Path;

use anyhow::{Context, Result};
use pcb_layer::Board;

/// Load a layer stack file.
pub fn load(path: &Path) -> Result<Board> {
    pcb_layer::load_board(path)
        .with_context(|| format!("Failed to load layer stack {}", path.display()))
}

/// Parse a `KEY=VALUE` command line argument.
pub fn parse_key_value(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{arg}'")),
    }
}
