//! TOML description of a layer stack.
//!
//! ```toml
//! [[group]]
//! name = "top_copper"
//! type = "top-copper"
//! layers = ["top"]
//!
//! [[group]]
//! name = "bottom_copper"
//! type = "bottom-copper"
//! layers = [{ name = "bottom", visible = false }]
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Board, LayerError, LayerType, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StackFile {
    #[serde(default, rename = "group")]
    pub groups: Vec<GroupSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSpec {
    pub name: String,
    /// Type expression, e.g. `top-copper`.
    #[serde(rename = "type")]
    pub ltype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default)]
    pub layers: Vec<LayerSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LayerSpec {
    Name(String),
    Detailed {
        name: String,
        #[serde(default = "default_visible")]
        visible: bool,
    },
}

fn default_visible() -> bool {
    true
}

impl LayerSpec {
    pub fn name(&self) -> &str {
        match self {
            LayerSpec::Name(name) => name,
            LayerSpec::Detailed { name, .. } => name,
        }
    }

    pub fn visible(&self) -> bool {
        match self {
            LayerSpec::Name(_) => true,
            LayerSpec::Detailed { visible, .. } => *visible,
        }
    }
}

impl StackFile {
    /// Parse from TOML string
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Build the board described by this file.
    pub fn to_board(&self) -> Result<Board> {
        let mut board = Board::new();
        let mut seen = HashSet::new();

        for spec in &self.groups {
            let ltype = LayerType::parse_expr(&spec.ltype)?;
            let gid = board.add_group(&spec.name, ltype, spec.purpose.as_deref());
            for layer in &spec.layers {
                if !seen.insert(layer.name().to_string()) {
                    return Err(LayerError::DuplicateLayer(layer.name().to_string()));
                }
                let lid = board.add_layer(gid, layer.name())?;
                if !layer.visible() {
                    board.set_layer_visible(lid, false);
                }
            }
        }

        log::debug!(
            "loaded layer stack: {} groups, {} layers",
            board.group_count(),
            board.layer_count()
        );
        Ok(board)
    }
}

/// Load a board from a stack file on disk.
pub fn load_board(path: &Path) -> Result<Board> {
    StackFile::from_path(path)?.to_board()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GroupId;

    const STACK: &str = r#"
[[group]]
name = "top_copper"
type = "top-copper"
layers = ["top", { name = "top_gnd", visible = false }]

[[group]]
name = "outline"
type = "boundary"

[[group]]
name = "bottom_copper"
type = "bottom-copper"
purpose = "signal"
layers = ["bottom"]
"#;

    #[test]
    fn test_parse_and_build() {
        let board = StackFile::parse(STACK).unwrap().to_board().unwrap();
        assert_eq!(board.group_count(), 3);
        assert_eq!(board.layer_count(), 3);
        assert!(board.group(GroupId(1)).unwrap().is_empty());
        assert_eq!(
            board.group(GroupId(2)).unwrap().purpose.as_deref(),
            Some("signal")
        );
        assert_eq!(board.visibility_snapshot(), vec![true, false, true]);
    }

    #[test]
    fn test_unknown_type_is_an_error() {
        let toml = "[[group]]\nname = \"x\"\ntype = \"top-cooper\"\n";
        let err = StackFile::parse(toml).unwrap().to_board().unwrap_err();
        assert!(matches!(err, LayerError::UnknownLayerType(t) if t == "cooper"));
    }

    #[test]
    fn test_duplicate_layer_names_rejected() {
        let toml = r#"
[[group]]
name = "a"
type = "top-copper"
layers = ["x"]

[[group]]
name = "b"
type = "bottom-copper"
layers = ["x"]
"#;
        let err = StackFile::parse(toml).unwrap().to_board().unwrap_err();
        assert!(matches!(err, LayerError::DuplicateLayer(n) if n == "x"));
    }
}
