//! Layer stack model for board layout: layer type bitmasks, the ordered
//! layer-group stack, per-layer visibility, and the table of virtual layers.

pub mod board;
pub mod layer_type;
pub mod stack_file;
pub mod vlayer;

pub use board::{Board, GroupId, Layer, LayerGroup, LayerId};
pub use layer_type::{LayerType, PositionClass, TypeClass, LAYER_TYPE_NAMES};
pub use stack_file::{load_board, GroupSpec, LayerSpec, StackFile};
pub use vlayer::{
    virtual_layer, virtual_layer_by_name, virtual_layer_by_type, virtual_layer_count,
    VirtualLayer, VirtualLayerId, VIRTUAL_LAYERS,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LayerError {
    #[error("Unknown layer type: '{0}'")]
    UnknownLayerType(String),

    #[error("Empty layer type expression")]
    EmptyTypeExpr,

    #[error("No such layer group: #{0}")]
    NoSuchGroup(usize),

    #[error("Duplicate layer name: '{0}'")]
    DuplicateLayer(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid stack file: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, LayerError>;
