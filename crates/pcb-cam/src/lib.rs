//! CAM export addressing for layer stacks.
//!
//! A CAM instruction names an output file (or file-name template) and the
//! layer groups that go into it:
//!
//! ```text
//! gerber/%name%.gbr=[okempty-content] top-copper(bloat=0.1mm), bottom-copper:-1, @outline
//! ```
//!
//! - [`tokenize`] splits the layer side into clauses and supplements
//! - [`address`] resolves locators against a [`pcb_layer::Board`] and
//!   serializes groups and layers back into addresses
//! - [`supplement`] turns supplements into a [`TransformOverride`]
//! - [`template`] compiles and expands output file names
//! - [`session`] drives an export against the resolved plan
//! - [`job`] runs multi-step export scripts

pub mod address;
pub mod job;
pub mod session;
pub mod supplement;
pub mod template;
pub mod tokenize;
pub mod units;
pub mod vars;

pub use address::{
    layer_address_to_id, layer_group_address_to_id, resolve, to_address, AddressSegment,
    AddressTarget, Resolved,
};
pub use job::{Exporter, ExporterRegistry, Job, JobError, JobInstruction, JobReport};
pub use session::{begin_no_layer, CamOptions, CamOutcome, CamSession, CamTarget, Decision, TargetId};
pub use supplement::{CamWarning, TransformOverride};
pub use template::{Template, TemplateContext, TemplateError};
pub use vars::{use_store, ScopedVars, VarStore};

use pcb_layer::LayerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CamError {
    #[error("CAM instruction is missing '=': '{0}'")]
    MissingEquals(String),

    #[error("Unbalanced '(' at byte {0}")]
    UnbalancedParen(usize),

    #[error("Unbalanced '[' at byte {0}")]
    UnbalancedBracket(usize),

    #[error("Unexpected ')' at byte {0}")]
    UnexpectedCloseParen(usize),

    #[error("Unexpected '{found}' after supplement list at byte {pos}")]
    TrailingGarbage { pos: usize, found: char },

    #[error("Too many supplements in one address (limit is {})", tokenize::MAX_SUPPLEMENTS)]
    TooManySupplements,

    #[error("Empty layer address")]
    EmptyLocator,

    #[error("Invalid layer offset: '{0}'")]
    InvalidOffset(String),

    #[error("Invalid layer group index: '{0}'")]
    InvalidGroupIndex(String),

    #[error("No virtual layer matches '{0}'")]
    UnknownVirtualLayer(String),

    #[error("No such layer group: '{0}'")]
    NoSuchGroup(String),

    #[error("Only a parameter block may follow '=' here, got '{0}'")]
    UnexpectedLayers(String),

    #[error(transparent)]
    Layer(#[from] LayerError),

    #[error("Invalid file name template: {0}")]
    Template(#[from] TemplateError),

    #[error("CAM session is already active")]
    AlreadyActive,

    #[error("CAM session is not active")]
    Inactive,

    #[error("No layer groups were exported")]
    EmptyGroups,

    #[error("Exported layer groups produced no content")]
    EmptyContent,
}

pub type Result<T> = std::result::Result<T, CamError>;
