//! Layer type bitmask and its textual token table.
//!
//! A layer type is a combination of a location (`top`, `bottom`, `intern`,
//! `logical`), one or more purposes (`copper`, `silk`, ...) and properties
//! (`virtual`). Type expressions join tokens with `-`, e.g. `top-copper` or
//! `intern-copper`.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

use crate::LayerError;

/// Bitmask describing where a layer sits and what it is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct LayerType(u32);

impl LayerType {
    pub const NONE: LayerType = LayerType(0);

    pub const TOP: LayerType = LayerType(0x0000_0001);
    pub const BOTTOM: LayerType = LayerType(0x0000_0002);
    pub const INTERN: LayerType = LayerType(0x0000_0004);
    pub const LOGICAL: LayerType = LayerType(0x0000_0008);
    /// All location bits.
    pub const ANYWHERE: LayerType = LayerType(0x0000_00ff);

    pub const COPPER: LayerType = LayerType(0x0000_0100);
    pub const SILK: LayerType = LayerType(0x0000_0200);
    pub const MASK: LayerType = LayerType(0x0000_0400);
    pub const PASTE: LayerType = LayerType(0x0000_0800);
    pub const BOUNDARY: LayerType = LayerType(0x0000_1000);
    pub const RAT: LayerType = LayerType(0x0000_2000);
    pub const INVIS: LayerType = LayerType(0x0000_4000);
    pub const SUBSTRATE: LayerType = LayerType(0x0000_8000);
    pub const MISC: LayerType = LayerType(0x0001_0000);
    pub const DOC: LayerType = LayerType(0x0002_0000);
    pub const MECH: LayerType = LayerType(0x0004_0000);
    pub const UI: LayerType = LayerType(0x0008_0000);
    /// Assembly drawing; only carried by virtual layers.
    pub const ASSY: LayerType = LayerType(0x0010_0000);
    pub const FAB: LayerType = LayerType(0x0020_0000);
    pub const PDRILL: LayerType = LayerType(0x0040_0000);
    pub const UDRILL: LayerType = LayerType(0x0080_0000);
    pub const CSECT: LayerType = LayerType(0x0100_0000);
    /// All purpose bits.
    pub const ANYTHING: LayerType = LayerType(0x0fff_ff00);

    /// Pseudo layer that is not stored in the physical stack.
    pub const VIRTUAL: LayerType = LayerType(0x1000_0000);
    /// All property bits.
    pub const ANYPROP: LayerType = LayerType(0x7000_0000);

    pub const fn from_bits(bits: u32) -> Self {
        LayerType(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if every bit of `other` is also set in `self`.
    pub const fn contains(self, other: LayerType) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if `self` and `other` share at least one bit.
    pub const fn intersects(self, other: LayerType) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn without(self, other: LayerType) -> Self {
        LayerType(self.0 & !other.0)
    }

    pub fn is_virtual(self) -> bool {
        self.contains(Self::VIRTUAL)
    }

    pub fn is_copper(self) -> bool {
        self.contains(Self::COPPER)
    }

    pub fn is_boundary(self) -> bool {
        self.contains(Self::BOUNDARY)
    }

    /// Location class used for offset counting.
    pub fn position_class(self) -> PositionClass {
        let loc = self & Self::ANYWHERE;
        if loc == Self::TOP {
            PositionClass::Top
        } else if loc == Self::BOTTOM {
            PositionClass::Bottom
        } else if loc.contains(Self::INTERN) && !loc.intersects(Self::TOP | Self::BOTTOM) {
            PositionClass::Internal
        } else {
            PositionClass::Global
        }
    }

    /// Look up a single token (`top`, `copper`, ...). Aliases are accepted.
    pub fn from_token(token: &str) -> Option<LayerType> {
        LAYER_TYPE_NAMES
            .iter()
            .chain(LAYER_TYPE_ALIASES)
            .find(|entry| entry.name == token)
            .map(|entry| entry.bit)
    }

    /// Parse a `-` separated type expression such as `top-copper`.
    pub fn parse_expr(expr: &str) -> Result<LayerType, LayerError> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Err(LayerError::EmptyTypeExpr);
        }

        let mut lyt = LayerType::NONE;
        for token in expr.split('-') {
            let token = token.trim();
            match Self::from_token(token) {
                Some(bit) => lyt |= bit,
                None => return Err(LayerError::UnknownLayerType(token.to_string())),
            }
        }
        Ok(lyt)
    }

    /// Canonical tokens of every set bit: locations, then purposes, then
    /// properties, each in table order.
    pub fn tokens(self) -> Vec<&'static str> {
        let mut entries: Vec<&LayerTypeName> = LAYER_TYPE_NAMES
            .iter()
            .filter(|entry| self.contains(entry.bit))
            .collect();
        entries.sort_by_key(|entry| entry.class);
        entries.into_iter().map(|entry| entry.name).collect()
    }

    /// Canonical `-` joined type expression; inverse of [`LayerType::parse_expr`].
    pub fn to_expr(self) -> String {
        self.tokens().join("-")
    }
}

impl BitOr for LayerType {
    type Output = LayerType;

    fn bitor(self, rhs: LayerType) -> LayerType {
        LayerType(self.0 | rhs.0)
    }
}

impl BitOrAssign for LayerType {
    fn bitor_assign(&mut self, rhs: LayerType) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for LayerType {
    type Output = LayerType;

    fn bitand(self, rhs: LayerType) -> LayerType {
        LayerType(self.0 & rhs.0)
    }
}

impl Not for LayerType {
    type Output = LayerType;

    fn not(self) -> LayerType {
        LayerType(!self.0)
    }
}

impl fmt::Display for LayerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_expr())
    }
}

/// Where a layer group sits, which controls how `:offset` addresses count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PositionClass {
    /// Counted from the top of the stack.
    Top,
    /// Counted from the bottom of the stack.
    Bottom,
    /// Counted from whichever side is nearer.
    Internal,
    /// Neither side; counted from the top.
    Global,
}

impl fmt::Display for PositionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionClass::Top => write!(f, "top"),
            PositionClass::Bottom => write!(f, "bottom"),
            PositionClass::Internal => write!(f, "internal"),
            PositionClass::Global => write!(f, "global"),
        }
    }
}

/// Broad category of a type bit, in rendering order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TypeClass {
    Location,
    Purpose,
    Property,
}

#[derive(Debug, Clone, Copy)]
pub struct LayerTypeName {
    pub bit: LayerType,
    pub class: TypeClass,
    pub name: &'static str,
}

const fn entry(bit: LayerType, class: TypeClass, name: &'static str) -> LayerTypeName {
    LayerTypeName { bit, class, name }
}

/// Canonical token for every type bit.
pub static LAYER_TYPE_NAMES: &[LayerTypeName] = &[
    entry(LayerType::TOP, TypeClass::Location, "top"),
    entry(LayerType::BOTTOM, TypeClass::Location, "bottom"),
    entry(LayerType::INTERN, TypeClass::Location, "intern"),
    entry(LayerType::LOGICAL, TypeClass::Location, "logical"),
    entry(LayerType::COPPER, TypeClass::Purpose, "copper"),
    entry(LayerType::SILK, TypeClass::Purpose, "silk"),
    entry(LayerType::MASK, TypeClass::Purpose, "mask"),
    entry(LayerType::PASTE, TypeClass::Purpose, "paste"),
    entry(LayerType::BOUNDARY, TypeClass::Purpose, "boundary"),
    entry(LayerType::RAT, TypeClass::Purpose, "rat"),
    entry(LayerType::INVIS, TypeClass::Purpose, "invis"),
    entry(LayerType::SUBSTRATE, TypeClass::Purpose, "substrate"),
    entry(LayerType::MISC, TypeClass::Purpose, "misc"),
    entry(LayerType::DOC, TypeClass::Purpose, "doc"),
    entry(LayerType::MECH, TypeClass::Purpose, "mech"),
    entry(LayerType::UI, TypeClass::Purpose, "userinterface"),
    entry(LayerType::ASSY, TypeClass::Purpose, "assy"),
    entry(LayerType::FAB, TypeClass::Purpose, "fab"),
    entry(LayerType::PDRILL, TypeClass::Purpose, "pdrill"),
    entry(LayerType::UDRILL, TypeClass::Purpose, "udrill"),
    entry(LayerType::CSECT, TypeClass::Purpose, "csect"),
    entry(LayerType::VIRTUAL, TypeClass::Property, "virtual"),
];

/// Alternative spellings accepted on input only.
static LAYER_TYPE_ALIASES: &[LayerTypeName] = &[
    entry(LayerType::INTERN, TypeClass::Location, "internal"),
    entry(LayerType::BOUNDARY, TypeClass::Purpose, "outline"),
    entry(LayerType::UI, TypeClass::Purpose, "ui"),
    entry(LayerType::PDRILL, TypeClass::Purpose, "plateddrill"),
    entry(LayerType::UDRILL, TypeClass::Purpose, "unplateddrill"),
];
