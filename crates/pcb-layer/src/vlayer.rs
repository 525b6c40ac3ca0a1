//! Virtual layers: purpose-identified pseudo layers that are addressed like
//! groups but never stored in the physical stack.

use std::fmt;

use crate::LayerType;

/// Index into [`VIRTUAL_LAYERS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VirtualLayerId(pub usize);

impl fmt::Display for VirtualLayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VirtualLayer {
    pub id: VirtualLayerId,
    pub name: &'static str,
    pub ltype: LayerType,
    pub purpose: Option<&'static str>,
}

impl VirtualLayer {
    /// Exact type match, ignoring the `virtual` bit on both sides. A
    /// requested purpose must match as well.
    pub fn matches(&self, mask: LayerType, purpose: Option<&str>) -> bool {
        let own = self.ltype.without(LayerType::VIRTUAL);
        if own != mask.without(LayerType::VIRTUAL) {
            return false;
        }
        match purpose {
            Some(p) => self.purpose == Some(p),
            None => true,
        }
    }
}

const fn vl(
    id: usize,
    name: &'static str,
    ltype: LayerType,
    purpose: Option<&'static str>,
) -> VirtualLayer {
    VirtualLayer {
        id: VirtualLayerId(id),
        name,
        ltype,
        purpose,
    }
}

const V: u32 = LayerType::VIRTUAL.bits();

// Purpose bits `assy`, `fab`, `pdrill`, `udrill` and `csect` are carried by
// virtual layers only.
pub static VIRTUAL_LAYERS: &[VirtualLayer] = &[
    vl(
        0,
        "invisible",
        LayerType::from_bits(V | LayerType::INVIS.bits() | LayerType::LOGICAL.bits()),
        None,
    ),
    vl(1, "rats", LayerType::from_bits(V | LayerType::RAT.bits()), None),
    vl(
        2,
        "topassembly",
        LayerType::from_bits(V | LayerType::ASSY.bits() | LayerType::TOP.bits()),
        Some("assy"),
    ),
    vl(
        3,
        "bottomassembly",
        LayerType::from_bits(V | LayerType::ASSY.bits() | LayerType::BOTTOM.bits()),
        Some("assy"),
    ),
    vl(
        4,
        "fab",
        LayerType::from_bits(V | LayerType::FAB.bits() | LayerType::LOGICAL.bits()),
        Some("fab"),
    ),
    vl(
        5,
        "plated-drill",
        LayerType::from_bits(V | LayerType::PDRILL.bits()),
        Some("pdrill"),
    ),
    vl(
        6,
        "unplated-drill",
        LayerType::from_bits(V | LayerType::UDRILL.bits()),
        Some("udrill"),
    ),
    vl(
        7,
        "csect",
        LayerType::from_bits(V | LayerType::CSECT.bits() | LayerType::LOGICAL.bits()),
        Some("csect"),
    ),
];

pub fn virtual_layer_count() -> usize {
    VIRTUAL_LAYERS.len()
}

pub fn virtual_layer(id: VirtualLayerId) -> Option<&'static VirtualLayer> {
    VIRTUAL_LAYERS.get(id.0)
}

pub fn virtual_layer_by_name(name: &str) -> Option<&'static VirtualLayer> {
    VIRTUAL_LAYERS.iter().find(|v| v.name == name)
}

/// First virtual layer whose type equals `mask` (ignoring the `virtual` bit)
/// and whose purpose matches, if one is requested.
pub fn virtual_layer_by_type(mask: LayerType, purpose: Option<&str>) -> Option<&'static VirtualLayer> {
    VIRTUAL_LAYERS.iter().find(|v| v.matches(mask, purpose))
}
