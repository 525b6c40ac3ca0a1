//! The physical layer stack: ordered layer groups, their member layers and
//! per-layer visibility.

use std::fmt;

use crate::{LayerError, LayerType, Result};

/// Index of a layer group in stack order (0 is the topmost group).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub usize);

/// Index of a layer in the board's layer table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub usize);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub name: String,
    pub group: Option<GroupId>,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerGroup {
    pub name: String,
    pub ltype: LayerType,
    pub purpose: Option<String>,
    pub layers: Vec<LayerId>,
}

impl LayerGroup {
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Group type contains every bit of `mask` and the purpose matches when
    /// one is requested.
    pub fn matches(&self, mask: LayerType, purpose: Option<&str>) -> bool {
        if !self.ltype.contains(mask) {
            return false;
        }
        match purpose {
            Some(p) => self.purpose.as_deref() == Some(p),
            None => true,
        }
    }
}

/// A board's layer stack.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Board {
    groups: Vec<LayerGroup>,
    layers: Vec<Layer>,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a group at the bottom of the stack.
    pub fn add_group(
        &mut self,
        name: impl Into<String>,
        ltype: LayerType,
        purpose: Option<&str>,
    ) -> GroupId {
        let gid = GroupId(self.groups.len());
        self.groups.push(LayerGroup {
            name: name.into(),
            ltype,
            purpose: purpose.map(str::to_string),
            layers: Vec::new(),
        });
        gid
    }

    /// Create a visible layer inside `group`.
    pub fn add_layer(&mut self, group: GroupId, name: impl Into<String>) -> Result<LayerId> {
        let lid = LayerId(self.layers.len());
        let grp = self
            .groups
            .get_mut(group.0)
            .ok_or(LayerError::NoSuchGroup(group.0))?;
        grp.layers.push(lid);
        self.layers.push(Layer {
            name: name.into(),
            group: Some(group),
            visible: true,
        });
        Ok(lid)
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn groups(&self) -> &[LayerGroup] {
        &self.groups
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn group_ids(&self) -> impl Iterator<Item = GroupId> + use<> {
        (0..self.groups.len()).map(GroupId)
    }

    pub fn group(&self, gid: GroupId) -> Option<&LayerGroup> {
        self.groups.get(gid.0)
    }

    pub fn layer(&self, lid: LayerId) -> Option<&Layer> {
        self.layers.get(lid.0)
    }

    pub fn group_by_name(&self, name: &str) -> Option<GroupId> {
        self.groups.iter().position(|g| g.name == name).map(GroupId)
    }

    pub fn layer_by_name(&self, name: &str) -> Option<LayerId> {
        self.layers.iter().position(|l| l.name == name).map(LayerId)
    }

    /// Groups containing every bit of `mask`, in stack order, optionally
    /// restricted to a purpose.
    pub fn groups_matching(&self, mask: LayerType, purpose: Option<&str>) -> Vec<GroupId> {
        self.groups
            .iter()
            .enumerate()
            .filter(|(_, g)| g.matches(mask, purpose))
            .map(|(idx, _)| GroupId(idx))
            .collect()
    }

    /// First top or bottom copper group.
    pub fn outer_copper(&self, side: LayerType) -> Option<GroupId> {
        self.groups
            .iter()
            .position(|g| g.ltype.contains(LayerType::COPPER | side))
            .map(GroupId)
    }

    /// Signed number of copper groups between `from` and `to` in stack order:
    /// positive when `to` is below `from`.
    pub fn copper_distance(&self, from: GroupId, to: GroupId) -> i64 {
        let rank = |gid: GroupId| {
            self.groups
                .iter()
                .take(gid.0)
                .filter(|g| g.ltype.is_copper())
                .count() as i64
        };
        rank(to) - rank(from)
    }

    /// Visibility of every layer, in layer order.
    pub fn visibility_snapshot(&self) -> Vec<bool> {
        self.layers.iter().map(|l| l.visible).collect()
    }

    /// Put back a snapshot taken by [`Board::visibility_snapshot`].
    ///
    /// A length mismatch means the stack changed in between; only the common
    /// prefix is restored.
    pub fn restore_visibility(&mut self, snapshot: &[bool]) {
        if snapshot.len() != self.layers.len() {
            log::error!(
                "layer visibility snapshot has {} entries but the board has {} layers",
                snapshot.len(),
                self.layers.len()
            );
        }
        for (layer, vis) in self.layers.iter_mut().zip(snapshot) {
            layer.visible = *vis;
        }
    }

    pub fn set_layer_visible(&mut self, lid: LayerId, visible: bool) {
        if let Some(layer) = self.layers.get_mut(lid.0) {
            layer.visible = visible;
        }
    }

    pub fn hide_all_layers(&mut self) {
        for layer in &mut self.layers {
            layer.visible = false;
        }
    }

    /// Change the visibility of every member layer of a group.
    pub fn set_group_visible(&mut self, gid: GroupId, visible: bool) -> Result<()> {
        let grp = self.groups.get(gid.0).ok_or(LayerError::NoSuchGroup(gid.0))?;
        for lid in &grp.layers {
            self.layers[lid.0].visible = visible;
        }
        Ok(())
    }

    pub fn is_group_visible(&self, gid: GroupId) -> bool {
        self.group(gid)
            .map(|g| g.layers.iter().any(|lid| self.layers[lid.0].visible))
            .unwrap_or(false)
    }
}
