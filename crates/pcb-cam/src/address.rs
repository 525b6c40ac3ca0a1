//! Layer group addresses.
//!
//! A locator is one of:
//!
//! - `#N`: group index in stack order
//! - `@name`: group name, falling back to virtual layer names
//! - `type-expr[:offset]`: every group whose type contains the expression,
//!   or the `offset`-th of them
//!
//! Groups without layers are absent from `@name` and type results, except
//! boundary groups. `#N` always yields the group.
//!
//! Offsets count by position class. Top and global groups count from the
//! top (`1` is the first match, `-1` the last). Bottom groups always count
//! from the bottom, so `bottom-copper:1` and `bottom-copper:-1` both select
//! the lowest match. Internal groups count from the top for positive offsets
//! and from the bottom for negative ones; serialization picks whichever side
//! is nearer.

use pcb_layer::{
    virtual_layer, virtual_layer_by_name, virtual_layer_by_type, Board, GroupId, LayerId,
    LayerType, PositionClass, VirtualLayerId,
};

use crate::tokenize::{escape, Clause, ClauseTokenizer};
use crate::{CamError, Result};

/// Parsed form of one locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressSegment<'a> {
    Index(usize),
    Name(&'a str),
    Type {
        mask: LayerType,
        offset: Option<i64>,
    },
}

impl<'a> AddressSegment<'a> {
    pub fn parse(locator: &'a str) -> Result<Self> {
        let locator = locator.trim();
        if locator.is_empty() {
            return Err(CamError::EmptyLocator);
        }

        if let Some(idx) = locator.strip_prefix('#') {
            return idx
                .trim()
                .parse()
                .map(AddressSegment::Index)
                .map_err(|_| CamError::InvalidGroupIndex(locator.to_string()));
        }

        if let Some(name) = locator.strip_prefix('@') {
            return Ok(AddressSegment::Name(name.trim()));
        }

        let (expr, offset) = match locator.rsplit_once(':') {
            Some((expr, offs)) => {
                let offs = offs.trim();
                let n = offs
                    .parse::<i64>()
                    .map_err(|_| CamError::InvalidOffset(offs.to_string()))?;
                (expr, Some(n))
            }
            None => (locator, None),
        };
        let mask = LayerType::parse_expr(expr)?;
        Ok(AddressSegment::Type { mask, offset })
    }
}

/// What a locator denotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// Physical groups in stack order; may be empty.
    Groups(Vec<GroupId>),
    Virtual(VirtualLayerId),
}

impl Resolved {
    pub fn is_empty(&self) -> bool {
        matches!(self, Resolved::Groups(gids) if gids.is_empty())
    }
}

/// Resolve a bare locator against the board. `purpose` comes from the
/// clause's `purpose=` supplement and narrows type matches.
pub fn resolve(board: &Board, locator: &str, purpose: Option<&str>) -> Result<Resolved> {
    let resolved = match AddressSegment::parse(locator)? {
        AddressSegment::Index(idx) => {
            if idx >= board.group_count() {
                return Err(CamError::NoSuchGroup(locator.trim().to_string()));
            }
            Resolved::Groups(vec![GroupId(idx)])
        }
        AddressSegment::Name(name) => {
            if let Some(gid) = board.group_by_name(name) {
                Resolved::Groups(present(board, vec![gid]))
            } else if let Some(vl) = virtual_layer_by_name(name) {
                Resolved::Virtual(vl.id)
            } else {
                return Err(CamError::NoSuchGroup(name.to_string()));
            }
        }
        AddressSegment::Type { mask, offset } => {
            resolve_type(board, locator.trim(), mask, offset, purpose)?
        }
    };
    log::debug!("address '{}' resolved to {:?}", locator.trim(), resolved);
    Ok(resolved)
}

fn resolve_type(
    board: &Board,
    locator: &str,
    mask: LayerType,
    offset: Option<i64>,
    purpose: Option<&str>,
) -> Result<Resolved> {
    if let Some(vl) = virtual_layer_by_type(mask, purpose) {
        return Ok(Resolved::Virtual(vl.id));
    }
    if mask.is_virtual() {
        return Err(CamError::UnknownVirtualLayer(locator.to_string()));
    }

    let matches = board.groups_matching(mask, purpose);
    let selected: Vec<GroupId> = match offset {
        None => matches,
        Some(offs) => nth_match(&matches, mask.position_class(), offs)
            .into_iter()
            .collect(),
    };

    Ok(Resolved::Groups(present(board, selected)))
}

/// Drop groups without layers. The board outline is drawn even when empty.
fn present(board: &Board, gids: Vec<GroupId>) -> Vec<GroupId> {
    gids.into_iter()
        .filter(|gid| {
            board
                .group(*gid)
                .is_some_and(|g| !g.is_empty() || g.ltype.is_boundary())
        })
        .collect()
}

/// Pick one group out of `matches` (stack order) by a signed offset.
pub fn nth_match(matches: &[GroupId], class: PositionClass, offset: i64) -> Option<GroupId> {
    if offset == 0 {
        return None;
    }
    let len = matches.len() as i64;
    let idx = match class {
        PositionClass::Bottom => len - offset.abs(),
        PositionClass::Top | PositionClass::Internal | PositionClass::Global => {
            if offset > 0 {
                offset - 1
            } else {
                len + offset
            }
        }
    };
    if (0..len).contains(&idx) {
        Some(matches[idx as usize])
    } else {
        None
    }
}

/// Offset that [`nth_match`] maps back to `pos`.
fn offset_for(class: PositionClass, pos: usize, len: usize) -> i64 {
    let from_top = pos as i64 + 1;
    let from_bottom = (len - pos) as i64;
    match class {
        PositionClass::Top | PositionClass::Global => from_top,
        PositionClass::Bottom => -from_bottom,
        PositionClass::Internal => {
            if from_top <= from_bottom {
                from_top
            } else {
                -from_bottom
            }
        }
    }
}

fn single_clause(address: &str) -> Result<Clause<'_>> {
    let mut tokens = ClauseTokenizer::new(address);
    let clause = tokens.next_clause()?.ok_or(CamError::EmptyLocator)?;
    if tokens.next_clause()?.is_some() {
        return Err(CamError::TrailingGarbage {
            pos: clause.span.end,
            found: ',',
        });
    }
    Ok(clause)
}

fn clause_purpose<'c>(clause: &'c Clause<'_>) -> Option<&'c str> {
    clause
        .supplements
        .iter()
        .find(|s| s.key == "purpose")
        .and_then(|s| s.value.as_deref())
}

/// Resolve a full address (locator plus optional supplements) to a single
/// group. Virtual layers and empty results give `None`.
pub fn layer_group_address_to_id(board: &Board, address: &str) -> Option<GroupId> {
    let resolved = single_clause(address)
        .and_then(|clause| resolve(board, &clause.locator, clause_purpose(&clause)));
    match resolved {
        Ok(Resolved::Groups(gids)) => gids.first().copied(),
        Ok(Resolved::Virtual(_)) => None,
        Err(e) => {
            log::warn!("invalid layer group address '{address}': {e}");
            None
        }
    }
}

/// Resolve a layer address. `#N` and `@name` address layers directly; any
/// other form selects the first layer of the first matching group.
pub fn layer_address_to_id(board: &Board, address: &str) -> Option<LayerId> {
    let clause = match single_clause(address) {
        Ok(c) => c,
        Err(e) => {
            log::warn!("invalid layer address '{address}': {e}");
            return None;
        }
    };

    let locator = clause.locator.trim();
    if let Some(idx) = locator.strip_prefix('#') {
        return idx
            .trim()
            .parse()
            .ok()
            .map(LayerId)
            .filter(|lid| lid.0 < board.layer_count());
    }
    if let Some(lid) = locator.strip_prefix('@').and_then(|n| board.layer_by_name(n.trim())) {
        return Some(lid);
    }

    match resolve(board, locator, clause_purpose(&clause)) {
        Ok(Resolved::Groups(gids)) => gids
            .iter()
            .find_map(|gid| board.group(*gid)?.layers.first().copied()),
        Ok(Resolved::Virtual(_)) => None,
        Err(e) => {
            log::warn!("invalid layer address '{address}': {e}");
            None
        }
    }
}

/// Something an address can be generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressTarget {
    Group(GroupId),
    Layer(LayerId),
    Virtual(VirtualLayerId),
}

/// Canonical address of a group, layer or virtual layer; `None` for ids that
/// do not exist.
pub fn to_address(board: &Board, target: AddressTarget) -> Option<String> {
    match target {
        AddressTarget::Group(gid) => group_to_address(board, gid),
        AddressTarget::Layer(lid) => layer_to_address(board, lid),
        AddressTarget::Virtual(vid) => virtual_to_address(vid),
    }
}

fn with_purpose(locator: &str, purpose: Option<&str>) -> String {
    match purpose {
        Some(p) => format!("{locator}(purpose={})", escape(p)),
        None => locator.to_string(),
    }
}

pub fn group_to_address(board: &Board, gid: GroupId) -> Option<String> {
    let group = board.group(gid)?;
    let index_form = format!("#{}", gid.0);
    if group.ltype.is_empty() {
        return Some(index_form);
    }

    let purpose = group.purpose.as_deref();
    let matches = board.groups_matching(group.ltype, purpose);
    let mut locator = group.ltype.to_expr();
    if matches.len() > 1 {
        let pos = matches.iter().position(|g| *g == gid)?;
        let offs = offset_for(group.ltype.position_class(), pos, matches.len());
        locator.push_str(&format!(":{offs}"));
    }

    // Type addresses of empty groups, or of groups shadowed by a virtual
    // layer, do not select the group.
    if resolve(board, &locator, purpose).ok() != Some(Resolved::Groups(vec![gid])) {
        log::debug!("group {gid} has no type address, using {index_form}");
        return Some(index_form);
    }
    Some(with_purpose(&locator, purpose))
}

/// Type expression of a virtual layer; the purpose is added only when the
/// type alone would select a different entry.
pub fn virtual_to_address(vid: VirtualLayerId) -> Option<String> {
    let vl = virtual_layer(vid)?;
    let expr = vl.ltype.to_expr();
    if virtual_layer_by_type(vl.ltype, None).is_some_and(|first| first.id == vid) {
        Some(expr)
    } else {
        Some(with_purpose(&expr, vl.purpose))
    }
}

/// A layer that is the only member of its group shares the group's address;
/// otherwise it is addressed by name, or by index if the name is ambiguous.
pub fn layer_to_address(board: &Board, lid: LayerId) -> Option<String> {
    let layer = board.layer(lid)?;

    if let Some(gid) = layer.group {
        let sole_member = board.group(gid).is_some_and(|g| g.layers == [lid]);
        if sole_member {
            if let Some(addr) = group_to_address(board, gid).filter(|a| !a.starts_with('#')) {
                return Some(addr);
            }
        }
    }

    let addr = format!("@{}", escape(&layer.name));
    if layer_address_to_id(board, &addr) == Some(lid) {
        Some(addr)
    } else {
        Some(format!("#{}", lid.0))
    }
}
