//! CAM export sessions.
//!
//! A session borrows the board exclusively from [`CamSession::new`] until it
//! is dropped, so two sessions can never drive the same board. `begin`
//! resolves an instruction into an export plan and hides every layer not in
//! it; exporters then ask [`CamSession::decide`] for each group or virtual
//! layer they are about to render; `end` restores the visibility captured by
//! `begin`.
//!
//! A session that was never begun answers `Draw` to everything, so
//! exporters can run the same code path with and without an instruction.

use std::collections::{BTreeMap, HashMap};

use fixedbitset::FixedBitSet;
use pcb_layer::{
    virtual_layer, virtual_layer_by_type, virtual_layer_count, Board, GroupId, LayerType,
    VirtualLayerId, VIRTUAL_LAYERS,
};

use crate::address::{resolve, to_address, AddressTarget, Resolved};
use crate::supplement::{apply_supplements, CamWarning, SessionParams, TransformOverride};
use crate::template::{Template, TemplateContext};
use crate::tokenize::{find_unescaped, unescape, ClauseTokenizer};
use crate::vars::{self, VarStore};
use crate::{CamError, Result};

/// Exporter-supplied settings for a session.
#[derive(Debug, Clone, Default)]
pub struct CamOptions {
    /// File name used when nothing precedes the `=`.
    pub default_file_name: Option<String>,
    /// Variables for `%var%`; the active store is used when unset.
    pub vars: Option<VarStore>,
    /// Values for `$(key)`.
    pub config: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Draw,
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetId {
    Group(GroupId),
    Virtual(VirtualLayerId),
}

impl From<TargetId> for AddressTarget {
    fn from(id: TargetId) -> Self {
        match id {
            TargetId::Group(gid) => AddressTarget::Group(gid),
            TargetId::Virtual(vid) => AddressTarget::Virtual(vid),
        }
    }
}

/// One exported group or virtual layer, as handed to [`CamSession::export_each`].
#[derive(Debug, Clone, PartialEq)]
pub struct CamTarget<'t> {
    pub id: TargetId,
    pub name: &'t str,
    pub address: String,
    pub xform: Option<TransformOverride>,
    pub file_name: &'t str,
    /// `file_name` differs from the previous target's; the exporter should
    /// close its current output and open a new one.
    pub file_changed: bool,
}

/// Result of a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CamOutcome {
    pub exported: usize,
    pub okempty_group: bool,
    pub okempty_content: bool,
}

impl CamOutcome {
    /// Turn an empty export into an error unless the instruction allowed it.
    pub fn verify(&self, had_content: bool) -> Result<usize> {
        if self.exported == 0 {
            if !self.okempty_group {
                return Err(CamError::EmptyGroups);
            }
        } else if !had_content && !self.okempty_content {
            return Err(CamError::EmptyContent);
        }
        Ok(self.exported)
    }
}

#[derive(Debug, Default)]
struct Selection {
    group_visible: FixedBitSet,
    virtual_visible: FixedBitSet,
    group_overrides: HashMap<GroupId, TransformOverride>,
    virtual_overrides: HashMap<VirtualLayerId, TransformOverride>,
    params: SessionParams,
}

impl Selection {
    fn contains(&self, id: TargetId) -> bool {
        match id {
            TargetId::Group(gid) => self.group_visible.contains(gid.0),
            TargetId::Virtual(vid) => self.virtual_visible.contains(vid.0),
        }
    }

    fn override_for(&self, id: TargetId) -> Option<TransformOverride> {
        match id {
            TargetId::Group(gid) => self.group_overrides.get(&gid).copied(),
            TargetId::Virtual(vid) => self.virtual_overrides.get(&vid).copied(),
        }
    }
}

#[derive(Debug)]
struct Plan {
    selection: Selection,
    template: Template,
    saved_visibility: Vec<bool>,
    vars: VarStore,
    config: BTreeMap<String, String>,
    file_name: Option<String>,
    file_changed: bool,
    exported: usize,
}

pub struct CamSession<'b> {
    board: &'b mut Board,
    plan: Option<Plan>,
    warnings: Vec<CamWarning>,
}

fn split_instruction(instruction: &str) -> Result<(String, &str)> {
    let eq = find_unescaped(instruction, '=')
        .ok_or_else(|| CamError::MissingEquals(instruction.to_string()))?;
    let file = unescape(instruction[..eq].trim()).into_owned();
    Ok((file, &instruction[eq + 1..]))
}

fn target_name(board: &Board, id: TargetId) -> &str {
    match id {
        TargetId::Group(gid) => board.group(gid).map(|g| g.name.as_str()),
        TargetId::Virtual(vid) => virtual_layer(vid).map(|v| v.name),
    }
    .unwrap_or_default()
}

/// Copper distance of a group below the top copper and above the bottom
/// copper group.
fn copper_offsets(board: &Board, id: TargetId) -> (Option<i64>, Option<i64>) {
    let TargetId::Group(gid) = id else {
        return (None, None);
    };
    let top = board
        .outer_copper(LayerType::TOP)
        .map(|top| board.copper_distance(top, gid));
    let bot = board
        .outer_copper(LayerType::BOTTOM)
        .map(|bot| board.copper_distance(gid, bot));
    (top, bot)
}

/// Resolve every clause, making selected groups visible on the board.
fn select(
    board: &mut Board,
    layers: &str,
    warnings: &mut Vec<CamWarning>,
) -> Result<Selection> {
    let mut sel = Selection {
        group_visible: FixedBitSet::with_capacity(board.group_count()),
        virtual_visible: FixedBitSet::with_capacity(virtual_layer_count()),
        ..Default::default()
    };

    for clause in ClauseTokenizer::new(layers) {
        let clause = clause?;
        for param in &clause.params {
            sel.params.apply(param, warnings);
        }
        if clause.locator.is_empty() {
            if clause.params.is_empty() || !clause.supplements.is_empty() {
                return Err(CamError::EmptyLocator);
            }
            continue;
        }

        let mut xform = TransformOverride::default();
        let applied = apply_supplements(&clause.supplements, &mut xform, warnings);
        match resolve(board, &clause.locator, applied.purpose)? {
            Resolved::Groups(gids) => {
                for gid in gids {
                    board.set_group_visible(gid, true)?;
                    sel.group_visible.insert(gid.0);
                    if applied.active {
                        sel.group_overrides.insert(gid, xform);
                    }
                }
            }
            Resolved::Virtual(vid) => {
                sel.virtual_visible.insert(vid.0);
                if applied.active {
                    sel.virtual_overrides.insert(vid, xform);
                }
            }
        }
    }
    Ok(sel)
}

impl<'b> CamSession<'b> {
    /// An inactive session over `board`.
    pub fn new(board: &'b mut Board) -> Self {
        Self {
            board,
            plan: None,
            warnings: Vec::new(),
        }
    }

    pub fn board(&self) -> &Board {
        &*self.board
    }

    pub fn is_active(&self) -> bool {
        self.plan.is_some()
    }

    /// Warnings collected by the last `begin`.
    pub fn warnings(&self) -> &[CamWarning] {
        &self.warnings
    }

    /// Parse `instruction` and activate the session.
    ///
    /// On error the board's visibility is left exactly as it was and the
    /// session stays inactive.
    pub fn begin(&mut self, instruction: &str, options: &CamOptions) -> Result<()> {
        if self.plan.is_some() {
            return Err(CamError::AlreadyActive);
        }
        self.warnings.clear();

        let (file, layers) = split_instruction(instruction)?;
        let file = if file.is_empty() {
            options.default_file_name.clone().unwrap_or_default()
        } else {
            file
        };
        let template = Template::compile(&file)?;

        let saved_visibility = self.board.visibility_snapshot();
        self.board.hide_all_layers();
        let selection = match select(self.board, layers, &mut self.warnings) {
            Ok(sel) => sel,
            Err(e) => {
                self.board.restore_visibility(&saved_visibility);
                log::debug!("CAM instruction '{instruction}' rejected: {e}");
                return Err(e);
            }
        };

        log::debug!(
            "CAM session started: file '{}', {} groups, {} virtual layers",
            template.source(),
            selection.group_visible.count_ones(..),
            selection.virtual_visible.count_ones(..)
        );

        self.plan = Some(Plan {
            selection,
            template,
            saved_visibility,
            vars: options.vars.clone().unwrap_or_else(vars::active_snapshot),
            config: options.config.clone(),
            file_name: None,
            file_changed: false,
            exported: 0,
        });
        Ok(())
    }

    /// Whether the active plan includes `id`. Always false when inactive.
    pub fn is_selected(&self, id: TargetId) -> bool {
        self.plan
            .as_ref()
            .is_some_and(|plan| plan.selection.contains(id))
    }

    /// Decide whether to draw a group, or a virtual layer when `group` is
    /// `None` (looked up by `flags` and `purpose`).
    ///
    /// On `Draw`, `xform` receives the target's override, if any, and the
    /// current file name is re-expanded.
    pub fn decide(
        &mut self,
        group: Option<GroupId>,
        purpose: Option<&str>,
        flags: LayerType,
        xform: &mut Option<TransformOverride>,
    ) -> Decision {
        let board: &Board = &*self.board;
        let Some(plan) = self.plan.as_mut() else {
            return Decision::Draw;
        };

        let id = match group {
            Some(gid) => TargetId::Group(gid),
            None => match virtual_layer_by_type(flags, purpose) {
                Some(vl) => TargetId::Virtual(vl.id),
                None => return Decision::Skip,
            },
        };
        if !plan.selection.contains(id) {
            return Decision::Skip;
        }

        plan.exported += 1;
        *xform = plan.selection.override_for(id);

        let (top_offs, bot_offs) = copper_offsets(board, id);
        let file = plan.template.expand(&TemplateContext {
            name: target_name(board, id),
            top_offs,
            bot_offs,
            vars: &plan.vars,
            config: &plan.config,
        });
        plan.file_changed = plan.file_name.as_deref() != Some(file.as_str());
        if plan.file_changed {
            log::debug!("CAM output file is now '{file}'");
        }
        plan.file_name = Some(file);
        Decision::Draw
    }

    /// [`CamSession::decide`] in the exporter calling convention: `true`
    /// means skip.
    pub fn set_layer_group(
        &mut self,
        group: Option<GroupId>,
        purpose: Option<&str>,
        flags: LayerType,
        xform: &mut Option<TransformOverride>,
    ) -> bool {
        self.decide(group, purpose, flags, xform) == Decision::Skip
    }

    /// File name for the most recent `Draw` decision.
    pub fn file_name(&self) -> Option<&str> {
        self.plan.as_ref()?.file_name.as_deref()
    }

    pub fn file_changed(&self) -> bool {
        self.plan.as_ref().is_some_and(|p| p.file_changed)
    }

    /// Walk every group in stack order, then every virtual layer, and call
    /// `f` for each one the plan exports. Returns the number of calls.
    pub fn export_each<E, F>(&mut self, mut f: F) -> std::result::Result<usize, E>
    where
        E: From<CamError>,
        F: FnMut(&CamTarget<'_>) -> std::result::Result<(), E>,
    {
        if self.plan.is_none() {
            return Err(CamError::Inactive.into());
        }

        let mut visited = 0;
        let mut xform = None;
        for gid in self.board.group_ids() {
            let Some((purpose, ltype)) = self
                .board
                .group(gid)
                .map(|g| (g.purpose.clone(), g.ltype))
            else {
                continue;
            };
            if self.set_layer_group(Some(gid), purpose.as_deref(), ltype, &mut xform) {
                continue;
            }
            self.emit(TargetId::Group(gid), xform, &mut f)?;
            visited += 1;
        }
        for vl in VIRTUAL_LAYERS {
            if self.set_layer_group(None, vl.purpose, vl.ltype, &mut xform) {
                continue;
            }
            self.emit(TargetId::Virtual(vl.id), xform, &mut f)?;
            visited += 1;
        }
        Ok(visited)
    }

    fn emit<E, F>(
        &self,
        id: TargetId,
        xform: Option<TransformOverride>,
        f: &mut F,
    ) -> std::result::Result<(), E>
    where
        F: FnMut(&CamTarget<'_>) -> std::result::Result<(), E>,
    {
        let board = self.board();
        let target = CamTarget {
            id,
            name: target_name(board, id),
            address: to_address(board, id.into()).unwrap_or_default(),
            xform,
            file_name: self.file_name().unwrap_or_default(),
            file_changed: self.file_changed(),
        };
        f(&target)
    }

    /// Restore the board and deactivate. Fails with [`CamError::Inactive`]
    /// when `begin` was never called or did not succeed.
    pub fn end(&mut self) -> Result<CamOutcome> {
        let plan = self.plan.take().ok_or(CamError::Inactive)?;
        self.board.restore_visibility(&plan.saved_visibility);
        log::debug!("CAM session ended, {} targets exported", plan.exported);
        Ok(CamOutcome {
            exported: plan.exported,
            okempty_group: plan.selection.params.okempty_group,
            okempty_content: plan.selection.params.okempty_content,
        })
    }
}

impl Drop for CamSession<'_> {
    fn drop(&mut self) {
        if let Some(plan) = self.plan.take() {
            log::error!("CAM session dropped while active, restoring layer visibility");
            self.board.restore_visibility(&plan.saved_visibility);
        }
    }
}

/// File name side of an instruction for exporters that do not work per
/// layer. Anything after `=` may only be a `[..]` parameter block.
pub fn begin_no_layer(instruction: &str, options: &CamOptions) -> Result<String> {
    let (file, rest) = match find_unescaped(instruction, '=') {
        Some(_) => split_instruction(instruction)?,
        None => (unescape(instruction.trim()).into_owned(), ""),
    };

    let mut params = SessionParams::default();
    let mut warnings = Vec::new();
    for clause in ClauseTokenizer::new(rest) {
        let clause = clause?;
        if !clause.locator.is_empty() || !clause.supplements.is_empty() {
            return Err(CamError::UnexpectedLayers(rest.trim().to_string()));
        }
        for param in &clause.params {
            params.apply(param, &mut warnings);
        }
    }

    let file = if file.is_empty() {
        options.default_file_name.clone().unwrap_or_default()
    } else {
        file
    };
    let template = Template::compile(&file)?;
    let vars = options.vars.clone().unwrap_or_else(vars::active_snapshot);
    Ok(template.expand(&TemplateContext {
        name: "",
        top_offs: None,
        bot_offs: None,
        vars: &vars,
        config: &options.config,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board() -> Board {
        let mut board = Board::new();
        for (name, ty) in [
            ("top_copper", LayerType::TOP | LayerType::COPPER),
            ("bottom_copper", LayerType::BOTTOM | LayerType::COPPER),
        ] {
            let gid = board.add_group(name, ty, None);
            board.add_layer(gid, name).unwrap();
        }
        board
    }

    fn opts() -> CamOptions {
        CamOptions {
            vars: Some(VarStore::new()),
            ..Default::default()
        }
    }

    #[test]
    fn test_inactive_session_draws_everything() {
        let mut board = board();
        let mut session = CamSession::new(&mut board);
        let mut xform = None;
        assert_eq!(
            session.decide(Some(GroupId(1)), None, LayerType::COPPER, &mut xform),
            Decision::Draw
        );
        assert_eq!(session.file_name(), None);
        assert!(matches!(session.end(), Err(CamError::Inactive)));
    }

    #[test]
    fn test_begin_twice_is_rejected() {
        let mut board = board();
        let mut session = CamSession::new(&mut board);
        session.begin("a=#0", &opts()).unwrap();
        assert!(matches!(
            session.begin("b=#1", &opts()),
            Err(CamError::AlreadyActive)
        ));
        assert_eq!(session.end().unwrap().exported, 0);
    }

    #[test]
    fn test_board_visibility_follows_plan() {
        let mut board = board();
        let mut session = CamSession::new(&mut board);
        session.begin("x=bottom-copper", &opts()).unwrap();
        assert_eq!(session.board().visibility_snapshot(), vec![false, true]);
        session.end().unwrap();
        assert_eq!(session.board().visibility_snapshot(), vec![true, true]);
    }

    #[test]
    fn test_drop_restores_visibility() {
        let mut board = board();
        {
            let mut session = CamSession::new(&mut board);
            session.begin("x=#0", &opts()).unwrap();
        }
        assert_eq!(board.visibility_snapshot(), vec![true, true]);
    }

    #[test]
    fn test_empty_file_part_uses_default() {
        let mut board = board();
        let mut session = CamSession::new(&mut board);
        let options = CamOptions {
            default_file_name: Some("out_%name%.gbr".into()),
            ..opts()
        };
        session.begin("=top-copper", &options).unwrap();
        let mut xform = None;
        session.decide(Some(GroupId(0)), None, LayerType::COPPER, &mut xform);
        assert_eq!(session.file_name(), Some("out_top_copper.gbr"));
    }

    #[test]
    fn test_verify_outcome() {
        let empty = CamOutcome {
            exported: 0,
            okempty_group: false,
            okempty_content: false,
        };
        assert!(matches!(empty.verify(false), Err(CamError::EmptyGroups)));
        let allowed = CamOutcome {
            okempty_group: true,
            ..empty
        };
        assert_eq!(allowed.verify(false).unwrap(), 0);
        let no_content = CamOutcome {
            exported: 2,
            ..empty
        };
        assert!(matches!(no_content.verify(false), Err(CamError::EmptyContent)));
        assert_eq!(no_content.verify(true).unwrap(), 2);
    }

    #[test]
    fn test_begin_no_layer() {
        let mut options = opts();
        options.vars = Some([("rev", "C")].into_iter().collect());
        assert_eq!(
            begin_no_layer("bom_%rev%.csv=[okempty]", &options).unwrap(),
            "bom_C.csv"
        );
        assert_eq!(begin_no_layer("plain.xy", &options).unwrap(), "plain.xy");
        assert!(matches!(
            begin_no_layer("x.csv=top-copper", &options),
            Err(CamError::UnexpectedLayers(_))
        ));
    }
}
