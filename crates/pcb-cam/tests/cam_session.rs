use pcb_cam::{
    begin_no_layer, layer_group_address_to_id, resolve, to_address, AddressTarget, CamError,
    CamOptions, CamSession, CamTarget, CamWarning, Decision, Resolved, TargetId,
    TransformOverride, VarStore,
};
use pcb_layer::{Board, GroupId, LayerType, StackFile, VirtualLayerId};

const STACK: &str = r#"
[[group]]
name = "top_paste"
type = "top-paste"
layers = ["top_paste"]

[[group]]
name = "top_silk"
type = "top-silk"
layers = ["top_silk"]

[[group]]
name = "top_copper"
type = "top-copper"
layers = ["top", { name = "top_fill", visible = false }]

[[group]]
name = "core1"
type = "intern-substrate"

[[group]]
name = "in1"
type = "intern-copper"
layers = ["gnd"]

[[group]]
name = "in2"
type = "intern-copper"
layers = ["pwr"]

[[group]]
name = "bottom_copper"
type = "bottom-copper"
layers = ["bottom"]

[[group]]
name = "bottom_silk"
type = "bottom-silk"
layers = ["bottom_silk"]

[[group]]
name = "outline"
type = "boundary"
"#;

fn board() -> Board {
    StackFile::parse(STACK).unwrap().to_board().unwrap()
}

fn options() -> CamOptions {
    CamOptions {
        vars: Some(VarStore::new()),
        ..Default::default()
    }
}

fn groups(ids: &[usize]) -> Resolved {
    Resolved::Groups(ids.iter().copied().map(GroupId).collect())
}

#[test]
fn test_index_locator_selects_that_group() {
    let board = board();
    for n in 0..board.group_count() {
        assert_eq!(resolve(&board, &format!("#{n}"), None).unwrap(), groups(&[n]));
    }
}

#[test]
fn test_group_addresses_roundtrip() {
    let board = board();
    for gid in board.group_ids() {
        let addr = to_address(&board, AddressTarget::Group(gid)).unwrap();
        assert_eq!(
            layer_group_address_to_id(&board, &addr),
            Some(gid),
            "address '{addr}' of group {gid}"
        );
    }
}

#[test]
fn test_bottom_offset_selects_last_match() {
    let mut board = board();
    // a second bottom copper group below unrelated groups
    let extra = board.add_group(
        "bottom_copper_2",
        LayerType::BOTTOM | LayerType::COPPER,
        None,
    );
    board.add_layer(extra, "bottom2").unwrap();
    assert_eq!(
        resolve(&board, "bottom-copper:-1", None).unwrap(),
        groups(&[extra.0])
    );
    assert_eq!(resolve(&board, "bottom-copper:-2", None).unwrap(), groups(&[6]));
}

#[test]
fn test_begin_end_restores_visibility() {
    let mut board = board();
    let before = board.visibility_snapshot();
    assert_eq!(before.iter().filter(|v| !**v).count(), 1);

    let mut session = CamSession::new(&mut board);
    session
        .begin("out.gbr=top-copper(bloat=0.1mm),@in1,pdrill", &options())
        .unwrap();
    assert!(session.board().visibility_snapshot() != before);
    assert_eq!(session.end().unwrap().exported, 0);
    drop(session);

    assert_eq!(board.visibility_snapshot(), before);
}

#[test]
fn test_failed_begin_restores_visibility() {
    let mut board = board();
    let before = board.visibility_snapshot();

    let mut session = CamSession::new(&mut board);
    let err = session.begin("out.gbr=top-copper,top-cooper", &options()).unwrap_err();
    assert_eq!(err.to_string(), "Unknown layer type: 'cooper'");
    assert!(!session.is_active());
    assert!(matches!(session.end(), Err(CamError::Inactive)));
    drop(session);

    assert_eq!(board.visibility_snapshot(), before);
}

#[test]
fn test_clause_list_selects_exactly_those_groups() {
    let mut board = Board::new();
    for name in ["a", "b", "c"] {
        let gid = board.add_group(name, LayerType::TOP | LayerType::DOC, Some("notes"));
        board.add_layer(gid, name).unwrap();
    }

    let mut session = CamSession::new(&mut board);
    session.begin("out=#0,#1", &options()).unwrap();
    assert!(session.is_selected(TargetId::Group(GroupId(0))));
    assert!(session.is_selected(TargetId::Group(GroupId(1))));
    assert!(!session.is_selected(TargetId::Group(GroupId(2))));

    let mut xform = None;
    let flags = LayerType::TOP | LayerType::DOC;
    assert!(!session.set_layer_group(Some(GroupId(0)), Some("notes"), flags, &mut xform));
    assert!(session.set_layer_group(Some(GroupId(2)), Some("notes"), flags, &mut xform));
    assert_eq!(session.end().unwrap().exported, 1);
}

#[test]
fn test_supplements_become_overrides() {
    let mut board = board();
    let mut session = CamSession::new(&mut board);
    session
        .begin("out=top-copper(bloat=0.2mm,wireframe),bottom-copper", &options())
        .unwrap();
    assert!(session.warnings().is_empty());

    let mut xform = None;
    let decision = session.decide(Some(GroupId(2)), None, LayerType::COPPER, &mut xform);
    assert_eq!(decision, Decision::Draw);
    let xform = xform.unwrap();
    assert!((xform.bloat - 0.2).abs() < 1e-9);
    assert_eq!(
        xform,
        TransformOverride {
            bloat: xform.bloat,
            wireframe: true,
            ..Default::default()
        }
    );

    // no supplements: the slot is cleared
    let mut xform = Some(TransformOverride::default());
    session.decide(Some(GroupId(6)), None, LayerType::COPPER, &mut xform);
    assert_eq!(xform, None);
    session.end().unwrap();
}

#[test]
fn test_unknown_supplement_is_a_warning() {
    let mut board = board();
    let mut session = CamSession::new(&mut board);
    session.begin("out=top-copper(frobnicate)", &options()).unwrap();
    assert_eq!(
        session.warnings(),
        [CamWarning::UnknownSupplement {
            key: "frobnicate".into()
        }]
    );

    let mut xform = None;
    session.decide(Some(GroupId(2)), None, LayerType::COPPER, &mut xform);
    assert_eq!(xform, None);
    session.end().unwrap();
}

#[test]
fn test_template_tracks_file_changes() {
    let mut board = board();
    let mut session = CamSession::new(&mut board);
    session.begin("board_%name%.ext=copper", &options()).unwrap();

    let mut xform = None;
    session.decide(Some(GroupId(2)), None, LayerType::COPPER, &mut xform);
    assert_eq!(session.file_name(), Some("board_top_copper.ext"));
    assert!(session.file_changed());

    session.decide(Some(GroupId(4)), None, LayerType::COPPER, &mut xform);
    assert_eq!(session.file_name(), Some("board_in1.ext"));
    assert!(session.file_changed());

    session.decide(Some(GroupId(4)), None, LayerType::COPPER, &mut xform);
    assert!(!session.file_changed());
    session.end().unwrap();
}

#[test]
fn test_copper_offsets_in_file_names() {
    let mut board = board();
    let mut session = CamSession::new(&mut board);
    session
        .begin("L%top_offs1%_B%bot_offs%.gbr=copper", &options())
        .unwrap();

    let names: Vec<String> = {
        let mut names = Vec::new();
        session
            .export_each(|t: &CamTarget<'_>| -> Result<(), CamError> {
                names.push(t.file_name.to_string());
                Ok(())
            })
            .unwrap();
        names
    };
    assert_eq!(names, vec!["L1_B3.gbr", "L2_B2.gbr", "L3_B1.gbr", "L4_B0.gbr"]);
    session.end().unwrap();
}

#[test]
fn test_end_without_begin_differs_from_empty_export() {
    let mut board = board();
    let mut session = CamSession::new(&mut board);
    assert!(matches!(session.end(), Err(CamError::Inactive)));

    session.begin("out=[okempty-group]", &options()).unwrap();
    let outcome = session.end().unwrap();
    assert_eq!(outcome.exported, 0);
    assert_eq!(outcome.verify(false).unwrap(), 0);
}

#[test]
fn test_escaped_parens_and_unbalanced_close() {
    let mut board = board();
    let gid = board.add_group("fab", LayerType::TOP | LayerType::DOC, Some("f(x)"));
    board.add_layer(gid, "fab").unwrap();

    let mut session = CamSession::new(&mut board);
    session
        .begin(r"out=top-doc(purpose=f\(x\)),bottom-copper", &options())
        .unwrap();
    assert!(session.is_selected(TargetId::Group(gid)));
    assert!(session.is_selected(TargetId::Group(GroupId(6))));
    session.end().unwrap();

    assert!(matches!(
        session.begin("out=top-copper),bottom-copper", &options()),
        Err(CamError::UnexpectedCloseParen(_))
    ));
}

#[test]
fn test_export_each_walks_groups_then_virtual_layers() {
    let mut board = board();
    let mut session = CamSession::new(&mut board);
    session
        .begin(
            "%name%.txt=outline,@in2(faded),udrill(bloat=1mil),substrate",
            &options(),
        )
        .unwrap();

    let mut seen = Vec::new();
    let count = session
        .export_each(|t: &CamTarget<'_>| -> Result<(), CamError> {
            seen.push((t.id, t.address.clone(), t.file_name.to_string(), t.xform.is_some()));
            Ok(())
        })
        .unwrap();
    assert_eq!(count, 3);
    assert_eq!(
        seen,
        vec![
            (
                TargetId::Group(GroupId(5)),
                "intern-copper:-1".to_string(),
                "in2.txt".to_string(),
                true
            ),
            (
                TargetId::Group(GroupId(8)),
                "boundary".to_string(),
                "outline.txt".to_string(),
                false
            ),
            (
                TargetId::Virtual(VirtualLayerId(6)),
                "udrill-virtual".to_string(),
                "unplated-drill.txt".to_string(),
                true
            ),
        ]
    );
    let outcome = session.end().unwrap();
    assert_eq!(outcome.exported, 3);
    assert!(matches!(outcome.verify(false), Err(CamError::EmptyContent)));
}

#[test]
fn test_empty_group_by_name_exports_nothing() {
    let mut board = board();
    let mut session = CamSession::new(&mut board);
    session.begin("x=@core1", &options()).unwrap();
    assert!(!session.is_selected(TargetId::Group(GroupId(3))));

    let count = session
        .export_each(|_: &CamTarget<'_>| -> Result<(), CamError> { Ok(()) })
        .unwrap();
    assert_eq!(count, 0);
    let outcome = session.end().unwrap();
    assert_eq!(outcome.exported, 0);
    assert!(matches!(outcome.verify(false), Err(CamError::EmptyGroups)));

    // `#N` still names the group itself
    session.begin("x=#3", &options()).unwrap();
    assert!(session.is_selected(TargetId::Group(GroupId(3))));
    session.end().unwrap();
}

#[test]
fn test_physical_doc_and_mech_groups_are_exported() {
    let mut board = board();
    let doc = board.add_group("top_doc", LayerType::TOP | LayerType::DOC, None);
    board.add_layer(doc, "top_doc").unwrap();
    let route = board.add_group("route", LayerType::MECH, None);
    board.add_layer(route, "route").unwrap();

    let mut session = CamSession::new(&mut board);
    session.begin("%name%.gbr=top-doc,mech,pdrill", &options()).unwrap();

    let mut files = Vec::new();
    session
        .export_each(|t: &CamTarget<'_>| -> Result<(), CamError> {
            files.push(t.file_name.to_string());
            Ok(())
        })
        .unwrap();
    assert_eq!(files, ["top_doc.gbr", "route.gbr", "plated-drill.gbr"]);
    session.end().unwrap();
}

#[test]
fn test_export_each_requires_active_session() {
    let mut board = board();
    let mut session = CamSession::new(&mut board);
    let res = session.export_each(|_: &CamTarget<'_>| -> Result<(), CamError> { Ok(()) });
    assert!(matches!(res, Err(CamError::Inactive)));
}

#[test]
fn test_no_layer_instruction() {
    let mut options = options();
    options.config.insert("outdir".into(), "fab".into());
    assert_eq!(
        begin_no_layer("$(outdir)/board.xy=[okempty]", &options).unwrap(),
        "fab/board.xy"
    );
}

#[test]
fn test_error_messages() {
    let mut board = board();
    let mut session = CamSession::new(&mut board);
    let msg = |session: &mut CamSession<'_>, ins: &str| {
        session.begin(ins, &options()).unwrap_err().to_string()
    };
    insta::assert_snapshot!(msg(&mut session, "top-copper"), @"CAM instruction is missing '=': 'top-copper'");
    insta::assert_snapshot!(msg(&mut session, "x=top-copper(bloat=1"), @"Unbalanced '(' at byte 10");
    insta::assert_snapshot!(msg(&mut session, "x=#42"), @"No such layer group: '#42'");
    insta::assert_snapshot!(msg(&mut session, "x=@nowhere"), @"No such layer group: 'nowhere'");
    insta::assert_snapshot!(msg(&mut session, "x=virtual-silk"), @"No virtual layer matches 'virtual-silk'");
    insta::assert_snapshot!(msg(&mut session, "x%=#1"), @"Invalid file name template: unterminated '%' directive at byte 1");
}
