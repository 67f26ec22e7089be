//! End-to-end editing flows: markup in, pointer events, markup out.

use pretty_assertions::assert_eq;
use svgedit_core::{EditorConfig, ElementId, LengthUnit, Point};
use svgedit_editor::{EditorError, EditorSession, Hit, InputEvent, PointerButton, ToolKind};

const BADGE: &str = include_str!("fixtures/badge.svg");

fn session(config: EditorConfig) -> EditorSession {
    let _ = env_logger::builder().is_test(true).try_init();
    EditorSession::from_markup(BADGE, config).unwrap()
}

fn id(session: &EditorSession, attr: &str) -> ElementId {
    session.document.lookup_id_attr(attr).unwrap()
}

fn down(x: f64, y: f64) -> InputEvent {
    InputEvent::PointerDown {
        x,
        y,
        button: PointerButton::Primary,
    }
}

fn line_of<'a>(markup: &'a str, needle: &str) -> &'a str {
    markup
        .lines()
        .find(|line| line.contains(needle))
        .unwrap()
        .trim()
}

// ─── Select tool ─────────────────────────────────────────────────────────

#[test]
fn drag_rounds_to_configured_places() {
    let mut s = session(EditorConfig::default());
    let plate = id(&s, "plate");
    s.handle(&down(20.0, 20.0), Some(Hit::Element(plate))).unwrap();
    s.handle(&InputEvent::PointerMove { x: 25.5, y: 27.25 }, None)
        .unwrap();
    // Nothing is re-emitted mid-gesture.
    assert_eq!(s.markup(), BADGE);
    assert!(s.handle(&InputEvent::PointerUp { x: 25.5, y: 27.25 }, None).unwrap());
    assert_eq!(
        line_of(s.markup(), "plate"),
        r##"<rect id="plate" x="15.5" y="17.3" width="180" height="100" rx="8" fill="#4c1"/>"##
    );

    s.set_config(EditorConfig {
        number_of_decimal_places: 0,
        ..EditorConfig::default()
    })
    .unwrap();
    s.commit();
    assert!(line_of(s.markup(), "plate").contains(r#"x="16" y="17""#));
}

#[test]
fn dragging_a_selected_member_moves_the_whole_selection() {
    let mut s = session(EditorConfig::default());
    let (plate, logo) = (id(&s, "plate"), id(&s, "logo"));
    s.select(vec![plate, logo]);
    s.handle(&down(50.0, 50.0), Some(Hit::Element(plate))).unwrap();
    assert_eq!(s.selection(), &[plate, logo]);
    s.handle(&InputEvent::PointerMove { x: 40.0, y: 40.0 }, None)
        .unwrap();
    s.handle(&InputEvent::PointerLeave, None).unwrap();
    assert!(line_of(s.markup(), "plate").contains(r#"x="0" y="0""#));
    assert!(line_of(s.markup(), "logo").contains(r#"x="140" y="10""#));
}

#[test]
fn rotation_collects_into_a_matrix_on_commit() {
    let mut s = session(EditorConfig::default());
    let plate = id(&s, "plate");
    s.select(vec![plate]);
    s.handle(&down(100.0, -10.0), Some(Hit::Handle(4))).unwrap();
    s.handle(&InputEvent::PointerMove { x: 190.0, y: -10.0 }, None)
        .unwrap();
    s.handle(&InputEvent::PointerUp { x: 190.0, y: -10.0 }, None)
        .unwrap();
    assert!(
        line_of(s.markup(), "plate").contains(r#"transform="matrix(0 1 -1 0 160 -40)""#),
        "{}",
        s.markup()
    );
}

#[test]
fn rotation_stays_symbolic_without_collecting() {
    let mut s = session(EditorConfig {
        collect_transform_on_commit: false,
        ..EditorConfig::default()
    });
    let plate = id(&s, "plate");
    s.select(vec![plate]);
    s.handle(&down(100.0, -10.0), Some(Hit::Handle(4))).unwrap();
    s.handle(&InputEvent::PointerMove { x: 190.0, y: -10.0 }, None)
        .unwrap();
    s.handle(&InputEvent::PointerUp { x: 190.0, y: -10.0 }, None)
        .unwrap();
    assert!(line_of(s.markup(), "plate").contains(r#"transform="rotate(90 100 60)""#));
}

#[test]
fn group_handles_follow_the_group_transform() {
    let mut s = session(EditorConfig::default());
    let mark = id(&s, "mark");
    s.select(vec![mark]);
    let handles = s.handles().unwrap();
    assert_eq!(handles[0], Point::new(28.0, 38.0));
    assert_eq!(handles[8], Point::new(52.0, 62.0));
}

#[test]
fn no_selection_has_no_frame() {
    let s = session(EditorConfig::default());
    assert!(s.frame().is_none());
    assert!(s.handles().is_none());
}

// ─── Drawing tools ───────────────────────────────────────────────────────

#[test]
fn rect_is_drawn_in_the_default_unit() {
    let mut s = session(EditorConfig {
        default_unit: Some(LengthUnit::Mm),
        ..EditorConfig::default()
    });
    s.set_tool(ToolKind::Rect);
    s.handle(&down(10.0, 20.0), None).unwrap();
    s.handle(&InputEvent::PointerMove { x: 30.0, y: 60.0 }, None)
        .unwrap();
    assert!(s.handle(&InputEvent::PointerUp { x: 30.0, y: 60.0 }, None).unwrap());

    assert_eq!(s.selection().len(), 1);
    assert_eq!(
        line_of(s.markup(), "mm"),
        r#"<rect x="2.6mm" y="5.3mm" width="5.3mm" height="10.6mm"/>"#
    );
    // The drawing tool stays active for the next shape.
    assert_eq!(s.tool_kind(), ToolKind::Rect);
}

#[test]
fn polyline_finishes_on_secondary_click() {
    let mut s = session(EditorConfig::default());
    s.set_tool(ToolKind::Polyline);
    s.handle(&down(10.0, 10.0), None).unwrap();
    s.handle(&InputEvent::PointerMove { x: 20.0, y: 10.0 }, None)
        .unwrap();
    s.handle(&down(20.0, 10.0), None).unwrap();
    s.handle(&InputEvent::PointerMove { x: 20.0, y: 30.0 }, None)
        .unwrap();
    let finished = s
        .handle(
            &InputEvent::PointerDown {
                x: 20.0,
                y: 30.0,
                button: PointerButton::Secondary,
            },
            None,
        )
        .unwrap();
    assert!(finished);
    assert_eq!(
        line_of(s.markup(), "polyline"),
        r#"<polyline points="10,10 20,10"/>"#
    );
}

#[test]
fn text_tool_uses_the_configured_content() {
    let mut s = session(EditorConfig::default());
    s.set_tool(ToolKind::Text);
    // Empty content places nothing.
    assert!(!s.handle(&down(30.0, 40.0), None).unwrap());

    s.settings_mut().text = "hello".to_string();
    assert!(s.handle(&down(30.0, 40.0), None).unwrap());
    assert_eq!(
        line_of(s.markup(), "hello"),
        r#"<text x="30" y="40">hello</text>"#
    );
}

// ─── Operators ───────────────────────────────────────────────────────────

#[test]
fn duplicate_offsets_the_copy_inside_its_group() {
    let mut s = session(EditorConfig::default());
    let dot = id(&s, "dot");
    s.select(vec![dot]);
    let copies = s.duplicate_selection().unwrap().to_vec();
    assert_eq!(copies.len(), 1);
    assert_ne!(copies[0], dot);
    assert_eq!(s.selection(), copies.as_slice());

    let circles: Vec<&str> = s
        .markup()
        .lines()
        .filter(|line| line.contains("<circle"))
        .map(str::trim)
        .collect();
    assert_eq!(
        circles,
        vec![
            r#"<circle id="dot" cx="20" cy="20" r="12"/>"#,
            r#"<circle id="dot" cx="28" cy="24.8" r="12"/>"#,
        ]
    );
}

#[test]
fn duplicate_needs_a_selection() {
    let mut s = session(EditorConfig::default());
    assert!(matches!(
        s.duplicate_selection(),
        Err(EditorError::Shape(_))
    ));
}

// ─── Markup and configuration ────────────────────────────────────────────

#[test]
fn host_markup_replaces_the_document() {
    let mut s = session(EditorConfig::default());
    assert_eq!(s.warnings().len(), 3);
    s.set_tool(ToolKind::Ellipse);
    s.set_markup(r#"<svg width="10" height="10"><circle id="c" r="1"/></svg>"#)
        .unwrap();
    assert_eq!(s.tool_kind(), ToolKind::Select);
    assert!(s.warnings().is_empty());
    assert!(s.document.lookup_id_attr("plate").is_none());
    assert!(s.document.lookup_id_attr("c").is_some());
}

#[test]
fn invalid_config_is_rejected() {
    let bad = EditorConfig {
        number_of_decimal_places: 99,
        ..EditorConfig::default()
    };
    assert!(matches!(
        EditorSession::from_markup(BADGE, bad.clone()),
        Err(EditorError::Config(_))
    ));
    let mut s = session(EditorConfig::default());
    assert!(s.set_config(bad).is_err());
    assert_eq!(s.config().number_of_decimal_places, 1);
}

#[test]
fn config_from_json_drives_the_session() {
    let config =
        EditorConfig::from_json(r#"{"numberOfDecimalPlaces": 2, "showUnresolvedElements": false}"#)
            .unwrap();
    let mut s = session(config);
    s.commit();
    assert!(!s.markup().contains("metadata"));
    assert!(s.markup().contains(r#"id="plate""#));
}
