use scrim::{
    EditorMode, ElementKind, Position, Scene,
    gesture::{DragController, DragTarget, DrawTool, PolygonClick, PolygonTool},
    model::{ConnectionRef, Endpoint, LineEnd},
};

#[test]
fn scene_json_round_trip_preserves_edits() {
    let mut scene = Scene::new();
    let p = scene.add_point();
    let l = scene.add_line();
    scene.connect_line_end(
        l,
        LineEnd::Start,
        ConnectionRef {
            target: p,
            vertex: None,
            end: None,
        },
    );

    let json = serde_json::to_string(&scene).unwrap();
    let restored: Scene = serde_json::from_str(&json).unwrap();
    restored.validate().unwrap();

    assert_eq!(restored.elements.len(), scene.elements.len());
    let ElementKind::Line(line) = &restored.element(l).unwrap().kind else {
        panic!("expected line");
    };
    assert!(line.start.is_connected());

    // Ids keep advancing past the restored ones.
    let mut restored = restored;
    let next = restored.add_point();
    assert!(next.0 > l.0);
}

#[test]
fn full_polygon_authoring_session() {
    let mut scene = Scene::new();
    scene.mode = EditorMode::PolygonCreate;
    let tool = PolygonTool;

    let PolygonClick::Started(id) = tool.click(&mut scene, Position::new(20.0, 20.0)) else {
        panic!("expected new polygon");
    };
    tool.click(&mut scene, Position::new(60.0, 20.0));
    tool.click(&mut scene, Position::new(60.0, 60.0));
    tool.click(&mut scene, Position::new(20.0, 60.0));
    assert_eq!(
        tool.click(&mut scene, Position::new(21.0, 21.0)),
        PolygonClick::Closed
    );

    assert!(scene.set_polygon_fill(id, true));

    // Insert on the closing edge, then remove it again.
    assert!(scene.insert_polygon_vertex(id, 3));
    let ElementKind::Polygon(poly) = &scene.element(id).unwrap().kind else {
        panic!("expected polygon");
    };
    assert_eq!(poly.vertices.len(), 5);
    assert!(scene.remove_polygon_vertex(id, 4));

    // Dropping to two vertices reopens and clears fill.
    assert!(scene.remove_polygon_vertex(id, 0));
    assert!(scene.remove_polygon_vertex(id, 0));
    let ElementKind::Polygon(poly) = &scene.element(id).unwrap().kind else {
        panic!("expected polygon");
    };
    assert_eq!(poly.vertices.len(), 2);
    assert!(!poly.closed);
    assert!(!poly.fill);
    assert!(!scene.remove_polygon_vertex(id, 0));
}

#[test]
fn drawing_session_produces_box_local_path() {
    let mut scene = Scene::new();
    scene.mode = EditorMode::DrawFree;
    let tool = DrawTool;
    tool.begin(&mut scene, Position::new(30.0, 40.0));
    tool.sample(&mut scene, Position::new(35.0, 35.0));
    tool.sample(&mut scene, Position::new(42.0, 48.0));
    let id = tool.finish(&mut scene).unwrap();

    let ElementKind::Drawing(d) = &scene.element(id).unwrap().kind else {
        panic!("expected drawing");
    };
    assert_eq!(d.position, Position::new(30.0, 35.0));
    assert_eq!(d.path.len(), 3);
    assert!(d.path.iter().all(|p| p.x >= 0.0 && p.y >= 0.0));
    assert!(!d.straight);
    assert_eq!(scene.mode, EditorMode::Select);
    assert_eq!(scene.active, Some(id));
}

#[test]
fn connect_drag_then_disconnect_freezes_endpoint() {
    let mut scene = Scene::new();
    let p = scene.add_point();
    if let Some(el) = scene.element_mut(p)
        && let ElementKind::Point(pt) = &mut el.kind
    {
        pt.position = Position::new(25.0, 75.0);
    }
    let l = scene.add_line();

    let mut drag = DragController::new();
    drag.pointer_down(
        &mut scene,
        DragTarget::LineEndpoint(l, LineEnd::Start),
        Position::new(30.0, 50.0),
    );
    drag.pointer_move(&mut scene, Position::new(26.0, 74.0));
    drag.pointer_up(&mut scene);

    let ElementKind::Line(line) = &scene.element(l).unwrap().kind else {
        panic!("expected line");
    };
    assert!(line.start.is_connected());

    assert!(drag.endpoint_double_click(&mut scene, l, LineEnd::Start));
    let ElementKind::Line(line) = &scene.element(l).unwrap().kind else {
        panic!("expected line");
    };
    assert_eq!(line.start, Endpoint::Absolute(Position::new(25.0, 75.0)));
}

#[test]
fn last_rectangle_cannot_be_removed() {
    let mut scene = Scene::new();
    let rect = scene.elements[0].id;
    let p = scene.add_point();

    assert!(!scene.remove_element(rect));
    assert!(scene.remove_element(p));

    let second = scene.add_rect();
    assert!(scene.remove_element(rect));
    assert!(!scene.remove_element(second));
}
