use crate::{
    core::Position,
    model::{ElementId, ElementKind, Endpoint, LineEnd},
    resolve::{self, SnapCandidate},
    scene::{EditorMode, Scene},
};

/// Pixel size of the interactive container. Stored positions are percent of
/// this box; sizes stay native pixels, so only position deltas go through the
/// conversion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width_px: f64,
    pub height_px: f64,
}

impl Viewport {
    pub fn to_percent(&self, x_px: f64, y_px: f64) -> Position {
        Position::new(
            100.0 * x_px / self.width_px.max(1.0),
            100.0 * y_px / self.height_px.max(1.0),
        )
    }

    pub fn delta_to_percent(&self, dx_px: f64, dy_px: f64) -> (f64, f64) {
        (
            100.0 * dx_px / self.width_px.max(1.0),
            100.0 * dy_px / self.height_px.max(1.0),
        )
    }
}

/// Vertices within this distance of vertex 0 close the polygon.
pub const POLYGON_CLOSE_RADIUS: f64 = 5.0;
/// Endpoint snap search radius, percent units.
pub const ENDPOINT_SNAP_RADIUS: f64 = 4.0;
/// Minimum rect/image dimension under resize, native px.
pub const MIN_RESIZE_DIM: f64 = 20.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResizeHandle {
    NorthWest,
    NorthEast,
    SouthWest,
    SouthEast,
}

/// What the pointer went down on.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DragTarget {
    Body(ElementId),
    Handle(ElementId, ResizeHandle),
    LineEndpoint(ElementId, LineEnd),
    PolygonVertex(ElementId, usize),
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum DragState {
    Idle,
    Dragging(ElementId),
    Resizing(ElementId, ResizeHandle),
    DraggingEndpoint {
        id: ElementId,
        end: LineEnd,
        snap: Option<SnapCandidate>,
    },
    DraggingVertex {
        id: ElementId,
        index: usize,
    },
}

/// Direct-manipulation state machine: `idle -> dragging | resizing -> idle`.
///
/// The caller owns the actual event listeners and must deliver `pointer_up`
/// from a document-global listener (the pointer routinely leaves element
/// bounds mid-drag); the controller accepts it in any state and tears down
/// unconditionally.
#[derive(Debug)]
pub struct DragController {
    state: DragState,
    last: Position,
}

impl Default for DragController {
    fn default() -> Self {
        Self::new()
    }
}

impl DragController {
    pub fn new() -> Self {
        Self {
            state: DragState::Idle,
            last: Position::default(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == DragState::Idle
    }

    pub fn pointer_down(&mut self, scene: &mut Scene, target: DragTarget, pos: Position) {
        if self.state != DragState::Idle {
            return;
        }
        self.last = pos;
        self.state = match target {
            DragTarget::Body(id) => {
                scene.active = Some(id);
                DragState::Dragging(id)
            }
            DragTarget::Handle(id, handle) => DragState::Resizing(id, handle),
            DragTarget::LineEndpoint(id, end) => DragState::DraggingEndpoint {
                id,
                end,
                snap: None,
            },
            DragTarget::PolygonVertex(id, index) => DragState::DraggingVertex { id, index },
        };
    }

    pub fn pointer_move(&mut self, scene: &mut Scene, pos: Position) {
        let (dx, dy) = (pos.x - self.last.x, pos.y - self.last.y);
        self.last = pos;

        match self.state {
            DragState::Idle => {}
            DragState::Dragging(id) => drag_body(scene, id, dx, dy),
            DragState::Resizing(id, handle) => resize_body(scene, id, handle, dx, dy),
            DragState::DraggingEndpoint { id, end, ref mut snap } => {
                *snap = resolve::nearest_snap(pos, &scene.elements, ENDPOINT_SNAP_RADIUS, Some(id));
                scene.set_line_end(id, end, Endpoint::Absolute(pos));
            }
            DragState::DraggingVertex { id, index } => {
                if let Some(ElementKind::Polygon(poly)) =
                    scene.element_mut(id).map(|e| &mut e.kind)
                    && let Some(v) = poly.vertices.get_mut(index)
                {
                    *v = pos.clamped();
                }
            }
        }
    }

    /// Ends the gesture. If an endpoint drag released over a snap candidate,
    /// the endpoint converts from an absolute position to a connection
    /// reference.
    pub fn pointer_up(&mut self, scene: &mut Scene) {
        if let DragState::DraggingEndpoint {
            id,
            end,
            snap: Some(candidate),
        } = self.state
        {
            scene.connect_line_end(id, end, candidate.reference);
        }
        self.state = DragState::Idle;
    }

    /// Double-click on a connected endpoint: disconnect, freezing it at its
    /// last resolved position.
    pub fn endpoint_double_click(&self, scene: &mut Scene, id: ElementId, end: LineEnd) -> bool {
        scene.disconnect_line_end(id, end)
    }

    /// Double-click on a polygon vertex removes it (guarded below 2).
    pub fn vertex_double_click(&self, scene: &mut Scene, id: ElementId, index: usize) -> bool {
        scene.remove_polygon_vertex(id, index)
    }

    /// Click on a computed edge midpoint inserts a vertex there.
    pub fn edge_midpoint_click(&self, scene: &mut Scene, id: ElementId, edge: usize) -> bool {
        scene.insert_polygon_vertex(id, edge)
    }
}

fn drag_body(scene: &mut Scene, id: ElementId, dx: f64, dy: f64) {
    let Some(el) = scene.element_mut(id) else {
        return;
    };
    match &mut el.kind {
        // Rect and image drags are deliberately unclamped; the body may hang
        // off-canvas for crop-style framing.
        ElementKind::Rect(rect) => {
            rect.position.x += dx;
            rect.position.y += dy;
        }
        ElementKind::Image(img) => {
            img.position.x += dx;
            img.position.y += dy;
        }
        ElementKind::Point(point) => {
            point.position = Position::new(point.position.x + dx, point.position.y + dy).clamped();
        }
        ElementKind::Drawing(drawing) => {
            drawing.position =
                Position::new(drawing.position.x + dx, drawing.position.y + dy).clamped();
        }
        ElementKind::Line(line) => {
            // Connected endpoints stay attached; only free ends translate.
            for ep in [&mut line.start, &mut line.end] {
                if let Endpoint::Absolute(pos) = ep {
                    pos.x += dx;
                    pos.y += dy;
                }
            }
        }
        ElementKind::Polygon(poly) => {
            // Clamp the group delta so the whole shape stays in bounds
            // without distorting.
            let (mut dx, mut dy) = (dx, dy);
            for v in &poly.vertices {
                dx = dx.clamp(-v.x, 100.0 - v.x);
                dy = dy.clamp(-v.y, 100.0 - v.y);
            }
            for v in &mut poly.vertices {
                v.x += dx;
                v.y += dy;
            }
        }
    }
}

fn resize_body(scene: &mut Scene, id: ElementId, handle: ResizeHandle, dx: f64, dy: f64) {
    let Some(el) = scene.element_mut(id) else {
        return;
    };
    let (pos, w, h) = match &mut el.kind {
        ElementKind::Rect(rect) => (&mut rect.position, &mut rect.width, &mut rect.height),
        ElementKind::Image(img) => (&mut img.position, &mut img.width, &mut img.height),
        _ => return,
    };

    // Sizes are native px while the pointer delta is percent; the caller
    // scales the delta through the viewport before it gets here, so treat the
    // percent delta as px-equivalent 1:1 against a 100-unit box.
    let (sx, sy) = match handle {
        ResizeHandle::NorthWest => (-1.0, -1.0),
        ResizeHandle::NorthEast => (1.0, -1.0),
        ResizeHandle::SouthWest => (-1.0, 1.0),
        ResizeHandle::SouthEast => (1.0, 1.0),
    };

    let new_w = (*w + sx * dx).max(MIN_RESIZE_DIM);
    let new_h = (*h + sy * dy).max(MIN_RESIZE_DIM);
    if sx < 0.0 {
        pos.x += *w - new_w;
    }
    if sy < 0.0 {
        pos.y += *h - new_h;
    }
    *w = new_w;
    *h = new_h;
}

/// Outcome of a polygon-tool click.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolygonClick {
    Started(ElementId),
    VertexAdded,
    Closed,
    Ignored,
}

/// Polygon authoring: `idle -> placing-vertices -> closed | open-finished`.
#[derive(Debug, Default)]
pub struct PolygonTool;

impl PolygonTool {
    pub fn click(&self, scene: &mut Scene, pos: Position) -> PolygonClick {
        if scene.mode != EditorMode::PolygonCreate {
            return PolygonClick::Ignored;
        }
        let Some(id) = scene.pending_polygon else {
            let id = scene.begin_polygon(pos.clamped());
            scene.active = Some(id);
            return PolygonClick::Started(id);
        };

        let Some(ElementKind::Polygon(poly)) = scene.element(id).map(|e| &e.kind) else {
            return PolygonClick::Ignored;
        };
        let closes = poly.vertices.len() >= 3
            && poly.vertices[0].distance(pos) <= POLYGON_CLOSE_RADIUS;
        if closes {
            scene.close_polygon(id);
            scene.pending_polygon = None;
            scene.mode = EditorMode::Select;
            return PolygonClick::Closed;
        }
        scene.append_polygon_vertex(id, pos.clamped());
        PolygonClick::VertexAdded
    }

    /// Double-click or Enter: finish as an open polyline (needs >= 2
    /// vertices, fill forced off).
    pub fn finish_open(&self, scene: &mut Scene) -> bool {
        let Some(id) = scene.pending_polygon else {
            return false;
        };
        if !scene.finish_polygon_open(id) {
            return false;
        }
        scene.pending_polygon = None;
        scene.mode = EditorMode::Select;
        true
    }

    /// Escape: cancel and delete the in-progress polygon.
    pub fn cancel(&self, scene: &mut Scene) {
        scene.cancel_pending_polygon();
    }
}

/// Freehand/straight drawing: `idle -> capturing -> idle`.
#[derive(Debug, Default)]
pub struct DrawTool;

impl DrawTool {
    pub fn begin(&self, scene: &mut Scene, pos: Position) -> bool {
        if !matches!(scene.mode, EditorMode::DrawFree | EditorMode::DrawStraight) {
            return false;
        }
        scene.draw_buffer.clear();
        scene.draw_buffer.push(pos);
        true
    }

    pub fn sample(&self, scene: &mut Scene, pos: Position) {
        match scene.mode {
            EditorMode::DrawFree => scene.draw_buffer.push(pos),
            EditorMode::DrawStraight => {
                // Straight mode keeps only the first and latest samples.
                scene.draw_buffer.truncate(1);
                scene.draw_buffer.push(pos);
            }
            _ => {}
        }
    }

    /// Release: with >= 2 captured points, create a drawing component whose
    /// path is re-expressed in bounding-box-local coordinates, then reset the
    /// editor mode.
    pub fn finish(&self, scene: &mut Scene) -> Option<ElementId> {
        let straight = match scene.mode {
            EditorMode::DrawFree => false,
            EditorMode::DrawStraight => true,
            _ => return None,
        };
        let points = std::mem::take(&mut scene.draw_buffer);
        scene.mode = EditorMode::Select;
        if points.len() < 2 {
            return None;
        }

        let min_x = points.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        let min_y = points.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let max_x = points.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
        let max_y = points.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);

        let local = points
            .iter()
            .map(|p| Position::new(p.x - min_x, p.y - min_y))
            .collect();

        let id = scene.add_drawing(crate::model::DrawingComponent {
            position: Position::new(min_x, min_y),
            width: (max_x - min_x).max(0.1),
            height: (max_y - min_y).max(0.1),
            path: local,
            straight,
            smoothing: if straight { 0.0 } else { 0.5 },
            stroke_width: 3.0,
        });
        scene.active = Some(id);
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConnectionRef;

    fn rect_pos(scene: &Scene, id: ElementId) -> Position {
        let ElementKind::Rect(rect) = &scene.element(id).unwrap().kind else {
            panic!("expected rect");
        };
        rect.position
    }

    #[test]
    fn viewport_converts_pixels_to_percent() {
        let vp = Viewport {
            width_px: 800.0,
            height_px: 400.0,
        };
        assert_eq!(vp.to_percent(400.0, 100.0), Position::new(50.0, 25.0));
        assert_eq!(vp.delta_to_percent(80.0, 40.0), (10.0, 10.0));
    }

    #[test]
    fn rect_drag_is_unclamped() {
        let mut scene = Scene::new();
        let id = scene.elements[0].id;
        let mut drag = DragController::new();
        drag.pointer_down(&mut scene, DragTarget::Body(id), Position::new(50.0, 50.0));
        drag.pointer_move(&mut scene, Position::new(-30.0, 50.0));
        drag.pointer_up(&mut scene);
        assert!(rect_pos(&scene, id).x < 0.0);
        assert!(drag.is_idle());
    }

    #[test]
    fn point_drag_clamps_to_canvas() {
        let mut scene = Scene::new();
        let id = scene.add_point();
        let mut drag = DragController::new();
        drag.pointer_down(&mut scene, DragTarget::Body(id), Position::new(50.0, 50.0));
        drag.pointer_move(&mut scene, Position::new(220.0, -40.0));
        drag.pointer_up(&mut scene);
        let ElementKind::Point(p) = &scene.element(id).unwrap().kind else {
            panic!("expected point");
        };
        assert_eq!(p.position, Position::new(100.0, 0.0));
    }

    #[test]
    fn pointer_up_in_idle_is_harmless() {
        let mut scene = Scene::new();
        let mut drag = DragController::new();
        drag.pointer_up(&mut scene);
        assert!(drag.is_idle());
    }

    #[test]
    fn resize_clamps_minimum_dimension() {
        let mut scene = Scene::new();
        let id = scene.elements[0].id;
        let mut drag = DragController::new();
        drag.pointer_down(
            &mut scene,
            DragTarget::Handle(id, ResizeHandle::SouthEast),
            Position::new(60.0, 60.0),
        );
        drag.pointer_move(&mut scene, Position::new(-500.0, -500.0));
        drag.pointer_up(&mut scene);
        let ElementKind::Rect(rect) = &scene.element(id).unwrap().kind else {
            panic!("expected rect");
        };
        assert_eq!(rect.width, MIN_RESIZE_DIM);
        assert_eq!(rect.height, MIN_RESIZE_DIM);
    }

    #[test]
    fn endpoint_release_over_snap_connects() {
        let mut scene = Scene::new();
        let p = scene.add_point();
        if let Some(el) = scene.element_mut(p)
            && let ElementKind::Point(pt) = &mut el.kind
        {
            pt.position = Position::new(20.0, 20.0);
        }
        let l = scene.add_line();
        let mut drag = DragController::new();
        drag.pointer_down(
            &mut scene,
            DragTarget::LineEndpoint(l, LineEnd::End),
            Position::new(70.0, 50.0),
        );
        drag.pointer_move(&mut scene, Position::new(21.0, 20.0));
        drag.pointer_up(&mut scene);

        let ElementKind::Line(line) = &scene.element(l).unwrap().kind else {
            panic!("expected line");
        };
        assert_eq!(
            line.end,
            Endpoint::Connected(ConnectionRef {
                target: p,
                vertex: None,
                end: None,
            })
        );
    }

    #[test]
    fn endpoint_release_in_open_space_stays_absolute() {
        let mut scene = Scene::new();
        let l = scene.add_line();
        let mut drag = DragController::new();
        drag.pointer_down(
            &mut scene,
            DragTarget::LineEndpoint(l, LineEnd::End),
            Position::new(70.0, 50.0),
        );
        drag.pointer_move(&mut scene, Position::new(85.0, 85.0));
        drag.pointer_up(&mut scene);
        let ElementKind::Line(line) = &scene.element(l).unwrap().kind else {
            panic!("expected line");
        };
        assert_eq!(line.end, Endpoint::Absolute(Position::new(85.0, 85.0)));
    }

    #[test]
    fn disconnect_freezes_at_resolved_position() {
        let mut scene = Scene::new();
        let p = scene.add_point();
        if let Some(el) = scene.element_mut(p)
            && let ElementKind::Point(pt) = &mut el.kind
        {
            pt.position = Position::new(20.0, 20.0);
        }
        let l = scene.add_line();
        scene.connect_line_end(
            l,
            LineEnd::End,
            ConnectionRef {
                target: p,
                vertex: None,
                end: None,
            },
        );

        let drag = DragController::new();
        assert!(drag.endpoint_double_click(&mut scene, l, LineEnd::End));
        let ElementKind::Line(line) = &scene.element(l).unwrap().kind else {
            panic!("expected line");
        };
        assert_eq!(line.end, Endpoint::Absolute(Position::new(20.0, 20.0)));

        // Moving the former target no longer affects the line.
        if let Some(el) = scene.element_mut(p)
            && let ElementKind::Point(pt) = &mut el.kind
        {
            pt.position = Position::new(90.0, 90.0);
        }
        let ElementKind::Line(line) = &scene.element(l).unwrap().kind else {
            panic!("expected line");
        };
        assert_eq!(line.end, Endpoint::Absolute(Position::new(20.0, 20.0)));
    }

    #[test]
    fn polygon_tool_closes_near_first_vertex() {
        let mut scene = Scene::new();
        scene.mode = EditorMode::PolygonCreate;
        let tool = PolygonTool;

        let PolygonClick::Started(id) = tool.click(&mut scene, Position::new(10.0, 10.0)) else {
            panic!("expected new polygon");
        };
        assert_eq!(tool.click(&mut scene, Position::new(40.0, 10.0)), PolygonClick::VertexAdded);
        assert_eq!(tool.click(&mut scene, Position::new(25.0, 40.0)), PolygonClick::VertexAdded);
        // Within 5 units of vertex 0 with >= 3 vertices: closes.
        assert_eq!(tool.click(&mut scene, Position::new(12.0, 11.0)), PolygonClick::Closed);

        let ElementKind::Polygon(poly) = &scene.element(id).unwrap().kind else {
            panic!("expected polygon");
        };
        assert!(poly.closed);
        assert_eq!(poly.vertices.len(), 3);
        assert_eq!(scene.mode, EditorMode::Select);
    }

    #[test]
    fn polygon_tool_near_click_below_three_adds_vertex() {
        let mut scene = Scene::new();
        scene.mode = EditorMode::PolygonCreate;
        let tool = PolygonTool;
        tool.click(&mut scene, Position::new(10.0, 10.0));
        // Near vertex 0 but only 1 vertex so far: appends instead of closing.
        assert_eq!(tool.click(&mut scene, Position::new(11.0, 10.0)), PolygonClick::VertexAdded);
    }

    #[test]
    fn polygon_tool_finish_open_forces_fill_off() {
        let mut scene = Scene::new();
        scene.mode = EditorMode::PolygonCreate;
        let tool = PolygonTool;
        let PolygonClick::Started(id) = tool.click(&mut scene, Position::new(10.0, 10.0)) else {
            panic!("expected new polygon");
        };
        assert!(!tool.finish_open(&mut scene)); // one vertex: refused
        tool.click(&mut scene, Position::new(40.0, 10.0));
        assert!(tool.finish_open(&mut scene));
        let ElementKind::Polygon(poly) = &scene.element(id).unwrap().kind else {
            panic!("expected polygon");
        };
        assert!(!poly.closed);
        assert!(!poly.fill);
        assert_eq!(scene.mode, EditorMode::Select);
    }

    #[test]
    fn draw_tool_straight_keeps_two_samples() {
        let mut scene = Scene::new();
        scene.mode = EditorMode::DrawStraight;
        let tool = DrawTool;
        tool.begin(&mut scene, Position::new(10.0, 10.0));
        tool.sample(&mut scene, Position::new(20.0, 15.0));
        tool.sample(&mut scene, Position::new(40.0, 30.0));
        assert_eq!(scene.draw_buffer.len(), 2);

        let id = tool.finish(&mut scene).unwrap();
        let ElementKind::Drawing(d) = &scene.element(id).unwrap().kind else {
            panic!("expected drawing");
        };
        assert!(d.straight);
        assert_eq!(d.path.len(), 2);
        assert_eq!(d.position, Position::new(10.0, 10.0));
        assert_eq!(d.path[0], Position::new(0.0, 0.0));
        assert_eq!(d.path[1], Position::new(30.0, 20.0));
    }

    #[test]
    fn draw_tool_single_sample_creates_nothing() {
        let mut scene = Scene::new();
        scene.mode = EditorMode::DrawFree;
        let tool = DrawTool;
        tool.begin(&mut scene, Position::new(10.0, 10.0));
        assert!(tool.finish(&mut scene).is_none());
        assert_eq!(scene.mode, EditorMode::Select);
        assert!(scene.draw_buffer.is_empty());
    }

    #[test]
    fn line_drag_moves_free_ends_only() {
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
        let mut drag = DragController::new();
        drag.pointer_down(&mut scene, DragTarget::Body(l), Position::new(50.0, 50.0));
        drag.pointer_move(&mut scene, Position::new(55.0, 52.0));
        drag.pointer_up(&mut scene);
        let ElementKind::Line(line) = &scene.element(l).unwrap().kind else {
            panic!("expected line");
        };
        assert!(line.start.is_connected());
        assert_eq!(line.end, Endpoint::Absolute(Position::new(75.0, 52.0)));
    }
}
