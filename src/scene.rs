use crate::{
    core::{Position, Rgba8},
    error::ScrimResult,
    model::{
        AnimationSlot, ConnectionRef, DrawingComponent, Element, ElementId, ElementKind, Endpoint,
        ImageComponent, ImageContent, LineEnd, LineOverlay, PointOverlay, PolygonOverlay,
        RecordingConfig, RectOverlay,
    },
    resolve,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum EditorMode {
    Select,
    DrawFree,
    DrawStraight,
    PolygonCreate,
}

/// Decoded background raster plus its intrinsic pixel dimensions, supplied by
/// the background image provider. Read-only context for canvas sizing.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Background {
    pub width: u32,
    pub height: u32,
    pub content: ImageContent,
}

/// The mutable document. Element order is insertion order; render order is a
/// stable sort by z ascending, derived on demand.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Scene {
    pub elements: Vec<Element>,
    pub active: Option<ElementId>,
    pub background: Option<Background>,
    /// Saved reusable image snippets.
    pub library: Vec<ImageContent>,
    pub mode: EditorMode,
    /// In-progress draw capture, container percent coordinates.
    pub draw_buffer: Vec<Position>,
    pub pending_polygon: Option<ElementId>,
    pub recording: RecordingConfig,
    next_id: u64,
    family_counters: std::collections::BTreeMap<String, u64>,
}

pub const DEFAULT_COLOR: Rgba8 = Rgba8 {
    r: 59,
    g: 130,
    b: 246,
    a: 255,
};

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// A scene starts with one default rectangle overlay, selected.
    pub fn new() -> Self {
        let mut scene = Self {
            elements: Vec::new(),
            active: None,
            background: None,
            library: Vec::new(),
            mode: EditorMode::Select,
            draw_buffer: Vec::new(),
            pending_polygon: None,
            recording: RecordingConfig::default(),
            next_id: 1,
            family_counters: std::collections::BTreeMap::new(),
        };
        let id = scene.add_rect();
        scene.active = Some(id);
        scene
    }

    pub fn validate(&self) -> ScrimResult<()> {
        self.recording.validate()?;
        for el in &self.elements {
            el.validate()?;
        }
        Ok(())
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.iter().find(|e| e.id == id)
    }

    pub fn element_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.elements.iter_mut().find(|e| e.id == id)
    }

    pub fn active_element(&self) -> Option<&Element> {
        self.active.and_then(|id| self.element(id))
    }

    /// Indices into `elements` in render order (stable sort, z ascending).
    pub fn render_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.elements.len()).collect();
        order.sort_by_key(|&i| self.elements[i].z);
        order
    }

    // --- factories -------------------------------------------------------

    fn alloc(&mut self, kind: ElementKind) -> ElementId {
        // Ids are monotonic and never reused, also across deletions.
        let id = ElementId(self.next_id);
        self.next_id += 1;

        let family = kind.family_name();
        let n = self
            .family_counters
            .entry(family.to_string())
            .and_modify(|n| *n += 1)
            .or_insert(1);
        let name = format!("{family} {n}");

        let z = self.elements.iter().map(|e| e.z).max().unwrap_or(0) + 1;
        self.elements.push(Element {
            id,
            name,
            z,
            color: DEFAULT_COLOR,
            opacity: 1.0,
            rotation_deg: 0.0,
            slot: AnimationSlot::default(),
            kind,
        });
        id
    }

    pub fn add_rect(&mut self) -> ElementId {
        self.alloc(ElementKind::Rect(RectOverlay {
            position: Position::new(35.0, 35.0),
            width: 200.0,
            height: 120.0,
            label: String::new(),
            border_width: 3.0,
        }))
    }

    pub fn add_point(&mut self) -> ElementId {
        self.alloc(ElementKind::Point(PointOverlay {
            position: Position::new(50.0, 50.0),
            radius: 8.0,
            label: String::new(),
        }))
    }

    pub fn add_line(&mut self) -> ElementId {
        self.alloc(ElementKind::Line(LineOverlay {
            start: Endpoint::absolute(30.0, 50.0),
            end: Endpoint::absolute(70.0, 50.0),
            width: 3.0,
        }))
    }

    /// Start a polygon at the first clicked vertex. Authoring continues
    /// through the polygon tool until the shape is closed or finished open.
    pub fn begin_polygon(&mut self, first: Position) -> ElementId {
        let id = self.alloc(ElementKind::Polygon(PolygonOverlay {
            vertices: vec![first],
            closed: false,
            fill: false,
            stroke_width: 3.0,
        }));
        self.pending_polygon = Some(id);
        id
    }

    pub fn add_image(&mut self, content: ImageContent, width: f64, height: f64) -> ElementId {
        self.alloc(ElementKind::Image(ImageComponent {
            position: Position::new(40.0, 40.0),
            width,
            height,
            content,
        }))
    }

    pub fn add_drawing(&mut self, drawing: DrawingComponent) -> ElementId {
        self.alloc(ElementKind::Drawing(drawing))
    }

    // --- deletion --------------------------------------------------------

    /// Remove an element. Refuses to remove the last rectangle overlay (the
    /// seeded family) and reports whether the deletion applied.
    pub fn remove_element(&mut self, id: ElementId) -> bool {
        let Some(idx) = self.elements.iter().position(|e| e.id == id) else {
            return false;
        };
        let is_rect = matches!(self.elements[idx].kind, ElementKind::Rect(_));
        if is_rect {
            let rect_count = self
                .elements
                .iter()
                .filter(|e| matches!(e.kind, ElementKind::Rect(_)))
                .count();
            if rect_count <= 1 {
                return false;
            }
        }
        self.elements.remove(idx);
        if self.active == Some(id) {
            self.active = self.elements.first().map(|e| e.id);
        }
        if self.pending_polygon == Some(id) {
            self.pending_polygon = None;
        }
        true
    }

    // --- polygon mutations (silent no-ops when invalid) ------------------

    pub fn append_polygon_vertex(&mut self, id: ElementId, v: Position) -> bool {
        let Some(ElementKind::Polygon(poly)) = self.element_mut(id).map(|e| &mut e.kind) else {
            return false;
        };
        if poly.closed {
            return false;
        }
        poly.vertices.push(v);
        true
    }

    pub fn close_polygon(&mut self, id: ElementId) -> bool {
        let Some(ElementKind::Polygon(poly)) = self.element_mut(id).map(|e| &mut e.kind) else {
            return false;
        };
        if poly.vertices.len() < 3 {
            return false;
        }
        poly.closed = true;
        true
    }

    /// Finish an in-progress polygon as an open polyline. Fill is forced off.
    pub fn finish_polygon_open(&mut self, id: ElementId) -> bool {
        let Some(ElementKind::Polygon(poly)) = self.element_mut(id).map(|e| &mut e.kind) else {
            return false;
        };
        if poly.vertices.len() < 2 {
            return false;
        }
        poly.closed = false;
        poly.fill = false;
        true
    }

    pub fn set_polygon_fill(&mut self, id: ElementId, fill: bool) -> bool {
        let Some(ElementKind::Polygon(poly)) = self.element_mut(id).map(|e| &mut e.kind) else {
            return false;
        };
        if fill && !poly.closed {
            return false;
        }
        poly.fill = fill;
        true
    }

    /// Remove a vertex. Refused when it would drop below 2 vertices; dropping
    /// below 3 on a closed polygon reopens it first.
    pub fn remove_polygon_vertex(&mut self, id: ElementId, index: usize) -> bool {
        let Some(ElementKind::Polygon(poly)) = self.element_mut(id).map(|e| &mut e.kind) else {
            return false;
        };
        if index >= poly.vertices.len() || poly.vertices.len() <= 2 {
            return false;
        }
        poly.vertices.remove(index);
        if poly.closed && poly.vertices.len() < 3 {
            poly.closed = false;
            poly.fill = false;
        }
        true
    }

    /// Insert a vertex at the midpoint of edge `edge..edge+1`, splitting it.
    pub fn insert_polygon_vertex(&mut self, id: ElementId, edge: usize) -> bool {
        let Some(ElementKind::Polygon(poly)) = self.element_mut(id).map(|e| &mut e.kind) else {
            return false;
        };
        let n = poly.vertices.len();
        if n < 2 {
            return false;
        }
        let last_edge = if poly.closed { n } else { n - 1 };
        if edge >= last_edge {
            return false;
        }
        let a = poly.vertices[edge];
        let b = poly.vertices[(edge + 1) % n];
        poly.vertices.insert(edge + 1, Position::midpoint(a, b));
        true
    }

    /// Cancel in-progress polygon authoring, deleting the pending element.
    pub fn cancel_pending_polygon(&mut self) {
        if let Some(id) = self.pending_polygon.take()
            && let Some(idx) = self.elements.iter().position(|e| e.id == id)
        {
            self.elements.remove(idx);
            if self.active == Some(id) {
                self.active = self.elements.first().map(|e| e.id);
            }
        }
        self.mode = EditorMode::Select;
    }

    // --- line endpoint mutations -----------------------------------------

    pub fn set_line_end(&mut self, id: ElementId, end: LineEnd, ep: Endpoint) -> bool {
        let Some(ElementKind::Line(line)) = self.element_mut(id).map(|e| &mut e.kind) else {
            return false;
        };
        match end {
            LineEnd::Start => line.start = ep,
            LineEnd::End => line.end = ep,
        }
        true
    }

    pub fn connect_line_end(&mut self, id: ElementId, end: LineEnd, re: ConnectionRef) -> bool {
        if re.target == id {
            return false;
        }
        self.set_line_end(id, end, Endpoint::Connected(re))
    }

    /// Disconnect a connected endpoint, freezing it at the last resolved
    /// absolute position. Unresolvable references fall back to the canvas
    /// center rather than leaving a dangling reference behind.
    pub fn disconnect_line_end(&mut self, id: ElementId, end: LineEnd) -> bool {
        let Some(ElementKind::Line(line)) = self.element(id).map(|e| &e.kind) else {
            return false;
        };
        let ep = match end {
            LineEnd::Start => line.start,
            LineEnd::End => line.end,
        };
        if !ep.is_connected() {
            return false;
        }
        let frozen = resolve::resolve_endpoint(&ep, &self.elements)
            .unwrap_or(Position::new(50.0, 50.0));
        self.set_line_end(id, end, Endpoint::Absolute(frozen))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_seeds_one_selected_rectangle() {
        let scene = Scene::new();
        assert_eq!(scene.elements.len(), 1);
        assert!(matches!(scene.elements[0].kind, ElementKind::Rect(_)));
        assert_eq!(scene.active, Some(scene.elements[0].id));
    }

    #[test]
    fn ids_are_monotonic_and_never_reused() {
        let mut scene = Scene::new();
        let a = scene.add_point();
        let b = scene.add_line();
        assert!(a < b);
        assert!(scene.remove_element(a));
        let c = scene.add_point();
        assert!(c > b);
        assert_ne!(c, a);
    }

    #[test]
    fn names_use_monotonic_family_suffixes() {
        let mut scene = Scene::new();
        let r2 = scene.add_rect();
        assert_eq!(scene.element(r2).unwrap().name, "Rectangle 2");
        let p1 = scene.add_point();
        assert_eq!(scene.element(p1).unwrap().name, "Point 1");
    }

    #[test]
    fn last_rectangle_cannot_be_deleted() {
        let mut scene = Scene::new();
        let seed = scene.elements[0].id;
        assert!(!scene.remove_element(seed));

        let extra = scene.add_rect();
        assert!(scene.remove_element(extra));
        assert!(!scene.remove_element(seed));
    }

    #[test]
    fn render_order_is_stable_by_z() {
        let mut scene = Scene::new();
        let p = scene.add_point();
        let l = scene.add_line();
        scene.element_mut(p).unwrap().z = -5;
        scene.element_mut(l).unwrap().z = -5;
        let order = scene.render_order();
        // Equal z keeps insertion order: point before line, rect last.
        assert_eq!(scene.elements[order[0]].id, p);
        assert_eq!(scene.elements[order[1]].id, l);
    }

    #[test]
    fn vertex_removal_guard_holds_at_two() {
        let mut scene = Scene::new();
        let id = scene.begin_polygon(Position::new(0.0, 0.0));
        scene.append_polygon_vertex(id, Position::new(10.0, 0.0));
        assert!(!scene.remove_polygon_vertex(id, 0));
        let ElementKind::Polygon(poly) = &scene.element(id).unwrap().kind else {
            panic!("expected polygon");
        };
        assert_eq!(poly.vertices.len(), 2);
    }

    #[test]
    fn closing_below_three_vertices_is_rejected() {
        let mut scene = Scene::new();
        let id = scene.begin_polygon(Position::new(0.0, 0.0));
        scene.append_polygon_vertex(id, Position::new(10.0, 0.0));
        assert!(!scene.close_polygon(id));
        scene.append_polygon_vertex(id, Position::new(5.0, 8.0));
        assert!(scene.close_polygon(id));
    }

    #[test]
    fn removing_vertex_of_closed_triangle_reopens_it() {
        let mut scene = Scene::new();
        let id = scene.begin_polygon(Position::new(0.0, 0.0));
        scene.append_polygon_vertex(id, Position::new(10.0, 0.0));
        scene.append_polygon_vertex(id, Position::new(5.0, 8.0));
        assert!(scene.close_polygon(id));
        assert!(scene.set_polygon_fill(id, true));

        assert!(scene.remove_polygon_vertex(id, 2));
        let ElementKind::Polygon(poly) = &scene.element(id).unwrap().kind else {
            panic!("expected polygon");
        };
        assert!(!poly.closed);
        assert!(!poly.fill);
        assert_eq!(poly.vertices.len(), 2);
        poly.validate().unwrap();
    }

    #[test]
    fn fill_requires_closed() {
        let mut scene = Scene::new();
        let id = scene.begin_polygon(Position::new(0.0, 0.0));
        scene.append_polygon_vertex(id, Position::new(10.0, 0.0));
        scene.append_polygon_vertex(id, Position::new(5.0, 8.0));
        assert!(!scene.set_polygon_fill(id, true));
        scene.close_polygon(id);
        assert!(scene.set_polygon_fill(id, true));
    }

    #[test]
    fn midpoint_insert_splits_edge() {
        let mut scene = Scene::new();
        let id = scene.begin_polygon(Position::new(0.0, 0.0));
        scene.append_polygon_vertex(id, Position::new(10.0, 0.0));
        assert!(scene.insert_polygon_vertex(id, 0));
        let ElementKind::Polygon(poly) = &scene.element(id).unwrap().kind else {
            panic!("expected polygon");
        };
        assert_eq!(poly.vertices.len(), 3);
        assert_eq!(poly.vertices[1], Position::new(5.0, 0.0));
    }

    #[test]
    fn midpoint_insert_on_closing_edge_of_closed_polygon() {
        let mut scene = Scene::new();
        let id = scene.begin_polygon(Position::new(0.0, 0.0));
        scene.append_polygon_vertex(id, Position::new(10.0, 0.0));
        scene.append_polygon_vertex(id, Position::new(10.0, 10.0));
        scene.close_polygon(id);
        // Edge 2 is the synthetic closing edge back to vertex 0.
        assert!(scene.insert_polygon_vertex(id, 2));
        let ElementKind::Polygon(poly) = &scene.element(id).unwrap().kind else {
            panic!("expected polygon");
        };
        assert_eq!(poly.vertices[3], Position::new(5.0, 5.0));
    }

    #[test]
    fn cancel_pending_polygon_deletes_it() {
        let mut scene = Scene::new();
        scene.mode = EditorMode::PolygonCreate;
        let id = scene.begin_polygon(Position::new(1.0, 1.0));
        scene.cancel_pending_polygon();
        assert!(scene.element(id).is_none());
        assert_eq!(scene.mode, EditorMode::Select);
        assert_eq!(scene.pending_polygon, None);
    }

    #[test]
    fn self_connection_is_rejected() {
        let mut scene = Scene::new();
        let l = scene.add_line();
        let re = ConnectionRef {
            target: l,
            vertex: None,
            end: Some(LineEnd::Start),
        };
        assert!(!scene.connect_line_end(l, LineEnd::End, re));
    }
}
