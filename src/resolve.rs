use crate::{
    core::Position,
    model::{ConnectionRef, Element, ElementId, ElementKind, Endpoint, LineEnd},
};

/// A connection reference that currently has no position: its target was
/// deleted, its vertex index is out of range, or it points at geometry that
/// cannot supply one. Consumers treat unresolved endpoints as a no-op (skip
/// drawing, skip snap candidacy), never as a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Unresolved;

pub type ResolveResult = Result<Position, Unresolved>;

/// Resolve an endpoint to an absolute position.
///
/// Recursion happens when a line endpoint references another line's endpoint;
/// well-formed data bottoms out in one hop, but depth is bounded by the
/// element count anyway.
pub fn resolve_endpoint(endpoint: &Endpoint, elements: &[Element]) -> ResolveResult {
    resolve_bounded(endpoint, elements, elements.len() + 1)
}

fn resolve_bounded(endpoint: &Endpoint, elements: &[Element], depth: usize) -> ResolveResult {
    let re = match endpoint {
        Endpoint::Absolute(pos) => return Ok(*pos),
        Endpoint::Connected(re) => re,
    };
    if depth == 0 {
        return Err(Unresolved);
    }

    let target = elements
        .iter()
        .find(|e| e.id == re.target)
        .ok_or(Unresolved)?;

    match &target.kind {
        ElementKind::Point(point) => Ok(point.position),
        ElementKind::Line(line) => {
            let next = match re.end {
                Some(LineEnd::Start) => &line.start,
                Some(LineEnd::End) => &line.end,
                None => return Err(Unresolved),
            };
            resolve_bounded(next, elements, depth - 1)
        }
        ElementKind::Polygon(poly) => {
            let idx = re.vertex.ok_or(Unresolved)?;
            poly.vertices.get(idx).copied().ok_or(Unresolved)
        }
        _ => Err(Unresolved),
    }
}

/// A position another line endpoint could attach to, tagged with the
/// reference that reproduces it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SnapCandidate {
    pub position: Position,
    pub reference: ConnectionRef,
}

/// Enumerate every connectable position: point overlays, resolved line
/// endpoints, and polygon vertices. `exclude` prevents self-connection.
/// Unresolved endpoints are silently skipped.
pub fn connectable_points(elements: &[Element], exclude: Option<ElementId>) -> Vec<SnapCandidate> {
    let mut out = Vec::new();
    for el in elements {
        if Some(el.id) == exclude {
            continue;
        }
        match &el.kind {
            ElementKind::Point(point) => out.push(SnapCandidate {
                position: point.position,
                reference: ConnectionRef {
                    target: el.id,
                    vertex: None,
                    end: None,
                },
            }),
            ElementKind::Line(line) => {
                for (end, ep) in [(LineEnd::Start, &line.start), (LineEnd::End, &line.end)] {
                    if let Ok(position) = resolve_endpoint(ep, elements) {
                        out.push(SnapCandidate {
                            position,
                            reference: ConnectionRef {
                                target: el.id,
                                vertex: None,
                                end: Some(end),
                            },
                        });
                    }
                }
            }
            ElementKind::Polygon(poly) => {
                for (i, &position) in poly.vertices.iter().enumerate() {
                    out.push(SnapCandidate {
                        position,
                        reference: ConnectionRef {
                            target: el.id,
                            vertex: Some(i),
                            end: None,
                        },
                    });
                }
            }
            _ => {}
        }
    }
    out
}

/// The nearest candidate within `snap_radius` (Euclidean, percent units), or
/// None. Among exact distance ties the first-enumerated candidate wins; the
/// order among ties is undefined.
pub fn nearest_snap(
    pos: Position,
    elements: &[Element],
    snap_radius: f64,
    exclude: Option<ElementId>,
) -> Option<SnapCandidate> {
    let mut best: Option<(f64, SnapCandidate)> = None;
    for cand in connectable_points(elements, exclude) {
        let d = pos.distance(cand.position);
        if d > snap_radius {
            continue;
        }
        match &best {
            Some((bd, _)) if *bd <= d => {}
            _ => best = Some((d, cand)),
        }
    }
    best.map(|(_, c)| c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Scene;

    fn point_at(scene: &mut Scene, x: f64, y: f64) -> ElementId {
        let id = scene.add_point();
        if let Some(el) = scene.element_mut(id)
            && let ElementKind::Point(p) = &mut el.kind
        {
            p.position = Position::new(x, y);
        }
        id
    }

    #[test]
    fn connect_and_resolve_follows_target_moves() {
        let mut scene = Scene::new();
        let p = point_at(&mut scene, 50.0, 50.0);
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

        let ElementKind::Line(line) = &scene.element(l).unwrap().kind else {
            panic!("expected line");
        };
        assert_eq!(
            resolve_endpoint(&line.end, &scene.elements),
            Ok(Position::new(50.0, 50.0))
        );

        if let Some(el) = scene.element_mut(p)
            && let ElementKind::Point(pt) = &mut el.kind
        {
            pt.position = Position::new(20.0, 20.0);
        }
        let ElementKind::Line(line) = &scene.element(l).unwrap().kind else {
            panic!("expected line");
        };
        assert_eq!(
            resolve_endpoint(&line.end, &scene.elements),
            Ok(Position::new(20.0, 20.0))
        );
    }

    #[test]
    fn resolution_is_deterministic_without_mutation() {
        let mut scene = Scene::new();
        let p = point_at(&mut scene, 33.0, 66.0);
        let ep = Endpoint::Connected(ConnectionRef {
            target: p,
            vertex: None,
            end: None,
        });
        let a = resolve_endpoint(&ep, &scene.elements);
        let b = resolve_endpoint(&ep, &scene.elements);
        assert_eq!(a, b);
    }

    #[test]
    fn deleted_target_resolves_unresolved() {
        let mut scene = Scene::new();
        let p = point_at(&mut scene, 10.0, 10.0);
        let ep = Endpoint::Connected(ConnectionRef {
            target: p,
            vertex: None,
            end: None,
        });
        assert!(resolve_endpoint(&ep, &scene.elements).is_ok());
        scene.remove_element(p);
        assert_eq!(resolve_endpoint(&ep, &scene.elements), Err(Unresolved));
    }

    #[test]
    fn line_endpoint_resolves_through_one_hop() {
        let mut scene = Scene::new();
        let p = point_at(&mut scene, 80.0, 20.0);
        let l1 = scene.add_line();
        scene.connect_line_end(
            l1,
            LineEnd::Start,
            ConnectionRef {
                target: p,
                vertex: None,
                end: None,
            },
        );
        // l2.end -> l1.start -> p
        let l2 = scene.add_line();
        scene.connect_line_end(
            l2,
            LineEnd::End,
            ConnectionRef {
                target: l1,
                vertex: None,
                end: Some(LineEnd::Start),
            },
        );
        let ElementKind::Line(line) = &scene.element(l2).unwrap().kind else {
            panic!("expected line");
        };
        assert_eq!(
            resolve_endpoint(&line.end, &scene.elements),
            Ok(Position::new(80.0, 20.0))
        );
    }

    #[test]
    fn mutual_references_terminate_unresolved() {
        let mut scene = Scene::new();
        let l1 = scene.add_line();
        let l2 = scene.add_line();
        scene.connect_line_end(
            l1,
            LineEnd::Start,
            ConnectionRef {
                target: l2,
                vertex: None,
                end: Some(LineEnd::Start),
            },
        );
        scene.connect_line_end(
            l2,
            LineEnd::Start,
            ConnectionRef {
                target: l1,
                vertex: None,
                end: Some(LineEnd::Start),
            },
        );
        let ElementKind::Line(line) = &scene.element(l1).unwrap().kind else {
            panic!("expected line");
        };
        assert_eq!(resolve_endpoint(&line.start, &scene.elements), Err(Unresolved));
    }

    #[test]
    fn out_of_range_vertex_is_unresolved() {
        let mut scene = Scene::new();
        let poly = scene.begin_polygon(Position::new(0.0, 0.0));
        scene.append_polygon_vertex(poly, Position::new(10.0, 0.0));
        let ep = Endpoint::Connected(ConnectionRef {
            target: poly,
            vertex: Some(5),
            end: None,
        });
        assert_eq!(resolve_endpoint(&ep, &scene.elements), Err(Unresolved));
    }

    #[test]
    fn nearest_snap_honors_radius_and_exclusion() {
        let mut scene = Scene::new();
        let near = point_at(&mut scene, 50.0, 50.0);
        let far = point_at(&mut scene, 90.0, 90.0);
        let l = scene.add_line();

        let hit = nearest_snap(Position::new(52.0, 50.0), &scene.elements, 5.0, Some(l)).unwrap();
        assert_eq!(hit.reference.target, near);

        assert!(nearest_snap(Position::new(52.0, 50.0), &scene.elements, 1.0, Some(l)).is_none());

        // Excluding the near point leaves only out-of-radius candidates
        // besides the line's own endpoints.
        let hit = nearest_snap(Position::new(89.0, 90.0), &scene.elements, 5.0, Some(near));
        assert_eq!(hit.unwrap().reference.target, far);
    }

    #[test]
    fn dangling_reference_is_not_a_snap_candidate() {
        let mut scene = Scene::new();
        let p = point_at(&mut scene, 10.0, 10.0);
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
        scene.remove_element(p);

        let candidates = connectable_points(&scene.elements, None);
        // The dangling start endpoint contributes nothing; the free end does.
        assert!(candidates.iter().all(|c| c.reference.end != Some(LineEnd::Start)
            || c.reference.target != l));
    }
}
