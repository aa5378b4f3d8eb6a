use crate::{
    core::Position,
    model::{AnimKind, Element, ElementKind},
    resolve,
};

/// Cyclic progress for a path animation, derived independently by each
/// renderer from its own clock.
///
/// `TrainLoop` folds the raw cycle into a back-and-forth sweep. Non-looping
/// slots park at the end of their first cycle instead of wrapping.
pub fn path_progress(kind: AnimKind, elapsed_ms: f64, duration_ms: f64, looping: bool) -> f64 {
    if !(duration_ms > 0.0) {
        return 0.0;
    }
    if !looping && elapsed_ms >= duration_ms {
        return match kind {
            AnimKind::TrainLoop => 0.0,
            _ => 1.0,
        };
    }
    let raw = (elapsed_ms.rem_euclid(duration_ms)) / duration_ms;
    match kind {
        AnimKind::TrainLoop => {
            if raw < 0.5 {
                raw * 2.0
            } else {
                2.0 - raw * 2.0
            }
        }
        _ => raw,
    }
}

/// The ordered polyline a path animation travels: line endpoints, or polygon
/// vertices plus a synthetic closing vertex. Returns None when the element is
/// not path geometry or any endpoint is unresolved (render no-op).
pub fn path_polyline(element: &Element, elements: &[Element]) -> Option<Vec<Position>> {
    match &element.kind {
        ElementKind::Line(line) => {
            let start = resolve::resolve_endpoint(&line.start, elements).ok()?;
            let end = resolve::resolve_endpoint(&line.end, elements).ok()?;
            Some(vec![start, end])
        }
        ElementKind::Polygon(poly) => {
            if poly.vertices.len() < 2 {
                return None;
            }
            let mut pts = poly.vertices.clone();
            if poly.closed {
                pts.push(poly.vertices[0]);
            }
            Some(pts)
        }
        _ => None,
    }
}

/// Cumulative Euclidean lengths along a polyline; `lengths[0] == 0` and the
/// last entry is the total length.
fn cumulative_lengths(path: &[Position]) -> Vec<f64> {
    let mut lengths = Vec::with_capacity(path.len());
    let mut total = 0.0;
    lengths.push(0.0);
    for w in path.windows(2) {
        total += w[0].distance(w[1]);
        lengths.push(total);
    }
    lengths
}

/// The point at total-path-fraction `f` (clamped to 0..=1).
pub fn point_at(path: &[Position], f: f64) -> Option<Position> {
    if path.is_empty() {
        return None;
    }
    if path.len() == 1 {
        return Some(path[0]);
    }
    let lengths = cumulative_lengths(path);
    let total = *lengths.last().unwrap_or(&0.0);
    if total <= 0.0 {
        return Some(path[0]);
    }
    let target = f.clamp(0.0, 1.0) * total;
    for i in 1..path.len() {
        if target <= lengths[i] {
            let seg = lengths[i] - lengths[i - 1];
            let t = if seg > 0.0 {
                (target - lengths[i - 1]) / seg
            } else {
                0.0
            };
            return Some(Position::lerp(path[i - 1], path[i], t));
        }
    }
    Some(path[path.len() - 1])
}

/// The sub-polyline between fractions `from` and `to` (each clamped to
/// 0..=1), including interior vertices so trains bend around polygon corners.
/// The train shrinks against either end of the path rather than wrapping.
pub fn segment_between(path: &[Position], from: f64, to: f64) -> Vec<Position> {
    let (from, to) = (from.clamp(0.0, 1.0), to.clamp(0.0, 1.0));
    if path.len() < 2 || to <= from {
        return Vec::new();
    }
    let lengths = cumulative_lengths(path);
    let total = *lengths.last().unwrap_or(&0.0);
    if total <= 0.0 {
        return Vec::new();
    }

    let mut out = Vec::new();
    if let Some(start) = point_at(path, from) {
        out.push(start);
    }
    let (lo, hi) = (from * total, to * total);
    for i in 1..path.len() - 1 {
        if lengths[i] > lo && lengths[i] < hi {
            out.push(path[i]);
        }
    }
    if let Some(end) = point_at(path, to) {
        out.push(end);
    }
    out
}

/// The moving train segment centered on `progress`, covering `half_length`
/// of the path on each side.
pub fn segment_at(path: &[Position], progress: f64, half_length: f64) -> Vec<Position> {
    segment_between(path, progress - half_length, progress + half_length)
}

/// Dash offset driver for the marching-dash kind: one full pattern period per
/// cycle. Kept non-negative for the dash expander, counting down from the
/// period so dashes march forward along the path.
pub fn dash_offset(progress: f64, pattern_period: f64) -> f64 {
    (pattern_period - progress.rem_euclid(1.0) * pattern_period).rem_euclid(pattern_period)
}
