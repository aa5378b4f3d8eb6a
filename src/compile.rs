//! Lowers a scene at a point in time into a flat list of draw ops.
//!
//! All animation state is a pure function of elapsed time, so compiling the
//! same scene at the same instant always yields the same ops.

use kurbo::Shape as _;

use crate::{
    anim::animation_state,
    assets::{AssetKey, AssetStore, PreparedAsset},
    core::{Affine, BezPath, Canvas, Point, Rgba8, VisualState, anchored_affine},
    error::ScrimResult,
    model::{AnimKind, Element, ElementKind, TrainStyle},
    path_anim,
    resolve,
    scene::Scene,
};

/// Reference design width: stored element sizes are native pixels at this
/// width and scale linearly with the output canvas.
pub const DESIGN_WIDTH: f64 = 1920.0;

const STROKE_TOLERANCE: f64 = 0.1;
const POLYGON_FILL_ALPHA: f32 = 0.2;
const TRACK_ALPHA: f32 = 0.25;
const DASH_ON: f64 = 14.0;
const DASH_OFF: f64 = 10.0;

#[derive(Clone, Debug)]
pub enum DrawOp {
    FillPath {
        path: BezPath,
        transform: Affine,
        color: Rgba8,
        opacity: f32,
        z: i32,
    },
    Image {
        asset: AssetKey,
        transform: Affine,
        opacity: f32,
        z: i32,
    },
    Svg {
        asset: AssetKey,
        transform: Affine,
        opacity: f32,
        z: i32,
    },
}

/// Supplies per-element elapsed animation time. `None` means the element's
/// slot is not running and the element renders at rest.
pub trait ElapsedSource {
    fn elapsed_ms(&self, element: &Element) -> Option<f64>;
}

/// One shared clock for every enabled slot; the offline render path.
#[derive(Clone, Copy, Debug)]
pub struct UniformClock(pub f64);

impl ElapsedSource for UniformClock {
    fn elapsed_ms(&self, element: &Element) -> Option<f64> {
        element.slot.enabled.then_some(self.0)
    }
}

/// Percent-coordinate scene space to output pixel space.
#[derive(Clone, Copy, Debug)]
pub struct CanvasMap {
    pub canvas: Canvas,
}

impl CanvasMap {
    pub fn new(canvas: Canvas) -> Self {
        Self { canvas }
    }

    pub fn to_px(&self, pos: crate::core::Position) -> Point {
        Point::new(
            pos.x / 100.0 * f64::from(self.canvas.width),
            pos.y / 100.0 * f64::from(self.canvas.height),
        )
    }

    /// Scale for native-pixel sizes (stroke widths, rect dimensions, radii).
    pub fn native_scale(&self) -> f64 {
        f64::from(self.canvas.width) / DESIGN_WIDTH
    }
}

pub fn compile_scene(
    scene: &Scene,
    canvas: Canvas,
    assets: &AssetStore,
    clock: &dyn ElapsedSource,
) -> ScrimResult<Vec<DrawOp>> {
    let map = CanvasMap::new(canvas);
    let mut ops = Vec::new();

    if scene.background.is_some() && assets.contains(AssetKey::Background) {
        push_cover_op(&mut ops, AssetKey::Background, map, assets)?;
    }

    for idx in scene.render_order() {
        let el = &scene.elements[idx];
        compile_element(&mut ops, el, scene, map, assets, clock)?;
    }

    Ok(ops)
}

/// Background scaled to cover the full canvas.
fn push_cover_op(
    ops: &mut Vec<DrawOp>,
    key: AssetKey,
    map: CanvasMap,
    assets: &AssetStore,
) -> ScrimResult<()> {
    let (w, h) = asset_size(assets.get(key)?);
    let transform = Affine::scale_non_uniform(
        f64::from(map.canvas.width) / w,
        f64::from(map.canvas.height) / h,
    );
    ops.push(match assets.get(key)? {
        PreparedAsset::Image(_) => DrawOp::Image {
            asset: key,
            transform,
            opacity: 1.0,
            z: i32::MIN,
        },
        PreparedAsset::Svg(_) => DrawOp::Svg {
            asset: key,
            transform,
            opacity: 1.0,
            z: i32::MIN,
        },
    });
    Ok(())
}

fn asset_size(asset: &PreparedAsset) -> (f64, f64) {
    match asset {
        PreparedAsset::Image(img) => (f64::from(img.width), f64::from(img.height)),
        PreparedAsset::Svg(svg) => {
            let size = svg.tree.size();
            (f64::from(size.width()), f64::from(size.height()))
        }
    }
}

fn compile_element(
    ops: &mut Vec<DrawOp>,
    el: &Element,
    scene: &Scene,
    map: CanvasMap,
    assets: &AssetStore,
    clock: &dyn ElapsedSource,
) -> ScrimResult<()> {
    let elapsed = clock.elapsed_ms(el);
    let state = element_state(el, elapsed);
    if state.opacity <= 0.0 {
        return Ok(());
    }

    let s = map.native_scale();
    match &el.kind {
        ElementKind::Rect(rect) => {
            let origin = map.to_px(rect.position);
            let (w, h) = (rect.width * s, rect.height * s);
            let outline = kurbo::Rect::new(origin.x, origin.y, origin.x + w, origin.y + h)
                .to_path(STROKE_TOLERANCE);
            let center = Point::new(origin.x + w / 2.0, origin.y + h / 2.0);
            let transform = anchored_affine(center, &state, el.rotation_deg);
            push_stroked(
                ops,
                &outline,
                round_stroke(rect.border_width * s),
                transform,
                el.color,
                state.opacity as f32,
                el.z,
            );
        }
        ElementKind::Point(point) => {
            let center = map.to_px(point.position);
            let path = kurbo::Circle::new(center, point.radius * s).to_path(STROKE_TOLERANCE);
            let transform = anchored_affine(center, &state, el.rotation_deg);
            ops.push(DrawOp::FillPath {
                path,
                transform,
                color: el.color,
                opacity: state.opacity as f32,
                z: el.z,
            });
        }
        ElementKind::Line(line) => {
            // An unresolved endpoint leaves nothing sensible to draw.
            let Ok(start) = resolve::resolve_endpoint(&line.start, &scene.elements) else {
                return Ok(());
            };
            let Ok(end) = resolve::resolve_endpoint(&line.end, &scene.elements) else {
                return Ok(());
            };
            let percent_path = vec![start, end];
            compile_polyline_element(ops, el, &percent_path, false, false, line.width, map, elapsed, &state);
        }
        ElementKind::Polygon(poly) => {
            if poly.vertices.len() < 2 {
                return Ok(());
            }
            compile_polyline_element(
                ops,
                el,
                &poly.vertices,
                poly.closed,
                poly.fill,
                poly.stroke_width,
                map,
                elapsed,
                &state,
            );
        }
        ElementKind::Image(img) => {
            let key = AssetKey::Element(el.id);
            // Prepared assets are best-effort; an undecodable image just
            // drops out of the frame.
            if !assets.contains(key) {
                return Ok(());
            }
            let (asset_w, asset_h) = asset_size(assets.get(key)?);
            let origin = map.to_px(img.position);
            let (w, h) = (img.width * s, img.height * s);
            let center = Point::new(origin.x + w / 2.0, origin.y + h / 2.0);
            let transform = anchored_affine(center, &state, el.rotation_deg)
                * Affine::translate((origin.x, origin.y))
                * Affine::scale_non_uniform(w / asset_w, h / asset_h);
            ops.push(match assets.get(key)? {
                PreparedAsset::Image(_) => DrawOp::Image {
                    asset: key,
                    transform,
                    opacity: state.opacity as f32,
                    z: el.z,
                },
                PreparedAsset::Svg(_) => DrawOp::Svg {
                    asset: key,
                    transform,
                    opacity: state.opacity as f32,
                    z: el.z,
                },
            });
        }
        ElementKind::Drawing(drawing) => {
            if drawing.path.len() < 2 {
                return Ok(());
            }
            let px: Vec<Point> = drawing
                .path
                .iter()
                .map(|p| {
                    map.to_px(crate::core::Position::new(
                        drawing.position.x + p.x,
                        drawing.position.y + p.y,
                    ))
                })
                .collect();
            let path = if drawing.straight || drawing.smoothing <= 0.0 {
                polyline_path(&px, false)
            } else {
                catmull_rom_path(&px, drawing.smoothing)
            };
            let bbox = path.bounding_box();
            let transform = anchored_affine(bbox.center(), &state, el.rotation_deg);
            push_stroked(
                ops,
                &path,
                round_stroke(drawing.stroke_width * s),
                transform,
                el.color,
                state.opacity as f32,
                el.z,
            );
        }
    }
    Ok(())
}

/// Transform-family animation state at the element's elapsed time. Path
/// kinds keep the element at rest here; their motion lives in the emitted
/// geometry instead.
fn element_state(el: &Element, elapsed: Option<f64>) -> VisualState {
    let Some(elapsed) = elapsed else {
        return VisualState::identity(el.opacity);
    };
    if el.slot.kind.is_path() {
        return VisualState::identity(el.opacity);
    }
    let duration = el.slot.duration_ms();
    if duration <= 0.0 {
        return VisualState::identity(el.opacity);
    }
    let progress = if !el.slot.looping && elapsed >= duration {
        1.0
    } else {
        (elapsed.rem_euclid(duration)) / duration
    };
    animation_state(el.slot.kind, progress, el.opacity)
}

/// Shared lowering for line and polygon geometry, including the path-riding
/// animation kinds.
#[allow(clippy::too_many_arguments)]
fn compile_polyline_element(
    ops: &mut Vec<DrawOp>,
    el: &Element,
    percent_path: &[crate::core::Position],
    closed: bool,
    fill: bool,
    stroke_width: f64,
    map: CanvasMap,
    elapsed: Option<f64>,
    state: &VisualState,
) {
    let s = map.native_scale();
    let px: Vec<Point> = percent_path.iter().map(|p| map.to_px(*p)).collect();
    let base = polyline_path(&px, closed);
    let bbox = base.bounding_box();
    let transform = anchored_affine(bbox.center(), state, el.rotation_deg);
    let opacity = state.opacity as f32;

    if fill && closed {
        ops.push(DrawOp::FillPath {
            path: base.clone(),
            transform,
            color: el.color,
            opacity: opacity * POLYGON_FILL_ALPHA,
            z: el.z,
        });
    }

    let running_path_anim = el.slot.kind.is_path() && elapsed.is_some();
    if !running_path_anim {
        push_stroked(ops, &base, round_stroke(stroke_width * s), transform, el.color, opacity, el.z);
        return;
    }

    let elapsed = elapsed.unwrap_or(0.0);
    let progress = path_anim::path_progress(
        el.slot.kind,
        elapsed,
        el.slot.duration_ms(),
        el.slot.looping,
    );

    match el.slot.kind {
        AnimKind::Dash => {
            let dashes = [DASH_ON * s, DASH_OFF * s];
            let period = dashes[0] + dashes[1];
            let stroke = round_stroke(stroke_width * s)
                .with_dashes(path_anim::dash_offset(progress, period), dashes);
            push_stroked(ops, &base, stroke, transform, el.color, opacity, el.z);
        }
        AnimKind::Train | AnimKind::TrainLoop => {
            // Dimmed full track under the moving segment.
            push_stroked(
                ops,
                &base,
                round_stroke(stroke_width * s),
                transform,
                el.color,
                opacity * TRACK_ALPHA,
                el.z,
            );
            push_train(
                ops,
                el,
                percent_path,
                closed,
                progress,
                stroke_width * s,
                map,
                transform,
                opacity,
            );
        }
        _ => {
            push_stroked(ops, &base, round_stroke(stroke_width * s), transform, el.color, opacity, el.z);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn push_train(
    ops: &mut Vec<DrawOp>,
    el: &Element,
    percent_path: &[crate::core::Position],
    closed: bool,
    progress: f64,
    stroke_px: f64,
    map: CanvasMap,
    transform: Affine,
    opacity: f32,
) {
    let train: &TrainStyle = &el.slot.train;
    let color = train.color.unwrap_or(el.color);
    let s = map.native_scale();

    // The percent-space path re-used for arc-length sampling. The closing
    // vertex is appended so the head can traverse the final edge.
    let mut sample_path = percent_path.to_vec();
    if closed && sample_path.first() != sample_path.last() {
        if let Some(first) = sample_path.first().copied() {
            sample_path.push(first);
        }
    }

    let half = (train.length_frac / 2.0).max(0.005);
    let head = path_anim::segment_at(&sample_path, progress, half);
    if head.len() >= 2 {
        let head_px: Vec<Point> = head.iter().map(|p| map.to_px(*p)).collect();
        let head_path = polyline_path(&head_px, false);

        // Glow halo first so the core draws over it.
        if train.glow_intensity > 0.0 {
            push_stroked(
                ops,
                &head_path,
                round_stroke(stroke_px + train.glow_size * s),
                transform,
                color,
                opacity * (train.glow_intensity as f32 * 0.5).min(1.0),
                el.z,
            );
        }
        push_stroked(ops, &head_path, round_stroke(stroke_px), transform, color, opacity, el.z);
    }

    if train.fade_trail {
        let mut alpha = opacity;
        for i in 1..=3u32 {
            alpha *= 0.5;
            let from = progress - half * (2 * i + 1) as f64;
            let to = progress - half * (2 * i - 1) as f64;
            let slice = path_anim::segment_between(&sample_path, from, to);
            if slice.len() < 2 {
                continue;
            }
            let slice_px: Vec<Point> = slice.iter().map(|p| map.to_px(*p)).collect();
            push_stroked(
                ops,
                &polyline_path(&slice_px, false),
                round_stroke(stroke_px),
                transform,
                color,
                alpha,
                el.z,
            );
        }
    }
}

fn round_stroke(width: f64) -> kurbo::Stroke {
    kurbo::Stroke::new(width.max(0.1))
        .with_caps(kurbo::Cap::Round)
        .with_join(kurbo::Join::Round)
}

/// Expands a stroke to a fill region. The rasterizer only fills paths, so
/// outlines go through kurbo's stroke expansion.
fn push_stroked(
    ops: &mut Vec<DrawOp>,
    path: &BezPath,
    stroke: kurbo::Stroke,
    transform: Affine,
    color: Rgba8,
    opacity: f32,
    z: i32,
) {
    if opacity <= 0.0 {
        return;
    }
    let expanded = kurbo::stroke(
        path.elements().iter().copied(),
        &stroke,
        &kurbo::StrokeOpts::default(),
        STROKE_TOLERANCE,
    );
    ops.push(DrawOp::FillPath {
        path: expanded,
        transform,
        color,
        opacity,
        z,
    });
}

fn polyline_path(points: &[Point], closed: bool) -> BezPath {
    let mut path = BezPath::new();
    let Some(first) = points.first() else {
        return path;
    };
    path.move_to(*first);
    for p in &points[1..] {
        path.line_to(*p);
    }
    if closed {
        path.close_path();
    }
    path
}

/// Catmull-Rom spline through the sampled points, with the tangent scale
/// driven by the drawing's smoothing factor.
fn catmull_rom_path(points: &[Point], smoothing: f64) -> BezPath {
    if points.len() < 3 {
        return polyline_path(points, false);
    }
    let k = smoothing.clamp(0.0, 1.0) / 6.0;
    let mut path = BezPath::new();
    path.move_to(points[0]);
    for i in 0..points.len() - 1 {
        let p0 = points[i.saturating_sub(1)];
        let p1 = points[i];
        let p2 = points[i + 1];
        let p3 = points[(i + 2).min(points.len() - 1)];
        let c1 = Point::new(p1.x + (p2.x - p0.x) * k, p1.y + (p2.y - p0.y) * k);
        let c2 = Point::new(p2.x - (p3.x - p1.x) * k, p2.y - (p3.y - p1.y) * k);
        path.curve_to(c1, c2, p2);
    }
    path
}
