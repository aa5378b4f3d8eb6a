//! Offline frame production.
//!
//! The recording clock is synthesized from the frame index rather than read
//! from wall time, so a recording of a given scene is reproducible regardless
//! of how fast frames actually render.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::{
    assets::AssetStore,
    compile::{self, UniformClock},
    core::{Canvas, Fps, FrameIndex, even_up},
    encode::FrameSink,
    error::ScrimResult,
    model::DurationPolicy,
    render_cpu::{CpuRenderer, FrameRGBA},
    scene::Scene,
};

/// Frames composite over opaque white when no background image is set.
pub const CLEAR_RGBA: [u8; 4] = [255, 255, 255, 255];

/// Fallback cycle length when no slot is enabled, ms.
const DEFAULT_CYCLE_MS: f64 = 2_000.0;

/// Cooperative cancellation handle, shared with whatever UI or signal
/// handler wants to stop a recording mid-flight.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordStats {
    pub frames: u64,
    pub canvas: Canvas,
    pub cancelled: bool,
}

/// Output dimensions for a scene: the quality preset's fixed pair, or for
/// `Native` the background's size, or 1920x1080 without a background. Both
/// dimensions are rounded up to even for yuv420p encoders.
pub fn output_canvas(scene: &Scene) -> Canvas {
    match scene.recording.preset.dimensions() {
        Some((w, h)) => Canvas::new(even_up(w).max(2), even_up(h).max(2)),
        None => match scene.background.as_ref() {
            Some(b) => Canvas::new(even_up(b.width).max(2), even_up(b.height).max(2)),
            None => Canvas::new(1920, 1080),
        },
    }
}

/// Recording length in milliseconds: one full cycle of the active element's
/// slot, or the explicit override. Without a selection the longest enabled
/// slot sets the length.
pub fn duration_ms(scene: &Scene) -> f64 {
    match scene.recording.duration {
        DurationPolicy::Custom(secs) => secs * 1000.0,
        DurationPolicy::OneCycle => scene
            .active_element()
            .map(|el| el.slot.duration_ms())
            .or_else(|| {
                scene
                    .elements
                    .iter()
                    .filter(|el| el.slot.enabled)
                    .map(|el| el.slot.duration_ms())
                    .reduce(f64::max)
            })
            .unwrap_or(DEFAULT_CYCLE_MS),
    }
}

pub fn total_frames(scene: &Scene) -> u64 {
    let fps = f64::from(scene.recording.fps);
    ((duration_ms(scene) / 1000.0 * fps).ceil() as u64).max(1)
}

/// Renders the full recording into `sink`. The sink is always finished, even
/// on cancellation, so partial outputs stay playable.
#[tracing::instrument(skip_all, fields(frames = total_frames(scene)))]
pub fn record(
    scene: &Scene,
    sink: &mut dyn FrameSink,
    cancel: &CancelFlag,
) -> ScrimResult<RecordStats> {
    scene.validate()?;
    scene.recording.validate()?;

    let canvas = output_canvas(scene);
    let fps = Fps::whole(scene.recording.fps)?;
    let frames = total_frames(scene);

    let assets = AssetStore::prepare(scene)?;
    let mut renderer = CpuRenderer::new(canvas, CLEAR_RGBA)?;

    let mut emitted = 0u64;
    let mut cancelled = false;
    for index in 0..frames {
        if cancel.is_cancelled() {
            cancelled = true;
            break;
        }
        let elapsed = fps.frame_elapsed_ms(FrameIndex(index));
        let ops = compile::compile_scene(scene, canvas, &assets, &UniformClock(elapsed))?;
        let frame = renderer.render(&ops, &assets)?;
        sink.push(&frame)?;
        emitted += 1;
    }

    sink.finish()?;
    tracing::info!(emitted, cancelled, "recording complete");

    Ok(RecordStats {
        frames: emitted,
        canvas,
        cancelled,
    })
}

/// Renders one deterministic still at `at_ms` into the recording's output
/// dimensions.
pub fn render_still(scene: &Scene, at_ms: f64) -> ScrimResult<FrameRGBA> {
    scene.validate()?;

    let canvas = output_canvas(scene);
    let assets = AssetStore::prepare(scene)?;
    let ops = compile::compile_scene(scene, canvas, &assets, &UniformClock(at_ms))?;
    let mut renderer = CpuRenderer::new(canvas, CLEAR_RGBA)?;
    renderer.render(&ops, &assets)
}
