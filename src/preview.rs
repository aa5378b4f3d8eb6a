//! Editor-side preview clocks.
//!
//! Recording drives every enabled slot from one shared frame clock; previews
//! instead run per element, restarting whenever their toggle flips on so a
//! fresh preview always starts at the beginning of the cycle.

use std::collections::HashMap;

use crate::{
    assets::AssetStore,
    compile::{self, DrawOp, ElapsedSource},
    core::Canvas,
    error::ScrimResult,
    model::{Element, ElementId},
    scene::Scene,
};

#[derive(Debug, Default)]
pub struct PreviewClock {
    starts: HashMap<ElementId, f64>,
}

impl PreviewClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips an element's preview flag. Turning it on (re)arms that
    /// element's clock at `now_ms`; turning it off drops the clock.
    pub fn set_preview(&mut self, scene: &mut Scene, id: ElementId, on: bool, now_ms: f64) {
        let Some(el) = scene.element_mut(id) else {
            return;
        };
        el.slot.preview = on;
        if on {
            self.starts.insert(id, now_ms);
        } else {
            self.starts.remove(&id);
        }
    }

    /// Elements removed from the scene leave stale clocks behind; callers
    /// prune after structural edits.
    pub fn retain_scene(&mut self, scene: &Scene) {
        self.starts.retain(|id, _| scene.element(*id).is_some());
    }

    pub fn is_previewing(&self, id: ElementId) -> bool {
        self.starts.contains_key(&id)
    }

    fn sampler(&self, now_ms: f64) -> PreviewSampler<'_> {
        PreviewSampler {
            clock: self,
            now_ms,
        }
    }

    /// Compiles the scene with only previewed elements animating.
    pub fn preview_ops(
        &self,
        scene: &Scene,
        canvas: Canvas,
        assets: &AssetStore,
        now_ms: f64,
    ) -> ScrimResult<Vec<DrawOp>> {
        compile::compile_scene(scene, canvas, assets, &self.sampler(now_ms))
    }
}

struct PreviewSampler<'a> {
    clock: &'a PreviewClock,
    now_ms: f64,
}

impl ElapsedSource for PreviewSampler<'_> {
    fn elapsed_ms(&self, element: &Element) -> Option<f64> {
        if !element.slot.preview {
            return None;
        }
        let start = self.clock.starts.get(&element.id)?;
        Some((self.now_ms - start).max(0.0))
    }
}
