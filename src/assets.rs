use std::{collections::HashMap, sync::Arc};

use crate::{
    core::{Affine, Rgba8},
    error::{ScrimError, ScrimResult},
    model::{ElementId, ElementKind, ImageContent},
    scene::Scene,
};

/// Stable handle for a prepared raster/vector source. Element images are
/// keyed by their owning element, so per-element `currentColor` substitution
/// never aliases across elements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssetKey {
    Background,
    Element(ElementId),
}

#[derive(Clone)]
pub struct PreparedImage {
    pub width: u32,
    pub height: u32,
    pub rgba8_premul: Arc<Vec<u8>>,
}

#[derive(Clone)]
pub struct PreparedSvg {
    pub tree: Arc<usvg::Tree>,
}

#[derive(Clone)]
pub enum PreparedAsset {
    Image(PreparedImage),
    Svg(PreparedSvg),
}

/// Decoded assets for one scene. Preparation happens once up front so the
/// per-frame path never touches a codec.
#[derive(Default)]
pub struct AssetStore {
    assets: HashMap<AssetKey, PreparedAsset>,
}

impl AssetStore {
    /// Decodes the background plus every image element. Elements whose bytes
    /// fail to decode are skipped with a warning rather than failing the
    /// whole scene; a background that fails to decode is an error.
    pub fn prepare(scene: &Scene) -> ScrimResult<Self> {
        let mut assets = HashMap::new();
        if let Some(bg) = &scene.background {
            assets.insert(AssetKey::Background, prepare_content(&bg.content, None)?);
        }

        for el in &scene.elements {
            let ElementKind::Image(img) = &el.kind else {
                continue;
            };
            match prepare_content(&img.content, Some(el.color)) {
                Ok(prepared) => {
                    assets.insert(AssetKey::Element(el.id), prepared);
                }
                Err(err) => {
                    tracing::warn!(element = %el.name, %err, "skipping undecodable image element");
                }
            }
        }

        Ok(Self { assets })
    }

    pub fn get(&self, key: AssetKey) -> ScrimResult<&PreparedAsset> {
        self.assets
            .get(&key)
            .ok_or_else(|| ScrimError::evaluation(format!("asset {key:?} was not prepared")))
    }

    pub fn contains(&self, key: AssetKey) -> bool {
        self.assets.contains_key(&key)
    }
}

fn prepare_content(content: &ImageContent, color: Option<Rgba8>) -> ScrimResult<PreparedAsset> {
    match content {
        ImageContent::Raster(bytes) => Ok(PreparedAsset::Image(decode_image(bytes)?)),
        ImageContent::Vector(markup) => Ok(PreparedAsset::Svg(parse_svg(markup, color)?)),
    }
}

pub fn decode_image(bytes: &[u8]) -> ScrimResult<PreparedImage> {
    let dyn_img = image::load_from_memory(bytes)
        .map_err(|e| ScrimError::decode(format!("decode image from memory: {e}")))?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(PreparedImage {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
    })
}

/// Parses SVG markup. When `color` is given, `currentColor` references take
/// that element's color, so single-tone icon packs inherit the overlay color.
pub fn parse_svg(markup: &str, color: Option<Rgba8>) -> ScrimResult<PreparedSvg> {
    let data;
    let markup = match color {
        Some(c) if markup.contains("currentColor") => {
            data = markup.replace("currentColor", &c.to_hex());
            data.as_str()
        }
        _ => markup,
    };

    let opts = usvg::Options::default();
    let tree = usvg::Tree::from_data(markup.as_bytes(), &opts)
        .map_err(|e| ScrimError::decode(format!("parse svg tree: {e}")))?;
    Ok(PreparedSvg {
        tree: Arc::new(tree),
    })
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

/// Compute a conservative raster size for an SVG given the draw transform.
///
/// The returned `(width, height, transform_adjust)` are used as:
///
/// - rasterize the SVG into a pixmap of `(width, height)`
/// - draw the resulting image with `transform_adjust` (not the original transform)
///
/// This avoids blurry upscaling when the SVG is scaled up on the canvas.
pub fn svg_raster_params(tree: &usvg::Tree, transform: Affine) -> ScrimResult<(u32, u32, Affine)> {
    fn to_px(v: f32) -> ScrimResult<u32> {
        if !v.is_finite() || v <= 0.0 {
            return Err(ScrimError::evaluation("svg has invalid width/height"));
        }
        Ok((v.ceil() as u32).max(1))
    }

    let size = tree.size();
    let base_w = to_px(size.width())?;
    let base_h = to_px(size.height())?;

    let [a, b, c, d, _e, _f] = transform.as_coeffs();
    let sx = (a * a + b * b).sqrt().max(1e-6);
    let sy = (c * c + d * d).sqrt().max(1e-6);

    let w = ((base_w as f64) * sx).ceil().max(1.0) as u32;
    let h = ((base_h as f64) * sy).ceil().max(1.0) as u32;

    // Avoid pathological allocations for malformed or absurdly scaled SVGs.
    const MAX_DIM: u32 = 16_384;
    if w > MAX_DIM || h > MAX_DIM {
        return Err(ScrimError::evaluation(format!(
            "svg raster size too large: {w}x{h} (max {MAX_DIM}x{MAX_DIM})"
        )));
    }

    // The SVG is rasterized pre-scaled. Adjust the draw transform so that
    // pixel-space coordinates map back into the SVG's logical coordinate
    // space before the original transform.
    let inv = Affine::scale_non_uniform(1.0 / sx, 1.0 / sy);
    let transform_adjust = transform * inv;

    Ok((w, h, transform_adjust))
}

pub fn rasterize_svg_to_premul_rgba8(
    tree: &usvg::Tree,
    width: u32,
    height: u32,
) -> ScrimResult<Vec<u8>> {
    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| ScrimError::evaluation("failed to allocate svg pixmap"))?;

    let sx = (width as f32) / tree.size().width();
    let sy = (height as f32) / tree.size().height();
    let xform = resvg::tiny_skia::Transform::from_scale(sx, sy);

    resvg::render(tree, xform, &mut pixmap.as_mut());
    Ok(pixmap.data().to_vec())
}
