use std::collections::HashMap;

use crate::{
    assets::{
        AssetKey, AssetStore, PreparedAsset, rasterize_svg_to_premul_rgba8, svg_raster_params,
    },
    compile::DrawOp,
    core::{Affine, BezPath, Canvas, Point},
    error::{ScrimError, ScrimResult},
};

/// One rendered frame, straight RGBA or premultiplied per the flag.
#[derive(Clone, Debug)]
pub struct FrameRGBA {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub premultiplied: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct SvgRasterKey {
    asset: AssetKey,
    width: u32,
    height: u32,
}

/// CPU rasterizer over `vello_cpu`. Reused across frames so pixmap uploads
/// for raster and vector assets amortize over a recording.
pub struct CpuRenderer {
    width: u16,
    height: u16,
    clear_rgba: [u8; 4],
    pixmap: vello_cpu::Pixmap,
    image_cache: HashMap<AssetKey, vello_cpu::Image>,
    svg_cache: HashMap<SvgRasterKey, vello_cpu::Image>,
}

impl CpuRenderer {
    pub fn new(canvas: Canvas, clear_rgba: [u8; 4]) -> ScrimResult<Self> {
        let width: u16 = canvas
            .width
            .try_into()
            .map_err(|_| ScrimError::evaluation("canvas width exceeds u16"))?;
        let height: u16 = canvas
            .height
            .try_into()
            .map_err(|_| ScrimError::evaluation("canvas height exceeds u16"))?;
        Ok(Self {
            width,
            height,
            clear_rgba,
            pixmap: vello_cpu::Pixmap::new(width, height),
            image_cache: HashMap::new(),
            svg_cache: HashMap::new(),
        })
    }

    pub fn render(&mut self, ops: &[DrawOp], assets: &AssetStore) -> ScrimResult<FrameRGBA> {
        let premul = {
            let [r, g, b, a] = self.clear_rgba;
            premul_rgba8(r, g, b, a)
        };
        clear_pixmap(&mut self.pixmap, premul);

        let mut ctx = vello_cpu::RenderContext::new(self.width, self.height);
        for op in ops {
            self.draw_op(&mut ctx, op, assets)?;
        }
        ctx.flush();
        ctx.render_to_pixmap(&mut self.pixmap);

        Ok(FrameRGBA {
            width: u32::from(self.width),
            height: u32::from(self.height),
            data: self.pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        })
    }

    fn draw_op(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        op: &DrawOp,
        assets: &AssetStore,
    ) -> ScrimResult<()> {
        ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);

        match op {
            DrawOp::FillPath {
                path,
                transform,
                color,
                opacity,
                z: _,
            } => {
                ctx.set_transform(affine_to_cpu(*transform));
                ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                    color.r, color.g, color.b, color.a,
                ));
                if *opacity < 1.0 {
                    ctx.push_opacity_layer(*opacity);
                }
                let cpu_path = bezpath_to_cpu(path);
                ctx.fill_path(&cpu_path);
                if *opacity < 1.0 {
                    ctx.pop_layer();
                }
                Ok(())
            }
            DrawOp::Image {
                asset,
                transform,
                opacity,
                z: _,
            } => {
                let image_paint = self.image_paint_for(*asset, assets)?;
                let (w, h) = image_paint_size(&image_paint)?;

                ctx.set_transform(affine_to_cpu(*transform));
                ctx.set_paint(image_paint);

                if *opacity < 1.0 {
                    ctx.push_opacity_layer(*opacity);
                }
                ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, w, h));
                if *opacity < 1.0 {
                    ctx.pop_layer();
                }
                Ok(())
            }
            DrawOp::Svg {
                asset,
                transform,
                opacity,
                z: _,
            } => {
                let (svg_paint, w, h, transform_adjust) =
                    self.svg_paint_for(*asset, *transform, assets)?;

                ctx.set_transform(affine_to_cpu(transform_adjust));
                ctx.set_paint(svg_paint);

                if *opacity < 1.0 {
                    ctx.push_opacity_layer(*opacity);
                }
                ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, w, h));
                if *opacity < 1.0 {
                    ctx.pop_layer();
                }
                Ok(())
            }
        }
    }

    fn image_paint_for(
        &mut self,
        key: AssetKey,
        assets: &AssetStore,
    ) -> ScrimResult<vello_cpu::Image> {
        if let Some(paint) = self.image_cache.get(&key) {
            return Ok(paint.clone());
        }

        let PreparedAsset::Image(img) = assets.get(key)? else {
            return Err(ScrimError::evaluation("asset is not a prepared image"));
        };

        let pixmap =
            image_premul_bytes_to_pixmap(img.rgba8_premul.as_slice(), img.width, img.height)?;
        let paint = vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(std::sync::Arc::new(pixmap)),
            sampler: vello_cpu::peniko::ImageSampler::default(),
        };

        self.image_cache.insert(key, paint.clone());
        Ok(paint)
    }

    fn svg_paint_for(
        &mut self,
        key: AssetKey,
        transform: Affine,
        assets: &AssetStore,
    ) -> ScrimResult<(vello_cpu::Image, f64, f64, Affine)> {
        let PreparedAsset::Svg(svg) = assets.get(key)? else {
            return Err(ScrimError::evaluation("asset is not a prepared svg"));
        };

        let (w, h, transform_adjust) = svg_raster_params(&svg.tree, transform)?;
        let raster_key = SvgRasterKey {
            asset: key,
            width: w,
            height: h,
        };
        if let Some(paint) = self.svg_cache.get(&raster_key) {
            return Ok((paint.clone(), w as f64, h as f64, transform_adjust));
        }

        let rgba8_premul = rasterize_svg_to_premul_rgba8(&svg.tree, w, h)?;
        let pixmap = image_premul_bytes_to_pixmap(rgba8_premul.as_slice(), w, h)?;

        let paint = vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(std::sync::Arc::new(pixmap)),
            sampler: vello_cpu::peniko::ImageSampler::default(),
        };

        self.svg_cache.insert(raster_key, paint.clone());
        Ok((paint, w as f64, h as f64, transform_adjust))
    }
}

fn premul_rgba8(r: u8, g: u8, b: u8, a: u8) -> [u8; 4] {
    let af = (a as u16) + 1;
    let premul = |c: u8| -> u8 { (((c as u16) * af) >> 8) as u8 };
    [premul(r), premul(g), premul(b), a]
}

fn clear_pixmap(pixmap: &mut vello_cpu::Pixmap, rgba: [u8; 4]) {
    let data = pixmap.data_as_u8_slice_mut();
    for px in data.chunks_exact_mut(4) {
        px.copy_from_slice(&rgba);
    }
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn point_to_cpu(p: Point) -> vello_cpu::kurbo::Point {
    vello_cpu::kurbo::Point::new(p.x, p.y)
}

fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(point_to_cpu(p)),
            PathEl::LineTo(p) => out.line_to(point_to_cpu(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(point_to_cpu(p1), point_to_cpu(p2)),
            PathEl::CurveTo(p1, p2, p3) => {
                out.curve_to(point_to_cpu(p1), point_to_cpu(p2), point_to_cpu(p3));
            }
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

fn image_premul_bytes_to_pixmap(
    rgba8_premul: &[u8],
    width: u32,
    height: u32,
) -> ScrimResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| ScrimError::evaluation("image width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| ScrimError::evaluation("image height exceeds u16"))?;
    if rgba8_premul.len() != width as usize * height as usize * 4 {
        return Err(ScrimError::evaluation(
            "prepared image byte length mismatch",
        ));
    }

    let mut may_have_opacities = false;
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for px in rgba8_premul.chunks_exact(4) {
        let a = px[3];
        may_have_opacities |= a != 255;
        pixels.push(vello_cpu::peniko::color::PremulRgba8 {
            r: px[0],
            g: px[1],
            b: px[2],
            a,
        });
    }

    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels,
        w,
        h,
        may_have_opacities,
    ))
}

fn image_paint_size(image: &vello_cpu::Image) -> ScrimResult<(f64, f64)> {
    match &image.image {
        vello_cpu::ImageSource::Pixmap(p) => Ok((f64::from(p.width()), f64::from(p.height()))),
        vello_cpu::ImageSource::OpaqueId(_) => Err(ScrimError::evaluation(
            "cpu renderer does not support opaque image ids",
        )),
    }
}
