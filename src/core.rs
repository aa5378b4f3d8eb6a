use crate::error::{ScrimError, ScrimResult};

pub use kurbo::{Affine, BezPath, Point, Rect, Vec2};

/// A position in percent-of-container units. The canvas maps 0..100 on both
/// axes regardless of its pixel aspect; sizes elsewhere stay in native pixels.
#[derive(Clone, Copy, Debug, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn lerp(a: Self, b: Self, t: f64) -> Self {
        Self {
            x: a.x + (b.x - a.x) * t,
            y: a.y + (b.y - a.y) * t,
        }
    }

    pub fn midpoint(a: Self, b: Self) -> Self {
        Self::lerp(a, b, 0.5)
    }

    pub fn clamped(self) -> Self {
        Self {
            x: self.x.clamp(0.0, 100.0),
            y: self.y.clamp(0.0, 100.0),
        }
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    pub num: u32,
    pub den: u32, // must be > 0
}

impl Fps {
    pub fn new(num: u32, den: u32) -> ScrimResult<Self> {
        if den == 0 {
            return Err(ScrimError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(ScrimError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    pub fn whole(fps: u32) -> ScrimResult<Self> {
        Self::new(fps, 1)
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    pub fn frame_duration_ms(self) -> f64 {
        1000.0 * f64::from(self.den) / f64::from(self.num)
    }

    pub fn frame_elapsed_ms(self, frame: FrameIndex) -> f64 {
        (frame.0 as f64) * self.frame_duration_ms()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Round up to the next even integer. Common video codecs (yuv420p) require
/// even frame dimensions.
pub fn even_up(n: u32) -> u32 {
    n + (n & 1)
}

/// Straight-alpha RGBA8 color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const WHITE: Self = Self {
        r: 255,
        g: 255,
        b: 255,
        a: 255,
    };

    pub fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse `#rrggbb` or `#rrggbbaa`.
    pub fn from_hex(s: &str) -> ScrimResult<Self> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if !hex.is_ascii() {
            return Err(ScrimError::validation(format!("invalid hex color '{s}'")));
        }
        let byte = |i: usize| -> ScrimResult<u8> {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| ScrimError::validation(format!("invalid hex color '{s}'")))
        };
        match hex.len() {
            6 => Ok(Self {
                r: byte(0)?,
                g: byte(2)?,
                b: byte(4)?,
                a: 255,
            }),
            8 => Ok(Self {
                r: byte(0)?,
                g: byte(2)?,
                b: byte(4)?,
                a: byte(6)?,
            }),
            _ => Err(ScrimError::validation(format!("invalid hex color '{s}'"))),
        }
    }

    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }

    pub fn with_opacity(self, opacity: f64) -> Self {
        let a = (f64::from(self.a) * opacity.clamp(0.0, 1.0)).round() as u8;
        Self { a, ..self }
    }
}

/// The transform descriptor produced by the animation state function.
///
/// Both the interactive preview and the offline compositor consume this type;
/// it carries no clock state of its own.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VisualState {
    pub scale: f64,
    pub translate: Vec2,
    pub rotation_deg: f64,
    pub opacity: f64,
}

impl VisualState {
    pub fn identity(base_opacity: f64) -> Self {
        Self {
            scale: 1.0,
            translate: Vec2::ZERO,
            rotation_deg: 0.0,
            opacity: base_opacity,
        }
    }
}

/// Compose the canonical element transform: translate, then scale and rotate
/// pivoted around `center` (pixel space).
pub fn anchored_affine(center: Point, state: &VisualState, extra_rotation_deg: f64) -> Affine {
    let anchor = Vec2::new(center.x, center.y);
    Affine::translate(state.translate)
        * Affine::translate(anchor)
        * Affine::rotate((state.rotation_deg + extra_rotation_deg).to_radians())
        * Affine::scale(state.scale)
        * Affine::translate(-anchor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_up_rounds_within_one_pixel() {
        assert_eq!(even_up(1919), 1920);
        assert_eq!(even_up(1920), 1920);
        assert_eq!(even_up(1), 2);
        assert_eq!(even_up(0), 0);
    }

    #[test]
    fn hex_roundtrip() {
        let c = Rgba8::from_hex("#3b82f6").unwrap();
        assert_eq!(c, Rgba8::opaque(0x3b, 0x82, 0xf6));
        assert_eq!(c.to_hex(), "#3b82f6");

        let c = Rgba8::from_hex("10203040").unwrap();
        assert_eq!(c.a, 0x40);
        assert!(Rgba8::from_hex("#xyz").is_err());
    }

    #[test]
    fn fps_frame_elapsed_is_index_scaled() {
        let fps = Fps::whole(30).unwrap();
        assert!((fps.frame_elapsed_ms(FrameIndex(30)) - 1000.0).abs() < 1e-9);
        assert!(Fps::new(30, 0).is_err());
    }

    #[test]
    fn anchored_affine_identity_is_identity() {
        let a = anchored_affine(
            Point::new(50.0, 50.0),
            &VisualState::identity(1.0),
            0.0,
        );
        let p = a * Point::new(12.0, 34.0);
        assert!((p.x - 12.0).abs() < 1e-9);
        assert!((p.y - 34.0).abs() < 1e-9);
    }

    #[test]
    fn anchored_affine_scales_around_center() {
        let state = VisualState {
            scale: 2.0,
            ..VisualState::identity(1.0)
        };
        let a = anchored_affine(Point::new(10.0, 10.0), &state, 0.0);
        let p = a * Point::new(10.0, 10.0);
        assert!((p.x - 10.0).abs() < 1e-9);
        assert!((p.y - 10.0).abs() < 1e-9);
        let q = a * Point::new(11.0, 10.0);
        assert!((q.x - 12.0).abs() < 1e-9);
    }
}
