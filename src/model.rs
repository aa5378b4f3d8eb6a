use crate::{
    core::{Position, Rgba8},
    error::{ScrimError, ScrimResult},
};

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct ElementId(pub u64);

/// Which end of a line a connection reference points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LineEnd {
    Start,
    End,
}

/// An indirect pointer into another element's geometry. Lines use these to
/// stay attached to a point, another line's end, or a polygon vertex.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ConnectionRef {
    pub target: ElementId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertex: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<LineEnd>,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Endpoint {
    Absolute(Position),
    Connected(ConnectionRef),
}

impl Endpoint {
    pub fn absolute(x: f64, y: f64) -> Self {
        Self::Absolute(Position::new(x, y))
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }
}

/// Animation kinds. Transform kinds move/scale/fade the whole element; path
/// kinds travel along line/polygon geometry and leave the element transform
/// at identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AnimKind {
    Pulse,
    Bounce,
    Fade,
    Shake,
    Flash,
    Spin,
    Zoom,
    Float,
    Train,
    TrainLoop,
    Dash,
}

impl AnimKind {
    pub fn is_path(self) -> bool {
        matches!(self, Self::Train | Self::TrainLoop | Self::Dash)
    }
}

/// Styling for path animations (train highlight + marching dash).
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrainStyle {
    /// Fraction of total path length covered by the moving segment.
    pub length_frac: f64,
    pub glow_intensity: f64,
    pub glow_size: f64,
    /// None inherits the element color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgba8>,
    pub fade_trail: bool,
}

impl Default for TrainStyle {
    fn default() -> Self {
        Self {
            length_frac: 0.2,
            glow_intensity: 0.6,
            glow_size: 8.0,
            color: None,
            fade_trail: false,
        }
    }
}

/// The per-element animation bundle. Each element has exactly one slot.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnimationSlot {
    pub kind: AnimKind,
    pub duration_secs: f64, // > 0
    /// Include in export.
    pub enabled: bool,
    /// Animate in the live canvas.
    pub preview: bool,
    pub looping: bool,
    pub train: TrainStyle,
}

impl Default for AnimationSlot {
    fn default() -> Self {
        Self {
            kind: AnimKind::Pulse,
            duration_secs: 2.0,
            enabled: true,
            preview: false,
            looping: true,
            train: TrainStyle::default(),
        }
    }
}

impl AnimationSlot {
    pub fn duration_ms(&self) -> f64 {
        self.duration_secs * 1000.0
    }

    pub fn validate(&self) -> ScrimResult<()> {
        if !(self.duration_secs > 0.0) {
            return Err(ScrimError::validation("animation duration must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.train.length_frac) {
            return Err(ScrimError::validation(
                "train length fraction must be in 0..=1",
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RectOverlay {
    pub position: Position, // top-left, percent units
    pub width: f64,         // native px
    pub height: f64,        // native px
    pub label: String,
    pub border_width: f64,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PointOverlay {
    pub position: Position,
    pub radius: f64, // native px
    pub label: String,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LineOverlay {
    pub start: Endpoint,
    pub end: Endpoint,
    pub width: f64, // stroke width, native px
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PolygonOverlay {
    pub vertices: Vec<Position>,
    pub closed: bool,
    pub fill: bool,
    pub stroke_width: f64,
}

impl PolygonOverlay {
    /// Structural invariant: closed requires >= 3 vertices; fill requires closed.
    pub fn validate(&self) -> ScrimResult<()> {
        if self.closed && self.vertices.len() < 3 {
            return Err(ScrimError::validation(
                "closed polygon requires at least 3 vertices",
            ));
        }
        if self.fill && !self.closed {
            return Err(ScrimError::validation("filled polygon must be closed"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ImageContent {
    /// Encoded raster bytes (png/jpeg/...).
    Raster(#[serde(with = "serde_bytes_b64")] Vec<u8>),
    /// SVG markup. `currentColor` placeholders are recolored to the
    /// element's configured color at decode time.
    Vector(String),
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ImageComponent {
    pub position: Position, // top-left, percent units
    pub width: f64,         // native px
    pub height: f64,        // native px
    pub content: ImageContent,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DrawingComponent {
    pub position: Position, // bounding-box top-left, percent units
    pub width: f64,         // bounding box extent, percent units
    pub height: f64,
    /// Path in box-local percent coordinates (0..width, 0..height).
    pub path: Vec<Position>,
    pub straight: bool,
    pub smoothing: f64, // 0..1 Catmull-Rom tension for freehand paths
    pub stroke_width: f64,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ElementKind {
    Rect(RectOverlay),
    Point(PointOverlay),
    Line(LineOverlay),
    Polygon(PolygonOverlay),
    Image(ImageComponent),
    Drawing(DrawingComponent),
}

impl ElementKind {
    pub fn family_name(&self) -> &'static str {
        match self {
            Self::Rect(_) => "Rectangle",
            Self::Point(_) => "Point",
            Self::Line(_) => "Line",
            Self::Polygon(_) => "Polygon",
            Self::Image(_) => "Image",
            Self::Drawing(_) => "Drawing",
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Element {
    pub id: ElementId,
    pub name: String,
    pub z: i32,
    pub color: Rgba8,
    pub opacity: f64, // 0..1
    pub rotation_deg: f64,
    pub slot: AnimationSlot,
    pub kind: ElementKind,
}

impl Element {
    pub fn validate(&self) -> ScrimResult<()> {
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(ScrimError::validation(format!(
                "element '{}' opacity must be in 0..=1",
                self.name
            )));
        }
        self.slot.validate()?;
        if let ElementKind::Polygon(poly) = &self.kind {
            poly.validate()?;
        }
        if self.slot.kind.is_path()
            && !matches!(self.kind, ElementKind::Line(_) | ElementKind::Polygon(_))
        {
            return Err(ScrimError::validation(format!(
                "element '{}' uses a path animation on non-path geometry",
                self.name
            )));
        }
        Ok(())
    }
}

/// One of five fixed output sizes, or the background image's own size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum QualityPreset {
    Sd480,
    Hd720,
    Hd1080,
    Qhd1440,
    Uhd2160,
    Native,
}

impl QualityPreset {
    pub fn dimensions(self) -> Option<(u32, u32)> {
        match self {
            Self::Sd480 => Some((854, 480)),
            Self::Hd720 => Some((1280, 720)),
            Self::Hd1080 => Some((1920, 1080)),
            Self::Qhd1440 => Some((2560, 1440)),
            Self::Uhd2160 => Some((3840, 2160)),
            Self::Native => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum VideoFormat {
    /// H.264 in MP4: lossy, maximally compatible.
    Mp4H264,
    /// VP9 in WebM: open, royalty-free.
    WebmVp9,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum DurationPolicy {
    /// One cycle of the active element's animation.
    OneCycle,
    /// Explicit duration in seconds, clamped to 0.5..=30.
    Custom(f64),
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RecordingConfig {
    pub preset: QualityPreset,
    pub bitrate_mbps: f64,
    pub fps: u32, // 15..=60
    pub format: VideoFormat,
    pub duration: DurationPolicy,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            preset: QualityPreset::Native,
            bitrate_mbps: 8.0,
            fps: 30,
            format: VideoFormat::Mp4H264,
            duration: DurationPolicy::OneCycle,
        }
    }
}

impl RecordingConfig {
    pub fn validate(&self) -> ScrimResult<()> {
        if !(15..=60).contains(&self.fps) {
            return Err(ScrimError::validation("recording fps must be in 15..=60"));
        }
        if !(self.bitrate_mbps > 0.0) {
            return Err(ScrimError::validation("recording bitrate must be > 0"));
        }
        if let DurationPolicy::Custom(secs) = self.duration
            && !(0.5..=30.0).contains(&secs)
        {
            return Err(ScrimError::validation(
                "custom recording duration must be in 0.5..=30 seconds",
            ));
        }
        Ok(())
    }
}

/// Raster bytes serialized as base64 so scenes stay valid JSON.
mod serde_bytes_b64 {
    use serde::{Deserialize as _, Deserializer, Serializer};

    const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

    pub fn encode(bytes: &[u8]) -> String {
        let mut out = String::with_capacity(bytes.len().div_ceil(3) * 4);
        for chunk in bytes.chunks(3) {
            let b = [
                chunk[0],
                chunk.get(1).copied().unwrap_or(0),
                chunk.get(2).copied().unwrap_or(0),
            ];
            let n = (u32::from(b[0]) << 16) | (u32::from(b[1]) << 8) | u32::from(b[2]);
            out.push(ALPHABET[(n >> 18) as usize & 63] as char);
            out.push(ALPHABET[(n >> 12) as usize & 63] as char);
            out.push(if chunk.len() > 1 {
                ALPHABET[(n >> 6) as usize & 63] as char
            } else {
                '='
            });
            out.push(if chunk.len() > 2 {
                ALPHABET[n as usize & 63] as char
            } else {
                '='
            });
        }
        out
    }

    pub fn decode(s: &str) -> Option<Vec<u8>> {
        fn val(c: u8) -> Option<u32> {
            match c {
                b'A'..=b'Z' => Some(u32::from(c - b'A')),
                b'a'..=b'z' => Some(u32::from(c - b'a') + 26),
                b'0'..=b'9' => Some(u32::from(c - b'0') + 52),
                b'+' => Some(62),
                b'/' => Some(63),
                _ => None,
            }
        }

        let s = s.trim_end_matches('=');
        let mut out = Vec::with_capacity(s.len() * 3 / 4);
        for chunk in s.as_bytes().chunks(4) {
            if chunk.len() == 1 {
                return None;
            }
            let mut n = 0u32;
            for &c in chunk {
                n = (n << 6) | val(c)?;
            }
            n <<= 6 * (4 - chunk.len());
            let bytes = [(n >> 16) as u8, (n >> 8) as u8, n as u8];
            out.extend_from_slice(&bytes[..chunk.len() - 1]);
        }
        Some(out)
    }

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        decode(&s).ok_or_else(|| serde::de::Error::custom("invalid base64 raster content"))
    }
}
