#![forbid(unsafe_code)]

pub mod anim;
pub mod assets;
pub mod compile;
pub mod compositor;
pub mod core;
pub mod encode;
pub mod error;
pub mod gesture;
pub mod model;
pub mod path_anim;
pub mod preview;
pub mod render_cpu;
pub mod resolve;
pub mod scene;

pub use compile::{DrawOp, ElapsedSource, UniformClock, compile_scene};
pub use compositor::{CancelFlag, RecordStats, record, render_still};
pub use core::{Canvas, Fps, FrameIndex, Position, Rgba8, VisualState};
pub use encode::{CollectSink, EncodeConfig, FfmpegEncoder, FrameSink};
pub use error::{ScrimError, ScrimResult};
pub use model::{AnimKind, Element, ElementId, ElementKind, RecordingConfig};
pub use render_cpu::{CpuRenderer, FrameRGBA};
pub use scene::{EditorMode, Scene};
