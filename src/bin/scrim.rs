use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "scrim", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a single frame of a scene as a PNG.
    Still(StillArgs),
    /// Record a scene's animation cycle to video (requires `ffmpeg` on PATH).
    Record(RecordArgs),
}

#[derive(Parser, Debug)]
struct StillArgs {
    /// Input scene JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Instant to render, in milliseconds of animation time.
    #[arg(long, default_value_t = 0.0)]
    at_ms: f64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct RecordArgs {
    /// Input scene JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output video path (.mp4 or .webm per the scene's recording format).
    #[arg(long)]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Still(args) => cmd_still(args),
        Command::Record(args) => cmd_record(args),
    }
}

fn read_scene_json(path: &Path) -> anyhow::Result<scrim::Scene> {
    let f = File::open(path).with_context(|| format!("open scene '{}'", path.display()))?;
    let r = BufReader::new(f);
    let scene: scrim::Scene = serde_json::from_reader(r).with_context(|| "parse scene JSON")?;
    Ok(scene)
}

fn cmd_still(args: StillArgs) -> anyhow::Result<()> {
    let scene = read_scene_json(&args.in_path)?;
    scene.validate()?;

    let frame = scrim::render_still(&scene, args.at_ms)?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    image::save_buffer_with_format(
        &args.out,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_record(args: RecordArgs) -> anyhow::Result<()> {
    let scene = read_scene_json(&args.in_path)?;
    scene.validate()?;
    scene.recording.validate()?;

    let canvas = scrim::compositor::output_canvas(&scene);
    let cfg = scrim::EncodeConfig {
        width: canvas.width,
        height: canvas.height,
        fps: scene.recording.fps,
        format: scene.recording.format,
        bitrate_mbps: scene.recording.bitrate_mbps,
        out_path: args.out.clone(),
        overwrite: true,
    };

    let mut encoder = scrim::FfmpegEncoder::new(cfg, scrim::compositor::CLEAR_RGBA)?;
    let stats = scrim::record(&scene, &mut encoder, &scrim::CancelFlag::new())?;

    eprintln!(
        "wrote {} ({} frames at {}x{})",
        args.out.display(),
        stats.frames,
        stats.canvas.width,
        stats.canvas.height
    );
    Ok(())
}
