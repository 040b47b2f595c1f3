use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use spectrum_studio::{
    CaptureOpts, DestinationPicker, ExportStart, FfmpegEncoder, FileDestinationPicker,
    FinalizedOutput, Pacing, ProjectConfig, SettingUpdate, StudioController, Surface,
    UnavailablePicker,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "spectrum-studio", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a single still as a PNG.
    Frame(FrameArgs),
    /// Run the preview loop for a while, optionally saving the last frame.
    Preview(PreviewArgs),
    /// Export the whole timeline to video (requires `ffmpeg` on PATH).
    Render(RenderArgs),
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Project JSON.
    #[arg(long)]
    project: PathBuf,

    /// Playhead position in milliseconds.
    #[arg(long, default_value_t = 0.0)]
    time_ms: f64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Setting override, `section.key=value`. Repeatable.
    #[arg(long = "set")]
    set: Vec<SettingUpdate>,
}

#[derive(Parser, Debug)]
struct PreviewArgs {
    /// Project JSON.
    #[arg(long)]
    project: PathBuf,

    /// Wall-clock seconds to run.
    #[arg(long, default_value_t = 5.0)]
    seconds: f64,

    /// Run ticks back to back instead of at display rate.
    #[arg(long, default_value_t = false)]
    fast: bool,

    /// Write the last preview frame to this PNG.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Setting override, `section.key=value`. Repeatable.
    #[arg(long = "set")]
    set: Vec<SettingUpdate>,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Project JSON.
    #[arg(long)]
    project: PathBuf,

    /// Directory receiving the exported video.
    #[arg(long)]
    out_dir: PathBuf,

    /// Buffer the encoded stream in memory and save it at the end.
    #[arg(long, default_value_t = false)]
    buffered: bool,

    /// Encode as fast as possible instead of in real time.
    #[arg(long, default_value_t = false)]
    fast: bool,

    /// Setting override, `section.key=value`. Repeatable.
    #[arg(long = "set")]
    set: Vec<SettingUpdate>,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Frame(args) => cmd_frame(args),
        Command::Preview(args) => cmd_preview(args),
        Command::Render(args) => cmd_render(args),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_project(path: &Path, overrides: Vec<SettingUpdate>) -> anyhow::Result<ProjectConfig> {
    let mut project = ProjectConfig::from_path(path)
        .with_context(|| format!("load project '{}'", path.display()))?;
    for update in overrides {
        project.settings = project.settings.try_with(update)?;
    }
    Ok(project)
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let project = load_project(&args.project, args.set)?;
    let mut studio = StudioController::from_project(&project, Pacing::Unthrottled)?;
    let surface = studio.render_still(args.time_ms)?;
    write_png(surface, &args.out)
}

fn cmd_preview(args: PreviewArgs) -> anyhow::Result<()> {
    let project = load_project(&args.project, args.set)?;
    let pacing = if args.fast {
        Pacing::Unthrottled
    } else {
        Pacing::Realtime
    };
    let mut studio = StudioController::from_project(&project, pacing)?;
    if let Err(e) = studio.play() {
        eprintln!("playback unavailable: {e}");
    }

    let started = std::time::Instant::now();
    let mut frames = 0u64;
    while started.elapsed().as_secs_f64() < args.seconds {
        studio.tick()?;
        frames += 1;
    }
    info!(
        frames,
        elapsed = studio.player().elapsed_secs(),
        "preview finished"
    );

    if let Some(out) = &args.out {
        write_png(studio.surface(), out)?;
    }
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let project = load_project(&args.project, args.set)?;
    let pacing = if args.fast {
        Pacing::Unthrottled
    } else {
        Pacing::Realtime
    };
    let mut studio = StudioController::from_project(&project, pacing)?;

    let mut picker: Box<dyn DestinationPicker> = if args.buffered {
        Box::new(UnavailablePicker::new("--buffered requested"))
    } else {
        Box::new(FileDestinationPicker::new(&args.out_dir))
    };
    let encoder = FfmpegEncoder::probe();
    let started = studio.start_export(picker.as_mut(), Box::new(encoder), CaptureOpts::default());
    print_notices(&mut studio);
    match started? {
        ExportStart::Declined => {
            eprintln!("export declined");
            return Ok(());
        }
        ExportStart::Recording(strategy) => info!(?strategy, "recording"),
    }

    let output = loop {
        let report = studio.tick()?;
        if let Some(p) = report.progress {
            info!(progress = p, "exporting");
        }
        if let Some(output) = report.finished {
            break output;
        }
    };

    match output {
        FinalizedOutput::Streamed(report) => {
            if let Some(path) = &report.location {
                eprintln!("wrote {}", path.display());
            }
        }
        FinalizedOutput::Buffered(blob) => {
            std::fs::create_dir_all(&args.out_dir)
                .with_context(|| format!("create output dir '{}'", args.out_dir.display()))?;
            let path = args.out_dir.join(studio.suggested_filename());
            blob.save(&path)?;
            eprintln!("wrote {} ({})", path.display(), blob.mime);
        }
    }

    studio.wait_export_settled();
    print_notices(&mut studio);
    Ok(())
}

fn print_notices(studio: &mut StudioController) {
    for notice in studio.take_notices() {
        eprintln!("note: {notice}");
    }
}

fn write_png(surface: &Surface, out: &Path) -> anyhow::Result<()> {
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    let frame = surface.to_frame().to_straight();
    image::save_buffer_with_format(
        out,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", out.display()))?;

    eprintln!("wrote {}", out.display());
    Ok(())
}
