use clap::{Parser, ValueEnum};
use decalbox::pipeline::ImageReport;
use decalbox::{resolve_default_decal, DecalPipeline, Face, PipelineConfig, PlacementStrategy};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "decalbox")]
#[command(about = "DecalBox - find a box in a photo and put a decal on it", long_about = None)]
struct Cli {
    /// Input image, or a directory of images
    input: PathBuf,

    /// Directory for annotated images (required for directory input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Decal image to paste onto the box
    #[arg(long)]
    decal: Option<PathBuf>,

    /// Directory whose `decals/` folder is searched when no decal is given
    #[arg(long, default_value = ".")]
    decal_dir: PathBuf,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Decal scale factor
    #[arg(long)]
    scale: Option<f32>,

    /// Initial fraction of the centre-to-corner distance
    #[arg(long)]
    offset: Option<f32>,

    /// Place at a fixed offset towards this face instead of the top corner
    #[arg(long, value_enum)]
    face: Option<FaceArg>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum FaceArg {
    Top,
    Bottom,
    Left,
    Right,
}

impl From<FaceArg> for Face {
    fn from(arg: FaceArg) -> Self {
        match arg {
            FaceArg::Top => Face::Top,
            FaceArg::Bottom => Face::Bottom,
            FaceArg::Left => Face::Left,
            FaceArg::Right => Face::Right,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum OutputFormat {
    /// JSON output with full details
    Json,
    /// Plain text, one line per image: path, angle, x, y
    Text,
}

fn print_text(report: &ImageReport) {
    println!(
        "{}\t{:.2}\t{}\t{}",
        report.input.display(),
        report.angle,
        report.position.x,
        report.position.y
    );
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(scale) = cli.scale {
        config.composite.decal_scale = scale;
    }
    if let Some(offset) = cli.offset {
        config.placement.offset_percent = offset;
    }
    if let Some(face) = cli.face {
        config.placement.strategy = PlacementStrategy::Face(face.into());
    }
    if cli.decal.is_some() {
        config.decal_path = cli.decal.clone();
    }
    if config.decal_path.is_none() {
        config.decal_path = resolve_default_decal(&cli.decal_dir);
    }

    let pipeline: DecalPipeline = DecalPipeline::new(config);

    if cli.input.is_dir() {
        let output = cli
            .output
            .as_deref()
            .ok_or("--output is required when INPUT is a directory")?;
        let report = pipeline.process_directory(&cli.input, output)?;

        match cli.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            OutputFormat::Text => {
                report.annotated.iter().for_each(print_text);
                for miss in &report.misses {
                    println!("{}\tno box", miss.display());
                }
                for skip in &report.skipped {
                    println!("{}\tskipped: {}", skip.path.display(), skip.reason);
                }
            }
        }
        return Ok(());
    }

    let Some(report) = pipeline.process_path(&cli.input, cli.output.as_deref())? else {
        tracing::warn!(path = %cli.input.display(), "no box detected");
        std::process::exit(1);
    };

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_text(&report),
    }

    Ok(())
}
