use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt};
use unit_media::capabilities::{Capabilities, TracingBusy, TracingNotifier};
use unit_media::config::{self, PipelineConfig};
use unit_media::imaging::{CropGeometry, RustBackend};
use unit_media::output;
use unit_media::preview::PreviewStore;
use unit_media::session::{EditSession, Pipeline};
use unit_media::source::{HttpFetcher, ImageInput};
use unit_media::submission::{EnvCredentials, HttpApi, SubmitTarget, TOKEN_ENV};

#[derive(Parser)]
#[command(name = "unit-media")]
#[command(about = "Crop, compress and upload images for unit galleries")]
#[command(long_about = "\
Crop, compress and upload images for unit galleries

Every image is cropped (optionally), scaled so its longest side fits
encoding.max_dimension, then re-encoded at decreasing JPEG quality until it
fits encoding.max_bytes. PNG and GIF sources try a lossless PNG first.

Crop contexts fix the aspect ratio (see [crop.aspect_ratios]):
  banner   16:9
  profile  1:1
  slide    16:9

The bearer token for `submit` is read from UNIT_MEDIA_TOKEN.

Run 'unit-media gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Directory containing config.toml
    #[arg(long, default_value = ".", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crop and compress a single image to the upload budget
    Compress(CompressArgs),
    /// Edit a gallery and submit it to the API in one request
    Submit(SubmitArgs),
    /// Print a stock config.toml with all options documented
    GenConfig,
}

#[derive(clap::Args)]
struct CompressArgs {
    /// Image file, or an http(s) URL to fetch
    input: String,

    /// Output file (default: <input>-out.<ext> next to a local input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Crop rectangle in source pixels: X,Y,WIDTH,HEIGHT
    #[arg(long, value_parser = parse_crop)]
    crop: Option<CropGeometry>,

    /// Crop context whose aspect ratio applies (e.g. banner, profile)
    #[arg(long)]
    context: Option<String>,
}

#[derive(clap::Args)]
struct SubmitArgs {
    /// API collection, e.g. programs or journeys
    #[arg(long)]
    collection: String,

    /// Entity id; omit to create a new entity
    #[arg(long)]
    id: Option<String>,

    /// Identity of an image already in the gallery (repeatable, in order)
    #[arg(long = "existing")]
    existing: Vec<String>,

    /// Identity to remove from the gallery (repeatable)
    #[arg(long = "remove")]
    remove: Vec<String>,

    /// Text field sent with the form: KEY=VALUE (repeatable)
    #[arg(long = "field", value_parser = parse_field)]
    fields: Vec<(String, String)>,

    /// Crop context applied to every added image
    #[arg(long)]
    context: Option<String>,

    /// Print what would be sent without contacting the API
    #[arg(long)]
    dry_run: bool,

    /// Image files to add
    files: Vec<PathBuf>,
}

fn parse_crop(s: &str) -> Result<CropGeometry, String> {
    let parts: Vec<u32> = s
        .split(',')
        .map(|p| p.trim().parse::<u32>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid crop {s:?}: {e}"))?;
    match parts[..] {
        [x, y, width, height] => Ok(CropGeometry::new(x, y, width, height)),
        _ => Err(format!("crop must be X,Y,WIDTH,HEIGHT, got {s:?}")),
    }
}

fn parse_field(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("field must be KEY=VALUE, got {s:?}")),
    }
}

fn input_from(arg: &str) -> ImageInput {
    if arg.starts_with("http://") || arg.starts_with("https://") {
        ImageInput::Remote {
            url: arg.to_string(),
        }
    } else {
        ImageInput::File(PathBuf::from(arg))
    }
}

fn default_output(input: &str, extension: &str) -> PathBuf {
    let path = Path::new(input);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty() && !input.contains("://"))
        .unwrap_or("image");
    let dir = if input.contains("://") {
        Path::new("")
    } else {
        path.parent().unwrap_or(Path::new(""))
    };
    dir.join(format!("{stem}-out.{extension}"))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Compress(args) => {
            let config = config::load_config(&cli.config)?;
            compress(&config, args)?;
        }
        Command::Submit(args) => {
            let config = config::load_config(&cli.config)?;
            submit(&config, args)?;
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn compress(config: &PipelineConfig, args: CompressArgs) -> Result<(), Box<dyn std::error::Error>> {
    let backend = RustBackend::new();
    let fetcher = HttpFetcher::new(config.api.timeout())?;
    let pipeline = Pipeline::new(&backend, config, &fetcher);
    let previews = PreviewStore::new();

    let mut pending = pipeline.open(input_from(&args.input), args.context.as_deref(), &previews)?;
    if let Some(geometry) = args.crop {
        geometry.validate(pending.natural())?;
        pending.cropper.set_geometry(geometry);
    }
    let outcome = pipeline.render(&mut pending)?;

    let out = args
        .output
        .unwrap_or_else(|| default_output(&args.input, outcome.image.format.extension()));
    std::fs::write(&out, &outcome.image.bytes)?;
    output::print_encode_outcome(&pending.source.name, &out.display().to_string(), &outcome);
    Ok(())
}

fn submit(config: &PipelineConfig, args: SubmitArgs) -> Result<(), Box<dyn std::error::Error>> {
    let backend = RustBackend::new();
    let fetcher = HttpFetcher::new(config.api.timeout())?;
    let api = HttpApi::new(
        config.api.base_url.clone(),
        config.api.field_names(),
        EnvCredentials::new(TOKEN_ENV),
        config.api.timeout(),
    )?;
    let caps = Capabilities {
        notifier: &TracingNotifier,
        busy: &TracingBusy,
        api: &api,
    };
    let pipeline = Pipeline::new(&backend, config, &fetcher);
    let mut session = EditSession::with_existing(pipeline, caps, args.existing);

    for identity in &args.remove {
        let index = session
            .assets()
            .iter()
            .position(|asset| asset.identity() == Some(identity.as_str()))
            .ok_or_else(|| format!("{identity} is not in the gallery (pass it with --existing)"))?;
        session.remove(index)?;
    }
    for file in args.files {
        let pending = session.open(ImageInput::File(file), args.context.as_deref())?;
        session.commit(pending)?;
    }

    output::print_submission_plan(session.assets(), &session.reconciliation());
    if args.dry_run {
        return Ok(());
    }
    println!();

    let target = match args.id {
        Some(id) => SubmitTarget::Update {
            collection: args.collection,
            id,
        },
        None => SubmitTarget::Create {
            collection: args.collection,
        },
    };
    match session.submit(target.clone(), args.fields) {
        Ok(outcome) => {
            output::print_submit_outcome(outcome, &target);
            Ok(())
        }
        Err(failure) => Err(failure.error.into()),
    }
}
